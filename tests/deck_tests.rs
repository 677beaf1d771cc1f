// Host-side tests for deck transport and channel-strip behaviour.
// The main crate is wasm-only, so we include the pure-Rust modules directly
// and drive the deck against a fake backend with a manual audio clock.

#![allow(dead_code)]
mod constants {
    include!("../src/core/constants.rs");
}
mod track {
    include!("../src/core/track.rs");
}
mod deck {
    include!("../src/core/deck.rs");
}

use constants::*;
use deck::*;
use track::TrackMeta;

const TOL: f64 = 1e-6;

#[derive(Clone, Copy, Debug)]
struct Clip(f64);

impl AudioData for Clip {
    fn duration(&self) -> f64 {
        self.0
    }
}

/// Records every backend call and keeps each source's completion handle so a
/// test can play "the runtime" and end a source on its own.
#[derive(Default)]
struct FakeBackend {
    now: f64,
    next_id: u32,
    started: Vec<(u32, SourceRequest)>,
    stopped: Vec<u32>,
    ended: Vec<(u32, EndedNotifier)>,
    rate_ramps: Vec<(u32, f32)>,
    params: Vec<(ChannelParam, f32, f64)>,
    refuse_starts: bool,
}

impl FakeBackend {
    fn live_sources(&self) -> usize {
        self.started.len() - self.stopped.len()
    }

    fn end_source(&mut self, id: u32) {
        let idx = self
            .ended
            .iter()
            .position(|(sid, _)| *sid == id)
            .expect("unknown source");
        let (_, notifier) = self.ended.remove(idx);
        notifier.notify();
    }

    fn last_param(&self, param: ChannelParam) -> Option<(f32, f64)> {
        self.params
            .iter()
            .rev()
            .find(|(p, _, _)| *p == param)
            .map(|(_, v, tau)| (*v, *tau))
    }
}

impl DeckBackend for FakeBackend {
    type Buffer = Clip;
    type Source = u32;

    fn current_time(&self) -> f64 {
        self.now
    }

    fn start_source(
        &mut self,
        _buffer: &Clip,
        request: &SourceRequest,
        on_ended: EndedNotifier,
    ) -> Option<u32> {
        if self.refuse_starts {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.started.push((id, *request));
        self.ended.push((id, on_ended));
        Some(id)
    }

    fn stop_source(&mut self, source: u32) {
        self.stopped.push(source);
    }

    fn ramp_source_rate(&mut self, source: &u32, rate: f32, _time_constant: f64) {
        self.rate_ramps.push((*source, rate));
    }

    fn ramp_param(&mut self, param: ChannelParam, value: f32, time_constant: f64) {
        self.params.push((param, value, time_constant));
    }
}

fn loaded_deck(seconds: f64) -> Deck<FakeBackend> {
    let mut deck = Deck::new(DeckId::A, FakeBackend::default());
    deck.load(Clip(seconds));
    deck
}

/// Move the fake audio clock forward.
fn advance(deck: &mut Deck<FakeBackend>, seconds: f64) {
    deck.backend_mut().now += seconds;
}

#[test]
fn transport_calls_without_buffer_are_noops() {
    let mut deck = Deck::new(DeckId::B, FakeBackend::default());
    deck.play();
    deck.pause();
    deck.seek(3.0);
    deck.stop();
    assert!(!deck.is_playing());
    assert!(deck.backend().started.is_empty());
    let p = deck.progress();
    assert_eq!(p.position, 0.0);
    assert_eq!(p.duration, 0.0);
    assert!(!p.is_playing);
}

#[test]
fn play_starts_slightly_in_the_future_at_the_pause_offset() {
    let mut deck = loaded_deck(10.0);
    advance(&mut deck, 1.0);
    deck.play();
    let (_, req) = deck.backend().started[0];
    assert!((req.when - (1.0 + DECK_START_DELAY_SEC)).abs() < TOL);
    assert_eq!(req.offset, 0.0);
    assert_eq!(req.rate, 1.0);
    assert_eq!(req.loop_region, None);
    // Playing again is a no-op.
    deck.play();
    assert_eq!(deck.backend().started.len(), 1);
}

#[test]
fn position_advances_with_the_audio_clock() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    advance(&mut deck, DECK_START_DELAY_SEC + 1.0);
    let first = deck.progress().position;
    advance(&mut deck, 1.0);
    let second = deck.progress().position;
    assert!((second - first - 1.0).abs() < 1e-3, "{first} -> {second}");
    assert!(deck.progress().is_playing);
}

#[test]
fn pause_then_play_resumes_without_a_jump() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    advance(&mut deck, 2.0);
    let before = deck.progress().position;
    deck.pause();
    assert!(!deck.is_playing());
    assert!((deck.pause_offset() - before).abs() < TOL);
    advance(&mut deck, 5.0);
    deck.play();
    let after = deck.progress().position;
    assert!((after - before).abs() < TOL);
    let (_, req) = deck.backend().started[1];
    assert!((req.offset - before).abs() < TOL);
}

#[test]
fn pause_twice_is_idempotent() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    advance(&mut deck, 1.5);
    deck.pause();
    let offset = deck.pause_offset();
    let stops = deck.backend().stopped.len();
    advance(&mut deck, 3.0);
    deck.pause();
    assert_eq!(deck.pause_offset(), offset);
    assert_eq!(deck.backend().stopped.len(), stops);
    assert!(!deck.is_playing());
}

#[test]
fn stop_rewinds_and_is_idempotent() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    advance(&mut deck, 3.0);
    deck.stop();
    deck.stop();
    assert_eq!(deck.pause_offset(), 0.0);
    assert_eq!(deck.backend().stopped, vec![0]);
    assert_eq!(deck.progress().position, 0.0);
}

#[test]
fn rate_is_clamped_to_half_and_one_and_a_half() {
    let mut deck = loaded_deck(10.0);
    assert_eq!(deck.set_rate(10.0), 1.5);
    assert_eq!(deck.rate(), 1.5);
    assert_eq!(deck.set_rate(0.01), 0.5);
    assert_eq!(deck.set_rate(f32::NAN), 1.0);
    assert_eq!(deck.set_rate(1.2), 1.2);
}

#[test]
fn rate_change_while_playing_keeps_position_continuous() {
    let mut deck = loaded_deck(20.0);
    deck.play();
    advance(&mut deck, DECK_START_DELAY_SEC + 2.0);
    let before = deck.progress().position;
    deck.set_rate(1.5);
    assert!((deck.progress().position - before).abs() < TOL);
    advance(&mut deck, 2.0);
    let after = deck.progress().position;
    assert!((after - before - 3.0).abs() < 1e-3, "{before} -> {after}");
    // The live source was ramped, not rebuilt.
    assert_eq!(deck.backend().started.len(), 1);
    assert_eq!(deck.backend().rate_ramps, vec![(0, 1.5)]);
}

#[test]
fn rate_set_while_paused_applies_to_next_source() {
    let mut deck = loaded_deck(10.0);
    deck.set_rate(0.75);
    deck.play();
    assert_eq!(deck.backend().started[0].1.rate, 0.75);
    assert!(deck.backend().rate_ramps.is_empty());
}

#[test]
fn seek_clamps_and_preserves_play_state() {
    let mut deck = loaded_deck(10.0);
    deck.seek(-4.0);
    assert_eq!(deck.pause_offset(), 0.0);
    deck.seek(50.0);
    assert!((deck.pause_offset() - (10.0 - DECK_SEEK_END_GUARD_SEC)).abs() < TOL);
    assert!(!deck.is_playing());

    deck.play();
    deck.seek(4.0);
    assert!(deck.is_playing());
    assert_eq!(deck.backend().stopped, vec![0]);
    let (_, req) = deck.backend().started[1];
    assert_eq!(req.offset, 4.0);
    assert!((deck.progress().position - 4.0).abs() < TOL);
}

#[test]
fn load_while_playing_swaps_source_at_zero() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    advance(&mut deck, 3.0);
    deck.load(Clip(30.0));
    assert!(deck.is_playing());
    assert_eq!(deck.backend().live_sources(), 1);
    let (_, req) = deck.backend().started[1];
    assert_eq!(req.offset, 0.0);
    assert_eq!(deck.progress().duration, 30.0);
}

#[test]
fn load_while_paused_rewinds_without_starting() {
    let mut deck = loaded_deck(10.0);
    deck.seek(6.0);
    deck.load(Clip(8.0));
    assert_eq!(deck.pause_offset(), 0.0);
    assert!(!deck.is_playing());
    assert!(deck.backend().started.is_empty());
}

#[test]
fn natural_end_resets_the_deck() {
    let mut deck = loaded_deck(4.0);
    deck.play();
    advance(&mut deck, 4.1);
    deck.backend_mut().end_source(0);
    let p = deck.progress();
    assert!(!p.is_playing);
    assert_eq!(p.position, 0.0);
    assert_eq!(deck.pause_offset(), 0.0);
    // Play again starts from the top.
    deck.play();
    assert_eq!(deck.backend().started[1].1.offset, 0.0);
}

#[test]
fn stale_end_notice_is_ignored() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    deck.seek(5.0);
    // The first source reports its end after it was already replaced.
    deck.backend_mut().end_source(0);
    assert!(deck.progress().is_playing);
    assert_eq!(deck.backend().stopped, vec![0]);
}

#[test]
fn refused_start_leaves_deck_paused_at_offset() {
    let mut deck = loaded_deck(10.0);
    deck.seek(2.0);
    deck.backend_mut().refuse_starts = true;
    deck.play();
    assert!(!deck.is_playing());
    assert_eq!(deck.pause_offset(), 2.0);
}

#[test]
fn loop_bounds_reach_the_source_and_fold_position() {
    let mut deck = loaded_deck(10.0);
    deck.set_loop(true, 2.0, 4.0);
    deck.seek(2.0);
    deck.play();
    assert_eq!(deck.backend().started[0].1.loop_region, Some((2.0, 4.0)));
    advance(&mut deck, DECK_START_DELAY_SEC + 3.0);
    // 2 + 3 = 5 folds back into [2, 4) at 3.
    assert!((deck.progress().position - 3.0).abs() < 1e-6);
}

#[test]
fn loop_change_while_playing_rebuilds_at_current_position() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    advance(&mut deck, DECK_START_DELAY_SEC + 1.0);
    deck.set_loop(true, 0.5, 3.0);
    assert!(deck.is_playing());
    assert_eq!(deck.backend().stopped, vec![0]);
    let (_, req) = deck.backend().started[1];
    assert!((req.offset - 1.0).abs() < 1e-6);
    assert_eq!(req.loop_region, Some((0.5, 3.0)));
}

#[test]
fn disabling_loop_mid_play_runs_on_past_the_old_end() {
    let mut deck = loaded_deck(10.0);
    deck.set_loop(true, 1.0, 2.0);
    deck.seek(1.0);
    deck.play();
    advance(&mut deck, DECK_START_DELAY_SEC + 1.5);
    // 1 + 1.5 = 2.5 folds to 1.5.
    deck.set_loop(false, 1.0, 2.0);
    let (_, req) = deck.backend().started[1];
    assert_eq!(req.loop_region, None);
    assert!((req.offset - 1.5).abs() < 1e-6);
    advance(&mut deck, DECK_START_DELAY_SEC + 2.0);
    assert!((deck.progress().position - 3.5).abs() < 1e-6);
}

#[test]
fn loop_end_is_kept_past_start() {
    let mut deck = loaded_deck(10.0);
    deck.set_loop(true, 5.0, 1.0);
    let region = deck.loop_region();
    assert_eq!(region.start_sec, 5.0);
    assert!(region.end_sec >= 5.0 + DECK_LOOP_MIN_LEN_SEC - 1e-9);
}

#[test]
fn channel_setters_clamp_and_ramp() {
    let mut deck = loaded_deck(10.0);
    deck.set_eq(20.0, -3.0, -40.0);
    let c = *deck.channel();
    assert_eq!((c.eq_high_db, c.eq_mid_db, c.eq_low_db), (12.0, -3.0, -12.0));
    assert_eq!(
        deck.backend().last_param(ChannelParam::EqHigh),
        Some((12.0, EQ_SMOOTHING_TAU_SEC))
    );

    deck.set_filter_freq(5.0);
    assert_eq!(deck.channel().filter_hz, FILTER_FREQ_MIN_HZ);
    deck.set_filter_freq(1.0e6);
    assert_eq!(deck.channel().filter_hz, FILTER_FREQ_MAX_HZ);

    deck.set_gain(3.0);
    assert_eq!(deck.channel().gain, 1.0);
    deck.set_pan(-2.0);
    assert_eq!(deck.channel().pan, -1.0);
    deck.set_sends(0.4, 7.0);
    assert_eq!(deck.backend().last_param(ChannelParam::SendReverb).map(|p| p.0), Some(0.4));
    assert_eq!(deck.backend().last_param(ChannelParam::SendDelay).map(|p| p.0), Some(1.0));
    assert_eq!(
        deck.backend().last_param(ChannelParam::Gain),
        Some((1.0, GAIN_SMOOTHING_TAU_SEC))
    );
}

#[test]
fn apply_track_copies_gain_pan_and_sends() {
    let mut deck = loaded_deck(10.0);
    let mut track = TrackMeta::new(7, "Vox", "Piano");
    track.gain = 0.6;
    track.pan = 0.25;
    track.send_a = 0.3;
    track.send_b = 0.1;
    deck.apply_track(&track);
    let c = deck.channel();
    assert_eq!((c.gain, c.pan, c.send_reverb, c.send_delay), (0.6, 0.25, 0.3, 0.1));
}

#[test]
fn teardown_stops_and_drops_buffer() {
    let mut deck = loaded_deck(10.0);
    deck.play();
    deck.teardown();
    assert!(!deck.is_playing());
    assert!(deck.buffer().is_none());
    assert_eq!(deck.backend().stopped, vec![0]);
}

#[test]
fn deck_ids_parse() {
    assert_eq!(DeckId::from_name("A"), Some(DeckId::A));
    assert_eq!(DeckId::from_name("b"), Some(DeckId::B));
    assert_eq!(DeckId::from_name("C"), None);
    assert_eq!(DeckId::B.index(), 1);
}
