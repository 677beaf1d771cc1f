// Host-side tests for crossfader curves and the two-deck mixer.
// The main crate is wasm-only, so we include the pure-Rust modules directly.

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
mod crossfader {
    include!("../src/core/crossfader.rs");
}
mod mixer {
    include!("../src/core/mixer.rs");
}

use crossfader::*;
use deck::*;
use mixer::*;

const EPS: f32 = 1e-5;

fn sweep() -> impl Iterator<Item = f32> {
    (0..=200).map(|i| -1.0 + i as f32 * 0.01)
}

#[test]
fn linear_curve_is_monotonic_with_full_endpoints() {
    let mut prev = compute_gains(-1.0, CrossfaderCurve::Linear, false);
    assert!((prev.0 - 1.0).abs() < EPS && prev.1.abs() < EPS);
    for p in sweep().skip(1) {
        let g = compute_gains(p, CrossfaderCurve::Linear, false);
        assert!(g.0 <= prev.0 + EPS, "gain A rose at {p}");
        assert!(g.1 >= prev.1 - EPS, "gain B fell at {p}");
        prev = g;
    }
    let end = compute_gains(1.0, CrossfaderCurve::Linear, false);
    assert!(end.0.abs() < EPS && (end.1 - 1.0).abs() < EPS);
}

#[test]
fn power_curve_keeps_constant_energy() {
    for p in sweep() {
        let (a, b) = compute_gains(p, CrossfaderCurve::Power, false);
        assert!((a * a + b * b - 1.0).abs() < 1e-4, "energy drift at {p}");
    }
}

#[test]
fn cut_curve_dead_zone_reads_half_on_both_sides() {
    for p in [-0.04, -0.01, 0.0, 0.02, 0.049] {
        assert_eq!(compute_gains(p, CrossfaderCurve::Cut, false), (0.5, 0.5));
    }
    for p in [-1.0, -0.5, -0.06] {
        assert_eq!(compute_gains(p, CrossfaderCurve::Cut, false), (1.0, 0.0));
    }
    for p in [0.06, 0.5, 1.0] {
        assert_eq!(compute_gains(p, CrossfaderCurve::Cut, false), (0.0, 1.0));
    }
}

#[test]
fn cut_curve_band_edges_are_symmetric() {
    // The band is open: exactly +/-0.05 already picks a side.
    assert_eq!(compute_gains(-0.05, CrossfaderCurve::Cut, false), (1.0, 0.0));
    assert_eq!(compute_gains(0.05, CrossfaderCurve::Cut, false), (0.0, 1.0));
    assert_eq!(compute_gains(-0.05, CrossfaderCurve::Cut, true), (0.0, 1.0));
    assert_eq!(compute_gains(0.05, CrossfaderCurve::Cut, true), (1.0, 0.0));
    for reversed in [false, true] {
        for p in [-0.049, 0.049] {
            assert_eq!(compute_gains(p, CrossfaderCurve::Cut, reversed), (0.5, 0.5));
        }
    }
    // Out-of-range input clamps before the side is picked.
    assert_eq!(compute_gains(-7.0, CrossfaderCurve::Cut, true), (0.0, 1.0));
}

#[test]
fn exponential_curve_uses_tuned_exponent() {
    let (a, b) = compute_gains(0.0, CrossfaderCurve::Exponential, false);
    let expected = 0.5_f32.powf(2.2);
    assert!((a - expected).abs() < EPS);
    assert!((b - expected).abs() < EPS);

    let tuning = CrossfaderTuning {
        exponent: 1.0,
        ..CrossfaderTuning::default()
    };
    let (a, b) = compute_gains_with(0.5, CrossfaderCurve::Exponential, false, &tuning);
    let (la, lb) = compute_gains(0.5, CrossfaderCurve::Linear, false);
    assert!((a - la).abs() < EPS && (b - lb).abs() < EPS);
}

#[test]
fn reversed_mirrors_the_fader() {
    for curve in [
        CrossfaderCurve::Linear,
        CrossfaderCurve::Power,
        CrossfaderCurve::Exponential,
    ] {
        let (a, b) = compute_gains(-0.3, curve, false);
        let (ra, rb) = compute_gains(-0.3, curve, true);
        assert!((a - rb).abs() < EPS && (b - ra).abs() < EPS, "{curve:?}");
    }
}

#[test]
fn out_of_range_and_nan_positions_are_clamped() {
    assert_eq!(
        compute_gains(5.0, CrossfaderCurve::Linear, false),
        compute_gains(1.0, CrossfaderCurve::Linear, false)
    );
    assert_eq!(
        compute_gains(f32::NAN, CrossfaderCurve::Linear, false),
        compute_gains(0.0, CrossfaderCurve::Linear, false)
    );
}

#[test]
fn curve_names_parse() {
    assert_eq!(CrossfaderCurve::from_name("power"), Some(CrossfaderCurve::Power));
    assert_eq!(CrossfaderCurve::from_name("exp"), Some(CrossfaderCurve::Exponential));
    assert_eq!(CrossfaderCurve::from_name("cut"), Some(CrossfaderCurve::Cut));
    assert_eq!(CrossfaderCurve::from_name("wobble"), None);
    assert_eq!(CrossfaderCurve::default(), CrossfaderCurve::Linear);
}

// ---------------- Mixer wiring ----------------

#[derive(Clone, Copy)]
struct Clip(f64);

impl AudioData for Clip {
    fn duration(&self) -> f64 {
        self.0
    }
}

#[derive(Default)]
struct ParamLog {
    ramps: Vec<(ChannelParam, f32, f64)>,
}

impl ParamLog {
    fn last(&self, param: ChannelParam) -> Option<f32> {
        self.ramps
            .iter()
            .rev()
            .find(|(p, _, _)| *p == param)
            .map(|(_, v, _)| *v)
    }
}

impl DeckBackend for ParamLog {
    type Buffer = Clip;
    type Source = ();

    fn current_time(&self) -> f64 {
        0.0
    }

    fn start_source(&mut self, _: &Clip, _: &SourceRequest, _: EndedNotifier) -> Option<()> {
        Some(())
    }

    fn stop_source(&mut self, _: ()) {}

    fn ramp_source_rate(&mut self, _: &(), _: f32, _: f64) {}

    fn ramp_param(&mut self, param: ChannelParam, value: f32, time_constant: f64) {
        self.ramps.push((param, value, time_constant));
    }
}

#[test]
fn mixer_pushes_crossfader_gains_to_both_decks() {
    let mut mixer = Mixer::new(ParamLog::default(), ParamLog::default());
    // Centre linear position on construction.
    assert_eq!(
        mixer.deck(DeckId::A).backend().last(ChannelParam::Crossfade),
        Some(0.5)
    );

    mixer.set_crossfader(-1.0, CrossfaderCurve::Linear, false);
    assert_eq!(
        mixer.deck(DeckId::A).backend().last(ChannelParam::Crossfade),
        Some(1.0)
    );
    assert_eq!(
        mixer.deck(DeckId::B).backend().last(ChannelParam::Crossfade),
        Some(0.0)
    );

    mixer.set_crossfader(-1.0, CrossfaderCurve::Linear, true);
    assert_eq!(mixer.deck(DeckId::A).channel().crossfade_gain, 0.0);
    assert_eq!(mixer.deck(DeckId::B).channel().crossfade_gain, 1.0);
}

#[test]
fn crossfader_never_touches_channel_gain() {
    let mut mixer = Mixer::new(ParamLog::default(), ParamLog::default());
    mixer.deck_mut(DeckId::A).set_gain(0.7);
    mixer.set_crossfader(0.8, CrossfaderCurve::Power, false);
    let deck = mixer.deck(DeckId::A);
    assert_eq!(deck.channel().gain, 0.7);
    assert_eq!(deck.backend().last(ChannelParam::Gain), Some(0.7));
    let crossfade_ramps = deck
        .backend()
        .ramps
        .iter()
        .filter(|(p, _, _)| *p == ChannelParam::Crossfade)
        .count();
    assert_eq!(crossfade_ramps, 2);
    assert!(deck
        .backend()
        .ramps
        .iter()
        .filter(|(p, _, _)| *p == ChannelParam::Crossfade)
        .all(|(_, _, tau)| *tau == constants::CROSSFADER_SMOOTHING_TAU_SEC));
}
