use super::constants::{
    CROSSFADER_SMOOTHING_TAU_SEC, DECK_LOOP_MIN_LEN_SEC, DECK_RATE_MAX, DECK_RATE_MIN,
    DECK_SEEK_END_GUARD_SEC, DECK_START_DELAY_SEC, EQ_GAIN_DB_MAX, EQ_GAIN_DB_MIN,
    EQ_SMOOTHING_TAU_SEC, FILTER_FREQ_MAX_HZ, FILTER_FREQ_MIN_HZ, GAIN_SMOOTHING_TAU_SEC,
    RATE_SMOOTHING_TAU_SEC,
};
use super::track::TrackMeta;
use crossbeam_channel::{Receiver, Sender};

/// One of the two playback lanes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    pub const ALL: [DeckId; 2] = [DeckId::A, DeckId::B];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// Decoded audio the deck can play. The deck only needs its length.
pub trait AudioData {
    fn duration(&self) -> f64;
}

/// Identifies one started source so late completion notices can be matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceToken(u64);

/// Single-use completion handle handed to the backend with every source.
///
/// The backend calls [`EndedNotifier::notify`] when the source finishes on its
/// own. Consuming `self` makes a second notification for the same source
/// impossible.
#[derive(Debug)]
pub struct EndedNotifier {
    token: SourceToken,
    tx: Sender<SourceToken>,
}

impl EndedNotifier {
    pub fn token(&self) -> SourceToken {
        self.token
    }

    pub fn notify(self) {
        // The deck may already be gone during teardown.
        _ = self.tx.send(self.token);
    }
}

/// Loop bounds in buffer seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LoopRegion {
    pub enabled: bool,
    pub start_sec: f64,
    pub end_sec: f64,
}

impl LoopRegion {
    /// Bounds actually usable against a buffer of `duration` seconds, or `None`
    /// when looping is off or the region collapses.
    pub fn effective(&self, duration: f64) -> Option<(f64, f64)> {
        if !self.enabled {
            return None;
        }
        let start = self.start_sec.min(duration);
        let end = self.end_sec.min(duration);
        if end - start < DECK_LOOP_MIN_LEN_SEC {
            return None;
        }
        Some((start, end))
    }
}

/// Everything the backend needs to create and start one playback source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceRequest {
    /// Audio-clock time the source starts at.
    pub when: f64,
    /// Buffer offset in seconds.
    pub offset: f64,
    pub rate: f32,
    pub loop_region: Option<(f64, f64)>,
}

/// Smoothed parameters on the deck's node chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelParam {
    EqLow,
    EqMid,
    EqHigh,
    FilterFreq,
    Gain,
    Crossfade,
    Pan,
    SendReverb,
    SendDelay,
}

/// The audio runtime seen from one deck: a clock, source nodes, and the
/// deck's channel strip parameters.
///
/// Teardown calls (`stop_source`) must tolerate sources that already stopped.
pub trait DeckBackend {
    type Buffer: AudioData;
    type Source;

    fn current_time(&self) -> f64;
    fn start_source(
        &mut self,
        buffer: &Self::Buffer,
        request: &SourceRequest,
        on_ended: EndedNotifier,
    ) -> Option<Self::Source>;
    fn stop_source(&mut self, source: Self::Source);
    fn ramp_source_rate(&mut self, source: &Self::Source, rate: f32, time_constant: f64);
    fn ramp_param(&mut self, param: ChannelParam, value: f32, time_constant: f64);
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeckProgress {
    pub position: f64,
    pub duration: f64,
    pub is_playing: bool,
}

/// Current targets of the channel strip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChannelSettings {
    pub eq_low_db: f32,
    pub eq_mid_db: f32,
    pub eq_high_db: f32,
    pub filter_hz: f32,
    pub gain: f32,
    pub crossfade_gain: f32,
    pub pan: f32,
    pub send_reverb: f32,
    pub send_delay: f32,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            eq_low_db: 0.0,
            eq_mid_db: 0.0,
            eq_high_db: 0.0,
            filter_hz: FILTER_FREQ_MAX_HZ,
            gain: 1.0,
            crossfade_gain: 1.0,
            pan: 0.0,
            send_reverb: 0.0,
            send_delay: 0.0,
        }
    }
}

struct ActiveSource<S> {
    token: SourceToken,
    source: S,
}

#[inline]
fn clamp_or(value: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

/// Deck playback state machine.
///
/// The deck is playing exactly when it holds an active source. While paused,
/// `pause_offset` is the resume position; while playing the position is
/// derived from the audio clock:
/// `pause_offset + (now - start_engine_time) * rate`, folded into the loop
/// region when looping and clamped to the buffer.
///
/// Requests that make no sense in the current state (play without a buffer,
/// pause while paused) are silent no-ops and numeric inputs are clamped.
pub struct Deck<B: DeckBackend> {
    id: DeckId,
    backend: B,
    buffer: Option<B::Buffer>,
    active: Option<ActiveSource<B::Source>>,
    start_engine_time: f64,
    pause_offset: f64,
    rate: f32,
    loop_region: LoopRegion,
    channel: ChannelSettings,
    next_token: u64,
    ended_tx: Sender<SourceToken>,
    ended_rx: Receiver<SourceToken>,
}

impl<B: DeckBackend> Deck<B> {
    pub fn new(id: DeckId, backend: B) -> Self {
        let (ended_tx, ended_rx) = crossbeam_channel::unbounded();
        Self {
            id,
            backend,
            buffer: None,
            active: None,
            start_engine_time: 0.0,
            pause_offset: 0.0,
            rate: 1.0,
            loop_region: LoopRegion::default(),
            channel: ChannelSettings::default(),
            next_token: 0,
            ended_tx,
            ended_rx,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn buffer(&self) -> Option<&B::Buffer> {
        self.buffer.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn pause_offset(&self) -> f64 {
        self.pause_offset
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    pub fn channel(&self) -> &ChannelSettings {
        &self.channel
    }

    fn duration(&self) -> f64 {
        self.buffer.as_ref().map(|b| b.duration()).unwrap_or(0.0)
    }

    /// Attach a decoded buffer and rewind. A playing deck switches to the new
    /// buffer at offset 0 in one step.
    pub fn load(&mut self, buffer: B::Buffer) {
        self.poll_completions();
        let was_playing = self.is_playing();
        self.stop_active();
        log::info!(
            "[deck {}] loaded {:.2}s buffer",
            self.id.as_str(),
            buffer.duration()
        );
        self.buffer = Some(buffer);
        self.pause_offset = 0.0;
        if was_playing {
            self.start_source(0.0);
        }
    }

    pub fn play(&mut self) {
        self.poll_completions();
        if self.buffer.is_none() {
            log::debug!("[deck {}] play ignored: no buffer", self.id.as_str());
            return;
        }
        if self.is_playing() {
            return;
        }
        self.start_source(self.pause_offset);
    }

    pub fn pause(&mut self) {
        self.poll_completions();
        if !self.is_playing() {
            return;
        }
        let now = self.backend.current_time();
        let position = self.live_position(now);
        self.stop_active();
        self.pause_offset = position;
    }

    /// Pause and rewind to the top of the buffer.
    pub fn stop(&mut self) {
        self.poll_completions();
        self.stop_active();
        self.pause_offset = 0.0;
    }

    pub fn seek(&mut self, seconds: f64) {
        self.poll_completions();
        if self.buffer.is_none() {
            return;
        }
        let max = (self.duration() - DECK_SEEK_END_GUARD_SEC).max(0.0);
        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, max)
        };
        if self.is_playing() {
            self.stop_active();
            self.start_source(target);
        } else {
            self.pause_offset = target;
        }
    }

    /// Clamp and apply a playback rate; returns the effective rate.
    pub fn set_rate(&mut self, rate: f32) -> f32 {
        self.poll_completions();
        let rate = clamp_or(rate, DECK_RATE_MIN, DECK_RATE_MAX, 1.0);
        if self.active.is_some() {
            // Fold elapsed time at the old rate so the derived position stays continuous.
            let now = self.backend.current_time();
            self.pause_offset = self.live_position(now);
            self.start_engine_time = self.start_engine_time.max(now);
        }
        self.rate = rate;
        if let Some(active) = &self.active {
            self.backend
                .ramp_source_rate(&active.source, rate, RATE_SMOOTHING_TAU_SEC);
        }
        rate
    }

    /// Replace the loop bounds. A playing deck rebuilds its source at the
    /// current position so the new bounds apply immediately. Turning the loop
    /// off lets playback run on to the end of the buffer.
    pub fn set_loop(&mut self, enabled: bool, start_sec: f64, end_sec: f64) {
        self.poll_completions();
        let start_sec = if start_sec.is_nan() {
            0.0
        } else {
            start_sec.max(0.0)
        };
        let end_sec = if end_sec.is_nan() {
            start_sec + DECK_LOOP_MIN_LEN_SEC
        } else {
            end_sec.max(start_sec + DECK_LOOP_MIN_LEN_SEC)
        };
        let region = LoopRegion {
            enabled,
            start_sec,
            end_sec,
        };
        if self.is_playing() {
            let now = self.backend.current_time();
            let position = self.live_position(now);
            self.stop_active();
            self.loop_region = region;
            self.start_source(position);
        } else {
            self.loop_region = region;
        }
    }

    pub fn progress(&mut self) -> DeckProgress {
        self.poll_completions();
        if self.buffer.is_none() {
            return DeckProgress::default();
        }
        let now = self.backend.current_time();
        DeckProgress {
            position: self.live_position(now),
            duration: self.duration(),
            is_playing: self.is_playing(),
        }
    }

    pub fn set_eq(&mut self, highs_db: f32, mids_db: f32, lows_db: f32) {
        let c = &mut self.channel;
        c.eq_high_db = clamp_or(highs_db, EQ_GAIN_DB_MIN, EQ_GAIN_DB_MAX, 0.0);
        c.eq_mid_db = clamp_or(mids_db, EQ_GAIN_DB_MIN, EQ_GAIN_DB_MAX, 0.0);
        c.eq_low_db = clamp_or(lows_db, EQ_GAIN_DB_MIN, EQ_GAIN_DB_MAX, 0.0);
        let (high, mid, low) = (c.eq_high_db, c.eq_mid_db, c.eq_low_db);
        self.backend
            .ramp_param(ChannelParam::EqHigh, high, EQ_SMOOTHING_TAU_SEC);
        self.backend
            .ramp_param(ChannelParam::EqMid, mid, EQ_SMOOTHING_TAU_SEC);
        self.backend
            .ramp_param(ChannelParam::EqLow, low, EQ_SMOOTHING_TAU_SEC);
    }

    pub fn set_filter_freq(&mut self, hz: f32) {
        let hz = clamp_or(hz, FILTER_FREQ_MIN_HZ, FILTER_FREQ_MAX_HZ, FILTER_FREQ_MAX_HZ);
        self.channel.filter_hz = hz;
        self.backend
            .ramp_param(ChannelParam::FilterFreq, hz, EQ_SMOOTHING_TAU_SEC);
    }

    pub fn set_gain(&mut self, gain: f32) {
        let gain = clamp_or(gain, 0.0, 1.0, 1.0);
        self.channel.gain = gain;
        self.backend
            .ramp_param(ChannelParam::Gain, gain, GAIN_SMOOTHING_TAU_SEC);
    }

    pub fn set_pan(&mut self, pan: f32) {
        let pan = clamp_or(pan, -1.0, 1.0, 0.0);
        self.channel.pan = pan;
        self.backend
            .ramp_param(ChannelParam::Pan, pan, GAIN_SMOOTHING_TAU_SEC);
    }

    pub fn set_sends(&mut self, reverb: f32, delay: f32) {
        self.channel.send_reverb = clamp_or(reverb, 0.0, 1.0, 0.0);
        self.channel.send_delay = clamp_or(delay, 0.0, 1.0, 0.0);
        let (reverb, delay) = (self.channel.send_reverb, self.channel.send_delay);
        self.backend
            .ramp_param(ChannelParam::SendReverb, reverb, GAIN_SMOOTHING_TAU_SEC);
        self.backend
            .ramp_param(ChannelParam::SendDelay, delay, GAIN_SMOOTHING_TAU_SEC);
    }

    /// Crossfader contribution; kept on its own node so it never fights `set_gain`.
    pub fn set_crossfade_gain(&mut self, gain: f32) {
        let gain = clamp_or(gain, 0.0, 1.0, 1.0);
        self.channel.crossfade_gain = gain;
        self.backend
            .ramp_param(ChannelParam::Crossfade, gain, CROSSFADER_SMOOTHING_TAU_SEC);
    }

    /// Take gain, pan and send defaults from a track.
    pub fn apply_track(&mut self, track: &TrackMeta) {
        self.set_gain(track.gain);
        self.set_pan(track.pan);
        self.set_sends(track.send_a, track.send_b);
    }

    /// Stop any source and drop the buffer. The deck stays usable but empty.
    pub fn teardown(&mut self) {
        self.stop_active();
        self.buffer = None;
        self.pause_offset = 0.0;
    }

    /// Apply natural-end notices delivered by the backend.
    ///
    /// Notices for sources that were already replaced or stopped are stale and
    /// dropped.
    pub fn poll_completions(&mut self) {
        while let Ok(token) = self.ended_rx.try_recv() {
            let current = self.active.as_ref().map(|a| a.token);
            if current != Some(token) {
                log::trace!("[deck {}] stale end notice {:?}", self.id.as_str(), token);
                continue;
            }
            if let Some(active) = self.active.take() {
                self.backend.stop_source(active.source);
            }
            self.pause_offset = 0.0;
            log::debug!("[deck {}] reached end of track", self.id.as_str());
        }
    }

    fn live_position(&self, now: f64) -> f64 {
        let duration = self.duration();
        if self.active.is_none() {
            return self.pause_offset.clamp(0.0, duration);
        }
        let elapsed = (now - self.start_engine_time).max(0.0);
        let raw = self.pause_offset + elapsed * self.rate as f64;
        let position = match self.loop_region.effective(duration) {
            Some((start, end)) if raw >= end => start + (raw - start).rem_euclid(end - start),
            _ => raw,
        };
        position.clamp(0.0, duration)
    }

    fn start_source(&mut self, offset: f64) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        let now = self.backend.current_time();
        let when = now + DECK_START_DELAY_SEC;
        let token = SourceToken(self.next_token);
        self.next_token += 1;
        let request = SourceRequest {
            when,
            offset,
            rate: self.rate,
            loop_region: self.loop_region.effective(buffer.duration()),
        };
        let notifier = EndedNotifier {
            token,
            tx: self.ended_tx.clone(),
        };
        match self.backend.start_source(buffer, &request, notifier) {
            Some(source) => {
                self.active = Some(ActiveSource { token, source });
                self.start_engine_time = when;
                self.pause_offset = offset;
            }
            None => {
                log::warn!("[deck {}] runtime refused a new source", self.id.as_str());
                self.pause_offset = offset;
            }
        }
    }

    fn stop_active(&mut self) {
        if let Some(active) = self.active.take() {
            self.backend.stop_source(active.source);
        }
    }
}
