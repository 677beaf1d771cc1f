use super::constants::{
    DEFAULT_STEPS_PER_BEAT, DEFAULT_TEMPO_BPM, LOOKAHEAD_INTERVAL_MS, MIN_TEMPO_BPM,
    SCHEDULE_AHEAD_SEC, STEPS_PER_BAR, TRANSPORT_START_MARGIN_SEC,
};
use smallvec::SmallVec;
use std::cell::RefCell;

/// One step handed to the step callback.
///
/// Fields:
/// - `step`: grid index in `[loop_start, loop_end)`
/// - `time`: audio-clock time the step sounds at; sound must be scheduled for
///   this time, not for "now"
/// - `duration`: step length in seconds at the tempo in force when emitted
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepEvent {
    pub step: usize,
    pub time: f64,
    pub duration: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportStatus {
    Stopped,
    Running,
}

/// Lookahead window and wake-up period of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulerConfig {
    pub lookahead_interval_ms: i32,
    pub schedule_ahead_sec: f64,
    pub start_margin_sec: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_interval_ms: LOOKAHEAD_INTERVAL_MS,
            schedule_ahead_sec: SCHEDULE_AHEAD_SEC,
            start_margin_sec: TRANSPORT_START_MARGIN_SEC,
        }
    }
}

pub type StepCallback = Box<dyn FnMut(StepEvent)>;

/// Steps that fell due in one tick, in emission order.
pub type StepBatch = SmallVec<[StepEvent; 8]>;

/// A step callback lifted out of its slot for the duration of a dispatch.
pub struct LentCallback {
    callback: StepCallback,
    generation: u64,
}

/// Tempo clock driving the step sequencer with lookahead scheduling.
///
/// The transport never looks at a wall clock. Its owner calls [`Transport::tick`]
/// periodically with the current audio-clock time; every step whose event time
/// falls before `now + schedule_ahead_sec` is emitted, in order, through the
/// single step callback slot. A late tick therefore emits several steps at
/// once rather than skipping any.
///
/// Tempo and loop bounds are read on every emitted step, so changes apply from
/// the next step on.
pub struct Transport {
    tempo_bpm: f64,
    steps_per_beat: u32,
    loop_start: usize,
    loop_end: usize,
    current_step: usize,
    status: TransportStatus,
    next_event_time: f64,
    config: SchedulerConfig,
    on_step: Option<StepCallback>,
    on_step_generation: u64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Transport {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            tempo_bpm: DEFAULT_TEMPO_BPM,
            steps_per_beat: DEFAULT_STEPS_PER_BEAT,
            loop_start: 0,
            loop_end: STEPS_PER_BAR,
            current_step: 0,
            status: TransportStatus::Stopped,
            next_event_time: 0.0,
            config,
            on_step: None,
            on_step_generation: 0,
        }
    }

    pub fn status(&self) -> TransportStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == TransportStatus::Running
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn steps_per_beat(&self) -> u32 {
        self.steps_per_beat
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn loop_bounds(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    pub fn step_duration(&self) -> f64 {
        60.0 / self.tempo_bpm / self.steps_per_beat as f64
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.tempo_bpm = if bpm.is_finite() {
            bpm.max(MIN_TEMPO_BPM)
        } else {
            DEFAULT_TEMPO_BPM
        };
    }

    pub fn set_steps_per_beat(&mut self, steps: u32) {
        self.steps_per_beat = steps.max(1);
    }

    /// Set the step loop. `end` is pushed past `start` when needed, and the
    /// current step is wrapped into the new range.
    pub fn set_loop(&mut self, start: usize, end: usize) {
        let start = start.min(usize::MAX - 1);
        let end = end.max(start + 1);
        self.loop_start = start;
        self.loop_end = end;
        if self.current_step < start || self.current_step >= end {
            self.current_step = start + (self.current_step.saturating_sub(start)) % (end - start);
        }
    }

    /// Register the step callback. Only one slot exists; the last registration wins.
    pub fn set_on_step(&mut self, callback: impl FnMut(StepEvent) + 'static) {
        self.on_step = Some(Box::new(callback));
        self.on_step_generation += 1;
    }

    pub fn clear_on_step(&mut self) {
        self.on_step = None;
        self.on_step_generation += 1;
    }

    /// Take the step callback out of its slot so it can run without the
    /// transport borrowed.
    pub fn lend_on_step(&mut self) -> Option<LentCallback> {
        let callback = self.on_step.take()?;
        Some(LentCallback {
            callback,
            generation: self.on_step_generation,
        })
    }

    /// Put a lent callback back, unless the slot was set or cleared while it
    /// was out.
    pub fn return_on_step(&mut self, lent: LentCallback) {
        if lent.generation == self.on_step_generation {
            self.on_step = Some(lent.callback);
        }
    }

    /// Stopped -> Running. Idempotent while running. Returns whether the
    /// transport actually started.
    pub fn start(&mut self, now: f64) -> bool {
        if self.is_running() {
            return false;
        }
        self.status = TransportStatus::Running;
        self.next_event_time = now + self.config.start_margin_sec;
        log::debug!(
            "[transport] start at step {} ({:.1} bpm)",
            self.current_step,
            self.tempo_bpm
        );
        true
    }

    /// Running -> Stopped. The current step is kept so a restart resumes.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.status = TransportStatus::Stopped;
        log::debug!("[transport] stop at step {}", self.current_step);
    }

    /// Stop and rewind to the loop start.
    pub fn reset(&mut self) {
        self.status = TransportStatus::Stopped;
        self.current_step = self.loop_start;
    }

    /// Advance past every step due before `now + schedule_ahead_sec` and
    /// return them without running the callback.
    pub fn due_steps(&mut self, now: f64) -> StepBatch {
        let mut due = StepBatch::new();
        if !self.is_running() {
            return due;
        }
        let horizon = now + self.config.schedule_ahead_sec;
        while self.next_event_time < horizon {
            let duration = self.step_duration();
            due.push(StepEvent {
                step: self.current_step,
                time: self.next_event_time,
                duration,
            });
            self.advance(duration);
        }
        if due.len() > 1 {
            log::trace!("[transport] caught up {} steps at {now:.3}", due.len());
        }
        due
    }

    /// Emit every step due before `now + schedule_ahead_sec`. Returns how many
    /// steps were emitted.
    pub fn tick(&mut self, now: f64) -> usize {
        let due = self.due_steps(now);
        if let Some(mut lent) = self.lend_on_step() {
            for event in &due {
                (lent.callback)(*event);
            }
            self.return_on_step(lent);
        }
        due.len()
    }

    fn advance(&mut self, step_duration: f64) {
        let len = self.loop_end - self.loop_start;
        let relative = self.current_step.saturating_sub(self.loop_start);
        self.current_step = self.loop_start + (relative + 1) % len;
        self.next_event_time += step_duration;
    }
}

/// [`Transport::tick`] for a shared transport. The borrow is released before
/// the callback runs, so the callback may change tempo, loop or the callback
/// itself and see the real step and status.
pub fn tick_shared(transport: &RefCell<Transport>, now: f64) -> usize {
    let (due, lent) = match transport.try_borrow_mut() {
        Ok(mut t) => {
            let due = t.due_steps(now);
            let lent = if due.is_empty() { None } else { t.lend_on_step() };
            (due, lent)
        }
        Err(_) => {
            log::trace!("[transport] tick skipped, transport busy");
            return 0;
        }
    };
    if let Some(mut lent) = lent {
        for event in &due {
            (lent.callback)(*event);
        }
        if let Ok(mut t) = transport.try_borrow_mut() {
            t.return_on_step(lent);
        }
    }
    due.len()
}
