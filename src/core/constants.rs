// Audio-clock tuning shared by the decks, mixer and transport.
// All times are seconds on the audio clock unless the name says otherwise.

// Deck playback
pub const DECK_START_DELAY_SEC: f64 = 0.005; // avoids "start in the past" on some clocks
pub const DECK_RATE_MIN: f32 = 0.5;
pub const DECK_RATE_MAX: f32 = 1.5;
pub const DECK_LOOP_MIN_LEN_SEC: f64 = 0.01;
pub const DECK_SEEK_END_GUARD_SEC: f64 = 0.001;

// Channel strip ranges
pub const EQ_GAIN_DB_MIN: f32 = -12.0;
pub const EQ_GAIN_DB_MAX: f32 = 12.0;
pub const FILTER_FREQ_MIN_HZ: f32 = 20.0;
pub const FILTER_FREQ_MAX_HZ: f32 = 20_000.0;

// Smoothing time constants for setTargetAtTime-style ramps
pub const RATE_SMOOTHING_TAU_SEC: f64 = 0.01;
pub const EQ_SMOOTHING_TAU_SEC: f64 = 0.02;
pub const GAIN_SMOOTHING_TAU_SEC: f64 = 0.01;
pub const CROSSFADER_SMOOTHING_TAU_SEC: f64 = 0.005;
pub const DYNAMICS_SMOOTHING_TAU_SEC: f64 = 0.01;

// Crossfader curve tuning
pub const CROSSFADER_EXP_EXPONENT: f32 = 2.2;
pub const CROSSFADER_CUT_DEAD_ZONE: f32 = 0.05;

// Lookahead scheduler
pub const LOOKAHEAD_INTERVAL_MS: i32 = 100; // how often the scheduler wakes up
pub const SCHEDULE_AHEAD_SEC: f64 = 0.2; // how far ahead of the clock steps are emitted
pub const TRANSPORT_START_MARGIN_SEC: f64 = 0.05;

// Transport defaults
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;
pub const MIN_TEMPO_BPM: f64 = 1.0;
pub const DEFAULT_STEPS_PER_BEAT: u32 = 4; // sixteenth notes
pub const STEPS_PER_BAR: usize = 16;

// Piano roll layout
pub const PIANO_ROLL_BASE_OCTAVE: i32 = 3;
pub const PIANO_ROLL_OCTAVES: i32 = 2;

// Sequencer voices
pub const SEQUENCER_VOICE_STOP_SEC: f64 = 1.5;
pub const ENVELOPE_FLOOR: f32 = 0.0001; // exponential ramps cannot reach zero

// Dynamics
pub const LIMITER_LOOKAHEAD_MAX_SEC: f32 = 0.01;
pub const DYNAMICS_TIME_FLOOR_SEC: f32 = 0.0001;
pub const AUTO_TUNE_BASE_HZ: f32 = 440.0;
pub const AUTO_TUNE_MIN_DELAY_SEC: f32 = 0.001;

// Synth tail after the envelope release starts
pub const SYNTH_STOP_TAIL_SEC: f64 = 2.0;
