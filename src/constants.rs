// Default node values for the master bus, FX buses and deck channel strips.

// Master
pub const MASTER_GAIN: f32 = 0.9;

// Bus compressor
pub const COMPRESSOR_THRESHOLD_DB: f32 = -18.0;
pub const COMPRESSOR_RATIO: f32 = 3.0;
pub const COMPRESSOR_ATTACK_SEC: f32 = 0.003;
pub const COMPRESSOR_RELEASE_SEC: f32 = 0.2;

// Brickwall-ish limiter behind a short lookahead delay
pub const LIMITER_THRESHOLD_DB: f32 = -1.0;
pub const LIMITER_KNEE_DB: f32 = 0.0;
pub const LIMITER_RATIO: f32 = 20.0;
pub const LIMITER_ATTACK_SEC: f32 = 0.001;
pub const LIMITER_RELEASE_SEC: f32 = 0.08;
pub const LIMITER_LOOKAHEAD_SEC: f32 = 0.004;

// Parallel auto-tune coloration bus (starts silent)
pub const AUTO_TUNE_DELAY_SEC: f32 = 0.02;
pub const AUTO_TUNE_MAX_DELAY_SEC: f64 = 0.1;
pub const AUTO_TUNE_Q: f32 = 5.0;

// Reverb: procedurally generated decaying stereo noise
pub const REVERB_IR_SECONDS: f32 = 1.2;
pub const REVERB_IR_SEED: u64 = 0x1234_ABCD_7890_FEDC;
pub const REVERB_WET: f32 = 0.15;

// Feedback delay
pub const DELAY_MAX_SEC: f64 = 5.0;
pub const DELAY_TIME_SEC: f32 = 0.25; // quarter note-ish
pub const DELAY_FEEDBACK: f32 = 0.3;
pub const DELAY_WET: f32 = 0.2;

// Deck EQ corner frequencies
pub const EQ_LOW_SHELF_HZ: f32 = 120.0;
pub const EQ_MID_PEAK_HZ: f32 = 1000.0;
pub const EQ_MID_Q: f32 = 1.0;
pub const EQ_HIGH_SHELF_HZ: f32 = 8000.0;

// Sequencer voice bus
pub const SEQUENCER_BUS_GAIN: f32 = 0.5;

// Analyser
pub const ANALYSER_FFT_SIZE: u32 = 2048;

// Recording
pub const DEFAULT_RECORDING_MIME: &str = "audio/webm;codecs=opus";
pub const OFFLINE_RENDER_CHANNELS: u32 = 2;
