use super::constants::{ENVELOPE_FLOOR, SEQUENCER_VOICE_STOP_SEC, SYNTH_STOP_TAIL_SEC};
use fnv::FnvHashMap;
use smallvec::SmallVec;

/// Basic oscillator shape used by the synthesized voices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
    Triangle,
}

impl Waveform {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sine" => Some(Self::Sine),
            "square" => Some(Self::Square),
            "saw" | "sawtooth" => Some(Self::Saw),
            "triangle" => Some(Self::Triangle),
            _ => None,
        }
    }
}

/// Gain envelope of a voice, relative to the note's event time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Envelope {
    /// Jump to `peak`, then decay exponentially to silence over `decay_sec`.
    Pluck { peak: f32, decay_sec: f64 },
    /// Jump to `peak`, then fall linearly to `floor` over `decay_sec`.
    Fade { peak: f32, floor: f32, decay_sec: f64 },
    /// Attack/decay/sustain/release around a held note.
    Adsr {
        attack_sec: f64,
        decay_sec: f64,
        sustain: f32,
        release_sec: f64,
    },
}

/// One step of parameter automation, in absolute audio-clock time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Automation {
    SetValue { value: f32, at: f64 },
    LinearRamp { value: f32, at: f64 },
    ExponentialRamp { value: f32, at: f64 },
    Target { value: f32, at: f64, time_constant: f64 },
}

impl Automation {
    pub fn at(&self) -> f64 {
        match *self {
            Automation::SetValue { at, .. }
            | Automation::LinearRamp { at, .. }
            | Automation::ExponentialRamp { at, .. }
            | Automation::Target { at, .. } => at,
        }
    }
}

pub type AutomationPlan = SmallVec<[Automation; 4]>;

impl Envelope {
    /// Gain automation for a note starting at `when`, scaled by `level`.
    /// `hold_sec` is only used by [`Envelope::Adsr`].
    pub fn plan(&self, when: f64, level: f32, hold_sec: f64) -> AutomationPlan {
        let mut plan = AutomationPlan::new();
        match *self {
            Envelope::Pluck { peak, decay_sec } => {
                plan.push(Automation::SetValue {
                    value: peak * level,
                    at: when,
                });
                plan.push(Automation::ExponentialRamp {
                    value: ENVELOPE_FLOOR,
                    at: when + decay_sec,
                });
            }
            Envelope::Fade {
                peak,
                floor,
                decay_sec,
            } => {
                plan.push(Automation::SetValue {
                    value: peak * level,
                    at: when,
                });
                plan.push(Automation::LinearRamp {
                    value: floor * level,
                    at: when + decay_sec,
                });
            }
            Envelope::Adsr {
                attack_sec,
                decay_sec,
                sustain,
                release_sec,
            } => {
                plan.push(Automation::SetValue {
                    value: 0.0,
                    at: when,
                });
                plan.push(Automation::LinearRamp {
                    value: level,
                    at: when + attack_sec,
                });
                plan.push(Automation::LinearRamp {
                    value: level * sustain,
                    at: when + attack_sec + decay_sec,
                });
                plan.push(Automation::Target {
                    value: 0.0,
                    at: when + hold_sec,
                    time_constant: release_sec.max(ENVELOPE_FLOOR as f64),
                });
            }
        }
        plan
    }
}

/// Oscillator shape plus envelope: everything needed to sound one note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstrumentVoice {
    pub waveform: Waveform,
    pub envelope: Envelope,
    /// Seconds after the event time at which the oscillator is stopped.
    pub stop_after_sec: f64,
}

impl InstrumentVoice {
    pub const fn pluck(waveform: Waveform, peak: f32, decay_sec: f64) -> Self {
        Self {
            waveform,
            envelope: Envelope::Pluck { peak, decay_sec },
            stop_after_sec: SEQUENCER_VOICE_STOP_SEC,
        }
    }
}

/// Voice used for unknown instrument names.
pub const DEFAULT_VOICE: InstrumentVoice = InstrumentVoice::pluck(Waveform::Sine, 0.3, 0.5);

/// Lookup table from instrument name to voice, with an explicit fallback.
#[derive(Clone, Debug)]
pub struct InstrumentTable {
    voices: FnvHashMap<String, InstrumentVoice>,
    order: Vec<String>,
    fallback: InstrumentVoice,
}

impl InstrumentTable {
    pub fn new(fallback: InstrumentVoice) -> Self {
        Self {
            voices: FnvHashMap::default(),
            order: Vec::new(),
            fallback,
        }
    }

    /// The piano-roll instrument set.
    pub fn piano_roll() -> Self {
        let mut table = Self::new(DEFAULT_VOICE);
        table.insert("Guitar", InstrumentVoice::pluck(Waveform::Saw, 0.3, 0.8));
        table.insert("Orchestra", InstrumentVoice::pluck(Waveform::Square, 0.2, 1.2));
        table.insert("Piano", InstrumentVoice::pluck(Waveform::Triangle, 0.4, 0.5));
        table.insert("808s", InstrumentVoice::pluck(Waveform::Sine, 0.5, 0.3));
        table.insert(
            "Percussion",
            InstrumentVoice::pluck(Waveform::Triangle, 0.1, 0.1),
        );
        table.insert("Snare", InstrumentVoice::pluck(Waveform::Square, 0.2, 0.2));
        table.insert(
            "Synth",
            InstrumentVoice {
                waveform: Waveform::Saw,
                envelope: Envelope::Fade {
                    peak: 0.3,
                    floor: 0.1,
                    decay_sec: 0.7,
                },
                stop_after_sec: SEQUENCER_VOICE_STOP_SEC,
            },
        );
        table.insert(
            "High Hats",
            InstrumentVoice::pluck(Waveform::Square, 0.05, 0.05),
        );
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, voice: InstrumentVoice) {
        let name = name.into();
        if self.voices.insert(name.clone(), voice).is_none() {
            self.order.push(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.voices.contains_key(name)
    }

    /// Voice for `name`, or the fallback voice.
    pub fn lookup(&self, name: &str) -> &InstrumentVoice {
        self.voices.get(name).unwrap_or(&self.fallback)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Free-form synth patch for one-shot notes outside the sequencer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SynthParams {
    pub waveform: Waveform,
    pub attack_sec: f64,
    pub decay_sec: f64,
    pub sustain: f32,
    pub release_sec: f64,
    pub cutoff_hz: f32,
    pub q: f32,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Saw,
            attack_sec: 0.005,
            decay_sec: 0.08,
            sustain: 0.7,
            release_sec: 0.15,
            cutoff_hz: 8000.0,
            q: 0.707,
        }
    }
}

impl SynthParams {
    pub fn envelope(&self) -> Envelope {
        Envelope::Adsr {
            attack_sec: self.attack_sec,
            decay_sec: self.decay_sec,
            sustain: self.sustain,
            release_sec: self.release_sec,
        }
    }

    /// Audio-clock time at which a note of `duration_sec` starting at `when`
    /// can be stopped without cutting the release.
    pub fn stop_time(when: f64, duration_sec: f64) -> f64 {
        when + duration_sec + SYNTH_STOP_TAIL_SEC
    }
}

pub fn midi_to_hz(midi: f32) -> f32 {
    440.0 * (2.0_f32).powf((midi - 69.0) / 12.0)
}
