use super::constants::{PIANO_ROLL_BASE_OCTAVE, PIANO_ROLL_OCTAVES, STEPS_PER_BAR};
use super::instruments::{midi_to_hz, InstrumentTable, InstrumentVoice};
use super::transport::StepEvent;
use fnv::FnvHashMap;
use smallvec::SmallVec;

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Display name such as `C#4` for a MIDI note number.
pub fn note_label(midi: u8) -> String {
    let octave = midi as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[midi as usize % 12], octave)
}

/// Pitch x step grid of on/off cells. Dimensions are fixed at construction.
#[derive(Clone, Debug)]
pub struct SequenceGrid {
    steps_per_bar: usize,
    rows: FnvHashMap<u8, Vec<bool>>,
    /// Pitches from highest to lowest, the order the piano roll draws them.
    pitches: Vec<u8>,
}

impl SequenceGrid {
    pub fn new(pitches: impl IntoIterator<Item = u8>, steps_per_bar: usize) -> Self {
        let steps_per_bar = steps_per_bar.max(1);
        let mut rows = FnvHashMap::default();
        let mut ordered: Vec<u8> = Vec::new();
        for pitch in pitches {
            if rows.insert(pitch, vec![false; steps_per_bar]).is_none() {
                ordered.push(pitch);
            }
        }
        ordered.sort_unstable_by(|a, b| b.cmp(a));
        Self {
            steps_per_bar,
            rows,
            pitches: ordered,
        }
    }

    /// Two octaves from octave 3, sixteen steps.
    pub fn piano_roll() -> Self {
        let lowest = 60 + (PIANO_ROLL_BASE_OCTAVE - 4) * 12;
        let highest = lowest + PIANO_ROLL_OCTAVES * 12;
        Self::new((lowest..highest).map(|m| m as u8), STEPS_PER_BAR)
    }

    pub fn steps_per_bar(&self) -> usize {
        self.steps_per_bar
    }

    pub fn pitches(&self) -> &[u8] {
        &self.pitches
    }

    /// Flip one cell and return its new value, or `None` outside the grid.
    pub fn toggle(&mut self, pitch: u8, step: usize) -> Option<bool> {
        let cell = self.rows.get_mut(&pitch)?.get_mut(step)?;
        *cell = !*cell;
        Some(*cell)
    }

    pub fn get_step(&self, pitch: u8, step: usize) -> bool {
        self.rows
            .get(&pitch)
            .and_then(|row| row.get(step))
            .copied()
            .unwrap_or(false)
    }

    pub fn row(&self, pitch: u8) -> Option<&[bool]> {
        self.rows.get(&pitch).map(Vec::as_slice)
    }

    /// Pitches with an active cell at `step`, highest first.
    pub fn active_at(&self, step: usize) -> SmallVec<[u8; 8]> {
        self.pitches
            .iter()
            .copied()
            .filter(|p| self.get_step(*p, step))
            .collect()
    }

    pub fn clear(&mut self) {
        for row in self.rows.values_mut() {
            row.iter_mut().for_each(|c| *c = false);
        }
    }
}

/// A note the sequencer wants sounded at `time` on the audio clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteTrigger {
    pub pitch: u8,
    pub frequency_hz: f32,
    pub time: f64,
    pub voice: InstrumentVoice,
}

/// Piano-roll sequencer: turns transport steps into note triggers.
#[derive(Clone, Debug)]
pub struct StepSequencer {
    grid: SequenceGrid,
    instruments: InstrumentTable,
    selected: String,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new(SequenceGrid::piano_roll(), InstrumentTable::piano_roll(), "Piano")
    }
}

impl StepSequencer {
    pub fn new(grid: SequenceGrid, instruments: InstrumentTable, selected: &str) -> Self {
        Self {
            grid,
            instruments,
            selected: selected.to_string(),
        }
    }

    pub fn grid(&self) -> &SequenceGrid {
        &self.grid
    }

    pub fn instruments(&self) -> &InstrumentTable {
        &self.instruments
    }

    pub fn selected_instrument(&self) -> &str {
        &self.selected
    }

    /// Select by name. Unknown names are kept and sound with the fallback voice.
    pub fn select_instrument(&mut self, name: &str) {
        if !self.instruments.contains(name) {
            log::debug!("[sequencer] unknown instrument {name:?}, using default voice");
        }
        self.selected = name.to_string();
    }

    pub fn toggle(&mut self, pitch: u8, step: usize) -> Option<bool> {
        self.grid.toggle(pitch, step)
    }

    pub fn get_step(&self, pitch: u8, step: usize) -> bool {
        self.grid.get_step(pitch, step)
    }

    pub fn clear(&mut self) {
        self.grid.clear();
    }

    /// Collect the notes for one transport step. Steps past the grid width
    /// wrap around it.
    pub fn on_step(&self, event: StepEvent, out: &mut Vec<NoteTrigger>) {
        let step = event.step % self.grid.steps_per_bar();
        let voice = *self.instruments.lookup(&self.selected);
        for pitch in self.grid.active_at(step) {
            out.push(NoteTrigger {
                pitch,
                frequency_hz: midi_to_hz(pitch as f32),
                time: event.time,
                voice,
            });
        }
    }
}
