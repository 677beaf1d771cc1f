use fnv::FnvHashMap;

/// Descriptive metadata for a mixer track. Owned by the caller; decks and the
/// sequencer only read it for gain-staging defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackMeta {
    pub id: u32,
    pub name: String,
    pub instrument_id: String,
    pub gain: f32,
    pub pan: f32,
    /// Reverb send level.
    pub send_a: f32,
    /// Delay send level.
    pub send_b: f32,
}

impl TrackMeta {
    pub fn new(id: u32, name: impl Into<String>, instrument_id: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            instrument_id: instrument_id.into(),
            gain: 1.0,
            pan: 0.0,
            send_a: 0.0,
            send_b: 0.0,
        }
    }
}

/// Partial update for a [`TrackMeta`]; `None` fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct TrackPatch {
    pub name: Option<String>,
    pub instrument_id: Option<String>,
    pub gain: Option<f32>,
    pub pan: Option<f32>,
    pub send_a: Option<f32>,
    pub send_b: Option<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct TrackTable {
    tracks: FnvHashMap<u32, TrackMeta>,
}

impl TrackTable {
    /// Insert or replace the track with `track.id`.
    pub fn ensure(&mut self, track: TrackMeta) {
        self.tracks.insert(track.id, track);
    }

    /// Apply `patch` to an existing track. Unknown ids are ignored.
    pub fn update(&mut self, id: u32, patch: TrackPatch) -> bool {
        let Some(track) = self.tracks.get_mut(&id) else {
            log::debug!("[tracks] update for unknown track {id} ignored");
            return false;
        };
        if let Some(name) = patch.name {
            track.name = name;
        }
        if let Some(instrument_id) = patch.instrument_id {
            track.instrument_id = instrument_id;
        }
        if let Some(gain) = patch.gain {
            track.gain = gain;
        }
        if let Some(pan) = patch.pan {
            track.pan = pan;
        }
        if let Some(send_a) = patch.send_a {
            track.send_a = send_a;
        }
        if let Some(send_b) = patch.send_b {
            track.send_b = send_b;
        }
        true
    }

    pub fn get(&self, id: u32) -> Option<&TrackMeta> {
        self.tracks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
