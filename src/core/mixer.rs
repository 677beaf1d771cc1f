use super::crossfader::{Crossfader, CrossfaderCurve};
use super::deck::{Deck, DeckBackend, DeckId, DeckProgress};

/// Two decks blended by a crossfader.
///
/// Every crossfader change is pushed to both decks' crossfade gain nodes as a
/// short smoothed ramp.
pub struct Mixer<B: DeckBackend> {
    decks: [Deck<B>; 2],
    crossfader: Crossfader,
}

impl<B: DeckBackend> Mixer<B> {
    pub fn new(backend_a: B, backend_b: B) -> Self {
        let mut mixer = Self {
            decks: [Deck::new(DeckId::A, backend_a), Deck::new(DeckId::B, backend_b)],
            crossfader: Crossfader::default(),
        };
        mixer.apply_crossfader();
        mixer
    }

    pub fn deck(&self, id: DeckId) -> &Deck<B> {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck<B> {
        &mut self.decks[id.index()]
    }

    pub fn crossfader(&self) -> &Crossfader {
        &self.crossfader
    }

    pub fn crossfader_mut(&mut self) -> &mut Crossfader {
        &mut self.crossfader
    }

    pub fn set_crossfader(&mut self, position: f32, curve: CrossfaderCurve, reversed: bool) {
        self.crossfader.set(position, curve, reversed);
        self.apply_crossfader();
    }

    pub fn progress(&mut self, id: DeckId) -> DeckProgress {
        self.deck_mut(id).progress()
    }

    /// Stop both decks and release their buffers.
    pub fn teardown(&mut self) {
        for deck in &mut self.decks {
            deck.teardown();
        }
    }

    fn apply_crossfader(&mut self) {
        let (gain_a, gain_b) = self.crossfader.gains();
        self.decks[0].set_crossfade_gain(gain_a);
        self.decks[1].set_crossfade_gain(gain_b);
    }
}
