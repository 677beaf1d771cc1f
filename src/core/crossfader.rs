use super::constants::{CROSSFADER_CUT_DEAD_ZONE, CROSSFADER_EXP_EXPONENT};
use std::f32::consts::FRAC_PI_2;

/// Shape of the gain law between deck A and deck B.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CrossfaderCurve {
    #[default]
    Linear,
    /// Equal-power: `gain_a^2 + gain_b^2 == 1` everywhere.
    Power,
    Exponential,
    /// Hard switch with a small dead-zone around the centre.
    Cut,
}

impl CrossfaderCurve {
    /// Parse the curve names used by the UI. Unknown names return `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "power" => Some(Self::Power),
            "exp" | "exponential" => Some(Self::Exponential),
            "cut" => Some(Self::Cut),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Power => "power",
            Self::Exponential => "exponential",
            Self::Cut => "cut",
        }
    }
}

/// Tuning knobs for the non-linear curves.
///
/// - `exponent`: power applied by [`CrossfaderCurve::Exponential`]
/// - `cut_dead_zone`: half-width, in fader position units, of the centre band
///   where [`CrossfaderCurve::Cut`] plays both decks at half gain
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossfaderTuning {
    pub exponent: f32,
    pub cut_dead_zone: f32,
}

impl Default for CrossfaderTuning {
    fn default() -> Self {
        Self {
            exponent: CROSSFADER_EXP_EXPONENT,
            cut_dead_zone: CROSSFADER_CUT_DEAD_ZONE,
        }
    }
}

/// Map a fader position in \[-1, 1\] (-1 = full A) to `(gain_a, gain_b)`
/// using the default tuning.
pub fn compute_gains(position: f32, curve: CrossfaderCurve, reversed: bool) -> (f32, f32) {
    compute_gains_with(position, curve, reversed, &CrossfaderTuning::default())
}

pub fn compute_gains_with(
    position: f32,
    curve: CrossfaderCurve,
    reversed: bool,
    tuning: &CrossfaderTuning,
) -> (f32, f32) {
    let position = if position.is_nan() {
        0.0
    } else {
        position.clamp(-1.0, 1.0)
    };
    let mut t = (position + 1.0) / 2.0;
    if reversed {
        t = 1.0 - t;
    }
    match curve {
        CrossfaderCurve::Linear => (1.0 - t, t),
        CrossfaderCurve::Power => ((t * FRAC_PI_2).cos(), (t * FRAC_PI_2).sin()),
        CrossfaderCurve::Exponential => {
            let k = tuning.exponent;
            ((1.0 - t).powf(k), t.powf(k))
        }
        CrossfaderCurve::Cut => {
            // The band is measured on the raw position so it stays symmetric.
            if position.abs() < tuning.cut_dead_zone {
                (0.5, 0.5)
            } else if (position < 0.0) != reversed {
                (1.0, 0.0)
            } else {
                (0.0, 1.0)
            }
        }
    }
}

/// Crossfader control state. Pure: derives gains, holds nothing else.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Crossfader {
    pub position: f32,
    pub curve: CrossfaderCurve,
    /// "Hamster" mode: the fader direction is flipped.
    pub reversed: bool,
    pub tuning: CrossfaderTuning,
}

impl Crossfader {
    pub fn set(&mut self, position: f32, curve: CrossfaderCurve, reversed: bool) {
        self.position = if position.is_nan() {
            0.0
        } else {
            position.clamp(-1.0, 1.0)
        };
        self.curve = curve;
        self.reversed = reversed;
    }

    pub fn gains(&self) -> (f32, f32) {
        compute_gains_with(self.position, self.curve, self.reversed, &self.tuning)
    }
}
