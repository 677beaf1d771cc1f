use super::constants::{
    AUTO_TUNE_BASE_HZ, AUTO_TUNE_MIN_DELAY_SEC, DYNAMICS_TIME_FLOOR_SEC, LIMITER_LOOKAHEAD_MAX_SEC,
};
use smallvec::SmallVec;

/// Master-bus parameters reachable through the `configure_*` calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynamicsParam {
    CompressorThreshold,
    CompressorRatio,
    CompressorAttack,
    CompressorRelease,
    LimiterThreshold,
    LimiterRelease,
    LimiterLookahead,
    AutoTuneWet,
    AutoTuneDelay,
    AutoTuneFrequency,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamTarget {
    pub param: DynamicsParam,
    pub value: f32,
}

pub type ParamTargets = SmallVec<[ParamTarget; 4]>;

fn target(param: DynamicsParam, value: f32) -> ParamTarget {
    ParamTarget { param, value }
}

/// Partial compressor configuration; only supplied fields change.
/// `enabled: Some(false)` forces a 1:1 ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: Option<f32>,
    pub ratio: Option<f32>,
    pub attack_sec: Option<f32>,
    pub release_sec: Option<f32>,
    pub enabled: Option<bool>,
}

impl CompressorSettings {
    pub fn targets(&self) -> ParamTargets {
        let active = self.enabled != Some(false);
        let mut out = ParamTargets::new();
        if let Some(threshold) = self.threshold_db {
            out.push(target(DynamicsParam::CompressorThreshold, threshold));
        }
        match self.ratio {
            Some(ratio) => out.push(target(
                DynamicsParam::CompressorRatio,
                if active { ratio } else { 1.0 },
            )),
            None if !active => out.push(target(DynamicsParam::CompressorRatio, 1.0)),
            None => {}
        }
        if let Some(attack) = self.attack_sec {
            out.push(target(
                DynamicsParam::CompressorAttack,
                attack.max(DYNAMICS_TIME_FLOOR_SEC),
            ));
        }
        if let Some(release) = self.release_sec {
            out.push(target(
                DynamicsParam::CompressorRelease,
                release.max(DYNAMICS_TIME_FLOOR_SEC),
            ));
        }
        out
    }
}

/// Partial limiter configuration. Disabling raises the threshold to 0 dBFS.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LimiterSettings {
    pub ceiling_db: Option<f32>,
    pub lookahead_sec: Option<f32>,
    pub release_sec: Option<f32>,
    pub enabled: Option<bool>,
}

impl LimiterSettings {
    pub fn targets(&self) -> ParamTargets {
        let active = self.enabled != Some(false);
        let mut out = ParamTargets::new();
        match self.ceiling_db {
            Some(ceiling) => out.push(target(
                DynamicsParam::LimiterThreshold,
                if active { ceiling } else { 0.0 },
            )),
            None if !active => out.push(target(DynamicsParam::LimiterThreshold, 0.0)),
            None => {}
        }
        if let Some(release) = self.release_sec {
            out.push(target(
                DynamicsParam::LimiterRelease,
                release.max(DYNAMICS_TIME_FLOOR_SEC),
            ));
        }
        if let Some(lookahead) = self.lookahead_sec {
            out.push(target(
                DynamicsParam::LimiterLookahead,
                lookahead.clamp(0.0, LIMITER_LOOKAHEAD_MAX_SEC),
            ));
        }
        out
    }
}

/// Partial settings for the parallel "auto-tune" coloration bus.
///
/// - `mix`: wet level 0..1
/// - `retune`: 0..100, higher is a shorter delay
/// - `humanize`: 0..100, also drives the wet level
/// - `formant`: semitones around 440 Hz for the band-pass centre
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AutoTuneSettings {
    pub mix: Option<f32>,
    pub retune: Option<f32>,
    pub humanize: Option<f32>,
    pub formant: Option<f32>,
    pub enabled: Option<bool>,
}

impl AutoTuneSettings {
    pub fn targets(&self) -> ParamTargets {
        let active = self.enabled != Some(false);
        let mut out = ParamTargets::new();
        match self.mix {
            Some(mix) => out.push(target(
                DynamicsParam::AutoTuneWet,
                if active { mix } else { 0.0 },
            )),
            None if !active => out.push(target(DynamicsParam::AutoTuneWet, 0.0)),
            None => {}
        }
        if let Some(retune) = self.retune {
            let delay = ((100.0 - retune) / 5000.0).max(AUTO_TUNE_MIN_DELAY_SEC);
            out.push(target(DynamicsParam::AutoTuneDelay, delay));
        }
        if let Some(humanize) = self.humanize {
            let wet = (humanize / 100.0).clamp(0.0, 1.0);
            out.push(target(
                DynamicsParam::AutoTuneWet,
                if active { wet } else { 0.0 },
            ));
        }
        if let Some(formant) = self.formant {
            let centre = AUTO_TUNE_BASE_HZ * 2.0_f32.powf(formant / 12.0);
            out.push(target(DynamicsParam::AutoTuneFrequency, centre));
        }
        out
    }
}
