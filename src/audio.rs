use crate::constants::*;
use crate::core::constants::{DYNAMICS_SMOOTHING_TAU_SEC, GAIN_SMOOTHING_TAU_SEC};
use crate::core::{ChannelParam, DeckId, DynamicsParam, EngineError, ParamTarget};
use rand::prelude::*;
use std::cell::RefCell;
use web_sys as web;

/// Master bus: master gain -> compressor -> lookahead delay -> limiter ->
/// analyser -> destination, with reverb/delay returns summed before the
/// compressor and the auto-tune bus tapped post-compressor into the limiter.
pub struct MasterBus {
    pub master_gain: web::GainNode,
    pub compressor: web::DynamicsCompressorNode,
    pub limiter_lookahead: web::DelayNode,
    pub limiter: web::DynamicsCompressorNode,
    pub analyser: web::AnalyserNode,
    pub auto_tune_delay: web::DelayNode,
    pub auto_tune_filter: web::BiquadFilterNode,
    pub auto_tune_wet: web::GainNode,
    pub reverb: web::ConvolverNode,
    pub reverb_wet: web::GainNode,
    pub delay: web::DelayNode,
    pub delay_feedback: web::GainNode,
    pub delay_wet: web::GainNode,
}

/// Per-deck chain: source -> low shelf -> mid peak -> high shelf -> low-pass ->
/// pre -> gain -> crossfade -> pan -> master, with sends tapped at `pre`.
#[derive(Clone)]
pub struct DeckNodes {
    pub eq_low: web::BiquadFilterNode,
    pub eq_mid: web::BiquadFilterNode,
    pub eq_high: web::BiquadFilterNode,
    pub filter: web::BiquadFilterNode,
    pub pre: web::GainNode,
    pub gain: web::GainNode,
    pub crossfade: web::GainNode,
    pub pan: web::StereoPannerNode,
    pub send_reverb: web::GainNode,
    pub send_delay: web::GainNode,
}

impl DeckNodes {
    /// Where deck sources connect.
    pub fn input(&self) -> &web::AudioNode {
        &self.eq_low
    }

    pub fn param(&self, param: ChannelParam) -> web::AudioParam {
        match param {
            ChannelParam::EqLow => self.eq_low.gain(),
            ChannelParam::EqMid => self.eq_mid.gain(),
            ChannelParam::EqHigh => self.eq_high.gain(),
            ChannelParam::FilterFreq => self.filter.frequency(),
            ChannelParam::Gain => self.gain.gain(),
            ChannelParam::Crossfade => self.crossfade.gain(),
            ChannelParam::Pan => self.pan.pan(),
            ChannelParam::SendReverb => self.send_reverb.gain(),
            ChannelParam::SendDelay => self.send_delay.gain(),
        }
    }
}

fn graph_err(label: &str, e: wasm_bindgen::JsValue) -> EngineError {
    log::error!("{} error: {:?}", label, e);
    EngineError::Graph(format!("{label}: {e:?}"))
}

pub(crate) fn create_gain(
    ctx: &web::BaseAudioContext,
    value: f32,
    label: &str,
) -> Result<web::GainNode, EngineError> {
    let g = web::GainNode::new(ctx).map_err(|e| graph_err(label, e))?;
    g.gain().set_value(value);
    Ok(g)
}

fn create_filter(
    ctx: &web::BaseAudioContext,
    kind: web::BiquadFilterType,
    freq: f32,
    label: &str,
) -> Result<web::BiquadFilterNode, EngineError> {
    let f = web::BiquadFilterNode::new(ctx).map_err(|e| graph_err(label, e))?;
    f.set_type(kind);
    f.frequency().set_value(freq);
    Ok(f)
}

/// Smoothed move towards `value`, anchored at `now`. Later calls retarget the
/// same parameter, so the most recent value always wins.
pub fn ramp(param: &web::AudioParam, value: f32, now: f64, time_constant: f64) {
    if let Err(e) = param.set_target_at_time(value, now, time_constant) {
        log::trace!("set_target_at_time rejected: {:?}", e);
    }
}

/// Stereo decaying-noise impulse response for the reverb convolver.
fn build_impulse(ctx: &web::BaseAudioContext) -> Option<web::AudioBuffer> {
    let sr = ctx.sample_rate();
    let len = (sr * REVERB_IR_SECONDS) as u32;
    let ir = ctx.create_buffer(2, len.max(1), sr).ok()?;
    let mut rng = StdRng::seed_from_u64(REVERB_IR_SEED);
    for ch in 0..2 {
        let mut buf: Vec<f32> = vec![0.0; len as usize];
        for (i, v) in buf.iter_mut().enumerate() {
            let n: f32 = rng.gen_range(-1.0..1.0);
            let remaining = 1.0 - i as f32 / len as f32;
            *v = n * remaining * remaining; // quick decay
        }
        _ = ir.copy_to_channel(&mut buf, ch);
    }
    Some(ir)
}

pub fn build_master_bus(ctx: &web::BaseAudioContext) -> Result<MasterBus, EngineError> {
    let master_gain = create_gain(ctx, MASTER_GAIN, "Master")?;

    let compressor =
        web::DynamicsCompressorNode::new(ctx).map_err(|e| graph_err("Compressor", e))?;
    compressor.threshold().set_value(COMPRESSOR_THRESHOLD_DB);
    compressor.ratio().set_value(COMPRESSOR_RATIO);
    compressor.attack().set_value(COMPRESSOR_ATTACK_SEC);
    compressor.release().set_value(COMPRESSOR_RELEASE_SEC);

    let limiter = web::DynamicsCompressorNode::new(ctx).map_err(|e| graph_err("Limiter", e))?;
    limiter.threshold().set_value(LIMITER_THRESHOLD_DB);
    limiter.knee().set_value(LIMITER_KNEE_DB);
    limiter.ratio().set_value(LIMITER_RATIO);
    limiter.attack().set_value(LIMITER_ATTACK_SEC);
    limiter.release().set_value(LIMITER_RELEASE_SEC);

    let limiter_lookahead = ctx
        .create_delay_with_max_delay_time(crate::core::constants::LIMITER_LOOKAHEAD_MAX_SEC as f64)
        .map_err(|e| graph_err("Limiter lookahead", e))?;
    limiter_lookahead.delay_time().set_value(LIMITER_LOOKAHEAD_SEC);

    let auto_tune_delay = ctx
        .create_delay_with_max_delay_time(AUTO_TUNE_MAX_DELAY_SEC)
        .map_err(|e| graph_err("Auto-tune delay", e))?;
    auto_tune_delay.delay_time().set_value(AUTO_TUNE_DELAY_SEC);
    let auto_tune_filter = create_filter(
        ctx,
        web::BiquadFilterType::Bandpass,
        crate::core::constants::AUTO_TUNE_BASE_HZ,
        "Auto-tune filter",
    )?;
    auto_tune_filter.q().set_value(AUTO_TUNE_Q);
    let auto_tune_wet = create_gain(ctx, 0.0, "Auto-tune wet")?;

    let analyser = web::AnalyserNode::new(ctx).map_err(|e| graph_err("Analyser", e))?;
    analyser.set_fft_size(ANALYSER_FFT_SIZE);

    // Reverb bus
    let reverb = web::ConvolverNode::new(ctx).map_err(|e| graph_err("Convolver", e))?;
    reverb.set_normalize(true);
    match build_impulse(ctx) {
        Some(ir) => reverb.set_buffer(Some(&ir)),
        None => log::warn!("reverb impulse unavailable, reverb bus stays dry"),
    }
    let reverb_wet = create_gain(ctx, REVERB_WET, "Reverb wet")?;

    // Delay bus with feedback loop
    let delay = ctx
        .create_delay_with_max_delay_time(DELAY_MAX_SEC)
        .map_err(|e| graph_err("Delay", e))?;
    delay.delay_time().set_value(DELAY_TIME_SEC);
    let delay_feedback = create_gain(ctx, DELAY_FEEDBACK, "Delay feedback")?;
    let delay_wet = create_gain(ctx, DELAY_WET, "Delay wet")?;

    _ = delay.connect_with_audio_node(&delay_feedback);
    _ = delay_feedback.connect_with_audio_node(&delay);
    _ = delay.connect_with_audio_node(&delay_wet);
    _ = reverb.connect_with_audio_node(&reverb_wet);

    // Returns and master sum into the compressor
    _ = reverb_wet.connect_with_audio_node(&compressor);
    _ = delay_wet.connect_with_audio_node(&compressor);
    _ = master_gain.connect_with_audio_node(&compressor);

    // Dynamics chain
    _ = compressor.connect_with_audio_node(&limiter_lookahead);
    _ = limiter_lookahead.connect_with_audio_node(&limiter);
    _ = limiter.connect_with_audio_node(&analyser);
    _ = analyser.connect_with_audio_node(&ctx.destination());

    // Parallel auto-tune bus: post-compressor, back in before the limiter
    _ = compressor.connect_with_audio_node(&auto_tune_delay);
    _ = auto_tune_delay.connect_with_audio_node(&auto_tune_filter);
    _ = auto_tune_filter.connect_with_audio_node(&auto_tune_wet);
    _ = auto_tune_wet.connect_with_audio_node(&limiter);

    Ok(MasterBus {
        master_gain,
        compressor,
        limiter_lookahead,
        limiter,
        analyser,
        auto_tune_delay,
        auto_tune_filter,
        auto_tune_wet,
        reverb,
        reverb_wet,
        delay,
        delay_feedback,
        delay_wet,
    })
}

pub fn build_deck_chain(
    ctx: &web::BaseAudioContext,
    bus: &MasterBus,
) -> Result<DeckNodes, EngineError> {
    let eq_low = create_filter(ctx, web::BiquadFilterType::Lowshelf, EQ_LOW_SHELF_HZ, "EQ low")?;
    let eq_mid = create_filter(ctx, web::BiquadFilterType::Peaking, EQ_MID_PEAK_HZ, "EQ mid")?;
    eq_mid.q().set_value(EQ_MID_Q);
    let eq_high =
        create_filter(ctx, web::BiquadFilterType::Highshelf, EQ_HIGH_SHELF_HZ, "EQ high")?;
    let filter = create_filter(
        ctx,
        web::BiquadFilterType::Lowpass,
        crate::core::constants::FILTER_FREQ_MAX_HZ,
        "Deck filter",
    )?;
    let pre = create_gain(ctx, 1.0, "Deck pre")?;
    let gain = create_gain(ctx, 1.0, "Deck gain")?;
    let crossfade = create_gain(ctx, 1.0, "Deck crossfade")?;
    let pan = web::StereoPannerNode::new(ctx).map_err(|e| graph_err("Deck pan", e))?;
    let send_reverb = create_gain(ctx, 0.0, "Reverb send")?;
    let send_delay = create_gain(ctx, 0.0, "Delay send")?;

    _ = eq_low.connect_with_audio_node(&eq_mid);
    _ = eq_mid.connect_with_audio_node(&eq_high);
    _ = eq_high.connect_with_audio_node(&filter);
    _ = filter.connect_with_audio_node(&pre);
    _ = pre.connect_with_audio_node(&gain);
    _ = gain.connect_with_audio_node(&crossfade);
    _ = crossfade.connect_with_audio_node(&pan);
    _ = pan.connect_with_audio_node(&bus.master_gain);
    _ = pre.connect_with_audio_node(&send_reverb);
    _ = send_reverb.connect_with_audio_node(&bus.reverb);
    _ = pre.connect_with_audio_node(&send_delay);
    _ = send_delay.connect_with_audio_node(&bus.delay);

    Ok(DeckNodes {
        eq_low,
        eq_mid,
        eq_high,
        filter,
        pre,
        gain,
        crossfade,
        pan,
        send_reverb,
        send_delay,
    })
}

/// The fixed processing topology every sound passes through. Owns every
/// long-lived node; decks and the sequencer only hold handles into it.
pub struct SignalGraph {
    ctx: web::AudioContext,
    bus: MasterBus,
    decks: [DeckNodes; 2],
    sequencer_bus: web::GainNode,
    capture: RefCell<Option<web::MediaStreamAudioDestinationNode>>,
}

impl SignalGraph {
    pub fn build(ctx: &web::AudioContext) -> Result<Self, EngineError> {
        let bus = build_master_bus(ctx)?;
        let deck_a = build_deck_chain(ctx, &bus)?;
        let deck_b = build_deck_chain(ctx, &bus)?;
        let sequencer_bus = create_gain(ctx, SEQUENCER_BUS_GAIN, "Sequencer bus")?;
        _ = sequencer_bus.connect_with_audio_node(&bus.master_gain);
        log::info!("[graph] built at {} Hz", ctx.sample_rate());
        Ok(Self {
            ctx: ctx.clone(),
            bus,
            decks: [deck_a, deck_b],
            sequencer_bus,
            capture: RefCell::new(None),
        })
    }

    pub fn context(&self) -> &web::AudioContext {
        &self.ctx
    }

    pub fn now(&self) -> f64 {
        self.ctx.current_time()
    }

    pub fn bus(&self) -> &MasterBus {
        &self.bus
    }

    pub fn deck_nodes(&self, id: DeckId) -> &DeckNodes {
        &self.decks[id.index()]
    }

    pub fn sequencer_input(&self) -> &web::AudioNode {
        &self.sequencer_bus
    }

    pub fn connect_external_input(&self, node: &web::AudioNode) {
        if let Err(e) = node.connect_with_audio_node(&self.bus.master_gain) {
            log::warn!("[graph] external input connect failed: {:?}", e);
        }
    }

    /// Tolerates nodes that were never connected or are already gone.
    pub fn disconnect_external_input(&self, node: &web::AudioNode) {
        if let Err(e) = node.disconnect_with_audio_node(&self.bus.master_gain) {
            log::debug!("[graph] external input already disconnected: {:?}", e);
        }
    }

    /// Capture tap on the limiter output, created on first use and reused.
    pub fn master_stream(&self) -> Result<web::MediaStream, EngineError> {
        let mut capture = self.capture.borrow_mut();
        if capture.is_none() {
            let dest = self.ctx.create_media_stream_destination().map_err(|e| {
                log::warn!("[graph] media stream destination unavailable: {:?}", e);
                EngineError::CaptureUnavailable(format!("{e:?}"))
            })?;
            _ = self.bus.limiter.connect_with_audio_node(&dest);
            *capture = Some(dest);
        }
        match capture.as_ref() {
            Some(dest) => Ok(dest.stream()),
            None => Err(EngineError::CaptureUnavailable("no capture tap".into())),
        }
    }

    pub fn release_capture(&self) {
        if let Some(dest) = self.capture.borrow_mut().take() {
            _ = self.bus.limiter.disconnect_with_audio_node(&dest);
        }
    }

    pub fn set_master_level(&self, level: f32) {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        ramp(&self.bus.master_gain.gain(), level, self.now(), GAIN_SMOOTHING_TAU_SEC);
    }

    /// Apply resolved compressor/limiter/auto-tune targets as smoothed ramps.
    pub fn configure(&self, targets: &[ParamTarget]) {
        let now = self.now();
        for t in targets {
            let param = match t.param {
                DynamicsParam::CompressorThreshold => self.bus.compressor.threshold(),
                DynamicsParam::CompressorRatio => self.bus.compressor.ratio(),
                DynamicsParam::CompressorAttack => self.bus.compressor.attack(),
                DynamicsParam::CompressorRelease => self.bus.compressor.release(),
                DynamicsParam::LimiterThreshold => self.bus.limiter.threshold(),
                DynamicsParam::LimiterRelease => self.bus.limiter.release(),
                DynamicsParam::LimiterLookahead => self.bus.limiter_lookahead.delay_time(),
                DynamicsParam::AutoTuneWet => self.bus.auto_tune_wet.gain(),
                DynamicsParam::AutoTuneDelay => self.bus.auto_tune_delay.delay_time(),
                DynamicsParam::AutoTuneFrequency => self.bus.auto_tune_filter.frequency(),
            };
            ramp(&param, t.value, now, DYNAMICS_SMOOTHING_TAU_SEC);
        }
    }
}
