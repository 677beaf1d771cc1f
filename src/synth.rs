use crate::audio::{create_gain, MasterBus};
use crate::core::{Automation, NoteTrigger, SynthParams, Waveform};
use web_sys as web;

/// Output routing shared by the one-shot voices.
#[derive(Clone, Copy, Debug)]
pub struct VoiceOutput {
    pub velocity: f32,
    pub pan: f32,
    pub out_gain: f32,
    pub send_reverb: f32,
    pub send_delay: f32,
}

pub fn oscillator_type(waveform: Waveform) -> web::OscillatorType {
    match waveform {
        Waveform::Sine => web::OscillatorType::Sine,
        Waveform::Square => web::OscillatorType::Square,
        Waveform::Saw => web::OscillatorType::Sawtooth,
        Waveform::Triangle => web::OscillatorType::Triangle,
    }
}

pub fn apply_automation(param: &web::AudioParam, plan: &[Automation]) {
    for step in plan {
        let res = match *step {
            Automation::SetValue { value, at } => param.set_value_at_time(value, at),
            Automation::LinearRamp { value, at } => param.linear_ramp_to_value_at_time(value, at),
            Automation::ExponentialRamp { value, at } => {
                param.exponential_ramp_to_value_at_time(value, at)
            }
            Automation::Target {
                value,
                at,
                time_constant,
            } => param.set_target_at_time(value, at, time_constant),
        };
        if let Err(e) = res {
            log::trace!("automation step rejected at {:.3}: {:?}", step.at(), e);
        }
    }
}

fn create_oscillator(
    ctx: &web::BaseAudioContext,
    waveform: Waveform,
    frequency_hz: f32,
) -> Option<web::OscillatorNode> {
    match web::OscillatorNode::new(ctx) {
        Ok(osc) => {
            osc.set_type(oscillator_type(waveform));
            osc.frequency().set_value(frequency_hz);
            Some(osc)
        }
        Err(e) => {
            log::error!("OscillatorNode error: {:?}", e);
            None
        }
    }
}

/// Sound one sequencer note into `dest`. The voice's envelope shapes a fresh
/// gain node and the oscillator stops on its own.
pub fn play_note(ctx: &web::BaseAudioContext, dest: &web::AudioNode, note: &NoteTrigger) {
    let Some(osc) = create_oscillator(ctx, note.voice.waveform, note.frequency_hz) else {
        return;
    };
    let Ok(vca) = create_gain(ctx, 0.0, "Note") else {
        return;
    };
    apply_automation(
        &vca.gain(),
        &note.voice.envelope.plan(note.time, 1.0, note.voice.stop_after_sec),
    );
    _ = osc.connect_with_audio_node(&vca);
    _ = vca.connect_with_audio_node(dest);
    _ = osc.start_with_when(note.time);
    _ = osc.stop_with_when(note.time + note.voice.stop_after_sec);
}

/// vca -> pan -> out gain -> master, with reverb/delay sends tapped off the vca.
fn route_voice(
    ctx: &web::BaseAudioContext,
    bus: &MasterBus,
    vca: &web::GainNode,
    out: &VoiceOutput,
) -> Option<()> {
    let pan = web::StereoPannerNode::new(ctx)
        .map_err(|e| log::error!("StereoPannerNode error: {:?}", e))
        .ok()?;
    pan.pan().set_value(out.pan.clamp(-1.0, 1.0));
    let out_gain = create_gain(ctx, out.out_gain.max(0.0), "Voice out").ok()?;
    _ = vca.connect_with_audio_node(&pan);
    _ = pan.connect_with_audio_node(&out_gain);
    _ = out_gain.connect_with_audio_node(&bus.master_gain);
    if out.send_reverb > 0.0 {
        let send = create_gain(ctx, out.send_reverb.min(1.0), "Voice reverb send").ok()?;
        _ = vca.connect_with_audio_node(&send);
        _ = send.connect_with_audio_node(&bus.reverb);
    }
    if out.send_delay > 0.0 {
        let send = create_gain(ctx, out.send_delay.min(1.0), "Voice delay send").ok()?;
        _ = vca.connect_with_audio_node(&send);
        _ = send.connect_with_audio_node(&bus.delay);
    }
    Some(())
}

/// One-shot playback of a decoded buffer at `when`.
pub fn play_sample(
    ctx: &web::BaseAudioContext,
    bus: &MasterBus,
    buffer: &web::AudioBuffer,
    when: f64,
    out: &VoiceOutput,
) {
    let src = match web::AudioBufferSourceNode::new(ctx) {
        Ok(s) => s,
        Err(e) => {
            log::error!("AudioBufferSourceNode error: {:?}", e);
            return;
        }
    };
    src.set_buffer(Some(buffer));
    let Ok(vca) = create_gain(ctx, out.velocity.max(0.0), "Sample") else {
        return;
    };
    _ = src.connect_with_audio_node(&vca);
    if route_voice(ctx, bus, &vca, out).is_none() {
        return;
    }
    _ = src.start_with_when(when.max(0.0));
}

/// Subtractive one-shot: oscillator -> low-pass -> ADSR vca. The release
/// starts at `when + duration_sec`.
pub fn play_synth(
    ctx: &web::BaseAudioContext,
    bus: &MasterBus,
    when: f64,
    frequency_hz: f32,
    duration_sec: f64,
    out: &VoiceOutput,
    params: &SynthParams,
) {
    let Some(osc) = create_oscillator(ctx, params.waveform, frequency_hz) else {
        return;
    };
    let filter = match web::BiquadFilterNode::new(ctx) {
        Ok(f) => f,
        Err(e) => {
            log::error!("BiquadFilterNode error: {:?}", e);
            return;
        }
    };
    filter.set_type(web::BiquadFilterType::Lowpass);
    filter.frequency().set_value(params.cutoff_hz);
    filter.q().set_value(params.q);
    let Ok(vca) = create_gain(ctx, 0.0, "Synth") else {
        return;
    };
    let when = when.max(0.0);
    let duration_sec = duration_sec.max(0.0);
    apply_automation(
        &vca.gain(),
        &params.envelope().plan(when, out.velocity.max(0.0), duration_sec),
    );
    _ = osc.connect_with_audio_node(&filter);
    _ = filter.connect_with_audio_node(&vca);
    if route_voice(ctx, bus, &vca, out).is_none() {
        return;
    }
    _ = osc.start_with_when(when);
    _ = osc.stop_with_when(SynthParams::stop_time(when, duration_sec));
}
