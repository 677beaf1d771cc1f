use crate::audio::{build_master_bus, create_gain, SignalGraph};
use crate::constants::{DEFAULT_RECORDING_MIME, OFFLINE_RENDER_CHANNELS};
use crate::core::wav::encode_wav;
use crate::core::{EngineError, RecordedMix, RecordingSession};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::oneshot;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

struct RecorderState {
    session: RecordingSession<web::Blob>,
    on_data: Option<Closure<dyn FnMut(web::BlobEvent)>>,
}

/// Live MediaRecorder capture of the master tap.
pub struct LiveRecording {
    recorder: web::MediaRecorder,
    state: Rc<RefCell<RecorderState>>,
    result: Option<oneshot::Receiver<RecordedMix<web::Blob>>>,
}

fn pick_mime(requested: Option<&str>) -> Option<String> {
    let wanted = requested.unwrap_or(DEFAULT_RECORDING_MIME);
    if web::MediaRecorder::is_type_supported(wanted) {
        Some(wanted.to_string())
    } else {
        log::debug!("[recording] {wanted:?} unsupported, using recorder default");
        None
    }
}

pub fn start_live_recording(
    graph: &SignalGraph,
    mime_type: Option<&str>,
) -> Result<LiveRecording, EngineError> {
    let stream = graph.master_stream()?;
    let capture_err = |e: JsValue| {
        log::warn!("[recording] MediaRecorder unavailable: {:?}", e);
        EngineError::CaptureUnavailable(format!("{e:?}"))
    };
    let mime = pick_mime(mime_type);
    let recorder = match &mime {
        Some(m) => {
            let opts = web::MediaRecorderOptions::new();
            opts.set_mime_type(m);
            web::MediaRecorder::new_with_media_stream_and_media_recorder_options(&stream, &opts)
        }
        None => web::MediaRecorder::new_with_media_stream(&stream),
    }
    .map_err(capture_err)?;

    let label = mime.unwrap_or_else(|| recorder.mime_type());
    let (session, rx) = RecordingSession::new(label);
    let state = Rc::new(RefCell::new(RecorderState {
        session,
        on_data: None,
    }));

    let data_state = state.clone();
    let on_data = Closure::wrap(Box::new(move |ev: web::BlobEvent| {
        if let Some(blob) = ev.data() {
            let len = blob.size() as usize;
            if let Ok(mut st) = data_state.try_borrow_mut() {
                st.session.push_chunk(blob, len);
            }
        }
    }) as Box<dyn FnMut(web::BlobEvent)>);
    recorder.set_ondataavailable(Some(on_data.as_ref().unchecked_ref()));
    state.borrow_mut().on_data = Some(on_data);

    // Fires once after the final dataavailable; frees the data handler too.
    let stop_state = state.clone();
    let stop_recorder = recorder.clone();
    let on_stop = Closure::once_into_js(move || {
        stop_recorder.set_ondataavailable(None);
        let mut st = stop_state.borrow_mut();
        st.on_data = None;
        st.session.finish();
        log::info!("[recording] finished with {} chunks", st.session.chunk_count());
    });
    recorder.set_onstop(Some(on_stop.unchecked_ref()));

    recorder.start().map_err(capture_err)?;
    log::info!("[recording] started ({})", state.borrow().session.mime_type());
    Ok(LiveRecording {
        recorder,
        state,
        result: Some(rx),
    })
}

impl LiveRecording {
    pub fn is_recording(&self) -> bool {
        self.recorder.state() == web::RecordingState::Recording
    }

    pub fn mime_type(&self) -> String {
        self.state.borrow().session.mime_type().to_string()
    }

    /// Finalize. Calling it again, or after the recorder already stopped, is a no-op.
    pub fn stop(&self) {
        if self.recorder.state() == web::RecordingState::Inactive {
            return;
        }
        if let Err(e) = self.recorder.stop() {
            log::debug!("[recording] stop ignored: {:?}", e);
        }
    }

    /// The finished container. Only the first call gets the receiver.
    pub fn take_result(&mut self) -> Option<oneshot::Receiver<RecordedMix<web::Blob>>> {
        self.result.take()
    }
}

impl Drop for LiveRecording {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn mix_to_blob(mix: &RecordedMix<web::Blob>) -> Result<web::Blob, JsValue> {
    let parts = js_sys::Array::new();
    for chunk in &mix.chunks {
        parts.push(chunk);
    }
    let bag = web::BlobPropertyBag::new();
    bag.set_type(&mix.mime_type);
    web::Blob::new_with_blob_sequence_and_options(&parts, &bag)
}

/// One deck's contribution to an offline export.
pub struct OfflineSource {
    pub buffer: web::AudioBuffer,
    pub offset: f64,
    pub rate: f32,
    pub gain: f32,
}

/// Render `duration_sec` of the master chain fed by `sources` without real
/// time, then encode it as 16-bit PCM WAV.
pub async fn render_offline_wav(
    sample_rate: f32,
    duration_sec: f64,
    sources: Vec<OfflineSource>,
) -> Result<Vec<u8>, EngineError> {
    let render_err = |e: JsValue| EngineError::RenderFailed(format!("{e:?}"));
    let frames = (duration_sec.max(0.0) * sample_rate as f64).ceil().max(1.0) as u32;
    let offline = web::OfflineAudioContext::new_with_number_of_channels_and_length_and_sample_rate(
        OFFLINE_RENDER_CHANNELS,
        frames,
        sample_rate,
    )
    .map_err(render_err)?;
    let bus = build_master_bus(&offline)?;

    for src in &sources {
        let node = web::AudioBufferSourceNode::new(&offline).map_err(render_err)?;
        node.set_buffer(Some(&src.buffer));
        node.playback_rate().set_value(src.rate);
        let gain = create_gain(&offline, src.gain, "Offline deck")?;
        _ = node.connect_with_audio_node(&gain);
        _ = gain.connect_with_audio_node(&bus.master_gain);
        node.start_with_when_and_grain_offset(0.0, src.offset)
            .map_err(render_err)?;
    }

    let rendered = JsFuture::from(offline.start_rendering().map_err(render_err)?)
        .await
        .map_err(render_err)?
        .dyn_into::<web::AudioBuffer>()
        .map_err(render_err)?;
    let channels = (0..rendered.number_of_channels())
        .map(|c| rendered.get_channel_data(c))
        .collect::<Result<Vec<_>, _>>()
        .map_err(render_err)?;
    log::info!(
        "[render] {} frames x {} channels from {} decks",
        frames,
        channels.len(),
        sources.len()
    );
    encode_wav(&channels, sample_rate as u32)
}
