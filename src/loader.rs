use crate::core::EngineError;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

/// Decode raw container bytes into an audio buffer on `ctx`.
pub async fn decode_audio(
    ctx: &web::BaseAudioContext,
    bytes: &[u8],
) -> Result<web::AudioBuffer, EngineError> {
    let decode_err = |e: wasm_bindgen::JsValue| EngineError::Decode(format!("{e:?}"));
    // decodeAudioData detaches its input, so hand it a fresh copy.
    let data = js_sys::Uint8Array::from(bytes).buffer();
    let promise = ctx.decode_audio_data(&data).map_err(decode_err)?;
    let buffer = JsFuture::from(promise)
        .await
        .map_err(decode_err)?
        .dyn_into::<web::AudioBuffer>()
        .map_err(decode_err)?;
    log::debug!(
        "[loader] decoded {:.2}s, {} channels",
        buffer.duration(),
        buffer.number_of_channels()
    );
    Ok(buffer)
}

/// Fetch a file's bytes. Non-2xx responses are errors.
pub async fn fetch_audio(url: &str) -> Result<Vec<u8>, EngineError> {
    let fetch_err = |e: wasm_bindgen::JsValue| EngineError::Fetch(format!("{url}: {e:?}"));
    let window = web::window().ok_or_else(|| EngineError::Fetch("no window".into()))?;
    let response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(fetch_err)?
        .dyn_into::<web::Response>()
        .map_err(fetch_err)?;
    if !response.ok() {
        return Err(EngineError::Fetch(format!(
            "{url}: HTTP {}",
            response.status()
        )));
    }
    let body = JsFuture::from(response.array_buffer().map_err(fetch_err)?)
        .await
        .map_err(fetch_err)?;
    Ok(js_sys::Uint8Array::new(&body).to_vec())
}
