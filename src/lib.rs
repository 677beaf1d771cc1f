#![cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

mod audio;
mod constants;
pub mod core;
mod deck_port;
mod engine;
mod loader;
mod recording;
mod scheduler;
mod synth;

pub use engine::{AudioEngine, DeckStatus, MixRecorder};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("spot-audio starting");
    Ok(())
}
