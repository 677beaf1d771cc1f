use crate::audio::SignalGraph;
use crate::core::{
    AutoTuneSettings, CompressorSettings, CrossfaderCurve, Deck, DeckId, LimiterSettings, Mixer,
    SchedulerConfig, StepSequencer, SynthParams, TrackMeta, TrackPatch, TrackTable, Transport,
    Waveform,
};
use crate::deck_port::WebDeck;
use crate::recording::{self, LiveRecording, OfflineSource};
use crate::scheduler::Scheduler;
use crate::synth::{self, VoiceOutput};
use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys as web;

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn deck_id(name: &str) -> Option<DeckId> {
    let id = DeckId::from_name(name);
    if id.is_none() {
        log::debug!("[engine] unknown deck {name:?}");
    }
    id
}

/// Snapshot for the UI scrubber.
#[wasm_bindgen]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeckStatus {
    pub position: f64,
    pub duration: f64,
    #[wasm_bindgen(js_name = isPlaying)]
    pub is_playing: bool,
}

/// Handle to a running live recording.
#[wasm_bindgen]
pub struct MixRecorder {
    inner: LiveRecording,
}

#[wasm_bindgen]
impl MixRecorder {
    pub fn stop(&self) {
        self.inner.stop();
    }

    #[wasm_bindgen(getter, js_name = isRecording)]
    pub fn is_recording(&self) -> bool {
        self.inner.is_recording()
    }

    #[wasm_bindgen(getter, js_name = mimeType)]
    pub fn mime_type(&self) -> String {
        self.inner.mime_type()
    }

    /// Promise resolving with the recorded Blob once `stop()` has run.
    pub fn result(&mut self) -> js_sys::Promise {
        let rx = self.inner.take_result();
        wasm_bindgen_futures::future_to_promise(async move {
            let rx = rx.ok_or_else(|| JsValue::from_str("recording result already taken"))?;
            let mix = rx
                .await
                .map_err(|_| JsValue::from_str("recording dropped before stop"))?;
            recording::mix_to_blob(&mix).map(JsValue::from)
        })
    }
}

/// Everything that exists only once the graph is built.
struct Live {
    graph: Rc<SignalGraph>,
    mixer: Mixer<WebDeck>,
    scheduler: Scheduler,
}

/// Browser-facing mixing engine: two decks, a crossfader, the master bus, a
/// lookahead transport driving the piano-roll sequencer, and mix export.
#[wasm_bindgen]
pub struct AudioEngine {
    ctx: Option<web::AudioContext>,
    live: Option<Live>,
    transport: Rc<RefCell<Transport>>,
    sequencer: Rc<RefCell<StepSequencer>>,
    tracks: TrackTable,
}

impl AudioEngine {
    fn build_live(&self) -> anyhow::Result<Live> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("engine disposed"))?;
        let graph = Rc::new(SignalGraph::build(ctx)?);
        let mixer = Mixer::new(
            WebDeck::new(ctx.clone(), graph.deck_nodes(DeckId::A).clone()),
            WebDeck::new(ctx.clone(), graph.deck_nodes(DeckId::B).clone()),
        );
        let scheduler = Scheduler::new(ctx.clone(), self.transport.clone());
        Ok(Live {
            graph,
            mixer,
            scheduler,
        })
    }

    /// The graph, built on first use. `None` after `dispose()` or when
    /// construction failed.
    fn live(&mut self) -> Option<&mut Live> {
        if self.live.is_none() && self.ctx.is_some() {
            if let Err(e) = self.initialize() {
                log::error!("[engine] init error: {:?}", e);
            }
        }
        self.live.as_mut()
    }

    fn deck(&mut self, name: &str) -> Option<&mut Deck<WebDeck>> {
        let id = deck_id(name)?;
        Some(self.live()?.mixer.deck_mut(id))
    }

    fn transport_mut(&self) -> Option<RefMut<'_, Transport>> {
        let t = self.transport.try_borrow_mut().ok();
        if t.is_none() {
            log::debug!("[engine] transport busy, call ignored");
        }
        t
    }

    fn install_sequencer(&self, graph: &Rc<SignalGraph>) {
        let graph = graph.clone();
        let sequencer = self.sequencer.clone();
        let mut notes = Vec::new();
        if let Some(mut t) = self.transport_mut() {
            t.set_on_step(move |ev| {
                notes.clear();
                if let Ok(seq) = sequencer.try_borrow() {
                    seq.on_step(ev, &mut notes);
                }
                for note in &notes {
                    synth::play_note(graph.context(), graph.sequencer_input(), note);
                }
            });
        }
    }
}

#[wasm_bindgen]
impl AudioEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<AudioEngine, JsValue> {
        let ctx = web::AudioContext::new()?;
        log::info!("[engine] context created at {} Hz", ctx.sample_rate());
        Ok(Self {
            ctx: Some(ctx),
            live: None,
            transport: Rc::new(RefCell::new(Transport::new(SchedulerConfig::default()))),
            sequencer: Rc::new(RefCell::new(StepSequencer::default())),
            tracks: TrackTable::default(),
        })
    }

    /// Build the graph. Idempotent.
    pub fn initialize(&mut self) -> Result<(), JsValue> {
        if self.live.is_some() {
            return Ok(());
        }
        let live = self.build_live().map_err(js_err)?;
        self.install_sequencer(&live.graph);
        self.live = Some(live);
        Ok(())
    }

    /// Resume a context suspended by the autoplay policy.
    pub fn resume(&self) -> Result<js_sys::Promise, JsValue> {
        match &self.ctx {
            Some(ctx) => ctx.resume(),
            None => Err(JsValue::from_str("engine disposed")),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn context(&self) -> Option<web::AudioContext> {
        self.ctx.clone()
    }

    pub fn analyser(&mut self) -> Option<web::AnalyserNode> {
        Some(self.live()?.graph.bus().analyser.clone())
    }

    // ---------------- Decks ----------------

    #[wasm_bindgen(js_name = loadDeckBuffer)]
    pub fn load_deck_buffer(&mut self, deck: &str, buffer: web::AudioBuffer) {
        if let Some(d) = self.deck(deck) {
            d.load(buffer);
        }
    }

    pub fn play(&mut self, deck: &str) {
        if let Some(d) = self.deck(deck) {
            d.play();
        }
    }

    pub fn pause(&mut self, deck: &str) {
        if let Some(d) = self.deck(deck) {
            d.pause();
        }
    }

    #[wasm_bindgen(js_name = stopDeck)]
    pub fn stop_deck(&mut self, deck: &str) {
        if let Some(d) = self.deck(deck) {
            d.stop();
        }
    }

    pub fn seek(&mut self, deck: &str, seconds: f64) {
        if let Some(d) = self.deck(deck) {
            d.seek(seconds);
        }
    }

    /// Returns the effective (clamped) rate.
    #[wasm_bindgen(js_name = setRate)]
    pub fn set_rate(&mut self, deck: &str, rate: f32) -> f32 {
        self.deck(deck).map(|d| d.set_rate(rate)).unwrap_or(1.0)
    }

    #[wasm_bindgen(js_name = setLoop)]
    pub fn set_loop(&mut self, deck: &str, enabled: bool, start: f64, end: f64) {
        if let Some(d) = self.deck(deck) {
            d.set_loop(enabled, start, end);
        }
    }

    #[wasm_bindgen(js_name = setEq)]
    pub fn set_eq(&mut self, deck: &str, highs: f32, mids: f32, lows: f32) {
        if let Some(d) = self.deck(deck) {
            d.set_eq(highs, mids, lows);
        }
    }

    #[wasm_bindgen(js_name = setFilterFreq)]
    pub fn set_filter_freq(&mut self, deck: &str, hz: f32) {
        if let Some(d) = self.deck(deck) {
            d.set_filter_freq(hz);
        }
    }

    #[wasm_bindgen(js_name = setGain)]
    pub fn set_gain(&mut self, deck: &str, gain: f32) {
        if let Some(d) = self.deck(deck) {
            d.set_gain(gain);
        }
    }

    #[wasm_bindgen(js_name = setPan)]
    pub fn set_pan(&mut self, deck: &str, pan: f32) {
        if let Some(d) = self.deck(deck) {
            d.set_pan(pan);
        }
    }

    #[wasm_bindgen(js_name = setSends)]
    pub fn set_sends(&mut self, deck: &str, reverb: f32, delay: f32) {
        if let Some(d) = self.deck(deck) {
            d.set_sends(reverb, delay);
        }
    }

    #[wasm_bindgen(js_name = getDeckProgress)]
    pub fn get_deck_progress(&mut self, deck: &str) -> DeckStatus {
        match self.deck(deck) {
            Some(d) => {
                let p = d.progress();
                DeckStatus {
                    position: p.position,
                    duration: p.duration,
                    is_playing: p.is_playing,
                }
            }
            None => DeckStatus::default(),
        }
    }

    #[wasm_bindgen(js_name = setCrossfader)]
    pub fn set_crossfader(&mut self, position: f32, curve: &str, reversed: bool) {
        let curve = CrossfaderCurve::from_name(curve).unwrap_or_else(|| {
            log::debug!("[engine] unknown crossfader curve {curve:?}, using linear");
            CrossfaderCurve::Linear
        });
        if let Some(live) = self.live() {
            live.mixer.set_crossfader(position, curve, reversed);
        }
    }

    // ---------------- Tracks ----------------

    #[allow(clippy::too_many_arguments)]
    #[wasm_bindgen(js_name = ensureTrack)]
    pub fn ensure_track(
        &mut self,
        id: u32,
        name: String,
        instrument_id: String,
        gain: Option<f32>,
        pan: Option<f32>,
        send_a: Option<f32>,
        send_b: Option<f32>,
    ) {
        let mut track = TrackMeta::new(id, name, instrument_id);
        track.gain = gain.unwrap_or(track.gain);
        track.pan = pan.unwrap_or(track.pan);
        track.send_a = send_a.unwrap_or(track.send_a);
        track.send_b = send_b.unwrap_or(track.send_b);
        self.tracks.ensure(track);
    }

    #[allow(clippy::too_many_arguments)]
    #[wasm_bindgen(js_name = updateTrack)]
    pub fn update_track(
        &mut self,
        id: u32,
        name: Option<String>,
        instrument_id: Option<String>,
        gain: Option<f32>,
        pan: Option<f32>,
        send_a: Option<f32>,
        send_b: Option<f32>,
    ) -> bool {
        self.tracks.update(
            id,
            TrackPatch {
                name,
                instrument_id,
                gain,
                pan,
                send_a,
                send_b,
            },
        )
    }

    /// Copy a track's gain, pan and sends onto a deck.
    #[wasm_bindgen(js_name = applyTrack)]
    pub fn apply_track(&mut self, deck: &str, track_id: u32) -> bool {
        let Some(track) = self.tracks.get(track_id).cloned() else {
            log::debug!("[engine] unknown track {track_id}");
            return false;
        };
        match self.deck(deck) {
            Some(d) => {
                d.apply_track(&track);
                true
            }
            None => false,
        }
    }

    // ---------------- Transport + sequencer ----------------

    pub fn start(&mut self) {
        if let Some(live) = self.live() {
            live.scheduler.start();
        }
    }

    pub fn stop(&mut self) {
        if let Some(live) = self.live.as_mut() {
            live.scheduler.stop();
        }
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.transport
            .try_borrow()
            .map(|t| t.is_running())
            .unwrap_or(true)
    }

    #[wasm_bindgen(getter, js_name = currentStep)]
    pub fn current_step(&self) -> usize {
        self.transport
            .try_borrow()
            .map(|t| t.current_step())
            .unwrap_or(0)
    }

    #[wasm_bindgen(js_name = setTempo)]
    pub fn set_tempo(&mut self, bpm: f64) {
        if let Some(mut t) = self.transport_mut() {
            t.set_tempo(bpm);
        }
    }

    #[wasm_bindgen(js_name = setStepsPerBeat)]
    pub fn set_steps_per_beat(&mut self, steps: u32) {
        if let Some(mut t) = self.transport_mut() {
            t.set_steps_per_beat(steps);
        }
    }

    #[wasm_bindgen(js_name = setLoopSteps)]
    pub fn set_loop_steps(&mut self, start: usize, end: usize) {
        if let Some(mut t) = self.transport_mut() {
            t.set_loop(start, end);
        }
    }

    /// Replace the step callback with a JS function `(step, time, duration)`.
    /// Only one callback is active; this displaces the built-in sequencer.
    #[wasm_bindgen(js_name = onScheduleStep)]
    pub fn on_schedule_step(&mut self, callback: js_sys::Function) {
        if let Some(mut t) = self.transport_mut() {
            t.set_on_step(move |ev| {
                let res = callback.call3(
                    &JsValue::NULL,
                    &JsValue::from(ev.step as u32),
                    &JsValue::from(ev.time),
                    &JsValue::from(ev.duration),
                );
                if let Err(e) = res {
                    log::warn!("[engine] step callback threw: {:?}", e);
                }
            });
        }
    }

    /// Route steps back to the built-in piano-roll sequencer.
    #[wasm_bindgen(js_name = useSequencer)]
    pub fn use_sequencer(&mut self) {
        if let Some(graph) = self.live().map(|l| l.graph.clone()) {
            self.install_sequencer(&graph);
        }
    }

    #[wasm_bindgen(js_name = toggleStep)]
    pub fn toggle_step(&mut self, pitch: u8, step: usize) -> Option<bool> {
        self.sequencer.try_borrow_mut().ok()?.toggle(pitch, step)
    }

    #[wasm_bindgen(js_name = getStep)]
    pub fn get_step(&self, pitch: u8, step: usize) -> bool {
        self.sequencer
            .try_borrow()
            .map(|s| s.get_step(pitch, step))
            .unwrap_or(false)
    }

    #[wasm_bindgen(js_name = selectInstrument)]
    pub fn select_instrument(&mut self, name: &str) {
        if let Ok(mut s) = self.sequencer.try_borrow_mut() {
            s.select_instrument(name);
        }
    }

    #[wasm_bindgen(js_name = instrumentNames)]
    pub fn instrument_names(&self) -> js_sys::Array {
        let out = js_sys::Array::new();
        if let Ok(s) = self.sequencer.try_borrow() {
            for name in s.instruments().names() {
                out.push(&JsValue::from_str(name));
            }
        }
        out
    }

    /// Clear the grid and rewind the stopped transport to its loop start.
    #[wasm_bindgen(js_name = resetSequence)]
    pub fn reset_sequence(&mut self) {
        if let Ok(mut s) = self.sequencer.try_borrow_mut() {
            s.clear();
        }
        match self.live.as_mut() {
            Some(live) => live.scheduler.reset(),
            None => {
                if let Some(mut t) = self.transport_mut() {
                    t.reset();
                }
            }
        }
    }

    // ---------------- One-shot voices ----------------

    #[allow(clippy::too_many_arguments)]
    #[wasm_bindgen(js_name = playSample)]
    pub fn play_sample(
        &mut self,
        buffer: &web::AudioBuffer,
        when: f64,
        velocity: f32,
        pan: f32,
        out_gain: f32,
        send_a: f32,
        send_b: f32,
    ) {
        let Some(live) = self.live() else {
            return;
        };
        let out = VoiceOutput {
            velocity,
            pan,
            out_gain,
            send_reverb: send_a,
            send_delay: send_b,
        };
        synth::play_sample(live.graph.context(), live.graph.bus(), buffer, when, &out);
    }

    #[allow(clippy::too_many_arguments)]
    #[wasm_bindgen(js_name = playSynth)]
    pub fn play_synth(
        &mut self,
        when: f64,
        freq: f32,
        duration: f64,
        velocity: f32,
        pan: f32,
        out_gain: f32,
        send_a: f32,
        send_b: f32,
        waveform: Option<String>,
        attack: Option<f64>,
        decay: Option<f64>,
        sustain: Option<f32>,
        release: Option<f64>,
        cutoff: Option<f32>,
        q: Option<f32>,
    ) {
        let defaults = SynthParams::default();
        let params = SynthParams {
            waveform: waveform
                .as_deref()
                .and_then(Waveform::from_name)
                .unwrap_or(defaults.waveform),
            attack_sec: attack.unwrap_or(defaults.attack_sec),
            decay_sec: decay.unwrap_or(defaults.decay_sec),
            sustain: sustain.unwrap_or(defaults.sustain),
            release_sec: release.unwrap_or(defaults.release_sec),
            cutoff_hz: cutoff.unwrap_or(defaults.cutoff_hz),
            q: q.unwrap_or(defaults.q),
        };
        let Some(live) = self.live() else {
            return;
        };
        let out = VoiceOutput {
            velocity,
            pan,
            out_gain,
            send_reverb: send_a,
            send_delay: send_b,
        };
        synth::play_synth(
            live.graph.context(),
            live.graph.bus(),
            when,
            freq,
            duration,
            &out,
            &params,
        );
    }

    // ---------------- Master bus ----------------

    #[wasm_bindgen(js_name = setMasterOutputLevel)]
    pub fn set_master_output_level(&mut self, level: f32) {
        if let Some(live) = self.live() {
            live.graph.set_master_level(level);
        }
    }

    #[wasm_bindgen(js_name = connectExternalInput)]
    pub fn connect_external_input(&mut self, node: &web::AudioNode) {
        if let Some(live) = self.live() {
            live.graph.connect_external_input(node);
        }
    }

    #[wasm_bindgen(js_name = disconnectExternalInput)]
    pub fn disconnect_external_input(&mut self, node: &web::AudioNode) {
        if let Some(live) = self.live.as_ref() {
            live.graph.disconnect_external_input(node);
        }
    }

    #[wasm_bindgen(js_name = configureCompressor)]
    pub fn configure_compressor(
        &mut self,
        threshold: Option<f32>,
        ratio: Option<f32>,
        attack: Option<f32>,
        release: Option<f32>,
        enabled: Option<bool>,
    ) {
        let settings = CompressorSettings {
            threshold_db: threshold,
            ratio,
            attack_sec: attack,
            release_sec: release,
            enabled,
        };
        if let Some(live) = self.live() {
            live.graph.configure(&settings.targets());
        }
    }

    #[wasm_bindgen(js_name = configureLimiter)]
    pub fn configure_limiter(
        &mut self,
        ceiling: Option<f32>,
        lookahead: Option<f32>,
        release: Option<f32>,
        enabled: Option<bool>,
    ) {
        let settings = LimiterSettings {
            ceiling_db: ceiling,
            lookahead_sec: lookahead,
            release_sec: release,
            enabled,
        };
        if let Some(live) = self.live() {
            live.graph.configure(&settings.targets());
        }
    }

    #[wasm_bindgen(js_name = configureAutoTune)]
    pub fn configure_auto_tune(
        &mut self,
        mix: Option<f32>,
        retune: Option<f32>,
        humanize: Option<f32>,
        formant: Option<f32>,
        enabled: Option<bool>,
    ) {
        let settings = AutoTuneSettings {
            mix,
            retune,
            humanize,
            formant,
            enabled,
        };
        if let Some(live) = self.live() {
            live.graph.configure(&settings.targets());
        }
    }

    /// The cached capture stream of the master output.
    #[wasm_bindgen(js_name = getMasterStream)]
    pub fn get_master_stream(&mut self) -> Result<web::MediaStream, JsValue> {
        let live = self
            .live()
            .ok_or_else(|| JsValue::from_str("engine unavailable"))?;
        live.graph.master_stream().map_err(js_err)
    }

    // ---------------- Export ----------------

    #[wasm_bindgen(js_name = startLiveRecording)]
    pub fn start_live_recording(&mut self, mime_type: Option<String>) -> Result<MixRecorder, JsValue> {
        let live = self
            .live()
            .ok_or_else(|| JsValue::from_str("engine unavailable"))?;
        let inner =
            recording::start_live_recording(&live.graph, mime_type.as_deref()).map_err(js_err)?;
        Ok(MixRecorder { inner })
    }

    /// Render `duration` seconds of the loaded decks through the master chain
    /// offline. Resolves with the WAV bytes as a `Uint8Array`.
    #[wasm_bindgen(js_name = renderOfflineWav)]
    pub fn render_offline_wav(&mut self, duration: f64) -> Result<js_sys::Promise, JsValue> {
        let live = self
            .live()
            .ok_or_else(|| JsValue::from_str("engine unavailable"))?;
        let sample_rate = live.graph.context().sample_rate();
        let mut sources = Vec::new();
        for id in DeckId::ALL {
            let deck = live.mixer.deck_mut(id);
            let position = deck.progress().position;
            let Some(buffer) = deck.buffer() else {
                continue;
            };
            let channel = deck.channel();
            sources.push(OfflineSource {
                buffer: buffer.clone(),
                offset: position,
                rate: deck.rate(),
                gain: channel.gain * channel.crossfade_gain,
            });
        }
        Ok(wasm_bindgen_futures::future_to_promise(async move {
            let bytes = recording::render_offline_wav(sample_rate, duration, sources)
                .await
                .map_err(js_err)?;
            Ok(js_sys::Uint8Array::from(bytes.as_slice()).into())
        }))
    }

    // ---------------- Lifecycle ----------------

    /// Stop everything and close the context. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.scheduler.stop();
            live.mixer.teardown();
            live.graph.release_capture();
        }
        if let Some(mut t) = self.transport_mut() {
            t.clear_on_step();
        }
        if let Some(ctx) = self.ctx.take() {
            if let Err(e) = ctx.close() {
                log::debug!("[engine] context close failed: {:?}", e);
            }
            log::info!("[engine] disposed");
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[wasm_bindgen(js_name = midiToFreq)]
pub fn midi_to_freq(midi: f32) -> f32 {
    crate::core::midi_to_hz(midi)
}

#[wasm_bindgen(js_name = decodeAudio)]
pub fn decode_audio(ctx: web::BaseAudioContext, bytes: Vec<u8>) -> js_sys::Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        crate::loader::decode_audio(&ctx, &bytes)
            .await
            .map(JsValue::from)
            .map_err(js_err)
    })
}

#[wasm_bindgen(js_name = fetchAudio)]
pub fn fetch_audio(url: String) -> js_sys::Promise {
    wasm_bindgen_futures::future_to_promise(async move {
        let bytes = crate::loader::fetch_audio(&url).await.map_err(js_err)?;
        Ok(js_sys::Uint8Array::from(bytes.as_slice()).into())
    })
}
