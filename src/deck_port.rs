use crate::audio::{ramp, DeckNodes};
use crate::core::{AudioData, ChannelParam, DeckBackend, EndedNotifier, SourceRequest};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

impl AudioData for web::AudioBuffer {
    fn duration(&self) -> f64 {
        web::AudioBuffer::duration(self)
    }
}

/// A started buffer source plus the `onended` handler that must outlive it.
pub struct WebSource {
    node: web::AudioBufferSourceNode,
    _on_ended: Closure<dyn FnMut()>,
}

/// Deck backend on a WebAudio context, feeding one channel strip.
pub struct WebDeck {
    ctx: web::AudioContext,
    nodes: DeckNodes,
}

impl WebDeck {
    pub fn new(ctx: web::AudioContext, nodes: DeckNodes) -> Self {
        Self { ctx, nodes }
    }
}

impl DeckBackend for WebDeck {
    type Buffer = web::AudioBuffer;
    type Source = WebSource;

    fn current_time(&self) -> f64 {
        self.ctx.current_time()
    }

    fn start_source(
        &mut self,
        buffer: &web::AudioBuffer,
        request: &SourceRequest,
        on_ended: EndedNotifier,
    ) -> Option<WebSource> {
        let node = match web::AudioBufferSourceNode::new(&self.ctx) {
            Ok(n) => n,
            Err(e) => {
                log::error!("AudioBufferSourceNode error: {:?}", e);
                return None;
            }
        };
        node.set_buffer(Some(buffer));
        node.playback_rate().set_value(request.rate);
        if let Some((start, end)) = request.loop_region {
            node.set_loop(true);
            node.set_loop_start(start);
            node.set_loop_end(end);
        }

        let mut notifier = Some(on_ended);
        let on_ended = Closure::wrap(Box::new(move || {
            if let Some(n) = notifier.take() {
                n.notify();
            }
        }) as Box<dyn FnMut()>);
        node.set_onended(Some(on_ended.as_ref().unchecked_ref()));

        if let Err(e) = node.connect_with_audio_node(self.nodes.input()) {
            log::error!("deck source connect error: {:?}", e);
            node.set_onended(None);
            return None;
        }
        if let Err(e) = node.start_with_when_and_grain_offset(request.when, request.offset) {
            log::warn!("deck source start error: {:?}", e);
            node.set_onended(None);
            _ = node.disconnect();
            return None;
        }
        Some(WebSource {
            node,
            _on_ended: on_ended,
        })
    }

    fn stop_source(&mut self, source: WebSource) {
        // Detach the handler first: the closure is freed when `source` drops.
        source.node.set_onended(None);
        if let Err(e) = source.node.stop() {
            log::trace!("deck source already stopped: {:?}", e);
        }
        _ = source.node.disconnect();
    }

    fn ramp_source_rate(&mut self, source: &WebSource, rate: f32, time_constant: f64) {
        ramp(
            &source.node.playback_rate(),
            rate,
            self.ctx.current_time(),
            time_constant,
        );
    }

    fn ramp_param(&mut self, param: ChannelParam, value: f32, time_constant: f64) {
        ramp(
            &self.nodes.param(param),
            value,
            self.ctx.current_time(),
            time_constant,
        );
    }
}
