use crate::core::{tick_shared, Transport};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Repeating `setInterval` timer, cleared when dropped.
pub struct Interval {
    handle: i32,
    _tick: Closure<dyn FnMut()>,
}

impl Interval {
    pub fn new(period_ms: i32, f: impl FnMut() + 'static) -> Result<Self, JsValue> {
        let window = web::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let tick = Closure::wrap(Box::new(f) as Box<dyn FnMut()>);
        let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            period_ms,
        )?;
        Ok(Self {
            handle,
            _tick: tick,
        })
    }
}

impl Drop for Interval {
    fn drop(&mut self) {
        if let Some(w) = web::window() {
            w.clear_interval_with_handle(self.handle);
        }
    }
}

/// Drives a [`Transport`] from a lookahead timer on the audio clock.
///
/// The timer only exists while the transport runs; stopping drops it.
pub struct Scheduler {
    ctx: web::AudioContext,
    transport: Rc<RefCell<Transport>>,
    interval: Option<Interval>,
}

impl Scheduler {
    pub fn new(ctx: web::AudioContext, transport: Rc<RefCell<Transport>>) -> Self {
        Self {
            ctx,
            transport,
            interval: None,
        }
    }

    /// Start the transport. The first tick runs as a queued task so the step
    /// callback never fires while the caller still holds the engine.
    pub fn start(&mut self) {
        let period_ms = {
            let mut t = self.transport.borrow_mut();
            if !t.start(self.ctx.current_time()) {
                return;
            }
            t.config().lookahead_interval_ms
        };
        let (ctx, transport) = (self.ctx.clone(), self.transport.clone());
        wasm_bindgen_futures::spawn_local(async move {
            tick_shared(&transport, ctx.current_time());
        });
        let ctx = self.ctx.clone();
        let transport = self.transport.clone();
        let interval = Interval::new(period_ms, move || {
            tick_shared(&transport, ctx.current_time());
        });
        match interval {
            Ok(i) => self.interval = Some(i),
            Err(e) => {
                log::error!("[scheduler] setInterval failed: {:?}", e);
                self.transport.borrow_mut().stop();
            }
        }
    }

    pub fn stop(&mut self) {
        self.interval = None;
        self.transport.borrow_mut().stop();
    }

    /// Stop and rewind to the loop start.
    pub fn reset(&mut self) {
        self.interval = None;
        self.transport.borrow_mut().reset();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.interval = None;
        if let Ok(mut t) = self.transport.try_borrow_mut() {
            t.stop();
        }
    }
}
