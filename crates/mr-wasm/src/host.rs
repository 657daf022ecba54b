//! Browser host: real observer, interval timer and load listener.
//!
//! Callbacks hold only a weak reference to the runtime, so dropping the
//! `ContentScript` object releases everything. A callback that finds the
//! runtime already borrowed drops its trigger; the next mutation or tick
//! will run the pass again.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, MutationObserver, MutationObserverInit, Window};

use mr_core::dom::ObserveOptions;
use mr_core::engine::{EngineHost, HostError, RuleEngine};

use crate::dom::{js_message, BrowserDocument};

pub(crate) struct Runtime {
    pub engine: RuleEngine,
    pub host: BrowserHost,
}

pub(crate) type SharedRuntime = Rc<RefCell<Runtime>>;

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

pub(crate) struct BrowserHost {
    window: Window,
    document: Document,
    runtime: Weak<RefCell<Runtime>>,
    observer: Option<(MutationObserver, ObserverCallback)>,
    timer: Option<(i32, Closure<dyn FnMut()>)>,
    load_listener: Option<Closure<dyn FnMut()>>,
}

impl BrowserHost {
    pub fn new(window: Window, document: Document, runtime: Weak<RefCell<Runtime>>) -> Self {
        Self {
            window,
            document,
            runtime,
            observer: None,
            timer: None,
            load_listener: None,
        }
    }
}

fn with_runtime(runtime: &Weak<RefCell<Runtime>>, f: impl FnOnce(&mut RuleEngine, &mut BrowserHost)) {
    let Some(runtime) = runtime.upgrade() else {
        return;
    };
    let Ok(mut guard) = runtime.try_borrow_mut() else {
        log::warn!("Engine busy, dropping trigger");
        return;
    };
    let Runtime { engine, host } = &mut *guard;
    f(engine, host);
}

fn observer_init(options: ObserveOptions) -> MutationObserverInit {
    let init = MutationObserverInit::new();
    init.set_child_list(options.contains(ObserveOptions::CHILD_LIST));
    init.set_subtree(options.contains(ObserveOptions::SUBTREE));
    init.set_character_data(options.contains(ObserveOptions::CHARACTER_DATA));
    init
}

impl EngineHost for BrowserHost {
    type Document = BrowserDocument;

    fn document(&self) -> BrowserDocument {
        BrowserDocument(self.document.clone())
    }

    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn is_loaded(&self) -> bool {
        self.document.ready_state() == "complete"
    }

    fn request_load_signal(&mut self) {
        if self.load_listener.is_some() {
            return;
        }
        let runtime = self.runtime.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            with_runtime(&runtime, |engine, host| {
                engine.on_load(host);
            });
        });
        match self
            .window
            .add_event_listener_with_callback("load", callback.as_ref().unchecked_ref())
        {
            Ok(()) => self.load_listener = Some(callback),
            Err(e) => log::error!("Failed to listen for load: {}", js_message(&e)),
        }
    }

    fn attach_observer(&mut self, targets: &[BrowserDocument], options: ObserveOptions) -> Result<(), HostError> {
        self.detach_observer();

        let runtime = self.runtime.clone();
        let callback: ObserverCallback = Closure::new(move |records: js_sys::Array, _observer: MutationObserver| {
            with_runtime(&runtime, |engine, host| {
                engine.on_mutation(host, records.length() as usize);
            });
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| HostError::Observer(js_message(&e)))?;

        let init = observer_init(options);
        for (index, target) in targets.iter().enumerate() {
            let Some(body) = target.body() else {
                continue;
            };
            if let Err(e) = observer.observe_with_options(&body, &init) {
                log::warn!("Could not observe document {}: {}", index, js_message(&e));
            }
        }

        self.observer = Some((observer, callback));
        Ok(())
    }

    fn detach_observer(&mut self) {
        if let Some((observer, _callback)) = self.observer.take() {
            observer.disconnect();
        }
    }

    fn start_timer(&mut self, period_ms: u32) -> Result<(), HostError> {
        self.cancel_timer();

        let runtime = self.runtime.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            with_runtime(&runtime, |engine, host| {
                engine.on_tick(host);
            });
        });
        let handle = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                period_ms as i32,
            )
            .map_err(|e| HostError::Timer(js_message(&e)))?;

        self.timer = Some((handle, callback));
        Ok(())
    }

    fn cancel_timer(&mut self) {
        if let Some((handle, _callback)) = self.timer.take() {
            self.window.clear_interval_with_handle(handle);
        }
    }
}

impl Drop for BrowserHost {
    fn drop(&mut self) {
        self.detach_observer();
        self.cancel_timer();
    }
}
