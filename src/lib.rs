// Re-export all public modules so they can be used from main.rs
pub mod logging;

pub mod config;
pub mod events;
pub mod telemetry;

pub mod app;
pub mod controller;
pub mod sim;

pub use app::{AppMachine, AppState, Session};
pub use config::SimConfig;
pub use events::{AppEvent, EventBus};

// Browser shell: DOM listeners, the requestAnimationFrame loop and the
// input-poll interval. Everything below here is wasm-only plumbing; the
// simulation core above is platform-neutral.
#[cfg(target_arch = "wasm32")]
mod web {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
    use web_sys::{Document, Event, HtmlCanvasElement, KeyboardEvent, MouseEvent, Window};

    use crate::app::states::Loader;
    use crate::app::{AppMachine, Session};
    use crate::config::SimConfig;
    use crate::controller::gamepad::GamepadSnapshot;
    use crate::controller::input::KeyboardState;
    use crate::events::{AppEvent, EventBus};
    use crate::logging;
    use crate::sim::physics::KinematicWorld;
    use crate::sim::render::NullRenderer;

    #[wasm_bindgen(start)]
    pub fn start() -> Result<(), JsValue> {
        logging::init();
        let (window, document, canvas) = init_canvas(800, 600)?;
        setup_app(&window, &document, &canvas)
    }

    /// Wire the whole application together. The physics world and renderer
    /// used here are the built-in stand-ins; an embedding page swaps its
    /// own collaborators into `WebLoader`.
    fn setup_app(
        window: &Window,
        document: &Document,
        canvas: &HtmlCanvasElement,
    ) -> Result<(), JsValue> {
        let bus = EventBus::shared();
        let keyboard = Rc::new(RefCell::new(KeyboardState::new()));
        let cfg = SimConfig::default();

        let loader = WebLoader {
            keyboard: keyboard.clone(),
        };
        let machine = AppMachine::new(cfg.clone(), Box::new(loader), bus.clone());

        setup_input_listeners(document, window, canvas, keyboard, bus.clone())?;

        // Session-lifetime timers: started when a load completes, stopped
        // when the session is torn down.
        let input_poll = InputPoll::new(window.clone(), cfg.input.poll_interval_ms as i32);
        let frame_driver = FrameDriver::new(window.clone());
        {
            let machine_for_poll = machine.clone();
            let bus_for_poll = bus.clone();
            let poll_window = window.clone();
            input_poll.set_callback(move || {
                let pads = poll_gamepads(&poll_window);
                if let Some(session) = machine_for_poll.borrow_mut().session_mut() {
                    session.input_tick(&pads, &bus_for_poll);
                }
                EventBus::pump(&bus_for_poll);
            });

            let machine_for_frame = machine.clone();
            let bus_for_frame = bus.clone();
            let frame_window = window.clone();
            frame_driver.set_callback(move || {
                let now = frame_window.performance().map(|p| p.now()).unwrap_or(0.0);
                if let Some(session) = machine_for_frame.borrow_mut().session_mut() {
                    session.frame_tick(now, &bus_for_frame);
                }
                EventBus::pump(&bus_for_frame);
            });
        }

        // The shell's own subscription manages timer lifetime around the
        // machine's transitions.
        {
            let input_poll = input_poll.clone();
            let frame_driver = frame_driver.clone();
            let _shell_sub = bus.borrow_mut().subscribe(Box::new(move |ev| match ev {
                AppEvent::LoadFinished(Ok(())) => {
                    input_poll.start();
                    frame_driver.start();
                }
                AppEvent::MenuRequested => {
                    input_poll.stop();
                    frame_driver.stop();
                }
                _ => {}
            }));
        }

        // Until the external menu DOM is wired in, go straight to a session
        bus.borrow_mut().publish(AppEvent::StartRequested);
        EventBus::pump(&bus);
        Ok(())
    }

    /// Builds the session on a microtask so asset futures can await here
    /// without suspending the event loop's stack.
    struct WebLoader {
        keyboard: Rc<RefCell<KeyboardState>>,
    }

    impl Loader for WebLoader {
        fn begin(
            &mut self,
            cfg: SimConfig,
            slot: Rc<RefCell<Option<Session>>>,
            bus: Rc<RefCell<EventBus>>,
        ) {
            let keyboard = self.keyboard.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = Session::build(
                    &cfg,
                    Box::new(KinematicWorld::new()),
                    Box::new(NullRenderer::new()),
                    keyboard,
                );
                let message = match result {
                    Ok(session) => {
                        *slot.borrow_mut() = Some(session);
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                bus.borrow_mut().publish(AppEvent::LoadFinished(message));
                // No timer may be running yet; deliver right here
                EventBus::pump(&bus);
            });
        }
    }

    /// Read every connected pad once. Absent or partial devices come back
    /// as empty/neutral snapshots, never as errors.
    fn poll_gamepads(window: &Window) -> Vec<GamepadSnapshot> {
        let mut out = Vec::new();
        let list: js_sys::Array = match window.navigator().get_gamepads() {
            Ok(list) => list,
            Err(_) => return out,
        };
        for entry in list.iter() {
            if entry.is_null() || entry.is_undefined() {
                continue;
            }
            let pad: web_sys::Gamepad = entry.unchecked_into();
            let axes: Vec<f64> = pad.axes().iter().map(|v| v.as_f64().unwrap_or(0.0)).collect();
            let buttons: Vec<bool> = pad
                .buttons()
                .iter()
                .map(|b| b.unchecked_into::<web_sys::GamepadButton>().pressed())
                .collect();
            out.push(GamepadSnapshot {
                index: pad.index() as usize,
                axes,
                buttons,
                connected: pad.connected(),
            });
        }
        out
    }

    /// Fixed-interval input poll, decoupled from the frame loop.
    #[derive(Clone)]
    struct InputPoll {
        window: Window,
        interval_ms: i32,
        handle: Rc<RefCell<Option<i32>>>,
        callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
    }

    impl InputPoll {
        fn new(window: Window, interval_ms: i32) -> Self {
            Self {
                window,
                interval_ms,
                handle: Rc::new(RefCell::new(None)),
                callback: Rc::new(RefCell::new(None)),
            }
        }

        fn set_callback(&self, f: impl FnMut() + 'static) {
            *self.callback.borrow_mut() = Some(Closure::wrap(Box::new(f) as Box<dyn FnMut()>));
        }

        fn start(&self) {
            if self.handle.borrow().is_some() {
                return;
            }
            let cb = self.callback.borrow();
            let Some(closure) = cb.as_ref() else { return };
            if let Ok(id) = self.window.set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                self.interval_ms,
            ) {
                *self.handle.borrow_mut() = Some(id);
            }
        }

        /// Idempotent; part of session teardown.
        fn stop(&self) {
            if let Some(id) = self.handle.borrow_mut().take() {
                self.window.clear_interval_with_handle(id);
            }
        }
    }

    /// Self-rescheduling requestAnimationFrame driver with cancelation of
    /// the pending callback on stop.
    #[derive(Clone)]
    struct FrameDriver {
        window: Window,
        raf_id: Rc<RefCell<Option<i32>>>,
        callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
        tick: Rc<RefCell<Option<Box<dyn FnMut()>>>>,
    }

    impl FrameDriver {
        fn new(window: Window) -> Self {
            Self {
                window,
                raf_id: Rc::new(RefCell::new(None)),
                callback: Rc::new(RefCell::new(None)),
                tick: Rc::new(RefCell::new(None)),
            }
        }

        fn set_callback(&self, f: impl FnMut() + 'static) {
            *self.tick.borrow_mut() = Some(Box::new(f));
        }

        fn start(&self) {
            if self.raf_id.borrow().is_some() {
                return;
            }
            let window = self.window.clone();
            let raf_id = self.raf_id.clone();
            let tick = self.tick.clone();
            let callback = self.callback.clone();

            let closure = {
                let callback = callback.clone();
                Closure::wrap(Box::new(move || {
                    if let Some(f) = tick.borrow_mut().as_mut() {
                        f();
                    }
                    // Reschedule only while not stopped
                    if raf_id.borrow().is_some() {
                        let cb = callback.borrow();
                        if let Some(closure) = cb.as_ref() {
                            if let Ok(id) =
                                window.request_animation_frame(closure.as_ref().unchecked_ref())
                            {
                                *raf_id.borrow_mut() = Some(id);
                            }
                        }
                    }
                }) as Box<dyn FnMut()>)
            };
            *self.callback.borrow_mut() = Some(closure);

            let cb = self.callback.borrow();
            if let Some(closure) = cb.as_ref() {
                if let Ok(id) = self
                    .window
                    .request_animation_frame(closure.as_ref().unchecked_ref())
                {
                    *self.raf_id.borrow_mut() = Some(id);
                }
            }
        }

        /// Idempotent; cancels the pending next-tick callback.
        fn stop(&self) {
            if let Some(id) = self.raf_id.borrow_mut().take() {
                let _ = self.window.cancel_animation_frame(id);
            }
        }
    }

    /// Setup all input event listeners; the DOM menu itself is external.
    fn setup_input_listeners(
        document: &Document,
        window: &Window,
        canvas: &HtmlCanvasElement,
        keyboard: Rc<RefCell<KeyboardState>>,
        bus: Rc<RefCell<EventBus>>,
    ) -> Result<(), JsValue> {
        // Keyboard down
        {
            let keyboard = keyboard.clone();
            let bus = bus.clone();
            let document_for_exit = document.clone();
            let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                let key = e.key();
                if key == "Escape" {
                    document_for_exit.exit_pointer_lock();
                    bus.borrow_mut().publish(AppEvent::EscapePressed);
                    EventBus::pump(&bus);
                    return;
                }
                if matches!(
                    key.as_str(),
                    "w" | "a" | "s" | "d" | "q" | "e" | "W" | "A" | "S" | "D" | "Q" | "E"
                        | " " | "Shift" | "Control"
                ) {
                    e.prevent_default();
                }
                keyboard.borrow_mut().press(key);
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
            keydown.forget();
        }

        // Keyboard up
        {
            let keyboard = keyboard.clone();
            let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
                keyboard.borrow_mut().release(&e.key());
            }) as Box<dyn FnMut(KeyboardEvent)>);
            document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
            keyup.forget();
        }

        // Focus loss - clear all keys
        {
            let keyboard = keyboard.clone();
            let blur = Closure::wrap(Box::new(move |_e: Event| {
                keyboard.borrow_mut().clear();
            }) as Box<dyn FnMut(Event)>);
            window.add_event_listener_with_callback("blur", blur.as_ref().unchecked_ref())?;
            blur.forget();
        }

        // Visibility change - clear all keys
        {
            let keyboard = keyboard.clone();
            let visibility = Closure::wrap(Box::new(move |_e: Event| {
                keyboard.borrow_mut().clear();
            }) as Box<dyn FnMut(Event)>);
            document
                .add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref())?;
            visibility.forget();
        }

        // Pointer lock change feeds the state machine
        {
            let bus = bus.clone();
            let doc_pl = document.clone();
            let plc = Closure::wrap(Box::new(move |_e: Event| {
                let locked = doc_pl.pointer_lock_element().is_some();
                bus.borrow_mut().publish(AppEvent::PointerLockChanged(locked));
                EventBus::pump(&bus);
            }) as Box<dyn FnMut(Event)>);
            document.add_event_listener_with_callback("pointerlockchange", plc.as_ref().unchecked_ref())?;
            plc.forget();
        }

        // Canvas click: pointer lock + resume path
        {
            let bus = bus.clone();
            let canvas_click = canvas.clone();
            let click = Closure::wrap(Box::new(move |_e: MouseEvent| {
                canvas_click.request_pointer_lock();
                bus.borrow_mut().publish(AppEvent::CanvasClicked);
                EventBus::pump(&bus);
            }) as Box<dyn FnMut(MouseEvent)>);
            canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
            click.forget();
        }

        Ok(())
    }

    fn init_canvas(width: u32, height: u32) -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
        let window = web_sys::window().ok_or(js_error("no global `window`"))?;
        let document = window.document().ok_or(js_error("no document on window"))?;
        let body = document.body().ok_or(js_error("no body on document"))?;
        let canvas_el = document
            .create_element("canvas")?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| js_error("failed to create canvas"))?;
        canvas_el.set_width(width);
        canvas_el.set_height(height);
        body.append_child(&canvas_el)?;
        Ok((window, document, canvas_el))
    }

    fn js_error<E: Into<String>>(msg: E) -> JsValue {
        JsValue::from_str(&msg.into())
    }
}
