//! Application state machine: Menu -> Loading -> Simulating <-> Paused ->
//! Menu, driven entirely by bus events.
//!
//! The core invariant: the outgoing state's subscriptions are destroyed
//! before the incoming state's are created, so a stale event can never
//! reach a listener of a state that is no longer active.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::app::session::Session;
use crate::config::SimConfig;
use crate::controller::input::ButtonAction;
use crate::events::{AppEvent, EventBus, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Menu,
    Loading,
    Simulating,
    Paused,
}

/// Starts the asynchronous session build. Completion is delivered as a
/// `LoadFinished` message into the single-threaded loop: the built session
/// is parked in `slot`, never carried inside the event itself.
pub trait Loader {
    fn begin(
        &mut self,
        cfg: SimConfig,
        slot: Rc<RefCell<Option<Session>>>,
        bus: Rc<RefCell<EventBus>>,
    );
}

/// Builds the session on the spot; the wasm shell substitutes a loader
/// that awaits asset futures before finishing.
pub struct SyncLoader {
    factory: Box<dyn FnMut(&SimConfig) -> Result<Session, String>>,
}

impl SyncLoader {
    pub fn new(factory: Box<dyn FnMut(&SimConfig) -> Result<Session, String>>) -> Self {
        Self { factory }
    }
}

impl Loader for SyncLoader {
    fn begin(
        &mut self,
        cfg: SimConfig,
        slot: Rc<RefCell<Option<Session>>>,
        bus: Rc<RefCell<EventBus>>,
    ) {
        let result = (self.factory)(&cfg);
        let message = match result {
            Ok(session) => {
                *slot.borrow_mut() = Some(session);
                Ok(())
            }
            Err(e) => Err(e),
        };
        bus.borrow_mut().publish(AppEvent::LoadFinished(message));
    }
}

pub struct AppMachine {
    state: AppState,
    cfg: SimConfig,
    bus: Rc<RefCell<EventBus>>,
    loader: Box<dyn Loader>,
    /// Handoff slot filled by the loader.
    slot: Rc<RefCell<Option<Session>>>,
    session: Option<Session>,
    /// The active state's bus subscriptions; drained on every exit.
    subs: Vec<SubscriptionId>,
    menu_error: Option<String>,
    self_ref: Weak<RefCell<AppMachine>>,
}

impl AppMachine {
    pub fn new(
        cfg: SimConfig,
        loader: Box<dyn Loader>,
        bus: Rc<RefCell<EventBus>>,
    ) -> Rc<RefCell<Self>> {
        let machine = Rc::new(RefCell::new(Self {
            state: AppState::Menu,
            cfg: cfg.sanitized(),
            bus,
            loader,
            slot: Rc::new(RefCell::new(None)),
            session: None,
            subs: Vec::new(),
            menu_error: None,
            self_ref: Weak::new(),
        }));
        machine.borrow_mut().self_ref = Rc::downgrade(&machine);
        machine.borrow_mut().enter_current();
        machine
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn menu_error(&self) -> Option<&str> {
        self.menu_error.as_deref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Swap in a new config snapshot; a live session hears about it via
    /// `ConfigChanged` on its own subscription.
    pub fn set_config(&mut self, cfg: SimConfig) {
        self.cfg = cfg.sanitized();
        self.bus.borrow_mut().publish(AppEvent::ConfigChanged);
    }

    fn transition(&mut self, to: AppState) {
        tracing::info!(from = ?self.state, to = ?to, "app state transition");
        self.exit_current();
        self.state = to;
        self.enter_current();
    }

    /// Unsubscribe everything the outgoing state registered. Always runs
    /// to completion before the next state's `enter`.
    fn exit_current(&mut self) {
        let mut bus = self.bus.borrow_mut();
        for id in self.subs.drain(..) {
            bus.unsubscribe(id);
        }
    }

    fn enter_current(&mut self) {
        match self.state {
            AppState::Menu => {
                if let Some(err) = &self.menu_error {
                    tracing::warn!(error = %err, "returned to menu after failure");
                }
                self.subscribe(|m, ev| m.on_menu_event(ev));
            }
            AppState::Loading => {
                self.subscribe(|m, ev| m.on_loading_event(ev));
                // Kick the async build after the listener exists, so a
                // synchronous loader's completion still gets heard.
                let cfg = self.cfg.clone();
                let slot = self.slot.clone();
                let bus = self.bus.clone();
                self.loader.begin(cfg, slot, bus);
            }
            AppState::Simulating => {
                self.menu_error = None;
                if let Some(session) = self.session.as_mut() {
                    session.resume();
                }
                self.subscribe(|m, ev| m.on_simulating_event(ev));
                self.subscribe(|_, ev| {
                    if let AppEvent::Telemetry(snap) = ev {
                        tracing::trace!(
                            altitude = snap.altitude,
                            speed = snap.speed,
                            armed = snap.armed,
                            "telemetry"
                        );
                    }
                });
            }
            AppState::Paused => {
                if let Some(session) = self.session.as_mut() {
                    session.pause();
                }
                self.subscribe(|m, ev| m.on_paused_event(ev));
            }
        }
    }

    fn subscribe(&mut self, mut handler: impl FnMut(&mut AppMachine, &AppEvent) + 'static) {
        let weak = self.self_ref.clone();
        let id = self.bus.borrow_mut().subscribe(Box::new(move |ev| {
            if let Some(machine) = weak.upgrade() {
                handler(&mut *machine.borrow_mut(), ev);
            }
        }));
        self.subs.push(id);
    }

    fn on_menu_event(&mut self, ev: &AppEvent) {
        match ev {
            AppEvent::StartRequested => self.transition(AppState::Loading),
            // A load that finished after the user already bailed out
            AppEvent::LoadFinished(_) => {
                self.slot.borrow_mut().take();
            }
            AppEvent::ResumeRequested
            | AppEvent::MenuRequested
            | AppEvent::PointerLockChanged(_)
            | AppEvent::EscapePressed
            | AppEvent::CanvasClicked
            | AppEvent::Button(_)
            | AppEvent::ConfigChanged
            | AppEvent::Telemetry(_) => {}
        }
    }

    fn on_loading_event(&mut self, ev: &AppEvent) {
        match ev {
            AppEvent::LoadFinished(Ok(())) => {
                // Take before matching so the slot borrow is released here
                let taken = self.slot.borrow_mut().take();
                match taken {
                    Some(session) => {
                        self.session = Some(session);
                        self.transition(AppState::Simulating);
                    }
                    None => {
                        self.menu_error = Some("loader finished without a session".to_string());
                        self.transition(AppState::Menu);
                    }
                }
            }
            AppEvent::LoadFinished(Err(e)) => {
                tracing::error!(error = %e, "session load failed");
                self.menu_error = Some(e.clone());
                self.transition(AppState::Menu);
            }
            AppEvent::StartRequested
            | AppEvent::ResumeRequested
            | AppEvent::MenuRequested
            | AppEvent::PointerLockChanged(_)
            | AppEvent::EscapePressed
            | AppEvent::CanvasClicked
            | AppEvent::Button(_)
            | AppEvent::ConfigChanged
            | AppEvent::Telemetry(_) => {}
        }
    }

    fn on_simulating_event(&mut self, ev: &AppEvent) {
        match ev {
            AppEvent::EscapePressed => self.transition(AppState::Paused),
            AppEvent::PointerLockChanged(false) => {
                // Pointer-lock notifications can straggle; only pause if
                // the machine is actually still simulating.
                if self.state == AppState::Simulating {
                    self.transition(AppState::Paused);
                }
            }
            AppEvent::Button(edge) => {
                if let Some(session) = self.session.as_mut() {
                    match edge.action {
                        ButtonAction::ArmDisarmToggle => session.toggle_armed(),
                        ButtonAction::Reset => session.reset_drone(),
                    }
                }
            }
            AppEvent::ConfigChanged => {
                let cfg = self.cfg.clone();
                if let Some(session) = self.session.as_mut() {
                    session.apply_configuration(&cfg);
                }
            }
            AppEvent::PointerLockChanged(true)
            | AppEvent::StartRequested
            | AppEvent::ResumeRequested
            | AppEvent::MenuRequested
            | AppEvent::LoadFinished(_)
            | AppEvent::CanvasClicked
            | AppEvent::Telemetry(_) => {}
        }
    }

    fn on_paused_event(&mut self, ev: &AppEvent) {
        match ev {
            // All three resume inputs funnel through the same transition
            AppEvent::ResumeRequested | AppEvent::EscapePressed | AppEvent::CanvasClicked => {
                self.transition(AppState::Simulating);
            }
            AppEvent::MenuRequested => {
                // Full teardown before Menu's enter runs
                if let Some(mut session) = self.session.take() {
                    session.dispose();
                }
                self.slot.borrow_mut().take();
                self.transition(AppState::Menu);
            }
            AppEvent::StartRequested
            | AppEvent::LoadFinished(_)
            | AppEvent::PointerLockChanged(_)
            | AppEvent::Button(_)
            | AppEvent::ConfigChanged
            | AppEvent::Telemetry(_) => {}
        }
    }
}
