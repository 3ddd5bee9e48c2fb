//! Headless demo flight: builds a session against the built-in kinematic
//! world and null renderer, then scripts a short hover so the control
//! stack can be watched through the telemetry log.
//!
//! Run with `cargo run --features native`.

use std::cell::RefCell;
use std::rc::Rc;

use quadsim::app::{AppMachine, AppState, Session, SyncLoader};
use quadsim::config::SimConfig;
use quadsim::controller::input::KeyboardState;
use quadsim::events::{AppEvent, EventBus};
use quadsim::logging;
use quadsim::sim::{KinematicWorld, NullRenderer};

fn main() {
    logging::init();

    let bus = EventBus::shared();
    let keyboard = Rc::new(RefCell::new(KeyboardState::new()));

    let loader_keyboard = keyboard.clone();
    let loader = SyncLoader::new(Box::new(move |cfg: &SimConfig| {
        Session::build(
            cfg,
            Box::new(KinematicWorld::new()),
            Box::new(NullRenderer::new()),
            loader_keyboard.clone(),
        )
    }));

    let machine = AppMachine::new(SimConfig::default(), Box::new(loader), bus.clone());

    // Log every 30th telemetry frame so the output stays readable
    let frame_counter = Rc::new(RefCell::new(0u64));
    {
        let counter = frame_counter.clone();
        let _sub = bus.borrow_mut().subscribe(Box::new(move |ev| {
            if let AppEvent::Telemetry(snap) = ev {
                let mut n = counter.borrow_mut();
                *n += 1;
                if *n % 30 == 0 {
                    tracing::info!(
                        altitude = snap.altitude,
                        speed = snap.speed,
                        roll = snap.euler.roll,
                        pitch = snap.euler.pitch,
                        yaw = snap.euler.yaw,
                        armed = snap.armed,
                        "telemetry"
                    );
                }
            }
        }));
    }

    bus.borrow_mut().publish(AppEvent::StartRequested);
    EventBus::pump(&bus);
    assert_eq!(machine.borrow().state(), AppState::Simulating);

    let mut now_ms = 0.0;

    // Arm, then spool the throttle up with held Shift
    tap_key(&machine, &bus, &keyboard, "f", &mut now_ms);
    keyboard.borrow_mut().press("Shift".to_string());
    run_frames(&machine, &bus, &mut now_ms, 120);

    // Hold the reached thrust level for a couple of seconds
    keyboard.borrow_mut().release("Shift");
    run_frames(&machine, &bus, &mut now_ms, 120);

    // Pause and resume through the state machine, as Escape and a canvas
    // click would in the browser
    bus.borrow_mut().publish(AppEvent::EscapePressed);
    EventBus::pump(&bus);
    assert_eq!(machine.borrow().state(), AppState::Paused);
    run_frames(&machine, &bus, &mut now_ms, 30);

    bus.borrow_mut().publish(AppEvent::CanvasClicked);
    EventBus::pump(&bus);
    assert_eq!(machine.borrow().state(), AppState::Simulating);
    run_frames(&machine, &bus, &mut now_ms, 120);

    // Back to the menu; the session is torn down on the way out
    bus.borrow_mut().publish(AppEvent::EscapePressed);
    bus.borrow_mut().publish(AppEvent::MenuRequested);
    EventBus::pump(&bus);
    assert_eq!(machine.borrow().state(), AppState::Menu);

    tracing::info!(frames = *frame_counter.borrow(), "demo flight complete");
}

/// Advance the loop by `frames` display refreshes at 16ms each, polling
/// input before every frame the way the browser timers interleave.
fn run_frames(
    machine: &Rc<RefCell<AppMachine>>,
    bus: &Rc<RefCell<EventBus>>,
    now_ms: &mut f64,
    frames: u32,
) {
    for _ in 0..frames {
        *now_ms += 16.0;
        if let Some(session) = machine.borrow_mut().session_mut() {
            session.input_tick(&[], bus);
            session.frame_tick(*now_ms, bus);
        }
        EventBus::pump(bus);
    }
}

/// Press and release a key across two input polls so the edge detector
/// sees both flanks.
fn tap_key(
    machine: &Rc<RefCell<AppMachine>>,
    bus: &Rc<RefCell<EventBus>>,
    keyboard: &Rc<RefCell<KeyboardState>>,
    key: &str,
    now_ms: &mut f64,
) {
    keyboard.borrow_mut().press(key.to_string());
    run_frames(machine, bus, now_ms, 1);
    keyboard.borrow_mut().release(key);
    run_frames(machine, bus, now_ms, 1);
}
