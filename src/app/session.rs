//! One flying session: the frame loop plus input normalization, built
//! during Loading and fully disposed before Menu is re-entered. Nothing in
//! here survives into the next session.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::SimConfig;
use crate::controller::flight::FlightController;
use crate::controller::gamepad::GamepadSnapshot;
use crate::controller::input::{InputNormalizer, KeyboardState};
use crate::events::{AppEvent, EventBus};
use crate::sim::frame_loop::FrameLoop;
use crate::sim::physics::{BodyDesc, PhysicsWorld};
use crate::sim::render::{ObjectId, Renderer};

pub struct Session {
    frame_loop: FrameLoop,
    normalizer: InputNormalizer,
    keyboard: Rc<RefCell<KeyboardState>>,
    drone_object: ObjectId,
    camera_object: ObjectId,
    disposed: bool,
}

impl Session {
    /// Build everything a session needs from the external collaborators.
    /// A failing physics-body creation is fatal: the caller rolls Loading
    /// back to Menu instead of entering Simulating with no body.
    pub fn build(
        cfg: &SimConfig,
        mut world: Box<dyn PhysicsWorld>,
        mut renderer: Box<dyn Renderer>,
        keyboard: Rc<RefCell<KeyboardState>>,
    ) -> Result<Self, String> {
        let body = world
            .create_body(&BodyDesc::from_config(&cfg.drone))
            .map_err(|e| format!("physics body creation failed: {e}"))?;

        let drone_object = renderer.add_object("drone");
        let camera_object = renderer.add_object("chase-camera");
        renderer.set_active_camera(camera_object);

        let flight = FlightController::new(cfg);
        let frame_loop = FrameLoop::new(cfg.clone(), flight, world, body, renderer, drone_object);

        tracing::info!("session built");
        Ok(Self {
            frame_loop,
            normalizer: InputNormalizer::new(cfg.input.clone()),
            keyboard,
            drone_object,
            camera_object,
            disposed: false,
        })
    }

    /// One input-poll timer callback. Keeps sampling while paused so no
    /// stale vector greets the resume; edges go out on the bus for the
    /// state machine to interpret.
    pub fn input_tick(&mut self, pads: &[GamepadSnapshot], bus: &Rc<RefCell<EventBus>>) {
        if self.disposed {
            return;
        }
        let sample = {
            let keys = self.keyboard.borrow();
            self.normalizer.poll(&keys, pads)
        };
        self.frame_loop.set_control(sample.vector);
        if !sample.edges.is_empty() {
            let mut bus = bus.borrow_mut();
            for edge in sample.edges {
                bus.publish(AppEvent::Button(edge));
            }
        }
    }

    /// One display-refresh callback.
    pub fn frame_tick(&mut self, now_ms: f64, bus: &Rc<RefCell<EventBus>>) {
        if self.disposed {
            return;
        }
        self.frame_loop.tick(now_ms, bus);
    }

    pub fn pause(&mut self) {
        self.frame_loop.pause();
    }

    pub fn resume(&mut self) {
        self.frame_loop.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.frame_loop.is_paused()
    }

    pub fn armed(&self) -> bool {
        self.frame_loop.armed()
    }

    pub fn toggle_armed(&mut self) {
        self.frame_loop.toggle_armed();
    }

    pub fn reset_drone(&mut self) {
        self.frame_loop.reset_drone();
    }

    /// Distribute a fresh config snapshot to the controller and normalizer.
    pub fn apply_configuration(&mut self, cfg: &SimConfig) {
        self.frame_loop.apply_configuration(cfg);
        self.normalizer.apply_configuration(cfg.input.clone());
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Idempotent teardown: stop the loop, release the renderer objects.
    /// The shell stops the poll timer once `is_disposed` reports true.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.frame_loop.stop();
        let drone = self.drone_object;
        let camera = self.camera_object;
        let renderer = self.frame_loop.renderer_mut();
        renderer.remove_object(drone);
        renderer.remove_object(camera);
        tracing::info!("session disposed");
    }

    pub fn frame_loop(&self) -> &FrameLoop {
        &self.frame_loop
    }

    pub fn frame_loop_mut(&mut self) -> &mut FrameLoop {
        &mut self.frame_loop
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppMachine, AppState, SyncLoader};
    use crate::controller::input::ControlVector;
    use crate::sim::physics::KinematicWorld;
    use crate::sim::render::NullRenderer;

    fn boot() -> (
        Rc<RefCell<AppMachine>>,
        Rc<RefCell<EventBus>>,
        Rc<RefCell<KeyboardState>>,
    ) {
        let bus = EventBus::shared();
        let keyboard = Rc::new(RefCell::new(KeyboardState::new()));
        let kb = keyboard.clone();
        let loader = SyncLoader::new(Box::new(move |cfg: &SimConfig| {
            Session::build(
                cfg,
                Box::new(KinematicWorld::new()),
                Box::new(NullRenderer::new()),
                kb.clone(),
            )
        }));
        let machine = AppMachine::new(SimConfig::default(), Box::new(loader), bus.clone());
        (machine, bus, keyboard)
    }

    fn run_frames(
        machine: &Rc<RefCell<AppMachine>>,
        bus: &Rc<RefCell<EventBus>>,
        now_ms: &mut f64,
        frames: u32,
    ) {
        for _ in 0..frames {
            *now_ms += 16.0;
            if let Some(session) = machine.borrow_mut().session_mut() {
                session.frame_tick(*now_ms, bus);
            }
            EventBus::pump(bus);
        }
    }

    fn altitude(machine: &Rc<RefCell<AppMachine>>) -> f32 {
        let mut m = machine.borrow_mut();
        m.session_mut().unwrap().frame_loop().snapshot().altitude
    }

    #[test]
    fn dispose_releases_every_renderer_object() {
        let cfg = SimConfig::default();
        let renderer = Rc::new(RefCell::new(NullRenderer::new()));
        let keyboard = Rc::new(RefCell::new(KeyboardState::new()));
        let mut session = Session::build(
            &cfg,
            Box::new(KinematicWorld::new()),
            Box::new(renderer.clone()),
            keyboard,
        )
        .unwrap();
        assert_eq!(renderer.borrow().objects.len(), 2);

        session.dispose();
        assert!(
            renderer.borrow().objects.is_empty(),
            "teardown left renderer objects behind: {:?}",
            renderer.borrow().objects
        );
        // Idempotent
        session.dispose();
        assert!(renderer.borrow().objects.is_empty());
    }

    #[test]
    fn armed_thrust_climbs_through_the_whole_stack() {
        let (machine, bus, _keyboard) = boot();
        bus.borrow_mut().publish(AppEvent::StartRequested);
        EventBus::pump(&bus);
        assert_eq!(machine.borrow().state(), AppState::Simulating);

        {
            let mut m = machine.borrow_mut();
            let session = m.session_mut().unwrap();
            session.toggle_armed();
            session.frame_loop_mut().set_control(ControlVector {
                thrust: 0.6,
                ..ControlVector::default()
            });
        }

        let mut now_ms = 0.0;
        let before = altitude(&machine);
        run_frames(&machine, &bus, &mut now_ms, 120);
        let after = altitude(&machine);

        // 0.6 of max thrust beats gravity on the default airframe
        assert!(after > before + 1.0, "no climb: {before} -> {after}");
    }

    #[test]
    fn pausing_freezes_the_simulation_and_resume_has_no_mega_step() {
        let (machine, bus, _keyboard) = boot();
        bus.borrow_mut().publish(AppEvent::StartRequested);
        EventBus::pump(&bus);

        {
            let mut m = machine.borrow_mut();
            let session = m.session_mut().unwrap();
            session.toggle_armed();
            session.frame_loop_mut().set_control(ControlVector {
                thrust: 0.6,
                ..ControlVector::default()
            });
        }
        let mut now_ms = 0.0;
        run_frames(&machine, &bus, &mut now_ms, 60);

        bus.borrow_mut().publish(AppEvent::EscapePressed);
        EventBus::pump(&bus);
        assert_eq!(machine.borrow().state(), AppState::Paused);

        let frozen = altitude(&machine);
        run_frames(&machine, &bus, &mut now_ms, 30);
        assert_eq!(altitude(&machine), frozen);

        // A long pause must not turn into one huge integration step
        now_ms += 5000.0;
        bus.borrow_mut().publish(AppEvent::CanvasClicked);
        EventBus::pump(&bus);
        assert_eq!(machine.borrow().state(), AppState::Simulating);
        run_frames(&machine, &bus, &mut now_ms, 1);
        assert!(
            (altitude(&machine) - frozen).abs() < 1.0,
            "resume integrated a mega-step"
        );
    }

    #[test]
    fn menu_return_disposes_the_session_and_a_restart_is_fresh() {
        let (machine, bus, _keyboard) = boot();
        bus.borrow_mut().publish(AppEvent::StartRequested);
        EventBus::pump(&bus);

        {
            let mut m = machine.borrow_mut();
            let session = m.session_mut().unwrap();
            session.toggle_armed();
            assert!(session.armed());
        }

        bus.borrow_mut().publish(AppEvent::EscapePressed);
        bus.borrow_mut().publish(AppEvent::MenuRequested);
        EventBus::pump(&bus);
        assert_eq!(machine.borrow().state(), AppState::Menu);
        assert!(machine.borrow_mut().session_mut().is_none());

        bus.borrow_mut().publish(AppEvent::StartRequested);
        EventBus::pump(&bus);
        assert_eq!(machine.borrow().state(), AppState::Simulating);
        let mut m = machine.borrow_mut();
        let session = m.session_mut().unwrap();
        assert!(!session.armed(), "new session inherited armed state");
    }
}
