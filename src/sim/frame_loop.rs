//! Per-tick pipeline coordinator. The step order is fixed and must never be
//! reordered: control vector -> flight update -> physics step -> transform
//! sync -> environment -> telemetry -> render. Render runs even while
//! paused so the overlay stays visible.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::SimConfig;
use crate::controller::flight::FlightController;
use crate::controller::input::ControlVector;
use crate::events::{AppEvent, EventBus};
use crate::sim::clock::SimulationClock;
use crate::sim::physics::{PhysicsWorld, SharedBody};
use crate::sim::render::{ObjectId, Renderer};
use crate::telemetry::TelemetrySnapshot;

pub struct FrameLoop {
    clock: SimulationClock,
    flight: FlightController,
    world: Box<dyn PhysicsWorld>,
    body: SharedBody,
    renderer: Box<dyn Renderer>,
    drone_object: ObjectId,
    cfg: SimConfig,
    /// Latest normalized sample from the input poll timer; the loop only
    /// ever reads the most recent one.
    latest_control: ControlVector,
}

impl FrameLoop {
    pub fn new(
        cfg: SimConfig,
        flight: FlightController,
        world: Box<dyn PhysicsWorld>,
        body: SharedBody,
        renderer: Box<dyn Renderer>,
        drone_object: ObjectId,
    ) -> Self {
        let clock = SimulationClock::new(cfg.max_frame_dt());
        Self {
            clock,
            flight,
            world,
            body,
            renderer,
            drone_object,
            cfg,
            latest_control: ControlVector::default(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    /// Idempotent; a stopped loop ignores further ticks except render.
    pub fn stop(&mut self) {
        self.clock.stop();
    }

    pub fn armed(&self) -> bool {
        self.flight.armed()
    }

    /// Out-of-band commands, called between ticks by the state machine.
    pub fn toggle_armed(&mut self) {
        self.flight.toggle_armed();
    }

    pub fn reset_drone(&mut self) {
        self.flight.reset();
        self.body
            .borrow_mut()
            .set_transform(self.cfg.drone.start_position, glam::Quat::IDENTITY);
        tracing::info!("drone reset");
    }

    pub fn apply_configuration(&mut self, cfg: &SimConfig) {
        self.cfg = cfg.clone();
        self.flight.apply_configuration(cfg);
    }

    /// Store the newest control sample; overwrites any unread one.
    pub fn set_control(&mut self, vector: ControlVector) {
        self.latest_control = vector;
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let b = self.body.borrow();
        TelemetrySnapshot::capture(
            b.position(),
            b.velocity(),
            b.orientation(),
            self.flight.armed(),
            self.latest_control,
        )
    }

    /// One frame. `now_ms` is performance.now()-style wall time.
    pub fn tick(&mut self, now_ms: f64, bus: &Rc<RefCell<EventBus>>) {
        if self.clock.is_paused() || !self.clock.is_running() {
            // Everything but render is skipped: no PID accumulation, no
            // physics, no telemetry.
            self.renderer.render();
            return;
        }

        let dt = self.clock.tick(now_ms);
        if dt > 0.0 {
            let control = self.latest_control;
            self.flight.update(dt, &control, &mut *self.body.borrow_mut());
            self.world.step(self.cfg.sim.fixed_dt, dt, self.cfg.sim.max_substeps);
        }

        {
            let b = self.body.borrow();
            self.renderer
                .sync_transform(self.drone_object, b.position(), b.orientation());
        }
        self.renderer.update_environment(dt);

        bus.borrow_mut().publish(AppEvent::Telemetry(self.snapshot()));

        self.renderer.render();
    }

    pub fn renderer_mut(&mut self) -> &mut dyn Renderer {
        &mut *self.renderer
    }

    pub fn body(&self) -> &SharedBody {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::physics::{BodyDesc, KinematicWorld, PhysicsWorld};
    use crate::sim::render::NullRenderer;
    use glam::Vec3;

    fn build_loop(cfg: &SimConfig) -> (FrameLoop, Rc<RefCell<NullRenderer>>) {
        let mut world = KinematicWorld::without_gravity();
        let body = world
            .create_body(&BodyDesc::from_config(&cfg.drone))
            .unwrap();
        let renderer = Rc::new(RefCell::new(NullRenderer::new()));
        let drone = renderer.borrow_mut().add_object("drone");
        let fl = FrameLoop::new(
            cfg.clone(),
            FlightController::new(cfg),
            Box::new(world),
            body,
            Box::new(renderer.clone()),
            drone,
        );
        (fl, renderer)
    }

    fn telemetry_counter(bus: &Rc<RefCell<EventBus>>) -> Rc<RefCell<u32>> {
        let count = Rc::new(RefCell::new(0u32));
        let count2 = count.clone();
        bus.borrow_mut().subscribe(Box::new(move |ev| {
            if matches!(ev, AppEvent::Telemetry(_)) {
                *count2.borrow_mut() += 1;
            }
        }));
        count
    }

    #[test]
    fn armed_thrust_climbs_and_publishes_telemetry() {
        let cfg = SimConfig::default();
        let (mut fl, _renderer) = build_loop(&cfg);
        fl.toggle_armed();
        fl.set_control(ControlVector {
            thrust: 1.0,
            ..ControlVector::default()
        });
        let bus = EventBus::shared();
        let count = telemetry_counter(&bus);
        let mut now = 0.0;
        for _ in 0..30 {
            now += 16.0;
            fl.tick(now, &bus);
        }
        EventBus::pump(&bus);
        let snap = fl.snapshot();
        assert!(snap.armed);
        assert!(snap.velocity.y > 0.0);
        assert_eq!(*count.borrow(), 30);
    }

    #[test]
    fn paused_ticks_render_but_touch_nothing() {
        let cfg = SimConfig::default();
        let (mut fl, renderer) = build_loop(&cfg);
        fl.toggle_armed();
        fl.set_control(ControlVector {
            thrust: 1.0,
            roll: 1.0,
            ..ControlVector::default()
        });
        let bus = EventBus::shared();
        let count = telemetry_counter(&bus);
        fl.tick(0.0, &bus);
        fl.tick(16.0, &bus);
        let pos_before = fl.body().borrow().position();

        fl.pause();
        let frames_before = renderer.borrow().frames_rendered;
        for i in 0..10 {
            fl.tick(100.0 + i as f64 * 16.0, &bus);
        }
        assert_eq!(fl.body().borrow().position(), pos_before);
        // Render kept running for the overlay
        assert_eq!(renderer.borrow().frames_rendered, frames_before + 10);

        // No telemetry while paused
        EventBus::pump(&bus);
        let paused_baseline = *count.borrow();
        fl.tick(400.0, &bus);
        EventBus::pump(&bus);
        assert_eq!(*count.borrow(), paused_baseline);
    }

    #[test]
    fn resume_does_not_see_the_pause_duration() {
        let cfg = SimConfig::default();
        let (mut fl, _renderer) = build_loop(&cfg);
        fl.toggle_armed();
        fl.set_control(ControlVector {
            thrust: 1.0,
            ..ControlVector::default()
        });
        let bus = EventBus::shared();
        fl.tick(0.0, &bus);
        fl.tick(16.0, &bus);
        fl.pause();
        // Long pause
        fl.tick(60_000.0, &bus);
        fl.resume();
        let v_before = fl.body().borrow().velocity().y;
        // First tick back: fresh baseline, dt = 0, no physics jump
        fl.tick(60_016.0, &bus);
        let v_after = fl.body().borrow().velocity().y;
        assert_eq!(v_before, v_after);
    }

    #[test]
    fn reset_restores_start_pose() {
        let cfg = SimConfig::default();
        let (mut fl, _renderer) = build_loop(&cfg);
        fl.toggle_armed();
        fl.set_control(ControlVector {
            thrust: 1.0,
            pitch: 0.5,
            ..ControlVector::default()
        });
        let bus = EventBus::shared();
        let mut now = 0.0;
        for _ in 0..60 {
            now += 16.0;
            fl.tick(now, &bus);
        }
        assert!(fl.body().borrow().position() != cfg.drone.start_position);
        fl.reset_drone();
        assert_eq!(fl.body().borrow().position(), cfg.drone.start_position);
        assert_eq!(fl.body().borrow().velocity(), Vec3::ZERO);
    }
}
