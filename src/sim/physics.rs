//! Boundary to the rigid-body physics collaborator, plus a kinematic
//! stand-in used by the native demo and the tests.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::config::DroneConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsError {
    InvalidMass,
    InvalidExtents,
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::InvalidMass => write!(f, "body mass must be positive and finite"),
            PhysicsError::InvalidExtents => write!(f, "body extents must be positive and finite"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub mass: f32,
    pub half_extents: Vec3,
    pub position: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl BodyDesc {
    pub fn from_config(cfg: &DroneConfig) -> Self {
        Self {
            mass: cfg.mass,
            half_extents: cfg.half_extents,
            position: cfg.start_position,
            linear_damping: cfg.linear_damping,
            angular_damping: cfg.angular_damping,
        }
    }
}

/// Read/force access to one rigid body. The solver behind it owns the
/// integration; this crate only reads state and accumulates forces.
pub trait PhysicsBody {
    fn position(&self) -> Vec3;
    fn velocity(&self) -> Vec3;
    /// World frame, like every mainstream solver reports it.
    fn angular_velocity(&self) -> Vec3;
    fn orientation(&self) -> Quat;

    /// `force` and `point` are both in the body's local frame.
    fn apply_local_force(&mut self, force: Vec3, point: Vec3);
    /// World-frame torque, accumulated until the next step.
    fn apply_torque(&mut self, torque_world: Vec3);

    /// Teleport; velocities are zeroed so a reset never carries momentum.
    fn set_transform(&mut self, position: Vec3, orientation: Quat);

    fn vector_to_world_frame(&self, v: Vec3) -> Vec3 {
        self.orientation() * v
    }
    fn vector_to_local_frame(&self, v: Vec3) -> Vec3 {
        self.orientation().conjugate() * v
    }
}

pub type SharedBody = Rc<RefCell<dyn PhysicsBody>>;

/// The solver seam: body creation may fail (fatal to session start), and
/// stepping consumes the wall delta in fixed-size substeps.
pub trait PhysicsWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> Result<SharedBody, PhysicsError>;
    fn step(&mut self, fixed_dt: f32, wall_dt: f32, max_substeps: u32);
}

/// Minimal force-integrating body: no collision, no contacts. Good enough
/// to fly the controller in the demo binary and to observe force/torque in
/// tests; a real solver replaces the whole module via the traits above.
#[derive(Debug)]
pub struct KinematicBody {
    mass: f32,
    inertia: Vec3,
    linear_damping: f32,
    angular_damping: f32,
    position: Vec3,
    velocity: Vec3,
    angular_velocity: Vec3,
    orientation: Quat,
    force_accum: Vec3,
    torque_accum: Vec3,
}

impl KinematicBody {
    pub fn new(desc: &BodyDesc) -> Self {
        // Solid-box inertia from mass and extents
        let d = desc.half_extents * 2.0;
        let k = desc.mass / 12.0;
        let inertia = Vec3::new(
            k * (d.y * d.y + d.z * d.z),
            k * (d.x * d.x + d.z * d.z),
            k * (d.x * d.x + d.y * d.y),
        );
        Self {
            mass: desc.mass,
            inertia,
            linear_damping: desc.linear_damping,
            angular_damping: desc.angular_damping,
            position: desc.position,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            force_accum: Vec3::ZERO,
            torque_accum: Vec3::ZERO,
        }
    }

    /// World-frame force accumulated since the last step.
    pub fn accumulated_force(&self) -> Vec3 {
        self.force_accum
    }

    pub fn accumulated_torque(&self) -> Vec3 {
        self.torque_accum
    }

    fn integrate(&mut self, h: f32, gravity: Vec3) {
        let accel = self.force_accum / self.mass + gravity;
        self.velocity += accel * h;
        self.velocity *= (1.0 - self.linear_damping * h).max(0.0);
        self.position += self.velocity * h;

        let ang_accel = self.torque_accum / self.inertia;
        self.angular_velocity += ang_accel * h;
        self.angular_velocity *= (1.0 - self.angular_damping * h).max(0.0);
        self.orientation = (Quat::from_scaled_axis(self.angular_velocity * h) * self.orientation).normalize();
    }

    fn clear_accumulators(&mut self) {
        self.force_accum = Vec3::ZERO;
        self.torque_accum = Vec3::ZERO;
    }
}

impl PhysicsBody for KinematicBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn orientation(&self) -> Quat {
        self.orientation
    }

    fn apply_local_force(&mut self, force: Vec3, point: Vec3) {
        let world_force = self.orientation * force;
        self.force_accum += world_force;
        if point != Vec3::ZERO {
            self.torque_accum += (self.orientation * point).cross(world_force);
        }
    }

    fn apply_torque(&mut self, torque_world: Vec3) {
        self.torque_accum += torque_world;
    }

    fn set_transform(&mut self, position: Vec3, orientation: Quat) {
        self.position = position;
        self.orientation = orientation.normalize();
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
        self.clear_accumulators();
    }
}

pub struct KinematicWorld {
    gravity: Vec3,
    bodies: Vec<Rc<RefCell<KinematicBody>>>,
}

impl KinematicWorld {
    pub fn new() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            bodies: Vec::new(),
        }
    }

    /// Weightless variant; tests use it to see control forces in isolation.
    pub fn without_gravity() -> Self {
        Self {
            gravity: Vec3::ZERO,
            bodies: Vec::new(),
        }
    }
}

impl Default for KinematicWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld for KinematicWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> Result<SharedBody, PhysicsError> {
        if !desc.mass.is_finite() || desc.mass <= 0.0 {
            return Err(PhysicsError::InvalidMass);
        }
        if !desc.half_extents.is_finite() || desc.half_extents.min_element() <= 0.0 {
            return Err(PhysicsError::InvalidExtents);
        }
        let body = Rc::new(RefCell::new(KinematicBody::new(desc)));
        self.bodies.push(body.clone());
        Ok(body)
    }

    fn step(&mut self, fixed_dt: f32, wall_dt: f32, max_substeps: u32) {
        if !wall_dt.is_finite() || wall_dt <= 0.0 || fixed_dt <= 0.0 {
            return;
        }
        let mut remaining = wall_dt;
        for _ in 0..max_substeps.max(1) {
            let h = fixed_dt.min(remaining);
            if h <= 0.0 {
                break;
            }
            for body in &self.bodies {
                let mut b = body.borrow_mut();
                b.integrate(h, self.gravity);
            }
            remaining -= h;
        }
        for body in &self.bodies {
            body.borrow_mut().clear_accumulators();
        }
    }
}
