//! Rate-mode flight controller: arm gate, thrust, and the three-axis PID
//! bank, with local/world frame conversion at the physics boundary.

use glam::Vec3;

use crate::config::SimConfig;
use crate::controller::input::ControlVector;
use crate::controller::pid::Pid;
use crate::sim::physics::PhysicsBody;

/// Axis convention, fixed for the whole crate:
///
///   local X = pitch, local Y = yaw, local Z = roll.
///
/// Full positive stick commands a positive angular rate about the matching
/// local axis. Permuting these silently inverts or cross-couples control;
/// the axis-isolation test below pins the mapping down.
#[derive(Debug)]
pub struct FlightController {
    armed: bool,
    pitch_pid: Pid,
    yaw_pid: Pid,
    roll_pid: Pid,
    max_thrust: f32,
    /// rad/s at full stick, component order: x=pitch, y=yaw, z=roll.
    max_rates: Vec3,
    /// Transient diagnostics, overwritten every update.
    last_torque_world: Vec3,
}

impl FlightController {
    pub fn new(cfg: &SimConfig) -> Self {
        let p = &cfg.pid;
        Self {
            armed: false,
            pitch_pid: Pid::new(p.pitch, p.integral_limit, p.output_limit),
            yaw_pid: Pid::new(p.yaw, p.integral_limit, p.output_limit),
            roll_pid: Pid::new(p.roll, p.integral_limit, p.output_limit),
            max_thrust: cfg.drone.max_thrust,
            max_rates: Vec3::new(
                cfg.rates.max_pitch_deg.to_radians(),
                cfg.rates.max_yaw_deg.to_radians(),
                cfg.rates.max_roll_deg.to_radians(),
            ),
            last_torque_world: Vec3::ZERO,
        }
    }

    pub fn armed(&self) -> bool {
        self.armed
    }

    pub fn arm(&mut self) {
        if !self.armed {
            self.armed = true;
            tracing::info!("armed");
        }
    }

    /// Disarm kills all force/torque output and clears PID state so a
    /// re-arm starts from a clean accumulator.
    pub fn disarm(&mut self) {
        if self.armed {
            self.armed = false;
            self.reset();
            tracing::info!("disarmed");
        }
    }

    pub fn toggle_armed(&mut self) {
        if self.armed {
            self.disarm();
        } else {
            self.arm();
        }
    }

    /// Cascades to all three axis controllers; gains survive.
    pub fn reset(&mut self) {
        self.pitch_pid.reset();
        self.yaw_pid.reset();
        self.roll_pid.reset();
    }

    /// Re-read gains, limits, max rates and max thrust from a configuration
    /// snapshot. Safe mid-flight: running PID state carries over, so the
    /// only discontinuity is the gain change itself.
    pub fn apply_configuration(&mut self, cfg: &SimConfig) {
        let p = &cfg.pid;
        self.pitch_pid.set_gains(p.pitch);
        self.yaw_pid.set_gains(p.yaw);
        self.roll_pid.set_gains(p.roll);
        self.pitch_pid.set_limits(p.integral_limit, p.output_limit);
        self.yaw_pid.set_limits(p.integral_limit, p.output_limit);
        self.roll_pid.set_limits(p.integral_limit, p.output_limit);
        self.max_thrust = cfg.drone.max_thrust;
        self.max_rates = Vec3::new(
            cfg.rates.max_pitch_deg.to_radians(),
            cfg.rates.max_yaw_deg.to_radians(),
            cfg.rates.max_roll_deg.to_radians(),
        );
        tracing::debug!("flight configuration applied");
    }

    /// One control step. Disarmed: nothing is applied at all; the body only
    /// slows through the physics engine's own damping.
    pub fn update(&mut self, dt: f32, control: &ControlVector, body: &mut dyn PhysicsBody) {
        if !self.armed || !dt.is_finite() || dt <= 0.0 {
            return;
        }

        // Thrust along local up at the center of mass
        let thrust = control.thrust.clamp(0.0, 1.0) * self.max_thrust;
        body.apply_local_force(Vec3::Y * thrust, Vec3::ZERO);

        // Commanded rates, local frame
        let target = Vec3::new(
            control.pitch.clamp(-1.0, 1.0) * self.max_rates.x,
            control.yaw.clamp(-1.0, 1.0) * self.max_rates.y,
            control.roll.clamp(-1.0, 1.0) * self.max_rates.z,
        );

        // The comparison only makes sense with both sides in the body's
        // local frame; angular velocity comes back in world coordinates.
        let measured = body.vector_to_local_frame(body.angular_velocity());

        let torque_local = Vec3::new(
            self.pitch_pid.update(target.x, measured.x, dt),
            self.yaw_pid.update(target.y, measured.y, dt),
            self.roll_pid.update(target.z, measured.z, dt),
        );

        // The physics engine accumulates torque in world space
        let torque_world = body.vector_to_world_frame(torque_local);
        body.apply_torque(torque_world);
        self.last_torque_world = torque_world;
    }

    pub fn last_torque_world(&self) -> Vec3 {
        self.last_torque_world
    }
}
