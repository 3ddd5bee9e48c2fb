//! Tunable configuration consumed by the session as an immutable snapshot.
//!
//! The settings UI (external) owns the mutable form; whatever it hands us is
//! run through `sanitized()` so a missing or malformed field degrades to a
//! safe default instead of poisoning the control loop.

use glam::Vec3;

/// Per-axis PID gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl AxisGains {
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self { kp, ki, kd }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PidConfig {
    pub roll: AxisGains,
    pub pitch: AxisGains,
    pub yaw: AxisGains,
    /// Anti-windup bound on the integral accumulator (absolute value).
    pub integral_limit: f32,
    /// Bound on the torque a single axis controller may command.
    pub output_limit: f32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            roll: AxisGains::new(0.08, 0.02, 0.002),
            pitch: AxisGains::new(0.08, 0.02, 0.002),
            yaw: AxisGains::new(0.12, 0.02, 0.0),
            integral_limit: 0.5,
            output_limit: 2.0,
        }
    }
}

/// Full-stick angular rates, in deg/s (converted to rad/s at apply time).
#[derive(Debug, Clone, Copy)]
pub struct RateConfig {
    pub max_roll_deg: f32,
    pub max_pitch_deg: f32,
    pub max_yaw_deg: f32,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            max_roll_deg: 200.0,
            max_pitch_deg: 200.0,
            max_yaw_deg: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DroneConfig {
    /// Newtons at thrust = 1.0.
    pub max_thrust: f32,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub half_extents: Vec3,
    pub start_position: Vec3,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            max_thrust: 28.0,
            mass: 1.2,
            linear_damping: 0.15,
            angular_damping: 0.6,
            half_extents: Vec3::new(0.25, 0.06, 0.25),
            start_position: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}

/// Key mapping configuration (browser `KeyboardEvent.key` values).
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub pitch_forward: String,
    pub pitch_back: String,
    pub roll_left: String,
    pub roll_right: String,
    pub yaw_left: String,
    pub yaw_right: String,
    pub thrust_up: String,
    pub thrust_down: String,
    pub thrust_cut: String,
    pub arm_toggle: String,
    pub reset: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            pitch_forward: "w".to_string(),
            pitch_back: "s".to_string(),
            roll_left: "a".to_string(),
            roll_right: "d".to_string(),
            yaw_left: "q".to_string(),
            yaw_right: "e".to_string(),
            thrust_up: "Shift".to_string(),
            thrust_down: "Control".to_string(),
            thrust_cut: "x".to_string(),
            arm_toggle: "f".to_string(),
            reset: "r".to_string(),
        }
    }
}

/// Which physical gamepad axis feeds which control axis, plus per-axis
/// inversion. An index past the end of the device's axis array reads as a
/// constant 0.
#[derive(Debug, Clone, Copy)]
pub struct GamepadMapping {
    pub roll_axis: usize,
    pub pitch_axis: usize,
    pub yaw_axis: usize,
    pub thrust_axis: usize,
    pub invert_roll: bool,
    pub invert_pitch: bool,
    pub invert_yaw: bool,
    pub invert_thrust: bool,
    /// Stick magnitude at or below this reads as exactly 0.
    pub deadzone: f32,
    /// Floor deadzone applied to the remapped [0,1] thrust value.
    pub thrust_floor: f32,
    pub arm_button: usize,
    pub reset_button: usize,
}

impl Default for GamepadMapping {
    fn default() -> Self {
        Self {
            roll_axis: 0,
            pitch_axis: 1,
            yaw_axis: 2,
            thrust_axis: 3,
            invert_roll: false,
            invert_pitch: true,
            invert_yaw: false,
            invert_thrust: true,
            deadzone: 0.08,
            thrust_floor: 0.03,
            arm_button: 0,
            reset_button: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputConfig {
    pub keys: KeyBindings,
    pub roll_sensitivity: f32,
    pub pitch_sensitivity: f32,
    pub yaw_sensitivity: f32,
    pub gamepad_sensitivity: f32,
    /// Thrust change per poll while a thrust key is held.
    pub thrust_step: f32,
    pub gamepad: GamepadMapping,
    /// Device poll cadence, decoupled from the frame loop.
    pub poll_interval_ms: u32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            keys: KeyBindings::default(),
            roll_sensitivity: 1.0,
            pitch_sensitivity: 1.0,
            yaw_sensitivity: 1.0,
            gamepad_sensitivity: 1.0,
            thrust_step: 0.02,
            gamepad: GamepadMapping::default(),
            poll_interval_ms: 16,
        }
    }
}

/// One immutable snapshot of everything tunable. Components receive a copy
/// at apply time and never hold a reference to a live mutable config.
#[derive(Debug, Clone, Default)]
pub struct SimConfig {
    pub pid: PidConfig,
    pub rates: RateConfig,
    pub drone: DroneConfig,
    pub input: InputConfig,
    pub sim: StepConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct StepConfig {
    /// Physics fixed timestep.
    pub fixed_dt: f32,
    pub max_substeps: u32,
    /// Wall-clock delta is clamped to `max_dt_factor * fixed_dt`.
    pub max_dt_factor: f32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_substeps: 4,
            max_dt_factor: 4.0,
        }
    }
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

fn positive_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        fallback
    }
}

fn gains_sane(g: AxisGains, fallback: AxisGains) -> AxisGains {
    AxisGains {
        kp: finite_or(g.kp, fallback.kp).max(0.0),
        ki: finite_or(g.ki, fallback.ki).max(0.0),
        kd: finite_or(g.kd, fallback.kd).max(0.0),
    }
}

impl SimConfig {
    /// Replace anything non-finite or out of range with the default value.
    /// The control path relies on this never failing.
    pub fn sanitized(mut self) -> Self {
        let d = SimConfig::default();

        self.pid.roll = gains_sane(self.pid.roll, d.pid.roll);
        self.pid.pitch = gains_sane(self.pid.pitch, d.pid.pitch);
        self.pid.yaw = gains_sane(self.pid.yaw, d.pid.yaw);
        self.pid.integral_limit = positive_or(self.pid.integral_limit, d.pid.integral_limit);
        self.pid.output_limit = positive_or(self.pid.output_limit, d.pid.output_limit);

        self.rates.max_roll_deg = positive_or(self.rates.max_roll_deg, d.rates.max_roll_deg);
        self.rates.max_pitch_deg = positive_or(self.rates.max_pitch_deg, d.rates.max_pitch_deg);
        self.rates.max_yaw_deg = positive_or(self.rates.max_yaw_deg, d.rates.max_yaw_deg);

        self.drone.max_thrust = positive_or(self.drone.max_thrust, d.drone.max_thrust);
        self.drone.mass = positive_or(self.drone.mass, d.drone.mass);
        self.drone.linear_damping = finite_or(self.drone.linear_damping, d.drone.linear_damping).clamp(0.0, 1.0);
        self.drone.angular_damping = finite_or(self.drone.angular_damping, d.drone.angular_damping).clamp(0.0, 1.0);
        if !self.drone.half_extents.is_finite() || self.drone.half_extents.min_element() <= 0.0 {
            self.drone.half_extents = d.drone.half_extents;
        }
        if !self.drone.start_position.is_finite() {
            self.drone.start_position = d.drone.start_position;
        }

        self.input.roll_sensitivity = positive_or(self.input.roll_sensitivity, d.input.roll_sensitivity);
        self.input.pitch_sensitivity = positive_or(self.input.pitch_sensitivity, d.input.pitch_sensitivity);
        self.input.yaw_sensitivity = positive_or(self.input.yaw_sensitivity, d.input.yaw_sensitivity);
        self.input.gamepad_sensitivity =
            positive_or(self.input.gamepad_sensitivity, d.input.gamepad_sensitivity);
        self.input.thrust_step = positive_or(self.input.thrust_step, d.input.thrust_step).min(1.0);
        self.input.gamepad.deadzone =
            finite_or(self.input.gamepad.deadzone, d.input.gamepad.deadzone).clamp(0.0, 0.95);
        self.input.gamepad.thrust_floor =
            finite_or(self.input.gamepad.thrust_floor, d.input.gamepad.thrust_floor).clamp(0.0, 0.5);
        if self.input.poll_interval_ms == 0 {
            self.input.poll_interval_ms = d.input.poll_interval_ms;
        }

        self.sim.fixed_dt = positive_or(self.sim.fixed_dt, d.sim.fixed_dt);
        self.sim.max_substeps = self.sim.max_substeps.clamp(1, 16);
        self.sim.max_dt_factor = positive_or(self.sim.max_dt_factor, d.sim.max_dt_factor).max(1.0);

        self
    }

    /// Largest wall-clock delta a single tick is allowed to see.
    pub fn max_frame_dt(&self) -> f32 {
        self.sim.fixed_dt * self.sim.max_dt_factor
    }
}
