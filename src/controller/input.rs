//! Control input normalization: keyboard + gamepad to one 4-axis vector.

use std::collections::HashSet;

use crate::config::InputConfig;
use crate::controller::gamepad::{GamepadSnapshot, GamepadTracker};

/// Normalized pilot intent for one poll. Rebuilt from scratch every poll;
/// nothing here carries identity between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlVector {
    /// [-1, 1], positive = roll right
    pub roll: f32,
    /// [-1, 1], positive = nose up
    pub pitch: f32,
    /// [-1, 1], positive = yaw right
    pub yaw: f32,
    /// [0, 1]
    pub thrust: f32,
}

/// Discrete one-shot actions bound to buttons/keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    ArmDisarmToggle,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Keyboard,
    Gamepad(usize),
}

/// Fires exactly once per physical 0->1 press, never while held, never on
/// release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub action: ButtonAction,
    pub source: InputSource,
}

/// What one call to `InputNormalizer::poll` yields.
#[derive(Debug, Clone)]
pub struct InputSample {
    pub vector: ControlVector,
    pub edges: Vec<ButtonEdge>,
}

/// Held-key set, fed by the platform shell's keydown/keyup listeners.
#[derive(Debug, Default)]
pub struct KeyboardState {
    pressed: HashSet<String>,
}

/// Browser `key` values are case-shifted by modifiers: "w" arrives as "W"
/// while Shift is held. Single-character keys are stored lowercase so the
/// keydown and keyup of one physical key always pair up.
fn canonical(key: &str) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_ascii_lowercase().to_string(),
        _ => key.to_string(),
    }
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, key: String) {
        self.pressed.insert(canonical(&key));
    }

    pub fn release(&mut self, key: &str) {
        self.pressed.remove(&canonical(key));
    }

    pub fn is_pressed(&self, key: &str) -> bool {
        self.pressed.contains(&canonical(key))
    }

    /// Drop everything held; used on focus loss so no key sticks.
    pub fn clear(&mut self) {
        self.pressed.clear();
    }
}

/// Merges the two polled devices into one control vector plus edge events.
///
/// Runs on its own fixed-cadence timer so sampling continues even when the
/// frame loop stalls or the session is paused. Arbitration per poll: an
/// active gamepad showing stick or button activity supersedes the keyboard
/// outright; the two sources are never blended.
pub struct InputNormalizer {
    cfg: InputConfig,
    /// Keyboard thrust ramps instead of jumping; this is the ramp state.
    thrust_level: f32,
    prev_arm_key: bool,
    prev_reset_key: bool,
    pads: GamepadTracker,
}

impl InputNormalizer {
    pub fn new(cfg: InputConfig) -> Self {
        Self {
            cfg,
            thrust_level: 0.0,
            prev_arm_key: false,
            prev_reset_key: false,
            pads: GamepadTracker::new(),
        }
    }

    /// Hot-reload sensitivities, bindings and mappings. Ramp state and
    /// button history carry over.
    pub fn apply_configuration(&mut self, cfg: InputConfig) {
        self.cfg = cfg;
    }

    /// One fixed-cadence sample: read both devices, arbitrate, emit edges.
    /// Device-absent is not an error; it reads as neutral.
    pub fn poll(&mut self, keys: &KeyboardState, pads: &[GamepadSnapshot]) -> InputSample {
        let mut edges = Vec::new();

        // Keyboard edges use the same previous-state comparison as pad
        // buttons so holding the arm key cannot toggle every poll.
        let arm_now = keys.is_pressed(&self.cfg.keys.arm_toggle);
        if arm_now && !self.prev_arm_key {
            edges.push(ButtonEdge {
                action: ButtonAction::ArmDisarmToggle,
                source: InputSource::Keyboard,
            });
        }
        self.prev_arm_key = arm_now;

        let reset_now = keys.is_pressed(&self.cfg.keys.reset);
        if reset_now && !self.prev_reset_key {
            edges.push(ButtonEdge {
                action: ButtonAction::Reset,
                source: InputSource::Keyboard,
            });
        }
        self.prev_reset_key = reset_now;

        let vector = match self.pads.poll(pads, &self.cfg, &mut edges) {
            Some(v) => {
                // Keyboard ramp resumes from wherever the stick left thrust.
                self.thrust_level = v.thrust;
                v
            }
            None => self.keyboard_vector(keys),
        };

        InputSample { vector, edges }
    }

    fn key_axis(&self, keys: &KeyboardState, positive: &str, negative: &str, sensitivity: f32) -> f32 {
        let mut v = 0.0;
        if keys.is_pressed(positive) {
            v += 1.0;
        }
        if keys.is_pressed(negative) {
            v -= 1.0;
        }
        (v * sensitivity).clamp(-1.0, 1.0)
    }

    fn keyboard_vector(&mut self, keys: &KeyboardState) -> ControlVector {
        let k = self.cfg.keys.clone();
        let roll = self.key_axis(keys, &k.roll_right, &k.roll_left, self.cfg.roll_sensitivity);
        let pitch = self.key_axis(keys, &k.pitch_forward, &k.pitch_back, self.cfg.pitch_sensitivity);
        let yaw = self.key_axis(keys, &k.yaw_right, &k.yaw_left, self.cfg.yaw_sensitivity);

        if keys.is_pressed(&k.thrust_cut) {
            self.thrust_level = 0.0;
        } else {
            if keys.is_pressed(&k.thrust_up) {
                self.thrust_level += self.cfg.thrust_step;
            }
            if keys.is_pressed(&k.thrust_down) {
                self.thrust_level -= self.cfg.thrust_step;
            }
            self.thrust_level = self.thrust_level.clamp(0.0, 1.0);
        }

        ControlVector {
            roll,
            pitch,
            yaw,
            thrust: self.thrust_level,
        }
    }
}
