//! Gamepad snapshotting, axis mapping and device arbitration.

use std::collections::HashMap;

use crate::config::InputConfig;
use crate::controller::input::{ButtonAction, ButtonEdge, ControlVector, InputSource};

/// Raw device state captured once per poll by the platform shell
/// (`navigator.getGamepads()` on wasm, a stub elsewhere).
#[derive(Debug, Clone, Default)]
pub struct GamepadSnapshot {
    pub index: usize,
    pub axes: Vec<f64>,
    pub buttons: Vec<bool>,
    pub connected: bool,
}

/// Tracks the active device, per-device button history and the one-poll
/// zeroed vector after a device handover.
pub struct GamepadTracker {
    active: Option<usize>,
    prev_buttons: HashMap<usize, Vec<bool>>,
    suppress_next: bool,
}

impl GamepadTracker {
    pub fn new() -> Self {
        Self {
            active: None,
            prev_buttons: HashMap::new(),
            suppress_next: false,
        }
    }

    /// Read the active pad. Returns `Some(vector)` when the pad supersedes
    /// the keyboard this poll (stick beyond deadzone, button change, or the
    /// post-handover zeroed poll), `None` when the keyboard should be used.
    pub fn poll(
        &mut self,
        pads: &[GamepadSnapshot],
        cfg: &InputConfig,
        edges: &mut Vec<ButtonEdge>,
    ) -> Option<ControlVector> {
        self.select_active(pads);
        let idx = self.active?;
        let pad = pads.iter().find(|p| p.index == idx && p.connected)?;

        // Button history: a fresh device records a baseline and emits
        // nothing, so a button held across connect cannot fire an edge.
        let (changed, new_edges) = match self.prev_buttons.get(&idx) {
            Some(prev) => diff_buttons(prev, &pad.buttons, idx, cfg),
            None => (false, Vec::new()),
        };
        self.prev_buttons.insert(idx, pad.buttons.clone());
        edges.extend(new_edges);

        if self.suppress_next {
            // One neutral poll after a handover hides the stale state of
            // the device we just switched to.
            self.suppress_next = false;
            return Some(ControlVector::default());
        }

        if !self.stick_activity(pad, cfg) && !changed {
            return None;
        }
        Some(self.read_vector(pad, cfg))
    }

    fn select_active(&mut self, pads: &[GamepadSnapshot]) {
        let lowest = pads.iter().filter(|p| p.connected).map(|p| p.index).min();
        match self.active {
            Some(idx) if pads.iter().any(|p| p.index == idx && p.connected) => {}
            Some(idx) => {
                // Active device went away: its history is stale now.
                self.prev_buttons.remove(&idx);
                self.active = lowest;
                self.suppress_next = self.active.is_some();
                tracing::info!(from = idx, to = ?self.active, "gamepad handover");
            }
            None => {
                if let Some(idx) = lowest {
                    tracing::info!(index = idx, "gamepad active");
                }
                self.active = lowest;
            }
        }
    }

    fn stick_activity(&self, pad: &GamepadSnapshot, cfg: &InputConfig) -> bool {
        let m = &cfg.gamepad;
        let beyond = |i: usize| axis_value(pad, i).abs() > m.deadzone;
        beyond(m.roll_axis)
            || beyond(m.pitch_axis)
            || beyond(m.yaw_axis)
            || self.read_thrust(pad, cfg) > 0.0
    }

    fn read_vector(&self, pad: &GamepadSnapshot, cfg: &InputConfig) -> ControlVector {
        let m = &cfg.gamepad;
        let sens = cfg.gamepad_sensitivity;
        ControlVector {
            roll: stick(axis_value(pad, m.roll_axis), m.invert_roll, m.deadzone, sens),
            pitch: stick(axis_value(pad, m.pitch_axis), m.invert_pitch, m.deadzone, sens),
            yaw: stick(axis_value(pad, m.yaw_axis), m.invert_yaw, m.deadzone, sens),
            thrust: self.read_thrust(pad, cfg),
        }
    }

    /// Bidirectional thrust axis remapped [-1,1] -> [0,1] with its own
    /// near-floor deadzone, so a slider resting at the bottom reads 0.
    fn read_thrust(&self, pad: &GamepadSnapshot, cfg: &InputConfig) -> f32 {
        let m = &cfg.gamepad;
        let raw = axis_value(pad, m.thrust_axis);
        let signed = if m.invert_thrust { -raw } else { raw };
        let t = (signed + 1.0) * 0.5;
        if t <= m.thrust_floor {
            0.0
        } else {
            (t * cfg.gamepad_sensitivity).clamp(0.0, 1.0)
        }
    }
}

/// Missing or malformed axis reads as a constant 0, never an error.
fn axis_value(pad: &GamepadSnapshot, index: usize) -> f32 {
    let v = pad.axes.get(index).copied().unwrap_or(0.0) as f32;
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn stick(raw: f32, invert: bool, deadzone: f32, sensitivity: f32) -> f32 {
    let v = if invert { -raw } else { raw };
    if v.abs() <= deadzone {
        0.0
    } else {
        (v * sensitivity).clamp(-1.0, 1.0)
    }
}

fn diff_buttons(
    prev: &[bool],
    now: &[bool],
    device: usize,
    cfg: &InputConfig,
) -> (bool, Vec<ButtonEdge>) {
    let len = prev.len().max(now.len());
    let mut changed = false;
    let mut edges = Vec::new();
    for i in 0..len {
        let was = prev.get(i).copied().unwrap_or(false);
        let is = now.get(i).copied().unwrap_or(false);
        if was != is {
            changed = true;
        }
        if !was && is {
            if i == cfg.gamepad.arm_button {
                edges.push(ButtonEdge {
                    action: ButtonAction::ArmDisarmToggle,
                    source: InputSource::Gamepad(device),
                });
            } else if i == cfg.gamepad.reset_button {
                edges.push(ButtonEdge {
                    action: ButtonAction::Reset,
                    source: InputSource::Gamepad(device),
                });
            }
        }
    }
    (changed, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputConfig;

    fn pad(index: usize, axes: Vec<f64>, buttons: Vec<bool>) -> GamepadSnapshot {
        GamepadSnapshot {
            index,
            axes,
            buttons,
            connected: true,
        }
    }

    fn idle_axes() -> Vec<f64> {
        // Thrust axis rests at +1 (inverted mapping reads it as bottom).
        vec![0.0, 0.0, 0.0, 1.0]
    }

    #[test]
    fn deadzone_is_exact_at_threshold() {
        let cfg = InputConfig::default();
        let dz = cfg.gamepad.deadzone as f64;
        let mut t = GamepadTracker::new();
        let mut edges = Vec::new();

        // At the threshold: treated as idle, keyboard wins
        let p = pad(0, vec![dz, 0.0, 0.0, 1.0], vec![false; 4]);
        assert!(t.poll(&[p], &cfg, &mut edges).is_none());

        // Just beyond: pad wins with a nonzero scaled value
        let p = pad(0, vec![dz + 0.001, 0.0, 0.0, 1.0], vec![false; 4]);
        let v = t.poll(&[p], &cfg, &mut edges).unwrap();
        assert!(v.roll > 0.0);
        assert_eq!(v.pitch, 0.0);
    }

    #[test]
    fn thrust_remaps_to_unit_range_with_floor() {
        let cfg = InputConfig::default();
        let mut t = GamepadTracker::new();
        let mut edges = Vec::new();

        // Stick at bottom (raw +1, inverted) -> exactly 0, no activity
        let p = pad(0, idle_axes(), vec![false; 4]);
        assert!(t.poll(&[p], &cfg, &mut edges).is_none());

        // Stick at top (raw -1, inverted) -> full thrust
        let p = pad(0, vec![0.0, 0.0, 0.0, -1.0], vec![false; 4]);
        let v = t.poll(&[p], &cfg, &mut edges).unwrap();
        assert_eq!(v.thrust, 1.0);

        // Mid-stick -> about half
        let p = pad(0, vec![0.0, 0.0, 0.0, 0.0], vec![false; 4]);
        let v = t.poll(&[p], &cfg, &mut edges).unwrap();
        assert!((v.thrust - 0.5).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_axis_reads_zero() {
        let mut cfg = InputConfig::default();
        cfg.gamepad.roll_axis = 17;
        let mut t = GamepadTracker::new();
        let mut edges = Vec::new();
        // Pitch active so the pad wins the poll; roll maps to nothing.
        let p = pad(0, vec![0.0, 0.9, 0.0, 1.0], vec![false; 4]);
        let v = t.poll(&[p], &cfg, &mut edges).unwrap();
        assert_eq!(v.roll, 0.0);
        assert!(v.pitch != 0.0);
    }

    #[test]
    fn button_edge_once_per_press_and_reconnect_resets_history() {
        let cfg = InputConfig::default();
        let mut t = GamepadTracker::new();
        let mut edges = Vec::new();

        // Baseline poll: button already held at connect, no edge
        let held = pad(0, idle_axes(), vec![true, false, false, false]);
        t.poll(&[held.clone()], &cfg, &mut edges);
        assert!(edges.is_empty());

        // Release, then press: exactly one edge across many held polls
        let released = pad(0, idle_axes(), vec![false; 4]);
        t.poll(&[released], &cfg, &mut edges);
        edges.clear();
        for _ in 0..6 {
            t.poll(&[held.clone()], &cfg, &mut edges);
        }
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].action, ButtonAction::ArmDisarmToggle);
        assert_eq!(edges[0].source, InputSource::Gamepad(0));
    }

    #[test]
    fn handover_zeroes_one_poll_then_reads_new_device() {
        let cfg = InputConfig::default();
        let mut t = GamepadTracker::new();
        let mut edges = Vec::new();

        let first = pad(0, vec![0.5, 0.0, 0.0, 1.0], vec![false; 4]);
        let second = pad(1, vec![0.9, 0.0, 0.0, 1.0], vec![false; 4]);
        assert!(t.poll(&[first, second.clone()], &cfg, &mut edges).unwrap().roll > 0.0);

        // Device 0 drops: device 1 takes over with one zeroed poll
        let v = t.poll(&[second.clone()], &cfg, &mut edges).unwrap();
        assert_eq!(v, ControlVector::default());
        let v = t.poll(&[second], &cfg, &mut edges).unwrap();
        assert!(v.roll > 0.0);
    }

    #[test]
    fn idle_pad_defers_to_keyboard() {
        let cfg = InputConfig::default();
        let mut t = GamepadTracker::new();
        let mut edges = Vec::new();
        let p = pad(0, idle_axes(), vec![false; 4]);
        assert!(t.poll(&[p.clone()], &cfg, &mut edges).is_none());
        assert!(t.poll(&[p], &cfg, &mut edges).is_none());
    }
}
