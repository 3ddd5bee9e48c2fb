//! Telemetry published once per unpaused tick for HUD/overlay consumers.

use glam::{EulerRot, Quat, Vec3};

use crate::controller::input::ControlVector;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Decompose the orientation quaternion with the fixed YXZ order: yaw about
/// local Y, then pitch about X, then roll about Z. This is the same axis
/// mapping the flight controller uses, so displayed attitude and control
/// axes cannot drift apart (pinned by test below).
pub fn euler_from_quat(q: Quat) -> EulerAngles {
    let (yaw, pitch, roll) = q.to_euler(EulerRot::YXZ);
    EulerAngles { roll, pitch, yaw }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub quaternion: Quat,
    pub armed: bool,
    pub speed: f32,
    pub altitude: f32,
    pub euler: EulerAngles,
    pub controls: ControlVector,
}

impl TelemetrySnapshot {
    pub fn capture(
        position: Vec3,
        velocity: Vec3,
        quaternion: Quat,
        armed: bool,
        controls: ControlVector,
    ) -> Self {
        Self {
            position,
            velocity,
            quaternion,
            armed,
            speed: velocity.length(),
            altitude: position.y,
            euler: euler_from_quat(quaternion),
            controls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euler_matches_control_axes() {
        // Pure roll rotation (about local Z) must show up as roll only
        let q = Quat::from_rotation_z(0.4);
        let e = euler_from_quat(q);
        assert!((e.roll - 0.4).abs() < 1e-5);
        assert!(e.pitch.abs() < 1e-5);
        assert!(e.yaw.abs() < 1e-5);

        // And pure yaw (about local Y) as yaw only
        let q = Quat::from_rotation_y(-0.7);
        let e = euler_from_quat(q);
        assert!((e.yaw + 0.7).abs() < 1e-5);
        assert!(e.roll.abs() < 1e-5);
        assert!(e.pitch.abs() < 1e-5);
    }

    #[test]
    fn capture_derives_speed_and_altitude() {
        let snap = TelemetrySnapshot::capture(
            Vec3::new(1.0, 12.5, -3.0),
            Vec3::new(3.0, 0.0, 4.0),
            Quat::IDENTITY,
            true,
            ControlVector::default(),
        );
        assert_eq!(snap.altitude, 12.5);
        assert!((snap.speed - 5.0).abs() < 1e-6);
        assert!(snap.armed);
    }
}
