use crate::config::AxisGains;

/// Single-axis rate PID with integral anti-windup and a bounded output.
///
/// One instance per control axis; the flight controller owns all three.
/// Gains survive `reset()` so a disarm/re-arm cycle keeps the tune.
#[derive(Debug, Clone)]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    integral_limit: f32,
    output_limit: f32,
    integral: f32,
    prev_error: f32,
}

impl Pid {
    pub fn new(gains: AxisGains, integral_limit: f32, output_limit: f32) -> Self {
        Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            integral_limit: integral_limit.abs(),
            output_limit: output_limit.abs(),
            integral: 0.0,
            prev_error: 0.0,
        }
    }

    /// Step the controller: `target` and `measured` are angular rates in
    /// rad/s, the return value is a bounded torque command.
    ///
    /// A non-positive or non-finite `dt` leaves all state untouched and
    /// returns 0 -- a stalled frame must not spike the derivative term.
    pub fn update(&mut self, target: f32, measured: f32, dt: f32) -> f32 {
        if !dt.is_finite() || dt <= 0.0 {
            return 0.0;
        }

        let error = target - measured;

        self.integral = (self.integral + error * dt).clamp(-self.integral_limit, self.integral_limit);
        let derivative = (error - self.prev_error) / dt;
        self.prev_error = error;

        (self.kp * error + self.ki * self.integral + self.kd * derivative)
            .clamp(-self.output_limit, self.output_limit)
    }

    /// Zero the accumulator and the derivative memory; gains and limits are
    /// untouched. Called on disarm and on drone reset.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    /// Hot-swap gains mid-flight; running state carries over.
    pub fn set_gains(&mut self, gains: AxisGains) {
        self.kp = gains.kp;
        self.ki = gains.ki;
        self.kd = gains.kd;
    }

    pub fn set_limits(&mut self, integral_limit: f32, output_limit: f32) {
        self.integral_limit = integral_limit.abs();
        self.output_limit = output_limit.abs();
        self.integral = self.integral.clamp(-self.integral_limit, self.integral_limit);
    }

    #[cfg(test)]
    pub fn integral(&self) -> f32 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p_only(kp: f32, output_limit: f32) -> Pid {
        Pid::new(AxisGains::new(kp, 0.0, 0.0), 1.0, output_limit)
    }

    #[test]
    fn pure_proportional_is_clamped_kp_times_target() {
        let dt = 1.0 / 60.0;
        let mut pid = p_only(2.0, 10.0);
        let out = pid.update(3.0, 0.0, dt);
        assert!((out - 6.0).abs() < 1e-6);

        // Saturation
        let mut pid = p_only(2.0, 4.0);
        assert_eq!(pid.update(3.0, 0.0, dt), 4.0);
        assert_eq!(pid.update(-3.0, 0.0, dt), -4.0);
    }

    #[test]
    fn integral_stays_inside_windup_limit() {
        let mut pid = Pid::new(AxisGains::new(0.0, 1.0, 0.0), 0.25, 100.0);
        for _ in 0..1000 {
            pid.update(5.0, 0.0, 1.0 / 60.0);
            assert!(pid.integral().abs() <= 0.25);
        }
    }

    #[test]
    fn non_positive_dt_is_a_noop() {
        let mut pid = Pid::new(AxisGains::new(1.0, 1.0, 1.0), 1.0, 10.0);
        pid.update(2.0, 0.0, 1.0 / 60.0);
        let before = pid.integral();
        assert_eq!(pid.update(2.0, 0.0, 0.0), 0.0);
        assert_eq!(pid.update(2.0, 0.0, -0.1), 0.0);
        assert_eq!(pid.update(2.0, 0.0, f32::NAN), 0.0);
        assert_eq!(pid.integral(), before);
    }

    #[test]
    fn reset_clears_state_but_not_gains() {
        let mut pid = Pid::new(AxisGains::new(2.0, 1.0, 0.5), 1.0, 10.0);
        for _ in 0..10 {
            pid.update(1.0, 0.0, 1.0 / 60.0);
        }
        assert!(pid.integral() != 0.0);
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        // Gains intact: same first-step output as a fresh controller
        let mut fresh = Pid::new(AxisGains::new(2.0, 1.0, 0.5), 1.0, 10.0);
        let dt = 1.0 / 60.0;
        assert_eq!(pid.update(1.0, 0.0, dt), fresh.update(1.0, 0.0, dt));
    }

    #[test]
    fn zero_error_after_reset_yields_zero_output() {
        let mut pid = Pid::new(AxisGains::new(2.0, 1.0, 0.5), 1.0, 10.0);
        for _ in 0..10 {
            pid.update(1.0, 0.0, 1.0 / 60.0);
        }
        pid.reset();
        assert_eq!(pid.update(0.0, 0.0, 1.0 / 60.0), 0.0);
    }

    #[test]
    fn tightening_integral_limit_reclamps_accumulator() {
        let mut pid = Pid::new(AxisGains::new(0.0, 1.0, 0.0), 1.0, 10.0);
        for _ in 0..120 {
            pid.update(10.0, 0.0, 1.0 / 60.0);
        }
        pid.set_limits(0.1, 10.0);
        assert!(pid.integral().abs() <= 0.1);
    }
}
