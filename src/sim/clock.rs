/// Wall-clock bookkeeping for one session: delta clamping, pause gating,
/// and the baseline reset that keeps resume from seeing a mega-delta.
#[derive(Debug)]
pub struct SimulationClock {
    last_ms: Option<f64>,
    running: bool,
    paused: bool,
    /// Upper bound on a single frame's delta, seconds.
    max_dt: f32,
}

impl SimulationClock {
    pub fn new(max_dt: f32) -> Self {
        Self {
            last_ms: None,
            running: true,
            paused: false,
            max_dt: max_dt.max(0.0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Clears the timestamp baseline so the first tick back reads dt = 0
    /// instead of the whole pause duration.
    pub fn resume(&mut self) {
        self.paused = false;
        self.last_ms = None;
    }

    /// Idempotent; a stopped clock only ever reports dt = 0.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Advance to `now_ms` (performance.now() style milliseconds) and return
    /// the clamped delta in seconds. Returns 0 while paused/stopped, on the
    /// first tick, and for any non-finite or backwards timestamp.
    pub fn tick(&mut self, now_ms: f64) -> f32 {
        if !self.running || self.paused || !now_ms.is_finite() {
            return 0.0;
        }
        let dt = match self.last_ms {
            None => 0.0,
            Some(prev) => ((now_ms - prev) / 1000.0) as f32,
        };
        self.last_ms = Some(now_ms);
        if !dt.is_finite() || dt <= 0.0 {
            return 0.0;
        }
        dt.min(self.max_dt)
    }
}
