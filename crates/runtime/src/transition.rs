use foundation::time::Time;

/// Cubic ease-in-out over `[0, 1]`; inputs outside the range clamp.
pub fn ease_cubic_in_out(t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let t2 = t * t;
    let t3 = t2 * t;
    4.0 * if t < 0.5 { t3 } else { 3.0 * (t - t2) + t3 - 0.75 }
}

/// A scalar moving from one value to another over a fixed duration.
///
/// Retargeting mid-flight starts the new leg from the current value, so the
/// output never jumps and stays between the two most recent endpoints.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transition {
    from: f64,
    to: f64,
    started: Time,
    duration_s: f64,
}

impl Transition {
    /// A transition that is already at rest on `value`.
    pub fn settled(value: f64, duration_s: f64) -> Self {
        Self {
            from: value,
            to: value,
            started: Time(f64::NEG_INFINITY),
            duration_s,
        }
    }

    pub fn target(&self) -> f64 {
        self.to
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// Linear progress of the current leg in `[0, 1]`.
    pub fn progress(&self, now: Time) -> f64 {
        if self.duration_s <= 0.0 {
            return 1.0;
        }
        (now.seconds_since(self.started) / self.duration_s).clamp(0.0, 1.0)
    }

    pub fn linear(&self, now: Time) -> f64 {
        self.from + (self.to - self.from) * self.progress(now)
    }

    pub fn eased(&self, now: Time) -> f64 {
        self.from + (self.to - self.from) * ease_cubic_in_out(self.progress(now))
    }

    /// Starts a new leg towards `to` from the current linear value.
    ///
    /// Retargeting to the current target is a no-op.
    pub fn retarget(&mut self, to: f64, now: Time) {
        if to == self.to {
            return;
        }
        let from = self.linear(now);
        self.retarget_from(from, to, now);
    }

    /// Starts a new leg from an explicit value.
    pub fn retarget_from(&mut self, from: f64, to: f64, now: Time) {
        self.from = from;
        self.to = to;
        self.started = now;
    }

    /// Ends the transition on `value` immediately.
    pub fn jump_to(&mut self, value: f64) {
        self.from = value;
        self.to = value;
        self.started = Time(f64::NEG_INFINITY);
    }

    /// True while the leg is running or within `grace_s` after it ended.
    pub fn is_settling(&self, now: Time, grace_s: f64) -> bool {
        now.seconds_since(self.started) < self.duration_s + grace_s
    }
}

#[cfg(test)]
mod tests {
    use super::{Transition, ease_cubic_in_out};
    use foundation::time::Time;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn ease_hits_endpoints_and_midpoint() {
        assert_eq!(ease_cubic_in_out(-1.0), 0.0);
        assert_eq!(ease_cubic_in_out(0.0), 0.0);
        assert_close(ease_cubic_in_out(0.5), 0.5, 1e-12);
        assert_eq!(ease_cubic_in_out(1.0), 1.0);
        assert_eq!(ease_cubic_in_out(3.0), 1.0);
    }

    #[test]
    fn ease_is_monotonic() {
        let mut prev = 0.0;
        for i in 0..=100 {
            let v = ease_cubic_in_out(i as f64 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn runs_over_duration() {
        let mut t = Transition::settled(0.0, 0.5);
        t.retarget(1.0, Time(10.0));
        assert_eq!(t.linear(Time(10.0)), 0.0);
        assert_close(t.linear(Time(10.25)), 0.5, 1e-12);
        assert_eq!(t.linear(Time(11.0)), 1.0);
        assert!(t.is_settling(Time(10.6), 0.2));
        assert!(!t.is_settling(Time(10.8), 0.2));
    }

    #[test]
    fn retarget_mid_flight_does_not_jump() {
        let mut t = Transition::settled(0.0, 1.0);
        t.retarget(1.0, Time(0.0));
        let mid = t.linear(Time(0.3));
        t.retarget(0.0, Time(0.3));
        assert_close(t.linear(Time(0.3)), mid, 1e-12);
        assert_close(t.linear(Time(0.6)), mid * 0.7, 1e-12);
    }

    #[test]
    fn jump_ends_immediately() {
        let mut t = Transition::settled(0.0, 0.5);
        t.retarget(1.0, Time(0.0));
        t.jump_to(1.0);
        assert_eq!(t.eased(Time(0.0)), 1.0);
        assert!(!t.is_settling(Time(0.0), 0.2));
    }

    #[test]
    fn zero_duration_is_instant() {
        let mut t = Transition::settled(0.0, 0.0);
        t.retarget(1.0, Time(5.0));
        assert_eq!(t.linear(Time(5.0)), 1.0);
    }
}
