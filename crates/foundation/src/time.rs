/// Time primitives
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Time(pub f64); // seconds

impl Time {
    pub const ZERO: Time = Time(0.0);

    /// Seconds elapsed since `earlier`. Negative if `earlier` is in the future.
    pub fn seconds_since(self, earlier: Time) -> f64 {
        self.0 - earlier.0
    }

    pub fn offset(self, seconds: f64) -> Time {
        Time(self.0 + seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::Time;

    #[test]
    fn elapsed_and_offset() {
        let t0 = Time(1.5);
        let t1 = t0.offset(0.25);
        assert_eq!(t1, Time(1.75));
        assert_eq!(t1.seconds_since(t0), 0.25);
        assert_eq!(t0.seconds_since(t1), -0.25);
    }
}
