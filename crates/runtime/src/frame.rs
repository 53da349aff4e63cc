use foundation::time::Time;

/// Per-frame timing handed to everything that animates.
///
/// Frames are plain data so a run can be recorded and replayed: hosts with a
/// real clock build them with [`Frame::at`], tests step them with
/// [`Frame::next`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based frame index.
    pub index: u64,
    /// Delta time used by [`Frame::next`] (seconds).
    pub dt_s: f64,
    /// Time at the start of the frame.
    pub time: Time,
}

impl Frame {
    /// Fixed-step frame: `time = index * dt_s`.
    pub fn new(index: u64, dt_s: f64) -> Self {
        Self {
            index,
            dt_s,
            time: Time(index as f64 * dt_s),
        }
    }

    /// Frame stamped with an externally measured time.
    pub fn at(index: u64, time: Time) -> Self {
        Self {
            index,
            dt_s: 0.0,
            time,
        }
    }

    pub fn next(self) -> Self {
        Self {
            index: self.index + 1,
            dt_s: self.dt_s,
            time: self.time.offset(self.dt_s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn frame_time_is_deterministic() {
        let a = Frame::new(10, 1.0 / 60.0);
        let b = Frame::new(10, 1.0 / 60.0);
        assert_eq!(a, b);
        assert_eq!(a.time, Time(10.0 / 60.0));
    }

    #[test]
    fn next_advances_index_and_time() {
        let f0 = Frame::new(0, 0.5);
        let f1 = f0.next();
        assert_eq!(f1.index, 1);
        assert_eq!(f1.time, Time(0.5));
    }

    #[test]
    fn measured_frames_keep_their_time() {
        let f = Frame::at(3, Time(12.0));
        assert_eq!(f.index, 3);
        assert_eq!(f.time, Time(12.0));
        assert_eq!(f.next().time, Time(12.0));
    }
}
