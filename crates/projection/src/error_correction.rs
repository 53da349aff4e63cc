//! GPU latitude error measurement.
//!
//! The GPU evaluates `2 * atan(exp(...))` with hardware-dependent precision,
//! so the sphere it draws is slightly off from the one the CPU computes.
//! Every few frames one pixel measures the difference at the map center; the
//! result is read back asynchronously and eased into the rendering matrix.

use gpu::readback::{
    FenceStatus, MeasurementDevice, MeasurementRequest, ReadbackError, ReadbackRing,
    decode_rgba8_float,
};
use foundation::time::Time;
use runtime::frame::Frame;
use runtime::transition::Transition;
use tracing::{debug, warn};

/// Frames between two measurements.
pub const MEASURE_EVERY_FRAMES: u64 = 6;
/// Frames to wait before polling a non-blocking readback.
pub const MIN_READBACK_FRAMES: u64 = 4;
/// Frames to wait before a blocking readback.
pub const BLOCKING_READBACK_FRAMES: u64 = 8;
/// Duration of the easing towards a newly measured value.
pub const ERROR_TRANSITION_S: f64 = 0.5;

pub struct ErrorCorrectionLoop {
    device: Box<dyn MeasurementDevice>,
    ring: ReadbackRing,
    next_measurement_frame: u64,
    correction: Transition,
    now: f64,
    warned: bool,
}

impl std::fmt::Debug for ErrorCorrectionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCorrectionLoop")
            .field("ring", &self.ring)
            .field("next_measurement_frame", &self.next_measurement_frame)
            .field("correction", &self.correction)
            .finish_non_exhaustive()
    }
}

impl ErrorCorrectionLoop {
    pub fn new(device: Box<dyn MeasurementDevice>) -> Self {
        Self {
            device,
            ring: ReadbackRing::new(),
            next_measurement_frame: 0,
            correction: Transition::settled(0.0, ERROR_TRANSITION_S),
            now: 0.0,
            warned: false,
        }
    }

    /// Correction in radians to subtract from the latitude rotation.
    pub fn correction(&self) -> f64 {
        self.correction.eased(Time(self.now))
    }

    pub fn is_waiting_for_readback(&self) -> bool {
        self.ring.pending().is_some()
    }

    /// True while a measurement is in flight or a new value is still easing in.
    pub fn is_dirty(&self, grace_s: f64) -> bool {
        self.is_waiting_for_readback()
            || self.correction.is_settling(Time(self.now), grace_s)
    }

    /// Advances the loop by one frame and returns the usable correction.
    ///
    /// `mercator_y` is the map center's normalized Mercator Y and
    /// `expected_angle` its exact latitude in radians.
    pub fn update(&mut self, frame: Frame, mercator_y: f64, expected_angle: f64) -> f64 {
        self.now = frame.time.0;
        self.try_readback(frame);
        self.try_issue(frame, mercator_y, expected_angle);
        self.correction()
    }

    fn try_readback(&mut self, frame: Frame) {
        let Some(pending) = self.ring.pending() else {
            return;
        };
        let fences = self.device.supports_fences();
        let wait = if fences {
            MIN_READBACK_FRAMES
        } else {
            BLOCKING_READBACK_FRAMES
        };
        if frame.index < pending.issued_frame + wait {
            return;
        }
        if fences {
            match self.device.poll(pending.slot) {
                Ok(FenceStatus::Signaled) => {}
                Ok(FenceStatus::TimeoutExpired) => return,
                Err(err) => {
                    self.abandon(err);
                    return;
                }
            }
        }
        self.ring.release();
        match self.device.read(pending.slot) {
            Ok(pixel) => {
                let measured = decode_rgba8_float(pixel);
                let target = -measured;
                if target != self.correction.target() {
                    let now = frame.time;
                    let current = self.correction.eased(now);
                    self.correction.retarget_from(current, target, now);
                }
                debug!(frame = frame.index, measured, "latitude error measured");
            }
            Err(err) => self.abandon(err),
        }
        self.next_measurement_frame = frame.index + MEASURE_EVERY_FRAMES;
    }

    fn try_issue(&mut self, frame: Frame, mercator_y: f64, expected_angle: f64) {
        if frame.index < self.next_measurement_frame {
            return;
        }
        let Some(pending) = self.ring.acquire(frame.index) else {
            return;
        };
        let request = MeasurementRequest {
            mercator_y: mercator_y as f32,
            expected_angle: expected_angle as f32,
        };
        match self.device.issue(pending.slot, request) {
            Ok(()) => debug!(frame = frame.index, slot = pending.slot, "measurement issued"),
            Err(err) => self.abandon(err),
        }
        self.next_measurement_frame = frame.index + MEASURE_EVERY_FRAMES;
    }

    /// Drops the current cycle and keeps the last good correction.
    fn abandon(&mut self, err: ReadbackError) {
        self.ring.release();
        if !self.warned {
            warn!(%err, "latitude error measurement failed, keeping last correction");
            self.warned = true;
        }
    }
}
