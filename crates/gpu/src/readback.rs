//! Asynchronous GPU measurement plumbing.
//!
//! A measurement renders a single pixel into a 1x1 target and reads it back
//! without stalling the frame. The pixel stores a small signed float in RGBA8:
//! three mantissa bytes and a sign byte.

use thiserror::Error;
use tracing::debug;

/// Number of transfer slots cycled through by [`ReadbackRing`].
pub const READBACK_RING_SIZE: usize = 2;

/// Encoded values are scaled by this factor so the mantissa covers `[0, 1/RANGE)`.
pub const RGBA8_FLOAT_RANGE: f64 = 128.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadbackError {
    #[error("waiting on the readback fence failed")]
    WaitFailed,
    #[error("the rendering context was lost")]
    ContextLost,
}

/// Result of a non-blocking fence poll.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    /// Not finished yet; poll again next frame.
    TimeoutExpired,
}

/// Inputs of one measurement draw, as uploaded to the GPU.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeasurementRequest {
    /// Normalized Mercator Y of the map center.
    pub mercator_y: f32,
    /// Latitude of that Y in radians, computed exactly on the CPU.
    pub expected_angle: f32,
}

/// A device able to evaluate the spherical latitude formula and read the
/// signed error back.
pub trait MeasurementDevice {
    /// Whether non-blocking fence polling is available.
    fn supports_fences(&self) -> bool;

    /// Draws the measurement pixel and starts copying it into `slot`.
    fn issue(&mut self, slot: usize, request: MeasurementRequest) -> Result<(), ReadbackError>;

    /// Polls the fence guarding `slot`.
    fn poll(&mut self, slot: usize) -> Result<FenceStatus, ReadbackError>;

    /// Returns the pixel copied into `slot`. Blocks when fences are unsupported.
    fn read(&mut self, slot: usize) -> Result<[u8; 4], ReadbackError>;
}

/// Encodes `value` the way the measurement shader writes it.
///
/// Magnitudes at or above `1 / RGBA8_FLOAT_RANGE` saturate.
pub fn encode_rgba8_float(value: f64) -> [u8; 4] {
    let max = 1.0 - 1.0 / 16_777_216.0;
    let mut scaled = (value.abs() * RGBA8_FLOAT_RANGE).min(max);
    let mut bytes = [0u8; 4];
    for byte in bytes.iter_mut().take(3) {
        scaled *= 256.0;
        let digit = scaled.floor();
        *byte = digit as u8;
        scaled -= digit;
    }
    bytes[3] = if value < 0.0 { 0 } else { 255 };
    bytes
}

pub fn decode_rgba8_float(bytes: [u8; 4]) -> f64 {
    let mut value = f64::from(bytes[0]) / 256.0
        + f64::from(bytes[1]) / 65_536.0
        + f64::from(bytes[2]) / 16_777_216.0;
    if bytes[3] < 127 {
        value = -value;
    }
    value / RGBA8_FLOAT_RANGE
}

/// Latitude in radians from normalized Mercator Y, evaluated in `f32` like a
/// shader would.
pub fn shader_latitude(mercator_y: f32) -> f32 {
    use std::f32::consts::{FRAC_PI_2, PI};
    2.0 * (PI - mercator_y * 2.0 * PI).exp().atan() - FRAC_PI_2
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PendingReadback {
    pub slot: usize,
    pub issued_frame: u64,
}

/// Fixed set of transfer slots with at most one transfer in flight.
#[derive(Debug, Default)]
pub struct ReadbackRing {
    next_slot: usize,
    pending: Option<PendingReadback>,
}

impl ReadbackRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<PendingReadback> {
        self.pending
    }

    /// Reserves the next slot. Returns `None` while a transfer is outstanding.
    pub fn acquire(&mut self, frame: u64) -> Option<PendingReadback> {
        if self.pending.is_some() {
            return None;
        }
        let pending = PendingReadback {
            slot: self.next_slot,
            issued_frame: frame,
        };
        self.next_slot = (self.next_slot + 1) % READBACK_RING_SIZE;
        self.pending = Some(pending);
        Some(pending)
    }

    /// Frees the outstanding slot.
    pub fn release(&mut self) -> Option<PendingReadback> {
        self.pending.take()
    }
}

#[derive(Debug, Copy, Clone)]
struct CpuSlot {
    pixel: [u8; 4],
    polls_left: u32,
}

/// Evaluates measurements on the CPU in `f32`.
///
/// Used by headless hosts and tests. `bias` adds a fixed error to every
/// measurement; `latency_polls` is how many polls report
/// [`FenceStatus::TimeoutExpired`] before the result is ready.
#[derive(Debug)]
pub struct CpuMeasurementDevice {
    fences: bool,
    latency_polls: u32,
    bias: f64,
    fail_waits: bool,
    slots: [Option<CpuSlot>; READBACK_RING_SIZE],
    issued: usize,
}

impl Default for CpuMeasurementDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuMeasurementDevice {
    pub fn new() -> Self {
        Self {
            fences: true,
            latency_polls: 0,
            bias: 0.0,
            fail_waits: false,
            slots: [None; READBACK_RING_SIZE],
            issued: 0,
        }
    }

    pub fn with_fences(mut self, fences: bool) -> Self {
        self.fences = fences;
        self
    }

    pub fn with_latency(mut self, polls: u32) -> Self {
        self.latency_polls = polls;
        self
    }

    pub fn with_bias(mut self, bias_rad: f64) -> Self {
        self.bias = bias_rad;
        self
    }

    /// Makes every following fence poll fail until reset.
    pub fn set_fail_waits(&mut self, fail: bool) {
        self.fail_waits = fail;
    }

    /// Number of measurements issued so far.
    pub fn issued(&self) -> usize {
        self.issued
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut Option<CpuSlot>, ReadbackError> {
        self.slots.get_mut(slot).ok_or(ReadbackError::ContextLost)
    }
}

impl MeasurementDevice for CpuMeasurementDevice {
    fn supports_fences(&self) -> bool {
        self.fences
    }

    fn issue(&mut self, slot: usize, request: MeasurementRequest) -> Result<(), ReadbackError> {
        let error = f64::from(shader_latitude(request.mercator_y) - request.expected_angle) + self.bias;
        let polls_left = self.latency_polls;
        *self.slot_mut(slot)? = Some(CpuSlot {
            pixel: encode_rgba8_float(error),
            polls_left,
        });
        self.issued += 1;
        debug!(slot, error, "cpu measurement issued");
        Ok(())
    }

    fn poll(&mut self, slot: usize) -> Result<FenceStatus, ReadbackError> {
        if self.fail_waits {
            return Err(ReadbackError::WaitFailed);
        }
        let entry = self.slot_mut(slot)?.as_mut().ok_or(ReadbackError::WaitFailed)?;
        if entry.polls_left > 0 {
            entry.polls_left -= 1;
            return Ok(FenceStatus::TimeoutExpired);
        }
        Ok(FenceStatus::Signaled)
    }

    fn read(&mut self, slot: usize) -> Result<[u8; 4], ReadbackError> {
        let entry = self.slot_mut(slot)?.take().ok_or(ReadbackError::WaitFailed)?;
        Ok(entry.pixel)
    }
}
