//! Precision policies.
//!
//! CPU math runs in `f64`; values cross into `f32` only at the GPU boundary.
//! This module provides:
//! - The `f64` -> `f32` matrix conversion used for GPU uniforms.
//! - A deterministic float ordering wrapper (`StableF64`) for sorting and keys.

use core::cmp::Ordering;

use glam::DMat4;

/// Column-major `f32` matrix as uploaded to the GPU.
pub type GpuMatrix = [f32; 16];

/// Convert a CPU matrix to its GPU representation.
#[inline]
pub fn to_gpu_matrix(m: &DMat4) -> GpuMatrix {
    m.as_mat4().to_cols_array()
}

/// Canonicalize a floating-point value for deterministic ordering.
///
/// Rules:
/// - `-0.0` becomes `0.0`
/// - all NaNs become a single canonical NaN
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Deterministic total ordering for floats.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

/// A float wrapper with a deterministic total ordering.
#[derive(Debug, Copy, Clone, Default)]
pub struct StableF64(pub f64);

impl PartialEq for StableF64 {
    fn eq(&self, other: &Self) -> bool {
        stable_total_cmp_f64(self.0, other.0) == Ordering::Equal
    }
}

impl Eq for StableF64 {}

impl PartialOrd for StableF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StableF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        stable_total_cmp_f64(self.0, other.0)
    }
}
