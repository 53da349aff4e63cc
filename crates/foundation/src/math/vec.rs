use glam::{DMat3, DVec2, DVec3};

/// Rotates `v` around the X axis through the origin.
pub fn rotate_x(v: DVec3, angle_rad: f64) -> DVec3 {
    DMat3::from_rotation_x(angle_rad) * v
}

/// Rotates `v` around the Y axis through the origin.
pub fn rotate_y(v: DVec3, angle_rad: f64) -> DVec3 {
    DMat3::from_rotation_y(angle_rad) * v
}

/// Rotates `v` around the Z axis through the origin.
pub fn rotate_z(v: DVec3, angle_rad: f64) -> DVec3 {
    DMat3::from_rotation_z(angle_rad) * v
}

/// Intersection of the infinite lines `a1-a2` and `b1-b2`.
///
/// Returns `None` for parallel (or degenerate) lines.
pub fn line_intersection(a1: DVec2, a2: DVec2, b1: DVec2, b2: DVec2) -> Option<DVec2> {
    let a_delta = a2 - a1;
    let b_delta = b2 - b1;

    let denominator = b_delta.y * a_delta.x - b_delta.x * a_delta.y;
    if denominator == 0.0 {
        return None;
    }

    let origin_delta = a1 - b1;
    let t = (b_delta.x * origin_delta.y - b_delta.y * origin_delta.x) / denominator;
    Some(a1 + a_delta * t)
}
