use foundation::bounds::Aabb3;
use foundation::math::{DMat4, DVec3, DVec4};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Plane {
    pub n: DVec3,
    pub d: f64,
}

impl Plane {
    pub fn new(n: DVec3, d: f64) -> Self {
        Self { n, d }
    }

    /// Plane from `(nx, ny, nz, d)` coefficients.
    pub fn from_coefficients(c: [f64; 4]) -> Self {
        Self::new(DVec3::new(c[0], c[1], c[2]), c[3])
    }

    fn from_vec4(v: DVec4) -> Self {
        Self::new(v.truncate(), v.w)
    }

    pub fn normalize(self) -> Self {
        let l2 = self.n.length_squared();
        if l2 <= 0.0 {
            return self;
        }
        let inv = 1.0 / l2.sqrt();
        Self {
            n: self.n * inv,
            d: self.d * inv,
        }
    }

    pub fn distance(&self, p: DVec3) -> f64 {
        self.n.dot(p) + self.d
    }

    /// Classifies a box against the positive half-space.
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> IntersectionResult {
        let mut inside = 0;
        for corner in aabb.corners() {
            if self.distance(corner) >= 0.0 {
                inside += 1;
            }
        }
        match inside {
            0 => IntersectionResult::None,
            8 => IntersectionResult::Full,
            _ => IntersectionResult::Partial,
        }
    }
}

/// Outcome of a volume/box test.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IntersectionResult {
    None,
    Partial,
    Full,
}

impl IntersectionResult {
    /// Combines two tests of the same box: any miss wins, full only if both are full.
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, _) | (_, Self::None) => Self::None,
            (Self::Full, Self::Full) => Self::Full,
            _ => Self::Partial,
        }
    }
}

/// View frustum as 6 planes.
///
/// Convention:
/// - A point `p` is inside iff `plane.distance(p) >= 0` for all planes.
/// - Planes live in whatever space the source matrix maps from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frustum {
    pub left: Plane,
    pub right: Plane,
    pub bottom: Plane,
    pub top: Plane,
    pub near: Plane,
    pub far: Plane,
}

impl Frustum {
    pub fn new(
        left: Plane,
        right: Plane,
        bottom: Plane,
        top: Plane,
        near: Plane,
        far: Plane,
    ) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
            near,
            far,
        }
    }

    pub fn normalize(self) -> Self {
        Self {
            left: self.left.normalize(),
            right: self.right.normalize(),
            bottom: self.bottom.normalize(),
            top: self.top.normalize(),
            near: self.near.normalize(),
            far: self.far.normalize(),
        }
    }

    /// Build a frustum from a view-projection matrix.
    ///
    /// This expects the GL clip-space convention where visible points satisfy
    /// `-w <= x, y, z <= w`.
    pub fn from_view_projection(m: &DMat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);

        Self::new(
            Plane::from_vec4(r3 + r0),
            Plane::from_vec4(r3 - r0),
            Plane::from_vec4(r3 + r1),
            Plane::from_vec4(r3 - r1),
            Plane::from_vec4(r3 + r2),
            Plane::from_vec4(r3 - r2),
        )
        .normalize()
    }

    fn planes(&self) -> [Plane; 6] {
        [
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        ]
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        self.planes().iter().all(|plane| plane.distance(p) >= 0.0)
    }

    pub fn intersects_aabb(&self, aabb: &Aabb3) -> bool {
        self.intersect_aabb(aabb) != IntersectionResult::None
    }

    /// p-vertex / n-vertex test: the box is outside if its most-inside corner
    /// is behind any plane, and fully inside if its least-inside corner is in
    /// front of every plane.
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> IntersectionResult {
        let mut result = IntersectionResult::Full;
        for plane in self.planes() {
            let p = DVec3::new(
                if plane.n.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.n.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.n.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.distance(p) < 0.0 {
                return IntersectionResult::None;
            }
            let n = DVec3::new(
                if plane.n.x >= 0.0 { aabb.min.x } else { aabb.max.x },
                if plane.n.y >= 0.0 { aabb.min.y } else { aabb.max.y },
                if plane.n.z >= 0.0 { aabb.min.z } else { aabb.max.z },
            );
            if plane.distance(n) < 0.0 {
                result = IntersectionResult::Partial;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{Frustum, IntersectionResult, Plane};
    use foundation::bounds::Aabb3;
    use foundation::math::{DMat4, DVec3};

    fn unit_cube_frustum() -> Frustum {
        // Cube: -1<=x<=1, -1<=y<=1, -1<=z<=1
        let left = Plane::new(DVec3::X, 1.0);
        let right = Plane::new(-DVec3::X, 1.0);
        let bottom = Plane::new(DVec3::Y, 1.0);
        let top = Plane::new(-DVec3::Y, 1.0);
        let near = Plane::new(DVec3::Z, 1.0);
        let far = Plane::new(-DVec3::Z, 1.0);
        Frustum::new(left, right, bottom, top, near, far)
    }

    #[test]
    fn classifies_boxes() {
        let f = unit_cube_frustum();
        let inside = Aabb3::new(DVec3::splat(-0.5), DVec3::splat(0.5));
        let straddling = Aabb3::new(DVec3::splat(0.5), DVec3::splat(1.5));
        let outside = Aabb3::new(DVec3::splat(2.0), DVec3::splat(3.0));
        assert_eq!(f.intersect_aabb(&inside), IntersectionResult::Full);
        assert_eq!(f.intersect_aabb(&straddling), IntersectionResult::Partial);
        assert_eq!(f.intersect_aabb(&outside), IntersectionResult::None);
        assert!(!f.intersects_aabb(&outside));
    }

    #[test]
    fn identity_matrix_yields_clip_cube() {
        let f = Frustum::from_view_projection(&DMat4::IDENTITY);
        assert!(f.contains_point(DVec3::new(0.9, -0.9, 0.5)));
        assert!(!f.contains_point(DVec3::new(1.1, 0.0, 0.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -1.5)));
    }

    #[test]
    fn perspective_frustum_sees_forward() {
        let m = DMat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0);
        let f = Frustum::from_view_projection(&m);
        assert!(f.contains_point(DVec3::new(0.0, 0.0, -10.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, 10.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -200.0)));
    }

    #[test]
    fn plane_box_classification() {
        let plane = Plane::from_coefficients([0.0, 0.0, 1.0, 0.0]);
        let above = Aabb3::new(DVec3::new(0.0, 0.0, 1.0), DVec3::new(1.0, 1.0, 2.0));
        let across = Aabb3::new(DVec3::new(0.0, 0.0, -1.0), DVec3::new(1.0, 1.0, 1.0));
        let below = Aabb3::new(DVec3::new(0.0, 0.0, -3.0), DVec3::new(1.0, 1.0, -2.0));
        assert_eq!(plane.intersect_aabb(&above), IntersectionResult::Full);
        assert_eq!(plane.intersect_aabb(&across), IntersectionResult::Partial);
        assert_eq!(plane.intersect_aabb(&below), IntersectionResult::None);
    }

    #[test]
    fn combining_results() {
        use IntersectionResult::*;
        assert_eq!(Full.and(Full), Full);
        assert_eq!(Full.and(Partial), Partial);
        assert_eq!(Partial.and(None), None);
    }
}
