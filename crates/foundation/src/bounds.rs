use glam::DVec3;

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb3 {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Aabb3 { min, max }
    }

    /// Smallest box containing every point. Returns `None` for an empty slice.
    pub fn from_points(points: &[DVec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut b = Aabb3::new(*first, *first);
        for p in rest {
            b.min = b.min.min(*p);
            b.max = b.max.max(*p);
        }
        Some(b)
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn corners(&self) -> [DVec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            DVec3::new(a.x, a.y, a.z),
            DVec3::new(b.x, a.y, a.z),
            DVec3::new(b.x, b.y, a.z),
            DVec3::new(a.x, b.y, a.z),
            DVec3::new(a.x, a.y, b.z),
            DVec3::new(b.x, a.y, b.z),
            DVec3::new(b.x, b.y, b.z),
            DVec3::new(a.x, b.y, b.z),
        ]
    }

    /// Signed distance along X from `x` to the nearest face; 0 when inside.
    pub fn distance_x(&self, x: f64) -> f64 {
        axis_distance(x, self.min.x, self.max.x)
    }

    /// Signed distance along Y from `y` to the nearest face; 0 when inside.
    pub fn distance_y(&self, y: f64) -> f64 {
        axis_distance(y, self.min.y, self.max.y)
    }
}

fn axis_distance(v: f64, min: f64, max: f64) -> f64 {
    if v < min {
        min - v
    } else if v > max {
        max - v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb3;
    use glam::DVec3;

    #[test]
    fn from_points_spans_all() {
        let b = Aabb3::from_points(&[
            DVec3::new(1.0, -2.0, 0.0),
            DVec3::new(-1.0, 3.0, 0.5),
            DVec3::new(0.0, 0.0, -4.0),
        ])
        .unwrap();
        assert_eq!(b.min, DVec3::new(-1.0, -2.0, -4.0));
        assert_eq!(b.max, DVec3::new(1.0, 3.0, 0.5));
        assert!(Aabb3::from_points(&[]).is_none());
    }

    #[test]
    fn axis_distances_are_zero_inside() {
        let b = Aabb3::new(DVec3::ZERO, DVec3::ONE);
        assert_eq!(b.distance_x(0.5), 0.0);
        assert_eq!(b.distance_x(-1.0), 1.0);
        assert_eq!(b.distance_y(3.0), -2.0);
    }
}
