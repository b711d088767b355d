//! Oriented planes
//!
//! A plane keeps the points with `signed_distance >= 0` on its inside.

use cgmath::{InnerSpace, Point3, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing to the kept half-space
    pub normal: Vector3<f32>,
    /// Distance of the plane from the origin along the normal
    pub distance: f32,
}

/// Plane through `point` with the given normal (normalized here)
pub fn plane_from_normal_point(normal: Vector3<f32>, point: Point3<f32>) -> Option<Plane> {
    if normal.magnitude2() == 0.0 {
        return None;
    }
    let n = normal.normalize();
    Some(Plane {
        normal: n,
        distance: n.dot(point - Point3::new(0.0, 0.0, 0.0)),
    })
}

/// Plane through three points, normal = (b - a) x (c - a).
/// Returns `None` for collinear points.
pub fn plane_from_points(a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) -> Option<Plane> {
    plane_from_normal_point((b - a).cross(c - a), a)
}

impl Plane {
    pub fn signed_distance(&self, p: Point3<f32>) -> f32 {
        self.normal.dot(p - Point3::new(0.0, 0.0, 0.0)) - self.distance
    }

    pub fn is_in_half_space(&self, p: Point3<f32>) -> bool {
        self.signed_distance(p) >= 0.0
    }

    /// Intersection with the infinite line through `origin` along `direction`.
    /// `None` when the line is parallel to the plane.
    pub fn intersect_line(
        &self,
        origin: Point3<f32>,
        direction: Vector3<f32>,
    ) -> Option<Point3<f32>> {
        let denom = self.normal.dot(direction);
        if denom.abs() < f32::EPSILON {
            return None;
        }
        let t = -self.signed_distance(origin) / denom;
        Some(origin + direction * t)
    }

    /// Intersection with the segment `a`-`b` treated as a line
    pub fn intersect_segment(&self, a: Point3<f32>, b: Point3<f32>) -> Option<Point3<f32>> {
        self.intersect_line(a, b - a)
    }

    /// Same plane, opposite orientation
    pub fn flipped(&self) -> Plane {
        Plane {
            normal: -self.normal,
            distance: -self.distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_from_points_orientation() {
        let plane = plane_from_points(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
        .expect("non-degenerate");
        assert_eq!(plane.normal, Vector3::new(0.0, 0.0, 1.0));
        assert!(plane.is_in_half_space(Point3::new(0.0, 0.0, 0.5)));
        assert!(!plane.is_in_half_space(Point3::new(0.0, 0.0, -0.5)));
    }

    #[test]
    fn test_collinear_points_rejected() {
        assert!(plane_from_points(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_intersect_line() {
        let plane = plane_from_normal_point(Vector3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0))
            .expect("plane");
        let hit = plane
            .intersect_line(Point3::new(0.0, 1.0, 1.0), Vector3::new(1.0, 0.0, 0.0))
            .expect("hit");
        assert_eq!(hit, Point3::new(2.0, 1.0, 1.0));
        assert!(plane
            .intersect_line(Point3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0))
            .is_none());
    }
}
