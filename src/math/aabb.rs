/// Axis-Aligned Bounding Box helpers
///
/// Pure functions - no methods, just data transformations.
use cgmath::{InnerSpace, Matrix4, Point3, Transform, Vector3};

/// Axis-Aligned Bounding Box - pure data structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

/// Create new AABB from min/max points
pub fn create_aabb(min: Point3<f32>, max: Point3<f32>) -> AABB {
    AABB { min, max }
}

/// Box of the given size centered on the origin
pub fn aabb_centered(size: Vector3<f32>) -> AABB {
    let half = size * 0.5;
    AABB {
        min: Point3::new(-half.x, -half.y, -half.z),
        max: Point3::new(half.x, half.y, half.z),
    }
}

/// Get center point of AABB
pub fn aabb_center(aabb: &AABB) -> Point3<f32> {
    Point3::new(
        (aabb.min.x + aabb.max.x) * 0.5,
        (aabb.min.y + aabb.max.y) * 0.5,
        (aabb.min.z + aabb.max.z) * 0.5,
    )
}

/// Extent along each axis
pub fn aabb_size(aabb: &AABB) -> Vector3<f32> {
    aabb.max - aabb.min
}

/// Radius of the bounding sphere around the center
pub fn aabb_radius(aabb: &AABB) -> f32 {
    aabb_size(aabb).magnitude() * 0.5
}

/// Test if AABB contains a point (inclusive)
pub fn aabb_contains_point(aabb: &AABB, point: Point3<f32>) -> bool {
    point.x >= aabb.min.x
        && point.x <= aabb.max.x
        && point.y >= aabb.min.y
        && point.y <= aabb.max.y
        && point.z >= aabb.min.z
        && point.z <= aabb.max.z
}

/// The 8 corners, x varying fastest
pub fn aabb_corners(aabb: &AABB) -> [Point3<f32>; 8] {
    let mut corners = [aabb.min; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        corner.x = if i & 1 == 0 { aabb.min.x } else { aabb.max.x };
        corner.y = if i & 2 == 0 { aabb.min.y } else { aabb.max.y };
        corner.z = if i & 4 == 0 { aabb.min.z } else { aabb.max.z };
    }
    corners
}

/// Bounding box of the transformed corners
pub fn aabb_transformed(aabb: &AABB, matrix: &Matrix4<f32>) -> AABB {
    let corners = aabb_corners(aabb);
    let first = matrix.transform_point(corners[0]);
    let mut result = AABB {
        min: first,
        max: first,
    };
    for corner in &corners[1..] {
        let p = matrix.transform_point(*corner);
        result.min.x = result.min.x.min(p.x);
        result.min.y = result.min.y.min(p.y);
        result.min.z = result.min.z.min(p.z);
        result.max.x = result.max.x.max(p.x);
        result.max.y = result.max.y.max(p.y);
        result.max.z = result.max.z.max(p.z);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_box() {
        let aabb = aabb_centered(Vector3::new(2.0, 4.0, 6.0));
        assert_eq!(aabb.min, Point3::new(-1.0, -2.0, -3.0));
        assert_eq!(aabb_center(&aabb), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb_size(&aabb), Vector3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_corners_and_radius() {
        let aabb = create_aabb(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 1.0));
        let corners = aabb_corners(&aabb);
        assert_eq!(corners[0], aabb.min);
        assert_eq!(corners[7], aabb.max);
        assert!((aabb_radius(&aabb) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_transformed_box() {
        let aabb = create_aabb(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let m = Matrix4::from_translation(Vector3::new(1.0, 0.0, 0.0))
            * Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let t = aabb_transformed(&aabb, &m);
        assert_eq!(t.min, Point3::new(1.0, 0.0, 0.0));
        assert_eq!(t.max, Point3::new(3.0, 1.0, 1.0));
    }
}
