//! Sutherland-Hodgman polygon clipping against planes

use super::plane::Plane;
use cgmath::{InnerSpace, Point3, Vector3};

/// Vertex list of a convex or concave planar polygon
pub type ClipPolygon = Vec<Point3<f32>>;

const MERGE_EPSILON: f32 = 1e-6;

/// Clip `polygon` against one plane, keeping the inside
/// (`signed_distance >= 0`). A new vertex is only emitted where an edge
/// strictly crosses the plane.
pub fn clip_polygon(polygon: &[Point3<f32>], plane: &Plane) -> ClipPolygon {
    let mut output = Vec::with_capacity(polygon.len() + 2);
    if polygon.is_empty() {
        return output;
    }

    let mut prev = polygon[polygon.len() - 1];
    let mut prev_dist = plane.signed_distance(prev);

    for &current in polygon {
        let dist = plane.signed_distance(current);
        let crosses = (prev_dist > 0.0 && dist < 0.0) || (prev_dist < 0.0 && dist > 0.0);
        if crosses {
            let t = prev_dist / (prev_dist - dist);
            push_distinct(&mut output, prev + (current - prev) * t);
        }
        if dist >= 0.0 {
            push_distinct(&mut output, current);
        }
        prev = current;
        prev_dist = dist;
    }

    if output.len() > 1 {
        let first = output[0];
        if let Some(last) = output.last() {
            if (*last - first).magnitude2() < MERGE_EPSILON * MERGE_EPSILON {
                output.pop();
            }
        }
    }
    output
}

/// Clip against every plane in turn
pub fn clip_polygon_planes(polygon: &[Point3<f32>], planes: &[Plane]) -> ClipPolygon {
    let mut current: ClipPolygon = polygon.to_vec();
    for plane in planes {
        if current.is_empty() {
            break;
        }
        current = clip_polygon(&current, plane);
    }
    current
}

fn push_distinct(output: &mut ClipPolygon, p: Point3<f32>) {
    if let Some(last) = output.last() {
        if (*last - p).magnitude2() < MERGE_EPSILON * MERGE_EPSILON {
            return;
        }
    }
    output.push(p);
}

/// Newell normal; its length is twice the polygon area
pub fn polygon_normal(polygon: &[Point3<f32>]) -> Vector3<f32> {
    let mut n = Vector3::new(0.0, 0.0, 0.0);
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

/// At least 3 vertices enclosing a non-zero area
pub fn polygon_has_area(polygon: &[Point3<f32>]) -> bool {
    polygon.len() >= 3 && polygon_normal(polygon).magnitude2() > MERGE_EPSILON * MERGE_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::plane::plane_from_normal_point;

    fn unit_square() -> ClipPolygon {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_clip_half() {
        let plane =
            plane_from_normal_point(Vector3::new(-1.0, 0.0, 0.0), Point3::new(0.5, 0.0, 0.0))
                .expect("plane");
        let clipped = clip_polygon(&unit_square(), &plane);
        assert_eq!(clipped.len(), 4);
        assert!(clipped.iter().all(|p| p.x <= 0.5 + 1e-6));
        assert!(polygon_has_area(&clipped));
    }

    #[test]
    fn test_clip_fully_outside() {
        let plane = plane_from_normal_point(Vector3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0))
            .expect("plane");
        assert!(clip_polygon(&unit_square(), &plane).is_empty());
    }

    #[test]
    fn test_touching_edge_is_degenerate() {
        // Only the x = 1 edge survives
        let plane = plane_from_normal_point(Vector3::new(1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0))
            .expect("plane");
        let clipped = clip_polygon(&unit_square(), &plane);
        assert_eq!(clipped.len(), 2);
        assert!(!polygon_has_area(&clipped));
    }

    #[test]
    fn test_clip_against_box_planes() {
        let planes = [
            plane_from_normal_point(Vector3::new(1.0, 0.0, 0.0), Point3::new(0.25, 0.0, 0.0))
                .expect("plane"),
            plane_from_normal_point(Vector3::new(0.0, -1.0, 0.0), Point3::new(0.0, 0.75, 0.0))
                .expect("plane"),
        ];
        let clipped = clip_polygon_planes(&unit_square(), &planes);
        let area = polygon_normal(&clipped).magnitude() * 0.5;
        assert!((area - 0.75 * 0.75).abs() < 1e-5);
    }
}
