use super::aabb::AABB;
use cgmath::{InnerSpace, Point3, Vector3};

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }
}

/// Entry and exit points of a ray through a volume box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPick {
    /// Hit closest to the ray origin
    pub entry: Point3<f32>,
    pub exit: Point3<f32>,
}

// Faces in test order: (fixed axis, use max bound, in-plane axes)
const PICK_FACES: [(usize, bool, (usize, usize)); 6] = [
    (2, false, (0, 1)),
    (2, true, (0, 1)),
    (0, false, (1, 2)),
    (0, true, (1, 2)),
    (1, false, (0, 2)),
    (1, true, (0, 2)),
];

/// Intersect the infinite line of `ray` with the six bounding planes of
/// `aabb`. Each plane hit must lie inside the face (bounds inclusive).
/// Fewer than two hits is a miss.
///
/// A line through a box edge or corner hits every face sharing it at the
/// same point. Those duplicates are skipped in favor of a distinct exit;
/// a line that only grazes the edge reports two coincident hits.
pub fn volume_ray_pick(ray: &Ray, aabb: &AABB) -> Option<RayPick> {
    let origin = [ray.origin.x, ray.origin.y, ray.origin.z];
    let dir = [ray.direction.x, ray.direction.y, ray.direction.z];
    let min = [aabb.min.x, aabb.min.y, aabb.min.z];
    let max = [aabb.max.x, aabb.max.y, aabb.max.z];

    let mut hits: Vec<Point3<f32>> = Vec::with_capacity(PICK_FACES.len());
    for &(axis, use_max, (a, b)) in PICK_FACES.iter() {
        if dir[axis] == 0.0 {
            continue;
        }
        let value = if use_max { max[axis] } else { min[axis] };
        let t = (value - origin[axis]) / dir[axis];
        let mut p = [
            origin[0] + dir[0] * t,
            origin[1] + dir[1] * t,
            origin[2] + dir[2] * t,
        ];
        p[axis] = value;

        if within(p[a], min[a], max[a]) && within(p[b], min[b], max[b]) {
            hits.push(Point3::new(p[0], p[1], p[2]));
        }
    }

    let first = *hits.first()?;
    let same_point = 1e-5 * (aabb.max - aabb.min).magnitude().max(1.0);
    let second = hits
        .iter()
        .skip(1)
        .find(|h| (**h - first).magnitude() > same_point)
        .or_else(|| hits.get(1))
        .copied()?;

    let (entry, exit) =
        if (first - ray.origin).magnitude2() <= (second - ray.origin).magnitude2() {
            (first, second)
        } else {
            (second, first)
        };
    Some(RayPick { entry, exit })
}

fn within(v: f32, lo: f32, hi: f32) -> bool {
    let eps = 1e-5 * (hi - lo).abs().max(1.0);
    v >= lo - eps && v <= hi + eps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::aabb::create_aabb;

    fn unit_box() -> AABB {
        create_aabb(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_ray_through_opposite_faces() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let pick = volume_ray_pick(&ray, &unit_box()).expect("two hits");
        assert!((pick.entry.z - 1.0).abs() < 1e-6);
        assert!((pick.exit.z - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_hits_ordered_from_origin() {
        let ray = Ray::new(Point3::new(-3.0, 0.5, 0.5), Vector3::new(1.0, 0.0, 0.0));
        let pick = volume_ray_pick(&ray, &unit_box()).expect("two hits");
        assert!((pick.entry.x - 0.0).abs() < 1e-6);
        assert!((pick.exit.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_ray() {
        let ray = Ray::new(Point3::new(5.0, 5.0, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(volume_ray_pick(&ray, &unit_box()).is_none());
    }

    #[test]
    fn test_grazing_edge_gives_coincident_hits() {
        let ray = Ray::new(Point3::new(2.0, 0.0, 0.5), Vector3::new(-1.0, 1.0, 0.0));
        let pick = volume_ray_pick(&ray, &unit_box()).expect("edge hits");
        assert!((pick.entry - Point3::new(1.0, 1.0, 0.5)).magnitude() < 1e-5);
        assert!((pick.exit - pick.entry).magnitude() < 1e-5);
    }

    #[test]
    fn test_edge_entry_keeps_real_exit() {
        // Enters through the x = 0, z = 0 edge, leaves through the y = 1 face
        let ray = Ray::new(Point3::new(-0.5, -0.4, -0.5), Vector3::new(0.5, 0.7, 0.5));
        let pick = volume_ray_pick(&ray, &unit_box()).expect("two hits");
        assert!((pick.entry - Point3::new(0.0, 0.3, 0.0)).magnitude() < 1e-5);
        assert!((pick.exit - Point3::new(0.5, 1.0, 0.5)).magnitude() < 1e-5);
    }

    #[test]
    fn test_corner_to_corner() {
        let ray = Ray::new(Point3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let pick = volume_ray_pick(&ray, &unit_box()).expect("two hits");
        assert!((pick.entry - Point3::new(0.0, 0.0, 0.0)).magnitude() < 1e-5);
        assert!((pick.exit - Point3::new(1.0, 1.0, 1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn test_line_not_half_ray() {
        // Box behind the origin is still hit
        let ray = Ray::new(Point3::new(0.5, 0.5, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(volume_ray_pick(&ray, &unit_box()).is_some());
    }
}
