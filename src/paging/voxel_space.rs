//! Voxel space: one unit per voxel, origin at the volume center.
//! Sub-cube geometry lives here; slices are built in object space and
//! mapped in and out.

use crate::error::{EngineError, EngineResult};
use crate::math::{aabb_center, Plane};
use crate::voxel::VolumeDescriptor;
use cgmath::{ElementWise, EuclideanSpace, InnerSpace, Point3, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelSpace {
    pub center: Point3<f32>,
    pub voxel_size: Vector3<f32>,
}

impl VoxelSpace {
    pub fn of(volume: &VolumeDescriptor<'_>) -> EngineResult<Self> {
        let voxel_size = volume.voxel_size();
        if voxel_size.x <= 0.0 || voxel_size.y <= 0.0 || voxel_size.z <= 0.0 {
            return Err(EngineError::DegenerateTransform {
                operation: format!("voxel space of volume {:?}", volume.bounds),
            });
        }
        Ok(Self {
            center: aabb_center(&volume.bounds),
            voxel_size,
        })
    }

    pub fn to_object(&self, p: Point3<f32>) -> Point3<f32> {
        self.center + p.to_vec().mul_element_wise(self.voxel_size)
    }

    pub fn to_voxel(&self, p: Point3<f32>) -> Point3<f32> {
        Point3::from_vec((p - self.center).div_element_wise(self.voxel_size))
    }

    /// Map an object-space plane. Normals scale by the voxel size, which
    /// is the inverse transpose of `to_voxel`.
    pub fn plane_to_voxel(&self, plane: &Plane) -> Option<Plane> {
        let normal = plane.normal.mul_element_wise(self.voxel_size);
        let length = normal.magnitude();
        if length == 0.0 {
            return None;
        }
        let distance = plane.distance - plane.normal.dot(self.center.to_vec());
        Some(Plane {
            normal: normal / length,
            distance: distance / length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::plane_from_normal_point;
    use crate::voxel::{UnitSize, VolumeData};
    use crate::math::create_aabb;

    fn space() -> VoxelSpace {
        let volume = VolumeData::new([4, 8, 2], UnitSize::U8, vec![0; 64])
            .expect("volume")
            .with_bounds(create_aabb(
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.0, 2.0, 2.0),
            ));
        VoxelSpace::of(&volume.descriptor()).expect("space")
    }

    #[test]
    fn test_round_trip_point() {
        let s = space();
        let v = s.to_voxel(Point3::new(0.0, 0.0, 0.0));
        assert_eq!(v, Point3::new(-2.0, -4.0, -1.0));
        assert_eq!(s.to_object(v), Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_plane_mapping_keeps_points_on_plane() {
        let s = space();
        let plane = plane_from_normal_point(Vector3::new(1.0, 1.0, 0.0), Point3::new(1.5, 0.5, 1.0))
            .expect("plane");
        let mapped = s.plane_to_voxel(&plane).expect("mapped");
        for p in [
            Point3::new(1.5, 0.5, 1.0),
            Point3::new(1.0, 1.0, 0.3),
            Point3::new(2.0, 0.0, 1.7),
        ] {
            assert!(plane.signed_distance(p).abs() < 1e-5);
            assert!(mapped.signed_distance(s.to_voxel(p)).abs() < 1e-4);
        }
        // Orientation survives the mapping
        let inside = Point3::new(2.0, 2.0, 1.0);
        assert!(plane.signed_distance(inside) > 0.0);
        assert!(mapped.signed_distance(s.to_voxel(inside)) > 0.0);
    }
}
