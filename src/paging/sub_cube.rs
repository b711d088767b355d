//! One sub-cube of the 3D paging grid
//!
//! Geometry is clipped against the cube's six inward facing planes in
//! voxel space. Each surviving polygon becomes a slice: a triangle fan
//! with object-space positions and 3D texture coordinates.

use super::voxel_space::VoxelSpace;
use crate::math::{clip_polygon_planes, polygon_has_area, Plane};
use crate::render::backend::{DrawStyle, GlBackend, SliceVertex};
use cgmath::{EuclideanSpace, Point3, Vector3};

#[derive(Debug, Clone)]
pub struct SubCube {
    /// Minimum corner in voxel space
    pub origin: Point3<f32>,
    /// Voxels of data in the cube
    pub dimensions: [u32; 3],
    pub texture_dimensions: [u32; 3],
    planes: [Plane; 6],
    space: VoxelSpace,
    slices: Vec<Vec<SliceVertex>>,
    distance: f32,
}

impl SubCube {
    pub fn new(
        origin: Point3<f32>,
        dimensions: [u32; 3],
        texture_dimensions: [u32; 3],
        space: VoxelSpace,
    ) -> Self {
        let size = Vector3::new(
            dimensions[0] as f32,
            dimensions[1] as f32,
            dimensions[2] as f32,
        );
        let far = origin + size;
        let o = origin.to_vec();
        let f = far.to_vec();
        let plane = |normal: Vector3<f32>, point: Vector3<f32>| Plane {
            normal,
            distance: cgmath::dot(normal, point),
        };
        let planes = [
            plane(Vector3::unit_z(), o),
            plane(-Vector3::unit_z(), f),
            plane(Vector3::unit_y(), o),
            plane(-Vector3::unit_y(), f),
            plane(-Vector3::unit_x(), f),
            plane(Vector3::unit_x(), o),
        ];
        Self {
            origin,
            dimensions,
            texture_dimensions,
            planes,
            space,
            slices: Vec::new(),
            distance: 0.0,
        }
    }

    pub fn clip_planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Distance from the camera, used to order cubes back to front
    pub fn distance_from_camera(&self) -> f32 {
        self.distance
    }

    pub fn set_distance_from_camera(&mut self, distance: f32) {
        self.distance = distance;
    }

    /// Voxel-space center
    pub fn center(&self) -> Point3<f32> {
        self.origin
            + Vector3::new(
                self.dimensions[0] as f32,
                self.dimensions[1] as f32,
                self.dimensions[2] as f32,
            ) * 0.5
    }

    /// Pending slices since the last render
    pub fn slice_count(&self) -> usize {
        self.slices.len()
    }

    /// Texture coordinate of a voxel-space point. Axes where the data is
    /// smaller than the texture divide by one extra texel so linear
    /// filtering never reaches into the padding.
    pub fn texcoord(&self, p: Point3<f32>) -> [f32; 3] {
        let d = p - self.origin;
        let dist = [d.x, d.y, d.z];
        let mut tc = [0.0f32; 3];
        for i in 0..3 {
            let mut divisor = self.texture_dimensions[i] as f32;
            if self.dimensions[i] < self.texture_dimensions[i] {
                divisor += 1.0;
            }
            tc[i] = dist[i] / divisor;
        }
        tc
    }

    /// Clip a voxel-space polygon against the cube and keep the result as
    /// a slice when it still encloses an area
    pub fn intersect_polygon(&mut self, polygon: &[Point3<f32>]) -> bool {
        let clipped = clip_polygon_planes(polygon, &self.planes);
        if !polygon_has_area(&clipped) {
            return false;
        }
        let slice = clipped
            .iter()
            .map(|&p| {
                let object = self.space.to_object(p);
                SliceVertex {
                    position: [object.x, object.y, object.z],
                    texcoord: self.texcoord(p),
                }
            })
            .collect();
        self.slices.push(slice);
        true
    }

    /// Consecutive polygons of `counts[i]` vertices each
    pub fn intersect_face_set(&mut self, vertices: &[Point3<f32>], counts: &[u32]) {
        let mut start = 0usize;
        for &count in counts {
            let end = (start + count as usize).min(vertices.len());
            self.intersect_polygon(&vertices[start..end]);
            start = end;
        }
    }

    /// Strips of `counts[i]` vertices; each triangle is clipped on its own
    pub fn intersect_triangle_strip_set(&mut self, vertices: &[Point3<f32>], counts: &[u32]) {
        let mut start = 0usize;
        for &count in counts {
            let end = (start + count as usize).min(vertices.len());
            for tri in vertices[start..end].windows(3) {
                self.intersect_polygon(tri);
            }
            start = end;
        }
    }

    /// Polygons separated by -1 indices; the last one needs no separator
    pub fn intersect_indexed_face_set(&mut self, vertices: &[Point3<f32>], indices: &[i32]) {
        for polygon in indexed_runs(vertices, indices) {
            self.intersect_polygon(&polygon);
        }
    }

    /// Triangle strips separated by -1 indices
    pub fn intersect_indexed_triangle_strip_set(
        &mut self,
        vertices: &[Point3<f32>],
        indices: &[i32],
    ) {
        for strip in indexed_runs(vertices, indices) {
            for tri in strip.windows(3) {
                self.intersect_polygon(tri);
            }
        }
    }

    /// Draw pending slices, most recently added first, then forget them.
    /// Returns the number of fans drawn.
    pub fn render(&mut self, backend: &mut dyn GlBackend, style: DrawStyle) -> u32 {
        let mut drawn = 0;
        for slice in self.slices.drain(..).rev() {
            backend.draw_triangle_fan(&slice, style);
            drawn += 1;
        }
        drawn
    }

    pub fn clear_slices(&mut self) {
        self.slices.clear();
    }

    /// The twelve cube edges as object-space line segments
    pub fn outline(&self) -> Vec<[f32; 3]> {
        let d = [
            self.dimensions[0] as f32,
            self.dimensions[1] as f32,
            self.dimensions[2] as f32,
        ];
        let corner = |i: usize| {
            let p = self.origin
                + Vector3::new(
                    if i & 1 != 0 { d[0] } else { 0.0 },
                    if i & 2 != 0 { d[1] } else { 0.0 },
                    if i & 4 != 0 { d[2] } else { 0.0 },
                );
            let o = self.space.to_object(p);
            [o.x, o.y, o.z]
        };
        let mut lines = Vec::with_capacity(24);
        for i in 0..8usize {
            for bit in [1usize, 2, 4] {
                if i & bit == 0 {
                    lines.push(corner(i));
                    lines.push(corner(i | bit));
                }
            }
        }
        lines
    }
}

/// Split an index list at -1 separators into vertex runs
fn indexed_runs(vertices: &[Point3<f32>], indices: &[i32]) -> Vec<Vec<Point3<f32>>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for &index in indices {
        if index < 0 {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(v) = vertices.get(index as usize) {
            current.push(*v);
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::software_backend::SoftwareBackend;

    fn unit_space() -> VoxelSpace {
        VoxelSpace {
            center: Point3::new(0.0, 0.0, 0.0),
            voxel_size: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    fn cube() -> SubCube {
        SubCube::new(Point3::new(0.0, 0.0, 0.0), [4, 4, 4], [4, 4, 4], unit_space())
    }

    fn square(z: f32, half: f32) -> Vec<Point3<f32>> {
        vec![
            Point3::new(2.0 - half, 2.0 - half, z),
            Point3::new(2.0 + half, 2.0 - half, z),
            Point3::new(2.0 + half, 2.0 + half, z),
            Point3::new(2.0 - half, 2.0 + half, z),
        ]
    }

    #[test]
    fn test_planes_face_inward() {
        let c = cube();
        let inside = Point3::new(2.0, 2.0, 2.0);
        for plane in c.clip_planes() {
            assert!(plane.signed_distance(inside) > 0.0);
        }
    }

    #[test]
    fn test_large_slice_is_cropped_to_cube() {
        let mut c = cube();
        assert!(c.intersect_polygon(&square(1.0, 10.0)));
        let mut backend = SoftwareBackend::new();
        assert_eq!(c.render(&mut backend, DrawStyle::Filled), 1);
        let fan = &backend.draws[0].vertices;
        assert_eq!(fan.len(), 4);
        for v in fan {
            assert!(v.position[0] >= -1e-5 && v.position[0] <= 4.0 + 1e-5);
            assert!((v.texcoord[2] - 0.25).abs() < 1e-6);
        }
        assert_eq!(c.slice_count(), 0);
    }

    #[test]
    fn test_miss_and_degenerate_emit_nothing() {
        let mut c = cube();
        assert!(!c.intersect_polygon(&square(5.0, 10.0)));
        // Collinear triangle
        let line = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 2.0, 1.0),
        ];
        assert!(!c.intersect_polygon(&line));
        assert_eq!(c.slice_count(), 0);
    }

    #[test]
    fn test_padded_axes_divide_by_one_more() {
        let c = SubCube::new(Point3::new(0.0, 0.0, 0.0), [3, 4, 4], [4, 4, 4], unit_space());
        let tc = c.texcoord(Point3::new(3.0, 4.0, 2.0));
        assert!((tc[0] - 0.6).abs() < 1e-6);
        assert!((tc[1] - 1.0).abs() < 1e-6);
        assert!((tc[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_slices_render_in_reverse() {
        let mut c = cube();
        c.intersect_polygon(&square(1.0, 1.0));
        c.intersect_polygon(&square(3.0, 1.0));
        let mut backend = SoftwareBackend::new();
        c.render(&mut backend, DrawStyle::Filled);
        assert_eq!(backend.draws[0].vertices[0].position[2], 3.0);
        assert_eq!(backend.draws[1].vertices[0].position[2], 1.0);
    }

    #[test]
    fn test_indexed_sets() {
        let vertices = [
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(3.0, 1.0, 1.0),
            Point3::new(3.0, 3.0, 1.0),
            Point3::new(1.0, 3.0, 1.0),
            Point3::new(1.0, 1.0, 2.0),
            Point3::new(3.0, 1.0, 2.0),
            Point3::new(3.0, 3.0, 2.0),
        ];
        let mut c = cube();
        c.intersect_indexed_face_set(&vertices, &[0, 1, 2, 3, -1, 4, 5, 6]);
        assert_eq!(c.slice_count(), 2);
        c.clear_slices();

        // Strip 0-1-2-3 gives two triangles, 4-5-6 one more
        c.intersect_indexed_triangle_strip_set(&vertices, &[0, 1, 3, 2, -1, 4, 5, 6, -1]);
        assert_eq!(c.slice_count(), 3);
    }

    #[test]
    fn test_nonindexed_sets() {
        let mut vertices = square(1.0, 1.0);
        vertices.extend(square(2.0, 1.0));
        let mut c = cube();
        c.intersect_face_set(&vertices, &[4, 4]);
        assert_eq!(c.slice_count(), 2);
        c.clear_slices();
        c.intersect_triangle_strip_set(&vertices, &[4, 4]);
        assert_eq!(c.slice_count(), 4);
    }

    #[test]
    fn test_outline_has_twelve_edges() {
        assert_eq!(cube().outline().len(), 24);
    }
}
