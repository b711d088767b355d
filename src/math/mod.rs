//! Geometry primitives for slicing and picking
//!
//! Pure functions over plain data. Nothing here knows about voxels or GL.

pub mod aabb;
pub mod plane;
pub mod polygon_clip;
pub mod ray;

pub use aabb::{
    aabb_center, aabb_centered, aabb_contains_point, aabb_corners, aabb_radius, aabb_size,
    aabb_transformed, create_aabb, AABB,
};
pub use plane::{plane_from_normal_point, plane_from_points, Plane};
pub use polygon_clip::{clip_polygon, clip_polygon_planes, polygon_has_area, ClipPolygon};
pub use ray::{volume_ray_pick, Ray, RayPick};
