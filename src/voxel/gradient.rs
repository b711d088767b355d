//! Central-difference gradients

use cgmath::{InnerSpace, Vector3};

fn sample(values: &[u8], dims: [u32; 3], flipped_y: bool, x: i64, y: i64, z: i64) -> f32 {
    let nudge = |v: i64, n: u32| -> i64 {
        if v < 0 {
            v + 1
        } else if v >= n as i64 {
            v - 1
        } else {
            v
        }
    };
    let x = nudge(x, dims[0]);
    let mut y = nudge(y, dims[1]);
    let z = nudge(z, dims[2]);
    if flipped_y {
        y = dims[1] as i64 - 1 - y;
    }
    let idx = (z * dims[1] as i64 + y) * dims[0] as i64 + x;
    values[idx as usize] as f32
}

/// Gradient at voxel (x, y, z) of an 8-bit volume, pointing from high to
/// low values. Neighbors past the border are nudged back inside, so flat
/// borders give a zero component. Normalized unless zero.
pub fn central_difference_gradient(
    values: &[u8],
    dims: [u32; 3],
    flipped_y: bool,
    x: u32,
    y: u32,
    z: u32,
) -> Vector3<f32> {
    let (x, y, z) = (x as i64, y as i64, z as i64);
    let s = |dx: i64, dy: i64, dz: i64| sample(values, dims, flipped_y, x + dx, y + dy, z + dz);
    let g = Vector3::new(
        s(-1, 0, 0) - s(1, 0, 0),
        s(0, -1, 0) - s(0, 1, 0),
        s(0, 0, -1) - s(0, 0, 1),
    );
    if g.magnitude2() > 0.0 {
        g.normalize()
    } else {
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_along_x() {
        // values = x
        let dims = [4, 2, 2];
        let values: Vec<u8> = (0..16).map(|i| (i % 4) as u8).collect();
        let g = central_difference_gradient(&values, dims, false, 1, 0, 0);
        assert_eq!(g, Vector3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_uniform_volume_has_zero_gradient() {
        let values = vec![7u8; 27];
        let g = central_difference_gradient(&values, [3, 3, 3], false, 0, 0, 0);
        assert_eq!(g, Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_border_neighbors_nudged_inside() {
        // At x = 0 the left neighbor becomes x = 0 itself
        let dims = [3, 1, 1];
        let values = vec![0u8, 10, 20];
        let g = central_difference_gradient(&values, dims, false, 0, 0, 0);
        assert_eq!(g, Vector3::new(-1.0, 0.0, 0.0));
        let g = central_difference_gradient(&values, dims, false, 2, 0, 0);
        assert_eq!(g, Vector3::new(-1.0, 0.0, 0.0));
    }
}
