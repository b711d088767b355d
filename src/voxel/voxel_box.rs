//! Integer voxel boxes. `min` is inclusive, `max` exclusive.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelBox2 {
    pub min: [u32; 2],
    pub max: [u32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelBox3 {
    pub min: [u32; 3],
    pub max: [u32; 3],
}

impl VoxelBox2 {
    pub fn new(min: [u32; 2], max: [u32; 2]) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> [u32; 2] {
        [
            self.max[0].saturating_sub(self.min[0]),
            self.max[1].saturating_sub(self.min[1]),
        ]
    }

    pub fn is_empty(&self) -> bool {
        let s = self.size();
        s[0] == 0 || s[1] == 0
    }
}

impl VoxelBox3 {
    pub fn new(min: [u32; 3], max: [u32; 3]) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> [u32; 3] {
        [
            self.max[0].saturating_sub(self.min[0]),
            self.max[1].saturating_sub(self.min[1]),
            self.max[2].saturating_sub(self.min[2]),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.size().iter().any(|s| *s == 0)
    }

    /// Intersection with `[0, dims)`
    pub fn clamped_to(&self, dims: [u32; 3]) -> VoxelBox3 {
        let mut out = *self;
        for i in 0..3 {
            out.min[i] = out.min[i].min(dims[i]);
            out.max[i] = out.max[i].min(dims[i]);
        }
        out
    }
}

impl fmt::Display for VoxelBox2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}..{:?})", self.min, self.max)
    }
}

impl fmt::Display for VoxelBox3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}..{:?})", self.min, self.max)
    }
}
