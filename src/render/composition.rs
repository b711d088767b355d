//! Slice composition modes and progressive rendering control

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionMode {
    /// Over operator; slices must arrive back to front
    AlphaBlending,
    MaxIntensity,
    SumIntensity,
}

impl CompositionMode {
    /// Whether the result depends on slice order
    pub fn is_order_dependent(self) -> bool {
        self == CompositionMode::AlphaBlending
    }
}

/// Answer from the abort callback, asked once per slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortCode {
    Continue,
    /// Stop rendering this volume
    Abort,
    /// Skip this slice only
    Skip,
}

/// Called as `(total_slices, slice_index)` before each slice is drawn
pub type AbortCallback<'a> = dyn FnMut(u32, u32) -> AbortCode + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumSlicesControl {
    /// One slice per voxel along the slicing axis
    All,
    Manual(u32),
    /// `complexity * 2 * n` slices
    Automatic(u32),
}

/// Resolve the slice count for `voxels` voxels along the axis
pub fn resolve_num_slices(control: NumSlicesControl, voxels: u32, complexity: f32) -> u32 {
    let n = match control {
        NumSlicesControl::All => voxels,
        NumSlicesControl::Manual(n) => n,
        NumSlicesControl::Automatic(n) => (complexity.clamp(0.0, 1.0) * 2.0 * n as f32) as u32,
    };
    n.max(1)
}

/// Blend `src` onto `dst`, both RGBA in [0, 1]
pub fn blend(mode: CompositionMode, dst: [f32; 4], src: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    match mode {
        CompositionMode::AlphaBlending => {
            let a = src[3];
            for i in 0..3 {
                out[i] = src[i] * a + dst[i] * (1.0 - a);
            }
            out[3] = a + dst[3] * (1.0 - a);
        }
        CompositionMode::MaxIntensity => {
            for i in 0..4 {
                out[i] = dst[i].max(src[i]);
            }
        }
        CompositionMode::SumIntensity => {
            for i in 0..4 {
                out[i] = (dst[i] + src[i]).min(1.0);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_blending_order_matters() {
        let red = [1.0, 0.0, 0.0, 0.5];
        let blue = [0.0, 0.0, 1.0, 0.5];
        let bg = [0.0; 4];
        let over = |dst, src| blend(CompositionMode::AlphaBlending, dst, src);
        let rb = over(over(bg, red), blue);
        let br = over(over(bg, blue), red);
        assert_ne!(rb, br);
        assert!(rb[2] > rb[0]);
    }

    #[test]
    fn test_max_and_sum_are_order_independent() {
        let a = [0.2, 0.6, 0.1, 0.5];
        let b = [0.5, 0.3, 0.9, 0.7];
        for mode in [CompositionMode::MaxIntensity, CompositionMode::SumIntensity] {
            let ab = blend(mode, blend(mode, [0.0; 4], a), b);
            let ba = blend(mode, blend(mode, [0.0; 4], b), a);
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn test_resolve_num_slices() {
        assert_eq!(resolve_num_slices(NumSlicesControl::All, 64, 0.5), 64);
        assert_eq!(resolve_num_slices(NumSlicesControl::Manual(10), 64, 0.5), 10);
        assert_eq!(resolve_num_slices(NumSlicesControl::Automatic(100), 64, 0.5), 100);
        assert_eq!(resolve_num_slices(NumSlicesControl::Manual(0), 64, 0.5), 1);
    }
}
