//! Transfer function description and CLUT construction

use super::clut_data::{AlphaUse, Clut};
use super::clut_operations::{
    create_clut_from_bytes, create_clut_from_floats, regenerate_gl_colors,
};
use super::predefined_gradients::predefined_rgba;
use super::ClutError;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedMap {
    None,
    Grey,
    Temperature,
    Physics,
    Standard,
    Glow,
    BlueRed,
    Seismic,
}

impl PredefinedMap {
    pub const ALL: [PredefinedMap; 8] = [
        PredefinedMap::None,
        PredefinedMap::Grey,
        PredefinedMap::Temperature,
        PredefinedMap::Physics,
        PredefinedMap::Standard,
        PredefinedMap::Glow,
        PredefinedMap::BlueRed,
        PredefinedMap::Seismic,
    ];

    /// Accepts both GREY and GRAY
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Some(PredefinedMap::None),
            "GREY" | "GRAY" => Some(PredefinedMap::Grey),
            "TEMPERATURE" => Some(PredefinedMap::Temperature),
            "PHYSICS" => Some(PredefinedMap::Physics),
            "STANDARD" => Some(PredefinedMap::Standard),
            "GLOW" => Some(PredefinedMap::Glow),
            "BLUE_RED" => Some(PredefinedMap::BlueRed),
            "SEISMIC" => Some(PredefinedMap::Seismic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMapType {
    Alpha,
    LumAlpha,
    Rgba,
}

impl ColorMapType {
    pub fn components(self) -> usize {
        match self {
            ColorMapType::Alpha => 1,
            ColorMapType::LumAlpha => 2,
            ColorMapType::Rgba => 4,
        }
    }
}

/// Voxel value to color mapping. Every mutation bumps `node_id`, which the
/// CLUT and texture caches use as their key.
#[derive(Debug, Clone)]
pub struct TransferFunction {
    node_id: u64,
    predefined: PredefinedMap,
    color_map_type: ColorMapType,
    color_map: Vec<f32>,
    /// Voxel values are remapped as `(v << shift) + offset`
    shift: u32,
    offset: u32,
    thresholds: [u32; 2],
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self {
            node_id: next_node_id(),
            predefined: PredefinedMap::Grey,
            color_map_type: ColorMapType::Rgba,
            color_map: Vec::new(),
            shift: 0,
            offset: 0,
            thresholds: [0, u32::MAX],
        }
    }
}

impl TransferFunction {
    pub fn predefined(map: PredefinedMap) -> Self {
        Self {
            predefined: map,
            ..Self::default()
        }
    }

    pub fn from_color_map(color_map_type: ColorMapType, color_map: Vec<f32>) -> Self {
        Self {
            predefined: PredefinedMap::None,
            color_map_type,
            color_map,
            ..Self::default()
        }
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn predefined_map(&self) -> PredefinedMap {
        self.predefined
    }

    pub fn color_map_type(&self) -> ColorMapType {
        self.color_map_type
    }

    pub fn color_map(&self) -> &[f32] {
        &self.color_map
    }

    pub fn shift_offset(&self) -> (u32, u32) {
        (self.shift, self.offset)
    }

    pub fn thresholds(&self) -> [u32; 2] {
        self.thresholds
    }

    fn touch(&mut self) {
        self.node_id = next_node_id();
    }

    pub fn set_predefined(&mut self, map: PredefinedMap) {
        self.predefined = map;
        self.touch();
    }

    pub fn set_color_map(&mut self, color_map_type: ColorMapType, color_map: Vec<f32>) {
        self.predefined = PredefinedMap::None;
        self.color_map_type = color_map_type;
        self.color_map = color_map;
        self.touch();
    }

    pub fn set_shift_offset(&mut self, shift: u32, offset: u32) {
        self.shift = shift;
        self.offset = offset;
        self.touch();
    }

    /// Restrict the visible range to [low, high], inclusive
    pub fn re_map(&mut self, low: u32, high: u32) -> Result<(), ClutError> {
        if low > high {
            return Err(ClutError::ThresholdOrder { low, high });
        }
        self.thresholds = [low, high];
        self.touch();
        Ok(())
    }

    /// Byte remap applied to 8-bit voxel values
    pub fn remap_value(&self, v: u8) -> u8 {
        let shifted = if self.shift >= 8 { 0 } else { v << self.shift };
        shifted.wrapping_add((self.offset & 0xff) as u8)
    }
}

/// Build the CLUT for a transfer function with the given alpha policy.
/// The upper threshold is clamped to the table size.
pub fn make_clut(tf: &TransferFunction, alpha_use: AlphaUse) -> Result<Clut, ClutError> {
    let mut clut = match predefined_rgba(tf.predefined)? {
        Some(rgba) => create_clut_from_bytes(rgba)?,
        None => create_clut_from_floats(&tf.color_map, tf.color_map_type.components())?,
    };

    let last = clut.nrentries as u32 - 1;
    clut.thresholds = [tf.thresholds[0].min(last), tf.thresholds[1].min(last)];
    clut.alpha_policy = alpha_use;
    regenerate_gl_colors(&mut clut);
    Ok(clut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clut::clut_operations::lookup_rgba;

    #[test]
    fn test_mutation_bumps_node_id() {
        let mut tf = TransferFunction::default();
        let id = tf.node_id();
        tf.set_shift_offset(2, 0);
        assert_ne!(tf.node_id(), id);
        assert_eq!(tf.shift_offset(), (2, 0));

        let id = tf.node_id();
        tf.re_map(10, 20).expect("ordered");
        assert_ne!(tf.node_id(), id);
        assert_eq!(tf.thresholds(), [10, 20]);

        let id = tf.node_id();
        tf.set_predefined(PredefinedMap::Glow);
        assert_ne!(tf.node_id(), id);

        let id = tf.node_id();
        tf.set_color_map(ColorMapType::Alpha, vec![0.0, 1.0]);
        assert_ne!(tf.node_id(), id);
        assert_eq!(tf.predefined_map(), PredefinedMap::None);
        assert_eq!(tf.color_map(), &[0.0, 1.0]);
    }

    #[test]
    fn test_failed_re_map_keeps_node_id() {
        let mut tf = TransferFunction::default();
        let id = tf.node_id();
        assert!(tf.re_map(9, 3).is_err());
        assert_eq!(tf.node_id(), id);
        assert_eq!(tf.thresholds(), [0, u32::MAX]);
    }

    #[test]
    fn test_re_map_order() {
        let mut tf = TransferFunction::default();
        assert!(tf.re_map(5, 4).is_err());
        assert!(tf.re_map(4, 4).is_ok());
    }

    #[test]
    fn test_map_names() {
        assert_eq!(PredefinedMap::from_name("gray"), Some(PredefinedMap::Grey));
        assert_eq!(PredefinedMap::from_name("BLUE_RED"), Some(PredefinedMap::BlueRed));
        assert_eq!(PredefinedMap::from_name("rainbow"), None);
    }

    #[test]
    fn test_remap_wraps() {
        let mut tf = TransferFunction::default();
        tf.set_shift_offset(2, 10);
        assert_eq!(tf.remap_value(63), 252u8.wrapping_add(10));
        assert_eq!(tf.remap_value(1), 14);
    }

    #[test]
    fn test_make_clut_from_color_map() {
        let tf = TransferFunction::from_color_map(ColorMapType::Alpha, vec![0.0, 0.5, 1.0]);
        let clut = make_clut(&tf, AlphaUse::AsIs).expect("valid map");
        assert_eq!(clut.nrentries, 3);
        assert_eq!(clut.thresholds, [0, 2]);
        assert_eq!(lookup_rgba(&clut, 2), [255, 255, 255, 255]);
    }

    #[test]
    fn test_make_clut_predefined_with_thresholds() {
        let mut tf = TransferFunction::predefined(PredefinedMap::Grey);
        tf.re_map(100, 1000).expect("ordered");
        let clut = make_clut(&tf, AlphaUse::Binary).expect("grey converts");
        assert_eq!(clut.thresholds, [100, 255]);
        assert_eq!(lookup_rgba(&clut, 99), [0, 0, 0, 0]);
        assert_eq!(lookup_rgba(&clut, 100)[3], 255);
    }

    #[test]
    fn test_bad_color_map_length() {
        let tf = TransferFunction::from_color_map(ColorMapType::Rgba, vec![1.0; 6]);
        assert!(make_clut(&tf, AlphaUse::AsIs).is_err());
    }
}
