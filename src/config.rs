//! Volume rendering configuration
//!
//! Loaded from TOML, then overridden by the `CVR_*` environment switches
//! that the renderer has always honored for debugging.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default sub-page / sub-cube edge length in voxels
pub const DEFAULT_PAGE_SIZE: u32 = 64;

/// Default budget for resident 2D page textures (64 MiB)
pub const DEFAULT_TEXTURE_MEMORY_BUDGET: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeRenderConfig {
    /// Sub-page and sub-cube size in voxels, per axis
    pub page_size: [u32; 3],
    /// Upper bound on bytes of 2D page textures kept resident
    pub texture_memory_budget: u64,
    /// Always slice along this axis (0 = X, 1 = Y, 2 = Z)
    pub lock_axis: Option<u8>,
    /// Override for the 3D sub-cube edge length
    pub force_subcube_size: Option<u32>,
    /// Application preference for paletted textures
    pub use_paletted_textures: bool,
    pub force_paletted_textures: bool,
    pub force_rgba_textures: bool,
    pub disable_paletted_fragment_program: bool,
    pub disable_palette_extension: bool,
    /// Never use 3D textures, even when the context has them
    pub force_2d_textures: bool,
    pub debug: bool,
    pub debug_raypicks: bool,
    /// 0: normal, 1: slices plus sub-cube outlines, 2: wireframe slices only
    pub debug_slice_render_style: u8,
    pub subcube_frames: bool,
    pub use_flipped_y_axis: bool,
    pub disable_texture_modulation: bool,
}

impl Default for VolumeRenderConfig {
    fn default() -> Self {
        Self {
            page_size: [DEFAULT_PAGE_SIZE; 3],
            texture_memory_budget: DEFAULT_TEXTURE_MEMORY_BUDGET,
            lock_axis: None,
            force_subcube_size: None,
            use_paletted_textures: true,
            force_paletted_textures: false,
            force_rgba_textures: false,
            disable_paletted_fragment_program: false,
            disable_palette_extension: false,
            force_2d_textures: false,
            debug: false,
            debug_raypicks: false,
            debug_slice_render_style: 0,
            subcube_frames: false,
            use_flipped_y_axis: false,
            disable_texture_modulation: false,
        }
    }
}

impl VolumeRenderConfig {
    /// Defaults with the process environment applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_from(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file, then apply the process environment on top
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: VolumeRenderConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        config.apply_env_from(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `CVR_*` overrides through an arbitrary variable lookup.
    /// Numeric flags follow the `atoi(value) > 0` convention.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| lookup(name).map(|v| parse_int(&v) > 0);
        let number = |name: &str| lookup(name).map(|v| parse_int(&v));

        if let Some(axis) = number("CVR_LOCK_AXIS") {
            self.lock_axis = Some(axis.clamp(0, u8::MAX as i64) as u8);
        }
        if let Some(size) = number("CVR_FORCE_SUBCUBE_SIZE") {
            self.force_subcube_size = Some(size.max(0) as u32);
        }
        if let Some(v) = flag("CVR_FORCE_PALETTED_TEXTURES") {
            self.force_paletted_textures = v;
        }
        if let Some(v) = flag("CVR_FORCE_RGBA_TEXTURES") {
            self.force_rgba_textures = v;
        }
        if let Some(v) = flag("CVR_DISABLE_PALETTED_FRAGPROG") {
            self.disable_paletted_fragment_program = v;
        }
        if let Some(v) = flag("CVR_DISABLE_PALETTED_PALEXT") {
            self.disable_palette_extension = v;
        }
        if let Some(v) = flag("CVR_FORCE_2D_TEXTURES") {
            self.force_2d_textures = v;
        }
        if let Some(v) = flag("CVR_DEBUG") {
            self.debug = v;
        }
        if let Some(v) = flag("CVR_DEBUG_RAYPICKS") {
            self.debug_raypicks = v;
        }
        if let Some(style) = number("CVR_DEBUG_SLICE_RENDERSTYLE") {
            self.debug_slice_render_style = style.clamp(0, u8::MAX as i64) as u8;
        }
        if let Some(v) = flag("CVR_SUBCUBE_FRAMES") {
            self.subcube_frames = v;
        }
        if let Some(v) = flag("CVR_USE_FLIPPED_Y_AXIS") {
            self.use_flipped_y_axis = v;
        }
        if let Some(v) = flag("CVR_DISABLE_TEXTURE_MODULATION") {
            self.disable_texture_modulation = v;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (axis, size) in self.page_size.iter().enumerate() {
            if *size == 0 || !size.is_power_of_two() {
                bail!("page_size[{}] must be a power of two, got {}", axis, size);
            }
        }
        if let Some(axis) = self.lock_axis {
            if axis > 2 {
                bail!("lock_axis must be 0, 1 or 2, got {}", axis);
            }
        }
        if let Some(size) = self.force_subcube_size {
            if size == 0 || !size.is_power_of_two() {
                bail!("force_subcube_size must be a power of two, got {}", size);
            }
        }
        if self.force_paletted_textures && self.force_rgba_textures {
            bail!("force_paletted_textures and force_rgba_textures are mutually exclusive");
        }
        if self.debug_slice_render_style > 2 {
            bail!(
                "debug_slice_render_style must be 0, 1 or 2, got {}",
                self.debug_slice_render_style
            );
        }

        log::info!(
            "[VolumeRenderConfig] page_size={:?} budget={}B lock_axis={:?}",
            self.page_size,
            self.texture_memory_budget,
            self.lock_axis
        );
        Ok(())
    }
}

/// Leading-integer parse, like C's atoi: garbage yields 0
fn parse_int(value: &str) -> i64 {
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    trimmed[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = VolumeRenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.page_size, [64, 64, 64]);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CVR_LOCK_AXIS", "1"),
            ("CVR_FORCE_RGBA_TEXTURES", "1"),
            ("CVR_DEBUG", "0"),
            ("CVR_DEBUG_SLICE_RENDERSTYLE", "2"),
            ("CVR_FORCE_SUBCUBE_SIZE", "32"),
        ]
        .into_iter()
        .collect();

        let mut config = VolumeRenderConfig::default();
        config.debug = true;
        config.apply_env_from(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.lock_axis, Some(1));
        assert!(config.force_rgba_textures);
        assert!(!config.debug);
        assert_eq!(config.debug_slice_render_style, 2);
        assert_eq!(config.force_subcube_size, Some(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_conflicting_texture_forcing_rejected() {
        let mut config = VolumeRenderConfig::default();
        config.force_paletted_textures = true;
        config.force_rgba_textures = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_power_of_two_page_size_rejected() {
        let mut config = VolumeRenderConfig::default();
        config.page_size = [64, 48, 64];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "page_size = [32, 32, 16]").expect("write");
        writeln!(file, "texture_memory_budget = 1048576").expect("write");
        writeln!(file, "subcube_frames = true").expect("write");

        let config = VolumeRenderConfig::load(file.path()).expect("config should load");
        assert_eq!(config.page_size, [32, 32, 16]);
        assert_eq!(config.texture_memory_budget, 1_048_576);
        assert!(config.subcube_frames);
        assert!(config.use_paletted_textures);
    }

    #[test]
    fn test_parse_int_matches_atoi() {
        assert_eq!(parse_int("12abc"), 12);
        assert_eq!(parse_int("abc"), 0);
        assert_eq!(parse_int(" -3"), -3);
        assert_eq!(parse_int(""), 0);
    }
}
