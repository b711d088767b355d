//! CLUT Operations
//!
//! Construction, lookup and per-context activation of color tables.

use super::clut_data::{AlphaUse, Clut, ClutEntries, ClutTextureType, PaletteStrategy};
use super::{ClutError, MAX_CLUT_ENTRIES};
use crate::config::VolumeRenderConfig;
use crate::error::{EngineError, EngineResult, ErrorContext};
use crate::render::backend::{
    GlBackend, GlCapabilities, TexelFormat, TextureDimension, TextureUpload,
};
use crate::resource::{self, ContextId, ContextRegistry, HolderId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Build a CLUT from packed RGBA bytes
pub fn create_clut_from_bytes(rgba: &[u8]) -> Result<Clut, ClutError> {
    if rgba.len() % 4 != 0 {
        return Err(ClutError::ByteLength(rgba.len()));
    }
    let nrentries = rgba.len() / 4;
    check_entry_count(nrentries)?;

    let crc32 = crc32fast::hash(rgba);
    Ok(finish_clut(
        nrentries,
        4,
        ClutEntries::Bytes(rgba.to_vec()),
        crc32,
    ))
}

/// Build a CLUT from `nrcomponents` floats per entry (1 = alpha,
/// 2 = luminance + alpha, 4 = RGBA)
pub fn create_clut_from_floats(values: &[f32], nrcomponents: usize) -> Result<Clut, ClutError> {
    if !matches!(nrcomponents, 1 | 2 | 4) {
        return Err(ClutError::BadComponentCount(nrcomponents));
    }
    if values.len() % nrcomponents != 0 {
        return Err(ClutError::ComponentMismatch {
            len: values.len(),
            components: nrcomponents,
        });
    }
    let nrentries = values.len() / nrcomponents;
    check_entry_count(nrentries)?;

    let crc32 = crc32fast::hash(bytemuck::cast_slice::<f32, u8>(values));
    Ok(finish_clut(
        nrentries,
        nrcomponents,
        ClutEntries::Floats(values.to_vec()),
        crc32,
    ))
}

fn check_entry_count(nrentries: usize) -> Result<(), ClutError> {
    if nrentries == 0 {
        return Err(ClutError::Empty);
    }
    if nrentries > MAX_CLUT_ENTRIES {
        return Err(ClutError::TooManyEntries(nrentries));
    }
    Ok(())
}

fn finish_clut(nrentries: usize, nrcomponents: usize, entries: ClutEntries, crc32: u32) -> Clut {
    let mut clut = Clut {
        nrentries,
        nrcomponents,
        entries,
        alpha_policy: AlphaUse::AsIs,
        thresholds: [0, nrentries as u32 - 1],
        crc32,
        glcolors: vec![0; nrentries * 4],
        holder: resource::next_holder_id(),
        palette_lookup_textures: Mutex::new(FxHashMap::default()),
    };
    regenerate_gl_colors(&mut clut);
    clut
}

/// Table entry before thresholds and alpha policy
pub fn raw_rgba(clut: &Clut, idx: usize) -> [u8; 4] {
    match &clut.entries {
        ClutEntries::Bytes(bytes) => {
            let o = idx * 4;
            [bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]
        }
        ClutEntries::Floats(values) => {
            let c = &values[idx * clut.nrcomponents..(idx + 1) * clut.nrcomponents];
            let to_u8 = |v: f32| (v * 255.0) as u8;
            match clut.nrcomponents {
                1 => [to_u8(c[0]); 4],
                2 => {
                    let lum = to_u8(c[0]);
                    [lum, lum, lum, to_u8(c[1])]
                }
                _ => [to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(c[3])],
            }
        }
    }
}

/// Rebuild `glcolors` from the entries, thresholds and alpha policy.
/// Entries outside the thresholds are zeroed before the policy applies, so
/// `Opaque` still turns them into opaque black.
pub fn regenerate_gl_colors(clut: &mut Clut) {
    let [low, high] = clut.thresholds;
    for idx in 0..clut.nrentries {
        let mut rgba = if (idx as u32) < low || (idx as u32) > high {
            [0; 4]
        } else {
            raw_rgba(clut, idx)
        };
        match clut.alpha_policy {
            AlphaUse::AsIs => {}
            AlphaUse::Opaque => rgba[3] = 0xff,
            AlphaUse::Binary => rgba[3] = if rgba[3] == 0 { 0 } else { 0xff },
        }
        clut.glcolors[idx * 4..idx * 4 + 4].copy_from_slice(&rgba);
    }
}

/// Final RGBA for a palette index. Indices past the table are transparent.
pub fn lookup_rgba(clut: &Clut, idx: u8) -> [u8; 4] {
    let i = idx as usize;
    if i >= clut.nrentries {
        return [0; 4];
    }
    let mut rgba = [0u8; 4];
    rgba.copy_from_slice(&clut.glcolors[i * 4..i * 4 + 4]);
    rgba
}

/// True when every entry in the table is fully transparent
pub fn is_fully_transparent(clut: &Clut) -> bool {
    clut.glcolors.chunks_exact(4).all(|c| c[3] == 0)
}

/// Set the inclusive visible range. Both ends are clamped to the table.
pub fn set_thresholds(
    clut: &mut Clut,
    low: u32,
    high: u32,
    registry: &mut ContextRegistry,
) -> Result<(), ClutError> {
    if low > high {
        return Err(ClutError::ThresholdOrder { low, high });
    }
    let last = clut.nrentries as u32 - 1;
    let clamped = [low.min(last), high.min(last)];
    if clamped == clut.thresholds {
        return Ok(());
    }
    clut.thresholds = clamped;
    regenerate_gl_colors(clut);
    kill_all_lookup_textures(clut, registry);
    Ok(())
}

pub fn set_alpha_use(clut: &mut Clut, policy: AlphaUse, registry: &mut ContextRegistry) {
    if clut.alpha_policy == policy {
        return;
    }
    clut.alpha_policy = policy;
    regenerate_gl_colors(clut);
    kill_all_lookup_textures(clut, registry);
}

/// Queue every per-context 1D lookup texture for deletion
pub fn kill_all_lookup_textures(clut: &Clut, registry: &mut ContextRegistry) {
    let contexts: Vec<ContextId> =
        clut.palette_lookup_textures.lock().drain().map(|(c, _)| c).collect();
    for ctx in contexts {
        resource::release_holder(registry, ctx, clut.holder);
    }
}

/// Release all GPU state of this CLUT
pub fn release_clut_gl(clut: &Clut, registry: &mut ContextRegistry) {
    kill_all_lookup_textures(clut, registry);
}

/// Pick the palette strategy for a context with `caps`. Fragment program
/// lookup wins when both are available.
pub fn select_palette_strategy(
    caps: &GlCapabilities,
    config: &VolumeRenderConfig,
) -> PaletteStrategy {
    if caps.fragment_programs && !config.disable_paletted_fragment_program {
        PaletteStrategy::FragmentProgram
    } else if caps.paletted_textures && !config.disable_palette_extension {
        PaletteStrategy::PaletteExtension
    } else {
        PaletteStrategy::Unsupported
    }
}

/// Make this CLUT the active palette in `context_id`. With the fragment
/// program strategy the 1D lookup texture is uploaded once per context.
pub fn activate_clut(
    clut: &Arc<Clut>,
    context_id: ContextId,
    strategy: PaletteStrategy,
    texture_type: ClutTextureType,
    registry: &mut ContextRegistry,
    backend: &mut dyn GlBackend,
) -> EngineResult<()> {
    match strategy {
        PaletteStrategy::FragmentProgram => {
            let existing = clut.palette_lookup_textures.lock().get(&context_id).copied();
            let name = match existing {
                Some(name) => name,
                None => upload_lookup_texture(clut, context_id, registry, backend)?,
            };
            backend.bind_palette_lookup(name, texture_type);
            Ok(())
        }
        PaletteStrategy::PaletteExtension => {
            backend.set_color_table(texture_type, &clut.glcolors);
            Ok(())
        }
        PaletteStrategy::Unsupported => Err(EngineError::PaletteUnsupported {
            context: context_id,
        }),
    }
}

fn upload_lookup_texture(
    clut: &Arc<Clut>,
    context_id: ContextId,
    registry: &mut ContextRegistry,
    backend: &mut dyn GlBackend,
) -> EngineResult<u32> {
    let name = backend.create_texture(&TextureUpload {
        dimension: TextureDimension::D1,
        size: [clut.nrentries as u32, 1, 1],
        format: TexelFormat::Rgba8,
        data: &clut.glcolors,
    })?;
    clut.palette_lookup_textures.lock().insert(context_id, name);

    let weak = Arc::downgrade(clut);
    let data = resource::manager(registry, context_id);
    resource::set_resource(
        data,
        clut.holder,
        name,
        Some(Box::new(move |d: &mut resource::ResourceManagerData, holder: HolderId| {
            if let Some(clut) = weak.upgrade() {
                clut.palette_lookup_textures.lock().remove(&d.context_id);
            }
            if let Some(name) = resource::remove_resource(d, holder) {
                resource::kill_texture(d, name);
            }
        })),
    )
    .with_context(|| format!("registering lookup texture {} in context {}", name, context_id))?;

    log::debug!(
        "[Clut::activate] Uploaded {}-entry lookup texture {} in context {}",
        clut.nrentries,
        name,
        context_id
    );
    Ok(name)
}

/// Undo palette activation
pub fn deactivate_clut(strategy: PaletteStrategy, backend: &mut dyn GlBackend) {
    if strategy == PaletteStrategy::FragmentProgram {
        backend.unbind_palette_lookup();
    }
}

impl PartialEq for Clut {
    fn eq(&self, other: &Self) -> bool {
        self.crc32 == other.crc32
            && self.nrentries == other.nrentries
            && self.nrcomponents == other.nrcomponents
            && self.thresholds == other.thresholds
            && self.alpha_policy == other.alpha_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::software_backend::SoftwareBackend;

    fn grey_ramp() -> Vec<u8> {
        (0..=255u8).flat_map(|v| [v, v, v, v]).collect()
    }

    #[test]
    fn test_create_from_bytes() {
        let clut = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        assert_eq!(clut.nrentries, 256);
        assert_eq!(clut.thresholds, [0, 255]);
        assert_eq!(lookup_rgba(&clut, 128), [128, 128, 128, 128]);
    }

    #[test]
    fn test_too_many_entries_rejected() {
        let bytes = vec![0u8; 257 * 4];
        assert!(matches!(
            create_clut_from_bytes(&bytes),
            Err(ClutError::TooManyEntries(257))
        ));
    }

    #[test]
    fn test_float_component_mismatch_rejected() {
        let values = vec![0.5f32; 7];
        assert!(matches!(
            create_clut_from_floats(&values, 2),
            Err(ClutError::ComponentMismatch { len: 7, components: 2 })
        ));
        assert!(create_clut_from_floats(&values, 3).is_err());
    }

    #[test]
    fn test_float_conversion() {
        let lum_alpha = [1.0f32, 0.5, 0.25, 0.0];
        let clut = create_clut_from_floats(&lum_alpha, 2).expect("valid clut");
        assert_eq!(clut.nrentries, 2);
        assert_eq!(lookup_rgba(&clut, 0), [255, 255, 255, 127]);
        assert_eq!(lookup_rgba(&clut, 1), [63, 63, 63, 0]);
        assert_eq!(lookup_rgba(&clut, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn test_equality() {
        let a = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        let b = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        assert!(a == a);
        assert!(a == b && b == a);

        let mut other = grey_ramp();
        other[0] = 1;
        let c = create_clut_from_bytes(&other).expect("valid clut");
        assert!(a != c);
    }

    #[test]
    fn test_equality_includes_policy_and_thresholds() {
        let mut registry = ContextRegistry::default();
        let a = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        let mut b = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        set_alpha_use(&mut b, AlphaUse::Opaque, &mut registry);
        assert!(a != b);

        let mut c = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        set_thresholds(&mut c, 10, 200, &mut registry).expect("ordered thresholds");
        assert!(a != c);
    }

    #[test]
    fn test_thresholds_inclusive() {
        let mut registry = ContextRegistry::default();
        let mut clut = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        set_thresholds(&mut clut, 10, 200, &mut registry).expect("ordered thresholds");

        assert_eq!(lookup_rgba(&clut, 9), [0, 0, 0, 0]);
        assert_eq!(lookup_rgba(&clut, 10), [10, 10, 10, 10]);
        assert_eq!(lookup_rgba(&clut, 200), [200, 200, 200, 200]);
        assert_eq!(lookup_rgba(&clut, 201), [0, 0, 0, 0]);

        assert!(set_thresholds(&mut clut, 20, 10, &mut registry).is_err());
    }

    #[test]
    fn test_alpha_policies() {
        let mut registry = ContextRegistry::default();
        let mut clut = create_clut_from_bytes(&grey_ramp()).expect("valid clut");

        set_alpha_use(&mut clut, AlphaUse::Binary, &mut registry);
        assert_eq!(lookup_rgba(&clut, 0)[3], 0);
        assert_eq!(lookup_rgba(&clut, 1)[3], 255);

        set_alpha_use(&mut clut, AlphaUse::Opaque, &mut registry);
        assert_eq!(lookup_rgba(&clut, 0)[3], 255);

        set_thresholds(&mut clut, 5, 255, &mut registry).expect("ordered thresholds");
        assert_eq!(lookup_rgba(&clut, 4), [0, 0, 0, 255]);
        assert_eq!(lookup_rgba(&clut, 5), [5, 5, 5, 255]);
        assert!(!is_fully_transparent(&clut));

        // Binary keeps zeroed entries transparent
        set_alpha_use(&mut clut, AlphaUse::Binary, &mut registry);
        assert_eq!(lookup_rgba(&clut, 4), [0, 0, 0, 0]);
        assert_eq!(lookup_rgba(&clut, 5), [5, 5, 5, 255]);
    }

    #[test]
    fn test_lookup_is_pure() {
        let clut = create_clut_from_bytes(&grey_ramp()).expect("valid clut");
        let first: Vec<[u8; 4]> = (0..=255u8).map(|i| lookup_rgba(&clut, i)).collect();
        let second: Vec<[u8; 4]> = (0..=255u8).map(|i| lookup_rgba(&clut, i)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_strategy_selection() {
        let config = VolumeRenderConfig::default();
        let mut caps = GlCapabilities::default();
        assert_eq!(select_palette_strategy(&caps, &config), PaletteStrategy::Unsupported);

        caps.paletted_textures = true;
        assert_eq!(select_palette_strategy(&caps, &config), PaletteStrategy::PaletteExtension);

        caps.fragment_programs = true;
        assert_eq!(select_palette_strategy(&caps, &config), PaletteStrategy::FragmentProgram);

        let mut disabled = config.clone();
        disabled.disable_paletted_fragment_program = true;
        assert_eq!(
            select_palette_strategy(&caps, &disabled),
            PaletteStrategy::PaletteExtension
        );
    }

    #[test]
    fn test_lookup_texture_uploaded_once_per_context() {
        let mut registry = ContextRegistry::default();
        let mut backend = SoftwareBackend::new();
        let clut = Arc::new(create_clut_from_bytes(&grey_ramp()).expect("valid clut"));

        for _ in 0..3 {
            activate_clut(
                &clut,
                1,
                PaletteStrategy::FragmentProgram,
                ClutTextureType::Texture2D,
                &mut registry,
                &mut backend,
            )
            .expect("activation");
        }
        assert_eq!(backend.textures.len(), 1);
        assert_eq!(clut.palette_lookup_textures.lock().len(), 1);

        // Context teardown clears the per-context texture
        resource::context_destroyed(&mut registry, 1, &mut backend);
        assert!(clut.palette_lookup_textures.lock().is_empty());
        assert_eq!(backend.deleted_textures.len(), 1);
    }

    #[test]
    fn test_unsupported_strategy_is_error() {
        let mut registry = ContextRegistry::default();
        let mut backend = SoftwareBackend::new();
        let clut = Arc::new(create_clut_from_bytes(&grey_ramp()).expect("valid clut"));
        let result = activate_clut(
            &clut,
            2,
            PaletteStrategy::Unsupported,
            ClutTextureType::Texture3D,
            &mut registry,
            &mut backend,
        );
        assert!(matches!(result, Err(EngineError::PaletteUnsupported { context: 2 })));
    }
}
