//! Render orchestration
//!
//! Every entry point takes the process-wide render lock, flushes deferred
//! texture deletions for the current context, resolves the CLUT and the
//! palette decision, then hands the pass to the 2D page handler or the 3D
//! sub-cube grid.

use super::composition::{resolve_num_slices, AbortCallback, CompositionMode, NumSlicesControl};
use super::render_context::{RenderContext, RenderSession};
use super::render_lock::acquire_render_lock;
use crate::clut::{AlphaUse, Clut, TransferFunction};
use crate::config::VolumeRenderConfig;
use crate::error::{EngineError, EngineResult};
use crate::math::{volume_ray_pick, Plane, Ray};
use crate::paging::{clamp_sub_cube_size, PageHandler, PassParams, PassStats, SetType, TexCube};
use crate::resource;
use crate::voxel::VolumeDescriptor;
use cgmath::{ElementWise, EuclideanSpace, Point3};
use std::sync::Arc;

/// Which texture path renders the volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    /// 3D sub-cubes when the context has 3D textures, 2D pages otherwise
    Auto,
    Pages2D,
    Cubes3D,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub composition: CompositionMode,
    pub num_slices: NumSlicesControl,
    /// Scales `NumSlicesControl::Automatic`, in [0, 1]
    pub complexity: f32,
    pub alpha_use: AlphaUse,
    pub path: RenderPath,
    /// Build gradient textures for lit 3D rendering
    pub lighting: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            composition: CompositionMode::AlphaBlending,
            num_slices: NumSlicesControl::All,
            complexity: 0.5,
            alpha_use: AlphaUse::AsIs,
            path: RenderPath::Auto,
            lighting: false,
        }
    }
}

/// Ray entry and exit in continuous voxel coordinates, `[0, dims]` per axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelPick {
    pub entry: Point3<f32>,
    pub exit: Point3<f32>,
}

/// Intersect an object-space ray with the volume box. A miss is `None`.
pub fn pick_volume(
    config: &VolumeRenderConfig,
    volume: &VolumeDescriptor<'_>,
    ray: &Ray,
) -> Option<VoxelPick> {
    let Some(hit) = volume_ray_pick(ray, &volume.bounds) else {
        if config.debug_raypicks {
            log::debug!("[VolumeRender::pick] Ray {:?} missed {:?}", ray, volume.id);
        }
        return None;
    };
    let voxel_size = volume.voxel_size();
    let to_voxel = |p: Point3<f32>| {
        Point3::from_vec((p - volume.bounds.min).div_element_wise(voxel_size))
    };
    let pick = VoxelPick {
        entry: to_voxel(hit.entry),
        exit: to_voxel(hit.exit),
    };
    if config.debug_raypicks {
        log::debug!(
            "[VolumeRender::pick] {:?} enters at {:?}, exits at {:?}",
            volume.id,
            pick.entry,
            pick.exit
        );
    }
    Some(pick)
}

pub struct VolumeRender {
    pages: PageHandler,
    cubes: Option<TexCube>,
    /// CLUT of the last pass, kept alive in the session cache
    clut: Option<Arc<Clut>>,
    pub settings: RenderSettings,
}

impl VolumeRender {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            pages: PageHandler::new([crate::config::DEFAULT_PAGE_SIZE; 3], 0),
            cubes: None,
            clut: None,
            settings,
        }
    }

    pub fn pages(&self) -> &PageHandler {
        &self.pages
    }

    pub fn cubes(&self) -> Option<&TexCube> {
        self.cubes.as_ref()
    }

    /// Render the whole volume as slices perpendicular to the view,
    /// back to front. `abort` is asked `(total, index)` before each slice.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        volume: &VolumeDescriptor<'_>,
        transfer_function: &TransferFunction,
        abort: Option<&mut AbortCallback<'_>>,
    ) -> EngineResult<PassStats> {
        let _guard = acquire_render_lock();
        let (clut, paletted) = self.begin(ctx, volume, transfer_function)?;
        let use_cubes = self.use_cubes(ctx, "render");
        let axis = self
            .pages
            .slicing_axis(ctx.view.to_viewer(), ctx.config().lock_axis);
        let num_slices = resolve_num_slices(
            self.settings.num_slices,
            volume.dimensions[axis],
            self.settings.complexity,
        );
        let params = self.params(volume, transfer_function, &clut, num_slices, paletted);
        if ctx.config().debug {
            log::debug!(
                "[VolumeRender::render] {:?}: {} slices, {} path, paletted {}",
                volume.id,
                num_slices,
                if use_cubes { "3D" } else { "2D" },
                paletted
            );
        }

        if use_cubes {
            let cubes = self.cubes_for(ctx, volume)?;
            cubes.render(ctx, &params, abort)
        } else {
            self.pages.render(ctx, &params, abort)
        }
    }

    /// One axis-aligned slice, always through the 2D pages
    pub fn render_ortho_slice(
        &mut self,
        ctx: &mut RenderContext<'_>,
        volume: &VolumeDescriptor<'_>,
        transfer_function: &TransferFunction,
        axis: usize,
        index: u32,
    ) -> EngineResult<PassStats> {
        let _guard = acquire_render_lock();
        let (clut, paletted) = self.begin(ctx, volume, transfer_function)?;
        let params = self.params(volume, transfer_function, &clut, 1, paletted);
        self.pages.render_ortho_slice(ctx, &params, axis, index)
    }

    /// One slice along an object-space plane. Needs 3D textures.
    pub fn render_oblique_slice(
        &mut self,
        ctx: &mut RenderContext<'_>,
        volume: &VolumeDescriptor<'_>,
        transfer_function: &TransferFunction,
        plane: &Plane,
    ) -> EngineResult<PassStats> {
        let _guard = acquire_render_lock();
        let (clut, paletted) = self.begin(ctx, volume, transfer_function)?;
        self.require_cubes(ctx, "render_oblique_slice")?;
        let params = self.params(volume, transfer_function, &clut, 1, paletted);
        let cubes = self.cubes_for(ctx, volume)?;
        cubes.render_oblique_slice(ctx, &params, plane)
    }

    /// Indexed face set or triangle strip set textured with the volume.
    /// Needs 3D textures.
    pub fn render_indexed_set(
        &mut self,
        ctx: &mut RenderContext<'_>,
        volume: &VolumeDescriptor<'_>,
        transfer_function: &TransferFunction,
        vertices: &[Point3<f32>],
        indices: &[i32],
        set_type: SetType,
    ) -> EngineResult<PassStats> {
        let _guard = acquire_render_lock();
        let (clut, paletted) = self.begin(ctx, volume, transfer_function)?;
        self.require_cubes(ctx, "render_indexed_set")?;
        let params = self.params(volume, transfer_function, &clut, 1, paletted);
        let cubes = self.cubes_for(ctx, volume)?;
        cubes.render_indexed_set(ctx, &params, vertices, indices, set_type)
    }

    pub fn render_nonindexed_set(
        &mut self,
        ctx: &mut RenderContext<'_>,
        volume: &VolumeDescriptor<'_>,
        transfer_function: &TransferFunction,
        vertices: &[Point3<f32>],
        counts: &[u32],
        set_type: SetType,
    ) -> EngineResult<PassStats> {
        let _guard = acquire_render_lock();
        let (clut, paletted) = self.begin(ctx, volume, transfer_function)?;
        self.require_cubes(ctx, "render_nonindexed_set")?;
        let params = self.params(volume, transfer_function, &clut, 1, paletted);
        let cubes = self.cubes_for(ctx, volume)?;
        cubes.render_nonindexed_set(ctx, &params, vertices, counts, set_type)
    }

    /// Drop all pages and sub-cubes. Textures go back to the cache and
    /// their GL names are deleted the next time each context is current.
    pub fn release(&mut self, session: &mut RenderSession) {
        let _guard = acquire_render_lock();
        self.pages.release_all(session);
        if let Some(mut cubes) = self.cubes.take() {
            cubes.release_all(session);
        }
        self.clut = None;
        session.cluts.purge_unused(&mut session.registry);
    }

    fn begin(
        &mut self,
        ctx: &mut RenderContext<'_>,
        volume: &VolumeDescriptor<'_>,
        transfer_function: &TransferFunction,
    ) -> EngineResult<(Arc<Clut>, bool)> {
        if resource::is_context_destroyed(&ctx.session.registry, ctx.context_id) {
            log::warn!(
                "[VolumeRender] Context {} was destroyed earlier, textures will be uploaded again",
                ctx.context_id
            );
        }
        ctx.session.context_made_current(ctx.context_id, ctx.backend);
        let clut = ctx
            .session
            .cluts
            .get(transfer_function, self.settings.alpha_use)?;

        // Tables and transparent cuts of superseded transfer functions
        self.clut = Some(clut.clone());
        let session = &mut *ctx.session;
        let cluts = session.cluts.purge_unused(&mut session.registry);
        let cuts = session.textures.purge_invisible(
            volume,
            transfer_function.node_id(),
            clut.holder,
        );
        if cluts + cuts > 0 {
            log::debug!(
                "[VolumeRender] Dropped {} stale CLUTs and {} stale transparent cuts",
                cluts,
                cuts
            );
        }

        let paletted = ctx.use_paletted_textures();
        Ok((clut, paletted))
    }

    fn params<'p, 'v>(
        &self,
        volume: &'p VolumeDescriptor<'v>,
        transfer_function: &'p TransferFunction,
        clut: &'p Arc<Clut>,
        num_slices: u32,
        paletted: bool,
    ) -> PassParams<'p, 'v> {
        PassParams {
            volume,
            transfer_function,
            clut,
            composition: self.settings.composition,
            num_slices,
            paletted,
            lighting: self.settings.lighting,
        }
    }

    fn use_cubes(&self, ctx: &RenderContext<'_>, operation: &str) -> bool {
        let available = ctx.use_3d_textures();
        match self.settings.path {
            RenderPath::Pages2D => false,
            RenderPath::Auto => available,
            RenderPath::Cubes3D => {
                if !available {
                    log::warn!(
                        "[VolumeRender::{}] 3D textures unavailable, falling back to 2D pages",
                        operation
                    );
                }
                available
            }
        }
    }

    fn require_cubes(&self, ctx: &RenderContext<'_>, operation: &str) -> EngineResult<()> {
        if ctx.use_3d_textures() {
            return Ok(());
        }
        Err(EngineError::GpuOperationFailed {
            operation: operation.to_string(),
            error: "context has no 3D textures".to_string(),
        })
    }

    /// Sub-cube grid for `volume`, rebuilt when the volume or the
    /// sub-cube size changed
    fn cubes_for(
        &mut self,
        ctx: &mut RenderContext<'_>,
        volume: &VolumeDescriptor<'_>,
    ) -> EngineResult<&mut TexCube> {
        let caps = ctx.capabilities();
        let config = ctx.config();
        let size = clamp_sub_cube_size(
            config.page_size,
            caps.max_3d_texture_size,
            config.force_subcube_size,
        );
        let fits = self.cubes.as_ref().is_some_and(|c| c.fits(volume, size));
        if !fits {
            if let Some(mut old) = self.cubes.take() {
                old.release_all(ctx.session);
            }
        }
        let cubes = match self.cubes.take() {
            Some(cubes) => cubes,
            None => TexCube::new(volume, size)?,
        };
        Ok(self.cubes.insert(cubes))
    }
}
