//! 3D texture paging
//!
//! The volume is covered by a grid of sub-cubes in voxel space, origin at
//! `-dimensions / 2`. Sub-cubes are built on first use and dropped when
//! the volume data changes. View-aligned rendering is slice-major: every
//! slice is clipped against every sub-cube, farthest sub-cube first.

use super::sub_cube::SubCube;
use super::voxel_space::VoxelSpace;
use super::{PassParams, PassStats, SliceStyle};
use crate::clut::{deactivate_clut, Clut, PaletteStrategy};
use crate::error::{EngineError, EngineResult};
use crate::math::{aabb_center, aabb_radius, Plane};
use crate::render::backend::DrawStyle;
use crate::render::composition::{AbortCallback, AbortCode};
use crate::render::render_context::{RenderContext, RenderSession};
use crate::resource::HolderId;
use crate::texture::{
    activate_texture, baked_clut, is_paletted, CutParameters, TextureKind, TextureObject,
    TextureRequest,
};
use crate::voxel::{VolumeDescriptor, VolumeId, VoxelBox3};
use cgmath::{InnerSpace, Point3, Vector3};
use std::cmp::Ordering;
use std::sync::Arc;

/// Polygon set flavors accepted by the set renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetType {
    FaceSet,
    TriangleStripSet,
}

/// A built grid cell. Fully transparent cells carry no sub-cube.
#[derive(Debug)]
pub struct CubeItem {
    pub cube: Option<SubCube>,
    pub texture: Option<Arc<TextureObject>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CubeKey {
    transfer_function: u64,
    /// Only set for kinds with the colors baked in
    clut: Option<HolderId>,
    kind: TextureKind,
}

/// Sub-cube edge length for a context. A forced size wins; otherwise the
/// requested size is capped at the largest 3D texture the context takes.
pub fn clamp_sub_cube_size(
    size: [u32; 3],
    max_3d_texture_size: u32,
    forced: Option<u32>,
) -> [u32; 3] {
    let max = max_3d_texture_size.max(1);
    match forced {
        Some(f) if f > 0 => {
            let f = f.min(max);
            [f; 3]
        }
        _ => size.map(|s| s.clamp(1, max)),
    }
}

pub struct TexCube {
    volume: VolumeId,
    node_id: u64,
    dimensions: [u32; 3],
    sub_cube_size: [u32; 3],
    ncols: u32,
    nrows: u32,
    ndepths: u32,
    origo: Point3<f32>,
    space: VoxelSpace,
    key: Option<CubeKey>,
    items: Vec<Option<CubeItem>>,
}

impl TexCube {
    pub fn new(volume: &VolumeDescriptor<'_>, sub_cube_size: [u32; 3]) -> EngineResult<Self> {
        if sub_cube_size.iter().any(|s| *s == 0) {
            return Err(EngineError::InvalidArgument {
                name: "sub_cube_size".to_string(),
                reason: format!("{:?} has a zero edge", sub_cube_size),
            });
        }
        let dims = volume.dimensions;
        let ncols = dims[0].div_ceil(sub_cube_size[0]);
        let nrows = dims[1].div_ceil(sub_cube_size[1]);
        let ndepths = dims[2].div_ceil(sub_cube_size[2]);
        let count = (ncols * nrows * ndepths) as usize;
        log::debug!(
            "[TexCube::new] {:?} voxels in {}x{}x{} sub-cubes of {:?}",
            dims,
            ncols,
            nrows,
            ndepths,
            sub_cube_size
        );
        Ok(Self {
            volume: volume.id,
            node_id: volume.node_id,
            dimensions: dims,
            sub_cube_size,
            ncols,
            nrows,
            ndepths,
            origo: Point3::new(
                -(dims[0] as f32) / 2.0,
                -(dims[1] as f32) / 2.0,
                -(dims[2] as f32) / 2.0,
            ),
            space: VoxelSpace::of(volume)?,
            key: None,
            items: (0..count).map(|_| None).collect(),
        })
    }

    pub fn sub_cube_size(&self) -> [u32; 3] {
        self.sub_cube_size
    }

    pub fn grid(&self) -> [u32; 3] {
        [self.ncols, self.nrows, self.ndepths]
    }

    /// Whether this grid was laid out for `volume` with `sub_cube_size`
    pub fn fits(&self, volume: &VolumeDescriptor<'_>, sub_cube_size: [u32; 3]) -> bool {
        self.volume == volume.id
            && self.dimensions == volume.dimensions
            && self.sub_cube_size == sub_cube_size
    }

    pub fn sub_cube_index(&self, col: u32, row: u32, depth: u32) -> usize {
        (col + row * self.ncols + depth * self.ncols * self.nrows) as usize
    }

    /// Voxel box of a grid cell, cropped to the volume
    pub fn sub_cube_box(&self, col: u32, row: u32, depth: u32) -> VoxelBox3 {
        let s = self.sub_cube_size;
        let min = [col * s[0], row * s[1], depth * s[2]];
        VoxelBox3::new(min, [min[0] + s[0], min[1] + s[1], min[2] + s[2]])
            .clamped_to(self.dimensions)
    }

    /// Cells built so far, visible or not
    pub fn built_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_some()).count()
    }

    /// Switch the grid to `clut`. Paletted sub-cubes are kept, their
    /// palette is bound at draw time. RGBA sub-cubes have the old colors
    /// baked in and are dropped, transparent ones included.
    pub fn set_palette(&mut self, clut: &Arc<Clut>, session: &mut RenderSession) {
        for slot in self.items.iter_mut() {
            let keep =
                matches!(slot, Some(CubeItem { texture: Some(t), .. }) if is_paletted(t.kind));
            if keep {
                continue;
            }
            if let Some(item) = slot.take() {
                release_item(item, session);
            }
        }
        if let Some(key) = self.key.as_mut() {
            key.clut = baked_clut(key.kind, clut);
        }
    }

    /// Drop every built cell and hand the textures back to the cache
    pub fn release_all(&mut self, session: &mut RenderSession) {
        for slot in self.items.iter_mut() {
            if let Some(item) = slot.take() {
                release_item(item, session);
            }
        }
        self.key = None;
    }

    /// Bring the grid in line with the volume and transfer function of
    /// this pass
    fn prepare(
        &mut self,
        params: &PassParams<'_, '_>,
        session: &mut RenderSession,
    ) -> EngineResult<()> {
        if params.volume.node_id != self.node_id {
            log::debug!(
                "[TexCube] Volume {:?} data changed, dropping sub-cubes",
                self.volume
            );
            self.release_all(session);
            self.node_id = params.volume.node_id;
        }

        let kind = cube_kind(params);
        let key = CubeKey {
            transfer_function: params.transfer_function.node_id(),
            clut: baked_clut(kind, params.clut),
            kind,
        };
        match self.key {
            Some(old) if old == key => {}
            Some(old) if old.transfer_function == key.transfer_function && old.kind == key.kind => {
                self.set_palette(params.clut, session);
            }
            Some(_) => self.release_all(session),
            None => {}
        }
        self.key = Some(key);
        Ok(())
    }

    fn build_item(
        &mut self,
        index: usize,
        cell: [u32; 3],
        params: &PassParams<'_, '_>,
        session: &mut RenderSession,
        flipped_y: bool,
    ) -> EngineResult<()> {
        let cut = self.sub_cube_box(cell[0], cell[1], cell[2]);
        let request = TextureRequest {
            volume: params.volume,
            transfer_function: params.transfer_function,
            clut: params.clut,
            cut: CutParameters::Cube { cube: cut },
            kind: cube_kind(params),
            flipped_y,
        };
        let texture = session.textures.create(&request)?;
        let cube = texture.as_ref().map(|t| {
            let origin = self.origo
                + Vector3::new(cut.min[0] as f32, cut.min[1] as f32, cut.min[2] as f32);
            SubCube::new(origin, cut.size(), t.dimensions, self.space)
        });
        if let Some(slot) = self.items.get_mut(index) {
            *slot = Some(CubeItem { cube, texture });
        }
        Ok(())
    }

    /// Build missing cells and return the visible ones, farthest from
    /// `eye` first
    fn visible_far_to_near(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        stats: &mut PassStats,
    ) -> EngineResult<Vec<usize>> {
        self.prepare(params, ctx.session)?;
        let flipped_y = ctx.config().use_flipped_y_axis;
        for depth in 0..self.ndepths {
            for row in 0..self.nrows {
                for col in 0..self.ncols {
                    let index = self.sub_cube_index(col, row, depth);
                    if matches!(self.items.get(index), Some(None)) {
                        self.build_item(index, [col, row, depth], params, ctx.session, flipped_y)?;
                        stats.textures_built += 1;
                    }
                }
            }
        }

        let eye = self.space.to_voxel(ctx.view.eye);
        let mut visible: Vec<(usize, f32)> = Vec::new();
        for (index, slot) in self.items.iter_mut().enumerate() {
            if let Some(CubeItem { cube: Some(cube), .. }) = slot {
                let distance = (cube.center() - eye).magnitude();
                cube.set_distance_from_camera(distance);
                visible.push((index, distance));
            }
        }
        visible.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        Ok(visible.into_iter().map(|(i, _)| i).collect())
    }

    /// View-aligned slices through the whole volume, back to front
    pub fn render(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        mut abort: Option<&mut AbortCallback<'_>>,
    ) -> EngineResult<PassStats> {
        let n = params.num_slices.max(1);
        let mut stats = PassStats {
            slices_total: n,
            ..PassStats::default()
        };
        let order = self.visible_far_to_near(ctx, params, &mut stats)?;
        let style = SliceStyle::from_config(ctx.config());
        let strategy = ctx.palette_strategy();
        ctx.backend.set_composition(params.composition);

        let bounds = params.volume.bounds;
        let center = aabb_center(&bounds);
        let radius = aabb_radius(&bounds);
        let view = ctx.view;
        let center_depth = (center - view.eye).dot(view.direction);
        let far = center_depth + radius;
        let delta = 2.0 * radius / n as f32;
        let (u, v) = orthonormal_basis(view.direction);

        let mut result = Ok(());
        for i in 0..n {
            if let Some(callback) = abort.as_deref_mut() {
                match callback(n, i) {
                    AbortCode::Continue => {}
                    AbortCode::Skip => {
                        stats.slices_skipped += 1;
                        continue;
                    }
                    AbortCode::Abort => {
                        stats.aborted = true;
                        break;
                    }
                }
            }
            let depth = far - (i as f32 + 0.5) * delta;
            let on_plane = center - view.direction * (center_depth - depth);
            let quad = self.quad_on_plane(on_plane, u, v, radius);
            match self.draw_polygon(ctx, &order, &quad, params.clut, style, strategy) {
                Ok(fans) => {
                    stats.fans_drawn += fans;
                    stats.slices_drawn += 1;
                }
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.finish(ctx, &order, params, style, strategy);
        result.map(|_| stats)
    }

    /// One slice along an arbitrary object-space plane
    pub fn render_oblique_slice(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        plane: &Plane,
    ) -> EngineResult<PassStats> {
        let mut stats = PassStats {
            slices_total: 1,
            ..PassStats::default()
        };
        let order = self.visible_far_to_near(ctx, params, &mut stats)?;
        let style = SliceStyle::from_config(ctx.config());
        let strategy = ctx.palette_strategy();
        ctx.backend.set_composition(params.composition);

        let bounds = params.volume.bounds;
        let center = aabb_center(&bounds);
        let radius = aabb_radius(&bounds);
        let offset = plane.signed_distance(center);
        let result = if offset.abs() > radius {
            Ok(0)
        } else {
            let on_plane = center - plane.normal * offset;
            let (u, v) = orthonormal_basis(plane.normal);
            let quad = self.quad_on_plane(on_plane, u, v, radius);
            self.draw_polygon(ctx, &order, &quad, params.clut, style, strategy)
        };
        self.finish(ctx, &order, params, style, strategy);
        let fans = result?;
        stats.fans_drawn = fans;
        stats.slices_drawn = u32::from(fans > 0);
        Ok(stats)
    }

    /// Indexed face set or triangle strip set, vertices in object space,
    /// polygons separated by -1
    pub fn render_indexed_set(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        vertices: &[Point3<f32>],
        indices: &[i32],
        set_type: SetType,
    ) -> EngineResult<PassStats> {
        if let Some(bad) = indices.iter().find(|&&i| i >= vertices.len() as i32 || i < -1) {
            return Err(EngineError::InvalidArgument {
                name: "indices".to_string(),
                reason: format!("index {} outside {} vertices", bad, vertices.len()),
            });
        }
        let voxel_vertices: Vec<Point3<f32>> =
            vertices.iter().map(|&p| self.space.to_voxel(p)).collect();
        self.render_set(ctx, params, |cube| match set_type {
            SetType::FaceSet => cube.intersect_indexed_face_set(&voxel_vertices, indices),
            SetType::TriangleStripSet => {
                cube.intersect_indexed_triangle_strip_set(&voxel_vertices, indices)
            }
        })
    }

    /// Face set or triangle strip set with a vertex count per polygon
    /// or strip
    pub fn render_nonindexed_set(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        vertices: &[Point3<f32>],
        counts: &[u32],
        set_type: SetType,
    ) -> EngineResult<PassStats> {
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total > vertices.len() as u64 {
            return Err(EngineError::InvalidArgument {
                name: "counts".to_string(),
                reason: format!("{} vertices requested, {} given", total, vertices.len()),
            });
        }
        let voxel_vertices: Vec<Point3<f32>> =
            vertices.iter().map(|&p| self.space.to_voxel(p)).collect();
        self.render_set(ctx, params, |cube| match set_type {
            SetType::FaceSet => cube.intersect_face_set(&voxel_vertices, counts),
            SetType::TriangleStripSet => {
                cube.intersect_triangle_strip_set(&voxel_vertices, counts)
            }
        })
    }

    fn render_set<F>(
        &mut self,
        ctx: &mut RenderContext<'_>,
        params: &PassParams<'_, '_>,
        intersect: F,
    ) -> EngineResult<PassStats>
    where
        F: Fn(&mut SubCube),
    {
        let mut stats = PassStats {
            slices_total: 1,
            ..PassStats::default()
        };
        let order = self.visible_far_to_near(ctx, params, &mut stats)?;
        let style = SliceStyle::from_config(ctx.config());
        let strategy = ctx.palette_strategy();
        ctx.backend.set_composition(params.composition);

        let clut = params.clut;
        let mut result = Ok(());
        for &index in &order {
            let Some(Some(CubeItem { cube: Some(cube), texture })) = self.items.get_mut(index)
            else {
                continue;
            };
            intersect(cube);
            if cube.slice_count() == 0 {
                continue;
            }
            if let Err(e) = activate_for(ctx, texture.as_ref(), clut, style, strategy) {
                cube.clear_slices();
                result = Err(e);
                break;
            }
            stats.fans_drawn += cube.render(ctx.backend, style.draw);
        }
        self.finish(ctx, &order, params, style, strategy);
        result?;
        stats.slices_drawn = u32::from(stats.fans_drawn > 0);
        Ok(stats)
    }

    fn quad_on_plane(
        &self,
        center: Point3<f32>,
        u: Vector3<f32>,
        v: Vector3<f32>,
        radius: f32,
    ) -> [Point3<f32>; 4] {
        // Slightly oversized so the cross-section never touches the edge
        let r = radius * 1.05;
        [
            self.space.to_voxel(center - u * r - v * r),
            self.space.to_voxel(center + u * r - v * r),
            self.space.to_voxel(center + u * r + v * r),
            self.space.to_voxel(center - u * r + v * r),
        ]
    }

    /// Clip one voxel-space polygon against the visible cubes in `order`
    /// and draw what survives
    fn draw_polygon(
        &mut self,
        ctx: &mut RenderContext<'_>,
        order: &[usize],
        polygon: &[Point3<f32>],
        clut: &Arc<Clut>,
        style: SliceStyle,
        strategy: PaletteStrategy,
    ) -> EngineResult<u32> {
        let mut fans = 0;
        for &index in order {
            let Some(Some(CubeItem { cube: Some(cube), texture })) = self.items.get_mut(index)
            else {
                continue;
            };
            if !cube.intersect_polygon(polygon) {
                continue;
            }
            if let Err(e) = activate_for(ctx, texture.as_ref(), clut, style, strategy) {
                cube.clear_slices();
                return Err(e);
            }
            fans += cube.render(ctx.backend, style.draw);
        }
        Ok(fans)
    }

    fn finish(
        &mut self,
        ctx: &mut RenderContext<'_>,
        order: &[usize],
        params: &PassParams<'_, '_>,
        style: SliceStyle,
        strategy: PaletteStrategy,
    ) {
        if style.outlines {
            for &index in order {
                if let Some(Some(CubeItem { cube: Some(cube), .. })) = self.items.get(index) {
                    ctx.backend.draw_lines(&cube.outline());
                }
            }
        }
        if params.paletted {
            deactivate_clut(strategy, ctx.backend);
        }
    }
}

fn cube_kind(params: &PassParams<'_, '_>) -> TextureKind {
    match (params.paletted, params.lighting) {
        (true, true) => TextureKind::Palette3DGradient,
        (true, false) => TextureKind::Palette3D,
        (false, _) => TextureKind::Rgba3D,
    }
}

fn activate_for(
    ctx: &mut RenderContext<'_>,
    texture: Option<&Arc<TextureObject>>,
    clut: &Arc<Clut>,
    style: SliceStyle,
    strategy: PaletteStrategy,
) -> EngineResult<()> {
    if style.draw != DrawStyle::Filled {
        return Ok(());
    }
    if let Some(texture) = texture {
        activate_texture(
            texture,
            Some(clut),
            ctx.context_id,
            strategy,
            &mut ctx.session.registry,
            ctx.backend,
        )?;
    }
    Ok(())
}

fn release_item(item: CubeItem, session: &mut RenderSession) {
    if let Some(texture) = item.texture {
        session.textures.release(texture, &mut session.registry);
    }
}

/// Two unit vectors spanning the plane perpendicular to `normal`
fn orthonormal_basis(normal: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let n = normal.normalize();
    let helper = if n.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let u = n.cross(helper).normalize();
    let v = n.cross(u);
    (u, v)
}
