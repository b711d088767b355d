//! Per-call render state
//!
//! A `RenderSession` owns everything that outlives a single render call:
//! configuration, the per-context resource managers, and the texture and
//! CLUT caches. A `RenderContext` borrows the session together with the
//! backend of the GL context being drawn into.

use super::backend::{GlBackend, GlCapabilities};
use crate::clut::{select_palette_strategy, ClutCache, PaletteStrategy};
use crate::config::VolumeRenderConfig;
use crate::error::{EngineError, EngineResult, OptionExt};
use crate::resource::{self, ContextId, ContextRegistry};
use crate::texture::TextureCache;
use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, SquareMatrix, Transform, Vector3};

/// Camera in the volume's object space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub eye: Point3<f32>,
    /// Viewing direction, normalized
    pub direction: Vector3<f32>,
}

impl ViewState {
    pub fn new(eye: Point3<f32>, direction: Vector3<f32>) -> EngineResult<Self> {
        if direction.magnitude2() == 0.0 {
            return Err(EngineError::InvalidArgument {
                name: "direction".to_string(),
                reason: "zero-length view direction".to_string(),
            });
        }
        Ok(Self {
            eye,
            direction: direction.normalize(),
        })
    }

    /// Camera on the +`axis` side (or -`axis` when `negative`) looking at
    /// the origin from `distance` away
    pub fn looking_along_axis(axis: usize, negative: bool, distance: f32) -> EngineResult<Self> {
        if axis > 2 {
            return Err(EngineError::InvalidArgument {
                name: "axis".to_string(),
                reason: format!("{} is not 0, 1 or 2", axis),
            });
        }
        let mut eye = Vector3::new(0.0, 0.0, 0.0);
        eye[axis] = if negative { -distance } else { distance };
        Self::new(Point3::from_vec(eye), -eye)
    }

    /// Convert a world-space camera through the inverse of `model`
    pub fn from_world(
        model: &Matrix4<f32>,
        eye: Point3<f32>,
        direction: Vector3<f32>,
    ) -> EngineResult<Self> {
        let inverse = model.invert().ok_or_engine(|| EngineError::DegenerateTransform {
            operation: "ViewState::from_world".to_string(),
        })?;
        Self::new(
            inverse.transform_point(eye),
            inverse.transform_vector(direction),
        )
    }

    /// Unit vector from the volume towards the viewer
    pub fn to_viewer(&self) -> Vector3<f32> {
        -self.direction
    }
}

pub struct RenderSession {
    pub config: VolumeRenderConfig,
    pub registry: ContextRegistry,
    pub textures: TextureCache,
    pub cluts: ClutCache,
}

impl RenderSession {
    pub fn new(config: VolumeRenderConfig) -> Self {
        Self {
            config,
            registry: ContextRegistry::default(),
            textures: TextureCache::new(),
            cluts: ClutCache::new(),
        }
    }

    /// Hook for the host: `context_id` was just made current
    pub fn context_made_current(
        &mut self,
        context_id: ContextId,
        backend: &mut dyn GlBackend,
    ) -> usize {
        resource::context_made_current(&mut self.registry, context_id, backend)
    }

    /// Hook for the host: `context_id` is going away
    pub fn context_destroyed(&mut self, context_id: ContextId, backend: &mut dyn GlBackend) {
        resource::context_destroyed(&mut self.registry, context_id, backend);
    }
}

impl Default for RenderSession {
    fn default() -> Self {
        Self::new(VolumeRenderConfig::default())
    }
}

pub struct RenderContext<'a> {
    pub context_id: ContextId,
    pub view: ViewState,
    pub session: &'a mut RenderSession,
    pub backend: &'a mut dyn GlBackend,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        context_id: ContextId,
        view: ViewState,
        session: &'a mut RenderSession,
        backend: &'a mut dyn GlBackend,
    ) -> Self {
        Self {
            context_id,
            view,
            session,
            backend,
        }
    }

    pub fn config(&self) -> &VolumeRenderConfig {
        &self.session.config
    }

    pub fn capabilities(&self) -> GlCapabilities {
        self.backend.capabilities()
    }

    /// Palette strategy of this context, probed on first use
    pub fn palette_strategy(&mut self) -> PaletteStrategy {
        let caps = self.backend.capabilities();
        let config = &self.session.config;
        let data = resource::manager(&mut self.session.registry, self.context_id);
        if let Some(strategy) = data.palette_strategy {
            return strategy;
        }
        let strategy = select_palette_strategy(&caps, config);
        data.palette_strategy = Some(strategy);
        if config.debug {
            log::debug!(
                "[RenderContext] Context {} palette strategy {:?}",
                self.context_id,
                strategy
            );
        }
        strategy
    }

    /// Whether volume textures should be paletted in this context
    pub fn use_paletted_textures(&mut self) -> bool {
        let wanted = {
            let config = &self.session.config;
            if config.force_rgba_textures {
                false
            } else {
                config.force_paletted_textures || config.use_paletted_textures
            }
        };
        wanted && self.palette_strategy() != PaletteStrategy::Unsupported
    }

    pub fn use_3d_textures(&self) -> bool {
        self.backend.capabilities().textures_3d && !self.session.config.force_2d_textures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::software_backend::SoftwareBackend;
    use cgmath::Vector4;

    #[test]
    fn test_view_from_world_inverts_model() {
        let model = Matrix4::from_translation(Vector3::new(10.0, 0.0, 0.0))
            * Matrix4::from_scale(2.0);
        let view = ViewState::from_world(
            &model,
            Point3::new(10.0, 0.0, 20.0),
            Vector3::new(0.0, 0.0, -1.0),
        )
        .expect("invertible");
        assert!((view.eye.z - 10.0).abs() < 1e-5);
        assert!(view.eye.x.abs() < 1e-5);
        assert!((view.to_viewer() - Vector3::new(0.0, 0.0, 1.0)).magnitude() < 1e-5);
    }

    #[test]
    fn test_degenerate_model_rejected() {
        let model = Matrix4::from_cols(
            Vector4::new(1.0, 0.0, 0.0, 0.0),
            Vector4::new(0.0, 0.0, 0.0, 0.0),
            Vector4::new(0.0, 0.0, 1.0, 0.0),
            Vector4::new(0.0, 0.0, 0.0, 1.0),
        );
        let result = ViewState::from_world(&model, Point3::new(0.0, 0.0, 1.0), Vector3::unit_z());
        assert!(matches!(result, Err(EngineError::DegenerateTransform { .. })));
    }

    #[test]
    fn test_palette_decision() {
        let mut session = RenderSession::default();
        let mut backend = SoftwareBackend::new();
        let view = ViewState::looking_along_axis(2, false, 10.0).expect("view");
        {
            let mut ctx = RenderContext::new(1, view, &mut session, &mut backend);
            assert_eq!(ctx.palette_strategy(), PaletteStrategy::FragmentProgram);
            assert!(ctx.use_paletted_textures());
        }

        session.config.force_rgba_textures = true;
        let mut ctx = RenderContext::new(1, view, &mut session, &mut backend);
        assert!(!ctx.use_paletted_textures());
    }

    #[test]
    fn test_no_palette_support_falls_back_to_rgba() {
        let mut session = RenderSession::default();
        let mut backend = SoftwareBackend::with_capabilities(GlCapabilities::default());
        let view = ViewState::looking_along_axis(0, true, 5.0).expect("view");
        let mut ctx = RenderContext::new(3, view, &mut session, &mut backend);
        assert_eq!(ctx.palette_strategy(), PaletteStrategy::Unsupported);
        assert!(!ctx.use_paletted_textures());
        assert!(!ctx.use_3d_textures());
    }
}
