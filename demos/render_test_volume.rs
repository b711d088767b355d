//! Render the 64^3 test volume through the software backend
//!
//! Writes two PNGs into the directory given as the first argument
//! (default `volume_demo`): the Z = 0 ortho slice and a maximum
//! intensity projection along Z.

use hearth_volume::{
    init_logging, make_test_volume, CompositionMode, NumSlicesControl, PredefinedMap,
    RenderContext, RenderPath, RenderSession, RenderSettings, SoftwareBackend, TransferFunction,
    ViewState, VolumeRender, VolumeRenderConfig,
};
use std::path::{Path, PathBuf};

const SIZE: u32 = 64;

fn main() -> anyhow::Result<()> {
    init_logging();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("volume_demo"));
    std::fs::create_dir_all(&out_dir)?;

    let volume = make_test_volume()?;
    let desc = volume.descriptor();
    let mut tf = TransferFunction::predefined(PredefinedMap::Grey);
    tf.set_shift_offset(2, 0);

    let mut session = RenderSession::new(VolumeRenderConfig::from_env()?);
    let mut backend = SoftwareBackend::new();
    let view = ViewState::looking_along_axis(2, false, 100.0)?;

    println!("Rendering Z = 0 slice...");
    let mut renderer = VolumeRender::new(RenderSettings {
        composition: CompositionMode::MaxIntensity,
        path: RenderPath::Pages2D,
        ..RenderSettings::default()
    });
    {
        let mut ctx = RenderContext::new(1, view, &mut session, &mut backend);
        let stats = renderer.render_ortho_slice(&mut ctx, &desc, &tf, 2, 0)?;
        println!("[OK] {:?}", stats);
    }
    write_projection(&backend, &out_dir.join("slice_z0.png"))?;
    backend.clear_draws();

    println!("Rendering maximum intensity projection...");
    renderer.settings.num_slices = NumSlicesControl::All;
    let mut slices_seen = 0;
    let mut progress = |total: u32, index: u32| {
        slices_seen = total.max(index + 1);
        hearth_volume::AbortCode::Continue
    };
    {
        let mut ctx = RenderContext::new(1, view, &mut session, &mut backend);
        let stats = renderer.render(&mut ctx, &desc, &tf, Some(&mut progress))?;
        println!("[OK] {:?}", stats);
    }
    println!("[OK] {} slices", slices_seen);
    write_projection(&backend, &out_dir.join("mip_z.png"))?;

    renderer.release(&mut session);
    session.context_destroyed(1, &mut backend);
    println!("Images written to {}", out_dir.display());
    Ok(())
}

/// Composite the recorded draws along Z into an RGBA image
fn write_projection(backend: &SoftwareBackend, path: &Path) -> anyhow::Result<()> {
    let half = SIZE as f32 / 2.0;
    let img = image::RgbaImage::from_fn(SIZE, SIZE, |x, y| {
        let rgba = backend.composite_pixel(2, [x as f32 + 0.5 - half, y as f32 + 0.5 - half]);
        image::Rgba(rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    });
    img.save(path)?;
    println!("[OK] Wrote {}", path.display());
    Ok(())
}
