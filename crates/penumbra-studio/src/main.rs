mod drawables;

use anyhow::Result;
use penumbra_engine::coords::{ColorRgba, Vec2};
use penumbra_engine::device::GpuInit;
use penumbra_engine::logging::{LoggingConfig, init_logging};
use penumbra_engine::renderer::RenderError;
use penumbra_engine::window::{RuntimeConfig, run_animation};
use penumbra_engine::{Renderer, RuntimeOverrides, StartupSettings};
use winit::dpi::LogicalSize;

use drawables::{Circle, CircleLight};

const PALETTE: [ColorRgba; 4] = [
    ColorRgba::rgb(0.9, 0.9, 0.85),
    ColorRgba::rgb(0.95, 0.45, 0.3),
    ColorRgba::rgb(0.3, 0.6, 0.95),
    ColorRgba::rgb(0.45, 0.85, 0.5),
];

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let descriptors = vec![Circle::descriptor()?, CircleLight::descriptor()?];
    let config = RuntimeConfig {
        title: "penumbra studio".into(),
        initial_size: LogicalSize::new(960.0, 640.0),
    };

    let mut configured = false;
    run_animation(
        config,
        GpuInit::default(),
        descriptors,
        StartupSettings::default(),
        move |renderer, time| {
            if !configured {
                renderer.set_runtime_settings(RuntimeOverrides {
                    color_palette: Some(PALETTE.to_vec()),
                    ..RuntimeOverrides::default()
                });
                configured = true;
            }
            match draw_scene(renderer, time.elapsed) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("{e}");
                    false
                }
            }
        },
    )
}

/// Eight circles orbiting a large one, lit by two wandering lights.
fn draw_scene(renderer: &mut Renderer, t: f32) -> Result<(), RenderError> {
    let size = renderer.canvas_size();
    let center = size * 0.5;
    let orbit = size.x.min(size.y) * 0.3;

    for i in 0..8u32 {
        let angle = t * 0.4 + i as f32 * std::f32::consts::TAU / 8.0;
        renderer.add_drawable(Circle {
            center: center + Vec2::new(angle.cos(), angle.sin()) * orbit,
            radius: 18.0 + 6.0 * (t + i as f32).sin(),
            color: 1 + i % 3,
        })?;
    }
    renderer.add_drawable(Circle {
        center,
        radius: orbit * 0.35,
        color: 0,
    })?;

    let wander = Vec2::new((t * 0.7).cos(), (t * 1.1).sin()) * (orbit * 1.4);
    renderer.add_drawable(CircleLight {
        center: center + wander,
        color: ColorRgba::rgb(1.0, 0.85, 0.6),
        falloff: 8.0,
    })?;
    renderer.add_drawable(CircleLight {
        center: center - wander * 0.5,
        color: ColorRgba::rgb(0.4, 0.5, 1.0),
        falloff: 16.0,
    })?;
    Ok(())
}
