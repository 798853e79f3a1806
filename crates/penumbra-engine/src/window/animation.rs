use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use winit::window::Window;

use crate::core::{App, AppControl, FrameCtx};
use crate::device::{GpuContext, GpuInit, WgpuContext};
use crate::drawable::DrawableDescriptor;
use crate::quality::{QualityAutoscaler, QualityScalingOptions, renderer_setters};
use crate::renderer::{Renderer, StartupSettings, compile};
use crate::time::FrameTime;

use super::{Runtime, RuntimeConfig};

const INSIGHTS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Opens a window and runs `animate` once per frame until it returns `false`.
///
/// Each frame the quality autoscaler adjusts render scales and shadows from
/// the frame time, then `animate` adds drawables and the renderer draws them.
/// Context loss is recovered transparently.
pub fn run_animation<F>(
    config: RuntimeConfig,
    gpu_init: GpuInit,
    descriptors: Vec<DrawableDescriptor>,
    startup: StartupSettings,
    animate: F,
) -> Result<()>
where
    F: FnMut(&mut Renderer, FrameTime) -> bool + 'static,
{
    Runtime::run(
        config,
        AnimationApp {
            gpu_init,
            descriptors: Some(descriptors),
            startup,
            animate,
            renderer: None,
            autoscaler: QualityAutoscaler::new(QualityScalingOptions::default(), renderer_setters()),
            last_insights_log: Instant::now(),
        },
    )
}

struct AnimationApp<F> {
    gpu_init: GpuInit,
    descriptors: Option<Vec<DrawableDescriptor>>,
    startup: StartupSettings,
    animate: F,
    renderer: Option<Renderer>,
    autoscaler: QualityAutoscaler<Renderer>,
    last_insights_log: Instant,
}

impl<F> App for AnimationApp<F>
where
    F: FnMut(&mut Renderer, FrameTime) -> bool,
{
    fn on_start(&mut self, window: Arc<Window>) -> Result<()> {
        let descriptors = self.descriptors.take().context("animation already started")?;
        let gpu_init = self.gpu_init.clone();
        let factory = move || -> Result<Box<dyn GpuContext>> {
            let ctx = pollster::block_on(WgpuContext::new(window.clone(), gpu_init.clone()))?;
            Ok(Box::new(ctx))
        };

        let mut renderer = pollster::block_on(compile(factory, descriptors, self.startup.clone()))
            .context("failed to compile renderer")?;
        self.autoscaler.apply(&mut renderer);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl {
        let Some(renderer) = self.renderer.as_mut() else {
            return AppControl::Continue;
        };

        if renderer.is_ready() {
            self.autoscaler.autoscale(ctx.time.dt_ms(), renderer);
        }
        if !(self.animate)(renderer, ctx.time) {
            return AppControl::Exit;
        }

        ctx.window.pre_present_notify();
        if let Err(e) = renderer.render() {
            log::error!("render failed: {e}");
            return AppControl::Exit;
        }

        if ctx.time.now.duration_since(self.last_insights_log) >= INSIGHTS_LOG_INTERVAL {
            self.last_insights_log = ctx.time.now;
            if let Some(insights) = renderer.insights() {
                log::debug!(
                    "quality {:.2}, fps {:.0}\n{insights}",
                    self.autoscaler.index(),
                    self.autoscaler.fps().unwrap_or(0.0)
                );
            }
        }
        AppControl::Continue
    }
}
