use std::sync::Arc;
use std::time::Instant;

use crate::coords::{ColorRgba, Vec2};
use crate::device::{Capabilities, GpuContext, GpuError};
use crate::drawable::{DescriptorSet, Drawable, PassKind};
use crate::render::{
    AuxTextures, DistancePass, FrameUniforms, LightsPass, PaletteTexture, PassState, PassStats,
    ViewTransform,
};
use crate::shader::{ParallelCompiler, distance_program, lighting_program};

use super::{CompileError, Insights, RenderError, RuntimeOverrides, RuntimeSettings, StartupSettings};

/// One renderer bound to one context.
///
/// Everything here dies with the context; recovery builds a new pipeline.
pub struct Pipeline {
    ctx: Box<dyn GpuContext>,
    descriptors: Arc<DescriptorSet>,
    capabilities: Capabilities,
    background: ColorRgba,
    settings: RuntimeSettings,
    distance: DistancePass,
    lights: LightsPass,
    palette: PaletteTexture,
    textures: AuxTextures,
    view_area: Option<(Vec2, Vec2)>,
    insights: Insights,
    destroyed: bool,
}

impl Pipeline {
    /// Compiles every program variant of both passes as one batch and creates
    /// the shared textures. Partially built resources are released on failure.
    pub async fn build(
        ctx: Box<dyn GpuContext>,
        descriptors: Arc<DescriptorSet>,
        startup: StartupSettings,
    ) -> Result<Self, CompileError> {
        let info = ctx.info().clone();
        startup.validate(info.max_texture_dimension)?;

        let capabilities = info
            .capabilities
            .restricted(startup.force_baseline, startup.disable_float_textures);
        log::info!(
            "building renderer on {} ({:?}, separate distance target: {})",
            info.hardware.adapter,
            capabilities.feature_level,
            capabilities.separate_distance_target()
        );

        let mut insights = Insights::new();
        insights.set(&["hardware", "adapter"], info.hardware.adapter.as_str());
        insights.set(&["hardware", "vendor"], info.hardware.vendor.as_str());
        insights.set(&["hardware", "backend"], info.hardware.backend.as_str());
        insights.set(&["hardware", "feature level"], format!("{:?}", capabilities.feature_level));
        insights.set(&["hardware", "float textures"], capabilities.float_textures);

        let mut pipeline = Pipeline {
            distance: DistancePass::new(descriptors.shapes().to_vec(), &capabilities),
            lights: LightsPass::new(descriptors.lights().to_vec()),
            palette: PaletteTexture::new(startup.palette_size),
            textures: AuxTextures::new(&startup.texture_names),
            ctx,
            descriptors,
            capabilities,
            background: startup.background_color,
            settings: RuntimeSettings::default(),
            view_area: None,
            insights,
            destroyed: false,
        };

        match pipeline.initialize(&startup).await {
            Ok(()) => Ok(pipeline),
            Err(err) => {
                pipeline.destroy();
                Err(err)
            }
        }
    }

    async fn initialize(&mut self, startup: &StartupSettings) -> Result<(), CompileError> {
        let mut compiler = ParallelCompiler::new();
        if let Err(err) = self.submit_programs(&mut compiler, startup) {
            compiler.abandon(self.ctx.as_mut());
            return Err(err);
        }

        let mut batch = compiler.flush(self.ctx.as_mut()).await?;
        self.distance.finish(&mut batch)?;
        self.lights.finish(&mut batch)?;

        self.insights.set(&["compile", "programs"], batch.len());
        self.insights
            .set(&["compile", "elapsed ms"], batch.elapsed().as_secs_f64() * 1000.0);
        for (name, state) in [("distance", self.distance.state()), ("lights", self.lights.state())] {
            if let PassState::Ready(program) = state {
                self.insights
                    .set(&["render pass", name, "variants"], program.variants().len());
            }
        }

        self.palette.initialize(self.ctx.as_mut())?;
        self.textures.initialize(self.ctx.as_mut())?;
        self.apply_settings(&RuntimeOverrides::from_settings(&RuntimeSettings::default()))?;
        Ok(())
    }

    fn submit_programs(
        &mut self,
        compiler: &mut ParallelCompiler,
        startup: &StartupSettings,
    ) -> Result<(), CompileError> {
        let (template, substitutions) = distance_program(
            &self.capabilities,
            startup.palette_size,
            startup.background_color,
            &startup.texture_names,
        );
        self.distance
            .submit(compiler, self.ctx.as_mut(), &template, &substitutions)?;

        let (template, substitutions) = lighting_program(
            &self.capabilities,
            startup.shadow_trace_count,
            startup.light_penetration_ratio,
        );
        self.lights
            .submit(compiler, self.ctx.as_mut(), &template, &substitutions)
    }

    #[inline]
    pub fn context(&self) -> &dyn GpuContext {
        self.ctx.as_ref()
    }

    #[inline]
    pub fn is_lost(&self) -> bool {
        self.ctx.is_lost()
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[inline]
    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    #[inline]
    pub fn insights(&self) -> &Insights {
        &self.insights
    }

    /// Queues `drawable` for the next frame in the pass its type was declared for.
    pub fn add_drawable(&mut self, drawable: Box<dyn Drawable>) -> Result<(), RenderError> {
        let (kind, index) = self.descriptors.route(drawable.descriptor_key())?;
        match kind {
            PassKind::Distance => self.distance.add_drawable(index, drawable),
            PassKind::Lights => self.lights.add_drawable(index, drawable),
        }
    }

    /// Shows the world rectangle with top-left corner `top_left` and `size`.
    pub fn set_view_area(&mut self, top_left: Vec2, size: Vec2) {
        if !top_left.is_finite() || !size.is_finite() || size.x <= 0.0 || size.y <= 0.0 {
            log::warn!("ignoring invalid view area {top_left:?} {size:?}");
            return;
        }
        self.view_area = Some((top_left, size));
    }

    pub fn set_runtime_settings(&mut self, overrides: &RuntimeOverrides) -> Result<(), RenderError> {
        self.apply_settings(overrides)?;
        Ok(())
    }

    fn apply_settings(&mut self, overrides: &RuntimeOverrides) -> Result<(), GpuError> {
        self.settings.apply(overrides);
        let s = &self.settings;

        self.distance.set_tile_multiplier(s.tile_multiplier);
        self.distance.set_world_inverted(s.is_world_inverted);
        self.lights.set_tile_multiplier(s.lights_tile_multiplier);
        self.lights.set_light_cutoff_distance(s.light_cutoff_distance);

        let distance_frame = self.distance.frame_mut();
        distance_frame.set_render_scale(s.distance_render_scale);
        distance_frame.set_high_dpi(s.enable_high_dpi_rendering);
        let lights_frame = self.lights.frame_mut();
        lights_frame.set_render_scale(s.lights_render_scale);
        lights_frame.set_high_dpi(s.enable_high_dpi_rendering);

        if let Some(palette) = &overrides.color_palette {
            self.palette.set_palette(self.ctx.as_mut(), palette)?;
        }
        for (name, image) in &overrides.textures {
            match self.textures.set(self.ctx.as_mut(), name, image) {
                Ok(()) => {}
                Err(RenderError::Gpu(err)) => return Err(err),
                Err(err) => log::warn!("ignoring texture `{name}`: {err}"),
            }
        }
        Ok(())
    }

    /// View transform for the current canvas.
    pub fn view(&self) -> ViewTransform {
        let resolution = self.ctx.canvas().logical;
        match self.view_area {
            Some((top_left, size)) => ViewTransform::new(top_left, size, resolution),
            None => ViewTransform::for_canvas(resolution),
        }
    }

    /// Logical canvas size.
    pub fn canvas_size(&self) -> Vec2 {
        self.ctx.canvas().logical
    }

    pub fn view_area_size(&self) -> Vec2 {
        self.view().size()
    }

    pub fn display_to_world(&self, p: Vec2) -> Vec2 {
        self.view().display_to_world(p)
    }

    pub fn world_to_display(&self, p: Vec2) -> Vec2 {
        self.view().world_to_display(p)
    }

    /// Draws every queued drawable and presents the frame.
    ///
    /// The queue is emptied whatever the outcome. A frame without a surface
    /// image is skipped silently.
    pub fn render(&mut self) -> Result<(), RenderError> {
        let started = Instant::now();
        let result = self.render_frame();
        self.distance.drain();
        self.lights.drain();

        let (distance, lights) = match result {
            Ok(Some(stats)) => stats,
            Ok(None) => return Ok(()),
            Err(err) => return Err(err),
        };
        self.record_pass("distance", &distance);
        self.record_pass("lights", &lights);
        self.insights.set(
            &["renderer", "cpu render time ms"],
            started.elapsed().as_secs_f64() * 1000.0,
        );
        Ok(())
    }

    fn render_frame(&mut self) -> Result<Option<(PassStats, PassStats)>, RenderError> {
        // Targets are sized before the surface image is acquired.
        let canvas = self.ctx.canvas();
        self.distance.frame_mut().set_size(self.ctx.as_mut(), canvas)?;
        self.lights.frame_mut().set_size(self.ctx.as_mut(), canvas)?;

        match self.ctx.begin_frame() {
            Ok(()) => {}
            Err(GpuError::SurfaceUnavailable(reason)) => {
                log::debug!("skipping frame: {reason}");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }

        let view = self.view();
        let frame = FrameUniforms {
            ambient_light: self.settings.ambient_light,
            background: self.background,
            soft_shadows: self.settings.soft_shadows_enabled,
        };

        let palette = self.palette.id().ok_or(GpuError::UnknownResource)?;
        let aux = self.textures.ids().ok_or(GpuError::UnknownResource)?;
        let mut textures = Vec::with_capacity(1 + aux.len());
        textures.push(palette);
        textures.extend(aux);

        let distance = self
            .distance
            .render(self.ctx.as_mut(), &view, &frame, &textures)?;
        let inputs = self.distance.output_textures().to_vec();
        let lights = self.lights.render(self.ctx.as_mut(), &view, &frame, &inputs)?;
        self.ctx.end_frame()?;
        Ok(Some((distance, lights)))
    }

    fn record_pass(&mut self, name: &str, stats: &PassStats) {
        let insights = &mut self.insights;
        insights.set(&["render pass", name, "all drawables"], stats.all_drawables);
        insights.set(&["render pass", name, "tile count"], stats.tile_count);
        insights.set(&["render pass", name, "drawables per tile"], stats.drawables_per_tile);
        insights.set(&["render pass", name, "render scale"], stats.render_scale);
        insights.set(&["render pass", name, "overflowed drawables"], stats.overflowed);
    }

    /// Releases every GPU resource. Idempotent.
    pub fn destroy(&mut self) {
        if std::mem::replace(&mut self.destroyed, true) {
            return;
        }
        self.distance.destroy(self.ctx.as_mut());
        self.lights.destroy(self.ctx.as_mut());
        self.palette.destroy(self.ctx.as_mut());
        self.textures.destroy(self.ctx.as_mut());
        log::debug!("renderer resources released");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}
