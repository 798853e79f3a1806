use std::sync::Arc;

use crate::coords::ColorRgba;
use crate::device::{GpuContext, GpuError, PassRequest, TextureId};
use crate::drawable::{Drawable, DrawableDescriptor};
use crate::renderer::{CompileError, RenderError};
use crate::shader::{CompiledBatch, ParallelCompiler, ProgramTemplate, Substitutions};

use super::pass::{TilePass, globals};
use super::{
    FrameBuffer, FrameUniforms, MAX_TILE_MULTIPLIER, PassState, PassStats, Tile, ViewTransform,
    tile_grid,
};

/// Lightness of a light in `tile`, `None` when it is at or beyond `cutoff`.
///
/// The distance is measured from the light's position to the tile rectangle
/// (zero inside). Lights without a position fall back to their distance lower
/// bound minus the tile radius.
pub fn light_ratio(tile: &Tile, light: &dyn Drawable, cutoff: f32) -> Option<f32> {
    let d = match light.position() {
        Some(p) => tile.world.signed_distance(p),
        None => light.min_distance(tile.center()) - tile.radius(),
    }
    .max(0.0);
    if d >= cutoff {
        return None;
    }
    Some((1.0 - d / cutoff).clamp(0.0, 1.0))
}

/// Accumulates light contributions onto the surface, shading the distance
/// pass output.
pub struct LightsPass {
    core: TilePass,
    tile_multiplier: u32,
    light_cutoff_distance: f32,
}

impl LightsPass {
    pub fn new(lights: Vec<Arc<DrawableDescriptor>>) -> Self {
        Self {
            core: TilePass::new("lights", lights, FrameBuffer::surface("lights")),
            tile_multiplier: 1,
            light_cutoff_distance: 400.0,
        }
    }

    pub fn submit(
        &mut self,
        compiler: &mut ParallelCompiler,
        ctx: &mut dyn GpuContext,
        template: &ProgramTemplate,
        substitutions: &Substitutions,
    ) -> Result<(), CompileError> {
        self.core.submit(compiler, ctx, template, substitutions)
    }

    pub fn finish(&mut self, batch: &mut CompiledBatch) -> Result<(), GpuError> {
        self.core.finish(batch)
    }

    pub fn state(&self) -> &PassState {
        self.core.state()
    }

    pub fn set_tile_multiplier(&mut self, multiplier: u32) {
        self.tile_multiplier = multiplier.clamp(1, MAX_TILE_MULTIPLIER);
    }

    pub fn set_light_cutoff_distance(&mut self, distance: f32) {
        if distance.is_finite() && distance >= 0.0 {
            self.light_cutoff_distance = distance;
        }
    }

    pub fn frame_mut(&mut self) -> &mut FrameBuffer {
        &mut self.core.frame
    }

    /// `descriptor` indexes the light descriptors this pass was built with.
    pub fn add_drawable(&mut self, descriptor: usize, drawable: Box<dyn Drawable>) -> Result<(), RenderError> {
        self.core.add(descriptor, drawable)
    }

    /// Drops queued drawables without drawing them.
    pub fn drain(&mut self) {
        self.core.drain();
    }

    /// `inputs` are the distance pass outputs.
    pub fn render(
        &mut self,
        ctx: &mut dyn GpuContext,
        view: &ViewTransform,
        frame: &FrameUniforms,
        inputs: &[TextureId],
    ) -> Result<PassStats, RenderError> {
        let canvas = ctx.canvas();
        if let Err(err) = self.core.prepare(ctx, canvas) {
            self.core.drain();
            return Err(err);
        }

        let size = self.core.frame.size();
        let tiles = tile_grid(size, self.tile_multiplier, view);
        let cutoff = self.light_cutoff_distance;

        let batch = self
            .core
            .build_tiles(view, &tiles, |tile, light| light_ratio(tile, light, cutoff))?;

        ctx.submit_pass(PassRequest {
            label: self.core.label(),
            target: self.core.frame.target(),
            clear: ColorRgba::black(),
            globals: globals(view, size, frame, 0.0),
            textures: inputs,
            draws: batch.draws,
        })?;

        Ok(PassStats {
            all_drawables: batch.queued,
            tile_count: tiles.len(),
            drawables_per_tile: batch.drawn as f32 / tiles.len().max(1) as f32,
            render_scale: self.core.frame.render_scale(),
            overflowed: batch.overflowed,
        })
    }

    pub fn destroy(&mut self, ctx: &mut dyn GpuContext) {
        self.core.destroy(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Rect;
    use crate::device::PixelRect;
    use crate::drawable::test_support::Glow;

    fn tile() -> Tile {
        Tile {
            scissor: PixelRect::new(0, 0, 100, 100),
            world: Rect::new(0.0, 0.0, 100.0, 100.0),
        }
    }

    #[test]
    fn lights_fade_with_distance_to_tile() {
        let inside = Glow::new(50.0, 50.0, 1.0);
        assert_eq!(light_ratio(&tile(), &inside, 400.0), Some(1.0));

        let near = Glow::new(200.0, 50.0, 1.0);
        assert_eq!(light_ratio(&tile(), &near, 400.0), Some(0.75));

        let edge = Glow::new(500.0, 50.0, 1.0);
        assert_eq!(light_ratio(&tile(), &edge, 400.0), None);

        let far = Glow::new(100.0, 1000.0, 1.0);
        assert_eq!(light_ratio(&tile(), &far, 400.0), None);
    }

    #[test]
    fn lightness_is_monotonic() {
        let mut last = f32::INFINITY;
        for x in (100..500).step_by(25) {
            let ratio = light_ratio(&tile(), &Glow::new(x as f32, 50.0, 1.0), 400.0).unwrap_or(0.0);
            assert!(ratio <= last);
            last = ratio;
        }
        assert!((last - 0.0625).abs() < 1e-6);
    }
}
