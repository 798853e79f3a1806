use std::sync::Arc;

use crate::coords::ColorRgba;
use crate::device::{Capabilities, GpuContext, GpuError, PassRequest, TextureId};
use crate::drawable::{Drawable, DrawableDescriptor};
use crate::renderer::{CompileError, RenderError};
use crate::shader::{CompiledBatch, ParallelCompiler, ProgramTemplate, Substitutions, distance_targets};

use super::pass::{TilePass, globals};
use super::{
    FrameBuffer, FrameUniforms, MAX_TILE_MULTIPLIER, PassState, PassStats, ViewTransform, tile_grid,
};

/// Evaluates every shape's distance function per tile into an offscreen
/// colour target plus, on extended contexts, a float distance target.
pub struct DistancePass {
    core: TilePass,
    tile_multiplier: u32,
    is_world_inverted: bool,
}

impl DistancePass {
    pub fn new(shapes: Vec<Arc<DrawableDescriptor>>, capabilities: &Capabilities) -> Self {
        Self {
            core: TilePass::new(
                "distance",
                shapes,
                FrameBuffer::intermediate("distance", distance_targets(capabilities)),
            ),
            tile_multiplier: 8,
            is_world_inverted: false,
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

    pub fn set_world_inverted(&mut self, inverted: bool) {
        self.is_world_inverted = inverted;
    }

    pub fn frame_mut(&mut self) -> &mut FrameBuffer {
        &mut self.core.frame
    }

    /// Colour then (extended only) distance texture, as read by the lights pass.
    pub fn output_textures(&self) -> &[TextureId] {
        self.core.frame.textures()
    }

    /// `descriptor` indexes the shape descriptors this pass was built with.
    pub fn add_drawable(&mut self, descriptor: usize, drawable: Box<dyn Drawable>) -> Result<(), RenderError> {
        self.core.add(descriptor, drawable)
    }

    /// Drops queued drawables without drawing them.
    pub fn drain(&mut self) {
        self.core.drain();
    }

    /// `textures` are the palette followed by the auxiliary textures.
    pub fn render(
        &mut self,
        ctx: &mut dyn GpuContext,
        view: &ViewTransform,
        frame: &FrameUniforms,
        textures: &[TextureId],
    ) -> Result<PassStats, RenderError> {
        let canvas = ctx.canvas();
        if let Err(err) = self.core.prepare(ctx, canvas) {
            self.core.drain();
            return Err(err);
        }

        let size = self.core.frame.size();
        let tiles = tile_grid(size, self.tile_multiplier, view);
        let radius = tiles.iter().map(|t| t.radius()).fold(0.0f32, f32::max);
        let sign = if self.is_world_inverted { -1.0 } else { 1.0 };

        let batch = self.core.build_tiles(view, &tiles, |tile, drawable| {
            tile.may_contain(drawable.min_distance(tile.center())).then_some(1.0)
        })?;

        ctx.submit_pass(PassRequest {
            label: self.core.label(),
            target: self.core.frame.target(),
            clear: ColorRgba::new(0.0, 0.0, 0.0, 0.0),
            globals: globals(view, size, frame, sign * radius * view.world_length_to_ndc()),
            textures,
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
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::device::mock::{MockConfig, MockContext, MockJournal};
    use crate::drawable::test_support::{Dot, dot_descriptor};
    use crate::shader::distance_program;

    fn ready_pass() -> (DistancePass, MockContext, Rc<RefCell<MockJournal>>) {
        let journal = MockJournal::shared();
        let mut ctx = MockContext::new(MockConfig::default(), journal.clone());
        let capabilities = ctx.info().capabilities;
        let mut pass = DistancePass::new(vec![Arc::new(dot_descriptor(&[0, 1, 4]))], &capabilities);

        let (template, subs) = distance_program(&capabilities, 16, ColorRgba::black(), &[]);
        let mut compiler = ParallelCompiler::new();
        pass.submit(&mut compiler, &mut ctx, &template, &subs).unwrap();
        let mut batch = pollster::block_on(compiler.flush(&mut ctx)).unwrap();
        pass.finish(&mut batch).unwrap();
        (pass, ctx, journal)
    }

    fn frame() -> FrameUniforms {
        FrameUniforms {
            ambient_light: ColorRgba::black(),
            background: ColorRgba::black(),
            soft_shadows: false,
        }
    }

    fn render(pass: &mut DistancePass, ctx: &mut MockContext) -> PassStats {
        let view = ViewTransform::for_canvas(ctx.canvas().logical);
        let palette = ctx
            .create_texture(&crate::device::TextureDesc {
                label: "palette",
                width: 16,
                height: 1,
                format: crate::device::TexelFormat::Rgba8Unorm,
                render_target: false,
            })
            .unwrap();
        ctx.begin_frame().unwrap();
        pass.render(ctx, &view, &frame(), &[palette]).unwrap()
    }

    #[test]
    fn adding_before_initialization_fails() {
        let mut pass = DistancePass::new(vec![Arc::new(dot_descriptor(&[0, 1]))], &Capabilities::BASELINE);
        let err = pass.add_drawable(0, Box::new(Dot::new(0.0, 0.0, 1.0))).unwrap_err();
        assert!(matches!(err, RenderError::NotReady("distance")));
    }

    #[test]
    fn far_drawables_are_culled_from_every_tile() {
        let (mut pass, mut ctx, journal) = ready_pass();
        pass.add_drawable(0, Box::new(Dot::new(100.0, 100.0, 5.0))).unwrap();
        pass.add_drawable(0, Box::new(Dot::new(5000.0, 5000.0, 5.0))).unwrap();
        let stats = render(&mut pass, &mut ctx);

        assert_eq!(stats.all_drawables, 2);
        assert_eq!(stats.tile_count, 64);
        assert_eq!(stats.overflowed, 0);
        // Only the near dot lands anywhere, in a handful of tiles.
        let j = journal.borrow();
        let pass = j.passes_labelled("distance").next().unwrap();
        let with_dot = pass.draws.iter().filter(|d| d.block.len() > 1).count();
        assert!(with_dot > 0 && with_dot < 64);
        assert!((stats.drawables_per_tile * 64.0 - with_dot as f32).abs() < 1e-3);
    }

    #[test]
    fn inverted_world_starts_from_negative_distance() {
        let (mut pass, mut ctx, journal) = ready_pass();
        render(&mut pass, &mut ctx);
        pass.set_world_inverted(true);
        ctx.end_frame().unwrap();
        render(&mut pass, &mut ctx);

        let j = journal.borrow();
        let starts: Vec<f32> = j
            .passes_labelled("distance")
            .map(|p| p.globals.max_min_distance)
            .collect();
        assert!(starts[0] > 0.0);
        assert_eq!(starts[1], -starts[0]);
        // Resizing is idempotent: the targets were created once.
        assert_eq!(pass.output_textures().len(), 2);
        assert_eq!(j.textures_created.iter().filter(|t| t.0 == "distance").count(), 2);
    }
}
