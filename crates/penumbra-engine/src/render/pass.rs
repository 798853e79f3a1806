use std::sync::Arc;

use crate::coords::ColorRgba;
use crate::device::{CanvasSize, GlobalUniforms, GpuContext, GpuError, TileDraw};
use crate::drawable::{Drawable, DrawableDescriptor, UniformArrays};
use crate::renderer::{CompileError, RenderError};
use crate::shader::{CompiledBatch, ParallelCompiler, ProgramTemplate, Substitutions};

use super::{AutoScalingProgram, FrameBuffer, PendingVariants, Tile, ViewTransform};

/// Lifecycle of a pass's program set.
pub enum PassState {
    Uninitialized,
    Initializing(PendingVariants),
    Ready(AutoScalingProgram),
}

impl PassState {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, PassState::Ready(_))
    }
}

/// Per-frame values shared by both passes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameUniforms {
    pub ambient_light: ColorRgba,
    pub background: ColorRgba,
    pub soft_shadows: bool,
}

/// What a pass did in one frame, reported into insights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassStats {
    pub all_drawables: usize,
    pub tile_count: usize,
    /// Drawables drawn per tile, averaged over tiles.
    pub drawables_per_tile: f32,
    pub render_scale: f32,
    pub overflowed: usize,
}

pub(crate) fn globals(
    view: &ViewTransform,
    target: (u32, u32),
    frame: &FrameUniforms,
    max_min_distance: f32,
) -> GlobalUniforms {
    let aspect = view.square_to_aspect();
    let pixel_size = (2.0 * aspect.x / target.0.max(1) as f32).max(2.0 * aspect.y / target.1.max(1) as f32);
    let ambient = frame.ambient_light;

    GlobalUniforms {
        square_to_aspect: aspect.into(),
        target_size: [target.0 as f32, target.1 as f32],
        ambient_light: [ambient.r, ambient.g, ambient.b, 1.0],
        background: frame.background.to_array(),
        max_min_distance,
        world_length_to_ndc: view.world_length_to_ndc(),
        pixel_size,
        soft_shadows: if frame.soft_shadows { 1.0 } else { 0.0 },
    }
}

struct Queued {
    descriptor: usize,
    drawable: Box<dyn Drawable>,
}

/// State shared by the distance and lights passes: program set, target and
/// the drawables queued for the next frame.
pub(crate) struct TilePass {
    label: &'static str,
    descriptors: Vec<Arc<DrawableDescriptor>>,
    pub(crate) frame: FrameBuffer,
    state: PassState,
    queued: Vec<Queued>,
    arrays: UniformArrays,
}

/// Tile draws of one frame before submission.
pub(crate) struct TileBatch {
    pub draws: Vec<TileDraw>,
    pub drawn: usize,
    pub overflowed: usize,
    pub queued: usize,
}

impl TilePass {
    pub fn new(label: &'static str, descriptors: Vec<Arc<DrawableDescriptor>>, frame: FrameBuffer) -> Self {
        Self {
            label,
            descriptors,
            frame,
            state: PassState::Uninitialized,
            queued: Vec::new(),
            arrays: UniformArrays::new(),
        }
    }

    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    pub fn state(&self) -> &PassState {
        &self.state
    }

    pub fn submit(
        &mut self,
        compiler: &mut ParallelCompiler,
        ctx: &mut dyn GpuContext,
        template: &ProgramTemplate,
        substitutions: &Substitutions,
    ) -> Result<(), CompileError> {
        let pending =
            AutoScalingProgram::submit(compiler, ctx, template, substitutions, &self.descriptors)?;
        self.state = PassState::Initializing(pending);
        Ok(())
    }

    pub fn finish(&mut self, batch: &mut CompiledBatch) -> Result<(), GpuError> {
        match std::mem::replace(&mut self.state, PassState::Uninitialized) {
            PassState::Initializing(pending) => {
                let program = AutoScalingProgram::from_batch(self.label, &self.descriptors, pending, batch)?;
                self.state = PassState::Ready(program);
                Ok(())
            }
            other => {
                self.state = other;
                Err(GpuError::ProgramNotReady)
            }
        }
    }

    pub fn add(&mut self, descriptor: usize, drawable: Box<dyn Drawable>) -> Result<(), RenderError> {
        if !self.state.is_ready() {
            return Err(RenderError::NotReady(self.label));
        }
        self.queued.push(Queued { descriptor, drawable });
        Ok(())
    }

    /// Checks readiness and sizes the target for `canvas`.
    pub fn prepare(&mut self, ctx: &mut dyn GpuContext, canvas: CanvasSize) -> Result<(), RenderError> {
        if !self.state.is_ready() {
            return Err(RenderError::NotReady(self.label));
        }
        self.frame.set_size(ctx, canvas)?;
        Ok(())
    }

    pub fn drain(&mut self) {
        self.queued.clear();
    }

    /// Serializes the queued drawables per tile and binds a program variant to
    /// each tile. `select` returns the lightness a drawable is drawn with in a
    /// tile, or `None` to cull it. The queue is drained even on failure.
    pub fn build_tiles<F>(&mut self, view: &ViewTransform, tiles: &[Tile], mut select: F) -> Result<TileBatch, RenderError>
    where
        F: FnMut(&Tile, &dyn Drawable) -> Option<f32>,
    {
        let queued = std::mem::take(&mut self.queued);
        let PassState::Ready(program) = &mut self.state else {
            return Err(RenderError::NotReady(self.label));
        };

        let mut batch = TileBatch {
            draws: Vec::with_capacity(tiles.len()),
            drawn: 0,
            overflowed: 0,
            queued: queued.len(),
        };
        for tile in tiles {
            self.arrays.clear();
            for q in &queued {
                let Some(lightness) = select(tile, q.drawable.as_ref()) else {
                    continue;
                };
                let descriptor = &self.descriptors[q.descriptor];
                self.arrays
                    .push(descriptor, &q.drawable.serialize(&view.serialize_ctx(lightness)))?;
                batch.drawn += 1;
            }

            let bound = program
                .bind(&mut self.arrays)
                .ok_or(RenderError::NotReady(self.label))?;
            let dropped: usize = bound.overflowed.iter().sum();
            batch.overflowed += dropped;
            batch.drawn -= dropped;
            batch.draws.push(TileDraw {
                program: bound.program,
                scissor: tile.scissor,
                block: bound.block,
            });
        }
        Ok(batch)
    }

    pub fn destroy(&mut self, ctx: &mut dyn GpuContext) {
        self.queued.clear();
        self.frame.destroy(ctx);
        if let PassState::Ready(program) = &mut self.state {
            program.destroy(ctx);
        }
        self.state = PassState::Uninitialized;
    }
}
