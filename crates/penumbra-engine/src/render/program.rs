use std::sync::Arc;

use crate::device::{GpuContext, GpuError, ProgramId};
use crate::drawable::{DrawableDescriptor, Fields, UniformArrays};
use crate::renderer::CompileError;
use crate::shader::{
    CompiledBatch, ParallelCompiler, PendingProgram, ProgramTemplate, Substitutions, combinations,
    variant_substitutions,
};

/// One compiled variant and the array capacity it was compiled for, per type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramVariant {
    pub program: ProgramId,
    pub capacities: Vec<usize>,
}

impl ProgramVariant {
    /// True when every capacity is at least the requested count.
    pub fn covers(&self, counts: &[usize]) -> bool {
        self.capacities.iter().zip(counts).all(|(cap, n)| cap >= n)
    }

    #[inline]
    pub fn total_capacity(&self) -> usize {
        self.capacities.iter().sum()
    }
}

/// Variants submitted to a compiler, not yet built.
#[derive(Debug)]
pub struct PendingVariants {
    tickets: Vec<(PendingProgram, Vec<usize>)>,
}

/// Uniform block ready to draw with.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundProgram {
    pub program: ProgramId,
    pub block: Vec<[f32; 4]>,
    /// Drawables dropped per type because no variant was large enough.
    pub overflowed: Vec<usize>,
}

/// A program precompiled for every combination of array capacities.
///
/// At draw time the smallest variant whose capacities cover the tile's drawable
/// counts is picked and the uniform arrays are padded to its capacities.
pub struct AutoScalingProgram {
    label: &'static str,
    descriptors: Vec<Arc<DrawableDescriptor>>,
    paddings: Vec<Fields>,
    variants: Vec<ProgramVariant>,
    overflow_warned: Vec<bool>,
}

impl AutoScalingProgram {
    /// Submits one program per capacity combination.
    pub fn submit(
        compiler: &mut ParallelCompiler,
        ctx: &mut dyn GpuContext,
        template: &ProgramTemplate,
        substitutions: &Substitutions,
        descriptors: &[Arc<DrawableDescriptor>],
    ) -> Result<PendingVariants, CompileError> {
        let steps: Vec<&[usize]> = descriptors.iter().map(|d| d.count_steps()).collect();
        let mut tickets = Vec::new();
        for counts in combinations(&steps) {
            let mut subs = substitutions.clone();
            subs.extend(&variant_substitutions(descriptors, &counts));
            let ticket = compiler.submit(ctx, template, &subs)?;
            tickets.push((ticket, counts));
        }
        log::debug!("{}: submitted {} variants", template.label, tickets.len());
        Ok(PendingVariants { tickets })
    }

    /// Collects the compiled variants of `pending` from `batch`.
    pub fn from_batch(
        label: &'static str,
        descriptors: &[Arc<DrawableDescriptor>],
        pending: PendingVariants,
        batch: &mut CompiledBatch,
    ) -> Result<Self, GpuError> {
        let mut variants = pending
            .tickets
            .into_iter()
            .map(|(ticket, capacities)| {
                let program = batch.take(ticket).ok_or(GpuError::UnknownResource)?;
                Ok(ProgramVariant { program, capacities })
            })
            .collect::<Result<Vec<_>, GpuError>>()?;
        variants.sort_by(|a, b| {
            a.total_capacity()
                .cmp(&b.total_capacity())
                .then_with(|| a.capacities.cmp(&b.capacities))
        });

        let paddings = descriptors
            .iter()
            .map(|d| d.padding_fields())
            .collect();
        Ok(Self {
            label,
            descriptors: descriptors.to_vec(),
            paddings,
            variants,
            overflow_warned: vec![false; descriptors.len()],
        })
    }

    /// Variants in ascending order of total capacity.
    pub fn variants(&self) -> &[ProgramVariant] {
        &self.variants
    }

    /// First covering variant, else the largest one.
    pub fn select(&self, counts: &[usize]) -> Option<&ProgramVariant> {
        self.variants
            .iter()
            .find(|v| v.covers(counts))
            .or_else(|| self.variants.last())
    }

    /// Picks a variant for `arrays`, pads or truncates them to its capacities and
    /// encodes the uniform block in descriptor × column order.
    pub fn bind(&mut self, arrays: &mut UniformArrays) -> Option<BoundProgram> {
        let counts: Vec<usize> = self.descriptors.iter().map(|d| arrays.count(d)).collect();
        let variant = self.select(&counts)?.clone();

        let mut overflowed = Vec::with_capacity(self.descriptors.len());
        let mut block = Vec::new();
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            let capacity = variant.capacities[i];
            let dropped = arrays.fit(descriptor, capacity, &self.paddings[i]);
            if dropped > 0 && !self.overflow_warned[i] {
                self.overflow_warned[i] = true;
                log::warn!(
                    "{}: more than {} `{}` drawables in a tile, the rest are dropped",
                    self.label,
                    capacity,
                    descriptor.key()
                );
            }
            overflowed.push(dropped);

            if capacity > 0 {
                for mapping in descriptor.uniforms() {
                    block.extend_from_slice(arrays.column(&mapping.binding));
                }
            }
        }
        if block.is_empty() {
            block.push([0.0; 4]);
        }

        Some(BoundProgram {
            program: variant.program,
            block,
            overflowed,
        })
    }

    pub fn destroy(&mut self, ctx: &mut dyn GpuContext) {
        for variant in self.variants.drain(..) {
            ctx.destroy_program(variant.program);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::ColorRgba;
    use crate::device::Capabilities;
    use crate::device::mock::{MockConfig, MockContext, MockJournal};
    use crate::drawable::test_support::{Dot, dot_descriptor, glow_descriptor};
    use crate::drawable::{Drawable, SerializeCtx};
    use crate::shader::{block_len, distance_program};

    fn build(descriptors: &[Arc<DrawableDescriptor>]) -> (MockContext, AutoScalingProgram) {
        let mut ctx = MockContext::new(MockConfig::default(), MockJournal::shared());
        let (template, subs) =
            distance_program(&Capabilities::BASELINE, 16, ColorRgba::black(), &[]);
        let mut compiler = ParallelCompiler::new();
        let pending =
            AutoScalingProgram::submit(&mut compiler, &mut ctx, &template, &subs, descriptors).unwrap();
        let mut batch = pollster::block_on(compiler.flush(&mut ctx)).unwrap();
        let program = AutoScalingProgram::from_batch("distance", descriptors, pending, &mut batch).unwrap();
        (ctx, program)
    }

    fn dots(arrays: &mut UniformArrays, descriptor: &DrawableDescriptor, n: usize) {
        for i in 0..n {
            let dot = Dot::new(i as f32, 0.0, 1.0 + i as f32);
            arrays.push(descriptor, &dot.serialize(&SerializeCtx::identity())).unwrap();
        }
    }

    #[test]
    fn one_variant_per_combination_sorted_by_capacity() {
        let descriptors = vec![
            Arc::new(dot_descriptor(&[0, 4, 16])),
            Arc::new(glow_descriptor(&[0, 1, 2])),
        ];
        let (_ctx, program) = build(&descriptors);
        assert_eq!(program.variants().len(), 9);
        let totals: Vec<usize> = program.variants().iter().map(|v| v.total_capacity()).collect();
        assert!(totals.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(program.variants()[0].capacities, vec![0, 0]);
        assert_eq!(program.variants()[8].capacities, vec![16, 2]);
    }

    #[test]
    fn selection_covers_request_when_possible() {
        let descriptors = vec![
            Arc::new(dot_descriptor(&[0, 4, 16])),
            Arc::new(glow_descriptor(&[0, 1, 2])),
        ];
        let (_ctx, program) = build(&descriptors);
        for a in 0..=16 {
            for b in 0..=2 {
                let v = program.select(&[a, b]).unwrap();
                assert!(v.covers(&[a, b]), "{a},{b} -> {:?}", v.capacities);
            }
        }
        assert_eq!(program.select(&[3, 0]).unwrap().capacities, vec![4, 0]);
        // Nothing covers; the largest variant is used.
        assert_eq!(program.select(&[40, 1]).unwrap().capacities, vec![16, 2]);
    }

    #[test]
    fn padded_block_matches_capacity() {
        let descriptor = Arc::new(dot_descriptor(&[0, 2]));
        let descriptors = vec![descriptor.clone()];
        let (_ctx, mut program) = build(&descriptors);

        let mut arrays = UniformArrays::new();
        dots(&mut arrays, &descriptor, 1);
        let bound = program.bind(&mut arrays).unwrap();
        assert_eq!(bound.overflowed, vec![0]);
        assert_eq!(bound.block.len(), block_len(&descriptors, &[2]));
        assert_eq!(arrays.column("dotCenters").len(), 2);
        assert_eq!(arrays.column("dotRadii").len(), 2);
        // Padding uses the empty instance: zero radius.
        assert_eq!(bound.block[3], [0.0; 4]);
        assert_eq!(bound.block[2], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn overflow_is_truncated_and_reported() {
        let descriptor = Arc::new(dot_descriptor(&[0, 2]));
        let descriptors = vec![descriptor.clone()];
        let (_ctx, mut program) = build(&descriptors);

        let mut arrays = UniformArrays::new();
        dots(&mut arrays, &descriptor, 3);
        let bound = program.bind(&mut arrays).unwrap();
        assert_eq!(bound.overflowed, vec![1]);
        assert_eq!(bound.block.len(), 4);
        // Draw order is kept; the tail is dropped.
        assert_eq!(bound.block[2], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(bound.block[3], [2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_tile_uses_smallest_variant() {
        let descriptor = Arc::new(dot_descriptor(&[0, 2]));
        let (_ctx, mut program) = build(&[descriptor]);
        let bound = program.bind(&mut UniformArrays::new()).unwrap();
        assert_eq!(Some(bound.program), program.variants().first().map(|v| v.program));
        assert_eq!(bound.block, vec![[0.0; 4]]);
    }

    #[test]
    fn destroy_releases_every_variant() {
        let journal = MockJournal::shared();
        let mut ctx = MockContext::new(MockConfig::default(), journal.clone());
        let descriptors = vec![Arc::new(dot_descriptor(&[0, 1, 2]))];
        let (template, subs) =
            distance_program(&Capabilities::BASELINE, 16, ColorRgba::black(), &[]);
        let mut compiler = ParallelCompiler::new();
        let pending =
            AutoScalingProgram::submit(&mut compiler, &mut ctx, &template, &subs, &descriptors).unwrap();
        let mut batch = pollster::block_on(compiler.flush(&mut ctx)).unwrap();
        let mut program =
            AutoScalingProgram::from_batch("distance", &descriptors, pending, &mut batch).unwrap();
        program.destroy(&mut ctx);
        assert_eq!(journal.borrow().programs_destroyed, 3);
        assert!(program.variants().is_empty());
    }
}
