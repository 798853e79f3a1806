//! Shader source generation and batch compilation.

mod compiler;
mod generate;
mod substitute;
mod templates;

pub use compiler::{CompiledBatch, ParallelCompiler, PendingProgram, ProgramTemplate};
pub use generate::{ShaderContribution, block_len, combinations, contribution, variant_substitutions};
pub use substitute::{SubstitutionValue, Substitutions, substitute};
pub use templates::{distance_program, distance_targets, lighting_program};

pub(crate) use substitute::float_literal;
