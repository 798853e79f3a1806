//! Renderer orchestration.
//!
//! [`compile`] builds a [`Renderer`] from drawable descriptors and startup
//! settings. The renderer owns one [`Pipeline`] per live context and rebuilds
//! it when the context is lost.

mod context_aware;
mod error;
mod insights;
mod pipeline;
mod settings;

pub use context_aware::{ContextFactory, Renderer, compile};
pub use error::{CompileError, ConfigError, Diagnostic, RenderError};
pub use insights::{InsightValue, Insights};
pub use pipeline::Pipeline;
pub use settings::{RuntimeOverrides, RuntimeSettings, StartupSettings};
