use std::fmt;

use thiserror::Error;

use crate::device::{GpuError, ShaderStage};

/// Invalid registration data or shader templates. Never transient.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("count steps of `{0}` must contain 0")]
    MissingZeroStep(String),
    #[error("count steps of `{0}` must be strictly ascending")]
    UnsortedSteps(String),
    #[error("drawable type `{0}` declares no uniforms")]
    NoUniforms(String),
    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),
    #[error("drawable type `{0}` is registered twice")]
    DuplicateDescriptor(String),
    #[error("uniform binding `{binding}` of `{key}` is already in use")]
    DuplicateBinding { key: String, binding: String },
    #[error("drawable type `{0}` was not declared when the renderer was compiled")]
    UndeclaredDrawable(String),
    #[error("drawable of type `{key}` did not serialize field `{field}`")]
    MissingField { key: String, field: String },
    #[error("unresolved shader placeholder `{{{0}}}`")]
    UnresolvedPlaceholder(String),
    #[error("shader substitution did not settle after {0} passes")]
    SubstitutionCycle(usize),
    #[error("palette size {size} must be between 1 and {max}")]
    PaletteSize { size: u32, max: u32 },
    #[error("texture `{0}` is declared twice")]
    DuplicateTexture(String),
    #[error("texture `{0}` was not declared in the startup settings")]
    UndeclaredTexture(String),
    #[error("texture `{name}` has {actual} bytes, expected {expected}")]
    TextureSize {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// One compiler message mapped back to the substituted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub stage: ShaderStage,
    pub line: Option<u32>,
    pub message: String,
    /// The offending source line, when the backend reported one.
    pub source_line: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, &self.source_line) {
            (Some(line), Some(src)) => {
                write!(f, "{:?} {line}: {}\n    {line} | {}", self.stage, self.message, src.trim_end())
            }
            (Some(line), None) => write!(f, "{:?} {line}: {}", self.stage, self.message),
            _ => write!(f, "{:?}: {}", self.stage, self.message),
        }
    }
}

/// Shader compile or link failure.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to compile `{label}`:\n{}", join_lines(.diagnostics))]
    Shader {
        label: String,
        diagnostics: Vec<Diagnostic>,
    },
    #[error("failed to link `{label}`: {log}")]
    Link { label: String, log: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

fn join_lines(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors surfaced by public renderer operations.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
    #[error("render pass `{0}` is not initialized")]
    NotReady(&'static str),
}

impl RenderError {
    /// True when the error came from a lost context and will be recovered.
    pub fn is_context_lost(&self) -> bool {
        matches!(
            self,
            RenderError::Gpu(GpuError::ContextLost)
                | RenderError::Compile(CompileError::Gpu(GpuError::ContextLost))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_render_source_line() {
        let err = CompileError::Shader {
            label: "distance".into(),
            diagnostics: vec![Diagnostic {
                stage: ShaderStage::Fragment,
                line: Some(12),
                message: "unknown identifier `foo`".into(),
                source_line: Some("    let x = foo;".into()),
            }],
        };
        let text = err.to_string();
        assert!(text.contains("Fragment 12: unknown identifier `foo`"));
        assert!(text.contains("12 |     let x = foo;"));
    }

    #[test]
    fn context_loss_is_recognised_through_wrappers() {
        assert!(RenderError::Gpu(GpuError::ContextLost).is_context_lost());
        assert!(RenderError::Compile(CompileError::Gpu(GpuError::ContextLost)).is_context_lost());
        assert!(!RenderError::NotReady("lights").is_context_lost());
    }
}
