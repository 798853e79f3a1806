use thiserror::Error;

/// Failures reported by a [`super::GpuContext`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GpuError {
    /// The device is gone; every resource created on it is invalid.
    #[error("GPU context lost")]
    ContextLost,
    /// No surface image could be acquired this frame.
    #[error("surface unavailable: {0}")]
    SurfaceUnavailable(&'static str),
    #[error("unknown GPU resource handle")]
    UnknownResource,
    #[error("program is not linked and ready")]
    ProgramNotReady,
    #[error("no frame in flight")]
    NoFrame,
    #[error("{0}")]
    Backend(String),
}

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// The device cannot continue (commonly OOM); treated as context loss.
    Lost,
}
