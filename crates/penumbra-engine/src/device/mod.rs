//! GPU context abstraction.
//!
//! [`GpuContext`] is the only surface the render passes talk to:
//! - programs and textures behind slotmap handles
//! - feature level and capability flags, lowered by startup overrides
//! - a shared loss flag checked once per frame
//! - a frame protocol of `begin_frame`, tile passes, `end_frame`
//!
//! [`WgpuContext`] implements it over a winit window; the recording mock backs
//! the test suite.

mod context;
mod error;
mod init;
mod surface;
mod wgpu_context;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use context::{
    BlendMode, CanvasSize, Capabilities, ColorTarget, CompileMessage, ContextInfo,
    ContextLossSignal, FeatureLevel, GlobalUniforms, GpuContext, HardwareInfo, PassRequest,
    PassTarget, PixelRect, ProgramId, ProgramSource, ProgramStatus, ShaderStage, TexelFormat,
    TextureDesc, TextureId, TileDraw,
};
pub use error::{GpuError, SurfaceErrorAction};
pub use init::GpuInit;
pub use wgpu_context::WgpuContext;
