use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytemuck::{Pod, Zeroable};
use slotmap::new_key_type;

use crate::coords::{ColorRgba, Vec2};

use super::GpuError;

new_key_type! {
    /// Handle to a compiled (or compiling) program.
    pub struct ProgramId;
    /// Handle to a texture.
    pub struct TextureId;
}

/// Capability tier of a context.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum FeatureLevel {
    /// Single colour target, 8-bit precision, synchronous compilation.
    Baseline,
    /// Multiple render targets with float attachments.
    Extended,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Capabilities {
    pub feature_level: FeatureLevel,
    /// `R16Float` can be rendered to.
    pub float_textures: bool,
    /// Float textures can be sampled with linear filtering.
    pub float_linear_filtering: bool,
    /// Program completion can be polled without blocking.
    pub parallel_compile: bool,
}

impl Capabilities {
    pub const BASELINE: Capabilities = Capabilities {
        feature_level: FeatureLevel::Baseline,
        float_textures: false,
        float_linear_filtering: false,
        parallel_compile: false,
    };

    /// Applies startup overrides. Overrides only ever lower capabilities.
    pub fn restricted(self, force_baseline: bool, disable_float_textures: bool) -> Capabilities {
        if force_baseline || self.feature_level == FeatureLevel::Baseline {
            return Capabilities::BASELINE;
        }
        if disable_float_textures {
            return Capabilities {
                float_textures: false,
                float_linear_filtering: false,
                ..self
            };
        }
        self
    }

    /// Distance is written to a separate float target instead of colour alpha.
    #[inline]
    pub fn separate_distance_target(&self) -> bool {
        self.feature_level == FeatureLevel::Extended && self.float_textures
    }
}

/// Adapter description reported into insights.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareInfo {
    pub adapter: String,
    pub vendor: String,
    pub backend: String,
}

/// Static facts about a context, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub capabilities: Capabilities,
    pub hardware: HardwareInfo,
    /// Largest width or height of a 2D texture.
    pub max_texture_dimension: u32,
}

/// Canvas dimensions as seen by the host window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CanvasSize {
    /// Size in logical pixels.
    pub logical: Vec2,
    /// Physical pixels per logical pixel.
    pub scale_factor: f32,
}

/// Shared context-loss flag.
///
/// Set by the backend (device lost callback, fatal surface errors) or by tests.
/// Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct ContextLossSignal(Arc<AtomicBool>);

impl ContextLossSignal {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn mark_lost(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_lost(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TexelFormat {
    Rgba8Unorm,
    R16Float,
}

impl TexelFormat {
    #[inline]
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TexelFormat::Rgba8Unorm => 4,
            TexelFormat::R16Float => 2,
        }
    }
}

/// Colour output of a program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ColorTarget {
    Texture(TexelFormat),
    Surface,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendMode {
    Replace,
    /// `src * src_alpha + dst`.
    Additive,
}

/// Everything a backend needs to build one program.
///
/// Binding contract: group 0 holds [`GlobalUniforms`] at binding 0, a sampler at
/// binding 1 and `texture_count` 2D float textures from binding 2. Group 1 holds
/// the per-tile uniform block at binding 0 (dynamic offset).
#[derive(Debug, Copy, Clone)]
pub struct ProgramSource<'a> {
    pub label: &'a str,
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub texture_count: u32,
    pub targets: &'a [ColorTarget],
    pub blend: BlendMode,
}

/// Compiler output for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileMessage {
    pub stage: ShaderStage,
    /// 1-based line in the submitted source.
    pub line: Option<u32>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStatus {
    Pending,
    Ready,
    Failed(Vec<CompileMessage>),
    /// Both stages compiled but the pipeline could not be built from them.
    LinkFailed(String),
}

#[derive(Debug, Copy, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: TexelFormat,
    /// Usable as a colour attachment in addition to sampling.
    pub render_target: bool,
}

/// Scissor rectangle in target pixels, origin top-left.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-pass uniforms at group 0, binding 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    /// NDC → aspect-corrected NDC, the space drawables are serialized in.
    pub square_to_aspect: [f32; 2],
    /// Target size in pixels.
    pub target_size: [f32; 2],
    pub ambient_light: [f32; 4],
    pub background: [f32; 4],
    /// Starting value of the closest-distance search; negative for inverted worlds.
    pub max_min_distance: f32,
    pub world_length_to_ndc: f32,
    /// One target pixel in aspect-corrected NDC.
    pub pixel_size: f32,
    pub soft_shadows: f32,
}

#[derive(Debug, Copy, Clone)]
pub enum PassTarget<'a> {
    Textures(&'a [TextureId]),
    Surface,
}

/// One tile: a program restricted to a scissor rectangle with its uniform block.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDraw {
    pub program: ProgramId,
    pub scissor: PixelRect,
    pub block: Vec<[f32; 4]>,
}

#[derive(Debug, Clone)]
pub struct PassRequest<'a> {
    pub label: &'a str,
    pub target: PassTarget<'a>,
    pub clear: ColorRgba,
    pub globals: GlobalUniforms,
    pub textures: &'a [TextureId],
    pub draws: Vec<TileDraw>,
}

/// Abstraction over the rendering device.
///
/// Resources are handle based; a handle from one context is meaningless on
/// another. Once the context is lost every call returns [`GpuError::ContextLost`]
/// and destroy calls become no-ops.
pub trait GpuContext {
    fn info(&self) -> &ContextInfo;

    fn loss_signal(&self) -> &ContextLossSignal;

    #[inline]
    fn is_lost(&self) -> bool {
        self.loss_signal().is_lost()
    }

    /// Flags the context as lost, as the platform would.
    fn simulate_loss(&self) {
        log::warn!("simulating GPU context loss");
        self.loss_signal().mark_lost();
    }

    fn canvas(&self) -> CanvasSize;

    /// Reconfigures the presentation surface; no-op when unchanged.
    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), GpuError>;

    /// Starts compiling a program. Completion is observed through
    /// [`GpuContext::program_status`].
    fn create_program(&mut self, source: &ProgramSource<'_>) -> Result<ProgramId, GpuError>;

    /// Requests linking once both stages compile.
    fn link_program(&mut self, program: ProgramId) -> Result<(), GpuError>;

    /// Non-blocking when the context supports parallel compilation; otherwise the
    /// status is resolved before returning.
    fn program_status(&mut self, program: ProgramId) -> Result<ProgramStatus, GpuError>;

    fn destroy_program(&mut self, program: ProgramId);

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<TextureId, GpuError>;

    /// Replaces the whole texture contents; `data` is tightly packed rows.
    fn write_texture(&mut self, texture: TextureId, data: &[u8]) -> Result<(), GpuError>;

    fn destroy_texture(&mut self, texture: TextureId);

    fn begin_frame(&mut self) -> Result<(), GpuError>;

    fn submit_pass(&mut self, pass: PassRequest<'_>) -> Result<(), GpuError>;

    fn end_frame(&mut self) -> Result<(), GpuError>;
}
