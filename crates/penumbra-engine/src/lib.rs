//! Penumbra engine crate.
//!
//! A 2D renderer that draws shapes and lights as signed distance fields:
//! - `drawable` declares drawable types and how they serialize to uniforms
//! - `shader` generates and compiles one program variant per count combination
//! - `render` culls drawables into screen tiles for the distance and lights passes
//! - `renderer` ties both passes together and survives context loss
//! - `quality` trades render scale for frame time

pub mod coords;
pub mod core;
pub mod device;
pub mod drawable;
pub mod logging;
pub mod quality;
pub mod render;
pub mod renderer;
pub mod shader;
pub mod time;
pub mod window;

pub use drawable::{Drawable, DrawableDescriptor, DrawableKind, Fields, SerializeCtx, ShaderFragment};
pub use renderer::{Renderer, RuntimeOverrides, StartupSettings, compile};
