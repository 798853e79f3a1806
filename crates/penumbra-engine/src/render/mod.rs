//! Tile-based render passes and the pieces they are built from.
//!
//! Conventions:
//! - world space is bottom-left origin, +Y up; drawables serialize into
//!   aspect-corrected NDC through [`ViewTransform`]
//! - both passes cut their target into a tile grid and draw one fullscreen
//!   program per tile restricted by a scissor rectangle
//! - per tile, the smallest precompiled variant that fits the culled drawables
//!   is used

mod distance_pass;
mod frame_buffer;
mod lights_pass;
mod pass;
mod program;
mod texture;
mod tiles;
mod uniforms;

pub use distance_pass::DistancePass;
pub use frame_buffer::FrameBuffer;
pub use lights_pass::{LightsPass, light_ratio};
pub use pass::{FrameUniforms, PassState, PassStats};
pub use program::{AutoScalingProgram, BoundProgram, PendingVariants, ProgramVariant};
pub use texture::{AuxTextures, PaletteTexture, TextureImage, palette_bytes};
pub use tiles::{MAX_TILE_MULTIPLIER, Tile, tile_grid};
pub use uniforms::ViewTransform;
