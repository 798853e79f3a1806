//! Coordinate and geometry types shared across the engine.
//!
//! Spaces:
//! - World: origin bottom-left, +X right, +Y up, arbitrary units
//! - NDC: the view mapped so its longer edge spans [-1, 1], centred on the origin
//! - Display: logical pixels, origin top-left, +Y down

mod color;
mod rect;
mod transform;
mod vec2;

pub use color::ColorRgba;
pub use rect::Rect;
pub use transform::Transform2d;
pub use vec2::Vec2;
