//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window and drives an [`crate::core::App`].
//! [`run_animation`] hosts a renderer with quality autoscaling on top of it.

mod animation;
mod runtime;

pub use animation::run_animation;
pub use runtime::{Runtime, RuntimeConfig};
