//! Contracts between the window runtime and the code it hosts.
//!
//! The runtime owns the platform loop; apps only see the window handle at
//! startup and a per-frame context afterwards.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::FrameCtx;
