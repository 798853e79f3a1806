use std::sync::Arc;

use winit::event::WindowEvent;
use winit::window::Window;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract hosted by [`crate::window::Runtime`].
pub trait App {
    /// Called once the window exists, before the first frame. GPU contexts are
    /// created here; an error ends the run.
    fn on_start(&mut self, window: Arc<Window>) -> anyhow::Result<()>;

    /// Called for window events.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called once per redraw.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> AppControl;
}
