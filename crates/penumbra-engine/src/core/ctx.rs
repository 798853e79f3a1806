use winit::window::Window;

use crate::time::FrameTime;

/// Per-frame context passed to [`super::App::on_frame`].
pub struct FrameCtx<'a> {
    pub window: &'a Window,
    pub time: FrameTime,
}
