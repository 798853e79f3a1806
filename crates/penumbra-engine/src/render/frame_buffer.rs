use crate::device::{CanvasSize, GpuContext, GpuError, PassTarget, TexelFormat, TextureDesc, TextureId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backing {
    /// The presentation surface.
    Surface,
    /// Offscreen textures, one per format, sampled by a later pass.
    Intermediate {
        formats: Vec<TexelFormat>,
        textures: Vec<TextureId>,
    },
}

/// Render target of one pass, sized from the canvas.
///
/// Size is `floor(logical canvas × render scale × device pixel ratio)`, the
/// pixel ratio only applying with high-DPI rendering enabled.
#[derive(Debug)]
pub struct FrameBuffer {
    label: &'static str,
    backing: Backing,
    render_scale: f32,
    enable_high_dpi: bool,
    size: (u32, u32),
}

impl FrameBuffer {
    pub fn surface(label: &'static str) -> Self {
        Self::with_backing(label, Backing::Surface)
    }

    pub fn intermediate(label: &'static str, formats: Vec<TexelFormat>) -> Self {
        Self::with_backing(
            label,
            Backing::Intermediate {
                formats,
                textures: Vec::new(),
            },
        )
    }

    fn with_backing(label: &'static str, backing: Backing) -> Self {
        Self {
            label,
            backing,
            render_scale: 1.0,
            enable_high_dpi: false,
            size: (0, 0),
        }
    }

    pub fn set_render_scale(&mut self, scale: f32) {
        if scale.is_finite() && scale > 0.0 {
            self.render_scale = scale;
        }
    }

    #[inline]
    pub fn render_scale(&self) -> f32 {
        self.render_scale
    }

    pub fn set_high_dpi(&mut self, enabled: bool) {
        self.enable_high_dpi = enabled;
    }

    /// Pixel size for `canvas` under the current settings.
    pub fn target_size(&self, canvas: CanvasSize) -> (u32, u32) {
        let dpr = if self.enable_high_dpi { canvas.scale_factor } else { 1.0 };
        let scale = self.render_scale * dpr;
        let side = |logical: f32| ((logical * scale).floor() as u32).max(1);
        (side(canvas.logical.x), side(canvas.logical.y))
    }

    /// Resizes the backing storage. Returns whether anything changed.
    pub fn set_size(&mut self, ctx: &mut dyn GpuContext, canvas: CanvasSize) -> Result<bool, GpuError> {
        let size = self.target_size(canvas);
        let allocated = match &self.backing {
            Backing::Surface => true,
            Backing::Intermediate { textures, .. } => !textures.is_empty(),
        };
        if size == self.size && allocated {
            return Ok(false);
        }

        match &mut self.backing {
            Backing::Surface => ctx.resize_surface(size.0, size.1)?,
            Backing::Intermediate { formats, textures } => {
                for id in textures.drain(..) {
                    ctx.destroy_texture(id);
                }
                for format in formats.iter() {
                    let id = ctx.create_texture(&TextureDesc {
                        label: self.label,
                        width: size.0,
                        height: size.1,
                        format: *format,
                        render_target: true,
                    })?;
                    textures.push(id);
                }
            }
        }

        log::debug!("{} frame buffer resized to {}x{}", self.label, size.0, size.1);
        self.size = size;
        Ok(true)
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Offscreen textures in format order; empty for the surface.
    pub fn textures(&self) -> &[TextureId] {
        match &self.backing {
            Backing::Surface => &[],
            Backing::Intermediate { textures, .. } => textures,
        }
    }

    pub fn target(&self) -> PassTarget<'_> {
        match &self.backing {
            Backing::Surface => PassTarget::Surface,
            Backing::Intermediate { textures, .. } => PassTarget::Textures(textures),
        }
    }

    pub fn destroy(&mut self, ctx: &mut dyn GpuContext) {
        if let Backing::Intermediate { textures, .. } = &mut self.backing {
            for id in textures.drain(..) {
                ctx.destroy_texture(id);
            }
        }
        self.size = (0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::device::mock::{MockConfig, MockContext, MockJournal};

    fn canvas(w: f32, h: f32, dpr: f32) -> CanvasSize {
        CanvasSize {
            logical: Vec2::new(w, h),
            scale_factor: dpr,
        }
    }

    #[test]
    fn size_follows_scale_and_dpi() {
        let mut fb = FrameBuffer::surface("lights");
        fb.set_render_scale(0.3);
        assert_eq!(fb.target_size(canvas(801.0, 600.0, 2.0)), (240, 180));
        fb.set_high_dpi(true);
        assert_eq!(fb.target_size(canvas(801.0, 600.0, 2.0)), (480, 360));
        fb.set_render_scale(0.0);
        assert_eq!(fb.render_scale(), 0.3);
    }

    #[test]
    fn resize_is_idempotent() {
        let journal = MockJournal::shared();
        let mut ctx = MockContext::new(MockConfig::default(), journal.clone());
        let mut fb = FrameBuffer::intermediate(
            "distance",
            vec![TexelFormat::Rgba8Unorm, TexelFormat::R16Float],
        );

        assert!(fb.set_size(&mut ctx, canvas(320.0, 200.0, 1.0)).unwrap());
        assert!(!fb.set_size(&mut ctx, canvas(320.0, 200.0, 1.0)).unwrap());
        assert_eq!(journal.borrow().textures_created.len(), 2);
        assert_eq!(fb.textures().len(), 2);

        assert!(fb.set_size(&mut ctx, canvas(640.0, 200.0, 1.0)).unwrap());
        assert_eq!(journal.borrow().textures_created.len(), 4);
        assert_eq!(journal.borrow().textures_destroyed, 2);

        fb.destroy(&mut ctx);
        assert_eq!(journal.borrow().textures_destroyed, 4);
        assert!(fb.textures().is_empty());
    }

    #[test]
    fn surface_resizes_once_per_change() {
        let journal = MockJournal::shared();
        let mut ctx = MockContext::new(MockConfig::default(), journal.clone());
        let mut fb = FrameBuffer::surface("lights");
        fb.set_size(&mut ctx, canvas(100.0, 50.0, 1.0)).unwrap();
        fb.set_size(&mut ctx, canvas(100.0, 50.0, 1.0)).unwrap();
        assert_eq!(journal.borrow().surface_sizes, vec![(100, 50)]);
    }
}
