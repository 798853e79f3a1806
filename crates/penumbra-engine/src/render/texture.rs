use crate::coords::ColorRgba;
use crate::device::{GpuContext, GpuError, TexelFormat, TextureDesc, TextureId};
use crate::renderer::{ConfigError, RenderError};

/// Tightly packed RGBA8 image, rows bottom to top as sampled by UV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    /// 1×1 image of one colour.
    pub fn solid(color: ColorRgba) -> Self {
        Self::new(1, 1, color.to_rgba8().to_vec())
    }

    #[inline]
    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Palette as uploaded: entry `i` is texel `i`, unused entries transparent black.
pub fn palette_bytes(size: u32, colors: &[ColorRgba]) -> Vec<u8> {
    let mut bytes = vec![0u8; size as usize * 4];
    for (texel, color) in bytes.chunks_exact_mut(4).zip(colors) {
        texel.copy_from_slice(&color.to_rgba8());
    }
    bytes
}

/// `palette_size × 1` colour lookup sampled by shapes through `palette_color`.
#[derive(Debug)]
pub struct PaletteTexture {
    size: u32,
    id: Option<TextureId>,
}

impl PaletteTexture {
    pub fn new(size: u32) -> Self {
        Self {
            size: size.max(1),
            id: None,
        }
    }

    pub fn initialize(&mut self, ctx: &mut dyn GpuContext) -> Result<(), GpuError> {
        let id = ctx.create_texture(&TextureDesc {
            label: "palette",
            width: self.size,
            height: 1,
            format: TexelFormat::Rgba8Unorm,
            render_target: false,
        })?;
        self.id = Some(id);
        ctx.write_texture(id, &palette_bytes(self.size, &[]))
    }

    /// Colours past the palette size are ignored.
    pub fn set_palette(&mut self, ctx: &mut dyn GpuContext, colors: &[ColorRgba]) -> Result<(), GpuError> {
        if colors.len() > self.size as usize {
            log::warn!(
                "palette has {} colours, only the first {} are used",
                colors.len(),
                self.size
            );
        }
        let id = self.id.ok_or(GpuError::UnknownResource)?;
        ctx.write_texture(id, &palette_bytes(self.size, colors))
    }

    #[inline]
    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    pub fn destroy(&mut self, ctx: &mut dyn GpuContext) {
        if let Some(id) = self.id.take() {
            ctx.destroy_texture(id);
        }
    }
}

#[derive(Debug)]
struct AuxSlot {
    name: String,
    id: Option<TextureId>,
    size: (u32, u32),
}

/// User textures declared at startup, bound after the palette in declaration
/// order. Each starts as a 1×1 white placeholder.
#[derive(Debug)]
pub struct AuxTextures {
    slots: Vec<AuxSlot>,
}

impl AuxTextures {
    pub fn new(names: &[String]) -> Self {
        Self {
            slots: names
                .iter()
                .map(|name| AuxSlot {
                    name: name.clone(),
                    id: None,
                    size: (0, 0),
                })
                .collect(),
        }
    }

    pub fn initialize(&mut self, ctx: &mut dyn GpuContext) -> Result<(), GpuError> {
        let placeholder = TextureImage::solid(ColorRgba::white());
        for slot in &mut self.slots {
            upload(ctx, slot, &placeholder)?;
        }
        Ok(())
    }

    pub fn set(&mut self, ctx: &mut dyn GpuContext, name: &str, image: &TextureImage) -> Result<(), RenderError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::UndeclaredTexture(name.to_string()))?;
        if image.rgba.len() != image.expected_len() || image.width == 0 || image.height == 0 {
            return Err(ConfigError::TextureSize {
                name: name.to_string(),
                expected: image.expected_len(),
                actual: image.rgba.len(),
            }
            .into());
        }
        upload(ctx, slot, image)?;
        Ok(())
    }

    /// Texture handles in binding order; `None` before initialization.
    pub fn ids(&self) -> Option<Vec<TextureId>> {
        self.slots.iter().map(|s| s.id).collect()
    }

    pub fn destroy(&mut self, ctx: &mut dyn GpuContext) {
        for slot in &mut self.slots {
            if let Some(id) = slot.id.take() {
                ctx.destroy_texture(id);
            }
            slot.size = (0, 0);
        }
    }
}

fn upload(ctx: &mut dyn GpuContext, slot: &mut AuxSlot, image: &TextureImage) -> Result<(), GpuError> {
    let size = (image.width, image.height);
    let id = match slot.id {
        Some(id) if slot.size == size => id,
        current => {
            if let Some(old) = current {
                ctx.destroy_texture(old);
            }
            slot.id = None;
            let id = ctx.create_texture(&TextureDesc {
                label: &slot.name,
                width: image.width,
                height: image.height,
                format: TexelFormat::Rgba8Unorm,
                render_target: false,
            })?;
            slot.id = Some(id);
            slot.size = size;
            id
        }
    };
    ctx.write_texture(id, &image.rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{MockConfig, MockContext, MockJournal};

    #[test]
    fn palette_entries_are_texels() {
        let bytes = palette_bytes(4, &[ColorRgba::rgb(1.0, 0.0, 0.0), ColorRgba::white()]);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &[255, 0, 0, 255]);
        assert_eq!(&bytes[4..8], &[255, 255, 255, 255]);
        assert_eq!(&bytes[8..16], &[0; 8]);
        assert_eq!(palette_bytes(1, &[ColorRgba::white(), ColorRgba::black()]).len(), 4);
    }

    #[test]
    fn aux_textures_validate_name_and_size() {
        let journal = MockJournal::shared();
        let mut ctx = MockContext::new(MockConfig::default(), journal.clone());
        let mut aux = AuxTextures::new(&["noise".to_string()]);
        aux.initialize(&mut ctx).unwrap();
        assert_eq!(journal.borrow().textures_created.len(), 1);

        let err = aux
            .set(&mut ctx, "grass", &TextureImage::solid(ColorRgba::white()))
            .unwrap_err();
        assert!(matches!(err, RenderError::Config(ConfigError::UndeclaredTexture(_))));

        let err = aux
            .set(&mut ctx, "noise", &TextureImage::new(2, 2, vec![0; 4]))
            .unwrap_err();
        assert!(matches!(err, RenderError::Config(ConfigError::TextureSize { expected: 16, .. })));

        aux.set(&mut ctx, "noise", &TextureImage::new(2, 2, vec![0; 16])).unwrap();
        assert_eq!(journal.borrow().textures_created.len(), 2);
        assert_eq!(journal.borrow().textures_destroyed, 1);
        // Same size reuses the texture.
        aux.set(&mut ctx, "noise", &TextureImage::new(2, 2, vec![9; 16])).unwrap();
        assert_eq!(journal.borrow().textures_created.len(), 2);
        assert_eq!(aux.ids().map(|ids| ids.len()), Some(1));
    }
}
