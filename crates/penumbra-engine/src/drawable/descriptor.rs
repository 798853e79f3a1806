use std::collections::HashSet;
use std::fmt;

use crate::coords::{Transform2d, Vec2};
use crate::renderer::ConfigError;

use super::Fields;

/// Conversion parameters handed to [`Drawable::serialize`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SerializeCtx {
    /// World → NDC transform for positions.
    pub transform: Transform2d,
    /// World length → NDC length factor.
    pub scale: f32,
    /// Light attenuation for the current tile in [0, 1]; 1 for shapes.
    pub lightness: f32,
}

impl SerializeCtx {
    pub const fn identity() -> Self {
        Self {
            transform: Transform2d::IDENTITY,
            scale: 1.0,
            lightness: 1.0,
        }
    }

    /// Context used to serialize the empty instance into padding slots.
    pub const fn padding() -> Self {
        Self {
            transform: Transform2d::IDENTITY,
            scale: 0.0,
            lightness: 0.0,
        }
    }

    #[inline]
    pub fn point(&self, p: Vec2) -> Vec2 {
        self.transform.transform_point(p)
    }

    #[inline]
    pub fn length(&self, l: f32) -> f32 {
        l * self.scale
    }
}

/// A shape or light instance submitted for one frame.
pub trait Drawable {
    /// Key of the descriptor this drawable belongs to (its count macro name).
    fn descriptor_key(&self) -> &str;

    /// Lower bound of the world-space distance from `point` to this drawable.
    ///
    /// Culling relies on the bound never overestimating.
    fn min_distance(&self, point: Vec2) -> f32;

    /// Writes the drawable's fields in NDC space.
    fn serialize(&self, ctx: &SerializeCtx) -> Fields;

    /// World position of a light source, used for per-tile falloff.
    fn position(&self) -> Option<Vec2> {
        None
    }
}

/// Shader code contributed by one drawable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFragment {
    /// WGSL declarations; placeholders such as `{paletteSize}` are substituted.
    pub source: String,
    /// Entry function called once per pixel.
    ///
    /// Shapes: `fn(p: vec2<f32>, color_index: ptr<function, f32>) -> f32`.
    /// Lights: `fn(p: vec2<f32>, surface_distance: f32) -> vec3<f32>`.
    pub function: String,
}

impl ShaderFragment {
    pub fn new(source: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            function: function.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawableKind {
    /// Contributes to the distance field. Inverted shapes carve space out of a
    /// filled world and win on larger distances.
    Shape { fragment: ShaderFragment, inverted: bool },
    /// Contributes light in the lighting pass.
    Light { fragment: ShaderFragment },
}

impl DrawableKind {
    pub fn fragment(&self) -> &ShaderFragment {
        match self {
            DrawableKind::Shape { fragment, .. } | DrawableKind::Light { fragment } => fragment,
        }
    }

    #[inline]
    pub fn is_light(&self) -> bool {
        matches!(self, DrawableKind::Light { .. })
    }
}

/// Maps a serialized field to the uniform array it is written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMapping {
    pub field: String,
    pub binding: String,
}

/// Registration record of a drawable type.
///
/// Built once before compilation and shared read-only afterwards.
pub struct DrawableDescriptor {
    key: String,
    kind: DrawableKind,
    uniforms: Vec<UniformMapping>,
    count_steps: Vec<usize>,
    empty: Box<dyn Drawable>,
}

impl DrawableDescriptor {
    /// Validates and builds a descriptor.
    ///
    /// `key` doubles as the count macro; `count_steps` must be strictly ascending
    /// and contain 0.
    pub fn new<'a>(
        key: impl Into<String>,
        kind: DrawableKind,
        uniforms: impl IntoIterator<Item = (&'a str, &'a str)>,
        count_steps: impl Into<Vec<usize>>,
        empty: impl Drawable + 'static,
    ) -> Result<Self, ConfigError> {
        let descriptor = Self {
            key: key.into(),
            kind,
            uniforms: uniforms
                .into_iter()
                .map(|(field, binding)| UniformMapping {
                    field: field.to_string(),
                    binding: binding.to_string(),
                })
                .collect(),
            count_steps: count_steps.into(),
            empty: Box::new(empty),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.key) {
            return Err(ConfigError::InvalidIdentifier(self.key.clone()));
        }
        if self.uniforms.is_empty() {
            return Err(ConfigError::NoUniforms(self.key.clone()));
        }
        let mut bindings = HashSet::new();
        for mapping in &self.uniforms {
            if !is_identifier(&mapping.binding) {
                return Err(ConfigError::InvalidIdentifier(mapping.binding.clone()));
            }
            if !bindings.insert(mapping.binding.as_str()) {
                return Err(ConfigError::DuplicateBinding {
                    key: self.key.clone(),
                    binding: mapping.binding.clone(),
                });
            }
        }
        if !self.count_steps.windows(2).all(|w| w[0] < w[1]) {
            return Err(ConfigError::UnsortedSteps(self.key.clone()));
        }
        if self.count_steps.first() != Some(&0) {
            return Err(ConfigError::MissingZeroStep(self.key.clone()));
        }
        Ok(())
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Name of the compile-time constant holding this type's array capacity.
    #[inline]
    pub fn count_macro(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn kind(&self) -> &DrawableKind {
        &self.kind
    }

    #[inline]
    pub fn uniforms(&self) -> &[UniformMapping] {
        &self.uniforms
    }

    #[inline]
    pub fn count_steps(&self) -> &[usize] {
        &self.count_steps
    }

    #[inline]
    pub fn max_count(&self) -> usize {
        self.count_steps.last().copied().unwrap_or(0)
    }

    /// Serialization of the empty instance, written into unused slots.
    pub fn padding_fields(&self) -> Fields {
        self.empty.serialize(&SerializeCtx::padding())
    }
}

impl fmt::Debug for DrawableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawableDescriptor")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("uniforms", &self.uniforms)
            .field("count_steps", &self.count_steps)
            .finish_non_exhaustive()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the placeholder and WGSL identifier shape.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
