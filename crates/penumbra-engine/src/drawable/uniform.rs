use std::collections::HashMap;

use crate::coords::{ColorRgba, Vec2};
use crate::renderer::ConfigError;

use super::DrawableDescriptor;

/// One serialized field value.
///
/// Every value occupies a full `vec4<f32>` slot in the uniform block; shaders read
/// `.x`, `.xy`, `.xyz` or the whole element.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    pub const ZERO: UniformValue = UniformValue::Vec4([0.0; 4]);

    #[inline]
    pub fn to_vec4(self) -> [f32; 4] {
        match self {
            UniformValue::Float(x) => [x, 0.0, 0.0, 0.0],
            UniformValue::Vec2([x, y]) => [x, y, 0.0, 0.0],
            UniformValue::Vec3([x, y, z]) => [x, y, z, 0.0],
            UniformValue::Vec4(v) => v,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2([v.x, v.y])
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<ColorRgba> for UniformValue {
    fn from(c: ColorRgba) -> Self {
        UniformValue::Vec4(c.to_array())
    }
}

/// Field name → value pairs produced by [`super::Drawable::serialize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(&'static str, UniformValue)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value for the same field.
    pub fn with(mut self, name: &'static str, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<UniformValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

/// Column-major uniform data for one tile.
///
/// Each binding name owns one column; drawables of the same type append to the
/// same columns in draw order.
#[derive(Debug, Default)]
pub struct UniformArrays {
    columns: HashMap<String, Vec<[f32; 4]>>,
}

impl UniformArrays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one drawable's fields to the descriptor's columns.
    pub fn push(&mut self, descriptor: &DrawableDescriptor, fields: &Fields) -> Result<(), ConfigError> {
        for mapping in descriptor.uniforms() {
            let value = fields.get(&mapping.field).ok_or_else(|| ConfigError::MissingField {
                key: descriptor.key().to_string(),
                field: mapping.field.clone(),
            })?;
            self.columns
                .entry(mapping.binding.clone())
                .or_default()
                .push(value.to_vec4());
        }
        Ok(())
    }

    /// Number of drawables of this type, read from the length of its first column.
    pub fn count(&self, descriptor: &DrawableDescriptor) -> usize {
        descriptor
            .uniforms()
            .first()
            .and_then(|m| self.columns.get(&m.binding))
            .map_or(0, Vec::len)
    }

    pub fn column(&self, binding: &str) -> &[[f32; 4]] {
        self.columns.get(binding).map_or(&[], Vec::as_slice)
    }

    /// Pads every column of `descriptor` with `padding` up to `capacity`, or truncates
    /// it down to `capacity`. Returns the number of drawables dropped.
    pub fn fit(&mut self, descriptor: &DrawableDescriptor, capacity: usize, padding: &Fields) -> usize {
        let dropped = self.count(descriptor).saturating_sub(capacity);
        for mapping in descriptor.uniforms() {
            let pad = padding
                .get(&mapping.field)
                .unwrap_or(UniformValue::ZERO)
                .to_vec4();
            let column = self.columns.entry(mapping.binding.clone()).or_default();
            column.resize(capacity, pad);
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.columns.values_mut().for_each(Vec::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::test_support::{dot_descriptor, Dot};
    use crate::drawable::{Drawable, SerializeCtx};

    #[test]
    fn values_pad_to_vec4() {
        assert_eq!(UniformValue::from(2.0).to_vec4(), [2.0, 0.0, 0.0, 0.0]);
        assert_eq!(UniformValue::from(Vec2::new(1.0, 2.0)).to_vec4(), [1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn fields_overwrite_by_name() {
        let f = Fields::new().with("r", 1.0).with("r", 3.0);
        assert_eq!(f.get("r"), Some(UniformValue::Float(3.0)));
    }

    #[test]
    fn drawables_accumulate_into_columns() {
        let desc = dot_descriptor(&[0, 2]);
        let ctx = SerializeCtx::identity();
        let mut arrays = UniformArrays::new();
        for r in [1.0, 2.0, 3.0] {
            arrays.push(&desc, &Dot::new(0.0, 0.0, r).serialize(&ctx)).unwrap();
        }
        assert_eq!(arrays.count(&desc), 3);
        assert_eq!(arrays.column("dotRadii")[2][0], 3.0);
    }

    #[test]
    fn fit_pads_and_truncates() {
        let desc = dot_descriptor(&[0, 4]);
        let ctx = SerializeCtx::identity();
        let padding = desc.padding_fields();
        let mut arrays = UniformArrays::new();
        arrays.push(&desc, &Dot::new(0.0, 0.0, 1.0).serialize(&ctx)).unwrap();

        assert_eq!(arrays.fit(&desc, 4, &padding), 0);
        assert_eq!(arrays.column("dotCenters").len(), 4);
        assert_eq!(arrays.column("dotRadii").len(), 4);

        assert_eq!(arrays.fit(&desc, 1, &padding), 3);
        assert_eq!(arrays.count(&desc), 1);
    }

    #[test]
    fn missing_field_is_reported() {
        let desc = dot_descriptor(&[0, 1]);
        let mut arrays = UniformArrays::new();
        let err = arrays.push(&desc, &Fields::new().with("center", Vec2::zero())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }
}
