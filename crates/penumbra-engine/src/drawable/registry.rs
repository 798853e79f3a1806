use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::renderer::ConfigError;

use super::DrawableDescriptor;

/// Which render pass a drawable type is routed to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PassKind {
    Distance,
    Lights,
}

/// Validated, immutable set of descriptors known to a renderer.
///
/// Routing is decided once here from each descriptor's kind.
#[derive(Debug, Default)]
pub struct DescriptorSet {
    shapes: Vec<Arc<DrawableDescriptor>>,
    lights: Vec<Arc<DrawableDescriptor>>,
    index: HashMap<String, (PassKind, usize)>,
}

impl DescriptorSet {
    pub fn new(descriptors: impl IntoIterator<Item = DrawableDescriptor>) -> Result<Self, ConfigError> {
        let mut set = Self::default();
        // Each pass compiles into one shader, so bindings must be unique per pass.
        let mut shape_bindings = HashSet::new();
        let mut light_bindings = HashSet::new();
        for descriptor in descriptors {
            if set.index.contains_key(descriptor.key()) {
                return Err(ConfigError::DuplicateDescriptor(descriptor.key().to_string()));
            }
            let bindings = if descriptor.kind().is_light() {
                &mut light_bindings
            } else {
                &mut shape_bindings
            };
            for mapping in descriptor.uniforms() {
                if !bindings.insert(mapping.binding.clone()) {
                    return Err(ConfigError::DuplicateBinding {
                        key: descriptor.key().to_string(),
                        binding: mapping.binding.clone(),
                    });
                }
            }

            let key = descriptor.key().to_string();
            let route = if descriptor.kind().is_light() {
                set.lights.push(Arc::new(descriptor));
                (PassKind::Lights, set.lights.len() - 1)
            } else {
                set.shapes.push(Arc::new(descriptor));
                (PassKind::Distance, set.shapes.len() - 1)
            };
            set.index.insert(key, route);
        }
        Ok(set)
    }

    pub fn shapes(&self) -> &[Arc<DrawableDescriptor>] {
        &self.shapes
    }

    pub fn lights(&self) -> &[Arc<DrawableDescriptor>] {
        &self.lights
    }

    /// Pass and per-pass descriptor index for a drawable key.
    pub fn route(&self, key: &str) -> Result<(PassKind, usize), ConfigError> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| ConfigError::UndeclaredDrawable(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::test_support::{Dot, dot_descriptor, glow_descriptor};
    use crate::drawable::{DrawableKind, ShaderFragment};

    #[test]
    fn routes_by_kind() {
        let set = DescriptorSet::new([dot_descriptor(&[0, 1]), glow_descriptor(&[0, 1])]).unwrap();
        assert_eq!(set.route("DOT_COUNT").unwrap(), (PassKind::Distance, 0));
        assert_eq!(set.route("GLOW_COUNT").unwrap(), (PassKind::Lights, 0));
        assert!(matches!(set.route("NOPE"), Err(ConfigError::UndeclaredDrawable(_))));
    }

    #[test]
    fn bindings_are_unique_within_a_pass() {
        let twin = DrawableDescriptor::new(
            "TWIN_COUNT",
            DrawableKind::Shape {
                fragment: ShaderFragment::new("", "twin_min_distance"),
                inverted: false,
            },
            [("center", "dotCenters")],
            [0, 1],
            Dot::new(0.0, 0.0, 0.0),
        )
        .unwrap();
        let err = DescriptorSet::new([dot_descriptor(&[0, 1]), twin]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateBinding {
                key: "TWIN_COUNT".into(),
                binding: "dotCenters".into(),
            }
        );

        // Lights compile into a separate program, so the same name is fine there.
        let lamp = DrawableDescriptor::new(
            "LAMP_COUNT",
            DrawableKind::Light {
                fragment: ShaderFragment::new("", "lamp_contribution"),
            },
            [("center", "dotCenters")],
            [0, 1],
            Dot::new(0.0, 0.0, 0.0),
        )
        .unwrap();
        assert!(DescriptorSet::new([dot_descriptor(&[0, 1]), lamp]).is_ok());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = DescriptorSet::new([dot_descriptor(&[0, 1]), dot_descriptor(&[0, 2])]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateDescriptor(_)));
    }
}
