//! Drawable types and their registration records.
//!
//! A drawable type is described once by a [`DrawableDescriptor`]: the WGSL it
//! contributes, how its fields map to uniform arrays, and which array capacities
//! get precompiled. Instances implement [`Drawable`] and are serialized per tile
//! into [`UniformArrays`].

mod descriptor;
mod registry;
mod uniform;

pub use descriptor::{
    Drawable, DrawableDescriptor, DrawableKind, SerializeCtx, ShaderFragment, UniformMapping,
};
pub(crate) use descriptor::is_identifier;
pub use registry::{DescriptorSet, PassKind};
pub use uniform::{Fields, UniformArrays, UniformValue};

#[cfg(test)]
pub(crate) mod test_support {
    //! Minimal drawable types used across the crate's tests.

    use super::*;
    use crate::coords::Vec2;

    pub const DOT_WGSL: &str = "
fn dot_min_distance(p: vec2<f32>, color_index: ptr<function, f32>) -> f32 {
    var best = 1000.0;
    for (var i = 0u; i < DOT_COUNT; i = i + 1u) {
        let d = length(p - drawables.dotCenters[i].xy) - drawables.dotRadii[i].x;
        if (d < best) {
            best = d;
            *color_index = 1.0;
        }
    }
    return best;
}
";

    pub const GLOW_WGSL: &str = "
fn glow_contribution(p: vec2<f32>, surface_distance: f32) -> vec3<f32> {
    var light = vec3<f32>(0.0);
    for (var i = 0u; i < GLOW_COUNT; i = i + 1u) {
        let center = drawables.glowCenters[i].xy;
        let falloff = 1.0 / (1.0 + 40.0 * length(p - center));
        light = light + drawables.glowColors[i].rgb * falloff * shadow_factor(p, center);
    }
    return light;
}
";

    /// Circle shape keyed by its radius so tests can recognise it in uniform data.
    #[derive(Debug, Copy, Clone)]
    pub struct Dot {
        pub center: Vec2,
        pub radius: f32,
    }

    impl Dot {
        pub fn new(x: f32, y: f32, radius: f32) -> Self {
            Self { center: Vec2::new(x, y), radius }
        }
    }

    impl Drawable for Dot {
        fn descriptor_key(&self) -> &str {
            "DOT_COUNT"
        }

        fn min_distance(&self, point: Vec2) -> f32 {
            point.distance(self.center) - self.radius
        }

        fn serialize(&self, ctx: &SerializeCtx) -> Fields {
            Fields::new()
                .with("center", ctx.point(self.center))
                .with("radius", ctx.length(self.radius))
        }
    }

    #[derive(Debug, Copy, Clone)]
    pub struct Glow {
        pub center: Vec2,
        pub intensity: f32,
    }

    impl Glow {
        pub fn new(x: f32, y: f32, intensity: f32) -> Self {
            Self { center: Vec2::new(x, y), intensity }
        }
    }

    impl Drawable for Glow {
        fn descriptor_key(&self) -> &str {
            "GLOW_COUNT"
        }

        fn min_distance(&self, point: Vec2) -> f32 {
            point.distance(self.center)
        }

        fn serialize(&self, ctx: &SerializeCtx) -> Fields {
            Fields::new()
                .with("center", ctx.point(self.center))
                .with("color", [self.intensity * ctx.lightness, 0.0, 0.0])
        }

        fn position(&self) -> Option<Vec2> {
            Some(self.center)
        }
    }

    pub fn dot_descriptor(steps: &[usize]) -> DrawableDescriptor {
        DrawableDescriptor::new(
            "DOT_COUNT",
            DrawableKind::Shape {
                fragment: ShaderFragment::new(DOT_WGSL, "dot_min_distance"),
                inverted: false,
            },
            [("center", "dotCenters"), ("radius", "dotRadii")],
            steps,
            Dot::new(0.0, 0.0, 0.0),
        )
        .unwrap()
    }

    pub fn glow_descriptor(steps: &[usize]) -> DrawableDescriptor {
        DrawableDescriptor::new(
            "GLOW_COUNT",
            DrawableKind::Light {
                fragment: ShaderFragment::new(GLOW_WGSL, "glow_contribution"),
            },
            [("center", "glowCenters"), ("color", "glowColors")],
            steps,
            Glow::new(0.0, 0.0, 0.0),
        )
        .unwrap()
    }
}
