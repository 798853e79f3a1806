//! The demo's drawable types: filled circles and point lights.

use penumbra_engine::coords::{ColorRgba, Vec2};
use penumbra_engine::renderer::ConfigError;
use penumbra_engine::{Drawable, DrawableDescriptor, DrawableKind, Fields, SerializeCtx, ShaderFragment};

const CIRCLE_WGSL: &str = "
fn circle_min_distance(p: vec2<f32>, color_index: ptr<function, f32>) -> f32 {
    var best = 1000.0;
    for (var i = 0u; i < CIRCLE_COUNT; i = i + 1u) {
        let d = length(p - drawables.circleCenters[i].xy) - drawables.circleRadii[i].x;
        if (d < best) {
            best = d;
            *color_index = drawables.circleColors[i].x;
        }
    }
    return best;
}
";

const CIRCLE_LIGHT_WGSL: &str = "
fn circle_light_contribution(p: vec2<f32>, surface_distance: f32) -> vec3<f32> {
    var light = vec3<f32>(0.0);
    for (var i = 0u; i < CIRCLE_LIGHT_COUNT; i = i + 1u) {
        let center = drawables.circleLightCenters[i].xy;
        let d = length(p - center);
        let falloff = 1.0 / (1.0 + drawables.circleLightFalloffs[i].x * d * d);
        light = light + drawables.circleLightColors[i].rgb * falloff * shadow_factor(p, center);
    }
    return light;
}
";

#[derive(Debug, Copy, Clone)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
    /// Index into the colour palette.
    pub color: u32,
}

impl Drawable for Circle {
    fn descriptor_key(&self) -> &str {
        "CIRCLE_COUNT"
    }

    fn min_distance(&self, point: Vec2) -> f32 {
        point.distance(self.center) - self.radius
    }

    fn serialize(&self, ctx: &SerializeCtx) -> Fields {
        Fields::new()
            .with("center", ctx.point(self.center))
            .with("radius", ctx.length(self.radius))
            .with("color", self.color as f32)
    }
}

impl Circle {
    pub fn descriptor() -> Result<DrawableDescriptor, ConfigError> {
        DrawableDescriptor::new(
            "CIRCLE_COUNT",
            DrawableKind::Shape {
                fragment: ShaderFragment::new(CIRCLE_WGSL, "circle_min_distance"),
                inverted: false,
            },
            [("center", "circleCenters"), ("radius", "circleRadii"), ("color", "circleColors")],
            [0, 1, 2, 4, 8, 16],
            Circle {
                center: Vec2::zero(),
                radius: 0.0,
                color: 0,
            },
        )
    }
}

#[derive(Debug, Copy, Clone)]
pub struct CircleLight {
    pub center: Vec2,
    pub color: ColorRgba,
    /// Quadratic falloff per squared NDC unit.
    pub falloff: f32,
}

impl Drawable for CircleLight {
    fn descriptor_key(&self) -> &str {
        "CIRCLE_LIGHT_COUNT"
    }

    fn min_distance(&self, point: Vec2) -> f32 {
        point.distance(self.center)
    }

    fn serialize(&self, ctx: &SerializeCtx) -> Fields {
        let c = self.color;
        let l = ctx.lightness;
        Fields::new()
            .with("center", ctx.point(self.center))
            .with("color", [c.r * l, c.g * l, c.b * l])
            .with("falloff", self.falloff)
    }

    fn position(&self) -> Option<Vec2> {
        Some(self.center)
    }
}

impl CircleLight {
    pub fn descriptor() -> Result<DrawableDescriptor, ConfigError> {
        DrawableDescriptor::new(
            "CIRCLE_LIGHT_COUNT",
            DrawableKind::Light {
                fragment: ShaderFragment::new(CIRCLE_LIGHT_WGSL, "circle_light_contribution"),
            },
            [
                ("center", "circleLightCenters"),
                ("color", "circleLightColors"),
                ("falloff", "circleLightFalloffs"),
            ],
            [0, 1, 2, 4],
            CircleLight {
                center: Vec2::zero(),
                color: ColorRgba::black(),
                falloff: 0.0,
            },
        )
    }
}
