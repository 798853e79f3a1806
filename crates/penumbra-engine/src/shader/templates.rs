//! WGSL templates for the two tile passes.
//!
//! Both passes share the fullscreen vertex stage. Fragment templates leave the
//! variant pieces (`macroDefinitions`, `uniformFields`, `declarations`,
//! `functionCalls`) and the capability dependent pieces as placeholders.

use crate::coords::ColorRgba;
use crate::device::{BlendMode, Capabilities, ColorTarget, TexelFormat};

use super::{ProgramTemplate, Substitutions, float_literal};

const COMMON_WGSL: &str = include_str!("shaders/common.wgsl");
const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");
const DISTANCE_WGSL: &str = include_str!("shaders/distance.wgsl");
const LIGHTING_WGSL: &str = include_str!("shaders/lighting.wgsl");

const EXTENDED_OUTPUT: &str = "struct FragmentOutput {
    @location(0) color: vec4<f32>,
    @location(1) sdf: vec4<f32>,
}

fn encode_output(color: vec4<f32>, d: f32) -> FragmentOutput {
    var out: FragmentOutput;
    out.color = color;
    out.sdf = vec4<f32>(d, 0.0, 0.0, 0.0);
    return out;
}";

const BASELINE_OUTPUT: &str = "struct FragmentOutput {
    @location(0) color: vec4<f32>,
}

fn encode_output(color: vec4<f32>, d: f32) -> FragmentOutput {
    var out: FragmentOutput;
    out.color = vec4<f32>(color.rgb, clamp(d * 0.5 + 0.5, 0.0, 1.0));
    return out;
}";

const EXTENDED_DISTANCE_SAMPLE: &str =
    "textureSampleLevel(distance_texture, input_sampler, uv, 0.0).r";
const BASELINE_DISTANCE_SAMPLE: &str =
    "(textureSampleLevel(color_texture, input_sampler, uv, 0.0).a * 2.0 - 1.0)";

const DISTANCE_COLOR: TexelFormat = TexelFormat::Rgba8Unorm;
const DISTANCE_DEPTH: TexelFormat = TexelFormat::R16Float;

/// Render target formats of the distance pass.
pub fn distance_targets(capabilities: &Capabilities) -> Vec<TexelFormat> {
    if capabilities.separate_distance_target() {
        vec![DISTANCE_COLOR, DISTANCE_DEPTH]
    } else {
        vec![DISTANCE_COLOR]
    }
}

fn texture_binding(binding: u32, name: &str) -> String {
    format!("@group(0) @binding({binding}) var {name}: texture_2d<f32>;\n")
}

fn wgsl_color(color: ColorRgba) -> String {
    format!(
        "vec4<f32>({}, {}, {}, {})",
        float_literal(f64::from(color.r)),
        float_literal(f64::from(color.g)),
        float_literal(f64::from(color.b)),
        float_literal(f64::from(color.a)),
    )
}

/// Distance pass program: palette at binding 2, then one binding per auxiliary
/// texture in `texture_names` order.
pub fn distance_program(
    capabilities: &Capabilities,
    palette_size: u32,
    background: ColorRgba,
    texture_names: &[String],
) -> (ProgramTemplate, Substitutions) {
    let mut textures = texture_binding(2, "palette_texture");
    for (i, name) in texture_names.iter().enumerate() {
        textures.push_str(&texture_binding(3 + i as u32, name));
    }

    let separate = capabilities.separate_distance_target();
    let template = ProgramTemplate {
        label: "distance".into(),
        vertex: FULLSCREEN_WGSL,
        fragment: DISTANCE_WGSL,
        texture_count: 1 + texture_names.len() as u32,
        targets: distance_targets(capabilities)
            .into_iter()
            .map(ColorTarget::Texture)
            .collect(),
        blend: BlendMode::Replace,
    };
    let substitutions = Substitutions::new()
        .with("commonDeclarations", COMMON_WGSL)
        .with("textureDeclarations", textures)
        .with("paletteSize", palette_size)
        .with("backgroundColor", wgsl_color(background))
        .with(
            "fragmentOutput",
            if separate { EXTENDED_OUTPUT } else { BASELINE_OUTPUT },
        );

    (template, substitutions)
}

/// Lights pass program: reads the distance pass outputs, adds onto the surface.
pub fn lighting_program(
    capabilities: &Capabilities,
    shadow_trace_count: u32,
    light_penetration_ratio: f32,
) -> (ProgramTemplate, Substitutions) {
    let separate = capabilities.separate_distance_target();
    let mut textures = texture_binding(2, "color_texture");
    if separate {
        textures.push_str(&texture_binding(3, "distance_texture"));
    }

    let template = ProgramTemplate {
        label: "lights".into(),
        vertex: FULLSCREEN_WGSL,
        fragment: LIGHTING_WGSL,
        texture_count: if separate { 2 } else { 1 },
        targets: vec![ColorTarget::Surface],
        blend: BlendMode::Additive,
    };
    let substitutions = Substitutions::new()
        .with("commonDeclarations", COMMON_WGSL)
        .with("textureDeclarations", textures)
        .with("shadowTraceCount", shadow_trace_count)
        .with("lightPenetrationRatio", light_penetration_ratio)
        .with(
            "distanceSample",
            if separate {
                EXTENDED_DISTANCE_SAMPLE
            } else {
                BASELINE_DISTANCE_SAMPLE
            },
        );

    (template, substitutions)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::device::FeatureLevel;
    use crate::drawable::test_support::{dot_descriptor, glow_descriptor};
    use crate::shader::{substitute, variant_substitutions};

    fn extended() -> Capabilities {
        Capabilities {
            feature_level: FeatureLevel::Extended,
            float_textures: true,
            float_linear_filtering: false,
            parallel_compile: true,
        }
    }

    fn parse(label: &str, source: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|e| panic!("{label}: {}\n{source}", e.emit_to_string(source)));
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("{label}: {e:?}\n{source}"));
    }

    fn expand(template: &ProgramTemplate, base: &Substitutions, variant: &Substitutions) -> (String, String) {
        let mut subs = base.clone();
        subs.extend(variant);
        (
            substitute(template.vertex, &subs).unwrap(),
            substitute(template.fragment, &subs).unwrap(),
        )
    }

    #[test]
    fn generated_distance_variants_validate() {
        let shapes = vec![Arc::new(dot_descriptor(&[0, 2]))];
        for caps in [extended(), Capabilities::BASELINE] {
            let (template, base) = distance_program(
                &caps,
                256,
                ColorRgba::black(),
                &["noise".to_string()],
            );
            for counts in [[0], [2]] {
                let (vertex, fragment) = expand(&template, &base, &variant_substitutions(&shapes, &counts));
                parse("vertex", &vertex);
                parse("distance", &fragment);
            }
        }
    }

    #[test]
    fn generated_lighting_variants_validate() {
        let lights = vec![Arc::new(glow_descriptor(&[0, 1, 4]))];
        for caps in [extended(), Capabilities::BASELINE] {
            let (template, base) = lighting_program(&caps, 16, 0.1);
            for counts in [[0], [4]] {
                let (_, fragment) = expand(&template, &base, &variant_substitutions(&lights, &counts));
                parse("lights", &fragment);
            }
        }
    }

    #[test]
    fn texture_counts_follow_capabilities() {
        let (distance, _) = distance_program(&extended(), 256, ColorRgba::black(), &[]);
        assert_eq!(distance.targets.len(), 2);
        assert_eq!(distance.texture_count, 1);

        let (lights, _) = lighting_program(&Capabilities::BASELINE, 16, 0.1);
        assert_eq!(lights.texture_count, 1);
        assert_eq!(lights.targets, vec![ColorTarget::Surface]);
    }
}
