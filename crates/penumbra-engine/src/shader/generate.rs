use std::fmt::Write as _;
use std::sync::Arc;

use crate::drawable::{DrawableDescriptor, DrawableKind};

use super::Substitutions;

/// Every combination of count steps, first descriptor varying fastest.
///
/// An empty descriptor list yields a single empty combination.
pub fn combinations(steps: &[&[usize]]) -> Vec<Vec<usize>> {
    if steps.iter().any(|s| s.is_empty()) {
        return Vec::new();
    }

    let mut counters = vec![0usize; steps.len()];
    let mut out = Vec::new();
    loop {
        out.push(counters.iter().zip(steps).map(|(&i, s)| s[i]).collect());

        let mut i = 0;
        loop {
            if i == steps.len() {
                return out;
            }
            counters[i] += 1;
            if counters[i] < steps[i].len() {
                break;
            }
            counters[i] = 0;
            i += 1;
        }
    }
}

/// Source pieces one drawable type adds to a program variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderContribution {
    pub macro_definition: String,
    pub uniform_fields: String,
    pub declaration: String,
    pub call_site: String,
}

/// Pieces for `descriptor` at array capacity `count`.
///
/// A zero count keeps only the capacity constant; the type's code and arrays are
/// left out of the variant entirely.
pub fn contribution(descriptor: &DrawableDescriptor, count: usize) -> ShaderContribution {
    let key = descriptor.count_macro();
    let macro_definition = format!("const {key}: u32 = {count}u;\n");

    if count == 0 {
        return ShaderContribution {
            macro_definition,
            ..ShaderContribution::default()
        };
    }

    let mut uniform_fields = String::new();
    for mapping in descriptor.uniforms() {
        let _ = writeln!(uniform_fields, "    {}: array<vec4<f32>, {key}>,", mapping.binding);
    }

    let fragment = descriptor.kind().fragment();
    let function = &fragment.function;
    let call_site = match descriptor.kind() {
        DrawableKind::Shape { inverted, .. } => {
            let wins = if *inverted { ">" } else { "<" };
            [
                "    {\n".to_string(),
                "        var candidate_color = 0.0;\n".to_string(),
                format!("        let candidate = {function}(frag_pos, &candidate_color);\n"),
                format!("        if (candidate {wins} min_distance) {{\n"),
                "            min_distance = candidate;\n".to_string(),
                "            color = palette_color(candidate_color);\n".to_string(),
                "        }\n".to_string(),
                "    }\n".to_string(),
            ]
            .concat()
        }
        DrawableKind::Light { .. } => {
            format!("    lighting = lighting + {function}(frag_pos, surface_distance);\n")
        }
    };

    ShaderContribution {
        macro_definition,
        uniform_fields,
        declaration: format!("{}\n", fragment.source.trim_end()),
        call_site,
    }
}

/// Substitutions describing one variant: `macroDefinitions`, `uniformFields`,
/// `declarations` and `functionCalls`, in descriptor order.
pub fn variant_substitutions(descriptors: &[Arc<DrawableDescriptor>], counts: &[usize]) -> Substitutions {
    debug_assert_eq!(descriptors.len(), counts.len());

    let mut merged = ShaderContribution::default();
    for (descriptor, &count) in descriptors.iter().zip(counts) {
        let c = contribution(descriptor, count);
        merged.macro_definition.push_str(&c.macro_definition);
        merged.uniform_fields.push_str(&c.uniform_fields);
        merged.declaration.push_str(&c.declaration);
        merged.call_site.push_str(&c.call_site);
    }
    if merged.uniform_fields.is_empty() {
        // Uniform structs may not be empty.
        merged.uniform_fields.push_str("    _padding: vec4<f32>,\n");
    }

    Substitutions::new()
        .with("macroDefinitions", merged.macro_definition)
        .with("uniformFields", merged.uniform_fields)
        .with("declarations", merged.declaration)
        .with("functionCalls", merged.call_site)
}

/// Length of a variant's uniform block in `vec4` elements.
pub fn block_len(descriptors: &[Arc<DrawableDescriptor>], capacities: &[usize]) -> usize {
    descriptors
        .iter()
        .zip(capacities)
        .map(|(d, &c)| d.uniforms().len() * c)
        .sum::<usize>()
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawable::test_support::{dot_descriptor, glow_descriptor};
    use crate::shader::SubstitutionValue;

    fn text(subs: &Substitutions, name: &str) -> String {
        match subs.get(name) {
            Some(SubstitutionValue::Text(t)) => t.clone(),
            other => panic!("{name}: {other:?}"),
        }
    }

    #[test]
    fn combination_count_is_product_of_step_counts() {
        let a: &[usize] = &[0, 1, 2];
        let b: &[usize] = &[0, 4];
        let c: &[usize] = &[0, 8, 16, 32];
        assert_eq!(combinations(&[a, b, c]).len(), 3 * 2 * 4);
    }

    #[test]
    fn first_index_varies_fastest() {
        let a: &[usize] = &[0, 1];
        let b: &[usize] = &[0, 5];
        assert_eq!(
            combinations(&[a, b]),
            vec![vec![0, 0], vec![1, 0], vec![0, 5], vec![1, 5]]
        );
    }

    #[test]
    fn no_descriptors_yield_one_variant() {
        assert_eq!(combinations(&[]), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn zero_count_contributes_only_its_constant() {
        let c = contribution(&dot_descriptor(&[0, 2]), 0);
        assert_eq!(c.macro_definition, "const DOT_COUNT: u32 = 0u;\n");
        assert!(c.uniform_fields.is_empty());
        assert!(c.declaration.is_empty());
        assert!(c.call_site.is_empty());
    }

    #[test]
    fn shape_call_site_keeps_closest() {
        let c = contribution(&dot_descriptor(&[0, 2]), 2);
        assert!(c.uniform_fields.contains("dotCenters: array<vec4<f32>, DOT_COUNT>"));
        assert!(c.uniform_fields.contains("dotRadii: array<vec4<f32>, DOT_COUNT>"));
        assert!(c.call_site.contains("dot_min_distance(frag_pos, &candidate_color)"));
        assert!(c.call_site.contains("candidate < min_distance"));
    }

    #[test]
    fn light_call_site_accumulates() {
        let c = contribution(&glow_descriptor(&[0, 1]), 1);
        assert_eq!(
            c.call_site,
            "    lighting = lighting + glow_contribution(frag_pos, surface_distance);\n"
        );
    }

    #[test]
    fn empty_variant_gets_padding_field() {
        let descriptors = vec![Arc::new(dot_descriptor(&[0, 2]))];
        let subs = variant_substitutions(&descriptors, &[0]);
        assert_eq!(text(&subs, "uniformFields"), "    _padding: vec4<f32>,\n");
        assert_eq!(text(&subs, "functionCalls"), "");
        assert_eq!(block_len(&descriptors, &[0]), 1);
        assert_eq!(block_len(&descriptors, &[2]), 4);
    }
}
