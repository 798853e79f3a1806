use crate::renderer::{Renderer, RuntimeOverrides};

use super::{PresetValue, Setter};

/// One row of the quality table: named values applied through setters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityPreset {
    values: Vec<(&'static str, PresetValue)>,
}

impl QualityPreset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn number(mut self, name: &'static str, value: f32) -> Self {
        self.values.push((name, PresetValue::Number(value)));
        self
    }

    pub fn flag(mut self, name: &'static str, value: bool) -> Self {
        self.values.push((name, PresetValue::Flag(value)));
        self
    }

    pub fn get(&self, name: &str) -> Option<PresetValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

pub const DISTANCE_RENDER_SCALE: &str = "distance_render_scale";
pub const LIGHTS_RENDER_SCALE: &str = "lights_render_scale";
pub const SOFT_SHADOWS_ENABLED: &str = "soft_shadows_enabled";

fn preset(distance: f32, lights: f32, soft_shadows: bool) -> QualityPreset {
    QualityPreset::new()
        .number(DISTANCE_RENDER_SCALE, distance)
        .number(LIGHTS_RENDER_SCALE, lights)
        .flag(SOFT_SHADOWS_ENABLED, soft_shadows)
}

/// Render scales and soft shadows, cheapest first.
pub fn default_presets() -> Vec<QualityPreset> {
    vec![
        preset(0.1, 0.2, false),
        preset(0.1, 0.6, false),
        preset(0.3, 1.0, false),
        preset(0.3, 1.0, true),
        preset(0.6, 1.0, true),
    ]
}

/// Setters driving a [`Renderer`] from the default preset names.
pub fn renderer_setters() -> Vec<(&'static str, Setter<Renderer>)> {
    vec![
        (
            DISTANCE_RENDER_SCALE,
            Box::new(|r: &mut Renderer, v: PresetValue| {
                if let Some(scale) = v.as_number() {
                    r.set_runtime_settings(RuntimeOverrides {
                        distance_render_scale: Some(scale),
                        ..RuntimeOverrides::default()
                    });
                }
            }) as Setter<Renderer>,
        ),
        (
            LIGHTS_RENDER_SCALE,
            Box::new(|r: &mut Renderer, v: PresetValue| {
                if let Some(scale) = v.as_number() {
                    r.set_runtime_settings(RuntimeOverrides {
                        lights_render_scale: Some(scale),
                        ..RuntimeOverrides::default()
                    });
                }
            }) as Setter<Renderer>,
        ),
        (
            SOFT_SHADOWS_ENABLED,
            Box::new(|r: &mut Renderer, v: PresetValue| {
                if let Some(enabled) = v.as_flag() {
                    r.set_runtime_settings(RuntimeOverrides {
                        soft_shadows_enabled: Some(enabled),
                        ..RuntimeOverrides::default()
                    });
                }
            }) as Setter<Renderer>,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_ordered_by_cost() {
        let presets = default_presets();
        assert_eq!(presets.len(), 5);
        let distance: Vec<f32> = presets
            .iter()
            .filter_map(|p| p.get(DISTANCE_RENDER_SCALE).and_then(PresetValue::as_number))
            .collect();
        assert!(distance.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(presets[3].get(SOFT_SHADOWS_ENABLED), Some(PresetValue::Flag(true)));
        assert_eq!(presets[2].get(SOFT_SHADOWS_ENABLED), Some(PresetValue::Flag(false)));
    }
}
