use std::collections::BTreeMap;

use crate::coords::ColorRgba;
use crate::drawable::is_identifier;
use crate::render::TextureImage;

use super::ConfigError;

/// Binding names the generated shaders already use.
const RESERVED_TEXTURE_NAMES: &[&str] = &[
    "palette_texture",
    "color_texture",
    "distance_texture",
    "input_sampler",
    "globals",
    "drawables",
];

/// Settings baked into the shaders; changing them requires a new renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct StartupSettings {
    /// Sphere-tracing steps per light sample.
    pub shadow_trace_count: u32,
    pub palette_size: u32,
    /// Fraction of light reaching points inside shapes.
    pub light_penetration_ratio: f32,
    pub background_color: ColorRgba,
    /// Auxiliary textures shape functions may sample, by WGSL identifier.
    pub texture_names: Vec<String>,
    /// Treat the context as baseline regardless of what it supports.
    pub force_baseline: bool,
    pub disable_float_textures: bool,
}

impl Default for StartupSettings {
    fn default() -> Self {
        Self {
            shadow_trace_count: 16,
            palette_size: 256,
            light_penetration_ratio: 0.1,
            background_color: ColorRgba::new(0.0, 0.0, 0.0, 0.0),
            texture_names: Vec::new(),
            force_baseline: false,
            disable_float_textures: false,
        }
    }
}

impl StartupSettings {
    /// Checks names and sizes against a device whose textures are at most
    /// `max_texture_dimension` texels wide.
    pub fn validate(&self, max_texture_dimension: u32) -> Result<(), ConfigError> {
        if self.palette_size == 0 || self.palette_size > max_texture_dimension {
            return Err(ConfigError::PaletteSize {
                size: self.palette_size,
                max: max_texture_dimension,
            });
        }
        for (i, name) in self.texture_names.iter().enumerate() {
            if !is_identifier(name) || RESERVED_TEXTURE_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::InvalidIdentifier(name.clone()));
            }
            if self.texture_names[..i].contains(name) {
                return Err(ConfigError::DuplicateTexture(name.clone()));
            }
        }
        Ok(())
    }
}

/// Settings that may change between frames.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub enable_high_dpi_rendering: bool,
    /// Distance pass tiles per edge.
    pub tile_multiplier: u32,
    /// Lights pass tiles per edge.
    pub lights_tile_multiplier: u32,
    pub is_world_inverted: bool,
    pub distance_render_scale: f32,
    pub lights_render_scale: f32,
    pub color_palette: Vec<ColorRgba>,
    pub ambient_light: ColorRgba,
    pub light_cutoff_distance: f32,
    pub soft_shadows_enabled: bool,
    pub textures: BTreeMap<String, TextureImage>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            enable_high_dpi_rendering: false,
            tile_multiplier: 8,
            lights_tile_multiplier: 1,
            is_world_inverted: false,
            distance_render_scale: 1.0,
            lights_render_scale: 1.0,
            color_palette: Vec::new(),
            ambient_light: ColorRgba::rgb(0.25, 0.15, 0.25),
            light_cutoff_distance: 400.0,
            soft_shadows_enabled: true,
            textures: BTreeMap::new(),
        }
    }
}

impl RuntimeSettings {
    /// Overwrites every field `overrides` sets.
    pub fn apply(&mut self, overrides: &RuntimeOverrides) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if let Some(v) = &overrides.$field {
                    self.$field = v.clone();
                })*
            };
        }
        take!(
            enable_high_dpi_rendering,
            tile_multiplier,
            lights_tile_multiplier,
            is_world_inverted,
            distance_render_scale,
            lights_render_scale,
            color_palette,
            ambient_light,
            light_cutoff_distance,
            soft_shadows_enabled
        );
        for (name, image) in &overrides.textures {
            self.textures.insert(name.clone(), image.clone());
        }
    }
}

/// Partial update of [`RuntimeSettings`]; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeOverrides {
    pub enable_high_dpi_rendering: Option<bool>,
    pub tile_multiplier: Option<u32>,
    pub lights_tile_multiplier: Option<u32>,
    pub is_world_inverted: Option<bool>,
    pub distance_render_scale: Option<f32>,
    pub lights_render_scale: Option<f32>,
    pub color_palette: Option<Vec<ColorRgba>>,
    pub ambient_light: Option<ColorRgba>,
    pub light_cutoff_distance: Option<f32>,
    pub soft_shadows_enabled: Option<bool>,
    /// Replaced per name; names missing here keep their current image.
    pub textures: BTreeMap<String, TextureImage>,
}

impl RuntimeOverrides {
    /// Folds `later` into `self`, later values winning.
    pub fn merge(&mut self, later: &RuntimeOverrides) {
        macro_rules! or {
            ($($field:ident),*) => {
                $(if later.$field.is_some() {
                    self.$field = later.$field.clone();
                })*
            };
        }
        or!(
            enable_high_dpi_rendering,
            tile_multiplier,
            lights_tile_multiplier,
            is_world_inverted,
            distance_render_scale,
            lights_render_scale,
            color_palette,
            ambient_light,
            light_cutoff_distance,
            soft_shadows_enabled
        );
        for (name, image) in &later.textures {
            self.textures.insert(name.clone(), image.clone());
        }
    }

    /// The full settings as overrides, used to push defaults into a new pipeline.
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            enable_high_dpi_rendering: Some(settings.enable_high_dpi_rendering),
            tile_multiplier: Some(settings.tile_multiplier),
            lights_tile_multiplier: Some(settings.lights_tile_multiplier),
            is_world_inverted: Some(settings.is_world_inverted),
            distance_render_scale: Some(settings.distance_render_scale),
            lights_render_scale: Some(settings.lights_render_scale),
            color_palette: Some(settings.color_palette.clone()),
            ambient_light: Some(settings.ambient_light),
            light_cutoff_distance: Some(settings.light_cutoff_distance),
            soft_shadows_enabled: Some(settings.soft_shadows_enabled),
            textures: settings.textures.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_overrides_win() {
        let mut merged = RuntimeOverrides {
            tile_multiplier: Some(4),
            distance_render_scale: Some(0.5),
            ..RuntimeOverrides::default()
        };
        merged.merge(&RuntimeOverrides {
            distance_render_scale: Some(0.25),
            soft_shadows_enabled: Some(false),
            ..RuntimeOverrides::default()
        });

        assert_eq!(merged.tile_multiplier, Some(4));
        assert_eq!(merged.distance_render_scale, Some(0.25));
        assert_eq!(merged.soft_shadows_enabled, Some(false));
        assert_eq!(merged.lights_render_scale, None);
    }

    #[test]
    fn apply_leaves_unset_fields() {
        let mut settings = RuntimeSettings::default();
        settings.apply(&RuntimeOverrides {
            lights_tile_multiplier: Some(3),
            ..RuntimeOverrides::default()
        });
        assert_eq!(settings.lights_tile_multiplier, 3);
        assert_eq!(settings.tile_multiplier, 8);
        assert_eq!(settings.light_cutoff_distance, 400.0);
        assert!(settings.soft_shadows_enabled);
    }

    #[test]
    fn texture_names_must_be_fresh_identifiers() {
        let mut startup = StartupSettings {
            texture_names: vec!["noise".into(), "mask_2".into()],
            ..StartupSettings::default()
        };
        assert_eq!(startup.validate(8192), Ok(()));

        startup.texture_names.push("2d".into());
        assert_eq!(startup.validate(8192), Err(ConfigError::InvalidIdentifier("2d".into())));

        startup.texture_names = vec!["palette_texture".into()];
        assert!(startup.validate(8192).is_err());

        startup.texture_names = vec!["noise".into(), "noise".into()];
        assert!(startup.validate(8192).is_err());
    }

    #[test]
    fn palette_must_fit_in_one_texture_row() {
        let mut startup = StartupSettings {
            palette_size: 4096,
            ..StartupSettings::default()
        };
        assert_eq!(startup.validate(4096), Ok(()));
        assert_eq!(
            startup.validate(2048),
            Err(ConfigError::PaletteSize { size: 4096, max: 2048 })
        );

        startup.palette_size = 0;
        assert!(startup.validate(4096).is_err());
    }
}
