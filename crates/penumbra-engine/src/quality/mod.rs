//! Adaptive quality: a frame-time driven controller over a preset table.

mod autoscaler;
mod presets;

pub use autoscaler::{PresetValue, QualityAutoscaler, QualityScalingOptions, Setter};
pub use presets::{
    DISTANCE_RENDER_SCALE, LIGHTS_RENDER_SCALE, QualityPreset, SOFT_SHADOWS_ENABLED,
    default_presets, renderer_setters,
};
