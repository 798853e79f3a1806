use std::collections::VecDeque;

use super::{QualityPreset, default_presets};

/// Value of one preset entry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PresetValue {
    /// Interpolated linearly between neighbouring presets.
    Number(f32),
    /// Taken from the nearer preset.
    Flag(bool),
}

impl PresetValue {
    pub fn as_number(self) -> Option<f32> {
        match self {
            PresetValue::Number(n) => Some(n),
            PresetValue::Flag(_) => None,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            PresetValue::Flag(b) => Some(b),
            PresetValue::Number(_) => None,
        }
    }
}

/// Applies one named preset value to the controlled object.
pub type Setter<T> = Box<dyn Fn(&mut T, PresetValue)>;

#[derive(Debug, Clone, PartialEq)]
pub struct QualityScalingOptions {
    pub target_delta_time_ms: f32,
    /// Dead band below the target before quality is raised.
    pub hysteresis_ms: f32,
    /// Weight of a new sample in the decayed delta time.
    pub responsiveness: f32,
    pub adjustment_interval_ms: f32,
    pub additive_increase: f32,
    pub multiplicative_decrease: f32,
    pub starting_index: f32,
    pub sample_capacity: usize,
    /// Ordered from cheapest to most expensive.
    pub presets: Vec<QualityPreset>,
}

impl Default for QualityScalingOptions {
    fn default() -> Self {
        Self {
            target_delta_time_ms: 20.0,
            hysteresis_ms: 2.0,
            responsiveness: 1.0 / 16.0,
            adjustment_interval_ms: 300.0,
            additive_increase: 0.1,
            multiplicative_decrease: 1.5,
            starting_index: 2.0,
            sample_capacity: 120,
            presets: default_presets(),
        }
    }
}

/// Closed-loop quality controller driven by frame times.
///
/// Quality drops multiplicatively as soon as the 90th percentile of recent
/// frame times misses the target, and rises additively only while the smoothed
/// frame time stays comfortably below it.
pub struct QualityAutoscaler<T> {
    options: QualityScalingOptions,
    setters: Vec<(&'static str, Setter<T>)>,
    samples: VecDeque<f32>,
    samples_since_adjustment: usize,
    decayed_delta_time: Option<f32>,
    time_since_adjustment: f32,
    index: f32,
}

impl<T> QualityAutoscaler<T> {
    pub fn new(options: QualityScalingOptions, setters: Vec<(&'static str, Setter<T>)>) -> Self {
        let max_index = options.presets.len().saturating_sub(1) as f32;
        let index = options.starting_index.clamp(0.0, max_index);
        Self {
            samples: VecDeque::with_capacity(options.sample_capacity),
            options,
            setters,
            samples_since_adjustment: 0,
            decayed_delta_time: None,
            time_since_adjustment: 0.0,
            index,
        }
    }

    /// Fractional position in the preset table.
    #[inline]
    pub fn index(&self) -> f32 {
        self.index
    }

    #[inline]
    pub fn decayed_delta_time(&self) -> Option<f32> {
        self.decayed_delta_time
    }

    pub fn options(&self) -> &QualityScalingOptions {
        &self.options
    }

    /// Frames per second at the 90th percentile frame time of the sample ring.
    pub fn fps(&self) -> Option<f32> {
        percentile_90(self.samples.iter().copied()).map(|dt| 1000.0 / dt.max(f32::EPSILON))
    }

    /// Value of `name` at the current index, interpolated between presets.
    pub fn resolve(&self, name: &str) -> Option<PresetValue> {
        let presets = &self.options.presets;
        let floor = self.index.floor();
        let fract = self.index - floor;
        let lower = presets.get(floor as usize)?;
        let upper = presets.get(floor as usize + 1).unwrap_or(lower);

        match (lower.get(name)?, upper.get(name)) {
            (PresetValue::Number(a), Some(PresetValue::Number(b))) => {
                Some(PresetValue::Number(a + (b - a) * fract))
            }
            (lower_value, Some(upper_value)) => {
                Some(if fract < 0.5 { lower_value } else { upper_value })
            }
            (lower_value, None) => Some(lower_value),
        }
    }

    /// Pushes the current preset values through the setters.
    pub fn apply(&self, target: &mut T) {
        for (name, setter) in &self.setters {
            if let Some(value) = self.resolve(name) {
                setter(target, value);
            }
        }
    }

    /// Records one frame time and adjusts quality when the adjustment interval
    /// has elapsed. Returns whether settings were pushed.
    pub fn autoscale(&mut self, delta_time_ms: f32, target: &mut T) -> bool {
        if !delta_time_ms.is_finite() || delta_time_ms < 0.0 {
            return false;
        }

        if self.samples.len() == self.options.sample_capacity.max(1) {
            self.samples.pop_front();
        }
        self.samples.push_back(delta_time_ms);
        self.samples_since_adjustment += 1;

        let r = self.options.responsiveness;
        self.decayed_delta_time = Some(match self.decayed_delta_time {
            Some(d) => d * (1.0 - r) + delta_time_ms * r,
            None => delta_time_ms,
        });

        self.time_since_adjustment += delta_time_ms;
        if self.time_since_adjustment < self.options.adjustment_interval_ms {
            return false;
        }
        self.time_since_adjustment = 0.0;

        let recent = self.samples_since_adjustment.min(self.samples.len());
        self.samples_since_adjustment = 0;
        let p90 = percentile_90(self.samples.iter().rev().take(recent).copied());
        let target_ms = self.options.target_delta_time_ms;

        if p90.is_some_and(|p| p > target_ms) {
            self.index /= self.options.multiplicative_decrease.max(1.0);
        } else if self
            .decayed_delta_time
            .is_some_and(|d| d <= target_ms - self.options.hysteresis_ms)
        {
            self.index += self.options.additive_increase;
        }
        let max_index = self.options.presets.len().saturating_sub(1) as f32;
        self.index = self.index.clamp(0.0, max_index);

        log::debug!("quality index {:.2}", self.index);
        self.apply(target);
        true
    }
}

fn percentile_90(samples: impl Iterator<Item = f32>) -> Option<f32> {
    let mut sorted: Vec<f32> = samples.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f32::total_cmp);
    let i = ((sorted.len() as f32 * 0.9) as usize).min(sorted.len() - 1);
    Some(sorted[i])
}
