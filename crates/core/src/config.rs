//! Compositor configuration and lenient JSON parameter helpers.
//!
//! `CompositorConfig` deserializes strictly through serde, or leniently
//! through [`CompositorConfig::from_json`], where missing or mistyped keys
//! fall back to defaults. Either way, [`CompositorConfig::validate`] is the
//! gate before a compositor is built.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blend::BlendMode;
use crate::color::Color;
use crate::error::CompositorError;
use crate::vertex::{DEFAULT_MAX_BATCH_SIZE, MAX_BATCH_SIZE_LIMIT};

/// Reads `params[name]` as `f32`, or `default` when missing or not a number.
pub fn param_f32(params: &Value, name: &str, default: f32) -> f32 {
    params
        .get(name)
        .and_then(Value::as_f64)
        .map(|v| v as f32)
        .unwrap_or(default)
}

/// Reads `params[name]` as a non-negative integer, or `default`.
pub fn param_usize(params: &Value, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

/// Reads `params[name]` as a `u64`, or `default`.
pub fn param_u64(params: &Value, name: &str, default: u64) -> u64 {
    params.get(name).and_then(Value::as_u64).unwrap_or(default)
}

pub fn param_bool(params: &Value, name: &str, default: bool) -> bool {
    params.get(name).and_then(Value::as_bool).unwrap_or(default)
}

pub fn param_string(params: &Value, name: &str, default: &str) -> String {
    params
        .get(name)
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| default.to_owned())
}

/// Reads `params[name]` as an `[r, g, b, a]` array of numbers, or `default`.
pub fn param_color(params: &Value, name: &str, default: Color) -> Color {
    params
        .get(name)
        .and_then(Value::as_array)
        .and_then(|values| {
            values
                .iter()
                .map(|v| v.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
        })
        .and_then(|channels| Color::from_slice(&channels))
        .unwrap_or(default)
}

/// Settings a compositor is built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Quads per batch before an automatic flush.
    pub max_batch_size: usize,
    /// Caps the texture units used per batch; `None` uses all the GPU offers.
    pub max_texture_units: Option<usize>,
    /// Framebuffer clear color.
    pub clear_color: [f32; 4],
    pub blend_mode: BlendMode,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_texture_units: None,
            clear_color: Color::TRANSPARENT.to_array(),
            blend_mode: BlendMode::Normal,
        }
    }
}

impl CompositorConfig {
    /// Builds a config from loosely typed JSON, keeping defaults for
    /// anything missing or malformed. Call [`validate`](Self::validate) after.
    pub fn from_json(params: &Value) -> Self {
        let defaults = Self::default();
        let max_texture_units = params
            .get("max_texture_units")
            .and_then(Value::as_u64)
            .and_then(|v| usize::try_from(v).ok());
        let blend_name = param_string(params, "blend_mode", defaults.blend_mode.name());
        Self {
            max_batch_size: param_usize(params, "max_batch_size", defaults.max_batch_size),
            max_texture_units,
            clear_color: param_color(
                params,
                "clear_color",
                Color::from_slice(&defaults.clear_color).unwrap_or(Color::TRANSPARENT),
            )
            .to_array(),
            blend_mode: BlendMode::from_name(&blend_name).unwrap_or(defaults.blend_mode),
        }
    }

    /// Parses a JSON document with strict serde rules.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` carrying the serde message.
    pub fn from_json_str(json: &str) -> Result<Self, CompositorError> {
        serde_json::from_str(json).map_err(|e| CompositorError::InvalidConfig(e.to_string()))
    }

    /// Checks ranges.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<(), CompositorError> {
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE_LIMIT {
            return Err(CompositorError::InvalidConfig(format!(
                "max_batch_size must be in 1..={MAX_BATCH_SIZE_LIMIT}, got {}",
                self.max_batch_size
            )));
        }
        if self.max_texture_units == Some(0) {
            return Err(CompositorError::InvalidConfig(
                "max_texture_units must be at least 1".to_string(),
            ));
        }
        if self.clear_color.iter().any(|c| !c.is_finite()) {
            return Err(CompositorError::InvalidConfig(
                "clear_color channels must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Texture units to use given what the GPU reports.
    pub fn resolve_texture_units(&self, gpu_max: usize) -> usize {
        let gpu_max = gpu_max.max(1);
        self.max_texture_units.map_or(gpu_max, |n| n.clamp(1, gpu_max))
    }

    pub fn clear_color(&self) -> Color {
        Color::from_slice(&self.clear_color).unwrap_or(Color::TRANSPARENT)
    }
}
