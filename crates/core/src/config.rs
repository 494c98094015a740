//! Editor configuration
//!
//! Tunables for snapping, measurement labels, history depth and page
//! rasterization. Configuration can be built programmatically, overridden
//! from environment variables, or persisted by the storage crate as JSON.

use serde::{Deserialize, Serialize};

/// Environment variable names read by [`EditorConfig::from_env`]
pub const ENV_ANGLE_SNAP: &str = "TAKEOFF_ANGLE_SNAP";
pub const ENV_SNAP_THRESHOLD: &str = "TAKEOFF_SNAP_THRESHOLD";
pub const ENV_POINT_SNAPPING: &str = "TAKEOFF_POINT_SNAPPING";
pub const ENV_HISTORY_LIMIT: &str = "TAKEOFF_HISTORY_LIMIT";
pub const ENV_UNIT: &str = "TAKEOFF_UNIT";
pub const ENV_RENDER_SCALE: &str = "TAKEOFF_RENDER_SCALE";

/// Configuration for an editing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Rotation snap increment in degrees while the modifier key is held
    pub angle_snap_increment: f64,

    /// Distance in pixels within which a pointer snaps to a known point
    pub snap_threshold: f64,

    /// Snap pointer-down/up positions to page corners and shape endpoints
    pub point_snapping: bool,

    /// How far above the measured line the label is drawn, in pixels
    pub label_offset: f64,

    /// Maximum retained history snapshots (None = unbounded)
    pub history_limit: Option<usize>,

    /// Unit assigned by the next calibration
    pub default_unit: String,

    /// Scale passed to the rasterizer for page 1
    pub render_scale: f64,

    /// Selection hit-test tolerance in pixels
    pub hit_tolerance: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            angle_snap_increment: 15.0,
            snap_threshold: 10.0,
            point_snapping: false,
            label_offset: 10.0,
            history_limit: None,
            default_unit: "m".to_string(),
            render_scale: 1.5,
            hit_tolerance: 5.0,
        }
    }
}

impl EditorConfig {
    pub fn with_angle_snap_increment(mut self, degrees: f64) -> Self {
        self.angle_snap_increment = degrees;
        self
    }

    pub fn with_snap_threshold(mut self, pixels: f64) -> Self {
        self.snap_threshold = pixels;
        self
    }

    pub fn with_point_snapping(mut self, enabled: bool) -> Self {
        self.point_snapping = enabled;
        self
    }

    pub fn with_label_offset(mut self, pixels: f64) -> Self {
        self.label_offset = pixels;
        self
    }

    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_default_unit(mut self, unit: impl Into<String>) -> Self {
        self.default_unit = unit.into();
        self
    }

    pub fn with_render_scale(mut self, scale: f64) -> Self {
        self.render_scale = scale;
        self
    }

    /// Loads configuration overrides from environment variables.
    ///
    /// Environment variables:
    /// - `TAKEOFF_ANGLE_SNAP`: rotation snap increment in degrees (default: 15)
    /// - `TAKEOFF_SNAP_THRESHOLD`: point snap radius in pixels (default: 10)
    /// - `TAKEOFF_POINT_SNAPPING`: `true`/`false`/`1`/`0` (default: false)
    /// - `TAKEOFF_HISTORY_LIMIT`: max snapshots, `0` for unbounded (default: unbounded)
    /// - `TAKEOFF_UNIT`: unit assigned by calibration (default: m)
    /// - `TAKEOFF_RENDER_SCALE`: page raster scale (default: 1.5)
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable or out-of-range value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this configuration
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`EditorConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Apply overrides from a custom variable source on top of this configuration
    pub fn with_overrides<F>(self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self;

        if let Some(val) = lookup(ENV_ANGLE_SNAP) {
            config.angle_snap_increment = parse_number(ENV_ANGLE_SNAP, &val)?;
        }
        if let Some(val) = lookup(ENV_SNAP_THRESHOLD) {
            config.snap_threshold = parse_number(ENV_SNAP_THRESHOLD, &val)?;
        }
        if let Some(val) = lookup(ENV_POINT_SNAPPING) {
            config.point_snapping = match val.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidValue(ENV_POINT_SNAPPING.to_string())),
            };
        }
        if let Some(val) = lookup(ENV_HISTORY_LIMIT) {
            let limit = val
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue(ENV_HISTORY_LIMIT.to_string()))?;
            config.history_limit = (limit > 0).then_some(limit);
        }
        if let Some(val) = lookup(ENV_UNIT) {
            config.default_unit = val.trim().to_string();
        }
        if let Some(val) = lookup(ENV_RENDER_SCALE) {
            config.render_scale = parse_number(ENV_RENDER_SCALE, &val)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.angle_snap_increment > 0.0 && self.angle_snap_increment <= 180.0) {
            return Err(ConfigError::OutOfRange("angle_snap_increment"));
        }
        if !(self.snap_threshold >= 0.0 && self.snap_threshold.is_finite()) {
            return Err(ConfigError::OutOfRange("snap_threshold"));
        }
        if !(self.label_offset >= 0.0 && self.label_offset.is_finite()) {
            return Err(ConfigError::OutOfRange("label_offset"));
        }
        if !(self.render_scale > 0.0 && self.render_scale <= 10.0) {
            return Err(ConfigError::OutOfRange("render_scale"));
        }
        if !(self.hit_tolerance >= 0.0 && self.hit_tolerance.is_finite()) {
            return Err(ConfigError::OutOfRange("hit_tolerance"));
        }
        if self.default_unit.trim().is_empty() {
            return Err(ConfigError::OutOfRange("default_unit"));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur while building a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Unparsable value for a configuration key
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    /// Value parsed but is outside the accepted range
    #[error("configuration value out of range: {0}")]
    OutOfRange(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::env;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.angle_snap_increment, 15.0);
        assert_eq!(config.snap_threshold, 10.0);
        assert!(!config.point_snapping);
        assert_eq!(config.history_limit, None);
        assert_eq!(config.default_unit, "m");
        assert_eq!(config.render_scale, 1.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let config = EditorConfig::default()
            .with_angle_snap_increment(45.0)
            .with_point_snapping(true)
            .with_history_limit(Some(50))
            .with_default_unit("ft");

        assert_eq!(config.angle_snap_increment, 45.0);
        assert!(config.point_snapping);
        assert_eq!(config.history_limit, Some(50));
        assert_eq!(config.default_unit, "ft");
    }

    #[test]
    fn test_from_lookup() {
        let config = EditorConfig::from_lookup(lookup_from(&[
            (ENV_ANGLE_SNAP, "45"),
            (ENV_POINT_SNAPPING, "yes"),
            (ENV_HISTORY_LIMIT, "0"),
            (ENV_UNIT, " mm "),
        ]))
        .unwrap();

        assert_eq!(config.angle_snap_increment, 45.0);
        assert!(config.point_snapping);
        assert_eq!(config.history_limit, None);
        assert_eq!(config.default_unit, "mm");
        assert_eq!(config.snap_threshold, 10.0);
    }

    #[test]
    fn test_from_lookup_invalid() {
        let result = EditorConfig::from_lookup(lookup_from(&[(ENV_SNAP_THRESHOLD, "near")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == ENV_SNAP_THRESHOLD));

        let result = EditorConfig::from_lookup(lookup_from(&[(ENV_ANGLE_SNAP, "-15")]));
        assert!(matches!(result, Err(ConfigError::OutOfRange("angle_snap_increment"))));
    }

    #[test]
    fn test_overrides_keep_base_values() {
        let base = EditorConfig::default().with_label_offset(4.0).with_default_unit("ft");
        let config = base.with_overrides(lookup_from(&[(ENV_UNIT, "in")])).unwrap();

        assert_eq!(config.label_offset, 4.0);
        assert_eq!(config.default_unit, "in");
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(&[ENV_RENDER_SCALE, ENV_HISTORY_LIMIT]);

        env::set_var(ENV_RENDER_SCALE, "2.0");
        env::set_var(ENV_HISTORY_LIMIT, "25");

        let config = EditorConfig::from_env().unwrap();
        assert_eq!(config.render_scale, 2.0);
        assert_eq!(config.history_limit, Some(25));
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(&[ENV_POINT_SNAPPING]);

        env::set_var(ENV_POINT_SNAPPING, "maybe");
        assert!(EditorConfig::from_env().is_err());
    }

    #[test]
    fn test_json_fills_missing_fields_with_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{"label_offset": 4.0}"#).unwrap();
        assert_eq!(config.label_offset, 4.0);
        assert_eq!(config.angle_snap_increment, 15.0);
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }
}
