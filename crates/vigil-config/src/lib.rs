//! Configuration for the Vigil service.
//!
//! Resolution order (later overrides earlier):
//!
//! 1. [`VigilConfig::default`].
//! 2. An optional TOML file, loaded with [`load_file`].
//! 3. Environment variables prefixed `VIGIL_`, applied with
//!    [`VigilConfig::apply_env`].
//!
//! All fields are validated together in [`VigilConfig::validate`], which
//! every loader calls before returning — a config that fails validation
//! is never silently accepted.

mod error;

pub use error::{ConfigError, Result};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure. Every field has a spec-mandated default,
/// so a config file (or no config file at all) only needs to name the
/// values it wants to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub recognition: RecognitionConfig,
    pub enrollment: EnrollmentConfig,
    pub camera: CameraConfig,
    pub presence: PresenceConfig,
    pub hub: HubConfig,
    pub attendance: AttendanceConfig,
    pub persistence: PersistenceConfig,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            enrollment: EnrollmentConfig::default(),
            camera: CameraConfig::default(),
            presence: PresenceConfig::default(),
            hub: HubConfig::default(),
            attendance: AttendanceConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// C5 recognition + C3 search thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub confidence_threshold: f32,
    pub q_min_recognize: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            q_min_recognize: 0.3,
        }
    }
}

/// C4 enrollment quality gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    pub q_min: f32,
    pub a_min: u64,
    pub max_images_per_person: usize,
    pub image_processing_timeout_ms: u64,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            q_min: 0.5,
            a_min: 2_500,
            max_images_per_person: 50,
            image_processing_timeout_ms: 5_000,
        }
    }
}

/// C7 camera worker timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub recognition_hz: f32,
    pub stream_max_hz: f32,
    pub event_cooldown_secs: u64,
    pub connect_timeout_ms: u64,
    pub shutdown_grace_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_factor: u32,
    pub backoff_cap_ms: u64,
    pub persistence_fail_window_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            recognition_hz: 2.0,
            stream_max_hz: 10.0,
            event_cooldown_secs: 10,
            connect_timeout_ms: 10_000,
            shutdown_grace_ms: 5_000,
            backoff_initial_ms: 1_000,
            backoff_factor: 2,
            backoff_cap_ms: 30_000,
            persistence_fail_window_ms: 30_000,
        }
    }
}

impl CameraConfig {
    pub fn event_cooldown(&self) -> Duration {
        Duration::from_secs(self.event_cooldown_secs)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }
    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
    pub fn persistence_fail_window(&self) -> Duration {
        Duration::from_millis(self.persistence_fail_window_ms)
    }
    pub fn recognition_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.recognition_hz.max(0.001))
    }
    pub fn stream_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.stream_max_hz.max(0.001))
    }
}

/// C8 presence tracker TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub ttl_secs: u64,
    pub eviction_period_secs: u64,
    pub refresh_period_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            eviction_period_secs: 10,
            refresh_period_secs: 15,
        }
    }
}

impl PresenceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
    pub fn eviction_period(&self) -> Duration {
        Duration::from_secs(self.eviction_period_secs)
    }
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_period_secs)
    }
}

/// C9 subscription hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub subscriber_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_queue: 32,
        }
    }
}

/// C6 attendance gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    pub attendance_min: f32,
    /// IANA time zone name used to derive the calendar day boundary.
    pub timezone: String,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            attendance_min: 0.6,
            timezone: "UTC".to_string(),
        }
    }
}

/// C2 persistence paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub database_path: String,
    pub image_root: String,
    pub snapshot_root: String,
    pub index_vector_path: String,
    pub index_slot_map_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: "./data/vigil.db".to_string(),
            image_root: "./data/images".to_string(),
            snapshot_root: "./data/snapshots".to_string(),
            index_vector_path: "./data/index.vectors".to_string(),
            index_slot_map_path: "./data/index.slots".to_string(),
        }
    }
}

impl VigilConfig {
    /// Validate cross-field invariants. Every loader below calls this;
    /// nothing constructs a `VigilConfig` that skips it.
    pub fn validate(&self) -> Result<()> {
        if self.attendance.attendance_min < self.recognition.confidence_threshold {
            return Err(ConfigError::Invalid(format!(
                "attendance.attendance_min ({}) must be >= recognition.confidence_threshold ({})",
                self.attendance.attendance_min, self.recognition.confidence_threshold
            )));
        }
        if self.recognition.q_min_recognize > self.enrollment.q_min {
            tracing::warn!(
                q_min_recognize = self.recognition.q_min_recognize,
                q_min = self.enrollment.q_min,
                "recognition.q_min_recognize is higher than enrollment.q_min; recognition will be stricter than enrollment, which is unusual"
            );
        }
        self.timezone()?;
        if self.hub.subscriber_queue == 0 {
            return Err(ConfigError::Invalid(
                "hub.subscriber_queue must be >= 1".to_string(),
            ));
        }
        if self.camera.recognition_hz <= 0.0 || self.camera.stream_max_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "camera.recognition_hz and camera.stream_max_hz must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the configured time zone.
    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.attendance
            .timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.attendance.timezone)))
    }

    /// Load defaults, then an optional TOML file, then `VIGIL_*` env vars.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = file {
            config = load_file(path)?;
        }
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay `VIGIL_*` environment variables onto this config. Only a
    /// curated set of hot-path knobs are exposed this way, matching how
    /// operators actually override services in the field (thresholds and
    /// timeouts), not every nested struct field.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("VIGIL_CONFIDENCE_THRESHOLD") {
            if let Ok(v) = v.parse() {
                self.recognition.confidence_threshold = v;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_ATTENDANCE_MIN") {
            if let Ok(v) = v.parse() {
                self.attendance.attendance_min = v;
            }
        }
        if let Ok(v) = std::env::var("VIGIL_TIMEZONE") {
            self.attendance.timezone = v;
        }
        if let Ok(v) = std::env::var("VIGIL_DATABASE_PATH") {
            self.persistence.database_path = v;
        }
    }
}

/// Load and merge a TOML config file on top of the defaults.
pub fn load_file(path: &Path) -> Result<VigilConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config: VigilConfig = toml::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        VigilConfig::default().validate().unwrap();
    }

    #[test]
    fn attendance_min_below_confidence_threshold_is_rejected() {
        let mut config = VigilConfig::default();
        config.attendance.attendance_min = 0.1;
        config.recognition.confidence_threshold = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn recognize_threshold_higher_than_enrollment_still_validates() {
        let mut config = VigilConfig::default();
        config.recognition.q_min_recognize = config.enrollment.q_min + 0.1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let mut config = VigilConfig::default();
        config.attendance.timezone = "Not/AZone".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_file_merges_toml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(
            &path,
            r#"
            [recognition]
            confidence_threshold = 0.7

            [attendance]
            timezone = "America/New_York"
            "#,
        )
        .unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.recognition.confidence_threshold, 0.7);
        assert_eq!(config.attendance.timezone, "America/New_York");
        // Untouched sections keep their defaults.
        assert_eq!(config.camera.recognition_hz, CameraConfig::default().recognition_hz);
    }

    #[test]
    fn env_overrides_apply_on_top_of_file() {
        std::env::set_var("VIGIL_CONFIDENCE_THRESHOLD", "0.8");
        let mut config = VigilConfig::default();
        config.apply_env();
        assert_eq!(config.recognition.confidence_threshold, 0.8);
        std::env::remove_var("VIGIL_CONFIDENCE_THRESHOLD");
    }
}
