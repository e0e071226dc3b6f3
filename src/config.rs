//! Tunables for tracking, progress matching, sync, map capture and the API client.
//!
//! Every struct carries its production defaults through [`Default`] and can be
//! deserialized from JSON, so hosts can override single fields.

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WalkError};

/// How fixes are produced. Simulated movement uses a finer jitter threshold
/// because its steps are deliberately small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackingMode {
    Live,
    Simulated,
}

/// Distance accumulator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct TrackerConfig {
    /// Minimum accepted segment for live GPS (default: 1.0 m)
    pub live_min_segment_meters: f64,
    /// Minimum accepted segment for simulated movement (default: 0.5 m)
    pub simulated_min_segment_meters: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            live_min_segment_meters: 1.0,
            simulated_min_segment_meters: 0.5,
        }
    }
}

impl TrackerConfig {
    pub fn min_segment_meters(&self, mode: TrackingMode) -> f64 {
        match mode {
            TrackingMode::Live => self.live_min_segment_meters,
            TrackingMode::Simulated => self.simulated_min_segment_meters,
        }
    }
}

/// Progress matcher and completion policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ProgressConfig {
    /// Max distance to the nearest course point to count as on-course (default: 30 m)
    pub snap_threshold_meters: f64,
    /// Radius around the course end that qualifies for completion (default: 20 m)
    pub completion_radius_meters: f64,
    /// Share of the course length that must be walked before completion (default: 0.5)
    pub completion_min_ratio: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            snap_threshold_meters: 30.0,
            completion_radius_meters: 20.0,
            completion_min_ratio: 0.5,
        }
    }
}

/// Periodic track sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Interval between sync attempts (default: 4 s)
    #[serde(with = "duration_millis")]
    pub interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(4) }
    }
}

/// Map capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapConfig {
    /// Time given to the map to finish drawing before the snapshot (default: 500 ms)
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,
    /// Fallback canvas width in pixels
    pub canvas_width: u32,
    /// Fallback canvas height in pixels
    pub canvas_height: u32,
    /// Padding around the path on the fallback canvas
    pub canvas_padding: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            canvas_width: 800,
            canvas_height: 600,
            canvas_padding: 40,
        }
    }
}

/// Walk API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: &str, access_token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            refresh_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Load from `WALK_API_BASE_URL`, `WALK_API_TOKEN`, `WALK_API_REFRESH_TOKEN`
    /// and `WALK_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let base_url = required("WALK_API_BASE_URL")?;
        let access_token = required("WALK_API_TOKEN")?;
        let refresh_token = env::var("WALK_API_REFRESH_TOKEN").ok();
        let timeout_secs: u64 = try_load("WALK_API_TIMEOUT_SECS", 30)?;

        Ok(Self {
            refresh_token,
            timeout: Duration::from_secs(timeout_secs),
            ..Self::new(&base_url, &access_token)
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| WalkError::Config(format!("{key} is not set")))
}

fn try_load<T: FromStr + Display>(key: &str, default: T) -> Result<T>
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| {
            warn!("Invalid {key} value: {e}");
            WalkError::Config(format!("invalid {key}: {e}"))
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
