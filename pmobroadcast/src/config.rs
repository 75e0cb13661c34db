//! Configuration structures for the broadcast engine.
//!
//! The `broadcast` subtree of the pmoconfig YAML maps onto these structs.
//! Every field has a default so a partial (or missing) subtree still yields
//! a working engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Top-level configuration block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcastConfig {
    #[serde(default)]
    pub hls: HlsConfig,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub inactivity: InactivityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl BroadcastConfig {
    pub fn load_from_pmoconfig() -> anyhow::Result<Self> {
        Self::from_config(&pmoconfig::get_config())
    }

    pub fn from_config(config: &pmoconfig::Config) -> anyhow::Result<Self> {
        match config.get_value(&["broadcast"]) {
            Ok(value) => match serde_yaml::from_value(value) {
                Ok(config) => Ok(config),
                Err(err) => {
                    warn!("Invalid broadcast configuration, using defaults: {err}");
                    Ok(Self::default())
                }
            },
            Err(_) => Ok(Self::default()),
        }
    }
}

/// Segment window tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HlsConfig {
    #[serde(default = "HlsConfig::default_segment_duration")]
    pub segment_duration_secs: u32,
    #[serde(default = "HlsConfig::default_max_visible")]
    pub max_visible_segments: usize,
    #[serde(default = "HlsConfig::default_refill_threshold")]
    pub refill_threshold: usize,
    #[serde(default = "HlsConfig::default_drip_per_feed")]
    pub drip_per_feed: usize,
    /// Pending segments above which an online station reports `QueueSaturated`
    #[serde(default = "HlsConfig::default_saturation")]
    pub queue_saturation_segments: usize,
}

impl HlsConfig {
    const fn default_segment_duration() -> u32 {
        10
    }

    const fn default_max_visible() -> usize {
        20
    }

    const fn default_refill_threshold() -> usize {
        5
    }

    const fn default_drip_per_feed() -> usize {
        1
    }

    const fn default_saturation() -> usize {
        60
    }

    /// Hard cap of the live buffer between two slides
    pub fn live_buffer_cap(&self) -> usize {
        self.max_visible_segments * 2
    }
}

impl Default for HlsConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: Self::default_segment_duration(),
            max_visible_segments: Self::default_max_visible(),
            refill_threshold: Self::default_refill_threshold(),
            drip_per_feed: Self::default_drip_per_feed(),
            queue_saturation_segments: Self::default_saturation(),
        }
    }
}

/// Ticker periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersConfig {
    #[serde(default = "TimersConfig::default_feeder")]
    pub feeder_interval_secs: u64,
    #[serde(default = "TimersConfig::default_slider")]
    pub slider_interval_secs: u64,
}

impl TimersConfig {
    const fn default_feeder() -> u64 {
        10
    }

    const fn default_slider() -> u64 {
        60
    }

    pub fn feeder_interval(&self) -> Duration {
        Duration::from_secs(self.feeder_interval_secs.max(1))
    }

    pub fn slider_interval(&self) -> Duration {
        Duration::from_secs(self.slider_interval_secs.max(1))
    }
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            feeder_interval_secs: Self::default_feeder(),
            slider_interval_secs: Self::default_slider(),
        }
    }
}

/// Listener statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "StatsConfig::default_window")]
    pub request_window_secs: u64,
}

impl StatsConfig {
    const fn default_window() -> u64 {
        300
    }

    pub fn request_window(&self) -> Duration {
        Duration::from_secs(self.request_window_secs)
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            request_window_secs: Self::default_window(),
        }
    }
}

/// Idle station reaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InactivityConfig {
    #[serde(default = "InactivityConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "InactivityConfig::default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "InactivityConfig::default_idle_minutes")]
    pub idle_minutes: u64,
    /// Slugs never reaped
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl InactivityConfig {
    const fn default_enabled() -> bool {
        true
    }

    const fn default_check_interval() -> u64 {
        60
    }

    const fn default_idle_minutes() -> u64 {
        480
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_minutes * 60)
    }
}

impl Default for InactivityConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            check_interval_secs: Self::default_check_interval(),
            idle_minutes: Self::default_idle_minutes(),
            whitelist: Vec::new(),
        }
    }
}

/// Audio store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_audio_dir")]
    pub audio_dir: String,
}

impl StorageConfig {
    fn default_audio_dir() -> String {
        "audio".to_string()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            audio_dir: Self::default_audio_dir(),
        }
    }
}

/// External segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    #[serde(default = "SegmenterConfig::default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "SegmenterConfig::default_work_dir")]
    pub work_dir: String,
}

impl SegmenterConfig {
    fn default_ffmpeg_path() -> String {
        "ffmpeg".to_string()
    }

    fn default_work_dir() -> String {
        "segments".to_string()
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: Self::default_ffmpeg_path(),
            work_dir: Self::default_work_dir(),
        }
    }
}

/// Station/script/song catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "CatalogConfig::default_file")]
    pub file: String,
}

impl CatalogConfig {
    fn default_file() -> String {
        "catalog.yaml".to_string()
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            file: Self::default_file(),
        }
    }
}
