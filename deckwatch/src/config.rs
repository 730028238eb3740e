//! Persistent application configuration.
//!
//! Stored as JSON in a platform-appropriate config directory, or read from an
//! explicit path given on the command line.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{error::Error, tracker::TrackerConfig};

/// Upper bound for every `*_s` setting.
pub const MAX_SECONDS: f32 = 3600.0;

/// Seconds from the config as a duration. Negative and NaN count as zero and
/// values too large for a [`Duration`] saturate.
pub fn seconds(s: f32) -> Duration {
    Duration::try_from_secs_f32(s.max(0.0)).unwrap_or(Duration::MAX)
}

/// One capture backend. `sources` in [`CaptureConfig`] lists them in fallback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureSource {
    /// Whole monitor by index (`xcap` feature).
    Monitor { index: usize },
    /// Window whose `xcap::Window::app_name()` matches (`xcap` feature).
    Window { app_name: String },
    /// PNG frames from a directory, in file name order.
    Replay {
        dir: PathBuf,
        #[serde(default)]
        looped: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub sources: Vec<CaptureSource>,
    /// Seconds between captures. Must stay well under the fastest play interval.
    pub poll_delay_s: f32,
    /// Longest the loop waits for a frame before counting a failure.
    pub frame_timeout_s: f32,
    /// Pause after a failed capture.
    pub retry_delay_s: f32,
    /// Consecutive failures before giving up.
    pub max_failures: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sources: vec![CaptureSource::Monitor { index: 0 }],
            poll_delay_s: 0.1,
            frame_timeout_s: 2.0,
            retry_delay_s: 1.0,
            max_failures: 5,
        }
    }
}

impl CaptureConfig {
    pub fn poll_delay(&self) -> Duration {
        seconds(self.poll_delay_s)
    }

    pub fn frame_timeout(&self) -> Duration {
        seconds(self.frame_timeout_s)
    }

    pub fn retry_delay(&self) -> Duration {
        seconds(self.retry_delay_s)
    }
}

/// Where card data lives on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// `[{"name": "Knight", "elixir": 3}, ...]`
    pub catalog: PathBuf,
    /// Reference card art.
    pub template_dirs: Vec<PathBuf>,
    /// Operator-confirmed slot images; loaded as templates and appended to during a run.
    pub user_templates: PathBuf,
    /// Slot images waiting for review are written here for the operator to look at.
    pub review_dir: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("cards/cards.json"),
            template_dirs: vec![PathBuf::from("cards/cards-templates")],
            user_templates: PathBuf::from("cards/cards-templates-user"),
            review_dir: PathBuf::from("cards/review"),
        }
    }
}

/// On-disk configuration for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The 8 slot rectangles and the resolution they were calibrated at.
    pub regions: ie::RegionLayout,

    /// EMPTY/FULL classification parameters.
    pub classifier: ie::ClassifierConfig,

    /// Debounce, identification thresholds and elixir model.
    pub tracker: TrackerConfig,

    pub capture: CaptureConfig,

    pub assets: AssetPaths,

    /// Also print every tracker event as one JSON object per line on stdout.
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            regions: ie::RegionLayout::default(),
            classifier: ie::ClassifierConfig::default(),
            tracker: TrackerConfig::default(),
            capture: CaptureConfig::default(),
            assets: AssetPaths::default(),
            json_output: false,
        }
    }
}

impl Config {
    /// Path to the config file.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("deckwatch.json"))
    }

    /// Load configuration from disk, falling back to defaults on missing file.
    pub fn load_or_default() -> Self {
        match Self::try_load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load config; using defaults");
                Self::default()
            }
        }
    }

    /// Try to load configuration from the default location. On first run the
    /// defaults are written there so the operator has a file to edit.
    pub fn try_load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            let cfg = Self::default();
            match cfg.save() {
                Ok(()) => tracing::info!(path = %path.display(), "wrote default config"),
                Err(err) => tracing::warn!(error = %format!("{err:#}"), "failed to write default config"),
            }
            return Ok(cfg);
        }
        Self::load_from(&path)
    }

    /// Load an explicitly named config file. Unlike the default location, it must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        Ok(cfg)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    /// Checks that make a run pointless; all of them are fatal at startup.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| Err(Error::Config(msg));

        if let Err(err) = self.regions.validate() {
            return invalid(format!("{err:#}"));
        }

        let c = &self.classifier;
        if !(0.0..=1.0).contains(&c.empty_fraction) || c.empty_fraction == 0.0 {
            return invalid(format!("classifier.empty_fraction must be in (0, 1], got {}", c.empty_fraction));
        }
        if !(0.0..0.5).contains(&c.sample_inset) {
            return invalid(format!("classifier.sample_inset must be in [0, 0.5), got {}", c.sample_inset));
        }
        if c.sample_stride == 0 {
            return invalid("classifier.sample_stride must be at least 1".into());
        }
        if c.background.colors.is_empty() {
            return invalid("classifier.background needs at least one colour".into());
        }

        let t = &self.tracker;
        let durations = [
            ("tracker.regen_interval_s", Some(t.regen_interval_s)),
            ("tracker.double_elixir_after_s", t.double_elixir_after_s),
            ("tracker.identify.settle_s", Some(t.identify.settle_s)),
            ("capture.poll_delay_s", Some(self.capture.poll_delay_s)),
            ("capture.frame_timeout_s", Some(self.capture.frame_timeout_s)),
            ("capture.retry_delay_s", Some(self.capture.retry_delay_s)),
        ];
        for (name, value) in durations {
            if let Some(value) = value.filter(|v| !(0.0..=MAX_SECONDS).contains(v)) {
                return invalid(format!("{name} must be in [0, {MAX_SECONDS}] seconds, got {value}"));
            }
        }
        if t.debounce_frames < 2 {
            return invalid(format!("tracker.debounce_frames must be at least 2, got {}", t.debounce_frames));
        }
        let id = &t.identify;
        if !(0.0..=1.0).contains(&id.high_threshold) || !(0.0..=1.0).contains(&id.floor) {
            return invalid("tracker.identify thresholds must be in [0, 1]".into());
        }
        if id.floor > id.high_threshold {
            return invalid(format!(
                "tracker.identify.floor ({}) is above high_threshold ({})",
                id.floor, id.high_threshold
            ));
        }
        if !(0.0..=10.0).contains(&t.initial_elixir) {
            return invalid(format!("tracker.initial_elixir must be in [0, 10], got {}", t.initial_elixir));
        }
        if t.regen_interval_s <= 0.0 {
            return invalid("tracker.regen_interval_s must be positive".into());
        }

        if self.capture.sources.is_empty() {
            return invalid("capture.sources is empty".into());
        }
        if self.capture.frame_timeout_s <= 0.0 {
            return invalid("capture.frame_timeout_s must be positive".into());
        }
        if self.capture.max_failures == 0 {
            return invalid("capture.max_failures must be at least 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_files_fill_in_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("deckwatch.json");
        fs::write(
            &path,
            r#"{
                "tracker": { "identify": { "high_threshold": 0.9 } },
                "capture": { "sources": [ { "kind": "replay", "dir": "frames" } ] },
                "json_output": true
            }"#,
        )?;

        let cfg = Config::load_from(&path)?;
        assert_eq!(cfg.tracker.identify.high_threshold, 0.9);
        assert_eq!(cfg.tracker.identify.floor, 0.35);
        assert_eq!(cfg.tracker.debounce_frames, 2);
        assert_eq!(
            cfg.capture.sources,
            vec![CaptureSource::Replay { dir: PathBuf::from("frames"), looped: false }]
        );
        assert_eq!(cfg.capture.max_failures, 5);
        assert!(cfg.json_output);
        assert_eq!(cfg.regions, ie::RegionLayout::default());
        Ok(())
    }

    #[test]
    fn save_and_load_agree() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("deckwatch.json");
        let mut cfg = Config::default();
        cfg.tracker.regen_interval_s = 1.4;
        cfg.capture.sources.push(CaptureSource::Window { app_name: "game".into() });
        cfg.save_to(&path)?;
        assert_eq!(Config::load_from(&path)?, cfg);
        Ok(())
    }

    #[test]
    fn validation_rejects_fatal_settings() {
        let mut cfg = Config::default();
        cfg.regions.regions.truncate(7);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let mut cfg = Config::default();
        cfg.tracker.debounce_frames = 1;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracker.identify.floor = 0.8;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.capture.sources.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn durations_must_be_finite_and_bounded() {
        let mut cfg = Config::default();
        cfg.capture.retry_delay_s = 1e30;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracker.identify.settle_s = f32::NAN;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracker.double_elixir_after_s = Some(f32::INFINITY);
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.tracker.double_elixir_after_s = Some(120.0);
        cfg.validate().unwrap();

        assert_eq!(seconds(1e30), Duration::MAX);
        assert_eq!(seconds(f32::NAN), Duration::ZERO);
        assert_eq!(seconds(-2.0), Duration::ZERO);
        assert_eq!(seconds(0.5), Duration::from_millis(500));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Config::load_from(Path::new("/nonexistent/deckwatch.json")).is_err());
    }
}
