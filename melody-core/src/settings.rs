//! Persistent settings for the whole pipeline, stored as JSON.
//!
//! Every field has a default, so partial files are fine:
//!
//! ```json
//! { "analyzer": { "minConfidence": 0.8, "quantize": true } }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::melody::MelodyAnalyzerOptions;
use crate::pitch::PitchDetectorConfig;
use crate::tracker::TrackerConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detector: PitchDetectorConfig,
    pub tracker: TrackerConfig,
    pub analyzer: MelodyAnalyzerOptions,
}

impl Settings {
    /// Reads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.detector.validate()?;
        log::debug!("[SETTINGS] Loaded {}", path.as_ref().display());
        Ok(settings)
    }

    /// Writes settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), text)?;
        log::debug!("[SETTINGS] Saved {}", path.as_ref().display());
        Ok(())
    }

    /// Analyzer options with the sample spacing tied to the poll interval.
    pub fn analyzer_options(&self) -> MelodyAnalyzerOptions {
        MelodyAnalyzerOptions {
            sample_interval_ms: self.tracker.poll_interval_ms as f64,
            ..self.analyzer.clone()
        }
    }
}
