// melody-core/src/lib.rs

//! The core logic for vocal pitch tracking and melody analysis.
//! This crate captures audio, detects pitch frame by frame, keeps a rolling
//! pitch history and turns it into notes, key, tempo and vocal statistics.
//! It is completely headless and contains no UI code.

pub mod audio;
pub mod error;
pub mod fft;
pub mod history;
pub mod inference;
pub mod melody;
pub mod pitch;
pub mod settings;
pub mod source;
pub mod tracker;
pub mod tuning;

pub use error::{Error, Result};
pub use history::{PitchHistory, PitchHistoryPoint};
pub use inference::{MelodyInference, MelodyTraits, PitchRange, ProfileInference, Scale};
pub use melody::{
    MelodyAnalysis, MelodyAnalyzer, MelodyAnalyzerOptions, MelodyAnalyzerOptionsUpdate, MidiNote,
    VocalCharacteristics, quick_analyze_melody, quick_analyze_vocals,
};
pub use pitch::{
    PitchDetectionResult, PitchDetector, PitchDetectorConfig, PitchDetectorConfigUpdate,
};
pub use settings::Settings;
pub use source::{ChannelSource, SampleSource};
pub use tracker::{PitchTracker, TrackerConfig};
