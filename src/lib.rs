//! NeuroGuard Library
//!
//! Seizure detection over uploaded wearable sensor readings: a CSV is
//! validated, scaled and classified row by row, and the upload is flagged if
//! any row is. A separate endpoint dispatches emergency emails with a map
//! link to the patient's location.

pub mod alert;
pub mod config;
pub mod dataset;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod server;
pub mod types;

pub use alert::AlertDispatcher;
pub use config::AppConfig;
pub use dataset::Dataset;
pub use error::{Error, Result};
pub use feature_extractor::FeatureExtractor;
pub use models::{InferenceService, ModelLoader};
pub use types::{alert::EmergencyRequest, prediction::Verdict};
