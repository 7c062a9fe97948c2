//! Prediction outcome data structures

use serde::{Deserialize, Serialize};

/// One row of the display columns, field order following the configured
/// display-column order
pub type DisplayRow = serde_json::Map<String, serde_json::Value>;

/// Overall outcome for an uploaded dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Safe")]
    Safe,
    #[serde(rename = "Seizure Detected")]
    SeizureDetected,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Safe => "Safe",
            Verdict::SeizureDetected => "Seizure Detected",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running the inference service on one upload
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub verdict: Verdict,
    /// Rows scored
    pub total_rows: usize,
    /// Rows the classifier labelled positive
    pub positive_rows: usize,
    /// Unscaled display columns, input row order
    pub display_rows: Vec<DisplayRow>,
}
