//! Reduction of per-row classifier labels into a single verdict

use crate::types::prediction::Verdict;

/// Counts of classifier labels for one upload.
///
/// The verdict is a logical OR over rows: a single positive row flags the
/// whole upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSummary {
    pub total: usize,
    pub positive: usize,
}

impl LabelSummary {
    pub fn from_labels(labels: &[bool]) -> Self {
        Self {
            total: labels.len(),
            positive: labels.iter().filter(|&&label| label).count(),
        }
    }

    pub fn verdict(&self) -> Verdict {
        if self.positive > 0 {
            Verdict::SeizureDetected
        } else {
            Verdict::Safe
        }
    }

    /// Fraction of rows labelled positive
    pub fn positive_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.positive as f64 / self.total as f64
        }
    }
}
