//! Inference service: CSV upload in, verdict and display rows out

use crate::dataset::{CellValue, Dataset};
use crate::error::{Error, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::models::aggregator::LabelSummary;
use crate::models::{Classifier, FeatureMatrix, LoadedArtifacts, Scaler};
use crate::types::prediction::{DisplayRow, PredictionOutcome};
use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Known-normal reading used to smoke-test the artifacts at startup:
/// heart rate, temperature, SpO2, vibration intensity
pub const REFERENCE_READING: [f64; 4] = [60.0, 36.5, 98.0, 0.1];

/// Validates uploads against the artifact contract and runs the model.
///
/// Holds only immutable, shared state; one instance serves every request.
pub struct InferenceService {
    scaler: Arc<dyn Scaler>,
    classifier: Arc<dyn Classifier>,
    display_columns: Vec<String>,
}

impl InferenceService {
    pub fn new(
        scaler: Arc<dyn Scaler>,
        classifier: Arc<dyn Classifier>,
        display_columns: Vec<String>,
    ) -> Self {
        Self {
            scaler,
            classifier,
            display_columns,
        }
    }

    pub fn from_artifacts(artifacts: LoadedArtifacts, display_columns: Vec<String>) -> Self {
        Self::new(artifacts.scaler, artifacts.classifier, display_columns)
    }

    /// Column count every upload must have
    pub fn expected_features(&self) -> usize {
        self.scaler.expected_features()
    }

    pub fn display_columns(&self) -> &[String] {
        &self.display_columns
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Validate, scale and classify an uploaded CSV.
    ///
    /// Validation happens in full before the scaler or classifier is touched.
    pub fn predict(&self, csv_bytes: &[u8]) -> Result<PredictionOutcome> {
        let dataset = Dataset::from_csv_bytes(csv_bytes)?;

        let expected = self.expected_features();
        if dataset.column_count() != expected {
            return Err(Error::validation(format!(
                "Expected {} features, got {}",
                expected,
                dataset.column_count()
            )));
        }

        let missing = dataset.missing_columns(&self.display_columns);
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "Missing required columns: {}",
                missing.join(", ")
            )));
        }

        let cells = dataset.cells()?;
        let extractor = FeatureExtractor::resolve(&dataset, self.scaler.feature_names())?;
        if !extractor.is_identity() {
            debug!("Upload columns reordered to the fitted feature order");
        }

        debug!(
            rows = dataset.row_count(),
            features = extractor.feature_count(),
            "Upload validated"
        );

        let labels = extractor
            .extract(&cells)
            .and_then(|matrix| self.classify(&matrix))
            .map_err(Error::internal)?;

        let summary = LabelSummary::from_labels(&labels);
        let display_rows = self.display_rows(&dataset, &cells)?;

        info!(
            rows = summary.total,
            positive_rows = summary.positive,
            positive_rate = summary.positive_rate(),
            verdict = %summary.verdict(),
            "Prediction complete"
        );

        Ok(PredictionOutcome {
            verdict: summary.verdict(),
            total_rows: summary.total,
            positive_rows: summary.positive,
            display_rows,
        })
    }

    /// Scale then classify an unscaled matrix, one label per row
    pub fn classify(&self, matrix: &FeatureMatrix) -> anyhow::Result<Vec<bool>> {
        let scaled = self
            .scaler
            .transform(matrix)
            .context("Scaler transform failed")?;
        let labels = self
            .classifier
            .predict(&scaled)
            .with_context(|| format!("Classifier {} failed", self.classifier.name()))?;

        if labels.len() != matrix.rows() {
            anyhow::bail!(
                "Classifier returned {} labels for {} rows",
                labels.len(),
                matrix.rows()
            );
        }
        Ok(labels)
    }

    /// Run the reference reading through both artifacts.
    ///
    /// Returns `None` when the artifacts do not take four features, in which
    /// case the reference row does not apply.
    pub fn sanity_check(&self) -> anyhow::Result<Option<bool>> {
        if self.expected_features() != REFERENCE_READING.len() {
            warn!(
                expected = self.expected_features(),
                "Skipping startup sanity prediction: artifacts are not 4-feature"
            );
            return Ok(None);
        }

        let matrix = FeatureMatrix::from_rows(&[REFERENCE_READING.to_vec()])?;
        let labels = self.classify(&matrix).context("Startup sanity prediction failed")?;
        Ok(labels.first().copied())
    }

    fn display_rows(&self, dataset: &Dataset, cells: &[Vec<CellValue>]) -> Result<Vec<DisplayRow>> {
        let indices = self
            .display_columns
            .iter()
            .map(|name| {
                dataset
                    .column_index(name)
                    .map(|idx| (name, idx))
                    .ok_or_else(|| Error::internal(anyhow::anyhow!("display column {} vanished", name)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(cells
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|(name, idx)| ((*name).clone(), row[*idx].to_json()))
                    .collect()
            })
            .collect())
    }
}
