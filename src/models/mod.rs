//! Pre-trained artifacts and the inference service built on them

pub mod aggregator;
pub mod classifier;
pub mod inference;
pub mod loader;
pub mod scaler;

pub use aggregator::LabelSummary;
pub use classifier::OnnxClassifier;
pub use inference::InferenceService;
pub use loader::{LoadedArtifacts, ModelLoader};
pub use scaler::ScalerArtifact;

use anyhow::Result;

/// Dense row-major matrix of feature values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Build a matrix from row-major data
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            anyhow::bail!(
                "matrix data has {} values, expected {} x {}",
                data.len(),
                rows,
                cols
            );
        }
        Ok(Self { rows, cols, data })
    }

    /// Build a matrix from equally sized rows
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                anyhow::bail!("row {} has {} values, expected {}", i, row.len(), cols);
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Apply `f(column, value)` to every cell, producing a new matrix
    pub fn map_columns<F>(&self, f: F) -> Self
    where
        F: Fn(usize, f64) -> f64,
    {
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(i, &v)| f(i % self.cols, v))
            .collect();
        Self {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }
}

/// Pre-fitted normalization transform with a fixed input arity
pub trait Scaler: Send + Sync {
    /// Number of columns `transform` accepts
    fn expected_features(&self) -> usize;

    /// Feature names the scaler was fitted with, in column order
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Normalize a matrix. Pure: never mutates the scaler.
    fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix>;
}

/// Pre-trained binary classifier over normalized feature rows
pub trait Classifier: Send + Sync {
    /// Human-readable model identifier
    fn name(&self) -> &str;

    /// One label per input row, `true` meaning seizure
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<bool>>;
}
