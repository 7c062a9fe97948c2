//! Feature extraction from uploaded datasets into model input.
//!
//! When the scaler was fitted with named features, columns are pulled in the
//! fitted order regardless of how the upload orders them. Without names the
//! upload's own column order is the contract.

use crate::dataset::{CellValue, Dataset};
use crate::error::{Error, Result};
use crate::models::FeatureMatrix;

/// Maps dataset columns onto scaler feature positions.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureExtractor {
    /// `columns[i]` is the dataset column feeding feature `i`
    columns: Vec<usize>,
}

impl FeatureExtractor {
    /// Resolve the column layout for a dataset.
    ///
    /// The caller has already checked the column count against the scaler.
    pub fn resolve(dataset: &Dataset, feature_names: Option<&[String]>) -> Result<Self> {
        let Some(names) = feature_names else {
            return Ok(Self {
                columns: (0..dataset.column_count()).collect(),
            });
        };

        let missing: Vec<&str> = names
            .iter()
            .filter(|name| dataset.column_index(name).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "Missing model feature columns: {}",
                missing.join(", ")
            )));
        }

        let columns = names
            .iter()
            .filter_map(|name| dataset.column_index(name))
            .collect();
        Ok(Self { columns })
    }

    /// Build the unscaled feature matrix.
    pub fn extract(&self, cells: &[Vec<CellValue>]) -> anyhow::Result<FeatureMatrix> {
        let mut data = Vec::with_capacity(cells.len() * self.columns.len());
        for row in cells {
            for &col in &self.columns {
                let cell = row
                    .get(col)
                    .ok_or_else(|| anyhow::anyhow!("row is missing column {}", col))?;
                data.push(cell.as_f64());
            }
        }
        FeatureMatrix::new(cells.len(), self.columns.len(), data)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_identity(&self) -> bool {
        self.columns.iter().enumerate().all(|(i, &c)| i == c)
    }
}
