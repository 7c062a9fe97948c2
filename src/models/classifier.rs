//! ONNX-backed seizure classifier

use super::{Classifier, FeatureMatrix};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::Session;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::debug;

/// How raw model outputs become binary labels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPolicy {
    /// Class value meaning "seizure"
    pub positive_label: i64,
    /// Used only when the model exposes probabilities but no label output
    pub probability_threshold: f64,
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self {
            positive_label: 1,
            probability_threshold: 0.5,
        }
    }
}

/// Binary classifier running an ONNX model (e.g. a scikit-learn random
/// forest exported with skl2onnx).
pub struct OnnxClassifier {
    name: String,
    /// ONNX Runtime needs exclusive access to run a session
    session: Mutex<Session>,
    input_name: String,
    label_output: Option<String>,
    probability_output: Option<String>,
    policy: LabelPolicy,
}

impl OnnxClassifier {
    pub(crate) fn new(
        name: String,
        session: Session,
        input_name: String,
        label_output: Option<String>,
        probability_output: Option<String>,
        policy: LabelPolicy,
    ) -> Self {
        Self {
            name,
            session: Mutex::new(session),
            input_name,
            label_output,
            probability_output,
            policy,
        }
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<bool>> {
        let rows = matrix.rows();

        // Prepare input tensor - shape [rows, num_features]
        let shape = vec![rows as i64, matrix.cols() as i64];
        let values: Vec<f32> = matrix.as_slice().iter().map(|&v| v as f32).collect();
        let input_tensor =
            Tensor::from_array((shape, values)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .with_context(|| format!("Model {} failed to run", self.name))?;

        // Prefer the class output: it already reflects the model's own decision rule
        if let Some(output) = self.label_output.as_deref().and_then(|n| outputs.get(n)) {
            if let Ok((_, classes)) = output.try_extract_tensor::<i64>() {
                debug!(model = %self.name, rows = rows, "Labels taken from class output");
                return labels_from_classes(classes, rows, self.policy.positive_label);
            }
        }

        if let Some(output) = self.probability_output.as_deref().and_then(|n| outputs.get(n)) {
            let threshold = self.policy.probability_threshold;

            // Tensor format: [rows, classes]
            if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
                let dims: Vec<i64> = shape.iter().copied().collect();
                return labels_from_probabilities(&dims, data, rows, threshold);
            }

            // Sequence format: seq(map(int64, float)), one map per row
            let dtype = output.dtype();
            if DynSequenceValueType::can_downcast(&dtype) {
                let probabilities =
                    probabilities_from_sequence(output, self.policy.positive_label)?;
                if probabilities.len() != rows {
                    anyhow::bail!(
                        "probability output has {} rows, input had {}",
                        probabilities.len(),
                        rows
                    );
                }
                return Ok(probabilities.iter().map(|&p| p >= threshold).collect());
            }
        }

        anyhow::bail!(
            "Model {} produced no usable label or probability output",
            self.name
        )
    }
}

/// Labels from an int64 class tensor of shape `[rows]` or `[rows, 1]`
pub(crate) fn labels_from_classes(classes: &[i64], rows: usize, positive: i64) -> Result<Vec<bool>> {
    if classes.len() != rows {
        anyhow::bail!(
            "label output has {} entries, input had {} rows",
            classes.len(),
            rows
        );
    }
    Ok(classes.iter().map(|&class| class == positive).collect())
}

/// Labels from a probability tensor.
///
/// `[rows, n]` with `n >= 2` reads the class-1 column, `[rows, 1]` and
/// `[rows]` hold the positive probability directly.
pub(crate) fn labels_from_probabilities(
    dims: &[i64],
    data: &[f32],
    rows: usize,
    threshold: f64,
) -> Result<Vec<bool>> {
    let per_row = match dims {
        [r, n] if *r as usize == rows && *n >= 1 => *n as usize,
        [r] if *r as usize == rows => 1,
        _ => anyhow::bail!(
            "unexpected probability shape {:?} for {} input rows",
            dims,
            rows
        ),
    };
    if data.len() != rows * per_row {
        anyhow::bail!(
            "probability output has {} values, expected {}",
            data.len(),
            rows * per_row
        );
    }

    let column = if per_row >= 2 { 1 } else { 0 };
    Ok((0..rows)
        .map(|r| data[r * per_row + column] as f64 >= threshold)
        .collect())
}

/// Positive-class probability for every map in a seq(map(int64, float)) output
fn probabilities_from_sequence(output: &DynValue, positive: i64) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    maps.iter()
        .map(|map_value| {
            let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
            positive_probability(&kv_pairs, positive)
        })
        .collect()
}

/// Probability of `positive` from one class-probability map
pub(crate) fn positive_probability(kv_pairs: &[(i64, f32)], positive: i64) -> Result<f64> {
    if let Some((_, prob)) = kv_pairs.iter().find(|(class, _)| *class == positive) {
        return Ok(*prob as f64);
    }
    // binary model whose map only lists the other class
    if let [(_, prob)] = kv_pairs {
        return Ok(1.0 - *prob as f64);
    }
    anyhow::bail!("No probability for class {} in output map", positive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_from_classes() {
        assert_eq!(
            labels_from_classes(&[0, 1, 0], 3, 1).unwrap(),
            vec![false, true, false]
        );
        assert!(labels_from_classes(&[0, 1], 3, 1).is_err());
    }

    #[test]
    fn test_labels_from_two_class_probabilities() {
        let data = [0.9, 0.1, 0.3, 0.7, 0.5, 0.5];
        let labels = labels_from_probabilities(&[3, 2], &data, 3, 0.5).unwrap();
        assert_eq!(labels, vec![false, true, true]);
    }

    #[test]
    fn test_labels_from_single_probability() {
        let labels = labels_from_probabilities(&[2], &[0.2, 0.8], 2, 0.5).unwrap();
        assert_eq!(labels, vec![false, true]);

        let labels = labels_from_probabilities(&[2, 1], &[0.6, 0.4], 2, 0.5).unwrap();
        assert_eq!(labels, vec![true, false]);
    }

    #[test]
    fn test_probability_shape_mismatch() {
        assert!(labels_from_probabilities(&[2, 2], &[0.1, 0.9, 0.2, 0.8], 3, 0.5).is_err());
        assert!(labels_from_probabilities(&[2, 2], &[0.1, 0.9], 2, 0.5).is_err());
        assert!(labels_from_probabilities(&[1, 2, 2], &[0.0; 4], 1, 0.5).is_err());
    }

    #[test]
    fn test_positive_probability_from_map() {
        assert_eq!(positive_probability(&[(0, 0.25), (1, 0.75)], 1).unwrap(), 0.75);
        assert_eq!(positive_probability(&[(0, 0.25)], 1).unwrap(), 0.75);
        assert!(positive_probability(&[], 1).is_err());
        assert!(positive_probability(&[(2, 0.5), (3, 0.5)], 1).is_err());
    }
}
