//! Artifact loader: ONNX classifier and JSON scaler

use super::classifier::{LabelPolicy, OnnxClassifier};
use super::scaler::ScalerArtifact;
use super::{Classifier, Scaler};
use crate::config::{ArtifactsConfig, InferenceConfig};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Both artifacts, ready to share between requests
#[derive(Clone)]
pub struct LoadedArtifacts {
    pub scaler: Arc<dyn Scaler>,
    pub classifier: Arc<dyn Classifier>,
}

/// Loader for the pre-trained artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        // Initialize ONNX Runtime
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load both artifacts named by the configuration. Any failure here is
    /// a startup failure.
    pub fn load_all(
        &self,
        artifacts: &ArtifactsConfig,
        inference: &InferenceConfig,
    ) -> Result<LoadedArtifacts> {
        let scaler = self.load_scaler(&artifacts.scaler_path)?;
        let policy = LabelPolicy {
            positive_label: inference.positive_label,
            probability_threshold: inference.probability_threshold,
        };
        let classifier = self.load_classifier(&artifacts.classifier_path, policy)?;

        Ok(LoadedArtifacts {
            scaler: Arc::new(scaler),
            classifier: Arc::new(classifier),
        })
    }

    /// Load the scaler artifact
    pub fn load_scaler<P: AsRef<Path>>(&self, path: P) -> Result<ScalerArtifact> {
        let path = path.as_ref();
        let scaler = ScalerArtifact::load(path)?;

        info!(
            path = %path.display(),
            kind = scaler.kind(),
            features = scaler.expected_features(),
            named = scaler.feature_names().is_some(),
            "Scaler loaded successfully"
        );
        Ok(scaler)
    }

    /// Load the ONNX classifier
    pub fn load_classifier<P: AsRef<Path>>(
        &self,
        path: P,
        policy: LabelPolicy,
    ) -> Result<OnnxClassifier> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Classifier artifact not found: {}", path.display());
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "classifier".to_string());

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let (label_output, probability_output) = select_outputs(&output_names);

        if label_output.is_none() && probability_output.is_none() {
            anyhow::bail!(
                "Model {} exposes no label or probability output (outputs: {:?})",
                name,
                output_names
            );
        }

        info!(
            model = %name,
            input = %input_name,
            label_output = ?label_output,
            probability_output = ?probability_output,
            "Model loaded successfully"
        );

        Ok(OnnxClassifier::new(
            name,
            session,
            input_name,
            label_output,
            probability_output,
            policy,
        ))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

/// Pick the class-label output and the probability output by name.
///
/// skl2onnx names them `output_label` and `output_probability`; other
/// exporters use `label` / `probabilities`.
fn select_outputs(names: &[String]) -> (Option<String>, Option<String>) {
    let label = names.iter().find(|n| n.contains("label")).cloned();

    let probability = names
        .iter()
        .filter(|n| !n.contains("label"))
        .find(|n| n.contains("prob"))
        .or_else(|| {
            names
                .iter()
                .filter(|n| !n.contains("label"))
                .find(|n| n.contains("output"))
        })
        .or_else(|| names.iter().filter(|n| !n.contains("label")).last())
        .cloned();

    (label, probability)
}
