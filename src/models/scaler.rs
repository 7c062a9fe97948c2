//! Pre-fitted feature scalers loaded from a JSON artifact
//!
//! The artifact mirrors the fitted attributes of the usual scikit-learn
//! scalers (`n_features_in_`, `feature_names_in_`, `mean_`, `scale_`,
//! `min_`) so that an export script only has to dump them:
//!
//! ```json
//! {"kind": "standard", "n_features_in": 4,
//!  "feature_names": ["heart_rate", "temperature", "spo2", "vibration_intensity"],
//!  "mean": [80.0, 36.9, 96.0, 0.4], "scale": [12.0, 0.6, 2.1, 0.3]}
//! ```

use super::{FeatureMatrix, Scaler};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Standardization: `(x - mean) / scale`
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    pub n_features_in: usize,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// `None` when fitted with `with_mean=False`
    #[serde(default)]
    pub mean: Option<Vec<f64>>,
    /// `None` when fitted with `with_std=False`
    #[serde(default)]
    pub scale: Option<Vec<f64>>,
}

/// Min-max scaling: `x * scale + min`
#[derive(Debug, Clone, Deserialize)]
pub struct MinMaxScaler {
    pub n_features_in: usize,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub min: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Scaler artifact as stored on disk
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub enum ScalerArtifact {
    #[serde(rename = "standard")]
    Standard(StandardScaler),
    #[serde(rename = "minmax")]
    MinMax(MinMaxScaler),
}

impl ScalerArtifact {
    /// Load and validate a scaler artifact from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read scaler artifact {}", path.display()))?;
        Self::from_slice(&raw)
            .with_context(|| format!("Invalid scaler artifact {}", path.display()))
    }

    /// Parse and validate a scaler artifact from JSON bytes
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let artifact: ScalerArtifact =
            serde_json::from_slice(raw).context("Failed to parse scaler JSON")?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ScalerArtifact::Standard(_) => "standard",
            ScalerArtifact::MinMax(_) => "minmax",
        }
    }

    fn validate(&self) -> Result<()> {
        let n = self.expected_features();
        if n == 0 {
            anyhow::bail!("n_features_in must be positive");
        }

        let check = |name: &str, len: Option<usize>| -> Result<()> {
            match len {
                Some(len) if len != n => {
                    anyhow::bail!("{} has {} entries, n_features_in is {}", name, len, n)
                }
                _ => Ok(()),
            }
        };

        check("feature_names", self.feature_names().map(<[String]>::len))?;
        match self {
            ScalerArtifact::Standard(s) => {
                check("mean", s.mean.as_ref().map(Vec::len))?;
                check("scale", s.scale.as_ref().map(Vec::len))?;
                let values = s.mean.iter().chain(s.scale.iter()).flatten();
                ensure_finite(values)?;
            }
            ScalerArtifact::MinMax(s) => {
                check("min", Some(s.min.len()))?;
                check("scale", Some(s.scale.len()))?;
                ensure_finite(s.min.iter().chain(s.scale.iter()))?;
            }
        }

        if let Some(names) = self.feature_names() {
            let mut seen = std::collections::HashSet::new();
            if let Some(dup) = names.iter().find(|name| !seen.insert(name.as_str())) {
                anyhow::bail!("feature_names contains '{}' twice", dup);
            }
        }
        Ok(())
    }
}

fn ensure_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> Result<()> {
    if values.any(|v| !v.is_finite()) {
        anyhow::bail!("scaler parameters must be finite");
    }
    Ok(())
}

impl Scaler for ScalerArtifact {
    fn expected_features(&self) -> usize {
        match self {
            ScalerArtifact::Standard(s) => s.n_features_in,
            ScalerArtifact::MinMax(s) => s.n_features_in,
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        match self {
            ScalerArtifact::Standard(s) => s.feature_names.as_deref(),
            ScalerArtifact::MinMax(s) => s.feature_names.as_deref(),
        }
    }

    fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        if matrix.cols() != self.expected_features() {
            anyhow::bail!(
                "scaler expects {} features, matrix has {}",
                self.expected_features(),
                matrix.cols()
            );
        }

        let scaled = match self {
            ScalerArtifact::Standard(s) => matrix.map_columns(|col, v| {
                let centered = match &s.mean {
                    Some(mean) => v - mean[col],
                    None => v,
                };
                match &s.scale {
                    // zero-variance features are left unscaled
                    Some(scale) if scale[col] != 0.0 => centered / scale[col],
                    _ => centered,
                }
            }),
            ScalerArtifact::MinMax(s) => matrix.map_columns(|col, v| v * s.scale[col] + s.min[col]),
        };
        Ok(scaled)
    }
}
