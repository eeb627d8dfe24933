//! Pipeline Configuration Module
//!
//! Everything that determines the pipeline's behaviour besides the weights
//! themselves: label order, input size, normalization, resize filter, K and
//! the network layout the weight artifact was saved with.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::labels::{LabelSet, STEEL_DEFECT_CLASSES};
use crate::model::resnet::ResNetConfig;
use crate::utils::error::{DefectError, Result};
use crate::{DEFAULT_IMAGE_SIZE, DEFAULT_TOP_K};

/// Top-level configuration for the classification pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ordered class names, index-aligned with the classifier output
    pub labels: Vec<String>,

    /// Image decoding and normalization
    pub preprocess: PreprocessConfig,

    /// Number of ranked predictions returned per image
    pub top_k: usize,

    /// Weight artifact and network layout
    pub model: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            labels: STEEL_DEFECT_CLASSES.iter().map(|s| s.to_string()).collect(),
            preprocess: PreprocessConfig::default(),
            top_k: DEFAULT_TOP_K,
            model: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            DefectError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            DefectError::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let labels = self.label_set()?;

        if self.top_k == 0 || self.top_k > labels.len() {
            return Err(DefectError::Config(format!(
                "top_k must be in 1..={} for {} labels, got {}",
                labels.len(),
                labels.len(),
                self.top_k
            )));
        }

        self.preprocess.validate()?;
        self.model.validate()
    }

    /// The configured labels as a validated [`LabelSet`]
    pub fn label_set(&self) -> Result<LabelSet> {
        LabelSet::new(self.labels.iter().cloned())
    }

    /// Network definition matching the configured labels
    pub fn resnet_config(&self) -> ResNetConfig {
        self.model.resnet_config(self.labels.len())
    }
}

/// Resampling filter used to bring images to the input size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    /// Anti-aliased bilinear, the resize the weights were trained with
    #[default]
    PilBilinear,
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl std::fmt::Display for ResizeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResizeFilter::PilBilinear => write!(f, "pil_bilinear"),
            ResizeFilter::Nearest => write!(f, "nearest"),
            ResizeFilter::Triangle => write!(f, "triangle"),
            ResizeFilter::CatmullRom => write!(f, "catmull_rom"),
            ResizeFilter::Lanczos3 => write!(f, "lanczos3"),
        }
    }
}

/// Image preprocessing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Square side length of the network input
    pub image_size: u32,

    /// Per-channel mean (RGB) subtracted after scaling to [0, 1]
    pub mean: [f32; 3],

    /// Per-channel divisor (RGB) applied after the mean
    pub std: [f32; 3],

    /// Resampling filter
    pub filter: ResizeFilter,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        // One scalar for all channels, as in the training transform
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            mean: [0.5; 3],
            std: [0.5; 3],
            filter: ResizeFilter::default(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(DefectError::Config("image_size must be greater than 0".to_string()));
        }

        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(DefectError::Config("mean values must be finite".to_string()));
        }

        if self.std.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(DefectError::Config(
                "std values must be finite and non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Weight artifact location and the layout it was saved with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the weights: a compact `.mpk` record or a PyTorch `.pth` checkpoint
    pub weights: PathBuf,

    /// Bottleneck blocks per stage; `[3, 4, 6, 3]` is ResNet-50
    pub layers: [usize; 4],

    /// Channel width of the first stage
    pub base_width: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights: PathBuf::from("model/defect_classifier.mpk"),
            layers: [3, 4, 6, 3],
            base_width: 64,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.layers.iter().any(|&n| n == 0) {
            return Err(DefectError::Config(
                "every stage needs at least one block".to_string(),
            ));
        }

        if self.base_width == 0 {
            return Err(DefectError::Config("base_width must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn resnet_config(&self, num_classes: usize) -> ResNetConfig {
        ResNetConfig::new(num_classes)
            .with_layers(self.layers)
            .with_base_width(self.base_width)
    }
}
