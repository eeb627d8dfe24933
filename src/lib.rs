//! # Steel Defect
//!
//! A Rust library for classifying steel surface defects from a single image
//! using the Burn framework.
//!
//! ## Pipeline
//!
//! - **Preprocessor**: decodes image bytes into a normalized `[1, 3, 224, 224]` tensor
//! - **Classifier**: a ResNet-style network loaded once from a weight artifact
//! - **Ranker**: softmax over the logits and a deterministic top-K shortlist
//!
//! ## Modules
//!
//! - `config`: Pipeline configuration (labels, image size, normalization, K, weights)
//! - `labels`: The ordered label set
//! - `model`: ResNet architecture and the weight-holding classifier
//! - `inference`: Preprocessing, ranking, the end-to-end predictor, worker pool and benchmarks
//! - `utils`: Logging and error handling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use steel_defect::backend::{default_device, DefaultBackend};
//! use steel_defect::{PipelineConfig, Predictor};
//!
//! let config = PipelineConfig::load("config.json".as_ref())?;
//! let predictor = Predictor::<DefaultBackend>::from_config(&config, &default_device())?;
//!
//! let bytes = std::fs::read("sample.jpg")?;
//! for prediction in predictor.predict(&bytes)?.iter() {
//!     println!("{}: {:.3}", prediction.label, prediction.confidence);
//! }
//! ```

pub mod backend;
pub mod config;
pub mod inference;
pub mod labels;
pub mod model;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{ModelConfig, PipelineConfig, PreprocessConfig, ResizeFilter};
pub use inference::pool::InferencePool;
pub use inference::predictor::{DetailedPrediction, Predictor};
pub use inference::preprocess::Preprocessor;
pub use inference::ranker::{softmax, Logits, Prediction, Ranker, ResultSet};
pub use labels::LabelSet;
pub use model::classifier::Classifier;
pub use model::resnet::{ResNet, ResNetConfig};
pub use utils::error::{DefectError, Result};

/// Number of steel defect classes in the default label set
pub const NUM_CLASSES: usize = 6;

/// Default square input size expected by the classifier
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Default size of the ranked shortlist
pub const DEFAULT_TOP_K: usize = 3;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
