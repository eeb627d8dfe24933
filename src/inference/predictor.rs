//! Inference Predictor Module
//!
//! Runs the full pipeline on one encoded image:
//! bytes -> [`Preprocessor`] -> tensor -> [`Classifier`] -> logits -> [`Ranker`] -> results.

use std::time::{Duration, Instant};

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::inference::preprocess::Preprocessor;
use crate::inference::ranker::{top_k, Prediction, Ranker, ResultSet};
use crate::model::classifier::Classifier;
use crate::utils::error::Result;

/// Ranked results plus the full distribution and timing of one prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedPrediction {
    /// Top-K predictions
    pub results: Vec<Prediction>,

    /// Probability of every class, in label order
    pub probabilities: Vec<f32>,

    /// End-to-end time in milliseconds
    pub inference_time_ms: f64,
}

impl DetailedPrediction {
    /// Shannon entropy of the distribution (measure of uncertainty)
    pub fn entropy(&self) -> f32 {
        self.probabilities
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum()
    }

    /// Gap between the two most probable classes
    pub fn margin(&self) -> f32 {
        let top = top_k(&self.probabilities, 2);
        match (top.first(), top.get(1)) {
            (Some(first), Some(second)) => first.1 - second.1,
            (Some(only), None) => only.1,
            _ => 0.0,
        }
    }

    pub fn result_set(&self) -> ResultSet {
        ResultSet {
            results: self.results.clone(),
        }
    }
}

/// End-to-end predictor: one preprocessor, one loaded classifier, one ranker
#[derive(Debug, Clone)]
pub struct Predictor<B: Backend> {
    preprocessor: Preprocessor,
    classifier: Classifier<B>,
    ranker: Ranker,
}

impl<B: Backend> Predictor<B> {
    /// Assemble a predictor from parts
    pub fn new(preprocessor: Preprocessor, classifier: Classifier<B>, ranker: Ranker) -> Self {
        Self {
            preprocessor,
            classifier,
            ranker,
        }
    }

    /// Validate `config` and load its weights (compact artifact or PyTorch checkpoint)
    pub fn from_config(config: &PipelineConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let labels = config.label_set()?;
        let classifier =
            Classifier::open(&config.model.weights, &config.resnet_config(), device)?;

        info!(
            "Predictor ready: {} labels, {}x{} input, top-{}",
            labels.len(),
            config.preprocess.image_size,
            config.preprocess.image_size,
            config.top_k
        );

        Ok(Self {
            preprocessor: Preprocessor::new(&config.preprocess),
            classifier,
            ranker: Ranker::new(labels, config.top_k)?,
        })
    }

    /// Classify an encoded image with the configured K
    pub fn predict(&self, bytes: &[u8]) -> Result<ResultSet> {
        self.predict_with_k(bytes, self.ranker.top_k())
    }

    /// Classify an encoded image and keep `k` results
    pub fn predict_with_k(&self, bytes: &[u8], k: usize) -> Result<ResultSet> {
        let input = self
            .preprocessor
            .preprocess::<B>(bytes, self.classifier.device())?;
        let logits = self.classifier.classify(input)?;
        self.ranker.rank(&logits, k)
    }

    /// Classify and report the full distribution and timing
    pub fn predict_detailed(&self, bytes: &[u8], k: usize) -> Result<DetailedPrediction> {
        let start = Instant::now();

        let input = self
            .preprocessor
            .preprocess::<B>(bytes, self.classifier.device())?;
        let logits = self.classifier.classify(input)?;
        let probabilities = self.ranker.probabilities(&logits)?;
        let results = self.ranker.rank(&logits, k)?.results;

        let elapsed: Duration = start.elapsed();
        debug!("prediction took {:.2} ms", elapsed.as_secs_f64() * 1000.0);

        Ok(DetailedPrediction {
            results,
            probabilities,
            inference_time_ms: elapsed.as_secs_f64() * 1000.0,
        })
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn classifier(&self) -> &Classifier<B> {
        &self.classifier
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }
}
