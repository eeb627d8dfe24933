//! Inference module: the image-to-ranking pipeline
//!
//! This module provides:
//! - Image preprocessing (decode, resize, normalize)
//! - Ranking of classifier logits into a top-K shortlist
//! - The end-to-end predictor and a worker pool for concurrent callers
//! - Latency benchmarking

pub mod benchmark;
pub mod pool;
pub mod predictor;
pub mod preprocess;
pub mod ranker;

// Re-export main types for convenience
pub use benchmark::{run_benchmark, BenchmarkConfig, BenchmarkResult, LatencyStats};
pub use pool::InferencePool;
pub use predictor::{DetailedPrediction, Predictor};
pub use preprocess::Preprocessor;
pub use ranker::{softmax, top_k, Logits, Prediction, Ranker, ResultSet};
