//! Application state for the steel defect server
//!
//! Everything here is built once at startup and only read by handlers.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use steel_defect::{InferencePool, LabelSet};

/// Default queue slots per inference worker
pub const QUEUE_PER_WORKER: usize = 8;

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Inference worker threads
    pub workers: usize,
    /// Requests that may wait for a worker
    pub queue_capacity: usize,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers,
            queue_capacity: workers * QUEUE_PER_WORKER,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub pool: InferencePool,
    pub labels: LabelSet,
    pub image_size: u32,
    /// Name of the compute backend, reported by /health
    pub backend: String,
    pub max_upload_bytes: usize,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        pool: InferencePool,
        labels: LabelSet,
        image_size: u32,
        backend: &str,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            pool,
            labels,
            image_size,
            backend: backend.to_string(),
            max_upload_bytes,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
