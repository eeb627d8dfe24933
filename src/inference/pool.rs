//! Inference worker pool
//!
//! Forward passes are CPU/GPU bound, so they run on dedicated threads instead
//! of the async runtime. Each worker owns a clone of the [`Predictor`]; the
//! clones share the loaded weight buffers and nothing is ever written to them,
//! so requests run in parallel without locks. Jobs arrive over a bounded
//! `async_channel` queue and answer through a `oneshot` channel; when the
//! queue is full a request is refused instead of waiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use burn::tensor::backend::Backend;
use async_channel::TrySendError;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::inference::predictor::Predictor;
use crate::inference::ranker::ResultSet;
use crate::utils::error::{DefectError, Result};

/// One image to classify and where to send the answer
struct InferenceJob {
    bytes: Vec<u8>,
    top_k: Option<usize>,
    response: oneshot::Sender<Result<ResultSet>>,
}

/// Fixed set of worker threads running the pipeline
pub struct InferencePool {
    sender: async_channel::Sender<InferenceJob>,
    workers: Vec<JoinHandle<()>>,
    top_k: usize,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl InferencePool {
    /// Start `num_workers` threads (at least one), each with its own clone of
    /// `predictor`, behind a queue holding at most `queue_capacity` (at least
    /// one) waiting requests
    pub fn spawn<B: Backend>(
        predictor: Predictor<B>,
        num_workers: usize,
        queue_capacity: usize,
    ) -> Result<Self> {
        let num_workers = num_workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = async_channel::bounded::<InferenceJob>(queue_capacity);
        let top_k = predictor.ranker().top_k();

        info!(
            "Starting inference pool with {} workers, queue capacity {}",
            num_workers, queue_capacity
        );

        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let receiver = receiver.clone();
            let predictor = predictor.clone();

            let handle = std::thread::Builder::new()
                .name(format!("inference-{}", worker_id))
                .spawn(move || {
                    while let Ok(job) = receiver.recv_blocking() {
                        let result = match job.top_k {
                            Some(k) => predictor.predict_with_k(&job.bytes, k),
                            None => predictor.predict(&job.bytes),
                        };

                        if job.response.send(result).is_err() {
                            debug!(worker_id, "request dropped before its result was ready");
                        }
                    }
                    debug!(worker_id, "inference worker stopped");
                })
                .map_err(DefectError::Io)?;

            workers.push(handle);
        }

        Ok(Self {
            sender,
            workers,
            top_k,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// Classify an encoded image with the configured K
    pub async fn predict(&self, bytes: Vec<u8>) -> Result<ResultSet> {
        self.submit(bytes, None).await
    }

    /// Classify an encoded image, keeping `k` results
    pub async fn predict_with_k(&self, bytes: Vec<u8>, k: usize) -> Result<ResultSet> {
        self.submit(bytes, Some(k)).await
    }

    async fn submit(&self, bytes: Vec<u8>, top_k: Option<usize>) -> Result<ResultSet> {
        let (response, receiver) = oneshot::channel();

        let job = InferenceJob {
            bytes,
            top_k,
            response,
        };
        self.sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => {
                warn!("inference queue full, refusing request");
                DefectError::Unavailable("inference queue is full".to_string())
            }
            TrySendError::Closed(_) => {
                DefectError::Unavailable("inference pool is shut down".to_string())
            }
        })?;

        let result = receiver.await.map_err(|_| {
            error!("inference worker exited without answering");
            DefectError::Unavailable("inference worker exited".to_string())
        })?;

        match &result {
            Ok(_) => self.completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };

        result
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// K used when a request does not ask for a specific one
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// (completed, failed) request counts
    pub fn stats(&self) -> (u64, u64) {
        (
            self.completed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }

    /// Stop accepting work and wait for the workers to drain the queue
    pub fn shutdown(mut self) {
        self.sender.close();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("inference worker panicked");
            }
        }
    }
}

impl Drop for InferencePool {
    fn drop(&mut self) {
        // Workers exit once the queue is closed and empty
        self.sender.close();
    }
}
