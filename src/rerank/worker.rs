//! Dedicated inference thread
//!
//! Model runtimes are not safely reentrant, so exactly one OS thread owns the
//! encoder. Jobs arrive FIFO over a channel and at most one batch executes at
//! any moment, however many requests are waiting.

use super::{CrossEncoder, ScoringPair};
use crate::error::{Error, Result};
use std::sync::Mutex;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

/// Jobs that may wait for the worker before senders block
const QUEUE_DEPTH: usize = 64;

enum Command {
    Score {
        pairs: Vec<ScoringPair>,
        batch_size: usize,
        reply: oneshot::Sender<Result<Vec<f32>>>,
    },
    Predict {
        pairs: Vec<ScoringPair>,
        reply: oneshot::Sender<Result<Vec<f32>>>,
    },
    Shutdown,
}

/// Handle to the scoring thread
pub struct ScoringWorker {
    tx: mpsc::Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScoringWorker {
    /// Move `encoder` onto a fresh thread and start serving jobs
    pub fn spawn(encoder: Box<dyn CrossEncoder>) -> Result<Self> {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);

        let handle = std::thread::Builder::new()
            .name("scoring-worker".to_string())
            .spawn(move || run(encoder, rx))
            .map_err(|e| Error::Initialization(format!("Failed to spawn scoring worker: {}", e)))?;

        Ok(Self {
            tx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Score `pairs` in batches of `batch_size`, waiting behind earlier jobs
    pub async fn score(&self, pairs: Vec<ScoringPair>, batch_size: usize) -> Result<Vec<f32>> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(Command::Score {
                pairs,
                batch_size,
                reply,
            })
            .await
            .map_err(|_| Error::Scoring("Scoring worker is not running".to_string()))?;

        rx.await
            .map_err(|_| Error::Scoring("Scoring worker dropped the job".to_string()))?
    }

    /// Run the encoder once on `pairs` and return its raw output, unchecked
    pub async fn predict_raw(&self, pairs: Vec<ScoringPair>) -> Result<Vec<f32>> {
        let (reply, rx) = oneshot::channel();

        self.tx
            .send(Command::Predict { pairs, reply })
            .await
            .map_err(|_| Error::Scoring("Scoring worker is not running".to_string()))?;

        rx.await
            .map_err(|_| Error::Scoring("Scoring worker dropped the job".to_string()))?
    }

    /// Stop the worker after already-queued jobs finish, then join it
    pub async fn shutdown(&self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!("Scoring worker already stopped");
        }

        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => info!("Scoring worker stopped"),
            Ok(Err(_)) => error!("Scoring worker panicked"),
            Err(e) => error!("Failed to join scoring worker: {}", e),
        }
    }
}

fn run(mut encoder: Box<dyn CrossEncoder>, mut rx: mpsc::Receiver<Command>) {
    debug!("Scoring worker started for {}", encoder.model_name());

    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Score {
                pairs,
                batch_size,
                reply,
            } => {
                let result = score_in_batches(encoder.as_mut(), &pairs, batch_size);
                // Caller may have gone away; the job still ran to completion.
                let _ = reply.send(result);
            }
            Command::Predict { pairs, reply } => {
                let _ = reply.send(encoder.predict(&pairs));
            }
            Command::Shutdown => break,
        }
    }

    debug!("Scoring worker exiting");
}

/// Score pairs batch by batch, concatenating in batch order.
///
/// Any failing batch fails the whole call; nothing partial is returned.
pub fn score_in_batches(
    encoder: &mut dyn CrossEncoder,
    pairs: &[ScoringPair],
    batch_size: usize,
) -> Result<Vec<f32>> {
    let mut all_scores = Vec::with_capacity(pairs.len());

    for (batch_index, batch) in pairs.chunks(batch_size.max(1)).enumerate() {
        let scores = encoder.predict(batch)?;

        if scores.len() != batch.len() {
            return Err(Error::Scoring(format!(
                "Batch {} returned {} scores for {} pairs",
                batch_index,
                scores.len(),
                batch.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite()) {
            return Err(Error::Scoring(format!(
                "Batch {} produced a non-finite score ({})",
                batch_index, bad
            )));
        }

        all_scores.extend(scores);
    }

    Ok(all_scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::testing::{FailingEncoder, LengthEncoder};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn pairs(n: usize) -> Vec<ScoringPair> {
        let query: Arc<str> = Arc::from("q");
        (0..n)
            .map(|i| ScoringPair::new(Arc::clone(&query), "x".repeat(i + 1)))
            .collect()
    }

    #[test]
    fn test_batches_match_single_call() {
        let input = pairs(10);
        let mut single = LengthEncoder::default();
        let expected = score_in_batches(&mut single, &input, 100).unwrap();

        for batch_size in [1, 3, 4, 10] {
            let mut encoder = LengthEncoder::default();
            let scores = score_in_batches(&mut encoder, &input, batch_size).unwrap();
            assert_eq!(scores, expected, "batch_size {}", batch_size);
            assert_eq!(
                encoder.calls.load(Ordering::SeqCst),
                input.len().div_ceil(batch_size)
            );
        }
    }

    #[test]
    fn test_failure_mid_batch_returns_error() {
        let mut encoder = FailingEncoder::after_calls(1);
        let result = score_in_batches(&mut encoder, &pairs(5), 2);
        assert!(matches!(result, Err(Error::Scoring(_))));
    }

    #[test]
    fn test_wrong_shape_is_scoring_error() {
        struct ShortEncoder;
        impl CrossEncoder for ShortEncoder {
            fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>> {
                Ok(vec![0.5; pairs.len().saturating_sub(1)])
            }
            fn model_name(&self) -> &str {
                "short"
            }
        }

        let result = score_in_batches(&mut ShortEncoder, &pairs(3), 8);
        assert!(matches!(result, Err(Error::Scoring(_))));
    }

    #[tokio::test]
    async fn test_worker_round_trip_and_shutdown() {
        let worker = ScoringWorker::spawn(Box::new(LengthEncoder::default())).unwrap();

        let scores = worker.score(pairs(3), 2).await.unwrap();
        assert_eq!(scores, vec![1.0, 2.0, 3.0]);

        worker.shutdown().await;
        let after = worker.score(pairs(1), 2).await;
        assert!(matches!(after, Err(Error::Scoring(_))));

        // Idempotent
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_jobs_queued_before_shutdown_complete() {
        let encoder = LengthEncoder::default();
        let calls = Arc::clone(&encoder.calls);
        let worker = ScoringWorker::spawn(Box::new(encoder)).unwrap();

        let mut replies = Vec::new();
        for n in 1..=5 {
            let (reply, rx) = oneshot::channel();
            let queued = worker
                .tx
                .send(Command::Score {
                    pairs: pairs(n),
                    batch_size: 2,
                    reply,
                })
                .await;
            assert!(queued.is_ok());
            replies.push((n, rx));
        }

        worker.shutdown().await;

        for (n, rx) in replies {
            let scores = rx.await.unwrap().unwrap();
            assert_eq!(scores.len(), n);
        }
        // ceil(n / 2) batches for n in 1..=5
        assert_eq!(calls.load(Ordering::SeqCst), 1 + 1 + 2 + 2 + 3);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_are_serialized() {
        let encoder = LengthEncoder::default();
        let max_in_flight = Arc::clone(&encoder.max_in_flight);
        let worker = Arc::new(ScoringWorker::spawn(Box::new(encoder)).unwrap());

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let worker = Arc::clone(&worker);
            tasks.push(tokio::spawn(async move { worker.score(pairs(4), 1).await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().len(), 4);
        }

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        worker.shutdown().await;
    }
}
