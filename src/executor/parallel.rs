//! Bounded parallel execution
//!
//! Runs one job per item with at most `max_concurrent` jobs in flight.
//! Workers report over a channel to a single collector, which is the only
//! place results are accumulated.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// Why a single job did not produce a value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// One finished job
#[derive(Debug)]
pub struct Completed<I, T> {
    pub item: I,
    pub result: Result<T, ExecError>,
    /// Time from slot acquisition to completion
    pub duration: Duration,
}

impl<I, T> Completed<I, T> {
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Semaphore-gated executor
#[derive(Clone, Debug)]
pub struct BoundedExecutor {
    max_concurrent: usize,
    timeout: Option<Duration>,
}

impl BoundedExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            timeout: None,
        }
    }

    /// Per-job timeout; 0 disables it
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run `job` for every item and wait for all of them.
    ///
    /// Results come back in completion order. A failing, panicking or timed
    /// out job only affects its own entry.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, job: F) -> Vec<Completed<I, T>>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ExecError>> + Send + 'static,
    {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let job = Arc::new(job);
        let (tx, mut rx) = mpsc::unbounded_channel::<Completed<I, T>>();

        let mut handles = Vec::with_capacity(total);

        for item in items {
            let semaphore = semaphore.clone();
            let job = job.clone();
            let tx = tx.clone();
            let timeout = self.timeout;

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let start = Instant::now();

                let mut task = tokio::spawn(job(item.clone()));
                let result = match timeout {
                    Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                        Ok(joined) => flatten(joined),
                        Err(_) => {
                            task.abort();
                            Err(ExecError::TimedOut(limit))
                        }
                    },
                    None => flatten(task.await),
                };

                let _ = tx.send(Completed {
                    item,
                    result,
                    duration: start.elapsed(),
                });
            });

            handles.push(handle);
        }

        // Collector: the channel closes once every worker has dropped its sender.
        drop(tx);
        let mut completed = Vec::with_capacity(total);
        while let Some(done) = rx.recv().await {
            debug!("{}/{} jobs completed", completed.len() + 1, total);
            completed.push(done);
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                warn!("Worker task failed: {}", e);
            }
        }

        completed
    }
}

impl Default for BoundedExecutor {
    fn default() -> Self {
        Self::new(4)
    }
}

fn flatten<T>(joined: Result<Result<T, ExecError>, tokio::task::JoinError>) -> Result<T, ExecError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(ExecError::Panicked(e.to_string())),
    }
}
