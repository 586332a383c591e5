use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fixed-size pool of async workers fanning a task out over a list of inputs.
///
/// - Inputs are fed through a shared job queue; whichever worker is free takes the next one.
/// - Each input is handed to exactly one worker; there are no retries.
/// - Outputs come back in completion order, not input order.
/// - Cancelling the scope stops the feed and keeps workers from starting new tasks.
///   Tasks already running finish and their outputs are still returned.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool with `workers` concurrent workers; zero is clamped to one.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `task` over every input and collect the outputs.
    ///
    /// Returns fewer outputs than inputs only when `cancel` fires before the run completes.
    /// `task` has no error channel of its own: failures belong in `Out`.
    pub async fn run<In, Out, F, Fut>(
        &self,
        cancel: &CancellationToken,
        inputs: Vec<In>,
        task: F,
    ) -> Vec<Out>
    where
        In: Send + 'static,
        Out: Send + 'static,
        F: Fn(CancellationToken, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
    {
        if inputs.is_empty() {
            return Vec::new();
        }

        let total = inputs.len();
        let worker_count = self.workers.min(total);
        debug!(total, workers = worker_count, "pool run starting");

        let (job_tx, job_rx) = mpsc::channel::<In>(1);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (out_tx, mut out_rx) = mpsc::channel::<Out>(total);
        let task = Arc::new(task);

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(worker(
                id,
                cancel.clone(),
                job_rx.clone(),
                out_tx.clone(),
                task.clone(),
            ));
        }
        // Workers hold the only senders now; the collect loop ends when they all exit.
        drop(out_tx);

        let feeder = tokio::spawn(feed(cancel.clone(), inputs, job_tx));

        let mut outputs = Vec::with_capacity(total);
        while let Some(out) = out_rx.recv().await {
            outputs.push(out);
        }

        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "pool worker aborted");
            }
        }
        let submitted = feeder.await.unwrap_or_default();

        if outputs.len() < total {
            debug!(
                submitted,
                completed = outputs.len(),
                total,
                "pool run ended early"
            );
        } else {
            debug!(total, "pool run complete");
        }
        outputs
    }
}

/// Push inputs into the job queue until they run out or the scope is cancelled.
///
/// Cancellation returns from the whole function, which drops `jobs` and closes the queue.
async fn feed<In>(cancel: CancellationToken, inputs: Vec<In>, jobs: mpsc::Sender<In>) -> usize {
    let mut submitted = 0usize;
    for input in inputs {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(submitted, "feed stopped by cancellation");
                return submitted;
            }
            sent = jobs.send(input) => {
                if sent.is_err() {
                    // every worker is gone
                    return submitted;
                }
                submitted += 1;
            }
        }
    }
    submitted
}

async fn worker<In, Out, F, Fut>(
    id: usize,
    cancel: CancellationToken,
    jobs: Arc<Mutex<mpsc::Receiver<In>>>,
    outputs: mpsc::Sender<Out>,
    task: Arc<F>,
) where
    Out: Send + 'static,
    F: Fn(CancellationToken, In) -> Fut,
    Fut: Future<Output = Out> + Send + 'static,
{
    let mut done = 0usize;
    loop {
        let next = {
            let mut rx = jobs.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(input) = next else { break };
        if cancel.is_cancelled() {
            break;
        }

        // A panicking task costs its own output, not the worker.
        let out = match tokio::spawn((*task)(cancel.clone(), input)).await {
            Ok(out) => out,
            Err(e) => {
                warn!(worker = id, error = %e, "pool task failed, output dropped");
                continue;
            }
        };
        done += 1;
        // Capacity equals the input count, so this never waits.
        if outputs.send(out).await.is_err() {
            break;
        }
    }
    debug!(worker = id, done, "pool worker exiting");
}
