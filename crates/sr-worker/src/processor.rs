//! Bounded worker pool.
//!
//! A fixed number of tokio tasks share one bounded queue. Each task takes a
//! whole job, renders it through [`RenderPipeline`], and keeps the
//! [`JobTracker`] and [`EventBus`] current as the job moves through its states.

use std::sync::Arc;

use sr_core::config::{Config, RenderProfile, StorageConfig};
use sr_core::events::{EventBus, EventPayload};
use sr_core::{Error, Job, JobId, Result};
use sr_pipeline::{EngineContext, ProgressSender, Publisher, RenderPipeline};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::request::JobRequest;
use crate::tracker::JobTracker;

type SharedQueue = Arc<Mutex<mpsc::Receiver<Job>>>;

/// Handle to a running pool of render workers.
pub struct WorkerPool {
    tx: mpsc::Sender<Job>,
    tracker: Arc<JobTracker>,
    events: Arc<EventBus>,
    storage: StorageConfig,
    profile: RenderProfile,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.worker.concurrency` workers. Must be called inside a
    /// tokio runtime.
    pub fn start(
        config: &Config,
        ctx: EngineContext,
        publisher: Arc<dyn Publisher>,
        tracker: Arc<JobTracker>,
        events: Arc<EventBus>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.worker.queue_capacity.max(1));
        let queue: SharedQueue = Arc::new(Mutex::new(rx));
        let pipeline = RenderPipeline::new(ctx, publisher);
        let cancel = CancellationToken::new();

        let workers = config.worker.concurrency.max(1);
        let handles = (0..workers)
            .map(|worker| {
                let queue = queue.clone();
                let pipeline = pipeline.clone();
                let tracker = tracker.clone();
                let events = events.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    run_worker(worker, queue, pipeline, tracker, events, cancel).await;
                })
            })
            .collect();

        tracing::info!(workers, capacity = config.worker.queue_capacity, "Worker pool started");

        Self {
            tx,
            tracker,
            events,
            storage: config.storage.clone(),
            profile: config.profile.clone(),
            cancel,
            handles,
        }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Queue a render. Waits while the queue is full.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the same job is already queued or running.
    /// - [`Error::Internal`] if the pool has shut down.
    pub async fn submit(&self, request: JobRequest) -> Result<JobId> {
        let job = request.into_job(&self.storage, &self.profile);
        let job_id = job.job_id.clone();

        self.tracker.enqueue(&job_id, &job.file_id)?;
        if self.tx.send(job).await.is_err() {
            let err = Error::Internal("worker pool is shut down".into());
            self.tracker.fail(&job_id, &err);
            return Err(err);
        }

        tracing::info!(job_id = %job_id, "Job queued");
        self.events.broadcast(EventPayload::JobQueued {
            job_id: job_id.clone(),
        });
        Ok(job_id)
    }

    /// Ask workers to stop. Running jobs are abandoned and reported failed.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Close the queue and wait for workers to drain it.
    pub async fn shutdown(self) {
        let Self { tx, handles, .. } = self;
        drop(tx);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task panicked: {e}");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .field("active", &self.tracker.active_count())
            .finish()
    }
}

async fn run_worker(
    worker: usize,
    queue: SharedQueue,
    pipeline: RenderPipeline,
    tracker: Arc<JobTracker>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker, "Worker started");

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            job = async { queue.lock().await.recv().await } => job,
        };
        let Some(job) = next else {
            break;
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                let err = Error::Internal("worker stopped before the job finished".into());
                tracker.fail(&job.job_id, &err);
                events.broadcast(EventPayload::JobFailed {
                    job_id: job.job_id.clone(),
                    kind: err.kind(),
                    error: err.to_string(),
                });
                break;
            }
            _ = process_job(&pipeline, &tracker, &events, &job) => {}
        }
    }

    tracing::debug!(worker, "Worker stopped");
}

/// Render one job, reporting progress and the outcome.
async fn process_job(
    pipeline: &RenderPipeline,
    tracker: &Arc<JobTracker>,
    events: &Arc<EventBus>,
    job: &Job,
) {
    let job_id = job.job_id.clone();
    events.broadcast(EventPayload::JobStarted {
        job_id: job_id.clone(),
    });

    let progress = {
        let (t, e, id) = (tracker.clone(), events.clone(), job_id.clone());
        let (st, se, sid) = (tracker.clone(), events.clone(), job_id.clone());
        ProgressSender::new(move |pct, step| {
            t.set_progress(&id, pct, step);
            e.broadcast(EventPayload::JobProgress {
                job_id: id.clone(),
                progress: pct,
                step: step.to_string(),
            });
        })
        .with_state_callback(move |state| {
            // Terminal states are recorded with their details below.
            if !state.is_terminal() {
                st.set_state(&sid, state);
            }
            se.broadcast(EventPayload::JobStateChanged {
                job_id: sid.clone(),
                state,
            });
        })
    };

    match pipeline.run(job, &progress).await {
        Ok(outcome) => {
            tracker.complete(&job_id, outcome.artifact.clone());
            events.broadcast(EventPayload::JobCompleted {
                job_id,
                file_path: outcome.artifact,
            });
        }
        Err(e) => {
            tracker.fail(&job_id, &e);
            events.broadcast(EventPayload::JobFailed {
                job_id,
                kind: e.kind(),
                error: e.to_string(),
            });
        }
    }
}
