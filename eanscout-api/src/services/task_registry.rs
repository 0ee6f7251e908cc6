//! Background resolution tasks
//!
//! Asynchronous submissions return a task id immediately; the work runs on
//! a spawned tokio task and callers poll [`TaskRegistry::get_status`].
//!
//! - At most `tasks.max_concurrent` executions run at once; the rest wait
//!   in `pending` for a semaphore permit
//! - Each execution runs the pipeline inside its own spawned task so a
//!   panic lands in `failed` instead of leaving the record in `processing`
//! - A sweeper drops records older than the retention window, whatever
//!   their state

use crate::models::{ProductRecord, TaskKind, TaskRecord, TaskStatus};
use crate::services::resolution_pipeline::ResolutionPipeline;
use chrono::Utc;
use eanscout_common::config::TaskConfig;
use eanscout_common::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Results and completion message, or the failure message
type TaskOutcome = std::result::Result<(Vec<ProductRecord>, String), String>;

/// Owned task map plus execution limits; clones share state
#[derive(Clone)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<String, TaskRecord>>>,
    pipeline: Arc<ResolutionPipeline>,
    permits: Arc<Semaphore>,
    retention: Duration,
}

impl TaskRegistry {
    pub fn new(pipeline: Arc<ResolutionPipeline>, config: &TaskConfig) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            pipeline,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            retention: Duration::from_secs(config.retention_secs),
        }
    }

    /// Record a new pending task and start it in the background
    ///
    /// Returns the pending snapshot without waiting for any work.
    pub async fn submit(&self, kind: TaskKind) -> TaskRecord {
        let record = TaskRecord::new(&kind);
        let task_id = record.task_id.clone();

        self.tasks
            .write()
            .await
            .insert(task_id.clone(), record.clone());

        info!(task_id = %task_id, kind = kind.label(), "Task submitted");

        let registry = self.clone();
        tokio::spawn(async move {
            registry.execute(task_id, kind).await;
        });

        record
    }

    /// Current snapshot of a task
    pub async fn get_status(&self, task_id: &str) -> Result<TaskRecord> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Drop records older than the retention window; returns how many
    ///
    /// A task still running when swept keeps running, but its result is
    /// discarded.
    pub async fn sweep(&self) -> usize {
        let now = Utc::now();
        let retention = self.retention;

        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| {
            let age = (now - task.created_at).to_std().unwrap_or_default();
            age <= retention
        });
        before - tasks.len()
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `shutdown` fires
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Task sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = registry.sweep().await;
                        if removed > 0 {
                            info!(removed, "Swept expired task records");
                        }
                    }
                }
            }
        })
    }

    async fn execute(self, task_id: String, kind: TaskKind) {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.finish(&task_id, Err("Task executor is shut down".to_string()))
                    .await;
                return;
            }
        };

        self.update(&task_id, |task| {
            task.transition_to(TaskStatus::Processing, None);
        })
        .await;
        debug!(task_id = %task_id, "Task processing");

        let pipeline = Arc::clone(&self.pipeline);
        let outcome = match tokio::spawn(run(pipeline, kind)).await {
            Ok(Ok(done)) => Ok(done),
            Ok(Err(e)) => Err(format!("Error: {}", e)),
            Err(join_err) => {
                error!(task_id = %task_id, error = %join_err, "Task execution panicked");
                Err(format!("Error: task execution aborted ({})", join_err))
            }
        };

        self.finish(&task_id, outcome).await;
    }

    async fn finish(&self, task_id: &str, outcome: TaskOutcome) {
        match outcome {
            Ok((results, message)) => {
                info!(task_id = %task_id, results = results.len(), "Task completed");
                self.update(task_id, |task| {
                    task.complete(results, message);
                })
                .await;
            }
            Err(message) => {
                error!(task_id = %task_id, error = %message, "Task failed");
                self.update(task_id, |task| {
                    task.fail(message);
                })
                .await;
            }
        }
    }

    async fn update<F>(&self, task_id: &str, apply: F)
    where
        F: FnOnce(&mut TaskRecord),
    {
        match self.tasks.write().await.get_mut(task_id) {
            Some(task) => apply(task),
            None => debug!(task_id = %task_id, "Task record already swept"),
        }
    }
}

/// Pipeline work for one task: results plus the completion message
async fn run(
    pipeline: Arc<ResolutionPipeline>,
    kind: TaskKind,
) -> Result<(Vec<ProductRecord>, String)> {
    match kind {
        TaskKind::Ean { ean, brand } => {
            let record = pipeline.resolve(&ean, brand.as_deref(), None).await?;
            let message = format!("EAN {} processed", record.ean);
            Ok((vec![record], message))
        }
        TaskKind::Box { box_data } => {
            let results = pipeline.resolve_boxes(&box_data).await;
            let message = format!("{} EANs processed", results.len());
            Ok((results, message))
        }
        TaskKind::Table { csv_data } => {
            let results = pipeline.resolve_table(&csv_data).await?;
            let message = format!("{} EANs processed", results.len());
            Ok((results, message))
        }
    }
}
