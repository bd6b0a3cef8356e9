//! Background ingestion queue.
//!
//! Upload handlers submit a request and get a job id back immediately; a
//! single worker runs the pipeline for each job in submission order. Job
//! status lives in memory until `wait` collects it, and is lost on restart.

use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Notify, RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::ingest::IngestionPipeline;
use crate::error::QueueError;
use crate::models::{IngestOutcome, IngestRequest, IngestStage};

pub type JobId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed(IngestOutcome),
    Failed { stage: IngestStage, message: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed(_) | JobStatus::Failed { .. })
    }
}

type JobTable = Arc<RwLock<HashMap<JobId, JobStatus>>>;

pub struct IngestQueue {
    sender: mpsc::Sender<(JobId, IngestRequest)>,
    jobs: JobTable,
    changed: Arc<Notify>,
    worker: JoinHandle<()>,
}

impl IngestQueue {
    /// Start the worker. At most `capacity` jobs wait in the channel;
    /// `submit` waits for room beyond that.
    pub fn spawn(pipeline: Arc<IngestionPipeline>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<(JobId, IngestRequest)>(capacity.max(1));
        let jobs: JobTable = Arc::new(RwLock::new(HashMap::new()));
        let changed = Arc::new(Notify::new());

        let worker = {
            let jobs = Arc::clone(&jobs);
            let changed = Arc::clone(&changed);
            tokio::spawn(async move {
                while let Some((id, request)) = receiver.recv().await {
                    set_status(&jobs, &changed, id, JobStatus::Running).await;

                    let status = match pipeline.ingest(&request).await {
                        Ok(outcome) => JobStatus::Completed(outcome),
                        Err(e) => JobStatus::Failed {
                            stage: e.stage(),
                            message: e.to_string(),
                        },
                    };
                    set_status(&jobs, &changed, id, status).await;
                }
                tracing::debug!("ingest queue worker stopped");
            })
        };

        Self {
            sender,
            jobs,
            changed,
            worker,
        }
    }

    pub async fn submit(&self, request: IngestRequest) -> Result<JobId, QueueError> {
        let id = Uuid::new_v4();
        self.jobs.write().await.insert(id, JobStatus::Queued);

        if self.sender.send((id, request)).await.is_err() {
            self.jobs.write().await.remove(&id);
            return Err(QueueError::Closed);
        }
        tracing::debug!(job = %id, "queued ingestion");
        Ok(id)
    }

    pub async fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Wait until job `id` completes or fails and take its final status out
    /// of the table. `None` for unknown or already collected ids.
    pub async fn wait(&self, id: JobId) -> Option<JobStatus> {
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();

            {
                let mut jobs = self.jobs.write().await;
                match jobs.get(&id).map(JobStatus::is_finished) {
                    None => return None,
                    Some(true) => return jobs.remove(&id),
                    Some(false) => {}
                }
            }
            notified.await;
        }
    }

    /// Stop accepting jobs, finish the queued ones, and stop the worker.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.worker.await {
            tracing::warn!(error = %e, "ingest queue worker panicked");
        }
    }
}

async fn set_status(jobs: &JobTable, changed: &Notify, id: JobId, status: JobStatus) {
    jobs.write().await.insert(id, status);
    changed.notify_waiters();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ingest::IngestOptions;
    use crate::services::testing::{HashEmbedder, MemoryDocumentStore};
    use crate::services::vector_store::{IndexFiles, VectorIndexStore};
    use tempfile::TempDir;

    fn queue(dir: &TempDir) -> IngestQueue {
        let docs = MemoryDocumentStore::default().with("alice/cc.md", "# Intro\n\nA\n");
        let index = VectorIndexStore::with_files(
            IndexFiles::new(dir.path().join("index.bin"), dir.path().join("meta.json")),
            8,
        );
        let pipeline = IngestionPipeline::new(
            Arc::new(docs),
            Arc::new(HashEmbedder::new(8)),
            Arc::new(index),
            IngestOptions::default(),
        );
        IngestQueue::spawn(Arc::new(pipeline), 4)
    }

    #[tokio::test]
    async fn test_job_completes() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);

        let id = queue
            .submit(IngestRequest::new("alice", "CC", "alice/cc.md"))
            .await
            .unwrap();
        let status = queue.wait(id).await.unwrap();
        assert_eq!(
            status,
            JobStatus::Completed(IngestOutcome::Indexed {
                chunks: 1,
                replaced: 0
            })
        );
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_collects_finished_job() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);

        let id = queue
            .submit(IngestRequest::new("alice", "CC", "alice/cc.md"))
            .await
            .unwrap();
        assert!(queue.wait(id).await.unwrap().is_finished());
        assert!(queue.status(id).await.is_none());
        assert!(queue.wait(id).await.is_none());
        assert!(queue.jobs.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_job_reports_stage() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);

        let id = queue
            .submit(IngestRequest::new("alice", "CC", "alice/missing.md"))
            .await
            .unwrap();
        match queue.wait(id).await.unwrap() {
            JobStatus::Failed { stage, message } => {
                assert_eq!(stage, IngestStage::Fetch);
                assert!(message.contains("alice/missing.md"));
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        assert!(queue.status(Uuid::new_v4()).await.is_none());
        assert!(queue.wait(Uuid::new_v4()).await.is_none());
    }

    #[test]
    fn test_status_serialization() {
        let failed = JobStatus::Failed {
            stage: IngestStage::Embed,
            message: "timeout".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({"state": "failed", "detail": {"stage": "embed", "message": "timeout"}})
        );
        assert_eq!(
            serde_json::to_value(JobStatus::Queued).unwrap(),
            serde_json::json!({"state": "queued"})
        );
    }
}
