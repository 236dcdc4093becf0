//! The engine facade: submit, resume, cancel, sweep
//!
//! [`StoryEngine`] is what the job layer talks to. It owns the compiled
//! workflow and the executor, translates submissions into threads, maps
//! engine outcomes onto user-visible [`JobStatus`] values, and runs the
//! out-of-band resume-deadline sweeper.
//!
//! Job state machine as reported to collaborators:
//!
//! ```text
//!  QUEUED → RUNNING → { AWAITING_REVIEW → RUNNING → TERMINAL } | TERMINAL
//!  TERMINAL ∈ { COMPLETED, REJECTED, AUTO_REJECTED, FAILED, CANCELLED }
//! ```

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::providers::Providers;
use crate::state::{StoryRequest, JOB_STATUS};
use crate::workflow::build_story_graph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use storyloom_core::{Executor, RunOutcome};
use storyloom_checkpoint::{ErrorRecord, RunStatus, SnapshotStore, ThreadId};

/// User-visible job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    AwaitingReview,
    Completed,
    Rejected,
    AutoRejected,
    Failed,
    Cancelled,
}

impl JobStatus {
    fn parse(label: &str) -> Option<Self> {
        match label {
            "QUEUED" => Some(JobStatus::Queued),
            "RUNNING" => Some(JobStatus::Running),
            "AWAITING_REVIEW" => Some(JobStatus::AwaitingReview),
            "COMPLETED" => Some(JobStatus::Completed),
            "REJECTED" => Some(JobStatus::Rejected),
            "AUTO_REJECTED" => Some(JobStatus::AutoRejected),
            "FAILED" => Some(JobStatus::Failed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

/// A reviewer's (or the sweeper's) decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// `approved` routes to publication; anything else rejects
    pub decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReviewDecision {
    pub fn approved(reviewer_id: impl Into<String>) -> Self {
        Self {
            decision: "approved".to_string(),
            comment: None,
            reviewer_id: Some(reviewer_id.into()),
            reason: None,
        }
    }

    pub fn rejected(comment: impl Into<String>) -> Self {
        Self {
            decision: "rejected".to_string(),
            comment: Some(comment.into()),
            reviewer_id: None,
            reason: None,
        }
    }

    /// The synthetic rejection the sweeper submits on deadline expiry
    pub fn timeout() -> Self {
        Self {
            decision: "rejected".to_string(),
            comment: None,
            reviewer_id: None,
            reason: Some("timeout".to_string()),
        }
    }
}

/// What a submit/resume call hands back to the job layer
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The thread is suspended; the payload is for the review UI
    AwaitingReview { payload: Value },

    /// The thread reached a terminal
    Finished { status: JobStatus, state: Value },

    /// The thread failed permanently
    Failed { error: ErrorRecord, state: Value },
}

/// The workflow engine for illustrated story jobs
pub struct StoryEngine {
    executor: Arc<Executor>,
    store: Arc<dyn SnapshotStore>,
}

impl StoryEngine {
    /// Construct the engine over injected providers, a snapshot store, and
    /// configuration
    pub fn new(
        providers: Providers,
        store: Arc<dyn SnapshotStore>,
        config: PipelineConfig,
    ) -> Self {
        let config = Arc::new(config);
        let graph = build_story_graph(Arc::new(providers), config.clone());
        let executor = Executor::new(graph, store.clone())
            .with_pool_size(config.worker_pool_size)
            .with_resume_deadline(config.review_deadline);
        Self {
            executor: Arc::new(executor),
            store,
        }
    }

    /// Submit a story job on the given thread id
    pub async fn submit(&self, thread_id: &str, request: &StoryRequest) -> Result<JobOutcome> {
        if request.prompt.trim().is_empty() {
            return Err(PipelineError::InvalidRequest("empty prompt".to_string()));
        }
        let outcome = self
            .executor
            .submit(thread_id, request.initial_state())
            .await?;
        Ok(map_outcome(outcome))
    }

    /// Resume a suspended job with a review decision
    pub async fn resume(&self, thread_id: &str, decision: &ReviewDecision) -> Result<JobOutcome> {
        let value = serde_json::to_value(decision)
            .map_err(|e| PipelineError::InvalidRequest(format!("bad decision: {}", e)))?;
        let outcome = self.executor.resume(thread_id, value).await?;
        Ok(map_outcome(outcome))
    }

    /// Request cooperative cancellation of a running job
    pub fn cancel(&self, thread_id: &str) {
        self.executor.cancel(thread_id);
    }

    /// Current user-visible status of a job, if the thread exists
    pub async fn status(&self, thread_id: &str) -> Result<Option<JobStatus>> {
        let Some(snapshot) = self.store.latest(thread_id).await? else {
            return Ok(None);
        };
        let status = match snapshot.status {
            RunStatus::AwaitingResume => JobStatus::AwaitingReview,
            RunStatus::Failed => JobStatus::Failed,
            RunStatus::Cancelled => JobStatus::Cancelled,
            RunStatus::Running => JobStatus::Running,
            RunStatus::Completed => snapshot.state[JOB_STATUS]
                .as_str()
                .and_then(JobStatus::parse)
                .unwrap_or(JobStatus::Completed),
        };
        Ok(Some(status))
    }

    /// Resume every suspended thread whose review deadline has passed with a
    /// synthetic timeout rejection; returns the swept thread ids
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<ThreadId>> {
        let mut swept = Vec::new();
        for thread_id in self.store.threads().await? {
            let Some(snapshot) = self.store.latest(&thread_id).await? else {
                continue;
            };
            if snapshot.status != RunStatus::AwaitingResume {
                continue;
            }
            let expired = snapshot
                .suspension
                .as_ref()
                .and_then(|s| s.resume_deadline)
                .map(|deadline| deadline <= now)
                .unwrap_or(false);
            if !expired {
                continue;
            }
            tracing::info!(thread_id, "review deadline expired, rejecting");
            self.resume(&thread_id, &ReviewDecision::timeout()).await?;
            swept.push(thread_id);
        }
        Ok(swept)
    }
}

fn map_outcome(outcome: RunOutcome) -> JobOutcome {
    match outcome {
        RunOutcome::Suspended { payload } => JobOutcome::AwaitingReview { payload },
        RunOutcome::Failed { error, state } => JobOutcome::Failed { error, state },
        RunOutcome::Terminal { status, state } => {
            let job_status = match status {
                RunStatus::Cancelled => JobStatus::Cancelled,
                _ => state[JOB_STATUS]
                    .as_str()
                    .and_then(JobStatus::parse)
                    .unwrap_or(JobStatus::Completed),
            };
            JobOutcome::Finished {
                status: job_status,
                state,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decision_serialization() {
        let approved = ReviewDecision::approved("rev-1");
        let value = serde_json::to_value(&approved).unwrap();
        assert_eq!(value["decision"], json!("approved"));
        assert_eq!(value["reviewer_id"], json!("rev-1"));
        assert!(value.get("comment").is_none());

        let timeout = ReviewDecision::timeout();
        let value = serde_json::to_value(&timeout).unwrap();
        assert_eq!(value["decision"], json!("rejected"));
        assert_eq!(value["reason"], json!("timeout"));
    }

    #[test]
    fn test_job_status_parse() {
        assert_eq!(JobStatus::parse("AUTO_REJECTED"), Some(JobStatus::AutoRejected));
        assert_eq!(JobStatus::parse("nope"), None);
    }

    #[test]
    fn test_map_outcome_cancelled_overrides_state() {
        let outcome = map_outcome(RunOutcome::Terminal {
            status: RunStatus::Cancelled,
            state: json!({"job_status": "COMPLETED"}),
        });
        assert!(matches!(
            outcome,
            JobOutcome::Finished {
                status: JobStatus::Cancelled,
                ..
            }
        ));
    }
}
