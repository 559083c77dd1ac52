use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EndpointConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One invocation of an endpoint's command.
///
/// `Completed` means the process ran and exited, whatever the exit code;
/// `Failed` means it could not be launched or supervision itself errored.
/// Outcome fields are written exactly once, when the job leaves `Running`.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    /// The endpoint that spawned this job, captured at reservation time.
    /// A config reload does not touch it.
    pub endpoint: Arc<EndpointConfig>,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub pid: Option<u32>,
    pub output: String,
    pub truncated: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// A freshly reserved job, counted as active from the moment it is
    /// registered so the per-endpoint concurrency check sees it.
    pub fn reserved(endpoint: Arc<EndpointConfig>) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint,
            status: JobStatus::Running,
            exit_code: None,
            pid: None,
            output: String::new(),
            truncated: false,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }
}
