use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::EndpointConfig;
use crate::error::{Result, RexecError};
use crate::jobs::job::{Job, JobStatus};

/// Registry of job records, keyed by job id.
///
/// Owned as `Arc<RwLock<JobStore>>`; every caller performs a whole operation
/// inside one guard scope. In particular `try_reserve` is the check and the
/// insert in a single critical section, which is what makes the
/// one-running-job-per-endpoint invariant hold under concurrent triggers.
#[derive(Debug)]
pub struct JobStore {
    jobs: HashMap<Uuid, Job>,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            max_jobs,
        }
    }

    /// Atomically check endpoint availability and register a new running job.
    ///
    /// Fails with `EndpointBusy` when the endpoint forbids concurrent runs
    /// and a job for the same path is still running, and with `StoreFull`
    /// at capacity. Neither failure mutates the store.
    pub fn try_reserve(&mut self, endpoint: Arc<EndpointConfig>) -> Result<Uuid> {
        if !endpoint.allow_multi {
            let active = self
                .jobs
                .values()
                .any(|j| j.is_running() && j.endpoint.path == endpoint.path);
            if active {
                return Err(RexecError::EndpointBusy(endpoint.path.clone()));
            }
        }
        if self.jobs.len() >= self.max_jobs {
            return Err(RexecError::StoreFull);
        }
        let job = Job::reserved(endpoint);
        let id = job.id;
        self.jobs.insert(id, job);
        Ok(id)
    }

    /// Record a job's final outcome. Terminal states are write-once: a second
    /// call for the same job, or a call for an unknown id, is a no-op that
    /// returns false.
    #[allow(clippy::too_many_arguments)]
    pub fn finish(
        &mut self,
        id: &Uuid,
        status: JobStatus,
        pid: Option<u32>,
        exit_code: Option<i32>,
        output: String,
        truncated: bool,
        error: Option<String>,
    ) -> bool {
        debug_assert!(status.is_terminal());
        match self.jobs.get_mut(id) {
            Some(job) if job.is_running() => {
                job.status = status;
                job.pid = pid;
                job.exit_code = exit_code;
                job.output = output;
                job.truncated = truncated;
                job.error = error;
                job.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Cloned snapshot of a job; callers never observe partial mutation.
    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).cloned()
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Job> {
        self.jobs.remove(id)
    }

    /// Evict finished jobs whose completion is at least `ttl` old. Running
    /// jobs are never evicted. Returns the number of jobs removed.
    pub fn sweep_expired(&mut self, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = self.jobs.len();
        self.jobs.retain(|_, job| match job.completed_at {
            Some(completed_at) => now - completed_at < ttl,
            None => true,
        });
        before - self.jobs.len()
    }

    pub fn running_jobs(&self) -> usize {
        self.jobs.values().filter(|j| j.is_running()).count()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.max_jobs
    }
}
