//! Request & Job State Tracker (C10).
//!
//! The only process-wide state in the engine (SPEC_FULL §9 "Global state"):
//! an in-process map from id to status snapshot for both ingestion requests
//! and scoring jobs, backed by [`dashmap::DashMap`] the way the teacher
//! workspace uses it for shared mutable state. Safe for concurrent
//! readers/writers; bounded by age-based eviction rather than unbounded
//! growth.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::scoring::{ScoringJob, ScoringStatus};

/// Coarse progress stage exposed for an in-flight ingestion request (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    ProfileFetch,
    OrganizationFetch,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Running,
    Success,
    Failed,
}

/// Status snapshot for one `process_profile` invocation.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionSnapshot {
    pub request_id: Uuid,
    pub status: RequestStatus,
    pub stage: ProgressStage,
    pub step: u32,
    pub total_steps: u32,
    pub profile_id: Option<Uuid>,
    pub organizations_requested: u32,
    pub organizations_successful: u32,
    pub organizations_linked: u32,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IngestionSnapshot {
    fn new(request_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            request_id,
            status: RequestStatus::Running,
            stage: ProgressStage::ProfileFetch,
            step: 1,
            total_steps: 3,
            profile_id: None,
            organizations_requested: 0,
            organizations_successful: 0,
            organizations_linked: 0,
            error_code: None,
            error_message: None,
            started_at: now,
            updated_at: now,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self.status, RequestStatus::Success | RequestStatus::Failed)
    }
}

/// Status snapshot for one scoring job, mirrored from [`ScoringJob`] so
/// readers don't need access to the persistence layer.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub profile_id: Uuid,
    pub status: ScoringStatus,
    pub retry_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl From<&ScoringJob> for JobSnapshot {
    fn from(job: &ScoringJob) -> Self {
        Self {
            job_id: job.id,
            profile_id: job.profile_id,
            status: job.status,
            retry_count: job.retry_count,
            updated_at: job.updated_at,
        }
    }
}

impl JobSnapshot {
    fn is_terminal(&self) -> bool {
        matches!(self.status, ScoringStatus::Completed | ScoringStatus::Failed)
    }
}

/// Concurrency-safe, TTL-evicting registry of active and recently-completed
/// ingestion requests and scoring jobs (§4.10).
pub struct RequestTracker {
    requests: DashMap<Uuid, IngestionSnapshot>,
    jobs: DashMap<Uuid, JobSnapshot>,
    eviction_age: Duration,
}

impl RequestTracker {
    /// `eviction_age` is how long a terminal record is kept before
    /// `evict_expired` removes it (default: 1 hour, per §4.10).
    pub fn new(eviction_age: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            jobs: DashMap::new(),
            eviction_age,
        }
    }

    /// Registers a new ingestion request as `running` at stage
    /// `profile_fetch` (§4.5 step 1). The caller supplies the id so it can
    /// be allocated up front when the HTTP caller omits one.
    pub fn start_request(&self, request_id: Uuid) {
        self.requests.insert(request_id, IngestionSnapshot::new(request_id));
    }

    pub fn get_request(&self, request_id: Uuid) -> Option<IngestionSnapshot> {
        self.requests.get(&request_id).map(|entry| entry.clone())
    }

    /// Advances the tracked stage and step counters for observability.
    pub fn advance_stage(&self, request_id: Uuid, stage: ProgressStage, step: u32, total_steps: u32) {
        if let Some(mut entry) = self.requests.get_mut(&request_id) {
            entry.stage = stage;
            entry.step = step;
            entry.total_steps = total_steps;
            entry.updated_at = Utc::now();
        }
    }

    /// Records the organization batch counters as they become known
    /// (§4.5 step 9, §8 S4).
    pub fn record_organization_counters(
        &self,
        request_id: Uuid,
        requested: u32,
        successful: u32,
        linked: u32,
    ) {
        if let Some(mut entry) = self.requests.get_mut(&request_id) {
            entry.organizations_requested = requested;
            entry.organizations_successful = successful;
            entry.organizations_linked = linked;
            entry.updated_at = Utc::now();
        }
    }

    pub fn finish_success(&self, request_id: Uuid, profile_id: Uuid) {
        if let Some(mut entry) = self.requests.get_mut(&request_id) {
            entry.status = RequestStatus::Success;
            entry.stage = ProgressStage::Completed;
            entry.profile_id = Some(profile_id);
            entry.updated_at = Utc::now();
        }
    }

    pub fn finish_failed(&self, request_id: Uuid, error_code: &str, error_message: String) {
        if let Some(mut entry) = self.requests.get_mut(&request_id) {
            entry.status = RequestStatus::Failed;
            entry.error_code = Some(error_code.to_string());
            entry.error_message = Some(error_message);
            entry.updated_at = Utc::now();
        }
    }

    /// Upserts a scoring job snapshot, called after every persisted
    /// transition so readers see a consistent view without touching the
    /// persistence layer.
    pub fn track_job(&self, job: &ScoringJob) {
        self.jobs.insert(job.id, JobSnapshot::from(job));
    }

    pub fn get_job(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.jobs.get(&job_id).map(|entry| entry.clone())
    }

    /// Lists all records not yet in a terminal state.
    pub fn list_active_requests(&self) -> Vec<IngestionSnapshot> {
        self.requests.iter().filter(|e| !e.is_terminal()).map(|e| e.clone()).collect()
    }

    /// Drops completed/failed records older than `eviction_age` (§4.10).
    pub fn evict_expired(&self) {
        let cutoff = Utc::now() - self.eviction_age;
        self.requests.retain(|_, snapshot| !(snapshot.is_terminal() && snapshot.updated_at < cutoff));
        self.jobs.retain(|_, snapshot| !(snapshot.is_terminal() && snapshot.updated_at < cutoff));
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new(Duration::hours(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_and_finish_request_lifecycle() {
        let tracker = RequestTracker::default();
        let id = Uuid::new_v4();
        tracker.start_request(id);
        assert_eq!(tracker.get_request(id).unwrap().status, RequestStatus::Running);

        tracker.advance_stage(id, ProgressStage::OrganizationFetch, 2, 3);
        assert_eq!(tracker.get_request(id).unwrap().stage, ProgressStage::OrganizationFetch);

        let profile_id = Uuid::new_v4();
        tracker.finish_success(id, profile_id);
        let snapshot = tracker.get_request(id).unwrap();
        assert_eq!(snapshot.status, RequestStatus::Success);
        assert_eq!(snapshot.profile_id, Some(profile_id));
    }

    #[test]
    fn eviction_removes_only_stale_terminal_records() {
        let tracker = RequestTracker::new(Duration::zero());
        let running = Uuid::new_v4();
        let finished = Uuid::new_v4();
        tracker.start_request(running);
        tracker.start_request(finished);
        tracker.finish_success(finished, Uuid::new_v4());

        tracker.evict_expired();

        assert!(tracker.get_request(running).is_some());
        assert!(tracker.get_request(finished).is_none());
    }

    #[test]
    fn list_active_excludes_terminal_requests() {
        let tracker = RequestTracker::default();
        let running = Uuid::new_v4();
        let finished = Uuid::new_v4();
        tracker.start_request(running);
        tracker.start_request(finished);
        tracker.finish_success(finished, Uuid::new_v4());

        let active = tracker.list_active_requests();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].request_id, running);
    }
}
