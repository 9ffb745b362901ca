//! Scoring Job Engine (C7).
//!
//! Creates and drives asynchronous LLM evaluation jobs: serializes a
//! canonical profile into a stable text block, invokes the external LLM,
//! parses and validates the structured JSON reply, and tracks the job
//! lifecycle (`pending -> processing -> {completed | failed}`) with the
//! atomic compare-and-swap claim mandated by SPEC_FULL §4.7.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canonical::{CanonicalOrganization, CanonicalProfile, ProfileOrganizationEdge};
use crate::error::{AppError, Result};
use crate::llm_client::LlmClient;
use crate::persistence::{EdgeStore, OrganizationStore, ProfileStore, ScoringJobStore};
use crate::template::TemplateService;
use crate::tracker::RequestTracker;

/// Maximum number of explicit retries a failed job may take (§3 invariant 6).
pub const MAX_RETRY_COUNT: u32 = 5;

/// Upper bound on `max_tokens` a caller may request.
pub const MAX_TOKENS_CEILING: u32 = 8192;

/// Status a scoring job can be in. Transitions are monotone
/// (`pending -> processing -> {completed | failed}`); only an explicit
/// `retry_job` call resets a failed job back to `pending` (§3 invariant 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One asynchronous LLM evaluation of a profile against a prompt (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringJob {
    pub id: Uuid,
    pub profile_id: Uuid,

    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,

    pub status: ScoringStatus,

    pub raw_response: Option<String>,
    pub parsed_score: Option<serde_json::Value>,
    pub tokens_used: Option<u64>,
    pub model_used: Option<String>,

    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub retryable: Option<bool>,
    pub retry_count: u32,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ScoringJob {
    /// Builds a fresh pending job, validating the bounded fields up front
    /// (§3: prompt non-empty, max_tokens bounded, temperature 0.0-1.0).
    pub fn new(
        profile_id: Uuid,
        prompt: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Self> {
        if prompt.trim().is_empty() {
            return Err(AppError::Validation("scoring prompt must not be empty".to_string()));
        }
        if max_tokens == 0 || max_tokens > MAX_TOKENS_CEILING {
            return Err(AppError::Validation(format!(
                "max_tokens must be in 1..={MAX_TOKENS_CEILING}"
            )));
        }
        if !(0.0..=1.0).contains(&temperature) {
            return Err(AppError::Validation("temperature must be in 0.0..=1.0".to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            profile_id,
            prompt,
            model,
            max_tokens,
            temperature,
            status: ScoringStatus::Pending,
            raw_response: None,
            parsed_score: None,
            tokens_used: None,
            model_used: None,
            error_code: None,
            error_message: None,
            retryable: None,
            retry_count: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        })
    }

    fn mark_processing(&mut self) {
        self.status = ScoringStatus::Processing;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    fn mark_completed(
        &mut self,
        raw_response: String,
        parsed_score: serde_json::Value,
        tokens_used: u64,
        model_used: String,
    ) {
        self.status = ScoringStatus::Completed;
        self.raw_response = Some(raw_response);
        self.parsed_score = Some(parsed_score);
        self.tokens_used = Some(tokens_used);
        self.model_used = Some(model_used);
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    fn mark_failed(&mut self, code: &str, message: String, retryable: bool) {
        self.status = ScoringStatus::Failed;
        self.error_code = Some(code.to_string());
        self.error_message = Some(message);
        self.retryable = Some(retryable);
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Resets a failed, not-yet-exhausted job back to `pending` (§4.7).
    pub fn retry(&mut self) -> Result<()> {
        if self.status != ScoringStatus::Failed {
            return Err(AppError::JobNotRetryable(format!(
                "job {} is not in failed status",
                self.id
            )));
        }
        if self.retry_count >= MAX_RETRY_COUNT {
            return Err(AppError::JobNotRetryable(format!(
                "job {} has exhausted its {MAX_RETRY_COUNT} retries",
                self.id
            )));
        }
        self.retry_count += 1;
        self.status = ScoringStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.error_code = None;
        self.error_message = None;
        self.retryable = None;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Renders a canonical profile into the stable, deterministic text block
/// the LLM is asked to evaluate (§4.7 step 3): name, headline, summary,
/// ordered experience with linked organization context where available,
/// education, and key metrics.
pub fn serialize_profile_for_scoring(
    profile: &CanonicalProfile,
    edges: &[ProfileOrganizationEdge],
    organizations: &HashMap<Uuid, CanonicalOrganization>,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name: {}\n", profile.full_name));
    if let Some(headline) = &profile.headline {
        out.push_str(&format!("Headline: {headline}\n"));
    }
    if let Some(about) = &profile.about {
        out.push_str(&format!("Summary: {about}\n"));
    }

    out.push_str("\nExperience:\n");
    for exp in &profile.experiences {
        let title = exp.title.as_deref().unwrap_or("Unknown title");
        let org = exp.organization_name.as_deref().unwrap_or("Unknown organization");
        let range = format_date_range(exp.start_month, exp.start_year, exp.end_month, exp.end_year, exp.is_current);
        out.push_str(&format!("- {title} at {org} ({range})"));
        if let Some(desc) = &exp.description {
            let first_line = desc.lines().next().unwrap_or(desc);
            out.push_str(&format!(": {first_line}"));
        }
        out.push('\n');

        if let Some(edge) = edges
            .iter()
            .find(|e| e.title.as_deref() == exp.title.as_deref() && e.start_year == exp.start_year)
        {
            if let Some(organization) = organizations.get(&edge.organization_id) {
                let industry = organization.industries.first().cloned().unwrap_or_default();
                let bucket = organization.employee_range.clone().unwrap_or_default();
                if !industry.is_empty() || !bucket.is_empty() {
                    out.push_str(&format!("  org: industry={industry} size={bucket}"));
                    if let Some(desc) = &organization.description {
                        out.push_str(&format!(" desc={desc}"));
                    }
                    out.push('\n');
                }
            }
        }
    }

    out.push_str("\nEducation:\n");
    for edu in &profile.educations {
        let school = edu.school_name.as_deref().unwrap_or("Unknown school");
        let degree = edu.degree.as_deref().unwrap_or("");
        out.push_str(&format!("- {school} {degree}\n"));
    }

    out.push_str("\nMetrics:\n");
    if let Some(followers) = profile.follower_count {
        out.push_str(&format!("followers={followers} "));
    }
    if let Some(connections) = profile.connection_count {
        out.push_str(&format!("connections={connections} "));
    }
    out.push('\n');

    out
}

fn format_date_range(
    start_month: Option<u8>,
    start_year: Option<i32>,
    end_month: Option<u8>,
    end_year: Option<i32>,
    is_current: bool,
) -> String {
    let start = match (start_month, start_year) {
        (Some(m), Some(y)) => format!("{m:02}/{y}"),
        (None, Some(y)) => y.to_string(),
        _ => "?".to_string(),
    };
    let end = if is_current {
        "present".to_string()
    } else {
        match (end_month, end_year) {
            (Some(m), Some(y)) => format!("{m:02}/{y}"),
            (None, Some(y)) => y.to_string(),
            _ => "?".to_string(),
        }
    };
    format!("{start} - {end}")
}

/// Drives the scoring job lifecycle: creation, template resolution, LLM
/// invocation, result persistence, and retry (§4.7).
pub struct ScoringEngine {
    jobs: Arc<dyn ScoringJobStore>,
    profiles: Arc<dyn ProfileStore>,
    organizations: Arc<dyn OrganizationStore>,
    edges: Arc<dyn EdgeStore>,
    templates: Arc<TemplateService>,
    llm: Arc<LlmClient>,
    tracker: Arc<RequestTracker>,
    default_model: String,
}

impl ScoringEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn ScoringJobStore>,
        profiles: Arc<dyn ProfileStore>,
        organizations: Arc<dyn OrganizationStore>,
        edges: Arc<dyn EdgeStore>,
        templates: Arc<TemplateService>,
        llm: Arc<LlmClient>,
        tracker: Arc<RequestTracker>,
        default_model: String,
    ) -> Self {
        Self {
            jobs,
            profiles,
            organizations,
            edges,
            templates,
            llm,
            tracker,
            default_model,
        }
    }

    /// Per-profile hourly rate limit from spec §6 ("scoring <= 10 jobs per
    /// profile per hour").
    const MAX_JOBS_PER_PROFILE_PER_HOUR: u64 = 10;

    /// Creates a new pending scoring job. Resolves `template_id` into prompt
    /// text if supplied, otherwise uses the caller's raw prompt (§4.7).
    pub async fn create_job(
        &self,
        profile_id: Uuid,
        prompt: Option<String>,
        template_id: Option<Uuid>,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<ScoringJob> {
        self.profiles
            .get_by_id(profile_id)
            .await?
            .ok_or_else(|| AppError::ProfileNotFound(profile_id.to_string()))?;

        let since = Utc::now() - chrono::Duration::hours(1);
        let recent = self.jobs.count_recent_for_profile(profile_id, since).await?;
        if recent >= Self::MAX_JOBS_PER_PROFILE_PER_HOUR {
            return Err(AppError::RateLimited(format!(
                "profile {profile_id} has reached the hourly scoring limit"
            )));
        }

        let resolved_prompt = match (prompt, template_id) {
            (_, Some(template_id)) => self.templates.resolve(template_id).await?,
            (Some(prompt), None) => prompt,
            (None, None) => {
                return Err(AppError::Validation(
                    "either prompt or template_id must be supplied".to_string(),
                ))
            }
        };

        let job = ScoringJob::new(
            profile_id,
            resolved_prompt,
            model.unwrap_or_else(|| self.default_model.clone()),
            max_tokens.unwrap_or(1024),
            temperature.unwrap_or(0.2),
        )?;
        let job = self.jobs.create(job).await?;
        self.tracker.track_job(&job);
        Ok(job)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<ScoringJob> {
        self.jobs.get(id).await?.ok_or_else(|| AppError::JobNotFound(id.to_string()))
    }

    /// Resets a failed job back to pending so the worker pool picks it up
    /// again (§4.7).
    pub async fn retry_job(&self, id: Uuid) -> Result<ScoringJob> {
        let mut job = self.get_job(id).await?;
        job.retry()?;
        let job = self.jobs.save(job).await?;
        self.tracker.track_job(&job);
        Ok(job)
    }

    /// Atomically claims one pending job and processes it to completion or
    /// failure. Called by the background worker pool. A `None` return means
    /// another worker already claimed the job (or it no longer exists) — the
    /// race the CAS in `ScoringJobStore::claim_pending` exists to prevent
    /// (§4.7, §8 S6).
    pub async fn process_one(&self, id: Uuid) -> Result<Option<ScoringJob>> {
        let mut job = match self.jobs.claim_pending(id).await? {
            Some(job) => job,
            None => return Ok(None),
        };
        job.mark_processing();
        let job = self.jobs.save(job).await?;
        self.tracker.track_job(&job);

        let profile = match self.profiles.get_by_id(job.profile_id).await? {
            Some(profile) => profile,
            None => {
                let mut job = job;
                job.mark_failed("PROFILE_NOT_FOUND", "target profile no longer exists".to_string(), false);
                let job = self.jobs.save(job).await?;
                self.tracker.track_job(&job);
                return Ok(Some(job));
            }
        };
        let edges = self.edges.list_for_profile(profile.id).await.unwrap_or_default();
        let mut organizations = HashMap::new();
        for edge in &edges {
            if let Ok(Some(org)) = self.organizations.get_by_id(edge.organization_id).await {
                organizations.insert(org.id, org);
            }
        }
        let serialized = serialize_profile_for_scoring(&profile, &edges, &organizations);

        let mut job = job;
        match self
            .llm
            .invoke(&job.model, &job.prompt, &serialized, job.max_tokens, job.temperature)
            .await
        {
            Ok(response) => match serde_json::from_str::<serde_json::Value>(&response.text) {
                Ok(parsed) if parsed.is_object() => {
                    job.mark_completed(response.text, parsed, response.tokens_used, job.model.clone());
                }
                Ok(_) => {
                    job.mark_failed(
                        "LLM_BAD_JSON",
                        "LLM reply parsed but was not a JSON object".to_string(),
                        true,
                    );
                }
                Err(err) => {
                    job.mark_failed("LLM_BAD_JSON", format!("LLM reply was not valid JSON: {err}"), true);
                }
            },
            Err(err) => {
                job.mark_failed(err.error_code(), err.to_string(), err.is_retryable());
            }
        }

        let job = self.jobs.save(job).await?;
        self.tracker.track_job(&job);
        Ok(Some(job))
    }

    /// Deletes completed/failed jobs older than `retention`, the default
    /// 7-day sweep (§3 lifecycle).
    pub async fn sweep_expired(&self, retention: chrono::Duration) -> Result<u64> {
        let cutoff = Utc::now() - retention;
        self.jobs.sweep_expired(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_blank_prompt() {
        assert!(ScoringJob::new(Uuid::new_v4(), "".to_string(), "gpt".to_string(), 100, 0.2).is_err());
    }

    #[test]
    fn new_rejects_out_of_bounds_temperature() {
        assert!(ScoringJob::new(Uuid::new_v4(), "p".to_string(), "gpt".to_string(), 100, 1.5).is_err());
    }

    #[test]
    fn new_rejects_zero_or_excessive_max_tokens() {
        assert!(ScoringJob::new(Uuid::new_v4(), "p".to_string(), "gpt".to_string(), 0, 0.2).is_err());
        assert!(ScoringJob::new(Uuid::new_v4(), "p".to_string(), "gpt".to_string(), 100_000, 0.2).is_err());
    }

    #[test]
    fn retry_requires_failed_status() {
        let mut job = ScoringJob::new(Uuid::new_v4(), "p".to_string(), "gpt".to_string(), 100, 0.2).unwrap();
        assert!(job.retry().is_err());
        job.mark_failed("X", "boom".to_string(), true);
        assert!(job.retry().is_ok());
        assert_eq!(job.status, ScoringStatus::Pending);
        assert_eq!(job.retry_count, 1);
    }

    #[test]
    fn retry_is_capped_at_max_retry_count() {
        let mut job = ScoringJob::new(Uuid::new_v4(), "p".to_string(), "gpt".to_string(), 100, 0.2).unwrap();
        for _ in 0..MAX_RETRY_COUNT {
            job.mark_failed("X", "boom".to_string(), true);
            job.retry().unwrap();
        }
        job.mark_failed("X", "boom".to_string(), true);
        assert!(job.retry().is_err());
    }

    #[test]
    fn serialize_profile_includes_name_and_experience() {
        let profile = crate::canonical::ProfileBuilder {
            external_profile_id: Some("1".to_string()),
            full_name: Some("Ada Lovelace".to_string()),
            canonical_url: Some("https://linkedin.com/in/ada".to_string()),
            experiences: vec![crate::canonical::Experience {
                title: Some("Engineer".to_string()),
                organization_name: Some("Acme".to_string()),
                start_year: Some(2020),
                is_current: true,
                ..Default::default()
            }],
            ..Default::default()
        }
        .build()
        .unwrap();

        let text = serialize_profile_for_scoring(&profile, &[], &HashMap::new());
        assert!(text.contains("Ada Lovelace"));
        assert!(text.contains("Engineer at Acme"));
        assert!(text.contains("present"));
    }
}
