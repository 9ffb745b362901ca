//! Ingestion Orchestrator (C5) — the hard core.
//!
//! Drives the nine-step `process_profile` algorithm (§4.5): fetch, adapt,
//! dedup-persist, derive organization URLs, paced batch-fetch, adapt,
//! upsert + link, finalize. Steps 1-4 are fatal on error; organization
//! resolution (steps 5-8) is best-effort — a failed or incomplete company
//! lookup never fails the profile ingestion, it just leaves that slot
//! empty (§4.4, §8 S4).

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::adapter::{adapt_organization, adapt_profile};
use crate::canonical::{normalize_url, CanonicalOrganization, CanonicalProfile};
use crate::error::Result;
use crate::organization::OrganizationService;
use crate::persistence::ProfileStore;
use crate::tracker::{ProgressStage, RequestTracker};
use crate::workflow_client::WorkflowClient;

/// Caller-supplied ingestion request (§4.5).
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub linkedin_url: String,
    pub include_organizations: bool,
}

impl IngestionRequest {
    pub fn new(linkedin_url: String) -> Self {
        Self {
            linkedin_url,
            include_organizations: true,
        }
    }
}

/// Result of `process_profile`: the canonical profile plus one slot per
/// distinct organization URL attempted, in first-seen order (§4.5).
#[derive(Debug, Clone)]
pub struct EnrichedProfile {
    pub profile: CanonicalProfile,
    pub organizations: Vec<Option<CanonicalOrganization>>,
    /// Whether this invocation inserted a new profile row, as opposed to
    /// merging into one that already existed for this normalized URL (§8 S2).
    pub created: bool,
}

pub struct IngestionOrchestrator {
    workflow: Arc<WorkflowClient>,
    profiles: Arc<dyn ProfileStore>,
    organization_service: Arc<OrganizationService>,
    tracker: Arc<RequestTracker>,
    pacing_seconds: u64,
    enable_company_ingestion: bool,
}

impl IngestionOrchestrator {
    pub fn new(
        workflow: Arc<WorkflowClient>,
        profiles: Arc<dyn ProfileStore>,
        organization_service: Arc<OrganizationService>,
        tracker: Arc<RequestTracker>,
        pacing_seconds: u64,
        enable_company_ingestion: bool,
    ) -> Self {
        Self {
            workflow,
            profiles,
            organization_service,
            tracker,
            pacing_seconds,
            enable_company_ingestion,
        }
    }

    /// Runs the full ingestion algorithm for one profile URL (§4.5).
    pub async fn process_profile(
        &self,
        request: IngestionRequest,
        request_id: Option<Uuid>,
    ) -> Result<(Uuid, EnrichedProfile)> {
        let request_id = request_id.unwrap_or_else(Uuid::new_v4);
        self.tracker.start_request(request_id);

        let raw_profile = match self.workflow.fetch_profile(&request.linkedin_url).await {
            Ok(raw) => raw,
            Err(err) => {
                self.tracker.finish_failed(request_id, err.error_code(), err.to_string());
                return Err(err);
            }
        };

        let canonical = match adapt_profile(&raw_profile) {
            Ok(profile) => profile,
            Err(err) => {
                self.tracker.finish_failed(request_id, err.error_code(), err.to_string());
                return Err(err);
            }
        };

        let (profile, created) = self.profiles.upsert(canonical).await.map_err(|err| {
            self.tracker.finish_failed(request_id, err.error_code(), err.to_string());
            err
        })?;

        self.tracker.advance_stage(request_id, ProgressStage::OrganizationFetch, 2, 3);

        let organizations = if request.include_organizations && self.enable_company_ingestion {
            self.resolve_organizations(request_id, &profile).await
        } else {
            Vec::new()
        };

        self.tracker.advance_stage(request_id, ProgressStage::Completed, 3, 3);
        self.tracker.finish_success(request_id, profile.id);

        Ok((request_id, EnrichedProfile { profile, organizations, created }))
    }

    /// Steps 5-8: derive distinct organization URLs in first-seen order,
    /// batch-fetch with pacing, canonicalize, upsert, and link edges.
    /// Every failure here is logged and absorbed — never propagated.
    async fn resolve_organizations(
        &self,
        request_id: Uuid,
        profile: &CanonicalProfile,
    ) -> Vec<Option<CanonicalOrganization>> {
        let mut urls = Vec::new();
        for experience in &profile.experiences {
            if let Some(raw_url) = &experience.organization_url {
                if let Ok(normalized) = normalize_url(raw_url) {
                    if !urls.contains(&normalized) {
                        urls.push(normalized);
                    }
                }
            }
        }

        if urls.is_empty() {
            self.tracker.record_organization_counters(request_id, 0, 0, 0);
            return Vec::new();
        }

        let raw_results = self.workflow.batch_fetch_organizations(&urls, self.pacing_seconds).await;

        let mut resolved = Vec::with_capacity(raw_results.len());
        let mut by_url: HashMap<String, CanonicalOrganization> = HashMap::new();
        let mut successful = 0u32;

        for (url, raw) in urls.iter().zip(raw_results.into_iter()) {
            let slot = match raw {
                None => None,
                Some(raw_org) => match adapt_organization(&raw_org) {
                    Err(err) => {
                        tracing::warn!(url = %url, error = %err, "organization payload incomplete, slot left empty");
                        None
                    }
                    Ok(mut canonical_org) => {
                        if canonical_org.canonical_url.is_none() {
                            canonical_org.canonical_url = Some(url.clone());
                        }
                        match self.organization_service.upsert_organization(canonical_org).await {
                            Err(err) => {
                                tracing::warn!(url = %url, error = %err, "organization upsert failed, slot left empty");
                                None
                            }
                            Ok(stored) => {
                                successful += 1;
                                by_url.insert(url.clone(), stored.clone());
                                Some(stored)
                            }
                        }
                    }
                },
            };
            resolved.push(slot);
        }

        let mut linked = 0u32;
        for experience in &profile.experiences {
            let Some(raw_url) = &experience.organization_url else { continue };
            let Ok(normalized) = normalize_url(raw_url) else { continue };
            let Some(organization) = by_url.get(&normalized) else { continue };
            match self.organization_service.link_profile(profile.id, organization.id, experience).await {
                Ok(_) => linked += 1,
                Err(err) => {
                    tracing::warn!(
                        profile_id = %profile.id,
                        organization_id = %organization.id,
                        error = %err,
                        "failed to link profile to organization",
                    );
                }
            }
        }

        self.tracker.record_organization_counters(request_id, urls.len() as u32, successful, linked);
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_request_defaults_to_including_organizations() {
        let request = IngestionRequest::new("https://linkedin.com/in/ada".to_string());
        assert!(request.include_organizations);
    }
}
