//! Default in-memory backend (C6), always compiled.
//!
//! One struct backs every store trait, the way the teacher's
//! `InMemoryMetadataStore` implements `MetadataStore`, `ContributionStore`,
//! and `ApiKeyStore` all on a single type holding several
//! `RwLock<HashMap<...>>` fields — this is what lets cascading deletes
//! (profile → edges → scoring jobs) stay in one place instead of needing
//! cross-store coordination.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::canonical::{CanonicalOrganization, CanonicalProfile, ProfileOrganizationEdge};
use crate::error::Result;
use crate::scoring::{ScoringJob, ScoringStatus};
use crate::template::PromptTemplate;

use super::{
    EdgeStore, ListParams, OrganizationStore, Page, Pagination, ProfileFilter, ProfileSortKey, ProfileStore,
    ScoringJobStore, SortOrder, TemplateStore,
};

/// In-memory implementation of every persistence trait. Not durable across
/// process restarts; suitable for local development and tests, and the
/// default backend when the `postgres` feature is disabled.
#[derive(Default)]
pub struct InMemoryStore {
    profiles: RwLock<HashMap<Uuid, CanonicalProfile>>,
    organizations: RwLock<HashMap<Uuid, CanonicalOrganization>>,
    edges: RwLock<HashMap<Uuid, ProfileOrganizationEdge>>,
    scoring_jobs: RwLock<HashMap<Uuid, ScoringJob>>,
    templates: RwLock<HashMap<Uuid, PromptTemplate>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Non-null-wins merge for profiles, shared with the postgres backend so
/// both stores apply the identical dedup-by-URL semantics (§4.2).
pub(super) fn merge_profile(existing: CanonicalProfile, incoming: CanonicalProfile) -> CanonicalProfile {
    CanonicalProfile {
        id: existing.id,
        external_profile_id: if incoming.external_profile_id.is_empty() {
            existing.external_profile_id
        } else {
            incoming.external_profile_id
        },
        public_handle: incoming.public_handle.or(existing.public_handle),
        canonical_url: existing.canonical_url,
        urn: incoming.urn.or(existing.urn),
        first_name: incoming.first_name.or(existing.first_name),
        last_name: incoming.last_name.or(existing.last_name),
        full_name: if incoming.full_name.is_empty() { existing.full_name } else { incoming.full_name },
        headline: incoming.headline.or(existing.headline),
        about: incoming.about.or(existing.about),
        image_url: incoming.image_url.or(existing.image_url),
        city: incoming.city.or(existing.city),
        state: incoming.state.or(existing.state),
        country: incoming.country.or(existing.country),
        location: incoming.location.or(existing.location),
        email: incoming.email.or(existing.email),
        phone: incoming.phone.or(existing.phone),
        experiences: if incoming.experiences.is_empty() { existing.experiences } else { incoming.experiences },
        educations: if incoming.educations.is_empty() { existing.educations } else { incoming.educations },
        certifications: if incoming.certifications.is_empty() { existing.certifications } else { incoming.certifications },
        languages: if incoming.languages.is_empty() { existing.languages } else { incoming.languages },
        follower_count: incoming.follower_count.or(existing.follower_count),
        connection_count: incoming.connection_count.or(existing.connection_count),
        current_employment: incoming.current_employment,
        is_premium: incoming.is_premium,
        is_creator: incoming.is_creator,
        is_influencer: incoming.is_influencer,
        is_verified: incoming.is_verified,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_by_url(&self, normalized_url: &str) -> Result<Option<CanonicalProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().find(|p| p.canonical_url == normalized_url).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalProfile>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&id).cloned())
    }

    async fn upsert(&self, profile: CanonicalProfile) -> Result<(CanonicalProfile, bool)> {
        let mut profiles = self.profiles.write().await;
        let existing_id = profiles
            .values()
            .find(|p| p.canonical_url == profile.canonical_url)
            .map(|p| p.id);

        match existing_id {
            Some(id) => {
                let existing = profiles.remove(&id).expect("id came from this map");
                let merged = merge_profile(existing, profile);
                profiles.insert(merged.id, merged.clone());
                Ok((merged, false))
            }
            None => {
                profiles.insert(profile.id, profile.clone());
                Ok((profile, true))
            }
        }
    }

    async fn list(&self, filter: ProfileFilter, params: ListParams) -> Result<Page<CanonicalProfile>> {
        let profiles = self.profiles.read().await;
        let mut matched: Vec<CanonicalProfile> = profiles
            .values()
            .filter(|p| {
                if let Some(url) = &filter.linkedin_url {
                    if &p.canonical_url != url {
                        return false;
                    }
                }
                if let Some(name) = &filter.name {
                    if !p.full_name.to_ascii_lowercase().contains(&name.to_ascii_lowercase()) {
                        return false;
                    }
                }
                if let Some(company) = &filter.company {
                    let current = p.current_employment.organization_name.as_deref().unwrap_or_default();
                    if !current.to_ascii_lowercase().contains(&company.to_ascii_lowercase()) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| compare_profiles(a, b, params.sort_by));
        if params.sort_order == SortOrder::Desc {
            matched.reverse();
        }

        let total = matched.len() as u64;
        let Pagination { limit, offset } = params.pagination;
        let items = matched.into_iter().skip(offset as usize).take(limit as usize).collect();

        Ok(Page { items, total })
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let removed = self.profiles.write().await.remove(&id).is_some();
        if removed {
            let mut edges = self.edges.write().await;
            edges.retain(|_, edge| edge.profile_id != id);
            let mut jobs = self.scoring_jobs.write().await;
            jobs.retain(|_, job| job.profile_id != id);
        }
        Ok(removed)
    }
}

fn compare_profiles(a: &CanonicalProfile, b: &CanonicalProfile, key: ProfileSortKey) -> Ordering {
    match key {
        ProfileSortKey::Name => a.full_name.cmp(&b.full_name),
        ProfileSortKey::Position => a
            .experiences
            .first()
            .and_then(|e| e.title.clone())
            .cmp(&b.experiences.first().and_then(|e| e.title.clone())),
        ProfileSortKey::City => a.city.cmp(&b.city),
        ProfileSortKey::CreatedAt | ProfileSortKey::Timestamp => a.created_at.cmp(&b.created_at),
        ProfileSortKey::FollowerCount => a.follower_count.cmp(&b.follower_count),
        ProfileSortKey::ConnectionCount => a.connection_count.cmp(&b.connection_count),
        ProfileSortKey::CurrentOrganizationName => a
            .current_employment
            .organization_name
            .cmp(&b.current_employment.organization_name),
    }
}

#[async_trait]
impl OrganizationStore for InMemoryStore {
    async fn get_by_url(&self, normalized_url: &str) -> Result<Option<CanonicalOrganization>> {
        let organizations = self.organizations.read().await;
        Ok(organizations.values().find(|o| o.canonical_url.as_deref() == Some(normalized_url)).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalOrganization>> {
        let organizations = self.organizations.read().await;
        Ok(organizations.get(&id).cloned())
    }

    async fn list_missing_url(&self) -> Result<Vec<CanonicalOrganization>> {
        let organizations = self.organizations.read().await;
        Ok(organizations.values().filter(|o| o.canonical_url.is_none()).cloned().collect())
    }

    async fn upsert(&self, organization: CanonicalOrganization) -> Result<CanonicalOrganization> {
        let mut organizations = self.organizations.write().await;
        organizations.insert(organization.id, organization.clone());
        Ok(organization)
    }
}

#[async_trait]
impl EdgeStore for InMemoryStore {
    async fn upsert(&self, edge: ProfileOrganizationEdge) -> Result<ProfileOrganizationEdge> {
        let mut edges = self.edges.write().await;
        let existing_id = edges
            .values()
            .find(|e| e.dedup_key() == edge.dedup_key())
            .map(|e| e.id);
        match existing_id {
            Some(id) => {
                let mut merged = edge;
                merged.id = id;
                edges.insert(id, merged.clone());
                Ok(merged)
            }
            None => {
                edges.insert(edge.id, edge.clone());
                Ok(edge)
            }
        }
    }

    async fn list_for_profile(&self, profile_id: Uuid) -> Result<Vec<ProfileOrganizationEdge>> {
        let edges = self.edges.read().await;
        Ok(edges.values().filter(|e| e.profile_id == profile_id).cloned().collect())
    }

    async fn delete_for_profile(&self, profile_id: Uuid) -> Result<()> {
        let mut edges = self.edges.write().await;
        edges.retain(|_, e| e.profile_id != profile_id);
        Ok(())
    }
}

#[async_trait]
impl ScoringJobStore for InMemoryStore {
    async fn create(&self, job: ScoringJob) -> Result<ScoringJob> {
        let mut jobs = self.scoring_jobs.write().await;
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScoringJob>> {
        let jobs = self.scoring_jobs.read().await;
        Ok(jobs.get(&id).cloned())
    }

    async fn count_recent_for_profile(&self, profile_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let jobs = self.scoring_jobs.read().await;
        Ok(jobs
            .values()
            .filter(|j| j.profile_id == profile_id && j.created_at >= since)
            .count() as u64)
    }

    async fn claim_pending(&self, id: Uuid) -> Result<Option<ScoringJob>> {
        let mut jobs = self.scoring_jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status == ScoringStatus::Pending => {
                job.status = ScoringStatus::Processing;
                job.updated_at = Utc::now();
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn save(&self, job: ScoringJob) -> Result<ScoringJob> {
        let mut jobs = self.scoring_jobs.write().await;
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut jobs = self.scoring_jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            let terminal = matches!(job.status, ScoringStatus::Completed | ScoringStatus::Failed);
            !(terminal && job.updated_at < cutoff)
        });
        Ok((before - jobs.len()) as u64)
    }

    async fn delete_for_profile(&self, profile_id: Uuid) -> Result<()> {
        let mut jobs = self.scoring_jobs.write().await;
        jobs.retain(|_, job| job.profile_id != profile_id);
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for InMemoryStore {
    async fn create(&self, template: PromptTemplate) -> Result<PromptTemplate> {
        let mut templates = self.templates.write().await;
        templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PromptTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<PromptTemplate>> {
        let templates = self.templates.read().await;
        Ok(templates.values().cloned().collect())
    }

    async fn update(&self, template: PromptTemplate) -> Result<PromptTemplate> {
        let mut templates = self.templates.write().await;
        templates.insert(template.id, template.clone());
        Ok(template)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool> {
        let mut templates = self.templates.write().await;
        if let Some(template) = templates.get_mut(&id) {
            template.is_active = false;
            template.updated_at = Utc::now();
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
