//! Persistence Gateway (C6).
//!
//! Logical CRUD over canonical profiles, organizations, edges, scoring
//! jobs, and prompt templates, shaped after the teacher's trait-plus-backend
//! split (`MetadataStore` / `InMemoryMetadataStore` /
//! `postgres::PostgresMetadataStore`): one set of traits here, a default
//! in-memory implementation always compiled, and a `postgres`
//! feature-gated implementation on `tokio-postgres` + `deadpool-postgres`.
//!
//! The gateway, not the backend, is responsible for invariants the store
//! itself cannot enforce cheaply — URL normalization before insert is done
//! by callers (organization service, orchestrator) before reaching these
//! traits; what lives here is uniqueness-by-key and listing semantics.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::canonical::{CanonicalOrganization, CanonicalProfile, ProfileOrganizationEdge};
use crate::error::{AppError, Result};
use crate::scoring::ScoringJob;
use crate::template::PromptTemplate;

/// Sort keys accepted by `list_profiles`, per the declared allow-list
/// (SPEC_FULL §4.6 / spec §6). `Company` and `Location` are aliases
/// resolved at parse time, not stored as distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSortKey {
    Name,
    Position,
    City,
    CreatedAt,
    Timestamp,
    FollowerCount,
    ConnectionCount,
    CurrentOrganizationName,
}

impl ProfileSortKey {
    /// Parses a caller-supplied `sort_by` value, resolving the `company`
    /// and `location` aliases, or returns `AppError::InvalidSortKey`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "name" => Ok(Self::Name),
            "position" => Ok(Self::Position),
            "city" | "location" => Ok(Self::City),
            "created_at" => Ok(Self::CreatedAt),
            "timestamp" => Ok(Self::Timestamp),
            "follower_count" => Ok(Self::FollowerCount),
            "connection_count" => Ok(Self::ConnectionCount),
            "current_organization_name" | "company" => Ok(Self::CurrentOrganizationName),
            other => Err(AppError::InvalidSortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Ok(Self::Asc),
            Some("desc") => Ok(Self::Desc),
            Some(other) => Err(AppError::InvalidSortKey(format!("invalid sort_order: {other}"))),
        }
    }
}

/// Validated `limit`/`offset` pagination window. `limit` must be `0..=100`
/// (spec §8 boundary: 100 permitted, 101 rejected); default 50.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Result<Self> {
        let limit = limit.unwrap_or(50);
        if limit > 100 {
            return Err(AppError::InvalidPagination(format!(
                "limit {limit} exceeds maximum of 100"
            )));
        }
        Ok(Self {
            limit,
            offset: offset.unwrap_or(0),
        })
    }
}

/// Caller-supplied filters for `list_profiles`.
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    /// Exact match against the normalized canonical URL.
    pub linkedin_url: Option<String>,
    /// Case-insensitive substring match against full name.
    pub name: Option<String>,
    /// Case-insensitive substring match against current employer name.
    pub company: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ListParams {
    pub sort_by: ProfileSortKey,
    pub sort_order: SortOrder,
    pub pagination: Pagination,
}

/// A page of results plus enough information to compute `has_more`.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn has_more(&self, pagination: &Pagination) -> bool {
        u64::from(pagination.offset) + (self.items.len() as u64) < self.total
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_by_url(&self, normalized_url: &str) -> Result<Option<CanonicalProfile>>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalProfile>>;
    /// Inserts or merges a profile keyed on its normalized `canonical_url`.
    /// Returns the stored record and whether it was newly created.
    async fn upsert(&self, profile: CanonicalProfile) -> Result<(CanonicalProfile, bool)>;
    async fn list(&self, filter: ProfileFilter, params: ListParams) -> Result<Page<CanonicalProfile>>;
    /// Deletes the profile and cascades to its edges and scoring jobs.
    /// Returns `false` if no such profile existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait OrganizationStore: Send + Sync {
    async fn get_by_url(&self, normalized_url: &str) -> Result<Option<CanonicalOrganization>>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalOrganization>>;
    /// Organizations with no canonical URL recorded yet — candidates for
    /// the name-similarity match in the organization service (§4.4 step 3).
    async fn list_missing_url(&self) -> Result<Vec<CanonicalOrganization>>;
    /// Inserts the organization or merges it into an existing row with the
    /// same id (non-null-wins on scalars, replace-if-non-empty on lists).
    async fn upsert(&self, organization: CanonicalOrganization) -> Result<CanonicalOrganization>;
}

#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Upserts on the composite key in `edge.dedup_key()`.
    async fn upsert(&self, edge: ProfileOrganizationEdge) -> Result<ProfileOrganizationEdge>;
    async fn list_for_profile(&self, profile_id: Uuid) -> Result<Vec<ProfileOrganizationEdge>>;
    async fn delete_for_profile(&self, profile_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ScoringJobStore: Send + Sync {
    async fn create(&self, job: ScoringJob) -> Result<ScoringJob>;
    async fn get(&self, id: Uuid) -> Result<Option<ScoringJob>>;
    /// Counts jobs created for `profile_id` within the trailing hour, for
    /// the per-profile rate limit in spec §6.
    async fn count_recent_for_profile(&self, profile_id: Uuid, since: chrono::DateTime<chrono::Utc>) -> Result<u64>;
    /// Atomically transitions one pending job to processing. Returns
    /// `None` if the job is missing or was not in `pending` status — the
    /// compare-and-swap the race-safety invariant in §4.7 depends on.
    async fn claim_pending(&self, id: Uuid) -> Result<Option<ScoringJob>>;
    async fn save(&self, job: ScoringJob) -> Result<ScoringJob>;
    /// Deletes completed/failed jobs whose `updated_at` is older than
    /// `cutoff`. Returns the number of rows removed.
    async fn sweep_expired(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64>;
    async fn delete_for_profile(&self, profile_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn create(&self, template: PromptTemplate) -> Result<PromptTemplate>;
    async fn get(&self, id: Uuid) -> Result<Option<PromptTemplate>>;
    async fn list(&self) -> Result<Vec<PromptTemplate>>;
    async fn update(&self, template: PromptTemplate) -> Result<PromptTemplate>;
    /// Soft-delete: flips `is_active` to `false` rather than removing the
    /// row, since historical scoring jobs may still reference it (§3
    /// lifecycle).
    async fn deactivate(&self, id: Uuid) -> Result<bool>;
}
