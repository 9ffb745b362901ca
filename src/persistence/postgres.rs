//! PostgreSQL-backed persistence, behind the `postgres` feature.
//!
//! Mirrors the teacher's `PostgresMetadataStore`: a `deadpool_postgres::Pool`,
//! a `connect`/`with_pool`/`migrate` trio, and one inline `SCHEMA_SQL`
//! constant run via `batch_execute`. Each table keeps a handful of indexed
//! columns for the filters and sort keys the gateway actually needs, and the
//! full canonical record in a `data JSONB` column — the same denormalized
//! shape the teacher uses for `packages.manifest` and
//! `contributions.data`, so querying Postgres doesn't require a second
//! source of truth for the struct layout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::canonical::{CanonicalOrganization, CanonicalProfile, ProfileOrganizationEdge};
use crate::error::{AppError, Result};
use crate::scoring::{ScoringJob, ScoringStatus};
use crate::template::PromptTemplate;

use super::{
    EdgeStore, ListParams, OrganizationStore, Page, Pagination, ProfileFilter, ProfileSortKey, ProfileStore,
    ScoringJobStore, SortOrder, TemplateStore,
};

pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let parsed = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| AppError::Internal(format!("invalid database URL: {e}")))?;

        let mut pool_config = Config::new();
        pool_config.host = parsed.get_hosts().first().map(|h| match h {
            tokio_postgres::config::Host::Tcp(s) => s.clone(),
            #[cfg(unix)]
            tokio_postgres::config::Host::Unix(p) => p.to_string_lossy().to_string(),
        });
        pool_config.port = parsed.get_ports().first().copied();
        pool_config.user = parsed.get_user().map(String::from);
        pool_config.password = parsed.get_password().map(|p| String::from_utf8_lossy(p).to_string());
        pool_config.dbname = parsed.get_dbname().map(String::from);
        pool_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Internal(format!("failed to create connection pool: {e}")))?;

        Ok(Self { pool })
    }

    pub fn with_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        let client = self.pool.get().await.map_err(pool_err)?;
        client.batch_execute(SCHEMA_SQL).await.map_err(|e| AppError::Internal(format!("migration failed: {e}")))?;
        Ok(())
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn pool_err(e: deadpool_postgres::PoolError) -> AppError {
    AppError::Internal(format!("failed to get pooled connection: {e}"))
}

fn query_err(e: tokio_postgres::Error) -> AppError {
    AppError::Internal(format!("query failed: {e}"))
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id UUID PRIMARY KEY,
    canonical_url TEXT UNIQUE NOT NULL,
    full_name TEXT NOT NULL,
    city TEXT,
    current_organization_name TEXT,
    follower_count BIGINT,
    connection_count BIGINT,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_profiles_name ON profiles(full_name);
CREATE INDEX IF NOT EXISTS idx_profiles_city ON profiles(city);
CREATE INDEX IF NOT EXISTS idx_profiles_current_org ON profiles(current_organization_name);
CREATE INDEX IF NOT EXISTS idx_profiles_created_at ON profiles(created_at DESC);

CREATE TABLE IF NOT EXISTS organizations (
    id UUID PRIMARY KEY,
    canonical_url TEXT UNIQUE,
    name TEXT NOT NULL,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_organizations_name ON organizations(name);

CREATE TABLE IF NOT EXISTS profile_organizations (
    id UUID PRIMARY KEY,
    profile_id UUID NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    title TEXT,
    start_year INTEGER,
    start_month SMALLINT,
    data JSONB NOT NULL,
    UNIQUE(profile_id, organization_id, start_year, start_month)
);

CREATE INDEX IF NOT EXISTS idx_profile_orgs_profile ON profile_organizations(profile_id);

CREATE TABLE IF NOT EXISTS scoring_jobs (
    id UUID PRIMARY KEY,
    profile_id UUID NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_scoring_jobs_profile ON scoring_jobs(profile_id);
CREATE INDEX IF NOT EXISTS idx_scoring_jobs_status ON scoring_jobs(status);

CREATE TABLE IF NOT EXISTS prompt_templates (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    data JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

fn profile_from_row(row: &tokio_postgres::Row) -> Result<CanonicalProfile> {
    let data: serde_json::Value = row.get("data");
    serde_json::from_value(data).map_err(|e| AppError::Internal(format!("corrupt profile row: {e}")))
}

fn organization_from_row(row: &tokio_postgres::Row) -> Result<CanonicalOrganization> {
    let data: serde_json::Value = row.get("data");
    serde_json::from_value(data).map_err(|e| AppError::Internal(format!("corrupt organization row: {e}")))
}

fn edge_from_row(row: &tokio_postgres::Row) -> Result<ProfileOrganizationEdge> {
    let data: serde_json::Value = row.get("data");
    serde_json::from_value(data).map_err(|e| AppError::Internal(format!("corrupt edge row: {e}")))
}

fn job_from_row(row: &tokio_postgres::Row) -> Result<ScoringJob> {
    let data: serde_json::Value = row.get("data");
    serde_json::from_value(data).map_err(|e| AppError::Internal(format!("corrupt scoring job row: {e}")))
}

fn template_from_row(row: &tokio_postgres::Row) -> Result<PromptTemplate> {
    let data: serde_json::Value = row.get("data");
    serde_json::from_value(data).map_err(|e| AppError::Internal(format!("corrupt template row: {e}")))
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn get_by_url(&self, normalized_url: &str) -> Result<Option<CanonicalProfile>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client
            .query_opt("SELECT data FROM profiles WHERE canonical_url = $1", &[&normalized_url])
            .await
            .map_err(query_err)?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalProfile>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client.query_opt("SELECT data FROM profiles WHERE id = $1", &[&id]).await.map_err(query_err)?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn upsert(&self, profile: CanonicalProfile) -> Result<(CanonicalProfile, bool)> {
        let mut client = self.pool.get().await.map_err(pool_err)?;
        let txn = client.transaction().await.map_err(query_err)?;

        let existing = txn
            .query_opt("SELECT data FROM profiles WHERE canonical_url = $1 FOR UPDATE", &[&profile.canonical_url])
            .await
            .map_err(query_err)?;

        let (merged, created) = match existing {
            Some(row) => (super::memory::merge_profile(profile_from_row(&row)?, profile), false),
            None => (profile, true),
        };

        let data = serde_json::to_value(&merged).map_err(|e| AppError::Internal(format!("failed to serialize profile: {e}")))?;
        let current_org = merged.current_employment.organization_name.clone();

        txn.execute(
            r#"
            INSERT INTO profiles (id, canonical_url, full_name, city, current_organization_name, follower_count, connection_count, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (canonical_url) DO UPDATE SET
                full_name = EXCLUDED.full_name,
                city = EXCLUDED.city,
                current_organization_name = EXCLUDED.current_organization_name,
                follower_count = EXCLUDED.follower_count,
                connection_count = EXCLUDED.connection_count,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
            &[
                &merged.id,
                &merged.canonical_url,
                &merged.full_name,
                &merged.city,
                &current_org,
                &merged.follower_count,
                &merged.connection_count,
                &data,
                &merged.created_at,
                &merged.updated_at,
            ],
        )
        .await
        .map_err(query_err)?;

        txn.commit().await.map_err(query_err)?;
        Ok((merged, created))
    }

    async fn list(&self, filter: ProfileFilter, params: ListParams) -> Result<Page<CanonicalProfile>> {
        let client = self.pool.get().await.map_err(pool_err)?;

        let order_column = match params.sort_by {
            ProfileSortKey::Name => "full_name",
            ProfileSortKey::Position => "full_name",
            ProfileSortKey::City => "city",
            ProfileSortKey::CreatedAt | ProfileSortKey::Timestamp => "created_at",
            ProfileSortKey::FollowerCount => "follower_count",
            ProfileSortKey::ConnectionCount => "connection_count",
            ProfileSortKey::CurrentOrganizationName => "current_organization_name",
        };
        let direction = if params.sort_order == SortOrder::Desc { "DESC" } else { "ASC" };

        let mut clauses = Vec::new();
        let mut binds: Vec<Box<dyn tokio_postgres::types::ToSql + Sync>> = Vec::new();
        if let Some(url) = &filter.linkedin_url {
            binds.push(Box::new(url.clone()));
            clauses.push(format!("canonical_url = ${}", binds.len()));
        }
        if let Some(name) = &filter.name {
            binds.push(Box::new(format!("%{}%", name.to_ascii_lowercase())));
            clauses.push(format!("full_name ILIKE ${}", binds.len()));
        }
        if let Some(company) = &filter.company {
            binds.push(Box::new(format!("%{}%", company.to_ascii_lowercase())));
            clauses.push(format!("current_organization_name ILIKE ${}", binds.len()));
        }

        let where_clause = if clauses.is_empty() { String::new() } else { format!("WHERE {}", clauses.join(" AND ")) };
        let bind_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = binds.iter().map(|b| b.as_ref()).collect();

        let count_sql = format!("SELECT COUNT(*) FROM profiles {where_clause}");
        let total: i64 = client.query_one(&count_sql, &bind_refs).await.map_err(query_err)?.get(0);

        let list_sql = format!(
            "SELECT data FROM profiles {where_clause} ORDER BY {order_column} {direction} LIMIT {} OFFSET {}",
            params.pagination.limit, params.pagination.offset
        );
        let rows = client.query(&list_sql, &bind_refs).await.map_err(query_err)?;
        let items = rows.iter().map(profile_from_row).collect::<Result<Vec<_>>>()?;

        Ok(Page { items, total: total as u64 })
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let rows = client.execute("DELETE FROM profiles WHERE id = $1", &[&id]).await.map_err(query_err)?;
        Ok(rows > 0)
    }
}

#[async_trait]
impl OrganizationStore for PostgresStore {
    async fn get_by_url(&self, normalized_url: &str) -> Result<Option<CanonicalOrganization>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client
            .query_opt("SELECT data FROM organizations WHERE canonical_url = $1", &[&normalized_url])
            .await
            .map_err(query_err)?;
        row.as_ref().map(organization_from_row).transpose()
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<CanonicalOrganization>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client.query_opt("SELECT data FROM organizations WHERE id = $1", &[&id]).await.map_err(query_err)?;
        row.as_ref().map(organization_from_row).transpose()
    }

    async fn list_missing_url(&self) -> Result<Vec<CanonicalOrganization>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let rows = client
            .query("SELECT data FROM organizations WHERE canonical_url IS NULL", &[])
            .await
            .map_err(query_err)?;
        rows.iter().map(organization_from_row).collect()
    }

    async fn upsert(&self, organization: CanonicalOrganization) -> Result<CanonicalOrganization> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let data = serde_json::to_value(&organization)
            .map_err(|e| AppError::Internal(format!("failed to serialize organization: {e}")))?;

        client
            .execute(
                r#"
                INSERT INTO organizations (id, canonical_url, name, data, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    canonical_url = EXCLUDED.canonical_url,
                    name = EXCLUDED.name,
                    data = EXCLUDED.data,
                    updated_at = EXCLUDED.updated_at
                "#,
                &[
                    &organization.id,
                    &organization.canonical_url,
                    &organization.name,
                    &data,
                    &organization.created_at,
                    &organization.updated_at,
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(organization)
    }
}

#[async_trait]
impl EdgeStore for PostgresStore {
    async fn upsert(&self, edge: ProfileOrganizationEdge) -> Result<ProfileOrganizationEdge> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let data = serde_json::to_value(&edge).map_err(|e| AppError::Internal(format!("failed to serialize edge: {e}")))?;

        let row = client
            .query_one(
                r#"
                INSERT INTO profile_organizations (id, profile_id, organization_id, title, start_year, start_month, data)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (profile_id, organization_id, start_year, start_month) DO UPDATE SET
                    title = EXCLUDED.title,
                    data = EXCLUDED.data
                RETURNING data
                "#,
                &[
                    &edge.id,
                    &edge.profile_id,
                    &edge.organization_id,
                    &edge.title,
                    &edge.start_year,
                    &edge.start_month.map(|m| m as i16),
                    &data,
                ],
            )
            .await
            .map_err(query_err)?;

        edge_from_row(&row)
    }

    async fn list_for_profile(&self, profile_id: Uuid) -> Result<Vec<ProfileOrganizationEdge>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let rows = client
            .query("SELECT data FROM profile_organizations WHERE profile_id = $1", &[&profile_id])
            .await
            .map_err(query_err)?;
        rows.iter().map(edge_from_row).collect()
    }

    async fn delete_for_profile(&self, profile_id: Uuid) -> Result<()> {
        let client = self.pool.get().await.map_err(pool_err)?;
        client
            .execute("DELETE FROM profile_organizations WHERE profile_id = $1", &[&profile_id])
            .await
            .map_err(query_err)?;
        Ok(())
    }
}

fn job_status_str(status: ScoringStatus) -> &'static str {
    match status {
        ScoringStatus::Pending => "pending",
        ScoringStatus::Processing => "processing",
        ScoringStatus::Completed => "completed",
        ScoringStatus::Failed => "failed",
    }
}

#[async_trait]
impl ScoringJobStore for PostgresStore {
    async fn create(&self, job: ScoringJob) -> Result<ScoringJob> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let data = serde_json::to_value(&job).map_err(|e| AppError::Internal(format!("failed to serialize scoring job: {e}")))?;

        client
            .execute(
                r#"
                INSERT INTO scoring_jobs (id, profile_id, status, retry_count, data, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
                &[
                    &job.id,
                    &job.profile_id,
                    &job_status_str(job.status),
                    &(job.retry_count as i32),
                    &data,
                    &job.created_at,
                    &job.updated_at,
                ],
            )
            .await
            .map_err(query_err)?;

        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ScoringJob>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client.query_opt("SELECT data FROM scoring_jobs WHERE id = $1", &[&id]).await.map_err(query_err)?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn count_recent_for_profile(&self, profile_id: Uuid, since: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client
            .query_one(
                "SELECT COUNT(*) FROM scoring_jobs WHERE profile_id = $1 AND created_at >= $2",
                &[&profile_id, &since],
            )
            .await
            .map_err(query_err)?;
        let count: i64 = row.get(0);
        Ok(count as u64)
    }

    /// `UPDATE ... WHERE status = 'pending'` is the compare-and-swap: a
    /// concurrent claim on the same job loses the row-count race and the
    /// `RETURNING` clause yields nothing (§4.7).
    async fn claim_pending(&self, id: Uuid) -> Result<Option<ScoringJob>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client
            .query_opt(
                r#"
                UPDATE scoring_jobs
                SET status = 'processing', updated_at = NOW(),
                    data = jsonb_set(data, '{status}', '"processing"')
                WHERE id = $1 AND status = 'pending'
                RETURNING data
                "#,
                &[&id],
            )
            .await
            .map_err(query_err)?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn save(&self, job: ScoringJob) -> Result<ScoringJob> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let data = serde_json::to_value(&job).map_err(|e| AppError::Internal(format!("failed to serialize scoring job: {e}")))?;

        client
            .execute(
                r#"
                UPDATE scoring_jobs SET status = $2, retry_count = $3, data = $4, updated_at = $5
                WHERE id = $1
                "#,
                &[&job.id, &job_status_str(job.status), &(job.retry_count as i32), &data, &job.updated_at],
            )
            .await
            .map_err(query_err)?;

        Ok(job)
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let rows = client
            .execute(
                "DELETE FROM scoring_jobs WHERE status IN ('completed', 'failed') AND updated_at < $1",
                &[&cutoff],
            )
            .await
            .map_err(query_err)?;
        Ok(rows)
    }

    async fn delete_for_profile(&self, profile_id: Uuid) -> Result<()> {
        let client = self.pool.get().await.map_err(pool_err)?;
        client.execute("DELETE FROM scoring_jobs WHERE profile_id = $1", &[&profile_id]).await.map_err(query_err)?;
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for PostgresStore {
    async fn create(&self, template: PromptTemplate) -> Result<PromptTemplate> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let data = serde_json::to_value(&template).map_err(|e| AppError::Internal(format!("failed to serialize template: {e}")))?;

        client
            .execute(
                r#"
                INSERT INTO prompt_templates (id, name, is_active, data, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[&template.id, &template.name, &template.is_active, &data, &template.created_at, &template.updated_at],
            )
            .await
            .map_err(query_err)?;

        Ok(template)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PromptTemplate>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let row = client.query_opt("SELECT data FROM prompt_templates WHERE id = $1", &[&id]).await.map_err(query_err)?;
        row.as_ref().map(template_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<PromptTemplate>> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let rows = client.query("SELECT data FROM prompt_templates ORDER BY created_at DESC", &[]).await.map_err(query_err)?;
        rows.iter().map(template_from_row).collect()
    }

    async fn update(&self, template: PromptTemplate) -> Result<PromptTemplate> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let data = serde_json::to_value(&template).map_err(|e| AppError::Internal(format!("failed to serialize template: {e}")))?;

        client
            .execute(
                "UPDATE prompt_templates SET name = $2, is_active = $3, data = $4, updated_at = $5 WHERE id = $1",
                &[&template.id, &template.name, &template.is_active, &data, &template.updated_at],
            )
            .await
            .map_err(query_err)?;

        Ok(template)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool> {
        let client = self.pool.get().await.map_err(pool_err)?;
        let rows = client
            .execute(
                r#"
                UPDATE prompt_templates
                SET is_active = FALSE, updated_at = NOW(), data = jsonb_set(data, '{is_active}', 'false')
                WHERE id = $1
                "#,
                &[&id],
            )
            .await
            .map_err(query_err)?;
        Ok(rows > 0)
    }
}
