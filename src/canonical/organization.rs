//! Canonical Organization record (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Known employee-count buckets used by public profile scrapers. An
/// unrecognized bucket string from upstream is retained as-is — it is
/// never fabricated, never rejected — but flagged via a `debug!` log at
/// the adapter boundary (SPEC_FULL §3).
pub const EMPLOYEE_RANGE_BUCKETS: &[&str] = &[
    "1-10", "11-50", "51-200", "201-500", "501-1000", "1001-5000", "5001-10000", "10001+",
];

/// Structured + free-form headquarters address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Address {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Free-form rendering as returned by upstream, kept alongside the
    /// structured fields because the workflow service does not always
    /// agree with itself about how to split an address.
    pub line: Option<String>,
}

/// Canonical Organization (company/employer) record (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CanonicalOrganization {
    pub id: Uuid,
    pub external_organization_id: Option<String>,
    /// Normalized canonical URL; the dedup key (§4.4). `None` only for
    /// organizations matched purely by name-similarity before a URL was
    /// ever observed (§4.4 step 3).
    pub canonical_url: Option<String>,

    pub name: String,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub domain: Option<String>,
    pub logo_url: Option<String>,
    pub year_founded: Option<i32>,

    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub specialties: Vec<String>,

    pub employee_count: Option<u64>,
    pub employee_range: Option<String>,
    pub follower_count: Option<u64>,

    pub headquarters: Address,

    pub email: Option<String>,
    pub phone: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Builds a [`CanonicalOrganization`], validating on construction the way
/// the canonical model's constructors do for every entity (§4.1): required
/// fields present, list fields default to empty rather than null, counts
/// non-negative, employee bucket checked against the known set.
#[derive(Debug, Default)]
pub struct OrganizationBuilder {
    pub external_organization_id: Option<String>,
    pub canonical_url: Option<String>,
    pub name: Option<String>,
    pub tagline: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub domain: Option<String>,
    pub logo_url: Option<String>,
    pub year_founded: Option<i32>,
    pub industries: Vec<String>,
    pub specialties: Vec<String>,
    pub employee_count: Option<i64>,
    pub employee_range: Option<String>,
    pub follower_count: Option<i64>,
    pub headquarters: Address,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl OrganizationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and builds a fresh organization, stamping both
    /// timestamps to `Utc::now()`.
    pub fn build(self) -> Result<CanonicalOrganization> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| AppError::AdapterIncomplete {
                missing_fields: vec!["organization.name".to_string()],
            })?;

        let employee_count = match self.employee_count {
            Some(n) if n < 0 => {
                return Err(AppError::Validation(
                    "organization.employee_count must be >= 0".to_string(),
                ))
            }
            Some(n) => Some(n as u64),
            None => None,
        };
        let follower_count = match self.follower_count {
            Some(n) if n < 0 => {
                return Err(AppError::Validation(
                    "organization.follower_count must be >= 0".to_string(),
                ))
            }
            Some(n) => Some(n as u64),
            None => None,
        };

        if let Some(bucket) = &self.employee_range {
            if !EMPLOYEE_RANGE_BUCKETS.contains(&bucket.as_str()) {
                tracing::debug!(bucket = %bucket, "unrecognized employee_range bucket from upstream");
            }
        }

        let now = Utc::now();
        Ok(CanonicalOrganization {
            id: Uuid::new_v4(),
            external_organization_id: self.external_organization_id,
            canonical_url: self.canonical_url,
            name,
            tagline: self.tagline,
            description: self.description,
            website: self.website,
            domain: self.domain,
            logo_url: self.logo_url,
            year_founded: self.year_founded,
            industries: self.industries,
            specialties: self.specialties,
            employee_count,
            employee_range: self.employee_range,
            follower_count,
            headquarters: self.headquarters,
            email: self.email,
            phone: self.phone,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_name() {
        let err = OrganizationBuilder::new().build().unwrap_err();
        assert_eq!(err.error_code(), "ADAPTER_INCOMPLETE");
    }

    #[test]
    fn build_fills_timestamps_and_defaults() {
        let org = OrganizationBuilder {
            name: Some("Acme Corp".to_string()),
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(org.name, "Acme Corp");
        assert!(org.industries.is_empty());
        assert_eq!(org.created_at, org.updated_at);
    }

    #[test]
    fn negative_employee_count_rejected() {
        let err = OrganizationBuilder {
            name: Some("Acme".to_string()),
            employee_count: Some(-1),
            ..Default::default()
        }
        .build()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn round_trip_serialize_parse() {
        let org = OrganizationBuilder {
            name: Some("Acme Corp".to_string()),
            industries: vec!["Software".to_string()],
            employee_range: Some("51-200".to_string()),
            ..Default::default()
        }
        .build()
        .unwrap();
        let json = serde_json::to_string(&org).unwrap();
        let parsed: CanonicalOrganization = serde_json::from_str(&json).unwrap();
        assert_eq!(org, parsed);
    }
}
