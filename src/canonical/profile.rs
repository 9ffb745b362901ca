//! Canonical Profile record, plus its nested Experience/Education entries
//! (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// One entry in a profile's ordered employment history. Not a standalone
/// entity — always nested inside [`CanonicalProfile::experiences`], in the
/// order the upstream payload gave them (most-recent-first, per §4.3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Experience {
    pub title: Option<String>,
    pub organization_name: Option<String>,
    /// Raw, not-yet-normalized organization URL as given by upstream. The
    /// orchestrator normalizes this when deriving the organization-fetch
    /// batch (§4.5 step 5).
    pub organization_url: Option<String>,
    pub location: Option<String>,
    pub start_month: Option<u8>,
    pub start_year: Option<i32>,
    pub end_month: Option<u8>,
    pub end_year: Option<i32>,
    pub is_current: bool,
    pub job_type: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub description: Option<String>,
}

/// One entry in a profile's ordered education history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Education {
    pub school_name: Option<String>,
    pub school_url: Option<String>,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub activities: Option<String>,
}

/// Denormalized copy of the profile's current employer, kept on the
/// profile for cheap display. Authoritative organization data always
/// lives in the linked `CanonicalOrganization`, never here (§3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CurrentEmployment {
    pub organization_name: Option<String>,
    pub title: Option<String>,
    pub join_month: Option<u8>,
    pub join_year: Option<i32>,
    /// Free-form duration string as rendered by upstream (e.g. "2 yrs 3
    /// mos") — not recomputed, just carried through.
    pub duration: Option<String>,
}

/// Canonical Profile: one public professional identity (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CanonicalProfile {
    pub id: Uuid,
    pub external_profile_id: String,
    pub public_handle: Option<String>,
    /// Normalized canonical URL; the dedup key (§3 invariant 1).
    pub canonical_url: String,
    pub urn: Option<String>,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub headline: Option<String>,
    pub about: Option<String>,
    pub image_url: Option<String>,

    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub location: Option<String>,

    pub email: Option<String>,
    pub phone: Option<String>,

    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub educations: Vec<Education>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,

    pub follower_count: Option<u64>,
    pub connection_count: Option<u64>,

    pub current_employment: CurrentEmployment,

    pub is_premium: bool,
    pub is_creator: bool,
    pub is_influencer: bool,
    pub is_verified: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Builds a [`CanonicalProfile`], validating the essential-field contract
/// on construction (§4.3): external profile id, full name, and canonical
/// URL must all be present and non-empty, or the adapter's
/// `IncompleteDataError` (here, `AppError::AdapterIncomplete`) is raised
/// enumerating every missing field at once rather than failing fast on
/// the first one.
#[derive(Debug, Default)]
pub struct ProfileBuilder {
    pub external_profile_id: Option<String>,
    pub public_handle: Option<String>,
    pub canonical_url: Option<String>,
    pub urn: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub headline: Option<String>,
    pub about: Option<String>,
    pub image_url: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub experiences: Vec<Experience>,
    pub educations: Vec<Education>,
    pub certifications: Vec<String>,
    pub languages: Vec<String>,
    pub follower_count: Option<i64>,
    pub connection_count: Option<i64>,
    pub current_employment: CurrentEmployment,
    pub is_premium: bool,
    pub is_creator: bool,
    pub is_influencer: bool,
    pub is_verified: bool,
}

impl ProfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Result<CanonicalProfile> {
        let mut missing = Vec::new();
        if self
            .external_profile_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
        {
            missing.push("profile.external_profile_id".to_string());
        }
        if self
            .full_name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
        {
            missing.push("profile.full_name".to_string());
        }
        if self
            .canonical_url
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .is_empty()
        {
            missing.push("profile.canonical_url".to_string());
        }
        if !missing.is_empty() {
            return Err(AppError::AdapterIncomplete {
                missing_fields: missing,
            });
        }

        for exp in &self.experiences {
            if exp.start_month.is_some() && exp.start_year.is_none() {
                return Err(AppError::Validation(
                    "experience.start_month present without experience.start_year".to_string(),
                ));
            }
            if exp.end_month.is_some() && exp.end_year.is_none() {
                return Err(AppError::Validation(
                    "experience.end_month present without experience.end_year".to_string(),
                ));
            }
            if let (Some(sy), Some(ey)) = (exp.start_year, exp.end_year) {
                let start = (sy, exp.start_month.unwrap_or(1));
                let end = (ey, exp.end_month.unwrap_or(12));
                if start > end {
                    return Err(AppError::Validation(
                        "experience start date must not be after end date".to_string(),
                    ));
                }
            }
        }

        let follower_count = non_negative(self.follower_count, "profile.follower_count")?;
        let connection_count = non_negative(self.connection_count, "profile.connection_count")?;

        let now = Utc::now();
        Ok(CanonicalProfile {
            id: Uuid::new_v4(),
            external_profile_id: self.external_profile_id.unwrap(),
            public_handle: self.public_handle,
            canonical_url: self.canonical_url.unwrap(),
            urn: self.urn,
            first_name: self.first_name,
            last_name: self.last_name,
            full_name: self.full_name.unwrap(),
            headline: self.headline,
            about: self.about,
            image_url: self.image_url,
            city: self.city,
            state: self.state,
            country: self.country,
            location: self.location,
            email: self.email,
            phone: self.phone,
            experiences: self.experiences,
            educations: self.educations,
            certifications: self.certifications,
            languages: self.languages,
            follower_count,
            connection_count,
            current_employment: self.current_employment,
            is_premium: self.is_premium,
            is_creator: self.is_creator,
            is_influencer: self.is_influencer,
            is_verified: self.is_verified,
            created_at: now,
            updated_at: now,
        })
    }
}

fn non_negative(value: Option<i64>, field: &str) -> Result<Option<u64>> {
    match value {
        Some(n) if n < 0 => Err(AppError::Validation(format!("{field} must be >= 0"))),
        Some(n) => Ok(Some(n as u64)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_builder() -> ProfileBuilder {
        ProfileBuilder {
            external_profile_id: Some("abc123".to_string()),
            full_name: Some("Ada Lovelace".to_string()),
            canonical_url: Some("https://linkedin.com/in/ada".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn build_reports_all_missing_essential_fields_at_once() {
        let err = ProfileBuilder::new().build().unwrap_err();
        match err {
            AppError::AdapterIncomplete { missing_fields } => {
                assert_eq!(missing_fields.len(), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn month_without_year_is_rejected() {
        let mut builder = valid_builder();
        builder.experiences.push(Experience {
            start_month: Some(3),
            ..Default::default()
        });
        assert!(builder.build().is_err());
    }

    #[test]
    fn year_without_month_is_accepted() {
        let mut builder = valid_builder();
        builder.experiences.push(Experience {
            start_year: Some(2020),
            ..Default::default()
        });
        assert!(builder.build().is_ok());
    }

    #[test]
    fn start_after_end_rejected() {
        let mut builder = valid_builder();
        builder.experiences.push(Experience {
            start_year: Some(2021),
            start_month: Some(1),
            end_year: Some(2020),
            end_month: Some(1),
            ..Default::default()
        });
        assert!(builder.build().is_err());
    }

    #[test]
    fn round_trip_serialize_parse() {
        let profile = valid_builder().build().unwrap();
        let json = serde_json::to_string(&profile).unwrap();
        let parsed: CanonicalProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(profile, parsed);
    }
}
