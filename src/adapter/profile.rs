//! Raw profile payload → [`crate::canonical::CanonicalProfile`].

use serde_json::Value;

use super::{array_at, bool_at, i64_at, str_at, str_list_at, u8_at};
use crate::canonical::{
    normalize_url, CanonicalProfile, CurrentEmployment, Education, Experience, ProfileBuilder,
};
use crate::error::Result;

/// Maps a raw workflow profile payload into a canonical profile. Essential
/// fields: external profile id, full name, canonical URL (SPEC_FULL §4.3).
/// A present-but-unparseable URL is treated the same as an absent one — the
/// profile builder's own essential-field check surfaces it as a single
/// `ADAPTER_INCOMPLETE` entry for `profile.canonical_url`.
pub fn adapt_profile(raw: &Value) -> Result<CanonicalProfile> {
    let canonical_url = str_at(raw, &["url", "canonical_url", "public_profile_url"])
        .and_then(|raw_url| normalize_url(&raw_url).ok());

    let experiences = array_at(raw, &["experiences", "experience", "positions"])
        .iter()
        .map(adapt_experience)
        .collect();
    let educations = array_at(raw, &["educations", "education", "schools"])
        .iter()
        .map(adapt_education)
        .collect();

    let current_employment = CurrentEmployment {
        organization_name: str_at(
            raw,
            &["current_company.name", "current_employment.organization_name"],
        ),
        title: str_at(raw, &["current_company.title", "current_employment.title"]),
        join_month: u8_at(raw, &["current_company.join_month", "current_employment.join_month"]),
        join_year: i64_at(raw, &["current_company.join_year", "current_employment.join_year"])
            .map(|n| n as i32),
        duration: str_at(raw, &["current_company.duration", "current_employment.duration"]),
    };

    ProfileBuilder {
        external_profile_id: str_at(raw, &["id", "profile_id", "external_id"]),
        public_handle: str_at(raw, &["public_identifier", "handle", "username"]),
        canonical_url,
        urn: str_at(raw, &["urn"]),
        first_name: str_at(raw, &["first_name"]),
        last_name: str_at(raw, &["last_name"]),
        full_name: str_at(raw, &["full_name", "name"]),
        headline: str_at(raw, &["headline", "title"]),
        about: str_at(raw, &["about", "summary"]),
        image_url: str_at(raw, &["profile_image_url", "image_url", "photo_url"]),
        city: str_at(raw, &["location.city", "city"]),
        state: str_at(raw, &["location.state", "state"]),
        country: str_at(raw, &["location.country", "country"]),
        location: str_at(raw, &["location.formatted", "location_name"]),
        email: str_at(raw, &["email"]),
        phone: str_at(raw, &["phone"]),
        experiences,
        educations,
        certifications: str_list_at(raw, &["certifications"]),
        languages: str_list_at(raw, &["languages"]),
        follower_count: i64_at(raw, &["follower_count", "followers"]),
        connection_count: i64_at(raw, &["connection_count", "connections"]),
        current_employment,
        is_premium: bool_at(raw, &["is_premium", "premium"]),
        is_creator: bool_at(raw, &["is_creator", "creator"]),
        is_influencer: bool_at(raw, &["is_influencer", "influencer"]),
        is_verified: bool_at(raw, &["is_verified", "verified"]),
    }
    .build()
}

fn adapt_experience(raw: &Value) -> Experience {
    Experience {
        title: str_at(raw, &["title", "position"]),
        organization_name: str_at(raw, &["company_name", "organization_name", "company"]),
        organization_url: str_at(raw, &["company_url", "organization_url"]),
        location: str_at(raw, &["location"]),
        start_month: u8_at(raw, &["start_month", "starts_at.month"]),
        start_year: i64_at(raw, &["start_year", "starts_at.year"]).map(|n| n as i32),
        end_month: u8_at(raw, &["end_month", "ends_at.month"]),
        end_year: i64_at(raw, &["end_year", "ends_at.year"]).map(|n| n as i32),
        is_current: bool_at(raw, &["is_current", "current"]),
        job_type: str_at(raw, &["job_type", "employment_type"]),
        skills: str_list_at(raw, &["skills"]),
        description: str_at(raw, &["description"]),
    }
}

fn adapt_education(raw: &Value) -> Education {
    Education {
        school_name: str_at(raw, &["school_name", "school", "institution"]),
        school_url: str_at(raw, &["school_url", "institution_url"]),
        degree: str_at(raw, &["degree", "degree_name"]),
        field_of_study: str_at(raw, &["field_of_study", "field"]),
        start_year: i64_at(raw, &["start_year", "starts_at.year"]).map(|n| n as i32),
        end_year: i64_at(raw, &["end_year", "ends_at.year"]).map(|n| n as i32),
        activities: str_at(raw, &["activities"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use serde_json::json;

    fn full_payload() -> Value {
        json!({
            "id": "abc123",
            "full_name": "Ada Lovelace",
            "url": "https://www.linkedin.com/in/ada/",
            "experiences": [
                { "title": "Engineer", "company_name": "Acme", "company_url": "https://linkedin.com/company/acme", "start_year": 2020 },
                { "title": "Founder", "company_name": "Beta", "start_year": 2018, "end_year": 2020 },
            ],
            "educations": [
                { "school_name": "Cambridge", "start_year": 1840 },
            ],
        })
    }

    #[test]
    fn adapts_full_payload_preserving_experience_order() {
        let profile = adapt_profile(&full_payload()).unwrap();
        assert_eq!(profile.full_name, "Ada Lovelace");
        assert_eq!(profile.canonical_url, "https://linkedin.com/in/ada");
        assert_eq!(profile.experiences.len(), 2);
        assert_eq!(profile.experiences[0].organization_name.as_deref(), Some("Acme"));
        assert_eq!(profile.experiences[1].organization_name.as_deref(), Some("Beta"));
        assert_eq!(profile.educations[0].school_name.as_deref(), Some("Cambridge"));
    }

    #[test]
    fn missing_essentials_all_reported() {
        let err = adapt_profile(&json!({})).unwrap_err();
        match err {
            AppError::AdapterIncomplete { missing_fields } => {
                assert_eq!(missing_fields.len(), 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_url_counts_as_missing() {
        let mut payload = full_payload();
        payload["url"] = json!("not a url");
        let err = adapt_profile(&payload).unwrap_err();
        match err {
            AppError::AdapterIncomplete { missing_fields } => {
                assert!(missing_fields.contains(&"profile.canonical_url".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn adapter_is_pure() {
        let a = adapt_profile(&full_payload()).unwrap();
        let b = adapt_profile(&full_payload()).unwrap();
        assert_eq!(a.full_name, b.full_name);
        assert_eq!(a.canonical_url, b.canonical_url);
        assert_eq!(a.experiences, b.experiences);
    }
}
