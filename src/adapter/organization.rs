//! Raw organization payload → [`crate::canonical::CanonicalOrganization`].

use serde_json::Value;

use super::{i64_at, str_at, str_list_at};
use crate::canonical::{normalize_url, Address, CanonicalOrganization, OrganizationBuilder};
use crate::error::Result;

/// Maps a raw workflow organization payload into a canonical organization.
/// Essential field: `name`. Everything else is optional and becomes
/// `None`/empty when absent, matching the field table in SPEC_FULL §4.3.
/// `canonical_url`, when present, is normalized the same way the profile
/// adapter normalizes its URL — organization dedup (§3 invariant 2) keys
/// on the normalized form, so a raw, unnormalized URL here would let two
/// differently-cased/slashed URLs slip past the dedup check.
pub fn adapt_organization(raw: &Value) -> Result<CanonicalOrganization> {
    let headquarters = Address {
        city: str_at(raw, &["headquarters.city", "hq.city", "location.city"]),
        state: str_at(raw, &["headquarters.state", "hq.state", "location.state"]),
        country: str_at(raw, &["headquarters.country", "hq.country", "location.country"]),
        line: str_at(raw, &["headquarters.line", "hq.line", "location.formatted"]),
    };

    let canonical_url = str_at(raw, &["url", "canonical_url", "company_url"])
        .and_then(|raw_url| normalize_url(&raw_url).ok());

    OrganizationBuilder {
        external_organization_id: str_at(raw, &["id", "organization_id", "external_id"]),
        canonical_url,
        name: str_at(raw, &["name", "company_name", "organization_name"]),
        tagline: str_at(raw, &["tagline", "slogan"]),
        description: str_at(raw, &["description", "about"]),
        website: str_at(raw, &["website", "website_url"]),
        domain: str_at(raw, &["domain"]),
        logo_url: str_at(raw, &["logo_url", "logo"]),
        year_founded: i64_at(raw, &["year_founded", "founded"]).map(|n| n as i32),
        industries: str_list_at(raw, &["industries", "industry"]),
        specialties: str_list_at(raw, &["specialties"]),
        employee_count: i64_at(raw, &["employee_count", "staff_count"]),
        employee_range: str_at(raw, &["employee_range", "company_size", "staff_count_range"]),
        follower_count: i64_at(raw, &["follower_count", "followers"]),
        headquarters,
        email: str_at(raw, &["email"]),
        phone: str_at(raw, &["phone"]),
    }
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use serde_json::json;

    #[test]
    fn adapts_full_payload() {
        let raw = json!({
            "name": "Acme Corp",
            "url": "https://www.linkedin.com/company/acme/",
            "industries": ["Software"],
            "employee_count": 250,
            "employee_range": "201-500",
            "headquarters": { "city": "Austin", "country": "US" },
        });
        let org = adapt_organization(&raw).unwrap();
        assert_eq!(org.name, "Acme Corp");
        assert_eq!(org.employee_count, Some(250));
        assert_eq!(org.headquarters.city.as_deref(), Some("Austin"));
    }

    #[test]
    fn missing_name_is_incomplete() {
        let raw = json!({ "url": "https://example.com/company/acme" });
        let err = adapt_organization(&raw).unwrap_err();
        match err {
            AppError::AdapterIncomplete { missing_fields } => {
                assert_eq!(missing_fields, vec!["organization.name".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tolerates_alternate_field_names() {
        let raw = json!({ "company_name": "Beta LLC", "staff_count_range": "11-50" });
        let org = adapt_organization(&raw).unwrap();
        assert_eq!(org.name, "Beta LLC");
        assert_eq!(org.employee_range.as_deref(), Some("11-50"));
    }
}
