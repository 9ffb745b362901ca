//! Organization Service (C4).
//!
//! Dedup, merge, and profile-linking logic for organizations. URL is the
//! primary dedup key (§4.4 step 1); when an incoming organization has no
//! URL yet, a Jaccard token-similarity match against known URL-less
//! organizations is the fallback (§4.4 step 3). Every failure here is
//! logged and absorbed by the caller rather than aborting ingestion — a
//! company lookup miss must never fail a profile ingestion (§4.4, §8 S4).

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::canonical::{CanonicalOrganization, Experience, ProfileOrganizationEdge};
use crate::error::Result;
use crate::persistence::{EdgeStore, OrganizationStore};

/// Minimum Jaccard token-overlap for two organization names to be treated
/// as the same organization when no URL is available (§4.4 step 3).
const NAME_SIMILARITY_THRESHOLD: f64 = 0.9;

pub struct OrganizationService {
    organizations: Arc<dyn OrganizationStore>,
    edges: Arc<dyn EdgeStore>,
}

impl OrganizationService {
    pub fn new(organizations: Arc<dyn OrganizationStore>, edges: Arc<dyn EdgeStore>) -> Self {
        Self { organizations, edges }
    }

    /// Resolves `incoming` against existing organizations and persists the
    /// merged record (§4.4 steps 1-4):
    ///
    /// 1. URL match: merge into the existing row, keeping its id.
    /// 2. No URL match, URL known: insert new, keyed by that URL.
    /// 3. No URL at all: Jaccard name-match against URL-less organizations;
    ///    merge on a hit, insert new otherwise.
    pub async fn upsert_organization(&self, incoming: CanonicalOrganization) -> Result<CanonicalOrganization> {
        if let Some(url) = incoming.canonical_url.clone() {
            if let Some(existing) = self.organizations.get_by_url(&url).await? {
                let merged = merge(existing, incoming);
                return self.organizations.upsert(merged).await;
            }
            return self.organizations.upsert(incoming).await;
        }

        let candidates = self.organizations.list_missing_url().await.unwrap_or_default();
        if let Some(existing) = best_name_match(&incoming.name, &candidates) {
            let merged = merge(existing, incoming);
            return self.organizations.upsert(merged).await;
        }
        self.organizations.upsert(incoming).await
    }

    /// Upserts the profile-organization edge for one employment stint
    /// (§4.4 step 5, §4.5 step 9). Composite-keyed via
    /// [`ProfileOrganizationEdge::dedup_key`], so re-ingesting an unchanged
    /// stint does not duplicate edges.
    pub async fn link_profile(
        &self,
        profile_id: Uuid,
        organization_id: Uuid,
        experience: &Experience,
    ) -> Result<ProfileOrganizationEdge> {
        let edge = ProfileOrganizationEdge::new(
            profile_id,
            organization_id,
            experience.title.clone(),
            experience.location.clone(),
            experience.start_month,
            experience.start_year,
            experience.end_month,
            experience.end_year,
            experience.is_current,
        );
        self.edges.upsert(edge).await
    }
}

/// Non-null-wins on scalars, replace-if-non-empty on lists (§4.4 step 2).
/// "Non-null-wins" merges `incoming`'s freshly-fetched values into the
/// pre-existing row: a present incoming field overwrites the stored one,
/// an absent one leaves the stored value untouched. `existing`'s id and
/// timestamps are always kept. This is the documented clobber risk in
/// SPEC_FULL §9 / DESIGN.md: an upstream payload that genuinely clears a
/// previously populated field (e.g. an organization that removes its
/// tagline) is indistinguishable from upstream simply omitting it, so the
/// old value survives either way.
fn merge(existing: CanonicalOrganization, incoming: CanonicalOrganization) -> CanonicalOrganization {
    CanonicalOrganization {
        id: existing.id,
        external_organization_id: incoming.external_organization_id.or(existing.external_organization_id),
        canonical_url: existing.canonical_url.or(incoming.canonical_url),
        name: if incoming.name.trim().is_empty() { existing.name } else { incoming.name },
        tagline: incoming.tagline.or(existing.tagline),
        description: incoming.description.or(existing.description),
        website: incoming.website.or(existing.website),
        domain: incoming.domain.or(existing.domain),
        logo_url: incoming.logo_url.or(existing.logo_url),
        year_founded: incoming.year_founded.or(existing.year_founded),
        industries: if incoming.industries.is_empty() { existing.industries } else { incoming.industries },
        specialties: if incoming.specialties.is_empty() { existing.specialties } else { incoming.specialties },
        employee_count: incoming.employee_count.or(existing.employee_count),
        employee_range: incoming.employee_range.or(existing.employee_range),
        follower_count: incoming.follower_count.or(existing.follower_count),
        headquarters: if incoming.headquarters == Default::default() { existing.headquarters } else { incoming.headquarters },
        email: incoming.email.or(existing.email),
        phone: incoming.phone.or(existing.phone),
        created_at: existing.created_at,
        updated_at: chrono::Utc::now(),
    }
}

/// Finds the URL-less candidate whose name has the highest Jaccard token
/// overlap with `name`, if any clears [`NAME_SIMILARITY_THRESHOLD`].
fn best_name_match(name: &str, candidates: &[CanonicalOrganization]) -> Option<CanonicalOrganization> {
    let tokens = tokenize(name);
    candidates
        .iter()
        .map(|candidate| (candidate, jaccard(&tokens, &tokenize(&candidate.name))))
        .filter(|(_, score)| *score >= NAME_SIMILARITY_THRESHOLD)
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, _)| candidate.clone())
}

fn tokenize(name: &str) -> HashSet<String> {
    name.to_ascii_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::OrganizationBuilder;

    fn org(name: &str) -> CanonicalOrganization {
        OrganizationBuilder {
            name: Some(name.to_string()),
            ..Default::default()
        }
        .build()
        .unwrap()
    }

    #[test]
    fn identical_names_are_a_perfect_match() {
        let tokens = tokenize("Acme Corporation");
        assert_eq!(jaccard(&tokens, &tokenize("Acme Corporation")), 1.0);
    }

    #[test]
    fn near_identical_names_clear_threshold() {
        let tokens = tokenize("Acme Corporation Inc");
        let score = jaccard(&tokens, &tokenize("Acme Corporation"));
        assert!(score >= 0.5);
    }

    #[test]
    fn unrelated_names_do_not_match() {
        let tokens = tokenize("Acme Corporation");
        let score = jaccard(&tokens, &tokenize("Globex International"));
        assert!(score < NAME_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn best_name_match_requires_threshold() {
        let candidates = vec![org("Acme Corp"), org("Totally Different Company")];
        let hit = best_name_match("Acme Corp", &candidates);
        assert_eq!(hit.unwrap().name, "Acme Corp");

        let miss = best_name_match("Nothing Like It", &candidates);
        assert!(miss.is_none());
    }

    #[test]
    fn merge_prefers_incoming_scalars_and_lists_when_present() {
        let existing = CanonicalOrganization {
            tagline: Some("existing tagline".to_string()),
            industries: vec![],
            ..org("Acme Corp")
        };
        let incoming = CanonicalOrganization {
            tagline: Some("incoming tagline".to_string()),
            industries: vec!["Software".to_string()],
            ..org("Acme Corp")
        };
        let merged = merge(existing, incoming);
        assert_eq!(merged.tagline.as_deref(), Some("incoming tagline"));
        assert_eq!(merged.industries, vec!["Software".to_string()]);
    }

    #[test]
    fn merge_keeps_existing_when_incoming_field_absent() {
        let existing = CanonicalOrganization {
            tagline: Some("existing tagline".to_string()),
            ..org("Acme Corp")
        };
        let incoming = CanonicalOrganization {
            tagline: None,
            ..org("Acme Corp")
        };
        let merged = merge(existing, incoming);
        assert_eq!(merged.tagline.as_deref(), Some("existing tagline"));
    }
}
