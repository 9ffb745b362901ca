//! Profile-Organization relationship edge (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Links a [`super::CanonicalProfile`] to a [`super::CanonicalOrganization`]
/// it was or is employed by. Composite-keyed on
/// `(profile_id, organization_id, start_year, start_month)` (§3, §4.4 upsert
/// step) so re-ingesting the same profile does not duplicate edges for an
/// unchanged employment stint, while a new stint at the same organization
/// starting in a different month/year creates a new edge (boomerang
/// employment). A title change alone on the same stint updates the existing
/// edge in place rather than creating a second one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProfileOrganizationEdge {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub organization_id: Uuid,

    pub title: Option<String>,
    pub location: Option<String>,

    pub start_month: Option<u8>,
    pub start_year: Option<i32>,
    pub end_month: Option<u8>,
    pub end_year: Option<i32>,
    pub is_current: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileOrganizationEdge {
    /// Builds a fresh edge for a profile/organization pair, stamping a new
    /// id and both timestamps. Validation of the employment dates
    /// themselves already happened on the source [`super::Experience`]
    /// during profile construction, so this constructor does not re-check
    /// them.
    pub fn new(
        profile_id: Uuid,
        organization_id: Uuid,
        title: Option<String>,
        location: Option<String>,
        start_month: Option<u8>,
        start_year: Option<i32>,
        end_month: Option<u8>,
        end_year: Option<i32>,
        is_current: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            profile_id,
            organization_id,
            title,
            location,
            start_month,
            start_year,
            end_month,
            end_year,
            is_current,
            created_at: now,
            updated_at: now,
        }
    }

    /// The composite key used to decide whether an incoming edge duplicates
    /// an existing one (§3, §4.4).
    pub fn dedup_key(&self) -> (Uuid, Uuid, Option<i32>, Option<u8>) {
        (self.profile_id, self.organization_id, self.start_year, self.start_month)
    }
}
