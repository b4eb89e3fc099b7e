//! The persistence seam. Every core operation is generic over [`Store`], so the
//! Postgres implementation in [`crate::db`] and the in-memory one used by the
//! unit tests are interchangeable.
//!
//! Operations that the core would otherwise express as read-then-write are
//! single calls here (`toggle_follow`, `transition_report`,
//! `delete_closed_report`, `upsert_connection`); implementations must make
//! each of them atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Connection, ConnectionPeer, ConnectionStatus, Meeting, Profile, ProfileSummary, Report,
    ReportListing, ReportStatus, Role,
};
use crate::regions::{canonicalize, CanonicalRegion};

pub type StoreResult<T> = Result<T, StoreError>;

/// Row filter for the profile catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFilter {
    pub role: Role,
    pub exclude_id: Option<Uuid>,
    /// Case-insensitive substring of `full_name`.
    pub name_contains: Option<String>,
    /// Exact match on the stored region string.
    pub region_equals: Option<String>,
    /// Any spelling of this region, matched on the key stored with the profile.
    pub canonical_region: Option<CanonicalRegion>,
    pub limit: Option<usize>,
}

impl ProfileFilter {
    pub fn for_role(role: Role) -> Self {
        ProfileFilter {
            role,
            exclude_id: None,
            name_contains: None,
            region_equals: None,
            canonical_region: None,
            limit: None,
        }
    }

    /// Shared predicate so in-process implementations agree with the SQL one.
    pub fn matches(&self, profile: &Profile) -> bool {
        if profile.role != self.role {
            return false;
        }
        if self.exclude_id == Some(profile.id) {
            return false;
        }
        if let Some(needle) = &self.name_contains {
            if !profile
                .full_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(region) = &self.region_equals {
            if &profile.region != region {
                return false;
            }
        }
        if let Some(wanted) = self.canonical_region {
            if canonicalize(&profile.region) != Some(wanted) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFlag {
    Admin,
    MentorVerified,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: Uuid,
    pub reported_id: Uuid,
    pub reason: crate::models::ReportReason,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportTransition {
    pub report_id: Uuid,
    pub from: ReportStatus,
    pub to: ReportStatus,
    pub resolver_id: Uuid,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts or overwrites a catalog row; used by seeding and imports.
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()>;

    /// Inserts a new profile. Returns false if the id is already taken.
    async fn create_profile(&self, profile: &Profile) -> StoreResult<bool>;

    /// Writes the member-editable fields (name, region, city, bio) of
    /// `profile`. Role and flags are left as stored. Returns false when no
    /// profile has this id.
    async fn update_profile(&self, profile: &Profile) -> StoreResult<bool>;

    /// Every profile, newest first.
    async fn list_profiles(&self) -> StoreResult<Vec<Profile>>;

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    async fn find_profiles(&self, filter: &ProfileFilter) -> StoreResult<Vec<Profile>>;

    /// `(region, role)` for every profile in the catalog.
    async fn region_roles(&self) -> StoreResult<Vec<(String, Role)>>;

    /// Returns false when no profile has this id.
    async fn set_profile_flag(&self, id: Uuid, flag: ProfileFlag, value: bool)
        -> StoreResult<bool>;

    async fn delete_profile(&self, id: Uuid) -> StoreResult<bool>;

    /// Inserts the pair, or returns the id of the row already holding it.
    async fn upsert_connection(
        &self,
        mentor_id: Uuid,
        team_id: Uuid,
        status: ConnectionStatus,
    ) -> StoreResult<Uuid>;

    async fn get_connection(&self, id: Uuid) -> StoreResult<Option<Connection>>;

    /// Connections in `status` where `profile_id` sits in the column for `role`,
    /// joined with the profile on the other side.
    async fn connection_peers(
        &self,
        profile_id: Uuid,
        role: Role,
        status: ConnectionStatus,
    ) -> StoreResult<Vec<ConnectionPeer>>;

    async fn insert_meeting(&self, meeting: &Meeting) -> StoreResult<()>;

    /// Deletes the edge if present, inserts it otherwise. Returns whether the
    /// edge exists afterwards. Each call is one atomic step and never leaves a
    /// duplicate edge, but two concurrent toggles from the same follower may
    /// cancel out or both report `true`.
    async fn toggle_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool>;

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool>;

    async fn count_followers(&self, profile_id: Uuid) -> StoreResult<i64>;

    async fn count_following(&self, profile_id: Uuid) -> StoreResult<i64>;

    async fn list_followers(&self, profile_id: Uuid) -> StoreResult<Vec<ProfileSummary>>;

    async fn insert_report(&self, report: NewReport) -> StoreResult<Report>;

    async fn get_report(&self, id: Uuid) -> StoreResult<Option<Report>>;

    /// Applies the transition only if the report is still in `from`.
    async fn transition_report(&self, transition: ReportTransition) -> StoreResult<bool>;

    /// Deletes the report only if it is no longer pending.
    async fn delete_closed_report(&self, id: Uuid) -> StoreResult<bool>;

    /// All reports, newest first.
    async fn list_reports(&self) -> StoreResult<Vec<ReportListing>>;
}
