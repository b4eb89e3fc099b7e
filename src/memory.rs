//! In-process [`Store`] used by the unit tests.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Connection, ConnectionPeer, ConnectionStatus, Meeting, Profile, ProfileSummary, Report,
    ReportListing, ReportStatus, Role,
};
use crate::store::{NewReport, ProfileFilter, ProfileFlag, ReportTransition, Store, StoreResult};

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    connections: Vec<Connection>,
    followers: Vec<(Uuid, Uuid)>,
    reports: Vec<Report>,
    meetings: Vec<Meeting>,
    profile_filters: Vec<ProfileFilter>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_profiles(profiles: &[Profile]) -> Self {
        let store = Self::new();
        for profile in profiles {
            store
                .insert_profile(profile)
                .await
                .expect("memory insert cannot fail");
        }
        store
    }

    pub async fn meetings(&self) -> Vec<Meeting> {
        self.tables.lock().await.meetings.clone()
    }

    pub async fn connection_rows(&self) -> usize {
        self.tables.lock().await.connections.len()
    }

    /// Every filter passed to `find_profiles`, oldest first.
    pub async fn profile_filters(&self) -> Vec<ProfileFilter> {
        self.tables.lock().await.profile_filters.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.profiles.retain(|p| p.id != profile.id);
        tables.profiles.push(profile.clone());
        Ok(())
    }

    async fn create_profile(&self, profile: &Profile) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.profiles.iter().any(|p| p.id == profile.id) {
            return Ok(false);
        }
        tables.profiles.push(profile.clone());
        Ok(true)
    }

    async fn update_profile(&self, profile: &Profile) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(stored) = tables.profiles.iter_mut().find(|p| p.id == profile.id) else {
            return Ok(false);
        };
        stored.full_name = profile.full_name.clone();
        stored.region = profile.region.clone();
        stored.city = profile.city.clone();
        stored.bio = profile.bio.clone();
        Ok(true)
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.lock().await;
        let mut profiles = tables.profiles.clone();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let tables = self.tables.lock().await;
        Ok(tables.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn find_profiles(&self, filter: &ProfileFilter) -> StoreResult<Vec<Profile>> {
        let mut tables = self.tables.lock().await;
        tables.profile_filters.push(filter.clone());
        let matches = tables.profiles.iter().filter(|p| filter.matches(p)).cloned();
        Ok(match filter.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        })
    }

    async fn region_roles(&self) -> StoreResult<Vec<(String, Role)>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .map(|p| (p.region.clone(), p.role))
            .collect())
    }

    async fn set_profile_flag(
        &self,
        id: Uuid,
        flag: ProfileFlag,
        value: bool,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(profile) = tables.profiles.iter_mut().find(|p| p.id == id) else {
            return Ok(false);
        };
        match flag {
            ProfileFlag::Admin => profile.is_admin = value,
            ProfileFlag::MentorVerified => profile.is_mentor_verified = value,
        }
        Ok(true)
    }

    async fn delete_profile(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.profiles.len();
        tables.profiles.retain(|p| p.id != id);
        let removed = tables.profiles.len() < before;
        if removed {
            tables.connections.retain(|c| !c.involves(id));
            tables
                .followers
                .retain(|(follower, following)| *follower != id && *following != id);
        }
        Ok(removed)
    }

    async fn upsert_connection(
        &self,
        mentor_id: Uuid,
        team_id: Uuid,
        status: ConnectionStatus,
    ) -> StoreResult<Uuid> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .connections
            .iter()
            .find(|c| c.mentor_id == mentor_id && c.team_id == team_id)
        {
            return Ok(existing.id);
        }
        let connection = Connection {
            id: Uuid::new_v4(),
            mentor_id,
            team_id,
            status,
            created_at: Utc::now(),
        };
        let id = connection.id;
        tables.connections.push(connection);
        Ok(id)
    }

    async fn get_connection(&self, id: Uuid) -> StoreResult<Option<Connection>> {
        let tables = self.tables.lock().await;
        Ok(tables.connections.iter().find(|c| c.id == id).cloned())
    }

    async fn connection_peers(
        &self,
        profile_id: Uuid,
        role: Role,
        status: ConnectionStatus,
    ) -> StoreResult<Vec<ConnectionPeer>> {
        let tables = self.tables.lock().await;
        let peers = tables
            .connections
            .iter()
            .filter(|c| c.status == status)
            .filter_map(|c| {
                let peer_id = match role {
                    Role::Mentor if c.mentor_id == profile_id => c.team_id,
                    Role::Team if c.team_id == profile_id => c.mentor_id,
                    _ => return None,
                };
                let peer = tables.profiles.iter().find(|p| p.id == peer_id)?.clone();
                Some(ConnectionPeer {
                    connection_id: c.id,
                    peer,
                })
            })
            .collect();
        Ok(peers)
    }

    async fn insert_meeting(&self, meeting: &Meeting) -> StoreResult<()> {
        self.tables.lock().await.meetings.push(meeting.clone());
        Ok(())
    }

    async fn toggle_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let edge = (follower_id, following_id);
        if let Some(position) = tables.followers.iter().position(|e| *e == edge) {
            tables.followers.remove(position);
            Ok(false)
        } else {
            tables.followers.push(edge);
            Ok(true)
        }
    }

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.followers.contains(&(follower_id, following_id)))
    }

    async fn count_followers(&self, profile_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .followers
            .iter()
            .filter(|(_, following)| *following == profile_id)
            .count() as i64)
    }

    async fn count_following(&self, profile_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.lock().await;
        Ok(tables
            .followers
            .iter()
            .filter(|(follower, _)| *follower == profile_id)
            .count() as i64)
    }

    async fn list_followers(&self, profile_id: Uuid) -> StoreResult<Vec<ProfileSummary>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .followers
            .iter()
            .filter(|(_, following)| *following == profile_id)
            .filter_map(|(follower, _)| tables.profiles.iter().find(|p| p.id == *follower))
            .map(Profile::summary)
            .collect())
    }

    async fn insert_report(&self, report: NewReport) -> StoreResult<Report> {
        let stored = Report {
            id: Uuid::new_v4(),
            reporter_id: report.reporter_id,
            reported_id: report.reported_id,
            reason: report.reason,
            details: report.details,
            status: ReportStatus::Pending,
            resolver_id: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.tables.lock().await.reports.push(stored.clone());
        Ok(stored)
    }

    async fn get_report(&self, id: Uuid) -> StoreResult<Option<Report>> {
        let tables = self.tables.lock().await;
        Ok(tables.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn transition_report(&self, transition: ReportTransition) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(report) = tables
            .reports
            .iter_mut()
            .find(|r| r.id == transition.report_id && r.status == transition.from)
        else {
            return Ok(false);
        };
        report.status = transition.to;
        report.resolver_id = Some(transition.resolver_id);
        report.resolved_at = Some(transition.at);
        Ok(true)
    }

    async fn delete_closed_report(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.reports.len();
        tables
            .reports
            .retain(|r| !(r.id == id && r.status.is_terminal()));
        Ok(tables.reports.len() < before)
    }

    async fn list_reports(&self) -> StoreResult<Vec<ReportListing>> {
        let tables = self.tables.lock().await;
        let name_of = |id: Uuid| {
            tables
                .profiles
                .iter()
                .find(|p| p.id == id)
                .map(|p| p.full_name.clone())
        };
        let mut listings: Vec<ReportListing> = tables
            .reports
            .iter()
            .map(|report| ReportListing {
                report: report.clone(),
                reporter_name: name_of(report.reporter_id),
                reported_name: name_of(report.reported_id),
            })
            .collect();
        listings.sort_by(|a, b| b.report.created_at.cmp(&a.report.created_at));
        Ok(listings)
    }
}
