use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Team,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Mentor => "mentor",
            Role::Team => "team",
        }
    }

    /// The role a member of this role connects with and searches for.
    pub fn opposite(self) -> Role {
        match self {
            Role::Mentor => Role::Team,
            Role::Team => Role::Mentor,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mentor" => Ok(Role::Mentor),
            "team" => Ok(Role::Team),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub region: String,
    pub city: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub is_mentor_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(role: Role, full_name: impl Into<String>, region: impl Into<String>) -> Self {
        Profile {
            id: Uuid::new_v4(),
            role,
            full_name: full_name.into(),
            region: region.into(),
            city: String::new(),
            bio: None,
            avatar_url: None,
            is_admin: false,
            is_mentor_verified: false,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            role: self.role,
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// The slice of a profile shown in follower lists and report listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub role: Role,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ConnectionStatus::Pending),
            "accepted" => Ok(ConnectionStatus::Accepted),
            other => Err(format!("unknown connection status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub mentor_id: Uuid,
    pub team_id: Uuid,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn involves(&self, profile_id: Uuid) -> bool {
        self.mentor_id == profile_id || self.team_id == profile_id
    }
}

/// A connection as seen from one side: the counterpart profile plus the link id.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionPeer {
    pub connection_id: Uuid,
    pub peer: Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Abuse,
    IncorrectInfo,
    Other,
}

impl ReportReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportReason::Spam => "spam",
            ReportReason::Abuse => "abuse",
            ReportReason::IncorrectInfo => "incorrect_info",
            ReportReason::Other => "other",
        }
    }
}

impl fmt::Display for ReportReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportReason {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key: String = value
            .trim()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "spam" => Ok(ReportReason::Spam),
            "abuse" => Ok(ReportReason::Abuse),
            "incorrectinfo" => Ok(ReportReason::IncorrectInfo),
            "other" => Ok(ReportReason::Other),
            _ => Err(format!("unknown report reason `{}`", value.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ReportStatus::Pending),
            "resolved" => Ok(ReportStatus::Resolved),
            "rejected" => Ok(ReportStatus::Rejected),
            other => Err(format!("unknown report status `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub reported_id: Uuid,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A report joined with the display names of both parties, for the admin queue.
#[derive(Debug, Clone, Serialize)]
pub struct ReportListing {
    pub report: Report,
    pub reporter_name: Option<String>,
    pub reported_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub connection_id: Uuid,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub meet_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionStat {
    pub region: String,
    pub mentor_count: u32,
    pub team_count: u32,
    pub total: u32,
}

impl RegionStat {
    pub fn empty(region: impl Into<String>) -> Self {
        RegionStat {
            region: region.into(),
            mentor_count: 0,
            team_count: 0,
            total: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowStats {
    pub followers: i64,
    pub following: i64,
    pub viewer_follows: bool,
}
