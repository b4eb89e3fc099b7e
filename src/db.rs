use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{
    Connection, ConnectionPeer, ConnectionStatus, Meeting, Profile, ProfileSummary, Report,
    ReportListing, ReportStatus, Role,
};
use crate::regions::canonicalize;
use crate::store::{NewReport, ProfileFilter, ProfileFlag, ReportTransition, Store, StoreResult};

const PROFILE_COLUMNS: &str = "p.id, p.role, p.full_name, p.region, p.city, p.bio, p.avatar_url, \
     p.is_admin, p.is_mentor_verified, p.created_at";

const REPORT_COLUMNS: &str = "r.id, r.reporter_id, r.reported_profile_id, r.reason, r.details, \
     r.status, r.resolver_id, r.created_at, r.resolved_at";

/// Postgres-backed [`Store`] over the `mentor_match` schema.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;
        Ok(PgStore::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub async fn init_db(store: &PgStore) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(store.pool())
        .await
        .context("failed to apply migrations")?;
    Ok(())
}

pub async fn seed(store: &PgStore) -> anyhow::Result<usize> {
    let profiles = vec![
        (
            "6b1f3c1e-5d0a-4b53-9a8e-1f2f6f0c2a11",
            Role::Mentor,
            "Avery Lee",
            "São Paulo",
            "Campinas",
            "Robotics mentor, ten seasons of FTC.",
        ),
        (
            "0f8e7a2b-93c4-4d1e-8b6a-2c3d4e5f6a7b",
            Role::Mentor,
            "Jules Moreno",
            "Minas Gerais",
            "Belo Horizonte",
            "Mechanical design and CAD.",
        ),
        (
            "a3c5e7f9-1b2d-4f60-8a9c-0e1f2a3b4c5d",
            Role::Team,
            "Iron Owls 17421",
            "São Paulo",
            "São Paulo",
            "Rookie FTC team looking for programming help.",
        ),
        (
            "c4d6e8fa-2c3e-4a71-9bad-1f203b4c5d6e",
            Role::Team,
            "Capivaras FLL",
            "Paraná",
            "Curitiba",
            "FLL team, second season.",
        ),
    ];

    let mut written = 0usize;
    for (id, role, name, region, city, bio) in profiles {
        let mut profile = Profile::new(role, name, region);
        profile.id = Uuid::parse_str(id)?;
        profile.city = city.to_string();
        profile.bio = Some(bio.to_string());
        profile.is_mentor_verified = role == Role::Mentor;
        store.insert_profile(&profile).await?;
        written += 1;
    }

    info!(profiles = written, "seeded profile catalog");
    Ok(written)
}

pub async fn import_csv(store: &PgStore, csv_path: &Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        role: String,
        region: String,
        #[serde(default)]
        city: String,
        bio: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV record {}", line + 1))?;
        let role: Role = row
            .role
            .parse()
            .map_err(|err: String| anyhow::anyhow!("record {}: {err}", line + 1))?;
        let mut profile = Profile::new(role, row.full_name, row.region);
        profile.city = row.city;
        profile.bio = row.bio.filter(|bio| !bio.trim().is_empty());
        store.insert_profile(&profile).await?;
        inserted += 1;
    }

    info!(profiles = inserted, path = %csv_path.display(), "imported profiles");
    Ok(inserted)
}

fn corrupt(err: String) -> StoreError {
    StoreError::Corrupt(err)
}

fn profile_from_row(row: &PgRow) -> StoreResult<Profile> {
    let role: String = row.try_get("role")?;
    Ok(Profile {
        id: row.try_get("id")?,
        role: role.parse().map_err(corrupt)?,
        full_name: row.try_get("full_name")?,
        region: row.try_get("region")?,
        city: row.try_get("city")?,
        bio: row.try_get("bio")?,
        avatar_url: row.try_get("avatar_url")?,
        is_admin: row.try_get("is_admin")?,
        is_mentor_verified: row.try_get("is_mentor_verified")?,
        created_at: row.try_get("created_at")?,
    })
}

fn report_from_row(row: &PgRow) -> StoreResult<Report> {
    let reason: String = row.try_get("reason")?;
    let status: String = row.try_get("status")?;
    Ok(Report {
        id: row.try_get("id")?,
        reporter_id: row.try_get("reporter_id")?,
        reported_id: row.try_get("reported_profile_id")?,
        reason: reason.parse().map_err(corrupt)?,
        details: row.try_get("details")?,
        status: status.parse().map_err(corrupt)?,
        resolver_id: row.try_get("resolver_id")?,
        created_at: row.try_get("created_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

/// The value stored in `region_key`: the canonical region name, or NULL when
/// the free-text region matches none.
fn region_key(region: &str) -> Option<&'static str> {
    canonicalize(region).map(|region| region.name())
}

// Nothing removed means the edge exists afterwards, whether this statement
// inserted it or a concurrent toggle did.
const TOGGLE_FOLLOW_SQL: &str = r#"
    WITH removed AS (
        DELETE FROM mentor_match.followers
        WHERE follower_id = $1 AND following_id = $2
        RETURNING 1
    ),
    inserted AS (
        INSERT INTO mentor_match.followers (follower_id, following_id)
        SELECT $1, $2
        WHERE NOT EXISTS (SELECT 1 FROM removed)
        ON CONFLICT (follower_id, following_id) DO NOTHING
        RETURNING 1
    )
    SELECT NOT EXISTS (SELECT 1 FROM removed) AS following
"#;

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl Store for PgStore {
    async fn insert_profile(&self, profile: &Profile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mentor_match.profiles
            (id, role, full_name, region, region_key, city, bio, avatar_url,
             is_admin, is_mentor_verified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE
            SET full_name = EXCLUDED.full_name, region = EXCLUDED.region,
                region_key = EXCLUDED.region_key, city = EXCLUDED.city, bio = EXCLUDED.bio
            "#,
        )
        .bind(profile.id)
        .bind(profile.role.as_str())
        .bind(&profile.full_name)
        .bind(&profile.region)
        .bind(region_key(&profile.region))
        .bind(&profile.city)
        .bind(&profile.bio)
        .bind(&profile.avatar_url)
        .bind(profile.is_admin)
        .bind(profile.is_mentor_verified)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_profile(&self, profile: &Profile) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO mentor_match.profiles
            (id, role, full_name, region, region_key, city, bio, avatar_url,
             is_admin, is_mentor_verified, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(profile.id)
        .bind(profile.role.as_str())
        .bind(&profile.full_name)
        .bind(&profile.region)
        .bind(region_key(&profile.region))
        .bind(&profile.city)
        .bind(&profile.bio)
        .bind(&profile.avatar_url)
        .bind(profile.is_admin)
        .bind(profile.is_mentor_verified)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(&self, profile: &Profile) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mentor_match.profiles
            SET full_name = $2, region = $3, region_key = $4, city = $5, bio = $6
            WHERE id = $1
            "#,
        )
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(&profile.region)
        .bind(region_key(&profile.region))
        .bind(&profile.city)
        .bind(&profile.bio)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_profiles(&self) -> StoreResult<Vec<Profile>> {
        let query = format!(
            "SELECT {PROFILE_COLUMNS} FROM mentor_match.profiles p ORDER BY p.created_at DESC"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(profile_from_row).collect()
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM mentor_match.profiles p WHERE p.id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn find_profiles(&self, filter: &ProfileFilter) -> StoreResult<Vec<Profile>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {PROFILE_COLUMNS} FROM mentor_match.profiles p WHERE p.role = "
        ));
        query.push_bind(filter.role.as_str());

        if let Some(id) = filter.exclude_id {
            query.push(" AND p.id <> ").push_bind(id);
        }
        if let Some(needle) = &filter.name_contains {
            query
                .push(" AND p.full_name ILIKE ")
                .push_bind(format!("%{}%", escape_like(needle)));
        }
        if let Some(region) = &filter.region_equals {
            query.push(" AND p.region = ").push_bind(region.clone());
        }
        if let Some(region) = filter.canonical_region {
            query.push(" AND p.region_key = ").push_bind(region.name());
        }
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = query.build().fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), role = %filter.role, "profile filter");
        rows.iter().map(profile_from_row).collect()
    }

    async fn region_roles(&self) -> StoreResult<Vec<(String, Role)>> {
        let rows = sqlx::query("SELECT region, role FROM mentor_match.profiles")
            .fetch_all(&self.pool)
            .await?;

        let mut pairs = Vec::with_capacity(rows.len());
        for row in rows {
            let region: String = row.try_get("region")?;
            let role: String = row.try_get("role")?;
            pairs.push((region, role.parse().map_err(corrupt)?));
        }
        Ok(pairs)
    }

    async fn set_profile_flag(
        &self,
        id: Uuid,
        flag: ProfileFlag,
        value: bool,
    ) -> StoreResult<bool> {
        let statement = match flag {
            ProfileFlag::Admin => "UPDATE mentor_match.profiles SET is_admin = $2 WHERE id = $1",
            ProfileFlag::MentorVerified => {
                "UPDATE mentor_match.profiles SET is_mentor_verified = $2 WHERE id = $1"
            }
        };
        let result = sqlx::query(statement)
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_profile(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM mentor_match.profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_connection(
        &self,
        mentor_id: Uuid,
        team_id: Uuid,
        status: ConnectionStatus,
    ) -> StoreResult<Uuid> {
        // The no-op update makes RETURNING yield the existing id on conflict.
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO mentor_match.connections (id, mentor_id, team_id, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (mentor_id, team_id) DO UPDATE
            SET status = mentor_match.connections.status
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(mentor_id)
        .bind(team_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?
        .try_get("id")?;
        Ok(id)
    }

    async fn get_connection(&self, id: Uuid) -> StoreResult<Option<Connection>> {
        let row = sqlx::query(
            "SELECT id, mentor_id, team_id, status, created_at \
             FROM mentor_match.connections WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let status: String = row.try_get("status")?;
        Ok(Some(Connection {
            id: row.try_get("id")?,
            mentor_id: row.try_get("mentor_id")?,
            team_id: row.try_get("team_id")?,
            status: status.parse().map_err(corrupt)?,
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn connection_peers(
        &self,
        profile_id: Uuid,
        role: Role,
        status: ConnectionStatus,
    ) -> StoreResult<Vec<ConnectionPeer>> {
        let (own_column, peer_column) = match role {
            Role::Mentor => ("mentor_id", "team_id"),
            Role::Team => ("team_id", "mentor_id"),
        };
        let query = format!(
            "SELECT c.id AS connection_id, {PROFILE_COLUMNS} \
             FROM mentor_match.connections c \
             JOIN mentor_match.profiles p ON p.id = c.{peer_column} \
             WHERE c.{own_column} = $1 AND c.status = $2 \
             ORDER BY c.created_at"
        );
        let rows = sqlx::query(&query)
            .bind(profile_id)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut peers = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            peers.push(ConnectionPeer {
                connection_id: row.try_get("connection_id")?,
                peer: profile_from_row(row)?,
            });
        }
        Ok(peers)
    }

    async fn insert_meeting(&self, meeting: &Meeting) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mentor_match.meetings (id, connection_id, title, scheduled_at, meet_link)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(meeting.id)
        .bind(meeting.connection_id)
        .bind(&meeting.title)
        .bind(meeting.scheduled_at)
        .bind(&meeting.meet_link)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn toggle_follow(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let following: bool = sqlx::query(TOGGLE_FOLLOW_SQL)
            .bind(follower_id)
            .bind(following_id)
            .fetch_one(&self.pool)
            .await?
            .try_get("following")?;
        Ok(following)
    }

    async fn is_following(&self, follower_id: Uuid, following_id: Uuid) -> StoreResult<bool> {
        let exists: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM mentor_match.followers \
             WHERE follower_id = $1 AND following_id = $2) AS following",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("following")?;
        Ok(exists)
    }

    async fn count_followers(&self, profile_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM mentor_match.followers WHERE following_id = $1",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;
        Ok(count)
    }

    async fn count_following(&self, profile_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM mentor_match.followers WHERE follower_id = $1",
        )
        .bind(profile_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;
        Ok(count)
    }

    async fn list_followers(&self, profile_id: Uuid) -> StoreResult<Vec<ProfileSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.role, p.full_name, p.avatar_url
            FROM mentor_match.followers f
            JOIN mentor_match.profiles p ON p.id = f.follower_id
            WHERE f.following_id = $1
            ORDER BY f.created_at
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        let mut followers = Vec::with_capacity(rows.len());
        for row in rows {
            let role: String = row.try_get("role")?;
            followers.push(ProfileSummary {
                id: row.try_get("id")?,
                role: role.parse().map_err(corrupt)?,
                full_name: row.try_get("full_name")?,
                avatar_url: row.try_get("avatar_url")?,
            });
        }
        Ok(followers)
    }

    async fn insert_report(&self, report: NewReport) -> StoreResult<Report> {
        let query = format!(
            "INSERT INTO mentor_match.reports AS r \
             (id, reporter_id, reported_profile_id, reason, details, status) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {REPORT_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(report.reporter_id)
            .bind(report.reported_id)
            .bind(report.reason.as_str())
            .bind(&report.details)
            .bind(ReportStatus::Pending.as_str())
            .fetch_one(&self.pool)
            .await?;
        report_from_row(&row)
    }

    async fn get_report(&self, id: Uuid) -> StoreResult<Option<Report>> {
        let query = format!("SELECT {REPORT_COLUMNS} FROM mentor_match.reports r WHERE r.id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(report_from_row).transpose()
    }

    async fn transition_report(&self, transition: ReportTransition) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE mentor_match.reports
            SET status = $3, resolver_id = $4, resolved_at = $5
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(transition.report_id)
        .bind(transition.from.as_str())
        .bind(transition.to.as_str())
        .bind(transition.resolver_id)
        .bind(transition.at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_closed_report(&self, id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM mentor_match.reports WHERE id = $1 AND status <> 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_reports(&self) -> StoreResult<Vec<ReportListing>> {
        let query = format!(
            "SELECT {REPORT_COLUMNS}, rp.full_name AS reporter_name, tp.full_name AS reported_name \
             FROM mentor_match.reports r \
             LEFT JOIN mentor_match.profiles rp ON rp.id = r.reporter_id \
             LEFT JOIN mentor_match.profiles tp ON tp.id = r.reported_profile_id \
             ORDER BY r.created_at DESC"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            listings.push(ReportListing {
                report: report_from_row(row)?,
                reporter_name: row.try_get("reporter_name")?,
                reported_name: row.try_get("reported_name")?,
            });
        }
        Ok(listings)
    }
}
