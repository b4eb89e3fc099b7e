use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Profile, Role};
use crate::session::Session;
use crate::store::Store;

/// Details a member supplies when creating their profile.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub role: Role,
    pub full_name: String,
    pub region: String,
    #[serde(default)]
    pub city: String,
    pub bio: Option<String>,
}

/// Member-editable fields. `None` keeps the stored value; a blank `bio`
/// clears it. The role is not editable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub bio: Option<String>,
}

fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidOperation("full name is required"));
    }
    Ok(name.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Creates the profile for a freshly authenticated identity. Each identity
/// owns exactly one profile, created once, with the role it keeps for good.
pub async fn register_profile<S: Store + ?Sized>(
    store: &S,
    actor_id: Uuid,
    registration: Registration,
) -> Result<Profile> {
    let profile = Profile {
        id: actor_id,
        role: registration.role,
        full_name: required_name(&registration.full_name)?,
        region: registration.region.trim().to_string(),
        city: registration.city.trim().to_string(),
        bio: optional_text(registration.bio),
        avatar_url: None,
        is_admin: false,
        is_mentor_verified: false,
        created_at: Utc::now(),
    };

    if !store.create_profile(&profile).await? {
        warn!(actor = %actor_id, "profile already registered");
        return Err(Error::InvalidOperation("profile already exists"));
    }
    info!(profile = %profile.id, role = %profile.role, "profile registered");
    Ok(profile)
}

/// Applies `changes` to the session member's own profile and returns the
/// stored result.
pub async fn update_profile<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    profile_id: Uuid,
    changes: ProfileUpdate,
) -> Result<Profile> {
    if session.actor_id != profile_id {
        return Err(Error::Forbidden("members can only edit their own profile"));
    }

    let mut profile = store
        .get_profile(profile_id)
        .await?
        .ok_or_else(|| Error::profile_not_found(profile_id))?;
    if let Some(name) = changes.full_name {
        profile.full_name = required_name(&name)?;
    }
    if let Some(region) = changes.region {
        profile.region = region.trim().to_string();
    }
    if let Some(city) = changes.city {
        profile.city = city.trim().to_string();
    }
    if changes.bio.is_some() {
        profile.bio = optional_text(changes.bio);
    }

    if !store.update_profile(&profile).await? {
        return Err(Error::profile_not_found(profile_id));
    }
    info!(profile = %profile_id, "profile updated");
    Ok(profile)
}

/// Every profile in the catalog, newest first. Administrators only.
pub async fn list_profiles<S: Store + ?Sized>(store: &S, session: &Session) -> Result<Vec<Profile>> {
    session.require_admin()?;
    let profiles = store.list_profiles().await?;
    debug!(admin = %session.actor_id, profiles = profiles.len(), "listed profiles");
    Ok(profiles)
}
