use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Role;
use crate::session::Session;
use crate::store::{ProfileFlag, Store};

pub async fn set_admin<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    profile_id: Uuid,
    is_admin: bool,
) -> Result<()> {
    session.require_admin()?;
    if !store
        .set_profile_flag(profile_id, ProfileFlag::Admin, is_admin)
        .await?
    {
        return Err(Error::profile_not_found(profile_id));
    }
    info!(profile = %profile_id, admin = %session.actor_id, is_admin, "admin flag updated");
    Ok(())
}

/// Marks a mentor as verified. Teams carry no verification flag.
pub async fn verify_mentor<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    profile_id: Uuid,
    verified: bool,
) -> Result<()> {
    session.require_admin()?;
    let profile = store
        .get_profile(profile_id)
        .await?
        .ok_or_else(|| Error::profile_not_found(profile_id))?;
    if profile.role != Role::Mentor {
        return Err(Error::InvalidOperation("only mentors can be verified"));
    }

    if !store
        .set_profile_flag(profile_id, ProfileFlag::MentorVerified, verified)
        .await?
    {
        return Err(Error::profile_not_found(profile_id));
    }
    info!(profile = %profile_id, admin = %session.actor_id, verified, "mentor verification updated");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileDeletion {
    /// The actor removed their own profile and the identity provider should
    /// end their session.
    pub forced_sign_out: bool,
}

/// Deletes a profile row. Administrators may delete any profile; members
/// only their own.
pub async fn delete_profile<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    profile_id: Uuid,
) -> Result<ProfileDeletion> {
    let own = session.actor_id == profile_id;
    if !own {
        session.require_admin()?;
    }

    if !store.delete_profile(profile_id).await? {
        return Err(Error::profile_not_found(profile_id));
    }
    info!(profile = %profile_id, actor = %session.actor_id, "profile deleted");
    Ok(ProfileDeletion {
        forced_sign_out: own,
    })
}
