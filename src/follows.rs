use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{FollowStats, ProfileSummary};
use crate::session::Session;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FollowState {
    Following,
    NotFollowing,
}

impl From<bool> for FollowState {
    fn from(following: bool) -> Self {
        if following {
            FollowState::Following
        } else {
            FollowState::NotFollowing
        }
    }
}

/// Flips the session member's follow edge toward `target_id` in one store call.
pub async fn toggle_follow<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    target_id: Uuid,
) -> Result<FollowState> {
    if session.actor_id == target_id {
        warn!(actor = %session.actor_id, "rejected self-follow");
        return Err(Error::InvalidOperation("members cannot follow themselves"));
    }
    if store.get_profile(target_id).await?.is_none() {
        return Err(Error::profile_not_found(target_id));
    }

    let state = FollowState::from(store.toggle_follow(session.actor_id, target_id).await?);
    info!(follower = %session.actor_id, target = %target_id, ?state, "follow toggled");
    Ok(state)
}

pub async fn is_following<S: Store + ?Sized>(
    store: &S,
    follower_id: Uuid,
    target_id: Uuid,
) -> Result<bool> {
    Ok(store.is_following(follower_id, target_id).await?)
}

pub async fn follower_count<S: Store + ?Sized>(store: &S, target_id: Uuid) -> Result<i64> {
    Ok(store.count_followers(target_id).await?)
}

pub async fn list_followers<S: Store + ?Sized>(
    store: &S,
    target_id: Uuid,
) -> Result<Vec<ProfileSummary>> {
    let followers = store.list_followers(target_id).await?;
    debug!(target = %target_id, followers = followers.len(), "listed followers");
    Ok(followers)
}

/// Counts for a profile page, plus whether `viewer` follows it.
pub async fn follow_stats<S: Store + ?Sized>(
    store: &S,
    target_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<FollowStats> {
    let viewer_follows = match viewer {
        Some(viewer) if viewer != target_id => store.is_following(viewer, target_id).await?,
        _ => false,
    };
    Ok(FollowStats {
        followers: store.count_followers(target_id).await?,
        following: store.count_following(target_id).await?,
        viewer_follows,
    })
}
