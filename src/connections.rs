use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ConnectionPeer, ConnectionStatus, Role};
use crate::session::Session;
use crate::store::Store;

/// Links the session's member with `target_id`.
///
/// Members of the same role cannot connect, and `target_role` must be the
/// role the target profile actually holds. Connections are created already
/// accepted, and linking an existing pair again returns the original id.
pub async fn create_connection<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    target_id: Uuid,
    target_role: Role,
) -> Result<Uuid> {
    if session.role == target_role {
        warn!(actor = %session.actor_id, target = %target_id, role = %target_role, "rejected same-role connection");
        return Err(Error::RoleMismatch(target_role));
    }

    let target = store
        .get_profile(target_id)
        .await?
        .ok_or_else(|| Error::profile_not_found(target_id))?;
    if target.role != target_role {
        warn!(actor = %session.actor_id, target = %target_id, claimed = %target_role, stored = %target.role, "rejected connection with wrong target role");
        return Err(Error::RoleMismatch(target.role));
    }

    let (mentor_id, team_id) = match session.role {
        Role::Mentor => (session.actor_id, target_id),
        Role::Team => (target_id, session.actor_id),
    };

    let id = store
        .upsert_connection(mentor_id, team_id, ConnectionStatus::Accepted)
        .await?;
    info!(connection = %id, mentor = %mentor_id, team = %team_id, "connection accepted");
    Ok(id)
}

/// Like [`create_connection`], but takes the target's role from the catalog.
pub async fn connect<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    target_id: Uuid,
) -> Result<Uuid> {
    create_connection(store, session, target_id, session.role.opposite()).await
}

/// Accepted connections of `profile_id`, each with the profile on the other side.
pub async fn list_connections<S: Store + ?Sized>(
    store: &S,
    profile_id: Uuid,
    role: Role,
) -> Result<Vec<ConnectionPeer>> {
    let peers = store
        .connection_peers(profile_id, role, ConnectionStatus::Accepted)
        .await?;
    debug!(profile = %profile_id, connections = peers.len(), "listed connections");
    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::Profile;

    async fn pair() -> (MemoryStore, Profile, Profile) {
        let mentor = Profile::new(Role::Mentor, "Avery Lee", "Bahia");
        let team = Profile::new(Role::Team, "Iron Owls", "Bahia");
        let store = MemoryStore::with_profiles(&[mentor.clone(), team.clone()]).await;
        (store, mentor, team)
    }

    #[tokio::test]
    async fn same_role_members_cannot_connect() {
        let a = Profile::new(Role::Mentor, "Avery Lee", "Bahia");
        let b = Profile::new(Role::Mentor, "Jules Moreno", "Bahia");
        let store = MemoryStore::with_profiles(&[a.clone(), b.clone()]).await;

        let err = create_connection(&store, &Session::for_profile(&a), b.id, Role::Mentor)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RoleMismatch(Role::Mentor)));
        assert_eq!(store.connection_rows().await, 0);

        let err = connect(&store, &Session::for_profile(&a), b.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RoleMismatch(_)));
    }

    #[tokio::test]
    async fn both_sides_see_a_new_connection() {
        let (store, mentor, team) = pair().await;

        let id = create_connection(&store, &Session::for_profile(&mentor), team.id, Role::Team)
            .await
            .unwrap();

        let from_mentor = list_connections(&store, mentor.id, Role::Mentor).await.unwrap();
        assert_eq!(from_mentor.len(), 1);
        assert_eq!(from_mentor[0].connection_id, id);
        assert_eq!(from_mentor[0].peer.id, team.id);

        let from_team = list_connections(&store, team.id, Role::Team).await.unwrap();
        assert_eq!(from_team.len(), 1);
        assert_eq!(from_team[0].peer.id, mentor.id);
    }

    #[tokio::test]
    async fn team_initiated_connection_is_ordered_mentor_first() {
        let (store, mentor, team) = pair().await;

        let id = connect(&store, &Session::for_profile(&team), mentor.id)
            .await
            .unwrap();
        let stored = store.get_connection(id).await.unwrap().unwrap();
        assert_eq!(stored.mentor_id, mentor.id);
        assert_eq!(stored.team_id, team.id);
        assert_eq!(stored.status, ConnectionStatus::Accepted);
    }

    #[tokio::test]
    async fn repeated_connection_reuses_the_row() {
        let (store, mentor, team) = pair().await;

        let first = connect(&store, &Session::for_profile(&mentor), team.id)
            .await
            .unwrap();
        let second = connect(&store, &Session::for_profile(&team), mentor.id)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.connection_rows().await, 1);
        assert_eq!(list_connections(&store, mentor.id, Role::Mentor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claimed_target_role_must_match_the_catalog() {
        let a = Profile::new(Role::Mentor, "Avery Lee", "Bahia");
        let b = Profile::new(Role::Mentor, "Jules Moreno", "Bahia");
        let store = MemoryStore::with_profiles(&[a.clone(), b.clone()]).await;

        let err = create_connection(&store, &Session::for_profile(&a), b.id, Role::Team)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RoleMismatch(Role::Mentor)));
        assert_eq!(store.connection_rows().await, 0);
    }

    #[tokio::test]
    async fn creating_with_unknown_target_is_not_found() {
        let (store, mentor, _) = pair().await;
        let err = create_connection(&store, &Session::for_profile(&mentor), Uuid::new_v4(), Role::Team)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "profile", .. }));
        assert_eq!(store.connection_rows().await, 0);
    }

    #[tokio::test]
    async fn connecting_to_missing_profile_is_not_found() {
        let (store, mentor, _) = pair().await;
        let err = connect(&store, &Session::for_profile(&mentor), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "profile", .. }));
    }

    #[tokio::test]
    async fn listing_uses_the_role_column() {
        let (store, mentor, team) = pair().await;
        connect(&store, &Session::for_profile(&mentor), team.id)
            .await
            .unwrap();

        // Asking with the wrong role looks in the other column and finds nothing.
        assert!(list_connections(&store, mentor.id, Role::Team).await.unwrap().is_empty());
    }
}
