use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Meeting;
use crate::session::Session;
use crate::store::Store;

pub const DEFAULT_TITLE: &str = "Mentoring meeting";

/// Records a meeting marker for a connection the session's member is part of.
/// The link is generated elsewhere and stored as given.
pub async fn schedule_meeting<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    connection_id: Uuid,
    title: Option<&str>,
    meet_link: &str,
) -> Result<Meeting> {
    let connection = store
        .get_connection(connection_id)
        .await?
        .ok_or(Error::NotFound {
            kind: "connection",
            id: connection_id,
        })?;

    if !connection.involves(session.actor_id) {
        return Err(Error::Forbidden("only connected members can schedule a meeting"));
    }

    let meeting = Meeting {
        id: Uuid::new_v4(),
        connection_id,
        title: title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string(),
        scheduled_at: Utc::now(),
        meet_link: meet_link.to_string(),
    };
    store.insert_meeting(&meeting).await?;
    info!(meeting = %meeting.id, connection = %connection_id, "meeting scheduled");
    Ok(meeting)
}
