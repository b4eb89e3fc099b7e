use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Profile, Role};
use crate::store::Store;

/// The authenticated member on whose behalf an operation runs.
///
/// Built once per request from the identity provider's actor id and handed
/// to every write operation explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub actor_id: Uuid,
    pub role: Role,
    pub is_admin: bool,
}

impl Session {
    pub fn for_profile(profile: &Profile) -> Self {
        Session {
            actor_id: profile.id,
            role: profile.role,
            is_admin: profile.is_admin,
        }
    }

    pub async fn load<S: Store + ?Sized>(store: &S, actor_id: Uuid) -> Result<Self> {
        let profile = store
            .get_profile(actor_id)
            .await?
            .ok_or_else(|| Error::profile_not_found(actor_id))?;
        Ok(Session::for_profile(&profile))
    }

    pub(crate) fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::Forbidden("administrator capability required"))
        }
    }
}
