use tracing::debug;

use crate::error::Result;
use crate::models::Profile;
use crate::regions::canonicalize;
use crate::session::Session;
use crate::store::{ProfileFilter, Store};

pub const SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub region: Option<String>,
    pub name_contains: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Lists candidate counterparts for the session's member: profiles of the
/// opposite role, never the member themselves, at most [`SEARCH_LIMIT`].
///
/// A region filter naming a canonical region matches every spelling of that
/// region; any other region filter is compared verbatim.
pub async fn search<S: Store + ?Sized>(
    store: &S,
    session: &Session,
    filters: &SearchFilters,
) -> Result<Vec<Profile>> {
    let mut filter = ProfileFilter::for_role(session.role.opposite());
    filter.exclude_id = Some(session.actor_id);
    filter.name_contains = non_blank(&filters.name_contains).map(str::to_string);

    filter.limit = Some(SEARCH_LIMIT);

    let region = non_blank(&filters.region);
    let canonical = region.and_then(canonicalize);
    match canonical {
        Some(wanted) => filter.canonical_region = Some(wanted),
        None => filter.region_equals = region.map(str::to_string),
    }

    let profiles = store.find_profiles(&filter).await?;

    debug!(
        actor = %session.actor_id,
        results = profiles.len(),
        region = ?canonical.map(|r| r.name()),
        "directory search"
    );
    Ok(profiles)
}
