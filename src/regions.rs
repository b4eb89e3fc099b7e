//! Region canonicalization and per-region membership statistics.

use std::cmp::Ordering;
use std::sync::OnceLock;

use clap::ValueEnum;
use serde::Serialize;
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;
use crate::models::{RegionStat, Role};
use crate::store::Store;

/// The 27 federative units, in display order.
pub const REGIONS: [&str; 27] = [
    "Acre",
    "Alagoas",
    "Amapá",
    "Amazonas",
    "Bahia",
    "Ceará",
    "Distrito Federal",
    "Espírito Santo",
    "Goiás",
    "Maranhão",
    "Mato Grosso",
    "Mato Grosso do Sul",
    "Minas Gerais",
    "Pará",
    "Paraíba",
    "Paraná",
    "Pernambuco",
    "Piauí",
    "Rio de Janeiro",
    "Rio Grande do Norte",
    "Rio Grande do Sul",
    "Rondônia",
    "Roraima",
    "Santa Catarina",
    "São Paulo",
    "Sergipe",
    "Tocantins",
];

/// Bucket name for profiles whose region matches no canonical region.
pub const UNMATCHED: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalRegion(usize);

impl CanonicalRegion {
    pub fn name(self) -> &'static str {
        REGIONS[self.0]
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Comparison key: NFD, combining marks dropped, lowercased, whitespace
/// collapsed. `"São  Paulo"` and `"SAO PAULO"` share a key.
fn fold(value: &str) -> String {
    let stripped: String = value
        .nfc()
        .collect::<String>()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn folded_regions() -> &'static [String] {
    static FOLDED: OnceLock<Vec<String>> = OnceLock::new();
    FOLDED.get_or_init(|| REGIONS.iter().map(|name| fold(name)).collect())
}

/// Maps a free-text region to its canonical region, ignoring surrounding
/// whitespace, case and diacritics.
pub fn canonicalize(raw: &str) -> Option<CanonicalRegion> {
    let key = fold(raw.trim());
    if key.is_empty() {
        return None;
    }
    folded_regions()
        .iter()
        .position(|candidate| *candidate == key)
        .map(CanonicalRegion)
}

/// Tallies members per canonical region.
///
/// Always returns the 27 canonical rows in [`REGIONS`] order; the
/// [`UNMATCHED`] row follows only when some profile named a region outside
/// them. Profiles with a blank region have not stated one and are skipped.
pub fn aggregate<I, S>(profiles: I) -> Vec<RegionStat>
where
    I: IntoIterator<Item = (S, Role)>,
    S: AsRef<str>,
{
    let mut rows: Vec<RegionStat> = REGIONS.iter().map(|name| RegionStat::empty(*name)).collect();
    let mut unmatched = RegionStat::empty(UNMATCHED);

    for (region, role) in profiles {
        let region = region.as_ref();
        if region.trim().is_empty() {
            continue;
        }
        let row = match canonicalize(region) {
            Some(canonical) => &mut rows[canonical.index()],
            None => &mut unmatched,
        };
        match role {
            Role::Mentor => row.mentor_count += 1,
            Role::Team => row.team_count += 1,
        }
        row.total = row.mentor_count + row.team_count;
    }

    if unmatched.total > 0 {
        rows.push(unmatched);
    }
    rows
}

/// Loads the profile catalog and aggregates it.
pub async fn regional_stats<S: Store + ?Sized>(store: &S) -> Result<Vec<RegionStat>> {
    let catalog = store.region_roles().await?;
    debug!(profiles = catalog.len(), "aggregating regional statistics");
    Ok(aggregate(catalog))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub mentors: u32,
    pub teams: u32,
    pub members: u32,
}

pub fn totals(rows: &[RegionStat]) -> Totals {
    let mentors = rows.iter().map(|row| row.mentor_count).sum();
    let teams = rows.iter().map(|row| row.team_count).sum();
    Totals {
        mentors,
        teams,
        members: mentors + teams,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Region,
    Mentors,
    Teams,
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Collation close to a pt-BR locale compare: accents and case only break ties.
fn collate(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

pub fn sort_stats(mut rows: Vec<RegionStat>, key: SortKey, direction: SortDirection) -> Vec<RegionStat> {
    rows.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Region => collate(&a.region, &b.region),
            SortKey::Mentors => a.mentor_count.cmp(&b.mentor_count),
            SortKey::Teams => a.team_count.cmp(&b.team_count),
            SortKey::Total => a.total.cmp(&b.total),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
    rows
}
