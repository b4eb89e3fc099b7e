use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::RegionStat;
use crate::regions::{self, Totals, UNMATCHED};

const UNMATCHED_LABEL: &str = "(unrecognised region)";

#[derive(Debug, Serialize)]
pub struct StatsDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub totals: Totals,
    pub regions: &'a [RegionStat],
}

fn label(region: &str) -> &str {
    if region == UNMATCHED {
        UNMATCHED_LABEL
    } else {
        region
    }
}

pub fn build_stats_report(rows: &[RegionStat], generated_at: DateTime<Utc>) -> String {
    let totals = regions::totals(rows);
    let mut output = String::new();

    let _ = writeln!(output, "# Mentor Coverage by Region");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Totals");
    let _ = writeln!(output, "- Mentors: {}", totals.mentors);
    let _ = writeln!(output, "- Teams: {}", totals.teams);
    let _ = writeln!(output, "- Members: {}", totals.members);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Regions");
    let _ = writeln!(output, "| Region | Mentors | Teams | Total |");
    let _ = writeln!(output, "| --- | ---: | ---: | ---: |");
    for row in rows {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            label(&row.region),
            row.mentor_count,
            row.team_count,
            row.total
        );
    }

    let uncovered: Vec<&str> = rows
        .iter()
        .filter(|row| row.region != UNMATCHED && row.total == 0)
        .map(|row| row.region.as_str())
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Regions Without Members");
    if uncovered.is_empty() {
        let _ = writeln!(output, "Every region has at least one member.");
    } else {
        let _ = writeln!(output, "{}", uncovered.join(", "));
    }

    output
}

pub fn build_stats_json(rows: &[RegionStat], generated_at: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&StatsDocument {
        generated_at,
        totals: regions::totals(rows),
        regions: rows,
    })
}
