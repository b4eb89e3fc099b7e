use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mentor_match::config::{Config, DEFAULT_LOG_FILTER};
use mentor_match::db::{self, PgStore};
use mentor_match::directory::SearchFilters;
use mentor_match::models::{ReportReason, Role};
use mentor_match::regions::{SortDirection, SortKey};
use mentor_match::{
    admin, connections, directory, export, follows, meetings, moderation, profiles, regions,
    Session,
};

#[derive(Parser)]
#[command(name = "mentor-match")]
#[command(about = "Mentor and team matching, follows and report moderation", long_about = None)]
struct Cli {
    /// Profile id of the acting member (defaults to MENTOR_MATCH_ACTOR)
    #[arg(long = "as", global = true)]
    actor: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample profiles
    Seed,
    /// Import profiles from a CSV file (full_name, role, region, city, bio)
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Create the acting identity's profile
    Register {
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value = "")]
        city: String,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Edit your own profile details
    EditProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        city: Option<String>,
        /// Pass an empty string to clear the bio
        #[arg(long)]
        bio: Option<String>,
    },
    /// List every profile, newest first (admin)
    Profiles,
    /// Find counterparts of the opposite role
    Search {
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Connect with a mentor or team
    Connect { target: Uuid },
    /// List accepted connections
    Connections,
    /// Record a meeting for a connection
    Meet {
        connection: Uuid,
        #[arg(long)]
        title: Option<String>,
    },
    /// Follow or unfollow a profile
    Follow { target: Uuid },
    /// Show who follows a profile
    Followers { target: Uuid },
    /// Report a profile for review
    Report {
        target: Uuid,
        #[arg(long, value_parser = parse_reason, default_value = "spam")]
        reason: ReportReason,
        #[arg(long)]
        details: Option<String>,
    },
    /// List reports awaiting or past review (admin)
    Reports,
    /// Mark a report as resolved (admin)
    Resolve { report: Uuid },
    /// Mark a report as rejected (admin)
    Reject { report: Uuid },
    /// Delete a closed report (admin)
    DeleteReport { report: Uuid },
    /// Grant or revoke administrator rights (admin)
    SetAdmin {
        profile: Uuid,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        value: bool,
    },
    /// Set a mentor's verification flag (admin)
    Verify {
        profile: Uuid,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        value: bool,
    },
    /// Delete a profile (admin, or your own)
    DeleteProfile { profile: Uuid },
    /// Members per region
    Stats {
        #[arg(long, value_enum, default_value_t = SortKey::Total)]
        sort: SortKey,
        #[arg(long, value_enum, default_value_t = SortDirection::Desc)]
        order: SortDirection,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_reason(value: &str) -> Result<ReportReason, String> {
    value.parse()
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.parse()
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn session(store: &PgStore, actor: Option<Uuid>) -> anyhow::Result<Session> {
    let actor = actor.context("no acting member: pass --as <profile-id> or set MENTOR_MATCH_ACTOR")?;
    Session::load(store, actor)
        .await
        .with_context(|| format!("cannot act as {actor}"))
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Mentor => "Mentor",
        Role::Team => "Team",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = PgStore::connect(&config).await?;
    let actor = cli.actor.or(config.default_actor);

    match cli.command {
        Commands::InitDb => {
            db::init_db(&store).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let written = db::seed(&store).await?;
            println!("Seeded {written} profiles.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&store, &csv).await?;
            println!("Imported {inserted} profiles from {}.", csv.display());
        }
        Commands::Register {
            role,
            name,
            region,
            city,
            bio,
        } => {
            let actor = actor
                .context("no identity: pass --as <profile-id> or set MENTOR_MATCH_ACTOR")?;
            let registration = profiles::Registration {
                role,
                full_name: name,
                region,
                city,
                bio,
            };
            let profile = profiles::register_profile(&store, actor, registration).await?;
            println!(
                "Registered {} {} ({}).",
                role_label(profile.role),
                profile.full_name,
                profile.id
            );
        }
        Commands::EditProfile {
            name,
            region,
            city,
            bio,
        } => {
            let session = session(&store, actor).await?;
            let changes = profiles::ProfileUpdate {
                full_name: name,
                region,
                city,
                bio,
            };
            let profile =
                profiles::update_profile(&store, &session, session.actor_id, changes).await?;
            println!("Updated {} [{}, {}].", profile.full_name, profile.city, profile.region);
        }
        Commands::Profiles => {
            let session = session(&store, actor).await?;
            for profile in profiles::list_profiles(&store, &session).await? {
                println!(
                    "- {} {} [{}] {} joined {}",
                    role_label(profile.role),
                    profile.full_name,
                    profile.region,
                    profile.id,
                    profile.created_at.format("%Y-%m-%d")
                );
            }
        }
        Commands::Search { region, name } => {
            let session = session(&store, actor).await?;
            let filters = SearchFilters {
                region,
                name_contains: name,
            };
            let results = directory::search(&store, &session, &filters).await?;
            if results.is_empty() {
                println!("No matching profiles.");
                return Ok(());
            }
            for profile in results {
                let verified = if profile.is_mentor_verified { " (verified)" } else { "" };
                println!(
                    "- {} {}{} [{}, {}] {}",
                    role_label(profile.role),
                    profile.full_name,
                    verified,
                    profile.city,
                    profile.region,
                    profile.id
                );
            }
        }
        Commands::Connect { target } => {
            let session = session(&store, actor).await?;
            let id = connections::connect(&store, &session, target).await?;
            println!("Connected (connection {id}).");
        }
        Commands::Connections => {
            let session = session(&store, actor).await?;
            let peers =
                connections::list_connections(&store, session.actor_id, session.role).await?;
            if peers.is_empty() {
                println!("No connections yet.");
            }
            for entry in peers {
                println!(
                    "- {} ({}) connection {}",
                    entry.peer.full_name, entry.peer.region, entry.connection_id
                );
            }
        }
        Commands::Meet { connection, title } => {
            let session = session(&store, actor).await?;
            let meeting = meetings::schedule_meeting(
                &store,
                &session,
                connection,
                title.as_deref(),
                &config.meet_link,
            )
            .await?;
            println!("{}: {}", meeting.title, meeting.meet_link);
        }
        Commands::Follow { target } => {
            let session = session(&store, actor).await?;
            let state = follows::toggle_follow(&store, &session, target).await?;
            let count = follows::follower_count(&store, target).await?;
            match state {
                follows::FollowState::Following => println!("Following ({count} followers)."),
                follows::FollowState::NotFollowing => {
                    println!("Unfollowed ({count} followers).")
                }
            }
        }
        Commands::Followers { target } => {
            let stats = follows::follow_stats(&store, target, actor).await?;
            let followers = follows::list_followers(&store, target).await?;
            println!(
                "{} followers, following {}{}",
                stats.followers,
                stats.following,
                if stats.viewer_follows { " (you follow)" } else { "" }
            );
            for follower in followers {
                println!("- {} ({})", follower.full_name, follower.role);
            }
        }
        Commands::Report {
            target,
            reason,
            details,
        } => {
            let session = session(&store, actor).await?;
            let id =
                moderation::file_report(&store, &session, target, reason, details.as_deref())
                    .await?;
            println!("Report {id} filed. Thank you.");
        }
        Commands::Reports => {
            let session = session(&store, actor).await?;
            let listings = moderation::list_reports(&store, &session).await?;
            if listings.is_empty() {
                println!("No reports recorded.");
            }
            for listing in listings {
                let report = &listing.report;
                println!(
                    "- {} [{}] {} reported {} for {} on {}{}",
                    report.id,
                    report.status,
                    listing.reporter_name.as_deref().unwrap_or("(deleted)"),
                    listing.reported_name.as_deref().unwrap_or("(deleted)"),
                    report.reason,
                    report.created_at.format("%Y-%m-%d"),
                    report
                        .details
                        .as_deref()
                        .map(|d| format!(": {d}"))
                        .unwrap_or_default()
                );
            }
        }
        Commands::Resolve { report } => {
            let session = session(&store, actor).await?;
            let report = moderation::resolve_report(&store, &session, report).await?;
            println!("Report {} is {}.", report.id, report.status);
        }
        Commands::Reject { report } => {
            let session = session(&store, actor).await?;
            let report = moderation::reject_report(&store, &session, report).await?;
            println!("Report {} is {}.", report.id, report.status);
        }
        Commands::DeleteReport { report } => {
            let session = session(&store, actor).await?;
            moderation::delete_report(&store, &session, report).await?;
            println!("Report {report} deleted.");
        }
        Commands::SetAdmin { profile, value } => {
            let session = session(&store, actor).await?;
            admin::set_admin(&store, &session, profile, value).await?;
            println!("Administrator flag for {profile} set to {value}.");
        }
        Commands::Verify { profile, value } => {
            let session = session(&store, actor).await?;
            admin::verify_mentor(&store, &session, profile, value).await?;
            println!("Verification for {profile} set to {value}.");
        }
        Commands::DeleteProfile { profile } => {
            let session = session(&store, actor).await?;
            let outcome = admin::delete_profile(&store, &session, profile).await?;
            println!("Profile {profile} deleted.");
            if outcome.forced_sign_out {
                println!("You deleted your own profile; sign out of the identity provider.");
            }
        }
        Commands::Stats {
            sort,
            order,
            json,
            out,
        } => {
            let rows = regions::regional_stats(&store).await?;
            let rows = regions::sort_stats(rows, sort, order);
            let generated_at = Utc::now();
            let rendered = if json {
                export::build_stats_json(&rows, generated_at)?
            } else {
                export::build_stats_report(&rows, generated_at)
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Statistics written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}
