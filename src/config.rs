use anyhow::Context;
use uuid::Uuid;

pub const DEFAULT_MEET_LINK: &str = "https://meet.google.com/new";
pub const DEFAULT_LOG_FILTER: &str = "mentor_match=info";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Actor used when a command is not given `--as`.
    pub default_actor: Option<Uuid>,
    pub meet_link: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup("MENTOR_MATCH_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MENTOR_MATCH_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => 5,
        };

        let default_actor = lookup("MENTOR_MATCH_ACTOR")
            .map(|raw| {
                Uuid::parse_str(raw.trim())
                    .with_context(|| format!("MENTOR_MATCH_ACTOR is not a UUID: {raw}"))
            })
            .transpose()?;

        let meet_link =
            lookup("MENTOR_MATCH_MEET_LINK").unwrap_or_else(|| DEFAULT_MEET_LINK.to_string());

        Ok(Config {
            database_url,
            max_connections,
            default_actor,
            meet_link,
        })
    }
}
