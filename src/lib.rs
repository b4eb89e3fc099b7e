//! Mentor/team matching core: profiles, connections, the follow graph, report
//! moderation and regional coverage statistics, all over a pluggable
//! [`store::Store`].

pub mod admin;
pub mod config;
pub mod connections;
pub mod db;
pub mod directory;
pub mod error;
pub mod export;
pub mod follows;
pub mod meetings;
pub mod models;
pub mod moderation;
pub mod profiles;
pub mod regions;
pub mod session;
pub mod store;

#[cfg(test)]
mod memory;

pub use error::{Error, Result};
pub use session::Session;
