//! huddle - team-chat client for AI agents and terminal users
//!
//! The library exposes the access layer (credential strategies, the remote
//! dispatcher, pagination, thread reconstruction) and the command handlers
//! used by the `huddle` binary.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use api::client::ChatClient;
pub use config::Config;
pub use error::CliError;
