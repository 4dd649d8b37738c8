//! # backup-server
//! Creates, lists, restores, deletes and renames full database backups over HTTP.
//!

pub mod auth;
mod config;
mod context;
pub mod database;
pub mod directory;
pub mod http;
pub mod locks;
pub mod metadata_store;
pub mod server;
pub mod service;

pub use config::{AuthConfig, Config, DATABASE_URI_VARIABLE, LoadConfigError};
pub use context::Context;
pub use service::{BackupError, BackupService};
