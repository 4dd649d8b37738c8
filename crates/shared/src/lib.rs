//! # Shared
//! Backup names, backup metadata and logging shared by the backup server and its tests.
//!

#![warn(missing_docs)]

mod backup_name;
mod failure;
mod logger;
mod metadata;

pub use backup_name::{BackupName, MAXIMUM_NAME_LENGTH, NameError};
pub use failure::Failure;
pub use logger::{LoggerError, init_logger};
pub use metadata::BackupMetadata;
