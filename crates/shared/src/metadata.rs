use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::BackupName;

/// Metadata containing information about a backup archive.
///
/// Stored next to the archive so that listing backups never has to open an archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    /// The backup's name.
    pub name: BackupName,

    /// When the backup was created.
    pub created_at: DateTime<Utc>,

    /// Archive size in bytes.
    pub size: u64,

    /// The total number of documents across all collections when the backup was created.
    /// `None` when the metadata was recovered from an archive without a sidecar.
    pub document_count: Option<u64>,
}

impl BackupMetadata {
    /// Creates the metadata for a backup created now.
    pub fn new(name: BackupName, size: u64, document_count: u64) -> Self {
        Self {
            name,
            created_at: Utc::now(),
            size,
            document_count: Some(document_count),
        }
    }
}
