//! # common
//!

#![allow(dead_code)]

use std::{fs, path::PathBuf};

use backup_server::{BackupService, database::MockDatabase};
use shared::BackupName;
use tempfile::TempDir;

pub const DOCUMENT_COUNT: u64 = 42;
pub const ARCHIVE_BYTES: u64 = 512;

/// A backup service over a mock database in a temporary directory.
pub struct TestService {
    /// Removed when the test ends.
    pub temp: TempDir,
    pub service: BackupService<MockDatabase>,
}

pub fn test_service() -> TestService {
    test_service_with(MockDatabase::new(DOCUMENT_COUNT, ARCHIVE_BYTES))
}

pub fn test_service_with(database: MockDatabase) -> TestService {
    let temp = tempfile::tempdir().unwrap();
    let service = BackupService::new(temp.path().join("backups"), database);

    TestService { temp, service }
}

pub fn name(value: &str) -> BackupName {
    BackupName::try_from(value).unwrap()
}

impl TestService {
    pub fn archive_path(&self, backup: &str) -> PathBuf {
        self.service.directory().archive_path(&name(backup))
    }

    pub fn metadata_path(&self, backup: &str) -> PathBuf {
        self.service.directory().metadata_path(&name(backup))
    }

    /// The contents of a backup's archive and metadata, `None` for a missing file.
    pub fn snapshot(&self, backup: &str) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
        (
            fs::read(self.archive_path(backup)).ok(),
            fs::read(self.metadata_path(backup)).ok(),
        )
    }

    pub fn listed_names(&self) -> Vec<String> {
        self.service
            .list_backups()
            .unwrap()
            .into_iter()
            .map(|metadata| metadata.name.to_string())
            .collect()
    }
}
