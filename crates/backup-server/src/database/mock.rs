use core::sync::atomic::{AtomicU64, Ordering};
use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use super::{DatabaseTool, ToolError};

/// Mock a database. Dumps are archives of zeroes.
#[derive(Debug, Deserialize, Serialize)]
pub struct MockDatabase {
    /// The number of documents the database holds.
    pub document_count: u64,

    /// The size of the archives produced by a dump.
    pub archive_bytes: u64,

    /// Dumps write half an archive then fail.
    #[serde(default)]
    pub fail_dump: bool,

    /// Restores fail.
    #[serde(default)]
    pub fail_restore: bool,

    /// The number of successful restores.
    #[serde(skip)]
    pub restores: AtomicU64,
}

impl MockDatabase {
    /// Create a mock database holding `document_count` documents.
    pub fn new(document_count: u64, archive_bytes: u64) -> Self {
        Self {
            document_count,
            archive_bytes,
            fail_dump: false,
            fail_restore: false,
            restores: AtomicU64::new(0),
        }
    }

    /// The number of successful restores.
    pub fn restore_count(&self) -> u64 {
        self.restores.load(Ordering::SeqCst)
    }

    fn archive(&self, bytes: u64) -> Result<Vec<u8>, ToolError> {
        let length = usize::try_from(bytes)
            .map_err(|_| ToolError::InvalidOutput(format!("{bytes} > usize::MAX")))?;
        Ok(vec![0u8; length])
    }
}

impl DatabaseTool for MockDatabase {
    fn count_documents(&self) -> Result<u64, ToolError> {
        Ok(self.document_count)
    }

    fn dump(&self, destination: &Path) -> Result<u64, ToolError> {
        if self.fail_dump {
            let partial = self.archive(self.archive_bytes / 2)?;
            fs::write(destination, partial).map_err(|e| ToolError::Io(e, "write archive"))?;
            return Err(ToolError::CommandErrored("mock dump failed".to_string()));
        }

        let archive = self.archive(self.archive_bytes)?;
        fs::write(destination, archive).map_err(|e| ToolError::Io(e, "write archive"))?;

        Ok(self.archive_bytes)
    }

    fn restore(&self, source: &Path) -> Result<(), ToolError> {
        fs::metadata(source).map_err(|e| ToolError::Io(e, "read archive"))?;

        if self.fail_restore {
            return Err(ToolError::CommandErrored("mock restore failed".to_string()));
        }

        self.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new(0, 512)
    }
}
