//! Tools that dump and restore the live database.
//!

use core::fmt::Debug;
use std::{io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod mock;
mod mongo;

pub use mock::MockDatabase;
pub use mongo::MongoTools;

/// A tool that can archive and restore the entire live database.
pub trait DatabaseTool: Debug + Send + Sync {
    /// Count the documents across every collection of the database.
    fn count_documents(&self) -> Result<u64, ToolError>;

    /// Dump the entire database to a compressed archive at `destination`.
    /// Returns the size of the archive in bytes.
    ///
    /// On failure a partially written archive may be left at `destination`.
    fn dump(&self, destination: &Path) -> Result<u64, ToolError>;

    /// Replace the entire contents of the database with the archive at `source`.
    fn restore(&self, source: &Path) -> Result<(), ToolError>;
}

#[allow(missing_docs)]
#[derive(Debug, Deserialize, Serialize)]
pub enum Database {
    Mongo(MongoTools),
    Mock(MockDatabase),
}

impl DatabaseTool for Database {
    fn count_documents(&self) -> Result<u64, ToolError> {
        match self {
            Self::Mongo(mongo) => mongo.count_documents(),
            Self::Mock(mock) => mock.count_documents(),
        }
    }

    fn dump(&self, destination: &Path) -> Result<u64, ToolError> {
        match self {
            Self::Mongo(mongo) => mongo.dump(destination),
            Self::Mock(mock) => mock.dump(destination),
        }
    }

    fn restore(&self, source: &Path) -> Result<(), ToolError> {
        match self {
            Self::Mongo(mongo) => mongo.restore(source),
            Self::Mock(mock) => mock.restore(source),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::Mongo(MongoTools::default())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to run command:\n{0}")]
    RunCommand(#[source] io::Error),

    #[error("Command output was error:\n{0}")]
    CommandErrored(String),

    #[error("Command output was invalid: {0}")]
    InvalidOutput(String),

    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),
}
