//! Creating, listing, restoring, deleting and renaming backups.
//!

use std::{
    collections::HashSet,
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use shared::{BackupMetadata, BackupName, NameError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    Context,
    database::{DatabaseTool, ToolError},
    directory::{BackupDirectory, EnsureDirectoryError},
    locks::NameLocks,
    metadata_store::{MetadataStore, SaveMetadataError, sort_newest_first},
};

/// Manages the backups in a backup directory of a database.
#[derive(Debug)]
pub struct BackupService<D: DatabaseTool> {
    directory: BackupDirectory,
    metadata: MetadataStore,
    database: D,
    names: NameLocks,
    /// Held while the database is dumped or restored.
    database_lock: Mutex<()>,
}

impl<D: DatabaseTool> BackupService<D> {
    /// Create a backup service storing backups in `directory`.
    pub fn new(directory: impl Into<PathBuf>, database: D) -> Self {
        let directory = BackupDirectory::new(directory);

        Self {
            metadata: MetadataStore::new(directory.clone()),
            directory,
            database,
            names: NameLocks::new(),
            database_lock: Mutex::new(()),
        }
    }

    /// The backup directory.
    pub fn directory(&self) -> &BackupDirectory {
        &self.directory
    }

    /// The database being backed up.
    pub fn database(&self) -> &D {
        &self.database
    }

    /// List every backup, newest first.
    ///
    /// Archives without readable metadata are included with an unknown document count.
    pub fn list_backups(&self) -> Result<Vec<BackupMetadata>, BackupError> {
        let context = Context {
            backup: None,
            current_context: "List Backups",
        };

        self.directory.ensure()?;

        let mut backups: Vec<BackupMetadata> = self
            .metadata
            .list_all()
            .map_err(|e| BackupError::Io(e, "list backup metadata"))?
            .into_iter()
            .filter(|metadata| {
                let exists = self.directory.exists(&metadata.name);
                if !exists {
                    warn!("{context}Metadata for '{}' has no archive", metadata.name);
                }
                exists
            })
            .collect();

        let listed: HashSet<BackupName> = backups
            .iter()
            .map(|metadata| metadata.name.clone())
            .collect();

        let archives = self
            .directory
            .list_archives()
            .map_err(|e| BackupError::Io(e, "list backup archives"))?;

        for (name, archive_path) in archives {
            if listed.contains(&name) {
                continue;
            }

            match self.metadata.recover(name, &archive_path) {
                Ok(metadata) => {
                    warn!(
                        "{context}Archive {archive_path:?} has no metadata, document count is unknown"
                    );
                    backups.push(metadata);
                }
                Err(error) => warn!("{context}Could not recover {archive_path:?}: {error}"),
            }
        }

        sort_newest_first(&mut backups);

        Ok(backups)
    }

    /// Dump the database into a new backup.
    pub fn create_backup(&self, name: &str) -> Result<BackupMetadata, BackupError> {
        let mut context = Context::new(name, "Create Backup");

        let name = BackupName::try_from(name).inspect_err(|e| warn!("{context}{e}"))?;
        let _guard = self.names.lock(&[name.as_str()]);

        if self.directory.exists(&name) {
            warn!("{context}Backup already exists");
            return Err(BackupError::DuplicateName(name.to_string()));
        }

        self.directory.ensure()?;

        let (size, document_count) = {
            let _database = self.lock_database();

            context.current_context = "Count Documents";
            let document_count = self
                .database
                .count_documents()
                .inspect_err(|e| error!("{context}{e}"))
                .map_err(BackupError::CreateFailed)?;

            // A failed dump must not leave an archive behind.
            context.current_context = "Dump Database";
            let partial_path = self.directory.partial_archive_path(&name);
            let size = match self.database.dump(&partial_path) {
                Ok(size) => size,
                Err(error) => {
                    error!("{context}{error}");
                    if let Err(e) = remove_if_exists(&partial_path) {
                        warn!("{context}Could not remove partial archive: {e}");
                    }
                    return Err(BackupError::CreateFailed(error));
                }
            };

            let archive_path = self.directory.archive_path(&name);
            if let Err(error) = fs::rename(&partial_path, &archive_path) {
                error!("{context}Could not move archive into place: {error}");
                if let Err(e) = remove_if_exists(&partial_path) {
                    warn!("{context}Could not remove partial archive: {e}");
                }
                return Err(BackupError::Io(error, "move archive into place"));
            }

            (size, document_count)
        };

        context.current_context = "Save Metadata";
        let metadata = BackupMetadata::new(name, size, document_count);

        self.metadata
            .save(&metadata)
            .inspect_err(|e| error!("{context}Archive was saved without metadata: {e}"))?;

        info!("{context}Created backup of {document_count} documents, {size} bytes");

        Ok(metadata)
    }

    /// Replace the contents of the database with a backup. This cannot be undone.
    pub fn restore_backup(&self, name: &str) -> Result<(), BackupError> {
        let context = Context::new(name, "Restore Backup");

        let name = existing_name(name)?;
        let _guard = self.names.lock(&[name.as_str()]);
        self.ensure_exists(&context, &name)?;

        let _database = self.lock_database();
        self.database
            .restore(&self.directory.archive_path(&name))
            .inspect_err(|e| error!("{context}{e}"))
            .map_err(BackupError::RestoreFailed)?;

        info!("{context}Restored backup");

        Ok(())
    }

    /// Delete a backup's archive and metadata.
    pub fn delete_backup(&self, name: &str) -> Result<(), BackupError> {
        let context = Context::new(name, "Delete Backup");

        let name = existing_name(name)?;
        let _guard = self.names.lock(&[name.as_str()]);
        self.ensure_exists(&context, &name)?;

        // Each file is removed even if the other could not be.
        let archive_result = remove_if_exists(&self.directory.archive_path(&name));

        if let Err(error) = self.metadata.remove(&name) {
            warn!("{context}Could not remove metadata: {error}");
        }

        archive_result
            .inspect_err(|e| error!("{context}Could not remove archive: {e}"))
            .map_err(|e| BackupError::Io(e, "remove archive"))?;

        info!("{context}Deleted backup");

        Ok(())
    }

    /// Rename a backup's archive and metadata.
    pub fn rename_backup(&self, old_name: &str, new_name: &str) -> Result<(), BackupError> {
        let context = Context::new(old_name, "Rename Backup");

        let new_name = BackupName::try_from(new_name).inspect_err(|e| warn!("{context}{e}"))?;
        let old_name = existing_name(old_name)?;
        let _guard = self.names.lock(&[old_name.as_str(), new_name.as_str()]);

        self.ensure_exists(&context, &old_name)?;

        if self.directory.exists(&new_name) {
            warn!("{context}Backup '{new_name}' already exists");
            return Err(BackupError::DuplicateName(new_name.to_string()));
        }

        fs::rename(
            self.directory.archive_path(&old_name),
            self.directory.archive_path(&new_name),
        )
        .inspect_err(|e| error!("{context}Could not rename archive: {e}"))
        .map_err(|e| BackupError::Io(e, "rename archive"))?;

        // The archive is authoritative, stale metadata is recovered when listing.
        if let Err(error) = self.metadata.relocate(&old_name, &new_name) {
            warn!("{context}Could not rename metadata: {error}");
        }

        info!("{context}Renamed backup to '{new_name}'");

        Ok(())
    }

    fn ensure_exists(&self, context: &Context, name: &BackupName) -> Result<(), BackupError> {
        if !self.directory.exists(name) {
            warn!("{context}Backup not found");
            return Err(BackupError::NotFound(name.to_string()));
        }

        Ok(())
    }

    fn lock_database(&self) -> MutexGuard<'_, ()> {
        self.database_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A name that fails validation cannot belong to an existing backup.
fn existing_name(name: &str) -> Result<BackupName, BackupError> {
    BackupName::try_from(name).map_err(|_| BackupError::NotFound(name.to_string()))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("{0}")]
    InvalidName(#[from] NameError),

    #[error("A backup named '{0}' already exists")]
    DuplicateName(String),

    #[error("No backup named '{0}' exists")]
    NotFound(String),

    #[error("Failed to create backup: {0}")]
    CreateFailed(#[source] ToolError),

    #[error("Failed to restore backup: {0}")]
    RestoreFailed(#[source] ToolError),

    #[error("Failed to prepare the backup directory: {0}")]
    Directory(#[from] EnsureDirectoryError),

    #[error("Failed to save backup metadata: {0}")]
    SaveMetadata(#[from] SaveMetadataError),

    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),
}

impl BackupError {
    /// The machine readable code of an error caused by the request, `None` for internal errors.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidName(error) => Some(error.code()),
            Self::DuplicateName(_) => Some("DUPLICATE_NAME"),
            Self::NotFound(_) => Some("NOT_FOUND"),
            Self::CreateFailed(_) => Some("CREATE_FAILED"),
            Self::RestoreFailed(_) => Some("RESTORE_FAILED"),
            Self::Directory(_) | Self::SaveMetadata(_) | Self::Io(..) => None,
        }
    }
}
