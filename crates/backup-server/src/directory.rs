//! The directory holding backup archives and their metadata.
//!

use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use shared::BackupName;
use thiserror::Error;
use tracing::warn;

/// File extension of a backup archive.
pub const ARCHIVE_EXTENSION: &str = "gz";

/// File extension of a backup's metadata sidecar.
pub const METADATA_EXTENSION: &str = "json";

/// The backup directory. Every backup is an archive `<name>.gz` and a metadata sidecar
/// `<name>.json`, related only by their shared name.
#[derive(Debug, Clone)]
pub struct BackupDirectory {
    path: PathBuf,
}

impl BackupDirectory {
    /// Create a backup directory at a path. Nothing is created until [`Self::ensure`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory and any parents if they do not exist.
    pub fn ensure(&self) -> Result<(), EnsureDirectoryError> {
        match fs::metadata(&self.path) {
            Ok(metadata) => {
                if !metadata.is_dir() {
                    return Err(EnsureDirectoryError::NotDirectory(self.path.clone()));
                }
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.path).map_err(EnsureDirectoryError::Create)
            }
            Err(error) => Err(EnsureDirectoryError::Metadata(error)),
        }
    }

    /// The path of a backup's archive.
    pub fn archive_path(&self, name: &BackupName) -> PathBuf {
        self.path.join(format!("{name}.{ARCHIVE_EXTENSION}"))
    }

    /// The path a backup's archive is dumped to before it is complete.
    pub fn partial_archive_path(&self, name: &BackupName) -> PathBuf {
        self.path.join(format!("{name}.{ARCHIVE_EXTENSION}.partial"))
    }

    /// The path of a backup's metadata sidecar.
    pub fn metadata_path(&self, name: &BackupName) -> PathBuf {
        self.path.join(format!("{name}.{METADATA_EXTENSION}"))
    }

    /// The path a backup's metadata is written to before it replaces the sidecar.
    pub fn temporary_metadata_path(&self, name: &BackupName) -> PathBuf {
        self.path.join(format!("{name}.{METADATA_EXTENSION}.tmp"))
    }

    /// If the archive for a backup exists.
    pub fn exists(&self, name: &BackupName) -> bool {
        fs::metadata(self.archive_path(name)).is_ok_and(|metadata| metadata.is_file())
    }

    /// Lists the `(archive, metadata)` paths of every metadata sidecar in the directory.
    ///
    /// The archive of a pair may not exist.
    pub fn list_archive_pairs(&self) -> io::Result<Vec<(PathBuf, PathBuf)>> {
        let names = self.list_names(METADATA_EXTENSION)?;

        Ok(names
            .into_iter()
            .map(|name| (self.archive_path(&name), self.metadata_path(&name)))
            .collect())
    }

    /// Lists the name and path of every archive in the directory.
    pub fn list_archives(&self) -> io::Result<Vec<(BackupName, PathBuf)>> {
        let names = self.list_names(ARCHIVE_EXTENSION)?;

        Ok(names
            .into_iter()
            .map(|name| {
                let path = self.archive_path(&name);
                (name, path)
            })
            .collect())
    }

    /// Lists the backup names of the files in the directory with a given extension.
    fn list_names(&self, extension: &str) -> io::Result<Vec<BackupName>> {
        let directory = match fs::read_dir(&self.path) {
            Ok(directory) => directory,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error),
        };

        let names = directory
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(error) => {
                        warn!("Could not read entry in {:?}: {error}", self.path);
                        return None;
                    }
                };
                let path = entry.path();

                if !path.is_file() {
                    return None;
                }

                if path.extension().and_then(|extension| extension.to_str()) != Some(extension) {
                    return None;
                }

                let stem = path.file_stem()?.to_str()?;
                BackupName::try_from(stem).ok()
            })
            .collect();

        Ok(names)
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum EnsureDirectoryError {
    #[error("The backup directory {0:?} is not a directory")]
    NotDirectory(PathBuf),

    #[error("Failed to read the backup directory metadata:\n{0}")]
    Metadata(#[source] io::Error),

    #[error("Failed to create the backup directory:\n{0}")]
    Create(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> BackupName {
        BackupName::try_from(value).unwrap()
    }

    #[test]
    fn ensure_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let directory = BackupDirectory::new(temp.path().join("a").join("b"));

        directory.ensure().unwrap();
        directory.ensure().unwrap();
        assert!(directory.path().is_dir());
    }

    #[test]
    fn ensure_rejects_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, "contents").unwrap();

        let directory = BackupDirectory::new(path);
        assert!(matches!(
            directory.ensure(),
            Err(EnsureDirectoryError::NotDirectory(_))
        ));
    }

    #[test]
    fn exists_checks_archive_only() {
        let temp = tempfile::tempdir().unwrap();
        let directory = BackupDirectory::new(temp.path());
        let backup = name("nightly");

        fs::write(directory.metadata_path(&backup), "{}").unwrap();
        assert!(!directory.exists(&backup));

        fs::write(directory.partial_archive_path(&backup), "partial").unwrap();
        assert!(!directory.exists(&backup));

        fs::write(directory.archive_path(&backup), "archive").unwrap();
        assert!(directory.exists(&backup));
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let directory = BackupDirectory::new(temp.path().join("missing"));

        assert!(directory.list_archive_pairs().unwrap().is_empty());
        assert!(directory.list_archives().unwrap().is_empty());
    }

    #[test]
    fn lists_pairs_and_archives() {
        let temp = tempfile::tempdir().unwrap();
        let directory = BackupDirectory::new(temp.path());

        let complete = name("complete");
        fs::write(directory.archive_path(&complete), "archive").unwrap();
        fs::write(directory.metadata_path(&complete), "{}").unwrap();

        let orphan = name("orphan");
        fs::write(directory.archive_path(&orphan), "archive").unwrap();

        // Files that are not backups
        fs::write(temp.path().join("not valid.json"), "{}").unwrap();
        fs::write(temp.path().join("notes.txt"), "notes").unwrap();
        fs::write(directory.temporary_metadata_path(&orphan), "{}").unwrap();
        fs::create_dir(temp.path().join("folder.json")).unwrap();

        let pairs = directory.list_archive_pairs().unwrap();
        assert_eq!(
            pairs,
            vec![(
                directory.archive_path(&complete),
                directory.metadata_path(&complete)
            )]
        );

        let mut archives = directory.list_archives().unwrap();
        archives.sort();
        assert_eq!(
            archives,
            vec![
                (complete.clone(), directory.archive_path(&complete)),
                (orphan.clone(), directory.archive_path(&orphan)),
            ]
        );
    }
}
