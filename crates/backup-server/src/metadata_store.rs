//! Metadata sidecars for backups.
//!

use std::{
    fs::{self, OpenOptions},
    io::{self, ErrorKind, Write},
    path::Path,
};

use chrono::{DateTime, Utc};
use shared::{BackupMetadata, BackupName};
use thiserror::Error;
use tracing::warn;

use crate::directory::BackupDirectory;

/// Reads and writes the metadata sidecar of each backup.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    directory: BackupDirectory,
}

impl MetadataStore {
    /// Create a metadata store over a backup directory.
    pub fn new(directory: BackupDirectory) -> Self {
        Self { directory }
    }

    /// Save a backup's metadata, replacing any existing sidecar.
    ///
    /// The metadata is written to a temporary file and moved into place once it is on disk, so a
    /// sidecar is either the old or the new contents.
    pub fn save(&self, metadata: &BackupMetadata) -> Result<(), SaveMetadataError> {
        let contents = serde_json::to_vec_pretty(metadata)?;

        let temporary_path = self.directory.temporary_metadata_path(&metadata.name);
        let path = self.directory.metadata_path(&metadata.name);

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temporary_path)
                .map_err(|e| SaveMetadataError::Io(e, "create temporary metadata file"))?;

            file.write_all(&contents)
                .map_err(|e| SaveMetadataError::Io(e, "write temporary metadata file"))?;
            file.sync_all()
                .map_err(|e| SaveMetadataError::Io(e, "sync temporary metadata file"))?;
        }

        if let Err(error) = fs::rename(&temporary_path, &path) {
            if let Err(e) = fs::remove_file(&temporary_path) {
                warn!("Could not remove temporary metadata file {temporary_path:?}: {e}");
            }
            return Err(SaveMetadataError::Io(error, "move metadata file into place"));
        }

        Ok(())
    }

    /// Load a backup's metadata. `None` if the sidecar is missing or unreadable.
    pub fn load(&self, name: &BackupName) -> Option<BackupMetadata> {
        read_metadata(&self.directory.metadata_path(name))
            .inspect_err(|error| {
                if error.kind() != ErrorKind::NotFound {
                    warn!("Could not load metadata for '{name}': {error}");
                }
            })
            .ok()
    }

    /// Load every readable sidecar, newest first.
    pub fn list_all(&self) -> io::Result<Vec<BackupMetadata>> {
        let mut backups: Vec<BackupMetadata> = self
            .directory
            .list_archive_pairs()?
            .into_iter()
            .filter_map(|(_, metadata_path)| match read_metadata(&metadata_path) {
                Ok(metadata) => Some(metadata),
                Err(error) => {
                    warn!("Skipping unreadable metadata {metadata_path:?}: {error}");
                    None
                }
            })
            .collect();

        sort_newest_first(&mut backups);

        Ok(backups)
    }

    /// Rebuild the metadata of an archive that has no sidecar from the archive file itself.
    ///
    /// The document count cannot be recovered.
    pub fn recover(&self, name: BackupName, archive_path: &Path) -> io::Result<BackupMetadata> {
        let file_metadata = fs::metadata(archive_path)?;
        let created_at: DateTime<Utc> = file_metadata.modified()?.into();

        Ok(BackupMetadata {
            name,
            created_at,
            size: file_metadata.len(),
            document_count: None,
        })
    }

    /// Move a backup's sidecar to a new name, rewriting the name it records.
    ///
    /// Without a readable sidecar for `old`, any sidecar left at `new` is removed so the renamed
    /// archive is recovered instead of described by stale metadata.
    pub fn relocate(&self, old: &BackupName, new: &BackupName) -> Result<(), SaveMetadataError> {
        match self.load(old) {
            Some(mut metadata) => {
                metadata.name = new.clone();
                self.save(&metadata)?;
            }
            None => self
                .remove(new)
                .map_err(|e| SaveMetadataError::Io(e, "remove stale metadata file"))?,
        }

        self.remove(old)
            .map_err(|e| SaveMetadataError::Io(e, "remove old metadata file"))
    }

    /// Remove a backup's sidecar. A missing sidecar is not an error.
    pub fn remove(&self, name: &BackupName) -> io::Result<()> {
        match fs::remove_file(self.directory.metadata_path(name)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error),
        }
    }
}

/// Sort backups by creation time, newest first. Ties keep their order.
pub fn sort_newest_first(backups: &mut [BackupMetadata]) {
    backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn read_metadata(path: &Path) -> io::Result<BackupMetadata> {
    let contents = fs::read(path)?;
    serde_json::from_slice(&contents).map_err(io::Error::from)
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SaveMetadataError {
    #[error("Failed to serialize metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to {1}: {0}")]
    Io(#[source] io::Error, &'static str),
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn store() -> (tempfile::TempDir, MetadataStore) {
        let temp = tempfile::tempdir().unwrap();
        let directory = BackupDirectory::new(temp.path());
        (temp, MetadataStore::new(directory))
    }

    fn metadata(name: &str, created_at: DateTime<Utc>) -> BackupMetadata {
        BackupMetadata {
            name: BackupName::try_from(name).unwrap(),
            created_at,
            size: 64,
            document_count: Some(5),
        }
    }

    #[test]
    fn save_then_load() {
        let (_temp, store) = store();
        let saved = metadata("nightly", Utc::now());

        store.save(&saved).unwrap();

        assert_eq!(store.load(&saved.name), Some(saved.clone()));
        assert!(!store.directory.temporary_metadata_path(&saved.name).exists());
    }

    #[test]
    fn save_overwrites() {
        let (_temp, store) = store();
        let mut saved = metadata("nightly", Utc::now());
        store.save(&saved).unwrap();

        saved.size = 128;
        store.save(&saved).unwrap();

        assert_eq!(store.load(&saved.name).unwrap().size, 128);
    }

    #[test]
    fn load_missing_or_corrupt_is_none() {
        let (_temp, store) = store();
        let name = BackupName::try_from("nightly").unwrap();
        assert_eq!(store.load(&name), None);

        fs::write(store.directory.metadata_path(&name), "not json").unwrap();
        assert_eq!(store.load(&name), None);
    }

    #[test]
    fn list_all_sorts_newest_first_and_skips_corrupt() {
        let (_temp, store) = store();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        store.save(&metadata("b1", start)).unwrap();
        store.save(&metadata("b3", start + Duration::hours(2))).unwrap();
        store.save(&metadata("b2", start + Duration::hours(1))).unwrap();

        let corrupt = BackupName::try_from("corrupt").unwrap();
        fs::write(store.directory.metadata_path(&corrupt), "{").unwrap();

        let names: Vec<String> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|metadata| metadata.name.to_string())
            .collect();
        assert_eq!(names, ["b3", "b2", "b1"]);
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let created_at = Utc::now();
        let mut backups = vec![
            metadata("first", created_at),
            metadata("newest", created_at + Duration::seconds(1)),
            metadata("second", created_at),
        ];

        sort_newest_first(&mut backups);

        let names: Vec<&str> = backups.iter().map(|metadata| metadata.name.as_str()).collect();
        assert_eq!(names, ["newest", "first", "second"]);
    }

    #[test]
    fn recover_from_archive() {
        let (_temp, store) = store();
        let name = BackupName::try_from("orphan").unwrap();
        let archive_path = store.directory.archive_path(&name);
        fs::write(&archive_path, vec![0u8; 300]).unwrap();

        let recovered = store.recover(name.clone(), &archive_path).unwrap();

        assert_eq!(recovered.name, name);
        assert_eq!(recovered.size, 300);
        assert_eq!(recovered.document_count, None);
    }

    #[test]
    fn relocate_rewrites_name() {
        let (_temp, store) = store();
        let saved = metadata("old", Utc::now());
        store.save(&saved).unwrap();

        let new = BackupName::try_from("new").unwrap();
        store.relocate(&saved.name, &new).unwrap();

        assert_eq!(store.load(&saved.name), None);
        let relocated = store.load(&new).unwrap();
        assert_eq!(relocated.name, new);
        assert_eq!(relocated.created_at, saved.created_at);
    }

    #[test]
    fn relocate_and_remove_tolerate_missing() {
        let (_temp, store) = store();
        let old = BackupName::try_from("old").unwrap();
        let new = BackupName::try_from("new").unwrap();

        store.relocate(&old, &new).unwrap();
        store.remove(&old).unwrap();
        assert_eq!(store.load(&new), None);
    }

    #[test]
    fn relocate_without_metadata_removes_stale_sidecar() {
        let (_temp, store) = store();
        let stale = metadata("new", Utc::now());
        store.save(&stale).unwrap();

        let old = BackupName::try_from("old").unwrap();
        store.relocate(&old, &stale.name).unwrap();

        assert!(!store.directory.metadata_path(&stale.name).exists());
    }

    #[test]
    fn failed_move_removes_temporary_file() {
        let (_temp, store) = store();
        let saved = metadata("blocked", Utc::now());

        // A non-empty directory cannot be replaced by the sidecar.
        let path = store.directory.metadata_path(&saved.name);
        fs::create_dir_all(path.join("inner")).unwrap();

        assert!(matches!(
            store.save(&saved),
            Err(SaveMetadataError::Io(_, "move metadata file into place"))
        ));
        assert!(!store.directory.temporary_metadata_path(&saved.name).exists());
    }
}
