//! JSON-backed idea record store
//!
//! Holds the full ordered collection of idea records in memory and
//! rewrites the backing file after every mutation. Mutations only
//! return success once the file is durably written, so the in-memory
//! and on-disk views never diverge in a way the user could observe
//! across a restart.

use crate::error::StoreError;
use crate::record::{IdeaRecord, RecordId, RecordPatch};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub(crate) struct RecordStore {
    path: PathBuf,
    records: Vec<IdeaRecord>,
}

impl RecordStore {
    /// Open the store at `path`.
    ///
    /// A missing file is an empty store. A corrupt file is logged and
    /// treated as empty rather than failing startup; the bad contents
    /// are overwritten on the next mutation.
    pub(crate) fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match load_records(&path) {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to load idea store, starting empty: {}", e);
                Vec::new()
            }
        };
        info!(count = records.len(), path = %path.display(), "Opened idea store");
        Self { path, records }
    }

    /// Add a new record at the end and persist. Returns the record's
    /// identity once the write has been acknowledged by the filesystem.
    pub(crate) fn append(&mut self, record: IdeaRecord) -> Result<RecordId, StoreError> {
        let id = record.id;
        self.records.push(record);
        if let Err(e) = self.persist() {
            self.records.pop();
            return Err(e);
        }
        Ok(id)
    }

    /// Merge the patch's populated fields into the record with `id` and
    /// persist. Transcript, timestamp, and identity never change.
    pub(crate) fn update(&mut self, id: RecordId, patch: RecordPatch) -> Result<(), StoreError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let previous = self.records[index].clone();

        let record = &mut self.records[index];
        if let Some(notes) = patch.notes {
            record.notes = notes;
        }
        if let Some(resources) = patch.resources {
            record.resources = resources;
        }
        if let Some(response) = patch.response {
            record.response = response;
        }

        if let Err(e) = self.persist() {
            self.records[index] = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Remove the record with `id` and persist. Other records keep
    /// their identities and order.
    pub(crate) fn delete(&mut self, id: RecordId) -> Result<(), StoreError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let removed = self.records.remove(index);
        if let Err(e) = self.persist() {
            self.records.insert(index, removed);
            return Err(e);
        }
        Ok(())
    }

    pub(crate) fn get(&self, id: RecordId) -> Option<&IdeaRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Records in display order, most recent first. The underlying
    /// storage order stays oldest-first for identity stability.
    pub(crate) fn list(&self) -> impl Iterator<Item = &IdeaRecord> + '_ {
        self.records.iter().rev()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rewrite the whole store file and fsync before returning.
    ///
    /// The new contents go to a sibling temp file first and are renamed
    /// over the store, so a crash mid-write cannot truncate the
    /// existing records.
    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(&self.records)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let write_err = |e: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source: e,
        };

        let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        Ok(())
    }
}

/// Load all records from `path`. A missing file yields an empty list;
/// unparseable contents yield `StoreError::Corrupt`.
fn load_records(path: &Path) -> Result<Vec<IdeaRecord>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path).map_err(|e| StoreError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })
}
