//! JSON document persistence
//!
//! Every persisted file (training log, index, personal bests, lung
//! capacity, record database) is one `JsonDocument<T>`:
//!
//! ```text
//! Write Path:
//!   lock → clone current state → mutate clone → write tmp → fsync → rename → swap
//!
//! Read Path:
//!   lock → clone Arc → unlock → read snapshot
//! ```
//!
//! The lock is held for the whole read-modify-write cycle, so concurrent
//! writers to the same document are serialized. Documents are independent
//! of each other and are locked independently. If the write fails the
//! visible state is left untouched.

use crate::storage::error::StorageResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Outcome of a mutation closure passed to [`JsonDocument::update`]
#[derive(Debug)]
pub enum Mutation<R> {
    /// Persist the mutated state and make it visible
    Commit(R),
    /// Throw the mutated copy away; nothing is written
    Discard(R),
}

/// A JSON file with an in-memory copy guarded by a per-document lock
#[derive(Debug)]
pub struct JsonDocument<T> {
    path: PathBuf,
    state: Mutex<Arc<T>>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Open a document, falling back to `default` if the file does not exist
    ///
    /// The default is not written until the first committed mutation.
    pub fn open(path: impl Into<PathBuf>, default: impl FnOnce() -> T) -> StorageResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            read_json(&path)?
        } else {
            default()
        };

        Ok(Self {
            path,
            state: Mutex::new(Arc::new(state)),
        })
    }

    /// Create a document from an explicit initial state
    pub fn with_state(path: impl Into<PathBuf>, state: T) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(Arc::new(state)),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cheap snapshot of the current state
    pub fn snapshot(&self) -> StorageResult<Arc<T>> {
        Ok(Arc::clone(&*self.state.lock()?))
    }

    /// Run a read-modify-write cycle under the document lock
    pub fn update<R>(
        &self,
        mutate: impl FnOnce(&mut T) -> StorageResult<Mutation<R>>,
    ) -> StorageResult<R> {
        let mut guard = self.state.lock()?;
        let mut next = T::clone(&guard);

        match mutate(&mut next)? {
            Mutation::Commit(result) => {
                write_json_atomic(&self.path, &next)?;
                *guard = Arc::new(next);
                Ok(result)
            }
            Mutation::Discard(result) => Ok(result),
        }
    }

    /// Replace the whole state and persist it
    pub fn replace(&self, state: T) -> StorageResult<()> {
        let mut guard = self.state.lock()?;
        write_json_atomic(&self.path, &state)?;
        *guard = Arc::new(state);
        Ok(())
    }

    /// Re-read the backing file, keeping the current state if it is missing
    pub fn reload(&self) -> StorageResult<()> {
        let mut guard = self.state.lock()?;
        if self.path.exists() {
            *guard = Arc::new(read_json(&self.path)?);
        }
        Ok(())
    }
}

/// Load a JSON value from a file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Write a JSON value so readers never observe a truncated file
///
/// The value goes to a sibling temp file which is flushed and synced
/// before being renamed over the target.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    let result = (|| -> StorageResult<()> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    tracing::debug!("Persisted {:?}", path);
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u32,
    }

    #[test]
    fn test_open_missing_uses_default_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let doc = JsonDocument::open(&path, Counter::default).unwrap();

        assert_eq!(doc.snapshot().unwrap().value, 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_commit_persists_and_discard_does_not() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let doc = JsonDocument::open(&path, Counter::default).unwrap();

        doc.update(|c| {
            c.value = 3;
            Ok(Mutation::Commit(()))
        })
        .unwrap();

        doc.update(|c| {
            c.value = 99;
            Ok(Mutation::Discard(()))
        })
        .unwrap();

        assert_eq!(doc.snapshot().unwrap().value, 3);
        let on_disk: Counter = read_json(&path).unwrap();
        assert_eq!(on_disk.value, 3);
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_failed_mutation_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        let doc = JsonDocument::open(dir.path().join("c.json"), Counter::default).unwrap();

        let result: StorageResult<()> = doc.update(|c| {
            c.value = 42;
            Err(crate::storage::StorageError::validation("nope"))
        });

        assert!(result.is_err());
        assert_eq!(doc.snapshot().unwrap().value, 0);
    }

    #[test]
    fn test_failed_write_leaves_state_untouched() {
        let dir = tempdir().unwrap();
        // A directory in place of the target makes the rename fail.
        let path = dir.path().join("blocked.json");
        std::fs::create_dir_all(path.join("inner")).unwrap();
        let doc = JsonDocument::with_state(&path, Counter { value: 1 });

        let result = doc.update(|c| {
            c.value = 2;
            Ok(Mutation::Commit(()))
        });

        assert!(result.is_err());
        assert_eq!(doc.snapshot().unwrap().value, 1);
    }

    #[test]
    fn test_reload_picks_up_external_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counter.json");
        let doc = JsonDocument::open(&path, Counter::default).unwrap();

        write_json_atomic(&path, &Counter { value: 7 }).unwrap();
        doc.reload().unwrap();

        assert_eq!(doc.snapshot().unwrap().value, 7);
    }
}
