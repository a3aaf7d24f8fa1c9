//! Storage layer for the time ledger.
//!
//! The ledger lives in a single JSON document, `events.json`, inside the data
//! directory. A [`Store`] holds an exclusive advisory lock on `events.lock`
//! for as long as it is alive, so one invocation's load → mutate → persist
//! cycle never interleaves with another's.
//!
//! # Document format
//!
//! ```json
//! {
//!   "Aliases": {"<key>": {"Description": "...", "Tags": ["..."]}},
//!   "Interruption": null,
//!   "Records": {"<id>": {"StartTime": 1767225600, "EndTime": 1767229200, ...}},
//!   "Stopwatch": {"StartTime": 1767225600, ...},
//!   "Version": 42
//! }
//! ```
//!
//! Keys are sorted and timestamps are integer Unix seconds. `Version` grows by
//! one on every write; a persist whose loaded version no longer matches the
//! file fails instead of overwriting someone else's write.
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over `events.json`, so readers see either the old or the new image.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use litt_core::{AliasKey, Fields, Ledger, OpenInterval, RecordId, Stopwatch, TimeRecord};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

/// File name of the ledger document.
pub const LEDGER_FILE: &str = "events.json";

/// File name of the lock guarding the ledger document.
pub const LOCK_FILE: &str = "events.lock";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a file failed.
    #[error("i/o error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The ledger document is not valid JSON or has the wrong shape.
    #[error("invalid ledger document {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The ledger could not be encoded.
    #[error("failed to encode ledger")]
    Encode(#[source] serde_json::Error),
    /// The exclusive lock could not be taken.
    #[error("failed to lock {path}")]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The document changed on disk after it was loaded.
    #[error("ledger was modified concurrently (loaded version {expected}, found {found})")]
    PersistConflict { expected: u64, found: u64 },
    /// An interruption is stored without a primary interval.
    #[error("ledger document {path} has an interruption but no running stopwatch")]
    OrphanInterruption { path: PathBuf },
}

/// On-disk shape of the ledger document.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LedgerImage {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    stopwatch: Option<OpenInterval>,
    #[serde(default)]
    interruption: Option<OpenInterval>,
    #[serde(default)]
    aliases: BTreeMap<AliasKey, Fields>,
    #[serde(default)]
    records: BTreeMap<RecordId, TimeRecord>,
}

impl LedgerImage {
    fn from_ledger(ledger: &Ledger, version: u64) -> Self {
        let (primary, interruption) = ledger.stopwatch().parts();
        Self {
            version,
            stopwatch: primary.cloned(),
            interruption: interruption.cloned(),
            aliases: ledger.aliases().clone(),
            records: ledger.records().clone(),
        }
    }
}

/// A ledger together with the version it was loaded at.
#[derive(Debug)]
pub struct Loaded {
    pub ledger: Ledger,
    pub version: u64,
}

/// Locked handle on a data directory.
///
/// The lock is released when the store is dropped.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    _lock: File,
}

impl Store {
    /// Opens the data directory, creating it if necessary, and takes the lock.
    ///
    /// Blocks while another invocation holds the lock.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let lock_path = dir.join(LOCK_FILE);
        let lock = File::create(&lock_path).map_err(|source| StoreError::Io {
            path: lock_path.clone(),
            source,
        })?;
        lock.lock_exclusive().map_err(|source| StoreError::Lock {
            path: lock_path,
            source,
        })?;
        tracing::debug!(dir = %dir.display(), "locked data directory");

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock: lock,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.dir
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    /// Loads the ledger, writing an empty one first if none exists.
    pub fn load(&self) -> Result<Loaded, StoreError> {
        let path = self.ledger_path();
        let image = match self.read_image()? {
            Some(image) => image,
            None => {
                tracing::info!(path = %path.display(), "initializing empty ledger");
                let image = LedgerImage::default();
                self.write_image(&image)?;
                image
            }
        };

        let stopwatch = Stopwatch::from_parts(image.stopwatch, image.interruption)
            .ok_or(StoreError::OrphanInterruption { path })?;
        tracing::debug!(
            version = image.version,
            records = image.records.len(),
            aliases = image.aliases.len(),
            "loaded ledger"
        );
        Ok(Loaded {
            ledger: Ledger::from_parts(image.records, image.aliases, stopwatch),
            version: image.version,
        })
    }

    /// Writes the ledger if the document is still at `loaded_version`.
    ///
    /// Returns the new version.
    pub fn persist(&self, ledger: &Ledger, loaded_version: u64) -> Result<u64, StoreError> {
        let found = self.read_image()?.map_or(0, |image| image.version);
        if found != loaded_version {
            return Err(StoreError::PersistConflict {
                expected: loaded_version,
                found,
            });
        }

        let version = loaded_version + 1;
        self.write_image(&LedgerImage::from_ledger(ledger, version))?;
        tracing::debug!(version, "persisted ledger");
        Ok(version)
    }

    fn read_image(&self) -> Result<Option<LedgerImage>, StoreError> {
        let path = self.ledger_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    fn write_image(&self, image: &LedgerImage) -> Result<(), StoreError> {
        // Through `Value` so object keys come out sorted.
        let value = serde_json::to_value(image).map_err(StoreError::Encode)?;
        let mut text = serde_json::to_string_pretty(&value).map_err(StoreError::Encode)?;
        text.push('\n');
        write_atomically(&self.ledger_path(), text.as_bytes())
    }
}

/// Replaces `path` with `contents` via a temporary file in the same directory.
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}
