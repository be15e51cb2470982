use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use ringstore_crypto::ContentHasher;
use ringstore_types::{ContentHash, VnodeRef};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::display_key;
use crate::error::{StoreError, StoreResult};
use crate::snapshot::{SnapshotData, SnapshotOutcome};
use crate::traits::{VnodeStore, VnodeStoreFactory};

const KV_DIR: &str = "kv";
const OBJECT_DIR: &str = "obj";
const ENTRY_SUFFIX: &str = ".bin";

/// Names entry files; keys are arbitrary bytes of any length.
const ENTRY_NAMER: ContentHasher = ContentHasher::new("ringstore-entry-name-v1");

/// On-disk form of one entry, bincode encoded.
#[derive(Serialize)]
struct EntryRef<'a> {
    key: &'a [u8],
    data: &'a [u8],
}

#[derive(Deserialize)]
struct Entry {
    key: Vec<u8>,
    data: Vec<u8>,
}

/// Durable vnode store backed by one directory.
///
/// On-disk layout:
/// ```text
/// <root>/kv/<hex digest of key>.bin    key/value entries
/// <root>/obj/<hex digest of key>.bin   objects
/// ```
///
/// Each file holds the raw key next to the data, so snapshots can list a
/// namespace without a separate index.
///
/// Every write goes to a temporary file in the target directory and is
/// renamed into place, so readers never observe a partially written entry.
pub struct FileVnodeStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FileVnodeStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(KV_DIR))?;
        fs::create_dir_all(root.join(OBJECT_DIR))?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    /// The directory holding this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn entry_path(&self, dir: &str, key: &[u8]) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}{ENTRY_SUFFIX}", ENTRY_NAMER.hash(key).to_hex()))
    }

    fn decode_entry(path: &Path, raw: &[u8]) -> StoreResult<Entry> {
        bincode::deserialize(raw).map_err(|e| StoreError::CorruptEntry {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn read_entry(&self, dir: &str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let path = self.entry_path(dir, key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry = Self::decode_entry(&path, &raw)?;
        if entry.key != key {
            return Err(StoreError::CorruptEntry {
                path: path.display().to_string(),
                reason: format!("holds key {}", display_key(&entry.key)),
            });
        }
        Ok(Some(entry.data))
    }

    fn write_entry(&self, dir: &str, key: &[u8], data: &[u8]) -> StoreResult<()> {
        let encoded = bincode::serialize(&EntryRef { key, data })
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(self.root.join(dir))?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_data()?;
        tmp.persist(self.entry_path(dir, key))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn remove_entry(&self, dir: &str, key: &[u8]) -> StoreResult<()> {
        match fs::remove_file(self.entry_path(dir, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// All entries of one namespace. Temporary files are skipped.
    fn list_entries(&self, dir: &str) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries = Vec::new();
        for dirent in fs::read_dir(self.root.join(dir))? {
            let path = dirent?.path();
            let is_entry = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ENTRY_SUFFIX));
            if !is_entry {
                continue;
            }
            let entry = Self::decode_entry(&path, &fs::read(&path)?)?;
            entries.push((entry.key, entry.data));
        }
        Ok(entries)
    }
}

impl VnodeStore for FileVnodeStore {
    fn get_key(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        let _guard = self.lock()?;
        self.read_entry(KV_DIR, key)?
            .ok_or_else(|| StoreError::KeyNotFound(display_key(key)))
    }

    fn put_key(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let _guard = self.lock()?;
        self.write_entry(KV_DIR, key, value)
    }

    fn update_key(&self, prev_hash: &ContentHash, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let _guard = self.lock()?;
        let current = self
            .read_entry(KV_DIR, key)?
            .ok_or_else(|| StoreError::KeyNotFound(display_key(key)))?;
        let current_hash = ContentHasher::VALUE.hash(&current);
        if current_hash != *prev_hash {
            return Err(StoreError::HashMismatch {
                key: display_key(key),
                expected: *prev_hash,
                current: current_hash,
            });
        }
        self.write_entry(KV_DIR, key, value)
    }

    fn remove_key(&self, key: &[u8]) -> StoreResult<()> {
        let _guard = self.lock()?;
        self.remove_entry(KV_DIR, key)
    }

    fn get_object(&self, key: &[u8]) -> StoreResult<Bytes> {
        let _guard = self.lock()?;
        self.read_entry(OBJECT_DIR, key)?
            .map(Bytes::from)
            .ok_or_else(|| StoreError::ObjectNotFound(display_key(key)))
    }

    fn put_object(&self, key: &[u8], data: &[u8]) -> StoreResult<()> {
        let _guard = self.lock()?;
        self.write_entry(OBJECT_DIR, key, data)
    }

    fn remove_object(&self, key: &[u8]) -> StoreResult<()> {
        let _guard = self.lock()?;
        self.remove_entry(OBJECT_DIR, key)
    }

    fn snapshot(&self, sink: &mut dyn Write) -> StoreResult<SnapshotOutcome> {
        let data = {
            let _guard = self.lock()?;
            SnapshotData {
                keys: self.list_entries(KV_DIR)?,
                objects: self.list_entries(OBJECT_DIR)?,
            }
        };
        data.write_to(sink)
    }

    fn restore(&self, source: &mut dyn Read) -> StoreResult<usize> {
        let data = SnapshotData::read_from(source)?;
        let merged = data.len();
        let _guard = self.lock()?;
        for (key, value) in &data.keys {
            self.write_entry(KV_DIR, key, value)?;
        }
        for (key, object) in &data.objects {
            self.write_entry(OBJECT_DIR, key, object)?;
        }
        debug!(root = %self.root.display(), merged, "restored snapshot");
        Ok(merged)
    }
}

impl std::fmt::Debug for FileVnodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileVnodeStore")
            .field("root", &self.root)
            .finish()
    }
}

/// Opens a [`FileVnodeStore`] per vnode under `<root>/<vnode hex id>/`.
#[derive(Clone, Debug)]
pub struct FileStoreFactory {
    root: PathBuf,
}

impl FileStoreFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl VnodeStoreFactory for FileStoreFactory {
    fn open(&self, vnode: &VnodeRef) -> StoreResult<Arc<dyn VnodeStore>> {
        let store = FileVnodeStore::open(self.root.join(vnode.string_id()))?;
        Ok(Arc::new(store))
    }
}
