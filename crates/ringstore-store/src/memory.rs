use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use ringstore_crypto::ContentHasher;
use ringstore_types::{ContentHash, VnodeRef};

use crate::display_key;
use crate::error::{StoreError, StoreResult};
use crate::snapshot::{SnapshotData, SnapshotOutcome};
use crate::traits::{VnodeStore, VnodeStoreFactory};

#[derive(Default)]
struct Namespaces {
    keys: HashMap<Vec<u8>, Vec<u8>>,
    objects: HashMap<Vec<u8>, Bytes>,
}

/// In-memory, HashMap-based vnode store.
///
/// The reference backend. Both namespaces live behind one `Mutex`; values
/// are cloned on read and write. Snapshot encoding and restore decoding
/// happen outside the lock.
pub struct InMemoryVnodeStore {
    inner: Mutex<Namespaces>,
}

impl InMemoryVnodeStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Namespaces::default()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Namespaces>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Number of key/value entries.
    pub fn key_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.keys.len())
    }

    /// Number of objects.
    pub fn object_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.objects.len())
    }
}

impl Default for InMemoryVnodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VnodeStore for InMemoryVnodeStore {
    fn get_key(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        let ns = self.lock()?;
        ns.keys
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(display_key(key)))
    }

    fn put_key(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut ns = self.lock()?;
        ns.keys.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn update_key(&self, prev_hash: &ContentHash, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut ns = self.lock()?;
        let current = ns
            .keys
            .get_mut(key)
            .ok_or_else(|| StoreError::KeyNotFound(display_key(key)))?;
        let current_hash = ContentHasher::VALUE.hash(current);
        if current_hash != *prev_hash {
            return Err(StoreError::HashMismatch {
                key: display_key(key),
                expected: *prev_hash,
                current: current_hash,
            });
        }
        *current = value.to_vec();
        Ok(())
    }

    fn remove_key(&self, key: &[u8]) -> StoreResult<()> {
        let mut ns = self.lock()?;
        ns.keys.remove(key);
        Ok(())
    }

    fn get_object(&self, key: &[u8]) -> StoreResult<Bytes> {
        let ns = self.lock()?;
        ns.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound(display_key(key)))
    }

    fn put_object(&self, key: &[u8], data: &[u8]) -> StoreResult<()> {
        let mut ns = self.lock()?;
        ns.objects.insert(key.to_vec(), Bytes::copy_from_slice(data));
        Ok(())
    }

    fn remove_object(&self, key: &[u8]) -> StoreResult<()> {
        let mut ns = self.lock()?;
        ns.objects.remove(key);
        Ok(())
    }

    fn snapshot(&self, sink: &mut dyn Write) -> StoreResult<SnapshotOutcome> {
        let data = {
            let ns = self.lock()?;
            SnapshotData {
                keys: ns
                    .keys
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                objects: ns
                    .objects
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_vec()))
                    .collect(),
            }
        };
        data.write_to(sink)
    }

    fn restore(&self, source: &mut dyn Read) -> StoreResult<usize> {
        let data = SnapshotData::read_from(source)?;
        let merged = data.len();
        let mut ns = self.lock()?;
        ns.keys.extend(data.keys);
        ns.objects.extend(
            data.objects
                .into_iter()
                .map(|(k, v)| (k, Bytes::from(v))),
        );
        Ok(merged)
    }
}

impl std::fmt::Debug for InMemoryVnodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("InMemoryVnodeStore");
        if let Ok(ns) = self.inner.lock() {
            s.field("key_count", &ns.keys.len())
                .field("object_count", &ns.objects.len());
        }
        s.finish()
    }
}

/// Opens a fresh [`InMemoryVnodeStore`] for every vnode.
#[derive(Clone, Copy, Debug, Default)]
pub struct InMemoryStoreFactory;

impl VnodeStoreFactory for InMemoryStoreFactory {
    fn open(&self, _vnode: &VnodeRef) -> StoreResult<Arc<dyn VnodeStore>> {
        Ok(Arc::new(InMemoryVnodeStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hash(value: &[u8]) -> ContentHash {
        ContentHasher::VALUE.hash(value)
    }

    // -----------------------------------------------------------------------
    // Key/value namespace
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get() {
        let store = InMemoryVnodeStore::new();
        store.put_key(b"k", b"v").unwrap();
        assert_eq!(store.get_key(b"k").unwrap(), b"v");
    }

    #[test]
    fn get_missing_key_is_not_found() {
        let store = InMemoryVnodeStore::new();
        assert!(matches!(
            store.get_key(b"missing"),
            Err(StoreError::KeyNotFound(k)) if k == "missing"
        ));
    }

    #[test]
    fn update_with_current_hash_succeeds() {
        let store = InMemoryVnodeStore::new();
        store.put_key(b"k", b"value").unwrap();
        store.update_key(&hash(b"value"), b"k", b"newValue").unwrap();
        assert_eq!(store.get_key(b"k").unwrap(), b"newValue");
    }

    #[test]
    fn update_with_stale_hash_leaves_value() {
        let store = InMemoryVnodeStore::new();
        store.put_key(b"k", b"value").unwrap();
        store.update_key(&hash(b"value"), b"k", b"newValue").unwrap();

        let err = store
            .update_key(&hash(b"value"), b"k", b"third")
            .unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
        assert_eq!(store.get_key(b"k").unwrap(), b"newValue");
    }

    #[test]
    fn update_missing_key_is_not_found() {
        let store = InMemoryVnodeStore::new();
        let err = store.update_key(&hash(b""), b"nope", b"v").unwrap_err();
        assert!(matches!(err, StoreError::KeyNotFound(_)));
    }

    #[test]
    fn remove_is_idempotent() {
        let store = InMemoryVnodeStore::new();
        store.put_key(b"k", b"v").unwrap();
        store.remove_key(b"k").unwrap();
        store.remove_key(b"k").unwrap();
        assert!(store.get_key(b"k").is_err());
    }

    // -----------------------------------------------------------------------
    // Object namespace
    // -----------------------------------------------------------------------

    #[test]
    fn objects_are_separate_from_keys() {
        let store = InMemoryVnodeStore::new();
        store.put_key(b"same", b"kv").unwrap();
        store.put_object(b"same", b"blob").unwrap();

        assert_eq!(store.get_key(b"same").unwrap(), b"kv");
        assert_eq!(store.get_object(b"same").unwrap(), Bytes::from_static(b"blob"));

        store.remove_object(b"same").unwrap();
        assert!(matches!(
            store.get_object(b"same"),
            Err(StoreError::ObjectNotFound(_))
        ));
        assert_eq!(store.get_key(b"same").unwrap(), b"kv");
    }

    // -----------------------------------------------------------------------
    // Snapshot / restore
    // -----------------------------------------------------------------------

    #[test]
    fn empty_snapshot_writes_zero_bytes() {
        let store = InMemoryVnodeStore::new();
        let mut sink = Vec::new();
        assert_eq!(store.snapshot(&mut sink).unwrap(), SnapshotOutcome::Empty);
        assert!(sink.is_empty());
    }

    #[test]
    fn snapshot_restore_reproduces_both_namespaces() {
        let source = InMemoryVnodeStore::new();
        source.put_key(b"a", b"1").unwrap();
        source.put_key(b"b", b"2").unwrap();
        source.put_object(b"blob", &[9u8; 1024]).unwrap();

        let mut buf = Vec::new();
        let outcome = source.snapshot(&mut buf).unwrap();
        assert_eq!(outcome, SnapshotOutcome::Written { keys: 2, objects: 1 });

        let target = InMemoryVnodeStore::new();
        assert_eq!(target.restore(&mut buf.as_slice()).unwrap(), 3);
        assert_eq!(target.get_key(b"a").unwrap(), b"1");
        assert_eq!(target.get_key(b"b").unwrap(), b"2");
        assert_eq!(target.get_object(b"blob").unwrap().len(), 1024);
    }

    #[test]
    fn restore_merges_and_incoming_wins() {
        let source = InMemoryVnodeStore::new();
        source.put_key(b"shared", b"incoming").unwrap();
        let mut buf = Vec::new();
        source.snapshot(&mut buf).unwrap();

        let target = InMemoryVnodeStore::new();
        target.put_key(b"shared", b"local").unwrap();
        target.put_key(b"untouched", b"keep").unwrap();
        target.restore(&mut buf.as_slice()).unwrap();

        assert_eq!(target.get_key(b"shared").unwrap(), b"incoming");
        assert_eq!(target.get_key(b"untouched").unwrap(), b"keep");
        assert_eq!(target.key_count().unwrap(), 2);
    }

    #[test]
    fn restore_rejects_corrupt_input() {
        let store = InMemoryVnodeStore::new();
        let err = store.restore(&mut &b"junk"[..]).unwrap_err();
        assert!(matches!(err, StoreError::Io(_) | StoreError::Serialization(_)));
    }

    #[test]
    fn factory_opens_isolated_stores() {
        let factory = InMemoryStoreFactory;
        let a = factory.open(&VnodeRef::new(vec![1], "h")).unwrap();
        let b = factory.open(&VnodeRef::new(vec![2], "h")).unwrap();
        a.put_key(b"k", b"v").unwrap();
        assert!(b.get_key(b"k").is_err());
    }

    proptest! {
        #[test]
        fn stale_hash_never_overwrites(
            original in proptest::collection::vec(any::<u8>(), 0..64),
            replacement in proptest::collection::vec(any::<u8>(), 0..64),
            stale in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            prop_assume!(stale != original);
            let store = InMemoryVnodeStore::new();
            store.put_key(b"k", &original).unwrap();
            let result = store.update_key(&hash(&stale), b"k", &replacement);
            let is_mismatch = matches!(result, Err(StoreError::HashMismatch { .. }));
            prop_assert!(is_mismatch);
            prop_assert_eq!(store.get_key(b"k").unwrap(), original);
        }
    }
}
