use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// zstd level used for snapshot streams.
pub const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;

/// Outcome of [`VnodeStore::snapshot`](crate::VnodeStore::snapshot).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The store holds no data; nothing was written.
    Empty,
    /// A snapshot was written to the sink.
    Written { keys: usize, objects: usize },
}

impl SnapshotOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Serialized contents of one vnode: both namespaces as entry lists.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub keys: Vec<(Vec<u8>, Vec<u8>)>,
    pub objects: Vec<(Vec<u8>, Vec<u8>)>,
}

impl SnapshotData {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.objects.is_empty()
    }

    /// Total number of entries across both namespaces.
    pub fn len(&self) -> usize {
        self.keys.len() + self.objects.len()
    }

    /// Encode into `sink` through a zstd stream.
    ///
    /// Empty data is not written; the caller reports
    /// [`SnapshotOutcome::Empty`] instead.
    pub fn write_to(&self, sink: &mut dyn Write) -> StoreResult<SnapshotOutcome> {
        if self.is_empty() {
            return Ok(SnapshotOutcome::Empty);
        }
        let mut encoder = zstd::stream::write::Encoder::new(sink, SNAPSHOT_COMPRESSION_LEVEL)?;
        bincode::serialize_into(&mut encoder, self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        encoder.finish()?;
        Ok(SnapshotOutcome::Written {
            keys: self.keys.len(),
            objects: self.objects.len(),
        })
    }

    /// Decode a snapshot previously produced by [`SnapshotData::write_to`].
    pub fn read_from(source: &mut dyn Read) -> StoreResult<Self> {
        let decoder = zstd::stream::read::Decoder::new(source)?;
        bincode::deserialize_from(decoder).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotData {
        SnapshotData {
            keys: vec![(b"a".to_vec(), b"1".to_vec()), (b"b".to_vec(), b"2".to_vec())],
            objects: vec![(b"blob".to_vec(), vec![0u8; 4096])],
        }
    }

    #[test]
    fn empty_data_writes_nothing() {
        let mut sink = Vec::new();
        let outcome = SnapshotData::default().write_to(&mut sink).unwrap();
        assert_eq!(outcome, SnapshotOutcome::Empty);
        assert!(sink.is_empty());
    }

    #[test]
    fn write_then_read_reproduces_entries() {
        let data = sample();
        let mut sink = Vec::new();
        let outcome = data.write_to(&mut sink).unwrap();
        assert_eq!(outcome, SnapshotOutcome::Written { keys: 2, objects: 1 });

        let decoded = SnapshotData::read_from(&mut sink.as_slice()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn output_is_compressed() {
        let mut sink = Vec::new();
        sample().write_to(&mut sink).unwrap();
        assert!(sink.len() < 4096);
    }

    #[test]
    fn garbage_input_is_rejected() {
        let garbage = b"definitely not zstd".to_vec();
        assert!(SnapshotData::read_from(&mut garbage.as_slice()).is_err());
    }
}
