use async_trait::async_trait;
use ringstore_crypto::ContentHasher;
use ringstore_types::VnodeRef;

use crate::error::RingError;

/// The consistent-hash ring as seen by the replication core.
///
/// `lookup` returns the `n` vnodes responsible for `key`, in ring order.
/// The core never caches the answer; every operation resolves again.
#[async_trait]
pub trait Ring: Send + Sync {
    async fn lookup(&self, n: usize, key: &[u8]) -> Result<Vec<VnodeRef>, RingError>;
}

/// Ring with fixed membership.
///
/// Each host contributes `vnodes_per_host` positions derived from a hash
/// of the host address and the vnode index, so every member computes the
/// same ring from the same member list.
#[derive(Clone, Debug)]
pub struct StaticRing {
    vnodes: Vec<VnodeRef>,
}

impl StaticRing {
    pub fn new<S: AsRef<str>>(hosts: &[S], vnodes_per_host: usize) -> Self {
        let vnodes = hosts
            .iter()
            .flat_map(|host| {
                let host = host.as_ref();
                (0..vnodes_per_host).map(move |index| Self::vnode_for(host, index))
            })
            .collect();
        Self::from_vnodes(vnodes)
    }

    /// Build a ring from explicit positions.
    pub fn from_vnodes(mut vnodes: Vec<VnodeRef>) -> Self {
        vnodes.sort_by(|a, b| a.id.cmp(&b.id));
        vnodes.dedup_by(|a, b| a.id == b.id);
        Self { vnodes }
    }

    /// The position a host's `index`-th vnode takes on the ring.
    pub fn vnode_for(host: &str, index: usize) -> VnodeRef {
        let seed = format!("{host}#{index}");
        let id = ContentHasher::RING.hash(seed.as_bytes());
        VnodeRef::new(id.as_bytes().to_vec(), host)
    }

    /// All vnodes in ring order.
    pub fn vnodes(&self) -> &[VnodeRef] {
        &self.vnodes
    }

    /// The vnodes owned by `host`, in ring order.
    pub fn vnodes_of(&self, host: &str) -> Vec<VnodeRef> {
        self.vnodes
            .iter()
            .filter(|vn| vn.host == host)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.vnodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vnodes.is_empty()
    }

    /// Index of the first vnode at or after `position`, wrapping around.
    fn successor_index(&self, position: &[u8]) -> usize {
        let idx = self
            .vnodes
            .partition_point(|vn| vn.id.as_slice() < position);
        if idx == self.vnodes.len() {
            0
        } else {
            idx
        }
    }

    /// The vnode immediately before `vnode` on the ring.
    pub fn predecessor(&self, vnode: &VnodeRef) -> Option<&VnodeRef> {
        let idx = self.vnodes.iter().position(|vn| vn.id == vnode.id)?;
        let prev = (idx + self.vnodes.len() - 1) % self.vnodes.len();
        self.vnodes.get(prev)
    }

    /// The vnode immediately after `vnode` on the ring.
    pub fn successor(&self, vnode: &VnodeRef) -> Option<&VnodeRef> {
        let idx = self.vnodes.iter().position(|vn| vn.id == vnode.id)?;
        self.vnodes.get((idx + 1) % self.vnodes.len())
    }

    pub fn replicas(&self, n: usize, key: &[u8]) -> Result<Vec<VnodeRef>, RingError> {
        if self.vnodes.is_empty() {
            return Err(RingError::Empty);
        }
        if n == 0 {
            return Err(RingError::ZeroReplicas);
        }
        if n > self.vnodes.len() {
            return Err(RingError::NotEnoughVnodes {
                requested: n,
                available: self.vnodes.len(),
            });
        }
        let position = ContentHasher::RING.hash(key);
        let start = self.successor_index(position.as_bytes());
        Ok((0..n)
            .map(|offset| self.vnodes[(start + offset) % self.vnodes.len()].clone())
            .collect())
    }
}

#[async_trait]
impl Ring for StaticRing {
    async fn lookup(&self, n: usize, key: &[u8]) -> Result<Vec<VnodeRef>, RingError> {
        self.replicas(n, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring() -> StaticRing {
        StaticRing::new(&["10.0.0.1:7000", "10.0.0.2:7000"], 4)
    }

    #[test]
    fn vnodes_are_sorted_and_complete() {
        let ring = ring();
        assert_eq!(ring.len(), 8);
        assert!(ring.vnodes().windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(ring.vnodes_of("10.0.0.1:7000").len(), 4);
    }

    #[test]
    fn membership_is_deterministic() {
        let a = ring();
        let b = StaticRing::new(&["10.0.0.2:7000", "10.0.0.1:7000"], 4);
        assert_eq!(a.vnodes(), b.vnodes());
    }

    #[test]
    fn replicas_are_consecutive_successors() {
        let ring = ring();
        let replicas = ring.replicas(3, b"mytestkey").unwrap();
        assert_eq!(replicas.len(), 3);
        assert_eq!(ring.successor(&replicas[0]), Some(&replicas[1]));
        assert_eq!(ring.successor(&replicas[1]), Some(&replicas[2]));
        assert_eq!(ring.predecessor(&replicas[1]), Some(&replicas[0]));
    }

    #[test]
    fn lookup_is_stable() {
        let ring = ring();
        assert_eq!(
            ring.replicas(2, b"key").unwrap(),
            ring.replicas(2, b"key").unwrap()
        );
    }

    #[test]
    fn whole_ring_can_be_requested() {
        let ring = ring();
        let all = ring.replicas(8, b"k").unwrap();
        let mut ids: Vec<_> = all.iter().map(|v| v.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn too_many_replicas_is_an_error() {
        assert_eq!(
            ring().replicas(9, b"k"),
            Err(RingError::NotEnoughVnodes {
                requested: 9,
                available: 8
            })
        );
    }

    #[test]
    fn zero_replicas_and_empty_ring_are_errors() {
        assert_eq!(ring().replicas(0, b"k"), Err(RingError::ZeroReplicas));
        let empty = StaticRing::from_vnodes(Vec::new());
        assert_eq!(empty.replicas(1, b"k"), Err(RingError::Empty));
    }

    #[test]
    fn wraps_past_the_last_position() {
        let ring = StaticRing::from_vnodes(vec![
            VnodeRef::new(vec![0x10], "a"),
            VnodeRef::new(vec![0x80], "b"),
        ]);
        assert_eq!(ring.successor_index(&[0xff]), 0);
        assert_eq!(ring.successor_index(&[0x11]), 1);
        assert_eq!(ring.successor_index(&[0x10]), 0);
    }

    #[tokio::test]
    async fn trait_lookup_matches_replicas() {
        let ring = ring();
        let via_trait = Ring::lookup(&ring, 2, b"abc").await.unwrap();
        assert_eq!(via_trait, ring.replicas(2, b"abc").unwrap());
    }
}
