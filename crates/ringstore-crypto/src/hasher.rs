use ringstore_types::ContentHash;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a value digest can never collide with a ring position
/// computed from the same bytes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for stored values (the update token).
    pub const VALUE: Self = Self {
        domain: "ringstore-value-v1",
    };
    /// Hasher for ring positions of keys and vnodes.
    pub const RING: Self = Self {
        domain: "ringstore-ring-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
