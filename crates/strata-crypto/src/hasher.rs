use strata_types::Key;

/// Domain-separated BLAKE3 content hasher.
///
/// The domain tag is fed to the hasher ahead of the payload, followed by a
/// `:` separator.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for every block written to a block store.
    pub const BLOCK: Self = Self {
        domain: "strata-block-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Key {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Key::from_hash(*hasher.finalize().as_bytes())
    }

    /// Check that `data` hashes to `expected`.
    pub fn verify(&self, data: &[u8], expected: &Key) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
