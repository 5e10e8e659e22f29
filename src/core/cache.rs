// src/core/cache.rs

use log::trace;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// Accumulates the identity of an alias search path: the configured locations
/// plus the modification time and size of every alias file found on it.
///
/// Content is never read; a changed timestamp or size is enough to invalidate
/// the definitions cached in a resolver context.
#[derive(Debug)]
pub struct Fingerprint {
    hasher: blake3::Hasher,
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprint {
    pub fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
        }
    }

    /// Feeds a search location, whether or not it exists.
    pub fn add_location(&mut self, location: &Path) {
        self.hasher.update(b"L");
        self.hasher.update(location.to_string_lossy().as_bytes());
        self.hasher.update(&[0]);
    }

    /// Feeds one alias file together with its validation metadata.
    pub fn add_file(&mut self, path: &Path) {
        self.hasher.update(b"F");
        self.hasher.update(path.to_string_lossy().as_bytes());
        self.hasher.update(&[0]);

        match fs::metadata(path) {
            Ok(metadata) => {
                let modified = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_nanos())
                    .unwrap_or_default();
                self.hasher.update(&modified.to_le_bytes());
                self.hasher.update(&metadata.len().to_le_bytes());
            }
            Err(e) => {
                trace!("No metadata for '{}': {}", path.display(), e);
                self.hasher.update(b"missing");
            }
        }
    }

    /// Finishes the fingerprint as a short hex string.
    pub fn finish(&self) -> String {
        let hash = self.hasher.finalize();
        hex::encode(hash.as_bytes().get(..HASH_TRUNCATE_LENGTH).unwrap_or(hash.as_bytes()))
    }
}

/// Modification time of a file, used in log output when a cache is invalidated.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
