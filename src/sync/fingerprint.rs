//! Content fingerprints.

use sha2::{Digest, Sha256};

/// SHA-256 of `content`, lowercase hex. The only authority on whether a
/// file changed; timestamps are never consulted.
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
