//! Content hashing for cached images.

use sha2::{Digest, Sha256};

/// Compute the entity tag for an image payload.
///
/// This is the lowercase hex SHA-256 of the bytes, unquoted. Callers add the
/// quotes when writing the `ETag` header.
pub fn content_etag(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
