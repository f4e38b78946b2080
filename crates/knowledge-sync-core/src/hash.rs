//! Content hashing and chunk identity.
//!
//! Digests are SHA-256, hex-encoded. A chunk id is derived from the
//! document path and the chunk's content digest, never from its position:
//!
//! - the same text at two different paths gets two different ids,
//! - the same text reappearing at the same path gets the id it always had,
//! - any edit to the text at a fixed path yields a new id.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Namespace for chunk ids (UUID v5). Changing it re-keys every vector.
const CHUNK_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b6e_6f77_2d73_796e_632d_6368_756e_6b73);

/// Digest of a whole file's raw bytes.
pub fn file_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Digest of a single chunk's text.
pub fn chunk_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Stable chunk identifier for `digest` at `path`.
pub fn chunk_id(path: &str, digest: &str) -> String {
    let name = format!("{}\n{}", path, digest);
    Uuid::new_v5(&CHUNK_ID_NAMESPACE, name.as_bytes()).to_string()
}
