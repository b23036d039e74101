//! Stable mapping from logical cache keys to file names.

use sha2::{Digest, Sha256};

/// Length of the hex file name derived from a key.
pub const FILE_NAME_LEN: usize = 32;

/// File name for a logical key: the first 32 hex chars of its SHA-256.
///
/// Stable across processes and platforms.
pub fn file_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut name = hex::encode(digest);
    name.truncate(FILE_NAME_LEN);
    name
}

/// Validate a namespace used as a single directory component.
pub fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace != "."
        && namespace != ".."
        && !namespace.contains(&['/', '\\'][..])
}
