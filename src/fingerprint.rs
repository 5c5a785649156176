//! Content fingerprints for change detection and archive identity.
//!
//! A fingerprint is the first [`FINGERPRINT_LEN`] hex characters of the
//! SHA-256 digest of a file's bytes. It is **content-addressed**: two files
//! with identical bytes share a fingerprint regardless of name or location,
//! and renaming a file never changes it.
//!
//! Collision resistance is not a goal here. The digest only has to be stable
//! across runs and machines, so eight characters are plenty for telling one
//! build of `index.html` from the next.
//!
//! Files are streamed in 64 KiB blocks, so memory use stays flat no
//! matter how large a font or image in the build output is.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 8;

const CHUNK_SIZE: usize = 64 * 1024;

/// Fingerprint a file's contents.
///
/// Fails if the file cannot be opened or a read fails midway.
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(truncate(format!("{:x}", hasher.finalize())))
}

/// Fingerprint bytes already held in memory.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    truncate(format!("{:x}", Sha256::digest(bytes)))
}

fn truncate(mut hex: String) -> String {
    hex.truncate(FINGERPRINT_LEN);
    hex
}
