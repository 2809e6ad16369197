//! Short content fingerprint for checkpoint artifacts
//!
//! Hashes a fixed window instead of the whole file so large artifacts are identified
//! in constant time. The window starts past the header region where most formats keep
//! near-identical metadata.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Byte offset where the hashed window begins (1 MiB).
pub const FINGERPRINT_OFFSET: u64 = 0x10_0000;
/// Maximum window length in bytes (64 KiB).
pub const FINGERPRINT_WINDOW: u64 = 0x1_0000;
/// Sentinel returned when the artifact cannot be opened.
pub const NO_FILE: &str = "NOFILE";

const FINGERPRINT_LEN: usize = 8;

/// Eight lowercase hex characters identifying `path`'s content, or [`NO_FILE`].
///
/// Files no longer than [`FINGERPRINT_OFFSET`] hash an empty window, so they all
/// share `e3b0c442`.
pub fn fingerprint(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    match hash_window(path) {
        Ok(hex) => hex,
        Err(e) => {
            debug!("Cannot fingerprint {}: {}", path.display(), e);
            NO_FILE.to_string()
        }
    }
}

fn hash_window(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(FINGERPRINT_OFFSET))?;

    let mut window = Vec::with_capacity(FINGERPRINT_WINDOW as usize);
    file.take(FINGERPRINT_WINDOW).read_to_end(&mut window)?;

    let mut hasher = Sha256::new();
    hasher.update(&window);
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    Ok(hex)
}
