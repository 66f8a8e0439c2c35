//! Content fingerprints used as cache keys

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use log::debug;

use crate::error::FingerprintError;

/// Read size used when no explicit chunk size is configured
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Lowercase hex MD5 of a file's full byte content.
///
/// Two files with identical bytes share a fingerprint regardless of their
/// path or name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of an in-memory byte slice
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(format!("{:x}", md5::compute(bytes)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fingerprint a file, streaming it in [`DEFAULT_CHUNK_SIZE`] reads
pub fn fingerprint(path: &Path) -> Result<Fingerprint, FingerprintError> {
    fingerprint_with_chunk_size(path, DEFAULT_CHUNK_SIZE)
}

/// Fingerprint a file reading at most `chunk_size` bytes at a time.
///
/// The whole file is never held in memory. Any open or read failure aborts
/// the hash; no partial fingerprint is returned.
pub fn fingerprint_with_chunk_size(
    path: &Path,
    chunk_size: usize,
) -> Result<Fingerprint, FingerprintError> {
    let wrap = |source| FingerprintError {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(wrap)?;
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let read = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(wrap(e)),
        };
        context.consume(&buf[..read]);
        total += read as u64;
    }

    let fp = Fingerprint(format!("{:x}", context.compute()));
    debug!("Fingerprinted {path:?} ({total} bytes): {fp}");
    Ok(fp)
}
