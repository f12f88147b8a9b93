//! Entropy source for seed generation.
//!
//! # Security
//!
//! Weak or absent entropy must never degrade into a predictable seed.
//! A source that cannot deliver the requested bytes terminates the
//! process rather than returning short or zeroed output.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process;

use log::error;

/// Supplier of cryptographically strong random bytes.
///
/// `fill` either fills the whole buffer or does not return.
pub trait EntropySource {
    fn fill(&mut self, buf: &mut [u8]);
}

/// Entropy from a character device, `/dev/urandom` by default.
pub struct DevRandom {
    file: File,
    path: PathBuf,
}

impl DevRandom {
    /// Opens the device; failure here is a setup error the caller
    /// reports before exiting.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self {
            file: File::open(path)?,
            path: path.to_path_buf(),
        })
    }
}

impl EntropySource for DevRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => {
                    error!("entropy source {} reached EOF", self.path.display());
                    process::exit(1);
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("entropy source {} failed: {e}", self.path.display());
                    process::exit(1);
                }
            }
        }
    }
}
