//! MD5 content addresses

use md5::{Digest, Md5};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit MD5 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Md5Digest([u8; 16]);

impl Md5Digest {
    /// Digest of an in-memory buffer
    pub fn of(bytes: &[u8]) -> Self {
        Self(Md5::digest(bytes).into())
    }

    /// Digest of a file, streamed from disk
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut hasher = Md5::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Self(hasher.finalize().into()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "md5:{}", self.to_hex())
    }
}

/// Error parsing a textual digest
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not a 32-digit hex md5 digest: '{0}'")]
pub struct DigestParseError(pub String);

impl FromStr for Md5Digest {
    type Err = DigestParseError;

    /// Accepts `"<32 hex digits>"` with an optional `md5:` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s.trim().strip_prefix("md5:").unwrap_or(s.trim());
        let mut out = [0u8; 16];
        hex::decode_to_slice(hex_part, &mut out).map_err(|_| DigestParseError(s.to_string()))?;
        Ok(Self(out))
    }
}
