use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::MonosnapError;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// An algorithm-tagged content hash such as `sha256:e3b0c442...`.
///
/// The hex text is decoded once at parse time so rolling hashes can be chained over the raw bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    algorithm: String,
    bytes: Vec<u8>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Digest {
    /// Creates a digest from an algorithm name and the raw hash bytes.
    pub fn new(algorithm: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            algorithm: algorithm.into(),
            bytes: bytes.into(),
        }
    }

    /// Computes the `sha256` digest of `data`.
    pub fn sha256(data: impl AsRef<[u8]>) -> Self {
        Self::new("sha256", Sha256::digest(data.as_ref()).to_vec())
    }

    /// Chains `next` onto `self`: `sha256(self.bytes ++ next.bytes)`.
    pub fn chain(&self, next: &Digest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hasher.update(&next.bytes);
        Self::new("sha256", hasher.finalize().to_vec())
    }

    /// The digest algorithm, e.g. `sha256`.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// The raw hash bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The lowercase hex encoding of the hash bytes.
    pub fn hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// The first `len` hex characters of the hash, handy for log lines.
    pub fn short(&self, len: usize) -> String {
        let mut hex = self.hex();
        hex.truncate(len);
        hex
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for Digest {
    type Err = MonosnapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| MonosnapError::InvalidDigest {
            digest: s.to_string(),
            reason: reason.to_string(),
        };

        let (algorithm, hash) = s.split_once(':').ok_or_else(|| invalid("missing ':'"))?;
        if algorithm.is_empty() {
            return Err(invalid("empty algorithm"));
        }

        if hash.is_empty() {
            return Err(invalid("empty hash"));
        }

        if hash.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid("hash must be lowercase hex"));
        }

        let bytes = hex::decode(hash).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self::new(algorithm, bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

impl Serialize for Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
