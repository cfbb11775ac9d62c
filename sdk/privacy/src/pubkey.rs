use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::field::hash_and_truncate;

/// 32-byte ledger address (mints, verifiers, merkle tree accounts, recipients).
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    /// The native asset is identified by the all-zero address.
    pub const NATIVE: Pubkey = Pubkey([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn is_native(&self) -> bool {
        *self == Self::NATIVE
    }

    /// Base58 encoding
    pub fn to_bs58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Circuit representation of this address
    pub fn to_circuit(&self) -> ark_bn254::Fr {
        hash_and_truncate(&self.0)
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bs58())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self.to_bs58())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePubkeyError {
    #[error("invalid base58: {0}")]
    InvalidBase58(String),
    #[error("expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Pubkey {
    type Err = ParsePubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| ParsePubkeyError::InvalidBase58(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParsePubkeyError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}
