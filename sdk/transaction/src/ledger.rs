//! Ledger Account Parsing
//!
//! Record account layout:
//!
//! ```text
//! ┌──────────────┬─────────────┬──────────────────┐
//! │ "obscrecs"   │ leaf_count  │ nullifier_count  │   header (24 bytes)
//! ├──────────────┴─────────────┴──────────────────┤
//! │ commitment (32) ‖ encrypted utxo (256)        │ × leaf_count
//! ├───────────────────────────────────────────────┤
//! │ nullifier (32)                                │ × nullifier_count
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Counts are little-endian u64. Reading the bytes is the caller's business,
//! behind [`LedgerReader`].

use std::collections::HashSet;

use anyhow::{Context, Result};

use obscura_privacy::{MAX_ENCRYPTED_UTXO_LENGTH, Pubkey};

use crate::error::{LedgerError, LedgerErrorCode};

pub const RECORD_DISCRIMINATOR: &[u8; 8] = b"obscrecs";
pub const RECORD_HEADER_LENGTH: usize = 24;
pub const LEAF_RECORD_LENGTH: usize = 32 + MAX_ENCRYPTED_UTXO_LENGTH;

const ORIGIN: &str = "RecordAccount::from_bytes";

/// A published output: leaf commitment plus its encrypted UTXO slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRecord {
    pub commitment: [u8; 32],
    pub encrypted_utxo: Vec<u8>,
}

/// Leaves and spent nullifiers of a pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordAccount {
    pub leaves: Vec<LeafRecord>,
    pub nullifiers: Vec<[u8; 32]>,
}

/// Source of raw ledger account bytes
pub trait LedgerReader {
    fn read_account(&self, address: &Pubkey) -> Result<Vec<u8>>;
}

impl RecordAccount {
    pub fn from_bytes(data: &[u8]) -> Result<Self, LedgerError> {
        let too_short = |what: &str| {
            LedgerError::new(
                LedgerErrorCode::AccountDataTooShort,
                ORIGIN,
                format!("{} bytes, {what}", data.len()),
            )
        };

        if data.len() < RECORD_HEADER_LENGTH {
            return Err(too_short("header needs 24"));
        }
        if &data[..8] != RECORD_DISCRIMINATOR {
            return Err(LedgerError::new(
                LedgerErrorCode::InvalidDiscriminator,
                ORIGIN,
                format!("got {}", hex::encode(&data[..8])),
            ));
        }

        let leaf_count = read_count(&data[8..16]);
        let nullifier_count = read_count(&data[16..24]);

        let leaves_len = leaf_count
            .checked_mul(LEAF_RECORD_LENGTH)
            .ok_or_else(|| too_short("leaf count overflows"))?;
        let nullifiers_len = nullifier_count
            .checked_mul(32)
            .ok_or_else(|| too_short("nullifier count overflows"))?;
        let expected = RECORD_HEADER_LENGTH
            .checked_add(leaves_len)
            .and_then(|n| n.checked_add(nullifiers_len))
            .ok_or_else(|| too_short("counts overflow"))?;

        if data.len() < expected {
            return Err(too_short(&format!("{leaf_count} leaves and {nullifier_count} nullifiers need {expected}")));
        }
        if data.len() > expected {
            return Err(LedgerError::new(
                LedgerErrorCode::TrailingBytes,
                ORIGIN,
                format!("{} bytes after {expected}", data.len() - expected),
            ));
        }

        let body = &data[RECORD_HEADER_LENGTH..];
        let (leaf_bytes, nullifier_bytes) = body.split_at(leaves_len);

        let leaves = leaf_bytes
            .chunks_exact(LEAF_RECORD_LENGTH)
            .map(|chunk| {
                let (commitment, encrypted) = chunk.split_at(32);
                LeafRecord {
                    commitment: to_array(commitment),
                    encrypted_utxo: encrypted.to_vec(),
                }
            })
            .collect();
        let nullifiers = nullifier_bytes.chunks_exact(32).map(to_array).collect();

        Ok(Self { leaves, nullifiers })
    }

    /// Serialize, padding or truncating each encrypted UTXO to its slot
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            RECORD_HEADER_LENGTH
                + self.leaves.len() * LEAF_RECORD_LENGTH
                + self.nullifiers.len() * 32,
        );
        out.extend_from_slice(RECORD_DISCRIMINATOR);
        out.extend_from_slice(&(self.leaves.len() as u64).to_le_bytes());
        out.extend_from_slice(&(self.nullifiers.len() as u64).to_le_bytes());
        for leaf in &self.leaves {
            out.extend_from_slice(&leaf.commitment);
            let mut slot = leaf.encrypted_utxo.clone();
            slot.resize(MAX_ENCRYPTED_UTXO_LENGTH, 0);
            out.extend_from_slice(&slot);
        }
        for nullifier in &self.nullifiers {
            out.extend_from_slice(nullifier);
        }
        out
    }

    pub fn commitments(&self) -> Vec<[u8; 32]> {
        self.leaves.iter().map(|l| l.commitment).collect()
    }

    pub fn nullifier_set(&self) -> HashSet<[u8; 32]> {
        self.nullifiers.iter().copied().collect()
    }
}

fn read_count(bytes: &[u8]) -> usize {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    usize::try_from(u64::from_le_bytes(arr)).unwrap_or(usize::MAX)
}

fn to_array(bytes: &[u8]) -> [u8; 32] {
    let mut arr = [0u8; 32];
    arr.copy_from_slice(bytes);
    arr
}

/// Read and parse the record account at `address`
pub fn fetch_record_account<L: LedgerReader + ?Sized>(
    reader: &L,
    address: &Pubkey,
) -> Result<RecordAccount> {
    let data = reader
        .read_account(address)
        .with_context(|| format!("Failed to read record account {address}"))?;
    RecordAccount::from_bytes(&data)
        .with_context(|| format!("Failed to parse record account {address}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordAccount {
        RecordAccount {
            leaves: vec![
                LeafRecord {
                    commitment: [1u8; 32],
                    encrypted_utxo: vec![7u8; MAX_ENCRYPTED_UTXO_LENGTH],
                },
                LeafRecord {
                    commitment: [2u8; 32],
                    encrypted_utxo: vec![8u8; MAX_ENCRYPTED_UTXO_LENGTH],
                },
            ],
            nullifiers: vec![[9u8; 32]],
        }
    }

    #[test]
    fn test_parse_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), RECORD_HEADER_LENGTH + 2 * LEAF_RECORD_LENGTH + 32);
        assert_eq!(RecordAccount::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_rejects_bad_discriminator() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'x';
        let err = RecordAccount::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind, LedgerErrorCode::InvalidDiscriminator);
    }

    #[test]
    fn test_rejects_truncated_and_trailing() {
        let bytes = sample().to_bytes();
        let err = RecordAccount::from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind, LedgerErrorCode::AccountDataTooShort);

        let mut longer = bytes.clone();
        longer.push(0);
        let err = RecordAccount::from_bytes(&longer).unwrap_err();
        assert_eq!(err.kind, LedgerErrorCode::TrailingBytes);
    }

    #[test]
    fn test_huge_count_does_not_allocate() {
        let mut bytes = RecordAccount::default().to_bytes();
        bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = RecordAccount::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind, LedgerErrorCode::AccountDataTooShort);
    }

    struct MapReader(std::collections::HashMap<Pubkey, Vec<u8>>);

    impl LedgerReader for MapReader {
        fn read_account(&self, address: &Pubkey) -> Result<Vec<u8>> {
            self.0
                .get(address)
                .cloned()
                .with_context(|| format!("account {address} not found"))
        }
    }

    #[test]
    fn test_fetch_adds_context() {
        let address = Pubkey([4u8; 32]);
        let reader = MapReader([(address, sample().to_bytes())].into_iter().collect());
        assert_eq!(fetch_record_account(&reader, &address).unwrap(), sample());

        let err = fetch_record_account(&reader, &Pubkey([5u8; 32])).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read record account"));
    }
}
