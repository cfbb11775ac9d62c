//! Obscura Privacy SDK
//!
//! Client-side primitives of the shielded pool: accounts, UTXOs, their
//! encryption and the commitment trees they live in.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Shielded Pool                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐  │
//! │  │  Nullifiers  │  │ Commitments  │  │    Encrypted UTXOs    │  │
//! │  │   (spent)    │  │ (new UTXOs)  │  │ (symmetric/anonymous) │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘  │
//! │         ▲                 │                     ▲               │
//! │         │                 ▼                     │               │
//! │  ┌─────────────┐   ┌──────────────────┐   ┌────────────┐        │
//! │  │   Account   │──►│       Utxo       │──►│  Lookup    │        │
//! │  │ (key tree)  │   │ commitment, bytes│   │  tables    │        │
//! │  └─────────────┘   └──────────────────┘   └────────────┘        │
//! │                           │                                     │
//! │                           ▼                                     │
//! │             IncrementalMerkleTree / MerkleTree                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod account;
pub mod eddsa;
pub mod encryption;
pub mod error;
pub mod field;
pub mod incremental;
pub mod lookup;
pub mod merkle;
pub mod pubkey;
pub mod utxo;

pub use account::{
    Account, AccountId, AccountPrivateKeys, BurnerInfo, PUBLIC_KEY_LENGTH, SEED_LENGTH,
    UTXO_PREFIX_LENGTH, UtxoOwner,
};
pub use eddsa::{EddsaPublicKey, EddsaSecretKey, EddsaSignature, verify_eddsa};
pub use encryption::{DecryptUtxo, EncryptionScheme, MAX_ENCRYPTED_UTXO_LENGTH};
pub use error::{
    AccountError, AccountErrorCode, ComponentError, MerkleTreeError, MerkleTreeErrorCode,
    UtxoError, UtxoErrorCode,
};
pub use field::{
    FIELD_SIZE, fr_from_bytes, fr_to_be_bytes, fr_to_bytes, hash_and_truncate, poseidon_hash,
};
pub use incremental::{IncrementalMerkleTree, MERKLE_TREE_HEIGHT, ROOT_HISTORY_SIZE};
pub use lookup::{AssetLookupTable, LookupTables, VerifierLookupTable};
pub use merkle::{MAX_TREE_HEIGHT, MerkleHasher, MerklePath, MerkleTree};
pub use pubkey::{ParsePubkeyError, Pubkey};
pub use utxo::{
    COMPRESSED_UTXO_BYTES_LENGTH, MAX_APP_DATA_FIELDS, N_ASSET_PUBKEYS, N_ASSETS,
    UNCOMPRESSED_UTXO_BYTES_LENGTH, Utxo, UtxoConfig, UtxoFromBytes,
};

/// Field element type used throughout the pool
pub use ark_bn254::Fr;
