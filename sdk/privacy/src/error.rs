//! Component Errors
//!
//! Every component reports failures through the same shape:
//!
//! ```text
//! ComponentError<Kind> { kind, origin, message }
//!        │               │      │        └── human readable detail
//!        │               │      └────────── operation that raised it
//!        │               └───────────────── component specific code
//!        └──────────────────────────────── UtxoError, AccountError, MerkleTreeError, ...
//! ```

use thiserror::Error;

/// Error carrying a component specific kind, the operation that raised it and a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{origin}: {kind}: {message}")]
pub struct ComponentError<K> {
    pub kind: K,
    pub origin: &'static str,
    pub message: String,
}

impl<K> ComponentError<K> {
    pub fn new(kind: K, origin: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Re-tag the error for a calling component, keeping origin and message
    pub fn map_kind<J>(self, f: impl FnOnce(K) -> J) -> ComponentError<J> {
        ComponentError {
            kind: f(self.kind),
            origin: self.origin,
            message: self.message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccountErrorCode {
    #[error("seed must be at least 32 bytes")]
    InvalidSeedSize,
    #[error("public key must be 64 bytes")]
    InvalidPublicKeySize,
    #[error("public key is not a field element")]
    InvalidPublicKey,
    #[error("private key is not a field element")]
    InvalidPrivateKey,
    #[error("account has no private key")]
    AccountHasNoPrivkey,
    #[error("encryption private key undefined")]
    EncryptionPrivateKeyUndefined,
    #[error("aes secret undefined")]
    AesSecretUndefined,
    #[error("hashing secret undefined")]
    HashingSecretUndefined,
    #[error("poseidon eddsa keypair undefined")]
    PoseidonEddsaKeypairUndefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UtxoErrorCode {
    #[error("assets and amounts have different lengths")]
    InvalidAssetOrAmountsLength,
    #[error("exceeded maximum number of assets")]
    ExceededMaxAssets,
    #[error("negative amount")]
    NegativeAmount,
    #[error("amount exceeds u64")]
    AmountExceedsU64,
    #[error("native asset must be first")]
    NativeAssetNotFirst,
    #[error("asset not found in lookup table")]
    AssetNotFound,
    #[error("verifier not found in lookup table")]
    VerifierIndexNotFound,
    #[error("blinding exceeds field size")]
    BlindingExceedsFieldSize,
    #[error("app data without idl")]
    AppDataIdlUndefined,
    #[error("app data too large")]
    AppDataTooLarge,
    #[error("index not provided")]
    IndexNotProvided,
    #[error("account has no private key")]
    AccountHasNoPrivkey,
    #[error("account undefined")]
    AccountUndefined,
    #[error("encryption public key undefined")]
    EncryptionPublicKeyUndefined,
    #[error("encrypted utxo too large")]
    EncryptedUtxoTooLarge,
    #[error("invalid utxo bytes")]
    InvalidUtxoBytes,
    #[error("decrypted utxo does not match commitment")]
    CommitmentMismatch,
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("account: {0}")]
    Account(AccountErrorCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MerkleTreeErrorCode {
    #[error("merkle tree is full")]
    TreeFull,
    #[error("operand exceeds field modulus")]
    FieldOverflow,
    #[error("invalid tree height")]
    InvalidHeight,
    #[error("invalid root history size")]
    InvalidRootHistorySize,
    #[error("invalid account data")]
    InvalidAccountData,
}

pub type AccountError = ComponentError<AccountErrorCode>;
pub type UtxoError = ComponentError<UtxoErrorCode>;
pub type MerkleTreeError = ComponentError<MerkleTreeErrorCode>;

impl From<AccountError> for UtxoError {
    fn from(err: AccountError) -> Self {
        err.map_kind(|kind| match kind {
            AccountErrorCode::AccountHasNoPrivkey => UtxoErrorCode::AccountHasNoPrivkey,
            other => UtxoErrorCode::Account(other),
        })
    }
}
