//! UTXO Encryption
//!
//! Encrypted UTXOs are published next to their commitment so the owner can
//! recover them by scanning the ledger.
//!
//! ```text
//! blob = prefix(4) || body                                   (<= 256 bytes)
//!
//! Symmetric (own outputs):
//!   key    = aes_utxo_viewing_key(merkle_tree, commitment)
//!   nonce  = commitment[0..12]
//!   prefix = utxo_prefix_hash(merkle_tree, counter)
//!   body   = ChaCha20-Poly1305(key, nonce, utxo_bytes)
//!
//! Anonymous (foreign outputs):
//!   shared = ECDH(ephemeral_secret, receiver_encryption_pk)
//!   key    = derive_key("obscura utxo anon v1", shared || ephemeral_pk)
//!   nonce  = commitment[0..12]
//!   prefix = receiver_encryption_pk[0..4]
//!   body   = ephemeral_pk(32) || ChaCha20-Poly1305(key, nonce, utxo_bytes)
//! ```
//!
//! Since every commitment is unique the nonce is never reused under one key.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{CryptoRng, RngCore};
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::account::{Account, UTXO_PREFIX_LENGTH};
use crate::error::{UtxoError, UtxoErrorCode};
use crate::lookup::LookupTables;
use crate::pubkey::Pubkey;
use crate::utxo::{
    COMPRESSED_UTXO_BYTES_LENGTH, MAX_APP_DATA_FIELDS, UNCOMPRESSED_UTXO_BYTES_LENGTH, Utxo,
    UtxoFromBytes,
};

/// Size of the slot an encrypted UTXO occupies on the ledger
pub const MAX_ENCRYPTED_UTXO_LENGTH: usize = 256;
/// Poly1305 tag
pub const AUTH_TAG_LENGTH: usize = 16;
const EPHEMERAL_KEY_LENGTH: usize = 32;
const NONCE_LENGTH: usize = 12;

const ANONYMOUS_KEY_DOMAIN: &str = "obscura utxo anon v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionScheme {
    /// Keyed by the owner's symmetric secret, bound to a merkle tree
    Symmetric { merkle_tree: Pubkey },
    /// Keyed by an ephemeral X25519 exchange with the receiver
    Anonymous,
}

/// Input for [`Utxo::decrypt`]
#[derive(Debug)]
pub struct DecryptUtxo<'a> {
    pub account: &'a Account,
    /// Full blob including the prefix, trailing slot padding is tolerated
    pub ciphertext: &'a [u8],
    pub scheme: EncryptionScheme,
    /// Leaf commitment the ciphertext was published with
    pub commitment: [u8; 32],
    pub check_commitment: bool,
    pub compressed: bool,
    pub app_data_idl: Option<String>,
    pub index: Option<u64>,
}

impl Utxo {
    /// Encrypt for the owning account itself
    pub fn encrypt_symmetric(
        &self,
        account: &Account,
        merkle_tree: &Pubkey,
        counter: u32,
        tables: &LookupTables,
        compressed: bool,
    ) -> Result<Vec<u8>, UtxoError> {
        let commitment = self.commitment_bytes();
        let plaintext = self.to_bytes(tables, compressed)?;
        let key = account.aes_utxo_viewing_key(merkle_tree, &commitment)?;
        let ciphertext = seal(&key, &commitment, &plaintext, "Utxo::encrypt_symmetric")?;

        let prefix = account.utxo_prefix_hash(merkle_tree, counter)?;
        assemble(&prefix, &[], &ciphertext, "Utxo::encrypt_symmetric")
    }

    /// Encrypt for the owner's encryption public key
    pub fn encrypt_anonymous<R: RngCore + CryptoRng>(
        &self,
        tables: &LookupTables,
        compressed: bool,
        rng: &mut R,
    ) -> Result<Vec<u8>, UtxoError> {
        const ORIGIN: &str = "Utxo::encrypt_anonymous";
        let receiver = self.owner().encryption_public_key.ok_or_else(|| {
            UtxoError::new(
                UtxoErrorCode::EncryptionPublicKeyUndefined,
                ORIGIN,
                "owner has no encryption public key",
            )
        })?;

        let commitment = self.commitment_bytes();
        let plaintext = self.to_bytes(tables, compressed)?;

        let ephemeral_secret = EphemeralSecret::random_from_rng(rng);
        let ephemeral_pk = PublicKey::from(&ephemeral_secret);
        let shared = ephemeral_secret.diffie_hellman(&PublicKey::from(receiver));
        let key = anonymous_key(shared.as_bytes(), ephemeral_pk.as_bytes());
        let ciphertext = seal(&key, &commitment, &plaintext, ORIGIN)?;

        let mut prefix = [0u8; UTXO_PREFIX_LENGTH];
        prefix.copy_from_slice(&receiver[..UTXO_PREFIX_LENGTH]);
        assemble(&prefix, ephemeral_pk.as_bytes(), &ciphertext, ORIGIN)
    }

    /// Try to decrypt a published UTXO
    ///
    /// Returns `Ok(None)` when the ciphertext is not addressed to the account
    /// or does not parse. Missing account secrets are reported as errors.
    pub fn decrypt(input: DecryptUtxo<'_>, tables: &LookupTables) -> Result<Option<Self>, UtxoError> {
        let Some(body) = input.ciphertext.get(UTXO_PREFIX_LENGTH..) else {
            return Ok(None);
        };

        let (key, sealed) = match input.scheme {
            EncryptionScheme::Symmetric { merkle_tree } => (
                input
                    .account
                    .aes_utxo_viewing_key(&merkle_tree, &input.commitment)?,
                body,
            ),
            EncryptionScheme::Anonymous => {
                if body.len() < EPHEMERAL_KEY_LENGTH {
                    return Ok(None);
                }
                let (epk, sealed) = body.split_at(EPHEMERAL_KEY_LENGTH);
                let mut epk_bytes = [0u8; EPHEMERAL_KEY_LENGTH];
                epk_bytes.copy_from_slice(epk);
                let shared = input
                    .account
                    .encryption_secret()?
                    .diffie_hellman(&PublicKey::from(epk_bytes));
                (anonymous_key(shared.as_bytes(), &epk_bytes), sealed)
            }
        };

        let Some(plaintext) = open(&key, &input.commitment, sealed, input.compressed) else {
            return Ok(None);
        };

        let parsed = Utxo::from_bytes(
            UtxoFromBytes {
                bytes: &plaintext,
                compressed: input.compressed,
                owner: Some(input.account.owner()),
                app_data_idl: input.app_data_idl,
                index: input.index,
            },
            tables,
        );
        let utxo = match parsed {
            Ok(utxo) => utxo,
            Err(e) => {
                log::debug!("decrypted utxo did not parse: {e}");
                return Ok(None);
            }
        };

        if input.check_commitment && utxo.commitment_bytes() != input.commitment {
            return Err(UtxoError::new(
                UtxoErrorCode::CommitmentMismatch,
                "Utxo::decrypt",
                "decrypted utxo does not hash to the leaf commitment",
            ));
        }
        Ok(Some(utxo))
    }
}

fn anonymous_key(shared: &[u8; 32], ephemeral_pk: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(ANONYMOUS_KEY_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral_pk);
    *hasher.finalize().as_bytes()
}

fn seal(
    key: &[u8; 32],
    commitment: &[u8; 32],
    plaintext: &[u8],
    origin: &'static str,
) -> Result<Vec<u8>, UtxoError> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| UtxoError::new(UtxoErrorCode::EncryptionFailed, origin, e.to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(&commitment[..NONCE_LENGTH]), plaintext)
        .map_err(|e| UtxoError::new(UtxoErrorCode::EncryptionFailed, origin, e.to_string()))
}

/// Decrypt `sealed`, trying each valid plaintext length so that slot padding can be ignored
fn open(key: &[u8; 32], commitment: &[u8; 32], sealed: &[u8], compressed: bool) -> Option<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key).ok()?;
    let nonce = Nonce::from_slice(&commitment[..NONCE_LENGTH]);

    let base = if compressed {
        COMPRESSED_UTXO_BYTES_LENGTH
    } else {
        UNCOMPRESSED_UTXO_BYTES_LENGTH
    };
    let lengths = std::iter::once(base)
        .chain((1..=MAX_APP_DATA_FIELDS).map(|n| base + 1 + 32 * n))
        .map(|len| len + AUTH_TAG_LENGTH)
        .filter(|len| *len <= sealed.len());

    for len in lengths {
        if let Ok(plaintext) = cipher.decrypt(nonce, &sealed[..len]) {
            return Some(plaintext);
        }
    }
    None
}

fn assemble(
    prefix: &[u8; UTXO_PREFIX_LENGTH],
    header: &[u8],
    ciphertext: &[u8],
    origin: &'static str,
) -> Result<Vec<u8>, UtxoError> {
    let len = UTXO_PREFIX_LENGTH + header.len() + ciphertext.len();
    if len > MAX_ENCRYPTED_UTXO_LENGTH {
        return Err(UtxoError::new(
            UtxoErrorCode::EncryptedUtxoTooLarge,
            origin,
            format!("{len} bytes, max {MAX_ENCRYPTED_UTXO_LENGTH}"),
        ));
    }
    let mut blob = Vec::with_capacity(len);
    blob.extend_from_slice(prefix);
    blob.extend_from_slice(header);
    blob.extend_from_slice(ciphertext);
    Ok(blob)
}
