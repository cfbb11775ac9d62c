//! Accounts and Key Derivation
//!
//! All key material is derived from a single seed with domain separated
//! blake3 key derivation:
//!
//! ```text
//! seed ──┬── derive("obscura shielded")        ──► Poseidon ──► private key ──► Poseidon ──► public key
//!        ├── derive("obscura encryption")      ──► X25519 secret ──► encryption public key
//!        ├── derive("obscura aes")             ──► symmetric secret
//!        ├── derive("obscura hashing")         ──► prefix hashing secret
//!        └── derive("obscura poseidon eddsa")  ──► Baby Jubjub signing key
//!
//! burner(seed, i) = from_seed(derive("obscura burner seed", seed || i))
//! ```

use std::fmt;

use ark_bn254::Fr;
use ark_ff::Zero;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::eddsa::{EddsaPublicKey, EddsaSecretKey, EddsaSignature};
use crate::error::{AccountError, AccountErrorCode};
use crate::field::{fr_from_bytes, fr_from_bytes_mod_order, fr_to_bytes, poseidon_hash};
use crate::pubkey::Pubkey;

/// Minimum seed length in bytes
pub const SEED_LENGTH: usize = 32;
/// Length of the serialized public key (shielded key + encryption key)
pub const PUBLIC_KEY_LENGTH: usize = 64;
/// Length of the ciphertext prefix tag
pub const UTXO_PREFIX_LENGTH: usize = 4;

const SHIELDED_DOMAIN: &str = "obscura shielded";
const ENCRYPTION_DOMAIN: &str = "obscura encryption";
const AES_DOMAIN: &str = "obscura aes";
const HASHING_DOMAIN: &str = "obscura hashing";
const EDDSA_DOMAIN: &str = "obscura poseidon eddsa";
const BURNER_DOMAIN: &str = "obscura burner seed";
const UTXO_VIEWING_KEY_DOMAIN: &str = "obscura utxo viewing key";

/// Stable identifier of an account, stored in UTXOs instead of the account itself
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", hex::encode(&self.0[..8]))
    }
}

/// Public data of a UTXO owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtxoOwner {
    pub account_id: AccountId,
    pub public_key: Fr,
    pub encryption_public_key: Option<[u8; 32]>,
}

impl UtxoOwner {
    /// Owner known only by its shielded public key
    pub fn from_public_key(public_key: Fr) -> Self {
        Self {
            account_id: account_id(&public_key, None),
            public_key,
            encryption_public_key: None,
        }
    }
}

/// Exported secrets, also the input of [`Account::from_private_key`]
#[derive(Clone, Default)]
pub struct AccountPrivateKeys {
    pub private_key: [u8; 32],
    pub encryption_private_key: Option<[u8; 32]>,
    pub aes_secret: Option<[u8; 32]>,
    pub hashing_secret: Option<[u8; 32]>,
    pub eddsa_secret: Option<[u8; 32]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnerInfo {
    pub seed: [u8; 32],
    pub index: u64,
}

#[derive(Clone)]
pub struct Account {
    private_key: Option<Fr>,
    public_key: Fr,
    encryption_secret: Option<StaticSecret>,
    encryption_public_key: [u8; 32],
    aes_secret: Option<[u8; 32]>,
    hashing_secret: Option<[u8; 32]>,
    eddsa_secret: Option<EddsaSecretKey>,
    burner: Option<BurnerInfo>,
}

impl Account {
    /// Derive a full account from a seed of at least 32 bytes
    pub fn from_seed(seed: &[u8]) -> Result<Self, AccountError> {
        if seed.len() < SEED_LENGTH {
            return Err(AccountError::new(
                AccountErrorCode::InvalidSeedSize,
                "Account::from_seed",
                format!("seed has {} bytes, need {SEED_LENGTH}", seed.len()),
            ));
        }

        let shielded = blake3::derive_key(SHIELDED_DOMAIN, seed);
        let private_key = poseidon_hash(&[fr_from_bytes_mod_order(&shielded)]);
        let encryption_secret = StaticSecret::from(blake3::derive_key(ENCRYPTION_DOMAIN, seed));

        Ok(Self {
            private_key: Some(private_key),
            public_key: poseidon_hash(&[private_key]),
            encryption_public_key: *PublicKey::from(&encryption_secret).as_bytes(),
            encryption_secret: Some(encryption_secret),
            aes_secret: Some(blake3::derive_key(AES_DOMAIN, seed)),
            hashing_secret: Some(blake3::derive_key(HASHING_DOMAIN, seed)),
            eddsa_secret: Some(EddsaSecretKey::from_bytes(blake3::derive_key(
                EDDSA_DOMAIN,
                seed,
            ))),
            burner: None,
        })
    }

    /// Derive the burner account number `index` of `seed`
    pub fn burner(seed: &[u8], index: u64) -> Result<Self, AccountError> {
        if seed.len() < SEED_LENGTH {
            return Err(AccountError::new(
                AccountErrorCode::InvalidSeedSize,
                "Account::burner",
                format!("seed has {} bytes, need {SEED_LENGTH}", seed.len()),
            ));
        }
        let mut material = seed.to_vec();
        material.extend_from_slice(&index.to_le_bytes());
        let burner_seed = blake3::derive_key(BURNER_DOMAIN, &material);

        let mut account = Self::from_seed(&burner_seed)?;
        account.burner = Some(BurnerInfo {
            seed: burner_seed,
            index,
        });
        Ok(account)
    }

    /// Rebuild an account from exported secrets
    ///
    /// The encryption key and the symmetric secret cannot be recovered from the
    /// shielded private key and must be supplied.
    pub fn from_private_key(keys: AccountPrivateKeys) -> Result<Self, AccountError> {
        let private_key = fr_from_bytes(&keys.private_key).ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::InvalidPrivateKey,
                "Account::from_private_key",
                "private key exceeds field size",
            )
        })?;
        let encryption_private_key = keys.encryption_private_key.ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::EncryptionPrivateKeyUndefined,
                "Account::from_private_key",
                "encryption private key is required",
            )
        })?;
        let aes_secret = keys.aes_secret.ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::AesSecretUndefined,
                "Account::from_private_key",
                "aes secret is required",
            )
        })?;

        let encryption_secret = StaticSecret::from(encryption_private_key);
        Ok(Self {
            private_key: Some(private_key),
            public_key: poseidon_hash(&[private_key]),
            encryption_public_key: *PublicKey::from(&encryption_secret).as_bytes(),
            encryption_secret: Some(encryption_secret),
            aes_secret: Some(aes_secret),
            hashing_secret: keys.hashing_secret,
            eddsa_secret: keys.eddsa_secret.map(EddsaSecretKey::from_bytes),
            burner: None,
        })
    }

    /// View-only account from `shielded public key (32) || encryption public key (32)`
    pub fn from_public_key(bytes: &[u8]) -> Result<Self, AccountError> {
        if bytes.len() != PUBLIC_KEY_LENGTH {
            return Err(AccountError::new(
                AccountErrorCode::InvalidPublicKeySize,
                "Account::from_public_key",
                format!("got {} bytes, expected {PUBLIC_KEY_LENGTH}", bytes.len()),
            ));
        }
        let mut shielded = [0u8; 32];
        shielded.copy_from_slice(&bytes[..32]);
        let mut encryption_public_key = [0u8; 32];
        encryption_public_key.copy_from_slice(&bytes[32..]);

        let public_key = fr_from_bytes(&shielded).ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::InvalidPublicKey,
                "Account::from_public_key",
                "shielded public key exceeds field size",
            )
        })?;

        Ok(Self {
            private_key: None,
            public_key,
            encryption_secret: None,
            encryption_public_key,
            aes_secret: None,
            hashing_secret: None,
            eddsa_secret: None,
            burner: None,
        })
    }

    pub fn public_key(&self) -> Fr {
        self.public_key
    }

    pub fn encryption_public_key(&self) -> [u8; 32] {
        self.encryption_public_key
    }

    /// `shielded public key || encryption public key`
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes[..32].copy_from_slice(&fr_to_bytes(&self.public_key));
        bytes[32..].copy_from_slice(&self.encryption_public_key);
        bytes
    }

    pub fn id(&self) -> AccountId {
        account_id(&self.public_key, Some(&self.encryption_public_key))
    }

    pub fn owner(&self) -> UtxoOwner {
        UtxoOwner {
            account_id: self.id(),
            public_key: self.public_key,
            encryption_public_key: Some(self.encryption_public_key),
        }
    }

    pub fn is_view_only(&self) -> bool {
        self.private_key.is_none()
    }

    pub fn burner_info(&self) -> Option<BurnerInfo> {
        self.burner
    }

    pub fn private_key(&self) -> Result<Fr, AccountError> {
        self.private_key.ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::AccountHasNoPrivkey,
                "Account::private_key",
                "view-only account",
            )
        })
    }

    /// Private key, or zero for view-only accounts (spending zero-value UTXOs)
    pub fn private_key_or_zero(&self) -> Fr {
        self.private_key.unwrap_or_else(Fr::zero)
    }

    pub fn encryption_secret(&self) -> Result<&StaticSecret, AccountError> {
        self.encryption_secret.as_ref().ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::EncryptionPrivateKeyUndefined,
                "Account::encryption_secret",
                "view-only account",
            )
        })
    }

    pub fn aes_secret(&self) -> Result<&[u8; 32], AccountError> {
        self.aes_secret.as_ref().ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::AesSecretUndefined,
                "Account::aes_secret",
                "account has no symmetric secret",
            )
        })
    }

    pub fn hashing_secret(&self) -> Result<&[u8; 32], AccountError> {
        self.hashing_secret.as_ref().ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::HashingSecretUndefined,
                "Account::hashing_secret",
                "account has no hashing secret",
            )
        })
    }

    fn eddsa_secret(&self, origin: &'static str) -> Result<&EddsaSecretKey, AccountError> {
        self.eddsa_secret.as_ref().ok_or_else(|| {
            AccountError::new(
                AccountErrorCode::PoseidonEddsaKeypairUndefined,
                origin,
                "account has no eddsa keypair",
            )
        })
    }

    /// Export every secret held by this account
    pub fn private_keys(&self) -> Result<AccountPrivateKeys, AccountError> {
        Ok(AccountPrivateKeys {
            private_key: fr_to_bytes(&self.private_key()?),
            encryption_private_key: Some(self.encryption_secret()?.to_bytes()),
            aes_secret: Some(*self.aes_secret()?),
            hashing_secret: self.hashing_secret,
            eddsa_secret: self.eddsa_secret.as_ref().map(|k| *k.as_bytes()),
        })
    }

    /// Owner signature over a leaf: `Poseidon(private_key, commitment, index)`
    pub fn sign(&self, commitment: &Fr, index: u64) -> Result<Fr, AccountError> {
        Ok(poseidon_hash(&[
            self.private_key()?,
            *commitment,
            Fr::from(index),
        ]))
    }

    pub fn eddsa_public_key(&self) -> Result<EddsaPublicKey, AccountError> {
        Ok(self.eddsa_secret("Account::eddsa_public_key")?.public_key())
    }

    pub fn eddsa_sign(&self, msg: &Fr) -> Result<EddsaSignature, AccountError> {
        Ok(self.eddsa_secret("Account::eddsa_sign")?.sign(msg))
    }

    /// Key used to derive ciphertext prefix tags
    pub fn utxo_prefix_viewing_key(&self, salt: &[u8]) -> Result<[u8; 32], AccountError> {
        Ok(*blake3::keyed_hash(self.hashing_secret()?, salt).as_bytes())
    }

    /// 4-byte tag prepended to symmetric ciphertexts so a wallet can skip foreign ones
    pub fn utxo_prefix_hash(
        &self,
        merkle_tree: &Pubkey,
        counter: u32,
    ) -> Result<[u8; UTXO_PREFIX_LENGTH], AccountError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.utxo_prefix_viewing_key(b"hashing")?);
        hasher.update(merkle_tree.as_ref());
        hasher.update(&counter.to_be_bytes());
        let hash = hasher.finalize();

        let mut prefix = [0u8; UTXO_PREFIX_LENGTH];
        prefix.copy_from_slice(&hash.as_bytes()[..UTXO_PREFIX_LENGTH]);
        Ok(prefix)
    }

    /// Per-UTXO symmetric key
    pub fn aes_utxo_viewing_key(
        &self,
        merkle_tree: &Pubkey,
        commitment: &[u8; 32],
    ) -> Result<[u8; 32], AccountError> {
        let mut material = Vec::with_capacity(96);
        material.extend_from_slice(self.aes_secret()?);
        material.extend_from_slice(merkle_tree.as_ref());
        material.extend_from_slice(commitment);
        Ok(blake3::derive_key(UTXO_VIEWING_KEY_DOMAIN, &material))
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id())
            .field("view_only", &self.is_view_only())
            .field("burner", &self.burner.map(|b| b.index))
            .finish()
    }
}

fn account_id(public_key: &Fr, encryption_public_key: Option<&[u8; 32]>) -> AccountId {
    let mut hasher = Sha256::new();
    hasher.update(fr_to_bytes(public_key));
    if let Some(key) = encryption_public_key {
        hasher.update(key);
    }
    AccountId(hasher.finalize().into())
}
