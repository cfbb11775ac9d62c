//! Confidential Records (UTXOs)
//!
//! ```text
//! commitment = Poseidon(
//!     tx_version,
//!     Poseidon(amount_native, amount_spl),
//!     owner_public_key,
//!     blinding,
//!     Poseidon(asset_native_circuit, asset_spl_circuit),
//!     app_data_hash,
//!     pool_type,
//!     verifier_address_circuit,
//! )
//!
//! nullifier  = Poseidon(commitment, index, Poseidon(private_key, commitment, index))
//! ```
//!
//! Byte layout (little-endian):
//!
//! ```text
//! ┌────────┬──────┬──────────────────────────────────────────────┐
//! │ offset │ size │ field                                        │
//! ├────────┼──────┼──────────────────────────────────────────────┤
//! │      0 │    8 │ native amount                                │
//! │      8 │    8 │ spl amount                                   │
//! │     16 │    8 │ spl asset index in asset table (0 = none)    │
//! │     24 │    8 │ verifier index in verifier table             │
//! │     32 │   32 │ blinding                                     │
//! │     64 │   32 │ app data hash                                │
//! │     96 │   32 │ pool type                                    │
//! ├────────┼──────┼──────────── compressed form ends ────────────┤
//! │    128 │   32 │ owner shielded public key                    │
//! │    160 │   32 │ owner encryption public key                  │
//! ├────────┼──────┼──────────── uncompressed form ends ──────────┤
//! │    end │ 1+32n│ optional app data (count, fields)            │
//! └────────┴──────┴──────────────────────────────────────────────┘
//! ```

use ark_bn254::Fr;
use ark_ff::{UniformRand, Zero};
use rand::Rng;

use crate::account::{Account, AccountId, UtxoOwner};
use crate::error::{UtxoError, UtxoErrorCode};
use crate::field::{fr_from_bytes, fr_to_bytes, poseidon_hash};
use crate::lookup::LookupTables;
use crate::pubkey::Pubkey;

/// Assets per UTXO: native plus one non-native asset
pub const N_ASSETS: usize = 2;
/// Distinct assets per transaction
pub const N_ASSET_PUBKEYS: usize = 3;
pub const MAX_APP_DATA_FIELDS: usize = 16;
pub const COMPRESSED_UTXO_BYTES_LENGTH: usize = 128;
pub const UNCOMPRESSED_UTXO_BYTES_LENGTH: usize = 192;

/// Construction parameters for [`Utxo::new`]
#[derive(Debug, Clone)]
pub struct UtxoConfig {
    pub owner: UtxoOwner,
    pub assets: Vec<Pubkey>,
    /// Signed so change computations can be passed through; negatives are rejected
    pub amounts: Vec<i128>,
    /// Little-endian field bytes, random when absent
    pub blinding: Option<[u8; 32]>,
    pub app_data: Vec<Fr>,
    pub app_data_idl: Option<String>,
    /// Used when the app data itself is not known
    pub app_data_hash: Option<Fr>,
    pub include_app_data: bool,
    pub pool_type: Fr,
    /// System verifier when absent
    pub verifier_address: Option<Pubkey>,
    pub index: Option<u64>,
}

impl UtxoConfig {
    pub fn new(owner: UtxoOwner) -> Self {
        Self {
            owner,
            assets: Vec::new(),
            amounts: Vec::new(),
            blinding: None,
            app_data: Vec::new(),
            app_data_idl: None,
            app_data_hash: None,
            include_app_data: true,
            pool_type: Fr::zero(),
            verifier_address: None,
            index: None,
        }
    }

    pub fn with_assets(mut self, assets: Vec<Pubkey>, amounts: Vec<i128>) -> Self {
        self.assets = assets;
        self.amounts = amounts;
        self
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_blinding(mut self, blinding: [u8; 32]) -> Self {
        self.blinding = Some(blinding);
        self
    }
}

/// Input for [`Utxo::from_bytes`]
#[derive(Debug, Clone)]
pub struct UtxoFromBytes<'a> {
    pub bytes: &'a [u8],
    pub compressed: bool,
    /// Required for compressed bytes, which omit the owner keys
    pub owner: Option<UtxoOwner>,
    pub app_data_idl: Option<String>,
    pub index: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    owner: UtxoOwner,
    assets: [Pubkey; N_ASSETS],
    amounts: [u64; N_ASSETS],
    assets_circuit: [Fr; N_ASSETS],
    blinding: Fr,
    app_data: Vec<Fr>,
    app_data_idl: Option<String>,
    app_data_hash: Fr,
    include_app_data: bool,
    pool_type: Fr,
    verifier_address: Pubkey,
    verifier_address_circuit: Fr,
    transaction_version: Fr,
    index: Option<u64>,
    commitment: Fr,
}

impl Utxo {
    pub fn new<R: Rng>(
        config: UtxoConfig,
        tables: &LookupTables,
        rng: &mut R,
    ) -> Result<Self, UtxoError> {
        let blinding = match config.blinding {
            Some(bytes) => fr_from_bytes(&bytes).ok_or_else(|| {
                UtxoError::new(
                    UtxoErrorCode::BlindingExceedsFieldSize,
                    "Utxo::new",
                    "blinding is not a field element",
                )
            })?,
            None => Fr::rand(rng),
        };
        Self::build(config, tables, blinding)
    }

    /// Zero-value UTXO used to pad transactions to the circuit arity
    pub fn empty<R: Rng>(
        owner: UtxoOwner,
        tables: &LookupTables,
        rng: &mut R,
    ) -> Result<Self, UtxoError> {
        Self::new(UtxoConfig::new(owner), tables, rng)
    }

    fn build(config: UtxoConfig, tables: &LookupTables, blinding: Fr) -> Result<Self, UtxoError> {
        const ORIGIN: &str = "Utxo::new";

        if config.assets.len() != config.amounts.len() {
            return Err(UtxoError::new(
                UtxoErrorCode::InvalidAssetOrAmountsLength,
                ORIGIN,
                format!(
                    "{} assets but {} amounts",
                    config.assets.len(),
                    config.amounts.len()
                ),
            ));
        }
        if config.assets.len() > N_ASSETS {
            return Err(UtxoError::new(
                UtxoErrorCode::ExceededMaxAssets,
                ORIGIN,
                format!("{} assets, max {N_ASSETS}", config.assets.len()),
            ));
        }

        let mut amounts = Vec::with_capacity(config.amounts.len());
        for amount in &config.amounts {
            if *amount < 0 {
                return Err(UtxoError::new(
                    UtxoErrorCode::NegativeAmount,
                    ORIGIN,
                    format!("amount {amount} is negative"),
                ));
            }
            let amount = u64::try_from(*amount).map_err(|_| {
                UtxoError::new(
                    UtxoErrorCode::AmountExceedsU64,
                    ORIGIN,
                    format!("amount {amount} does not fit in u64"),
                )
            })?;
            amounts.push(amount);
        }

        let (assets, amounts) = normalize_assets(&config.assets, &amounts)?;

        // a native-only zero-value utxo is the empty utxo
        let assets_circuit = if assets[1].is_native() && amounts[0] == 0 {
            [Fr::zero(); N_ASSETS]
        } else {
            [
                tables.assets.circuit_value(&assets[0])?,
                if assets[1].is_native() {
                    Fr::zero()
                } else {
                    tables.assets.circuit_value(&assets[1])?
                },
            ]
        };

        let verifier_address = config
            .verifier_address
            .unwrap_or_else(|| tables.verifiers.system_verifier());
        let verifier_address_circuit = tables.verifiers.circuit_value(&verifier_address)?;

        let app_data_hash = if config.app_data.is_empty() {
            config.app_data_hash.unwrap_or_else(Fr::zero)
        } else {
            if config.app_data_idl.is_none() {
                return Err(UtxoError::new(
                    UtxoErrorCode::AppDataIdlUndefined,
                    ORIGIN,
                    "app data requires an idl",
                ));
            }
            if config.app_data.len() > MAX_APP_DATA_FIELDS {
                return Err(UtxoError::new(
                    UtxoErrorCode::AppDataTooLarge,
                    ORIGIN,
                    format!(
                        "{} app data fields, max {MAX_APP_DATA_FIELDS}",
                        config.app_data.len()
                    ),
                ));
            }
            poseidon_hash(&config.app_data)
        };

        let mut utxo = Self {
            owner: config.owner,
            assets,
            amounts,
            assets_circuit,
            blinding,
            app_data: config.app_data,
            app_data_idl: config.app_data_idl,
            app_data_hash,
            include_app_data: config.include_app_data,
            pool_type: config.pool_type,
            verifier_address,
            verifier_address_circuit,
            transaction_version: Fr::zero(),
            index: config.index,
            commitment: Fr::zero(),
        };
        utxo.commitment = utxo.compute_commitment();
        Ok(utxo)
    }

    fn compute_commitment(&self) -> Fr {
        let amount_hash = poseidon_hash(&[Fr::from(self.amounts[0]), Fr::from(self.amounts[1])]);
        let asset_hash = poseidon_hash(&self.assets_circuit);
        poseidon_hash(&[
            self.transaction_version,
            amount_hash,
            self.owner.public_key,
            self.blinding,
            asset_hash,
            self.app_data_hash,
            self.pool_type,
            self.verifier_address_circuit,
        ])
    }

    pub fn commitment(&self) -> Fr {
        self.commitment
    }

    pub fn commitment_bytes(&self) -> [u8; 32] {
        fr_to_bytes(&self.commitment)
    }

    /// Nullifier published when this UTXO is spent
    ///
    /// Zero-value UTXOs are spendable without an index or private key so that
    /// padding inputs need no tree position.
    pub fn nullifier(&self, account: &Account) -> Result<Fr, UtxoError> {
        const ORIGIN: &str = "Utxo::nullifier";
        let zero_value = self.is_zero_value();

        let index = match (self.index, zero_value) {
            (Some(index), _) => index,
            (None, true) => 0,
            (None, false) => {
                return Err(UtxoError::new(
                    UtxoErrorCode::IndexNotProvided,
                    ORIGIN,
                    "utxo has no merkle tree index",
                ));
            }
        };
        let private_key = if zero_value {
            account.private_key_or_zero()
        } else {
            account.private_key().map_err(|e| {
                UtxoError::new(UtxoErrorCode::AccountHasNoPrivkey, ORIGIN, e.message)
            })?
        };

        let index = Fr::from(index);
        let signature = poseidon_hash(&[private_key, self.commitment, index]);
        Ok(poseidon_hash(&[self.commitment, index, signature]))
    }

    pub fn owner(&self) -> &UtxoOwner {
        &self.owner
    }

    pub fn account_id(&self) -> AccountId {
        self.owner.account_id
    }

    pub fn assets(&self) -> &[Pubkey; N_ASSETS] {
        &self.assets
    }

    pub fn amounts(&self) -> &[u64; N_ASSETS] {
        &self.amounts
    }

    pub fn assets_circuit(&self) -> &[Fr; N_ASSETS] {
        &self.assets_circuit
    }

    /// Native amount
    pub fn sol_amount(&self) -> u64 {
        self.amounts[0]
    }

    /// Non-native amount, zero if the UTXO holds only the native asset
    pub fn spl_amount(&self) -> u64 {
        self.amounts[1]
    }

    /// Non-native asset if any
    pub fn spl_asset(&self) -> Option<Pubkey> {
        (!self.assets[1].is_native()).then_some(self.assets[1])
    }

    /// Amount held of `asset`
    pub fn amount_of(&self, asset: &Pubkey) -> u64 {
        if asset.is_native() {
            self.amounts[0]
        } else if self.assets[1] == *asset {
            self.amounts[1]
        } else {
            0
        }
    }

    pub fn is_zero_value(&self) -> bool {
        self.amounts.iter().all(|a| *a == 0)
    }

    pub fn blinding(&self) -> Fr {
        self.blinding
    }

    pub fn app_data(&self) -> &[Fr] {
        &self.app_data
    }

    pub fn app_data_idl(&self) -> Option<&str> {
        self.app_data_idl.as_deref()
    }

    pub fn app_data_hash(&self) -> Fr {
        self.app_data_hash
    }

    pub fn pool_type(&self) -> Fr {
        self.pool_type
    }

    pub fn verifier_address(&self) -> Pubkey {
        self.verifier_address
    }

    pub fn verifier_address_circuit(&self) -> Fr {
        self.verifier_address_circuit
    }

    pub fn transaction_version(&self) -> Fr {
        self.transaction_version
    }

    pub fn index(&self) -> Option<u64> {
        self.index
    }

    /// Record the leaf position once the commitment is inserted
    pub fn set_index(&mut self, index: u64) {
        self.index = Some(index);
    }

    /// Serialize into the fixed layout
    pub fn to_bytes(&self, tables: &LookupTables, compressed: bool) -> Result<Vec<u8>, UtxoError> {
        let spl_index = match self.spl_asset() {
            Some(asset) => tables.assets.index_of(&asset)?,
            None => 0,
        };
        let verifier_index = tables.verifiers.index_of(&self.verifier_address)?;

        let mut bytes = Vec::with_capacity(UNCOMPRESSED_UTXO_BYTES_LENGTH);
        bytes.extend_from_slice(&self.amounts[0].to_le_bytes());
        bytes.extend_from_slice(&self.amounts[1].to_le_bytes());
        bytes.extend_from_slice(&spl_index.to_le_bytes());
        bytes.extend_from_slice(&verifier_index.to_le_bytes());
        bytes.extend_from_slice(&fr_to_bytes(&self.blinding));
        bytes.extend_from_slice(&fr_to_bytes(&self.app_data_hash));
        bytes.extend_from_slice(&fr_to_bytes(&self.pool_type));

        if !compressed {
            bytes.extend_from_slice(&fr_to_bytes(&self.owner.public_key));
            bytes.extend_from_slice(&self.owner.encryption_public_key.unwrap_or_default());
        }

        if self.include_app_data && !self.app_data.is_empty() {
            bytes.push(self.app_data.len() as u8);
            for field in &self.app_data {
                bytes.extend_from_slice(&fr_to_bytes(field));
            }
        }
        Ok(bytes)
    }

    /// Parse the fixed layout produced by [`Utxo::to_bytes`]
    pub fn from_bytes(input: UtxoFromBytes<'_>, tables: &LookupTables) -> Result<Self, UtxoError> {
        const ORIGIN: &str = "Utxo::from_bytes";
        let invalid = |msg: &str| UtxoError::new(UtxoErrorCode::InvalidUtxoBytes, ORIGIN, msg);

        let fixed_len = if input.compressed {
            COMPRESSED_UTXO_BYTES_LENGTH
        } else {
            UNCOMPRESSED_UTXO_BYTES_LENGTH
        };
        let bytes = input.bytes;
        if bytes.len() < fixed_len {
            return Err(invalid("buffer shorter than utxo layout"));
        }

        let read_u64 = |offset: usize| -> Result<u64, UtxoError> {
            bytes[offset..offset + 8]
                .try_into()
                .map(u64::from_le_bytes)
                .map_err(|_| invalid("truncated integer"))
        };
        let read_32 = |offset: usize| -> Result<[u8; 32], UtxoError> {
            bytes[offset..offset + 32]
                .try_into()
                .map_err(|_| invalid("truncated field"))
        };
        let read_fr = |offset: usize| -> Result<Fr, UtxoError> {
            fr_from_bytes(&read_32(offset)?).ok_or_else(|| invalid("field element overflow"))
        };

        let native_amount = read_u64(0)?;
        let spl_amount = read_u64(8)?;
        let spl_index = read_u64(16)?;
        let verifier_index = read_u64(24)?;
        let blinding = fr_from_bytes(&read_32(32)?).ok_or_else(|| {
            UtxoError::new(
                UtxoErrorCode::BlindingExceedsFieldSize,
                ORIGIN,
                "blinding is not a field element",
            )
        })?;
        let app_data_hash = read_fr(64)?;
        let pool_type = read_fr(96)?;

        let owner = if input.compressed {
            input.owner.ok_or_else(|| {
                UtxoError::new(
                    UtxoErrorCode::AccountUndefined,
                    ORIGIN,
                    "compressed utxo bytes require the owner",
                )
            })?
        } else {
            let public_key = read_fr(128)?;
            let encryption_public_key = read_32(160)?;
            if encryption_public_key == [0u8; 32] {
                UtxoOwner::from_public_key(public_key)
            } else {
                let mut key_bytes = [0u8; 64];
                key_bytes[..32].copy_from_slice(&fr_to_bytes(&public_key));
                key_bytes[32..].copy_from_slice(&encryption_public_key);
                Account::from_public_key(&key_bytes)?.owner()
            }
        };

        let (assets, amounts) = if spl_index == 0 {
            if spl_amount != 0 {
                return Err(invalid("spl amount without spl asset"));
            }
            (vec![Pubkey::NATIVE], vec![native_amount as i128])
        } else {
            (
                vec![Pubkey::NATIVE, tables.assets.get(spl_index)?],
                vec![native_amount as i128, spl_amount as i128],
            )
        };

        let rest = &bytes[fixed_len..];
        let app_data = match rest.split_first() {
            None => Vec::new(),
            Some((count, fields)) => {
                let count = *count as usize;
                if fields.len() != count * 32 {
                    return Err(invalid("app data length mismatch"));
                }
                if input.app_data_idl.is_none() {
                    return Err(UtxoError::new(
                        UtxoErrorCode::AppDataIdlUndefined,
                        ORIGIN,
                        "app data present but no idl supplied",
                    ));
                }
                fields
                    .chunks_exact(32)
                    .map(|chunk| {
                        chunk
                            .try_into()
                            .ok()
                            .and_then(|c: [u8; 32]| fr_from_bytes(&c))
                            .ok_or_else(|| invalid("app data field overflow"))
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let config = UtxoConfig {
            owner,
            assets,
            amounts,
            blinding: None,
            app_data,
            app_data_idl: input.app_data_idl,
            app_data_hash: Some(app_data_hash),
            include_app_data: true,
            pool_type,
            verifier_address: Some(tables.verifiers.get(verifier_index)?),
            index: input.index,
        };
        let utxo = Self::build(config, tables, blinding)?;
        if utxo.app_data_hash != app_data_hash {
            return Err(invalid("app data does not match its hash"));
        }
        Ok(utxo)
    }
}

/// Bring assets/amounts into `[native, spl]` form
fn normalize_assets(
    assets: &[Pubkey],
    amounts: &[u64],
) -> Result<([Pubkey; N_ASSETS], [u64; N_ASSETS]), UtxoError> {
    const ORIGIN: &str = "Utxo::new";
    match (assets, amounts) {
        ([], []) => Ok(([Pubkey::NATIVE; N_ASSETS], [0; N_ASSETS])),
        ([asset], [amount]) if asset.is_native() => Ok(([Pubkey::NATIVE; N_ASSETS], [*amount, 0])),
        ([asset], [amount]) => Ok(([Pubkey::NATIVE, *asset], [0, *amount])),
        ([first, _], _) if !first.is_native() => Err(UtxoError::new(
            UtxoErrorCode::NativeAssetNotFirst,
            ORIGIN,
            format!("first asset is {first}"),
        )),
        ([_, second], [a0, a1]) if second.is_native() => {
            let merged = a0.checked_add(*a1).ok_or_else(|| {
                UtxoError::new(
                    UtxoErrorCode::AmountExceedsU64,
                    ORIGIN,
                    "merged native amount overflows",
                )
            })?;
            Ok(([Pubkey::NATIVE; N_ASSETS], [merged, 0]))
        }
        ([_, second], [a0, a1]) => Ok(([Pubkey::NATIVE, *second], [*a0, *a1])),
        _ => Err(UtxoError::new(
            UtxoErrorCode::ExceededMaxAssets,
            ORIGIN,
            format!("{} assets, max {N_ASSETS}", assets.len()),
        )),
    }
}
