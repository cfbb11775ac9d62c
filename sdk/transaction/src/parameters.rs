//! Transaction Parameters
//!
//! Assembles everything a shielded transaction proves and publishes:
//!
//! ```text
//! inputs ──pad──► nullifiers ─────────────────────────────┐
//! outputs ─pad──► commitments, encrypted outputs ─────────┤
//!                 public amounts = Σout - Σin (mod p) ────┼──► TransactionParameters
//! routing ───────► integrity hash (keccak, mod p) ────────┘
//! ```

use ark_ff::{PrimeField, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Keccak256};

use obscura_privacy::field::fr_to_u64;
use obscura_privacy::{
    Account, Fr, LookupTables, MAX_ENCRYPTED_UTXO_LENGTH, N_ASSET_PUBKEYS, Pubkey, Utxo,
};

use crate::action::Action;
use crate::error::{TransactionParametersError, TransactionParametersErrorCode, utxo_error};
use crate::verifier::VerifierConfig;

/// Encrypted output bytes covered by the integrity hash
pub const INTEGRITY_HASH_ENCRYPTED_LENGTH: usize = 512;

const ORIGIN: &str = "TransactionParameters::build";

/// Relayer submitting unshield and transfer transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relayer {
    pub pubkey: Pubkey,
    pub fee_recipient: Pubkey,
    pub fee: u64,
}

/// Input for [`TransactionParameters::build`]
#[derive(Debug, Clone)]
pub struct TransactionParametersConfig {
    pub action: Action,
    pub in_utxos: Vec<Utxo>,
    pub out_utxos: Vec<Utxo>,
    pub transaction_merkle_tree: Pubkey,
    /// Public token account funding a shield
    pub sender_spl: Option<Pubkey>,
    pub sender_sol: Option<Pubkey>,
    /// Public accounts receiving an unshield
    pub recipient_spl: Option<Pubkey>,
    pub recipient_sol: Option<Pubkey>,
    pub relayer: Option<Relayer>,
    pub message: Option<Vec<u8>>,
    pub message_merkle_tree: Option<Pubkey>,
    pub verifier: VerifierConfig,
    /// First prefix counter for symmetrically encrypted outputs
    pub prefix_counter: u32,
}

impl TransactionParametersConfig {
    pub fn new(action: Action, transaction_merkle_tree: Pubkey, verifier: VerifierConfig) -> Self {
        Self {
            action,
            in_utxos: Vec::new(),
            out_utxos: Vec::new(),
            transaction_merkle_tree,
            sender_spl: None,
            sender_sol: None,
            recipient_spl: None,
            recipient_sol: None,
            relayer: None,
            message: None,
            message_merkle_tree: None,
            verifier,
            prefix_counter: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionParameters {
    pub action: Action,
    /// Padded to the verifier's input arity
    pub in_utxos: Vec<Utxo>,
    /// Padded to the verifier's output arity
    pub out_utxos: Vec<Utxo>,
    pub transaction_merkle_tree: Pubkey,
    pub sender_spl: Option<Pubkey>,
    pub sender_sol: Option<Pubkey>,
    pub recipient_spl: Option<Pubkey>,
    pub recipient_sol: Option<Pubkey>,
    pub relayer: Option<Relayer>,
    pub message: Option<Vec<u8>>,
    pub message_merkle_tree: Option<Pubkey>,
    pub verifier: VerifierConfig,
    pub asset_pubkeys: [Pubkey; N_ASSET_PUBKEYS],
    pub asset_pubkeys_circuit: [Fr; N_ASSET_PUBKEYS],
    /// Σout - Σin of the mint at `asset_pubkeys[1]`, mod p
    pub public_amount_spl: Fr,
    /// Σout - Σin of the native asset, mod p
    pub public_amount_sol: Fr,
    pub nullifiers: Vec<Fr>,
    pub commitments: Vec<Fr>,
    /// Outputs in order, each padded to its ledger slot
    pub encrypted_utxos: Vec<u8>,
    pub tx_integrity_hash: Fr,
}

fn fail(
    kind: TransactionParametersErrorCode,
    message: impl Into<String>,
) -> TransactionParametersError {
    TransactionParametersError::new(kind, ORIGIN, message)
}

impl TransactionParameters {
    pub fn build<R: RngCore + CryptoRng>(
        config: TransactionParametersConfig,
        tables: &LookupTables,
        account: &Account,
        rng: &mut R,
    ) -> Result<Self, TransactionParametersError> {
        let TransactionParametersConfig {
            action,
            mut in_utxos,
            mut out_utxos,
            transaction_merkle_tree,
            sender_spl,
            sender_sol,
            recipient_spl,
            recipient_sol,
            relayer,
            message,
            message_merkle_tree,
            verifier,
            prefix_counter,
        } = config;

        if in_utxos.len() > verifier.in_utxos || out_utxos.len() > verifier.out_utxos {
            return Err(fail(
                TransactionParametersErrorCode::ExceededMaxUtxos,
                format!(
                    "{} inputs and {} outputs, verifier takes {} and {}",
                    in_utxos.len(),
                    out_utxos.len(),
                    verifier.in_utxos,
                    verifier.out_utxos
                ),
            ));
        }
        if in_utxos.is_empty() && out_utxos.is_empty() {
            return Err(fail(
                TransactionParametersErrorCode::NoUtxosProvided,
                "no input or output utxos",
            ));
        }

        let (asset_pubkeys, asset_pubkeys_circuit) =
            collect_asset_pubkeys(&in_utxos, &out_utxos, tables)?;

        while in_utxos.len() < verifier.in_utxos {
            in_utxos.push(Utxo::empty(account.owner(), tables, rng).map_err(utxo_error)?);
        }
        while out_utxos.len() < verifier.out_utxos {
            out_utxos.push(Utxo::empty(account.owner(), tables, rng).map_err(utxo_error)?);
        }

        let spl_mint = asset_pubkeys[1];
        let public_amount_sol = public_amount(&in_utxos, &out_utxos, &Pubkey::NATIVE);
        let public_amount_spl = if spl_mint.is_native() {
            Fr::zero()
        } else {
            public_amount(&in_utxos, &out_utxos, &spl_mint)
        };
        // assets past the spl slot have no public amount and must balance inside the pool
        for asset in asset_pubkeys[2..].iter().filter(|a| !a.is_native()) {
            if !public_amount(&in_utxos, &out_utxos, asset).is_zero() {
                return Err(fail(
                    TransactionParametersErrorCode::InvalidPublicAmount,
                    format!("inputs and outputs of {asset} do not balance"),
                ));
            }
        }

        let routing = Routing {
            sender_spl,
            sender_sol,
            recipient_spl,
            recipient_sol,
            relayer,
        };
        routing.check(action, &public_amount_spl, &public_amount_sol)?;

        match (&message, &message_merkle_tree) {
            (Some(_), None) => {
                return Err(fail(
                    TransactionParametersErrorCode::MessageMerkleTreeUndefined,
                    "message without message merkle tree",
                ));
            }
            (None, Some(tree)) => {
                return Err(fail(
                    TransactionParametersErrorCode::MessageUndefined,
                    format!("message merkle tree {tree} without message"),
                ));
            }
            (None, None) if verifier.is_storage => {
                return Err(fail(
                    TransactionParametersErrorCode::MessageUndefined,
                    "storage verifier requires a message",
                ));
            }
            _ => {}
        }

        let encrypted_utxos = encrypt_outputs(
            &out_utxos,
            account,
            &transaction_merkle_tree,
            prefix_counter,
            tables,
            rng,
        )?;

        let tx_integrity_hash = integrity_hash(
            message.as_deref(),
            if verifier.is_storage {
                None
            } else {
                recipient_spl
            },
            recipient_sol,
            relayer.as_ref(),
            &encrypted_utxos,
        );

        let nullifiers = in_utxos
            .iter()
            .map(|utxo| utxo.nullifier(account))
            .collect::<Result<Vec<_>, _>>()
            .map_err(utxo_error)?;
        let commitments = out_utxos.iter().map(Utxo::commitment).collect();

        log::debug!(
            "built {action} parameters: {} inputs, {} outputs, {} encrypted bytes",
            in_utxos.len(),
            out_utxos.len(),
            encrypted_utxos.len()
        );

        Ok(Self {
            action,
            in_utxos,
            out_utxos,
            transaction_merkle_tree,
            sender_spl,
            sender_sol,
            recipient_spl,
            recipient_sol,
            relayer,
            message,
            message_merkle_tree,
            verifier,
            asset_pubkeys,
            asset_pubkeys_circuit,
            public_amount_spl,
            public_amount_sol,
            nullifiers,
            commitments,
            encrypted_utxos,
            tx_integrity_hash,
        })
    }

    /// Fee paid to the relayer, zero for shields
    pub fn relayer_fee(&self) -> u64 {
        self.relayer.map_or(0, |r| r.fee)
    }

    /// Mint at the spl slot, if the transaction moves one
    pub fn spl_mint(&self) -> Option<Pubkey> {
        (!self.asset_pubkeys[1].is_native()).then_some(self.asset_pubkeys[1])
    }
}

/// Native first, then distinct non-native assets of inputs and outputs
fn collect_asset_pubkeys(
    in_utxos: &[Utxo],
    out_utxos: &[Utxo],
    tables: &LookupTables,
) -> Result<([Pubkey; N_ASSET_PUBKEYS], [Fr; N_ASSET_PUBKEYS]), TransactionParametersError> {
    let mut assets = vec![Pubkey::NATIVE];
    for asset in in_utxos.iter().chain(out_utxos).filter_map(Utxo::spl_asset) {
        if !assets.contains(&asset) {
            assets.push(asset);
        }
    }
    if assets.len() > N_ASSET_PUBKEYS {
        return Err(fail(
            TransactionParametersErrorCode::ExceededMaxAssets,
            format!("{} assets, max {N_ASSET_PUBKEYS}", assets.len()),
        ));
    }

    let mut pubkeys = [Pubkey::NATIVE; N_ASSET_PUBKEYS];
    let mut circuit = [Fr::zero(); N_ASSET_PUBKEYS];
    for (i, asset) in assets.iter().enumerate() {
        pubkeys[i] = *asset;
        circuit[i] = tables.assets.circuit_value(asset).map_err(utxo_error)?;
    }
    Ok((pubkeys, circuit))
}

fn public_amount(in_utxos: &[Utxo], out_utxos: &[Utxo], asset: &Pubkey) -> Fr {
    let sum = |utxos: &[Utxo]| {
        utxos
            .iter()
            .fold(Fr::zero(), |acc, u| acc + Fr::from(u.amount_of(asset)))
    };
    sum(out_utxos) - sum(in_utxos)
}

/// Public accounts a transaction touches
struct Routing {
    sender_spl: Option<Pubkey>,
    sender_sol: Option<Pubkey>,
    recipient_spl: Option<Pubkey>,
    recipient_sol: Option<Pubkey>,
    relayer: Option<Relayer>,
}

impl Routing {
    fn check(
        &self,
        action: Action,
        public_amount_spl: &Fr,
        public_amount_sol: &Fr,
    ) -> Result<(), TransactionParametersError> {
        use TransactionParametersErrorCode as Code;

        let has_sender = self.sender_spl.is_some() || self.sender_sol.is_some();
        let has_recipient = self.recipient_spl.is_some() || self.recipient_sol.is_some();

        match action {
            Action::Shield => {
                if self.relayer.is_some() {
                    return Err(fail(Code::RelayerDefined, "shield is sent by the depositor"));
                }
                if has_recipient {
                    return Err(fail(Code::RecipientDefined, "shield has no public recipient"));
                }
                let deposit_spl = as_u64(public_amount_spl, "public spl amount")?;
                let deposit_sol = as_u64(public_amount_sol, "public sol amount")?;
                if deposit_spl > 0 && self.sender_spl.is_none() {
                    return Err(fail(
                        Code::SplSenderUndefined,
                        format!("depositing {deposit_spl} spl"),
                    ));
                }
                if deposit_sol > 0 && self.sender_sol.is_none() {
                    return Err(fail(
                        Code::SolSenderUndefined,
                        format!("depositing {deposit_sol} sol"),
                    ));
                }
            }
            Action::Unshield => {
                let relayer = self.relayer.as_ref().ok_or_else(|| {
                    fail(Code::RelayerUndefined, "unshield is sent by a relayer")
                })?;
                if has_sender {
                    return Err(fail(Code::SenderDefined, "unshield has no public sender"));
                }
                let withdraw_spl = as_u64(&-*public_amount_spl, "withdrawn spl amount")?;
                let withdraw_sol = as_u64(&-*public_amount_sol, "withdrawn sol amount")?;
                if withdraw_sol < relayer.fee {
                    return Err(fail(
                        Code::RelayerInvalid,
                        format!("withdrawn sol {withdraw_sol} below relayer fee {}", relayer.fee),
                    ));
                }
                if withdraw_spl > 0 && self.recipient_spl.is_none() {
                    return Err(fail(
                        Code::SplRecipientUndefined,
                        format!("withdrawing {withdraw_spl} spl"),
                    ));
                }
                if withdraw_sol > relayer.fee && self.recipient_sol.is_none() {
                    return Err(fail(
                        Code::SolRecipientUndefined,
                        format!("withdrawing {} sol", withdraw_sol - relayer.fee),
                    ));
                }
            }
            Action::Transfer => {
                let relayer = self.relayer.as_ref().ok_or_else(|| {
                    fail(Code::RelayerUndefined, "transfer is sent by a relayer")
                })?;
                if !public_amount_spl.is_zero() {
                    return Err(fail(
                        Code::InvalidPublicAmount,
                        "transfer moves spl out of the pool",
                    ));
                }
                if *public_amount_sol != -Fr::from(relayer.fee) {
                    return Err(fail(
                        Code::RelayerInvalid,
                        format!("public sol amount must pay exactly the fee {}", relayer.fee),
                    ));
                }
                if has_recipient {
                    return Err(fail(Code::RecipientDefined, "transfer has no public recipient"));
                }
                if has_sender {
                    return Err(fail(Code::SenderDefined, "transfer has no public sender"));
                }
            }
        }
        Ok(())
    }
}

fn as_u64(amount: &Fr, what: &str) -> Result<u64, TransactionParametersError> {
    fr_to_u64(amount).ok_or_else(|| {
        fail(
            TransactionParametersErrorCode::InvalidPublicAmount,
            format!("{what} does not fit u64"),
        )
    })
}

/// Own outputs are encrypted symmetrically, all others to the owner's encryption key
fn encrypt_outputs<R: RngCore + CryptoRng>(
    out_utxos: &[Utxo],
    account: &Account,
    merkle_tree: &Pubkey,
    prefix_counter: u32,
    tables: &LookupTables,
    rng: &mut R,
) -> Result<Vec<u8>, TransactionParametersError> {
    let mut encrypted = Vec::with_capacity(out_utxos.len() * MAX_ENCRYPTED_UTXO_LENGTH);
    for (i, utxo) in out_utxos.iter().enumerate() {
        let mut blob = if utxo.account_id() == account.id() {
            let counter = prefix_counter.wrapping_add(i as u32);
            utxo.encrypt_symmetric(account, merkle_tree, counter, tables, true)
        } else {
            utxo.encrypt_anonymous(tables, true, rng)
        }
        .map_err(utxo_error)?;
        blob.resize(MAX_ENCRYPTED_UTXO_LENGTH, 0);
        encrypted.extend_from_slice(&blob);
    }
    Ok(encrypted)
}

/// keccak256 over message digest, recipients, fee and encrypted outputs, reduced mod p
pub fn integrity_hash(
    message: Option<&[u8]>,
    recipient_spl: Option<Pubkey>,
    recipient_sol: Option<Pubkey>,
    relayer: Option<&Relayer>,
    encrypted_utxos: &[u8],
) -> Fr {
    let message_hash: [u8; 32] = message.map_or([0u8; 32], |m| Sha256::digest(m).into());
    let covered = encrypted_utxos.len().min(INTEGRITY_HASH_ENCRYPTED_LENGTH);

    let mut hasher = Keccak256::new();
    hasher.update(message_hash);
    hasher.update(recipient_spl.unwrap_or_default().0);
    hasher.update(recipient_sol.unwrap_or_default().0);
    hasher.update(relayer.map_or([0u8; 32], |r| r.fee_recipient.0));
    hasher.update(relayer.map_or(0u64, |r| r.fee).to_le_bytes());
    hasher.update(&encrypted_utxos[..covered]);
    Fr::from_be_bytes_mod_order(&hasher.finalize())
}
