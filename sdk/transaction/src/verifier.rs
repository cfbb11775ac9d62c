use serde::{Deserialize, Serialize};

use obscura_config::VerifierKind;
use obscura_privacy::Pubkey;

/// Arity of a verifier circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    pub address: Pubkey,
    pub in_utxos: usize,
    pub out_utxos: usize,
    /// Storage verifiers require a message
    pub is_storage: bool,
}

impl VerifierConfig {
    /// Two inputs, two outputs
    pub fn system_zero(address: Pubkey) -> Self {
        Self {
            address,
            in_utxos: 2,
            out_utxos: 2,
            is_storage: false,
        }
    }

    /// Ten inputs, two outputs
    pub fn system_one(address: Pubkey) -> Self {
        Self {
            address,
            in_utxos: 10,
            out_utxos: 2,
            is_storage: false,
        }
    }

    /// Two inputs, two outputs, mandatory message
    pub fn system_storage(address: Pubkey) -> Self {
        Self {
            address,
            in_utxos: 2,
            out_utxos: 2,
            is_storage: true,
        }
    }

    pub fn from_kind(kind: VerifierKind, address: Pubkey) -> Self {
        match kind {
            VerifierKind::SystemZero => Self::system_zero(address),
            VerifierKind::SystemOne => Self::system_one(address),
            VerifierKind::SystemStorage => Self::system_storage(address),
        }
    }
}
