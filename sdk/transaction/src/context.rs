//! Protocol Context
//!
//! Typed view of an [`ObscuraConfig`]: parsed addresses, lookup tables and an
//! empty commitment tree with the configured shape.

use anyhow::{Context, Result};

use obscura_config::ObscuraConfig;
use obscura_privacy::{
    AssetLookupTable, IncrementalMerkleTree, LookupTables, Pubkey, VerifierLookupTable,
};

use crate::parameters::Relayer;
use crate::selection::MAX_SELECTED_UTXOS;
use crate::verifier::VerifierConfig;

#[derive(Debug, Clone)]
pub struct ProtocolContext {
    pub tables: LookupTables,
    pub relayer: Relayer,
    pub transaction_merkle_tree: Pubkey,
    pub tree: IncrementalMerkleTree,
    pub max_in_utxos: usize,
    pub verifier: VerifierConfig,
}

fn parse_pubkey(value: &str, field: &str) -> Result<Pubkey> {
    value
        .parse()
        .with_context(|| format!("Invalid {field}: {value}"))
}

impl ProtocolContext {
    pub fn from_config(config: &ObscuraConfig) -> Result<Self> {
        let mints = config
            .assets
            .mints
            .iter()
            .map(|m| parse_pubkey(m, "assets.mints entry"))
            .collect::<Result<Vec<_>>>()?;
        let system_verifier = parse_pubkey(&config.assets.system_verifier, "assets.system_verifier")?;
        let programs = config
            .assets
            .verifier_programs
            .iter()
            .map(|p| parse_pubkey(p, "assets.verifier_programs entry"))
            .collect::<Result<Vec<_>>>()?;

        let relayer = Relayer {
            pubkey: parse_pubkey(&config.relayer.pubkey, "relayer.pubkey")?,
            fee_recipient: parse_pubkey(&config.relayer.fee_recipient, "relayer.fee_recipient")?,
            fee: config.relayer.fee,
        };
        let transaction_merkle_tree = parse_pubkey(
            &config.tree.transaction_merkle_tree,
            "tree.transaction_merkle_tree",
        )?;

        let tree = IncrementalMerkleTree::new(config.tree.height, config.tree.root_history_size)
            .context("Invalid tree configuration")?;

        let max_in_utxos = config.transaction.max_in_utxos.clamp(1, MAX_SELECTED_UTXOS);
        if max_in_utxos != config.transaction.max_in_utxos {
            log::warn!(
                "transaction.max_in_utxos {} clamped to {max_in_utxos}",
                config.transaction.max_in_utxos
            );
        }

        log::info!(
            "protocol context: {} mints, {} verifier programs, tree height {}",
            mints.len(),
            programs.len(),
            tree.height()
        );

        Ok(Self {
            tables: LookupTables::new(
                AssetLookupTable::new(mints),
                VerifierLookupTable::new(system_verifier, programs),
            ),
            relayer,
            transaction_merkle_tree,
            tree,
            max_in_utxos,
            verifier: VerifierConfig::from_kind(config.transaction.verifier, system_verifier),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let context = ProtocolContext::from_config(&ObscuraConfig::default()).unwrap();
        assert_eq!(context.tree.height(), obscura_config::DEFAULT_TREE_HEIGHT);
        assert_eq!(context.relayer.fee, obscura_config::DEFAULT_RELAYER_FEE);
        assert_eq!(context.verifier.in_utxos, 2);
        assert_eq!(context.tables.assets.assets(), &[Pubkey::NATIVE]);
    }

    #[test]
    fn test_bad_address_names_field() {
        let mut config = ObscuraConfig::default();
        config.relayer.pubkey = "not-base58!".into();
        let err = ProtocolContext::from_config(&config).unwrap_err();
        assert!(format!("{err:#}").contains("relayer.pubkey"));
    }

    #[test]
    fn test_bad_tree_height() {
        let mut config = ObscuraConfig::default();
        config.tree.height = 0;
        let err = ProtocolContext::from_config(&config).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid tree configuration"));
    }
}
