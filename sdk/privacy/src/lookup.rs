//! Lookup Tables
//!
//! Assets and verifiers are encoded by their index in a shared table when a
//! UTXO is serialized, and by their truncated hash inside the circuit. The
//! tables are passed explicitly to every operation that needs them.

use ark_bn254::Fr;
use ark_ff::Zero;
use serde::{Deserialize, Serialize};

use crate::error::{UtxoError, UtxoErrorCode};
use crate::pubkey::Pubkey;

/// Ordered asset table, index 0 is always the native asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAssetTable")]
pub struct AssetLookupTable {
    assets: Vec<Pubkey>,
}

impl AssetLookupTable {
    /// Build a table from non-native mints. Duplicates and the native asset are skipped.
    pub fn new(mints: impl IntoIterator<Item = Pubkey>) -> Self {
        let mut assets = vec![Pubkey::NATIVE];
        for mint in mints {
            if !assets.contains(&mint) {
                assets.push(mint);
            }
        }
        Self { assets }
    }

    pub fn index_of(&self, asset: &Pubkey) -> Result<u64, UtxoError> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| i as u64)
            .ok_or_else(|| {
                UtxoError::new(
                    UtxoErrorCode::AssetNotFound,
                    "AssetLookupTable::index_of",
                    format!("asset {asset} not in lookup table"),
                )
            })
    }

    pub fn get(&self, index: u64) -> Result<Pubkey, UtxoError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.assets.get(i))
            .copied()
            .ok_or_else(|| {
                UtxoError::new(
                    UtxoErrorCode::AssetNotFound,
                    "AssetLookupTable::get",
                    format!("no asset at index {index}"),
                )
            })
    }

    /// Circuit form of a registered asset
    pub fn circuit_value(&self, asset: &Pubkey) -> Result<Fr, UtxoError> {
        self.index_of(asset)?;
        Ok(asset.to_circuit())
    }

    pub fn assets(&self) -> &[Pubkey] {
        &self.assets
    }
}

impl Default for AssetLookupTable {
    fn default() -> Self {
        Self::new([])
    }
}

/// Ordered verifier table, index 0 is the system verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVerifierTable")]
pub struct VerifierLookupTable {
    verifiers: Vec<Pubkey>,
}

impl VerifierLookupTable {
    pub fn new(system_verifier: Pubkey, programs: impl IntoIterator<Item = Pubkey>) -> Self {
        let mut verifiers = vec![system_verifier];
        for program in programs {
            if !verifiers.contains(&program) {
                verifiers.push(program);
            }
        }
        Self { verifiers }
    }

    pub fn system_verifier(&self) -> Pubkey {
        self.verifiers[0]
    }

    pub fn index_of(&self, verifier: &Pubkey) -> Result<u64, UtxoError> {
        self.verifiers
            .iter()
            .position(|v| v == verifier)
            .map(|i| i as u64)
            .ok_or_else(|| {
                UtxoError::new(
                    UtxoErrorCode::VerifierIndexNotFound,
                    "VerifierLookupTable::index_of",
                    format!("verifier {verifier} not in lookup table"),
                )
            })
    }

    pub fn get(&self, index: u64) -> Result<Pubkey, UtxoError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.verifiers.get(i))
            .copied()
            .ok_or_else(|| {
                UtxoError::new(
                    UtxoErrorCode::VerifierIndexNotFound,
                    "VerifierLookupTable::get",
                    format!("no verifier at index {index}"),
                )
            })
    }

    /// Circuit form: zero for the system verifier, truncated hash otherwise
    pub fn circuit_value(&self, verifier: &Pubkey) -> Result<Fr, UtxoError> {
        match self.index_of(verifier)? {
            0 => Ok(Fr::zero()),
            _ => Ok(verifier.to_circuit()),
        }
    }

    pub fn verifiers(&self) -> &[Pubkey] {
        &self.verifiers
    }
}

impl Default for VerifierLookupTable {
    fn default() -> Self {
        Self::new(Pubkey::NATIVE, [])
    }
}

#[derive(Deserialize)]
struct RawAssetTable {
    assets: Vec<Pubkey>,
}

impl TryFrom<RawAssetTable> for AssetLookupTable {
    type Error = UtxoError;

    fn try_from(raw: RawAssetTable) -> Result<Self, Self::Error> {
        match raw.assets.first() {
            Some(first) if first.is_native() => Ok(Self { assets: raw.assets }),
            _ => Err(UtxoError::new(
                UtxoErrorCode::AssetNotFound,
                "AssetLookupTable::deserialize",
                "asset table must start with the native asset",
            )),
        }
    }
}

#[derive(Deserialize)]
struct RawVerifierTable {
    verifiers: Vec<Pubkey>,
}

impl TryFrom<RawVerifierTable> for VerifierLookupTable {
    type Error = UtxoError;

    fn try_from(raw: RawVerifierTable) -> Result<Self, Self::Error> {
        if raw.verifiers.is_empty() {
            return Err(UtxoError::new(
                UtxoErrorCode::VerifierIndexNotFound,
                "VerifierLookupTable::deserialize",
                "verifier table has no system verifier",
            ));
        }
        Ok(Self {
            verifiers: raw.verifiers,
        })
    }
}

/// Both tables, as handed to UTXO construction and serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupTables {
    pub assets: AssetLookupTable,
    pub verifiers: VerifierLookupTable,
}

impl LookupTables {
    pub fn new(assets: AssetLookupTable, verifiers: VerifierLookupTable) -> Self {
        Self { assets, verifiers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_is_first() {
        let table = AssetLookupTable::new([Pubkey([1; 32]), Pubkey::NATIVE, Pubkey([1; 32])]);
        assert_eq!(table.assets().len(), 2);
        assert_eq!(table.index_of(&Pubkey::NATIVE).unwrap(), 0);
        assert_eq!(table.index_of(&Pubkey([1; 32])).unwrap(), 1);
    }

    #[test]
    fn test_unknown_asset() {
        let table = AssetLookupTable::default();
        let err = table.index_of(&Pubkey([5; 32])).unwrap_err();
        assert_eq!(err.kind, UtxoErrorCode::AssetNotFound);
        assert_eq!(table.get(3).unwrap_err().kind, UtxoErrorCode::AssetNotFound);
    }

    #[test]
    fn test_deserialize_rejects_empty_tables() {
        let err = serde_json::from_str::<VerifierLookupTable>(r#"{"verifiers":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no system verifier"));
        assert!(serde_json::from_str::<AssetLookupTable>(r#"{"assets":[]}"#).is_err());

        let tables = LookupTables::new(
            AssetLookupTable::new([Pubkey([1; 32])]),
            VerifierLookupTable::new(Pubkey([2; 32]), []),
        );
        let json = serde_json::to_string(&tables).unwrap();
        let parsed: LookupTables = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.verifiers.system_verifier(), Pubkey([2; 32]));
        assert_eq!(parsed, tables);
    }

    #[test]
    fn test_asset_table_must_start_native() {
        let raw = RawAssetTable {
            assets: vec![Pubkey([1; 32])],
        };
        let err = AssetLookupTable::try_from(raw).unwrap_err();
        assert_eq!(err.kind, UtxoErrorCode::AssetNotFound);
    }

    #[test]
    fn test_system_verifier_circuit_is_zero() {
        let table = VerifierLookupTable::new(Pubkey([2; 32]), [Pubkey([3; 32])]);
        assert_eq!(table.circuit_value(&Pubkey([2; 32])).unwrap(), Fr::zero());
        assert_eq!(
            table.circuit_value(&Pubkey([3; 32])).unwrap(),
            Pubkey([3; 32]).to_circuit()
        );
        assert_eq!(
            table.index_of(&Pubkey([4; 32])).unwrap_err().kind,
            UtxoErrorCode::VerifierIndexNotFound
        );
    }
}
