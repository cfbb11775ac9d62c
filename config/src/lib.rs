//! Obscura Configuration
//!
//! Protocol parameters shared by the Obscura SDK crates.
//!
//! Handles loading configuration from:
//! 1. OBSCURA_CONFIG env var (explicit path)
//! 2. ./obscura.toml (current directory)
//! 3. ~/.obscura/config.toml (user home)
//!
//! Environment variables take precedence over TOML config. Addresses are kept
//! as base58 strings here and parsed by the consumer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_CONFIG_FILE_NAME: &str = "obscura.toml";
const CONFIG_DIR_NAME: &str = ".obscura";

// ============================================================================
// Default Constants
// ============================================================================

pub const DEFAULT_TREE_HEIGHT: usize = 18;
pub const DEFAULT_ROOT_HISTORY_SIZE: usize = 256;
pub const DEFAULT_RELAYER_FEE: u64 = 5_000;
pub const DEFAULT_MAX_IN_UTXOS: usize = 2;

const DEFAULT_TRANSACTION_MERKLE_TREE: &str = "EagkqaLEFh9iD4t3PQxPaKAXPukw919jt5EoJywUX5X6";
const DEFAULT_RELAYER_PUBKEY: &str = "G98npV6pSjPLS9JYejAqRExwAiXYubAM4eAWqQPQzuXB";
const DEFAULT_FEE_RECIPIENT: &str = "Hjcm7vVbmiP8R1uFTZSjymMRkMRHRqzDtWqQ9yDSjJY7";
const DEFAULT_SYSTEM_VERIFIER: &str = "FdFVG6qotLZKL61zJ5r5zjkno2aWEWZtVp4ZosEJPxHp";
const SAMPLE_MINT: &str = "BnvnAHdEAyQLfJ17YmMFHtik3Wo5anH4rRLefRvBMXZB";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObscuraConfig {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub transaction: TransactionConfig,
}

/// Commitment tree parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_height")]
    pub height: usize,
    #[serde(default = "default_root_history_size")]
    pub root_history_size: usize,
    /// Ledger address of the transaction merkle tree
    #[serde(default = "default_transaction_merkle_tree")]
    pub transaction_merkle_tree: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            height: DEFAULT_TREE_HEIGHT,
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
            transaction_merkle_tree: DEFAULT_TRANSACTION_MERKLE_TREE.into(),
        }
    }
}

fn default_tree_height() -> usize {
    DEFAULT_TREE_HEIGHT
}
fn default_root_history_size() -> usize {
    DEFAULT_ROOT_HISTORY_SIZE
}
fn default_transaction_merkle_tree() -> String {
    DEFAULT_TRANSACTION_MERKLE_TREE.into()
}

/// Relayer that submits unshield and transfer transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    #[serde(default = "default_relayer_pubkey")]
    pub pubkey: String,
    #[serde(default = "default_fee_recipient")]
    pub fee_recipient: String,
    #[serde(default = "default_relayer_fee")]
    pub fee: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            pubkey: DEFAULT_RELAYER_PUBKEY.into(),
            fee_recipient: DEFAULT_FEE_RECIPIENT.into(),
            fee: DEFAULT_RELAYER_FEE,
        }
    }
}

fn default_relayer_pubkey() -> String {
    DEFAULT_RELAYER_PUBKEY.into()
}
fn default_fee_recipient() -> String {
    DEFAULT_FEE_RECIPIENT.into()
}
fn default_relayer_fee() -> u64 {
    DEFAULT_RELAYER_FEE
}

/// Asset and verifier lookup tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Non-native mints, in lookup table order
    #[serde(default)]
    pub mints: Vec<String>,
    #[serde(default = "default_system_verifier")]
    pub system_verifier: String,
    /// Application verifiers, in lookup table order after the system verifier
    #[serde(default)]
    pub verifier_programs: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            mints: Vec::new(),
            system_verifier: DEFAULT_SYSTEM_VERIFIER.into(),
            verifier_programs: Vec::new(),
        }
    }
}

fn default_system_verifier() -> String {
    DEFAULT_SYSTEM_VERIFIER.into()
}

/// Verifier circuit used for transactions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifierKind {
    #[default]
    SystemZero,
    SystemOne,
    SystemStorage,
}

/// Transaction building parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionConfig {
    #[serde(default = "default_max_in_utxos")]
    pub max_in_utxos: usize,
    #[serde(default)]
    pub verifier: VerifierKind,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_in_utxos: DEFAULT_MAX_IN_UTXOS,
            verifier: VerifierKind::SystemZero,
        }
    }
}

fn default_max_in_utxos() -> usize {
    DEFAULT_MAX_IN_UTXOS
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {key}={v}"),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl ObscuraConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("OBSCURA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("OBSCURA_CONFIG points to missing file: {}", path.display());
        }

        let local_path = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Tree
        env_parse("OBSCURA_TREE_HEIGHT", &mut self.tree.height);
        env_parse("OBSCURA_ROOT_HISTORY_SIZE", &mut self.tree.root_history_size);

        // Relayer
        env_string("OBSCURA_RELAYER_PUBKEY", &mut self.relayer.pubkey);
        env_parse("OBSCURA_RELAYER_FEE", &mut self.relayer.fee);

        // Transaction
        env_parse("OBSCURA_MAX_IN_UTXOS", &mut self.transaction.max_in_utxos);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.assets.mints = vec![SAMPLE_MINT.into()];
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ObscuraConfig::default();
        assert_eq!(config.tree.height, DEFAULT_TREE_HEIGHT);
        assert_eq!(config.tree.root_history_size, DEFAULT_ROOT_HISTORY_SIZE);
        assert_eq!(config.relayer.fee, DEFAULT_RELAYER_FEE);
        assert_eq!(config.transaction.verifier, VerifierKind::SystemZero);
        assert!(config.assets.mints.is_empty());
    }

    #[test]
    fn test_generate_sample() {
        let sample = ObscuraConfig::generate_sample();
        assert!(sample.contains("[tree]"));
        assert!(sample.contains("[relayer]"));
        assert!(sample.contains("[assets]"));
        assert!(sample.contains("[transaction]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ObscuraConfig::generate_sample();
        let parsed: ObscuraConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.assets.mints.len(), 1);
        assert_eq!(parsed.tree, TreeConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: ObscuraConfig = toml::from_str(
            r#"
            [tree]
            height = 20

            [transaction]
            verifier = "system_storage"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.tree.height, 20);
        assert_eq!(parsed.tree.root_history_size, DEFAULT_ROOT_HISTORY_SIZE);
        assert_eq!(parsed.transaction.verifier, VerifierKind::SystemStorage);
        assert_eq!(parsed.relayer, RelayerConfig::default());
    }

    #[test]
    fn test_load_from_reports_path() {
        let path = env::temp_dir().join(format!("obscura-bad-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"[tree\nheight = ").unwrap();

        let err = ObscuraConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
        fs::remove_file(&path).unwrap();
    }
}
