//! Balance Tracking
//!
//! UTXOs found on the ledger are grouped by mint. Native-only UTXOs live
//! under [`Pubkey::NATIVE`].
//!
//! ```text
//! available ──commit_utxo──► committed ──move_to_spent──► spent
//!     └───────────────────move_to_spent─────────────────────┘
//! ```
//!
//! Totals only count available UTXOs.

use std::collections::{BTreeMap, HashSet};

use obscura_privacy::{
    Account, DecryptUtxo, EncryptionScheme, LookupTables, Pubkey, UTXO_PREFIX_LENGTH, Utxo,
    UtxoError, UtxoErrorCode, fr_to_bytes,
};

use crate::ledger::RecordAccount;

/// UTXOs of one mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenUtxoBalance {
    pub mint: Pubkey,
    pub total_spl: u64,
    pub total_sol: u64,
    pub available: BTreeMap<[u8; 32], Utxo>,
    pub committed: BTreeMap<[u8; 32], Utxo>,
    pub spent: BTreeMap<[u8; 32], Utxo>,
}

impl TokenUtxoBalance {
    pub fn new(mint: Pubkey) -> Self {
        Self {
            mint,
            total_spl: 0,
            total_sol: 0,
            available: BTreeMap::new(),
            committed: BTreeMap::new(),
            spent: BTreeMap::new(),
        }
    }

    pub fn contains(&self, commitment: &[u8; 32]) -> bool {
        self.available.contains_key(commitment)
            || self.committed.contains_key(commitment)
            || self.spent.contains_key(commitment)
    }

    /// Add an available UTXO, false if it is already tracked
    pub fn add_utxo(&mut self, utxo: Utxo) -> bool {
        let commitment = utxo.commitment_bytes();
        if self.contains(&commitment) {
            return false;
        }
        self.credit(&utxo);
        self.available.insert(commitment, utxo);
        true
    }

    /// Reserve an available UTXO for a pending transaction
    pub fn commit_utxo(&mut self, commitment: &[u8; 32]) -> bool {
        match self.available.remove(commitment) {
            Some(utxo) => {
                self.debit(&utxo);
                self.committed.insert(*commitment, utxo);
                true
            }
            None => false,
        }
    }

    pub fn move_to_spent(&mut self, commitment: &[u8; 32]) -> bool {
        if let Some(utxo) = self.available.remove(commitment) {
            self.debit(&utxo);
            self.spent.insert(*commitment, utxo);
            return true;
        }
        match self.committed.remove(commitment) {
            Some(utxo) => {
                self.spent.insert(*commitment, utxo);
                true
            }
            None => false,
        }
    }

    fn credit(&mut self, utxo: &Utxo) {
        self.total_sol = self.total_sol.saturating_add(utxo.sol_amount());
        self.total_spl = self.total_spl.saturating_add(utxo.spl_amount());
    }

    fn debit(&mut self, utxo: &Utxo) {
        self.total_sol = self.total_sol.saturating_sub(utxo.sol_amount());
        self.total_spl = self.total_spl.saturating_sub(utxo.spl_amount());
    }
}

/// Mint → UTXOs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    pub tokens: BTreeMap<Pubkey, TokenUtxoBalance>,
}

impl Balance {
    pub fn add_utxo(&mut self, utxo: Utxo) -> bool {
        let mint = utxo.spl_asset().unwrap_or(Pubkey::NATIVE);
        self.tokens
            .entry(mint)
            .or_insert_with(|| TokenUtxoBalance::new(mint))
            .add_utxo(utxo)
    }

    pub fn contains(&self, commitment: &[u8; 32]) -> bool {
        self.tokens.values().any(|t| t.contains(commitment))
    }

    pub fn total_sol_balance(&self) -> u64 {
        self.tokens
            .values()
            .fold(0u64, |acc, t| acc.saturating_add(t.total_sol))
    }

    pub fn total_spl_balance(&self, mint: &Pubkey) -> u64 {
        self.tokens.get(mint).map_or(0, |t| t.total_spl)
    }

    /// Selection candidates for `mint`: its available UTXOs, then native-only ones
    pub fn utxos_for(&self, mint: &Pubkey) -> Vec<Utxo> {
        let mut utxos: Vec<Utxo> = self
            .tokens
            .get(mint)
            .map(|t| t.available.values().cloned().collect())
            .unwrap_or_default();
        if !mint.is_native() {
            if let Some(native) = self.tokens.get(&Pubkey::NATIVE) {
                utxos.extend(native.available.values().cloned());
            }
        }
        utxos
    }

    pub fn commit_utxo(&mut self, commitment: &[u8; 32]) -> bool {
        self.tokens.values_mut().any(|t| t.commit_utxo(commitment))
    }

    /// Move every tracked UTXO whose nullifier is in `nullifiers` to spent
    pub fn mark_spent(
        &mut self,
        nullifiers: &HashSet<[u8; 32]>,
        account: &Account,
    ) -> Result<usize, UtxoError> {
        let mut moved = 0;
        for token in self.tokens.values_mut() {
            let mut spent = Vec::new();
            for (commitment, utxo) in token.available.iter().chain(token.committed.iter()) {
                if nullifiers.contains(&fr_to_bytes(&utxo.nullifier(account)?)) {
                    spent.push(*commitment);
                }
            }
            for commitment in spent {
                if token.move_to_spent(&commitment) {
                    moved += 1;
                }
            }
        }
        Ok(moved)
    }
}

/// Outcome of one [`BalanceTracker::sync`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Leaves not seen before
    pub scanned: usize,
    /// Own outputs added to the balance
    pub decrypted: usize,
    /// Outputs from others added to the inbox
    pub received: usize,
    /// Tracked UTXOs found spent
    pub spent: usize,
}

/// Balance of own outputs plus an inbox of outputs received from others
#[derive(Debug, Clone, Default)]
pub struct BalanceTracker {
    pub balance: Balance,
    pub inbox: Balance,
}

impl BalanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `records` for UTXOs belonging to `account`
    ///
    /// View-only accounts hold neither the decryption keys nor the private key
    /// for nullifiers and are rejected before any leaf is read.
    pub fn sync(
        &mut self,
        records: &RecordAccount,
        account: &Account,
        tables: &LookupTables,
        merkle_tree: &Pubkey,
    ) -> Result<SyncReport, UtxoError> {
        if account.is_view_only() {
            return Err(UtxoError::new(
                UtxoErrorCode::AccountHasNoPrivkey,
                "BalanceTracker::sync",
                "view-only account cannot decrypt or nullify utxos",
            ));
        }

        let mut report = SyncReport::default();
        let anonymous_prefix = account.encryption_public_key();

        for (position, leaf) in records.leaves.iter().enumerate() {
            if self.balance.contains(&leaf.commitment) || self.inbox.contains(&leaf.commitment) {
                continue;
            }
            report.scanned += 1;

            let ciphertext: &[u8] = &leaf.encrypted_utxo;
            let commitment = leaf.commitment;
            let decrypt = move |scheme: EncryptionScheme| DecryptUtxo {
                account,
                ciphertext,
                scheme,
                commitment,
                check_commitment: true,
                compressed: true,
                app_data_idl: None,
                index: Some(position as u64),
            };

            let symmetric = EncryptionScheme::Symmetric {
                merkle_tree: *merkle_tree,
            };
            if let Some(utxo) = Utxo::decrypt(decrypt(symmetric), tables)? {
                if !utxo.is_zero_value() && self.balance.add_utxo(utxo) {
                    report.decrypted += 1;
                }
                continue;
            }

            let addressed_to_us = leaf
                .encrypted_utxo
                .get(..UTXO_PREFIX_LENGTH)
                .is_some_and(|prefix| prefix == &anonymous_prefix[..UTXO_PREFIX_LENGTH]);
            if !addressed_to_us {
                continue;
            }
            if let Some(utxo) = Utxo::decrypt(decrypt(EncryptionScheme::Anonymous), tables)? {
                if !utxo.is_zero_value() && self.inbox.add_utxo(utxo) {
                    report.received += 1;
                }
            }
        }

        let nullifiers = records.nullifier_set();
        report.spent = self.balance.mark_spent(&nullifiers, account)?
            + self.inbox.mark_spent(&nullifiers, account)?;

        log::info!(
            "synced {} new leaves: {} own, {} received, {} spent",
            report.scanned,
            report.decrypted,
            report.received,
            report.spent
        );
        Ok(report)
    }
}
