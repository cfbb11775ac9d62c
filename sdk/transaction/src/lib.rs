//! Obscura Transactions
//!
//! Builds shielded transactions out of the primitives in `obscura-privacy`.
//!
//! ```text
//! BalanceTracker::sync ──► Balance::utxos_for ──► select_in_utxos
//!                                                       │
//!                      create_out_utxos ◄───────────────┘
//!                              │
//!                              ▼
//!                TransactionParameters::build ──► ProofInputs ──► generate_proof
//! ```
//!
//! Everything here is synchronous. Reading ledger accounts and running the
//! prover happen behind the [`LedgerReader`] and [`Prover`] traits.

pub mod action;
pub mod balance;
pub mod context;
pub mod error;
pub mod ledger;
pub mod outputs;
pub mod parameters;
pub mod prover;
pub mod selection;
pub mod verifier;

pub use action::Action;
pub use balance::{Balance, BalanceTracker, SyncReport, TokenUtxoBalance};
pub use context::ProtocolContext;
pub use error::{
    LedgerError, LedgerErrorCode, ProverError, ProverErrorCode, SelectInUtxosError,
    SelectInUtxosErrorCode, TransactionParametersError, TransactionParametersErrorCode,
};
pub use ledger::{LeafRecord, LedgerReader, RecordAccount, fetch_record_account};
pub use outputs::{CreateOutUtxos, Recipient, create_out_utxos};
pub use parameters::{Relayer, TransactionParameters, TransactionParametersConfig};
pub use prover::{
    InputWitness, MockProver, OutputWitness, ProofInputs, Prover, ProverOutput, TransactionProof,
    generate_proof,
};
pub use selection::{MAX_SELECTED_UTXOS, SelectionRequest, select_in_utxos};
pub use verifier::VerifierConfig;
