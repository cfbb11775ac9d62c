//! Prover Boundary
//!
//! Collects the circuit inputs of a transaction and hands them to an
//! external prover.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Transaction Proof                           │
//! │                                                                 │
//! │  Public Inputs (fixed order, 32-byte big-endian each):          │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │ • root                (commitment tree root)              │  │
//! │  │ • public_amount_spl   (Σout - Σin of the mint, mod p)     │  │
//! │  │ • tx_integrity_hash   (binds routing and outputs)         │  │
//! │  │ • public_amount_sol   (Σout - Σin native, mod p)          │  │
//! │  │ • public_mint         (circuit form of the mint)          │  │
//! │  │ • nullifiers          (one per input)                     │  │
//! │  │ • commitments         (one per output)                    │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                                                                 │
//! │  Private Witness:                                               │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │ • amounts, blindings, owners of inputs and outputs        │  │
//! │  │ • private key, merkle paths of the inputs                 │  │
//! │  │ • asset table, app data hashes, pool types, verifiers     │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use ark_ff::Zero;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use obscura_privacy::{
    Account, Fr, MerkleTree, MerkleTreeErrorCode, N_ASSET_PUBKEYS, N_ASSETS, Utxo, fr_from_bytes,
    fr_to_be_bytes,
};

use crate::error::{ProverError, ProverErrorCode, account_error, merkle_error};
use crate::parameters::TransactionParameters;

// ============================================================================
// Proof Types
// ============================================================================

/// Witness of one input UTXO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputWitness {
    pub amounts: [Fr; N_ASSETS],
    pub assets: [Fr; N_ASSETS],
    pub blinding: Fr,
    pub app_data_hash: Fr,
    pub pool_type: Fr,
    pub verifier: Fr,
    /// Leaf position as a field element
    pub path_index: Fr,
    pub path_elements: Vec<Fr>,
}

/// Witness of one output UTXO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputWitness {
    pub amounts: [Fr; N_ASSETS],
    pub assets: [Fr; N_ASSETS],
    pub blinding: Fr,
    pub owner: Fr,
    pub app_data_hash: Fr,
    pub pool_type: Fr,
    pub verifier: Fr,
}

/// Everything the transaction circuit consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofInputs {
    // public
    pub root: Fr,
    pub public_amount_spl: Fr,
    pub tx_integrity_hash: Fr,
    pub public_amount_sol: Fr,
    pub public_mint: Fr,
    pub nullifiers: Vec<Fr>,
    pub commitments: Vec<Fr>,
    // private
    pub private_key: Fr,
    pub asset_pubkeys: [Fr; N_ASSET_PUBKEYS],
    pub inputs: Vec<InputWitness>,
    pub outputs: Vec<OutputWitness>,
}

/// What a prover returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverOutput {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<[u8; 32]>,
}

/// A proof whose public inputs match the locally derived ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionProof {
    pub proof: Vec<u8>,
    pub public_inputs: Vec<[u8; 32]>,
}

// ============================================================================
// Prover Trait
// ============================================================================

/// External proving backend
pub trait Prover {
    fn prove(&self, inputs: &ProofInputs) -> Result<ProverOutput>;
}

// ============================================================================
// Proof Inputs
// ============================================================================

impl ProofInputs {
    /// Collect the circuit inputs of `params` against the local copy of the tree
    pub fn new(
        params: &TransactionParameters,
        tree: &MerkleTree,
        account: &Account,
    ) -> Result<Self, ProverError> {
        const ORIGIN: &str = "ProofInputs::new";

        let root = fr_from_bytes(&tree.root()).ok_or_else(|| {
            ProverError::new(
                ProverErrorCode::MerkleTree(MerkleTreeErrorCode::FieldOverflow),
                ORIGIN,
                "tree root is not a field element",
            )
        })?;

        let inputs = params
            .in_utxos
            .iter()
            .map(|utxo| input_witness(utxo, tree))
            .collect::<Result<Vec<_>, _>>()?;
        let outputs = params.out_utxos.iter().map(output_witness).collect();

        Ok(Self {
            root,
            public_amount_spl: params.public_amount_spl,
            tx_integrity_hash: params.tx_integrity_hash,
            public_amount_sol: params.public_amount_sol,
            public_mint: params.asset_pubkeys_circuit[1],
            nullifiers: params.nullifiers.clone(),
            commitments: params.commitments.clone(),
            private_key: account.private_key().map_err(account_error)?,
            asset_pubkeys: params.asset_pubkeys_circuit,
            inputs,
            outputs,
        })
    }

    /// Public inputs in circuit order
    pub fn public_inputs(&self) -> Vec<Fr> {
        let mut public = vec![
            self.root,
            self.public_amount_spl,
            self.tx_integrity_hash,
            self.public_amount_sol,
            self.public_mint,
        ];
        public.extend_from_slice(&self.nullifiers);
        public.extend_from_slice(&self.commitments);
        public
    }

    /// Public inputs as 32-byte big-endian words
    pub fn public_inputs_bytes(&self) -> Vec<[u8; 32]> {
        self.public_inputs().iter().map(fr_to_be_bytes).collect()
    }
}

fn amounts(utxo: &Utxo) -> [Fr; N_ASSETS] {
    utxo.amounts().map(Fr::from)
}

fn input_witness(utxo: &Utxo, tree: &MerkleTree) -> Result<InputWitness, ProverError> {
    let (path_index, path_elements) = if utxo.is_zero_value() {
        (Fr::zero(), vec![Fr::zero(); tree.height()])
    } else {
        let commitment = utxo.commitment_bytes();
        let path = tree
            .index_of(&commitment)
            .and_then(|position| tree.path(position))
            .ok_or_else(|| {
                ProverError::new(
                    ProverErrorCode::InputUtxoNotInTree,
                    "ProofInputs::new",
                    format!("commitment {} is not a leaf", hex::encode(commitment)),
                )
            })?;
        (path.position_field(), path.to_field_elements().map_err(merkle_error)?)
    };

    Ok(InputWitness {
        amounts: amounts(utxo),
        assets: *utxo.assets_circuit(),
        blinding: utxo.blinding(),
        app_data_hash: utxo.app_data_hash(),
        pool_type: utxo.pool_type(),
        verifier: utxo.verifier_address_circuit(),
        path_index,
        path_elements,
    })
}

fn output_witness(utxo: &Utxo) -> OutputWitness {
    OutputWitness {
        amounts: amounts(utxo),
        assets: *utxo.assets_circuit(),
        blinding: utxo.blinding(),
        owner: utxo.owner().public_key,
        app_data_hash: utxo.app_data_hash(),
        pool_type: utxo.pool_type(),
        verifier: utxo.verifier_address_circuit(),
    }
}

/// Run `prover` and check its output against the locally derived public inputs
pub fn generate_proof<P: Prover + ?Sized>(
    prover: &P,
    inputs: &ProofInputs,
) -> Result<TransactionProof, ProverError> {
    const ORIGIN: &str = "generate_proof";

    let output = prover.prove(inputs).map_err(|e| {
        ProverError::new(ProverErrorCode::ProofGenerationFailed, ORIGIN, format!("{e:#}"))
    })?;

    if output.proof.is_empty() {
        return Err(ProverError::new(
            ProverErrorCode::InvalidProof,
            ORIGIN,
            "prover returned an empty proof",
        ));
    }
    let expected = inputs.public_inputs_bytes();
    if output.public_inputs != expected {
        return Err(ProverError::new(
            ProverErrorCode::InvalidProof,
            ORIGIN,
            format!(
                "prover returned {} public inputs that differ from the {} derived locally",
                output.public_inputs.len(),
                expected.len()
            ),
        ));
    }

    log::debug!(
        "proof generated: {} bytes, {} public inputs",
        output.proof.len(),
        expected.len()
    );
    Ok(TransactionProof {
        proof: output.proof,
        public_inputs: output.public_inputs,
    })
}

// ============================================================================
// Mock Prover
// ============================================================================

/// Mock proof size (a compressed Groth16 proof on BN254)
pub const MOCK_PROOF_LENGTH: usize = 256;

/// Prover producing salted hashes instead of proofs, for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct MockProver;

impl Prover for MockProver {
    fn prove(&self, inputs: &ProofInputs) -> Result<ProverOutput> {
        let public_inputs = inputs.public_inputs_bytes();

        let mut salt = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let mut hasher = blake3::Hasher::new_derive_key("obscura mock proof v1");
        hasher.update(&salt);
        for word in &public_inputs {
            hasher.update(word);
        }

        let mut proof = Vec::with_capacity(MOCK_PROOF_LENGTH);
        proof.extend_from_slice(hasher.finalize().as_bytes());
        proof.extend_from_slice(&salt);
        proof.resize(MOCK_PROOF_LENGTH, 0);

        Ok(ProverOutput {
            proof,
            public_inputs,
        })
    }
}
