use obscura_privacy::{
    Account, AssetLookupTable, Fr, IncrementalMerkleTree, LookupTables, MAX_ENCRYPTED_UTXO_LENGTH,
    MerkleTree, Pubkey, VerifierLookupTable, fr_to_bytes,
};
use obscura_transaction::{
    Action, BalanceTracker, CreateOutUtxos, LeafRecord, MockProver, ProofInputs, ProverErrorCode,
    Recipient, RecordAccount, Relayer, SelectionRequest, TransactionParameters,
    TransactionParametersConfig, VerifierConfig, create_out_utxos, generate_proof,
    select_in_utxos,
};
use rand::rngs::OsRng;

const MINT: Pubkey = Pubkey([0x61; 32]);
const SYSTEM_VERIFIER: Pubkey = Pubkey([0xaa; 32]);
const TREE: Pubkey = Pubkey([0x62; 32]);
const HEIGHT: usize = 18;

fn tables() -> LookupTables {
    LookupTables::new(
        AssetLookupTable::new([MINT]),
        VerifierLookupTable::new(SYSTEM_VERIFIER, []),
    )
}

fn relayer() -> Relayer {
    Relayer {
        pubkey: Pubkey([0x70; 32]),
        fee_recipient: Pubkey([0x71; 32]),
        fee: 5_000,
    }
}

/// Local mirror of the on-chain state
struct Pool {
    tree: MerkleTree,
    incremental: IncrementalMerkleTree,
    records: RecordAccount,
}

impl Pool {
    fn new() -> Self {
        Self {
            tree: MerkleTree::new(HEIGHT).unwrap(),
            incremental: IncrementalMerkleTree::new(HEIGHT, 16).unwrap(),
            records: RecordAccount::default(),
        }
    }

    fn apply(&mut self, params: &TransactionParameters) {
        for nullifier in &params.nullifiers {
            self.records.nullifiers.push(fr_to_bytes(nullifier));
        }
        let slots = params.encrypted_utxos.chunks_exact(MAX_ENCRYPTED_UTXO_LENGTH);
        for (commitment, slot) in params.commitments.iter().zip(slots) {
            let leaf = fr_to_bytes(commitment);
            let a = self.tree.insert(leaf).unwrap();
            let b = self.incremental.insert(leaf).unwrap();
            assert_eq!(a, b);
            self.records.leaves.push(LeafRecord {
                commitment: leaf,
                encrypted_utxo: slot.to_vec(),
            });
        }
        assert_eq!(self.tree.root(), self.incremental.root());
    }

    /// Round trip through the ledger byte layout
    fn published(&self) -> RecordAccount {
        RecordAccount::from_bytes(&self.records.to_bytes()).unwrap()
    }
}

#[test]
fn shield_transfer_sync() {
    let _ = env_logger::builder().is_test(true).try_init();

    let tables = tables();
    let verifier = VerifierConfig::system_zero(SYSTEM_VERIFIER);
    let alice = Account::from_seed(&[31u8; 32]).unwrap();
    let bob = Account::from_seed(&[32u8; 32]).unwrap();
    let mut pool = Pool::new();

    // shield
    let request = SelectionRequest::new(Action::Shield)
        .with_public_spl(MINT, 500)
        .with_public_sol(1_000_000_000);
    let inputs = select_in_utxos(&[], &request).unwrap();
    let outputs = create_out_utxos(
        CreateOutUtxos {
            action: Action::Shield,
            in_utxos: &inputs,
            recipients: &[],
            change_owner: alice.owner(),
            public_mint: Some(MINT),
            public_spl_amount: 500,
            public_sol_amount: 1_000_000_000,
            relayer_fee: 0,
            verifier: &verifier,
        },
        &tables,
        &mut OsRng,
    )
    .unwrap();

    let mut config = TransactionParametersConfig::new(Action::Shield, TREE, verifier);
    config.in_utxos = inputs;
    config.out_utxos = outputs;
    config.sender_spl = Some(Pubkey([0x01; 32]));
    config.sender_sol = Some(Pubkey([0x02; 32]));
    let shield = TransactionParameters::build(config, &tables, &alice, &mut OsRng).unwrap();
    assert_eq!(shield.public_amount_sol, Fr::from(1_000_000_000u64));

    let proof_inputs = ProofInputs::new(&shield, &pool.tree, &alice).unwrap();
    generate_proof(&MockProver, &proof_inputs).unwrap();
    pool.apply(&shield);

    let mut alice_tracker = BalanceTracker::new();
    let report = alice_tracker
        .sync(&pool.published(), &alice, &tables, &TREE)
        .unwrap();
    assert_eq!(report.decrypted, 1);
    assert_eq!(alice_tracker.balance.total_sol_balance(), 1_000_000_000);
    assert_eq!(alice_tracker.balance.total_spl_balance(&MINT), 500);

    // transfer
    let recipient = Recipient {
        owner: bob.owner(),
        mint: MINT,
        spl_amount: 200,
        sol_amount: 100_000_000,
    };
    let request = SelectionRequest::new(Action::Transfer)
        .with_relayer_fee(relayer().fee)
        .with_recipient(recipient.clone());
    let candidates = alice_tracker.balance.utxos_for(&MINT);
    let inputs = select_in_utxos(&candidates, &request).unwrap();
    assert_eq!(inputs.len(), 1);

    let outputs = create_out_utxos(
        CreateOutUtxos {
            action: Action::Transfer,
            in_utxos: &inputs,
            recipients: &[recipient],
            change_owner: alice.owner(),
            public_mint: None,
            public_spl_amount: 0,
            public_sol_amount: 0,
            relayer_fee: relayer().fee,
            verifier: &verifier,
        },
        &tables,
        &mut OsRng,
    )
    .unwrap();

    let mut config = TransactionParametersConfig::new(Action::Transfer, TREE, verifier);
    config.in_utxos = inputs;
    config.out_utxos = outputs;
    config.relayer = Some(relayer());
    config.prefix_counter = 2;
    let transfer = TransactionParameters::build(config, &tables, &alice, &mut OsRng).unwrap();
    assert_eq!(transfer.public_amount_sol, -Fr::from(relayer().fee));

    let proof_inputs = ProofInputs::new(&transfer, &pool.tree, &alice).unwrap();
    assert!(pool
        .incremental
        .is_known_root(&fr_to_bytes(&proof_inputs.root)));
    let proof = generate_proof(&MockProver, &proof_inputs).unwrap();
    assert_eq!(proof.public_inputs, proof_inputs.public_inputs_bytes());
    pool.apply(&transfer);

    let report = alice_tracker
        .sync(&pool.published(), &alice, &tables, &TREE)
        .unwrap();
    assert_eq!(report.decrypted, 1);
    assert_eq!(report.spent, 1);
    assert_eq!(
        alice_tracker.balance.total_sol_balance(),
        1_000_000_000 - 100_000_000 - 5_000
    );
    assert_eq!(alice_tracker.balance.total_spl_balance(&MINT), 300);

    let mut bob_tracker = BalanceTracker::new();
    let report = bob_tracker
        .sync(&pool.published(), &bob, &tables, &TREE)
        .unwrap();
    assert_eq!(report.decrypted, 0);
    assert_eq!(report.received, 1);
    assert_eq!(bob_tracker.inbox.total_spl_balance(&MINT), 200);
    assert_eq!(bob_tracker.inbox.total_sol_balance(), 100_000_000);
}

#[test]
fn input_missing_from_tree() {
    let tables = tables();
    let verifier = VerifierConfig::system_zero(SYSTEM_VERIFIER);
    let alice = Account::from_seed(&[31u8; 32]).unwrap();

    let unspent = obscura_privacy::Utxo::new(
        obscura_privacy::UtxoConfig::new(alice.owner())
            .with_assets(vec![Pubkey::NATIVE], vec![10_000])
            .with_index(0),
        &tables,
        &mut OsRng,
    )
    .unwrap();
    let change = obscura_privacy::Utxo::new(
        obscura_privacy::UtxoConfig::new(alice.owner())
            .with_assets(vec![Pubkey::NATIVE], vec![5_000]),
        &tables,
        &mut OsRng,
    )
    .unwrap();

    let mut config = TransactionParametersConfig::new(Action::Transfer, TREE, verifier);
    config.in_utxos = vec![unspent];
    config.out_utxos = vec![change];
    config.relayer = Some(relayer());
    let params = TransactionParameters::build(config, &tables, &alice, &mut OsRng).unwrap();

    let err = ProofInputs::new(&params, &MerkleTree::new(HEIGHT).unwrap(), &alice).unwrap_err();
    assert_eq!(err.kind, ProverErrorCode::InputUtxoNotInTree);
}
