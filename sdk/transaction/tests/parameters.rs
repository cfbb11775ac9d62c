use ark_ff::Zero;
use obscura_privacy::{
    Account, AssetLookupTable, Fr, LookupTables, MAX_ENCRYPTED_UTXO_LENGTH, Pubkey, Utxo,
    UtxoConfig, VerifierLookupTable,
};
use obscura_transaction::{
    Action, Relayer, TransactionParameters, TransactionParametersConfig,
    TransactionParametersError, TransactionParametersErrorCode, VerifierConfig,
};
use rand::rngs::OsRng;

const MINT: Pubkey = Pubkey([0x33; 32]);
const OTHER_MINT: Pubkey = Pubkey([0x34; 32]);
const THIRD_MINT: Pubkey = Pubkey([0x35; 32]);
const SYSTEM_VERIFIER: Pubkey = Pubkey([0xaa; 32]);
const TREE: Pubkey = Pubkey([0x44; 32]);

fn tables() -> LookupTables {
    LookupTables::new(
        AssetLookupTable::new([MINT, OTHER_MINT, THIRD_MINT]),
        VerifierLookupTable::new(SYSTEM_VERIFIER, []),
    )
}

fn account() -> Account {
    Account::from_seed(&[21u8; 32]).unwrap()
}

fn relayer(fee: u64) -> Relayer {
    Relayer {
        pubkey: Pubkey([0x55; 32]),
        fee_recipient: Pubkey([0x56; 32]),
        fee,
    }
}

fn utxo(owner: &Account, sol: i128, spl: Option<(Pubkey, i128)>, index: u64) -> Utxo {
    let config = match spl {
        Some((mint, amount)) => UtxoConfig::new(owner.owner())
            .with_assets(vec![Pubkey::NATIVE, mint], vec![sol, amount]),
        None => UtxoConfig::new(owner.owner()).with_assets(vec![Pubkey::NATIVE], vec![sol]),
    };
    Utxo::new(config.with_index(index), &tables(), &mut OsRng).unwrap()
}

fn config(action: Action) -> TransactionParametersConfig {
    TransactionParametersConfig::new(action, TREE, VerifierConfig::system_zero(SYSTEM_VERIFIER))
}

fn build(
    config: TransactionParametersConfig,
) -> Result<TransactionParameters, TransactionParametersError> {
    TransactionParameters::build(config, &tables(), &account(), &mut OsRng)
}

fn kind(config: TransactionParametersConfig) -> TransactionParametersErrorCode {
    build(config).unwrap_err().kind
}

#[test]
fn shield_pads_and_computes_public_amounts() {
    let _ = env_logger::builder().is_test(true).try_init();
    let account = account();

    let mut shield = config(Action::Shield);
    shield.out_utxos = vec![utxo(&account, 1_000, Some((MINT, 40)), 0)];
    shield.sender_sol = Some(Pubkey([1u8; 32]));
    shield.sender_spl = Some(Pubkey([2u8; 32]));

    let params = build(shield).unwrap();
    assert_eq!(params.in_utxos.len(), 2);
    assert_eq!(params.out_utxos.len(), 2);
    assert_eq!(params.public_amount_sol, Fr::from(1_000u64));
    assert_eq!(params.public_amount_spl, Fr::from(40u64));
    assert_eq!(params.asset_pubkeys, [Pubkey::NATIVE, MINT, Pubkey::NATIVE]);
    assert_eq!(params.asset_pubkeys_circuit[1], MINT.to_circuit());
    assert!(params.asset_pubkeys_circuit[2].is_zero());
    assert_eq!(params.encrypted_utxos.len(), 2 * MAX_ENCRYPTED_UTXO_LENGTH);
    assert_eq!(params.nullifiers.len(), 2);
    assert_eq!(params.commitments[0], params.out_utxos[0].commitment());
    assert_eq!(params.relayer_fee(), 0);
}

#[test]
fn shield_requires_senders() {
    let mut shield = config(Action::Shield);
    shield.out_utxos = vec![utxo(&account(), 1_000, None, 0)];
    assert_eq!(kind(shield), TransactionParametersErrorCode::SolSenderUndefined);

    let mut shield = config(Action::Shield);
    shield.out_utxos = vec![utxo(&account(), 0, Some((MINT, 5)), 0)];
    shield.sender_sol = Some(Pubkey([1u8; 32]));
    assert_eq!(kind(shield), TransactionParametersErrorCode::SplSenderUndefined);
}

#[test]
fn shield_rejects_relayer() {
    let mut shield = config(Action::Shield);
    shield.out_utxos = vec![utxo(&account(), 1_000, None, 0)];
    shield.sender_sol = Some(Pubkey([1u8; 32]));
    shield.relayer = Some(relayer(1));
    assert_eq!(kind(shield), TransactionParametersErrorCode::RelayerDefined);
}

#[test]
fn shield_rejects_withdrawal() {
    let account = account();
    let mut shield = config(Action::Shield);
    shield.in_utxos = vec![utxo(&account, 1_000, None, 0)];
    shield.out_utxos = vec![utxo(&account, 10, None, 0)];
    assert_eq!(kind(shield), TransactionParametersErrorCode::InvalidPublicAmount);
}

#[test]
fn unshield_routing() {
    let account = account();
    let unshield = || {
        let mut c = config(Action::Unshield);
        c.in_utxos = vec![utxo(&account, 1_000, None, 3)];
        c.out_utxos = vec![utxo(&account, 650, None, 0)];
        c.relayer = Some(relayer(50));
        c
    };

    assert_eq!(
        kind(unshield()),
        TransactionParametersErrorCode::SolRecipientUndefined
    );

    let mut no_relayer = unshield();
    no_relayer.relayer = None;
    assert_eq!(kind(no_relayer), TransactionParametersErrorCode::RelayerUndefined);

    let mut with_sender = unshield();
    with_sender.recipient_sol = Some(Pubkey([3u8; 32]));
    with_sender.sender_sol = Some(Pubkey([1u8; 32]));
    assert_eq!(kind(with_sender), TransactionParametersErrorCode::SenderDefined);

    let mut expensive = unshield();
    expensive.recipient_sol = Some(Pubkey([3u8; 32]));
    expensive.relayer = Some(relayer(400));
    assert_eq!(kind(expensive), TransactionParametersErrorCode::RelayerInvalid);

    let mut ok = unshield();
    ok.recipient_sol = Some(Pubkey([3u8; 32]));
    let params = build(ok).unwrap();
    assert_eq!(params.public_amount_sol, -Fr::from(350u64));
    assert_eq!(params.relayer_fee(), 50);
}

#[test]
fn unshield_spl_needs_recipient() {
    let account = account();
    let mut unshield = config(Action::Unshield);
    unshield.in_utxos = vec![utxo(&account, 100, Some((MINT, 10)), 1)];
    unshield.out_utxos = vec![utxo(&account, 50, Some((MINT, 4)), 0)];
    unshield.relayer = Some(relayer(50));
    assert_eq!(
        kind(unshield),
        TransactionParametersErrorCode::SplRecipientUndefined
    );
}

#[test]
fn transfer_must_pay_exactly_the_fee() {
    let account = account();
    let transfer = |change: i128| {
        let mut c = config(Action::Transfer);
        c.in_utxos = vec![utxo(&account, 1_000, None, 2)];
        c.out_utxos = vec![utxo(&account, change, None, 0)];
        c.relayer = Some(relayer(5));
        c
    };

    assert!(build(transfer(995)).is_ok());
    assert_eq!(kind(transfer(990)), TransactionParametersErrorCode::RelayerInvalid);

    let mut with_recipient = transfer(995);
    with_recipient.recipient_sol = Some(Pubkey([3u8; 32]));
    assert_eq!(
        kind(with_recipient),
        TransactionParametersErrorCode::RecipientDefined
    );
}

#[test]
fn transfer_cannot_move_spl_out() {
    let account = account();
    let mut transfer = config(Action::Transfer);
    transfer.in_utxos = vec![utxo(&account, 1_000, Some((MINT, 10)), 2)];
    transfer.out_utxos = vec![utxo(&account, 995, Some((MINT, 9)), 0)];
    transfer.relayer = Some(relayer(5));
    assert_eq!(kind(transfer), TransactionParametersErrorCode::InvalidPublicAmount);
}

#[test]
fn arity_and_asset_limits() {
    let account = account();

    assert_eq!(
        kind(config(Action::Shield)),
        TransactionParametersErrorCode::NoUtxosProvided
    );

    let mut too_many = config(Action::Shield);
    too_many.out_utxos = (0..3).map(|_| utxo(&account, 1, None, 0)).collect();
    assert_eq!(kind(too_many), TransactionParametersErrorCode::ExceededMaxUtxos);

    let mut three_mints = config(Action::Transfer);
    three_mints.in_utxos = vec![
        utxo(&account, 1, Some((MINT, 1)), 0),
        utxo(&account, 1, Some((OTHER_MINT, 1)), 1),
    ];
    three_mints.out_utxos = vec![utxo(&account, 1, Some((THIRD_MINT, 1)), 0)];
    three_mints.relayer = Some(relayer(1));
    assert_eq!(kind(three_mints), TransactionParametersErrorCode::ExceededMaxAssets);
}

#[test]
fn third_asset_must_balance() {
    let account = account();
    let mut unshield = config(Action::Unshield);
    unshield.in_utxos = vec![utxo(&account, 100, Some((MINT, 10)), 3)];
    unshield.out_utxos = vec![utxo(&account, 0, Some((OTHER_MINT, 1_000_000)), 0)];
    unshield.relayer = Some(relayer(1));
    unshield.recipient_sol = Some(Pubkey([3u8; 32]));
    unshield.recipient_spl = Some(Pubkey([4u8; 32]));
    assert_eq!(kind(unshield), TransactionParametersErrorCode::InvalidPublicAmount);

    let mut transfer = config(Action::Transfer);
    transfer.in_utxos = vec![
        utxo(&account, 100, Some((MINT, 10)), 1),
        utxo(&account, 0, Some((OTHER_MINT, 5)), 2),
    ];
    transfer.out_utxos = vec![
        utxo(&account, 99, Some((MINT, 10)), 0),
        utxo(&account, 0, Some((OTHER_MINT, 5)), 0),
    ];
    transfer.relayer = Some(relayer(1));
    let params = build(transfer).unwrap();
    assert_eq!(params.asset_pubkeys, [Pubkey::NATIVE, MINT, OTHER_MINT]);
    assert!(params.public_amount_spl.is_zero());
}

#[test]
fn message_rules() {
    let account = account();
    let base = || {
        let mut c = config(Action::Shield);
        c.out_utxos = vec![utxo(&account, 1_000, None, 0)];
        c.sender_sol = Some(Pubkey([1u8; 32]));
        c
    };

    let mut no_tree = base();
    no_tree.message = Some(b"hello".to_vec());
    assert_eq!(
        kind(no_tree),
        TransactionParametersErrorCode::MessageMerkleTreeUndefined
    );

    let mut no_message = base();
    no_message.message_merkle_tree = Some(Pubkey([8u8; 32]));
    assert_eq!(kind(no_message), TransactionParametersErrorCode::MessageUndefined);

    let mut storage = base();
    storage.verifier = VerifierConfig::system_storage(SYSTEM_VERIFIER);
    assert_eq!(kind(storage), TransactionParametersErrorCode::MessageUndefined);

    let mut with_message = base();
    with_message.message = Some(b"hello".to_vec());
    with_message.message_merkle_tree = Some(Pubkey([8u8; 32]));
    let with_hash = build(with_message).unwrap().tx_integrity_hash;
    assert_ne!(with_hash, Fr::zero());
}

#[test]
fn integrity_hash_binds_recipient() {
    let account = account();
    let unshield = |recipient: Pubkey| {
        let mut c = config(Action::Unshield);
        c.in_utxos = vec![utxo(&account, 1_000, None, 3)];
        c.out_utxos = vec![utxo(&account, 650, None, 0)];
        c.relayer = Some(relayer(50));
        c.recipient_sol = Some(recipient);
        build(c).unwrap()
    };
    let a = unshield(Pubkey([3u8; 32]));
    let b = unshield(Pubkey([4u8; 32]));
    assert_ne!(a.tx_integrity_hash, b.tx_integrity_hash);
}
