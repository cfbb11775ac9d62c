use obscura_privacy::{
    Account, AssetLookupTable, DecryptUtxo, EncryptionScheme, Fr, LookupTables, Pubkey, Utxo,
    UtxoConfig, UtxoFromBytes, VerifierLookupTable, UNCOMPRESSED_UTXO_BYTES_LENGTH,
};
use rand::rngs::OsRng;

const MINT: Pubkey = Pubkey([7u8; 32]);
const APP_VERIFIER: Pubkey = Pubkey([0xbb; 32]);
const TREE: Pubkey = Pubkey([9u8; 32]);

fn tables() -> LookupTables {
    LookupTables::new(
        AssetLookupTable::new([MINT]),
        VerifierLookupTable::new(Pubkey([0xaa; 32]), [APP_VERIFIER]),
    )
}

fn owner() -> Account {
    Account::from_seed(&[5u8; 32]).unwrap()
}

#[test]
fn uncompressed_bytes_reproduce_commitment_and_nullifier() {
    let _ = env_logger::builder().is_test(true).try_init();

    let account = owner();
    let tables = tables();
    let utxo = Utxo::new(
        UtxoConfig::new(account.owner())
            .with_assets(vec![Pubkey::NATIVE, MINT], vec![1_000, 250])
            .with_index(12),
        &tables,
        &mut OsRng,
    )
    .unwrap();

    let bytes = utxo.to_bytes(&tables, false).unwrap();
    assert_eq!(bytes.len(), UNCOMPRESSED_UTXO_BYTES_LENGTH);

    let parsed = Utxo::from_bytes(
        UtxoFromBytes {
            bytes: &bytes,
            compressed: false,
            owner: None,
            app_data_idl: None,
            index: Some(12),
        },
        &tables,
    )
    .unwrap();

    assert_eq!(parsed.commitment(), utxo.commitment());
    assert_eq!(parsed.account_id(), account.id());
    assert_eq!(
        parsed.nullifier(&account).unwrap(),
        utxo.nullifier(&account).unwrap()
    );
}

#[test]
fn app_data_survives_bytes() {
    let account = owner();
    let tables = tables();
    let mut config = UtxoConfig::new(account.owner())
        .with_assets(vec![Pubkey::NATIVE], vec![42]);
    config.app_data = vec![Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)];
    config.app_data_idl = Some("escrow".to_string());
    config.verifier_address = Some(APP_VERIFIER);
    let utxo = Utxo::new(config, &tables, &mut OsRng).unwrap();

    let bytes = utxo.to_bytes(&tables, true).unwrap();
    let parsed = Utxo::from_bytes(
        UtxoFromBytes {
            bytes: &bytes,
            compressed: true,
            owner: Some(account.owner()),
            app_data_idl: Some("escrow".to_string()),
            index: None,
        },
        &tables,
    )
    .unwrap();

    assert_eq!(parsed.app_data(), utxo.app_data());
    assert_eq!(parsed.verifier_address(), APP_VERIFIER);
    assert_eq!(parsed.commitment(), utxo.commitment());
}

#[test]
fn app_data_without_idl_is_rejected_when_parsing() {
    let account = owner();
    let tables = tables();
    let mut config = UtxoConfig::new(account.owner());
    config.app_data = vec![Fr::from(9u64)];
    config.app_data_idl = Some("vote".to_string());
    let utxo = Utxo::new(config, &tables, &mut OsRng).unwrap();

    let bytes = utxo.to_bytes(&tables, true).unwrap();
    let err = Utxo::from_bytes(
        UtxoFromBytes {
            bytes: &bytes,
            compressed: true,
            owner: Some(account.owner()),
            app_data_idl: None,
            index: None,
        },
        &tables,
    )
    .unwrap_err();
    assert_eq!(err.kind, obscura_privacy::UtxoErrorCode::AppDataIdlUndefined);
}

#[test]
fn scanning_recovers_own_and_received_utxos() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sender = owner();
    let receiver = Account::from_seed(&[6u8; 32]).unwrap();
    let tables = tables();

    let change = Utxo::new(
        UtxoConfig::new(sender.owner()).with_assets(vec![Pubkey::NATIVE], vec![10]),
        &tables,
        &mut OsRng,
    )
    .unwrap();
    let payment = Utxo::new(
        UtxoConfig::new(receiver.owner()).with_assets(vec![MINT], vec![3]),
        &tables,
        &mut OsRng,
    )
    .unwrap();

    let change_blob = change
        .encrypt_symmetric(&sender, &TREE, 0, &tables, true)
        .unwrap();
    let payment_blob = payment.encrypt_anonymous(&tables, true, &mut OsRng).unwrap();

    let scan = |account: &Account, blob: &[u8], utxo: &Utxo, scheme| {
        Utxo::decrypt(
            DecryptUtxo {
                account,
                ciphertext: blob,
                scheme,
                commitment: utxo.commitment_bytes(),
                check_commitment: true,
                compressed: true,
                app_data_idl: None,
                index: None,
            },
            &tables,
        )
        .unwrap()
    };

    let symmetric = EncryptionScheme::Symmetric { merkle_tree: TREE };
    assert!(scan(&sender, &change_blob, &change, symmetric).is_some());
    assert!(scan(&receiver, &change_blob, &change, symmetric).is_none());
    assert!(scan(&receiver, &payment_blob, &payment, EncryptionScheme::Anonymous).is_some());
    assert!(scan(&sender, &payment_blob, &payment, EncryptionScheme::Anonymous).is_none());
}
