mod common;

use std::fs;
use std::sync::Arc;

use common::*;
use ctwallet_descriptor::Chain;
use ctwallet_storage::memory::MemoryStore;
use ctwallet_wallet::persist::{
    decode_snapshot, encode_snapshot, stored_wallet_ids, SNAPSHOT_MAGIC, SNAPSHOT_VERSION,
};
use ctwallet_wallet::{
    FilePersister, Persister, StorePersister, Update, Wallet, WalletConfig, WalletError,
};

const FUNDING_TIME: u32 = 1_700_000_420;

fn populate(wallet: &Wallet) {
    let descriptor = wallet.descriptor().clone();
    let funding = receive(
        vec![
            blinded_to(&descriptor, Chain::External, 0, policy(), 20_000, 1),
            blinded_to(&descriptor, Chain::External, 4, other_asset(), 3, 2),
        ],
        1,
    );
    let spend = transaction(
        &[ctwallet_primitives::OutPoint::new(funding.txid(), 0)],
        vec![
            foreign_output(policy(), 12_000),
            blinded_to(&descriptor, Chain::Internal, 0, policy(), 7_000, 3),
            fee_output(1_000),
        ],
    );
    wallet
        .apply_update(
            Update::new(tip(8))
                .with_timed_tx(funding, Some(7), Some(FUNDING_TIME))
                .with_tx(spend, None),
        )
        .expect("apply");
}

#[test]
fn file_snapshot_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let descriptor = descriptor(TEST_DESCRIPTOR);
    let persister = FilePersister::in_dir(dir.path(), &descriptor);
    let path = persister.path().to_path_buf();

    let wallet = Wallet::with_persister(
        TEST_DESCRIPTOR,
        WalletConfig::new(NETWORK),
        Box::new(persister.clone()),
    )
    .expect("open");
    populate(&wallet);
    let before = wallet.snapshot();
    drop(wallet);

    assert!(path.exists());
    assert!(!path.with_extension("tmp").exists());
    let blob = fs::read(&path).expect("read");
    assert_eq!(&blob[..4], &SNAPSHOT_MAGIC);

    let reopened = Wallet::with_persister(
        TEST_DESCRIPTOR,
        WalletConfig::new(NETWORK),
        Box::new(persister),
    )
    .expect("reopen");
    assert_eq!(*reopened.snapshot(), *before);
    assert_eq!(reopened.policy_balance(), 7_000);
    let timestamps: Vec<Option<u32>> = reopened
        .transactions()
        .iter()
        .map(|tx| tx.timestamp)
        .collect();
    assert_eq!(timestamps, vec![Some(FUNDING_TIME), None]);
    assert_eq!(reopened.address(None).expect("address").index, 5);
}

#[test]
fn blinding_keys_are_never_written() {
    let descriptor = descriptor(TEST_DESCRIPTOR);
    let wallet = Wallet::new(TEST_DESCRIPTOR, WalletConfig::new(NETWORK)).expect("wallet");
    populate(&wallet);
    let blob = encode_snapshot(&descriptor, &wallet.snapshot());
    for (chain, index) in [(Chain::External, 0), (Chain::External, 4), (Chain::Internal, 0)] {
        let spk = descriptor.script_pubkey(chain, index).expect("spk");
        let pair = descriptor.blinding_key_pair(&spk).expect("pair");
        let secret = pair.secret_key().secret_bytes();
        assert!(!blob.windows(secret.len()).any(|window| window == secret));
    }
}

#[test]
fn unknown_version_is_rejected() {
    let descriptor = descriptor(TEST_DESCRIPTOR);
    let wallet = Wallet::new(TEST_DESCRIPTOR, WalletConfig::new(NETWORK)).expect("wallet");
    populate(&wallet);
    let mut blob = encode_snapshot(&descriptor, &wallet.snapshot());
    blob[4..8].copy_from_slice(&(SNAPSHOT_VERSION + 1).to_le_bytes());
    assert!(matches!(
        decode_snapshot(&blob, &descriptor),
        Err(WalletError::UnsupportedPersistenceVersion(version)) if version == SNAPSHOT_VERSION + 1
    ));

    blob[..4].copy_from_slice(b"XXXX");
    assert!(matches!(
        decode_snapshot(&blob, &descriptor),
        Err(WalletError::InvalidData(_))
    ));
}

#[test]
fn snapshot_is_bound_to_network_and_descriptor() {
    let descriptor = descriptor(TEST_DESCRIPTOR);
    let wallet = Wallet::new(TEST_DESCRIPTOR, WalletConfig::new(NETWORK)).expect("wallet");
    populate(&wallet);
    let blob = encode_snapshot(&descriptor, &wallet.snapshot());

    let other = ctwallet_descriptor::Descriptor::parse(&abandon_descriptor(), NETWORK)
        .expect("other descriptor");
    assert!(matches!(
        decode_snapshot(&blob, &other),
        Err(WalletError::DescriptorMismatch)
    ));

    let regtest = ctwallet_primitives::Network::default_regtest();
    let regtest_descriptor = {
        let body = TEST_DESCRIPTOR.split('#').next().expect("body");
        ctwallet_descriptor::Descriptor::parse(body, regtest).expect("regtest descriptor")
    };
    assert!(matches!(
        decode_snapshot(&blob, &regtest_descriptor),
        Err(WalletError::NetworkMismatch { .. })
    ));

    let mut truncated = blob.clone();
    truncated.pop();
    assert!(decode_snapshot(&truncated, &descriptor).is_err());
    let mut extended = blob;
    extended.push(0);
    assert!(decode_snapshot(&extended, &descriptor).is_err());
}

#[test]
fn key_value_store_persister() {
    let store = Arc::new(MemoryStore::new());
    let descriptor = descriptor(TEST_DESCRIPTOR);
    let persister = StorePersister::new(Arc::clone(&store), &descriptor);
    assert_eq!(persister.wallet_id(), descriptor.id());
    assert_eq!(persister.load().expect("load"), None);

    let wallet = Wallet::with_persister(
        TEST_DESCRIPTOR,
        WalletConfig::new(NETWORK),
        Box::new(persister),
    )
    .expect("open");
    populate(&wallet);
    let before = wallet.snapshot();
    drop(wallet);

    assert_eq!(stored_wallet_ids(&*store).expect("ids"), vec![descriptor.id()]);
    let reopened = Wallet::with_persister(
        TEST_DESCRIPTOR,
        WalletConfig::new(NETWORK),
        Box::new(StorePersister::new(Arc::clone(&store), &descriptor)),
    )
    .expect("reopen");
    assert_eq!(*reopened.snapshot(), *before);
    reopened.persist().expect("persist");

    StorePersister::new(Arc::clone(&store), &descriptor)
        .remove()
        .expect("remove");
    assert!(stored_wallet_ids(&*store).expect("ids").is_empty());
}
