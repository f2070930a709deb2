mod common;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use common::*;
use ctwallet_descriptor::{Chain, Descriptor};
use ctwallet_primitives::{AssetId, OutPoint};
use ctwallet_wallet::{Update, UtxoFilter, Wallet, WalletConfig, WalletStore};

const READERS: usize = 4;
const ROUNDS: u32 = 20;

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn shared_types_are_send_and_sync() {
    assert_send_sync::<Wallet>();
    assert_send_sync::<Descriptor>();
    assert_send_sync::<WalletStore>();
}

/// Receives 1_000 on a fresh external index, then spends it keeping 500 as change.
fn write_rounds(wallet: &Wallet) {
    let descriptor = wallet.descriptor().clone();
    let mut height = 0;
    for round in 0..ROUNDS {
        height += 1;
        let funding = receive(
            vec![explicit_to(&descriptor, Chain::External, round, policy(), 1_000)],
            u64::from(round),
        );
        wallet
            .apply_update(Update::new(tip(height)).with_tx(funding.clone(), Some(height)))
            .expect("receive");

        height += 1;
        let spend = transaction(
            &[OutPoint::new(funding.txid(), 0)],
            vec![
                foreign_output(policy(), 400),
                explicit_to(&descriptor, Chain::Internal, round, policy(), 500),
                fee_output(100),
            ],
        );
        wallet
            .apply_update(Update::new(tip(height)).with_tx(spend, None))
            .expect("spend");
    }
}

fn check_snapshot(snapshot: &WalletStore) {
    snapshot.check_invariants().expect("invariants");
    let mut unspent: BTreeMap<AssetId, u64> = BTreeMap::new();
    for utxo in snapshot.utxos(&UtxoFilter::unspent()) {
        *unspent.entry(utxo.asset()).or_default() += utxo.value();
    }
    assert_eq!(&unspent, snapshot.balances());
}

#[test]
fn readers_only_see_whole_updates() {
    let wallet = Wallet::new(TEST_DESCRIPTOR, WalletConfig::new(NETWORK)).expect("wallet");
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                scope.spawn(|| {
                    let mut observed = 0usize;
                    let mut last_height = 0;
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        let snapshot = wallet.snapshot();
                        check_snapshot(&snapshot);
                        let height = snapshot.tip().map_or(0, |tip| tip.height);
                        assert!(height >= last_height, "tip went backwards");
                        last_height = height;
                        observed += 1;
                        if finished {
                            return observed;
                        }
                    }
                })
            })
            .collect();

        let writer = scope.spawn(|| write_rounds(&wallet));
        let written = writer.join();
        done.store(true, Ordering::Release);
        for reader in readers {
            assert!(reader.join().expect("reader") > 0);
        }
        written.expect("writer");
    });

    let snapshot = wallet.snapshot();
    check_snapshot(&snapshot);
    assert_eq!(snapshot.tx_count(), 2 * ROUNDS as usize);
    assert_eq!(wallet.policy_balance(), u64::from(ROUNDS) * 500);
    assert_eq!(snapshot.last_unused(Chain::External), ROUNDS);
    assert_eq!(snapshot.last_unused(Chain::Internal), ROUNDS);
}

#[test]
fn concurrent_writers_apply_an_update_once() {
    let wallet = Wallet::new(TEST_DESCRIPTOR, WalletConfig::new(NETWORK)).expect("wallet");
    let descriptor = wallet.descriptor().clone();
    let update = Update::new(tip(2)).with_tx(
        receive(
            vec![blinded_to(&descriptor, Chain::External, 0, policy(), 3_000, 1)],
            1,
        ),
        Some(2),
    );

    let changed = thread::scope(|scope| {
        let writers: Vec<_> = (0..READERS)
            .map(|_| scope.spawn(|| wallet.apply_update(update.clone()).expect("apply").changed))
            .collect();
        writers
            .into_iter()
            .map(|writer| writer.join().expect("writer"))
            .filter(|changed| *changed)
            .count()
    });
    assert_eq!(changed, 1);
    assert_eq!(wallet.policy_balance(), 3_000);
    check_snapshot(&wallet.snapshot());
}
