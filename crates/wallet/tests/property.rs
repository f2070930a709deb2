mod common;

use std::collections::{BTreeMap, HashMap, HashSet};

use common::*;
use ctwallet_descriptor::Chain;
use ctwallet_primitives::{AssetId, OutPoint, Transaction, Txid};
use ctwallet_wallet::persist::{decode_snapshot, encode_snapshot};
use ctwallet_wallet::{Update, UtxoFilter, Wallet, WalletConfig};

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        self.state
    }

    fn gen_range(&mut self, max: usize) -> usize {
        if max == 0 {
            0
        } else {
            (self.next_u64() % max as u64) as usize
        }
    }
}

/// Independent bookkeeping of what the wallet should report.
#[derive(Default)]
struct Model {
    alive: Vec<Transaction>,
    owned: HashMap<OutPoint, (AssetId, u64)>,
}

impl Model {
    fn expected_balances(&self) -> BTreeMap<AssetId, u64> {
        let alive: HashSet<Txid> = self.alive.iter().map(Transaction::txid).collect();
        let spent: HashSet<OutPoint> = self
            .alive
            .iter()
            .flat_map(|tx| tx.input.iter().map(|input| input.previous_output))
            .collect();
        let mut balances = BTreeMap::new();
        for (outpoint, (asset, value)) in &self.owned {
            if alive.contains(&outpoint.txid) && !spent.contains(outpoint) {
                *balances.entry(*asset).or_insert(0u64) += value;
            }
        }
        balances.retain(|_, value| *value > 0);
        balances
    }
}

#[test]
fn random_histories_keep_the_balance_invariant() {
    let mut rng = Lcg::new(0x5eed_c0ff_ee00_0001);
    let wallet = Wallet::new(TEST_DESCRIPTOR, WalletConfig::new(NETWORK)).expect("wallet");
    let descriptor = wallet.descriptor().clone();
    let gap = wallet.config().gap_limit as usize;
    let assets = [policy(), other_asset()];
    let mut model = Model::default();
    let mut height = 0u32;

    for step in 0..60u64 {
        height += 1;
        let snapshot = wallet.snapshot();
        let update = match rng.gen_range(3) {
            0 | 1 if step % 2 == 0 || snapshot.utxos(&UtxoFilter::unspent()).is_empty() => {
                let index =
                    rng.gen_range(snapshot.last_unused(Chain::External) as usize + gap) as u32;
                let asset = assets[rng.gen_range(assets.len())];
                let value = 1 + rng.gen_range(100_000) as u64;
                let output = if step % 5 == 0 {
                    blinded_to(&descriptor, Chain::External, index, asset, value, step)
                } else {
                    explicit_to(&descriptor, Chain::External, index, asset, value)
                };
                let tx = receive(vec![output], step);
                model.owned.insert(OutPoint::new(tx.txid(), 0), (asset, value));
                model.alive.push(tx.clone());
                let confirmed = (rng.gen_range(4) != 0).then_some(height);
                Update::new(tip(height)).with_tx(tx, confirmed)
            }
            0 | 1 => {
                let unspent = snapshot.utxos(&UtxoFilter::unspent());
                let coin = unspent[rng.gen_range(unspent.len())];
                let change = coin.value() / 2;
                let index =
                    rng.gen_range(snapshot.last_unused(Chain::Internal) as usize + gap) as u32;
                let tx = transaction(
                    &[coin.outpoint],
                    vec![
                        foreign_output(coin.asset(), coin.value() - change),
                        explicit_to(&descriptor, Chain::Internal, index, coin.asset(), change),
                    ],
                );
                model.owned.insert(OutPoint::new(tx.txid(), 1), (coin.asset(), change));
                model.alive.push(tx.clone());
                Update::new(tip(height)).with_tx(tx, Some(height))
            }
            _ => {
                let mut update = Update::new(tip(height));
                if !model.alive.is_empty() {
                    let victim = model.alive.remove(rng.gen_range(model.alive.len()));
                    update = update.with_orphaned(victim.txid());
                }
                update
            }
        };

        let outcome = wallet.apply_update(update.clone()).expect("apply");
        assert!(outcome.unblind_failures.is_empty());
        let replay = wallet.apply_update(update).expect("replay");
        assert!(!replay.changed, "replay changed the wallet at step {step}");

        let snapshot = wallet.snapshot();
        snapshot.check_invariants().expect("invariants");
        assert_eq!(
            snapshot.balances(),
            &model.expected_balances(),
            "balances diverged at step {step}"
        );

        if step % 10 == 9 {
            let blob = encode_snapshot(&descriptor, &snapshot);
            assert_eq!(decode_snapshot(&blob, &descriptor).expect("decode"), *snapshot);
        }
    }
}
