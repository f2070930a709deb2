#![cfg(feature = "fjall")]

use ctwallet_storage::fjall::FjallStore;
use ctwallet_storage::{Column, KeyValueStore, WriteBatch};

#[test]
fn fjall_smoke_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");

    let store = FjallStore::open(dir.path()).expect("open fjall");
    store
        .put(Column::WalletState, b"wallet:a", b"blob-a")
        .expect("put");
    store.put(Column::Meta, b"version", b"1").expect("put meta");

    let mut batch = WriteBatch::new();
    batch.put(Column::WalletState, b"wallet:b", b"blob-b");
    batch.delete(Column::Meta, b"version");
    store.write_batch(&batch).expect("batch commit");

    assert!(store.get(Column::Meta, b"version").expect("get").is_none());
    let found = store
        .scan_prefix(Column::WalletState, b"wallet:")
        .expect("scan");
    assert_eq!(
        found,
        vec![
            (b"wallet:a".to_vec(), b"blob-a".to_vec()),
            (b"wallet:b".to_vec(), b"blob-b".to_vec()),
        ]
    );
}
