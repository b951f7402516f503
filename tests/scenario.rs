//! End-to-end history of a small map, checked against both stores

use tempfile::tempdir;
use verimap::{
    leaf_hash, null_leaf_hash, Error, FileStore, Hash, MapDatabase, MapMutation, MemoryStore,
    MerkleMap, NodeStore,
};

/// Apply the reference history and return the roots of versions 0..=5
fn play<S: NodeStore + ?Sized>(store: &S) -> Vec<Hash> {
    let map = MerkleMap::new(store);
    let mut roots = vec![map.root_hash(0).unwrap()];

    let history = [
        MapMutation::set("a", "1"),
        MapMutation::set("b", "2"),
        MapMutation::delete("a"),
        MapMutation::update("b", "3", leaf_hash(b"2")),
        MapMutation::update("b", "3", leaf_hash(b"2")),
    ];
    for (version, mutation) in history.iter().enumerate() {
        roots.push(map.apply(version as u64, mutation).unwrap());
    }
    roots
}

#[test]
fn test_history_in_memory() {
    let store = MemoryStore::new();
    let roots = play(&store);
    let map = MerkleMap::new(&store);

    assert_eq!(map.get(1, b"a").unwrap(), Some(leaf_hash(b"1")));
    assert_eq!(map.get(1, b"b").unwrap(), None);

    // Version 1 is untouched by later writes
    assert_eq!(map.root_hash(1).unwrap(), roots[1]);
    assert_eq!(map.get(2, b"a").unwrap(), Some(leaf_hash(b"1")));
    assert_eq!(map.get(2, b"b").unwrap(), Some(leaf_hash(b"2")));

    assert_eq!(map.get(3, b"a").unwrap(), None);
    assert_eq!(map.get(4, b"b").unwrap(), Some(leaf_hash(b"3")));

    // Stale compare-and-swap is a no-op
    assert_eq!(roots[5], roots[4]);
    assert_eq!(map.get(5, b"b").unwrap(), Some(leaf_hash(b"3")));

    let distinct: std::collections::HashSet<_> = roots[..5].iter().collect();
    assert_eq!(distinct.len(), 5);
}

#[test]
fn test_deleted_map_matches_one_never_written() {
    let store = MemoryStore::new();
    let map = MerkleMap::new(&store);
    let empty = map.root_hash(0).unwrap();

    map.apply(0, &MapMutation::set("a", "1")).unwrap();
    let root = map.apply(1, &MapMutation::delete("a")).unwrap();
    assert_eq!(root, empty);

    // A null leaf compares equal to an absent key for compare-and-swap
    map.apply(2, &MapMutation::update("a", "2", null_leaf_hash()))
        .unwrap();
    assert_eq!(map.get(3, b"a").unwrap(), Some(leaf_hash(b"2")));
}

#[test]
fn test_file_store_agrees_with_memory_store() {
    let dir = tempdir().unwrap();
    let memory = MemoryStore::new();
    let file = FileStore::create(dir.path().join("agree.vmap")).unwrap();

    assert_eq!(play(&memory), play(&file));
}

#[test]
fn test_database_history() {
    let dir = tempdir().unwrap();
    let mut db = MapDatabase::create(dir.path().join("history.vmap")).unwrap();

    let (_, r1) = db.set("a", "1").unwrap();
    db.set("b", "2").unwrap();
    db.delete("a").unwrap();
    let (_, r4) = db.update("b", "3", leaf_hash(b"2")).unwrap();
    let (v5, r5) = db.update("b", "3", leaf_hash(b"2")).unwrap();

    assert_eq!(v5, 5);
    assert_eq!(r4, r5);
    assert_eq!(db.root_hash(Some(1)).unwrap(), r1);
    assert_eq!(db.get(b"a", Some(1)).unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(b"a", None).unwrap(), None);
    assert_eq!(db.get(b"b", Some(3)).unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(b"b", None).unwrap(), Some(b"3".to_vec()));

    assert!(matches!(db.root_hash(Some(6)), Err(Error::NotFound(_))));
}
