//! Property tests for mutation application

use proptest::prelude::*;
use std::collections::BTreeMap;
use verimap::{leaf_hash, null_leaf_hash, Hash, MapMutation, MemoryStore, MerkleMap};

#[derive(Clone, Debug)]
enum Op {
    Set(u8, u8),
    Update(u8, u8, Option<u8>),
    Delete(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Small key space so keys collide, split and get deleted often
    prop_oneof![
        (0u8..24, any::<u8>()).prop_map(|(k, v)| Op::Set(k, v)),
        (0u8..24, any::<u8>(), proptest::option::of(any::<u8>()))
            .prop_map(|(k, v, p)| Op::Update(k, v, p)),
        (0u8..24).prop_map(Op::Delete),
    ]
}

fn key(k: u8) -> Vec<u8> {
    format!("key-{}", k).into_bytes()
}

fn to_mutation(op: &Op) -> MapMutation {
    match op {
        Op::Set(k, v) => MapMutation::set(key(*k), vec![*v]),
        Op::Update(k, v, prev) => {
            let prev = prev.map_or_else(null_leaf_hash, |p| leaf_hash(&[p]));
            MapMutation::update(key(*k), vec![*v], prev)
        }
        Op::Delete(k) => MapMutation::delete(key(*k)),
    }
}

/// Apply `ops` to a plain map, mirroring the trie's semantics
fn model_apply(model: &mut BTreeMap<u8, u8>, op: &Op) {
    match op {
        Op::Set(k, v) => {
            model.insert(*k, *v);
        }
        Op::Update(k, v, prev) => {
            if model.get(k).copied() == *prev {
                model.insert(*k, *v);
            }
        }
        Op::Delete(k) => {
            model.remove(k);
        }
    }
}

fn run(ops: &[Op]) -> (MemoryStore, Vec<Hash>) {
    let store = MemoryStore::new();
    let roots = {
        let map = MerkleMap::new(&store);
        ops.iter()
            .enumerate()
            .map(|(i, op)| map.apply(i as u64, &to_mutation(op)).unwrap())
            .collect()
    };
    (store, roots)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_trie_matches_model(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let (store, _) = run(&ops);
        let map = MerkleMap::new(&store);

        let mut model = BTreeMap::new();
        for (i, op) in ops.iter().enumerate() {
            model_apply(&mut model, op);
            let version = i as u64 + 1;
            for k in 0u8..24 {
                let expected = model.get(&k).map(|v| leaf_hash(&[*v]));
                prop_assert_eq!(map.get(version, &key(k)).unwrap(), expected);
            }
        }
    }

    #[test]
    fn prop_deterministic(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let (_, a) = run(&ops);
        let (_, b) = run(&ops);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_final_root_depends_only_on_contents(
        entries in proptest::collection::btree_map(0u8..64, any::<u8>(), 1..20)
    ) {
        let forward: Vec<_> = entries.iter().map(|(k, v)| Op::Set(*k, *v)).collect();
        let backward: Vec<_> = forward.iter().rev().cloned().collect();
        let (_, a) = run(&forward);
        let (_, b) = run(&backward);
        prop_assert_eq!(a.last(), b.last());
    }

    #[test]
    fn prop_delete_absent_is_noop(
        entries in proptest::collection::btree_map(0u8..24, any::<u8>(), 0..12),
        absent in 100u8..200,
    ) {
        let mut ops: Vec<_> = entries.iter().map(|(k, v)| Op::Set(*k, *v)).collect();
        ops.push(Op::Delete(absent));
        let (store, roots) = run(&ops);

        let before = if roots.len() > 1 {
            roots[roots.len() - 2]
        } else {
            MerkleMap::new(&store).root_hash(0).unwrap()
        };
        prop_assert_eq!(roots.last().copied(), Some(before));
    }

    #[test]
    fn prop_cas_only_applies_on_match(
        entries in proptest::collection::btree_map(0u8..24, any::<u8>(), 1..12),
        guess in any::<u8>(),
        next in any::<u8>(),
    ) {
        let ops: Vec<_> = entries.iter().map(|(k, v)| Op::Set(*k, *v)).collect();
        let (store, roots) = run(&ops);
        let map = MerkleMap::new(&store);
        let size = ops.len() as u64;

        let (&k, &current) = entries.iter().next().unwrap();
        let root = map
            .apply(size, &MapMutation::update(key(k), vec![next], leaf_hash(&[guess])))
            .unwrap();

        if guess == current {
            prop_assert_eq!(map.get(size + 1, &key(k)).unwrap(), Some(leaf_hash(&[next])));
        } else {
            prop_assert_eq!(Some(&root), roots.last());
            prop_assert_eq!(map.get(size + 1, &key(k)).unwrap(), Some(leaf_hash(&[current])));
        }
    }

    #[test]
    fn prop_mutation_does_not_touch_other_keys(
        ops in proptest::collection::vec(op_strategy(), 1..30),
        target in 0u8..24,
        value in any::<u8>(),
    ) {
        let (store, _) = run(&ops);
        let map = MerkleMap::new(&store);
        let size = ops.len() as u64;

        map.apply(size, &MapMutation::set(key(target), vec![value])).unwrap();

        for k in (0u8..24).filter(|k| *k != target) {
            prop_assert_eq!(
                map.get(size + 1, &key(k)).unwrap(),
                map.get(size, &key(k)).unwrap()
            );
        }
        for version in 0..=size {
            // Older versions keep their roots
            prop_assert!(map.root_hash(version).is_ok());
        }
    }
}
