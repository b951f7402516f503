//! Routing of sequenced mutations

use crate::model::{Hash, LogRef, MapMutation, MapRef};
use crate::store::NodeStore;
use crate::trie::MerkleMap;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A mutation as sequenced by a mutation log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation {
    /// Change one key of a map
    SetMapValue { map: MapRef, entry: MapMutation },
    /// Append an entry to a log
    LogAddEntry { log: LogRef, data: Vec<u8> },
}

impl Mutation {
    pub fn map(map: MapRef, entry: MapMutation) -> Self {
        Mutation::SetMapValue { map, entry }
    }
}

/// Apply the mutation at position `size_before` of a structure's sequence
///
/// Returns the new size and the root hash committed at that size. Map
/// mutations are applied to `store`, which must hold the nodes of the map
/// named in the mutation; the map identity itself is not interpreted.
pub fn apply_mutation<S: NodeStore + ?Sized>(
    store: &S,
    size_before: u64,
    mutation: &Mutation,
) -> Result<(u64, Hash)> {
    match mutation {
        Mutation::SetMapValue { map, entry } => {
            let root = MerkleMap::new(store).apply(size_before, entry)?;
            debug!(%map, size = size_before + 1, "applied map mutation");
            Ok((size_before + 1, root))
        }
        Mutation::LogAddEntry { log, .. } => Err(Error::NotImplemented(format!(
            "log append for {}/{}",
            log.account, log.name
        ))),
    }
}
