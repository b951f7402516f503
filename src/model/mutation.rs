//! Map mutation records

use super::Hash;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// What a mutation does to the value stored under its key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapAction {
    /// Store `value`, replacing whatever was there
    Set { value: Vec<u8> },
    /// Store `value` only if the current leaf hash equals `previous_leaf_hash`
    ///
    /// Use the null leaf hash to require that the key is absent. A mismatch
    /// leaves the map unchanged and is not an error.
    Update {
        value: Vec<u8>,
        previous_leaf_hash: Hash,
    },
    /// Remove the key
    Delete,
}

impl MapAction {
    /// Wire name of the action
    pub fn name(&self) -> &'static str {
        match self {
            MapAction::Set { .. } => "set",
            MapAction::Update { .. } => "update",
            MapAction::Delete => "delete",
        }
    }

    /// The leaf input carried by set/update
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            MapAction::Set { value } | MapAction::Update { value, .. } => Some(value),
            MapAction::Delete => None,
        }
    }
}

/// A single mutation against one key of a map
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMutation {
    pub key: Vec<u8>,
    pub action: MapAction,
}

impl MapMutation {
    pub fn set(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        MapMutation {
            key: key.into(),
            action: MapAction::Set {
                value: value.into(),
            },
        }
    }

    pub fn update(
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        previous_leaf_hash: Hash,
    ) -> Self {
        MapMutation {
            key: key.into(),
            action: MapAction::Update {
                value: value.into(),
                previous_leaf_hash,
            },
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        MapMutation {
            key: key.into(),
            action: MapAction::Delete,
        }
    }
}

/// Loosely typed mutation as it arrives from clients (JSON)
///
/// Keys and values are UTF-8 strings; `previous_leaf_hash` is hex.
/// Convert with `MapMutation::try_from`, which is the only place an
/// unknown action can be observed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MutationEntry {
    pub key: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_leaf_hash: Option<String>,
}

impl MutationEntry {
    /// Parse a JSON entry and validate it in one step
    pub fn parse_json(s: &str) -> Result<MapMutation> {
        let entry: MutationEntry = serde_json::from_str(s)
            .map_err(|e| Error::InvalidRequest(format!("malformed mutation: {}", e)))?;
        MapMutation::try_from(entry)
    }
}

impl TryFrom<MutationEntry> for MapMutation {
    type Error = Error;

    fn try_from(entry: MutationEntry) -> Result<Self> {
        let key = entry.key.into_bytes();
        let value = |v: Option<String>| {
            v.map(String::into_bytes).ok_or_else(|| {
                Error::InvalidRequest(format!("action '{}' requires a value", entry.action))
            })
        };

        let action = match entry.action.as_str() {
            "set" => MapAction::Set {
                value: value(entry.value)?,
            },
            "update" => {
                let prev = entry.previous_leaf_hash.as_deref().ok_or_else(|| {
                    Error::InvalidRequest("update requires previous_leaf_hash".into())
                })?;
                let previous_leaf_hash = prev
                    .parse::<Hash>()
                    .map_err(|e| Error::InvalidRequest(format!("previous_leaf_hash: {}", e)))?;
                MapAction::Update {
                    value: value(entry.value)?,
                    previous_leaf_hash,
                }
            }
            "delete" => MapAction::Delete,
            other => {
                return Err(Error::InvalidRequest(format!("unknown action '{}'", other)));
            }
        };

        Ok(MapMutation { key, action })
    }
}
