//! Identities of maps and logs
//!
//! A map is named by an opaque (account, name) pair. Every map has two
//! companion logs: the mutation log that sequences its mutations and the
//! tree-head log that records its committed roots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a map instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapRef {
    pub account: String,
    pub name: String,
}

/// Kind of log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogType {
    /// A plain user log
    User,
    /// Sequences the mutations of the map with the same identity
    MutationLog,
    /// Records tree heads of the map with the same identity
    TreeHeadLog,
}

/// Identifies a log instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogRef {
    pub account: String,
    pub name: String,
    pub log_type: LogType,
}

impl MapRef {
    pub fn new(account: impl Into<String>, name: impl Into<String>) -> Self {
        MapRef {
            account: account.into(),
            name: name.into(),
        }
    }

    pub fn mutation_log(&self) -> LogRef {
        LogRef {
            account: self.account.clone(),
            name: self.name.clone(),
            log_type: LogType::MutationLog,
        }
    }

    pub fn tree_head_log(&self) -> LogRef {
        LogRef {
            account: self.account.clone(),
            name: self.name.clone(),
            log_type: LogType::TreeHeadLog,
        }
    }
}

impl LogRef {
    pub fn user(account: impl Into<String>, name: impl Into<String>) -> Self {
        LogRef {
            account: account.into(),
            name: name.into(),
            log_type: LogType::User,
        }
    }

    /// The map this log belongs to, for mutation and tree-head logs
    pub fn map(&self) -> Option<MapRef> {
        match self.log_type {
            LogType::MutationLog | LogType::TreeHeadLog => {
                Some(MapRef::new(self.account.clone(), self.name.clone()))
            }
            LogType::User => None,
        }
    }
}

impl fmt::Display for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_logs_point_back_to_map() {
        let map = MapRef::new("acme", "users");
        assert_eq!(map.mutation_log().map(), Some(map.clone()));
        assert_eq!(map.tree_head_log().map(), Some(map.clone()));
        assert_eq!(map.tree_head_log().log_type, LogType::TreeHeadLog);
        assert_eq!(LogRef::user("acme", "users").map(), None);
        assert_eq!(map.to_string(), "acme/users");
    }
}
