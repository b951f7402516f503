//! Core data model types for verimap

mod hash;
mod mutation;
mod path;
mod refs;

pub use hash::{Hash, HASH_LEN};
pub use mutation::{MapAction, MapMutation, MutationEntry};
pub use path::{BitPath, KEY_BITS};
pub use refs::{LogRef, LogType, MapRef};
