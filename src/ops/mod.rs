//! Operations layered on top of the trie

mod dispatch;

pub use dispatch::{apply_mutation, Mutation};
