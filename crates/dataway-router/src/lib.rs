//! Path trie router with named-parameter capture.
//!
//! Segments split on `/`; a segment prefixed with `:` is a named capture.
//! All captures at one trie level share a single wildcard child slot, and a
//! second registration with a different capture name at the same level is
//! rejected rather than silently rebinding the first name.
//!
//! A trie is built fresh on every rebuild and never mutated once published;
//! the owner swaps the whole tree behind a lock so concurrent matches always
//! observe one complete generation.

pub mod trie;

pub use trie::{PathTrie, RouteEntry, RouteMatch, RouterError};
