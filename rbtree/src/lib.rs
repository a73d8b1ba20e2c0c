//! An ordered container engine built on an index-based red-black tree.
//!
//! The tree stores payloads inline in an arena of slots and keeps them
//! sorted under a caller-supplied [`Comparator`]. All structural relations
//! are plain indices ([`NodeId`]), so the whole engine is safe code; a
//! single always-present sentinel slot stands in for "no node here" which
//! keeps the balancing routines free of null special cases.
//!
//! Both unique-key and multi-key trees are supported. In a multi-key tree
//! comparator-equal payloads keep their insertion order.

#![deny(rust_2018_idioms)]

pub mod compare;
pub mod red_black_tree;

pub use compare::{Comparator, NaturalOrder};
pub use red_black_tree::{InsertResult, IntoIter, Iter, NodeId, Range, RedBlackTree};
