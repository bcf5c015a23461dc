//! # leafdb - Ordered Key-Value Storage
//!
//! leafdb is a persistent, ordered key-value container: a B+tree with
//! delayed split/concatenation layered over a handle-addressed page
//! store. Keys and values are arbitrary byte strings; ordering comes from
//! a caller-supplied collation or plain byte order.
//!
//! ## Quick Start
//!
//! ```
//! use leafdb::BTree;
//!
//! # fn main() -> eyre::Result<()> {
//! let mut tree = BTree::new(None);
//!
//! tree.set(b"banana", b"yellow")?;
//! tree.set(b"apple", b"red")?;
//!
//! assert_eq!(tree.get(b"apple")?, Some(b"red".to_vec()));
//!
//! let mut cursor = tree.seek_first()?;
//! let (key, _value) = cursor.current()?;
//! assert_eq!(key, b"apple");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Public API (BTree, Cursor)        │
//! ├─────────────────────────────────────┤
//! │   Tree driver (iterative descents,  │
//! │   top-down split/underflow)         │
//! ├──────────────────┬──────────────────┤
//! │   Index pages    │   Data pages     │
//! │   (separators)   │   (leaf chain)   │
//! ├──────────────────┴──────────────────┤
//! │   Content slot codec                │
//! │   (inline / overflow blobs)         │
//! ├─────────────────────────────────────┤
//! │   PageStore trait                   │
//! │   (MemStore / external allocator)   │
//! └─────────────────────────────────────┘
//! ```
//!
//! A tree's public identity is the handle of its 7-byte root record; all
//! other page handles are internal and change under structural
//! modification. The store below the trait line is replaceable: the
//! built-in [`MemStore`] backs volatile trees, a durable allocator backs
//! persistent ones, and the tree cannot tell the difference.
//!
//! ## Concurrency Contract
//!
//! The tree is single-threaded by design. Callers serialize all
//! operations; live [`Cursor`]s borrow the tree, so the compiler enforces
//! the mutate-invalidates-cursors rule. There is no internal locking, no
//! rollback, and no background maintenance.
//!
//! ## Module Overview
//!
//! - [`btree`]: the tree engine, pages, and cursors
//! - [`storage`]: the page store contract and the in-memory store
//! - [`config`]: fan-out and slot-width constants
//! - [`error`]: typed error kinds and downcast helpers

pub mod btree;
pub mod config;
pub mod error;
pub mod storage;

pub use btree::{BTree, Collate, Cursor, IndexPage, LeafPage};
pub use error::{is_end_of_iteration, is_illegal_sequence, TreeError};
pub use storage::{MemStore, PageStore};
