//! # B+Tree Engine
//!
//! This module implements the ordered key-value engine: a B+tree with
//! delayed split/concatenation over a handle-addressed page store.
//!
//! ## Architecture Overview
//!
//! ```text
//!            root record (7 bytes, stable handle)
//!                 │
//!            [index page]           separators are handles of data
//!            /     |    \           pages; the separating key is that
//!     [index]  [index]  [index]     page's item 0
//!      /   \     ...
//! [data]<->[data]<->[data]<->...    doubly linked in key order
//! ```
//!
//! All key/value items live in data pages; index pages route searches by
//! comparing against the item 0 of the data page each separator
//! references. The leaf level is a doubly linked list, so enumeration
//! never touches the index after the initial seek.
//!
//! ## Delayed Split/Concatenation
//!
//! A full page sheds one item into an underfull sibling before it splits,
//! and an underfull page borrows one item from an overfull sibling before
//! it merges. Splits on insertion and repairs on extraction both happen
//! top-down during the descent, which keeps every traversal iterative and
//! stack-free at the cost of occasional rebalancing a bottom-up scheme
//! would skip.
//!
//! ## Module Map
//!
//! - `content`: inline/overflow content slot codec
//! - `leaf`: data pages and their sibling/rebalance operations
//! - `interior`: index pages, separator routing, rotations
//! - `page`: tag dispatch and the shared binary search
//! - `tree`: the driver and public surface
//! - `cursor`: leaf-chain enumeration

mod content;
mod cursor;
mod interior;
mod leaf;
mod page;
mod tree;

pub use cursor::Cursor;
pub use interior::{IndexPage, ENTRY_SIZE, INDEX_HEADER_SIZE};
pub use leaf::{LeafPage, ITEM_SIZE, LEAF_HEADER_SIZE};
pub use tree::{BTree, Collate};
