//! # Error Kinds
//!
//! Errors cross the tree boundary as [`eyre::Report`]s. Most are plain
//! context-wrapped store failures, but three conditions are load-bearing
//! for callers and carry a typed payload they can downcast to:
//!
//! - [`TreeError::EndOfIteration`] marks cursor exhaustion. It is returned
//!   only by [`Cursor`](crate::Cursor) methods and by `seek_first`/
//!   `seek_last` on an empty tree; every other tree method reports a miss
//!   as a successful `None`.
//! - [`TreeError::UnknownHandle`] is the store's illegal-sequence
//!   condition: a handle that does not name a live blob. Reaching it from
//!   tree code means structural corruption.
//! - [`TreeError::BadRootRecord`] is the open-time variant of the same
//!   condition: the blob at the tree handle is not a 7-byte root record.
//!
//! The tree performs no local recovery. The first store error aborts the
//! running operation; structural changes already persisted stay persisted,
//! and rollback is the responsibility of the enclosing database.

use thiserror::Error;

/// Conditions callers are expected to dispatch on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The cursor moved past either end of the tree.
    #[error("end of iteration")]
    EndOfIteration,

    /// The store was asked about a handle it never issued or has freed.
    #[error("unknown handle {handle:#x}")]
    UnknownHandle { handle: u64 },

    /// The blob at the tree handle is not a 7-byte root record.
    #[error("root record at {handle:#x} holds {len} bytes, want 7")]
    BadRootRecord { handle: u64, len: usize },
}

impl TreeError {
    /// Reports whether this error denotes structural corruption rather
    /// than iteration state.
    pub fn is_illegal_sequence(&self) -> bool {
        matches!(
            self,
            TreeError::UnknownHandle { .. } | TreeError::BadRootRecord { .. }
        )
    }
}

/// Reports whether `err` is the cursor-exhaustion condition.
pub fn is_end_of_iteration(err: &eyre::Report) -> bool {
    matches!(
        err.downcast_ref::<TreeError>(),
        Some(TreeError::EndOfIteration)
    )
}

/// Reports whether `err` denotes structural corruption.
pub fn is_illegal_sequence(err: &eyre::Report) -> bool {
    err.downcast_ref::<TreeError>()
        .is_some_and(TreeError::is_illegal_sequence)
}
