//! # Content Slot Codec
//!
//! Every key and value in a data page lives in a fixed [`K_KV`]-byte slot.
//! Content short enough to fit is stored inline; anything longer keeps a
//! prefix in the slot and spills the tail into a separately allocated
//! overflow blob, the same out-of-line indirection databases use for
//! oversized attributes.
//!
//! ## Slot Layout
//!
//! Inline, content length `n < K_KV`:
//!
//! ```text
//!   0     1..=n     n+1..K_KV-1
//! +-----+---------+-------------+
//! |  n  |  bytes  |  zero pad   |
//! +-----+---------+-------------+
//! ```
//!
//! Overflow, content length `>= K_KV`:
//!
//! ```text
//!   0      1..=K_SZ      K_H..K_KV-1
//! +------+-------------+--------------+
//! | 0xFF | first K_SZ  | blob handle  |
//! +------+-------------+--------------+
//! ```
//!
//! The padding of an inline slot is zero-filled on every write, so a page
//! dump never shows stale bytes and byte-level page comparison is
//! meaningful.
//!
//! ## Overwrite Transitions
//!
//! [`store_at`] handles the four old-shape/new-shape combinations:
//! inline→inline rewrites the slot; inline→overflow allocates a blob for
//! the tail; overflow→inline frees the blob; overflow→overflow reuses the
//! existing blob handle and rewrites its payload. The caller persists the
//! page afterwards; blob traffic is the codec's job, page traffic is not.

use eyre::Result;
use smallvec::SmallVec;

use crate::config::{K_H, K_KV, K_SZ};
use crate::storage::{read_handle, write_handle, PageStore};

/// Content held in comparison paths: inline content never spills, and
/// most overflow keys are short enough to stay on the stack too.
pub(crate) type ShortContent = SmallVec<[u8; 2 * K_KV]>;

/// Splits the slot at `off` into its stored prefix and overflow handle.
/// The handle is 0 for an inline slot, in which case the prefix is the
/// whole content.
pub(crate) fn field(page: &[u8], off: usize) -> (&[u8], u64) {
    let slot = &page[off..off + K_KV];
    let n = slot[0] as usize;
    if n >= K_KV {
        (&slot[1..1 + K_SZ], read_handle(&slot[K_H..]))
    } else {
        (&slot[1..1 + n], 0)
    }
}

/// Materializes the full content of the slot at `off`, following the
/// overflow handle when present.
pub(crate) fn load<S: PageStore>(store: &S, page: &[u8], off: usize) -> Result<Vec<u8>> {
    let (prefix, handle) = field(page, off);
    if handle == 0 {
        return Ok(prefix.to_vec());
    }

    let tail = store.get(handle)?;
    let mut content = Vec::with_capacity(prefix.len() + tail.len());
    content.extend_from_slice(prefix);
    content.extend_from_slice(&tail);
    Ok(content)
}

/// [`load`] variant for comparison paths; inline content avoids the heap.
pub(crate) fn load_short<S: PageStore>(
    store: &S,
    page: &[u8],
    off: usize,
) -> Result<ShortContent> {
    let (prefix, handle) = field(page, off);
    let mut content = ShortContent::from_slice(prefix);
    if handle != 0 {
        content.extend_from_slice(&store.get(handle)?);
    }
    Ok(content)
}

/// Replaces the content of the slot at `off` with `content`, allocating,
/// reusing, or freeing the overflow blob as the transition requires.
pub(crate) fn store_at<S: PageStore>(
    store: &mut S,
    page: &mut [u8],
    off: usize,
    content: &[u8],
) -> Result<()> {
    let slot = &mut page[off..off + K_KV];
    if slot[0] as usize >= K_KV {
        let handle = read_handle(&slot[K_H..]);
        if content.len() < K_KV {
            store.free(handle)?;
            write_inline(slot, content);
        } else {
            slot[1..1 + K_SZ].copy_from_slice(&content[..K_SZ]);
            store.realloc(handle, &content[K_SZ..])?;
        }
    } else if content.len() < K_KV {
        write_inline(slot, content);
    } else {
        slot[0] = 0xFF;
        slot[1..1 + K_SZ].copy_from_slice(&content[..K_SZ]);
        let handle = store.alloc(&content[K_SZ..])?;
        write_handle(&mut slot[K_H..], handle);
    }
    Ok(())
}

fn write_inline(slot: &mut [u8], content: &[u8]) {
    slot[0] = content.len() as u8;
    slot[1..1 + content.len()].copy_from_slice(content);
    slot[1 + content.len()..K_KV].fill(0);
}
