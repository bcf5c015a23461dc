//! # Data Page (Leaf) Implementation
//!
//! A data page holds the tree's actual key/value items in ascending key
//! order and chains to its neighbors, so range scans walk sideways along
//! the leaf level without revisiting the index.
//!
//! ## Page Layout
//!
//! ```text
//! Offset      Content
//! ------      -------
//! 0           tag (0x01)
//! 1..8        prev leaf handle (7 bytes, 0 = none)
//! 8..15       next leaf handle (7 bytes, 0 = none)
//! 15..        M items, 2*K_KV bytes each:
//!
//!               0..K_KV      K_KV..2*K_KV
//!             +-----------+--------------+
//!             | key slot  |  value slot  |
//!             +-----------+--------------+
//! ```
//!
//! The raw length is `15 + 2*K_KV*M`; the item count is implicit in the
//! blob size, so there is no separate count field to keep consistent.
//! Slot contents are encoded by the content codec: short content inline,
//! long content spilled to an overflow blob referenced by handle. Bulk
//! item moves between siblings are plain byte copies; the
//! overflow blobs they reference move with their handles and are never
//! touched.
//!
//! ## Occupancy and the Delayed Policy
//!
//! A non-root data page holds between `K_DATA` and `2*K_DATA` items. When
//! an insertion hits a full page, [`overflow`](LeafPage::overflow) first
//! tries to shed one item into an underfull sibling and only splits when
//! both neighbors are full. When an extraction drops a page below
//! `K_DATA`, [`underflow`](LeafPage::underflow) first tries to borrow one
//! item from an overfull sibling and only concatenates when neither
//! neighbor can spare one. The sole leaf that is also the tree root is
//! exempt and may hold any count down to zero.
//!
//! ## Persistence Discipline
//!
//! Item-local methods mutate the in-memory page and leave persistence to
//! the caller. The structural methods (`split`, `overflow`, `underflow`,
//! `concat`) rewrite every page they touch before returning, including
//! the parent index page and the root record when the shape changes.

use eyre::{ensure, Result};
use std::cmp::Ordering;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::content;
use super::interior::IndexPage;
use super::page::{check_siblings, ParentRef};
use super::tree::Collate;
use crate::config::{K_DATA, K_KV, TAG_DATA_PAGE};
use crate::storage::{read_handle, write_handle, PageStore, HANDLE_SIZE};

/// Size of the fixed page header: tag byte plus the two leaf links.
pub const LEAF_HEADER_SIZE: usize = 1 + 2 * HANDLE_SIZE;

/// Size of one key/value item.
pub const ITEM_SIZE: usize = 2 * K_KV;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct LeafHeader {
    tag: u8,
    prev: [u8; HANDLE_SIZE],
    next: [u8; HANDLE_SIZE],
}

/// A data page, owned as bytes and persisted wholesale through the store.
#[derive(Debug, Clone)]
pub struct LeafPage {
    data: Vec<u8>,
}

impl LeafPage {
    pub(crate) fn new() -> Self {
        let mut data = vec![0u8; LEAF_HEADER_SIZE];
        data[0] = TAG_DATA_PAGE;
        Self { data }
    }

    /// Wraps page bytes fetched from the store, validating the tag and
    /// the item alignment of the blob length.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        ensure!(
            data.len() >= LEAF_HEADER_SIZE,
            "data page blob too short: {} bytes",
            data.len()
        );
        ensure!(
            data[0] == TAG_DATA_PAGE,
            "expected data page tag {:#04x}, got {:#04x}",
            TAG_DATA_PAGE,
            data[0]
        );
        ensure!(
            (data.len() - LEAF_HEADER_SIZE) % ITEM_SIZE == 0,
            "data page length {} is not item aligned",
            data.len()
        );
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of key/value items on the page.
    pub fn len(&self) -> usize {
        (self.data.len() - LEAF_HEADER_SIZE) / ITEM_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_len(&mut self, n: usize) {
        self.data.resize(LEAF_HEADER_SIZE + ITEM_SIZE * n, 0);
    }

    fn header(&self) -> &LeafHeader {
        // INVARIANT: length validated in new/from_bytes, never shrunk below the header.
        LeafHeader::ref_from_bytes(&self.data[..LEAF_HEADER_SIZE]).unwrap()
    }

    fn header_mut(&mut self) -> &mut LeafHeader {
        LeafHeader::mut_from_bytes(&mut self.data[..LEAF_HEADER_SIZE]).unwrap()
    }

    /// Handle of the previous leaf in key order, 0 at the front.
    pub fn prev(&self) -> u64 {
        read_handle(&self.header().prev)
    }

    /// Handle of the next leaf in key order, 0 at the back.
    pub fn next(&self) -> u64 {
        read_handle(&self.header().next)
    }

    pub(crate) fn set_prev(&mut self, handle: u64) {
        write_handle(&mut self.header_mut().prev, handle);
    }

    pub(crate) fn set_next(&mut self, handle: u64) {
        write_handle(&mut self.header_mut().next, handle);
    }

    fn item_off(index: usize) -> usize {
        LEAF_HEADER_SIZE + ITEM_SIZE * index
    }

    fn key_off(index: usize) -> usize {
        Self::item_off(index)
    }

    fn value_off(index: usize) -> usize {
        Self::item_off(index) + K_KV
    }

    /// Materializes the key at `index`.
    pub fn key<S: PageStore>(&self, store: &S, index: usize) -> Result<Vec<u8>> {
        content::load(store, &self.data, Self::key_off(index))
    }

    /// Materializes the value at `index`.
    pub fn value<S: PageStore>(&self, store: &S, index: usize) -> Result<Vec<u8>> {
        content::load(store, &self.data, Self::value_off(index))
    }

    pub(crate) fn set_key<S: PageStore>(
        &mut self,
        store: &mut S,
        index: usize,
        key: &[u8],
    ) -> Result<()> {
        content::store_at(store, &mut self.data, Self::key_off(index), key)
    }

    pub(crate) fn set_value<S: PageStore>(
        &mut self,
        store: &mut S,
        index: usize,
        value: &[u8],
    ) -> Result<()> {
        content::store_at(store, &mut self.data, Self::value_off(index), value)
    }

    /// Compares `key` against the key stored at `index`.
    pub(crate) fn key_cmp<S: PageStore>(
        &self,
        store: &S,
        collate: Collate,
        key: &[u8],
        index: usize,
    ) -> Result<Ordering> {
        let stored = content::load_short(store, &self.data, Self::key_off(index))?;
        Ok(collate(key, &stored))
    }

    /// Opens a zeroed item at `index`, shifting later items right, and
    /// writes `key` and `value` through the codec.
    pub(crate) fn insert_item<S: PageStore>(
        &mut self,
        store: &mut S,
        index: usize,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let n = self.len();
        self.set_len(n + 1);
        if index < n {
            self.data
                .copy_within(Self::item_off(index)..Self::item_off(n), Self::item_off(index + 1));
        }
        // The opened slot holds a stale copy of its old bytes; the codec
        // reads the leading byte to pick a transition, so zero it first.
        self.data[Self::item_off(index)..Self::item_off(index + 1)].fill(0);
        self.set_key(store, index, key)?;
        self.set_value(store, index, value)
    }

    /// Removes the item at `index`, returning its value and freeing any
    /// overflow blobs the item's slots referenced.
    pub(crate) fn extract<S: PageStore>(&mut self, store: &mut S, index: usize) -> Result<Vec<u8>> {
        let value = self.value(store, index)?;

        let (_, key_handle) = content::field(&self.data, Self::key_off(index));
        if key_handle != 0 {
            store.free(key_handle)?;
        }
        let (_, value_handle) = content::field(&self.data, Self::value_off(index));
        if value_handle != 0 {
            store.free(value_handle)?;
        }

        let n = self.len() - 1;
        if index < n {
            self.data
                .copy_within(Self::item_off(index + 1).., Self::item_off(index));
        }
        self.set_len(n);
        Ok(value)
    }

    /// Moves the first `n` items of `self` to the tail of `left`.
    pub(crate) fn move_left(&mut self, left: &mut LeafPage, n: usize) {
        let (nl, np) = (left.len(), self.len());
        left.set_len(nl + n);
        left.data[Self::item_off(nl)..Self::item_off(nl + n)]
            .copy_from_slice(&self.data[Self::item_off(0)..Self::item_off(n)]);
        self.data.copy_within(Self::item_off(n).., Self::item_off(0));
        self.set_len(np - n);
    }

    /// Moves the last `n` items of `self` to the head of `right`.
    pub(crate) fn move_right(&mut self, right: &mut LeafPage, n: usize) {
        let (nr, np) = (right.len(), self.len());
        right.set_len(nr + n);
        right
            .data
            .copy_within(Self::item_off(0)..Self::item_off(nr), Self::item_off(n));
        right.data[Self::item_off(0)..Self::item_off(n)]
            .copy_from_slice(&self.data[Self::item_off(np - n)..Self::item_off(np)]);
        self.set_len(np - n);
    }

    /// Splits a full page: allocates a right sibling, splices it into the
    /// leaf chain, moves the upper `K_DATA` items over, records the new
    /// separator in the parent (allocating a new root index page when the
    /// leaf had none), and inserts the pending item on whichever side
    /// `index` landed. Persists everything it touches.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn split<S: PageStore>(
        &mut self,
        store: &mut S,
        root: u64,
        self_h: u64,
        parent: Option<ParentRef>,
        index: usize,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        debug_assert_eq!(self.len(), 2 * K_DATA);

        let mut right = LeafPage::new();
        let rh = store.alloc(right.as_bytes())?;

        let next = self.next();
        if next != 0 {
            right.set_next(next);
            let mut after = LeafPage::from_bytes(store.get(next)?)?;
            after.set_prev(rh);
            store.realloc(next, after.as_bytes())?;
        }
        self.set_next(rh);
        right.set_prev(self_h);

        right.set_len(K_DATA);
        right.data[Self::item_off(0)..Self::item_off(K_DATA)]
            .copy_from_slice(&self.data[Self::item_off(K_DATA)..Self::item_off(2 * K_DATA)]);
        self.set_len(K_DATA);

        match parent {
            Some(parent) => {
                let mut pp = IndexPage::from_bytes(store.get(parent.handle)?)?;
                pp.insert3(parent.index, rh, rh);
                store.realloc(parent.handle, pp.as_bytes())?;
            }
            None => {
                let mut new_root = IndexPage::new(self_h);
                new_root.insert3(0, rh, rh);
                let nrh = store.alloc(new_root.as_bytes())?;
                let mut record = [0u8; HANDLE_SIZE];
                write_handle(&mut record, nrh);
                store.realloc(root, &record)?;
            }
        }

        if index > K_DATA {
            right.insert_item(store, index - K_DATA, key, value)?;
        } else {
            self.insert_item(store, index, key, value)?;
        }

        store.realloc(self_h, self.as_bytes())?;
        store.realloc(rh, right.as_bytes())
    }

    /// Inserts into a full page by the delayed-split policy: shed one item
    /// to an underfull left sibling, else to an underfull right sibling,
    /// else split.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn overflow<S: PageStore>(
        &mut self,
        store: &mut S,
        root: u64,
        self_h: u64,
        parent: Option<ParentRef>,
        index: usize,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let (lh, rh) = check_siblings(store, parent)?;

        if lh != 0 {
            let mut left = LeafPage::from_bytes(store.get(lh)?)?;
            if left.len() < 2 * K_DATA {
                // A left sibling under the same parent implies index >= 1:
                // a key below this page's first item would have descended
                // into the left subtree instead.
                self.move_left(&mut left, 1);
                store.realloc(lh, left.as_bytes())?;
                self.insert_item(store, index - 1, key, value)?;
                return store.realloc(self_h, self.as_bytes());
            }
        }

        if rh != 0 {
            let mut right = LeafPage::from_bytes(store.get(rh)?)?;
            if right.len() < 2 * K_DATA {
                if index < 2 * K_DATA {
                    self.move_right(&mut right, 1);
                    store.realloc(rh, right.as_bytes())?;
                    self.insert_item(store, index, key, value)?;
                    return store.realloc(self_h, self.as_bytes());
                }
                right.insert_item(store, 0, key, value)?;
                return store.realloc(rh, right.as_bytes());
            }
        }

        self.split(store, root, self_h, parent, index, key, value)
    }

    /// Repairs a page that dropped below `K_DATA`: borrow one item from a
    /// sibling that can spare it, else concatenate with a sibling.
    pub(crate) fn underflow<S: PageStore>(
        mut self,
        store: &mut S,
        root: u64,
        iroot: u64,
        parent: ParentRef,
        self_h: u64,
    ) -> Result<()> {
        let (lh, rh) = check_siblings(store, Some(parent))?;

        if lh != 0 {
            let mut left = LeafPage::from_bytes(store.get(lh)?)?;
            if left.len() + self.len() >= 2 * K_DATA {
                left.move_right(&mut self, 1);
                store.realloc(lh, left.as_bytes())?;
                return store.realloc(self_h, self.as_bytes());
            }
        }

        if rh != 0 {
            let mut right = LeafPage::from_bytes(store.get(rh)?)?;
            if self.len() + right.len() > 2 * K_DATA {
                right.move_left(&mut self, 1);
                store.realloc(rh, right.as_bytes())?;
                return store.realloc(self_h, self.as_bytes());
            }
        }

        if lh != 0 {
            let left = LeafPage::from_bytes(store.get(lh)?)?;
            store.realloc(self_h, self.as_bytes())?;
            let parent = ParentRef {
                handle: parent.handle,
                index: parent.index - 1,
            };
            return left.concat(store, root, iroot, parent, lh, self_h);
        }

        self.concat(store, root, iroot, parent, self_h, rh)
    }

    /// Concatenates the right sibling at `right_h` onto `self`: moves its
    /// items over, relinks the leaf chain, frees its page, and removes the
    /// separator from the parent. A parent left with a single entry is the
    /// root; it is freed and `self` becomes the new internal root.
    pub(crate) fn concat<S: PageStore>(
        mut self,
        store: &mut S,
        root: u64,
        iroot: u64,
        parent: ParentRef,
        self_h: u64,
        right_h: u64,
    ) -> Result<()> {
        let mut right = LeafPage::from_bytes(store.get(right_h)?)?;
        let count = right.len();
        right.move_left(&mut self, count);

        let next = right.next();
        if next != 0 {
            let mut after = LeafPage::from_bytes(store.get(next)?)?;
            after.set_prev(self_h);
            store.realloc(next, after.as_bytes())?;
        }
        self.set_next(next);
        store.free(right_h)?;

        let mut pp = IndexPage::from_bytes(store.get(parent.handle)?)?;
        if pp.len() > 1 {
            pp.extract(parent.index);
            pp.set_child(parent.index, self_h);
            store.realloc(parent.handle, pp.as_bytes())?;
            return store.realloc(self_h, self.as_bytes());
        }

        store.free(iroot)?;
        store.realloc(self_h, self.as_bytes())?;
        let mut record = [0u8; HANDLE_SIZE];
        write_handle(&mut record, self_h);
        store.realloc(root, &record)
    }
}
