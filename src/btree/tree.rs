//! # Tree Driver
//!
//! [`BTree`] owns a page store, the handle of its 7-byte root record, and
//! the collation function. The root record is the tree's public identity:
//! its payload is the handle of the current internal root page, or 0 for
//! an empty tree. Every internal page handle may change under structural
//! modification; the root record's handle never does.
//!
//! ## Root States
//!
//! ```text
//! empty            root record = 0
//!   │  first put
//!   ▼
//! singleton leaf   root record -> data page (0..=2*K_DATA items)
//!   │  first split of that leaf
//!   ▼
//! multi-level      root record -> index page
//! ```
//!
//! The transitions run both ways: concatenation of the last index page
//! collapses multi-level back to a singleton leaf, and extraction of the
//! last item (or `clear`) returns to empty.
//!
//! ## Iterative Descents
//!
//! All traversals are loops carrying the current page handle plus the
//! parent coordinates `(parent handle, child index)` needed for sibling
//! checks and separator maintenance; there is no recursion and no path
//! stack. Rebalancing is preemptive and top-down:
//!
//! - `put` splits any index page found above `2*K_INDEX` entries before
//!   descending through it, so a later leaf split always finds room for
//!   its promoted separator.
//! - `extract` repairs any non-root page found below its minimum before
//!   descending through it, so a later concatenation always finds a
//!   parent that can lose an entry.
//!
//! The price is an occasional split or rotation that strict bottom-up
//! rebalancing would have avoided; the delayed split/concatenation policy
//! makes that trade for stackless descents.
//!
//! ## What This Layer Does Not Do
//!
//! No locking (callers serialize), no rollback (a store error aborts the
//! operation and keeps whatever was already persisted), no typed codecs
//! (keys and values are byte strings ordered by the collation).

use eyre::Result;
use std::cmp::Ordering;
use std::io;

use super::cursor::Cursor;
use super::leaf::LeafPage;
use super::page::{Page, ParentRef};
use crate::config::{K_DATA, K_INDEX};
use crate::error::{is_end_of_iteration, TreeError};
use crate::storage::{read_handle, write_handle, MemStore, PageStore, HANDLE_SIZE};

/// Total order over byte-string keys. `None` in the constructors selects
/// plain byte order.
pub type Collate = fn(&[u8], &[u8]) -> Ordering;

fn byte_collate(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// An ordered key-value map: a B+tree with delayed split/concatenation
/// over a handle-addressed page store.
#[derive(Debug)]
pub struct BTree<S> {
    store: S,
    root: u64,
    collate: Collate,
}

impl BTree<MemStore> {
    /// Creates a memory-only tree.
    pub fn new(collate: Option<Collate>) -> Self {
        let mut store = MemStore::new();
        let root = store
            .alloc(&[0u8; HANDLE_SIZE])
            .expect("memory store allocation is infallible");
        Self {
            store,
            root,
            collate: collate.unwrap_or(byte_collate),
        }
    }
}

impl<S: PageStore> BTree<S> {
    /// Creates a tree in `store`, returning it together with the handle
    /// of its freshly allocated root record. The handle reopens the tree
    /// later and identifies it to [`remove`](BTree::remove).
    pub fn create(mut store: S, collate: Option<Collate>) -> Result<(Self, u64)> {
        let root = store.alloc(&[0u8; HANDLE_SIZE])?;
        let tree = Self {
            store,
            root,
            collate: collate.unwrap_or(byte_collate),
        };
        Ok((tree, root))
    }

    /// Opens the tree whose root record lives at `handle`. Fails with an
    /// illegal-sequence error when the blob there is not a 7-byte root
    /// record.
    pub fn open(store: S, collate: Option<Collate>, handle: u64) -> Result<Self> {
        let record = store.get(handle)?;
        if record.len() != HANDLE_SIZE {
            return Err(TreeError::BadRootRecord {
                handle,
                len: record.len(),
            }
            .into());
        }
        Ok(Self {
            store,
            root: handle,
            collate: collate.unwrap_or(byte_collate),
        })
    }

    /// Removes the tree at `handle` from `store`: clears it and frees the
    /// root record. An empty tree costs only its record, so trees that may
    /// be refilled later are cheaper kept than removed, and keeping them
    /// preserves their stable handle.
    pub fn remove(store: S, handle: u64) -> Result<()> {
        let mut tree = Self::open(store, None, handle)?;
        tree.clear()?;
        tree.store.free(handle)
    }

    /// Handle of the root record, the tree's stable public identity.
    pub fn handle(&self) -> u64 {
        self.root
    }

    /// The underlying page store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn iroot(&self) -> Result<u64> {
        let record = self.store.get(self.root)?;
        if record.len() != HANDLE_SIZE {
            return Err(TreeError::BadRootRecord {
                handle: self.root,
                len: record.len(),
            }
            .into());
        }
        Ok(read_handle(&record))
    }

    fn set_iroot(&mut self, handle: u64) -> Result<()> {
        let mut record = [0u8; HANDLE_SIZE];
        write_handle(&mut record, handle);
        self.store.realloc(self.root, &record)
    }

    /// Returns the value associated with `key`, or `None`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut ph = self.iroot()?;
        if ph == 0 {
            return Ok(None);
        }

        loop {
            let page = Page::from_bytes(self.store.get(ph)?)?;
            let (index, found) = page.find(&self.store, self.collate, key)?;
            match page {
                Page::Index(page) => {
                    if found {
                        let dp = LeafPage::from_bytes(self.store.get(page.data_page(index))?)?;
                        return dp.value(&self.store, 0).map(Some);
                    }
                    ph = page.child(index);
                }
                Page::Leaf(page) => {
                    if found {
                        return page.value(&self.store, index).map(Some);
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Combined get-and-set walking the tree once. `upd` receives the key
    /// and the current value (`None` when absent) and returns the new
    /// value plus a write flag; when the flag is false the tree is left
    /// untouched. Returns the previous value, if any, and whether a write
    /// happened.
    ///
    /// `upd` must not touch the tree: `put` holds the only mutable
    /// reference for its whole duration, so the borrow checker already
    /// rules out re-entrant mutation.
    pub fn put<F>(&mut self, key: &[u8], upd: F) -> Result<(Option<Vec<u8>>, bool)>
    where
        F: FnOnce(&[u8], Option<&[u8]>) -> Result<(Vec<u8>, bool)>,
    {
        let iroot = self.iroot()?;
        if iroot == 0 {
            let (value, write) = upd(key, None)?;
            if !write {
                return Ok((None, false));
            }
            let mut page = LeafPage::new();
            page.insert_item(&mut self.store, 0, key, &value)?;
            let h = self.store.alloc(page.as_bytes())?;
            self.set_iroot(h)?;
            return Ok((None, true));
        }

        let mut parent: Option<ParentRef> = None;
        let mut ph = iroot;
        loop {
            let page = Page::from_bytes(self.store.get(ph)?)?;
            let (mut index, found) = page.find(&self.store, self.collate, key)?;
            match page {
                Page::Index(mut page) => {
                    if found {
                        let dph = page.data_page(index);
                        let mut dp = LeafPage::from_bytes(self.store.get(dph)?)?;
                        let old = dp.value(&self.store, 0)?;
                        let (value, write) = upd(key, Some(&old))?;
                        if !write {
                            return Ok((Some(old), false));
                        }
                        dp.set_value(&mut self.store, 0, &value)?;
                        self.store.realloc(dph, dp.as_bytes())?;
                        return Ok((Some(old), true));
                    }
                    if page.len() > 2 * K_INDEX {
                        page.split(&mut self.store, self.root, &mut ph, parent, &mut index)?;
                    }
                    parent = Some(ParentRef { handle: ph, index });
                    ph = page.child(index);
                }
                Page::Leaf(mut page) => {
                    if found {
                        let old = page.value(&self.store, index)?;
                        let (value, write) = upd(key, Some(&old))?;
                        if !write {
                            return Ok((Some(old), false));
                        }
                        page.set_value(&mut self.store, index, &value)?;
                        self.store.realloc(ph, page.as_bytes())?;
                        return Ok((Some(old), true));
                    }

                    let (value, write) = upd(key, None)?;
                    if !write {
                        return Ok((None, false));
                    }
                    if page.len() < 2 * K_DATA {
                        page.insert_item(&mut self.store, index, key, &value)?;
                        self.store.realloc(ph, page.as_bytes())?;
                    } else {
                        page.overflow(
                            &mut self.store,
                            self.root,
                            ph,
                            parent,
                            index,
                            key,
                            &value,
                        )?;
                    }
                    return Ok((None, true));
                }
            }
        }
    }

    /// Associates `value` with `key`, overwriting any previous value.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put(key, |_, _| Ok((value.to_vec(), true)))?;
        Ok(())
    }

    /// Deletes `key` and its value; deleting an absent key is not an
    /// error.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.extract(key)?;
        Ok(())
    }

    /// Combined get-and-delete walking the tree once. Returns the removed
    /// value, or `None` when the key was absent.
    pub fn extract(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let iroot = self.iroot()?;
        if iroot == 0 {
            return Ok(None);
        }

        let mut parent: Option<ParentRef> = None;
        let mut ph = iroot;
        loop {
            let page = Page::from_bytes(self.store.get(ph)?)?;
            let (mut index, found) = page.find(&self.store, self.collate, key)?;
            match page {
                Page::Index(mut page) => {
                    if found {
                        // The matched separator is item 0 of its data
                        // page. When that page can lose an item, pop it
                        // here; the separator slides to the new item 0 on
                        // its own because it is referenced by handle.
                        let dph = page.data_page(index);
                        let mut dp = LeafPage::from_bytes(self.store.get(dph)?)?;
                        if dp.len() > K_DATA {
                            let value = dp.extract(&mut self.store, 0)?;
                            self.store.realloc(dph, dp.as_bytes())?;
                            return Ok(Some(value));
                        }
                        if page.len() < K_INDEX && ph != iroot {
                            // ph != iroot, so the descent recorded a parent.
                            let p = parent.expect("non-root page has a recorded parent");
                            page.underflow(
                                &mut self.store,
                                self.root,
                                iroot,
                                p,
                                &mut ph,
                                &mut index,
                            )?;
                        }
                        parent = Some(ParentRef {
                            handle: ph,
                            index: index + 1,
                        });
                        ph = page.child(index + 1);
                        continue;
                    }

                    if page.len() < K_INDEX && ph != iroot {
                        let p = parent.expect("non-root page has a recorded parent");
                        page.underflow(&mut self.store, self.root, iroot, p, &mut ph, &mut index)?;
                    }
                    parent = Some(ParentRef { handle: ph, index });
                    ph = page.child(index);
                }
                Page::Leaf(mut page) => {
                    if !found {
                        return Ok(None);
                    }
                    let value = page.extract(&mut self.store, index)?;
                    if page.len() >= K_DATA {
                        self.store.realloc(ph, page.as_bytes())?;
                    } else if ph != iroot {
                        let p = parent.expect("non-root page has a recorded parent");
                        page.underflow(&mut self.store, self.root, iroot, p, ph)?;
                    } else if page.is_empty() {
                        self.store.free(ph)?;
                        self.set_iroot(0)?;
                    } else {
                        self.store.realloc(ph, page.as_bytes())?;
                    }
                    return Ok(Some(value));
                }
            }
        }
    }

    /// Deletes one item chosen by position rather than by key (the median
    /// of each page on the way down). Returns whether the tree is empty
    /// afterwards.
    pub fn delete_any(&mut self) -> Result<bool> {
        let iroot = self.iroot()?;
        if iroot == 0 {
            return Ok(true);
        }

        let mut parent: Option<ParentRef> = None;
        let mut ph = iroot;
        loop {
            let page = Page::from_bytes(self.store.get(ph)?)?;
            let mut index = page.len() / 2;
            match page {
                Page::Index(mut page) => {
                    let dph = page.data_page(index);
                    let mut dp = LeafPage::from_bytes(self.store.get(dph)?)?;
                    if dp.len() > K_DATA {
                        dp.extract(&mut self.store, 0)?;
                        self.store.realloc(dph, dp.as_bytes())?;
                        return Ok(false);
                    }
                    if page.len() < K_INDEX && ph != iroot {
                        // ph != iroot, so the descent recorded a parent.
                        let p = parent.expect("non-root page has a recorded parent");
                        page.underflow(&mut self.store, self.root, iroot, p, &mut ph, &mut index)?;
                    }
                    parent = Some(ParentRef {
                        handle: ph,
                        index: index + 1,
                    });
                    ph = page.child(index + 1);
                }
                Page::Leaf(mut page) => {
                    page.extract(&mut self.store, index)?;
                    if page.len() >= K_DATA {
                        self.store.realloc(ph, page.as_bytes())?;
                        return Ok(false);
                    }
                    if ph != iroot {
                        let p = parent.expect("non-root page has a recorded parent");
                        page.underflow(&mut self.store, self.root, iroot, p, ph)?;
                        return Ok(false);
                    }
                    if page.is_empty() {
                        self.store.free(ph)?;
                        self.set_iroot(0)?;
                        return Ok(true);
                    }
                    self.store.realloc(ph, page.as_bytes())?;
                    return Ok(false);
                }
            }
        }
    }

    fn first_page(&self) -> Result<Option<(u64, LeafPage)>> {
        let mut ph = self.iroot()?;
        while ph != 0 {
            match Page::from_bytes(self.store.get(ph)?)? {
                Page::Leaf(page) => return Ok(Some((ph, page))),
                Page::Index(page) => ph = page.child(0),
            }
        }
        Ok(None)
    }

    fn last_page(&self) -> Result<Option<(u64, LeafPage)>> {
        let mut ph = self.iroot()?;
        while ph != 0 {
            match Page::from_bytes(self.store.get(ph)?)? {
                Page::Leaf(page) => return Ok(Some((ph, page))),
                Page::Index(page) => ph = page.child(page.len()),
            }
        }
        Ok(None)
    }

    /// Returns the smallest key and its value, or `None` for an empty
    /// tree.
    pub fn first(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let Some((_, page)) = self.first_page()? else {
            return Ok(None);
        };
        let key = page.key(&self.store, 0)?;
        let value = page.value(&self.store, 0)?;
        Ok(Some((key, value)))
    }

    /// Returns the largest key and its value, or `None` for an empty
    /// tree.
    pub fn last(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let Some((_, page)) = self.last_page()? else {
            return Ok(None);
        };
        let index = page.len() - 1;
        let key = page.key(&self.store, index)?;
        let value = page.value(&self.store, index)?;
        Ok(Some((key, value)))
    }

    /// Positions a cursor at `key`, or at the point where `key` would be
    /// inserted, which may sit one past the last item of a leaf. The flag
    /// reports an exact hit.
    pub fn seek(&self, key: &[u8]) -> Result<(Cursor<'_, S>, bool)> {
        let mut page = None;
        let mut index = 0;
        let mut hit = false;

        let mut ph = self.iroot()?;
        while ph != 0 {
            let current = Page::from_bytes(self.store.get(ph)?)?;
            let (i, found) = current.find(&self.store, self.collate, key)?;
            index = i;
            match current {
                Page::Index(ip) => {
                    if found {
                        let dp = LeafPage::from_bytes(self.store.get(ip.data_page(i))?)?;
                        page = Some(dp);
                        index = 0;
                        hit = true;
                        break;
                    }
                    ph = ip.child(i);
                }
                Page::Leaf(dp) => {
                    page = Some(dp);
                    hit = found;
                    break;
                }
            }
        }

        Ok((Cursor::new(&self.store, page, index), hit))
    }

    /// Returns a cursor on the smallest key, or
    /// [`TreeError::EndOfIteration`] for an empty tree.
    pub fn seek_first(&self) -> Result<Cursor<'_, S>> {
        match self.first_page()? {
            Some((_, page)) => Ok(Cursor::new(&self.store, Some(page), 0)),
            None => Err(TreeError::EndOfIteration.into()),
        }
    }

    /// Returns a cursor on the largest key, or
    /// [`TreeError::EndOfIteration`] for an empty tree.
    pub fn seek_last(&self) -> Result<Cursor<'_, S>> {
        match self.last_page()? {
            Some((_, page)) => {
                let index = page.len() - 1;
                Ok(Cursor::new(&self.store, Some(page), index))
            }
            None => Err(TreeError::EndOfIteration.into()),
        }
    }

    /// Empties the tree: frees every reachable page and overflow blob and
    /// zeroes the root record. The tree stays usable and keeps its
    /// handle.
    pub fn clear(&mut self) -> Result<()> {
        let iroot = self.iroot()?;
        if iroot == 0 {
            return Ok(());
        }
        self.clear_page(iroot)?;
        self.set_iroot(0)
    }

    fn clear_page(&mut self, ph: u64) -> Result<()> {
        match Page::from_bytes(self.store.get(ph)?)? {
            Page::Index(page) => {
                for i in 0..=page.len() {
                    self.clear_page(page.child(i))?;
                }
            }
            Page::Leaf(mut page) => {
                // Writing empty content through the codec releases the
                // overflow blobs the slots may reference.
                for i in 0..page.len() {
                    page.set_key(&mut self.store, i, &[])?;
                    page.set_value(&mut self.store, i, &[])?;
                }
            }
        }
        self.store.free(ph)
    }

    /// Writes a `key → value` line per item to `out`, rendering byte
    /// strings as text where printable and hex otherwise. Diagnostic
    /// output; the format is not stable.
    pub fn dump(&self, out: &mut dyn io::Write) -> Result<()> {
        let mut cursor = match self.seek_first() {
            Ok(cursor) => cursor,
            Err(err) if is_end_of_iteration(&err) => return Ok(()),
            Err(err) => return Err(err),
        };

        loop {
            let (key, value) = cursor.current()?;
            writeln!(out, "{} → {}", render(&key), render(&value))?;
            match cursor.next() {
                Ok(()) => {}
                Err(err) if is_end_of_iteration(&err) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

fn render(bytes: &[u8]) -> String {
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        format!("{:?}", String::from_utf8_lossy(bytes))
    } else {
        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        format!("0x{hex}")
    }
}
