//! # Index Page (Interior Node) Implementation
//!
//! An index page routes searches. It holds an ordered array of entries,
//! each pairing a separator with the child subtree to the separator's
//! right, plus one extra leftmost child for keys below every separator.
//!
//! ## Page Layout
//!
//! ```text
//! Offset      Content
//! ------      -------
//! 0           tag (0x00)
//! 1..8        leftmost child handle (7 bytes)
//! 8..         N entries, 14 bytes each:
//!
//!               0..7          7..14
//!             +------------+---------+
//!             | data page  |  child  |
//!             +------------+---------+
//! ```
//!
//! With the leftmost child counted, entry layout is equivalently `child[0]
//! | N x (data_page[i], child[i+1])`: `child(i)` reads at offset `1+14*i`
//! and `data_page(i)` at `8+14*i`, so `child(len())` is always valid.
//!
//! ## Indirect Separators
//!
//! A separator is not a key copy. It is the handle of the data page whose
//! item 0 carries the separating key, which is the minimum key of the
//! subtree at `child(i+1)`. Comparing against a separator therefore costs
//! one page fetch, and in exchange separators never go stale: when the
//! minimum of a subtree changes (an extraction slides a new key into item
//! 0 of that leaf), every separator referencing the leaf is correct by
//! construction.
//!
//! ## Occupancy and the Delayed Policy
//!
//! Steady-state occupancy is `K_INDEX..=2*K_INDEX` entries for non-root
//! pages and `1..=2*K_INDEX+2` for the root. Rebalancing is top-down:
//! descents for insertion split any page found above `2*K_INDEX`, and
//! descents for extraction repair any non-root page found below
//! `K_INDEX`, so a page can sit one entry outside the steady band until
//! the next descent passes through it. [`underflow`](IndexPage::underflow)
//! rotates an entry through the parent separator when a sibling can spare
//! one and concatenates otherwise.

use eyre::{ensure, Result};
use std::cmp::Ordering;

use super::leaf::LeafPage;
use super::page::{check_siblings, ParentRef};
use super::tree::Collate;
use crate::config::{K_INDEX, TAG_INDEX_PAGE};
use crate::storage::{read_handle, write_handle, PageStore, HANDLE_SIZE};

/// Size of the fixed page header: tag byte plus the leftmost child.
pub const INDEX_HEADER_SIZE: usize = 1 + HANDLE_SIZE;

/// Size of one (data page, child) entry.
pub const ENTRY_SIZE: usize = 2 * HANDLE_SIZE;

/// An index page, owned as bytes and persisted wholesale through the
/// store.
#[derive(Debug, Clone)]
pub struct IndexPage {
    data: Vec<u8>,
}

impl IndexPage {
    pub(crate) fn new(leftmost_child: u64) -> Self {
        let mut data = vec![0u8; INDEX_HEADER_SIZE];
        data[0] = TAG_INDEX_PAGE;
        write_handle(&mut data[1..], leftmost_child);
        Self { data }
    }

    /// Wraps page bytes fetched from the store, validating the tag and
    /// the entry alignment of the blob length.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        ensure!(
            data.len() >= INDEX_HEADER_SIZE,
            "index page blob too short: {} bytes",
            data.len()
        );
        ensure!(
            data[0] == TAG_INDEX_PAGE,
            "expected index page tag {:#04x}, got {:#04x}",
            TAG_INDEX_PAGE,
            data[0]
        );
        ensure!(
            (data.len() - INDEX_HEADER_SIZE) % ENTRY_SIZE == 0,
            "index page length {} is not entry aligned",
            data.len()
        );
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of separator entries; the page references `len() + 1`
    /// children.
    pub fn len(&self) -> usize {
        (self.data.len() - INDEX_HEADER_SIZE) / ENTRY_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_len(&mut self, n: usize) {
        self.data.resize(INDEX_HEADER_SIZE + ENTRY_SIZE * n, 0);
    }

    /// Handle of the child subtree at `index`; valid for `0..=len()`.
    pub fn child(&self, index: usize) -> u64 {
        read_handle(&self.data[1 + ENTRY_SIZE * index..])
    }

    pub(crate) fn set_child(&mut self, index: usize, handle: u64) {
        write_handle(&mut self.data[1 + ENTRY_SIZE * index..], handle);
    }

    /// Handle of the separator data page at `index`; valid for
    /// `0..len()`.
    pub fn data_page(&self, index: usize) -> u64 {
        read_handle(&self.data[INDEX_HEADER_SIZE + ENTRY_SIZE * index..])
    }

    pub(crate) fn set_data_page(&mut self, index: usize, handle: u64) {
        write_handle(
            &mut self.data[INDEX_HEADER_SIZE + ENTRY_SIZE * index..],
            handle,
        );
    }

    fn insert(&mut self, index: usize) {
        let n = self.len();
        self.set_len(n + 1);
        if index < n {
            self.data.copy_within(
                INDEX_HEADER_SIZE + ENTRY_SIZE * index..INDEX_HEADER_SIZE + ENTRY_SIZE * n,
                INDEX_HEADER_SIZE + ENTRY_SIZE * (index + 1),
            );
        }
    }

    /// Inserts an entry at `index` carrying `data_page` as the separator
    /// and `child` as the child to its right; the child at `index` is
    /// unchanged.
    pub(crate) fn insert3(&mut self, index: usize, data_page: u64, child: u64) {
        self.insert(index);
        self.set_data_page(index, data_page);
        self.set_child(index + 1, child);
    }

    /// Removes the entry at `index` together with the child at `index`,
    /// sliding later entries left.
    pub(crate) fn extract(&mut self, index: usize) {
        let n = self.len() - 1;
        if index < n {
            self.data.copy_within(
                1 + ENTRY_SIZE * (index + 1)..,
                1 + ENTRY_SIZE * index,
            );
        }
        self.set_len(n);
    }

    /// Compares `key` against the separator at `index` by loading the
    /// referenced data page and reading its item 0.
    pub(crate) fn key_cmp<S: PageStore>(
        &self,
        store: &S,
        collate: Collate,
        key: &[u8],
        index: usize,
    ) -> Result<Ordering> {
        let page = LeafPage::from_bytes(store.get(self.data_page(index))?)?;
        page.key_cmp(store, collate, key, 0)
    }

    /// Splits a page holding `2*K_INDEX+1` entries: the upper `K_INDEX`
    /// entries move to a fresh right sibling, the separator at `K_INDEX`
    /// is promoted into the parent (or a new root index page is allocated
    /// when there is no parent), and when the descent position `index`
    /// falls into the right half, the caller's working page, handle, and
    /// index are redirected to the sibling. Persists everything it
    /// touches.
    pub(crate) fn split<S: PageStore>(
        &mut self,
        store: &mut S,
        root: u64,
        self_h: &mut u64,
        parent: Option<ParentRef>,
        index: &mut usize,
    ) -> Result<()> {
        debug_assert_eq!(self.len(), 2 * K_INDEX + 1);

        let mut right = IndexPage::new(0);
        right.set_len(K_INDEX);
        // The right half starts at child(K_INDEX + 1); the promoted
        // separator between the halves goes to the parent instead.
        let upper = 1 + ENTRY_SIZE * (K_INDEX + 1);
        right.data[1..1 + (2 * K_INDEX + 1) * HANDLE_SIZE]
            .copy_from_slice(&self.data[upper..]);
        let promoted = self.data_page(K_INDEX);
        self.set_len(K_INDEX);

        store.realloc(*self_h, self.as_bytes())?;
        let rh = store.alloc(right.as_bytes())?;

        match parent {
            Some(parent) => {
                let mut pp = IndexPage::from_bytes(store.get(parent.handle)?)?;
                pp.insert3(parent.index, promoted, rh);
                store.realloc(parent.handle, pp.as_bytes())?;
            }
            None => {
                let mut new_root = IndexPage::new(*self_h);
                new_root.insert3(0, promoted, rh);
                let nrh = store.alloc(new_root.as_bytes())?;
                let mut record = [0u8; HANDLE_SIZE];
                write_handle(&mut record, nrh);
                store.realloc(root, &record)?;
            }
        }

        if *index > K_INDEX {
            *self = right;
            *self_h = rh;
            *index -= K_INDEX + 1;
        }
        Ok(())
    }

    /// Repairs a non-root page that dropped below `K_INDEX` entries:
    /// rotate one entry through the parent separator from a sibling that
    /// can spare it, else concatenate. The caller's working handle and
    /// descent index track any redirection.
    pub(crate) fn underflow<S: PageStore>(
        &mut self,
        store: &mut S,
        root: u64,
        iroot: u64,
        parent: ParentRef,
        self_h: &mut u64,
        index: &mut usize,
    ) -> Result<()> {
        let (lh, rh) = check_siblings(store, Some(parent))?;

        let mut left = match lh {
            0 => None,
            _ => Some(IndexPage::from_bytes(store.get(lh)?)?),
        };

        if let Some(left) = left.as_mut() {
            let lc = left.len();
            if lc > K_INDEX {
                let mut pp = IndexPage::from_bytes(store.get(parent.handle)?)?;
                let n = self.len();
                self.set_len(n + 1);
                self.data
                    .copy_within(1..1 + (2 * n + 1) * HANDLE_SIZE, 1 + ENTRY_SIZE);
                self.set_child(0, left.child(lc));
                self.set_data_page(0, pp.data_page(parent.index - 1));
                *index += 1;
                pp.set_data_page(parent.index - 1, left.data_page(lc - 1));
                left.set_len(lc - 1);
                store.realloc(parent.handle, pp.as_bytes())?;
                store.realloc(*self_h, self.as_bytes())?;
                return store.realloc(lh, left.as_bytes());
            }
        }

        if rh != 0 {
            let mut right = IndexPage::from_bytes(store.get(rh)?)?;
            let rc = right.len();
            if rc > K_INDEX {
                let mut pp = IndexPage::from_bytes(store.get(parent.handle)?)?;
                let n = self.len();
                self.set_len(n + 1);
                self.set_data_page(n, pp.data_page(parent.index));
                self.set_child(n + 1, right.child(0));
                pp.set_data_page(parent.index, right.data_page(0));
                right.data.copy_within(1 + ENTRY_SIZE.., 1);
                right.set_len(rc - 1);
                store.realloc(parent.handle, pp.as_bytes())?;
                store.realloc(*self_h, self.as_bytes())?;
                return store.realloc(rh, right.as_bytes());
            }
        }

        if let Some(mut left) = left {
            *index += left.len() + 1;
            let merge_parent = ParentRef {
                handle: parent.handle,
                index: parent.index - 1,
            };
            left.concat(store, root, iroot, merge_parent, lh, *self_h)?;
            *self = left;
            *self_h = lh;
            return Ok(());
        }

        self.concat(store, root, iroot, parent, *self_h, rh)
    }

    /// Concatenates the right sibling at `right_h` onto `self`: the parent
    /// separator comes down between the two entry runs, the sibling's page
    /// is freed, and the separator leaves the parent. A parent left with a
    /// single entry is the root; it is freed and `self` becomes the new
    /// internal root.
    pub(crate) fn concat<S: PageStore>(
        &mut self,
        store: &mut S,
        root: u64,
        iroot: u64,
        parent: ParentRef,
        self_h: u64,
        right_h: u64,
    ) -> Result<()> {
        let mut pp = IndexPage::from_bytes(store.get(parent.handle)?)?;
        let right = IndexPage::from_bytes(store.get(right_h)?)?;

        let (n, rc) = (self.len(), right.len());
        self.set_len(n + rc + 1);
        self.set_data_page(n, pp.data_page(parent.index));
        let dst = 1 + ENTRY_SIZE * (n + 1);
        self.data[dst..dst + (2 * rc + 1) * HANDLE_SIZE].copy_from_slice(&right.data[1..]);

        store.realloc(self_h, self.as_bytes())?;
        store.free(right_h)?;

        if pp.len() > 1 {
            pp.extract(parent.index);
            pp.set_child(parent.index, self_h);
            return store.realloc(parent.handle, pp.as_bytes());
        }

        store.free(iroot)?;
        let mut record = [0u8; HANDLE_SIZE];
        write_handle(&mut record, self_h);
        store.realloc(root, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_holds_the_leftmost_child() {
        let page = IndexPage::new(42);

        assert_eq!(page.len(), 0);
        assert_eq!(page.child(0), 42);
        assert_eq!(page.as_bytes()[0], TAG_INDEX_PAGE);
    }

    #[test]
    fn from_bytes_rejects_wrong_tag() {
        let mut data = vec![0u8; INDEX_HEADER_SIZE];
        data[0] = 0x01;
        assert!(IndexPage::from_bytes(data).is_err());
    }

    #[test]
    fn insert3_keeps_the_left_child() {
        let mut page = IndexPage::new(10);

        page.insert3(0, 100, 20);

        assert_eq!(page.len(), 1);
        assert_eq!(page.child(0), 10);
        assert_eq!(page.data_page(0), 100);
        assert_eq!(page.child(1), 20);
    }

    #[test]
    fn insert3_in_the_middle_shifts_later_entries() {
        let mut page = IndexPage::new(10);
        page.insert3(0, 100, 20);
        page.insert3(1, 300, 40);

        page.insert3(1, 200, 30);

        assert_eq!(page.len(), 3);
        assert_eq!(page.child(0), 10);
        assert_eq!(page.data_page(0), 100);
        assert_eq!(page.child(1), 20);
        assert_eq!(page.data_page(1), 200);
        assert_eq!(page.child(2), 30);
        assert_eq!(page.data_page(2), 300);
        assert_eq!(page.child(3), 40);
    }

    #[test]
    fn extract_removes_entry_and_its_left_child() {
        let mut page = IndexPage::new(10);
        page.insert3(0, 100, 20);
        page.insert3(1, 200, 30);
        page.insert3(2, 300, 40);

        page.extract(1);

        assert_eq!(page.len(), 2);
        assert_eq!(page.child(0), 10);
        assert_eq!(page.data_page(0), 100);
        assert_eq!(page.child(1), 30);
        assert_eq!(page.data_page(1), 300);
        assert_eq!(page.child(2), 40);
    }

    #[test]
    fn extract_of_last_entry_drops_the_tail_child() {
        let mut page = IndexPage::new(10);
        page.insert3(0, 100, 20);
        page.insert3(1, 200, 30);

        page.extract(1);

        assert_eq!(page.len(), 1);
        assert_eq!(page.child(0), 10);
        assert_eq!(page.data_page(0), 100);
        assert_eq!(page.child(1), 30);
    }

    #[test]
    fn roundtrip_through_bytes() {
        let mut page = IndexPage::new(1);
        page.insert3(0, 5, 2);
        page.insert3(1, 6, 3);

        let reparsed = IndexPage::from_bytes(page.as_bytes().to_vec()).unwrap();

        assert_eq!(reparsed.len(), 2);
        assert_eq!(reparsed.child(0), 1);
        assert_eq!(reparsed.data_page(0), 5);
        assert_eq!(reparsed.child(1), 2);
        assert_eq!(reparsed.data_page(1), 6);
        assert_eq!(reparsed.child(2), 3);
    }

    // The structural operations below only fire in trees three or more
    // levels deep, far past what an in-process tree test can build in
    // reasonable time. They move opaque handles and never compare keys,
    // so synthetic handle ramps exercise them exactly.

    use crate::storage::{MemStore, PageStore};

    /// Page whose children count up from `child0` (after `leftmost`) and
    /// whose separators count up from `dp0`.
    fn ramp(leftmost: u64, child0: u64, dp0: u64, n: usize) -> IndexPage {
        let mut page = IndexPage::new(leftmost);
        for i in 0..n {
            page.insert3(i, dp0 + i as u64, child0 + i as u64);
        }
        page
    }

    fn children(page: &IndexPage) -> Vec<u64> {
        (0..=page.len()).map(|i| page.child(i)).collect()
    }

    fn data_pages(page: &IndexPage) -> Vec<u64> {
        (0..page.len()).map(|i| page.data_page(i)).collect()
    }

    fn fetch(store: &MemStore, handle: u64) -> IndexPage {
        IndexPage::from_bytes(store.get(handle).unwrap()).unwrap()
    }

    #[test]
    fn split_promotes_the_middle_separator_into_the_parent() {
        let mut store = MemStore::new();
        let root = store.alloc(&[0u8; 7]).unwrap();

        let mut page = ramp(1000, 1001, 2000, 2 * K_INDEX + 1);
        let original_h = store.alloc(page.as_bytes()).unwrap();
        let parent_h = store
            .alloc(IndexPage::new(original_h).as_bytes())
            .unwrap();

        let mut self_h = original_h;
        let mut index = 3;
        page.split(
            &mut store,
            root,
            &mut self_h,
            Some(ParentRef { handle: parent_h, index: 0 }),
            &mut index,
        )
        .unwrap();

        // Position was in the left half: no redirection.
        assert_eq!(self_h, original_h);
        assert_eq!(index, 3);

        let k = K_INDEX as u64;
        let left = fetch(&store, original_h);
        assert_eq!(children(&left), (1000..=1000 + k).collect::<Vec<_>>());
        assert_eq!(data_pages(&left), (2000..2000 + k).collect::<Vec<_>>());

        let parent = fetch(&store, parent_h);
        assert_eq!(parent.len(), 1);
        assert_eq!(parent.child(0), original_h);
        assert_eq!(parent.data_page(0), 2000 + k);

        let rh = parent.child(1);
        let right = fetch(&store, rh);
        assert_eq!(
            children(&right),
            (1000 + k + 1..=1000 + 2 * k + 1).collect::<Vec<_>>()
        );
        assert_eq!(
            data_pages(&right),
            (2000 + k + 1..=2000 + 2 * k).collect::<Vec<_>>()
        );
    }

    #[test]
    fn split_redirects_a_position_in_the_right_half() {
        let mut store = MemStore::new();
        let root = store.alloc(&[0u8; 7]).unwrap();

        let mut page = ramp(1000, 1001, 2000, 2 * K_INDEX + 1);
        let original_h = store.alloc(page.as_bytes()).unwrap();
        let parent_h = store
            .alloc(IndexPage::new(original_h).as_bytes())
            .unwrap();

        let mut self_h = original_h;
        let mut index = K_INDEX + 5;
        page.split(
            &mut store,
            root,
            &mut self_h,
            Some(ParentRef { handle: parent_h, index: 0 }),
            &mut index,
        )
        .unwrap();

        let parent = fetch(&store, parent_h);
        assert_eq!(self_h, parent.child(1));
        assert_eq!(index, 4);
        assert_eq!(page.len(), K_INDEX);
        assert_eq!(page.child(0), 1000 + K_INDEX as u64 + 1);
    }

    #[test]
    fn split_without_a_parent_grows_a_new_root() {
        let mut store = MemStore::new();
        let root = store.alloc(&[0u8; 7]).unwrap();

        let mut page = ramp(1000, 1001, 2000, 2 * K_INDEX + 1);
        let original_h = store.alloc(page.as_bytes()).unwrap();

        let mut self_h = original_h;
        let mut index = 0;
        page.split(&mut store, root, &mut self_h, None, &mut index)
            .unwrap();

        let record = store.get(root).unwrap();
        let new_root_h = crate::storage::read_handle(&record);
        assert_ne!(new_root_h, 0);
        assert_ne!(new_root_h, original_h);

        let new_root = fetch(&store, new_root_h);
        assert_eq!(new_root.len(), 1);
        assert_eq!(new_root.child(0), original_h);
        assert_eq!(new_root.data_page(0), 2000 + K_INDEX as u64);
        assert_ne!(new_root.child(1), 0);
    }

    #[test]
    fn underflow_rotates_an_entry_from_the_left_sibling() {
        let mut store = MemStore::new();
        let root = store.alloc(&[0u8; 7]).unwrap();
        let k = K_INDEX as u64;

        let left = ramp(100, 101, 500, K_INDEX + 1);
        let lh = store.alloc(left.as_bytes()).unwrap();
        let mut page = ramp(300, 301, 700, K_INDEX - 1);
        let original_h = store.alloc(page.as_bytes()).unwrap();

        let mut parent = IndexPage::new(lh);
        parent.insert3(0, 900, original_h);
        let parent_h = store.alloc(parent.as_bytes()).unwrap();

        let mut self_h = original_h;
        let mut index = 2;
        page.underflow(
            &mut store,
            root,
            parent_h,
            ParentRef { handle: parent_h, index: 1 },
            &mut self_h,
            &mut index,
        )
        .unwrap();

        assert_eq!(self_h, original_h);
        assert_eq!(index, 3);
        assert_eq!(page.len(), K_INDEX);
        // The left sibling's last child arrives at the head, under the
        // separator that came down from the parent.
        assert_eq!(page.child(0), 100 + k + 1);
        assert_eq!(page.data_page(0), 900);
        assert_eq!(page.child(1), 300);
        assert_eq!(page.data_page(1), 700);

        let parent = fetch(&store, parent_h);
        assert_eq!(parent.data_page(0), 500 + k);

        let left = fetch(&store, lh);
        assert_eq!(left.len(), K_INDEX);
        assert_eq!(children(&left), (100..=100 + k).collect::<Vec<_>>());
    }

    #[test]
    fn underflow_rotates_an_entry_from_the_right_sibling() {
        let mut store = MemStore::new();
        let root = store.alloc(&[0u8; 7]).unwrap();
        let k = K_INDEX as u64;

        let mut page = ramp(300, 301, 700, K_INDEX - 1);
        let original_h = store.alloc(page.as_bytes()).unwrap();
        let right = ramp(100, 101, 500, K_INDEX + 1);
        let rh = store.alloc(right.as_bytes()).unwrap();

        let mut parent = IndexPage::new(original_h);
        parent.insert3(0, 900, rh);
        let parent_h = store.alloc(parent.as_bytes()).unwrap();

        let mut self_h = original_h;
        let mut index = 2;
        page.underflow(
            &mut store,
            root,
            parent_h,
            ParentRef { handle: parent_h, index: 0 },
            &mut self_h,
            &mut index,
        )
        .unwrap();

        assert_eq!(self_h, original_h);
        assert_eq!(index, 2);
        assert_eq!(page.len(), K_INDEX);
        // The parent separator lands at the tail, over the right
        // sibling's leftmost child.
        assert_eq!(page.data_page(K_INDEX - 1), 900);
        assert_eq!(page.child(K_INDEX), 100);

        let parent = fetch(&store, parent_h);
        assert_eq!(parent.data_page(0), 500);

        let right = fetch(&store, rh);
        assert_eq!(right.len(), K_INDEX);
        assert_eq!(children(&right), (101..=101 + k).collect::<Vec<_>>());
        assert_eq!(data_pages(&right), (501..=500 + k).collect::<Vec<_>>());
    }

    #[test]
    fn underflow_concatenates_into_the_left_sibling() {
        let mut store = MemStore::new();
        let root = store.alloc(&[0u8; 7]).unwrap();
        let k = K_INDEX as u64;

        let left = ramp(100, 101, 500, K_INDEX);
        let lh = store.alloc(left.as_bytes()).unwrap();
        let mut page = ramp(300, 301, 700, K_INDEX - 1);
        let original_h = store.alloc(page.as_bytes()).unwrap();
        // A right sibling at exactly K_INDEX entries: nothing to borrow
        // from either side, so the left merge wins.
        let right = ramp(600, 601, 800, K_INDEX);
        let rh = store.alloc(right.as_bytes()).unwrap();

        let mut parent = IndexPage::new(lh);
        parent.insert3(0, 900, original_h);
        parent.insert3(1, 901, rh);
        let parent_h = store.alloc(parent.as_bytes()).unwrap();

        let mut self_h = original_h;
        let mut index = 2;
        page.underflow(
            &mut store,
            root,
            parent_h,
            ParentRef { handle: parent_h, index: 1 },
            &mut self_h,
            &mut index,
        )
        .unwrap();

        // The page now IS the left sibling, position shifted past its
        // entries plus the separator that came down.
        assert_eq!(self_h, lh);
        assert_eq!(index, 2 + K_INDEX + 1);
        assert_eq!(page.len(), 2 * K_INDEX);

        let mut expected_children: Vec<u64> = (100..=100 + k).collect();
        expected_children.extend(300..=300 + k - 1);
        assert_eq!(children(&page), expected_children);

        let mut expected_dps: Vec<u64> = (500..500 + k).collect();
        expected_dps.push(900);
        expected_dps.extend(700..700 + k - 1);
        assert_eq!(data_pages(&page), expected_dps);

        assert!(store.get(original_h).is_err(), "merged page must be freed");

        let parent = fetch(&store, parent_h);
        assert_eq!(parent.len(), 1);
        assert_eq!(parent.child(0), lh);
        assert_eq!(parent.data_page(0), 901);
        assert_eq!(parent.child(1), rh);
    }

    #[test]
    fn underflow_concat_with_a_singleton_root_collapses_a_level() {
        let mut store = MemStore::new();
        let root = store.alloc(&[0u8; 7]).unwrap();
        let k = K_INDEX as u64;

        let mut page = ramp(300, 301, 700, K_INDEX - 1);
        let original_h = store.alloc(page.as_bytes()).unwrap();
        let right = ramp(100, 101, 500, K_INDEX);
        let rh = store.alloc(right.as_bytes()).unwrap();

        let mut old_root = IndexPage::new(original_h);
        old_root.insert3(0, 900, rh);
        let old_root_h = store.alloc(old_root.as_bytes()).unwrap();
        let mut record = [0u8; 7];
        crate::storage::write_handle(&mut record, old_root_h);
        store.realloc(root, &record).unwrap();

        let mut self_h = original_h;
        let mut index = 0;
        page.underflow(
            &mut store,
            root,
            old_root_h,
            ParentRef { handle: old_root_h, index: 0 },
            &mut self_h,
            &mut index,
        )
        .unwrap();

        assert_eq!(self_h, original_h);
        assert_eq!(page.len(), 2 * K_INDEX);

        let mut expected_dps: Vec<u64> = (700..700 + k - 1).collect();
        expected_dps.push(900);
        expected_dps.extend(500..500 + k);
        assert_eq!(data_pages(&page), expected_dps);

        assert!(store.get(rh).is_err(), "merged page must be freed");
        assert!(store.get(old_root_h).is_err(), "collapsed root must be freed");
        assert_eq!(
            crate::storage::read_handle(&store.get(root).unwrap()),
            original_h
        );
    }
}
