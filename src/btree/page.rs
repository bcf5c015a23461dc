//! # Tagged Page View
//!
//! A page blob is one of two kinds, discriminated by its first byte:
//! `0x00` is an index page, `0x01` a data page. [`Page`] is the decoded
//! form the tree driver descends through; the raw tag never leaks past
//! this module.
//!
//! Both page kinds answer the same question during descent: where does a
//! key belong among my entries? [`Page::find`] runs the binary search over
//! either kind, delegating the per-entry comparison to the page (an index
//! page fetches the separator's data page, a data page reads its own
//! slot).

use eyre::{bail, Result};
use std::cmp::Ordering;

use super::interior::IndexPage;
use super::leaf::LeafPage;
use super::tree::Collate;
use crate::config::{TAG_DATA_PAGE, TAG_INDEX_PAGE};
use crate::storage::PageStore;

/// Position of a page within its parent index page: the page is
/// `child(index)` of the page at `handle`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParentRef {
    pub handle: u64,
    pub index: usize,
}

/// A page decoded by its tag byte.
#[derive(Debug)]
pub(crate) enum Page {
    Index(IndexPage),
    Leaf(LeafPage),
}

impl Page {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        match data.first() {
            Some(&TAG_INDEX_PAGE) => Ok(Page::Index(IndexPage::from_bytes(data)?)),
            Some(&TAG_DATA_PAGE) => Ok(Page::Leaf(LeafPage::from_bytes(data)?)),
            Some(&tag) => bail!("unknown page tag {:#04x}", tag),
            None => bail!("empty page blob"),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Page::Index(page) => page.len(),
            Page::Leaf(page) => page.len(),
        }
    }

    fn key_cmp<S: PageStore>(
        &self,
        store: &S,
        collate: Collate,
        key: &[u8],
        index: usize,
    ) -> Result<Ordering> {
        match self {
            Page::Index(page) => page.key_cmp(store, collate, key, index),
            Page::Leaf(page) => page.key_cmp(store, collate, key, index),
        }
    }

    /// Binary-searches the page for `key`. Returns `(index, true)` on an
    /// exact hit, `(insertion point, false)` otherwise; the insertion
    /// point may be one past the last entry.
    pub fn find<S: PageStore>(
        &self,
        store: &S,
        collate: Collate,
        key: &[u8],
    ) -> Result<(usize, bool)> {
        let mut low = 0isize;
        let mut high = self.len() as isize - 1;
        while low <= high {
            let mid = (low + high) >> 1;
            match self.key_cmp(store, collate, key, mid as usize)? {
                Ordering::Greater => low = mid + 1,
                Ordering::Equal => return Ok((mid as usize, true)),
                Ordering::Less => high = mid - 1,
            }
        }
        Ok((low as usize, false))
    }
}

/// Resolves the handles of the left and right siblings of the page at
/// `parent.child(parent.index)`, 0 where no sibling exists under the same
/// parent. With no parent at all (the page is the internal root), both
/// are 0.
pub(crate) fn check_siblings<S: PageStore>(
    store: &S,
    parent: Option<ParentRef>,
) -> Result<(u64, u64)> {
    let Some(parent) = parent else {
        return Ok((0, 0));
    };

    let page = IndexPage::from_bytes(store.get(parent.handle)?)?;
    let left = if parent.index > 0 {
        page.child(parent.index - 1)
    } else {
        0
    };
    let right = if parent.index < page.len() {
        page.child(parent.index + 1)
    } else {
        0
    };
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemStore, PageStore};

    fn byte_order(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn leaf_with_keys(store: &mut MemStore, keys: &[&[u8]]) -> Page {
        let mut page = LeafPage::new();
        for (i, key) in keys.iter().enumerate() {
            page.insert_item(store, i, key, b"v").unwrap();
        }
        Page::Leaf(page)
    }

    #[test]
    fn find_in_empty_page_returns_front() {
        let mut store = MemStore::new();
        let page = leaf_with_keys(&mut store, &[]);

        assert_eq!(page.find(&store, byte_order, b"any").unwrap(), (0, false));
    }

    #[test]
    fn find_hits_every_present_key() {
        let mut store = MemStore::new();
        let keys: Vec<Vec<u8>> = (0..7u8).map(|i| vec![b'a' + 2 * i]).collect();
        let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        let page = leaf_with_keys(&mut store, &refs);

        for (i, key) in keys.iter().enumerate() {
            assert_eq!(page.find(&store, byte_order, key).unwrap(), (i, true));
        }
    }

    #[test]
    fn find_returns_insertion_points_between_keys() {
        let mut store = MemStore::new();
        let page = leaf_with_keys(&mut store, &[b"b", b"d", b"f"]);

        assert_eq!(page.find(&store, byte_order, b"a").unwrap(), (0, false));
        assert_eq!(page.find(&store, byte_order, b"c").unwrap(), (1, false));
        assert_eq!(page.find(&store, byte_order, b"e").unwrap(), (2, false));
        assert_eq!(page.find(&store, byte_order, b"g").unwrap(), (3, false));
    }

    #[test]
    fn find_respects_a_custom_collation() {
        let mut store = MemStore::new();
        let page = leaf_with_keys(&mut store, &[b"c", b"b", b"a"]);

        let reversed: Collate = |a, b| b.cmp(a);
        assert_eq!(page.find(&store, reversed, b"b").unwrap(), (1, true));
        assert_eq!(page.find(&store, reversed, b"d").unwrap(), (0, false));
    }

    #[test]
    fn from_bytes_rejects_unknown_tags() {
        assert!(Page::from_bytes(vec![0x02]).is_err());
        assert!(Page::from_bytes(Vec::new()).is_err());
    }

    #[test]
    fn check_siblings_without_parent_is_empty() {
        let store = MemStore::new();
        assert_eq!(check_siblings(&store, None).unwrap(), (0, 0));
    }

    #[test]
    fn check_siblings_resolves_neighbors() {
        let mut store = MemStore::new();
        let mut parent = IndexPage::new(10);
        parent.insert3(0, 100, 20);
        parent.insert3(1, 200, 30);
        let handle = store.alloc(parent.as_bytes()).unwrap();

        let at = |index| ParentRef { handle, index };
        assert_eq!(check_siblings(&store, Some(at(0))).unwrap(), (0, 20));
        assert_eq!(check_siblings(&store, Some(at(1))).unwrap(), (10, 30));
        assert_eq!(check_siblings(&store, Some(at(2))).unwrap(), (20, 0));
    }
}
