//! # Cursor
//!
//! A cursor is a position in the tree: a snapshot of one data page plus an
//! item index within it. Stepping runs sideways along the leaf chain
//! through the page's `prev`/`next` handles and never revisits the index
//! pages, so a full scan costs one page fetch per leaf.
//!
//! Both ends report [`TreeError::EndOfIteration`]; so does reading a
//! position one past the last item of a leaf, which is where
//! [`seek`](crate::BTree::seek) can land when the key sorts after
//! everything on its page.
//!
//! The cursor borrows the tree's store for its whole lifetime. Tree
//! mutation needs `&mut` access, so the borrow checker rejects any
//! mutation while a cursor is live; the stale-snapshot hazard this
//! structure has in pointer-based implementations is a compile error
//! here. To mutate mid-scan, drop the cursor, mutate, and re-seek to the
//! last key returned.

use eyre::Result;

use super::leaf::LeafPage;
use crate::error::TreeError;
use crate::storage::PageStore;

/// A bidirectional position over the tree's key/value items, created by
/// [`seek`](crate::BTree::seek), [`seek_first`](crate::BTree::seek_first),
/// or [`seek_last`](crate::BTree::seek_last).
#[derive(Debug)]
pub struct Cursor<'t, S> {
    store: &'t S,
    page: Option<LeafPage>,
    index: usize,
}

impl<'t, S: PageStore> Cursor<'t, S> {
    pub(crate) fn new(store: &'t S, page: Option<LeafPage>, index: usize) -> Self {
        Self { store, page, index }
    }

    /// Returns the key/value pair at the current position, or
    /// [`TreeError::EndOfIteration`] when positioned past either end.
    pub fn current(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let Some(page) = &self.page else {
            return Err(TreeError::EndOfIteration.into());
        };
        if self.index == page.len() {
            return Err(TreeError::EndOfIteration.into());
        }

        let key = page.key(self.store, self.index)?;
        let value = page.value(self.store, self.index)?;
        Ok((key, value))
    }

    /// Advances to the next item, following the leaf chain across page
    /// boundaries. Returns [`TreeError::EndOfIteration`] at the back of
    /// the tree.
    pub fn next(&mut self) -> Result<()> {
        let Some(page) = &self.page else {
            return Err(TreeError::EndOfIteration.into());
        };

        if self.index + 1 < page.len() {
            self.index += 1;
            return Ok(());
        }

        let next = page.next();
        if next == 0 {
            return Err(TreeError::EndOfIteration.into());
        }
        match self.load(next) {
            Ok(page) => {
                self.page = Some(page);
                self.index = 0;
                Ok(())
            }
            Err(err) => {
                self.page = None;
                Err(err)
            }
        }
    }

    /// Steps back to the previous item, following the leaf chain across
    /// page boundaries. Returns [`TreeError::EndOfIteration`] at the
    /// front of the tree.
    pub fn prev(&mut self) -> Result<()> {
        let Some(page) = &self.page else {
            return Err(TreeError::EndOfIteration.into());
        };

        if self.index > 0 {
            self.index -= 1;
            return Ok(());
        }

        let prev = page.prev();
        if prev == 0 {
            return Err(TreeError::EndOfIteration.into());
        }
        match self.load(prev) {
            Ok(page) => {
                self.index = page.len() - 1;
                self.page = Some(page);
                Ok(())
            }
            Err(err) => {
                self.page = None;
                Err(err)
            }
        }
    }

    fn load(&self, handle: u64) -> Result<LeafPage> {
        LeafPage::from_bytes(self.store.get(handle)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::is_end_of_iteration;
    use crate::BTree;

    #[test]
    fn current_after_seek_hit() {
        let mut tree = BTree::new(None);
        tree.set(b"a", b"1").unwrap();
        tree.set(b"b", b"2").unwrap();

        let (cursor, hit) = tree.seek(b"b").unwrap();

        assert!(hit);
        assert_eq!(cursor.current().unwrap(), (b"b".to_vec(), b"2".to_vec()));
    }

    #[test]
    fn seek_past_the_last_key_reads_as_exhausted() {
        let mut tree = BTree::new(None);
        tree.set(b"a", b"1").unwrap();

        let (mut cursor, hit) = tree.seek(b"z").unwrap();

        assert!(!hit);
        assert!(is_end_of_iteration(&cursor.current().unwrap_err()));
        assert!(is_end_of_iteration(&cursor.next().unwrap_err()));
    }

    #[test]
    fn forward_iteration_visits_keys_in_order() {
        let mut tree = BTree::new(None);
        for key in [b"c", b"a", b"b"] {
            tree.set(key, b"v").unwrap();
        }

        let mut cursor = tree.seek_first().unwrap();
        let mut seen = Vec::new();
        loop {
            let (key, _) = cursor.current().unwrap();
            seen.push(key);
            if cursor.next().is_err() {
                break;
            }
        }

        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn backward_iteration_mirrors_forward() {
        let mut tree = BTree::new(None);
        for key in [b"x", b"y", b"z"] {
            tree.set(key, b"v").unwrap();
        }

        let mut cursor = tree.seek_last().unwrap();
        let mut seen = Vec::new();
        loop {
            let (key, _) = cursor.current().unwrap();
            seen.push(key);
            if cursor.prev().is_err() {
                break;
            }
        }

        assert_eq!(seen, vec![b"z".to_vec(), b"y".to_vec(), b"x".to_vec()]);
    }

    #[test]
    fn prev_at_the_front_is_exhausted_and_sticky() {
        let mut tree = BTree::new(None);
        tree.set(b"only", b"1").unwrap();

        let mut cursor = tree.seek_first().unwrap();

        assert!(is_end_of_iteration(&cursor.prev().unwrap_err()));
        assert_eq!(
            cursor.current().unwrap(),
            (b"only".to_vec(), b"1".to_vec())
        );
    }
}
