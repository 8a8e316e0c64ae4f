use crate::error::Error;
use attrdb_core::db::{Cursor as CoreCursor, CursorIter as CoreCursorIter, QuerySpec};

///
/// Cursor
/// Public facade over a core cursor; converts core errors into `attrdb::Error`.
///

pub struct Cursor<T> {
    inner: CoreCursor<T>,
}

impl<T> Cursor<T> {
    pub(crate) const fn new(inner: CoreCursor<T>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub const fn spec(&self) -> &QuerySpec {
        self.inner.spec()
    }

    /// Authoritative result count, honoring limit and offset.
    pub fn size(&self) -> Result<usize, Error> {
        Ok(self.inner.size()?)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.inner.is_empty()?)
    }

    /// Materialized entries, without triggering I/O.
    #[must_use]
    pub fn fetched_size(&self) -> usize {
        self.inner.fetched_size()
    }

    pub fn set_page_size(&self, page_size: u32) {
        self.inner.set_page_size(page_size);
    }

    pub fn set_consistent_read(&self, consistent_read: bool) {
        self.inner.set_consistent_read(consistent_read);
    }

    pub fn set_load_all_on_size(&self, load_all_on_size: bool) {
        self.inner.set_load_all_on_size(load_all_on_size);
    }

    //
    // Local edits
    //

    pub fn set(&self, index: usize, value: T) -> Result<T, Error> {
        Ok(self.inner.set(index, value)?)
    }

    pub fn insert(&self, index: usize, value: T) -> Result<(), Error> {
        Ok(self.inner.insert(index, value)?)
    }

    pub fn remove(&self, index: usize) -> Result<T, Error> {
        Ok(self.inner.remove(index)?)
    }
}

impl<T: Clone> Cursor<T> {
    pub fn get(&self, index: usize) -> Result<T, Error> {
        Ok(self.inner.get(index)?)
    }

    #[must_use]
    pub fn iter(&self) -> CursorIter<'_, T> {
        CursorIter {
            inner: self.inner.iter(),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<T>, Error> {
        Ok(self.inner.to_vec()?)
    }
}

impl<'a, T: Clone> IntoIterator for &'a Cursor<T> {
    type Item = Result<T, Error>;
    type IntoIter = CursorIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

///
/// CursorIter
///

pub struct CursorIter<'a, T> {
    inner: CoreCursorIter<'a, T>,
}

impl<T: Clone> Iterator for CursorIter<'_, T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|res| res.map_err(Error::from))
    }
}
