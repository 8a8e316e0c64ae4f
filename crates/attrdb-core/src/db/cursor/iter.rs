use super::Cursor;
use crate::error::InternalError;

///
/// CursorIter
///
/// Forward iterator over a shared cursor. Each iterator keeps its own
/// position; all of them read (and grow) the same backing sequence.
/// Stops after yielding the first error.
///

pub struct CursorIter<'a, T> {
    cursor: &'a Cursor<T>,
    index: usize,
    done: bool,
}

impl<'a, T> CursorIter<'a, T> {
    pub(super) const fn new(cursor: &'a Cursor<T>) -> Self {
        Self {
            cursor,
            index: 0,
            done: false,
        }
    }
}

impl<T: Clone> Iterator for CursorIter<'_, T> {
    type Item = Result<T, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.cursor.read_at(self.index, T::clone) {
            Ok(Some(value)) => {
                self.index += 1;
                Some(Ok(value))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
