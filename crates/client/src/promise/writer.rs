use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::Error;
use crate::promise::cell::Cell;

/// The one-shot capability to resolve a [`Promise`](crate::Promise).
///
/// Resolving consumes the writer. A writer dropped without resolving rejects its promise with
/// [`Error::Abandoned`], so every writer settles its promise exactly once.
pub struct Writer<T> {
    cell: Option<Arc<Cell<T>>>,
}

impl<T> Writer<T> {
    pub(crate) fn new(cell: Arc<Cell<T>>) -> Self {
        Self { cell: Some(cell) }
    }

    /// Fulfills the promise with `value`.
    ///
    /// Returns `false` if the promise was already terminal, the first write wins.
    pub fn fulfill(mut self, value: T) -> bool {
        self.cell.take().is_some_and(|cell| cell.complete(Ok(value)))
    }

    /// Rejects the promise with `error`.
    ///
    /// Returns `false` if the promise was already terminal, the first write wins.
    pub fn reject(mut self, error: Error) -> bool {
        self.cell.take().is_some_and(|cell| cell.complete(Err(error)))
    }
}

impl<T> Drop for Writer<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take()
            && cell.complete(Err(Error::Abandoned))
        {
            warn!("promise writer dropped without resolving, promise rejected");
        }
    }
}

impl<T> fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer").field("resolved", &self.cell.is_none()).finish()
    }
}
