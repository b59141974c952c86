//! Batch coordination
//!
//! Between [`Session::begin_batch`] and [`Session::end_batch`] mutations
//! still update the cell store and the dependency graph, but nothing is
//! recalculated and nobody is notified. The end of the batch runs one flush
//! over everything that accumulated. Batches do not nest.

use std::ops::{Deref, DerefMut};

use crate::options::RecalcStats;
use crate::session::Session;

impl Session {
    /// Start deferring recalculation
    ///
    /// # Panics
    ///
    /// Panics if a batch is already active.
    pub fn begin_batch(&mut self) {
        if self.batching {
            panic!("begin_batch called while a batch is already active; batches do not nest");
        }
        log::trace!("batch started");
        self.batching = true;
    }

    /// Finish the active batch with a single flush
    ///
    /// # Panics
    ///
    /// Panics if no batch is active.
    pub fn end_batch(&mut self) -> RecalcStats {
        if !self.batching {
            panic!("end_batch called without an active batch");
        }
        self.batching = false;
        log::trace!("batch finished, {} dirty", self.graph.dirty_len());
        self.flush()
    }

    /// Whether a batch is active
    pub fn is_batching(&self) -> bool {
        self.batching
    }

    /// Start a batch that ends when the returned guard is dropped
    ///
    /// The guard dereferences to the session, so edits go through it.
    ///
    /// # Panics
    ///
    /// Panics if a batch is already active.
    pub fn batch(&mut self) -> BatchGuard<'_> {
        self.begin_batch();
        BatchGuard { session: self }
    }

    /// Run `f` inside a batch
    ///
    /// The batch flushes once when `f` returns, whatever it returns.
    pub fn with_batch<R>(&mut self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.batch();
        f(&mut guard)
    }
}

/// Scope of an active batch; see [`Session::batch`]
///
/// Dropping the guard flushes. If the guard is dropped while unwinding, the
/// batch is abandoned instead: the session holds unflushed edits and should
/// be discarded.
#[derive(Debug)]
pub struct BatchGuard<'a> {
    session: &'a mut Session,
}

impl BatchGuard<'_> {
    /// End the batch now and return the flush statistics
    pub fn finish(mut self) -> RecalcStats {
        self.session.end_batch()
    }
}

impl Deref for BatchGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session
    }
}

impl DerefMut for BatchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        if !self.session.batching {
            return;
        }
        if std::thread::panicking() {
            log::warn!(
                "batch abandoned during a panic with {} dirty cells; discard this session",
                self.session.graph.dirty_len()
            );
            self.session.batching = false;
            self.session.discard_pending();
            return;
        }
        self.session.end_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetsync_core::{CellKey, CellValue};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counting_session() -> (Session, Rc<RefCell<usize>>) {
        let mut session = Session::new();
        session.add_sheet("S").unwrap();
        let flushes = Rc::new(RefCell::new(0));
        {
            let flushes = Rc::clone(&flushes);
            session.subscribe(move |_| *flushes.borrow_mut() += 1);
        }
        (session, flushes)
    }

    #[test]
    fn test_batch_flushes_once() {
        let (mut session, flushes) = counting_session();
        session.begin_batch();
        for row in 0..50 {
            session
                .set_cell_input(CellKey::new(0, row, 0), &row.to_string())
                .unwrap();
        }
        session.set_cell_input(CellKey::new(0, 0, 1), "=SUM(A:A)").unwrap();
        assert_eq!(*flushes.borrow(), 0);
        assert!(session.is_batching());

        let stats = session.end_batch();
        assert_eq!(*flushes.borrow(), 1);
        assert_eq!(stats.cells_evaluated, 1);
        assert_eq!(stats.changed_cells, 51);
        assert_eq!(
            session.get_value(CellKey::new(0, 0, 1)).unwrap(),
            CellValue::Number(1225.0)
        );
    }

    #[test]
    fn test_guard_flushes_on_drop() {
        let (mut session, flushes) = counting_session();
        {
            let mut batch = session.batch();
            batch.set_cell_input(CellKey::new(0, 0, 0), "1").unwrap();
            batch.set_cell_input(CellKey::new(0, 1, 0), "=A1*3").unwrap();
        }
        assert!(!session.is_batching());
        assert_eq!(*flushes.borrow(), 1);
        assert_eq!(
            session.get_value(CellKey::new(0, 1, 0)).unwrap(),
            CellValue::Number(3.0)
        );
    }

    #[test]
    fn test_with_batch_flushes_on_error() {
        let (mut session, flushes) = counting_session();
        let result = session.with_batch(|s| {
            s.set_cell_input(CellKey::new(0, 0, 0), "1")?;
            s.set_cell_input(CellKey::new(9, 0, 0), "2")
        });
        assert!(result.is_err());
        assert!(!session.is_batching());
        assert_eq!(*flushes.borrow(), 1);
    }

    #[test]
    fn test_finish_returns_stats() {
        let (mut session, _) = counting_session();
        let mut batch = session.batch();
        batch.set_cell_input(CellKey::new(0, 0, 0), "=1+1").unwrap();
        let stats = batch.finish();
        assert_eq!(stats.cells_evaluated, 1);
        assert!(!session.is_batching());
    }

    #[test]
    #[should_panic(expected = "batches do not nest")]
    fn test_nested_batch_panics() {
        let (mut session, _) = counting_session();
        session.begin_batch();
        session.begin_batch();
    }

    #[test]
    #[should_panic(expected = "without an active batch")]
    fn test_end_without_begin_panics() {
        let (mut session, _) = counting_session();
        session.end_batch();
    }
}
