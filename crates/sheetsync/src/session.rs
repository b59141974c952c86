//! The live workbook session
//!
//! A [`Session`] owns the cell store, the dependency graph built from its
//! formulas and the subscribers watching it. Every mutation updates the
//! graph before it returns; outside a batch it also flushes, which
//! recalculates the dirty closure and delivers one [`ChangeSet`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sheetsync_core::{CellKey, CellValue, SnapshotCell, Workbook};
use sheetsync_formula::{extract_references, parse_formula, DependencyGraph, References};

use crate::error::{Error, Result};
use crate::notifier::{ChangeSet, Notifier, SubscriptionId};
use crate::options::{RecalcStats, SessionOptions};
use crate::recalc::{ParsedFormula, Recalculation};

/// A live, recalculating workbook
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) workbook: Workbook,
    pub(crate) graph: DependencyGraph,
    pub(crate) formulas: HashMap<CellKey, ParsedFormula>,
    pub(crate) notifier: Notifier,
    /// Visible value of every address touched since the last flush, as it was before
    pub(crate) previous: BTreeMap<CellKey, CellValue>,
    /// Formula cells on or behind a reference cycle
    pub(crate) cycle_members: BTreeSet<CellKey>,
    pub(crate) batching: bool,
    pub(crate) options: SessionOptions,
    pub(crate) last_stats: RecalcStats,
}

impl Session {
    /// Create an empty session with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session
    pub fn with_options(options: SessionOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The underlying cell store
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// The dependency graph derived from the current formulas
    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Statistics of the most recent flush
    pub fn last_stats(&self) -> RecalcStats {
        self.last_stats
    }

    // === Sheets ===

    /// Append a sheet, returning its index
    ///
    /// Formulas that already name this sheet start resolving against it.
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        let index = self.workbook.add_worksheet_with_name(name)?;
        log::debug!("added sheet '{}' at index {}", name, index);
        self.refresh_sheet_bindings();
        self.after_mutation();
        Ok(index)
    }

    /// Sheet names in index order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.workbook.sheet_names()
    }

    /// Index of a sheet by name
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        self.workbook.sheet_index(name)
    }

    pub fn sheet_count(&self) -> usize {
        self.workbook.sheet_count()
    }

    // === Cells ===

    /// Replace the content of a cell
    ///
    /// Formula content keeps its text; any cached value passed in is dropped.
    pub fn set_cell(&mut self, key: CellKey, value: CellValue) -> Result<()> {
        self.workbook.sheet_for(key)?;
        let value = match value {
            CellValue::Formula { text, .. } => CellValue::formula(text),
            other => other,
        };
        log::trace!("set {} = {:?}", key, value);

        self.remember(key);
        self.workbook.set_cell(key, value)?;
        self.register(key);
        self.after_mutation();
        Ok(())
    }

    /// Replace the content of a cell from raw grid input
    ///
    /// See [`CellValue::from_input`] for how the text is read.
    pub fn set_cell_input(&mut self, key: CellKey, input: &str) -> Result<()> {
        self.set_cell(key, CellValue::from_input(input))
    }

    /// Empty a cell
    pub fn clear_cell(&mut self, key: CellKey) -> Result<()> {
        self.set_cell(key, CellValue::Empty)
    }

    /// Last computed value of a cell (the literal itself for non-formula cells)
    ///
    /// Fails with `EmptyCell` for an address that holds nothing.
    pub fn get_value(&self, key: CellKey) -> Result<CellValue> {
        let sheet = self.workbook.sheet_for(key)?;
        sheet
            .cell(key.row, key.col)
            .map(|v| v.effective_value().clone())
            .ok_or_else(|| sheetsync_core::Error::EmptyCell(key.address().to_string()).into())
    }

    /// Stored content of a cell: its formula text or its literal
    pub fn get_content(&self, key: CellKey) -> Result<SnapshotCell> {
        let sheet = self.workbook.sheet_for(key)?;
        sheet
            .cell(key.row, key.col)
            .map(SnapshotCell::from)
            .ok_or_else(|| sheetsync_core::Error::EmptyCell(key.address().to_string()).into())
    }

    // === Notification ===

    /// Register a callback that receives every non-empty change-set
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ChangeSet) + 'static,
    {
        self.notifier.subscribe(Box::new(callback))
    }

    /// Remove a subscriber; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.len()
    }

    // === Recalculation ===

    /// Mark every formula dirty and recalculate
    ///
    /// Inside a batch the work is deferred to the batch's flush.
    pub fn recalculate_all(&mut self) -> RecalcStats {
        for key in self.graph.consumers() {
            self.graph.mark_dirty(key);
        }
        if self.batching {
            RecalcStats::default()
        } else {
            self.flush()
        }
    }

    /// Record the visible value of `key` before the first change in this flush window
    pub(crate) fn remember(&mut self, key: CellKey) {
        if !self.previous.contains_key(&key) {
            let value = self.visible_value(key);
            self.previous.insert(key, value);
        }
    }

    fn visible_value(&self, key: CellKey) -> CellValue {
        self.workbook
            .cell(key)
            .map(|v| v.effective_value().clone())
            .unwrap_or_default()
    }

    /// Re-derive the graph edges of one address from its current content
    pub(crate) fn register(&mut self, key: CellKey) {
        let Some(text) = self.workbook.cell(key).and_then(CellValue::formula_text) else {
            self.graph.remove_consumer(key);
            self.formulas.remove(&key);
            self.cycle_members.remove(&key);
            self.graph.mark_dirty(key);
            return;
        };

        let parsed = parse_formula(text);
        let refs = match &parsed {
            Ok(ast) => extract_references(ast, key.sheet, &self.workbook),
            Err(e) => {
                log::warn!("formula at {} does not parse: {}", key, e);
                References::default()
            }
        };
        self.graph.update_dependencies(key, refs);
        self.formulas.insert(key, parsed.map_err(|e| e.as_cell_error()));
    }

    /// Re-resolve the sheet names of every formula that uses one
    ///
    /// Adding or renaming a sheet can change which sheet a name binds to,
    /// including names that matched case-insensitively. Formulas whose edges
    /// move are re-registered, which marks them dirty.
    pub(crate) fn refresh_sheet_bindings(&mut self) {
        for key in self.graph.sheet_naming_consumers() {
            let Some(Ok(ast)) = self.formulas.get(&key) else {
                continue;
            };
            let refs = extract_references(ast, key.sheet, &self.workbook);
            if self.graph.precedents_of(key) != Some(&refs) {
                log::trace!("sheet binding of {} changed", key);
                self.graph.update_dependencies(key, refs);
            }
        }
    }

    pub(crate) fn after_mutation(&mut self) {
        if !self.batching {
            self.flush();
        }
    }

    /// Recalculate the dirty closure and deliver the change-set
    pub(crate) fn flush(&mut self) -> RecalcStats {
        let dirty = self.graph.take_dirty();
        let dirty_count = dirty.len();
        let mut stats = Recalculation {
            workbook: &mut self.workbook,
            graph: &self.graph,
            formulas: &self.formulas,
            previous: &mut self.previous,
            cycle_members: &mut self.cycle_members,
            max_range_cells: self.options.max_range_cells,
        }
        .run(dirty);

        let changes = self.collect_changes();
        stats.changed_cells = changes.len();
        log::debug!(
            "flush: {} dirty, {} evaluated, {} in cycles, {} errors, {} changed",
            dirty_count,
            stats.cells_evaluated,
            stats.cycle_cells,
            stats.error_cells,
            stats.changed_cells
        );

        if !changes.is_empty() || self.options.notify_empty_change_sets {
            self.notifier.notify(&changes);
        }
        self.last_stats = stats;
        stats
    }

    fn collect_changes(&mut self) -> ChangeSet {
        let previous = std::mem::take(&mut self.previous);
        let entries = previous
            .into_iter()
            .filter_map(|(key, old)| {
                let new = self.visible_value(key);
                (new != old).then_some((key, new))
            })
            .collect();
        ChangeSet::from_sorted(entries)
    }

    /// Drop whatever an unfinished flush window collected
    pub(crate) fn discard_pending(&mut self) {
        self.graph.take_dirty();
        self.previous.clear();
    }
}
