//! Dependency tracking for formula calculation
//!
//! Edges run from producers to the formula cells (consumers) that read
//! them. Single cells and ranges are tracked separately so a whole-column
//! reference like `D:D` is one edge instead of a million.

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};
use sheetsync_core::{CellKey, CellRange};

use crate::references::References;

/// A rectangular area of one sheet, used as a dependency edge source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeKey {
    pub sheet: usize,
    pub start_row: u32,
    pub start_col: u16,
    pub end_row: u32,
    pub end_col: u16,
}

impl RangeKey {
    /// Create from a sheet index and a (normalized) range
    pub fn new(sheet: usize, range: &CellRange) -> Self {
        Self {
            sheet,
            start_row: range.start.row,
            start_col: range.start.col,
            end_row: range.end.row,
            end_col: range.end.col,
        }
    }

    /// Whether the cell lies inside this range
    pub fn contains(&self, key: CellKey) -> bool {
        key.sheet == self.sheet
            && (self.start_row..=self.end_row).contains(&key.row)
            && (self.start_col..=self.end_col).contains(&key.col)
    }

    /// The in-sheet range
    pub fn range(&self) -> CellRange {
        CellRange::from_indices(self.start_row, self.start_col, self.end_row, self.end_col)
    }
}

/// Dependency graph for formula cells
///
/// Also owns the dirty set: addresses waiting for the next recalculation.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → formula cells that read it
    dependents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Sheet → range → formula cells that read it
    range_dependents: AHashMap<usize, AHashMap<RangeKey, AHashSet<CellKey>>>,
    /// Formula cell → what it reads
    precedents: AHashMap<CellKey, References>,
    dirty: BTreeSet<CellKey>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recorded reads of `consumer`
    ///
    /// Only edges where `consumer` is the reader are touched. The consumer
    /// and its direct dependents become dirty.
    pub fn update_dependencies(&mut self, consumer: CellKey, refs: References) {
        self.remove_consumer(consumer);
        if !refs.is_empty() {
            for &cell in &refs.cells {
                self.dependents.entry(cell).or_default().insert(consumer);
            }
            for &range in &refs.ranges {
                self.add_range_edge(range, consumer);
            }
        }
        self.precedents.insert(consumer, refs);
        self.mark_dirty(consumer);
    }

    /// Forget everything `consumer` reads
    ///
    /// Does not touch the dirty set.
    pub fn remove_consumer(&mut self, consumer: CellKey) {
        let Some(old) = self.precedents.remove(&consumer) else {
            return;
        };
        for cell in &old.cells {
            if let Some(set) = self.dependents.get_mut(cell) {
                set.remove(&consumer);
                if set.is_empty() {
                    self.dependents.remove(cell);
                }
            }
        }
        for range in &old.ranges {
            let Some(ranges) = self.range_dependents.get_mut(&range.sheet) else {
                continue;
            };
            if let Some(set) = ranges.get_mut(range) {
                set.remove(&consumer);
                if set.is_empty() {
                    ranges.remove(range);
                }
            }
            if ranges.is_empty() {
                self.range_dependents.remove(&range.sheet);
            }
        }
    }

    /// Formula cells that read `key` directly (not transitive)
    pub fn dependents_of(&self, key: CellKey) -> BTreeSet<CellKey> {
        let mut out: BTreeSet<CellKey> = self
            .dependents
            .get(&key)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        for (range, consumers) in self.range_dependents.get(&key.sheet).into_iter().flatten() {
            if range.contains(key) {
                out.extend(consumers.iter().copied());
            }
        }
        out
    }

    fn add_range_edge(&mut self, range: RangeKey, consumer: CellKey) {
        self.range_dependents
            .entry(range.sheet)
            .or_default()
            .entry(range)
            .or_default()
            .insert(consumer);
    }

    /// What a formula cell reads, if it is registered
    pub fn precedents_of(&self, consumer: CellKey) -> Option<&References> {
        self.precedents.get(&consumer)
    }

    /// Whether `key` is a registered formula cell
    pub fn is_consumer(&self, key: CellKey) -> bool {
        self.precedents.contains_key(&key)
    }

    /// Registered formula cells in key order
    pub fn consumers(&self) -> BTreeSet<CellKey> {
        self.precedents.keys().copied().collect()
    }

    /// Formula cells that name a sheet, resolved or not
    ///
    /// Their edges must be re-derived whenever the set of sheet names changes.
    pub fn sheet_naming_consumers(&self) -> BTreeSet<CellKey> {
        self.precedents
            .iter()
            .filter(|(_, refs)| refs.invalid || refs.qualified)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Mark `key` and its direct dependents dirty
    pub fn mark_dirty(&mut self, key: CellKey) {
        let dependents = self.dependents_of(key);
        self.dirty.insert(key);
        self.dirty.extend(dependents);
    }

    /// Whether `key` waits for recalculation
    pub fn is_dirty(&self, key: CellKey) -> bool {
        self.dirty.contains(&key)
    }

    /// Number of dirty addresses
    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Consume the dirty set
    pub fn take_dirty(&mut self) -> BTreeSet<CellKey> {
        std::mem::take(&mut self.dirty)
    }

    /// Move formula cells after a structural change
    ///
    /// `map` gives each key's new position, or `None` when the cell was
    /// deleted. The recorded reads are kept as they are; callers re-register
    /// formulas whose references changed.
    pub fn relocate(&mut self, map: impl Fn(CellKey) -> Option<CellKey>) {
        let precedents = std::mem::take(&mut self.precedents);
        self.dependents.clear();
        self.range_dependents.clear();

        for (consumer, refs) in precedents {
            let Some(moved) = map(consumer) else {
                continue;
            };
            for &cell in &refs.cells {
                self.dependents.entry(cell).or_default().insert(moved);
            }
            for &range in &refs.ranges {
                self.add_range_edge(range, moved);
            }
            self.precedents.insert(moved, refs);
        }

        self.dirty = std::mem::take(&mut self.dirty)
            .into_iter()
            .filter_map(&map)
            .collect();
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.range_dependents.clear();
        self.precedents.clear();
        self.dirty.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reads(cells: &[CellKey], ranges: &[RangeKey]) -> References {
        References {
            cells: cells.iter().copied().collect(),
            ranges: ranges.iter().copied().collect(),
            invalid: false,
            qualified: false,
        }
    }

    #[test]
    fn test_update_dependencies() {
        let mut graph = DependencyGraph::new();

        let a1 = CellKey::new(0, 0, 0);
        let b1 = CellKey::new(0, 0, 1);
        let c1 = CellKey::new(0, 0, 2);

        graph.update_dependencies(b1, reads(&[a1], &[]));
        assert!(graph.dependents_of(a1).contains(&b1));
        assert_eq!(graph.take_dirty().into_iter().collect::<Vec<_>>(), vec![b1]);

        // C1 reads B1; re-registering B1 dirties C1 as well
        graph.update_dependencies(c1, reads(&[b1], &[]));
        graph.take_dirty();
        graph.update_dependencies(b1, reads(&[], &[]));
        assert_eq!(graph.take_dirty().into_iter().collect::<Vec<_>>(), vec![b1, c1]);
        assert!(graph.dependents_of(a1).is_empty());
    }

    #[test]
    fn test_range_edges() {
        let mut graph = DependencyGraph::new();
        let total = CellKey::new(0, 1, 1);
        let column_d = RangeKey::new(1, &CellRange::whole_columns(3, 3));

        graph.update_dependencies(total, reads(&[], &[column_d]));
        assert!(graph.dependents_of(CellKey::new(1, 500_000, 3)).contains(&total));
        assert!(graph.dependents_of(CellKey::new(1, 0, 2)).is_empty());
        assert!(graph.dependents_of(CellKey::new(0, 0, 3)).is_empty());
    }

    #[test]
    fn test_cycles_are_stored() {
        let mut graph = DependencyGraph::new();
        let a1 = CellKey::new(0, 0, 0);
        let b1 = CellKey::new(0, 0, 1);

        graph.update_dependencies(a1, reads(&[b1], &[]));
        graph.update_dependencies(b1, reads(&[a1], &[]));

        assert!(graph.dependents_of(a1).contains(&b1));
        assert!(graph.dependents_of(b1).contains(&a1));
    }

    #[test]
    fn test_relocate() {
        let mut graph = DependencyGraph::new();
        let a1 = CellKey::new(0, 0, 0);
        let a5 = CellKey::new(0, 4, 0);
        let a9 = CellKey::new(0, 8, 0);

        graph.update_dependencies(a5, reads(&[a1], &[]));
        graph.update_dependencies(a9, reads(&[a1], &[]));
        graph.relocate(|key| match key.row {
            4 => Some(CellKey::new(0, 5, 0)),
            8 => None,
            _ => Some(key),
        });

        let moved = CellKey::new(0, 5, 0);
        assert_eq!(graph.dependents_of(a1).into_iter().collect::<Vec<_>>(), vec![moved]);
        assert!(graph.is_consumer(moved));
        assert!(!graph.is_consumer(a9));
        assert!(graph.is_dirty(moved));
        assert!(!graph.is_dirty(a5));
    }

    #[test]
    fn test_range_edges_are_kept_per_sheet() {
        let mut graph = DependencyGraph::new();
        let running: Vec<CellKey> = (1..=50).map(|row| CellKey::new(0, row, 1)).collect();
        for (i, &consumer) in running.iter().enumerate() {
            let range = CellRange::from_indices(0, 0, i as u32, 0);
            graph.update_dependencies(consumer, reads(&[], &[RangeKey::new(0, &range)]));
        }
        let other = CellKey::new(1, 0, 0);
        graph.update_dependencies(other, reads(&[], &[RangeKey::new(1, &CellRange::whole_columns(0, 0))]));

        assert_eq!(graph.range_dependents.len(), 2);
        assert_eq!(graph.range_dependents[&0].len(), 50);
        assert_eq!(graph.dependents_of(CellKey::new(0, 49, 0)).len(), 1);
        assert_eq!(graph.dependents_of(CellKey::new(0, 0, 0)).len(), 50);
        assert_eq!(graph.dependents_of(CellKey::new(1, 7, 0)).into_iter().collect::<Vec<_>>(), vec![other]);

        graph.remove_consumer(other);
        assert!(!graph.range_dependents.contains_key(&1));
    }

    #[test]
    fn test_sheet_naming_consumers() {
        let mut graph = DependencyGraph::new();
        let a1 = CellKey::new(0, 0, 0);
        let a2 = CellKey::new(0, 1, 0);
        let a3 = CellKey::new(0, 2, 0);
        let mut unresolved = reads(&[], &[]);
        unresolved.invalid = true;
        let mut qualified = reads(&[CellKey::new(1, 0, 0)], &[]);
        qualified.qualified = true;
        graph.update_dependencies(a1, unresolved);
        graph.update_dependencies(a2, qualified);
        graph.update_dependencies(a3, reads(&[a1], &[]));

        assert_eq!(
            graph.sheet_naming_consumers().into_iter().collect::<Vec<_>>(),
            vec![a1, a2]
        );
        graph.clear();
        assert!(graph.consumers().is_empty());
    }
}
