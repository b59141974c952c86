//! Recalculation engine
//!
//! One pass per flush:
//! 1. Expand the dirty set to everything that transitively reads it.
//! 2. Order the formula cells of that closure producers-first (Kahn's
//!    algorithm, ties broken by [`CellKey`] order so runs are reproducible).
//! 3. Evaluate in that order, writing each result into the cell's cache.
//! 4. Whatever is left unordered sits on or behind a cycle and gets `#CYCLE!`.
//!
//! A formula that reads a cycle member takes `#CYCLE!` over without being
//! evaluated, so cells behind a cycle outside the current closure end up the
//! same as cells behind a cycle inside it. Membership is tracked apart from
//! the stored values; a `#CYCLE!` literal in the grid is an ordinary error.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use sheetsync_core::{CellError, CellKey, CellValue, Workbook};
use sheetsync_formula::{
    evaluate, DependencyGraph, EvaluationContext, FormulaExpr, FormulaValue, References,
};

use crate::options::RecalcStats;

/// A formula as the engine keeps it: the parsed tree, or the error value it evaluates to
pub(crate) type ParsedFormula = std::result::Result<FormulaExpr, CellError>;

/// Everything a pass reads or writes
pub(crate) struct Recalculation<'a> {
    pub workbook: &'a mut Workbook,
    pub graph: &'a DependencyGraph,
    pub formulas: &'a HashMap<CellKey, ParsedFormula>,
    /// Values as they were when the flush window opened
    pub previous: &'a mut BTreeMap<CellKey, CellValue>,
    /// Formula cells showing `#CYCLE!` because of a cycle, kept across passes
    pub cycle_members: &'a mut BTreeSet<CellKey>,
    pub max_range_cells: u64,
}

impl Recalculation<'_> {
    /// Recompute every formula reachable from `dirty`
    pub(crate) fn run(mut self, dirty: BTreeSet<CellKey>) -> RecalcStats {
        let mut stats = RecalcStats::default();
        let nodes: BTreeSet<CellKey> = dirty_closure(self.graph, dirty)
            .into_iter()
            .filter(|key| self.formulas.contains_key(key))
            .collect();
        if nodes.is_empty() {
            return stats;
        }

        let (order, cyclic) = evaluation_order(self.graph, &nodes);
        for key in order {
            let Some(parsed) = self.formulas.get(&key) else {
                continue;
            };
            let behind_cycle = self
                .graph
                .precedents_of(key)
                .is_some_and(|refs| reads_cycle(self.cycle_members, refs));
            let value = if behind_cycle {
                stats.cycle_cells += 1;
                self.cycle_members.insert(key);
                CellValue::Error(CellError::Cycle)
            } else {
                self.cycle_members.remove(&key);
                evaluate_cell(self.workbook, key, parsed, self.max_range_cells)
            };
            if value.is_error() {
                stats.error_cells += 1;
            }
            stats.cells_evaluated += 1;
            self.store(key, value);
        }

        for key in cyclic {
            log::trace!("{} is on or behind a reference cycle", key);
            stats.cycle_cells += 1;
            self.cycle_members.insert(key);
            self.store(key, CellValue::Error(CellError::Cycle));
        }
        stats
    }

    fn store(&mut self, key: CellKey, value: CellValue) {
        if !self.previous.contains_key(&key) {
            let old = self
                .workbook
                .cell(key)
                .map(|v| v.effective_value().clone())
                .unwrap_or_default();
            self.previous.insert(key, old);
        }
        self.workbook.set_formula_result(key, value);
    }
}

/// Every address reachable from `dirty` through dependent edges, `dirty` included
pub(crate) fn dirty_closure(graph: &DependencyGraph, dirty: BTreeSet<CellKey>) -> BTreeSet<CellKey> {
    let mut closure = BTreeSet::new();
    let mut queue: VecDeque<CellKey> = dirty.into_iter().collect();
    while let Some(key) = queue.pop_front() {
        if closure.insert(key) {
            queue.extend(
                graph
                    .dependents_of(key)
                    .into_iter()
                    .filter(|d| !closure.contains(d)),
            );
        }
    }
    closure
}

/// Producers-first order of `nodes`, plus the nodes no order exists for
///
/// Only edges between members of `nodes` count; reads of cells outside the
/// set use their cached values.
pub(crate) fn evaluation_order(
    graph: &DependencyGraph,
    nodes: &BTreeSet<CellKey>,
) -> (Vec<CellKey>, Vec<CellKey>) {
    let mut indegree: BTreeMap<CellKey, usize> = nodes.iter().map(|&k| (k, 0)).collect();
    let mut successors: BTreeMap<CellKey, Vec<CellKey>> = BTreeMap::new();
    for &node in nodes {
        let next: Vec<CellKey> = graph
            .dependents_of(node)
            .into_iter()
            .filter(|d| nodes.contains(d))
            .collect();
        for d in &next {
            if let Some(count) = indegree.get_mut(d) {
                *count += 1;
            }
        }
        successors.insert(node, next);
    }

    let mut ready: BTreeSet<CellKey> = indegree
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(key, _)| *key)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(key) = ready.pop_first() {
        order.push(key);
        for d in successors.get(&key).into_iter().flatten() {
            if let Some(count) = indegree.get_mut(d) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*d);
                }
            }
        }
    }

    let cyclic = indegree
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(key, _)| key)
        .collect();
    (order, cyclic)
}

/// Whether `refs` reads a cycle member, directly or through a range
fn reads_cycle(cycle_members: &BTreeSet<CellKey>, refs: &References) -> bool {
    refs.cells.iter().any(|key| cycle_members.contains(key))
        || cycle_members
            .iter()
            .any(|&key| refs.ranges.iter().any(|range| range.contains(key)))
}

fn evaluate_cell(
    workbook: &Workbook,
    key: CellKey,
    parsed: &ParsedFormula,
    max_range_cells: u64,
) -> CellValue {
    let ast = match parsed {
        Ok(ast) => ast,
        Err(e) => return CellValue::Error(*e),
    };
    let ctx = EvaluationContext::new(workbook, key).with_max_range_cells(max_range_cells);
    match evaluate(ast, &ctx) {
        // A formula that reads nothing shows 0, as spreadsheets do
        Ok(FormulaValue::Empty) => CellValue::Number(0.0),
        Ok(value) => value.into(),
        Err(e) => {
            log::debug!("evaluating {} failed: {}", key, e);
            CellValue::Error(e.as_cell_error())
        }
    }
}
