//! Session configuration and recalculation statistics

use sheetsync_formula::DEFAULT_MAX_RANGE_CELLS;

/// Options for a [`Session`](crate::Session)
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Run a full recalculation once an import has loaded every cell (default: true)
    pub recalculate_on_import: bool,
    /// Deliver change-sets that carry no entries (default: false)
    pub notify_empty_change_sets: bool,
    /// Ranges with more cells than this, after clamping to the used area,
    /// evaluate to `#REF!`
    pub max_range_cells: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            recalculate_on_import: true,
            notify_empty_change_sets: false,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
        }
    }
}

impl SessionOptions {
    /// Create the default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recalculate_on_import(mut self, recalculate: bool) -> Self {
        self.recalculate_on_import = recalculate;
        self
    }

    pub fn with_notify_empty_change_sets(mut self, notify: bool) -> Self {
        self.notify_empty_change_sets = notify;
        self
    }

    pub fn with_max_range_cells(mut self, max_range_cells: u64) -> Self {
        self.max_range_cells = max_range_cells;
        self
    }
}

/// Statistics from one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecalcStats {
    /// Formula cells evaluated in dependency order
    pub cells_evaluated: usize,
    /// Formula cells set to `#CYCLE!` (cycle members and their dependents)
    pub cycle_cells: usize,
    /// Evaluated cells whose result is an error value
    pub error_cells: usize,
    /// Entries in the emitted change-set
    pub changed_cells: usize,
}
