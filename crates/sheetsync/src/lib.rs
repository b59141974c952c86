//! # sheetsync
//!
//! A live cell-and-formula model for multi-sheet workbooks.
//!
//! A [`Session`] holds every sheet's cells, keeps a dependency graph of its
//! formulas up to date as edits arrive, recalculates exactly the cells an
//! edit affects (across sheets too) and tells subscribers which values
//! changed. Bulk edits can be batched into a single recalculation, rows and
//! columns can be inserted or removed with formula references following the
//! move, and the whole model maps to and from workbook snapshots and
//! `.xlsx` files.
//!
//! ## Example
//!
//! ```rust
//! use sheetsync::prelude::*;
//!
//! let mut session = Session::new();
//! let global = session.add_sheet("Global").unwrap();
//! let unit = session.add_sheet("Unit").unwrap();
//!
//! session.set_cell_input(CellKey::new(global, 0, 1), "10").unwrap();
//! session.set_cell_input(CellKey::new(unit, 0, 0), "=Global!$B$1*3").unwrap();
//!
//! session.subscribe(|changes| {
//!     for (key, value) in changes {
//!         println!("{} is now {:?}", key, value);
//!     }
//! });
//!
//! session.set_cell_input(CellKey::new(global, 0, 1), "20").unwrap();
//! assert_eq!(
//!     session.get_value(CellKey::new(unit, 0, 0)).unwrap(),
//!     CellValue::Number(60.0)
//! );
//! ```

pub mod batch;
pub mod error;
pub mod grid;
pub mod mapper;
pub mod notifier;
pub mod options;
pub mod prelude;
mod recalc;
pub mod session;
pub mod structure;

pub use batch::BatchGuard;
pub use error::{Error, Result};
pub use grid::GridEdit;
pub use notifier::{ChangeSet, SubscriptionId};
pub use options::{RecalcStats, SessionOptions};
pub use session::Session;

// Re-export core types
pub use sheetsync_core::{
    CellAddress, CellError, CellKey, CellRange, CellValue, SheetSnapshot, SnapshotCell,
    WorkbookCodec, WorkbookSnapshot, MAX_COLS, MAX_ROWS,
};

// Re-export formula types
pub use sheetsync_formula::{Axis, ChangeKind, DependencyGraph, FormulaError, StructuralChange};

// Re-export the xlsx codec
#[cfg(feature = "xlsx")]
pub use sheetsync_xlsx::{XlsxCodec, XlsxError, XlsxReader, XlsxWriter};
