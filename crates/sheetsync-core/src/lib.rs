//! # sheetsync-core
//!
//! Cell store for the sheetsync synchronization core.
//!
//! This crate provides the data side of a live workbook:
//! - [`CellValue`] - closed variant of everything a cell can hold
//! - [`CellAddress`], [`CellRange`] and [`CellKey`] - addressing within and across sheets
//! - [`Workbook`], [`Worksheet`] - ordered, uniquely named sheets of sparse cells
//! - [`WorkbookSnapshot`] and [`WorkbookCodec`] - the exchange format shared with file codecs
//!   and grid widgets
//!
//! ## Example
//!
//! ```rust
//! use sheetsync_core::{CellKey, CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.add_worksheet_with_name("Global").unwrap();
//!
//! workbook
//!     .set_cell(CellKey::new(sheet, 0, 1), CellValue::Number(10.0))
//!     .unwrap();
//! workbook
//!     .set_cell(CellKey::new(sheet, 1, 1), CellValue::from_input("=B1*2"))
//!     .unwrap();
//!
//! assert_eq!(workbook.formula_cells().count(), 1);
//! ```

pub mod cell;
pub mod error;
pub mod snapshot;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{CellAddress, CellError, CellKey, CellRange, CellStorage, CellValue};
pub use error::{Error, Result};
pub use snapshot::{SheetSnapshot, SnapshotCell, WorkbookCodec, WorkbookSnapshot};
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
