//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value stored in a cell
//! - [`CellAddress`] - A cell's location within a sheet (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10", "D:D")
//! - [`CellKey`] - A cell's location within the workbook
//! - [`CellStorage`] - Sparse storage for one sheet

mod address;
mod key;
mod storage;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use key::CellKey;
pub use storage::CellStorage;
pub use value::{CellError, CellValue};
