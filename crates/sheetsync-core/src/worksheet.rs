//! Worksheet type

use crate::cell::{CellRange, CellStorage, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A named sheet of sparse cells
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: CellStorage,
}

impl Worksheet {
    /// Create a new empty worksheet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
        }
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get the stored content of a cell
    pub fn cell(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(row, col)
    }

    /// Get the calculated value of a cell (cached result for formulas)
    pub fn calculated_value(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(row, col).map(CellValue::effective_value)
    }

    /// Replace the content of a cell, returning the previous content
    pub fn set_cell(&mut self, row: u32, col: u16, value: CellValue) -> Result<Option<CellValue>> {
        check_bounds(row, col)?;
        Ok(self.cells.set(row, col, value))
    }

    /// Store a freshly calculated result for a formula cell
    ///
    /// Returns `false` if the cell does not hold a formula.
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> bool {
        match self.cells.get_mut(row, col) {
            Some(cell @ CellValue::Formula { .. }) => {
                cell.set_cached_value(value);
                true
            }
            _ => false,
        }
    }

    /// Iterate over every formula cell as `(row, col, text)`
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells
            .iter()
            .filter_map(|(row, col, value)| value.formula_text().map(|text| (row, col, text)))
    }

    /// The smallest range containing every non-empty cell
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .used_bounds()
            .map(|(r1, c1, r2, c2)| CellRange::from_indices(r1, c1, r2, c2))
    }

    /// Underlying cell storage
    pub fn storage(&self) -> &CellStorage {
        &self.cells
    }

    /// Underlying cell storage, mutable
    pub fn storage_mut(&mut self) -> &mut CellStorage {
        &mut self.cells
    }
}

fn check_bounds(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
    }
    if col >= MAX_COLS {
        return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_result_only_lands_on_formulas() {
        let mut ws = Worksheet::new("Unit");
        ws.set_cell(0, 1, CellValue::Number(20.0)).unwrap();
        ws.set_cell(0, 3, CellValue::formula("=B1*C1")).unwrap();

        assert!(ws.set_formula_result(0, 3, CellValue::Number(60.0)));
        assert!(!ws.set_formula_result(0, 1, CellValue::Number(1.0)));

        assert_eq!(ws.calculated_value(0, 3), Some(&CellValue::Number(60.0)));
        assert_eq!(ws.cell(0, 3).and_then(|v| v.formula_text()), Some("=B1*C1"));
        assert_eq!(ws.formula_cells().collect::<Vec<_>>(), vec![(0, 3, "=B1*C1")]);
        assert_eq!(ws.used_range().unwrap().to_string(), "B1:D1");
    }

    #[test]
    fn test_out_of_bounds_cell() {
        let mut ws = Worksheet::new("S");
        assert!(ws.set_cell(MAX_ROWS, 0, CellValue::Number(1.0)).is_err());
        assert!(ws.set_cell(0, MAX_COLS, CellValue::Number(1.0)).is_err());
    }
}
