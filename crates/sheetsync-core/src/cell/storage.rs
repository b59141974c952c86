//! Cell storage implementation
//!
//! Sparse storage for one sheet. Only non-empty cells are stored, using a
//! row-based BTreeMap so iteration is always in row-major order.

use std::collections::BTreeMap;

use super::CellValue;
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// Sparse row-based storage for worksheet cells
///
/// Structure: `BTreeMap<row_index, BTreeMap<col_index, CellValue>>`
#[derive(Debug, Clone, Default)]
pub struct CellStorage {
    rows: BTreeMap<u32, BTreeMap<u16, CellValue>>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell value
    pub fn get(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell value
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellValue> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Set a cell value, returning the previous one
    ///
    /// Setting [`CellValue::Empty`] removes the cell.
    pub fn set(&mut self, row: u32, col: u16, value: CellValue) -> Option<CellValue> {
        if value.is_empty() {
            return self.remove(row, col);
        }
        self.rows.entry(row).or_default().insert(col, value)
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellValue> {
        let row_map = self.rows.get_mut(&row)?;
        let result = row_map.remove(&col);
        if row_map.is_empty() {
            self.rows.remove(&row);
        }
        result
    }

    /// Clear all cells
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Get the number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the bounds of used cells
    ///
    /// Returns (min_row, min_col, max_row, max_col) or None if empty
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;

        let mut min_col = u16::MAX;
        let mut max_col = 0u16;
        for row_data in self.rows.values() {
            if let Some(&col) = row_data.keys().next() {
                min_col = min_col.min(col);
            }
            if let Some(&col) = row_data.keys().next_back() {
                max_col = max_col.max(col);
            }
        }

        Some((min_row, min_col, max_row, max_col))
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, value)| (row, col, value)))
    }

    /// Iterate over cells in a specific row
    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &CellValue)> {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(&col, value)| (col, value)))
    }

    /// Iterate over the cells of `first_row..=last_row` in row order
    pub fn iter_rows(
        &self,
        first_row: u32,
        last_row: u32,
    ) -> impl Iterator<Item = (u32, u16, &CellValue)> {
        self.rows
            .range(first_row..=last_row)
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, value)| (row, col, value)))
    }

    /// Check that `count` rows can be inserted at `at` without pushing a cell off the sheet
    pub fn check_insert_rows(&self, at: u32, count: u32) -> Result<()> {
        match self.rows.keys().next_back() {
            Some(&last) if last >= at && last as u64 + count as u64 >= MAX_ROWS as u64 => Err(
                Error::RowOutOfBounds(last.saturating_add(count), MAX_ROWS - 1),
            ),
            _ => Ok(()),
        }
    }

    /// Check that `count` columns can be inserted at `at` without pushing a cell off the sheet
    pub fn check_insert_columns(&self, at: u16, count: u16) -> Result<()> {
        let last = self
            .rows
            .values()
            .filter_map(|cols| cols.keys().next_back().copied())
            .max();
        match last {
            Some(last) if last >= at && last as u32 + count as u32 >= MAX_COLS as u32 => Err(
                Error::ColumnOutOfBounds(last.saturating_add(count), MAX_COLS - 1),
            ),
            _ => Ok(()),
        }
    }

    /// Move every row at or below `at` down by `count`
    pub fn insert_rows(&mut self, at: u32, count: u32) -> Result<()> {
        self.check_insert_rows(at, count)?;
        let moved = self.rows.split_off(&at);
        for (row, cols) in moved {
            self.rows.insert(row + count, cols);
        }
        Ok(())
    }

    /// Delete rows `at..at + count` and move the rows below up
    ///
    /// Returns the removed cells.
    pub fn remove_rows(&mut self, at: u32, count: u32) -> Vec<(u32, u16, CellValue)> {
        let mut tail = self.rows.split_off(&at);
        let below = tail.split_off(&at.saturating_add(count));

        let removed = tail
            .into_iter()
            .flat_map(|(row, cols)| cols.into_iter().map(move |(col, v)| (row, col, v)))
            .collect();
        for (row, cols) in below {
            self.rows.insert(row - count, cols);
        }
        removed
    }

    /// Move every column at or right of `at` right by `count`
    pub fn insert_columns(&mut self, at: u16, count: u16) -> Result<()> {
        self.check_insert_columns(at, count)?;
        for cols in self.rows.values_mut() {
            let moved = cols.split_off(&at);
            for (col, value) in moved {
                cols.insert(col + count, value);
            }
        }
        Ok(())
    }

    /// Delete columns `at..at + count` and move the columns to the right left
    ///
    /// Returns the removed cells.
    pub fn remove_columns(&mut self, at: u16, count: u16) -> Vec<(u32, u16, CellValue)> {
        let mut removed = Vec::new();
        for (&row, cols) in self.rows.iter_mut() {
            let mut tail = cols.split_off(&at);
            let right = tail.split_off(&at.saturating_add(count));
            removed.extend(tail.into_iter().map(|(col, v)| (row, col, v)));
            for (col, value) in right {
                cols.insert(col - count, value);
            }
        }
        self.rows.retain(|_, cols| !cols.is_empty());
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn positions(storage: &CellStorage) -> Vec<(u32, u16)> {
        storage.iter().map(|(r, c, _)| (r, c)).collect()
    }

    #[test]
    fn test_set_get_remove() {
        let mut storage = CellStorage::new();
        assert!(storage.is_empty());

        assert_eq!(storage.set(2, 3, CellValue::Number(1.0)), None);
        assert_eq!(storage.get(2, 3), Some(&CellValue::Number(1.0)));
        assert_eq!(
            storage.set(2, 3, CellValue::Number(2.0)),
            Some(CellValue::Number(1.0))
        );

        storage.set(2, 3, CellValue::Empty);
        assert!(storage.is_empty());
        assert_eq!(storage.remove(9, 9), None);
    }

    #[test]
    fn test_used_bounds() {
        let mut storage = CellStorage::new();
        assert_eq!(storage.used_bounds(), None);

        storage.set(4, 1, CellValue::Number(1.0));
        storage.set(1, 6, CellValue::Number(2.0));
        storage.set(7, 2, CellValue::Number(3.0));
        assert_eq!(storage.used_bounds(), Some((1, 1, 7, 6)));
        assert_eq!(storage.cell_count(), 3);
    }

    #[test]
    fn test_insert_and_remove_rows() {
        let mut storage = CellStorage::new();
        for row in 0..5 {
            storage.set(row, 0, CellValue::Number(row as f64));
        }

        storage.insert_rows(2, 2).unwrap();
        assert_eq!(positions(&storage), vec![(0, 0), (1, 0), (4, 0), (5, 0), (6, 0)]);
        assert_eq!(storage.get(4, 0), Some(&CellValue::Number(2.0)));

        let removed = storage.remove_rows(1, 4);
        assert_eq!(removed.len(), 2);
        assert_eq!(positions(&storage), vec![(0, 0), (1, 0), (2, 0)]);
        assert_eq!(storage.get(1, 0), Some(&CellValue::Number(3.0)));
    }

    #[test]
    fn test_insert_and_remove_columns() {
        let mut storage = CellStorage::new();
        storage.set(0, 0, CellValue::Number(0.0));
        storage.set(0, 1, CellValue::Number(1.0));
        storage.set(3, 2, CellValue::Number(2.0));

        storage.insert_columns(1, 1).unwrap();
        assert_eq!(positions(&storage), vec![(0, 0), (0, 2), (3, 3)]);

        let removed = storage.remove_columns(3, 1);
        assert_eq!(removed, vec![(3, 3, CellValue::Number(2.0))]);
        assert_eq!(positions(&storage), vec![(0, 0), (0, 2)]);
    }

    #[test]
    fn test_insert_rows_past_sheet_end_is_rejected() {
        let mut storage = CellStorage::new();
        storage.set(MAX_ROWS - 1, 0, CellValue::Number(1.0));

        assert!(storage.insert_rows(0, 1).is_err());
        assert_eq!(storage.get(MAX_ROWS - 1, 0), Some(&CellValue::Number(1.0)));
        // Inserting below the last used row is fine
        assert!(storage.check_insert_rows(MAX_ROWS, 1).is_ok());
    }
}
