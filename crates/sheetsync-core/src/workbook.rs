//! Workbook type

use crate::cell::{CellKey, CellValue};
use crate::error::{Error, Result};
use crate::worksheet::Worksheet;
use crate::MAX_SHEET_NAME_LEN;

/// An ordered collection of uniquely named worksheets
///
/// Sheet indices are insertion order and never change for the life of the
/// workbook.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    worksheets: Vec<Worksheet>,
}

impl Workbook {
    /// Create a workbook with no sheets
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of worksheets
    pub fn sheet_count(&self) -> usize {
        self.worksheets.len()
    }

    /// Whether the workbook has no sheets
    pub fn is_empty(&self) -> bool {
        self.worksheets.is_empty()
    }

    /// Get a worksheet by index
    pub fn worksheet(&self, index: usize) -> Option<&Worksheet> {
        self.worksheets.get(index)
    }

    /// Get a mutable worksheet by index
    pub fn worksheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.worksheets.get_mut(index)
    }

    /// Get a worksheet by name
    pub fn worksheet_by_name(&self, name: &str) -> Option<&Worksheet> {
        self.sheet_index(name).and_then(|i| self.worksheets.get(i))
    }

    /// Find a sheet index by name
    ///
    /// Exact matches win; otherwise a single case-insensitive match is
    /// accepted, the way formula text usually spells sheet names.
    pub fn sheet_index(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.worksheets.iter().position(|ws| ws.name() == name) {
            return Some(i);
        }
        let mut matches = self
            .worksheets
            .iter()
            .enumerate()
            .filter(|(_, ws)| ws.name().eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some((i, _)), None) => Some(i),
            _ => None,
        }
    }

    /// Sheet names in index order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.worksheets.iter().map(Worksheet::name).collect()
    }

    /// Iterate over worksheets
    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.iter()
    }

    /// Add a new worksheet with the given name, returning its index
    pub fn add_worksheet_with_name(&mut self, name: &str) -> Result<usize> {
        self.validate_sheet_name(name, None)?;
        self.worksheets.push(Worksheet::new(name));
        Ok(self.worksheets.len() - 1)
    }

    /// Rename a worksheet
    pub fn rename_worksheet(&mut self, index: usize, new_name: &str) -> Result<()> {
        let count = self.worksheets.len();
        if index >= count {
            return Err(Error::SheetOutOfBounds(index, count));
        }
        self.validate_sheet_name(new_name, Some(index))?;
        self.worksheets[index].set_name(new_name);
        Ok(())
    }

    /// Resolve the worksheet a key points into
    ///
    /// Fails with [`Error::InvalidAddress`] when the sheet does not exist.
    pub fn sheet_for(&self, key: CellKey) -> Result<&Worksheet> {
        self.worksheets
            .get(key.sheet)
            .ok_or_else(|| Error::InvalidAddress(format!("no sheet with index {}", key.sheet)))
    }

    fn sheet_for_mut(&mut self, key: CellKey) -> Result<&mut Worksheet> {
        self.worksheets
            .get_mut(key.sheet)
            .ok_or_else(|| Error::InvalidAddress(format!("no sheet with index {}", key.sheet)))
    }

    /// Get the stored content of a cell
    pub fn cell(&self, key: CellKey) -> Option<&CellValue> {
        self.worksheets.get(key.sheet)?.cell(key.row, key.col)
    }

    /// Replace the content of a cell, returning the previous content
    pub fn set_cell(&mut self, key: CellKey, value: CellValue) -> Result<Option<CellValue>> {
        self.sheet_for_mut(key)?.set_cell(key.row, key.col, value)
    }

    /// Store a calculated result for a formula cell
    pub fn set_formula_result(&mut self, key: CellKey, value: CellValue) -> bool {
        self.worksheets
            .get_mut(key.sheet)
            .map_or(false, |ws| ws.set_formula_result(key.row, key.col, value))
    }

    /// Iterate over every formula cell in the workbook
    pub fn formula_cells(&self) -> impl Iterator<Item = (CellKey, &str)> {
        self.worksheets.iter().enumerate().flat_map(|(sheet, ws)| {
            ws.formula_cells()
                .map(move |(row, col, text)| (CellKey::new(sheet, row, col), text))
        })
    }

    fn validate_sheet_name(&self, name: &str, exclude_index: Option<usize>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        const INVALID_CHARS: &[char] = &[':', '\\', '/', '?', '*', '[', ']'];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(Error::InvalidSheetName(
                "Sheet name cannot start or end with an apostrophe".into(),
            ));
        }

        // Exact, case-sensitive collision
        let taken = self
            .worksheets
            .iter()
            .enumerate()
            .any(|(i, ws)| Some(i) != exclude_index && ws.name() == name);
        if taken {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_find_sheets() {
        let mut wb = Workbook::new();
        assert!(wb.is_empty());
        assert_eq!(wb.add_worksheet_with_name("Global").unwrap(), 0);
        assert_eq!(wb.add_worksheet_with_name("Unit").unwrap(), 1);

        assert_eq!(wb.sheet_names(), vec!["Global", "Unit"]);
        assert_eq!(wb.sheet_index("Unit"), Some(1));
        assert_eq!(wb.sheet_index("unit"), Some(1));
        assert_eq!(wb.sheet_index("Common"), None);
    }

    #[test]
    fn test_duplicate_sheet_name_is_case_sensitive() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Unit").unwrap();

        assert!(matches!(
            wb.add_worksheet_with_name("Unit"),
            Err(Error::DuplicateSheetName(_))
        ));
        assert_eq!(wb.add_worksheet_with_name("UNIT").unwrap(), 1);
        // Both spellings exist, so only exact lookups resolve
        assert_eq!(wb.sheet_index("unit"), None);
        assert_eq!(wb.sheet_count(), 2);
    }

    #[test]
    fn test_invalid_sheet_names() {
        let mut wb = Workbook::new();
        for bad in ["", "a/b", "[x]", "'quoted'", "a-very-long-sheet-name-over-31-chars"] {
            assert!(
                matches!(wb.add_worksheet_with_name(bad), Err(Error::InvalidSheetName(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(wb.is_empty());
    }

    #[test]
    fn test_rename_worksheet() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("A").unwrap();
        wb.add_worksheet_with_name("B").unwrap();

        assert!(wb.rename_worksheet(0, "B").is_err());
        wb.rename_worksheet(0, "A").unwrap();
        wb.rename_worksheet(0, "Renamed").unwrap();
        assert_eq!(wb.sheet_names(), vec!["Renamed", "B"]);
        assert!(matches!(
            wb.rename_worksheet(5, "X"),
            Err(Error::SheetOutOfBounds(5, 2))
        ));
    }

    #[test]
    fn test_cell_on_missing_sheet() {
        let mut wb = Workbook::new();
        let err = wb
            .set_cell(CellKey::new(3, 0, 0), CellValue::Number(1.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }
}
