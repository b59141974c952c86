//! Row/column changes and sheet renames
//!
//! A structural change is planned in full before anything is touched: every
//! formula rewrite is computed first, and any failure rejects the whole
//! operation with [`Error::Reindex`]. Only then are the cells moved, the
//! formula texts replaced and the graph relocated.

use std::collections::BTreeSet;

use sheetsync_core::{CellKey, CellValue, MAX_COLS, MAX_ROWS};
use sheetsync_formula::{
    rename_sheet_in_formula, rewrite_for_change, Axis, ChangeKind, StructuralChange,
};

use crate::error::{Error, Result};
use crate::session::Session;

impl Session {
    /// Insert `count` empty rows before row `at`
    pub fn insert_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.restructure(StructuralChange::insert_rows(sheet, at, count))
    }

    /// Delete rows `at..at + count`
    pub fn remove_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.restructure(StructuralChange::remove_rows(sheet, at, count))
    }

    /// Insert `count` empty columns before column `at`
    pub fn insert_columns(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.restructure(StructuralChange::insert_columns(sheet, at, count))
    }

    /// Delete columns `at..at + count`
    pub fn remove_columns(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.restructure(StructuralChange::remove_columns(sheet, at, count))
    }

    /// Rename a sheet and every formula qualifier that names it
    pub fn rename_sheet(&mut self, sheet: usize, new_name: &str) -> Result<()> {
        let rewrites: Vec<(CellKey, String)> = self
            .workbook
            .formula_cells()
            .filter_map(|(key, text)| {
                rename_sheet_in_formula(text, sheet, new_name, &self.workbook)
                    .map(|new_text| (key, new_text))
            })
            .collect();

        self.workbook.rename_worksheet(sheet, new_name)?;
        log::debug!(
            "renamed sheet {} to '{}', {} formulas rewritten",
            sheet,
            new_name,
            rewrites.len()
        );

        for (key, text) in rewrites {
            self.replace_formula_text(key, text);
            self.register(key);
        }
        self.refresh_sheet_bindings();
        self.after_mutation();
        Ok(())
    }

    fn restructure(&mut self, change: StructuralChange) -> Result<()> {
        let sheet_name = self
            .workbook
            .sheet_for(CellKey::new(change.sheet, 0, 0))?
            .name()
            .to_string();
        check_index(&change)?;
        if change.count == 0 {
            return Ok(());
        }
        let reindex = |reason: String| Error::Reindex {
            sheet: sheet_name.clone(),
            reason,
        };

        // Plan
        let storage = self
            .workbook
            .sheet_for(CellKey::new(change.sheet, 0, 0))?
            .storage();
        if change.kind == ChangeKind::Insert {
            let fits = match change.axis {
                Axis::Rows => storage.check_insert_rows(change.at, change.count),
                Axis::Columns => storage.check_insert_columns(change.at as u16, change.count as u16),
            };
            fits.map_err(|e| reindex(e.to_string()))?;
        }

        let mut rewrites = Vec::new();
        for (key, text) in self.workbook.formula_cells() {
            let Some(moved) = change.map_position(key) else {
                continue;
            };
            match rewrite_for_change(text, key.sheet, &change, &self.workbook) {
                Ok(Some(new_text)) => rewrites.push((moved, new_text)),
                Ok(None) => {}
                Err(e) => return Err(reindex(format!("formula at {}: {}", key, e))),
            }
        }

        let touched = touched_positions(self, &change);
        for &key in &touched {
            self.remember(key);
        }

        // Apply
        let Some(sheet) = self.workbook.worksheet_mut(change.sheet) else {
            return Ok(());
        };
        let storage = sheet.storage_mut();
        let removed = match (change.axis, change.kind) {
            (Axis::Rows, ChangeKind::Insert) => {
                storage
                    .insert_rows(change.at, change.count)
                    .map_err(|e| reindex(e.to_string()))?;
                Vec::new()
            }
            (Axis::Rows, ChangeKind::Remove) => storage.remove_rows(change.at, change.count),
            (Axis::Columns, ChangeKind::Insert) => {
                storage
                    .insert_columns(change.at as u16, change.count as u16)
                    .map_err(|e| reindex(e.to_string()))?;
                Vec::new()
            }
            (Axis::Columns, ChangeKind::Remove) => {
                storage.remove_columns(change.at as u16, change.count as u16)
            }
        };

        self.graph.relocate(|key| change.map_position(key));
        self.formulas = std::mem::take(&mut self.formulas)
            .into_iter()
            .filter_map(|(key, parsed)| change.map_position(key).map(|moved| (moved, parsed)))
            .collect();
        self.cycle_members = std::mem::take(&mut self.cycle_members)
            .into_iter()
            .filter_map(|key| change.map_position(key))
            .collect();

        let rewritten = rewrites.len();
        for (key, text) in rewrites {
            self.replace_formula_text(key, text);
            self.register(key);
        }
        for &key in &touched {
            self.graph.mark_dirty(key);
        }

        log::debug!(
            "{:?} {:?} at {} x{} on '{}': {} cells touched, {} removed, {} formulas rewritten",
            change.kind,
            change.axis,
            change.at,
            change.count,
            sheet_name,
            touched.len(),
            removed.len(),
            rewritten
        );
        self.after_mutation();
        Ok(())
    }

    /// Swap the text of a stored formula, keeping its cached value
    fn replace_formula_text(&mut self, key: CellKey, new_text: String) {
        let cell = self
            .workbook
            .worksheet_mut(key.sheet)
            .and_then(|sheet| sheet.storage_mut().get_mut(key.row, key.col));
        if let Some(CellValue::Formula { text, .. }) = cell {
            *text = new_text;
        }
    }
}

fn check_index(change: &StructuralChange) -> Result<()> {
    match change.axis {
        Axis::Rows if change.at >= MAX_ROWS => {
            Err(sheetsync_core::Error::RowOutOfBounds(change.at, MAX_ROWS - 1).into())
        }
        Axis::Columns if change.at >= MAX_COLS as u32 => Err(sheetsync_core::Error::ColumnOutOfBounds(
            change.at.min(u16::MAX as u32) as u16,
            MAX_COLS - 1,
        )
        .into()),
        _ => Ok(()),
    }
}

/// Addresses whose content moves or disappears, before and after the change
fn touched_positions(session: &Session, change: &StructuralChange) -> BTreeSet<CellKey> {
    let mut touched = BTreeSet::new();
    let Some(sheet) = session.workbook.worksheet(change.sheet) else {
        return touched;
    };
    for (row, col, _) in sheet.storage().iter() {
        let index = match change.axis {
            Axis::Rows => row,
            Axis::Columns => col as u32,
        };
        if index < change.at {
            continue;
        }
        let key = CellKey::new(change.sheet, row, col);
        touched.insert(key);
        if let Some(moved) = change.map_position(key) {
            touched.insert(moved);
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetsync_core::{CellError, SnapshotCell};

    fn content(session: &Session, key: CellKey) -> SnapshotCell {
        session.get_content(key).unwrap()
    }

    #[test]
    fn test_insert_rows_moves_cells_and_formulas() {
        let mut session = Session::new();
        let s = session.add_sheet("S").unwrap();
        session.set_cell_input(CellKey::new(s, 3, 0), "4").unwrap();
        session.set_cell_input(CellKey::new(s, 0, 1), "=A4*2").unwrap();

        session.insert_rows(s, 1, 2).unwrap();
        assert!(session.get_value(CellKey::new(s, 3, 0)).is_err());
        assert_eq!(session.get_value(CellKey::new(s, 5, 0)).unwrap(), CellValue::Number(4.0));
        assert_eq!(content(&session, CellKey::new(s, 0, 1)), SnapshotCell::Formula("=A6*2".into()));
        assert_eq!(session.get_value(CellKey::new(s, 0, 1)).unwrap(), CellValue::Number(8.0));
    }

    #[test]
    fn test_remove_rows_invalidates_references() {
        let mut session = Session::new();
        let s = session.add_sheet("S").unwrap();
        session.set_cell_input(CellKey::new(s, 1, 0), "5").unwrap();
        session.set_cell_input(CellKey::new(s, 4, 0), "=A2+1").unwrap();

        session.remove_rows(s, 1, 1).unwrap();
        assert_eq!(content(&session, CellKey::new(s, 3, 0)), SnapshotCell::Formula("=#REF!+1".into()));
        assert_eq!(
            session.get_value(CellKey::new(s, 3, 0)).unwrap(),
            CellValue::Error(CellError::Ref)
        );
        assert_eq!(session.formulas.len(), 1);
        assert!(session.dependency_graph().is_consumer(CellKey::new(s, 3, 0)));
    }

    #[test]
    fn test_removed_formula_leaves_the_graph() {
        let mut session = Session::new();
        let s = session.add_sheet("S").unwrap();
        session.set_cell_input(CellKey::new(s, 0, 0), "1").unwrap();
        session.set_cell_input(CellKey::new(s, 0, 1), "=A1").unwrap();

        session.remove_columns(s, 1, 1).unwrap();
        assert!(session.dependency_graph().consumers().is_empty());
        assert!(session.formulas.is_empty());
    }

    #[test]
    fn test_rejected_insert_leaves_session_unchanged() {
        let mut session = Session::new();
        let s = session.add_sheet("S").unwrap();
        session.set_cell_input(CellKey::new(s, MAX_ROWS - 1, 0), "1").unwrap();
        session.set_cell_input(CellKey::new(s, 0, 0), "=A1048576").unwrap();

        let err = session.insert_rows(s, 0, 1).unwrap_err();
        assert!(matches!(err, Error::Reindex { .. }));
        assert_eq!(content(&session, CellKey::new(s, 0, 0)), SnapshotCell::Formula("=A1048576".into()));
        assert_eq!(
            session.get_value(CellKey::new(s, MAX_ROWS - 1, 0)).unwrap(),
            CellValue::Number(1.0)
        );
    }

    #[test]
    fn test_rejected_rewrite_leaves_session_unchanged() {
        let mut session = Session::new();
        let s = session.add_sheet("S").unwrap();
        let other = session.add_sheet("Other").unwrap();
        // Only a reference points at the last row, no cell lives there
        session.set_cell_input(CellKey::new(other, 0, 0), "=S!A1048576").unwrap();
        session.set_cell_input(CellKey::new(s, 0, 0), "1").unwrap();

        let err = session.insert_rows(s, 0, 1).unwrap_err();
        assert!(matches!(err, Error::Reindex { .. }));
        assert_eq!(session.get_value(CellKey::new(s, 0, 0)).unwrap(), CellValue::Number(1.0));
    }

    #[test]
    fn test_zero_count_is_a_no_op() {
        let mut session = Session::new();
        let s = session.add_sheet("S").unwrap();
        session.set_cell_input(CellKey::new(s, 0, 0), "1").unwrap();
        session.insert_rows(s, 0, 0).unwrap();
        assert_eq!(session.get_value(CellKey::new(s, 0, 0)).unwrap(), CellValue::Number(1.0));
        assert!(session.insert_rows(7, 0, 1).is_err());
    }

    #[test]
    fn test_rename_sheet_rewrites_qualifiers() {
        let mut session = Session::new();
        let unit = session.add_sheet("Unit").unwrap();
        let global = session.add_sheet("Global").unwrap();
        session.set_cell_input(CellKey::new(unit, 0, 0), "3").unwrap();
        session.set_cell_input(CellKey::new(global, 0, 0), "=Unit!A1*2").unwrap();
        session.set_cell_input(CellKey::new(global, 0, 1), "='Unit Costs'!A1").unwrap();

        session.rename_sheet(unit, "Unit Costs").unwrap();
        assert_eq!(session.sheet_names(), vec!["Unit Costs", "Global"]);
        assert_eq!(
            content(&session, CellKey::new(global, 0, 0)),
            SnapshotCell::Formula("='Unit Costs'!A1*2".into())
        );
        assert_eq!(session.get_value(CellKey::new(global, 0, 0)).unwrap(), CellValue::Number(6.0));
        // Previously dangling, now resolves
        assert_eq!(session.get_value(CellKey::new(global, 0, 1)).unwrap(), CellValue::Number(3.0));

        // Edits through the new name still propagate
        session.set_cell_input(CellKey::new(unit, 0, 0), "5").unwrap();
        assert_eq!(session.get_value(CellKey::new(global, 0, 0)).unwrap(), CellValue::Number(10.0));
    }

    #[test]
    fn test_rename_to_exact_spelling_rebinds_formulas() {
        let mut session = Session::new();
        let data = session.add_sheet("Data").unwrap();
        let other = session.add_sheet("Other").unwrap();
        let total = CellKey::new(session.add_sheet("Total").unwrap(), 0, 0);
        session.set_cell_input(CellKey::new(data, 0, 0), "10").unwrap();
        session.set_cell_input(CellKey::new(other, 0, 0), "4").unwrap();
        session.set_cell_input(total, "=data!A1*2").unwrap();
        assert_eq!(session.get_value(total).unwrap(), CellValue::Number(20.0));

        session.rename_sheet(other, "data").unwrap();
        assert_eq!(content(&session, total), SnapshotCell::Formula("=data!A1*2".into()));
        assert_eq!(session.get_value(total).unwrap(), CellValue::Number(8.0));

        session.set_cell_input(CellKey::new(other, 0, 0), "50").unwrap();
        assert_eq!(session.get_value(total).unwrap(), CellValue::Number(100.0));
        session.set_cell_input(CellKey::new(data, 0, 0), "1").unwrap();
        assert_eq!(session.get_value(total).unwrap(), CellValue::Number(100.0));
    }

    #[test]
    fn test_rename_to_existing_name_fails() {
        let mut session = Session::new();
        session.add_sheet("A").unwrap();
        session.add_sheet("B").unwrap();
        assert!(session.rename_sheet(0, "B").is_err());
        assert_eq!(session.sheet_names(), vec!["A", "B"]);
    }
}
