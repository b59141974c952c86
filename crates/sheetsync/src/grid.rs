//! Raw edits reported by a grid widget

use sheetsync_core::CellKey;

use crate::error::Result;
use crate::options::RecalcStats;
use crate::session::Session;

/// One edit event: the text a user typed into `(row, col)` of a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridEdit {
    pub row: u32,
    pub col: u16,
    pub input: String,
}

impl GridEdit {
    pub fn new(row: u32, col: u16, input: impl Into<String>) -> Self {
        Self {
            row,
            col,
            input: input.into(),
        }
    }
}

impl Session {
    /// Apply one grid edit to `sheet`
    pub fn apply_grid_edit(&mut self, sheet: usize, edit: &GridEdit) -> Result<()> {
        self.set_cell_input(CellKey::new(sheet, edit.row, edit.col), &edit.input)
    }

    /// Apply several grid edits with a single flush
    ///
    /// Stops at the first failing edit; the edits before it stay applied and
    /// are flushed. Inside an active batch the edits join that batch and the
    /// returned statistics are empty.
    pub fn apply_grid_edits<I>(&mut self, sheet: usize, edits: I) -> Result<RecalcStats>
    where
        I: IntoIterator<Item = GridEdit>,
    {
        if self.batching {
            for edit in edits {
                self.apply_grid_edit(sheet, &edit)?;
            }
            return Ok(RecalcStats::default());
        }

        let mut batch = self.batch();
        for edit in edits {
            batch.apply_grid_edit(sheet, &edit)?;
        }
        Ok(batch.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetsync_core::CellValue;

    #[test]
    fn test_grid_edits_are_parsed() {
        let mut session = Session::new();
        let sheet = session.add_sheet("Unit").unwrap();
        let stats = session
            .apply_grid_edits(
                sheet,
                vec![
                    GridEdit::new(0, 0, "Widget"),
                    GridEdit::new(0, 1, "20"),
                    GridEdit::new(0, 2, " 3 "),
                    GridEdit::new(0, 3, "=B1*C1"),
                    GridEdit::new(0, 4, "true"),
                ],
            )
            .unwrap();

        assert_eq!(stats.cells_evaluated, 1);
        assert_eq!(session.get_value(CellKey::new(sheet, 0, 3)).unwrap(), CellValue::Number(60.0));
        assert_eq!(session.get_value(CellKey::new(sheet, 0, 4)).unwrap(), CellValue::Boolean(true));
        assert_eq!(
            session.get_value(CellKey::new(sheet, 0, 0)).unwrap(),
            CellValue::String("Widget".into())
        );
    }

    #[test]
    fn test_failing_edit_still_flushes() {
        let mut session = Session::new();
        session.add_sheet("S").unwrap();
        let result = session.apply_grid_edits(
            0,
            vec![GridEdit::new(0, 0, "1"), GridEdit::new(u32::MAX, 0, "2")],
        );
        assert!(result.is_err());
        assert!(!session.is_batching());
        assert_eq!(session.get_value(CellKey::new(0, 0, 0)).unwrap(), CellValue::Number(1.0));
    }
}
