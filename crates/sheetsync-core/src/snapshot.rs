//! Workbook snapshots: the exchange format shared with file codecs and grid widgets
//!
//! A snapshot is a row-major grid per sheet in which every entry is either a
//! literal or formula text. Snapshots are derived on demand and never hold
//! calculated values.

use crate::cell::{CellError, CellValue};
use crate::error::Error;
use crate::{MAX_COLS, MAX_ROWS};

/// One entry of a sheet snapshot
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SnapshotCell {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
    /// Formula text including the leading `=`
    Formula(String),
}

impl SnapshotCell {
    /// Whether the entry is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, SnapshotCell::Empty)
    }

    /// The string form used by grid widgets, formulas keep their `=` marker
    pub fn to_exchange_string(&self) -> String {
        match self {
            SnapshotCell::Empty => String::new(),
            SnapshotCell::Number(n) => n.to_string(),
            SnapshotCell::Text(s) => s.clone(),
            SnapshotCell::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SnapshotCell::Error(e) => e.as_str().to_string(),
            SnapshotCell::Formula(text) => text.clone(),
        }
    }

    /// Parse the string form; see [`CellValue::from_input`]
    pub fn from_exchange_string(s: &str) -> Self {
        SnapshotCell::from(&CellValue::from_input(s))
    }

    /// Convert into stored cell content
    pub fn into_cell_value(self) -> CellValue {
        match self {
            SnapshotCell::Empty => CellValue::Empty,
            SnapshotCell::Number(n) => CellValue::Number(n),
            SnapshotCell::Text(s) => CellValue::String(s),
            SnapshotCell::Boolean(b) => CellValue::Boolean(b),
            SnapshotCell::Error(e) => CellValue::Error(e),
            SnapshotCell::Formula(text) => CellValue::formula(text),
        }
    }
}

impl From<&CellValue> for SnapshotCell {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => SnapshotCell::Empty,
            CellValue::Boolean(b) => SnapshotCell::Boolean(*b),
            CellValue::Number(n) => SnapshotCell::Number(*n),
            CellValue::String(s) => SnapshotCell::Text(s.clone()),
            CellValue::Error(e) => SnapshotCell::Error(*e),
            CellValue::Formula { text, .. } => SnapshotCell::Formula(text.clone()),
        }
    }
}

/// Row-major view of one sheet's bounding box
///
/// `rows[0][0]` sits at `(origin_row, origin_col)` on the sheet.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetSnapshot {
    pub name: String,
    pub origin_row: u32,
    pub origin_col: u16,
    pub rows: Vec<Vec<SnapshotCell>>,
}

impl SheetSnapshot {
    /// An empty sheet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A sheet whose grid starts at A1
    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<SnapshotCell>>) -> Self {
        Self {
            name: name.into(),
            origin_row: 0,
            origin_col: 0,
            rows,
        }
    }

    /// A sheet from grid-widget strings, starting at A1
    pub fn from_exchange_strings<S: AsRef<str>>(name: impl Into<String>, rows: &[Vec<S>]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|s| SnapshotCell::from_exchange_string(s.as_ref()))
                    .collect()
            })
            .collect();
        Self::from_rows(name, rows)
    }

    /// Build the bounding-box grid from sparse `(row, col, cell)` entries
    pub fn from_cells(
        name: impl Into<String>,
        cells: impl IntoIterator<Item = (u32, u16, SnapshotCell)>,
    ) -> Self {
        let cells: Vec<_> = cells.into_iter().filter(|(_, _, c)| !c.is_empty()).collect();
        let mut snapshot = Self::new(name);
        let (Some(min_row), Some(max_row), Some(min_col), Some(max_col)) = (
            cells.iter().map(|c| c.0).min(),
            cells.iter().map(|c| c.0).max(),
            cells.iter().map(|c| c.1).min(),
            cells.iter().map(|c| c.1).max(),
        ) else {
            return snapshot;
        };

        let width = (max_col - min_col) as usize + 1;
        let height = (max_row - min_row) as usize + 1;
        snapshot.origin_row = min_row;
        snapshot.origin_col = min_col;
        snapshot.rows = vec![vec![SnapshotCell::Empty; width]; height];
        for (row, col, cell) in cells {
            snapshot.rows[(row - min_row) as usize][(col - min_col) as usize] = cell;
        }
        snapshot
    }

    /// Entry at a sheet position
    pub fn cell(&self, row: u32, col: u16) -> &SnapshotCell {
        const EMPTY: &SnapshotCell = &SnapshotCell::Empty;
        if row < self.origin_row || col < self.origin_col {
            return EMPTY;
        }
        self.rows
            .get((row - self.origin_row) as usize)
            .and_then(|r| r.get((col - self.origin_col) as usize))
            .unwrap_or(EMPTY)
    }

    /// Iterate over the non-empty entries with their sheet positions
    ///
    /// An entry whose position lies past the last row or column yields
    /// `RowOutOfBounds` or `ColumnOutOfBounds` instead of a position.
    pub fn iter_cells(&self) -> impl Iterator<Item = crate::Result<(u32, u16, &SnapshotCell)>> {
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, cell)| !cell.is_empty())
                .map(move |(c, cell)| {
                    let row = u64::from(self.origin_row) + r as u64;
                    if row >= u64::from(MAX_ROWS) {
                        return Err(Error::RowOutOfBounds(
                            u32::try_from(row).unwrap_or(u32::MAX),
                            MAX_ROWS - 1,
                        ));
                    }
                    let col = u64::from(self.origin_col) + c as u64;
                    if col >= u64::from(MAX_COLS) {
                        return Err(Error::ColumnOutOfBounds(
                            u16::try_from(col).unwrap_or(u16::MAX),
                            MAX_COLS - 1,
                        ));
                    }
                    Ok((row as u32, col as u16, cell))
                })
        })
    }

    /// The grid re-anchored at A1, as grid widgets expect it
    pub fn to_dense(&self) -> Vec<Vec<SnapshotCell>> {
        let lead_cols = self.origin_col as usize;
        let mut dense = vec![Vec::new(); self.origin_row as usize];
        dense.extend(self.rows.iter().map(|row| {
            let mut out = vec![SnapshotCell::Empty; lead_cols];
            out.extend(row.iter().cloned());
            out
        }));
        dense
    }

    /// The dense grid as grid-widget strings
    pub fn to_exchange_strings(&self) -> Vec<Vec<String>> {
        self.to_dense()
            .iter()
            .map(|row| row.iter().map(SnapshotCell::to_exchange_string).collect())
            .collect()
    }
}

/// Every sheet of a workbook, in sheet-index order
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkbookSnapshot {
    pub sheets: Vec<SheetSnapshot>,
}

impl WorkbookSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a sheet by exact name
    pub fn sheet(&self, name: &str) -> Option<&SheetSnapshot> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// A workbook file format that reads and writes snapshots
pub trait WorkbookCodec {
    /// Codec-specific error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse file bytes into a snapshot
    fn decode(&self, bytes: &[u8]) -> Result<WorkbookSnapshot, Self::Error>;

    /// Serialize a snapshot into file bytes
    fn encode(&self, snapshot: &WorkbookSnapshot) -> Result<Vec<u8>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_exchange_strings() {
        assert_eq!(
            SnapshotCell::from_exchange_string("=SUM(Unit!D:D)"),
            SnapshotCell::Formula("=SUM(Unit!D:D)".into())
        );
        assert_eq!(SnapshotCell::from_exchange_string("10"), SnapshotCell::Number(10.0));
        assert_eq!(SnapshotCell::Number(2.5).to_exchange_string(), "2.5");
        assert_eq!(SnapshotCell::Boolean(false).to_exchange_string(), "FALSE");
        assert_eq!(SnapshotCell::Error(CellError::Cycle).to_exchange_string(), "#CYCLE!");
    }

    #[test]
    fn test_from_cells_uses_bounding_box() {
        let snapshot = SheetSnapshot::from_cells(
            "S",
            vec![
                (3, 2, SnapshotCell::Number(1.0)),
                (1, 4, SnapshotCell::Text("x".into())),
                (2, 3, SnapshotCell::Empty),
            ],
        );
        assert_eq!((snapshot.origin_row, snapshot.origin_col), (1, 2));
        assert_eq!(snapshot.rows.len(), 3);
        assert_eq!(snapshot.rows[0].len(), 3);
        assert_eq!(snapshot.cell(3, 2), &SnapshotCell::Number(1.0));
        assert_eq!(snapshot.cell(0, 0), &SnapshotCell::Empty);

        let positions: Vec<_> = snapshot
            .iter_cells()
            .map(|entry| entry.map(|(r, c, _)| (r, c)).unwrap())
            .collect();
        assert_eq!(positions, vec![(1, 4), (3, 2)]);
    }

    #[test]
    fn test_positions_past_the_sheet_edge_are_errors() {
        let mut wide = vec![SnapshotCell::Empty; MAX_COLS as usize + 1];
        wide[0] = SnapshotCell::Number(1.0);
        wide[MAX_COLS as usize] = SnapshotCell::Number(2.0);
        let mut snapshot = SheetSnapshot::new("S");
        snapshot.rows = vec![wide];

        let entries: Vec<_> = snapshot.iter_cells().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].as_ref().unwrap().0, 0);
        assert_eq!(entries[0].as_ref().unwrap().1, 0);
        assert!(matches!(entries[1], Err(Error::ColumnOutOfBounds(MAX_COLS, _))));

        // an origin near the edge must not wrap around either
        snapshot.origin_col = u16::MAX;
        snapshot.origin_row = MAX_ROWS - 1;
        snapshot.rows = vec![vec![SnapshotCell::Number(1.0)]; 2];
        let errors: Vec<_> = snapshot.iter_cells().filter_map(|e| e.err()).collect();
        assert!(matches!(errors[0], Error::ColumnOutOfBounds(u16::MAX, _)));
        assert!(matches!(errors[1], Error::RowOutOfBounds(MAX_ROWS, _)));
    }

    #[test]
    fn test_to_dense_reanchors_at_a1() {
        let snapshot = SheetSnapshot::from_cells("S", vec![(1, 1, SnapshotCell::Boolean(true))]);
        assert_eq!(
            snapshot.to_exchange_strings(),
            vec![vec![], vec!["".to_string(), "TRUE".to_string()]]
        );

        let empty = SheetSnapshot::from_cells("E", Vec::new());
        assert!(empty.rows.is_empty());
        assert!(empty.to_dense().is_empty());
    }

    #[test]
    fn test_from_exchange_strings() {
        let snapshot = SheetSnapshot::from_exchange_strings(
            "Unit",
            &[vec!["Widget", "20", "3", "=B1*C1"]],
        );
        assert_eq!(snapshot.cell(0, 3), &SnapshotCell::Formula("=B1*C1".into()));
        assert_eq!(snapshot.cell(0, 0), &SnapshotCell::Text("Widget".into()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_snapshot_serializes() {
        let snapshot = SheetSnapshot::from_rows("S", vec![vec![SnapshotCell::Number(1.0)]]);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SheetSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
