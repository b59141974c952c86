//! Textual reference rewriting
//!
//! Rewrites replace only the spans of reference tokens, so the rest of a
//! formula (spacing, function name casing, literals) is kept byte-for-byte.

use std::ops::Range;

use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{is_cell_reference, tokenize, Token, TokenKind};
use sheetsync_core::{CellAddress, CellKey, Workbook, MAX_COLS, MAX_ROWS};

/// Which index a structural change moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Rows,
    Columns,
}

/// Insert or remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Remove,
}

/// Rows or columns inserted into / removed from one sheet
///
/// `at` and `count` are 0-based row or column indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralChange {
    pub sheet: usize,
    pub axis: Axis,
    pub kind: ChangeKind,
    pub at: u32,
    pub count: u32,
}

impl StructuralChange {
    pub fn insert_rows(sheet: usize, at: u32, count: u32) -> Self {
        Self::new(sheet, Axis::Rows, ChangeKind::Insert, at, count)
    }

    pub fn remove_rows(sheet: usize, at: u32, count: u32) -> Self {
        Self::new(sheet, Axis::Rows, ChangeKind::Remove, at, count)
    }

    pub fn insert_columns(sheet: usize, at: u16, count: u16) -> Self {
        Self::new(sheet, Axis::Columns, ChangeKind::Insert, at as u32, count as u32)
    }

    pub fn remove_columns(sheet: usize, at: u16, count: u16) -> Self {
        Self::new(sheet, Axis::Columns, ChangeKind::Remove, at as u32, count as u32)
    }

    fn new(sheet: usize, axis: Axis, kind: ChangeKind, at: u32, count: u32) -> Self {
        Self {
            sheet,
            axis,
            kind,
            at,
            count,
        }
    }

    /// One past the last index of the removed band
    fn end(&self) -> u32 {
        self.at.saturating_add(self.count)
    }

    /// Number of indices along the axis
    fn limit(&self) -> u32 {
        match self.axis {
            Axis::Rows => MAX_ROWS,
            Axis::Columns => MAX_COLS as u32,
        }
    }

    /// Where an index along the axis ends up; `None` if it was removed
    ///
    /// Inserted indices may land past the sheet edge; callers check bounds.
    pub fn map_index(&self, index: u32) -> Option<u32> {
        match self.kind {
            ChangeKind::Insert if index >= self.at => Some(index.saturating_add(self.count)),
            ChangeKind::Insert => Some(index),
            ChangeKind::Remove if index < self.at => Some(index),
            ChangeKind::Remove if index < self.end() => None,
            ChangeKind::Remove => Some(index - self.count),
        }
    }

    /// Where a cell ends up; `None` if it was removed
    pub fn map_position(&self, key: CellKey) -> Option<CellKey> {
        if key.sheet != self.sheet {
            return Some(key);
        }
        match self.axis {
            Axis::Rows => {
                let row = self.map_index(key.row)?;
                (row < MAX_ROWS).then_some(CellKey::new(key.sheet, row, key.col))
            }
            Axis::Columns => {
                let col = self.map_index(key.col as u32)?;
                (col < MAX_COLS as u32).then_some(CellKey::new(key.sheet, key.row, col as u16))
            }
        }
    }

    /// Shift an index for an insertion, failing past the sheet edge
    fn inserted(&self, index: u32, reference: &str) -> FormulaResult<u32> {
        match self.map_index(index) {
            Some(moved) if moved < self.limit() => Ok(moved),
            _ => Err(FormulaError::ShiftOutOfBounds {
                reference: reference.to_string(),
            }),
        }
    }
}

/// One side of a reference
#[derive(Debug, Clone, Copy, PartialEq)]
enum RefPart {
    Cell(CellAddress),
    Column { col: u16, absolute: bool },
    Row { row: u32, absolute: bool },
}

impl RefPart {
    fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::CellRef(text) => CellAddress::parse(text).ok().map(RefPart::Cell),
            TokenKind::ColumnRef(text) => {
                let (absolute, letters) = strip_dollar(text);
                let col = CellAddress::letters_to_column(letters).ok()?;
                Some(RefPart::Column { col, absolute })
            }
            TokenKind::RowRef(text) => {
                let (absolute, digits) = strip_dollar(text);
                let row: u32 = digits.parse().ok()?;
                (1..=MAX_ROWS)
                    .contains(&row)
                    .then(|| RefPart::Row { row: row - 1, absolute })
            }
            _ => None,
        }
    }

    fn render(&self) -> String {
        match self {
            RefPart::Cell(addr) => addr.to_a1_string(),
            RefPart::Column { col, absolute } => {
                format!("{}{}", dollar(*absolute), CellAddress::column_to_letters(*col))
            }
            RefPart::Row { row, absolute } => format!("{}{}", dollar(*absolute), row + 1),
        }
    }

    /// The index along `axis`, `None` when the part spans the whole axis
    fn coord(&self, axis: Axis) -> Option<u32> {
        match (self, axis) {
            (RefPart::Cell(addr), Axis::Rows) => Some(addr.row),
            (RefPart::Cell(addr), Axis::Columns) => Some(addr.col as u32),
            (RefPart::Row { row, .. }, Axis::Rows) => Some(*row),
            (RefPart::Column { col, .. }, Axis::Columns) => Some(*col as u32),
            _ => None,
        }
    }

    fn with_coord(self, axis: Axis, index: u32) -> Self {
        match (self, axis) {
            (RefPart::Cell(mut addr), Axis::Rows) => {
                addr.row = index;
                RefPart::Cell(addr)
            }
            (RefPart::Cell(mut addr), Axis::Columns) => {
                addr.col = index as u16;
                RefPart::Cell(addr)
            }
            (RefPart::Row { absolute, .. }, Axis::Rows) => RefPart::Row { row: index, absolute },
            (RefPart::Column { absolute, .. }, Axis::Columns) => RefPart::Column {
                col: index as u16,
                absolute,
            },
            (part, _) => part,
        }
    }

    /// Move the relative halves by a row and column delta
    fn offset(self, drow: i64, dcol: i64) -> Option<Self> {
        Some(match self {
            RefPart::Cell(mut addr) => {
                if !addr.row_absolute {
                    addr.row = offset_index(addr.row, drow, MAX_ROWS)?;
                }
                if !addr.col_absolute {
                    addr.col = offset_index(addr.col as u32, dcol, MAX_COLS as u32)? as u16;
                }
                RefPart::Cell(addr)
            }
            RefPart::Column { col, absolute: false } => RefPart::Column {
                col: offset_index(col as u32, dcol, MAX_COLS as u32)? as u16,
                absolute: false,
            },
            RefPart::Row { row, absolute: false } => RefPart::Row {
                row: offset_index(row, drow, MAX_ROWS)?,
                absolute: false,
            },
            absolute => absolute,
        })
    }
}

fn strip_dollar(s: &str) -> (bool, &str) {
    match s.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, s),
    }
}

fn dollar(absolute: bool) -> &'static str {
    if absolute {
        "$"
    } else {
        ""
    }
}

fn offset_index(index: u32, delta: i64, limit: u32) -> Option<u32> {
    let moved = index as i64 + delta;
    (0..limit as i64).contains(&moved).then_some(moved as u32)
}

/// `[Sheet!]part[:part]` as it appears in the token stream
struct RefGroup {
    span: Range<usize>,
    sheet: Option<String>,
    parts: Vec<(RefPart, Range<usize>)>,
}

fn reference_groups(tokens: &[Token]) -> Vec<RefGroup> {
    let part_at = |i: usize| {
        tokens
            .get(i)
            .and_then(|t| RefPart::from_token(&t.kind).map(|p| (p, t.span.clone())))
    };

    let mut groups = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let (sheet, first_at) = match &tokens[i].kind {
            TokenKind::SheetRef(name) => (Some(name.clone()), i + 1),
            _ => (None, i),
        };
        let Some(first) = part_at(first_at) else {
            i += 1;
            continue;
        };

        let start = tokens[i].span.start;
        let mut end = first.1.end;
        let mut parts = vec![first];
        let mut next = first_at + 1;
        if matches!(tokens.get(next).map(|t| &t.kind), Some(TokenKind::Colon)) {
            if let Some(second) = part_at(next + 1) {
                end = second.1.end;
                parts.push(second);
                next += 2;
            }
        }

        groups.push(RefGroup {
            span: start..end,
            sheet,
            parts,
        });
        i = next;
    }
    groups
}

/// How a reference group changes under a structural change
enum Shift {
    Keep,
    Move(Vec<u32>),
    Invalidate,
}

fn shift_group(group: &RefGroup, change: &StructuralChange, text: &str) -> FormulaResult<Shift> {
    let coords: Option<Vec<u32>> = group.parts.iter().map(|(p, _)| p.coord(change.axis)).collect();
    let Some(coords) = coords else {
        // D:D under a row change, 3:3 under a column change
        return Ok(Shift::Keep);
    };
    let reference = &text[group.span.clone()];

    match (change.kind, coords.as_slice()) {
        (ChangeKind::Insert, [single]) => Ok(Shift::Move(vec![change.inserted(*single, reference)?])),
        (ChangeKind::Insert, [first, last]) => {
            let (lo, hi) = ((*first).min(*last), (*first).max(*last));
            let lo_moved = change.inserted(lo, reference)?;
            // The far edge of a range stops at the sheet edge
            let hi_moved = change
                .map_index(hi)
                .map_or(hi, |moved| moved.min(change.limit() - 1));
            Ok(Shift::Move(orient(*first <= *last, lo_moved, hi_moved)))
        }
        (ChangeKind::Remove, [single]) => Ok(match change.map_index(*single) {
            Some(moved) => Shift::Move(vec![moved]),
            None => Shift::Invalidate,
        }),
        (ChangeKind::Remove, [first, last]) => {
            let (lo, hi) = ((*first).min(*last), (*first).max(*last));
            let (at, end) = (change.at, change.end());
            if lo >= at && hi < end {
                return Ok(Shift::Invalidate);
            }
            let lo_moved = match change.map_index(lo) {
                Some(moved) => moved,
                None => at,
            };
            let hi_moved = match change.map_index(hi) {
                Some(moved) => moved,
                None => at - 1,
            };
            Ok(Shift::Move(orient(*first <= *last, lo_moved, hi_moved)))
        }
        _ => Ok(Shift::Keep),
    }
}

fn orient(ascending: bool, lo: u32, hi: u32) -> Vec<u32> {
    if ascending {
        vec![lo, hi]
    } else {
        vec![hi, lo]
    }
}

fn apply_edits(text: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(text.len() + 8);
    let mut copied = 0;
    for (span, replacement) in edits {
        out.push_str(&text[copied..span.start]);
        out.push_str(&replacement);
        copied = span.end;
    }
    out.push_str(&text[copied..]);
    out
}

/// Rewrite the references of a formula hosted on `host_sheet` for a structural change
///
/// Returns `Ok(None)` when the text does not change. Only references that
/// target the changed sheet are touched; a reference whose cells were all
/// removed becomes `#REF!`. Formulas that do not tokenize are left alone.
pub fn rewrite_for_change(
    text: &str,
    host_sheet: usize,
    change: &StructuralChange,
    workbook: &Workbook,
) -> FormulaResult<Option<String>> {
    let Ok(tokens) = tokenize(text) else {
        log::debug!("leaving unparsable formula {:?} as written", text);
        return Ok(None);
    };

    let mut edits = Vec::new();
    for group in reference_groups(&tokens) {
        let target = match &group.sheet {
            Some(name) => workbook.sheet_index(name),
            None => Some(host_sheet),
        };
        if target != Some(change.sheet) {
            continue;
        }

        match shift_group(&group, change, text)? {
            Shift::Keep => {}
            Shift::Invalidate => edits.push((group.span.clone(), "#REF!".to_string())),
            Shift::Move(coords) => {
                for ((part, span), coord) in group.parts.iter().zip(coords) {
                    let moved = part.with_coord(change.axis, coord);
                    if moved != *part {
                        edits.push((span.clone(), moved.render()));
                    }
                }
            }
        }
    }

    Ok((!edits.is_empty()).then(|| apply_edits(text, edits)))
}

/// Point every sheet qualifier that resolves to `sheet` at `new_name`
///
/// Must run before the workbook itself is renamed. Returns `None` when the
/// formula does not name the sheet.
pub fn rename_sheet_in_formula(
    text: &str,
    sheet: usize,
    new_name: &str,
    workbook: &Workbook,
) -> Option<String> {
    let tokens = tokenize(text).ok()?;
    let edits: Vec<_> = tokens
        .iter()
        .filter_map(|token| match &token.kind {
            TokenKind::SheetRef(name) if workbook.sheet_index(name) == Some(sheet) => {
                Some((token.span.clone(), sheet_prefix(new_name)))
            }
            _ => None,
        })
        .collect();
    (!edits.is_empty()).then(|| apply_edits(text, edits))
}

/// The `Sheet!` qualifier for a name, quoted when the name needs it
pub fn sheet_prefix(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .map_or(false, |c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !is_cell_reference(name);
    if plain {
        format!("{}!", name)
    } else {
        format!("'{}'!", name.replace('\'', "''"))
    }
}

/// Move the relative parts of every reference by `(drow, dcol)`
///
/// Used to expand shared formulas, which store one master formula for a
/// block of cells. Absolute (`$`) parts stay put.
pub fn offset_references(text: &str, drow: i64, dcol: i64) -> FormulaResult<String> {
    let tokens = tokenize(text)?;
    let mut edits = Vec::new();
    for token in &tokens {
        let Some(part) = RefPart::from_token(&token.kind) else {
            continue;
        };
        let moved = part
            .offset(drow, dcol)
            .ok_or_else(|| FormulaError::ShiftOutOfBounds {
                reference: text[token.span.clone()].to_string(),
            })?;
        if moved != part {
            edits.push((token.span.clone(), moved.render()));
        }
    }
    Ok(apply_edits(text, edits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        for name in ["Unit", "Global"] {
            wb.add_worksheet_with_name(name).unwrap();
        }
        wb
    }

    fn rewrite(text: &str, host: usize, change: StructuralChange) -> Option<String> {
        rewrite_for_change(text, host, &change, &workbook()).unwrap()
    }

    #[test]
    fn test_insert_row_shifts_references_below() {
        let insert = StructuralChange::insert_rows(0, 2, 1);
        // Row 1 is above the insertion point
        assert_eq!(rewrite("=A1*2", 0, insert), None);
        assert_eq!(rewrite("=A4*2", 0, insert), Some("=A5*2".into()));
        assert_eq!(rewrite("=$B$10+B$3", 0, insert), Some("=$B$11+B$4".into()));
        assert_eq!(rewrite("=SUM(A1:A3)", 0, insert), Some("=SUM(A1:A4)".into()));
    }

    #[test]
    fn test_only_the_changed_sheet_is_rewritten() {
        let insert = StructuralChange::insert_rows(0, 0, 2);
        assert_eq!(rewrite("=A1", 1, insert), None);
        assert_eq!(rewrite("=Unit!A1+A1", 1, insert), Some("=Unit!A3+A1".into()));
        assert_eq!(rewrite("='Unit'!A1", 1, insert), Some("='Unit'!A3".into()));
        assert_eq!(rewrite("=Global!A1", 0, insert), None);
    }

    #[test]
    fn test_whole_column_and_row_references() {
        let rows = StructuralChange::insert_rows(0, 0, 1);
        assert_eq!(rewrite("=SUM(Unit!D:D)", 1, rows), None);
        assert_eq!(rewrite("=SUM(2:$4)", 0, rows), Some("=SUM(3:$5)".into()));

        let cols = StructuralChange::insert_columns(0, 2, 1);
        assert_eq!(rewrite("=SUM(Unit!D:D)", 1, cols), Some("=SUM(Unit!E:E)".into()));
        assert_eq!(rewrite("=SUM(2:4)", 0, cols), None);
    }

    #[test]
    fn test_remove_rows_invalidates_and_shrinks() {
        let remove = StructuralChange::remove_rows(0, 2, 2); // rows 3 and 4
        assert_eq!(rewrite("=A3+A5", 0, remove), Some("=#REF!+A3".into()));
        assert_eq!(rewrite("=Unit!A4*2", 1, remove), Some("=#REF!*2".into()));
        assert_eq!(rewrite("=SUM(A2:A6)", 0, remove), Some("=SUM(A2:A4)".into()));
        assert_eq!(rewrite("=SUM(A3:A6)", 0, remove), Some("=SUM(A3:A4)".into()));
        assert_eq!(rewrite("=SUM(A1:A4)", 0, remove), Some("=SUM(A1:A2)".into()));
        assert_eq!(rewrite("=SUM(A3:B4)", 0, remove), Some("=SUM(#REF!)".into()));
        assert_eq!(rewrite("=A1+A2", 0, remove), None);
    }

    #[test]
    fn test_remove_columns() {
        let remove = StructuralChange::remove_columns(0, 1, 1); // column B
        assert_eq!(rewrite("=A1+C1", 0, remove), Some("=A1+B1".into()));
        assert_eq!(rewrite("=B1", 0, remove), Some("=#REF!".into()));
        assert_eq!(rewrite("=SUM(B:D)", 0, remove), Some("=SUM(B:C)".into()));
    }

    #[test]
    fn test_text_outside_references_is_kept() {
        let insert = StructuralChange::insert_rows(0, 0, 1);
        assert_eq!(
            rewrite("= sum( A1 , \"A1\" )", 0, insert),
            Some("= sum( A2 , \"A1\" )".into())
        );
    }

    #[test]
    fn test_insert_past_sheet_edge_fails() {
        let insert = StructuralChange::insert_rows(0, 0, 1);
        let result = rewrite_for_change("=A1048576", 0, &insert, &workbook());
        assert!(matches!(result, Err(FormulaError::ShiftOutOfBounds { .. })));
        // Range ends stop at the edge instead
        assert_eq!(rewrite("=SUM(1:1048576)", 0, insert), Some("=SUM(2:1048576)".into()));
    }

    #[test]
    fn test_map_position() {
        let remove = StructuralChange::remove_rows(0, 2, 2);
        assert_eq!(remove.map_position(CellKey::new(0, 1, 0)), Some(CellKey::new(0, 1, 0)));
        assert_eq!(remove.map_position(CellKey::new(0, 3, 0)), None);
        assert_eq!(remove.map_position(CellKey::new(0, 4, 5)), Some(CellKey::new(0, 2, 5)));
        assert_eq!(remove.map_position(CellKey::new(1, 3, 0)), Some(CellKey::new(1, 3, 0)));

        let insert = StructuralChange::insert_columns(0, 0, 3);
        assert_eq!(insert.map_position(CellKey::new(0, 0, 0)), Some(CellKey::new(0, 0, 3)));
    }

    #[test]
    fn test_rename_sheet() {
        let wb = workbook();
        assert_eq!(
            rename_sheet_in_formula("=Global!B1+global!B2+Unit!A1", 1, "My Sheet", &wb),
            Some("='My Sheet'!B1+'My Sheet'!B2+Unit!A1".into())
        );
        assert_eq!(rename_sheet_in_formula("=A1", 1, "X", &wb), None);
        assert_eq!(sheet_prefix("O'Brien"), "'O''Brien'!");
        assert_eq!(sheet_prefix("A1"), "'A1'!");
        assert_eq!(sheet_prefix("Totals_2024"), "Totals_2024!");
    }

    #[test]
    fn test_offset_references() {
        assert_eq!(
            offset_references("=B1*C1*Global!$B$1", 2, 0).unwrap(),
            "=B3*C3*Global!$B$1"
        );
        assert_eq!(offset_references("=$A1+B$1", 1, 1).unwrap(), "=$A2+C$1");
        assert!(offset_references("=A1", -1, 0).is_err());
    }
}
