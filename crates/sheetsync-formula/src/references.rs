//! Reference extraction
//!
//! Resolves the cell and range references of a parsed formula to sheet
//! indices, producing the edges the dependency graph records.

use std::collections::BTreeSet;

use crate::ast::FormulaExpr;
use crate::dependency::RangeKey;
use sheetsync_core::{CellKey, Workbook};

/// Everything a formula reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    /// Single-cell references
    pub cells: BTreeSet<CellKey>,
    /// Range references, including whole columns and rows
    pub ranges: BTreeSet<RangeKey>,
    /// Some reference names a sheet that does not exist
    pub invalid: bool,
    /// Some reference carries a sheet qualifier
    pub qualified: bool,
}

impl References {
    /// Whether the formula reads nothing
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.ranges.is_empty()
    }

    /// Whether `key` is read directly or through a range
    pub fn reads(&self, key: CellKey) -> bool {
        self.cells.contains(&key) || self.ranges.iter().any(|r| r.contains(key))
    }
}

/// Collect the references of `expr`, resolving unqualified ones to `host_sheet`
///
/// Sheet names resolve through [`Workbook::sheet_index`]; a name that does
/// not resolve sets [`References::invalid`] and contributes no edge.
/// Any sheet qualifier sets [`References::qualified`], since which sheet a
/// name resolves to can change as sheets are added or renamed.
pub fn extract_references(expr: &FormulaExpr, host_sheet: usize, workbook: &Workbook) -> References {
    let mut refs = References::default();
    let resolve = |sheet: &Option<String>| match sheet {
        Some(name) => workbook.sheet_index(name),
        None => Some(host_sheet),
    };

    expr.walk(&mut |node| {
        let sheet = match node {
            FormulaExpr::CellRef(r) => &r.sheet,
            FormulaExpr::RangeRef(r) => &r.sheet,
            _ => return,
        };
        refs.qualified |= sheet.is_some();
        match (node, resolve(sheet)) {
            (FormulaExpr::CellRef(r), Some(sheet)) => {
                refs.cells.insert(CellKey::from_address(sheet, &r.address));
            }
            (FormulaExpr::RangeRef(r), Some(sheet)) => {
                refs.ranges.insert(RangeKey::new(sheet, &r.range));
            }
            _ => refs.invalid = true,
        }
    });

    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;
    use sheetsync_core::{CellRange, MAX_ROWS};

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        for name in ["Global", "Unit", "Common"] {
            wb.add_worksheet_with_name(name).unwrap();
        }
        wb
    }

    #[test]
    fn test_extract_cross_sheet_references() {
        let wb = workbook();
        let expr = parse_formula("=B1*C1*Global!$B$1").unwrap();
        let refs = extract_references(&expr, 2, &wb);

        assert_eq!(
            refs.cells.into_iter().collect::<Vec<_>>(),
            vec![
                CellKey::new(0, 0, 1),
                CellKey::new(2, 0, 1),
                CellKey::new(2, 0, 2)
            ]
        );
        assert!(!refs.invalid);
        assert!(refs.qualified);
    }

    #[test]
    fn test_host_sheet_references_are_unqualified() {
        let wb = workbook();
        let expr = parse_formula("=SUM(A1:A4)*B1").unwrap();
        let refs = extract_references(&expr, 1, &wb);

        assert!(!refs.qualified);
        assert!(refs.reads(CellKey::new(1, 3, 0)));
    }

    #[test]
    fn test_case_insensitive_sheet_binding() {
        let mut wb = workbook();
        let expr = parse_formula("=common!A1").unwrap();
        assert!(extract_references(&expr, 0, &wb).reads(CellKey::new(2, 0, 0)));

        // an exact spelling added later takes the name over
        let exact = wb.add_worksheet_with_name("common").unwrap();
        let refs = extract_references(&expr, 0, &wb);
        assert!(refs.reads(CellKey::new(exact, 0, 0)));
        assert!(!refs.reads(CellKey::new(2, 0, 0)));
    }

    #[test]
    fn test_whole_column_is_one_range() {
        let wb = workbook();
        let expr = parse_formula("=SUM(Unit!D:D)+SUM(Common!D:D)").unwrap();
        let refs = extract_references(&expr, 0, &wb);

        assert!(refs.cells.is_empty());
        assert_eq!(refs.ranges.len(), 2);
        assert!(refs.reads(CellKey::new(1, MAX_ROWS - 1, 3)));
        assert!(!refs.reads(CellKey::new(1, 0, 2)));
        assert!(refs
            .ranges
            .contains(&RangeKey::new(2, &CellRange::whole_columns(3, 3))));
    }

    #[test]
    fn test_unknown_sheet_is_invalid() {
        let wb = workbook();
        let expr = parse_formula("=Missing!A1+A2").unwrap();
        let refs = extract_references(&expr, 1, &wb);

        assert!(refs.invalid);
        assert_eq!(refs.cells.len(), 1);
    }
}
