//! Formulas evaluated and rewritten against a multi-sheet workbook

use pretty_assertions::assert_eq;
use sheetsync_core::{CellKey, CellValue, Workbook};
use sheetsync_formula::{
    evaluate, extract_references, parse_formula, rename_sheet_in_formula, rewrite_for_change,
    DependencyGraph, EvaluationContext, FormulaValue, StructuralChange,
};

fn workbook() -> Workbook {
    let mut wb = Workbook::new();
    let global = wb.add_worksheet_with_name("Global").unwrap();
    let unit = wb.add_worksheet_with_name("Unit").unwrap();
    let common = wb.add_worksheet_with_name("Common Items").unwrap();
    wb.set_cell(CellKey::new(global, 0, 1), CellValue::Number(10.0)).unwrap();
    for (row, qty) in [(0, 3.0), (1, 2.0)] {
        wb.set_cell(CellKey::new(unit, row, 1), CellValue::Number(20.0)).unwrap();
        wb.set_cell(CellKey::new(unit, row, 2), CellValue::Number(qty)).unwrap();
        wb.set_cell(CellKey::new(unit, row, 3), CellValue::Number(20.0 * qty)).unwrap();
    }
    wb.set_cell(CellKey::new(common, 0, 3), CellValue::Number(200.0)).unwrap();
    wb
}

fn eval(wb: &Workbook, host: CellKey, text: &str) -> FormulaValue {
    let ast = parse_formula(text).unwrap();
    evaluate(&ast, &EvaluationContext::new(wb, host)).unwrap()
}

#[test]
fn test_cross_sheet_totals() {
    let wb = workbook();
    let host = CellKey::new(0, 1, 1);
    assert_eq!(
        eval(&wb, host, "=SUM(Unit!D:D)+SUM('Common Items'!D:D)"),
        FormulaValue::Number(300.0)
    );
    assert_eq!(
        eval(&wb, host, "=ROUND(AVERAGE(Unit!C1:C2)*Global!$B$1,0)"),
        FormulaValue::Number(25.0)
    );
    assert_eq!(
        eval(&wb, host, "=CONCATENATE(\"n=\",COUNT(Unit!A:D))"),
        FormulaValue::String("n=6".into())
    );
}

#[test]
fn test_graph_from_extracted_references() {
    let wb = workbook();
    let total = CellKey::new(0, 1, 1);
    let ast = parse_formula("=SUM(Unit!D:D)*Global!B1").unwrap();

    let mut graph = DependencyGraph::new();
    graph.update_dependencies(total, extract_references(&ast, 0, &wb));
    graph.take_dirty();

    assert!(graph.dependents_of(CellKey::new(1, 500, 3)).contains(&total));
    assert!(graph.dependents_of(CellKey::new(0, 0, 1)).contains(&total));
    assert!(graph.dependents_of(CellKey::new(1, 0, 2)).is_empty());
}

#[test]
fn test_rewrites_compose() {
    let wb = workbook();
    let text = "=Unit!D2+SUM(Unit!D1:D9)+'Common Items'!A1";

    let inserted = rewrite_for_change(text, 0, &StructuralChange::insert_rows(1, 1, 1), &wb)
        .unwrap()
        .unwrap();
    assert_eq!(inserted, "=Unit!D3+SUM(Unit!D1:D10)+'Common Items'!A1");

    let removed = rewrite_for_change(&inserted, 0, &StructuralChange::remove_columns(1, 3, 1), &wb)
        .unwrap()
        .unwrap();
    assert_eq!(removed, "=#REF!+SUM(#REF!)+'Common Items'!A1");

    let renamed = rename_sheet_in_formula(&removed, 2, "Shared", &wb).unwrap();
    assert_eq!(renamed, "=#REF!+SUM(#REF!)+Shared!A1");
}
