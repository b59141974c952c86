//! End-to-end entitlement scenario across three sheets

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use sheetsync::prelude::*;

fn scenario_snapshot() -> WorkbookSnapshot {
    WorkbookSnapshot {
        sheets: vec![
            SheetSnapshot::from_exchange_strings(
                "Global",
                &[
                    vec!["entitlement", "10"],
                    vec!["total", "=SUM(Unit!D:D)+SUM(Common!D:D)"],
                ],
            ),
            SheetSnapshot::from_exchange_strings("Unit", &[vec!["Widget", "20", "3", "=B1*C1"]]),
            SheetSnapshot::from_exchange_strings(
                "Common",
                &[vec!["Shared", "5", "4", "=B1*C1*Global!$B$1"]],
            ),
        ],
    }
}

const ENTITLEMENT: CellKey = CellKey { sheet: 0, row: 0, col: 1 };
const TOTAL: CellKey = CellKey { sheet: 0, row: 1, col: 1 };
const COMMON_LINE: CellKey = CellKey { sheet: 2, row: 0, col: 3 };

#[test]
fn test_import_computes_total() {
    let session = Session::import(scenario_snapshot()).unwrap();
    assert_eq!(session.get_value(TOTAL).unwrap(), CellValue::Number(260.0));
    assert_eq!(session.get_value(COMMON_LINE).unwrap(), CellValue::Number(200.0));
}

#[test]
fn test_entitlement_change_updates_total_in_one_flush() {
    let mut session = Session::import(scenario_snapshot()).unwrap();
    let received = Rc::new(RefCell::new(Vec::new()));
    {
        let received = Rc::clone(&received);
        session.subscribe(move |changes| received.borrow_mut().push(changes.clone()));
    }

    session.set_cell_input(ENTITLEMENT, "20").unwrap();

    let received = received.borrow();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].entries(),
        &[
            (ENTITLEMENT, CellValue::Number(20.0)),
            (TOTAL, CellValue::Number(460.0)),
            (COMMON_LINE, CellValue::Number(400.0)),
        ]
    );
    assert_eq!(session.get_value(TOTAL).unwrap(), CellValue::Number(460.0));
}

#[test]
fn test_adding_unit_rows_feeds_total() {
    let mut session = Session::import(scenario_snapshot()).unwrap();
    let unit = session.sheet_index("Unit").unwrap();

    session
        .apply_grid_edits(
            unit,
            (1..=3u32).flat_map(|row| {
                vec![
                    GridEdit::new(row, 1, "1"),
                    GridEdit::new(row, 2, "2"),
                    GridEdit::new(row, 3, format!("=B{0}*C{0}", row + 1)),
                ]
            }),
        )
        .unwrap();

    assert_eq!(session.get_value(TOTAL).unwrap(), CellValue::Number(266.0));
}

#[test]
fn test_export_returns_formula_text() {
    let mut session = Session::import(scenario_snapshot()).unwrap();
    session.set_cell_input(ENTITLEMENT, "20").unwrap();

    let exported = session.snapshot();
    let global = exported.sheet("Global").unwrap();
    assert_eq!(
        global.cell(1, 1),
        &SnapshotCell::Formula("=SUM(Unit!D:D)+SUM(Common!D:D)".into())
    );
    assert_eq!(global.cell(0, 1), &SnapshotCell::Number(20.0));
    assert_eq!(
        global.to_exchange_strings(),
        vec![
            vec!["entitlement".to_string(), "20".to_string()],
            vec!["total".to_string(), "=SUM(Unit!D:D)+SUM(Common!D:D)".to_string()],
        ]
    );
}
