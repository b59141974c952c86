//! Applying edits one by one or in a single batch ends in the same state

use proptest::prelude::*;
use sheetsync::prelude::*;

const ROWS: u32 = 4;
const COLS: u16 = 3;

fn input() -> impl Strategy<Value = String> {
    prop_oneof![
        (0..20i32).prop_map(|n| n.to_string()),
        Just(String::new()),
        Just("text".to_string()),
        Just("=A1+1".to_string()),
        Just("=B2*2".to_string()),
        Just("=SUM(A1:C2)".to_string()),
        Just("=SUM(A:A)".to_string()),
        Just("=C1+A2".to_string()),
        Just("=B1".to_string()),
        Just("=1/0".to_string()),
    ]
}

fn edits() -> impl Strategy<Value = Vec<GridEdit>> {
    prop::collection::vec(
        (0..ROWS, 0..COLS, input()).prop_map(|(row, col, input)| GridEdit::new(row, col, input)),
        1..40,
    )
}

fn fresh() -> Session {
    let mut session = Session::new();
    session.add_sheet("S").unwrap();
    session
}

fn values(session: &Session) -> Vec<Option<CellValue>> {
    (0..ROWS)
        .flat_map(|row| (0..COLS).map(move |col| CellKey::new(0, row, col)))
        .map(|key| session.get_value(key).ok())
        .collect()
}

proptest! {
    #[test]
    fn batched_and_unbatched_edits_agree(edits in edits()) {
        let mut one_by_one = fresh();
        for edit in &edits {
            one_by_one.apply_grid_edit(0, edit).unwrap();
        }

        let mut batched = fresh();
        batched.apply_grid_edits(0, edits.clone()).unwrap();

        prop_assert_eq!(one_by_one.snapshot(), batched.snapshot());
        prop_assert_eq!(values(&one_by_one), values(&batched));
    }
}
