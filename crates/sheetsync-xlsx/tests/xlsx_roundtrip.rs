//! Round trips through the xlsx codec

use std::io::{Cursor, Read};

use pretty_assertions::assert_eq;
use sheetsync_core::{CellError, SheetSnapshot, SnapshotCell, WorkbookCodec, WorkbookSnapshot};
use sheetsync_xlsx::{XlsxCodec, XlsxError, XlsxReader, XlsxWriter};

fn workbook() -> WorkbookSnapshot {
    WorkbookSnapshot {
        sheets: vec![
            SheetSnapshot::from_exchange_strings(
                "Global",
                &[
                    vec!["entitlement", "10"],
                    vec!["total", "=SUM(Unit!D:D)+SUM('Common <Items>'!D:D)"],
                ],
            ),
            SheetSnapshot::from_exchange_strings(
                "Unit",
                &[vec!["a \"quoted\" <name>", "20", "3", "=B1*C1"]],
            ),
            SheetSnapshot::from_cells(
                "Common <Items>",
                vec![
                    (5, 2, SnapshotCell::Text(" lead and trail ".into())),
                    (5, 3, SnapshotCell::Formula("=IF(TRUE,\"a&b\",\"\")".into())),
                    (7, 0, SnapshotCell::Boolean(false)),
                    (7, 1, SnapshotCell::Error(CellError::Div0)),
                    (8, 1, SnapshotCell::Number(-0.125)),
                ],
            ),
        ],
    }
}

#[test]
fn test_codec_round_trip() {
    let bytes = XlsxCodec.encode(&workbook()).unwrap();
    assert_eq!(XlsxCodec.decode(&bytes).unwrap(), workbook());
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");
    XlsxWriter::write_file(&workbook(), &path).unwrap();
    assert_eq!(XlsxReader::read_file(&path).unwrap(), workbook());
}

#[test]
fn test_package_layout() {
    let mut buf = Cursor::new(Vec::new());
    XlsxWriter::write(&workbook(), &mut buf).unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(buf.into_inner())).unwrap();
    for part in [
        "[Content_Types].xml",
        "_rels/.rels",
        "xl/workbook.xml",
        "xl/_rels/workbook.xml.rels",
        "xl/worksheets/sheet3.xml",
    ] {
        assert!(archive.by_name(part).is_ok(), "missing {}", part);
    }

    let mut sheet = String::new();
    archive
        .by_name("xl/worksheets/sheet2.xml")
        .unwrap()
        .read_to_string(&mut sheet)
        .unwrap();
    assert!(sheet.contains("<f>B1*C1</f>"));
    assert!(!sheet.contains("<f>="));
}

#[test]
fn test_empty_workbook_is_rejected() {
    let err = XlsxCodec.encode(&WorkbookSnapshot::new()).unwrap_err();
    assert!(matches!(err, XlsxError::InvalidFormat(_)));
}
