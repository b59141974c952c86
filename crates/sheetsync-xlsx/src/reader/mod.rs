//! XLSX reader

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::decode_excel_escapes;
use sheetsync_core::{CellAddress, CellError, SheetSnapshot, SnapshotCell, WorkbookSnapshot};
use sheetsync_formula::offset_references;

/// XLSX file reader
pub struct XlsxReader;

/// Master of a shared formula block: text with `=`, anchored at `(row, col)`
struct SharedFormula {
    text: String,
    row: u32,
    col: u16,
}

/// The `<c>` element being read
#[derive(Default)]
struct PendingCell {
    address: Option<CellAddress>,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<String>,
    shared_index: Option<String>,
    inline_text: Option<String>,
}

/// Where character data currently goes
#[derive(Clone, Copy, PartialEq)]
enum TextTarget {
    None,
    Value,
    Formula,
    InlineString,
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.to_string()))
}

impl XlsxReader {
    /// Read a workbook snapshot from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<WorkbookSnapshot> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Read a workbook snapshot from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<WorkbookSnapshot> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX file
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let sheet_info = Self::read_workbook_xml(&mut archive)?;
        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let mut snapshot = WorkbookSnapshot::new();
        for (name, r_id) in sheet_info {
            let Some(path) = sheet_paths.get(&r_id) else {
                log::warn!("sheet '{}' has no worksheet part ({}), skipping", name, r_id);
                continue;
            };
            let cells = Self::read_worksheet(&mut archive, path, &shared_strings)?;
            log::debug!("read {} cells from sheet '{}'", cells.len(), name);
            snapshot.sheets.push(SheetSnapshot::from_cells(name, cells));
        }

        Ok(snapshot)
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        let mut buf = Vec::new();
        let mut current = String::new();
        let mut in_si = false;
        let mut in_t = false;
        // Phonetic runs repeat the text in another script
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Event::Empty(e) if e.name().as_ref() == b"si" => strings.push(String::new()),
                Event::End(e) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current));
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Event::Text(e) if in_t => current.push_str(&e.unescape()?),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml to get sheet names and rIds
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<(String, String)>> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"sheet" => {
                    if let (Some(name), Some(r_id)) = (attr_value(&e, b"name"), attr_value(&e, b"r:id")) {
                        sheets.push((name, r_id));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }

    /// Read workbook.xml.rels to get worksheet part paths by rId
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"Relationship" => {
                    let id = attr_value(&e, b"Id");
                    let target = attr_value(&e, b"Target");
                    let rel_type = attr_value(&e, b"Type");

                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to the xl/ folder unless absolute
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Read the cells of one worksheet part
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        shared_strings: &[String],
    ) -> XlsxResult<Vec<(u32, u16, SnapshotCell)>> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        // Whitespace inside <t> and <f> is significant, so text is not trimmed
        let mut xml_reader = Reader::from_reader(BufReader::new(file));
        let mut buf = Vec::new();

        let mut cells = Vec::new();
        let mut shared_formulas: HashMap<String, SharedFormula> = HashMap::new();
        let mut cell: Option<PendingCell> = None;
        let mut target = TextTarget::None;
        let mut in_inline_str = false;
        // Position of the next cell when `r` attributes are omitted
        let mut row_index: u32 = 0;
        let mut next_col: u16 = 0;

        loop {
            match xml_reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.name().as_ref() {
                    b"row" => {
                        if let Some(r) = attr_value(&e, b"r").and_then(|r| r.parse::<u32>().ok()) {
                            row_index = r.saturating_sub(1);
                        }
                        next_col = 0;
                    }
                    b"c" => {
                        cell = Some(Self::start_cell(&e, row_index, next_col)?);
                    }
                    b"v" if cell.is_some() => target = TextTarget::Value,
                    b"f" => {
                        if let Some(c) = cell.as_mut() {
                            c.shared_index = Self::shared_index(&e);
                            c.formula = Some(String::new());
                            if let (Some(si), Some(range)) = (&c.shared_index, attr_value(&e, b"ref")) {
                                log::trace!("shared formula {} covers {}", si, range);
                            }
                            target = TextTarget::Formula;
                        }
                    }
                    b"is" => in_inline_str = true,
                    b"t" if in_inline_str => target = TextTarget::InlineString,
                    _ => {}
                },
                Event::Empty(e) => match e.name().as_ref() {
                    // A styled but empty cell still takes up a column
                    b"c" => {
                        let empty = Self::start_cell(&e, row_index, next_col)?;
                        if let Some(addr) = empty.address {
                            next_col = addr.col.saturating_add(1);
                        }
                    }
                    // A shared formula child: only the group index, no text
                    b"f" => {
                        if let Some(c) = cell.as_mut() {
                            c.shared_index = Self::shared_index(&e);
                        }
                    }
                    _ => {}
                },
                Event::Text(e) => {
                    let text = e.unescape()?;
                    if let Some(c) = cell.as_mut() {
                        match target {
                            TextTarget::Value => c.value.get_or_insert_with(String::new).push_str(&text),
                            TextTarget::Formula => c.formula.get_or_insert_with(String::new).push_str(&text),
                            TextTarget::InlineString => c
                                .inline_text
                                .get_or_insert_with(String::new)
                                .push_str(&text),
                            TextTarget::None => {}
                        }
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"c" => {
                        if let Some(done) = cell.take() {
                            if let Some(addr) = done.address {
                                next_col = addr.col.saturating_add(1);
                            }
                            if let Some(entry) =
                                Self::finish_cell(done, shared_strings, &mut shared_formulas)?
                            {
                                cells.push(entry);
                            }
                        }
                    }
                    b"v" | b"f" => target = TextTarget::None,
                    b"t" if in_inline_str => target = TextTarget::None,
                    b"is" => in_inline_str = false,
                    b"row" => row_index = row_index.saturating_add(1),
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(cells)
    }

    fn start_cell(e: &BytesStart, row: u32, col: u16) -> XlsxResult<PendingCell> {
        let address = match attr_value(e, b"r") {
            Some(r) => CellAddress::parse(&r).map_err(|err| {
                XlsxError::Parse(format!("Invalid cell reference '{}': {}", r, err))
            })?,
            None => CellAddress::new(row, col),
        };
        Ok(PendingCell {
            address: Some(address),
            cell_type: attr_value(e, b"t"),
            ..Default::default()
        })
    }

    fn shared_index(e: &BytesStart) -> Option<String> {
        match attr_value(e, b"t").as_deref() {
            Some("shared") => attr_value(e, b"si"),
            _ => None,
        }
    }

    /// Turn a finished `<c>` into a snapshot entry
    ///
    /// Formulas win over the cached `<v>` value, which is ignored.
    fn finish_cell(
        cell: PendingCell,
        shared_strings: &[String],
        shared_formulas: &mut HashMap<String, SharedFormula>,
    ) -> XlsxResult<Option<(u32, u16, SnapshotCell)>> {
        let Some(addr) = cell.address else {
            return Ok(None);
        };

        let formula = cell.formula.filter(|f| !f.trim().is_empty());
        let formula = match (formula, cell.shared_index) {
            (Some(text), Some(si)) => {
                let text = with_marker(&text);
                shared_formulas.insert(
                    si,
                    SharedFormula {
                        text: text.clone(),
                        row: addr.row,
                        col: addr.col,
                    },
                );
                Some(text)
            }
            (Some(text), None) => Some(with_marker(&text)),
            (None, Some(si)) => match shared_formulas.get(&si) {
                Some(master) => Some(
                    offset_references(
                        &master.text,
                        addr.row as i64 - master.row as i64,
                        addr.col as i64 - master.col as i64,
                    )
                    .map_err(|e| {
                        XlsxError::Parse(format!("Shared formula at {}: {}", addr, e))
                    })?,
                ),
                None => {
                    log::warn!("cell {} uses unknown shared formula {}", addr, si);
                    None
                }
            },
            (None, None) => None,
        };
        if let Some(text) = formula {
            return Ok(Some((addr.row, addr.col, SnapshotCell::Formula(text))));
        }

        let entry = match (cell.cell_type.as_deref(), cell.value, cell.inline_text) {
            (Some("inlineStr"), _, Some(text)) => SnapshotCell::Text(decode_excel_escapes(&text)),
            (_, None, _) => return Ok(None),
            (Some("s"), Some(value), _) => {
                let idx: usize = value.trim().parse().map_err(|_| {
                    XlsxError::Parse(format!("Invalid shared string index: {}", value))
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
                })?;
                SnapshotCell::Text(s.clone())
            }
            (Some("b"), Some(value), _) => {
                let value = value.trim();
                SnapshotCell::Boolean(value == "1" || value.eq_ignore_ascii_case("true"))
            }
            (Some("e"), Some(value), _) => match CellError::from_str(value.trim()) {
                Some(e) => SnapshotCell::Error(e),
                None => SnapshotCell::Text(value),
            },
            (Some("str") | Some("inlineStr"), Some(value), _) => {
                SnapshotCell::Text(decode_excel_escapes(&value))
            }
            (None | Some("n"), Some(value), _) => match value.trim().parse::<f64>() {
                Ok(n) => SnapshotCell::Number(n),
                Err(_) => SnapshotCell::Text(value),
            },
            (Some(other), Some(value), _) => {
                log::warn!("cell {} has unknown type '{}', reading as text", addr, other);
                SnapshotCell::Text(value)
            }
        };

        Ok(Some((addr.row, addr.col, entry)))
    }
}

fn with_marker(formula: &str) -> String {
    if formula.starts_with('=') {
        formula.to_string()
    } else {
        format!("={}", formula)
    }
}
