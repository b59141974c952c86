//! Import/export between sessions and workbook snapshots
//!
//! Import builds a fresh session: every sheet is added first so cross-sheet
//! references resolve, then every non-empty entry is loaded inside one batch.
//! Export walks each sheet's bounding box and emits formula text, never the
//! calculated value.

use sheetsync_core::{
    CellKey, SheetSnapshot, SnapshotCell, WorkbookCodec, WorkbookSnapshot,
};

use crate::error::{Error, Result};
use crate::options::SessionOptions;
use crate::session::Session;

impl Session {
    /// Build a session from a snapshot with default options
    pub fn import(snapshot: WorkbookSnapshot) -> Result<Session> {
        Self::import_with_options(snapshot, SessionOptions::default())
    }

    /// Build a session from a snapshot
    pub fn import_with_options(snapshot: WorkbookSnapshot, options: SessionOptions) -> Result<Session> {
        let recalculate = options.recalculate_on_import;
        let mut session = Session::with_options(options);
        session.begin_batch();

        for sheet in &snapshot.sheets {
            session.add_sheet(&sheet.name)?;
        }

        let mut loaded = 0usize;
        for (index, sheet) in snapshot.sheets.into_iter().enumerate() {
            for entry in sheet.iter_cells() {
                let placed = entry.map_err(Error::Core).and_then(|(row, col, cell)| {
                    session.set_cell(CellKey::new(index, row, col), cell.clone().into_cell_value())
                });
                match placed {
                    Ok(()) => loaded += 1,
                    Err(Error::Core(
                        e @ (sheetsync_core::Error::RowOutOfBounds(..)
                        | sheetsync_core::Error::ColumnOutOfBounds(..)),
                    )) => {
                        log::warn!("skipping cell on sheet '{}': {}", sheet.name, e);
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        log::debug!(
            "imported {} cells across {} sheets",
            loaded,
            session.sheet_count()
        );

        if recalculate {
            session.end_batch();
        } else {
            session.batching = false;
            session.discard_pending();
        }
        Ok(session)
    }

    /// Decode file bytes with `codec` and build a session from them
    pub fn import_with<C: WorkbookCodec>(codec: &C, bytes: &[u8]) -> Result<Session> {
        let snapshot = codec.decode(bytes).map_err(Error::codec)?;
        Self::import(snapshot)
    }

    /// Encode the current content with `codec`
    pub fn export_with<C: WorkbookCodec>(&self, codec: &C) -> Result<Vec<u8>> {
        codec.encode(&self.snapshot()).map_err(Error::codec)
    }

    /// Literal-or-formula view of one sheet's bounding box
    pub fn sheet_snapshot(&self, sheet: usize) -> Result<SheetSnapshot> {
        let worksheet = self.workbook.sheet_for(CellKey::new(sheet, 0, 0))?;
        Ok(SheetSnapshot::from_cells(
            worksheet.name(),
            worksheet
                .storage()
                .iter()
                .map(|(row, col, value)| (row, col, SnapshotCell::from(value))),
        ))
    }

    /// Snapshot of every sheet in index order
    pub fn snapshot(&self) -> WorkbookSnapshot {
        WorkbookSnapshot {
            sheets: (0..self.sheet_count())
                .filter_map(|index| self.sheet_snapshot(index).ok())
                .collect(),
        }
    }
}

#[cfg(feature = "xlsx")]
impl Session {
    /// Read an `.xlsx` file into a fresh session
    pub fn open_xlsx<P: AsRef<std::path::Path>>(path: P) -> Result<Session> {
        let snapshot = sheetsync_xlsx::XlsxReader::read_file(path).map_err(Error::codec)?;
        Self::import(snapshot)
    }

    /// Write the current content to an `.xlsx` file
    pub fn save_xlsx<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        sheetsync_xlsx::XlsxWriter::write_file(&self.snapshot(), path).map_err(Error::codec)
    }
}
