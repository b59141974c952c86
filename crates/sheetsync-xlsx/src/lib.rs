//! # sheetsync-xlsx
//!
//! XLSX (Office Open XML) codec for sheetsync workbook snapshots.
//!
//! Only literals and formula text are carried; styles, cached formula
//! results and everything else in the package are ignored on read and not
//! written.
//!
//! ```rust
//! use sheetsync_core::{SheetSnapshot, WorkbookCodec, WorkbookSnapshot};
//! use sheetsync_xlsx::XlsxCodec;
//!
//! let mut snapshot = WorkbookSnapshot::new();
//! snapshot
//!     .sheets
//!     .push(SheetSnapshot::from_exchange_strings("Unit", &[vec!["20", "3", "=A1*B1"]]));
//!
//! let bytes = XlsxCodec.encode(&snapshot).unwrap();
//! assert_eq!(XlsxCodec.decode(&bytes).unwrap(), snapshot);
//! ```

pub mod error;
pub mod reader;
pub mod writer;

mod escape;

use std::io::Cursor;

use sheetsync_core::{WorkbookCodec, WorkbookSnapshot};

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
pub use writer::XlsxWriter;

/// [`WorkbookCodec`] for `.xlsx` bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxCodec;

impl WorkbookCodec for XlsxCodec {
    type Error = XlsxError;

    fn decode(&self, bytes: &[u8]) -> XlsxResult<WorkbookSnapshot> {
        XlsxReader::read(Cursor::new(bytes))
    }

    fn encode(&self, snapshot: &WorkbookSnapshot) -> XlsxResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        XlsxWriter::write(snapshot, &mut cursor)?;
        Ok(cursor.into_inner())
    }
}
