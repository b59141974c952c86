//! Prelude module - common imports for sheetsync users
//!
//! ```rust
//! use sheetsync::prelude::*;
//! ```

pub use crate::{
    // Cell types
    CellAddress,
    CellError,
    CellKey,
    CellRange,
    CellValue,

    // Session types
    ChangeSet,
    Error,
    GridEdit,
    RecalcStats,
    Result,
    Session,
    SessionOptions,
    SubscriptionId,

    // Exchange types
    SheetSnapshot,
    SnapshotCell,
    WorkbookCodec,
    WorkbookSnapshot,
};

#[cfg(feature = "xlsx")]
pub use crate::XlsxCodec;
