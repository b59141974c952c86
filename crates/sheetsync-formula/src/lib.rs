//! # sheetsync-formula
//!
//! Formula capability for the sheetsync synchronization core.
//!
//! This crate provides:
//! - Formula tokenizing and parsing (text → AST)
//! - Formula evaluation (AST → value) with a small built-in function library
//! - Reference extraction and the dependency graph built from it
//! - Textual reference rewriting for row/column changes, sheet renames and
//!   shared-formula offsets
//!
//! ## Example
//!
//! ```rust
//! use sheetsync_core::{CellKey, CellValue, Workbook};
//! use sheetsync_formula::{evaluate, parse_formula, EvaluationContext, FormulaValue};
//!
//! let mut workbook = Workbook::new();
//! let unit = workbook.add_worksheet_with_name("Unit").unwrap();
//! workbook.set_cell(CellKey::new(unit, 0, 1), CellValue::Number(20.0)).unwrap();
//! workbook.set_cell(CellKey::new(unit, 0, 2), CellValue::Number(3.0)).unwrap();
//!
//! let ast = parse_formula("=B1*C1").unwrap();
//! let ctx = EvaluationContext::new(&workbook, CellKey::new(unit, 0, 3));
//! assert_eq!(evaluate(&ast, &ctx).unwrap(), FormulaValue::Number(60.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod references;
pub mod rewrite;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use dependency::{DependencyGraph, RangeKey};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, FormulaValue, DEFAULT_MAX_RANGE_CELLS};
pub use parser::parse_formula;
pub use references::{extract_references, References};
pub use rewrite::{
    offset_references, rename_sheet_in_formula, rewrite_for_change, sheet_prefix, Axis,
    ChangeKind, StructuralChange,
};
