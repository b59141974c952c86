//! Formula evaluator
//!
//! Evaluates formula ASTs against the current values of a [`Workbook`].
//! Evaluation is deterministic and never mutates the workbook.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;
use sheetsync_core::{CellError, CellKey, CellRange, CellValue, Workbook};
use std::cmp::Ordering;
use std::sync::OnceLock;

/// Global function registry (lazily initialized)
static FUNCTION_REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();

fn get_function_registry() -> &'static FunctionRegistry {
    FUNCTION_REGISTRY.get_or_init(FunctionRegistry::new)
}

/// Default cap on the number of cells a single range may materialise
pub const DEFAULT_MAX_RANGE_CELLS: u64 = 16 * 1_048_576;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number with spreadsheet coercion (empty = 0, TRUE = 1, numeric text)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Some(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Some(false),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => CellError::Value.to_string(),
        }
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        match value.effective_value() {
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::String(s) => FormulaValue::String(s.clone()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
            CellValue::Empty | CellValue::Formula { .. } => FormulaValue::Empty,
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) if !n.is_finite() => CellValue::Error(CellError::Num),
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::String(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            FormulaValue::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    /// Workbook the formula reads from
    pub workbook: &'a Workbook,
    /// Sheet hosting the formula (target of unqualified references)
    pub current_sheet: usize,
    /// Row of the formula cell
    pub current_row: u32,
    /// Column of the formula cell
    pub current_col: u16,
    /// Ranges larger than this (after clamping to the used area) evaluate to #REF!
    pub max_range_cells: u64,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context for the formula stored at `key`
    pub fn new(workbook: &'a Workbook, key: CellKey) -> Self {
        Self {
            workbook,
            current_sheet: key.sheet,
            current_row: key.row,
            current_col: key.col,
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
        }
    }

    /// Override the range size cap
    pub fn with_max_range_cells(mut self, max_range_cells: u64) -> Self {
        self.max_range_cells = max_range_cells;
        self
    }

    /// Resolve an optional sheet qualifier to a sheet index
    pub fn resolve_sheet(&self, sheet: Option<&str>) -> Option<usize> {
        match sheet {
            Some(name) => self.workbook.sheet_index(name),
            None => (self.current_sheet < self.workbook.sheet_count()).then_some(self.current_sheet),
        }
    }

    /// Get a cell value from the workbook
    pub fn get_cell_value(&self, sheet: Option<&str>, row: u32, col: u16) -> FormulaValue {
        let Some(sheet) = self.resolve_sheet(sheet) else {
            return FormulaValue::Error(CellError::Ref);
        };
        self.workbook
            .cell(CellKey::new(sheet, row, col))
            .map(FormulaValue::from)
            .unwrap_or(FormulaValue::Empty)
    }

    /// Get a range of cell values as an array
    ///
    /// The range is clamped to the used area of its sheet, so `D:D` only
    /// reads the rows that hold data.
    pub fn get_range_values(&self, sheet: Option<&str>, range: &CellRange) -> FormulaValue {
        let Some(sheet_idx) = self.resolve_sheet(sheet) else {
            return FormulaValue::Error(CellError::Ref);
        };
        let Some(worksheet) = self.workbook.worksheet(sheet_idx) else {
            return FormulaValue::Error(CellError::Ref);
        };
        let Some(area) = worksheet.used_range().and_then(|used| used.intersect(range)) else {
            return FormulaValue::Array(Vec::new());
        };
        if area.cell_count() > self.max_range_cells {
            return FormulaValue::Error(CellError::Ref);
        }

        let mut rows = Vec::with_capacity(area.row_count() as usize);
        for row in area.start.row..=area.end.row {
            let mut cols = Vec::with_capacity(area.col_count() as usize);
            for col in area.start.col..=area.end.col {
                cols.push(
                    worksheet
                        .cell(row, col)
                        .map(FormulaValue::from)
                        .unwrap_or(FormulaValue::Empty),
                );
            }
            rows.push(cols);
        }

        FormulaValue::Array(rows)
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => Ok(ctx.get_cell_value(
            cell_ref.sheet.as_deref(),
            cell_ref.address.row,
            cell_ref.address.col,
        )),
        FormulaExpr::RangeRef(range_ref) => {
            Ok(ctx.get_range_values(range_ref.sheet.as_deref(), &range_ref.range))
        }
        FormulaExpr::NameRef(_) => Ok(FormulaValue::Error(CellError::Name)),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    // Propagate errors, left operand first
    if let Some(e) = left_val.get_error().or_else(|| right_val.get_error()) {
        return Ok(FormulaValue::Error(e));
    }
    if matches!(left_val, FormulaValue::Array(_)) || matches!(right_val, FormulaValue::Array(_)) {
        return Ok(FormulaValue::Error(CellError::Value));
    }

    let ordering = || compare_values(&left_val, &right_val);
    let result = match op {
        BinaryOperator::Equal => FormulaValue::Boolean(ordering() == Ordering::Equal),
        BinaryOperator::NotEqual => FormulaValue::Boolean(ordering() != Ordering::Equal),
        BinaryOperator::LessThan => FormulaValue::Boolean(ordering() == Ordering::Less),
        BinaryOperator::LessEqual => FormulaValue::Boolean(ordering() != Ordering::Greater),
        BinaryOperator::GreaterThan => FormulaValue::Boolean(ordering() == Ordering::Greater),
        BinaryOperator::GreaterEqual => FormulaValue::Boolean(ordering() != Ordering::Less),
        BinaryOperator::Concat => {
            FormulaValue::String(left_val.as_string() + &right_val.as_string())
        }
        arithmetic => {
            let (Some(l), Some(r)) = (left_val.as_number(), right_val.as_number()) else {
                return Ok(FormulaValue::Error(CellError::Value));
            };
            match arithmetic {
                BinaryOperator::Add => FormulaValue::Number(l + r),
                BinaryOperator::Subtract => FormulaValue::Number(l - r),
                BinaryOperator::Multiply => FormulaValue::Number(l * r),
                BinaryOperator::Divide if r == 0.0 => FormulaValue::Error(CellError::Div0),
                BinaryOperator::Divide => FormulaValue::Number(l / r),
                _ => {
                    let result = l.powf(r);
                    if result.is_finite() {
                        FormulaValue::Number(result)
                    } else {
                        FormulaValue::Error(CellError::Num)
                    }
                }
            }
        }
    };

    Ok(result)
}

/// Compare two values for ordering (Excel-style comparison)
///
/// Numbers sort before text, text before booleans; text compares
/// case-insensitively and empty counts as zero or the empty string.
fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            _ => 3,
        }
    }

    match (left, right) {
        (FormulaValue::Empty, FormulaValue::Empty) => Ordering::Equal,
        (FormulaValue::Empty, FormulaValue::String(s)) => "".cmp(&s.to_lowercase().as_str()),
        (FormulaValue::String(s), FormulaValue::Empty) => s.to_lowercase().as_str().cmp(""),
        (FormulaValue::Empty, other) => compare_values(&FormulaValue::Number(0.0), other),
        (other, FormulaValue::Empty) => compare_values(other, &FormulaValue::Number(0.0)),
        (FormulaValue::Number(l), FormulaValue::Number(r)) => {
            l.partial_cmp(r).unwrap_or(Ordering::Equal)
        }
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            l.to_lowercase().cmp(&r.to_lowercase())
        }
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l.cmp(r),
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?;

    if let Some(e) = val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    let Some(n) = val.as_number() else {
        return Ok(FormulaValue::Error(CellError::Value));
    };

    Ok(match op {
        UnaryOperator::Negate => FormulaValue::Number(-n),
        UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
    })
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let registry = get_function_registry();

    let func = registry
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    if args.len() < func.min_args {
        return Err(FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at least {}", func.min_args),
            actual: args.len(),
        });
    }
    if let Some(max) = func.max_args {
        if args.len() > max {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: format!("at most {}", max),
                actual: args.len(),
            });
        }
    }

    let evaluated_args = args
        .iter()
        .map(|arg| evaluate(arg, ctx))
        .collect::<FormulaResult<Vec<_>>>()?;

    (func.implementation)(&evaluated_args, ctx)
}
