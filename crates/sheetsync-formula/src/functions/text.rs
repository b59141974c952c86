//! Text functions

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use sheetsync_core::CellError;

/// CONCATENATE(text1, ...)
pub fn fn_concatenate(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let mut out = String::new();
    for arg in args {
        match arg {
            FormulaValue::Error(e) => return Ok(FormulaValue::Error(*e)),
            FormulaValue::Array(_) => return Ok(FormulaValue::Error(CellError::Value)),
            v => out.push_str(&v.as_string()),
        }
    }
    Ok(FormulaValue::String(out))
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args.first() {
        Some(FormulaValue::Error(e)) => FormulaValue::Error(*e),
        Some(FormulaValue::Array(_)) => FormulaValue::Error(CellError::Value),
        Some(v) => FormulaValue::Number(v.as_string().chars().count() as f64),
        None => FormulaValue::Number(0.0),
    })
}
