//! Logical functions

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use sheetsync_core::CellError;

fn condition(value: Option<&FormulaValue>) -> Result<bool, CellError> {
    match value {
        None => Ok(false),
        Some(FormulaValue::Error(e)) => Err(*e),
        Some(FormulaValue::Array(_)) => Err(CellError::Value),
        Some(v) => v.as_bool().ok_or(CellError::Value),
    }
}

/// IF(condition, if_true, [if_false])
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match condition(args.first()) {
        Ok(true) => args.get(1).cloned().unwrap_or(FormulaValue::Boolean(true)),
        Ok(false) => args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// IFERROR(value, fallback)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args.first() {
        Some(FormulaValue::Error(_)) | None => args.get(1).cloned().unwrap_or(FormulaValue::Empty),
        Some(v) => v.clone(),
    })
}

/// Flatten AND/OR arguments; text and blanks inside ranges are ignored
fn logical_values(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for v in rows.iter().flatten() {
                    match v {
                        FormulaValue::Error(e) => return Err(*e),
                        FormulaValue::Boolean(b) => values.push(*b),
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => values.push(condition(Some(other))?),
        }
    }
    if values.is_empty() {
        return Err(CellError::Value);
    }
    Ok(values)
}

/// AND function
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match logical_values(args) {
        Ok(values) => FormulaValue::Boolean(values.iter().all(|b| *b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// OR function
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match logical_values(args) {
        Ok(values) => FormulaValue::Boolean(values.iter().any(|b| *b)),
        Err(e) => FormulaValue::Error(e),
    })
}

/// NOT function
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match condition(args.first()) {
        Ok(b) => FormulaValue::Boolean(!b),
        Err(e) => FormulaValue::Error(e),
    })
}
