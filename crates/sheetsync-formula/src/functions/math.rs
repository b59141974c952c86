//! Math and aggregate functions

use super::{collect_numbers, scalar_number};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use sheetsync_core::CellError;

fn aggregate(args: &[FormulaValue], f: impl FnOnce(&[f64]) -> FormulaValue) -> FormulaValue {
    match collect_numbers(args) {
        Ok(numbers) => f(&numbers),
        Err(e) => FormulaValue::Error(e),
    }
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(aggregate(args, |n| FormulaValue::Number(n.iter().sum())))
}

/// PRODUCT function
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(aggregate(args, |n| {
        FormulaValue::Number(if n.is_empty() { 0.0 } else { n.iter().product() })
    }))
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(aggregate(args, |n| {
        if n.is_empty() {
            FormulaValue::Error(CellError::Div0)
        } else {
            FormulaValue::Number(n.iter().sum::<f64>() / n.len() as f64)
        }
    }))
}

/// MIN function (0 when there are no numbers)
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(aggregate(args, |n| {
        FormulaValue::Number(n.iter().copied().reduce(f64::min).unwrap_or(0.0))
    }))
}

/// MAX function (0 when there are no numbers)
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(aggregate(args, |n| {
        FormulaValue::Number(n.iter().copied().reduce(f64::max).unwrap_or(0.0))
    }))
}

/// COUNT: numbers only, errors are skipped rather than propagated
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .map(|arg| match arg {
            FormulaValue::Number(_) => 1,
            FormulaValue::Array(rows) => rows
                .iter()
                .flatten()
                .filter(|v| matches!(v, FormulaValue::Number(_)))
                .count(),
            _ => 0,
        })
        .sum::<usize>();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA: every non-empty value
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .map(|arg| match arg {
            FormulaValue::Empty => 0,
            FormulaValue::Array(rows) => rows
                .iter()
                .flatten()
                .filter(|v| !matches!(v, FormulaValue::Empty))
                .count(),
            _ => 1,
        })
        .sum::<usize>();
    Ok(FormulaValue::Number(count as f64))
}

/// ABS function
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match scalar_number(args.first()) {
        Ok(n) => FormulaValue::Number(n.abs()),
        Err(e) => FormulaValue::Error(e),
    })
}

/// ROUND(number, [num_digits]), half away from zero
///
/// Positive digit counts round in decimal so 1.005 style inputs behave
/// the way they print.
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = match scalar_number(args.first()) {
        Ok(n) => n,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let digits = match scalar_number(args.get(1)) {
        Ok(d) => d.trunc() as i32,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    if digits >= 0 {
        if let Some(rounded) = Decimal::from_f64(number)
            .map(|d| d.round_dp_with_strategy(digits as u32, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|d| d.to_f64())
        {
            return Ok(FormulaValue::Number(rounded));
        }
    }

    // Negative digits round to the left of the decimal point
    let step = 10_f64.powi(digits.saturating_neg().max(0));
    let scaled = number / step;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5).floor()
    } else {
        (scaled - 0.5).ceil()
    };
    Ok(FormulaValue::Number(rounded * step))
}

/// MOD(number, divisor), result takes the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let (number, divisor) = match (scalar_number(args.first()), scalar_number(args.get(1))) {
        (Ok(n), Ok(d)) => (n, d),
        (Err(e), _) | (_, Err(e)) => return Ok(FormulaValue::Error(e)),
    };
    if divisor == 0.0 {
        return Ok(FormulaValue::Error(CellError::Div0));
    }
    Ok(FormulaValue::Number(
        number - divisor * (number / divisor).floor(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetsync_core::{CellKey, Workbook};

    fn call(
        f: fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>,
        args: &[FormulaValue],
    ) -> FormulaValue {
        let wb = Workbook::new();
        let ctx = EvaluationContext::new(&wb, CellKey::new(0, 0, 0));
        f(args, &ctx).unwrap()
    }

    fn num(n: f64) -> FormulaValue {
        FormulaValue::Number(n)
    }

    #[test]
    fn test_sum_skips_text_inside_ranges() {
        let range = FormulaValue::Array(vec![
            vec![num(1.0), FormulaValue::String("x".into())],
            vec![FormulaValue::Empty, num(2.0)],
        ]);
        assert_eq!(call(fn_sum, &[range, num(3.0)]), num(6.0));
        assert_eq!(
            call(fn_sum, &[FormulaValue::String("x".into())]),
            FormulaValue::Error(CellError::Value)
        );
        assert_eq!(
            call(fn_sum, &[num(1.0), FormulaValue::Error(CellError::Cycle)]),
            FormulaValue::Error(CellError::Cycle)
        );
    }

    #[test]
    fn test_average_min_max() {
        let args = [num(2.0), num(4.0), num(9.0)];
        assert_eq!(call(fn_average, &args), num(5.0));
        assert_eq!(call(fn_min, &args), num(2.0));
        assert_eq!(call(fn_max, &args), num(9.0));
        assert_eq!(
            call(fn_average, &[FormulaValue::Array(vec![])]),
            FormulaValue::Error(CellError::Div0)
        );
        assert_eq!(call(fn_max, &[FormulaValue::Array(vec![])]), num(0.0));
    }

    #[test]
    fn test_counts() {
        let range = FormulaValue::Array(vec![vec![
            num(1.0),
            FormulaValue::String("x".into()),
            FormulaValue::Empty,
            FormulaValue::Error(CellError::Na),
        ]]);
        assert_eq!(call(fn_count, &[range.clone()]), num(1.0));
        assert_eq!(call(fn_counta, &[range]), num(3.0));
    }

    #[test]
    fn test_round() {
        assert_eq!(call(fn_round, &[num(2.5)]), num(3.0));
        assert_eq!(call(fn_round, &[num(-2.5)]), num(-3.0));
        assert_eq!(call(fn_round, &[num(1234.5678), num(2.0)]), num(1234.57));
        assert_eq!(call(fn_round, &[num(1250.0), num(-2.0)]), num(1300.0));
    }

    #[test]
    fn test_mod_and_abs() {
        assert_eq!(call(fn_mod, &[num(-3.0), num(2.0)]), num(1.0));
        assert_eq!(
            call(fn_mod, &[num(3.0), num(0.0)]),
            FormulaValue::Error(CellError::Div0)
        );
        assert_eq!(call(fn_abs, &[num(-4.0)]), num(4.0));
        assert_eq!(call(fn_product, &[num(3.0), num(4.0)]), num(12.0));
    }
}
