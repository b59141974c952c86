//! Built-in spreadsheet functions

pub mod logical;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};
use sheetsync_core::CellError;
use std::collections::HashMap;

/// Function implementation signature
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        let builtins: [(&'static str, usize, Option<usize>, FunctionImpl); 17] = [
            ("SUM", 1, None, math::fn_sum),
            ("PRODUCT", 1, None, math::fn_product),
            ("AVERAGE", 1, None, math::fn_average),
            ("MIN", 1, None, math::fn_min),
            ("MAX", 1, None, math::fn_max),
            ("COUNT", 1, None, math::fn_count),
            ("COUNTA", 1, None, math::fn_counta),
            ("ABS", 1, Some(1), math::fn_abs),
            ("ROUND", 1, Some(2), math::fn_round),
            ("MOD", 2, Some(2), math::fn_mod),
            ("IF", 2, Some(3), logical::fn_if),
            ("IFERROR", 2, Some(2), logical::fn_iferror),
            ("AND", 1, None, logical::fn_and),
            ("OR", 1, None, logical::fn_or),
            ("NOT", 1, Some(1), logical::fn_not),
            ("CONCATENATE", 1, None, text::fn_concatenate),
            ("LEN", 1, Some(1), text::fn_len),
        ];
        for (name, min_args, max_args, implementation) in builtins {
            registry.register(FunctionDef {
                name,
                min_args,
                max_args,
                implementation,
            });
        }

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }
}

/// Collect the numbers an aggregate function sees
///
/// Direct arguments are coerced (TRUE, numeric text); inside ranges only
/// real numbers count. The first error wins.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Array(rows) => {
                for value in rows.iter().flatten() {
                    match value {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => match other.as_number() {
                Some(n) => numbers.push(n),
                None => return Err(CellError::Value),
            },
        }
    }
    Ok(numbers)
}

/// Coerce a scalar argument to a number, or the error to return instead
pub(crate) fn scalar_number(arg: Option<&FormulaValue>) -> Result<f64, CellError> {
    match arg {
        None => Ok(0.0),
        Some(FormulaValue::Error(e)) => Err(*e),
        Some(FormulaValue::Array(_)) => Err(CellError::Value),
        Some(v) => v.as_number().ok_or(CellError::Value),
    }
}
