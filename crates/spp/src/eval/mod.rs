//! Expression evaluation for `#if`/`#elif`/`#eval`

mod lexer;
mod parser;

use thiserror::Error;

/// Expression evaluation failure; the engine attaches the directive location.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct EvalError {
    message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Evaluates the arithmetic/logical expressions used by `#if`, `#elif` and
/// `#eval`. Caller-supplied; the engine hands it fully macro-expanded text.
pub trait ExpressionEvaluator {
    fn eval_bool(&self, expr: &str) -> Result<bool, EvalError>;
    fn eval_number(&self, expr: &str) -> Result<f64, EvalError>;
}

/// The stock evaluator: numbers (decimal, hex, binary, float), the usual
/// arithmetic/comparison/logical/bitwise operators, and unknown identifiers
/// evaluating to 0.
#[derive(Debug, Default)]
pub struct DefaultEvaluator;

impl ExpressionEvaluator for DefaultEvaluator {
    fn eval_bool(&self, expr: &str) -> Result<bool, EvalError> {
        Ok(self.eval_number(expr)? != 0.0)
    }

    fn eval_number(&self, expr: &str) -> Result<f64, EvalError> {
        parser::parse(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_bool() {
        let eval = DefaultEvaluator;
        assert!(eval.eval_bool("1 + 1 == 2").unwrap());
        assert!(!eval.eval_bool("0").unwrap());
    }

    #[test]
    fn test_eval_number() {
        let eval = DefaultEvaluator;
        assert_eq!(eval.eval_number("6 * 7").unwrap(), 42.0);
    }
}
