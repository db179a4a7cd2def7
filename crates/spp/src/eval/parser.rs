//! Precedence-climbing parser over expression tokens

use logos::Logos;

use super::lexer::ExprToken;
use super::EvalError;

/// Evaluate an expression to a number.
pub fn parse(expr: &str) -> Result<f64, EvalError> {
    let mut tokens = Vec::new();
    for token in ExprToken::lexer(expr) {
        let token = token
            .map_err(|()| EvalError::new(format!("unexpected character in '{}'", expr.trim())))?;
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(EvalError::new("empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expression(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::new(format!(
            "trailing tokens in '{}'",
            expr.trim()
        )));
    }
    Ok(value)
}

struct Parser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&ExprToken> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self, min_bp: u8) -> Result<f64, EvalError> {
        let mut lhs = self.primary()?;
        while let Some(op) = self.peek() {
            let Some(bp) = binding_power(op) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            let op = self.bump().ok_or_else(|| EvalError::new("expected operator"))?;
            let rhs = self.expression(bp + 1)?;
            lhs = apply(&op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn primary(&mut self) -> Result<f64, EvalError> {
        match self.bump() {
            Some(ExprToken::Number(value)) => Ok(value),
            Some(ExprToken::Ident) => Ok(0.0),
            Some(ExprToken::LParen) => {
                let value = self.expression(0)?;
                match self.bump() {
                    Some(ExprToken::RParen) => Ok(value),
                    _ => Err(EvalError::new("missing ')'")),
                }
            }
            Some(ExprToken::Minus) => Ok(-self.unary()?),
            Some(ExprToken::Plus) => self.unary(),
            Some(ExprToken::Bang) => Ok(bool_value(self.unary()? == 0.0)),
            Some(ExprToken::Tilde) => Ok(!(self.unary()? as i64) as f64),
            Some(token) => Err(EvalError::new(format!("unexpected token {token:?}"))),
            None => Err(EvalError::new("unexpected end of expression")),
        }
    }

    fn unary(&mut self) -> Result<f64, EvalError> {
        self.expression(UNARY_BP)
    }
}

const UNARY_BP: u8 = 11;

fn binding_power(op: &ExprToken) -> Option<u8> {
    Some(match op {
        ExprToken::OrOr => 1,
        ExprToken::AndAnd => 2,
        ExprToken::Pipe => 3,
        ExprToken::Caret => 4,
        ExprToken::Amp => 5,
        ExprToken::EqEq | ExprToken::NotEq => 6,
        ExprToken::Lt | ExprToken::Gt | ExprToken::LtEq | ExprToken::GtEq => 7,
        ExprToken::Shl | ExprToken::Shr => 8,
        ExprToken::Plus | ExprToken::Minus => 9,
        ExprToken::Star | ExprToken::Slash | ExprToken::Percent => 10,
        _ => return None,
    })
}

fn bool_value(truth: bool) -> f64 {
    if truth {
        1.0
    } else {
        0.0
    }
}

fn apply(op: &ExprToken, lhs: f64, rhs: f64) -> Result<f64, EvalError> {
    Ok(match op {
        ExprToken::OrOr => bool_value(lhs != 0.0 || rhs != 0.0),
        ExprToken::AndAnd => bool_value(lhs != 0.0 && rhs != 0.0),
        ExprToken::Pipe => ((lhs as i64) | (rhs as i64)) as f64,
        ExprToken::Caret => ((lhs as i64) ^ (rhs as i64)) as f64,
        ExprToken::Amp => ((lhs as i64) & (rhs as i64)) as f64,
        ExprToken::EqEq => bool_value(lhs == rhs),
        ExprToken::NotEq => bool_value(lhs != rhs),
        ExprToken::Lt => bool_value(lhs < rhs),
        ExprToken::Gt => bool_value(lhs > rhs),
        ExprToken::LtEq => bool_value(lhs <= rhs),
        ExprToken::GtEq => bool_value(lhs >= rhs),
        ExprToken::Shl => ((lhs as i64) << (rhs as i64)) as f64,
        ExprToken::Shr => ((lhs as i64) >> (rhs as i64)) as f64,
        ExprToken::Plus => lhs + rhs,
        ExprToken::Minus => lhs - rhs,
        ExprToken::Star => lhs * rhs,
        ExprToken::Slash => {
            if rhs == 0.0 {
                return Err(EvalError::new("division by zero"));
            }
            lhs / rhs
        }
        ExprToken::Percent => {
            if rhs == 0.0 {
                return Err(EvalError::new("division by zero"));
            }
            lhs % rhs
        }
        _ => return Err(EvalError::new(format!("unexpected operator {op:?}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(parse("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(parse("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(parse("2 * 3 % 4").unwrap(), 2.0);
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(parse("1 < 2 && 3 >= 3").unwrap(), 1.0);
        assert_eq!(parse("0 || 2 == 2").unwrap(), 1.0);
        assert_eq!(parse("!1 || !0").unwrap(), 1.0);
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(parse("1 << 4").unwrap(), 16.0);
        assert_eq!(parse("0xF0 & 0x1F").unwrap(), 16.0);
        assert_eq!(parse("~0 & 0xFF").unwrap(), 255.0);
    }

    #[test]
    fn test_unary() {
        assert_eq!(parse("-3 + 5").unwrap(), 2.0);
        assert_eq!(parse("-(2 + 3)").unwrap(), -5.0);
    }

    #[test]
    fn test_unknown_identifier_is_zero() {
        assert_eq!(parse("UNDEFINED_THING + 1").unwrap(), 1.0);
    }

    #[test]
    fn test_float() {
        assert_eq!(parse("1.5 * 2").unwrap(), 3.0);
        assert_eq!(parse("5 / 2").unwrap(), 2.5);
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("(1").is_err());
        assert!(parse("1 2").is_err());
        assert!(parse("1 / 0").is_err());
    }
}
