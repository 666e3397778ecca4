//! `calc()` expression evaluation.
//!
//! Tokenize, parse by recursive descent (right-associative exponent), then
//! evaluate against an environment of origin components, the constants
//! `pi`/`e`/`tau` and the math function set. Percentages and angle units
//! are resolved against the active component range during lexing and are
//! rejected outright in relative color syntax.

use std::collections::HashMap;
use std::f64::consts::{E, PI, TAU};

use crate::error::{Error, Result};
use crate::expr::{self, Token, Unit};

/// Evaluation context for one component expression.
pub struct CalcContext<'a> {
    /// Active component range, used for percent remapping and the
    /// `infinity` short-circuits.
    pub range: (f64, f64),
    /// Percentage-typed components keep `p%` as the plain number `p`.
    pub percent_is_number: bool,
    /// Relative color syntax forbids `%` and angle units inside calc.
    pub relative: bool,
    /// Origin components; empty outside relative syntax.
    pub env: &'a HashMap<String, f64>,
}

/// Remap a percentage into a component range. Ranges straddling zero are
/// treated symmetrically.
pub(crate) fn percent_to_range(p: f64, min: f64, max: f64) -> f64 {
    if min < 0.0 && max > 0.0 {
        p / 100.0 * (max - min) / 2.0
    } else {
        p / 100.0 * (max - min) + min
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum CalcToken {
    Number(f64),
    Percent(f64),
    Angle(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    Comma,
}

fn lex(input: &str) -> Result<Vec<CalcToken>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' => i += 1,
            b'+' => {
                tokens.push(CalcToken::Plus);
                i += 1;
            }
            b'-' => {
                tokens.push(CalcToken::Minus);
                i += 1;
            }
            b'*' => {
                tokens.push(CalcToken::Star);
                i += 1;
            }
            b'/' => {
                tokens.push(CalcToken::Slash);
                i += 1;
            }
            b'^' => {
                tokens.push(CalcToken::Caret);
                i += 1;
            }
            b'(' => {
                tokens.push(CalcToken::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(CalcToken::RParen);
                i += 1;
            }
            b',' => {
                tokens.push(CalcToken::Comma);
                i += 1;
            }
            b'.' | b'0'..=b'9' => {
                let (token, end) = expr::scan_number(input, i).map_err(recast_parse)?;
                i = end;
                match token {
                    Token::Number { value, unit } => match unit {
                        Unit::None => tokens.push(CalcToken::Number(value)),
                        Unit::Percent => tokens.push(CalcToken::Percent(value)),
                        angle => tokens.push(CalcToken::Angle(angle.to_degrees(value))),
                    },
                    _ => unreachable!("scan_number yields numbers"),
                }
            }
            _ if b.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(CalcToken::Ident(input[start..i].to_string()));
            }
            _ => {
                return Err(Error::Calc(format!(
                    "unexpected character {:?} in {:?}",
                    b as char, input
                )));
            }
        }
    }

    Ok(tokens)
}

fn recast_parse(err: Error) -> Error {
    match err {
        Error::Parse(msg) => Error::Calc(msg),
        other => other,
    }
}

// ============================================================================
// Parser / evaluator
// ============================================================================

struct Evaluator<'a> {
    tokens: Vec<CalcToken>,
    pos: usize,
    ctx: &'a CalcContext<'a>,
}

impl<'a> Evaluator<'a> {
    fn peek(&self) -> Option<&CalcToken> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<CalcToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: CalcToken) -> Result<()> {
        match self.next() {
            Some(found) if found == token => Ok(()),
            found => Err(Error::Calc(format!(
                "expected {:?}, found {:?}",
                token, found
            ))),
        }
    }

    fn additive(&mut self) -> Result<f64> {
        let mut value = self.multiplicative()?;
        loop {
            match self.peek() {
                Some(CalcToken::Plus) => {
                    self.pos += 1;
                    value += self.multiplicative()?;
                }
                Some(CalcToken::Minus) => {
                    self.pos += 1;
                    value -= self.multiplicative()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn multiplicative(&mut self) -> Result<f64> {
        let mut value = self.power()?;
        loop {
            match self.peek() {
                Some(CalcToken::Star) => {
                    self.pos += 1;
                    value *= self.power()?;
                }
                Some(CalcToken::Slash) => {
                    self.pos += 1;
                    // Division by zero is not intercepted; IEEE-754 rules.
                    value /= self.power()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.unary()?;
        if matches!(self.peek(), Some(CalcToken::Caret)) {
            self.pos += 1;
            // Right-associative.
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(CalcToken::Minus) => {
                self.pos += 1;
                // `-infinity` short-circuits to the component minimum.
                if matches!(self.peek(), Some(CalcToken::Ident(name)) if name == "infinity") {
                    self.pos += 1;
                    return Ok(self.ctx.range.0);
                }
                Ok(-self.unary()?)
            }
            Some(CalcToken::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64> {
        match self.next() {
            Some(CalcToken::Number(value)) => Ok(value),
            Some(CalcToken::Percent(p)) => {
                if self.ctx.relative {
                    return Err(Error::Calc(
                        "percentages are not allowed inside calc() in relative color syntax".into(),
                    ));
                }
                if self.ctx.percent_is_number {
                    Ok(p)
                } else {
                    Ok(percent_to_range(p, self.ctx.range.0, self.ctx.range.1))
                }
            }
            Some(CalcToken::Angle(degrees)) => {
                if self.ctx.relative {
                    return Err(Error::Calc(
                        "angle units are not allowed inside calc() in relative color syntax".into(),
                    ));
                }
                Ok(degrees)
            }
            Some(CalcToken::Ident(name)) => {
                if matches!(self.peek(), Some(CalcToken::LParen)) {
                    self.pos += 1;
                    return self.call(&name);
                }
                self.identifier(&name)
            }
            Some(CalcToken::LParen) => {
                let value = self.additive()?;
                self.expect(CalcToken::RParen)?;
                Ok(value)
            }
            found => Err(Error::Calc(format!("unexpected token {:?}", found))),
        }
    }

    fn identifier(&mut self, name: &str) -> Result<f64> {
        if let Some(&value) = self.ctx.env.get(name) {
            return Ok(value);
        }
        match name {
            "infinity" => Ok(self.ctx.range.1),
            "nan" => Ok(0.0),
            "pi" => Ok(PI),
            "e" => Ok(E),
            "tau" => Ok(TAU),
            _ => Err(Error::Calc(format!("unknown identifier '{}'", name))),
        }
    }

    fn call(&mut self, name: &str) -> Result<f64> {
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(CalcToken::RParen)) {
            loop {
                args.push(self.additive()?);
                match self.peek() {
                    Some(CalcToken::Comma) => {
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
        }
        self.expect(CalcToken::RParen)?;

        let arity = |expected: usize| -> Result<()> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(Error::Calc(format!(
                    "{}() takes {} argument(s), got {}",
                    name,
                    expected,
                    args.len()
                )))
            }
        };
        let at_least_one = |args: &[f64]| -> Result<()> {
            if args.is_empty() {
                Err(Error::Calc(format!("{}() needs at least one argument", name)))
            } else {
                Ok(())
            }
        };

        match name {
            "pow" => {
                arity(2)?;
                Ok(args[0].powf(args[1]))
            }
            "sqrt" => {
                arity(1)?;
                Ok(args[0].sqrt())
            }
            "sin" => {
                arity(1)?;
                Ok(args[0].sin())
            }
            "cos" => {
                arity(1)?;
                Ok(args[0].cos())
            }
            "tan" => {
                arity(1)?;
                Ok(args[0].tan())
            }
            "asin" => {
                arity(1)?;
                Ok(args[0].asin())
            }
            "acos" => {
                arity(1)?;
                Ok(args[0].acos())
            }
            "atan" => {
                arity(1)?;
                Ok(args[0].atan())
            }
            "atan2" => {
                arity(2)?;
                Ok(args[0].atan2(args[1]))
            }
            "exp" => {
                arity(1)?;
                Ok(args[0].exp())
            }
            "log" => {
                arity(1)?;
                Ok(args[0].ln())
            }
            "log10" => {
                arity(1)?;
                Ok(args[0].log10())
            }
            "log2" => {
                arity(1)?;
                Ok(args[0].log2())
            }
            "abs" => {
                arity(1)?;
                Ok(args[0].abs())
            }
            "min" => {
                at_least_one(&args)?;
                Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
            }
            "max" => {
                at_least_one(&args)?;
                Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            }
            "hypot" => {
                at_least_one(&args)?;
                Ok(args.iter().map(|v| v * v).sum::<f64>().sqrt())
            }
            "round" => {
                arity(1)?;
                Ok(args[0].round())
            }
            "ceil" => {
                arity(1)?;
                Ok(args[0].ceil())
            }
            "floor" => {
                arity(1)?;
                Ok(args[0].floor())
            }
            "sign" => {
                arity(1)?;
                Ok(if args[0] == 0.0 { 0.0 } else { args[0].signum() })
            }
            "trunc" => {
                arity(1)?;
                Ok(args[0].trunc())
            }
            "random" => {
                arity(0)?;
                Ok(rand::random::<f64>())
            }
            _ => Err(Error::Calc(format!("unknown function '{}'", name))),
        }
    }
}

/// Evaluate the inner text of a `calc(...)` expression.
pub fn evaluate(expression: &str, ctx: &CalcContext<'_>) -> Result<f64> {
    let tokens = lex(expression)?;
    if tokens.is_empty() {
        return Err(Error::Calc("empty calc() expression".into()));
    }
    let mut evaluator = Evaluator {
        tokens,
        pos: 0,
        ctx,
    };
    let value = evaluator.additive()?;
    if evaluator.pos != evaluator.tokens.len() {
        return Err(Error::Calc(format!(
            "extra tokens after expression in {:?}",
            expression
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(env: &HashMap<String, f64>) -> CalcContext<'_> {
        CalcContext {
            range: (0.0, 255.0),
            percent_is_number: false,
            relative: false,
            env,
        }
    }

    #[test]
    fn test_arithmetic_precedence() {
        let env = HashMap::new();
        assert_eq!(evaluate("1 + 2 * 3", &ctx(&env)).unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3", &ctx(&env)).unwrap(), 9.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2", &ctx(&env)).unwrap(), 512.0);
        assert_eq!(evaluate("-2 + 5", &ctx(&env)).unwrap(), 3.0);
    }

    #[test]
    fn test_percent_remap() {
        let env = HashMap::new();
        // 50% of [0, 255]
        assert_eq!(evaluate("50%", &ctx(&env)).unwrap(), 127.5);
        // Symmetric range takes half-span.
        let c = CalcContext {
            range: (-125.0, 125.0),
            percent_is_number: false,
            relative: false,
            env: &env,
        };
        assert_eq!(evaluate("40%", &c).unwrap(), 50.0);
    }

    #[test]
    fn test_percent_stays_number_for_percentage_components() {
        let env = HashMap::new();
        let c = CalcContext {
            range: (0.0, 100.0),
            percent_is_number: true,
            relative: false,
            env: &env,
        };
        assert_eq!(evaluate("37%", &c).unwrap(), 37.0);
    }

    #[test]
    fn test_angle_units() {
        let env = HashMap::new();
        let c = CalcContext {
            range: (0.0, 360.0),
            percent_is_number: false,
            relative: false,
            env: &env,
        };
        assert!((evaluate("0.5turn", &c).unwrap() - 180.0).abs() < 1e-12);
        assert!((evaluate("200grad", &c).unwrap() - 180.0).abs() < 1e-12);
    }

    #[test]
    fn test_infinity_short_circuits() {
        let env = HashMap::new();
        assert_eq!(evaluate("infinity", &ctx(&env)).unwrap(), 255.0);
        assert_eq!(evaluate("-infinity", &ctx(&env)).unwrap(), 0.0);
        assert_eq!(evaluate("nan", &ctx(&env)).unwrap(), 0.0);
    }

    #[test]
    fn test_env_and_constants() {
        let mut env = HashMap::new();
        env.insert("r".to_string(), 255.0);
        assert_eq!(evaluate("r * 0.5", &ctx(&env)).unwrap(), 127.5);
        assert!((evaluate("pi", &ctx(&env)).unwrap() - PI).abs() < 1e-15);
        assert!((evaluate("tau / 2", &ctx(&env)).unwrap() - PI).abs() < 1e-15);
    }

    #[test]
    fn test_functions() {
        let env = HashMap::new();
        assert_eq!(evaluate("pow(2, 10)", &ctx(&env)).unwrap(), 1024.0);
        assert_eq!(evaluate("min(3, 1, 2)", &ctx(&env)).unwrap(), 1.0);
        assert_eq!(evaluate("max(3, 1, 2)", &ctx(&env)).unwrap(), 3.0);
        assert_eq!(evaluate("hypot(3, 4)", &ctx(&env)).unwrap(), 5.0);
        assert_eq!(evaluate("sign(-9)", &ctx(&env)).unwrap(), -1.0);
        assert_eq!(evaluate("sign(0)", &ctx(&env)).unwrap(), 0.0);
        assert_eq!(evaluate("floor(2.9)", &ctx(&env)).unwrap(), 2.0);
        let r = evaluate("random()", &ctx(&env)).unwrap();
        assert!((0.0..1.0).contains(&r));
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        let env = HashMap::new();
        assert!(evaluate("1 / 0", &ctx(&env)).unwrap().is_infinite());
    }

    #[test]
    fn test_unknown_identifier() {
        let env = HashMap::new();
        let err = evaluate("bogus + 1", &ctx(&env)).unwrap_err();
        assert!(err.to_string().contains("unknown identifier"));
    }

    #[test]
    fn test_unknown_function() {
        let env = HashMap::new();
        let err = evaluate("frobnicate(1)", &ctx(&env)).unwrap_err();
        assert!(err.to_string().contains("unknown function"));
    }

    #[test]
    fn test_extra_tokens() {
        let env = HashMap::new();
        let err = evaluate("1 2", &ctx(&env)).unwrap_err();
        assert!(err.to_string().contains("extra tokens"));
    }

    #[test]
    fn test_relative_context_rejects_units() {
        let env = HashMap::new();
        let c = CalcContext {
            range: (0.0, 255.0),
            percent_is_number: false,
            relative: true,
            env: &env,
        };
        assert!(evaluate("50%", &c).is_err());
        assert!(evaluate("90deg", &c).is_err());
        assert!(evaluate("1 + 1", &c).is_ok());
    }

    #[test]
    fn test_mismatched_parens() {
        let env = HashMap::new();
        assert!(evaluate("(1 + 2", &ctx(&env)).is_err());
    }
}
