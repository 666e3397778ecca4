//! String preparation and tokenization for color expressions.
//!
//! `clean` canonicalizes raw input before any type is consulted;
//! `extract_balanced_expression` pulls out nested calls;
//! `tokenize` splits the payload of a color function into the tokens the
//! shape parser consumes.

use crate::error::{Error, Result};

/// Canonicalize a color string: trim, collapse whitespace, strip padding
/// inside parens, normalize comma spacing to `", "`, rewrite the literal
/// `calc(nan)` to `0`, lower-case ASCII letters.
pub fn clean(input: &str) -> String {
    let mut collapsed = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            collapsed.push(' ');
            pending_space = false;
        }
        collapsed.push(ch.to_ascii_lowercase());
    }

    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(collapsed.len());
    for (i, &ch) in chars.iter().enumerate() {
        match ch {
            ' ' => {
                if out.ends_with('(') || out.ends_with(' ') {
                    continue;
                }
                match chars.get(i + 1) {
                    Some(')') | Some(',') => continue,
                    _ => out.push(' '),
                }
            }
            ',' => {
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push_str(", ");
            }
            _ => out.push(ch),
        }
    }

    out.replace("calc(nan)", "0")
}

#[inline]
fn is_word_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'%' | b'#')
}

/// Extract either a full parenthesized run (when `input[start]` is `(`)
/// or a contiguous word of `[A-Za-z0-9-%#]`. Returns the slice and the
/// index just past it.
pub fn extract_balanced_expression(input: &str, start: usize) -> Result<(String, usize)> {
    let bytes = input.as_bytes();
    if start >= bytes.len() {
        return Err(Error::Parse(format!(
            "expected an expression at offset {} of {:?}",
            start, input
        )));
    }

    if bytes[start] == b'(' {
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().skip(start) {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((input[start..=i].to_string(), i + 1));
                    }
                }
                _ => {}
            }
        }
        return Err(Error::Parse(format!(
            "unbalanced parentheses in {:?}",
            &input[start..]
        )));
    }

    let mut end = start;
    while end < bytes.len() && is_word_char(bytes[end]) {
        end += 1;
    }
    Ok((input[start..end].to_string(), end))
}

// ============================================================================
// Tokens
// ============================================================================

/// Unit attached to a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Bare number.
    None,
    /// Percent sign.
    Percent,
    /// Degrees.
    Deg,
    /// Radians.
    Rad,
    /// Gradians.
    Grad,
    /// Turns.
    Turn,
}

impl Unit {
    /// Convert a unit-suffixed value into degrees. Only meaningful for the
    /// angle units.
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            Unit::Deg | Unit::None => value,
            Unit::Rad => value.to_degrees(),
            Unit::Grad => value * 0.9,
            Unit::Turn => value * 360.0,
            Unit::Percent => value,
        }
    }
}

/// One token of a color-function payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `,`
    Comma,
    /// `/`
    Slash,
    /// The leading `from` keyword of relative syntax.
    From,
    /// Bare identifier, including `#hex` words and named colors.
    Ident(String),
    /// A balanced call such as `calc(...)`, `hsl(...)` or `color(...)`,
    /// stored with its full text.
    Call(String),
    /// Signed numeric literal with an optional unit.
    Number {
        /// The numeric value before unit conversion.
        value: f64,
        /// The attached unit.
        unit: Unit,
    },
}

fn parse_unit(text: &str) -> Option<Unit> {
    match text {
        "" => Some(Unit::None),
        "deg" => Some(Unit::Deg),
        "rad" => Some(Unit::Rad),
        "grad" => Some(Unit::Grad),
        "turn" => Some(Unit::Turn),
        _ => None,
    }
}

/// Tokenize the payload of a color function (the text between the outer
/// parens). `from` is recognized only as the first word.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' => i += 1,
            b',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => {
                if (b == b'+' || b == b'-')
                    && !matches!(bytes.get(i + 1), Some(c) if c.is_ascii_digit() || *c == b'.')
                {
                    // Signed identifier such as `-infinity`.
                    let (word, end) = extract_word_signed(input, i)?;
                    i = end;
                    tokens.push(Token::Ident(word));
                    continue;
                }
                let (token, end) = scan_number(input, i)?;
                i = end;
                tokens.push(token);
            }
            _ if b.is_ascii_alphabetic() || b == b'#' => {
                let (word, end) = extract_balanced_expression(input, i)?;
                i = end;
                if bytes.get(i) == Some(&b'(') {
                    let (call, end) = extract_balanced_expression(input, i)?;
                    i = end;
                    tokens.push(Token::Call(format!("{}{}", word, call)));
                } else if word == "from" && tokens.is_empty() {
                    tokens.push(Token::From);
                } else {
                    tokens.push(Token::Ident(word));
                }
            }
            _ => {
                return Err(Error::Parse(format!(
                    "unexpected character {:?} at offset {} of {:?}",
                    b as char, i, input
                )));
            }
        }
    }

    Ok(tokens)
}

fn extract_word_signed(input: &str, start: usize) -> Result<(String, usize)> {
    let (word, end) = extract_balanced_expression(input, start + 1)?;
    if word.is_empty() {
        return Err(Error::Parse(format!(
            "dangling sign at offset {} of {:?}",
            start, input
        )));
    }
    let sign = &input[start..start + 1];
    Ok((format!("{}{}", sign, word), end))
}

pub(crate) fn scan_number(input: &str, start: usize) -> Result<(Token, usize)> {
    let bytes = input.as_bytes();
    let mut i = start;

    if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i == digits_start {
        return Err(Error::Parse(format!(
            "malformed numeric literal at offset {} of {:?}",
            start, input
        )));
    }
    // Exponent only when followed by a digit or a signed digit.
    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        if matches!(bytes.get(j), Some(c) if c.is_ascii_digit()) {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let value: f64 = input[start..i]
        .parse()
        .map_err(|_| Error::Parse(format!("malformed numeric literal {:?}", &input[start..i])))?;

    if bytes.get(i) == Some(&b'%') {
        return Ok((
            Token::Number {
                value,
                unit: Unit::Percent,
            },
            i + 1,
        ));
    }

    let suffix_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let unit = parse_unit(&input[suffix_start..i]).ok_or_else(|| {
        Error::Parse(format!(
            "invalid unit {:?} on numeric literal",
            &input[suffix_start..i]
        ))
    })?;

    Ok((Token::Number { value, unit }, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_collapses_whitespace() {
        assert_eq!(clean("  RGB( 255,  87 , 51 ) "), "rgb(255, 87, 51)");
    }

    #[test]
    fn test_clean_normalizes_comma_padding() {
        assert_eq!(clean("hsl(10,20%,30%)"), "hsl(10, 20%, 30%)");
    }

    #[test]
    fn test_clean_rewrites_calc_nan() {
        assert_eq!(clean("hsl(none calc(NaN) 50%)"), "hsl(none 0 50%)");
        assert_eq!(clean("hsl(none calc( NaN ) 50%)"), "hsl(none 0 50%)");
    }

    #[test]
    fn test_extract_balanced_parens() {
        let (expr, end) = extract_balanced_expression("calc(1 + (2 * 3)) tail", 4).unwrap();
        assert_eq!(expr, "(1 + (2 * 3))");
        assert_eq!(end, 17);
    }

    #[test]
    fn test_extract_word() {
        let (word, end) = extract_balanced_expression("display-p3 1 0 0", 0).unwrap();
        assert_eq!(word, "display-p3");
        assert_eq!(end, 10);
    }

    #[test]
    fn test_extract_unbalanced_is_error() {
        assert!(extract_balanced_expression("(1 + (2)", 0).is_err());
    }

    #[test]
    fn test_tokenize_modern() {
        let tokens = tokenize("255 87 51 / 0.5").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[3], Token::Slash);
        assert_eq!(
            tokens[4],
            Token::Number {
                value: 0.5,
                unit: Unit::None
            }
        );
    }

    #[test]
    fn test_tokenize_units() {
        let tokens = tokenize("120deg 50% 1.5turn").unwrap();
        assert_eq!(
            tokens[0],
            Token::Number {
                value: 120.0,
                unit: Unit::Deg
            }
        );
        assert_eq!(
            tokens[1],
            Token::Number {
                value: 50.0,
                unit: Unit::Percent
            }
        );
        assert_eq!(
            tokens[2],
            Token::Number {
                value: 1.5,
                unit: Unit::Turn
            }
        );
    }

    #[test]
    fn test_tokenize_relative() {
        let tokens = tokenize("from #ff0000 calc(r * 0.5) g b").unwrap();
        assert_eq!(tokens[0], Token::From);
        assert_eq!(tokens[1], Token::Ident("#ff0000".into()));
        assert_eq!(tokens[2], Token::Call("calc(r * 0.5)".into()));
        assert_eq!(tokens[3], Token::Ident("g".into()));
    }

    #[test]
    fn test_tokenize_nested_origin() {
        let tokens = tokenize("from hsl(120 100% 50%) h s l").unwrap();
        assert_eq!(tokens[0], Token::From);
        assert_eq!(tokens[1], Token::Call("hsl(120 100% 50%)".into()));
    }

    #[test]
    fn test_tokenize_from_only_first() {
        // `from` is an ordinary identifier anywhere else.
        let tokens = tokenize("1 from 2").unwrap();
        assert_eq!(tokens[1], Token::Ident("from".into()));
    }

    #[test]
    fn test_tokenize_negative_and_exponent() {
        let tokens = tokenize("-0.5 1e2 +3").unwrap();
        assert_eq!(
            tokens[0],
            Token::Number {
                value: -0.5,
                unit: Unit::None
            }
        );
        assert_eq!(
            tokens[1],
            Token::Number {
                value: 100.0,
                unit: Unit::None
            }
        );
        assert_eq!(
            tokens[2],
            Token::Number {
                value: 3.0,
                unit: Unit::None
            }
        );
    }

    #[test]
    fn test_tokenize_signed_identifier() {
        let tokens = tokenize("-infinity").unwrap();
        assert_eq!(tokens[0], Token::Ident("-infinity".into()));
    }

    #[test]
    fn test_tokenize_bad_unit() {
        assert!(tokenize("10px").is_err());
    }
}
