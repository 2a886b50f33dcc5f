//! Restricted literal parser.
//!
//! A small recursive-descent parser over the parameter field of a
//! request line. The accepted grammar is literals only:
//!
//! ```text
//! value    := number | string | bool | seq | map
//! number   := integer or float, optional sign and exponent
//! string   := '...' or "..." with \\ \' \" \n \t \r \0 escapes
//! bool     := true | false | True | False
//! seq      := '(' items ')' | '[' items ']'
//! map      := '{' value ':' value {',' value ':' value} [','] '}'
//! ```
//!
//! `(x)` with a single item and no comma is the parenthesized value
//! itself, and `(x,)` is a one-element sequence. The whole input must
//! be consumed; trailing content is an error.

use crate::error::{MuxError, Result};

use super::Value;

/// Decode a complete literal from `input`.
///
/// Fails with [`MuxError::InvalidParams`] on any syntax error; the
/// message names the offending character and byte offset so it can be
/// surfaced verbatim in a FAILED reply.
pub fn parse_literal(input: &str) -> Result<Value> {
    let mut p = Parser::new(input);
    p.skip_ws();
    let value = p.parse_value()?;
    p.skip_ws();
    if let Some(c) = p.peek() {
        return Err(p.err_at(&format!("unexpected trailing '{}'", c)));
    }
    Ok(value)
}

/// Whether `s` begins like a literal (as opposed to a bare word).
///
/// Used by the request parser to tell "a fourth field that failed to
/// decode" apart from "a fifth field that should not be there".
pub(crate) fn starts_like_literal(s: &str) -> bool {
    let s = s.trim_start();
    match s.chars().next() {
        Some(c) if "([{\"'".contains(c) => true,
        Some(c) if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' => true,
        _ => {
            let word: String = s.chars().take_while(|c| c.is_alphanumeric()).collect();
            matches!(word.as_str(), "true" | "false" | "True" | "False")
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn err_at(&self, msg: &str) -> MuxError {
        MuxError::InvalidParams(format!("{} at offset {}", msg, self.pos))
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.peek() {
            None => Err(self.err_at("unexpected end of input")),
            Some('(') => self.parse_seq('(', ')'),
            Some('[') => self.parse_seq('[', ']'),
            Some('{') => self.parse_map(),
            Some(c) if c == '"' || c == '\'' => self.parse_string(c),
            Some(c) if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() => self.parse_keyword(),
            Some(c) => Err(self.err_at(&format!("unexpected character '{}'", c))),
        }
    }

    fn parse_keyword(&mut self) -> Result<Value> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric()) {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            word => {
                self.pos = start;
                Err(self.err_at(&format!("unknown word '{}'", word)))
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        let mut is_float = false;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    self.bump();
                }
                '.' | 'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    // allow a sign right after the exponent marker
                    if (c == 'e' || c == 'E')
                        && matches!(self.peek(), Some('+') | Some('-'))
                    {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.err_at(&format!("bad number '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.err_at(&format!("bad number '{}'", text)))
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<Value> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err_at("unterminated string")),
                Some(c) if c == quote => return Ok(Value::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some(c) => {
                        return Err(
                            self.err_at(&format!("unknown escape '\\{}'", c))
                        )
                    }
                    None => return Err(self.err_at("unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_seq(&mut self, open: char, close: char) -> Result<Value> {
        self.bump(); // opening bracket
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(self.err_at(&format!("expected '{}'", close))),
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                _ => {}
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    saw_comma = true;
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    return Err(self.err_at(&format!(
                        "expected ',' or '{}', found '{}'",
                        close, c
                    )))
                }
                None => return Err(self.err_at(&format!("expected '{}'", close))),
            }
        }
        // (x) is a parenthesized value, (x,) is a one-element sequence
        if open == '(' && !saw_comma {
            if let [only] = items.as_slice() {
                return Ok(only.clone());
            }
        }
        Ok(Value::Seq(items))
    }

    fn parse_map(&mut self) -> Result<Value> {
        self.bump(); // '{'
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(self.err_at("expected '}'")),
                Some('}') => {
                    self.bump();
                    break;
                }
                _ => {}
            }
            let key = self.parse_value()?;
            self.skip_ws();
            match self.peek() {
                Some(':') => {
                    self.bump();
                }
                _ => return Err(self.err_at("expected ':' after mapping key")),
            }
            self.skip_ws();
            let value = self.parse_value()?;
            entries.push((key, value));
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some('}') => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    return Err(
                        self.err_at(&format!("expected ',' or '}}', found '{}'", c))
                    )
                }
                None => return Err(self.err_at("expected '}'")),
            }
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(parse_literal("42").unwrap(), Value::Int(42));
        assert_eq!(parse_literal("-7").unwrap(), Value::Int(-7));
        assert_eq!(parse_literal("+3").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_floats() {
        assert_eq!(parse_literal("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(parse_literal("-0.25").unwrap(), Value::Float(-0.25));
        assert_eq!(parse_literal("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(parse_literal("1.5e-2").unwrap(), Value::Float(0.015));
    }

    #[test]
    fn test_strings_both_quotes() {
        assert_eq!(
            parse_literal("\"hello\"").unwrap(),
            Value::Str("hello".into())
        );
        assert_eq!(parse_literal("'hi'").unwrap(), Value::Str("hi".into()));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            parse_literal(r#""a\nb\t\"c\"""#).unwrap(),
            Value::Str("a\nb\t\"c\"".into())
        );
        assert_eq!(
            parse_literal(r"'it\'s'").unwrap(),
            Value::Str("it's".into())
        );
    }

    #[test]
    fn test_booleans_both_capitalizations() {
        assert_eq!(parse_literal("true").unwrap(), Value::Bool(true));
        assert_eq!(parse_literal("True").unwrap(), Value::Bool(true));
        assert_eq!(parse_literal("false").unwrap(), Value::Bool(false));
        assert_eq!(parse_literal("False").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_tuple_sequence() {
        assert_eq!(
            parse_literal("(1, 2, 3)").unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_bracket_sequence() {
        assert_eq!(
            parse_literal("[1, 'a']").unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Str("a".into())])
        );
    }

    #[test]
    fn test_empty_sequences() {
        assert_eq!(parse_literal("()").unwrap(), Value::Seq(vec![]));
        assert_eq!(parse_literal("[]").unwrap(), Value::Seq(vec![]));
    }

    #[test]
    fn test_parenthesized_value_is_not_a_sequence() {
        assert_eq!(parse_literal("(5)").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_one_element_tuple_needs_trailing_comma() {
        assert_eq!(
            parse_literal("(5,)").unwrap(),
            Value::Seq(vec![Value::Int(5)])
        );
    }

    #[test]
    fn test_trailing_comma_allowed() {
        assert_eq!(
            parse_literal("[1, 2,]").unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_nested() {
        assert_eq!(
            parse_literal("((1, 2), [3])").unwrap(),
            Value::Seq(vec![
                Value::Seq(vec![Value::Int(1), Value::Int(2)]),
                Value::Seq(vec![Value::Int(3)]),
            ])
        );
    }

    #[test]
    fn test_map() {
        assert_eq!(
            parse_literal("{'speed': 2.5, 'reverse': False}").unwrap(),
            Value::Map(vec![
                (Value::Str("speed".into()), Value::Float(2.5)),
                (Value::Str("reverse".into()), Value::Bool(false)),
            ])
        );
    }

    #[test]
    fn test_empty_map() {
        assert_eq!(parse_literal("{}").unwrap(), Value::Map(vec![]));
    }

    #[test]
    fn test_whole_input_must_be_consumed() {
        let err = parse_literal("(1, 2) garbage").unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_bare_word_rejected() {
        let err = parse_literal("grab").unwrap_err();
        assert!(matches!(err, MuxError::InvalidParams(_)));
        assert!(err.to_string().contains("grab"));
    }

    #[test]
    fn test_unterminated_inputs() {
        assert!(parse_literal("(1, 2").is_err());
        assert!(parse_literal("'abc").is_err());
        assert!(parse_literal("{'a': 1").is_err());
        assert!(parse_literal("{'a' 1}").is_err());
    }

    #[test]
    fn test_error_carries_offset() {
        let err = parse_literal("(1, @)").unwrap_err();
        assert!(err.to_string().contains("offset 4"));
    }

    #[test]
    fn test_starts_like_literal() {
        assert!(starts_like_literal("(1, 2)"));
        assert!(starts_like_literal("[1]"));
        assert!(starts_like_literal("{'a': 1}"));
        assert!(starts_like_literal("'str'"));
        assert!(starts_like_literal("\"str\""));
        assert!(starts_like_literal("42"));
        assert!(starts_like_literal("-1.5"));
        assert!(starts_like_literal("True"));
        assert!(starts_like_literal("false"));
        assert!(!starts_like_literal("grab"));
        assert!(!starts_like_literal("extra field"));
    }
}
