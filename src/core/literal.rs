// src/core/literal.rs

//! A literal-only grammar for `store_eval` arguments.
//!
//! Accepts numbers, quoted strings, booleans, null, lists, tuples and
//! mappings. Names, calls, attribute access and operators are rejected, so
//! evaluating user input can never run code.
//!
//! Integers may use `0x`, `0o` and `0b` prefixes and must fit in 64 bits.

use crate::constants::MAX_LITERAL_DEPTH;
use crate::models::Value;
use indexmap::IndexMap;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed literal at position {position}: {message}")]
pub struct LiteralError {
    pub position: usize,
    pub message: String,
}

/// Parses `source` as a single literal value.
pub fn parse_literal(source: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser {
        source,
        chars: source.char_indices().peekable(),
        depth: 0,
    };
    parser.skip_whitespace();
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    match parser.chars.peek() {
        None => Ok(value),
        Some(&(position, c)) => Err(parser.error_at(position, format!("unexpected '{c}'"))),
    }
}

struct LiteralParser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl LiteralParser<'_> {
    fn error_at(&self, position: usize, message: impl Into<String>) -> LiteralError {
        LiteralError {
            position,
            message: message.into(),
        }
    }

    fn position(&mut self) -> usize {
        self.chars
            .peek()
            .map_or(self.source.len(), |&(index, _)| index)
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_whitespace();
        let position = self.position();
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((_, c)) => Err(self.error_at(position, format!("expected '{expected}', found '{c}'"))),
            None => Err(self.error_at(position, format!("expected '{expected}', found end of input"))),
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_whitespace();
        let position = self.position();
        let Some(&(_, c)) = self.chars.peek() else {
            return Err(self.error_at(position, "unexpected end of input"));
        };
        match c {
            '\'' | '"' => self.parse_string().map(Value::Str),
            '[' => self.nested(|parser| parser.parse_sequence(']').map(|(items, _)| Value::List(items))),
            '(' => self.nested(Self::parse_tuple),
            '{' => self.nested(Self::parse_mapping),
            '-' | '+' | '.' | '0'..='9' => self.parse_number(),
            c if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            other => Err(self.error_at(position, format!("unexpected '{other}'"))),
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_LITERAL_DEPTH {
            let position = self.position();
            return Err(self.error_at(position, "nesting is too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Parses comma-separated values up to `close`. Returns the values and
    /// whether a trailing comma was seen.
    fn parse_sequence(&mut self, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        self.chars.next();
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_whitespace();
            if self.chars.next_if(|&(_, c)| c == close).is_some() {
                return Ok((items, trailing_comma));
            }
            items.push(self.parse_value()?);
            self.skip_whitespace();
            trailing_comma = self.chars.next_if(|&(_, c)| c == ',').is_some();
            if !trailing_comma {
                self.expect(close)?;
                return Ok((items, false));
            }
        }
    }

    fn parse_tuple(&mut self) -> Result<Value, LiteralError> {
        let (mut items, trailing_comma) = self.parse_sequence(')')?;
        // A parenthesised single value is just that value.
        if items.len() == 1 && !trailing_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::List(items))
    }

    fn parse_mapping(&mut self) -> Result<Value, LiteralError> {
        self.chars.next();
        let mut entries = IndexMap::new();
        loop {
            self.skip_whitespace();
            if self.chars.next_if(|&(_, c)| c == '}').is_some() {
                return Ok(Value::Map(entries));
            }
            let key_position = self.position();
            let key = match self.parse_value()? {
                Value::Str(key) => key,
                Value::Null => "null".to_string(),
                key @ (Value::Bool(_) | Value::Int(_) | Value::Float(_)) => key.to_string(),
                other => {
                    return Err(self.error_at(
                        key_position,
                        format!("a {} cannot be used as a mapping key", other.kind()),
                    ));
                }
            };
            self.skip_whitespace();
            if self.chars.peek().is_some_and(|&(_, c)| c == ',' || c == '}') {
                return Err(self.error_at(key_position, "set literals are not supported"));
            }
            self.expect(':')?;
            let value = self.parse_value()?;
            entries.insert(key, value);
            self.skip_whitespace();
            if self.chars.next_if(|&(_, c)| c == ',').is_none() {
                self.expect('}')?;
                return Ok(Value::Map(entries));
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let Some((start, quote)) = self.chars.next() else {
            return Err(self.error_at(self.source.len(), "unexpected end of input"));
        };
        let mut value = String::new();
        loop {
            let Some((position, c)) = self.chars.next() else {
                return Err(self.error_at(start, "unterminated string"));
            };
            match c {
                c if c == quote => return Ok(value),
                '\\' => self.parse_escape(position, &mut value)?,
                c => value.push(c),
            }
        }
    }

    fn parse_escape(&mut self, position: usize, value: &mut String) -> Result<(), LiteralError> {
        let Some((_, c)) = self.chars.next() else {
            return Err(self.error_at(position, "unterminated string"));
        };
        match c {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0' => value.push('\0'),
            '\\' | '\'' | '"' => value.push(c),
            'x' => value.push(self.parse_code_point(position, 2)?),
            'u' => value.push(self.parse_code_point(position, 4)?),
            // Unknown escapes are kept as written.
            other => {
                value.push('\\');
                value.push(other);
            }
        }
        Ok(())
    }

    fn parse_code_point(&mut self, position: usize, digits: usize) -> Result<char, LiteralError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.chars.next_if(|&(_, c)| c.is_ascii_hexdigit()) {
                Some((_, c)) => hex.push(c),
                None => return Err(self.error_at(position, "truncated escape sequence")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error_at(position, format!("invalid code point \\{hex}")))
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.position();
        let mut text = String::new();
        if let Some((_, sign)) = self.chars.next_if(|&(_, c)| c == '-' || c == '+') {
            text.push(sign);
        }
        let mut is_float = false;
        while let Some((_, c)) = self
            .chars
            .next_if(|&(_, c)| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
        {
            if matches!(c, '+' | '-') && !text.ends_with(['e', 'E']) {
                return Err(self.error_at(start, "operators are not allowed in literals"));
            }
            if matches!(c, '.' | 'e' | 'E') {
                is_float = true;
            }
            if c != '_' {
                text.push(c);
            }
        }

        let parsed = match radix_integer(&text) {
            Some(radix_parsed) => radix_parsed.map(Value::Int),
            None if is_float => text.parse::<f64>().ok().map(Value::Float),
            None => text.parse::<i64>().ok().map(Value::Int),
        };
        parsed.ok_or_else(|| self.error_at(start, format!("invalid number '{text}'")))
    }

    fn parse_keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.position();
        let mut word = String::new();
        while let Some((_, c)) = self.chars.next_if(|&(_, c)| c.is_alphanumeric() || c == '_') {
            word.push(c);
        }
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            _ => Err(self.error_at(
                start,
                format!("names are not allowed in literals: '{word}'"),
            )),
        }
    }
}

/// Parses `0x`, `0o` and `0b` integers. `None` when `text` has no radix
/// prefix; `Some(None)` when it has one but does not parse.
fn radix_integer(text: &str) -> Option<Option<i64>> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let radix = match unsigned.get(..2)?.to_ascii_lowercase().as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let magnitude = unsigned
        .get(2..)
        .filter(|digits| !digits.starts_with(['+', '-']))
        .and_then(|digits| i64::from_str_radix(digits, radix).ok());
    Some(magnitude.map(|value| if negative { -value } else { value }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_scalars() {
        assert_eq!(parse_literal("42").unwrap(), Value::Int(42));
        assert_eq!(parse_literal("-1_000").unwrap(), Value::Int(-1000));
        assert_eq!(parse_literal("2.5e3").unwrap(), Value::Float(2500.0));
        assert_eq!(parse_literal("True").unwrap(), Value::Bool(true));
        assert_eq!(parse_literal("null").unwrap(), Value::Null);
        assert_eq!(parse_literal(r#"'it\'s'"#).unwrap(), Value::from("it's"));
        assert_eq!(parse_literal(r#""\x41é""#).unwrap(), Value::from("Aé"));
    }

    #[test]
    fn test_parses_prefixed_integers() {
        assert_eq!(parse_literal("0x10").unwrap(), Value::Int(16));
        assert_eq!(parse_literal("0XfF").unwrap(), Value::Int(255));
        assert_eq!(parse_literal("-0o17").unwrap(), Value::Int(-15));
        assert_eq!(parse_literal("0b1010_1010").unwrap(), Value::Int(170));
        assert_eq!(parse_literal("[0x1, 2]").unwrap(), Value::from(vec![1, 2]));
        for source in ["0x", "0b102", "0x1e-1", "99999999999999999999"] {
            assert!(parse_literal(source).is_err(), "accepted {source}");
        }
    }

    #[test]
    fn test_parses_nested_containers() {
        let value = parse_literal("{'a': [1, 2, (3,)], 'b': {'c': None}, 1: 'x'}").unwrap();
        let map = value.as_map().unwrap();
        assert_eq!(
            map.get("a"),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::Int(2),
                Value::List(vec![Value::Int(3)]),
            ]))
        );
        assert_eq!(map.get("1"), Some(&Value::from("x")));
        assert_eq!(
            parse_literal("[1, 2, 3]").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_parenthesised_value_unwraps() {
        assert_eq!(parse_literal("(7)").unwrap(), Value::Int(7));
        assert_eq!(parse_literal("()").unwrap(), Value::List(vec![]));
    }

    #[test]
    fn test_rejects_code() {
        for source in [
            "__import__('os')",
            "os.system('ls')",
            "1 + 2",
            "[x for x in y]",
            "lambda: 0",
            "{1, 2}",
        ] {
            assert!(parse_literal(source).is_err(), "accepted {source}");
        }
    }

    #[test]
    fn test_reports_trailing_input_and_depth() {
        assert!(parse_literal("[1] 2").is_err());
        assert!(parse_literal("'open").is_err());
        let deep = "[".repeat(MAX_LITERAL_DEPTH + 1) + &"]".repeat(MAX_LITERAL_DEPTH + 1);
        assert!(parse_literal(&deep).is_err());
    }
}
