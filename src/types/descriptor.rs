//! This module defines the canonical, parsed representation of a column type
//! string, and the recursive-descent parser producing it.
//!
//! `Array(Nullable(Decimal(18, 6)))` becomes a `TypeDesc` named `Array` with one
//! `TypeParam::Type` child, and so on down. The parser understands:
//!
//! * nested parentheses and commas inside them,
//! * quoted strings with `\'` / `''` escapes (enum names, timezones, regexps),
//! * enum entries `'name' = -1`,
//! * named elements `a String`, `` `odd name` UInt8 ``, dotted JSON paths `a.b UInt32`,
//! * settings `max_types=8`,
//! * JSON clauses `SKIP a.b` and `SKIP REGEXP 'pattern'`.
//!
//! `Display` renders the canonical form used as the column type name, so
//! parsing is idempotent: `parse(parse(s).to_string()) == parse(s)`.

use std::fmt;

use crate::error::CodecError;

//==================================================================================
// 1. AST
//==================================================================================

/// A parsed column type: a head name plus an ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDesc {
    pub name: String,
    pub params: Vec<TypeParam>,
}

/// One parameter inside the parentheses of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeParam {
    /// A nested type, e.g. the `String` in `Nullable(String)`.
    Type(TypeDesc),
    /// A named element of a Tuple/Nested, or a typed JSON path.
    Named { name: String, ty: TypeDesc },
    /// An integer literal: precision, scale, size.
    Number(i64),
    /// A single-quoted literal: timezone, interval unit.
    Quoted(String),
    /// An enum entry `'name' = value`.
    EnumEntry { name: String, value: i64 },
    /// A `key=value` setting such as `max_dynamic_paths=16`.
    Setting { key: String, value: String },
    /// JSON `SKIP path`.
    Skip(String),
    /// JSON `SKIP REGEXP 'pattern'`.
    SkipRegexp(String),
}

impl TypeDesc {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: Vec<TypeParam>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Wraps `inner` as the single type parameter of `name`, e.g. `Nullable(inner)`.
    pub fn wrap(name: impl Into<String>, inner: TypeDesc) -> Self {
        Self::with_params(name, vec![TypeParam::Type(inner)])
    }

    /// Parses a type string.
    pub fn parse(input: &str) -> Result<Self, CodecError> {
        let mut parser = Parser::new(input);
        parser.skip_ws();
        let desc = parser.parse_type()?;
        parser.skip_ws();
        if !parser.at_end() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(desc)
    }

    /// Returns the nested type at `index`. Named elements yield their type.
    pub fn type_param(&self, index: usize) -> Option<&TypeDesc> {
        match self.params.get(index)? {
            TypeParam::Type(t) | TypeParam::Named { ty: t, .. } => Some(t),
            _ => None,
        }
    }

    pub fn number_param(&self, index: usize) -> Option<i64> {
        match self.params.get(index)? {
            TypeParam::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn quoted_param(&self, index: usize) -> Option<&str> {
        match self.params.get(index)? {
            TypeParam::Quoted(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value of a `key=value` setting parameter.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.params.iter().find_map(|p| match p {
            TypeParam::Setting { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn is_nullable(&self) -> bool {
        self.name == "Nullable"
    }
}

//==================================================================================
// 2. Canonical rendering
//==================================================================================

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.params.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeParam::Type(t) => write!(f, "{}", t),
            TypeParam::Named { name, ty } => write!(f, "{} {}", render_identifier(name), ty),
            TypeParam::Number(n) => write!(f, "{}", n),
            TypeParam::Quoted(s) => write!(f, "{}", quote(s)),
            TypeParam::EnumEntry { name, value } => write!(f, "{} = {}", quote(name), value),
            TypeParam::Setting { key, value } => write!(f, "{}={}", key, value),
            TypeParam::Skip(path) => write!(f, "SKIP {}", render_identifier(path)),
            TypeParam::SkipRegexp(pattern) => write!(f, "SKIP REGEXP {}", quote(pattern)),
        }
    }
}

/// Single-quotes `s`, escaping backslashes and quotes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn render_identifier(name: &str) -> String {
    if !name.is_empty() && name.chars().all(is_word_char) && !name.starts_with(|c: char| c.is_ascii_digit()) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "\\`"))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

//==================================================================================
// 3. Recursive-descent parser
//==================================================================================

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> CodecError {
        CodecError::TypeParse {
            input: self.input.to_string(),
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), CodecError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", expected)))
        }
    }

    fn parse_type(&mut self) -> Result<TypeDesc, CodecError> {
        let name = self.parse_word()?;
        self.parse_type_rest(name)
    }

    /// Parses the optional parameter list following an already-read head name.
    fn parse_type_rest(&mut self, name: String) -> Result<TypeDesc, CodecError> {
        self.skip_ws();
        let mut desc = TypeDesc::new(name);
        if self.peek() == Some('(') {
            self.pos += 1;
            desc.params = self.parse_params()?;
            self.expect(')')?;
        }
        Ok(desc)
    }

    fn parse_params(&mut self) -> Result<Vec<TypeParam>, CodecError> {
        let mut params = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(')') {
                break;
            }
            params.push(self.parse_param()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => break,
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<TypeParam, CodecError> {
        match self.peek() {
            Some('\'') => {
                let literal = self.parse_quoted()?;
                self.skip_ws();
                if self.peek() == Some('=') {
                    self.pos += 1;
                    self.skip_ws();
                    let value = self.parse_number()?;
                    Ok(TypeParam::EnumEntry {
                        name: literal,
                        value,
                    })
                } else {
                    Ok(TypeParam::Quoted(literal))
                }
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => {
                Ok(TypeParam::Number(self.parse_number()?))
            }
            Some(c) if c == '`' || is_word_char(c) => self.parse_word_param(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_word_param(&mut self) -> Result<TypeParam, CodecError> {
        let backquoted = self.peek() == Some('`');
        let word = self.parse_word()?;
        self.skip_ws();

        if !backquoted && word == "SKIP" {
            return self.parse_skip();
        }

        match self.peek() {
            Some('=') => {
                self.pos += 1;
                self.skip_ws();
                let value = match self.peek() {
                    Some('\'') => self.parse_quoted()?,
                    _ => self.parse_word()?,
                };
                Ok(TypeParam::Setting { key: word, value })
            }
            Some('(') if !backquoted => Ok(TypeParam::Type(self.parse_type_rest(word)?)),
            Some(c) if c == '`' || is_word_char(c) => {
                let ty = self.parse_type()?;
                Ok(TypeParam::Named { name: word, ty })
            }
            _ if backquoted => Err(self.error("expected a type after element name")),
            _ => Ok(TypeParam::Type(TypeDesc::new(word))),
        }
    }

    fn parse_skip(&mut self) -> Result<TypeParam, CodecError> {
        let save = self.pos;
        if self.peek() != Some('`') {
            let next = self.parse_word()?;
            if next == "REGEXP" {
                self.skip_ws();
                return Ok(TypeParam::SkipRegexp(self.parse_quoted()?));
            }
            self.pos = save;
        }
        Ok(TypeParam::Skip(self.parse_word()?))
    }

    /// Reads an identifier, a dotted path, or a backquoted name.
    fn parse_word(&mut self) -> Result<String, CodecError> {
        if self.peek() == Some('`') {
            self.pos += 1;
            let mut out = String::new();
            loop {
                match self.peek() {
                    Some('\\') => {
                        self.pos += 1;
                        match self.peek() {
                            Some(c) => out.push(c),
                            None => return Err(self.error("unterminated backquoted name")),
                        }
                    }
                    Some('`') => {
                        self.pos += 1;
                        return Ok(out);
                    }
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated backquoted name")),
                }
                self.pos += 1;
            }
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_word_char(c)) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a type name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_quoted(&mut self) -> Result<String, CodecError> {
        self.expect('\'')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => out.push(c),
                        None => return Err(self.error("unterminated string literal")),
                    }
                    self.pos += 1;
                }
                Some('\'') => {
                    self.pos += 1;
                    // `''` inside a literal is an escaped quote.
                    if self.peek() == Some('\'') {
                        out.push('\'');
                        self.pos += 1;
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated string literal")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<i64, CodecError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<i64>()
            .map_err(|_| self.error("expected an integer literal"))
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_and_nested() {
        let t = TypeDesc::parse("Array(Nullable(Decimal(18,6)))").unwrap();
        assert_eq!(t.name, "Array");
        let inner = t.type_param(0).unwrap();
        assert_eq!(inner.name, "Nullable");
        let dec = inner.type_param(0).unwrap();
        assert_eq!(dec.name, "Decimal");
        assert_eq!(dec.params, vec![TypeParam::Number(18), TypeParam::Number(6)]);
        assert_eq!(t.to_string(), "Array(Nullable(Decimal(18, 6)))");
    }

    #[test]
    fn test_parameters_are_order_significant() {
        let a = TypeDesc::parse("Decimal(18,6)").unwrap();
        let b = TypeDesc::parse("Decimal(6,18)").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_enum_with_commas_and_quotes() {
        let t = TypeDesc::parse("Enum8('a, b' = 1, 'it''s' = -2, 'x\\'y' = 3)").unwrap();
        assert_eq!(
            t.params,
            vec![
                TypeParam::EnumEntry { name: "a, b".into(), value: 1 },
                TypeParam::EnumEntry { name: "it's".into(), value: -2 },
                TypeParam::EnumEntry { name: "x'y".into(), value: 3 },
            ]
        );
    }

    #[test]
    fn test_named_tuple_and_map() {
        let t = TypeDesc::parse("Tuple(a String, `b c` Map(String, Array(UInt8)))").unwrap();
        match &t.params[1] {
            TypeParam::Named { name, ty } => {
                assert_eq!(name, "b c");
                assert_eq!(ty.to_string(), "Map(String, Array(UInt8))");
            }
            other => panic!("unexpected param {:?}", other),
        }
        assert_eq!(t.to_string(), "Tuple(a String, `b c` Map(String, Array(UInt8)))");
    }

    #[test]
    fn test_json_clauses() {
        let t = TypeDesc::parse(
            "JSON(max_dynamic_paths=8, a.b UInt32, SKIP a.c, SKIP REGEXP 'tmp.*')",
        )
        .unwrap();
        assert_eq!(t.setting("max_dynamic_paths"), Some("8"));
        assert_eq!(
            t.params[1],
            TypeParam::Named { name: "a.b".into(), ty: TypeDesc::new("UInt32") }
        );
        assert_eq!(t.params[2], TypeParam::Skip("a.c".into()));
        assert_eq!(t.params[3], TypeParam::SkipRegexp("tmp.*".into()));
    }

    #[test]
    fn test_datetime64_with_timezone() {
        let t = TypeDesc::parse("DateTime64(3, 'Europe/Amsterdam')").unwrap();
        assert_eq!(t.number_param(0), Some(3));
        assert_eq!(t.quoted_param(1), Some("Europe/Amsterdam"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let inputs = [
            "LowCardinality(Nullable(String))",
            "Enum16('a' = 1,'b'=2)",
            "Variant(Int64,String,Array(UInt8))",
            "JSON(SKIP REGEXP 'x''y', name String)",
            "Dynamic(max_types=10)",
            "Nested(id UInt32, `na me` String)",
            "SimpleAggregateFunction(sum, UInt64)",
        ];
        for input in inputs {
            let once = TypeDesc::parse(input).unwrap();
            let twice = TypeDesc::parse(&once.to_string()).unwrap();
            assert_eq!(once, twice, "input: {}", input);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(TypeDesc::parse("Array(String").is_err());
        assert!(TypeDesc::parse("Array(String))").is_err());
        assert!(TypeDesc::parse("Enum8('a = 1)").is_err());
        assert!(TypeDesc::parse("").is_err());
    }
}
