use crate::token::{Token, TokenKind};
use loupe_model::Value;
use std::fmt;

/// Value of a declared constant: either the raw source expression text or
/// the evaluated literal when the file was marked safe to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Raw(String),
    Evaluated(Value),
}

impl ConstantValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ConstantValue::Evaluated(value) => Some(value),
            ConstantValue::Raw(_) => None,
        }
    }

    pub fn source_text(&self) -> Option<&str> {
        match self {
            ConstantValue::Raw(text) => Some(text),
            ConstantValue::Evaluated(_) => None,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Raw(text) => write!(f, "{}", text),
            ConstantValue::Evaluated(value) => write!(f, "{}", value),
        }
    }
}

/// A class or free constant recovered from source.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    name: String,
    value: ConstantValue,
    doc_comment: String,
}

impl Constant {
    pub fn new(name: impl Into<String>, value: ConstantValue, doc_comment: String) -> Self {
        Constant {
            name: name.into(),
            value,
            doc_comment,
        }
    }

    /// Local (unqualified) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ConstantValue {
        &self.value
    }

    pub fn doc_comment(&self) -> &str {
        &self.doc_comment
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Evaluate a constant expression made of literal tokens.
///
/// Handles the shapes constant declarations actually use: scalar
/// literals, `true`/`false`/`null`, negated numbers and (nested) `[...]`
/// array literals of those. Anything else is not evaluated; the caller
/// keeps the raw source text instead.
pub(crate) fn evaluate_literal(tokens: &[&Token]) -> Option<Value> {
    let mut parser = LiteralParser { tokens, pos: 0 };
    let value = parser.parse_value()?;
    if parser.pos == tokens.len() {
        Some(value)
    } else {
        None
    }
}

struct LiteralParser<'a> {
    tokens: &'a [&'a Token],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn parse_value(&mut self) -> Option<Value> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::StringLiteral => {
                let unquoted = unquote(&token.text)?;
                self.bump();
                Some(Value::Str(unquoted))
            }
            TokenKind::Number => {
                self.bump();
                parse_number(&token.text)
            }
            TokenKind::Identifier => {
                self.bump();
                if token.text.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if token.text.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else if token.text.eq_ignore_ascii_case("null") {
                    Some(Value::Null)
                } else {
                    None
                }
            }
            TokenKind::Text if token.text == "-" => {
                self.bump();
                let number = self.bump()?;
                if number.kind != TokenKind::Number {
                    return None;
                }
                match parse_number(&number.text)? {
                    Value::Int(i) => Some(Value::Int(-i)),
                    Value::Float(f) => Some(Value::Float(-f)),
                    _ => None,
                }
            }
            TokenKind::Text if token.text == "[" => self.parse_array(),
            _ => None,
        }
    }

    fn parse_array(&mut self) -> Option<Value> {
        self.bump(); // [
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(token) if token.text == "]" => {
                    self.bump();
                    return Some(Value::Array(items));
                }
                Some(_) => {
                    items.push(self.parse_value()?);
                    match self.peek() {
                        Some(token) if token.text == "," => {
                            self.bump();
                        }
                        Some(token) if token.text == "]" => {}
                        _ => return None,
                    }
                }
                None => return None,
            }
        }
    }
}

fn parse_number(text: &str) -> Option<Value> {
    let cleaned = text.replace('_', "");
    if let Ok(int) = cleaned.parse::<i64>() {
        return Some(Value::Int(int));
    }
    cleaned.parse::<f64>().ok().map(Value::Float)
}

/// Strip quotes and resolve escapes in a string literal token. An
/// unterminated literal (the lexer tokenizes any byte sequence, so a
/// missing closing quote reaches here) is not a literal value; `None`
/// tells the caller to keep the raw source text.
fn unquote(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || bytes[bytes.len() - 1] != bytes[0] {
        return None;
    }
    let quote = bytes[0] as char;
    // The quote bytes are ASCII, so both slice bounds sit on char
    // boundaries.
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match (quote, next) {
            (_, '\\') => out.push('\\'),
            ('\'', '\'') => out.push('\''),
            ('\'', other) => {
                // Single-quoted strings only escape backslash and quote.
                out.push('\\');
                out.push(other);
            }
            ('"', '"') => out.push('"'),
            ('"', 'n') => out.push('\n'),
            ('"', 't') => out.push('\t'),
            ('"', 'r') => out.push('\r'),
            ('"', '$') => out.push('$'),
            ('"', '0') => out.push('\0'),
            (_, other) => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn eval(expression: &str) -> Option<Value> {
        let tokens = tokenize(&format!("<?php {}", expression));
        let meaningful: Vec<&Token> = tokens
            .iter()
            .skip(1)
            .filter(|token| !token.is_ignorable())
            .collect();
        evaluate_literal(&meaningful)
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(eval("'x'"), Some(Value::Str("x".into())));
        assert_eq!(eval("\"a\\nb\""), Some(Value::Str("a\nb".into())));
        assert_eq!(eval("42"), Some(Value::Int(42)));
        assert_eq!(eval("-42"), Some(Value::Int(-42)));
        assert_eq!(eval("6.55957"), Some(Value::Float(6.55957)));
        assert_eq!(eval("TRUE"), Some(Value::Bool(true)));
        assert_eq!(eval("null"), Some(Value::Null));
    }

    #[test]
    fn array_literals_with_trailing_comma() {
        assert_eq!(
            eval("['file', 'constant',]"),
            Some(Value::Array(vec![
                Value::Str("file".into()),
                Value::Str("constant".into()),
            ]))
        );
        assert_eq!(
            eval("[1, [2, 3]]"),
            Some(Value::Array(vec![
                Value::Int(1),
                Value::Array(vec![Value::Int(2), Value::Int(3)]),
            ]))
        );
    }

    #[test]
    fn non_literal_expressions_are_rejected() {
        assert_eq!(eval("1 + 2"), None);
        assert_eq!(eval("PHP_EOL"), None);
        assert_eq!(eval("self::OTHER"), None);
    }

    #[test]
    fn unterminated_literal_is_not_evaluated() {
        assert_eq!(eval("'dangling"), None);
        // A trailing multibyte character must not panic the scan.
        assert_eq!(eval("'é"), None);
        assert_eq!(eval("\"caf\u{e9}"), None);
    }

    #[test]
    fn single_quote_escapes() {
        assert_eq!(eval(r"'it\'s'"), Some(Value::Str("it's".into())));
        assert_eq!(eval(r"'a\nb'"), Some(Value::Str(r"a\nb".into())));
    }
}
