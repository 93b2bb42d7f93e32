use serde::Serialize;
use std::fmt;

/// Token categories produced by the lexer.
///
/// Only the kinds the scope scanner cares about are distinguished;
/// punctuation and operators with no structural meaning fall through as
/// one-character `Text` tokens, the way `token_get_all()` hands back bare
/// strings for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    OpenTag,
    CloseTag,
    InlineHtml,
    Namespace,
    Use,
    Const,
    Function,
    Interface,
    Trait,
    Class,
    As,
    Identifier,
    NsSeparator,
    DoubleColon,
    Variable,
    Number,
    StringLiteral,
    Whitespace,
    Comment,
    DocComment,
    Text,
}

impl TokenKind {
    /// Whitespace and comments carry no structure; scanners skip them.
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::DocComment
        )
    }
}

/// One raw source token: kind, text and 1-based source line.
///
/// Immutable once produced; the position in the stream is the index of
/// the token in the owning slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: u32) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn is_ignorable(&self) -> bool {
        self.kind.is_ignorable()
    }

    pub fn is_text(&self, text: &str) -> bool {
        self.kind == TokenKind::Text && self.text == text
    }

    pub fn is_open_brace(&self) -> bool {
        self.is_text("{")
    }

    pub fn is_close_brace(&self) -> bool {
        self.is_text("}")
    }

    pub fn is_semicolon(&self) -> bool {
        self.is_text(";")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
