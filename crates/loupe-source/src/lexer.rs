use crate::token::{Token, TokenKind};

/// Tokenize PHP source text into a flat token stream.
///
/// Mirrors the useful subset of `token_get_all()`: any byte sequence
/// tokenizes without error, keywords are matched case-insensitively, and
/// string literals are swallowed whole so a `class` keyword inside a
/// string can never be mistaken for a declaration. Heredoc bodies and the
/// full operator table are not modeled; unrecognized punctuation becomes
/// one-character `Text` tokens, which is all the scope scanner needs.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            src: source.as_bytes(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token> {
        while self.pos < self.src.len() {
            self.lex_html();
            if self.pos < self.src.len() {
                self.lex_php();
            }
        }
        self.tokens
    }

    /// Consume inline HTML up to the next open tag.
    fn lex_html(&mut self) {
        let start = self.pos;
        let start_line = self.line;
        while self.pos < self.src.len() {
            if self.src[self.pos] == b'<' && self.peek_open_tag().is_some() {
                break;
            }
            self.advance_byte();
        }
        if self.pos > start {
            self.push_span(TokenKind::InlineHtml, start, start_line);
        }
        if let Some(tag_len) = self.peek_open_tag() {
            let tag_start = self.pos;
            let tag_line = self.line;
            for _ in 0..tag_len {
                self.advance_byte();
            }
            self.push_span(TokenKind::OpenTag, tag_start, tag_line);
        }
    }

    fn peek_open_tag(&self) -> Option<usize> {
        let rest = &self.src[self.pos..];
        if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case(b"<?php") {
            Some(5)
        } else if rest.len() >= 3 && rest.starts_with(b"<?=") {
            Some(3)
        } else {
            None
        }
    }

    /// Consume PHP-mode tokens until a close tag or end of input.
    fn lex_php(&mut self) {
        while self.pos < self.src.len() {
            let start = self.pos;
            let start_line = self.line;
            let byte = self.src[self.pos];

            if byte == b'?' && self.src[self.pos..].starts_with(b"?>") {
                self.pos += 2;
                self.push_span(TokenKind::CloseTag, start, start_line);
                return;
            }

            if byte.is_ascii_whitespace() {
                while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
                    self.advance_byte();
                }
                self.push_span(TokenKind::Whitespace, start, start_line);
                continue;
            }

            if byte == b'/' && self.src[self.pos..].starts_with(b"//") {
                self.lex_line_comment(start, start_line);
                continue;
            }
            if byte == b'#' {
                self.lex_line_comment(start, start_line);
                continue;
            }
            if byte == b'/' && self.src[self.pos..].starts_with(b"/*") {
                self.lex_block_comment(start, start_line);
                continue;
            }

            if byte == b'\'' || byte == b'"' || byte == b'`' {
                self.lex_quoted(byte, start, start_line);
                continue;
            }

            if byte == b'$' {
                self.advance_byte();
                if self.pos < self.src.len() && is_ident_start(self.src[self.pos]) {
                    while self.pos < self.src.len() && is_ident_byte(self.src[self.pos]) {
                        self.advance_byte();
                    }
                    self.push_span(TokenKind::Variable, start, start_line);
                } else {
                    self.push_span(TokenKind::Text, start, start_line);
                }
                continue;
            }

            if byte.is_ascii_digit() {
                self.lex_number(start, start_line);
                continue;
            }

            if is_ident_start(byte) {
                while self.pos < self.src.len() && is_ident_byte(self.src[self.pos]) {
                    self.advance_byte();
                }
                let text = &self.src[start..self.pos];
                self.push_span(keyword_kind(text), start, start_line);
                continue;
            }

            if byte == b'\\' {
                self.advance_byte();
                self.push_span(TokenKind::NsSeparator, start, start_line);
                continue;
            }

            if byte == b':' && self.src[self.pos..].starts_with(b"::") {
                self.pos += 2;
                self.push_span(TokenKind::DoubleColon, start, start_line);
                continue;
            }

            // Bare punctuation or operator fragment.
            self.advance_byte();
            self.push_span(TokenKind::Text, start, start_line);
        }
    }

    fn lex_line_comment(&mut self, start: usize, start_line: u32) {
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            // A close tag ends a line comment in PHP.
            if self.src[self.pos] == b'?' && self.src[self.pos..].starts_with(b"?>") {
                break;
            }
            self.advance_byte();
        }
        self.push_span(TokenKind::Comment, start, start_line);
    }

    fn lex_block_comment(&mut self, start: usize, start_line: u32) {
        self.pos += 2;
        while self.pos < self.src.len() {
            if self.src[self.pos] == b'*' && self.src[self.pos..].starts_with(b"*/") {
                self.pos += 2;
                break;
            }
            self.advance_byte();
        }
        let text = &self.src[start..self.pos];
        let kind = if text.starts_with(b"/**") && text.len() > 4 {
            TokenKind::DocComment
        } else {
            TokenKind::Comment
        };
        self.push_span(kind, start, start_line);
    }

    fn lex_quoted(&mut self, quote: u8, start: usize, start_line: u32) {
        self.advance_byte();
        while self.pos < self.src.len() {
            let byte = self.src[self.pos];
            if byte == b'\\' && self.pos + 1 < self.src.len() {
                self.advance_byte();
                self.advance_byte();
                continue;
            }
            self.advance_byte();
            if byte == quote {
                break;
            }
        }
        self.push_span(TokenKind::StringLiteral, start, start_line);
    }

    fn lex_number(&mut self, start: usize, start_line: u32) {
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_alphanumeric()
                || self.src[self.pos] == b'_'
                || self.src[self.pos] == b'.')
        {
            self.advance_byte();
        }
        self.push_span(TokenKind::Number, start, start_line);
    }

    fn advance_byte(&mut self) {
        if self.src[self.pos] == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn push_span(&mut self, kind: TokenKind, start: usize, line: u32) {
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.tokens.push(Token::new(kind, text, line));
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte >= 0x80
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

fn keyword_kind(word: &[u8]) -> TokenKind {
    if word.eq_ignore_ascii_case(b"namespace") {
        TokenKind::Namespace
    } else if word.eq_ignore_ascii_case(b"use") {
        TokenKind::Use
    } else if word.eq_ignore_ascii_case(b"const") {
        TokenKind::Const
    } else if word.eq_ignore_ascii_case(b"function") {
        TokenKind::Function
    } else if word.eq_ignore_ascii_case(b"interface") {
        TokenKind::Interface
    } else if word.eq_ignore_ascii_case(b"trait") {
        TokenKind::Trait
    } else if word.eq_ignore_ascii_case(b"class") {
        TokenKind::Class
    } else if word.eq_ignore_ascii_case(b"as") {
        TokenKind::As
    } else {
        TokenKind::Identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn meaningful(source: &str) -> Vec<Token> {
        tokenize(source)
            .into_iter()
            .filter(|token| !token.is_ignorable())
            .collect()
    }

    #[test]
    fn open_tag_and_keywords() {
        let tokens = meaningful("<?php namespace Foo;");
        assert_eq!(tokens[0].kind, TokenKind::OpenTag);
        assert_eq!(tokens[1].kind, TokenKind::Namespace);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].text, "Foo");
        assert!(tokens[3].is_semicolon());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let tokens = meaningful("<?php CLASS Foo {}");
        assert_eq!(tokens[1].kind, TokenKind::Class);
    }

    #[test]
    fn class_keyword_inside_string_is_a_string() {
        let tokens = meaningful("<?php $a = 'class Foo {';");
        assert!(
            tokens
                .iter()
                .all(|token| token.kind != TokenKind::Class && !token.is_open_brace())
        );
        assert!(
            tokens
                .iter()
                .any(|token| token.kind == TokenKind::StringLiteral)
        );
    }

    #[test]
    fn double_colon_and_ns_separator() {
        let tokens = meaningful("<?php \\Foo\\Bar::class;");
        assert_eq!(tokens[1].kind, TokenKind::NsSeparator);
        assert_eq!(tokens[3].kind, TokenKind::NsSeparator);
        assert_eq!(tokens[5].kind, TokenKind::DoubleColon);
        assert_eq!(tokens[6].kind, TokenKind::Class);
    }

    #[test]
    fn comments_and_doc_comments() {
        let tokens = tokenize("<?php // line\n/* block */ /** doc */ /**/ $x;");
        let comment_kinds: Vec<TokenKind> = tokens
            .iter()
            .filter(|token| token.kind.is_ignorable() && token.kind != TokenKind::Whitespace)
            .map(|token| token.kind)
            .collect();
        assert_eq!(
            comment_kinds,
            vec![
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::DocComment,
                TokenKind::Comment,
            ]
        );
    }

    #[test]
    fn inline_html_around_tags() {
        let kinds = kinds("before<?php $x; ?>after");
        assert_eq!(kinds[0], TokenKind::InlineHtml);
        assert!(kinds.contains(&TokenKind::CloseTag));
        assert_eq!(*kinds.last().unwrap(), TokenKind::InlineHtml);
    }

    #[test]
    fn line_numbers_are_tracked() {
        let tokens = tokenize("<?php\n\nclass Foo\n{\n}\n");
        let class_token = tokens
            .iter()
            .find(|token| token.kind == TokenKind::Class)
            .unwrap();
        assert_eq!(class_token.line, 3);
        let brace = tokens.iter().find(|token| token.is_open_brace()).unwrap();
        assert_eq!(brace.line, 4);
    }

    #[test]
    fn escaped_quotes_stay_inside_the_literal() {
        let tokens = meaningful(r#"<?php $a = "he said \"hi\""; $b = 'it\'s';"#);
        let strings: Vec<&Token> = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::StringLiteral)
            .collect();
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[0].text, r#""he said \"hi\"""#);
        assert_eq!(strings[1].text, r"'it\'s'");
    }
}
