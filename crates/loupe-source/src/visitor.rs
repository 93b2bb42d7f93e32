use crate::scope::Scope;
use crate::token::{Token, TokenKind};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Events yielded while walking a token stream.
///
/// Scope events for a token are yielded before the token itself, so a
/// consumer inspecting `current_scope()` when it receives a `Token` sees
/// the scope that token belongs to.
#[derive(Debug)]
pub enum VisitEvent<'a> {
    Token { index: usize, token: &'a Token },
    ScopeOpened(Scope),
    ScopeClosed(Scope),
}

/// Single-pass scope-tracking scanner over a flat token stream.
///
/// Reconstructs block structure from brace matching and declaration
/// terminators alone, with one stack of open scopes and a single pending
/// declaration register as the only state. Pull-based: a consumer that
/// stops iterating early leaves the rest of the stream unvisited, which
/// is how sub-range re-scans over one structure's body are done.
pub struct ScopeVisitor<'a> {
    tokens: &'a [Token],
    start: usize,
    /// Exclusive end of the scan range.
    end: usize,
    cursor: usize,
    stack: SmallVec<[Scope; 8]>,
    pending: Option<usize>,
    queue: VecDeque<VisitEvent<'a>>,
}

impl<'a> ScopeVisitor<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self::with_range(tokens, 0, tokens.len())
    }

    /// Restrict the scan to a token index sub-range. Bounds are clamped
    /// to the stream and reordered so start <= end.
    pub fn with_range(tokens: &'a [Token], start: usize, end: usize) -> Self {
        let start = start.min(tokens.len());
        let end = end.min(tokens.len());
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        ScopeVisitor {
            tokens,
            start,
            end,
            cursor: start,
            stack: SmallVec::new(),
            pending: None,
            queue: VecDeque::new(),
        }
    }

    pub fn range(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Innermost open scope, if any.
    pub fn current_scope(&self) -> Option<&Scope> {
        self.stack.last()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn process(&mut self, index: usize) {
        let token = &self.tokens[index];
        match token.kind {
            TokenKind::OpenTag => {
                // The file-level scope is owned by the open tag itself.
                self.pending = Some(index);
                self.open_scope(index);
            }
            TokenKind::Namespace | TokenKind::Interface | TokenKind::Trait => {
                self.pending = Some(index);
            }
            TokenKind::Class => {
                // `Foo::class` is a constant access, not a declaration.
                if !self.follows_double_colon(index) {
                    self.pending = Some(index);
                }
            }
            TokenKind::Function => {
                if self.function_declares_scope() {
                    self.pending = Some(index);
                }
            }
            TokenKind::Text => {
                if token.is_open_brace() {
                    self.open_scope(index);
                } else if token.is_close_brace() {
                    self.close_scope(index);
                } else if token.is_semicolon() {
                    if let Some(pending) = self.pending {
                        match self.tokens[pending].kind {
                            // Brace-less namespace form: the scope opens at
                            // the terminator and runs to end of stream.
                            TokenKind::Namespace => self.open_scope(index),
                            // Body-less function (interface or abstract
                            // method, `use function` import).
                            TokenKind::Function => self.pending = None,
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
        self.queue.push_back(VisitEvent::Token { index, token });
    }

    fn follows_double_colon(&self, index: usize) -> bool {
        let mut i = index;
        while i > 0 {
            i -= 1;
            let token = &self.tokens[i];
            if token.is_ignorable() {
                continue;
            }
            return token.kind == TokenKind::DoubleColon;
        }
        false
    }

    /// A `function` keyword only opens a declaration scope for free
    /// functions and class/trait methods; interface members and nested
    /// closures inside function bodies do not qualify.
    fn function_declares_scope(&self) -> bool {
        let Some(scope) = self.stack.last() else {
            return false;
        };
        let Some(decl) = scope.decl else {
            return false;
        };
        matches!(
            self.tokens[decl].kind,
            TokenKind::OpenTag | TokenKind::Namespace | TokenKind::Trait | TokenKind::Class
        )
    }

    fn open_scope(&mut self, index: usize) {
        let mut scope = Scope::open(self.stack.len(), index);
        if let Some(top) = self.stack.last() {
            scope.parent_decl = top.decl;
        }
        scope.decl = self.pending.take();
        self.stack.push(scope);
        self.queue.push_back(VisitEvent::ScopeOpened(scope));
    }

    fn close_scope(&mut self, index: usize) {
        // A stray closing brace outside any scope is ignored.
        if let Some(mut scope) = self.stack.pop() {
            scope.end = index.min(self.end.saturating_sub(1));
            self.queue.push_back(VisitEvent::ScopeClosed(scope));
        }
    }
}

impl<'a> Iterator for ScopeVisitor<'a> {
    type Item = VisitEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.cursor < self.end {
                let index = self.cursor;
                self.cursor += 1;
                self.process(index);
                continue;
            }
            // Stream exhausted: force-close anything still open, ends
            // clamped to the last in-range index.
            let mut scope = self.stack.pop()?;
            scope.end = self.end.saturating_sub(1);
            return Some(VisitEvent::ScopeClosed(scope));
        }
    }
}

/// First index at or after `index` that is not a whitespace token.
pub(crate) fn skip_whitespace(tokens: &[Token], mut index: usize) -> usize {
    while index < tokens.len() && tokens[index].kind == TokenKind::Whitespace {
        index += 1;
    }
    index
}

/// Documentation comment text immediately preceding `index`, scanning
/// backward over ignorable tokens only.
pub(crate) fn doc_comment_before(tokens: &[Token], index: usize) -> String {
    let mut comment = String::new();
    let mut i = index as isize;
    while i >= 0 {
        let token = &tokens[i as usize];
        if token.kind == TokenKind::DocComment {
            comment.insert_str(0, &token.text);
        } else if !token.is_ignorable() {
            break;
        }
        i -= 1;
    }
    comment
}
