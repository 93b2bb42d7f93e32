/// One lexical block reconstructed from the token stream: a file body, a
/// namespace, a structure body or a function body.
///
/// Declaration tokens are referenced by stream index rather than pointers;
/// the scope tree is implicit in the visitor's stack nesting, with only the
/// owning declaration of the parent scope carried along so a consumer can
/// tell a method (function inside a class) from a free function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    /// Stack depth at open time.
    pub level: usize,
    /// Index of the token that declared this scope (`namespace`, `class`,
    /// `function`, the open tag for the file scope), if any.
    pub decl: Option<usize>,
    /// Owning declaration token of the enclosing scope at open time.
    pub parent_decl: Option<usize>,
    /// Index of the first token of the scope (the brace or declaration
    /// terminator that opened it).
    pub start: usize,
    /// Index of the last token of the scope. `usize::MAX` until closed.
    pub end: usize,
}

impl Scope {
    pub(crate) fn open(level: usize, start: usize) -> Self {
        Scope {
            level,
            decl: None,
            parent_decl: None,
            start,
            end: usize::MAX,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end != usize::MAX
    }

    /// Token index range covered by the scope, inclusive bounds.
    pub fn range(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}
