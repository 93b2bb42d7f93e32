//! PHP source file introspection.
//!
//! Recovers the structural facts a compiler front end would know about a
//! source file without executing it: declared namespaces, `use` imports
//! and aliases, free functions, constants, interfaces, traits and classes,
//! together with their nesting scopes. Statement and expression bodies are
//! never parsed; the scanner tracks scope boundaries and declaration
//! headers over a flat token stream.

mod constant;
mod doc_comment;
mod error;
mod file;
mod lexer;
mod scope;
mod token;
mod visitor;

pub use constant::{Constant, ConstantValue};
pub use doc_comment::{DocComment, TypeDeclaration};
pub use error::SourceError;
pub use file::{
    DeclarationKind, FileFlags, FunctionHandle, LookupOptions, SourceFile, StructureHandle,
};
pub use lexer::tokenize;
pub use scope::Scope;
pub use token::{Token, TokenKind};
pub use visitor::{ScopeVisitor, VisitEvent};
