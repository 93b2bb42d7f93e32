//! Runtime class and object model.
//!
//! This crate is the reflection substrate the rest of the toolkit
//! orchestrates: class descriptors with properties, methods and constants,
//! a process-local registry with case-insensitive name lookup, and plain
//! object instances whose fields can be read and written by name. It does
//! not parse anything; classes are registered by embedders (or by the
//! source-introspection layer when a file is known to be loaded).

mod class;
mod error;
mod object;
mod value;

pub use class::{
    ClassBuilder, ClassDef, ClassId, ClassKind, ClassRegistry, FunctionDef, MethodDef, NativeBody,
    ParamDef, PropertyDef, Visibility,
};
pub use error::ModelError;
pub use object::Object;
pub use value::Value;
