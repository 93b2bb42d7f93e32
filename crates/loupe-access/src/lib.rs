//! Field access policy over the loupe object model.
//!
//! Given an object, a field name and a set of requirement flags, this crate
//! decides whether a read or write goes directly to the field, through a
//! conventionally named accessor method, or nowhere at all, and surfaces a
//! descriptive failure when an explicit requirement cannot be met.

mod access;
mod binding;
mod error;
mod flags;

pub use access::ObjectAccess;
pub use binding::{BindingKind, MethodRef, PropertyBinding, PropertyRef};
pub use error::AccessError;
pub use flags::AccessFlags;
