use loupe_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("'{0}' not found")]
    NotFound(String),

    /// A readable access path was required and none could be established.
    #[error("property '{class}::{property}' is not readable")]
    NotReadable { class: String, property: String },

    /// A writable access path was required and none could be established.
    #[error("property '{class}::{property}' is not writable")]
    NotWritable { class: String, property: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}
