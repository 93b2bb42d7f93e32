use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("class '{0}' not found")]
    ClassNotFound(String),

    #[error("${1} is not a property of {0}")]
    PropertyNotFound(String, String),

    #[error("{0}::{1}() is not a method")]
    MethodNotFound(String, String),

    #[error("{method}() expects at least {expected} argument(s), {given} given")]
    ArgumentCount {
        method: String,
        expected: usize,
        given: usize,
    },

    #[error("invocation failed: {0}")]
    Invoke(String),
}
