use thiserror::Error;

/// Errors raised while declaring, looking up or assigning properties.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("property `{0}` is already declared")]
    Duplicate(String),
    #[error("unknown property `{0}`")]
    NotFound(String),
    #[error("property `{name}` could not parse `{value}`: {reason}")]
    Parse {
        name: String,
        value: String,
        reason: String,
    },
    #[error("property `{name}` expected {expected} value but received {actual}")]
    WrongType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("property `{0}` has no value")]
    Unset(String),
}
