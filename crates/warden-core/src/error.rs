use thiserror::Error;

/// Errors raised while parsing permission strings, resource paths and URIs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionParseError {
    #[error("Empty permission string")]
    Empty,

    #[error("Malformed key/value pair `{0}` (expected key=value)")]
    MalformedPart(String),

    #[error("Unknown key `{0}`")]
    UnknownKey(String),

    #[error("Empty value for key `{0}`")]
    EmptyValue(String),

    #[error("Key `{key}` is out of order in `{input}`")]
    OutOfOrder { key: String, input: String },

    #[error("Permission must start with server=<name>: `{0}`")]
    MissingServer(String),

    #[error("Unknown action `{0}` (expected select, insert, all or *)")]
    UnknownAction(String),

    #[error("URI permissions only carry ALL, found action `{0}`")]
    UriAction(String),

    #[error("Action is not allowed in a resource path: `{0}`")]
    UnexpectedAction(String),

    #[error("Value `{value}` of key `{key}` contains a comma or control character")]
    ReservedCharacter { key: String, value: String },

    #[error("Invalid URI `{uri}`: {reason}")]
    InvalidUri { uri: String, reason: String },
}

impl PermissionParseError {
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PermissionParseError>;
