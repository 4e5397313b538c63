/// Errors surfaced while resolving a request against a provider.
///
/// Every lookup failure collapses into `NotFound`: a malformed identifier,
/// a registry that is not allowed, a registry that is not registered and a
/// path the registry cannot resolve all look the same to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServeError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServeError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        ServeError::NotFound(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServeError::NotFound(_))
    }
}

pub type ServeResult<T> = std::result::Result<T, ServeError>;
