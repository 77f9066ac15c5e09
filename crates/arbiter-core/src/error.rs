//! Error types for the arbiter

use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Broad classification of a [`CoreError`]
///
/// None of these are retried internally; recovery is always the caller's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller identity missing or unresolvable
    Authentication,
    /// Request is missing required fields or carries forbidden ones
    Validation,
    /// Caller is known but may not do this
    Authorization,
    /// A registration step has not happened yet, or happened already
    StateConflict,
    /// The secure random source failed
    FatalInfrastructure,
}

/// Errors that can occur in the arbiter core
#[derive(Error, Debug)]
pub enum CoreError {
    /// No API key was presented
    #[error("Missing API key")]
    MissingApiKey,

    /// The API key does not belong to any registered container
    #[error("Invalid API key")]
    UnknownApiKey,

    /// A required request field is absent or empty
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field that may not be set through this operation
    #[error("Field '{0}' cannot be set through this operation")]
    ForbiddenField(String),

    /// A path template could not be compiled
    #[error("Invalid path pattern '{template}': {reason}")]
    InvalidPattern { template: String, reason: String },

    /// A serialized token could not be decoded
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Caller has no grant covering the requested route
    #[error("Insufficient route permissions")]
    InsufficientPermissions,

    /// Only store containers may receive a root secret
    #[error("Container type \"{0}\" cannot use arbiter token minting capabilities as it is not a store type")]
    NotAStore(String),

    /// Target container is not in the registry
    #[error("Target {0} has not been approved for arbitering")]
    UnknownTarget(String),

    /// Target container exists but has not collected its secret yet
    #[error("Target {0} has not registered itself for arbitering")]
    TargetNotRegistered(String),

    /// Container was never given a type by the container manager
    #[error("Container type unknown by arbiter")]
    ContainerTypeUnknown,

    /// The root secret for this container was already handed out
    #[error("Store shared secret already retrieved")]
    SecretAlreadyIssued,

    /// The OS random number generator failed
    #[error("Secure random generation failed: {0}")]
    RandomSource(String),
}

impl CoreError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::MissingApiKey | CoreError::UnknownApiKey => ErrorKind::Authentication,
            CoreError::MissingField(_)
            | CoreError::ForbiddenField(_)
            | CoreError::InvalidPattern { .. }
            | CoreError::MalformedToken(_) => ErrorKind::Validation,
            CoreError::InsufficientPermissions | CoreError::NotAStore(_) => {
                ErrorKind::Authorization
            }
            CoreError::UnknownTarget(_)
            | CoreError::TargetNotRegistered(_)
            | CoreError::ContainerTypeUnknown
            | CoreError::SecretAlreadyIssued => ErrorKind::StateConflict,
            CoreError::RandomSource(_) => ErrorKind::FatalInfrastructure,
        }
    }
}

impl From<rand::Error> for CoreError {
    fn from(err: rand::Error) -> Self {
        CoreError::RandomSource(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_separate_authentication_from_authorization() {
        assert_eq!(CoreError::UnknownApiKey.kind(), ErrorKind::Authentication);
        assert_eq!(
            CoreError::InsufficientPermissions.kind(),
            ErrorKind::Authorization
        );
        assert_eq!(CoreError::SecretAlreadyIssued.kind(), ErrorKind::StateConflict);
        assert_eq!(
            CoreError::RandomSource("unavailable".into()).kind(),
            ErrorKind::FatalInfrastructure
        );
    }

    #[test]
    fn test_registration_gap_messages_name_target() {
        let err = CoreError::TargetNotRegistered("store-x".into());
        assert_eq!(
            err.to_string(),
            "Target store-x has not registered itself for arbitering"
        );
    }
}
