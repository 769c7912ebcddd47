//! Error types for Tusk

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TuskError>;

#[derive(Error, Debug)]
pub enum TuskError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Credential storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TuskError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            TuskError::InvalidInput(_) => 3,
            TuskError::Remote(RemoteError::Authentication(_)) => 2,
            TuskError::Remote(_) => 1,
            TuskError::Config(_) => 1,
            TuskError::Credential(_) | TuskError::Storage(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CredentialError {
    #[error("Credential not found: {0}")]
    NotFound(String),

    #[error("OS keyring unavailable: {0}")]
    KeyringUnavailable(String),

    #[error("Keyring operation failed: {0}")]
    Keyring(String),

    #[error("Credential file error: {0}")]
    File(String),
}

/// Failures reported by the remote collaborator.
///
/// Cloneable and comparable so they can travel inside actions and be kept in
/// the errors slice.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Request rejected: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl RemoteError {
    /// True when the remote service says the access token is unusable.
    pub fn is_authentication(&self) -> bool {
        matches!(self, RemoteError::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = TuskError::InvalidInput("Empty instance".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = TuskError::Remote(RemoteError::Authentication("The access token is invalid".to_string()));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_remote_errors() {
        for remote in [
            RemoteError::Validation("test".to_string()),
            RemoteError::Network("test".to_string()),
            RemoteError::RateLimit("test".to_string()),
            RemoteError::Parse("test".to_string()),
        ] {
            assert_eq!(TuskError::Remote(remote).exit_code(), 1);
        }
    }

    #[test]
    fn test_exit_code_credential_error() {
        let error = TuskError::Credential(CredentialError::NotFound("abc.token".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting() {
        let error = TuskError::Remote(RemoteError::Network("connection refused".to_string()));
        assert_eq!(format!("{}", error), "Remote error: Network error: connection refused");

        let error = TuskError::Config(ConfigError::MissingField("instance.default".to_string()));
        assert_eq!(
            format!("{}", error),
            "Configuration error: Missing required field: instance.default"
        );
    }

    #[test]
    fn test_error_conversion_from_credential_error() {
        let error: TuskError = CredentialError::Keyring("locked".to_string()).into();
        match error {
            TuskError::Credential(_) => {}
            _ => panic!("Expected TuskError::Credential"),
        }
    }

    #[test]
    fn test_is_authentication() {
        assert!(RemoteError::Authentication("401".to_string()).is_authentication());
        assert!(!RemoteError::Network("timeout".to_string()).is_authentication());
    }
}
