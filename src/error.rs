//! Error types for apollo-client.

/// Result type alias for apollo-client operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading, syncing or reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to load the application configuration.
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// A listener key pattern is not a valid regular expression.
    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern
        pattern: String,
        /// Why the pattern failed to compile
        reason: String,
    },

    /// A request could not be sent or its response could not be read.
    #[error("Request to {url} failed: {message}")]
    Transport {
        /// Target URL
        url: String,
        /// Underlying failure
        message: String,
    },

    /// The server rejected the request with a client-side status.
    #[error("Request to {url} rejected with status {status}")]
    ClientStatus {
        /// Target URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Every attempt against a single host failed with a retryable outcome.
    #[error("Over max retries ({attempts}) still error for {url}")]
    MaxRetriesExceeded {
        /// Target URL
        url: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// Neither the primary address nor any known server is available.
    #[error("No reachable config server for {0}")]
    NoReachableHost(String),

    /// A response body, backup file or namespace content could not be decoded.
    #[error("Failed to decode: {0}")]
    Decode(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The client has been shut down.
    #[error("Client has been stopped")]
    Stopped,

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Whether this error should move the transport on to another server.
    ///
    /// Client-side rejections and decode failures are not transient; retrying
    /// them against a different host would produce the same answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::MaxRetriesExceeded { .. })
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let transport = ConfigError::Transport {
            url: "http://a/".to_string(),
            message: "connection refused".to_string(),
        };
        let exhausted = ConfigError::MaxRetriesExceeded {
            url: "http://a/".to_string(),
            attempts: 5,
        };
        let rejected = ConfigError::ClientStatus {
            url: "http://a/".to_string(),
            status: 404,
        };

        assert!(transport.is_transient());
        assert!(exhausted.is_transient());
        assert!(!rejected.is_transient());
        assert!(!ConfigError::Decode("bad".to_string()).is_transient());
        assert!(!ConfigError::NoReachableHost("http://a/".to_string()).is_transient());
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(ConfigError::from(err), ConfigError::Decode(_)));
    }
}
