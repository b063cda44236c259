use thiserror::Error;

/// Main error type for GNSS link operations
#[derive(Error, Debug)]
pub enum GnssError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Baud rate negotiation failed: {0}")]
    Negotiation(String),

    #[error("Replay error: {0}")]
    Replay(String),

    #[error("Timeout")]
    Timeout,

    #[error("Cancelled by shutdown")]
    Cancelled,
}

/// Result type alias for GNSS link operations
pub type GnssResult<T> = Result<T, GnssError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such device");
        let err: GnssError = io.into();
        assert!(matches!(err, GnssError::Connection(_)));
        assert!(err.to_string().contains("no such device"));
    }
}
