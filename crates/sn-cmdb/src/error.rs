//! Errors raised by configuration-item operations.

use sn_connectors::ConnectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmdbError {
    /// Required attributes missing; raised before any remote call.
    #[error("CI data validation failed: {0}")]
    Validation(String),

    /// Propagated unchanged from the record client.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// The remote returned a body that does not have the expected shape.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl CmdbError {
    pub fn is_validation(&self) -> bool {
        matches!(self, CmdbError::Validation(_))
    }

    /// HTTP status of a propagated remote error.
    pub fn status(&self) -> Option<u16> {
        match self {
            CmdbError::Connector(e) => e.status(),
            _ => None,
        }
    }
}

pub type CmdbResult<T> = Result<T, CmdbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_error_is_transparent() {
        let err: CmdbError = ConnectorError::Http {
            status: 403,
            body: "ACL".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "HTTP 403: ACL");
        assert_eq!(err.status(), Some(403));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_message() {
        let err = CmdbError::Validation("missing ci_type".to_string());
        assert!(err.is_validation());
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("missing ci_type"));
    }
}
