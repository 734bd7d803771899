use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use common::query_parser::{ExtractionError, QueryError};
use common::{Catalog, IncorrectPositionFormat, UnsupportedSource};

/// Failure talking to one catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("{catalog} request timed out after {timeout:?}")]
    Timeout { catalog: Catalog, timeout: Duration },

    #[error("{catalog} request failed: {message}")]
    Transport { catalog: Catalog, message: String },

    #[error("{catalog} returned HTTP status {status}")]
    HttpStatus { catalog: Catalog, status: u16 },

    #[error("{catalog} returned bad data: {message}")]
    BadResponse { catalog: Catalog, message: String },
}

/// Failure talking to the search index
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Transport(String),

    #[error("index returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("index returned bad data: {0}")]
    BadResponse(String),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The request itself is wrong
    ClientError,
    /// A catalog or the index misbehaved
    UpstreamError,
    ServerError,
}

impl StatusClass {
    pub fn status_code(&self) -> u16 {
        match self {
            StatusClass::ClientError => 400,
            StatusClass::UpstreamError => 502,
            StatusClass::ServerError => 500,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectError {
    #[error("Unbalanced parentheses in query: {0}")]
    UnbalancedQuery(String),

    #[error("Unable to parse query: {0}")]
    QuerySyntaxError(String),

    #[error("Unable to extract object names from query: {0}")]
    ExtractionError(String),

    #[error(transparent)]
    IncorrectPositionFormat(#[from] IncorrectPositionFormat),

    #[error(transparent)]
    UnsupportedSource(#[from] UnsupportedSource),

    #[error("{0}")]
    NoInputProvided(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("{}", describe_failures(.0))]
    BothCatalogsFailed(Vec<(Catalog, String)>),
}

fn describe_failures(failures: &[(Catalog, String)]) -> String {
    failures.iter()
        .map(|(catalog, reason)| format!("{} failed ({})", catalog, reason))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<ExtractionError> for ObjectError {
    fn from(e: ExtractionError) -> Self {
        match e.0 {
            QueryError::UnbalancedQuery(query) => ObjectError::UnbalancedQuery(query),
            QueryError::SyntaxError(err) => ObjectError::QuerySyntaxError(err.to_string()),
            other => ObjectError::ExtractionError(other.to_string()),
        }
    }
}

impl ObjectError {
    pub fn status_class(&self) -> StatusClass {
        match self {
            ObjectError::UnbalancedQuery(_)
            | ObjectError::QuerySyntaxError(_)
            | ObjectError::IncorrectPositionFormat(_)
            | ObjectError::UnsupportedSource(_)
            | ObjectError::NoInputProvided(_) => StatusClass::ClientError,
            ObjectError::Catalog(_)
            | ObjectError::Index(_)
            | ObjectError::BothCatalogsFailed(_) => StatusClass::UpstreamError,
            ObjectError::ExtractionError(_) => StatusClass::ServerError,
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            error: "Unable to get results!".to_string(),
            info: self.to_string(),
        }
    }
}

/// Error body returned to callers
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorPayload {
    #[serde(rename = "Error")]
    pub error: String,
    #[serde(rename = "Error Info")]
    pub info: String,
}

#[cfg(test)]
mod error_tests {
    use std::time::Duration;

    use common::query_parser::extract_objects;
    use common::{Catalog, UnsupportedSource};

    use crate::error::{CatalogError, IndexError, ObjectError, StatusClass};

    #[test]
    fn query_errors_keep_their_kind() {
        let err = ObjectError::from(extract_objects("object:(M31").unwrap_err());
        assert!(matches!(err, ObjectError::UnbalancedQuery(_)));
        assert_eq!(StatusClass::ClientError, err.status_class());

        let err = ObjectError::from(extract_objects("object:OR").unwrap_err());
        assert!(matches!(err, ObjectError::QuerySyntaxError(_)));
        assert_eq!(400, err.status_class().status_code());
    }

    #[test]
    fn both_catalogs_failed_message() {
        let err = ObjectError::BothCatalogsFailed(vec![
            (Catalog::Simbad, "timed out".to_string()),
            (Catalog::Ned, "no objects found".to_string()),
        ]);

        assert_eq!("SIMBAD failed (timed out), NED failed (no objects found)", err.to_string());
        assert_eq!(StatusClass::UpstreamError, err.status_class());
    }

    #[test]
    fn payload_shape() {
        let err = ObjectError::from(UnsupportedSource("foo".to_string()));
        let json = serde_json::to_value(err.payload()).unwrap();

        assert_eq!("Unable to get results!", json["Error"]);
        assert_eq!("Do not have method to get object data for this service: foo", json["Error Info"]);

        let err = ObjectError::from(CatalogError::Timeout { catalog: Catalog::Ned, timeout: Duration::from_secs(10) });
        assert_eq!("NED request timed out after 10s", err.payload().info);
        assert_eq!(502, err.status_class().status_code());

        let err = CatalogError::Timeout { catalog: Catalog::Simbad, timeout: Duration::from_millis(250) };
        assert_eq!("SIMBAD request timed out after 250ms", err.to_string());

        let err = ObjectError::from(IndexError::HttpStatus(500));
        assert_eq!("index returned HTTP status 500", err.payload().info);
        assert_eq!(StatusClass::UpstreamError, err.status_class());
    }
}
