// Error types for route registration, resolution and dispatch

use thiserror::Error;

/// Failure category, used by the dispatch boundary to pick a status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoRoutesForMethod,
    RouteNotFound,
    SegmentCountMismatch,
    InvalidPathParameter,
    TargetNotFound,
    MiddlewareNotFound,
    MiddlewareContractViolation,
    ControllerContractViolation,
    Http,
    Serialization,
    Io,
}

impl ErrorKind {
    /// Routing failures describe the request and render as 404.
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            ErrorKind::NoRoutesForMethod
                | ErrorKind::RouteNotFound
                | ErrorKind::SegmentCountMismatch
                | ErrorKind::InvalidPathParameter
        )
    }

    /// Configuration and contract failures describe the server and render as 500.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ErrorKind::TargetNotFound
                | ErrorKind::MiddlewareNotFound
                | ErrorKind::MiddlewareContractViolation
                | ErrorKind::ControllerContractViolation
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoRoutesForMethod => "no_routes_for_method",
            ErrorKind::RouteNotFound => "route_not_found",
            ErrorKind::SegmentCountMismatch => "segment_count_mismatch",
            ErrorKind::InvalidPathParameter => "invalid_path_parameter",
            ErrorKind::TargetNotFound => "target_not_found",
            ErrorKind::MiddlewareNotFound => "middleware_not_found",
            ErrorKind::MiddlewareContractViolation => "middleware_contract_violation",
            ErrorKind::ControllerContractViolation => "controller_contract_violation",
            ErrorKind::Http => "http",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("No routes registered for method: {0}")]
    NoRoutesForMethod(String),

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Segment count mismatch: pattern {pattern} has {expected} segments, uri {uri} has {actual}")]
    SegmentCountMismatch {
        pattern: String,
        uri: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid path parameter {name}: {value:?} is not alphanumeric")]
    InvalidPathParameter { name: String, value: String },

    #[error("Target not found: {0}")]
    TargetNotFound(String),

    #[error("Middleware not found: {0}")]
    MiddlewareNotFound(String),

    #[error("Middleware contract violation: {0}")]
    MiddlewareContractViolation(String),

    #[error("Controller contract violation: {0}")]
    ControllerContractViolation(String),

    /// Raised by handlers and middleware that want a specific status.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a handler-raised error with its own status.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoRoutesForMethod(_) => ErrorKind::NoRoutesForMethod,
            Error::RouteNotFound(_) => ErrorKind::RouteNotFound,
            Error::SegmentCountMismatch { .. } => ErrorKind::SegmentCountMismatch,
            Error::InvalidPathParameter { .. } => ErrorKind::InvalidPathParameter,
            Error::TargetNotFound(_) => ErrorKind::TargetNotFound,
            Error::MiddlewareNotFound(_) => ErrorKind::MiddlewareNotFound,
            Error::MiddlewareContractViolation(_) => ErrorKind::MiddlewareContractViolation,
            Error::ControllerContractViolation(_) => ErrorKind::ControllerContractViolation,
            Error::Http { .. } => ErrorKind::Http,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Http { status, .. } => *status,
            e if e.kind().is_routing() => 404,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_errors_map_to_404() {
        let errors = [
            Error::NoRoutesForMethod("PUT".into()),
            Error::RouteNotFound("GET /missing".into()),
            Error::SegmentCountMismatch {
                pattern: "/a/{b}".into(),
                uri: "/a".into(),
                expected: 2,
                actual: 1,
            },
            Error::InvalidPathParameter {
                name: "id".into(),
                value: "4!2".into(),
            },
        ];
        for err in errors {
            assert!(err.kind().is_routing(), "{err}");
            assert_eq!(err.status_code(), 404);
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_configuration_errors_map_to_500() {
        let errors = [
            Error::TargetNotFound("UserController@show".into()),
            Error::MiddlewareNotFound("auth".into()),
            Error::MiddlewareContractViolation("auth".into()),
            Error::ControllerContractViolation("UserController@show".into()),
        ];
        for err in errors {
            assert!(err.kind().is_configuration(), "{err}");
            assert_eq!(err.status_code(), 500);
            assert!(err.is_server_error());
        }
    }

    #[test]
    fn test_http_error_keeps_status() {
        let err = Error::http(401, "missing api key");
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.to_string(), "missing api key");
    }
}
