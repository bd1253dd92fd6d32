//! Connector error types
//!
//! A single error taxonomy shared by every connector, with transient/permanent
//! classification so that callers can decide what to retry.

use thiserror::Error;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (usually transient)
    /// Failed to establish connection to target system.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network error during communication.
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The target answered with a status code the operation does not accept.
    ///
    /// `body` holds at most [`BODY_PREVIEW_LIMIT`] characters of the response.
    #[error("unexpected status {status} for {request}: {body}")]
    UnexpectedStatus {
        status: u16,
        request: String,
        body: String,
    },

    // Authentication errors (permanent)
    /// Invalid credentials provided.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    // Configuration and caller errors (permanent)
    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A call parameter is missing or malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// The operation is not supported for this object class.
    #[error("operation '{operation}' is not supported for object class '{object_class}'")]
    UnsupportedOperation {
        operation: String,
        object_class: String,
    },

    /// The search filter cannot be translated for the target system.
    #[error("unsupported filter: {message}")]
    UnsupportedFilter { message: String },

    // Schema errors
    /// Object class not found in schema.
    #[error("object class '{object_class}' not found in schema")]
    ObjectClassNotFound { object_class: String },

    /// Attribute not found in schema.
    #[error("attribute '{attribute}' not found in object class '{object_class}'")]
    AttributeNotFound {
        attribute: String,
        object_class: String,
    },

    /// Attribute exists but cannot be written.
    #[error("attribute '{attribute}' of object class '{object_class}' is read-only")]
    AttributeNotWritable {
        attribute: String,
        object_class: String,
    },

    // Operation errors
    /// Operation failed.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Object already exists in target system (create conflict).
    ///
    /// `uid` carries the identifier of the existing object when it could be
    /// resolved.
    #[error("object already exists: {identifier}")]
    ObjectAlreadyExists {
        identifier: String,
        uid: Option<String>,
    },

    /// Object not found in target system (update/delete target missing).
    #[error("object not found: {identifier}")]
    ObjectNotFound { identifier: String },

    /// A paging loop hit its safety ceiling before the target stopped
    /// returning further pages.
    #[error("page limit of {max_pages} exceeded while reading {resource}")]
    PageLimitExceeded { resource: String, max_pages: u32 },

    /// The target refused a password change.
    ///
    /// Callers may treat this as a soft failure, see
    /// [`ConnectorError::is_recoverable`].
    #[error("password change rejected: {message}")]
    PasswordChangeRejected { message: String },

    /// Invalid data format.
    #[error("invalid data: {message}")]
    InvalidData { message: String },
}

/// Maximum number of response body characters kept in [`ConnectorError::UnexpectedStatus`].
pub const BODY_PREVIEW_LIMIT: usize = 500;

impl ConnectorError {
    /// Check if this error is transient and the operation could be retried.
    ///
    /// Connectors never retry on their own; this is a hint for callers.
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::ConnectionFailed { .. } | ConnectorError::NetworkError { .. } => true,
            ConnectorError::UnexpectedStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Check if the caller may ignore this error and consider the rest of the
    /// operation applied.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConnectorError::PasswordChangeRejected { .. })
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::NetworkError { .. } => "NETWORK_ERROR",
            ConnectorError::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            ConnectorError::AuthenticationFailed => "AUTH_FAILED",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            ConnectorError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            ConnectorError::UnsupportedFilter { .. } => "UNSUPPORTED_FILTER",
            ConnectorError::ObjectClassNotFound { .. } => "OBJECT_CLASS_NOT_FOUND",
            ConnectorError::AttributeNotFound { .. } => "ATTRIBUTE_NOT_FOUND",
            ConnectorError::AttributeNotWritable { .. } => "ATTRIBUTE_NOT_WRITABLE",
            ConnectorError::OperationFailed { .. } => "OPERATION_FAILED",
            ConnectorError::ObjectAlreadyExists { .. } => "OBJECT_EXISTS",
            ConnectorError::ObjectNotFound { .. } => "OBJECT_NOT_FOUND",
            ConnectorError::PageLimitExceeded { .. } => "PAGE_LIMIT_EXCEEDED",
            ConnectorError::PasswordChangeRejected { .. } => "PASSWORD_REJECTED",
            ConnectorError::InvalidData { .. } => "INVALID_DATA",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        ConnectorError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ConnectorError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        ConnectorError::InvalidData {
            message: message.into(),
        }
    }

    /// Create an object not found error.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        ConnectorError::ObjectNotFound {
            identifier: identifier.into(),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>, object_class: impl Into<String>) -> Self {
        ConnectorError::UnsupportedOperation {
            operation: operation.into(),
            object_class: object_class.into(),
        }
    }

    /// Create an unexpected status error, truncating the body to
    /// [`BODY_PREVIEW_LIMIT`] characters.
    pub fn unexpected_status(status: u16, request: impl Into<String>, body: &str) -> Self {
        ConnectorError::UnexpectedStatus {
            status,
            request: request.into(),
            body: body.chars().take(BODY_PREVIEW_LIMIT).collect(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
