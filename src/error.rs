//! Error types: JSON-RPC error codes, A2A protocol errors and the
//! client-side failures raised by the transport and session core.
//!
//! - Standard JSON-RPC 2.0 errors (-32700 through -32603)
//! - A2A-specific errors (-32001 through -32006)
//! - Client errors (connection, timeouts, HTTP status, card discovery, session store)

use crate::types::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// A2A-specific error codes
// ---------------------------------------------------------------------------

/// The requested task was not found.
pub const TASK_NOT_FOUND: i64 = -32001;

/// The task cannot be canceled in its current state.
pub const TASK_NOT_CANCELABLE: i64 = -32002;

/// Push notifications are not supported by this agent.
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;

/// The requested operation is not supported.
pub const UNSUPPORTED_OPERATION: i64 = -32004;

/// The content type is not supported.
pub const CONTENT_TYPE_NOT_SUPPORTED: i64 = -32005;

/// The agent returned an invalid response.
pub const INVALID_AGENT_RESPONSE: i64 = -32006;

// ---------------------------------------------------------------------------
// A2AError enum
// ---------------------------------------------------------------------------

/// Unified error type for the crate.
///
/// Protocol variants map one-to-one onto JSON-RPC error codes and are what the
/// reference server sends back. Client variants describe what went wrong while
/// talking to a remote agent; they are always surfaced to the caller and never
/// retried internally.
#[derive(Debug, Clone, thiserror::Error)]
pub enum A2AError {
    // -- Protocol errors. Each carries the JSON-RPC `message` and optional `data`. --
    /// Invalid JSON payload (code -32700).
    #[error("Parse error: {message}")]
    ParseError {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Request payload validation error (code -32600).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Method not found (code -32601).
    #[error("Method not found: {message}")]
    MethodNotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Invalid parameters (code -32602).
    #[error("Invalid params: {message}")]
    InvalidParams {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Internal error (code -32603).
    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Task not found (code -32001). Raised locally by the server, and
    /// by the client when a remote agent answers with this code.
    #[error("Task not found: {message}")]
    TaskNotFound {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Task cannot be canceled (code -32002).
    #[error("Task not cancelable: {message}")]
    TaskNotCancelable {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Push notifications not supported (code -32003).
    #[error("Push notification not supported: {message}")]
    PushNotificationNotSupported {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Operation not supported (code -32004).
    #[error("Unsupported operation: {message}")]
    UnsupportedOperation {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Content type not supported (code -32005).
    #[error("Content type not supported: {message}")]
    ContentTypeNotSupported {
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Invalid agent response (code -32006).
    #[error("Invalid agent response: {message}")]
    InvalidAgentResponse {
        message: String,
        data: Option<serde_json::Value>,
    },

    // -- Client-side errors (not A2A error codes) --
    /// The remote host could not be reached (DNS, TCP or TLS failure).
    #[error("Connection error: {0}")]
    Connection(String),

    /// The connection broke after it was established (body read, stream decode).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A request did not complete within its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A stream produced no event within the configured idle window.
    #[error("Idle timeout: no event received for {0:?}")]
    IdleTimeout(std::time::Duration),

    /// Non-2xx HTTP status, with the response body verbatim.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// No agent card was published at the well-known path.
    #[error("Agent card not found at {url}")]
    CardNotFound {
        /// The last URL that was tried.
        url: String,
    },

    /// The agent card was not valid JSON or lacked a required field.
    #[error("Agent card could not be parsed: {0}")]
    CardParse(String),

    /// Invalid JSON received from remote (parse or deserialization failure).
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A JSON-RPC error response with a code this crate has no variant for.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Session store I/O failure.
    #[error("Session store error: {0}")]
    Session(String),

    /// The push-notification receiver could not start.
    #[error("Push receiver error: {0}")]
    Push(String),

    /// Catch-all for errors that don't fit other categories.
    #[error("{0}")]
    Other(String),
}

/// Convenience result type for A2A operations.
pub type A2AResult<T> = Result<T, A2AError>;

impl A2AError {
    // -- Constructors for protocol errors without `data` --

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::MethodNotFound {
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            data: None,
        }
    }

    pub fn task_not_found(message: impl Into<String>) -> Self {
        Self::TaskNotFound {
            message: message.into(),
            data: None,
        }
    }

    pub fn task_not_cancelable(message: impl Into<String>) -> Self {
        Self::TaskNotCancelable {
            message: message.into(),
            data: None,
        }
    }

    pub fn push_notification_not_supported(message: impl Into<String>) -> Self {
        Self::PushNotificationNotSupported {
            message: message.into(),
            data: None,
        }
    }

    pub fn unsupported_operation(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
            data: None,
        }
    }

    /// Build the typed error for a JSON-RPC error object received from a
    /// remote agent. Task lookups and cancellations get their own variants
    /// so callers can match on them; everything else stays `JsonRpc`.
    pub fn from_remote(error: JsonRpcError) -> Self {
        match error.code {
            TASK_NOT_FOUND => A2AError::TaskNotFound {
                message: error.message,
                data: error.data,
            },
            TASK_NOT_CANCELABLE => A2AError::TaskNotCancelable {
                message: error.message,
                data: error.data,
            },
            code => A2AError::JsonRpc {
                code,
                message: error.message,
                data: error.data,
            },
        }
    }

    /// Returns the JSON-RPC error code for this error variant.
    ///
    /// Client-side errors that have no A2A code map to -32603 (internal error).
    pub fn code(&self) -> i64 {
        match self {
            A2AError::ParseError { .. } => PARSE_ERROR,
            A2AError::InvalidRequest { .. } => INVALID_REQUEST,
            A2AError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            A2AError::InvalidParams { .. } => INVALID_PARAMS,
            A2AError::InternalError { .. } => INTERNAL_ERROR,
            A2AError::TaskNotFound { .. } => TASK_NOT_FOUND,
            A2AError::TaskNotCancelable { .. } => TASK_NOT_CANCELABLE,
            A2AError::PushNotificationNotSupported { .. } => PUSH_NOTIFICATION_NOT_SUPPORTED,
            A2AError::UnsupportedOperation { .. } => UNSUPPORTED_OPERATION,
            A2AError::ContentTypeNotSupported { .. } => CONTENT_TYPE_NOT_SUPPORTED,
            A2AError::InvalidAgentResponse { .. } => INVALID_AGENT_RESPONSE,
            A2AError::JsonRpc { code, .. } => *code,
            A2AError::Connection(_)
            | A2AError::Transport(_)
            | A2AError::Timeout(_)
            | A2AError::IdleTimeout(_)
            | A2AError::Http { .. }
            | A2AError::CardNotFound { .. }
            | A2AError::CardParse(_)
            | A2AError::InvalidJson(_)
            | A2AError::Session(_)
            | A2AError::Push(_)
            | A2AError::Other(_) => INTERNAL_ERROR,
        }
    }

    /// Whether a caller may reasonably retry the operation.
    ///
    /// Nothing in this crate retries on its own; this only classifies.
    pub fn is_retryable(&self) -> bool {
        match self {
            A2AError::Connection(_) | A2AError::Timeout(_) | A2AError::IdleTimeout(_) => true,
            A2AError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<A2AError> for JsonRpcError {
    fn from(err: A2AError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let data = match &err {
            A2AError::ParseError { data, .. }
            | A2AError::InvalidRequest { data, .. }
            | A2AError::MethodNotFound { data, .. }
            | A2AError::InvalidParams { data, .. }
            | A2AError::InternalError { data, .. }
            | A2AError::TaskNotFound { data, .. }
            | A2AError::TaskNotCancelable { data, .. }
            | A2AError::PushNotificationNotSupported { data, .. }
            | A2AError::UnsupportedOperation { data, .. }
            | A2AError::ContentTypeNotSupported { data, .. }
            | A2AError::InvalidAgentResponse { data, .. }
            | A2AError::JsonRpc { data, .. } => data.clone(),
            _ => None,
        };
        JsonRpcError {
            code,
            message,
            data,
        }
    }
}

impl From<serde_json::Error> for A2AError {
    fn from(err: serde_json::Error) -> Self {
        A2AError::ParseError {
            message: err.to_string(),
            data: None,
        }
    }
}
