use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::constants::request::MISSING_FIELD;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Missing data for required fields: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        translator_response: Option<Value>,
    },
    #[error("Missing required plugins: {}", .0.join(","))]
    MissingPlugins(Vec<String>),
    #[error("Connection protocol not defined.")]
    ProtocolNotDefined,
    #[error("Connection protocol {0} is not supported.")]
    UnsupportedProtocol(String),
    #[error("Insufficient resource configurations.")]
    InsufficientResource,
    #[error("Request failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Internal(String),
}

impl ConnectorError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        ConnectorError::Status {
            status,
            message: message.into(),
            translator_response: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(404, message)
    }

    pub fn timed_out() -> Self {
        Self::status(522, "Connection timed out.")
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            ConnectorError::Validation(_) => 422,
            ConnectorError::Status { status, .. } => *status,
            _ => 500,
        }
    }

    /// Validation errors render as a `path -> [message]` map, everything else as text.
    pub fn message(&self) -> Value {
        match self {
            ConnectorError::Validation(paths) => Value::Object(
                paths
                    .iter()
                    .map(|p| (p.clone(), Value::from(vec![MISSING_FIELD])))
                    .collect::<Map<_, _>>(),
            ),
            other => Value::String(other.to_string()),
        }
    }

    pub fn translator_response(&self) -> Option<&Value> {
        match self {
            ConnectorError::Status {
                translator_response,
                ..
            } => translator_response.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translator_response: Option<Value>,
}

/// `{error: {status, message, translator_response?}}` as returned to callers.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

impl From<&ConnectorError> for ErrorEnvelope {
    fn from(err: &ConnectorError) -> Self {
        ErrorEnvelope {
            error: ErrorBody {
                status: err.http_status_code(),
                message: err.message(),
                translator_response: err.translator_response().cloned(),
            },
        }
    }
}
