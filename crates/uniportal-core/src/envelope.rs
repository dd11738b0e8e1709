// Result envelope
//
// Every portal operation answers with the same JSON shape:
// `{status, data?, error?, rate_limited?, validation_error?}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;

use crate::error::PortalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
}

/// A single message, or every error a connection accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rate_limited: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub validation_error: bool,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            error: None,
            rate_limited: false,
            validation_error: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            data: None,
            error: Some(ErrorDetail::Message(message.into())),
            rate_limited: false,
            validation_error: false,
        }
    }

    /// Failure carrying a connection's whole error history.
    pub fn from_connection_errors(errors: &[uniportal_api::Error]) -> Self {
        Self {
            error: Some(ErrorDetail::List(
                errors.iter().map(ToString::to_string).collect(),
            )),
            rate_limited: errors.iter().any(uniportal_api::Error::is_rate_limited),
            ..Self::failure(String::new())
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl From<PortalError> for Envelope {
    fn from(err: PortalError) -> Self {
        if err.is_validation() {
            return Self {
                validation_error: true,
                ..Self::failure(format!("Invalid input: {err}"))
            };
        }
        Self {
            rate_limited: err.is_rate_limited(),
            ..Self::failure(err.to_string())
        }
    }
}

impl From<uniportal_api::Error> for Envelope {
    fn from(err: uniportal_api::Error) -> Self {
        PortalError::Api(err).into()
    }
}
