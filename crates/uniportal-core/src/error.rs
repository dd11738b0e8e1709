// ── Core error types ──
//
// Failures the portal layer can hit before or around a controller call.
// Controller-side failures pass through unchanged as `Api`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// Missing or malformed caller input. Never retried.
    #[error("{message}")]
    Validation { message: String },

    /// The decoded controller key names no stored controller.
    #[error("Controller '{controller_id}' not found")]
    ControllerNotFound { controller_id: String },

    #[error(transparent)]
    Api(#[from] uniportal_api::Error),
}

impl PortalError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Input-class errors: the caller sent something unusable.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::ControllerNotFound { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_rate_limited())
    }
}
