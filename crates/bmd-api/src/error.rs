use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use bmd_core::notice::Notices;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    /// Send the browser elsewhere, carrying the messages to show there.
    #[error("redirect to {location}")]
    Redirect { location: String, messages: Notices },

    #[error("backend error: {0}")]
    Backend(#[from] bmd_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn redirect(location: impl Into<String>, messages: Notices) -> Self {
        ApiError::Redirect {
            location: location.into(),
            messages,
        }
    }

    /// Redirect with a single error message.
    pub fn redirect_with_error(location: impl Into<String>, message: impl Into<String>) -> Self {
        let mut messages = Notices::new();
        messages.error(message);
        Self::redirect(location, messages)
    }
}

/// A 302 to `location`, with the messages to show there in the body.
#[derive(Debug)]
pub struct Redirect {
    pub location: String,
    pub messages: Notices,
}

impl Redirect {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            messages: Notices::new(),
        }
    }

    pub fn with_messages(mut self, messages: Notices) -> Self {
        self.messages.extend(messages);
        self
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "redirect": self.location, "messages": self.messages });
        (
            StatusCode::FOUND,
            [(header::LOCATION, self.location)],
            axum::Json(body),
        )
            .into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Redirect { location, messages } => {
                return Redirect { location, messages }.into_response();
            }
            other => other,
        };

        let status = match &err {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Redirect { .. } => StatusCode::FOUND,
            ApiError::Backend(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Backend(bmd_core::Error::InvalidAction(_))
            | ApiError::Backend(bmd_core::Error::UnknownStep(_))
            | ApiError::Backend(bmd_core::Error::MissingContext(_)) => StatusCode::BAD_REQUEST,
            ApiError::Backend(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": err.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
