use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;
use thiserror::Error;

/// Errors surfaced to HTTP callers.
///
/// Upstream failures are logged with full detail where they happen; the message
/// carried here is what the caller sees.
#[derive(Debug, Error)]
pub enum AppError {
    /// Empty text, unknown provider key, malformed title/body. Raised before any network call.
    #[error("{0}")]
    InvalidInput(String),

    /// Provider throttled the call; the user may pick another provider.
    #[error("{0}")]
    RateLimited(String),

    /// Provider or CMS transport/auth/parse failure.
    #[error("{0}")]
    Upstream(String),

    /// The CMS answered with a non-success status that is passed through as-is.
    #[error("{detail}")]
    Remote { status: u16, detail: String },

    /// Missing or invalid secret/credential.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not authenticated")]
    Unauthorized,
}

impl AppError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn status(&self) -> Status {
        match self {
            AppError::InvalidInput(_) => Status::BadRequest,
            AppError::RateLimited(_) => Status::TooManyRequests,
            AppError::Upstream(_) | AppError::Configuration(_) => Status::InternalServerError,
            // Only error statuses pass through
            AppError::Remote { status, .. } => Status::from_code(*status)
                .filter(|s| s.code >= 400)
                .unwrap_or(Status::BadGateway),
            AppError::Unauthorized => Status::Unauthorized,
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        let body = serde_json::json!({ "detail": self.to_string() }).to_string();
        Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(AppError::invalid("x").status(), Status::BadRequest);
        assert_eq!(AppError::RateLimited("x".into()).status(), Status::TooManyRequests);
        assert_eq!(AppError::upstream("x").status(), Status::InternalServerError);
        assert_eq!(AppError::Unauthorized.status(), Status::Unauthorized);
        assert_eq!(
            AppError::Remote { status: 413, detail: "too big".into() }.status(),
            Status::PayloadTooLarge
        );
    }

    #[test]
    fn remote_status_out_of_range_becomes_bad_gateway() {
        assert_eq!(
            AppError::Remote { status: 99, detail: String::new() }.status(),
            Status::BadGateway
        );
        assert_eq!(
            AppError::Remote { status: 200, detail: String::new() }.status(),
            Status::BadGateway
        );
    }
}
