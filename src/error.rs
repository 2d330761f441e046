use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::schedule::ScheduleError;
use crate::store::RepositoryError;

/// Every failure a handler can report, each with a stable snake_case code
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("duration is missing or not positive")]
    MissingDuration,

    #[error("missing fields: {0:?}")]
    MissingFields(Vec<&'static str>),

    #[error("missing quote tag")]
    MissingTag,

    #[error("invalid request parameters: {0}")]
    BadParams(String),

    #[error("invalid start datetime")]
    InvalidStartDatetime,

    #[error("not found")]
    NotFound,

    #[error("no catalog entry matches the request")]
    NoMatch,

    #[error("slot already taken")]
    SlotTaken,

    #[error("cancel token secret is not configured")]
    CancelSecretMissing,

    #[error("options cache token is not configured")]
    TokenNotConfigured,

    #[error("invalid token")]
    InvalidToken,

    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("comment too short")]
    CommentTooShort,

    #[error("comment too long")]
    CommentTooLong,

    #[error("a public review needs a name")]
    NameRequiredWhenPublic,

    #[error("too many requests")]
    TooManyRequests { remaining_secs: Option<u64> },

    #[error("bot detected")]
    BotDetected,

    #[error("invalid email")]
    InvalidEmail,

    #[error("failed to write version file: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("mail delivery failed: {0}")]
    MailFailed(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ScheduleError> for ShopError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::MissingDuration => ShopError::MissingDuration,
            ScheduleError::DurationTooLong | ScheduleError::DateOutOfRange => ShopError::BadParams(err.to_string()),
        }
    }
}

impl ShopError {
    pub fn code(&self) -> &'static str {
        match self {
            ShopError::MissingDuration => "missing_duration",
            ShopError::MissingFields(_) => "missing_fields",
            ShopError::MissingTag => "missing_tag",
            ShopError::BadParams(_) => "bad_params",
            ShopError::InvalidStartDatetime => "invalid_start_datetime",
            ShopError::NotFound => "not_found",
            ShopError::NoMatch => "no_match",
            ShopError::SlotTaken => "slot_taken",
            ShopError::CancelSecretMissing => "cancel_secret_missing",
            ShopError::TokenNotConfigured => "token_not_configured",
            ShopError::InvalidToken => "invalid_token",
            ShopError::InvalidRating => "invalid_rating",
            ShopError::CommentTooShort => "comment_too_short",
            ShopError::CommentTooLong => "comment_too_long",
            ShopError::NameRequiredWhenPublic => "name_required_when_public",
            ShopError::TooManyRequests { .. } => "too_many_requests",
            ShopError::BotDetected => "bot_detected",
            ShopError::InvalidEmail => "invalid_email",
            ShopError::WriteFailed(_) => "write_failed",
            ShopError::MailFailed(_) => "mail_failed",
            ShopError::Repository(_) | ShopError::Io(_) => "server_error",
        }
    }
}

/// Short random id tying a logged failure to the response the client saw
pub fn debug_id() -> String {
    hex::encode(rand::random::<[u8; 6]>())
}

impl ResponseError for ShopError {
    fn status_code(&self) -> StatusCode {
        match self {
            ShopError::NotFound => StatusCode::NOT_FOUND,
            ShopError::SlotTaken => StatusCode::CONFLICT,
            ShopError::InvalidToken => StatusCode::FORBIDDEN,
            ShopError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ShopError::CancelSecretMissing
            | ShopError::TokenNotConfigured
            | ShopError::WriteFailed(_)
            | ShopError::MailFailed(_)
            | ShopError::Repository(_)
            | ShopError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "success": false, "error": self.code() });

        match self {
            ShopError::MissingFields(missing) => body["missing"] = json!(missing),
            ShopError::TooManyRequests { remaining_secs: Some(remaining) } => body["remaining"] = json!(remaining),
            _ => {}
        }

        if self.status_code().is_server_error() {
            let id = debug_id();
            error!("[{}] {}", id, self);
            body["debug_id"] = json!(id);
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: ShopError) -> serde_json::Value {
        let bytes = to_bytes(err.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn missing_fields_lists_names() {
        let body = body_of(ShopError::MissingFields(vec!["name", "phone"])).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "missing_fields");
        assert_eq!(body["missing"], json!(["name", "phone"]));
    }

    #[actix_web::test]
    async fn repository_failures_hide_details() {
        let err = ShopError::from(RepositoryError::Unavailable("connection refused".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(err).await;
        assert_eq!(body["error"], "server_error");
        assert_eq!(body["debug_id"].as_str().unwrap().len(), 12);
        assert!(!body.to_string().contains("connection refused"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(ShopError::MissingDuration.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ShopError::SlotTaken.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ShopError::TooManyRequests { remaining_secs: None }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
