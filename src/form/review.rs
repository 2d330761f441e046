use serde::Deserialize;
use serde_json::Value;

use super::{loose_bool, loose_int, trimmed};
use crate::error::ShopError;

pub const MIN_COMMENT_CHARS: usize = 10;
pub const MAX_COMMENT_CHARS: usize = 1200;
const MAX_USER_AGENT_CHARS: usize = 255;

/// Review payload; accepts both snake_case and the camelCase names the widget sends
#[derive(Debug, Default, Deserialize)]
pub struct ReviewForm {
    pub rating: Option<Value>,
    #[serde(alias = "message")]
    pub comment: Option<String>,
    #[serde(alias = "firstName")]
    pub first_name: Option<String>,
    #[serde(alias = "lastName")]
    pub last_name: Option<String>,
    #[serde(alias = "showName")]
    pub show_name: Option<Value>,
    #[serde(alias = "sourcePage")]
    pub source_page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidReview {
    pub rating: u8,
    pub comment: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub show_name: bool,
    pub source_page: Option<String>,
}

fn optional(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn validate_review(form: &ReviewForm) -> Result<ValidReview, ShopError> {
    let rating = loose_int(form.rating.as_ref());
    let comment = trimmed(&form.comment);
    let first_name = trimmed(&form.first_name);
    let last_name = trimmed(&form.last_name);
    let show_name = loose_bool(form.show_name.as_ref());

    if !(1..=5).contains(&rating) {
        return Err(ShopError::InvalidRating);
    }
    let length = comment.chars().count();
    if length < MIN_COMMENT_CHARS {
        return Err(ShopError::CommentTooShort);
    }
    if length > MAX_COMMENT_CHARS {
        return Err(ShopError::CommentTooLong);
    }
    if show_name && first_name.is_empty() && last_name.is_empty() {
        return Err(ShopError::NameRequiredWhenPublic);
    }

    Ok(ValidReview {
        rating: rating as u8,
        comment,
        first_name: optional(first_name),
        last_name: optional(last_name),
        show_name,
        source_page: optional(trimmed(&form.source_page)),
    })
}

/// User agent capped to what the review table keeps
pub fn truncate_user_agent(user_agent: &str) -> Option<String> {
    let truncated: String = user_agent.chars().take(MAX_USER_AGENT_CHARS).collect();
    optional(truncated)
}
