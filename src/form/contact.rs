use serde::Deserialize;

use super::trimmed;
use crate::error::ShopError;

#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: Option<String>,
    /// Hidden field; humans leave it empty
    pub website: Option<String>,
}

/// Contact message with name and message already HTML-escaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidContact {
    pub name: String,
    pub email: String,
    pub message: String,
}

pub fn check_honeypot(form: &ContactForm) -> Result<(), ShopError> {
    if trimmed(&form.website).is_empty() {
        Ok(())
    } else {
        Err(ShopError::BotDetected)
    }
}

pub fn validate_contact(form: &ContactForm) -> Result<ValidContact, ShopError> {
    let name = escape_html(&trimmed(&form.name));
    let email = sanitize_email(&trimmed(&form.email));
    let message = escape_html(&trimmed(&form.message));

    let mut missing = Vec::new();
    for (field, value) in [("name", &name), ("email", &email), ("message", &message)] {
        if value.is_empty() {
            missing.push(field);
        }
    }
    if !missing.is_empty() {
        return Err(ShopError::MissingFields(missing));
    }
    if !is_valid_email(&email) {
        return Err(ShopError::InvalidEmail);
    }

    Ok(ValidContact { name, email, message })
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

// Drops characters that can never appear in an address
fn sanitize_email(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-=?^_`{|}~@.[]".contains(*c))
        .collect()
}

/// Single `@`, non-empty local part, dotted domain made of sane labels
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
