pub mod booking;
pub mod review;
pub mod contact;

pub use booking::{validate_booking, BookingForm, ValidBooking};
pub use review::{validate_review, ReviewForm, ValidReview};
pub use contact::{check_honeypot, escape_html, validate_contact, ContactForm, ValidContact};

use serde_json::Value;

/// Integer from a form value the way lenient HTML forms send it ("", "30", 30)
pub fn loose_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        Some(Value::Bool(b)) => *b as i64,
        _ => 0,
    }
}

/// Boolean from checkbox-style values (true, 1, "yes", "on", ...)
pub fn loose_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        _ => false,
    }
}

/// Trimmed owned copy of an optional text field
pub fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}
