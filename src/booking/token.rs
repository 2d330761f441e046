use chrono::{Duration, NaiveDateTime};

use crate::crypto::Signer;
use crate::schedule::format_datetime;
use crate::store::CancelGrant;

/// Signature binding the appointment id to its start time
pub fn cancel_token(signer: &Signer, id: u64, start: NaiveDateTime) -> String {
    signer.sign_hex(format!("{}|{}", id, format_datetime(start)).as_bytes())
}

/// The link stops working after the TTL or once the appointment starts, whichever comes first
pub fn token_expiry(start: NaiveDateTime, now: NaiveDateTime, ttl_hours: i64) -> NaiveDateTime {
    start.min(now + Duration::hours(ttl_hours))
}

pub fn issue_grant(signer: &Signer, id: u64, start: NaiveDateTime, now: NaiveDateTime, ttl_hours: i64) -> CancelGrant {
    CancelGrant {
        token: cancel_token(signer, id, start),
        created_at: now,
        expires_at: token_expiry(start, now, ttl_hours),
    }
}

/// Appends the token to the configured base, keeping any query it already has.
/// Tokens are lowercase hex so they go in unescaped.
pub fn cancel_url(base: &str, token: &str) -> String {
    let base = base.trim_end_matches(['?', '&']);
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, token)
}
