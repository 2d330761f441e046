use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};
use log::{info, warn};

use crate::error::ShopError;
use crate::form::{check_honeypot, validate_contact, ContactForm, ValidContact};
use crate::notify::{MailMessage, Notifier};
use crate::schedule::Clock;

pub const CONTACT_INTERVAL_SECS: i64 = 30;
const PURGE_AFTER_SECS: i64 = 86_400;

/// Last message time per client address
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_seen: Mutex<HashMap<String, NaiveDateTime>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(CONTACT_INTERVAL_SECS)
    }
}

impl RateLimiter {
    pub fn new(interval_secs: i64) -> Self {
        Self { interval: Duration::seconds(interval_secs), last_seen: Mutex::new(HashMap::new()) }
    }

    /// Records the attempt, or reports how many seconds remain before the next one
    pub fn check(&self, key: &str, now: NaiveDateTime) -> Result<(), ShopError> {
        let mut last_seen = self
            .last_seen
            .lock()
            .map_err(|_| ShopError::TooManyRequests { remaining_secs: None })?;

        if let Some(previous) = last_seen.get(key) {
            let age = now - *previous;
            if age < self.interval {
                let remaining = (self.interval - age).num_seconds().max(1) as u64;
                return Err(ShopError::TooManyRequests { remaining_secs: Some(remaining) });
            }
        }
        last_seen.insert(key.to_string(), now);

        let stale = Duration::seconds(PURGE_AFTER_SECS);
        last_seen.retain(|_, seen| now - *seen <= stale);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.last_seen.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn contact_mail(contact: &ValidContact) -> MailMessage {
    let html_body = format!(
        "<html><body style='font-family: Arial, sans-serif; color: #333;'>\
         <h2 style='color:#3abafc;'>Nouveau message de contact</h2>\
         <p><strong>Nom :</strong> {name}</p>\
         <p><strong>Email :</strong> {email}</p>\
         <hr style='border:none; border-top:1px solid #ddd; margin:15px 0;'>\
         <p style='white-space:pre-line;'>{message}</p>\
         <hr style='border:none; border-top:1px solid #ddd; margin:15px 0;'>\
         <p style='font-size:13px;color:#999;'>Message envoyé automatiquement depuis le site <strong>ripair.shop</strong></p>\
         </body></html>",
        name = contact.name,
        email = contact.email,
        message = contact.message,
    );
    let text_body = format!(
        "Nouveau message de contact\n\nNom : {}\nEmail : {}\n\nMessage :\n{}\n\n--\nEnvoyé depuis le site ripair.shop",
        contact.name, contact.email, contact.message
    );

    MailMessage {
        to: Vec::new(),
        reply_to: Some((contact.email.clone(), contact.name.clone())),
        subject: "Nouveau message depuis le site RIPAIR".to_string(),
        html_body,
        text_body,
    }
}

/// Honeypot, rate limit, validation and delivery, in that order
pub fn send_contact_message(
    limiter: &RateLimiter,
    notifier: &dyn Notifier,
    clock: &dyn Clock,
    form: &ContactForm,
    client_ip: &str,
) -> Result<(), ShopError> {
    check_honeypot(form)?;
    limiter.check(client_ip, clock.now())?;
    let contact = validate_contact(form)?;

    notifier.send_mail(&contact_mail(&contact)).map_err(|e| {
        warn!("Contact mail failed: {}", e);
        ShopError::MailFailed(e.to_string())
    })?;
    info!("Contact message from {} delivered", contact.email);
    Ok(())
}
