use std::sync::Mutex;

use chrono::NaiveDateTime;
use log::{info, warn};
use serde_json::Value;
use thiserror::Error;

use crate::form::escape_html;
use crate::store::{Appointment, ShopRepository};

pub const INTERNAL_SMS_SETTING: &str = "notifications.internal_sms";
const SHOP_NAME: &str = "RIPAIR";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("missing recipient or message")]
    MissingParameters,

    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Recipient addresses; empty means the shop mailbox
    pub to: Vec<String>,
    pub reply_to: Option<(String, String)>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Outbound SMS and mail
pub trait Notifier: Send + Sync {
    fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError>;

    fn send_mail(&self, mail: &MailMessage) -> Result<(), NotifyError>;
}

/// Writes every message to the log instead of a provider
#[derive(Debug, Clone)]
pub struct LogNotifier {
    pub default_country_code: String,
}

impl Notifier for LogNotifier {
    fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let number = normalize_phone(to, &self.default_country_code);
        if number.is_empty() || body.trim().is_empty() {
            return Err(NotifyError::MissingParameters);
        }
        info!("[sms] to {}: {}", number, body.replace('\n', " | "));
        Ok(())
    }

    fn send_mail(&self, mail: &MailMessage) -> Result<(), NotifyError> {
        let to = if mail.to.is_empty() { "shop".to_string() } else { mail.to.join(", ") };
        info!("[mail] to {}: {} ({} bytes)", to, mail.subject, mail.text_body.len());
        Ok(())
    }
}

/// Keeps every message in memory; mail delivery can be made to fail
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sms: Mutex<Vec<(String, String)>>,
    mails: Mutex<Vec<MailMessage>>,
    pub fail_mail: bool,
}

impl RecordingNotifier {
    pub fn failing_mail() -> Self {
        Self { fail_mail: true, ..Self::default() }
    }

    /// (recipient, body) pairs in send order
    pub fn sms(&self) -> Vec<(String, String)> {
        self.sms.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn mails(&self) -> Vec<MailMessage> {
        self.mails.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn send_sms(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let mut sent = self.sms.lock().map_err(|_| NotifyError::Delivery("recorder poisoned".to_string()))?;
        sent.push((to.to_string(), body.to_string()));
        Ok(())
    }

    fn send_mail(&self, mail: &MailMessage) -> Result<(), NotifyError> {
        if self.fail_mail {
            return Err(NotifyError::Delivery("mail transport unavailable".to_string()));
        }
        let mut sent = self.mails.lock().map_err(|_| NotifyError::Delivery("recorder poisoned".to_string()))?;
        sent.push(mail.clone());
        Ok(())
    }
}

/// Normalizes a phone number to `+<digits>`, applying the default country
/// code to national numbers. Returns an empty string when nothing is left.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> String {
    let clean: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '_' | '(' | ')'))
        .collect();
    if clean.is_empty() {
        return String::new();
    }

    let digits_of = |s: &str| -> String { s.chars().filter(char::is_ascii_digit).collect() };
    let plus = |digits: String| if digits.is_empty() { String::new() } else { format!("+{}", digits) };

    if let Some(rest) = clean.strip_prefix('+') {
        return plus(digits_of(rest));
    }
    if let Some(rest) = clean.strip_prefix("00") {
        return plus(digits_of(rest));
    }

    let digits = digits_of(&clean);
    if digits.is_empty() {
        return String::new();
    }

    let prefix = match default_country_code.trim() {
        "" => "+".to_string(),
        code if code.starts_with('+') => code.to_string(),
        code => format!("+{}", code),
    };

    if clean.starts_with('0') && digits.len() >= 9 {
        format!("{}{}", prefix, &digits[1..])
    } else {
        format!("{}{}", prefix, digits)
    }
}

fn flag_disabled(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => !matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        _ => true,
    }
}

/// Parses the internal recipients setting: `{"enabled": bool, "numbers": [...]}`.
/// Entries are strings or objects; duplicates keep their first position.
pub fn parse_internal_recipients(raw: &str) -> Vec<String> {
    let Ok(setting) = serde_json::from_str::<Value>(raw) else {
        return Vec::new();
    };
    let enabled = setting.get("enabled").map(|v| !flag_disabled(v)).unwrap_or(false);
    if !enabled {
        return Vec::new();
    }

    let candidates = match setting.get("numbers") {
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
        None => Vec::new(),
    };

    let mut numbers: Vec<String> = Vec::new();
    for candidate in candidates {
        let number = match &candidate {
            Value::Object(map) => {
                let disabled = ["enabled", "active", "checked", "selected"]
                    .iter()
                    .filter_map(|flag| map.get(*flag))
                    .any(flag_disabled);
                if disabled {
                    continue;
                }
                ["value", "number", "phone", "contact"]
                    .iter()
                    .find_map(|key| map.get(*key))
                    .map(value_to_string)
                    .unwrap_or_default()
            }
            other => value_to_string(other),
        };
        let number = number.trim().to_string();
        if !number.is_empty() && !numbers.contains(&number) {
            numbers.push(number);
        }
    }
    numbers
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// Internal recipients from storage; lookup failures mean nobody is notified
pub fn internal_recipients(repo: &dyn ShopRepository) -> Vec<String> {
    match repo.setting(INTERNAL_SMS_SETTING) {
        Ok(Some(raw)) => parse_internal_recipients(&raw),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("[sms] could not load internal recipients: {}", e);
            Vec::new()
        }
    }
}

/// Formats a timestamp like 14/03/2025 09h30
pub fn sms_date(value: NaiveDateTime) -> String {
    value.format("%d/%m/%Y %Hh%M").to_string()
}

fn first_name(full: &str) -> Option<&str> {
    full.split_whitespace().next()
}

pub fn booking_customer_sms(appointment: &Appointment) -> String {
    let mut lines = vec![format!("{} - Confirmation RDV", SHOP_NAME)];
    lines.push(match first_name(&appointment.customer_name) {
        Some(name) => format!("Bonjour {},", name),
        None => "Bonjour cher client,".to_string(),
    });
    lines.push(format!("Date : {}", sms_date(appointment.start)));
    if !appointment.service_label.trim().is_empty() {
        lines.push(format!("Service : {}", appointment.service_label.trim()));
    }
    lines.push("Merci pour votre confiance.".to_string());
    lines.join("\n")
}

pub fn booking_internal_sms(appointment: &Appointment) -> String {
    [
        format!("{} - Nouveau RDV", SHOP_NAME),
        format!("Date : {}", sms_date(appointment.start)),
        format!("Service : {}", appointment.service_label.trim()),
        format!("Client : {} ({})", appointment.customer_name.trim(), appointment.customer_phone.trim()),
    ]
    .join("\n")
}

pub fn cancellation_customer_sms(appointment: &Appointment) -> String {
    let mut lines = vec![format!("{} - Annulation RDV", SHOP_NAME)];
    let name = appointment.customer_name.trim();
    lines.push(if name.is_empty() { "Bonjour,".to_string() } else { format!("Bonjour {},", name) });
    lines.push(format!("Votre rendez-vous du {} est annulé.", sms_date(appointment.start)));
    if !appointment.service_label.trim().is_empty() {
        lines.push(format!("Service : {}", appointment.service_label.trim()));
    }
    lines.push("Contactez-nous pour reprogrammer via ripair.shop.".to_string());
    lines.push("Merci pour votre confiance.".to_string());
    lines.join("\n")
}

pub fn cancellation_internal_sms(appointment: &Appointment) -> String {
    let mut lines = vec![
        format!("{} - RDV annulé", SHOP_NAME),
        format!("Date : {}", sms_date(appointment.start)),
    ];
    if !appointment.service_label.trim().is_empty() {
        lines.push(format!("Service : {}", appointment.service_label.trim()));
    }
    let name = appointment.customer_name.trim();
    let phone = appointment.customer_phone.trim();
    let client = match (name.is_empty(), phone.is_empty()) {
        (false, false) => format!("{} ({})", name, phone),
        (false, true) => name.to_string(),
        (true, false) => format!("({})", phone),
        (true, true) => String::new(),
    };
    if !client.is_empty() {
        lines.push(format!("Client : {}", client));
    }
    lines.push("Source : annulation en ligne.".to_string());
    lines.join("\n")
}

/// Formats an amount like 1 234,50 €
pub fn euros(amount: f64) -> String {
    let cents = (amount.max(0.0) * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, digit) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    format!("{},{:02} €", grouped, cents % 100)
}

/// Confirmation sent to the customer once the slot is booked.
/// Price lines appear only when a price is known.
pub fn booking_confirmation_mail(
    appointment: &Appointment,
    cancel_url: &str,
    price: Option<f64>,
    discount_pct: Option<f64>,
) -> MailMessage {
    let name = appointment.customer_name.trim();
    let mut rows = vec![("Date", appointment.start.format("%d/%m/%Y à %Hh%M").to_string())];
    if !appointment.service_label.trim().is_empty() {
        rows.push(("Service", appointment.service_label.trim().to_string()));
    }
    if let Some(price) = price {
        rows.push(("Prix", euros(price)));
        if let Some(pct) = discount_pct {
            let saved = (price * pct).round() / 100.0;
            rows.push(("Remise", format!("{}% (-{})", pct, euros(saved))));
            rows.push(("Total", euros(price - saved)));
        }
    }

    let mut html_body = format!(
        "<html><body style='font-family: Segoe UI, Roboto, sans-serif; color: #333;'>\
         <h1 style='color:#3abafc;'>Rendez-vous confirmé</h1>\
         <p>Bonjour <strong>{}</strong>, nos experts vous attendent !</p><table>",
        escape_html(name)
    );
    let mut text_body = format!("Rendez-vous confirmé\n\nBonjour {},\n\n", name);
    for (label, value) in &rows {
        html_body.push_str(&format!("<tr><td><strong>{} :</strong></td><td>{}</td></tr>", label, escape_html(value)));
        text_body.push_str(&format!("{} : {}\n", label, value));
    }
    html_body.push_str("</table>");

    if !cancel_url.is_empty() {
        html_body.push_str(&format!(
            "<p>Un empêchement ? <a href='{}'>Annuler le rendez-vous</a></p>",
            escape_html(cancel_url)
        ));
        text_body.push_str(&format!("\nPour annuler : {}\n", cancel_url));
    }
    html_body.push_str("<p style='font-size:13px;color:#999;'>Merci pour votre confiance, l'équipe RIPAIR.</p></body></html>");
    text_body.push_str("\nMerci pour votre confiance.\n--\nRIPAIR");

    MailMessage {
        to: vec![appointment.customer_email.clone()],
        reply_to: None,
        subject: format!("Rendez-vous confirmé - {}", SHOP_NAME),
        html_body,
        text_body,
    }
}

/// Sends a customer message plus one copy per internal recipient.
/// Failures are logged and never bubble up.
pub fn dispatch_sms(
    notifier: &dyn Notifier,
    repo: &dyn ShopRepository,
    customer_phone: &str,
    customer_message: &str,
    internal_message: &str,
) {
    if !customer_phone.trim().is_empty() {
        if let Err(e) = notifier.send_sms(customer_phone, customer_message) {
            warn!("[sms] customer SMS failed: {}", e);
        }
    }
    for recipient in internal_recipients(repo) {
        if let Err(e) = notifier.send_sms(&recipient, internal_message) {
            warn!("[sms] internal SMS failed ({}): {}", recipient, e);
        }
    }
}
