pub mod token;
pub mod cancel;

use chrono::DateTime;
use chrono_tz::Tz;
use log::{info, warn};

pub use cancel::{cancel_by_token, refusals, CancelOutcome, CancelRefusal};
pub use token::{cancel_token, cancel_url, issue_grant, token_expiry};

use crate::config::Settings;
use crate::crypto::Signer;
use crate::error::ShopError;
use crate::form::{validate_booking, BookingForm};
use crate::notify::{booking_confirmation_mail, booking_customer_sms, booking_internal_sms, dispatch_sms, Notifier};
use crate::schedule::clock::to_shop_time;
use crate::schedule::Clock;
use crate::store::{Appointment, ShopRepository};

/// What the customer gets back after a successful booking
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub appointment: Appointment,
    pub cancel_token: String,
    pub cancel_token_expires_at: DateTime<Tz>,
    pub cancel_url: String,
}

/// Validates the form, books the slot atomically and sends the confirmations.
/// Notification failures are logged and never fail the booking.
pub fn book_appointment(
    repo: &dyn ShopRepository,
    notifier: &dyn Notifier,
    clock: &dyn Clock,
    settings: &Settings,
    form: &BookingForm,
) -> Result<BookingReceipt, ShopError> {
    let secret = settings.cancel_token_secret.as_deref().ok_or(ShopError::CancelSecretMissing)?;
    let signer = Signer::new(secret.as_bytes()).map_err(|_| ShopError::CancelSecretMissing)?;

    let booking = validate_booking(form)?;
    let start = booking.start();
    let (price, discount_pct) = (booking.price, booking.discount_pct);
    let now = clock.now();
    let ttl_hours = settings.cancel_token_ttl_hours;

    let appointment = repo
        .book(booking.appointment, &|id| issue_grant(&signer, id, start, now, ttl_hours))?
        .ok_or(ShopError::SlotTaken)?;

    // The repository stores exactly what issue_grant produced
    let token = appointment.cancel_token.clone().unwrap_or_default();
    let expires_at = appointment.cancel_token_expires_at.unwrap_or(start);
    info!("Booked appointment {} at {}", appointment.id, start);

    dispatch_sms(
        notifier,
        repo,
        &appointment.customer_phone,
        &booking_customer_sms(&appointment),
        &booking_internal_sms(&appointment),
    );

    let url = cancel_url(&settings.cancel_url_base, &token);
    let mut mail = booking_confirmation_mail(&appointment, &url, price, discount_pct);
    if let Some(shop) = settings.mail_to.as_deref() {
        mail.to.push(shop.to_string());
    }
    if let Err(e) = notifier.send_mail(&mail) {
        warn!("[mail] booking confirmation for appointment {} failed: {}", appointment.id, e);
    }

    Ok(BookingReceipt {
        cancel_url: url,
        cancel_token: token,
        cancel_token_expires_at: to_shop_time(expires_at),
        appointment,
    })
}
