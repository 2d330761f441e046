use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;

use super::trimmed;
use crate::error::ShopError;
use crate::schedule::generator::MAX_DURATION_MIN;
use crate::schedule::parse_local_datetime;
use crate::store::NewAppointment;

/// Booking form as posted by the site
#[derive(Debug, Default, Deserialize)]
pub struct BookingForm {
    pub service_label: Option<String>,
    pub duration_min: Option<String>,
    pub start_datetime: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Quoted price in euros, shown in the confirmation mail
    pub price: Option<String>,
    /// Promo percentage of the chosen slot
    pub discount: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidBooking {
    pub appointment: NewAppointment,
    pub price: Option<f64>,
    pub discount_pct: Option<f64>,
}

impl ValidBooking {
    pub fn start(&self) -> NaiveDateTime {
        self.appointment.start
    }
}

fn amount(value: &Option<String>) -> Option<f64> {
    trimmed(value).replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Validates a booking form.
/// All missing fields are reported together, in form order.
pub fn validate_booking(form: &BookingForm) -> Result<ValidBooking, ShopError> {
    let service_label = trimmed(&form.service_label);
    let duration_min: i64 = trimmed(&form.duration_min).parse().unwrap_or(0);
    let start_datetime = trimmed(&form.start_datetime);
    let name = trimmed(&form.name);
    let email = trimmed(&form.email);
    let phone = trimmed(&form.phone);

    let mut missing = Vec::new();
    if service_label.is_empty() {
        missing.push("service_label");
    }
    if duration_min <= 0 {
        missing.push("duration_min");
    }
    for (field, value) in [("start_datetime", &start_datetime), ("name", &name), ("email", &email), ("phone", &phone)] {
        if value.is_empty() {
            missing.push(field);
        }
    }
    if !missing.is_empty() {
        return Err(ShopError::MissingFields(missing));
    }

    if duration_min > MAX_DURATION_MIN {
        return Err(ShopError::BadParams(format!("duration_min must not exceed {} minutes", MAX_DURATION_MIN)));
    }

    let start = parse_local_datetime(&start_datetime).ok_or(ShopError::InvalidStartDatetime)?;
    let end = start
        .checked_add_signed(Duration::minutes(duration_min))
        .ok_or(ShopError::InvalidStartDatetime)?;

    Ok(ValidBooking {
        appointment: NewAppointment {
            service_label,
            duration_min,
            start,
            end,
            customer_name: name,
            customer_email: email,
            customer_phone: phone,
        },
        price: amount(&form.price).filter(|p| *p >= 0.0),
        discount_pct: amount(&form.discount).filter(|d| *d > 0.0 && *d <= 100.0),
    })
}
