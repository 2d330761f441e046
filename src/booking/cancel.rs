use chrono::NaiveDateTime;
use log::info;

use crate::error::ShopError;
use crate::notify::{cancellation_customer_sms, cancellation_internal_sms, dispatch_sms, Notifier};
use crate::schedule::Clock;
use crate::store::{Appointment, AppointmentStatus, ShopRepository};

/// Why an appointment can no longer be cancelled online
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRefusal {
    Expired,
    PartOrdered,
    NotActive,
    AlreadyUsed,
}

impl CancelRefusal {
    pub fn message(&self) -> &'static str {
        match self {
            CancelRefusal::Expired => "Le délai d'annulation en ligne est dépassé.",
            CancelRefusal::PartOrdered => "La pièce a déjà été commandée pour cette intervention.",
            CancelRefusal::NotActive => "Ce rendez-vous n'est plus actif.",
            CancelRefusal::AlreadyUsed => "Le lien d'annulation a déjà été utilisé.",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    InvalidLink,
    UnknownToken,
    Refused(Vec<CancelRefusal>),
    Cancelled(Appointment),
}

/// Every guard that blocks the cancellation, in display order
pub fn refusals(appointment: &Appointment, now: NaiveDateTime) -> Vec<CancelRefusal> {
    let mut reasons = Vec::new();
    if appointment.cancel_token_expires_at.is_some_and(|expires| now > expires) {
        reasons.push(CancelRefusal::Expired);
    }
    if appointment.part_ordered_at.is_some() {
        reasons.push(CancelRefusal::PartOrdered);
    }
    if appointment.status != AppointmentStatus::Booked {
        reasons.push(CancelRefusal::NotActive);
    }
    if appointment.cancel_token_used_at.is_some() {
        reasons.push(CancelRefusal::AlreadyUsed);
    }
    reasons
}

pub fn cancel_by_token(
    repo: &dyn ShopRepository,
    notifier: &dyn Notifier,
    clock: &dyn Clock,
    token: &str,
) -> Result<CancelOutcome, ShopError> {
    let token = token.trim();
    if token.is_empty() {
        return Ok(CancelOutcome::InvalidLink);
    }

    let Some(appointment) = repo.appointment_by_cancel_token(token)? else {
        return Ok(CancelOutcome::UnknownToken);
    };

    let now = clock.now();
    let reasons = refusals(&appointment, now);
    if !reasons.is_empty() {
        return Ok(CancelOutcome::Refused(reasons));
    }

    if !repo.mark_cancelled(appointment.id, now)? {
        return Ok(CancelOutcome::Refused(vec![CancelRefusal::NotActive]));
    }
    info!("Appointment {} cancelled online", appointment.id);

    dispatch_sms(
        notifier,
        repo,
        &appointment.customer_phone,
        &cancellation_customer_sms(&appointment),
        &cancellation_internal_sms(&appointment),
    );

    Ok(CancelOutcome::Cancelled(appointment))
}
