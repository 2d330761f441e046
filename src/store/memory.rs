use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;

use super::error::{RepositoryError, RepositoryResult};
use super::models::{
    Appointment, AppointmentStatus, CancelGrant, NewAppointment, NewReview, Quote, RepairPrice, Review,
    ReviewStatus,
};
use super::ShopRepository;
use crate::schedule::slot_utils::overlaps;
use crate::schedule::{BlackoutBlock, BookedInterval, OpeningWindow, PromoRule};

/// Everything the shop stores, held in memory
#[derive(Debug, Default, Clone)]
pub struct ShopData {
    pub opening_hours: Vec<OpeningWindow>,
    pub promo_rules: Vec<PromoRule>,
    pub blocks: Vec<BlackoutBlock>,
    pub repairs: Vec<RepairPrice>,
    pub quotes: Vec<Quote>,
    pub appointments: Vec<Appointment>,
    pub reviews: Vec<Review>,
    pub settings: HashMap<String, String>,
}

/// Repository backed by a single mutex; every operation is one critical section
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    data: Mutex<ShopData>,
}

impl InMemoryRepository {
    pub fn new(data: ShopData) -> Self {
        Self { data: Mutex::new(data) }
    }

    fn lock(&self, operation: &'static str) -> RepositoryResult<MutexGuard<'_, ShopData>> {
        self.data.lock().map_err(|_| RepositoryError::Poisoned(operation))
    }

    /// Records that the part for an appointment has been ordered
    pub fn mark_part_ordered(&self, id: u64, at: NaiveDateTime) -> RepositoryResult<()> {
        let mut data = self.lock("mark_part_ordered")?;
        let appointment = data
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound { entity: "appointment", id })?;
        appointment.part_ordered_at = Some(at);
        Ok(())
    }

    /// Moderation decision on a review
    pub fn set_review_status(&self, id: u64, status: ReviewStatus) -> RepositoryResult<()> {
        let mut data = self.lock("set_review_status")?;
        let review = data
            .reviews
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(RepositoryError::NotFound { entity: "review", id })?;
        review.status = status;
        Ok(())
    }

    pub fn appointment(&self, id: u64) -> RepositoryResult<Option<Appointment>> {
        let data = self.lock("appointment")?;
        Ok(data.appointments.iter().find(|a| a.id == id).cloned())
    }
}

fn next_id(ids: impl Iterator<Item = u64>) -> u64 {
    ids.max().unwrap_or(0) + 1
}

impl ShopRepository for InMemoryRepository {
    fn opening_hours(&self) -> RepositoryResult<Vec<OpeningWindow>> {
        Ok(self.lock("opening_hours")?.opening_hours.clone())
    }

    fn promo_rules(&self) -> RepositoryResult<Vec<PromoRule>> {
        Ok(self.lock("promo_rules")?.promo_rules.clone())
    }

    fn booked_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> RepositoryResult<Vec<BookedInterval>> {
        let data = self.lock("booked_between")?;
        Ok(data
            .appointments
            .iter()
            .filter(|a| a.status == AppointmentStatus::Booked && overlaps(a.start, a.end, from, to))
            .map(|a| BookedInterval { start: a.start, end: a.end })
            .collect())
    }

    fn blocks_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> RepositoryResult<Vec<BlackoutBlock>> {
        let data = self.lock("blocks_between")?;
        Ok(data
            .blocks
            .iter()
            .filter(|b| b.reduces_availability() && overlaps(b.start, b.end, from, to))
            .cloned()
            .collect())
    }

    fn repairs(&self) -> RepositoryResult<Vec<RepairPrice>> {
        Ok(self.lock("repairs")?.repairs.clone())
    }

    fn find_repair(
        &self,
        category: &str,
        brand: &str,
        model: &str,
        problem: &str,
    ) -> RepositoryResult<Option<RepairPrice>> {
        let data = self.lock("find_repair")?;
        Ok(data
            .repairs
            .iter()
            .find(|r| r.category == category && r.brand == brand && r.model == model && r.problem == problem)
            .cloned())
    }

    fn insert_quote(&self, repair: &RepairPrice) -> RepositoryResult<u64> {
        let mut data = self.lock("insert_quote")?;
        let tag = next_id(data.quotes.iter().map(|q| q.tag));
        data.quotes.push(Quote {
            tag,
            category: repair.category.clone(),
            brand: repair.brand.clone(),
            model: repair.model.clone(),
            problem: repair.problem.clone(),
            price: repair.price,
            duration: repair.duration,
        });
        Ok(tag)
    }

    fn quote(&self, tag: u64) -> RepositoryResult<Option<Quote>> {
        let data = self.lock("quote")?;
        Ok(data.quotes.iter().find(|q| q.tag == tag).cloned())
    }

    fn book(
        &self,
        new: NewAppointment,
        issue_token: &dyn Fn(u64) -> CancelGrant,
    ) -> RepositoryResult<Option<Appointment>> {
        // Held for the whole check-then-insert so concurrent bookings serialize
        let mut data = self.lock("book")?;

        let taken = data
            .appointments
            .iter()
            .any(|a| a.status == AppointmentStatus::Booked && overlaps(a.start, a.end, new.start, new.end));
        if taken {
            return Ok(None);
        }

        let id = next_id(data.appointments.iter().map(|a| a.id));
        let grant = issue_token(id);
        let appointment = Appointment {
            id,
            service_label: new.service_label,
            duration_min: new.duration_min,
            start: new.start,
            end: new.end,
            customer_name: new.customer_name,
            customer_email: new.customer_email,
            customer_phone: new.customer_phone,
            status: AppointmentStatus::Booked,
            cancel_token: Some(grant.token),
            cancel_token_created_at: Some(grant.created_at),
            cancel_token_expires_at: Some(grant.expires_at),
            cancel_token_used_at: None,
            cancelled_at: None,
            part_ordered_at: None,
        };
        data.appointments.push(appointment.clone());
        Ok(Some(appointment))
    }

    fn appointment_by_cancel_token(&self, token: &str) -> RepositoryResult<Option<Appointment>> {
        let data = self.lock("appointment_by_cancel_token")?;
        Ok(data
            .appointments
            .iter()
            .find(|a| a.cancel_token.as_deref() == Some(token))
            .cloned())
    }

    fn mark_cancelled(&self, id: u64, at: NaiveDateTime) -> RepositoryResult<bool> {
        let mut data = self.lock("mark_cancelled")?;
        let appointment = data
            .appointments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound { entity: "appointment", id })?;
        if appointment.status != AppointmentStatus::Booked {
            return Ok(false);
        }
        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancelled_at = Some(at);
        appointment.cancel_token_used_at = Some(at);
        appointment.cancel_token = None;
        appointment.cancel_token_expires_at = None;
        Ok(true)
    }

    fn insert_review(&self, review: NewReview) -> RepositoryResult<u64> {
        let mut data = self.lock("insert_review")?;
        let id = next_id(data.reviews.iter().map(|r| r.id));
        data.reviews.push(Review {
            id,
            rating: review.rating,
            comment: review.comment,
            first_name: review.first_name,
            last_name: review.last_name,
            show_name: review.show_name,
            status: ReviewStatus::Pending,
            ip_hash: review.ip_hash,
            user_agent: review.user_agent,
            source_page: review.source_page,
            created_at: review.created_at,
        });
        Ok(id)
    }

    fn reviews_since(&self, ip_hash: &str, since: NaiveDateTime) -> RepositoryResult<usize> {
        let data = self.lock("reviews_since")?;
        Ok(data
            .reviews
            .iter()
            .filter(|r| r.ip_hash.as_deref() == Some(ip_hash) && r.created_at >= since)
            .count())
    }

    fn approved_reviews(&self, limit: usize) -> RepositoryResult<Vec<Review>> {
        let data = self.lock("approved_reviews")?;
        let mut approved: Vec<Review> = data
            .reviews
            .iter()
            .filter(|r| r.status == ReviewStatus::Approved)
            .cloned()
            .collect();
        approved.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        approved.truncate(limit);
        Ok(approved)
    }

    fn setting(&self, key: &str) -> RepositoryResult<Option<String>> {
        Ok(self.lock("setting")?.settings.get(key).cloned())
    }
}
