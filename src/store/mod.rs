pub mod error;
pub mod models;
pub mod memory;

use chrono::NaiveDateTime;

use crate::schedule::{BlackoutBlock, BookedInterval, OpeningWindow, PromoRule};

pub use error::{RepositoryError, RepositoryResult};
pub use memory::{InMemoryRepository, ShopData};
pub use models::{
    Appointment, AppointmentStatus, CancelGrant, NewAppointment, NewReview, Quote, RepairPrice, Review,
    ReviewStatus,
};

/// Storage seam used by every handler.
///
/// Implementations must make `book` atomic: the conflict check, the insert and
/// the cancel token assignment either all happen or none do.
pub trait ShopRepository: Send + Sync {
    fn opening_hours(&self) -> RepositoryResult<Vec<OpeningWindow>>;

    fn promo_rules(&self) -> RepositoryResult<Vec<PromoRule>>;

    /// Booked appointments overlapping [from, to)
    fn booked_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> RepositoryResult<Vec<BookedInterval>>;

    /// Availability-reducing blocks overlapping [from, to)
    fn blocks_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> RepositoryResult<Vec<BlackoutBlock>>;

    fn repairs(&self) -> RepositoryResult<Vec<RepairPrice>>;

    fn find_repair(
        &self,
        category: &str,
        brand: &str,
        model: &str,
        problem: &str,
    ) -> RepositoryResult<Option<RepairPrice>>;

    /// Stores a quote copied from a catalog row and returns its tag
    fn insert_quote(&self, repair: &RepairPrice) -> RepositoryResult<u64>;

    fn quote(&self, tag: u64) -> RepositoryResult<Option<Quote>>;

    /// Inserts the appointment unless a booked one overlaps it.
    /// Returns `None` when the slot is taken.
    fn book(
        &self,
        new: NewAppointment,
        issue_token: &dyn Fn(u64) -> CancelGrant,
    ) -> RepositoryResult<Option<Appointment>>;

    fn appointment_by_cancel_token(&self, token: &str) -> RepositoryResult<Option<Appointment>>;

    /// Cancels a still-booked appointment; returns false if it was no longer booked
    fn mark_cancelled(&self, id: u64, at: NaiveDateTime) -> RepositoryResult<bool>;

    fn insert_review(&self, review: NewReview) -> RepositoryResult<u64>;

    /// Number of reviews from `ip_hash` created at or after `since`
    fn reviews_since(&self, ip_hash: &str, since: NaiveDateTime) -> RepositoryResult<usize>;

    /// Approved reviews, newest first
    fn approved_reviews(&self, limit: usize) -> RepositoryResult<Vec<Review>>;

    fn setting(&self, key: &str) -> RepositoryResult<Option<String>>;
}
