use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
}

/// A customer appointment as stored
#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: u64,
    pub service_label: String,
    pub duration_min: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub status: AppointmentStatus,
    pub cancel_token: Option<String>,
    pub cancel_token_created_at: Option<NaiveDateTime>,
    pub cancel_token_expires_at: Option<NaiveDateTime>,
    pub cancel_token_used_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub part_ordered_at: Option<NaiveDateTime>,
}

/// Fields supplied by the booking form
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub service_label: String,
    pub duration_min: i64,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
}

/// Cancel token issued for a freshly inserted appointment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelGrant {
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// A catalog row: price and duration of one repair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairPrice {
    pub category: String,
    pub brand: String,
    pub model: String,
    pub problem: String,
    pub price: f64,
    pub duration: Option<u32>,
    #[serde(skip)]
    pub updated_at: Option<NaiveDateTime>,
}

/// A quote handed to a customer, referenced later by its tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub tag: u64,
    pub category: String,
    pub brand: String,
    pub model: String,
    pub problem: String,
    pub price: f64,
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub rating: u8,
    pub comment: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub show_name: bool,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub source_page: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: u64,
    pub rating: u8,
    pub comment: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub show_name: bool,
    pub status: ReviewStatus,
    pub ip_hash: Option<String>,
    pub user_agent: Option<String>,
    pub source_page: Option<String>,
    pub created_at: NaiveDateTime,
}
