use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Timestamp format used on the wire and in seed files
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A wall-clock interval [start, end) within a single day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Anchors the window on a calendar date
    pub fn on(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        (date.and_time(self.start), date.and_time(self.end))
    }
}

/// Weekly opening configuration for one weekday (0 = Sunday .. 6 = Saturday)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningWindow {
    pub weekday: u8,
    pub morning: Option<TimeWindow>,
    pub afternoon: Option<TimeWindow>,
    pub step_min: u32,
}

impl OpeningWindow {
    /// Configured sub-windows in chronological order
    pub fn sub_windows(&self) -> impl Iterator<Item = &TimeWindow> {
        self.morning.iter().chain(self.afternoon.iter())
    }
}

/// Discount applied to slots fully contained in a weekday time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoRule {
    pub weekday: u8,
    pub window: TimeWindow,
    pub discount_pct: u8,
}

/// A confirmed appointment as seen by the slot generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookedInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// How a blackout block removes availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockShape {
    /// Removes every slot overlapping [start, end)
    Range,
    /// Removes only the slot starting exactly at `start`
    SlotToggle,
}

/// Marker stored in a block's notes for single-slot toggles
pub const SLOT_TOGGLE_NOTE: &str = "slot_toggle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutBlock {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub kind: String,
    pub shape: BlockShape,
}

impl BlackoutBlock {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, kind: &str, notes: Option<&str>) -> Self {
        let shape = match notes {
            Some(note) if note.trim() == SLOT_TOGGLE_NOTE => BlockShape::SlotToggle,
            _ => BlockShape::Range,
        };
        Self {
            start,
            end,
            kind: kind.to_string(),
            shape,
        }
    }

    /// "open" blocks never remove availability
    pub fn reduces_availability(&self) -> bool {
        !self.kind.trim().eq_ignore_ascii_case("open")
    }
}

/// A bookable start time produced by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub discount_pct: u8,
}

/// Availability for a single calendar date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub slots: Vec<CandidateSlot>,
}
