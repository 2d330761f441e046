use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use log::warn;
use thiserror::Error;

use super::slot_utils::{is_blocked_by, overlaps, promo_covers, weekday_index};
use super::types::{BlackoutBlock, BookedInterval, CandidateSlot, DaySlots, OpeningWindow, PromoRule};

pub const MIN_DAYS: u32 = 1;
pub const MAX_DAYS: u32 = 14;
pub const DEFAULT_DAYS: u32 = 7;
pub const DEFAULT_LEAD_MIN: i64 = 180;
/// Longest bookable slot
pub const MAX_DURATION_MIN: i64 = 24 * 60;
pub const MAX_LEAD_MIN: i64 = MAX_DAYS as i64 * 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("duration must be a positive number of minutes")]
    MissingDuration,

    #[error("duration must not exceed 1440 minutes")]
    DurationTooLong,

    #[error("start date is out of range")]
    DateOutOfRange,
}

/// A validated availability request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub start_date: NaiveDate,
    pub days: u32,
    pub duration_min: i64,
    pub lead_min: i64,
}

impl AvailabilityQuery {
    /// Clamps `days` to [1, 14] and `lead_min` to [0, 14 days]; rejects durations
    /// outside (0, one day] and start dates too close to the end of the calendar
    pub fn new(
        start_date: NaiveDate,
        days: i64,
        duration_min: Option<i64>,
        lead_min: i64,
    ) -> Result<Self, ScheduleError> {
        let duration_min = match duration_min {
            Some(minutes) if minutes > 0 => minutes,
            _ => return Err(ScheduleError::MissingDuration),
        };
        if duration_min > MAX_DURATION_MIN {
            return Err(ScheduleError::DurationTooLong);
        }
        // The last scanned day plus one slot must stay representable
        start_date
            .checked_add_days(Days::new(MAX_DAYS as u64 + 2))
            .ok_or(ScheduleError::DateOutOfRange)?;

        Ok(Self {
            start_date,
            days: days.clamp(MIN_DAYS as i64, MAX_DAYS as i64) as u32,
            duration_min,
            lead_min: lead_min.clamp(0, MAX_LEAD_MIN),
        })
    }

    /// First date past the scanned range
    pub fn end_date(&self) -> NaiveDate {
        self.start_date + Duration::days(self.days as i64)
    }

    /// Half-open timestamp range covering every scanned date
    pub fn range(&self) -> (NaiveDateTime, NaiveDateTime) {
        (
            self.start_date.and_time(chrono::NaiveTime::MIN),
            self.end_date().and_time(chrono::NaiveTime::MIN),
        )
    }
}

/// Everything the generator reads, already fetched from storage
#[derive(Debug, Clone, Copy)]
pub struct ScheduleInputs<'a> {
    pub opening: &'a [OpeningWindow],
    pub promos: &'a [PromoRule],
    pub booked: &'a [BookedInterval],
    pub blocks: &'a [BlackoutBlock],
}

/// Computes the open slots of every date in the query range
pub fn generate_availability(
    query: &AvailabilityQuery,
    inputs: &ScheduleInputs<'_>,
    now: NaiveDateTime,
) -> Vec<DaySlots> {
    let lead_limit = now
        .checked_add_signed(Duration::minutes(query.lead_min))
        .unwrap_or(NaiveDateTime::MAX);

    (0..query.days)
        .map(|offset| {
            let date = query.start_date + Duration::days(offset as i64);
            DaySlots {
                date,
                slots: slots_for_date(date, query.duration_min, lead_limit, inputs),
            }
        })
        .collect()
}

/// Candidate slots of a single date; a closed day yields an empty list
pub fn slots_for_date(
    date: NaiveDate,
    duration_min: i64,
    lead_limit: NaiveDateTime,
    inputs: &ScheduleInputs<'_>,
) -> Vec<CandidateSlot> {
    let weekday = weekday_index(date);
    let Some(opening) = inputs.opening.iter().find(|o| o.weekday == weekday) else {
        return Vec::new();
    };
    if opening.step_min == 0 {
        warn!("Opening hours for weekday {} have a zero step, treating day as closed", weekday);
        return Vec::new();
    }

    let step = Duration::minutes(opening.step_min as i64);
    let duration = Duration::minutes(duration_min);
    let promos: Vec<&PromoRule> = inputs.promos.iter().filter(|p| p.weekday == weekday).collect();
    let mut slots = Vec::new();

    for window in opening.sub_windows() {
        let (open_start, open_end) = window.on(date);
        let mut slot_start = open_start;

        while slot_start <= open_end {
            let Some(slot_end) = slot_start.checked_add_signed(duration) else {
                break;
            };
            // Later starts only end later, so the rest of the window is out too
            if slot_end > open_end {
                break;
            }

            let current = slot_start;
            slot_start = current.checked_add_signed(step).unwrap_or(NaiveDateTime::MAX);

            if current < lead_limit {
                continue;
            }
            if inputs.booked.iter().any(|b| overlaps(current, slot_end, b.start, b.end)) {
                continue;
            }
            if inputs.blocks.iter().any(|b| is_blocked_by(current, slot_end, b)) {
                continue;
            }

            let discount_pct = promos
                .iter()
                .find(|rule| promo_covers(rule, date, current, slot_end))
                .map(|rule| rule.discount_pct)
                .unwrap_or(0);

            slots.push(CandidateSlot {
                start: current,
                end: slot_end,
                discount_pct,
            });
        }
    }

    slots.sort_by_key(|slot| slot.start);
    slots
}
