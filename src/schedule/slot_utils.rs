use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use super::types::{BlackoutBlock, BlockShape, PromoRule, DATETIME_FORMAT};

/// Half-open overlap test: [a_start, a_end) intersects [b_start, b_end)
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// A toggle block only matches the slot that starts exactly at its start
pub fn toggle_matches(slot_start: NaiveDateTime, block: &BlackoutBlock) -> bool {
    block.shape == BlockShape::SlotToggle && slot_start == block.start
}

/// Whether `block` removes the slot [slot_start, slot_end)
pub fn is_blocked_by(slot_start: NaiveDateTime, slot_end: NaiveDateTime, block: &BlackoutBlock) -> bool {
    if !block.reduces_availability() {
        return false;
    }
    match block.shape {
        BlockShape::SlotToggle => toggle_matches(slot_start, block),
        BlockShape::Range => overlaps(slot_start, slot_end, block.start, block.end),
    }
}

/// Full containment of the slot in the promo window on the given date
pub fn promo_covers(rule: &PromoRule, date: NaiveDate, slot_start: NaiveDateTime, slot_end: NaiveDateTime) -> bool {
    let (promo_start, promo_end) = rule.window.on(date);
    slot_start >= promo_start && slot_end <= promo_end
}

/// Weekday index with Sunday = 0
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Parses a wall-clock time (HH:MM or HH:MM:SS)
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

/// Parses a local timestamp, accepting a space or `T` separator and optional seconds
pub fn parse_local_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

pub fn format_datetime(value: NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Formats the wall-clock part as HH:MM
pub fn format_clock(value: NaiveDateTime) -> String {
    value.format("%H:%M").to_string()
}
