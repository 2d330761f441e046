use std::collections::HashMap;
use std::path::Path;

use csv::{Reader, StringRecord};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::schedule::{parse_clock_time, parse_local_datetime, BlackoutBlock, OpeningWindow, PromoRule, TimeWindow};
use crate::store::{RepairPrice, ShopData};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file} line {line}: {reason}")]
    Invalid { file: String, line: u64, reason: String },
}

#[derive(Debug, Deserialize)]
struct OpeningRow {
    weekday: i64,
    morning_start: Option<String>,
    morning_end: Option<String>,
    afternoon_start: Option<String>,
    afternoon_end: Option<String>,
    slot_step_min: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PromoRow {
    weekday: i64,
    start_time: String,
    end_time: String,
    discount_pct: i64,
}

#[derive(Debug, Deserialize)]
struct RepairRow {
    category: String,
    brand: String,
    model: String,
    problem: String,
    price: f64,
    duration: Option<u32>,
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockRow {
    start_datetime: String,
    end_datetime: String,
    #[serde(rename = "type")]
    kind: String,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SettingRow {
    key: String,
    value: String,
}

/// Treats empty or whitespace-only cells as absent
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Reads every row of an optional CSV file, passing its line number along.
/// A missing file yields no rows.
fn read_rows<T, P>(path: P) -> Result<Vec<(u64, T)>, SeedError>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = path.display().to_string();
    if !path.exists() {
        warn!("Seed file {} not found, skipping", file);
        return Ok(Vec::new());
    }

    let csv_error = |source| SeedError::Csv { file: file.clone(), source };
    let mut reader = Reader::from_path(path).map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record: StringRecord = result.map_err(csv_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: T = record.deserialize(Some(&headers)).map_err(csv_error)?;
        rows.push((line, row));
    }
    Ok(rows)
}

fn invalid(file: &Path, line: u64, reason: impl Into<String>) -> SeedError {
    SeedError::Invalid {
        file: file.display().to_string(),
        line,
        reason: reason.into(),
    }
}

fn weekday(file: &Path, line: u64, value: i64) -> Result<u8, SeedError> {
    if (0..=6).contains(&value) {
        Ok(value as u8)
    } else {
        Err(invalid(file, line, format!("weekday {} outside 0-6", value)))
    }
}

fn window(
    file: &Path,
    line: u64,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Option<TimeWindow>, SeedError> {
    // A half-configured window is treated like an absent one
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(None);
    };
    let start = parse_clock_time(start).ok_or_else(|| invalid(file, line, format!("bad time '{}'", start)))?;
    let end = parse_clock_time(end).ok_or_else(|| invalid(file, line, format!("bad time '{}'", end)))?;
    Ok(Some(TimeWindow::new(start, end)))
}

/// Loads the weekly opening hours
pub fn load_opening_hours(path: &Path) -> Result<Vec<OpeningWindow>, SeedError> {
    let mut opening = Vec::new();
    for (line, row) in read_rows::<OpeningRow, _>(path)? {
        let weekday = weekday(path, line, row.weekday)?;
        let morning = window(path, line, non_empty(&row.morning_start), non_empty(&row.morning_end))?;
        let afternoon = window(path, line, non_empty(&row.afternoon_start), non_empty(&row.afternoon_end))?;
        let step = row.slot_step_min.unwrap_or(0);
        if (morning.is_some() || afternoon.is_some()) && step <= 0 {
            return Err(invalid(path, line, "slot_step_min must be positive"));
        }
        let step_min = u32::try_from(step.max(0))
            .map_err(|_| invalid(path, line, format!("slot_step_min {} is too large", step)))?;
        opening.push(OpeningWindow {
            weekday,
            morning,
            afternoon,
            step_min,
        });
    }
    Ok(opening)
}

/// Loads the promotional discount rules, keeping file order
pub fn load_promo_rules(path: &Path) -> Result<Vec<PromoRule>, SeedError> {
    let mut rules = Vec::new();
    for (line, row) in read_rows::<PromoRow, _>(path)? {
        let weekday = weekday(path, line, row.weekday)?;
        let window = window(path, line, Some(row.start_time.as_str()), Some(row.end_time.as_str()))?
            .ok_or_else(|| invalid(path, line, "promo window missing"))?;
        if !(0..=100).contains(&row.discount_pct) {
            return Err(invalid(path, line, format!("discount {} outside 0-100", row.discount_pct)));
        }
        rules.push(PromoRule {
            weekday,
            window,
            discount_pct: row.discount_pct as u8,
        });
    }
    Ok(rules)
}

/// Loads the repair catalog
pub fn load_repairs(path: &Path) -> Result<Vec<RepairPrice>, SeedError> {
    let mut repairs = Vec::new();
    for (line, row) in read_rows::<RepairRow, _>(path)? {
        let updated_at = match non_empty(&row.updated_at) {
            Some(value) => Some(
                parse_local_datetime(value)
                    .ok_or_else(|| invalid(path, line, format!("bad timestamp '{}'", value)))?,
            ),
            None => None,
        };
        repairs.push(RepairPrice {
            category: row.category.trim().to_string(),
            brand: row.brand.trim().to_string(),
            model: row.model.trim().to_string(),
            problem: row.problem.trim().to_string(),
            price: row.price,
            duration: row.duration,
            updated_at,
        });
    }
    Ok(repairs)
}

/// Loads blackout blocks; `notes == slot_toggle` marks a single-slot toggle
pub fn load_blocks(path: &Path) -> Result<Vec<BlackoutBlock>, SeedError> {
    let mut blocks = Vec::new();
    for (line, row) in read_rows::<BlockRow, _>(path)? {
        let start = parse_local_datetime(&row.start_datetime)
            .ok_or_else(|| invalid(path, line, format!("bad timestamp '{}'", row.start_datetime)))?;
        let end = parse_local_datetime(&row.end_datetime)
            .ok_or_else(|| invalid(path, line, format!("bad timestamp '{}'", row.end_datetime)))?;
        blocks.push(BlackoutBlock::new(start, end, row.kind.trim(), non_empty(&row.notes)));
    }
    Ok(blocks)
}

pub fn load_settings(path: &Path) -> Result<HashMap<String, String>, SeedError> {
    Ok(read_rows::<SettingRow, _>(path)?
        .into_iter()
        .map(|(_, row)| (row.key.trim().to_string(), row.value))
        .collect())
}

/// Loads every seed file found in `dir`
pub fn load_seed<P: AsRef<Path>>(dir: P) -> Result<ShopData, SeedError> {
    let dir = dir.as_ref();
    let data = ShopData {
        opening_hours: load_opening_hours(&dir.join("opening_hours.csv"))?,
        promo_rules: load_promo_rules(&dir.join("promo_rules.csv"))?,
        blocks: load_blocks(&dir.join("blocks.csv"))?,
        repairs: load_repairs(&dir.join("repairs.csv"))?,
        settings: load_settings(&dir.join("settings.csv"))?,
        ..Default::default()
    };
    info!(
        "Loaded seed data from {}: {} opening days, {} promo rules, {} blocks, {} repairs",
        dir.display(),
        data.opening_hours.len(),
        data.promo_rules.len(),
        data.blocks.len(),
        data.repairs.len()
    );
    Ok(data)
}
