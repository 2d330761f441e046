use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::{Europe::Paris, Tz};

/// Civil time zone of the shop; every stored timestamp is wall-clock time here
pub const SHOP_TZ: Tz = Paris;

/// Source of "now" in shop-local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&SHOP_TZ).naive_local()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Attaches the shop offset to a local timestamp.
/// Times inside a DST gap resolve to the instant one hour later.
pub fn to_shop_time(local: NaiveDateTime) -> DateTime<Tz> {
    match SHOP_TZ.from_local_datetime(&local).earliest() {
        Some(zoned) => zoned,
        None => SHOP_TZ.from_utc_datetime(&(local - chrono::Duration::hours(1))),
    }
}
