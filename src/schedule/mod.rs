pub mod types;
pub mod slot_utils;
pub mod clock;
pub mod generator;

pub use types::{BlackoutBlock, BlockShape, BookedInterval, CandidateSlot, DaySlots, OpeningWindow, PromoRule, TimeWindow};
pub use slot_utils::{format_clock, format_datetime, parse_clock_time, parse_local_datetime};
pub use clock::{Clock, FixedClock, SystemClock, SHOP_TZ};
pub use generator::{generate_availability, AvailabilityQuery, ScheduleError, ScheduleInputs};
