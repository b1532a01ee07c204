pub mod event;
pub mod time_utils;

pub use event::{Event, EventDateTime, EventId, Occurrence};
pub use time_utils::{TimeWindow, DEFAULT_MAX_INSTANCES};
