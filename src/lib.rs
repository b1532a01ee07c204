//! Recurring-event engine for a simulated calendar backend.
//!
//! Three layers, leaves first: [`datetime`] normalizes date/time/offset/zone
//! strings, [`recurrence::validator`] parses `RRULE:`/`EXDATE:`/`RDATE:`
//! entries, and [`recurrence::expander`] turns a recurring event into its
//! concrete occurrences for a [`calendar::TimeWindow`].

pub mod calendar;
pub mod datetime;
pub mod error;
pub mod recurrence;

pub use calendar::{Event, EventDateTime, EventId, Occurrence, TimeWindow};
pub use error::{CadenceError, DateTimeValidationError, InvalidInputError, Result};
pub use recurrence::{expand_event, expand_recurring_events, validate_recurrence_rules};
