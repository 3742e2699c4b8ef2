//! Booking rules: fares per ride, lifecycle transitions, the
//! per-driver no-overlap check and input validation.

pub mod clock;
pub mod engine;
pub mod overlap;
pub mod state_machine;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::BookingEngine;
