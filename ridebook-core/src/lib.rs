//! Ride booking core: fares, scheduling rules and the ride lifecycle,
//! with PostgreSQL and in-memory persistence and an HTTP API.

pub mod analytics;
pub mod api;
pub mod auth;
pub mod booking;
pub mod config;
pub mod db;
pub mod directory;
pub mod distance;
pub mod error;
pub mod fare;
pub mod models;
pub mod store;

pub use error::BookingError;
