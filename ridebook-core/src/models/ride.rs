use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::booking::overlap::Interval;
use crate::error::BookingError;

/// Ride status enumeration.
///
/// - Pending: requested by a customer, no driver bound yet (initial)
/// - Accepted: bound to a driver
/// - Completed: terminal
/// - Cancelled: terminal
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar")]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    #[sqlx(rename = "pending")]
    Pending,

    #[sqlx(rename = "accepted")]
    Accepted,

    #[sqlx(rename = "completed")]
    Completed,

    #[sqlx(rename = "cancelled")]
    Cancelled,
}

impl RideStatus {
    pub const ALL: [RideStatus; 4] = [
        RideStatus::Pending,
        RideStatus::Accepted,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a ride in this status still occupies its driver's calendar.
    pub fn is_active(&self) -> bool {
        matches!(self, RideStatus::Pending | RideStatus::Accepted)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RideStatus::Pending),
            "accepted" => Ok(RideStatus::Accepted),
            "completed" => Ok(RideStatus::Completed),
            "cancelled" => Ok(RideStatus::Cancelled),
            other => Err(BookingError::validation(format!("unknown ride status '{}'", other))),
        }
    }
}

/// Ride model representing a single booking.
///
/// This struct maps to the `rides` table. The authoritative copy always
/// lives in the store; callers re-read before mutating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ride {
    /// Monotonically assigned identifier, never reused
    pub id: i64,

    /// Email of the customer who requested the ride
    pub customer_email: String,

    /// Email of the bound driver (None while pending)
    pub driver_email: Option<String>,

    /// Opaque pickup descriptor (coordinates or free text)
    pub pickup_location: String,

    /// Opaque destination descriptor
    pub destination: String,

    /// Scheduled pickup, naive local time
    pub pickup_time: NaiveDateTime,

    /// Span the driver is committed to this ride
    pub duration_hours: f64,

    pub distance_km: f64,

    pub base_cost: Decimal,

    pub tip_amount: Decimal,

    /// base_cost + waiting cost + tip
    pub total_cost: Decimal,

    pub status: RideStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Ride {
    /// The half-open window `[pickup_time, pickup_time + duration)` during
    /// which the bound driver is occupied.
    pub fn interval(&self) -> Result<Interval, BookingError> {
        Interval::from_hours(self.pickup_time, self.duration_hours)
    }

    pub fn is_owned_by(&self, customer_email: &str) -> bool {
        self.customer_email == customer_email
    }
}

/// Ride creation request as received from a presentation layer.
///
/// `pickup_time` is kept as text so the engine can reject unparseable
/// input itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub customer_email: String,
    pub pickup_location: String,
    pub destination: String,
    pub pickup_time: String,
    pub duration_hours: f64,
    pub distance_km: f64,
    #[serde(default)]
    pub tip_amount: Decimal,
}

/// Partial edit of a pending ride. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RidePatch {
    pub pickup_location: Option<String>,
    pub destination: Option<String>,
    pub pickup_time: Option<String>,
    pub duration_hours: Option<f64>,
    pub distance_km: Option<f64>,
}

impl RidePatch {
    pub fn is_empty(&self) -> bool {
        self.pickup_location.is_none()
            && self.destination.is_none()
            && self.pickup_time.is_none()
            && self.duration_hours.is_none()
            && self.distance_km.is_none()
    }
}

/// Fully validated ride ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRide {
    pub customer_email: String,
    pub pickup_location: String,
    pub destination: String,
    pub pickup_time: NaiveDateTime,
    pub duration_hours: f64,
    pub distance_km: f64,
    pub base_cost: Decimal,
    pub tip_amount: Decimal,
    pub total_cost: Decimal,
}

/// Validated field changes written by a conditional update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideChanges {
    pub pickup_location: Option<String>,
    pub destination: Option<String>,
    pub pickup_time: Option<NaiveDateTime>,
    pub duration_hours: Option<f64>,
    pub distance_km: Option<f64>,
    pub base_cost: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub status: Option<RideStatus>,
}

impl RideChanges {
    pub fn status(status: RideStatus) -> Self {
        RideChanges {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Applies the changes to an in-memory copy of a ride.
    pub fn apply_to(&self, ride: &mut Ride) {
        if let Some(pickup) = &self.pickup_location {
            ride.pickup_location = pickup.clone();
        }
        if let Some(destination) = &self.destination {
            ride.destination = destination.clone();
        }
        if let Some(pickup_time) = self.pickup_time {
            ride.pickup_time = pickup_time;
        }
        if let Some(duration) = self.duration_hours {
            ride.duration_hours = duration;
        }
        if let Some(distance) = self.distance_km {
            ride.distance_km = distance;
        }
        if let Some(base_cost) = self.base_cost {
            ride.base_cost = base_cost;
        }
        if let Some(total_cost) = self.total_cost {
            ride.total_cost = total_cost;
        }
        if let Some(status) = self.status {
            ride.status = status;
        }
        ride.updated_at = Utc::now();
    }
}

/// Filter for ride listings; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RideFilter {
    pub customer_email: Option<String>,
    pub driver_email: Option<String>,
    pub status: Option<RideStatus>,
}

impl RideFilter {
    pub fn matches(&self, ride: &Ride) -> bool {
        self.customer_email
            .as_deref()
            .map_or(true, |email| ride.customer_email == email)
            && self
                .driver_email
                .as_deref()
                .map_or(true, |email| ride.driver_email.as_deref() == Some(email))
            && self.status.map_or(true, |status| ride.status == status)
    }
}
