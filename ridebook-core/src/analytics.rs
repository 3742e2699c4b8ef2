use chrono::Timelike;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::{Ride, RideFilter, RideStatus};
use crate::store::RideStore;

/// Number of rides of every status, including zero counts.
pub type StatusCounts = BTreeMap<RideStatus, usize>;

/// Dashboard rollup over the whole ride collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_rides: usize,
    pub total_revenue: Decimal,
    pub average_duration: f64,
    /// Two-digit hour of day, `None` when there are no rides
    pub busiest_hour: Option<String>,
    pub rides_by_status: StatusCounts,
}

pub fn total_rides(rides: &[Ride]) -> usize {
    rides.len()
}

/// Sum of `total_cost` over every ride that was not cancelled.
pub fn total_revenue(rides: &[Ride]) -> Decimal {
    rides
        .iter()
        .filter(|ride| ride.status != RideStatus::Cancelled)
        .map(|ride| ride.total_cost)
        .sum()
}

/// Mean `duration_hours` over all rides, 0 when there are none.
pub fn average_duration(rides: &[Ride]) -> f64 {
    if rides.is_empty() {
        return 0.0;
    }
    rides.iter().map(|ride| ride.duration_hours).sum::<f64>() / rides.len() as f64
}

/// Hour of day with the most pickups, formatted `"HH"`.
///
/// Ties go to the earliest hour.
pub fn busiest_hour(rides: &[Ride]) -> Option<String> {
    let mut counts = [0usize; 24];
    for ride in rides {
        counts[ride.pickup_time.hour() as usize] += 1;
    }

    // max_by_key keeps the last maximum, so walk hours from 23 down.
    counts
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, count)| **count > 0)
        .max_by_key(|(_, count)| **count)
        .map(|(hour, _)| format!("{:02}", hour))
}

pub fn rides_by_status(rides: &[Ride]) -> StatusCounts {
    let mut counts: StatusCounts = RideStatus::ALL.iter().map(|status| (*status, 0)).collect();
    for ride in rides {
        *counts.entry(ride.status).or_default() += 1;
    }
    counts
}

/// Read-only reporting over the ride store.
#[derive(Clone)]
pub struct Analytics {
    rides: Arc<dyn RideStore>,
}

impl Analytics {
    pub fn new(rides: Arc<dyn RideStore>) -> Self {
        Self { rides }
    }

    /// Loads every ride and computes the full rollup from one snapshot.
    pub async fn summary(&self) -> Result<Summary, BookingError> {
        let rides = self.rides.list_rides(&RideFilter::default()).await?;
        Ok(Summary {
            total_rides: total_rides(&rides),
            total_revenue: total_revenue(&rides),
            average_duration: average_duration(&rides),
            busiest_hour: busiest_hour(&rides),
            rides_by_status: rides_by_status(&rides),
        })
    }
}
