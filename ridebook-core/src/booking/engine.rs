use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::booking::clock::{Clock, SystemClock};
use crate::booking::overlap::{has_overlap, Interval};
use crate::booking::state_machine::{RideEvent, RideStateMachine, Transition};
use crate::booking::validation::{
    ensure_non_negative, ensure_non_negative_amount, ensure_not_in_past, ensure_present,
    parse_pickup_time,
};
use crate::directory::Directory;
use crate::error::BookingError;
use crate::fare::compute_fare;
use crate::models::{
    NewRide, Ride, RideChanges, RideFilter, RidePatch, RideRequest, RideStatus,
};
use crate::store::RideStore;

/// Ride lifecycle service.
///
/// Owns the booking rules: fares, the no-past-pickup rule, the lifecycle
/// state machine and the per-driver overlap check. Every mutating
/// operation re-reads the ride from the store and writes it back with a
/// conditional update, so a decision is never based on a stale copy.
#[derive(Clone)]
pub struct BookingEngine {
    rides: Arc<dyn RideStore>,
    directory: Directory,
    clock: Arc<dyn Clock>,
}

impl BookingEngine {
    /// Creates an engine that reads "now" from the system clock.
    ///
    /// # Arguments
    ///
    /// * `rides` - Ride persistence
    /// * `directory` - User roster handed to presentation layers
    pub fn new(rides: Arc<dyn RideStore>, directory: Directory) -> Self {
        Self::with_clock(rides, directory, Arc::new(SystemClock))
    }

    /// Creates an engine with an explicit clock.
    pub fn with_clock(
        rides: Arc<dyn RideStore>,
        directory: Directory,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rides,
            directory,
            clock,
        }
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Books a new ride for a registered customer.
    ///
    /// # Arguments
    ///
    /// * `request` - Booking form; `pickup_time` is parsed here
    ///
    /// # Returns
    ///
    /// Returns the stored pending ride with its assigned id and fare.
    ///
    /// # Errors
    ///
    /// `Validation` for negative or unpriceably large quantities, an
    /// unparseable or past pickup time; `NotFound` if the customer is not
    /// registered. The store checks the customer in the same unit as the
    /// insert, so a concurrent deletion cannot slip in between.
    #[instrument(skip(self, request), fields(customer = %request.customer_email))]
    pub async fn create(&self, request: RideRequest) -> Result<Ride, BookingError> {
        ensure_present("pickup_location", &request.pickup_location)?;
        ensure_present("destination", &request.destination)?;
        let duration_hours = ensure_non_negative("duration_hours", request.duration_hours)?;
        let distance_km = ensure_non_negative("distance_km", request.distance_km)?;
        let tip_amount = ensure_non_negative_amount("tip_amount", request.tip_amount)?;

        let pickup_time = parse_pickup_time(&request.pickup_time)?;
        ensure_not_in_past(pickup_time, self.clock.now())?;
        // The occupied window must be representable before anything is stored.
        Interval::from_hours(pickup_time, duration_hours)?;

        let fare = compute_fare(distance_km, duration_hours, tip_amount)?;
        let ride = self
            .rides
            .create_ride(NewRide {
                customer_email: request.customer_email,
                pickup_location: request.pickup_location,
                destination: request.destination,
                pickup_time,
                duration_hours,
                distance_km,
                base_cost: fare.base_cost,
                tip_amount,
                total_cost: fare.total_cost,
            })
            .await?;

        info!(
            "Ride {} booked for {} at {} (total {})",
            ride.id, ride.customer_email, ride.pickup_time, ride.total_cost
        );
        Ok(ride)
    }

    /// A driver takes a pending ride.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown ride or driver; `Conflict` if the ride is
    /// no longer pending or overlaps one of the driver's accepted rides.
    #[instrument(skip(self))]
    pub async fn accept(&self, ride_id: i64, driver_email: &str) -> Result<Ride, BookingError> {
        let ride = self.bind(ride_id, driver_email).await?;
        info!("Ride {} accepted by {}", ride.id, driver_email);
        Ok(ride)
    }

    /// An admin binds a driver to a pending ride.
    ///
    /// Runs the same checks as [`BookingEngine::accept`].
    #[instrument(skip(self))]
    pub async fn assign(&self, ride_id: i64, driver_email: &str) -> Result<Ride, BookingError> {
        let ride = self.bind(ride_id, driver_email).await?;
        info!("Driver {} assigned to ride {}", driver_email, ride.id);
        Ok(ride)
    }

    async fn bind(&self, ride_id: i64, driver_email: &str) -> Result<Ride, BookingError> {
        let guard = |ride: &Ride, others: &[Ride]| -> Result<(), BookingError> {
            if RideStateMachine::transition(ride.status, RideEvent::BindDriver).is_none() {
                return Err(BookingError::conflict(format!(
                    "ride {} is no longer available",
                    ride.id
                )));
            }

            let candidate = ride.interval()?;
            let booked = others
                .iter()
                .map(Ride::interval)
                .collect::<Result<Vec<_>, _>>()?;
            if has_overlap(&candidate, &booked) {
                return Err(BookingError::conflict(format!(
                    "driver {} has an overlapping booking",
                    driver_email
                )));
            }
            Ok(())
        };

        self.rides
            .bind_driver(ride_id, driver_email, &guard)
            .await
            .map_err(|e| {
                warn!("Binding {} to ride {} refused: {}", driver_email, ride_id, e);
                e
            })
    }

    /// Marks an accepted ride as completed.
    #[instrument(skip(self))]
    pub async fn complete(&self, ride_id: i64) -> Result<Ride, BookingError> {
        let ride = self.load(ride_id).await?;
        let next = self.next_status(&ride, RideEvent::Complete)?;

        let ride = self
            .rides
            .update_ride(ride_id, ride.status, RideChanges::status(next))
            .await?
            .ok_or_else(|| stale(ride_id))?;

        info!("Ride {} completed", ride.id);
        Ok(ride)
    }

    /// The owning customer cancels a pending or accepted ride.
    ///
    /// The bound driver, if any, stays on the record.
    #[instrument(skip(self))]
    pub async fn cancel(&self, ride_id: i64, customer_email: &str) -> Result<Ride, BookingError> {
        let ride = self.load(ride_id).await?;
        self.ensure_owner(&ride, customer_email)?;
        let next = self.next_status(&ride, RideEvent::Cancel)?;

        let ride = self
            .rides
            .update_ride(ride_id, ride.status, RideChanges::status(next))
            .await?
            .ok_or_else(|| stale(ride_id))?;

        info!("Ride {} cancelled by {}", ride.id, customer_email);
        Ok(ride)
    }

    /// The owning customer edits a pending ride.
    ///
    /// # Arguments
    ///
    /// * `ride_id` - Ride to edit
    /// * `customer_email` - Must own the ride
    /// * `patch` - Fields to change; absent fields keep their value
    ///
    /// # Returns
    ///
    /// Returns the updated ride. The fare is recomputed from the resulting
    /// distance and duration with the original tip.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        ride_id: i64,
        customer_email: &str,
        patch: RidePatch,
    ) -> Result<Ride, BookingError> {
        let ride = self.load(ride_id).await?;
        self.ensure_owner(&ride, customer_email)?;
        self.next_status(&ride, RideEvent::Edit)?;

        if let Some(pickup) = &patch.pickup_location {
            ensure_present("pickup_location", pickup)?;
        }
        if let Some(destination) = &patch.destination {
            ensure_present("destination", destination)?;
        }
        let duration_hours = patch
            .duration_hours
            .map(|hours| ensure_non_negative("duration_hours", hours))
            .transpose()?;
        let distance_km = patch
            .distance_km
            .map(|km| ensure_non_negative("distance_km", km))
            .transpose()?;
        let pickup_time = match &patch.pickup_time {
            Some(text) => {
                let parsed = parse_pickup_time(text)?;
                ensure_not_in_past(parsed, self.clock.now())?;
                Some(parsed)
            }
            None => None,
        };

        let effective_duration = duration_hours.unwrap_or(ride.duration_hours);
        let effective_distance = distance_km.unwrap_or(ride.distance_km);
        Interval::from_hours(pickup_time.unwrap_or(ride.pickup_time), effective_duration)?;
        let fare = compute_fare(effective_distance, effective_duration, ride.tip_amount)?;

        let changes = RideChanges {
            pickup_location: patch.pickup_location,
            destination: patch.destination,
            pickup_time,
            duration_hours,
            distance_km,
            base_cost: Some(fare.base_cost),
            total_cost: Some(fare.total_cost),
            status: None,
        };

        let ride = self
            .rides
            .update_ride(ride_id, RideStatus::Pending, changes)
            .await?
            .ok_or_else(|| stale(ride_id))?;

        info!("Ride {} updated (total {})", ride.id, ride.total_cost);
        Ok(ride)
    }

    pub async fn get_ride(&self, ride_id: i64) -> Result<Option<Ride>, BookingError> {
        self.rides.get_ride(ride_id).await
    }

    pub async fn list_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, BookingError> {
        self.rides.list_rides(filter).await
    }

    /// Rides waiting for a driver.
    pub async fn pending_rides(&self) -> Result<Vec<Ride>, BookingError> {
        self.rides
            .list_rides(&RideFilter {
                status: Some(RideStatus::Pending),
                ..Default::default()
            })
            .await
    }

    pub async fn customer_rides(&self, customer_email: &str) -> Result<Vec<Ride>, BookingError> {
        self.rides
            .list_rides(&RideFilter {
                customer_email: Some(customer_email.to_string()),
                ..Default::default()
            })
            .await
    }

    pub async fn driver_rides(&self, driver_email: &str) -> Result<Vec<Ride>, BookingError> {
        self.rides
            .list_rides(&RideFilter {
                driver_email: Some(driver_email.to_string()),
                ..Default::default()
            })
            .await
    }

    async fn load(&self, ride_id: i64) -> Result<Ride, BookingError> {
        self.rides
            .get_ride(ride_id)
            .await?
            .ok_or_else(|| BookingError::not_found(format!("ride {} not found", ride_id)))
    }

    fn ensure_owner(&self, ride: &Ride, customer_email: &str) -> Result<(), BookingError> {
        if ride.is_owned_by(customer_email) {
            Ok(())
        } else {
            warn!("{} tried to modify ride {} they do not own", customer_email, ride.id);
            Err(BookingError::conflict(format!(
                "ride {} does not belong to {}",
                ride.id, customer_email
            )))
        }
    }

    fn next_status(&self, ride: &Ride, event: RideEvent) -> Result<RideStatus, BookingError> {
        RideStateMachine::transition(ride.status, event).ok_or_else(|| {
            BookingError::conflict(format!(
                "cannot {} ride {} while it is {}",
                event, ride.id, ride.status
            ))
        })
    }
}

fn stale(ride_id: i64) -> BookingError {
    BookingError::conflict(format!("ride {} changed concurrently, retry", ride_id))
}
