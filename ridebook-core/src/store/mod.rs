//! Persistence contract consumed by the booking core.
//!
//! Two implementations exist: [`PgStore`] backed by PostgreSQL and
//! [`MemoryStore`] for tests and local tooling. Both guarantee that
//! [`RideStore::bind_driver`] runs its read-check-write as one atomic unit.

use async_trait::async_trait;

use crate::error::BookingError;
use crate::models::{NewRide, NewUser, Ride, RideChanges, RideFilter, RideStatus, Role, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Check run inside the driver-binding transaction.
///
/// Receives the freshly locked ride and the driver's other active
/// (pending or accepted) rides, excluding the ride itself. Returning an
/// error aborts the transaction without writing.
pub type BindGuard<'a> = &'a (dyn Fn(&Ride, &[Ride]) -> Result<(), BookingError> + Send + Sync);

#[async_trait]
pub trait RideStore: Send + Sync {
    /// Inserts a pending ride and returns it with its assigned id.
    ///
    /// The customer's registration is checked atomically with the insert:
    /// `NotFound` unless `customer_email` is a registered customer.
    async fn create_ride(&self, ride: NewRide) -> Result<Ride, BookingError>;

    async fn get_ride(&self, id: i64) -> Result<Option<Ride>, BookingError>;

    /// Writes `changes` only if the ride's status is still `expected`.
    ///
    /// Returns `Ok(None)` when the ride is missing or its status moved on
    /// (stale state).
    async fn update_ride(
        &self,
        id: i64,
        expected: RideStatus,
        changes: RideChanges,
    ) -> Result<Option<Ride>, BookingError>;

    /// Binds `driver_email` to a pending ride and marks it accepted.
    ///
    /// Checking the driver, loading the ride, loading the driver's active
    /// rides, running `guard` and writing happen in one serializable unit:
    /// concurrent calls for the same ride or the same driver cannot
    /// interleave, nor can the driver's deletion.
    ///
    /// # Errors
    ///
    /// `NotFound` if the driver is not registered or the ride does not
    /// exist, whatever `guard` returns, or `Conflict` if the ride left
    /// `pending` before the write.
    async fn bind_driver(
        &self,
        id: i64,
        driver_email: &str,
        guard: BindGuard<'_>,
    ) -> Result<Ride, BookingError>;

    /// Lists rides matching `filter`, ordered by id.
    async fn list_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, BookingError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user. `Conflict` if the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, BookingError>;

    async fn get_user(&self, email: &str) -> Result<Option<User>, BookingError>;

    /// Lists users, optionally restricted to one role, ordered by email.
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, BookingError>;

    /// Removes a user unless they take part in an active ride.
    ///
    /// Returns `false` if no such user exists; `Conflict` while the user
    /// is customer or driver on a pending or accepted ride.
    async fn delete_user(&self, email: &str) -> Result<bool, BookingError>;
}
