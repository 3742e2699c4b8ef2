use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::BookingError;
use crate::models::{NewRide, NewUser, Ride, RideChanges, RideFilter, RideStatus, Role, User};
use crate::store::{BindGuard, RideStore, UserStore};

#[derive(Debug, Default)]
struct State {
    rides: BTreeMap<i64, Ride>,
    users: BTreeMap<String, User>,
    last_ride_id: i64,
}

impl State {
    fn require_user(&self, email: &str, role: Role) -> Result<(), BookingError> {
        match self.users.get(email) {
            Some(user) if user.role == role => Ok(()),
            _ => Err(BookingError::not_found(format!("{} {} not found", role, email))),
        }
    }

    fn has_active_rides(&self, email: &str) -> bool {
        self.rides.values().any(|ride| {
            ride.status.is_active()
                && (ride.customer_email == email || ride.driver_email.as_deref() == Some(email))
        })
    }
}

/// In-process store.
///
/// All state sits behind one lock; every trait method holds it for its
/// whole body, so each call is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RideStore for MemoryStore {
    async fn create_ride(&self, ride: NewRide) -> Result<Ride, BookingError> {
        let mut state = self.state.write().await;
        state.require_user(&ride.customer_email, Role::Customer)?;
        state.last_ride_id += 1;
        let now = Utc::now();
        let ride = Ride {
            id: state.last_ride_id,
            customer_email: ride.customer_email,
            driver_email: None,
            pickup_location: ride.pickup_location,
            destination: ride.destination,
            pickup_time: ride.pickup_time,
            duration_hours: ride.duration_hours,
            distance_km: ride.distance_km,
            base_cost: ride.base_cost,
            tip_amount: ride.tip_amount,
            total_cost: ride.total_cost,
            status: RideStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn get_ride(&self, id: i64) -> Result<Option<Ride>, BookingError> {
        Ok(self.state.read().await.rides.get(&id).cloned())
    }

    async fn update_ride(
        &self,
        id: i64,
        expected: RideStatus,
        changes: RideChanges,
    ) -> Result<Option<Ride>, BookingError> {
        let mut state = self.state.write().await;
        match state.rides.get_mut(&id) {
            Some(ride) if ride.status == expected => {
                changes.apply_to(ride);
                Ok(Some(ride.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn bind_driver(
        &self,
        id: i64,
        driver_email: &str,
        guard: BindGuard<'_>,
    ) -> Result<Ride, BookingError> {
        let mut state = self.state.write().await;
        state.require_user(driver_email, Role::Driver)?;

        let ride = state
            .rides
            .get(&id)
            .cloned()
            .ok_or_else(|| BookingError::not_found(format!("ride {} not found", id)))?;

        let others: Vec<Ride> = state
            .rides
            .values()
            .filter(|other| {
                other.id != id
                    && other.status.is_active()
                    && other.driver_email.as_deref() == Some(driver_email)
            })
            .cloned()
            .collect();

        guard(&ride, &others)?;

        let stored = state
            .rides
            .get_mut(&id)
            .filter(|stored| stored.status == RideStatus::Pending)
            .ok_or_else(|| BookingError::conflict(format!("ride {} is no longer available", id)))?;

        stored.driver_email = Some(driver_email.to_string());
        stored.status = RideStatus::Accepted;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn list_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, BookingError> {
        Ok(self
            .state
            .read()
            .await
            .rides
            .values()
            .filter(|ride| filter.matches(ride))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, BookingError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.email) {
            return Err(BookingError::conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        let user = User {
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            full_name: user.profile.full_name,
            address: user.profile.address,
            phone_number: user.profile.phone_number,
            created_at: Utc::now(),
        };
        state.users.insert(user.email.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>, BookingError> {
        Ok(self.state.read().await.users.get(email).cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, BookingError> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|user| role.map_or(true, |role| user.role == role))
            .cloned()
            .collect())
    }

    async fn delete_user(&self, email: &str) -> Result<bool, BookingError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(email) {
            return Ok(false);
        }
        if state.has_active_rides(email) {
            return Err(BookingError::conflict(format!(
                "user {} has pending or accepted rides",
                email
            )));
        }
        state.users.remove(email);
        info!("Deleted user {} from memory store", email);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    async fn seed(store: &MemoryStore, email: &str, role: Role) {
        store
            .create_user(NewUser {
                email: email.to_string(),
                username: email.to_string(),
                password_hash: "x".to_string(),
                role,
                profile: Default::default(),
            })
            .await
            .unwrap();
    }

    fn new_ride(customer: &str) -> NewRide {
        NewRide {
            customer_email: customer.to_string(),
            pickup_location: "Kathmandu".to_string(),
            destination: "Patan".to_string(),
            pickup_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            duration_hours: 2.0,
            distance_km: 10.0,
            base_cost: Decimal::from(525),
            tip_amount: Decimal::from(50),
            total_cost: Decimal::from(975),
        }
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let store = MemoryStore::new();
        seed(&store, "a@test.com", Role::Customer).await;
        let first = store.create_ride(new_ride("a@test.com")).await.unwrap();
        let second = store.create_ride(new_ride("a@test.com")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, RideStatus::Pending);
        assert!(first.driver_email.is_none());
    }

    #[tokio::test]
    async fn test_update_with_stale_status_writes_nothing() {
        let store = MemoryStore::new();
        seed(&store, "a@test.com", Role::Customer).await;
        let ride = store.create_ride(new_ride("a@test.com")).await.unwrap();

        let stale = store
            .update_ride(ride.id, RideStatus::Accepted, RideChanges::status(RideStatus::Completed))
            .await
            .unwrap();
        assert!(stale.is_none());

        let current = store.get_ride(ride.id).await.unwrap().unwrap();
        assert_eq!(current.status, RideStatus::Pending);
    }

    #[tokio::test]
    async fn test_concurrent_binds_admit_one_driver() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "a@test.com", Role::Customer).await;
        for n in 0..8 {
            seed(&store, &format!("driver{}@test.com", n), Role::Driver).await;
        }
        let ride_id = store.create_ride(new_ride("a@test.com")).await.unwrap().id;

        let allow_pending = |ride: &Ride, _: &[Ride]| {
            if ride.status == RideStatus::Pending {
                Ok(())
            } else {
                Err(BookingError::conflict("no longer available"))
            }
        };

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let driver = format!("driver{}@test.com", n);
                store.bind_driver(ride_id, &driver, &allow_pending).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_delete_user_blocked_by_active_ride() {
        let store = MemoryStore::new();
        seed(&store, "a@test.com", Role::Customer).await;
        let ride = store.create_ride(new_ride("a@test.com")).await.unwrap();

        assert!(matches!(
            store.delete_user("a@test.com").await,
            Err(BookingError::Conflict(_))
        ));

        store
            .update_ride(ride.id, RideStatus::Pending, RideChanges::status(RideStatus::Cancelled))
            .await
            .unwrap();
        assert!(store.delete_user("a@test.com").await.unwrap());
        assert!(!store.delete_user("a@test.com").await.unwrap());
        // Ride keeps the historical reference.
        let ride = store.get_ride(ride.id).await.unwrap().unwrap();
        assert_eq!(ride.customer_email, "a@test.com");
    }

    #[tokio::test]
    async fn test_rides_require_registered_participants() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.create_ride(new_ride("ghost@test.com")).await,
            Err(BookingError::NotFound(_))
        ));

        seed(&store, "a@test.com", Role::Customer).await;
        let ride = store.create_ride(new_ride("a@test.com")).await.unwrap();

        let allow_all = |_: &Ride, _: &[Ride]| -> Result<(), BookingError> { Ok(()) };
        assert!(matches!(
            store.bind_driver(ride.id, "a@test.com", &allow_all).await,
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(
            store.bind_driver(ride.id, "ghost@test.com", &allow_all).await,
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_customer_cannot_book() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, "a@test.com", Role::Customer).await;

        // Deletion and booking race; either order leaves no ride owned by a missing user.
        let deleter = {
            let store = store.clone();
            tokio::spawn(async move { store.delete_user("a@test.com").await })
        };
        let booker = {
            let store = store.clone();
            tokio::spawn(async move { store.create_ride(new_ride("a@test.com")).await })
        };
        let deleted = deleter.await.unwrap();
        let booked = booker.await.unwrap();

        let user_exists = store.get_user("a@test.com").await.unwrap().is_some();
        match booked {
            Ok(_) => {
                assert!(user_exists);
                assert!(matches!(deleted, Err(BookingError::Conflict(_))));
            }
            Err(e) => {
                assert!(matches!(e, BookingError::NotFound(_)));
                assert!(!user_exists);
            }
        }
    }
}
