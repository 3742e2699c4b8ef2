use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

use crate::error::BookingError;
use crate::models::{NewRide, NewUser, Ride, RideChanges, RideFilter, RideStatus, Role, User};
use crate::store::{BindGuard, RideStore, UserStore};

const RIDE_COLUMNS: &str = r#"
    id, customer_email, driver_email, pickup_location, destination,
    pickup_time, duration_hours, distance_km, base_cost, tip_amount,
    total_cost, status, created_at, updated_at
"#;

const USER_COLUMNS: &str = r#"
    email, username, password_hash, role, full_name, address,
    phone_number, created_at
"#;

/// PostgreSQL-backed store.
///
/// Ride creation, driver binding and user deletion take a
/// transaction-scoped advisory lock on the email involved, so all three
/// serialize per person.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Locks `email` for the rest of the transaction and checks it belongs to
/// a user with `role`.
async fn lock_user(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    role: Role,
) -> Result<(), BookingError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(email)
        .execute(&mut **tx)
        .await?;

    let registered: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND role = $2)")
            .bind(email)
            .bind(role)
            .fetch_one(&mut **tx)
            .await?;

    if registered {
        Ok(())
    } else {
        Err(BookingError::not_found(format!("{} {} not found", role, email)))
    }
}

#[async_trait]
impl RideStore for PgStore {
    async fn create_ride(&self, ride: NewRide) -> Result<Ride, BookingError> {
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, &ride.customer_email, Role::Customer).await?;

        let query = format!(
            r#"
            INSERT INTO rides (
                customer_email, pickup_location, destination, pickup_time,
                duration_hours, distance_km, base_cost, tip_amount, total_cost, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            RIDE_COLUMNS
        );

        let created = sqlx::query_as::<_, Ride>(&query)
            .bind(&ride.customer_email)
            .bind(&ride.pickup_location)
            .bind(&ride.destination)
            .bind(ride.pickup_time)
            .bind(ride.duration_hours)
            .bind(ride.distance_km)
            .bind(ride.base_cost)
            .bind(ride.tip_amount)
            .bind(ride.total_cost)
            .bind(RideStatus::Pending)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_ride(&self, id: i64) -> Result<Option<Ride>, BookingError> {
        let query = format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLUMNS);
        let ride = sqlx::query_as::<_, Ride>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ride)
    }

    async fn update_ride(
        &self,
        id: i64,
        expected: RideStatus,
        changes: RideChanges,
    ) -> Result<Option<Ride>, BookingError> {
        let query = format!(
            r#"
            UPDATE rides
            SET
                pickup_location = COALESCE($3, pickup_location),
                destination = COALESCE($4, destination),
                pickup_time = COALESCE($5, pickup_time),
                duration_hours = COALESCE($6, duration_hours),
                distance_km = COALESCE($7, distance_km),
                base_cost = COALESCE($8, base_cost),
                total_cost = COALESCE($9, total_cost),
                status = COALESCE($10, status),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            RIDE_COLUMNS
        );

        let updated = sqlx::query_as::<_, Ride>(&query)
            .bind(id)
            .bind(expected)
            .bind(changes.pickup_location)
            .bind(changes.destination)
            .bind(changes.pickup_time)
            .bind(changes.duration_hours)
            .bind(changes.distance_km)
            .bind(changes.base_cost)
            .bind(changes.total_cost)
            .bind(changes.status)
            .fetch_optional(&self.pool)
            .await?;

        if updated.is_none() {
            warn!("Conditional update of ride {} matched no row (expected {})", id, expected);
        }
        Ok(updated)
    }

    async fn bind_driver(
        &self,
        id: i64,
        driver_email: &str,
        guard: BindGuard<'_>,
    ) -> Result<Ride, BookingError> {
        // Rolled back on drop if any step below returns early.
        let mut tx = self.pool.begin().await?;
        lock_user(&mut tx, driver_email, Role::Driver).await?;

        let query = format!("SELECT {} FROM rides WHERE id = $1 FOR UPDATE", RIDE_COLUMNS);
        let ride = sqlx::query_as::<_, Ride>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| BookingError::not_found(format!("ride {} not found", id)))?;

        let query = format!(
            r#"
            SELECT {}
            FROM rides
            WHERE driver_email = $1
                AND status IN ('pending', 'accepted')
                AND id <> $2
            ORDER BY pickup_time ASC
            "#,
            RIDE_COLUMNS
        );
        let others = sqlx::query_as::<_, Ride>(&query)
            .bind(driver_email)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

        guard(&ride, &others)?;

        let query = format!(
            r#"
            UPDATE rides
            SET driver_email = $2, status = 'accepted', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            RIDE_COLUMNS
        );
        let updated = sqlx::query_as::<_, Ride>(&query)
            .bind(id)
            .bind(driver_email)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| BookingError::conflict(format!("ride {} is no longer available", id)))?;

        tx.commit().await?;

        info!("Bound driver {} to ride {}", driver_email, id);
        Ok(updated)
    }

    async fn list_rides(&self, filter: &RideFilter) -> Result<Vec<Ride>, BookingError> {
        let query = format!(
            r#"
            SELECT {}
            FROM rides
            WHERE ($1::text IS NULL OR customer_email = $1)
                AND ($2::text IS NULL OR driver_email = $2)
                AND ($3::varchar IS NULL OR status = $3)
            ORDER BY id ASC
            "#,
            RIDE_COLUMNS
        );

        let rides = sqlx::query_as::<_, Ride>(&query)
            .bind(filter.customer_email.as_deref())
            .bind(filter.driver_email.as_deref())
            .bind(filter.status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rides)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, BookingError> {
        let query = format!(
            r#"
            INSERT INTO users (
                email, username, password_hash, role, full_name, address, phone_number
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role)
            .bind(&user.profile.full_name)
            .bind(&user.profile.address)
            .bind(&user.profile.phone_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                BookingError::conflict(format!("email {} is already registered", user.email))
            })
    }

    async fn get_user(&self, email: &str) -> Result<Option<User>, BookingError> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, BookingError> {
        let query = format!(
            r#"
            SELECT {}
            FROM users
            WHERE ($1::varchar IS NULL OR role = $1)
            ORDER BY email ASC
            "#,
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&query)
            .bind(role)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn delete_user(&self, email: &str) -> Result<bool, BookingError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        let active: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM rides
                WHERE (customer_email = $1 OR driver_email = $1)
                    AND status IN ('pending', 'accepted')
            )
            "#,
        )
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;

        if active {
            return Err(BookingError::conflict(format!(
                "user {} has pending or accepted rides",
                email
            )));
        }

        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
