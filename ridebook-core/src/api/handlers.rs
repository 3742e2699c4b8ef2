use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use tracing::info;

use crate::analytics::Summary;
use crate::api::types::{
    AssignBody, CreateRideBody, LoginRequest, LoginResponse, RideListQuery, UserListQuery,
};
use crate::api::{ApiError, AppState};
use crate::auth::CurrentUser;
use crate::distance::resolve_distance;
use crate::error::BookingError;
use crate::models::{Ride, RideFilter, RidePatch, RideRequest, Role, Signup, User};

type ApiResult<T> = Result<T, ApiError>;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ridebook-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Registers a customer or driver.
///
/// Admin accounts are created only with `ridectl signup`.
pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Signup>,
) -> ApiResult<(StatusCode, Json<User>)> {
    if body.role == Role::Admin {
        return Err(ApiError::forbidden(
            "admin accounts cannot be created through public signup",
        ));
    }
    let user = state.directory().signup(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchanges credentials for a bearer token.
///
/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = state
        .directory()
        .authenticate(&body.email, &body.password)
        .await?
        .ok_or_else(|| ApiError::unauthorized("invalid email or password"))?;

    let token = state.tokens.issue(&user)?;
    info!("{} {} logged in", user.role, user.email);
    Ok(Json(LoginResponse { token, user }))
}

pub async fn create_ride(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(body): Json<CreateRideBody>,
) -> ApiResult<(StatusCode, Json<Ride>)> {
    me.require_role(&[Role::Customer])?;

    let distance_km = resolve_distance(
        state.distance.as_ref(),
        &body.pickup_location,
        &body.destination,
        body.distance_km,
    )?;

    let ride = state
        .engine
        .create(RideRequest {
            customer_email: me.email,
            pickup_location: body.pickup_location,
            destination: body.destination,
            pickup_time: body.pickup_time,
            duration_hours: body.duration_hours,
            distance_km,
            tip_amount: body.tip_amount,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

/// Rides visible to the caller.
///
/// Customers see their own bookings, drivers the rides bound to them,
/// admins everything matching the query.
pub async fn list_rides(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(query): Query<RideListQuery>,
) -> ApiResult<Json<Vec<Ride>>> {
    let filter = match me.role {
        Role::Customer => RideFilter {
            customer_email: Some(me.email),
            driver_email: None,
            status: query.status,
        },
        Role::Driver => RideFilter {
            customer_email: None,
            driver_email: Some(me.email),
            status: query.status,
        },
        Role::Admin => RideFilter {
            customer_email: query.customer_email,
            driver_email: query.driver_email,
            status: query.status,
        },
    };
    Ok(Json(state.engine.list_rides(&filter).await?))
}

pub async fn pending_rides(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Ride>>> {
    me.require_role(&[Role::Driver, Role::Admin])?;
    Ok(Json(state.engine.pending_rides().await?))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    let ride = state
        .engine
        .get_ride(id)
        .await?
        .ok_or_else(|| BookingError::not_found(format!("ride {} not found", id)))?;
    Ok(Json(ride))
}

pub async fn update_ride(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(patch): Json<RidePatch>,
) -> ApiResult<Json<Ride>> {
    me.require_role(&[Role::Customer])?;
    Ok(Json(state.engine.update(id, &me.email, patch).await?))
}

pub async fn accept_ride(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    me.require_role(&[Role::Driver])?;
    Ok(Json(state.engine.accept(id, &me.email).await?))
}

pub async fn assign_ride(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<AssignBody>,
) -> ApiResult<Json<Ride>> {
    me.require_role(&[Role::Admin])?;
    Ok(Json(state.engine.assign(id, &body.driver_email).await?))
}

/// Only the bound driver or an admin may complete a ride.
pub async fn complete_ride(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    me.require_role(&[Role::Driver, Role::Admin])?;

    if me.role == Role::Driver {
        let ride = state
            .engine
            .get_ride(id)
            .await?
            .ok_or_else(|| BookingError::not_found(format!("ride {} not found", id)))?;
        if ride.driver_email.as_deref() != Some(me.email.as_str()) {
            return Err(ApiError::forbidden(format!(
                "ride {} is not assigned to {}",
                id, me.email
            )));
        }
    }

    Ok(Json(state.engine.complete(id).await?))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Ride>> {
    me.require_role(&[Role::Customer])?;
    Ok(Json(state.engine.cancel(id, &me.email).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<Vec<User>>> {
    me.require_role(&[Role::Admin])?;
    Ok(Json(state.directory().list_users(query.role).await?))
}

pub async fn list_drivers(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<User>>> {
    me.require_role(&[Role::Admin])?;
    Ok(Json(state.directory().get_drivers().await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Path(email): Path<String>,
) -> ApiResult<StatusCode> {
    me.require_role(&[Role::Admin])?;
    state.directory().delete_user(&email).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> ApiResult<Json<Summary>> {
    me.require_role(&[Role::Admin])?;
    Ok(Json(state.analytics.summary().await?))
}
