//! HTTP presentation layer.
//!
//! Translates requests into booking engine calls and enforces which role
//! may call what. The engine itself knows nothing about tokens.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{middleware, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analytics::Analytics;
use crate::auth::{jwt_middleware, TokenKeys};
use crate::booking::BookingEngine;
use crate::directory::Directory;
use crate::distance::DistanceProvider;
use crate::error::BookingError;
use crate::store::{RideStore, UserStore};

pub mod handlers;
pub mod types;


/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: BookingEngine,
    pub analytics: Analytics,
    pub tokens: Arc<TokenKeys>,
    pub distance: Arc<dyn DistanceProvider>,
}

impl AppState {
    /// Wires the services over one store that holds both rides and users.
    pub fn from_store<S>(
        store: Arc<S>,
        tokens: TokenKeys,
        distance: Arc<dyn DistanceProvider>,
    ) -> Self
    where
        S: RideStore + UserStore + 'static,
    {
        let directory = Directory::new(store.clone());
        Self {
            engine: BookingEngine::new(store.clone(), directory),
            analytics: Analytics::new(store),
            tokens: Arc::new(tokens),
            distance,
        }
    }

    pub fn directory(&self) -> &Directory {
        self.engine.directory()
    }
}

/// Error body returned by every endpoint: `{"kind": ..., "error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthorized",
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            kind: "forbidden",
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        Self {
            status: err.status_code(),
            kind: err.kind(),
            message: err.reason().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "kind": self.kind, "error": self.message })),
        )
            .into_response()
    }
}

/// Creates the application router.
///
/// # Arguments
///
/// * `state` - Shared services
///
/// # Returns
///
/// Returns a router with public `/health` and `/auth/*` routes; every
/// other route requires a bearer token.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/rides", post(handlers::create_ride).get(handlers::list_rides))
        .route("/rides/pending", get(handlers::pending_rides))
        .route("/rides/:id", get(handlers::get_ride).patch(handlers::update_ride))
        .route("/rides/:id/accept", post(handlers::accept_ride))
        .route("/rides/:id/assign", post(handlers::assign_ride))
        .route("/rides/:id/complete", post(handlers::complete_ride))
        .route("/rides/:id/cancel", post(handlers::cancel_ride))
        .route("/users", get(handlers::list_users))
        .route("/users/:email", axum::routing::delete(handlers::delete_user))
        .route("/drivers", get(handlers::list_drivers))
        .route("/stats", get(handlers::stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
