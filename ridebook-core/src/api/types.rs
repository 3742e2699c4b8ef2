use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{RideStatus, Role, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Booking form submitted by an authenticated customer.
///
/// Without `distance_km` the distance is measured from the descriptors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRideBody {
    pub pickup_location: String,
    pub destination: String,
    pub pickup_time: String,
    pub duration_hours: f64,
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub tip_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignBody {
    pub driver_email: String,
}

/// Query string of `GET /rides`. Email filters only apply to admins.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RideListQuery {
    pub status: Option<RideStatus>,
    pub customer_email: Option<String>,
    pub driver_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
}
