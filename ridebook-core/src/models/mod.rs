pub mod ride;
pub mod user;

pub use ride::{NewRide, Ride, RideChanges, RideFilter, RidePatch, RideRequest, RideStatus};
pub use user::{NewUser, Profile, Role, Signup, User};
