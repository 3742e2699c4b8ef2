//! Operator command-line client.
//!
//! Every subcommand prints its result as JSON on stdout. Failures print
//! `{"kind": ..., "error": ...}` on stderr and exit with a status per
//! error kind: 2 validation, 3 not found, 4 conflict, 5 store unavailable.
//!
//! ```bash
//! ridectl create --customer c@example.com --pickup "27.71,85.32" \
//!     --destination "27.67,85.43" --time "2030-01-01 10:00" --duration 2
//! ridectl accept 1 --driver d@example.com
//! ridectl stats
//! ```

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ridebook_core::analytics::Analytics;
use ridebook_core::booking::BookingEngine;
use ridebook_core::config::{init_tracing, DatabaseConfig};
use ridebook_core::db;
use ridebook_core::directory::Directory;
use ridebook_core::distance::{resolve_distance, GeodesicDistance};
use ridebook_core::error::BookingError;
use ridebook_core::models::{
    Profile, RideFilter, RidePatch, RideRequest, RideStatus, Role, Signup,
};
use ridebook_core::store::PgStore;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ridectl")]
#[command(author, version, about = "Ride booking command-line client", long_about = None)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// Distance used when a location has no coordinates
    #[arg(long, env = "DEFAULT_DISTANCE_KM", default_value_t = 10.0)]
    default_distance_km: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate,

    /// Register a user
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone_number: Option<String>,
    },

    /// Book a ride for a customer
    Create {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        pickup: String,
        #[arg(long)]
        destination: String,
        /// Pickup time, YYYY-MM-DD HH:MM
        #[arg(long)]
        time: String,
        /// Hours the driver is occupied
        #[arg(long)]
        duration: f64,
        /// Kilometers; measured from the locations when omitted
        #[arg(long)]
        distance: Option<f64>,
        #[arg(long, default_value_t = Decimal::ZERO)]
        tip: Decimal,
    },

    /// A driver takes a pending ride
    Accept {
        id: i64,
        #[arg(long)]
        driver: String,
    },

    /// Bind a driver to a pending ride on an admin's behalf
    Assign {
        id: i64,
        #[arg(long)]
        driver: String,
    },

    /// Mark an accepted ride as completed
    Complete { id: i64 },

    /// Cancel a ride as its customer
    Cancel {
        id: i64,
        #[arg(long)]
        customer: String,
    },

    /// Edit a pending ride as its customer
    Update {
        id: i64,
        #[arg(long)]
        customer: String,
        #[arg(long)]
        pickup: Option<String>,
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long)]
        distance: Option<f64>,
    },

    /// Show one ride
    Get { id: i64 },

    /// List rides
    Rides {
        #[arg(long)]
        customer: Option<String>,
        #[arg(long)]
        driver: Option<String>,
        #[arg(long)]
        status: Option<RideStatus>,
    },

    /// List users, optionally of one role
    List {
        #[arg(long)]
        role: Option<Role>,
    },

    /// Revenue and usage summary
    Stats,

    /// Remove a user with no active rides
    DeleteUser { email: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    init_tracing(true);

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", json!({ "kind": err.kind(), "error": err.reason() }));
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<Value, BookingError> {
    let pool = db::create_pool(&DatabaseConfig {
        url: cli.database_url,
        max_connections: 2,
        acquire_timeout_seconds: 5,
    })
    .await?;

    if let Command::Migrate = cli.command {
        db::migrate(&pool).await?;
        return Ok(json!({ "status": "migrated" }));
    }

    let store = Arc::new(PgStore::new(pool));
    let directory = Directory::new(store.clone());
    let engine = BookingEngine::new(store.clone(), directory.clone());

    match cli.command {
        Command::Migrate => Ok(json!({ "status": "migrated" })),
        Command::Signup {
            email,
            username,
            password,
            role,
            full_name,
            address,
            phone_number,
        } => render(
            &directory
                .signup(Signup {
                    email,
                    username,
                    password,
                    role,
                    profile: Profile {
                        full_name,
                        address,
                        phone_number,
                    },
                })
                .await?,
        ),
        Command::Create {
            customer,
            pickup,
            destination,
            time,
            duration,
            distance,
            tip,
        } => {
            let provider = GeodesicDistance::new(cli.default_distance_km);
            let distance_km = resolve_distance(&provider, &pickup, &destination, distance)?;
            render(
                &engine
                    .create(RideRequest {
                        customer_email: customer,
                        pickup_location: pickup,
                        destination,
                        pickup_time: time,
                        duration_hours: duration,
                        distance_km,
                        tip_amount: tip,
                    })
                    .await?,
            )
        }
        Command::Accept { id, driver } => render(&engine.accept(id, &driver).await?),
        Command::Assign { id, driver } => render(&engine.assign(id, &driver).await?),
        Command::Complete { id } => render(&engine.complete(id).await?),
        Command::Cancel { id, customer } => render(&engine.cancel(id, &customer).await?),
        Command::Update {
            id,
            customer,
            pickup,
            destination,
            time,
            duration,
            distance,
        } => {
            let patch = RidePatch {
                pickup_location: pickup,
                destination,
                pickup_time: time,
                duration_hours: duration,
                distance_km: distance,
            };
            if patch.is_empty() {
                return Err(BookingError::validation("nothing to update"));
            }
            render(&engine.update(id, &customer, patch).await?)
        }
        Command::Get { id } => {
            let ride = engine
                .get_ride(id)
                .await?
                .ok_or_else(|| BookingError::not_found(format!("ride {} not found", id)))?;
            render(&ride)
        }
        Command::Rides {
            customer,
            driver,
            status,
        } => render(
            &engine
                .list_rides(&RideFilter {
                    customer_email: customer,
                    driver_email: driver,
                    status,
                })
                .await?,
        ),
        Command::List { role } => render(&directory.list_users(role).await?),
        Command::Stats => render(&Analytics::new(store).summary().await?),
        Command::DeleteUser { email } => {
            directory.delete_user(&email).await?;
            Ok(json!({ "deleted": email }))
        }
    }
}

fn render<T: Serialize>(value: &T) -> Result<Value, BookingError> {
    serde_json::to_value(value)
        .map_err(|e| BookingError::validation(format!("cannot render output: {}", e)))
}
