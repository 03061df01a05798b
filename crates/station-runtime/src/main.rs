//! GoNature station command line.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use gn_04_capacity::{BookingRequest, BookingState, UserRole};
use gn_05_reference_server::ReferenceServer;
use station_runtime::demo::demo_engine;
use station_runtime::{init_logging, LogConfig, Station, StationConfig};

/// GoNature park station
#[derive(Parser, Debug)]
#[command(name = "station-runtime")]
#[command(about = "Run park station commands against the reservation server")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Round-trip a PING to the server
    Ping,
    /// Check whether a group fits in a park's overlap window
    Availability {
        park: String,
        /// Visit time, RFC 3339 (e.g. 2026-07-01T12:00:00Z)
        time: DateTime<Utc>,
        visitors: i64,
    },
    /// Show a park's live occupancy
    Occupancy { park: String },
    /// Book a visit, falling back to the waiting list
    Book {
        park: String,
        booking_id: String,
        time: DateTime<Utc>,
        visitors: i64,
    },
    /// Record a group entering the park
    Entry { park: String, booking_id: String },
    /// Record a group leaving the park
    Exit { park: String, booking_id: String },
    /// Cancel a booking or waiting-list entry
    Cancel { park: String, booking_id: String },
    /// Clear a user's logged-in flag
    Logout { role: Role, user_id: String },
    /// Run the in-memory reference server with a demo park
    Serve {
        #[arg(long, default_value = "127.0.0.1:5555")]
        listen: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Role {
    Visitor,
    GroupGuide,
    Employee,
    ParkManager,
    DepartmentManager,
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Visitor => UserRole::Visitor,
            Role::GroupGuide => UserRole::GroupGuide,
            Role::Employee => UserRole::Employee,
            Role::ParkManager => UserRole::ParkManager,
            Role::DepartmentManager => UserRole::DepartmentManager,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_env())?;

    match cli.command {
        Command::Serve { listen } => serve(&listen).await,
        command => {
            let config = StationConfig::load(cli.config.as_deref())
                .context("Failed to load station configuration")?;
            let station = Station::connect(&config)
                .await
                .with_context(|| format!("Failed to connect to {}", config.server.address()))?;

            let result = run(&station, command).await;
            station.shutdown().await;
            result
        }
    }
}

async fn run(station: &Station, command: Command) -> Result<()> {
    let capacity = station.capacity();
    match command {
        Command::Ping => {
            let rtt = station.transport().ping().await?;
            println!("pong in {} ms", rtt.as_millis());
        }
        Command::Availability {
            park,
            time,
            visitors,
        } => {
            let park = capacity.park_settings(&park).await?;
            let availability = capacity.check_availability(&park, time, visitors).await?;
            println!("{}", serde_json::to_string_pretty(&availability)?);
        }
        Command::Occupancy { park } => {
            let park = capacity.park_settings(&park).await?;
            let occupancy = capacity.current_occupancy(&park).await?;
            println!("{}: {}/{}", park.name, occupancy, park.maximum_visitors);
        }
        Command::Book {
            park,
            booking_id,
            time,
            visitors,
        } => {
            let park = capacity.park_settings(&park).await?;
            let attempt = capacity
                .request_booking(&park, BookingRequest::new(booking_id, time, visitors))
                .await?;
            match attempt.state() {
                BookingState::Confirmed => println!("confirmed"),
                BookingState::Waitlisted { priority } => println!("waitlisted at #{priority}"),
                BookingState::Rejected { reason } => bail!("booking rejected: {reason}"),
                other => return Err(anyhow!("booking stopped in state {}", other.name())),
            }
        }
        Command::Entry { park, booking_id } => {
            let park = capacity.park_settings(&park).await?;
            let outcome = capacity.record_entry(&park, &booking_id).await?;
            println!("{outcome:?}");
        }
        Command::Exit { park, booking_id } => {
            let park = capacity.park_settings(&park).await?;
            let outcome = capacity.record_exit(&park, &booking_id).await?;
            println!("{outcome:?}");
        }
        Command::Cancel { park, booking_id } => {
            let park = capacity.park_settings(&park).await?;
            let outcome = capacity.cancel_booking(&park, &booking_id).await?;
            println!("{outcome:?}");
        }
        Command::Logout { role, user_id } => {
            let found = station.sessions().logout(role.into(), &user_id).await?;
            if !found {
                bail!("no such user: {user_id}");
            }
            println!("logged out");
        }
        Command::Serve { .. } => bail!("serve runs without a station connection"),
    }
    Ok(())
}

async fn serve(listen: &str) -> Result<()> {
    let server = ReferenceServer::bind(listen, demo_engine()?)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?
        .spawn()?;
    info!(addr = %server.local_addr(), "Reference server listening. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    server.shutdown().await;
    Ok(())
}
