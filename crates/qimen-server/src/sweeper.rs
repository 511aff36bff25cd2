//! Background sweep for expired reservations
//!
//! A reservation left open past its ttl means the process died between
//! reserve and commit. The sweeper releases such rows on an interval so
//! stranded charges always find their way back to the user.
//!
//! Environment variables:
//!
//! - `QIMEN_RESERVATION_TTL_MINS`: Age after which an open reservation is
//!   considered stranded (default: 15)
//! - `QIMEN_SWEEP_INTERVAL_MINS`: Minutes between sweeps (default: 5)

use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use qimen_core::PointsLedger;

const DEFAULT_TTL_MINS: u64 = 15;
const DEFAULT_INTERVAL_MINS: u64 = 5;

/// Configuration for the reservation sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Minutes an open reservation may live before being released
    pub ttl_mins: u64,
    /// Minutes between sweeps
    pub interval_mins: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            ttl_mins: DEFAULT_TTL_MINS,
            interval_mins: DEFAULT_INTERVAL_MINS,
        }
    }
}

/// Minutes from a setting's raw value; zero and garbage are rejected
fn parse_mins(value: &str) -> Option<u64> {
    value.parse().ok().filter(|&m| m > 0)
}

impl SweeperConfig {
    /// Parse configuration from environment variables, with defaults for
    /// anything unset or unparseable
    pub fn from_env() -> Self {
        let ttl_mins = std::env::var("QIMEN_RESERVATION_TTL_MINS")
            .ok()
            .and_then(|s| parse_mins(&s))
            .unwrap_or(DEFAULT_TTL_MINS);

        let interval_mins = std::env::var("QIMEN_SWEEP_INTERVAL_MINS")
            .ok()
            .and_then(|s| parse_mins(&s))
            .unwrap_or(DEFAULT_INTERVAL_MINS);

        Self {
            ttl_mins,
            interval_mins,
        }
    }

    /// The ttl as a chrono duration, for [`PointsLedger::release_expired`]
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_mins as i64)
    }
}

/// Start the reservation sweeper as a background task
pub fn start_reservation_sweeper(ledger: PointsLedger, config: SweeperConfig) {
    info!(
        "Starting reservation sweeper: every {} min, ttl {} min",
        config.interval_mins, config.ttl_mins
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_mins * 60));

        // The startup sweep already ran; skip the immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match ledger.release_expired(config.ttl()) {
                Ok(0) => {}
                Ok(released) => {
                    info!("Sweep released {} stranded reservation(s)", released);
                }
                Err(e) => {
                    error!("Reservation sweep failed: {}", e);
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SweeperConfig::default();
        assert_eq!(config.ttl_mins, DEFAULT_TTL_MINS);
        assert_eq!(config.interval_mins, DEFAULT_INTERVAL_MINS);
        assert_eq!(config.ttl(), chrono::Duration::minutes(15));
    }

    #[test]
    fn positive_minutes_parse() {
        assert_eq!(parse_mins("7"), Some(7));
        assert_eq!(parse_mins("1440"), Some(1440));
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert_eq!(parse_mins("0"), None);
        assert_eq!(parse_mins("-5"), None);
        assert_eq!(parse_mins("soon"), None);
    }
}
