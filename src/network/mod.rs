//! Network collaborators and shared connection types.
//!
//! The bridge never opens sockets or joins a Wi-Fi network itself. The host
//! supplies a [`Link`] that reports whether the underlying network is usable,
//! and passes a monotonic [`Instant`] into every poll so that retries can be
//! scheduled without sleeping.

#![deny(unsafe_code)]

use core::net::IpAddr;
use core::time::Duration;

/// Common error types for network operations
pub mod error;

/// Application layer protocol transports
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::application::mqtt::{Broker, MessageHandler};
    pub use super::Link;
}

/// The network link (Wi-Fi, Ethernet, ...) the broker is reached through.
pub trait Link {
    /// Whether the link is established and can carry traffic.
    fn is_up(&mut self) -> bool;

    /// The address this device holds on the link, if known.
    fn local_ip(&self) -> Option<IpAddr> {
        None
    }

    /// Resolves a host name, used only for connection diagnostics.
    fn resolve(&mut self, _host: &str) -> Option<IpAddr> {
        None
    }
}

/// Connection state of a transport.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectionState {
    /// Not connected; a retry may be scheduled.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// Connected and serviced on every tick.
    Connected,
}

impl ConnectionState {
    /// Shorthand for `== Connected`.
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConnectionState::Disconnected => defmt::write!(f, "Disconnected"),
            ConnectionState::Connecting => defmt::write!(f, "Connecting"),
            ConnectionState::Connected => defmt::write!(f, "Connected"),
        }
    }
}

/// A point on the host's monotonic clock, in milliseconds since an arbitrary epoch.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Default)]
pub struct Instant(u64);

impl Instant {
    /// Builds an instant from a millisecond counter.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// The millisecond counter.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// This instant shifted forward, saturating at the end of time.
    pub fn saturating_add(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    pub fn saturating_duration_since(self, earlier: Instant) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl core::ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        self.saturating_add(rhs)
    }
}

/// How long to wait before the next broker connection attempt.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RetryPolicy {
    /// The same delay after every failure, with no retry limit.
    Fixed(Duration),
    /// Doubling delays starting at `initial`, never longer than `ceiling`.
    Exponential {
        /// Delay after the first failure.
        initial: Duration,
        /// Upper bound for any delay.
        ceiling: Duration,
    },
}

impl RetryPolicy {
    /// Delay after `failures` consecutive failed attempts (1-based).
    pub fn delay(&self, failures: u32) -> Duration {
        match *self {
            RetryPolicy::Fixed(delay) => delay,
            RetryPolicy::Exponential { initial, ceiling } => {
                let shift = failures.saturating_sub(1).min(31);
                initial
                    .checked_mul(1u32 << shift)
                    .map_or(ceiling, |delay| delay.min(ceiling))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed(Duration::from_secs(5))
    }
}

/// Increments a diagnostic counter, wrapping instead of overflowing.
pub(crate) fn bump(counter: &mut u32) {
    *counter = counter.wrapping_add(1);
}
