//! # knxbridge - KNX to MQTT bridge
//!
//! A `no_std` library that joins a KNX field bus to an MQTT broker. Bus
//! telegrams become JSON documents on MQTT topics, and JSON commands on MQTT
//! topics become bus telegrams. Both connections are kept alive by the
//! library itself: a broker outage is retried in the background of the poll
//! loop while the bus keeps being serviced.
//!
//! ## Features
//!
//! ### Address Codec
//! - 3-level group addresses (`main/middle/sub`) packed into 16 bits
//! - Individual (physical) addresses (`area.line.device`)
//!
//! ### Transports
//! - **KNX**: one-shot interface start, payload checks, telegram handlers
//! - **MQTT**: non-blocking reconnection, retained presence with last will,
//!   wildcard subscriptions that survive reconnects
//!
//! ### Bridge
//! - Data-driven rule table in both directions
//! - Single cooperative poll step with heartbeat diagnostics
//! - JSON configuration with sensible defaults
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! knxbridge = "0.1.0"
//! ```
//!
//! The host implements three small traits: [`network::Link`] for the
//! network link, [`network::application::mqtt::Broker`] for the MQTT client
//! and [`knx::BusDriver`] for the bus interface. See [`bridge`] for a
//! complete example.
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Log through defmt on embedded targets
//! - `tracing`: Log through tracing on hosts

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[cfg(all(test, not(feature = "std")))]
extern crate std;

#[macro_use]
mod logging;

/// KNX addressing and the bus transport.
///
/// Holds the group and individual address codec as well as the transport
/// that drives a host-supplied bus interface.
pub mod knx;

/// Network abstraction layer providing the MQTT transport and connection management.
pub mod network;

/// The bridge joining both transports through a rule table.
pub mod bridge;
