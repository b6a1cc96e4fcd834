//! # Application Layer Protocols
//!
//! Protocol transports built on host-supplied client primitives. Each
//! transport owns its collaborator and is driven from the poll loop; none of
//! them allocate or block.

/// MQTT transport.
///
/// Reconnection, presence and subscription dispatch on top of a
/// [`Broker`](mqtt::Broker) client.
pub mod mqtt;
