//! MQTT transport for the bridge.
//!
//! The wire protocol itself is owned by whatever MQTT client the host links
//! in; this module only sees it through the [`Broker`] trait. On top of that
//! primitive it adds what a field device needs to run unattended:
//!
//! - a non-blocking reconnection state machine driven from the poll loop
//! - a retained presence document plus a last-will that flips it to offline
//! - a local dispatch table that routes inbound JSON documents to handlers
//!
//! # Usage
//!
//! ```rust,no_run
//! use knxbridge::network::application::mqtt::{MqttSettings, MqttTransport, Message};
//! use knxbridge::network::Instant;
//! # use knxbridge::network::application::mqtt::{Broker, Options, PublishPacket, QoS};
//! # struct MyBroker;
//! # impl Broker for MyBroker {
//! #     type Error = ();
//! #     fn connect(&mut self, _options: &Options<'_>) -> Result<(), i8> { Ok(()) }
//! #     fn is_connected(&mut self) -> bool { true }
//! #     fn publish(&mut self, _t: &str, _p: &[u8], _q: QoS, _r: bool) -> Result<(), ()> { Ok(()) }
//! #     fn subscribe(&mut self, _f: &str, _q: QoS) -> Result<(), ()> { Ok(()) }
//! #     fn unsubscribe(&mut self, _f: &str) -> Result<(), ()> { Ok(()) }
//! #     fn poll(&mut self) -> Result<Option<PublishPacket>, ()> { Ok(None) }
//! #     fn disconnect(&mut self) {}
//! # }
//! # struct Wifi;
//! # impl knxbridge::network::Link for Wifi { fn is_up(&mut self) -> bool { true } }
//!
//! let mut mqtt: MqttTransport<_, _, fn(&mut u32, &Message<'_>), 4> =
//!     MqttTransport::new(MyBroker, Wifi, MqttSettings::default());
//!
//! fn count(seen: &mut u32, _message: &Message<'_>) {
//!     *seen += 1;
//! }
//! mqtt.subscribe("control/#", count).unwrap();
//!
//! let mut seen = 0u32;
//! mqtt.tick(Instant::from_millis(0), &mut seen);
//! ```

use crate::network::RetryPolicy;
use crate::network::error::ParseError;
use core::time::Duration;
use heapless::{String, Vec};
use serde::Deserialize;
use serde::de::{Deserializer, IgnoredAny, MapAccess, Visitor};

/// The transport: reconnection, presence, publish and dispatch.
pub mod client;

/// Topic filter validation, matching and the subscription table.
pub mod topic;

#[cfg(test)]
mod tests;

pub use client::{ListenerId, MqttTransport, StateListener, Stats};
pub use topic::{SubscriptionId, SubscriptionTable};

/// Longest topic or topic filter the transport accepts.
pub const MAX_TOPIC_LEN: usize = 128;
/// Largest inbound or outbound payload in bytes.
pub const MAX_PAYLOAD_LEN: usize = 512;
/// Upper bound on inbound messages dispatched by a single tick.
pub const MAX_DELIVERIES_PER_TICK: usize = 8;
/// Number of connection-state listeners a transport can hold.
pub const MAX_LISTENERS: usize = 4;

/// Quality of Service levels for MQTT messages.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QoS {
    /// At most once delivery.
    AtMostOnce = 0,
    /// At least once delivery.
    AtLeastOnce = 1,
    /// Exactly once delivery.
    ExactlyOnce = 2,
}

/// A message the broker asked the client to publish on its behalf if the
/// client disappears without a clean disconnect.
#[derive(Debug, Clone, Copy)]
pub struct LastWill<'a> {
    /// Topic the will is published to.
    pub topic: &'a str,
    /// Will payload.
    pub payload: &'a [u8],
    /// Delivery guarantee for the will.
    pub qos: QoS,
    /// Whether the broker retains the will once published.
    pub retain: bool,
}

/// Options passed to [`Broker::connect`].
#[derive(Debug, Clone)]
pub struct Options<'a> {
    /// The client identifier, must be unique within the broker.
    pub client_id: &'a str,
    /// The keep-alive time in seconds.
    pub keep_alive_seconds: u16,
    /// Whether to start a clean session.
    pub clean_session: bool,
    /// Last will armed for this session.
    pub will: Option<LastWill<'a>>,
}

/// An incoming publish packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    /// The topic of the message.
    pub topic: String<MAX_TOPIC_LEN>,
    /// The payload of the message.
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
    /// Whether the broker delivered this from its retained store.
    pub retained: bool,
}

/// The MQTT client primitive the transport is built on.
///
/// Implementations own framing, keep-alive pings and the socket. `poll` must
/// not block: it returns `Ok(None)` when nothing is pending.
pub trait Broker {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Opens a session. On failure returns the client state code: negative
    /// values for client-side failures (-4 timeout, -3 connection lost,
    /// -2 connect failed, -1 disconnected), positive values for CONNACK
    /// return codes (1-5).
    fn connect(&mut self, options: &Options<'_>) -> Result<(), i8>;

    /// Whether the session is still alive.
    fn is_connected(&mut self) -> bool;

    /// Publishes a payload.
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Subscribes to a topic filter.
    fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<(), Self::Error>;

    /// Removes a broker-side subscription.
    fn unsubscribe(&mut self, filter: &str) -> Result<(), Self::Error>;

    /// Services the session and returns the next inbound message, if any.
    fn poll(&mut self) -> Result<Option<PublishPacket>, Self::Error>;

    /// Closes the session cleanly, suppressing the last will.
    fn disconnect(&mut self);
}

/// Identity and timing of an MQTT transport.
#[derive(Debug, Clone)]
pub struct MqttSettings<'a> {
    /// Broker host, used in diagnostics and for name resolution on failures.
    pub server: &'a str,
    /// Client identifier presented to the broker.
    pub client_id: &'a str,
    /// Device name carried in presence documents.
    pub device_id: &'a str,
    /// Topic of the retained presence document and the last will.
    pub presence_topic: &'a str,
    /// Keep-alive interval in seconds.
    pub keep_alive_seconds: u16,
    /// Whether each session starts clean.
    pub clean_session: bool,
    /// Delay between failed connection attempts.
    pub retry: RetryPolicy,
    /// How often the network link is re-checked while it is down.
    pub link_poll_interval: Duration,
}

impl Default for MqttSettings<'_> {
    fn default() -> Self {
        Self {
            server: "localhost",
            client_id: "knxbridge",
            device_id: "knxbridge",
            presence_topic: "status/bridge",
            keep_alive_seconds: 15,
            clean_session: true,
            retry: RetryPolicy::default(),
            link_poll_interval: Duration::from_millis(500),
        }
    }
}

/// A received JSON object, validated but not yet interpreted.
///
/// Handlers read typed views out of it with [`Document::get`]. Field types are
/// checked by serde, so a field of the wrong type is an error rather than a
/// silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Document<'a> {
    text: &'a str,
}

impl<'a> Document<'a> {
    /// Validates that `payload` is a single UTF-8 JSON object.
    pub fn parse(payload: &'a [u8]) -> Result<Self, ParseError> {
        let text = core::str::from_utf8(payload).map_err(|_| ParseError::Utf8)?;
        serde_json_core::from_str::<JsonObject>(text).map_err(|_| ParseError::Json)?;
        Ok(Self { text })
    }

    /// Deserializes a typed view of the document.
    pub fn get<T: Deserialize<'a>>(&self) -> Result<T, ParseError> {
        serde_json_core::from_str(self.text)
            .map(|(value, _)| value)
            .map_err(|_| ParseError::Json)
    }

    /// The raw JSON text.
    pub fn as_str(&self) -> &'a str {
        self.text
    }
}

/// An inbound message handed to subscription handlers.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    /// The concrete topic the message arrived on.
    pub topic: &'a str,
    /// The parsed payload.
    pub document: Document<'a>,
    /// Whether it came from the broker's retained store.
    pub retained: bool,
}

/// Receives inbound messages for a subscription.
///
/// `ctx` is supplied by whoever drives [`MqttTransport::tick`], which lets a
/// handler reach state the transport does not own (the bus transport, for a
/// bridge) without shared mutable globals.
pub trait MessageHandler<C: ?Sized> {
    /// Handles one message.
    fn on_message(&mut self, ctx: &mut C, message: &Message<'_>);
}

impl<C: ?Sized, F> MessageHandler<C> for F
where
    F: FnMut(&mut C, &Message<'_>),
{
    fn on_message(&mut self, ctx: &mut C, message: &Message<'_>) {
        self(ctx, message)
    }
}

/// Accepts any JSON object while skipping over its values.
struct JsonObject;

impl<'de> Deserialize<'de> for JsonObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ObjectVisitor;

        impl<'de> Visitor<'de> for ObjectVisitor {
            type Value = JsonObject;

            fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JsonObject, A::Error> {
                while map.next_entry::<&'de str, IgnoredAny>()?.is_some() {}
                Ok(JsonObject)
            }
        }

        deserializer.deserialize_map(ObjectVisitor)
    }
}
