//! The MQTT transport: connection lifecycle, presence and dispatch.
//!
//! # Connection lifecycle
//!
//! ```text
//!   Disconnected ──(retry deadline passed, link up)──► Connecting
//!        ▲                                                │
//!        │◄──────────── broker refused ──────────────────┤
//!        │                                                ▼
//!        └──────────── drop detected ◄──────────────── Connected
//! ```
//!
//! Nothing here sleeps. A failed attempt sets a retry-not-before deadline and
//! returns; the host keeps calling [`MqttTransport::tick`] and the next
//! attempt happens on the first tick past the deadline. The bus side of the
//! bridge is therefore serviced at full rate during a broker outage.
//!
//! # Presence
//!
//! Every session is opened with a retained last will
//! `{"status":"offline","device":...}` on the presence topic, and every
//! successful connect publishes the retained `{"status":"online",...}`
//! document there. Observers see an accurate flag even after a crash or power
//! loss, without any code path on this side noticing the failure.

use super::topic::{SubscriptionId, SubscriptionTable};
use super::{
    Broker, Document, LastWill, MAX_DELIVERIES_PER_TICK, MAX_LISTENERS, MAX_PAYLOAD_LEN, Message,
    MessageHandler, MqttSettings, Options, PublishPacket, QoS,
};
use crate::network::error::{
    ConnectCause, ConnectError, PublishError, RegistrationError, SubscribeError,
};
use crate::network::{ConnectionState, Instant, Link, bump};
use core::fmt::Write as _;
use heapless::{String, Vec};
use serde::Serialize;

/// Callback notified on connection state transitions.
pub type StateListener = fn(ConnectionState);

/// Token returned by [`MqttTransport::on_connection_state_change`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ListenerId(u16);

/// Counters kept by a transport.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Successful broker connections.
    pub connects: u32,
    /// Failed connection attempts.
    pub connect_failures: u32,
    /// Documents published.
    pub published: u32,
    /// Inbound messages handed to a handler.
    pub delivered: u32,
    /// Inbound payloads dropped because they were not JSON documents.
    pub malformed: u32,
    /// Inbound messages no subscription matched.
    pub unmatched: u32,
}

/// Presence document published on the presence topic.
#[derive(Serialize)]
struct Presence<'a> {
    status: &'a str,
    device: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
}

/// Room for a presence document with the longest IPv6 address.
const PRESENCE_LEN: usize = 192;

/// An MQTT transport with automatic reconnection.
///
/// # Type Parameters
///
/// * `B` - The broker client
/// * `L` - The network link
/// * `H` - Subscription handler type
/// * `N` - Capacity of the subscription table
#[derive(Debug)]
pub struct MqttTransport<'a, B: Broker, L: Link, H, const N: usize = 8> {
    broker: B,
    link: L,
    settings: MqttSettings<'a>,
    state: ConnectionState,
    retry_at: Instant,
    consecutive_failures: u32,
    waiting_for_link: bool,
    stopped: bool,
    subscriptions: SubscriptionTable<H, N>,
    listeners: Vec<(ListenerId, StateListener), MAX_LISTENERS>,
    next_listener: u16,
    stats: Stats,
}

impl<'a, B: Broker, L: Link, H, const N: usize> MqttTransport<'a, B, L, H, N> {
    /// Creates a disconnected transport. The first tick attempts a connection.
    pub fn new(broker: B, link: L, settings: MqttSettings<'a>) -> Self {
        Self {
            broker,
            link,
            settings,
            state: ConnectionState::Disconnected,
            retry_at: Instant::default(),
            consecutive_failures: 0,
            waiting_for_link: false,
            stopped: false,
            subscriptions: SubscriptionTable::new(),
            listeners: Vec::new(),
            next_listener: 0,
            stats: Stats::default(),
        }
    }

    /// Makes one connection attempt now, ignoring the retry deadline.
    ///
    /// Also re-enables automatic reconnection after [`disconnect`](Self::disconnect).
    pub fn connect(&mut self, now: Instant) -> Result<(), ConnectError> {
        self.stopped = false;
        if self.state.is_connected() {
            return Ok(());
        }
        self.attempt(now)
    }

    /// Runs one iteration of the transport.
    ///
    /// While disconnected this attempts at most one reconnection, and only
    /// once the retry deadline has passed. While connected it detects drops
    /// and dispatches up to [`MAX_DELIVERIES_PER_TICK`] inbound messages to
    /// their handlers, passing `ctx` through.
    pub fn tick<C: ?Sized>(&mut self, now: Instant, ctx: &mut C) -> ConnectionState
    where
        H: MessageHandler<C>,
    {
        match self.state {
            ConnectionState::Connected => {
                if self.broker.is_connected() {
                    self.service(now, ctx);
                } else {
                    self.dropped(now);
                }
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                if !self.stopped && now >= self.retry_at {
                    let _ = self.attempt(now);
                }
            }
        }
        self.state
    }

    /// Serializes `document` and publishes it at QoS 0.
    ///
    /// Fails with [`PublishError::NotConnected`] and no side effects while
    /// disconnected; nothing is queued for later.
    pub fn publish<T: Serialize + ?Sized>(
        &mut self,
        topic: &str,
        document: &T,
        retained: bool,
    ) -> Result<(), PublishError> {
        if !self.state.is_connected() {
            debug!("Cannot publish to {} - not connected to broker", topic);
            return Err(PublishError::NotConnected);
        }
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        let len = serde_json_core::to_slice(document, &mut buf).map_err(|_| {
            warn!("Document for {} does not fit the payload buffer", topic);
            PublishError::Serialize
        })?;
        self.publish_raw(topic, &buf[..len], retained)
    }

    /// Registers `handler` for `filter`.
    ///
    /// The handler is always recorded locally, so it survives reconnects. If
    /// connected, the broker subscription is issued immediately; otherwise it
    /// is issued on the next successful connect, along with every other
    /// registered filter.
    pub fn subscribe(&mut self, filter: &str, handler: H) -> Result<SubscriptionId, SubscribeError> {
        let id = self.subscriptions.insert(filter, handler)?;
        if self.state.is_connected() {
            match self.broker.subscribe(filter, QoS::AtMostOnce) {
                Ok(()) => {
                    info!("Subscribed to {}", filter);
                }
                Err(_) => {
                    warn!("Broker subscribe to {} failed, will retry on reconnect", filter);
                }
            }
        } else {
            debug!("Recorded subscription to {} until connected", filter);
        }
        Ok(id)
    }

    /// Removes a subscription locally and, if connected, at the broker.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<(), SubscribeError> {
        let filter = self.subscriptions.remove(id)?;
        if self.state.is_connected() && self.broker.unsubscribe(&filter).is_err() {
            warn!("Broker unsubscribe from {} failed", filter.as_str());
        }
        Ok(())
    }

    /// Registers a connection-state listener.
    ///
    /// If the transport is already connected the listener is called once
    /// right away with [`ConnectionState::Connected`].
    pub fn on_connection_state_change(
        &mut self,
        listener: StateListener,
    ) -> Result<ListenerId, RegistrationError> {
        let id = ListenerId(self.next_listener);
        self.listeners
            .push((id, listener))
            .map_err(|_| RegistrationError::Full)?;
        self.next_listener = self.next_listener.wrapping_add(1);
        if self.state.is_connected() {
            listener(ConnectionState::Connected);
        }
        Ok(id)
    }

    /// Removes a listener. Returns whether it was registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        match self.listeners.iter().position(|(lid, _)| *lid == id) {
            Some(index) => {
                self.listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Publishes the offline presence document and closes the session
    /// cleanly. Automatic reconnection stays off until [`connect`](Self::connect).
    pub fn disconnect(&mut self) {
        self.stopped = true;
        if !self.state.is_connected() {
            return;
        }
        let presence = Presence {
            status: "offline",
            device: self.settings.device_id,
            ip: None,
        };
        let topic = self.settings.presence_topic;
        if self.publish(topic, &presence, true).is_err() {
            warn!("Could not publish offline presence before disconnecting");
        }
        self.broker.disconnect();
        info!("Disconnected from MQTT broker at {}", self.settings.server);
        self.transition(ConnectionState::Disconnected);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Shorthand for `state().is_connected()`.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Earliest instant of the next automatic connection attempt.
    pub fn next_attempt_at(&self) -> Instant {
        self.retry_at
    }

    /// Transport counters.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// The local dispatch table.
    pub fn subscriptions(&self) -> &SubscriptionTable<H, N> {
        &self.subscriptions
    }

    /// Transport settings.
    pub fn settings(&self) -> &MqttSettings<'a> {
        &self.settings
    }

    /// Get the underlying broker client
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Get a mutable reference to the underlying broker client
    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    /// Get a mutable reference to the network link
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn attempt(&mut self, now: Instant) -> Result<(), ConnectError> {
        if !self.link.is_up() {
            if !self.waiting_for_link {
                info!("Waiting for network link before connecting to {}", self.settings.server);
                self.waiting_for_link = true;
            }
            self.retry_at = now + self.settings.link_poll_interval;
            return Err(ConnectError::LinkDown);
        }
        if self.waiting_for_link {
            info!("Network link is up");
            self.waiting_for_link = false;
        }

        self.transition(ConnectionState::Connecting);
        info!(
            "Connecting to MQTT broker at {} as {}",
            self.settings.server, self.settings.client_id
        );

        let mut will_buf = [0u8; PRESENCE_LEN];
        let offline = Presence {
            status: "offline",
            device: self.settings.device_id,
            ip: None,
        };
        let will = match serde_json_core::to_slice(&offline, &mut will_buf) {
            Ok(len) => Some(LastWill {
                topic: self.settings.presence_topic,
                payload: &will_buf[..len],
                qos: QoS::AtMostOnce,
                retain: true,
            }),
            Err(_) => {
                error!("Offline presence document too large, connecting without a last will");
                None
            }
        };
        let options = Options {
            client_id: self.settings.client_id,
            keep_alive_seconds: self.settings.keep_alive_seconds,
            clean_session: self.settings.clean_session,
            will,
        };

        match self.broker.connect(&options) {
            Ok(()) => {
                self.consecutive_failures = 0;
                bump(&mut self.stats.connects);
                self.state = ConnectionState::Connected;
                info!("Connected to MQTT broker at {}", self.settings.server);
                self.announce_online();
                self.replay_subscriptions();
                self.notify(ConnectionState::Connected);
                Ok(())
            }
            Err(code) => {
                let cause = ConnectCause::from_code(code);
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                bump(&mut self.stats.connect_failures);
                let delay = self.settings.retry.delay(self.consecutive_failures);
                warn!("MQTT connection failed: {}", cause);
                if cause == ConnectCause::ConnectFailed {
                    self.diagnose_host();
                }
                info!("Retrying in {} ms", delay.as_millis() as u64);
                self.retry_at = now + delay;
                self.transition(ConnectionState::Disconnected);
                Err(ConnectError::Refused(cause))
            }
        }
    }

    fn announce_online(&mut self) {
        let mut text: String<48> = String::new();
        let ip = match self.link.local_ip() {
            Some(addr) => write!(text, "{}", addr).ok().map(|_| text.as_str()),
            None => None,
        };
        let presence = Presence {
            status: "online",
            device: self.settings.device_id,
            ip,
        };
        let mut buf = [0u8; PRESENCE_LEN];
        match serde_json_core::to_slice(&presence, &mut buf) {
            Ok(len) => {
                let topic = self.settings.presence_topic;
                if self.publish_raw(topic, &buf[..len], true).is_err() {
                    warn!("Could not publish online presence to {}", topic);
                }
            }
            Err(_) => {
                error!("Online presence document too large");
            }
        }
    }

    fn replay_subscriptions(&mut self) {
        for filter in self.subscriptions.filters() {
            match self.broker.subscribe(filter, QoS::AtMostOnce) {
                Ok(()) => {
                    info!("Subscribed to {}", filter);
                }
                Err(_) => {
                    warn!("Broker subscribe to {} failed", filter);
                }
            }
        }
    }

    fn diagnose_host(&mut self) {
        let host = self.settings.server;
        match self.link.resolve(host) {
            Some(addr) => {
                let mut text: String<48> = String::new();
                let _ = write!(text, "{}", addr);
                info!("Broker host {} resolves to {}", host, text.as_str());
            }
            None => {
                warn!("Failed to resolve broker host {}", host);
            }
        }
    }

    fn service<C: ?Sized>(&mut self, now: Instant, ctx: &mut C)
    where
        H: MessageHandler<C>,
    {
        for _ in 0..MAX_DELIVERIES_PER_TICK {
            match self.broker.poll() {
                Ok(Some(packet)) => self.dispatch(&packet, ctx),
                Ok(None) => break,
                Err(_) => {
                    warn!("MQTT poll failed");
                    self.dropped(now);
                    break;
                }
            }
        }
    }

    fn dispatch<C: ?Sized>(&mut self, packet: &PublishPacket, ctx: &mut C)
    where
        H: MessageHandler<C>,
    {
        let topic = packet.topic.as_str();
        let document = match Document::parse(&packet.payload) {
            Ok(document) => document,
            Err(e) => {
                bump(&mut self.stats.malformed);
                warn!("Dropping malformed payload on {}: {}", topic, e);
                return;
            }
        };
        let message = Message {
            topic,
            document,
            retained: packet.retained,
        };
        let handler = self
            .subscriptions
            .best_match(topic)
            .and_then(|id| self.subscriptions.handler_mut(id));
        match handler {
            Some(handler) => {
                bump(&mut self.stats.delivered);
                trace!("Dispatching message on {}", topic);
                handler.on_message(ctx, &message);
            }
            None => {
                bump(&mut self.stats.unmatched);
                debug!("No subscription for {}", topic);
            }
        }
    }

    fn dropped(&mut self, now: Instant) {
        warn!("Lost connection to MQTT broker at {}", self.settings.server);
        self.retry_at = now;
        self.transition(ConnectionState::Disconnected);
    }

    fn publish_raw(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), PublishError> {
        match self.broker.publish(topic, payload, QoS::AtMostOnce, retained) {
            Ok(()) => {
                bump(&mut self.stats.published);
                debug!("Published {} bytes to {}", payload.len(), topic);
                Ok(())
            }
            Err(_) => {
                warn!("Publish to {} failed", topic);
                Err(PublishError::Broker)
            }
        }
    }

    fn transition(&mut self, state: ConnectionState) {
        if self.state != state {
            self.state = state;
            self.notify(state);
        }
    }

    fn notify(&self, state: ConnectionState) {
        for (_, listener) in &self.listeners {
            listener(state);
        }
    }
}
