//! The KNX to MQTT bridge.
//!
//! [`Bridge`] owns both transports and the [`Translator`](rules::Translator)
//! and runs everything from a single cooperative [`Bridge::poll`]. Nothing
//! blocks: a broker outage only means that the MQTT tick returns early, the
//! bus keeps being serviced at full rate.
//!
//! Handlers on each transport are given the *other* transport through the
//! tick context, so bus telegrams can be published and commands can be
//! written to the bus without shared mutable state.
//!
//! ```rust,no_run
//! use knxbridge::bridge::Bridge;
//! use knxbridge::bridge::config::BridgeConfig;
//! use knxbridge::network::Instant;
//! # use knxbridge::knx::{BusDriver, Telegram};
//! # use knxbridge::knx::address::{GroupAddress, IndividualAddress};
//! # use knxbridge::network::application::mqtt::{Broker, Options, PublishPacket, QoS};
//! # struct Mqtt;
//! # impl Broker for Mqtt {
//! #     type Error = ();
//! #     fn connect(&mut self, _o: &Options<'_>) -> Result<(), i8> { Ok(()) }
//! #     fn is_connected(&mut self) -> bool { true }
//! #     fn publish(&mut self, _t: &str, _p: &[u8], _q: QoS, _r: bool) -> Result<(), ()> { Ok(()) }
//! #     fn subscribe(&mut self, _f: &str, _q: QoS) -> Result<(), ()> { Ok(()) }
//! #     fn unsubscribe(&mut self, _f: &str) -> Result<(), ()> { Ok(()) }
//! #     fn poll(&mut self) -> Result<Option<PublishPacket>, ()> { Ok(None) }
//! #     fn disconnect(&mut self) {}
//! # }
//! # struct Wifi;
//! # impl knxbridge::network::Link for Wifi { fn is_up(&mut self) -> bool { true } }
//! # struct TpUart;
//! # impl BusDriver for TpUart {
//! #     type Error = ();
//! #     fn start(&mut self, _a: IndividualAddress) -> Result<(), ()> { Ok(()) }
//! #     fn write_group(&mut self, _a: GroupAddress, _p: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn receive(&mut self) -> Option<Telegram<'_>> { None }
//! # }
//! # fn millis() -> u64 { 0 }
//!
//! let config = BridgeConfig::default();
//! let mut bridge = Bridge::new(&config, Mqtt, Wifi, TpUart);
//! bridge.start(Instant::from_millis(millis())).unwrap();
//! loop {
//!     bridge.poll(Instant::from_millis(millis()));
//! }
//! ```

use crate::knx::address::{GroupAddress, IndividualAddress};
use crate::knx::{BusDriver, KnxTransport, Telegram, TelegramHandler};
use crate::network::application::mqtt::{Broker, Message, MessageHandler, MqttTransport};
use crate::network::error::{ConnectError, SendError};
use crate::network::{ConnectionState, Instant, Link, bump};
use config::BridgeConfig;
use core::fmt;
use core::time::Duration;
use rules::Translator;

/// Bridge configuration and its JSON loader.
pub mod config;

/// The bidirectional rule table.
pub mod rules;

/// MQTT subscriptions a bridge can hold: every command rule plus the monitor.
pub const MAX_SUBSCRIPTIONS: usize = config::MAX_RULES + 1;

/// Telegram handlers a bridge registers: telemetry and the raw monitor.
pub const MAX_BUS_HANDLERS: usize = 2;

/// Delay between attempts to bring up a bus interface that failed to start.
pub const BUS_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// What an MQTT subscription of the bridge does.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CloudRoute {
    /// Apply the command rules and write to the bus.
    Command,
    /// Log the message.
    Monitor,
}

/// What a telegram handler of the bridge does.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BusRoute {
    /// Apply the telemetry rules and publish.
    Telemetry,
    /// Log the raw telegram.
    Monitor,
}

/// The bridge's MQTT transport type.
pub type CloudTransport<'a, B, L> = MqttTransport<'a, B, L, CloudRoute, MAX_SUBSCRIPTIONS>;

/// The bridge's KNX transport type.
pub type BusTransport<D> = KnxTransport<D, BusRoute, MAX_BUS_HANDLERS>;

/// Tick context of the MQTT handlers: the bus side of the bridge.
#[derive(Debug)]
pub struct BusContext<'t, 'a, D: BusDriver> {
    knx: &'t mut BusTransport<D>,
    translator: &'t Translator<'a>,
}

/// Tick context of the telegram handlers: the cloud side of the bridge.
#[derive(Debug)]
pub struct CloudContext<'t, 'a, B: Broker, L: Link> {
    mqtt: &'t mut CloudTransport<'a, B, L>,
    translator: &'t Translator<'a>,
}

impl<D: BusDriver> MessageHandler<BusContext<'_, '_, D>> for CloudRoute {
    fn on_message(&mut self, ctx: &mut BusContext<'_, '_, D>, message: &Message<'_>) {
        match self {
            CloudRoute::Command => {
                info!("Command received on {}", message.topic);
                // Rejections are already logged by the translator
                let _ = ctx.translator.on_message(message, &mut *ctx.knx);
            }
            CloudRoute::Monitor => {
                info!("MQTT message on {}: {}", message.topic, message.document.as_str());
            }
        }
    }
}

impl<B: Broker, L: Link> TelegramHandler<CloudContext<'_, '_, B, L>> for BusRoute {
    fn on_telegram(&mut self, ctx: &mut CloudContext<'_, '_, B, L>, telegram: &Telegram<'_>) {
        match self {
            BusRoute::Telemetry => {
                let _ = ctx.translator.on_telegram(telegram, &mut *ctx.mqtt);
            }
            BusRoute::Monitor => {
                info!(
                    "KNX telegram to {} ({} bytes): {}",
                    telegram.destination,
                    telegram.payload.len(),
                    Hex(telegram.payload)
                );
            }
        }
    }
}

/// Formats bytes as space-separated upper-case hex pairs.
struct Hex<'b>(&'b [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Hex<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=[u8]:X}", self.0)
    }
}

fn log_connection_state(state: ConnectionState) {
    match state {
        ConnectionState::Connected => {
            info!("MQTT: connected to broker");
        }
        ConnectionState::Disconnected => {
            info!("MQTT: disconnected from broker");
        }
        ConnectionState::Connecting => {}
    }
}

/// Connection status of both sides, as reported by [`Bridge::poll`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Status {
    /// MQTT connection state after the tick.
    pub mqtt: ConnectionState,
    /// Whether the bus interface is initialized.
    pub knx: bool,
}

/// A KNX to MQTT bridge.
#[derive(Debug)]
pub struct Bridge<'a, B: Broker, L: Link, D: BusDriver> {
    mqtt: CloudTransport<'a, B, L>,
    knx: BusTransport<D>,
    translator: Translator<'a>,
    physical_address: IndividualAddress,
    monitor_topic: Option<&'a str>,
    bus_monitor: bool,
    heartbeat_interval: Duration,
    last_heartbeat: Option<Instant>,
    heartbeats: u32,
    bus_retry_at: Instant,
    started: bool,
}

impl<'a, B: Broker, L: Link, D: BusDriver> Bridge<'a, B, L, D> {
    /// Builds a bridge from its configuration and collaborators. Nothing is
    /// started until [`start`](Self::start).
    pub fn new(config: &BridgeConfig<'a>, broker: B, link: L, driver: D) -> Self {
        Self {
            mqtt: MqttTransport::new(broker, link, config.mqtt.clone()),
            knx: KnxTransport::new(driver),
            translator: Translator::new(config),
            physical_address: config.physical_address,
            monitor_topic: config.monitor_topic,
            bus_monitor: config.bus_monitor,
            heartbeat_interval: config.heartbeat_interval,
            last_heartbeat: None,
            heartbeats: 0,
            bus_retry_at: Instant::from_millis(0),
            started: false,
        }
    }

    /// Registers handlers and subscriptions, starts the bus interface and
    /// makes the first broker connection attempt.
    ///
    /// A refused or unreachable broker is not an error here: the attempt is
    /// retried by [`poll`](Self::poll). The result reflects the bus interface;
    /// if it failed to start, `poll` retries it every [`BUS_RETRY_INTERVAL`].
    pub fn start(&mut self, now: Instant) -> Result<(), ConnectError> {
        if self.started {
            return Err(ConnectError::AlreadyStarted);
        }
        self.started = true;
        self.last_heartbeat = Some(now);

        if self.mqtt.on_connection_state_change(log_connection_state).is_err() {
            warn!("No free connection listener slot");
        }
        // Command filters go first so a wildcard command topic still wins
        // over the monitor
        for topic in self.translator.command_topics() {
            if let Err(e) = self.mqtt.subscribe(topic, CloudRoute::Command) {
                error!("Cannot subscribe to {}: {}", topic, e);
            }
        }
        if let Some(topic) = self.monitor_topic {
            if let Err(e) = self.mqtt.subscribe(topic, CloudRoute::Monitor) {
                error!("Cannot subscribe monitor to {}: {}", topic, e);
            }
        }

        if self.bus_monitor {
            let _ = self.knx.on_telegram_received(BusRoute::Monitor);
        }
        let _ = self.knx.on_telegram_received(BusRoute::Telemetry);

        info!("Initializing KNX with physical address {}", self.physical_address);
        let bus = self.knx.start(self.physical_address);
        if bus.is_err() {
            self.bus_retry_at = now + BUS_RETRY_INTERVAL;
        }

        if let Err(e) = self.mqtt.connect(now) {
            info!("Initial MQTT connection not established: {}", e);
        }
        bus
    }

    /// Runs one iteration of the bridge: MQTT tick, KNX tick, heartbeat.
    pub fn poll(&mut self, now: Instant) -> Status {
        self.restart_bus(now);

        let Self {
            mqtt,
            knx,
            translator,
            ..
        } = &mut *self;

        mqtt.tick(
            now,
            &mut BusContext {
                knx: &mut *knx,
                translator: &*translator,
            },
        );
        knx.tick(&mut CloudContext {
            mqtt: &mut *mqtt,
            translator: &*translator,
        });

        let status = self.status();
        self.heartbeat(now, status);
        status
    }

    /// Writes a payload to the bus directly, outside the rule table.
    pub fn send_telegram(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), SendError> {
        self.knx.send_telegram(address, payload)
    }

    /// Publishes the offline presence document and closes the broker session.
    pub fn shutdown(&mut self) {
        self.mqtt.disconnect();
    }

    /// Current connection status of both sides.
    pub fn status(&self) -> Status {
        Status {
            mqtt: self.mqtt.state(),
            knx: self.knx.is_connected(),
        }
    }

    /// Number of heartbeats emitted so far.
    pub fn heartbeats(&self) -> u32 {
        self.heartbeats
    }

    /// The MQTT transport.
    pub fn mqtt(&self) -> &CloudTransport<'a, B, L> {
        &self.mqtt
    }

    /// Mutable access to the MQTT transport.
    pub fn mqtt_mut(&mut self) -> &mut CloudTransport<'a, B, L> {
        &mut self.mqtt
    }

    /// The KNX transport.
    pub fn knx(&self) -> &BusTransport<D> {
        &self.knx
    }

    /// Mutable access to the KNX transport.
    pub fn knx_mut(&mut self) -> &mut BusTransport<D> {
        &mut self.knx
    }

    fn restart_bus(&mut self, now: Instant) {
        if !self.started || self.knx.is_connected() || now < self.bus_retry_at {
            return;
        }
        info!("Retrying KNX start with physical address {}", self.physical_address);
        if let Err(e) = self.knx.start(self.physical_address) {
            warn!("KNX interface still down: {}", e);
            self.bus_retry_at = now + BUS_RETRY_INTERVAL;
        }
    }

    fn heartbeat(&mut self, now: Instant, status: Status) {
        let last = *self.last_heartbeat.get_or_insert(now);
        if now.saturating_duration_since(last) < self.heartbeat_interval {
            return;
        }
        self.last_heartbeat = Some(now);
        bump(&mut self.heartbeats);
        info!("Heartbeat: KNX-MQTT bridge running");
        info!("Status: MQTT {}", status.mqtt);
        info!(
            "Status: KNX {}",
            if status.knx { "connected" } else { "disconnected" }
        );
    }
}
