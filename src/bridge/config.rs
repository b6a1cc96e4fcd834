//! Bridge configuration.
//!
//! [`BridgeConfig::default`] reproduces the fixed deployment: presence on
//! `status/bridge`, every bus telegram forwarded to `status/bus`, commands on
//! `control/bus` written to group address 0/0/1, a `#` monitor and physical
//! address 1.1.160. [`BridgeConfig::from_json`] overlays a JSON document on
//! top of those defaults; string fields are borrowed from the input.
//!
//! ```rust
//! use knxbridge::bridge::config::{BridgeConfig, Transform};
//!
//! let config = BridgeConfig::from_json(r#"{
//!     "server": "192.168.178.32",
//!     "physicalAddress": "1.1.200",
//!     "cloudRules": [{ "topic": "control/light", "target": "1/0/7", "transform": "switch" }]
//! }"#).unwrap();
//!
//! assert_eq!(config.mqtt.server, "192.168.178.32");
//! assert_eq!(config.cloud_rules[0].transform, Transform::Switch);
//! // Bus rules were not given, so the default forwarding rule stays
//! assert_eq!(config.bus_rules[0].topic, "status/bus");
//! ```

use crate::knx::address::{GroupAddress, IndividualAddress};
use crate::knx::error::AddressError;
use crate::network::RetryPolicy;
use crate::network::application::mqtt::MqttSettings;
use core::fmt;
use core::time::Duration;
use heapless::Vec;
use serde::Deserialize;

/// Maximum rules per direction.
pub const MAX_RULES: usize = 8;

/// Which telegrams a [`BusRule`] applies to.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AddressFilter {
    /// Every group address.
    Any,
    /// A single group address.
    Exact(GroupAddress),
}

impl AddressFilter {
    /// Whether `address` passes the filter.
    pub fn matches(self, address: GroupAddress) -> bool {
        match self {
            AddressFilter::Any => true,
            AddressFilter::Exact(expected) => expected == address,
        }
    }
}

/// Forward matching bus telegrams to an MQTT topic.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct BusRule<'a> {
    /// Telegrams the rule applies to.
    pub source: AddressFilter,
    /// Topic the telemetry document is published to.
    pub topic: &'a str,
    /// Whether the broker should retain the document.
    pub retained: bool,
}

/// How a command's integer `value` becomes a bus payload byte.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// The value itself, which must be 0-255.
    Raw,
    /// 1 for any non-zero value, 0 otherwise.
    Switch,
}

/// Write commands arriving on an MQTT topic to a group address.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CloudRule<'a> {
    /// Topic (or filter) commands arrive on.
    pub topic: &'a str,
    /// Group address the payload is written to.
    pub target: GroupAddress,
    /// Value to payload conversion.
    pub transform: Transform,
}

/// Everything needed to build a [`Bridge`](super::Bridge).
#[derive(Debug, Clone)]
pub struct BridgeConfig<'a> {
    /// Broker identity, presence topic and retry timing.
    pub mqtt: MqttSettings<'a>,
    /// Physical address the bus interface starts with.
    pub physical_address: IndividualAddress,
    /// Filter whose messages are logged, or `None` to disable the monitor.
    pub monitor_topic: Option<&'a str>,
    /// Whether every bus telegram is logged in raw form.
    pub bus_monitor: bool,
    /// Interval between heartbeat diagnostics.
    pub heartbeat_interval: Duration,
    /// Bus to cloud rules.
    pub bus_rules: Vec<BusRule<'a>, MAX_RULES>,
    /// Cloud to bus rules.
    pub cloud_rules: Vec<CloudRule<'a>, MAX_RULES>,
}

impl Default for BridgeConfig<'_> {
    fn default() -> Self {
        let mut bus_rules = Vec::new();
        let _ = bus_rules.push(BusRule {
            source: AddressFilter::Any,
            topic: "status/bus",
            retained: false,
        });
        let mut cloud_rules = Vec::new();
        let _ = cloud_rules.push(CloudRule {
            topic: "control/bus",
            target: GroupAddress::from_raw(0x0001),
            transform: Transform::Raw,
        });
        Self {
            mqtt: MqttSettings::default(),
            physical_address: IndividualAddress::from_raw(0x11A0),
            monitor_topic: Some("#"),
            bus_monitor: true,
            heartbeat_interval: Duration::from_secs(30),
            bus_rules,
            cloud_rules,
        }
    }
}

/// A configuration document could not be applied.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConfigError {
    /// The document is not valid JSON of the expected shape.
    Json,
    /// An address field does not hold a valid address.
    Address(AddressError),
    /// The retry object names neither a fixed nor an exponential policy.
    Retry,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json => f.write_str("invalid configuration document"),
            ConfigError::Address(e) => write!(f, "invalid address: {}", e),
            ConfigError::Retry => f.write_str("invalid retry policy"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::Json => defmt::write!(f, "Json"),
            ConfigError::Address(e) => defmt::write!(f, "Address({})", e),
            ConfigError::Retry => defmt::write!(f, "Retry"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

impl From<AddressError> for ConfigError {
    fn from(e: AddressError) -> Self {
        ConfigError::Address(e)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document<'a> {
    #[serde(borrow)]
    server: Option<&'a str>,
    #[serde(borrow)]
    client_id: Option<&'a str>,
    #[serde(borrow)]
    device_id: Option<&'a str>,
    #[serde(borrow)]
    presence_topic: Option<&'a str>,
    keep_alive: Option<u16>,
    clean_session: Option<bool>,
    retry: Option<RetryDocument>,
    #[serde(borrow)]
    physical_address: Option<&'a str>,
    /// An empty string disables the monitor
    #[serde(borrow)]
    monitor_topic: Option<&'a str>,
    bus_monitor: Option<bool>,
    heartbeat_secs: Option<u64>,
    #[serde(borrow)]
    bus_rules: Option<Vec<BusRuleDocument<'a>, MAX_RULES>>,
    #[serde(borrow)]
    cloud_rules: Option<Vec<CloudRuleDocument<'a>, MAX_RULES>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetryDocument {
    fixed_ms: Option<u64>,
    initial_ms: Option<u64>,
    ceiling_ms: Option<u64>,
}

#[derive(Deserialize)]
struct BusRuleDocument<'a> {
    /// `"*"` or a group address
    source: &'a str,
    topic: &'a str,
    #[serde(default)]
    retained: bool,
}

#[derive(Deserialize)]
struct CloudRuleDocument<'a> {
    topic: &'a str,
    target: &'a str,
    transform: Option<Transform>,
}

impl RetryDocument {
    fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        match (self.fixed_ms, self.initial_ms, self.ceiling_ms) {
            (None, Some(initial), Some(ceiling)) => Ok(RetryPolicy::Exponential {
                initial: Duration::from_millis(initial),
                ceiling: Duration::from_millis(ceiling),
            }),
            (Some(fixed), None, None) => Ok(RetryPolicy::Fixed(Duration::from_millis(fixed))),
            _ => Err(ConfigError::Retry),
        }
    }
}

impl<'a> BridgeConfig<'a> {
    /// Parses a JSON configuration document. Absent fields keep their
    /// defaults; a present rule list replaces the default rules entirely.
    pub fn from_json(json: &'a str) -> Result<Self, ConfigError> {
        let (doc, _): (Document<'a>, usize) =
            serde_json_core::from_str(json).map_err(|_| ConfigError::Json)?;
        let mut config = Self::default();

        if let Some(server) = doc.server {
            config.mqtt.server = server;
        }
        if let Some(client_id) = doc.client_id {
            config.mqtt.client_id = client_id;
        }
        if let Some(device_id) = doc.device_id {
            config.mqtt.device_id = device_id;
        }
        if let Some(topic) = doc.presence_topic {
            config.mqtt.presence_topic = topic;
        }
        if let Some(keep_alive) = doc.keep_alive {
            config.mqtt.keep_alive_seconds = keep_alive;
        }
        if let Some(clean) = doc.clean_session {
            config.mqtt.clean_session = clean;
        }
        if let Some(retry) = doc.retry {
            config.mqtt.retry = retry.policy()?;
        }
        if let Some(address) = doc.physical_address {
            config.physical_address = address.parse()?;
        }
        if let Some(monitor) = doc.monitor_topic {
            config.monitor_topic = (!monitor.is_empty()).then_some(monitor);
        }
        if let Some(enabled) = doc.bus_monitor {
            config.bus_monitor = enabled;
        }
        if let Some(secs) = doc.heartbeat_secs {
            config.heartbeat_interval = Duration::from_secs(secs);
        }

        if let Some(rules) = doc.bus_rules {
            config.bus_rules.clear();
            for rule in rules {
                let source = match rule.source {
                    "*" => AddressFilter::Any,
                    address => AddressFilter::Exact(address.parse()?),
                };
                // Same capacity on both sides, cannot overflow
                let _ = config.bus_rules.push(BusRule {
                    source,
                    topic: rule.topic,
                    retained: rule.retained,
                });
            }
        }
        if let Some(rules) = doc.cloud_rules {
            config.cloud_rules.clear();
            for rule in rules {
                let _ = config.cloud_rules.push(CloudRule {
                    topic: rule.topic,
                    target: rule.target.parse()?,
                    transform: rule.transform.unwrap_or(Transform::Raw),
                });
            }
        }

        Ok(config)
    }
}
