//! Translation between bus telegrams and MQTT documents.
//!
//! A [`Translator`] is a pure function of its rule table: it never holds on
//! to a telegram or message and never retries. Its outputs go through two
//! small seams, [`DocumentPublisher`] and [`TelegramSink`], which the
//! transports implement and tests can fake.

use super::config::{BridgeConfig, BusRule, CloudRule, MAX_RULES, Transform};
use crate::knx::address::GroupAddress;
use crate::knx::{BusDriver, KnxTransport, Telegram};
use crate::network::Link;
use crate::network::application::mqtt::topic::matches;
use crate::network::application::mqtt::{Broker, Message, MqttTransport};
use crate::network::error::{PublishError, SendError, ValidationError};
use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Where bus-to-cloud documents go.
pub trait DocumentPublisher {
    /// Publishes a serializable document.
    fn publish<T: Serialize + ?Sized>(
        &mut self,
        topic: &str,
        document: &T,
        retained: bool,
    ) -> Result<(), PublishError>;
}

/// Where cloud-to-bus payloads go.
pub trait TelegramSink {
    /// Writes a payload to a group address.
    fn send_telegram(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), SendError>;
}

impl<B: Broker, L: Link, H, const N: usize> DocumentPublisher for MqttTransport<'_, B, L, H, N> {
    fn publish<T: Serialize + ?Sized>(
        &mut self,
        topic: &str,
        document: &T,
        retained: bool,
    ) -> Result<(), PublishError> {
        MqttTransport::publish(self, topic, document, retained)
    }
}

impl<D: BusDriver, H, const N: usize> TelegramSink for KnxTransport<D, H, N> {
    fn send_telegram(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), SendError> {
        KnxTransport::send_telegram(self, address, payload)
    }
}

/// Document published for a bus telegram.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct Telemetry {
    /// Destination address of the telegram, as `main/middle/sub`.
    #[serde(rename = "groupAddress")]
    pub group_address: GroupAddress,
    /// First payload byte.
    pub value: u8,
}

/// The part of a command document the bridge reads.
#[derive(Debug, Deserialize)]
struct Command {
    value: i64,
}

impl Transform {
    /// Builds the 1-byte bus payload for a command value.
    pub fn apply(self, value: i64) -> Result<[u8; 1], ValidationError> {
        match self {
            Transform::Raw => u8::try_from(value)
                .map(|byte| [byte])
                .map_err(|_| ValidationError::ValueOutOfRange(value)),
            Transform::Switch => Ok([u8::from(value != 0)]),
        }
    }
}

/// The bidirectional rule table.
#[derive(Debug, Clone)]
pub struct Translator<'a> {
    bus_rules: Vec<BusRule<'a>, MAX_RULES>,
    cloud_rules: Vec<CloudRule<'a>, MAX_RULES>,
}

impl<'a> Translator<'a> {
    /// Takes the rule tables from a configuration.
    pub fn new(config: &BridgeConfig<'a>) -> Self {
        Self {
            bus_rules: config.bus_rules.clone(),
            cloud_rules: config.cloud_rules.clone(),
        }
    }

    /// Topics the cloud rules listen on, in rule order.
    pub fn command_topics(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.cloud_rules.iter().map(|rule| rule.topic)
    }

    /// Publishes the telemetry document for `telegram` under every matching
    /// bus rule. Returns how many documents were published.
    pub fn on_telegram<P: DocumentPublisher + ?Sized>(
        &self,
        telegram: &Telegram<'_>,
        publisher: &mut P,
    ) -> Result<usize, ValidationError> {
        let Some(&value) = telegram.payload.first() else {
            warn!("Ignoring telegram to {} without payload", telegram.destination);
            return Err(ValidationError::EmptyTelegram);
        };
        let document = Telemetry {
            group_address: telegram.destination,
            value,
        };
        let mut published = 0;
        for rule in self.bus_rules.iter().filter(|r| r.source.matches(telegram.destination)) {
            match publisher.publish(rule.topic, &document, rule.retained) {
                Ok(()) => {
                    published += 1;
                    info!(
                        "KNX->MQTT: {} value {} forwarded to {}",
                        telegram.destination, value, rule.topic
                    );
                }
                Err(e) => {
                    warn!("KNX->MQTT: forwarding {} to {} failed: {}", telegram.destination, rule.topic, e);
                }
            }
        }
        Ok(published)
    }

    /// Writes the command in `message` to the bus under every cloud rule
    /// whose topic matches. Returns how many telegrams were sent.
    ///
    /// A message no rule listens on is not an error and yields `Ok(0)`. Each
    /// rule is applied on its own, so a value one rule rejects still reaches
    /// the others; the first rejection is returned only if nothing was sent.
    pub fn on_message<S: TelegramSink + ?Sized>(
        &self,
        message: &Message<'_>,
        sink: &mut S,
    ) -> Result<usize, ValidationError> {
        let mut rules = self
            .cloud_rules
            .iter()
            .filter(|rule| matches(rule.topic, message.topic))
            .peekable();
        if rules.peek().is_none() {
            return Ok(0);
        }
        let command: Command = message.document.get().map_err(|_| {
            warn!("Command on {} has no integer 'value' field", message.topic);
            ValidationError::MissingValue
        })?;

        let mut sent = 0;
        let mut rejected = None;
        for rule in rules {
            let payload = match rule.transform.apply(command.value) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Command on {} rejected for {}: {}", message.topic, rule.target, e);
                    rejected.get_or_insert(e);
                    continue;
                }
            };
            match sink.send_telegram(rule.target, &payload) {
                Ok(()) => {
                    sent += 1;
                    info!("MQTT->KNX: sent value {} to {}", payload[0], rule.target);
                }
                Err(e) => {
                    warn!("MQTT->KNX: sending to {} failed: {}", rule.target, e);
                }
            }
        }
        match rejected {
            Some(e) if sent == 0 => Err(e),
            _ => Ok(sent),
        }
    }
}
