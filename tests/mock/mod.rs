#![allow(dead_code)]

use heapless::String as HString;
use heapless::Vec as HVec;
use knxbridge::knx::address::{GroupAddress, IndividualAddress};
use knxbridge::knx::{BusDriver, Telegram};
use knxbridge::network::Link;
use knxbridge::network::application::mqtt::{Broker, Options, PublishPacket, QoS};
use std::collections::VecDeque;
use std::net::IpAddr;

// -------------------------
// Broker Mock
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub client_id: String,
    pub keep_alive_seconds: u16,
    pub will_topic: Option<String>,
    pub will_payload: Option<String>,
    pub will_retain: bool,
}

#[derive(Debug, Default)]
pub struct MockBroker {
    /// Results handed out by successive `connect` calls; `Ok` once exhausted
    pub connect_results: VecDeque<Result<(), i8>>,
    pub sessions: Vec<Session>,
    pub connected: bool,
    pub published: Vec<Published>,
    pub subscribed: Vec<String>,
    pub unsubscribed: Vec<String>,
    pub inbox: VecDeque<PublishPacket>,
    pub fail_poll: bool,
    pub disconnects: usize,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker whose next `n` connection attempts fail with `code`.
    pub fn refusing(n: usize, code: i8) -> Self {
        Self {
            connect_results: std::iter::repeat_n(Err(code), n).collect(),
            ..Self::default()
        }
    }

    /// Simulates the session dying underneath the client.
    pub fn drop_connection(&mut self) {
        self.connected = false;
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.inbox.push_back(PublishPacket {
            topic: HString::try_from(topic).unwrap(),
            payload: HVec::from_slice(payload).unwrap(),
            retained: false,
        });
    }

    pub fn published_to(&self, topic: &str) -> Vec<&Published> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }
}

impl Broker for MockBroker {
    type Error = ();

    fn connect(&mut self, options: &Options<'_>) -> Result<(), i8> {
        self.connect_results.pop_front().unwrap_or(Ok(()))?;
        self.connected = true;
        self.sessions.push(Session {
            client_id: options.client_id.to_string(),
            keep_alive_seconds: options.keep_alive_seconds,
            will_topic: options.will.map(|w| w.topic.to_string()),
            will_payload: options
                .will
                .map(|w| String::from_utf8(w.payload.to_vec()).unwrap()),
            will_retain: options.will.is_some_and(|w| w.retain),
        });
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> Result<(), ()> {
        assert_eq!(qos, QoS::AtMostOnce);
        if !self.connected {
            return Err(());
        }
        self.published.push(Published {
            topic: topic.to_string(),
            payload: String::from_utf8(payload.to_vec()).unwrap(),
            retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, filter: &str, _qos: QoS) -> Result<(), ()> {
        self.subscribed.push(filter.to_string());
        Ok(())
    }

    fn unsubscribe(&mut self, filter: &str) -> Result<(), ()> {
        self.unsubscribed.push(filter.to_string());
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<PublishPacket>, ()> {
        if self.fail_poll {
            return Err(());
        }
        Ok(self.inbox.pop_front())
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.disconnects += 1;
    }
}

// -------------------------
// Link Mock
// -------------------------

#[derive(Debug)]
pub struct MockLink {
    pub up: bool,
    pub ip: Option<IpAddr>,
    pub resolutions: Vec<String>,
}

impl MockLink {
    pub fn up() -> Self {
        Self {
            up: true,
            ip: None,
            resolutions: Vec::new(),
        }
    }

    pub fn down() -> Self {
        Self {
            up: false,
            ..Self::up()
        }
    }
}

impl Link for MockLink {
    fn is_up(&mut self) -> bool {
        self.up
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.ip
    }

    fn resolve(&mut self, host: &str) -> Option<IpAddr> {
        self.resolutions.push(host.to_string());
        None
    }
}

// -------------------------
// Bus Driver Mock
// -------------------------

#[derive(Debug, Default)]
pub struct MockDriver {
    /// Number of upcoming `start` calls that fail
    pub start_failures: usize,
    pub start_attempts: usize,
    pub started_as: Option<IndividualAddress>,
    pub written: Vec<(GroupAddress, Vec<u8>)>,
    pub inbox: VecDeque<(GroupAddress, Vec<u8>)>,
    current: Vec<u8>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose first `n` start attempts fail.
    pub fn failing_start(n: usize) -> Self {
        Self {
            start_failures: n,
            ..Self::default()
        }
    }

    pub fn receive_from_bus(&mut self, address: &str, payload: &[u8]) {
        self.inbox
            .push_back((address.parse().unwrap(), payload.to_vec()));
    }
}

impl BusDriver for MockDriver {
    type Error = ();

    fn start(&mut self, address: IndividualAddress) -> Result<(), ()> {
        self.start_attempts += 1;
        if self.start_failures > 0 {
            self.start_failures -= 1;
            return Err(());
        }
        self.started_as = Some(address);
        Ok(())
    }

    fn write_group(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), ()> {
        self.written.push((address, payload.to_vec()));
        Ok(())
    }

    fn receive(&mut self) -> Option<Telegram<'_>> {
        let (destination, payload) = self.inbox.pop_front()?;
        self.current = payload;
        Some(Telegram {
            destination,
            payload: &self.current,
        })
    }
}
