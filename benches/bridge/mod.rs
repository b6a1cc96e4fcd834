use criterion::{Criterion, Throughput};
use std::hint::black_box;
use heapless::String as HString;
use heapless::Vec as HVec;
use knxbridge::bridge::config::BridgeConfig;
use knxbridge::bridge::rules::{DocumentPublisher, TelegramSink, Translator};
use knxbridge::knx::Telegram;
use knxbridge::knx::address::GroupAddress;
use knxbridge::network::application::mqtt::{
    Broker, Document, Message, MqttSettings, MqttTransport, Options, PublishPacket, QoS,
};
use knxbridge::network::error::{PublishError, SendError};
use knxbridge::network::{Instant, Link};
use serde::Serialize;

/// Serializes like the real transport, then throws the bytes away.
struct NullPublisher;

impl DocumentPublisher for NullPublisher {
    fn publish<T: Serialize + ?Sized>(
        &mut self,
        topic: &str,
        document: &T,
        _retained: bool,
    ) -> Result<(), PublishError> {
        let mut buf = [0u8; 128];
        let len = serde_json_core::to_slice(document, &mut buf).map_err(|_| PublishError::Serialize)?;
        black_box((topic, &buf[..len]));
        Ok(())
    }
}

struct NullBus;

impl TelegramSink for NullBus {
    fn send_telegram(&mut self, address: GroupAddress, payload: &[u8]) -> Result<(), SendError> {
        black_box((address, payload));
        Ok(())
    }
}

/// A broker that always has the same command waiting.
struct LoopbackBroker {
    packet: PublishPacket,
}

impl Broker for LoopbackBroker {
    type Error = ();

    fn connect(&mut self, _options: &Options<'_>) -> Result<(), i8> {
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        true
    }

    fn publish(&mut self, _topic: &str, _payload: &[u8], _qos: QoS, _retain: bool) -> Result<(), ()> {
        Ok(())
    }

    fn subscribe(&mut self, _filter: &str, _qos: QoS) -> Result<(), ()> {
        Ok(())
    }

    fn unsubscribe(&mut self, _filter: &str) -> Result<(), ()> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<PublishPacket>, ()> {
        Ok(Some(self.packet.clone()))
    }

    fn disconnect(&mut self) {}
}

struct AlwaysUp;

impl Link for AlwaysUp {
    fn is_up(&mut self) -> bool {
        true
    }
}

pub fn bench_translate_telegram(c: &mut Criterion) {
    let config = BridgeConfig::default();
    let translator = Translator::new(&config);
    let telegram = Telegram {
        destination: "1/0/7".parse().expect("valid address"),
        payload: &[1],
    };

    let mut group = c.benchmark_group("translate_telegram");
    group.throughput(Throughput::Elements(1));
    group.bench_function("translate_telegram", |b| {
        b.iter(|| translator.on_telegram(black_box(&telegram), &mut NullPublisher))
    });
    group.finish();
}

pub fn bench_translate_command(c: &mut Criterion) {
    let config = BridgeConfig::default();
    let translator = Translator::new(&config);
    let payload = br#"{"value":7,"source":"dashboard"}"#;

    let mut group = c.benchmark_group("translate_command");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("translate_command", |b| {
        b.iter(|| {
            let message = Message {
                topic: "control/bus",
                document: Document::parse(black_box(payload)).expect("valid document"),
                retained: false,
            };
            translator.on_message(&message, &mut NullBus)
        })
    });
    group.finish();
}

pub fn bench_dispatch(c: &mut Criterion) {
    fn count(seen: &mut u64, _message: &Message<'_>) {
        *seen += 1;
    }

    let broker = LoopbackBroker {
        packet: PublishPacket {
            topic: HString::try_from("control/bus").expect("topic fits"),
            payload: HVec::from_slice(br#"{"value":7}"#).expect("payload fits"),
            retained: false,
        },
    };
    let mut mqtt: MqttTransport<_, _, fn(&mut u64, &Message<'_>), 4> =
        MqttTransport::new(broker, AlwaysUp, MqttSettings::default());
    mqtt.subscribe("#", count).expect("valid filter");
    mqtt.subscribe("status/+", count).expect("valid filter");
    mqtt.subscribe("control/bus", count).expect("valid filter");
    mqtt.connect(Instant::from_millis(0)).expect("loopback connects");

    let mut seen = 0u64;
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(
        knxbridge::network::application::mqtt::MAX_DELIVERIES_PER_TICK as u64,
    ));
    group.bench_function("dispatch", |b| {
        b.iter(|| mqtt.tick(Instant::from_millis(1), &mut seen))
    });
    group.finish();
    black_box(seen);
}
