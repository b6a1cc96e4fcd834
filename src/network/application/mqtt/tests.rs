use super::topic::{is_wildcard, matches, validate_filter};
use super::*;
use crate::network::error::{ParseError, SubscribeError};
use serde::Deserialize;

#[test]
fn test_exact_filter_matches_only_itself() {
    assert!(matches("control/bus", "control/bus"));
    assert!(!matches("control/bus", "control/bus/1"));
    assert!(!matches("control/bus", "control"));
}

#[test]
fn test_single_level_wildcard() {
    assert!(matches("control/+", "control/bus"));
    assert!(matches("+/bus", "status/bus"));
    assert!(!matches("control/+", "control/bus/1"));
    assert!(!matches("control/+", "control"));
}

#[test]
fn test_multi_level_wildcard() {
    assert!(matches("#", "status/bus"));
    assert!(matches("control/#", "control/bus/1/2"));
    assert!(matches("control/#", "control"));
    assert!(!matches("control/#", "status/bus"));
}

#[test]
fn test_system_topics_skip_leading_wildcards() {
    assert!(!matches("#", "$SYS/broker/uptime"));
    assert!(!matches("+/broker/uptime", "$SYS/broker/uptime"));
    assert!(matches("$SYS/#", "$SYS/broker/uptime"));
}

#[test]
fn test_filter_validation() {
    assert_eq!(validate_filter("control/bus"), Ok(()));
    assert_eq!(validate_filter("a/+/b/#"), Ok(()));
    assert_eq!(validate_filter(""), Err(SubscribeError::InvalidFilter));
    assert_eq!(validate_filter("a/#/b"), Err(SubscribeError::InvalidFilter));
    assert_eq!(validate_filter("a/b#"), Err(SubscribeError::InvalidFilter));
    assert_eq!(validate_filter("a/+b"), Err(SubscribeError::InvalidFilter));

    let long = [b'a'; MAX_TOPIC_LEN + 1];
    let long = core::str::from_utf8(&long).unwrap();
    assert_eq!(validate_filter(long), Err(SubscribeError::InvalidFilter));
}

#[test]
fn test_wildcard_detection() {
    assert!(is_wildcard("#"));
    assert!(is_wildcard("a/+/c"));
    assert!(!is_wildcard("a/b/c"));
}

#[test]
fn test_table_duplicate_filter_replaces_handler() {
    let mut table: SubscriptionTable<u8, 4> = SubscriptionTable::new();
    let first = table.insert("control/bus", 1).unwrap();
    let second = table.insert("control/bus", 2).unwrap();

    assert_eq!(first, second);
    assert_eq!(table.len(), 1);
    assert_eq!(table.handler_mut(first), Some(&mut 2));
}

#[test]
fn test_table_full() {
    let mut table: SubscriptionTable<(), 2> = SubscriptionTable::new();
    table.insert("a", ()).unwrap();
    table.insert("b", ()).unwrap();
    assert_eq!(table.insert("c", ()), Err(SubscribeError::TableFull));
    // Replacing an existing filter still works on a full table
    assert!(table.insert("a", ()).is_ok());
}

#[test]
fn test_table_remove() {
    let mut table: SubscriptionTable<(), 4> = SubscriptionTable::new();
    let a = table.insert("a/#", ()).unwrap();
    let b = table.insert("b", ()).unwrap();

    assert_eq!(table.remove(a).unwrap().as_str(), "a/#");
    assert!(!table.contains(a));
    assert!(table.contains(b));
    assert_eq!(table.remove(a), Err(SubscribeError::UnknownSubscription));
    assert_eq!(table.filters().collect::<std::vec::Vec<_>>(), ["b"]);
}

#[test]
fn test_exact_match_beats_wildcard() {
    let mut table: SubscriptionTable<(), 4> = SubscriptionTable::new();
    let wildcard = table.insert("control/#", ()).unwrap();
    let exact = table.insert("control/bus", ()).unwrap();

    assert_eq!(table.best_match("control/bus"), Some(exact));
    assert_eq!(table.best_match("control/light"), Some(wildcard));
    assert_eq!(table.best_match("status/bus"), None);
}

#[test]
fn test_first_registered_wildcard_wins() {
    let mut table: SubscriptionTable<(), 4> = SubscriptionTable::new();
    let hash = table.insert("#", ()).unwrap();
    let _plus = table.insert("control/+", ()).unwrap();

    assert_eq!(table.best_match("control/bus"), Some(hash));
    assert_eq!(table.filter(hash), Some("#"));
}

#[derive(Deserialize)]
struct Command {
    value: i64,
}

#[test]
fn test_document_parse_and_get() {
    let document = Document::parse(br#"{"value":7,"extra":[1,{"a":null}]}"#).unwrap();
    let command: Command = document.get().unwrap();
    assert_eq!(command.value, 7);
    assert_eq!(document.as_str(), r#"{"value":7,"extra":[1,{"a":null}]}"#);
}

#[test]
fn test_document_rejects_non_objects() {
    assert_eq!(Document::parse(b"not json"), Err(ParseError::Json));
    assert_eq!(Document::parse(b"[1,2]"), Err(ParseError::Json));
    assert_eq!(Document::parse(b"42"), Err(ParseError::Json));
    assert_eq!(Document::parse(&[0xff, 0xfe]), Err(ParseError::Utf8));
}

#[test]
fn test_document_wrong_field_type() {
    let document = Document::parse(br#"{"value":"on"}"#).unwrap();
    assert!(document.get::<Command>().is_err());

    let document = Document::parse(b"{}").unwrap();
    assert!(document.get::<Command>().is_err());
}

#[test]
fn test_default_settings() {
    let settings = MqttSettings::default();
    assert_eq!(settings.keep_alive_seconds, 15);
    assert_eq!(settings.presence_topic, "status/bridge");
    assert_eq!(settings.link_poll_interval, core::time::Duration::from_millis(500));
}

#[test]
fn test_counters_wrap_instead_of_overflowing() {
    let mut stats = Stats {
        malformed: u32::MAX,
        ..Default::default()
    };
    crate::network::bump(&mut stats.malformed);
    crate::network::bump(&mut stats.delivered);
    assert_eq!(stats.malformed, 0);
    assert_eq!(stats.delivered, 1);
}
