//! Integration tests for the connection manager over the mock transport

use rc_remote::transport::MockAdapter;
use rc_remote::{ConnectionEvent, ConnectionManager, Device, LINK_LOST};
use std::sync::{Arc, Mutex};

fn hc05() -> Device {
    Device::new(Some("HC-05"), "00:11:22:33:44:55", true)
}

fn rc_car() -> Device {
    Device::new(Some("RC-CAR"), "98:D3:31:F5:2A:10", false)
}

fn record(manager: &ConnectionManager<MockAdapter>) -> Arc<Mutex<Vec<ConnectionEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    manager.add_listener(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

#[test]
fn test_connect_then_disconnect_scenario() {
    let manager = ConnectionManager::new(MockAdapter::new());
    let events = record(&manager);

    assert!(manager.connect(&hc05()));
    assert!(manager.is_connected());
    assert_eq!(*events.lock().unwrap(), vec![ConnectionEvent::Connected(hc05())]);

    assert!(manager.disconnect());
    assert!(!manager.is_connected());
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&ConnectionEvent::Disconnected("HC-05".to_string()))
    );
}

#[test]
fn test_disconnect_without_connection() {
    let manager = ConnectionManager::new(MockAdapter::new());
    let events = record(&manager);

    assert!(!manager.disconnect());
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_send_without_connection_is_silent() {
    let adapter = MockAdapter::new();
    let manager = ConnectionManager::new(adapter.clone());
    let events = record(&manager);

    assert!(!manager.send_command("F"));
    assert!(events.lock().unwrap().is_empty());
    assert!(adapter.writes().is_empty());
}

#[test]
fn test_send_writes_to_the_active_link() {
    let adapter = MockAdapter::new();
    let manager = ConnectionManager::new(adapter.clone());
    assert!(manager.connect(&hc05()));

    assert!(manager.send_command("F"));
    assert!(manager.send_command("S"));
    assert_eq!(
        adapter.writes(),
        vec![
            (hc05().address, "F".to_string()),
            (hc05().address, "S".to_string()),
        ]
    );
}

#[test]
fn test_send_on_closed_link_reports_link_lost_once() {
    let adapter = MockAdapter::new();
    let manager = ConnectionManager::new(adapter.clone());
    let events = record(&manager);
    assert!(manager.connect(&hc05()));

    adapter.drop_link(&hc05().address);
    assert!(!manager.is_connected());

    assert!(!manager.send_command("F"));
    assert!(manager.connected_device().is_none());
    assert!(!manager.send_command("F"));

    let disconnects: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, ConnectionEvent::Disconnected(_)))
        .cloned()
        .collect();
    assert_eq!(disconnects, vec![ConnectionEvent::Disconnected(LINK_LOST.to_string())]);
}

#[test]
fn test_write_error_keeps_connection_and_emits_nothing() {
    let adapter = MockAdapter::new();
    let manager = ConnectionManager::new(adapter.clone());
    let events = record(&manager);
    assert!(manager.connect(&hc05()));

    adapter.set_fail_writes(true);
    assert!(!manager.send_command("F"));
    assert!(manager.is_connected());
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn test_connect_failure_emits_error() {
    let adapter = MockAdapter::new();
    adapter.set_unreachable(&rc_car().address);
    let manager = ConnectionManager::new(adapter);
    let events = record(&manager);

    assert!(!manager.connect(&rc_car()));
    assert!(!manager.is_connected());

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ConnectionEvent::Error(_)));
}

#[test]
fn test_second_connect_replaces_the_first() {
    let adapter = MockAdapter::new();
    let manager = ConnectionManager::new(adapter.clone());
    let events = record(&manager);

    assert!(manager.connect(&hc05()));
    assert!(manager.connect(&rc_car()));

    assert_eq!(manager.connected_device(), Some(rc_car()));
    assert!(!adapter.is_link_open(&hc05().address));
    assert!(adapter.is_link_open(&rc_car().address));
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            ConnectionEvent::Connected(hc05()),
            ConnectionEvent::Disconnected("HC-05".to_string()),
            ConnectionEvent::Connected(rc_car()),
        ]
    );
}

#[test]
fn test_scan_lists_paired_first_without_duplicates() {
    let duplicate = Device::new(Some("HC-05 (seen)"), "00:11:22:33:44:55", false);
    let unnamed = Device::new(None, "5C:F3:70:8B:11:02", false);
    let adapter = MockAdapter::new()
        .with_bonded(hc05())
        .with_discovered(rc_car())
        .with_discovered(duplicate)
        .with_discovered(unnamed.clone());
    let manager = ConnectionManager::new(adapter);

    assert_eq!(manager.scan_devices(), vec![hc05(), rc_car(), unnamed]);
}

#[test]
fn test_scan_failure_returns_empty_list() {
    let adapter = MockAdapter::new().with_bonded(hc05());
    adapter.set_fail_scan(true);
    let manager = ConnectionManager::new(adapter);

    assert!(manager.scan_devices().is_empty());
}

#[test]
fn test_removed_listener_stops_receiving() {
    let manager = ConnectionManager::new(MockAdapter::new());
    let kept = record(&manager);

    let removed = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&removed);
    let id = manager.add_listener(move |_| *counter.lock().unwrap() += 1);
    assert!(manager.remove_listener(id));

    manager.connect(&hc05());
    assert_eq!(*removed.lock().unwrap(), 0);
    assert_eq!(kept.lock().unwrap().len(), 1);
}

#[test]
fn test_listener_can_query_manager_during_event() {
    let manager = Arc::new(ConnectionManager::new(MockAdapter::new()));
    let seen = Arc::new(Mutex::new(None));

    let inner = Arc::clone(&manager);
    let slot = Arc::clone(&seen);
    manager.add_listener(move |_| *slot.lock().unwrap() = Some(inner.is_connected()));

    manager.connect(&hc05());
    assert_eq!(*seen.lock().unwrap(), Some(true));
}
