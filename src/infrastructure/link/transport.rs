//! Link Transport
//!
//! Owns the connection to a single nearby accessory: scan, adopt the first
//! candidate, connect, resolve the transfer service and its two
//! characteristics, subscribe, and move raw bytes in both directions. Message
//! semantics live one layer up; this module forwards payloads unchanged.
//!
//! All mutation happens from [`LinkTransport::handle_event`], which the
//! owning task drives from the radio's event channel, so no locking is
//! needed around the tracked-accessory state.

use crate::domain::models::ConnectionState;
use crate::infrastructure::link::protocol::{self, hex_dump};
use crate::infrastructure::link::radio::{
    AuthorizationStatus, CharacteristicId, PeripheralId, Radio, RadioEvent, RadioState, ServiceId,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Byte-level transport failures surfaced to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no connected accessory to write to")]
    NoPeripheral,
}

/// Events the transport reports upward to the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Link established; carries the accessory's advertised name.
    Connected { accessory: String },
    Disconnected,
    /// Raw notify payload, forwarded without interpretation.
    Data { bytes: Vec<u8>, accessory: String },
}

/// Configuration for the link state machine.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub service_uuid: String,
    pub write_char_uuid: String,
    pub notify_char_uuid: String,
    /// Reconnect attempts allowed before scanning goes quiescent.
    pub max_connection_iterations: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            service_uuid: protocol::SERVICE_UUID.to_string(),
            write_char_uuid: protocol::WRITE_CHAR_UUID.to_string(),
            notify_char_uuid: protocol::NOTIFY_CHAR_UUID.to_string(),
            max_connection_iterations: 5,
        }
    }
}

/// The one accessory the transport is willing to talk to.
#[derive(Debug, Clone)]
struct TrackedAccessory {
    peripheral: PeripheralId,
    name: String,
}

/// Connection state machine over a [`Radio`] backend.
pub struct LinkTransport<R: Radio> {
    radio: R,
    config: LinkConfig,
    events: mpsc::UnboundedSender<LinkEvent>,

    state: ConnectionState,
    radio_ready: bool,
    start_when_ready: bool,

    tracked: Option<TrackedAccessory>,
    write_characteristic: Option<CharacteristicId>,
    notify_characteristic: Option<CharacteristicId>,
    subscribed: bool,

    // Diagnostic counters only; never drive behavior except the retry gate.
    writes_completed: u64,
    connection_iterations: u32,
}

impl<R: Radio> LinkTransport<R> {
    pub fn new(radio: R, config: LinkConfig, events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self {
            radio,
            config,
            events,
            state: ConnectionState::Idle,
            radio_ready: false,
            start_when_ready: false,
            tracked: None,
            write_characteristic: None,
            notify_characteristic: None,
            subscribed: false,
            writes_completed: 0,
            connection_iterations: 0,
        }
    }

    /// Begin (or re-arm) the scan for an accessory. If the radio has not yet
    /// reported powered-on, the request is latched and honored once it does.
    /// Idempotent; also resets the reconnect budget.
    pub fn start(&mut self) {
        self.connection_iterations = 0;
        if self.radio_ready {
            self.begin_scan();
        } else {
            info!("radio not ready, scan deferred until power-on");
            self.start_when_ready = true;
        }
    }

    /// Write `bytes` to the accessory, fragmenting to the negotiated MTU and
    /// preserving byte order. Each fragment is an acknowledged write.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let (peripheral, characteristic) = match (&self.tracked, self.write_characteristic) {
            (Some(tracked), Some(characteristic)) => (tracked.peripheral, characteristic),
            _ => return Err(TransportError::NoPeripheral),
        };

        let mtu = self.radio.max_write_len(peripheral).max(1);
        for fragment in bytes.chunks(mtu) {
            debug!("writing {} bytes: {}", fragment.len(), hex_dump(fragment));
            self.radio.write(peripheral, characteristic, fragment);
            self.writes_completed += 1;
        }
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Acknowledged writes issued since the last connect (diagnostic).
    pub fn writes_completed(&self) -> u64 {
        self.writes_completed
    }

    /// Connections established since the last `start()` (diagnostic).
    pub fn connection_iterations(&self) -> u32 {
        self.connection_iterations
    }

    /// Feed one radio callback through the state machine.
    pub fn handle_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::StateChanged(state) => self.on_radio_state(state),
            RadioEvent::PeripheralDiscovered { peripheral, name, rssi } => {
                self.on_discovered(peripheral, name, rssi)
            }
            RadioEvent::Connected { peripheral } => self.on_connected(peripheral),
            RadioEvent::ConnectFailed { peripheral, reason } => {
                self.on_connect_failed(peripheral, &reason)
            }
            RadioEvent::ServicesDiscovered { peripheral, services } => {
                self.on_services_discovered(peripheral, services)
            }
            RadioEvent::ServiceDiscoveryFailed { reason, .. } => {
                error!("service discovery error: {reason}");
                self.cleanup();
            }
            RadioEvent::ServiceInvalidated { peripheral, uuid } => {
                self.on_service_invalidated(peripheral, &uuid)
            }
            RadioEvent::CharacteristicDiscovered {
                peripheral,
                characteristic,
                uuid,
                ..
            } => self.on_characteristic_discovered(peripheral, characteristic, &uuid),
            RadioEvent::CharacteristicDiscoveryFailed { reason, .. } => {
                error!("characteristic discovery error: {reason}");
                self.cleanup();
            }
            RadioEvent::NotificationStateChanged {
                characteristic,
                notifying,
            } => self.on_notification_state(characteristic, notifying),
            RadioEvent::ValueChanged { bytes, .. } => self.on_value_changed(bytes),
            RadioEvent::Disconnected { peripheral } => self.on_disconnected(peripheral),
        }
    }

    fn begin_scan(&mut self) {
        if self.tracked.is_some() || self.state == ConnectionState::Scanning {
            return;
        }
        info!("scanning for accessories advertising {}", self.config.service_uuid);
        self.radio.scan(&self.config.service_uuid);
        self.state = ConnectionState::Scanning;
    }

    fn on_radio_state(&mut self, state: RadioState) {
        match state {
            RadioState::PoweredOn => {
                info!("radio powered on");
                self.radio_ready = true;
                if self.start_when_ready {
                    self.start_when_ready = false;
                    self.begin_scan();
                }
            }
            RadioState::PoweredOff => {
                error!("radio is powered off");
                self.radio_ready = false;
            }
            RadioState::Resetting => {
                error!("radio is resetting");
                self.radio_ready = false;
            }
            RadioState::Unauthorized(status) => {
                self.radio_ready = false;
                match status {
                    AuthorizationStatus::Denied => error!("user denied radio access"),
                    AuthorizationStatus::Restricted => error!("radio access is restricted"),
                    AuthorizationStatus::Unknown => error!("unexpected radio authorization"),
                }
            }
            RadioState::Unsupported => {
                error!("radio is not supported on this device");
                self.radio_ready = false;
            }
            RadioState::Unknown => {
                error!("radio state unknown");
                self.radio_ready = false;
            }
        }
    }

    fn on_discovered(&mut self, peripheral: PeripheralId, name: Option<String>, rssi: i16) {
        match &self.tracked {
            // Re-advertisement of the accessory we already track.
            Some(tracked) if tracked.peripheral == peripheral => {}
            // Single-accessory policy: one candidate at a time.
            Some(tracked) => {
                debug!(
                    "ignoring peripheral {peripheral}, already tracking {}",
                    tracked.peripheral
                );
            }
            None => {
                let name = name.unwrap_or_else(|| "Unknown".to_string());
                info!("discovered '{name}' (peripheral {peripheral}, rssi {rssi}), connecting");
                self.tracked = Some(TrackedAccessory { peripheral, name });
                self.radio.stop_scan();
                self.radio.connect(peripheral);
                self.state = ConnectionState::Connecting;
            }
        }
    }

    fn on_connect_failed(&mut self, peripheral: PeripheralId, reason: &str) {
        match &self.tracked {
            Some(tracked) if tracked.peripheral == peripheral => {}
            _ => return,
        }
        error!("failed to connect to peripheral {peripheral}: {reason}");
        self.cleanup();
        // No connection was established, so the radio will not report a
        // disconnect for this peripheral; take the retry path directly.
        self.on_disconnected(peripheral);
    }

    fn on_connected(&mut self, peripheral: PeripheralId) {
        let Some(tracked) = self.tracked.clone() else {
            warn!("connect callback for untracked peripheral {peripheral}");
            return;
        };
        info!("accessory '{}' connected", tracked.name);

        self.connection_iterations += 1;
        self.writes_completed = 0;

        let _ = self.events.send(LinkEvent::Connected {
            accessory: tracked.name,
        });

        self.radio
            .discover_services(peripheral, &self.config.service_uuid);
        self.state = ConnectionState::DiscoveringServices;
    }

    fn on_services_discovered(&mut self, peripheral: PeripheralId, services: Vec<ServiceId>) {
        if self.tracked.is_none() {
            return;
        }
        info!("discovered {} service(s), resolving characteristics", services.len());
        self.state = ConnectionState::DiscoveringCharacteristics;
        let uuids = [
            self.config.write_char_uuid.clone(),
            self.config.notify_char_uuid.clone(),
        ];
        for service in services {
            self.radio.discover_characteristics(
                peripheral,
                service,
                &[uuids[0].as_str(), uuids[1].as_str()],
            );
        }
    }

    fn on_service_invalidated(&mut self, peripheral: PeripheralId, uuid: &str) {
        if !uuid.eq_ignore_ascii_case(&self.config.service_uuid) {
            return;
        }
        match &self.tracked {
            Some(tracked) if tracked.peripheral == peripheral => {
                // Re-discover rather than disconnect; the peripheral is
                // still with us, only its service table changed.
                error!("transfer service invalidated, re-discovering services");
                self.write_characteristic = None;
                self.notify_characteristic = None;
                self.subscribed = false;
                self.radio
                    .discover_services(peripheral, &self.config.service_uuid);
                self.state = ConnectionState::DiscoveringServices;
            }
            _ => {}
        }
    }

    fn on_characteristic_discovered(
        &mut self,
        peripheral: PeripheralId,
        characteristic: CharacteristicId,
        uuid: &str,
    ) {
        if uuid.eq_ignore_ascii_case(&self.config.write_char_uuid) {
            // Outbound-only; stored, never subscribed.
            info!("resolved write characteristic");
            self.write_characteristic = Some(characteristic);
        } else if uuid.eq_ignore_ascii_case(&self.config.notify_char_uuid) {
            info!("resolved notify characteristic, subscribing");
            self.notify_characteristic = Some(characteristic);
            self.radio.set_notify(peripheral, characteristic, true);
        }
    }

    fn on_notification_state(&mut self, characteristic: CharacteristicId, notifying: bool) {
        if notifying {
            if self.notify_characteristic == Some(characteristic) {
                info!("notifications active, link is data-ready");
                self.subscribed = true;
                self.state = ConnectionState::Subscribed;
            }
        } else {
            // The accessory stopped notifying on its own; drop the link and
            // let the disconnect path decide whether to rescan.
            info!("notifications stopped, disconnecting");
            self.cleanup();
        }
    }

    fn on_value_changed(&mut self, bytes: Vec<u8>) {
        let Some(tracked) = &self.tracked else { return };
        debug!("received {} bytes: {}", bytes.len(), hex_dump(&bytes));
        let _ = self.events.send(LinkEvent::Data {
            bytes,
            accessory: tracked.name.clone(),
        });
    }

    fn on_disconnected(&mut self, peripheral: PeripheralId) {
        match &self.tracked {
            Some(tracked) if tracked.peripheral == peripheral => {}
            _ => return,
        }
        info!("accessory disconnected");
        self.tracked = None;
        self.write_characteristic = None;
        self.notify_characteristic = None;
        self.subscribed = false;
        self.state = ConnectionState::Idle;

        let _ = self.events.send(LinkEvent::Disconnected);

        if self.connection_iterations < self.config.max_connection_iterations {
            self.begin_scan();
        } else {
            info!(
                "reconnect budget exhausted after {} attempts; call start() to resume",
                self.connection_iterations
            );
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Unsubscribe and release the connection. Safe to call in any state;
    /// a no-op when nothing is tracked.
    pub fn cleanup(&mut self) {
        let Some(tracked) = &self.tracked else { return };
        let peripheral = tracked.peripheral;
        if self.subscribed {
            if let Some(characteristic) = self.notify_characteristic {
                self.radio.set_notify(peripheral, characteristic, false);
            }
            self.subscribed = false;
        }
        self.radio.disconnect(peripheral);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum RadioCall {
        Scan(String),
        StopScan,
        Connect(PeripheralId),
        Disconnect(PeripheralId),
        DiscoverServices(PeripheralId, String),
        DiscoverCharacteristics(PeripheralId, u64),
        SetNotify(CharacteristicId, bool),
        Write(CharacteristicId, Vec<u8>),
    }

    struct MockRadio {
        calls: Vec<RadioCall>,
        mtu: usize,
    }

    impl MockRadio {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                mtu: 20,
            }
        }

        fn count(&self, f: impl Fn(&RadioCall) -> bool) -> usize {
            self.calls.iter().filter(|c| f(c)).count()
        }
    }

    impl Radio for MockRadio {
        fn scan(&mut self, service_uuid: &str) {
            self.calls.push(RadioCall::Scan(service_uuid.to_string()));
        }
        fn stop_scan(&mut self) {
            self.calls.push(RadioCall::StopScan);
        }
        fn connect(&mut self, peripheral: PeripheralId) {
            self.calls.push(RadioCall::Connect(peripheral));
        }
        fn disconnect(&mut self, peripheral: PeripheralId) {
            self.calls.push(RadioCall::Disconnect(peripheral));
        }
        fn discover_services(&mut self, peripheral: PeripheralId, service_uuid: &str) {
            self.calls
                .push(RadioCall::DiscoverServices(peripheral, service_uuid.to_string()));
        }
        fn discover_characteristics(
            &mut self,
            peripheral: PeripheralId,
            service: u64,
            _uuids: &[&str],
        ) {
            self.calls
                .push(RadioCall::DiscoverCharacteristics(peripheral, service));
        }
        fn set_notify(
            &mut self,
            _peripheral: PeripheralId,
            characteristic: CharacteristicId,
            enabled: bool,
        ) {
            self.calls.push(RadioCall::SetNotify(characteristic, enabled));
        }
        fn write(
            &mut self,
            _peripheral: PeripheralId,
            characteristic: CharacteristicId,
            bytes: &[u8],
        ) {
            self.calls
                .push(RadioCall::Write(characteristic, bytes.to_vec()));
        }
        fn max_write_len(&self, _peripheral: PeripheralId) -> usize {
            self.mtu
        }
    }

    const WRITE_CHAR: CharacteristicId = 11;
    const NOTIFY_CHAR: CharacteristicId = 12;

    fn transport() -> (
        LinkTransport<MockRadio>,
        mpsc::UnboundedReceiver<LinkEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            LinkTransport::new(MockRadio::new(), LinkConfig::default(), tx),
            rx,
        )
    }

    /// Drive a transport to the data-ready state with peripheral 1.
    fn subscribe(transport: &mut LinkTransport<MockRadio>) {
        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        transport.start();
        transport.handle_event(RadioEvent::PeripheralDiscovered {
            peripheral: 1,
            name: Some("UWB Beacon".to_string()),
            rssi: -40,
        });
        transport.handle_event(RadioEvent::Connected { peripheral: 1 });
        transport.handle_event(RadioEvent::ServicesDiscovered {
            peripheral: 1,
            services: vec![5],
        });
        transport.handle_event(RadioEvent::CharacteristicDiscovered {
            peripheral: 1,
            service: 5,
            characteristic: WRITE_CHAR,
            uuid: protocol::WRITE_CHAR_UUID.to_string(),
        });
        transport.handle_event(RadioEvent::CharacteristicDiscovered {
            peripheral: 1,
            service: 5,
            characteristic: NOTIFY_CHAR,
            uuid: protocol::NOTIFY_CHAR_UUID.to_string(),
        });
        transport.handle_event(RadioEvent::NotificationStateChanged {
            characteristic: NOTIFY_CHAR,
            notifying: true,
        });
    }

    #[test]
    fn start_is_latched_until_the_radio_powers_on() {
        let (mut transport, _rx) = transport();
        transport.start();
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::Scan(_))), 0);

        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::Scan(_))), 1);
        assert_eq!(transport.state(), ConnectionState::Scanning);
    }

    #[test]
    fn first_candidate_wins_and_the_second_is_ignored() {
        let (mut transport, _rx) = transport();
        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        transport.start();

        transport.handle_event(RadioEvent::PeripheralDiscovered {
            peripheral: 1,
            name: Some("First".to_string()),
            rssi: -40,
        });
        transport.handle_event(RadioEvent::PeripheralDiscovered {
            peripheral: 2,
            name: Some("Second".to_string()),
            rssi: -30,
        });

        assert_eq!(transport.radio.calls.iter().filter(|c| matches!(c, RadioCall::Connect(_))).count(), 1);
        assert!(transport.radio.calls.contains(&RadioCall::Connect(1)));
        assert_eq!(transport.tracked.as_ref().unwrap().name, "First");
    }

    #[test]
    fn rediscovery_of_the_tracked_candidate_is_a_no_op() {
        let (mut transport, _rx) = transport();
        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        transport.start();

        for _ in 0..3 {
            transport.handle_event(RadioEvent::PeripheralDiscovered {
                peripheral: 1,
                name: Some("Beacon".to_string()),
                rssi: -40,
            });
        }
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::Connect(_))), 1);
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::StopScan)), 1);
    }

    #[test]
    fn subscribe_flow_resolves_both_characteristics_but_notifies_on_one() {
        let (mut transport, mut rx) = transport();
        subscribe(&mut transport);

        assert_eq!(transport.state(), ConnectionState::Subscribed);
        assert_eq!(
            transport.radio.count(|c| matches!(c, RadioCall::SetNotify(_, true))),
            1
        );
        assert!(transport
            .radio
            .calls
            .contains(&RadioCall::SetNotify(NOTIFY_CHAR, true)));
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkEvent::Connected {
                accessory: "UWB Beacon".to_string()
            }
        );
    }

    #[test]
    fn send_without_a_connection_fails_with_no_peripheral() {
        let (mut transport, _rx) = transport();
        assert_eq!(transport.send(&[0xA]), Err(TransportError::NoPeripheral));
    }

    #[test]
    fn send_fragments_to_the_mtu_preserving_order() {
        let (mut transport, _rx) = transport();
        subscribe(&mut transport);
        transport.radio.mtu = 4;
        transport.radio.calls.clear();

        let payload: Vec<u8> = (0..10).collect();
        transport.send(&payload).unwrap();

        let written: Vec<Vec<u8>> = transport
            .radio
            .calls
            .iter()
            .filter_map(|c| match c {
                RadioCall::Write(ch, bytes) => {
                    assert_eq!(*ch, WRITE_CHAR);
                    Some(bytes.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|w| w.len() <= 4));
        assert_eq!(written.concat(), payload);
        assert_eq!(transport.writes_completed(), 3);
    }

    #[test]
    fn value_changes_are_forwarded_with_the_accessory_name() {
        let (mut transport, mut rx) = transport();
        subscribe(&mut transport);
        let _ = rx.try_recv(); // Connected

        transport.handle_event(RadioEvent::ValueChanged {
            characteristic: NOTIFY_CHAR,
            bytes: vec![0x2],
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            LinkEvent::Data {
                bytes: vec![0x2],
                accessory: "UWB Beacon".to_string()
            }
        );
    }

    #[test]
    fn notification_stop_tears_the_connection_down() {
        let (mut transport, _rx) = transport();
        subscribe(&mut transport);

        transport.handle_event(RadioEvent::NotificationStateChanged {
            characteristic: NOTIFY_CHAR,
            notifying: false,
        });
        // Unsubscribe first, then release the connection.
        let tail = &transport.radio.calls[transport.radio.calls.len() - 2..];
        assert_eq!(
            tail,
            [RadioCall::SetNotify(NOTIFY_CHAR, false), RadioCall::Disconnect(1)]
        );
    }

    #[test]
    fn connect_failure_drops_the_candidate_and_rescans() {
        let (mut transport, mut rx) = transport();
        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        transport.start();
        transport.handle_event(RadioEvent::PeripheralDiscovered {
            peripheral: 1,
            name: Some("Beacon".to_string()),
            rssi: -40,
        });
        transport.handle_event(RadioEvent::ConnectFailed {
            peripheral: 1,
            reason: "timed out".to_string(),
        });

        assert!(transport.tracked.is_none());
        assert_eq!(transport.state(), ConnectionState::Scanning);
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::Scan(_))), 2);
        assert_eq!(rx.try_recv().unwrap(), LinkEvent::Disconnected);

        // A fresh candidate can be adopted after the failure.
        transport.handle_event(RadioEvent::PeripheralDiscovered {
            peripheral: 2,
            name: None,
            rssi: -50,
        });
        assert!(transport.radio.calls.contains(&RadioCall::Connect(2)));
    }

    #[test]
    fn cleanup_is_idempotent_once_disconnected() {
        let (mut transport, _rx) = transport();
        subscribe(&mut transport);
        transport.handle_event(RadioEvent::Disconnected { peripheral: 1 });
        transport.radio.calls.clear();

        transport.cleanup();
        transport.handle_event(RadioEvent::ConnectFailed {
            peripheral: 1,
            reason: "stale".to_string(),
        });
        assert!(transport
            .radio
            .count(|c| matches!(c, RadioCall::Disconnect(_))) == 0);
    }

    #[test]
    fn service_invalidation_rediscover_instead_of_disconnecting() {
        let (mut transport, _rx) = transport();
        subscribe(&mut transport);

        transport.handle_event(RadioEvent::ServiceInvalidated {
            peripheral: 1,
            uuid: protocol::SERVICE_UUID.to_uppercase(),
        });
        assert_eq!(
            transport.radio.count(|c| matches!(c, RadioCall::DiscoverServices(..))),
            2
        );
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::Disconnect(_))), 0);
        assert_eq!(transport.state(), ConnectionState::DiscoveringServices);
    }

    #[test]
    fn disconnect_rescan_stops_at_the_retry_ceiling() {
        let (mut transport, _rx) = transport();
        transport.handle_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        transport.start();

        for _ in 0..5 {
            transport.handle_event(RadioEvent::PeripheralDiscovered {
                peripheral: 1,
                name: None,
                rssi: -50,
            });
            transport.handle_event(RadioEvent::Connected { peripheral: 1 });
            transport.handle_event(RadioEvent::Disconnected { peripheral: 1 });
        }

        // Initial scan plus one rescan after each of the first four drops.
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::Scan(_))), 5);
        assert_eq!(transport.state(), ConnectionState::Disconnected);

        // Scanning does not self-resume past the ceiling; start() re-arms.
        transport.start();
        assert_eq!(transport.radio.count(|c| matches!(c, RadioCall::Scan(_))), 6);
        assert_eq!(transport.connection_iterations(), 0);
    }

    #[test]
    fn connect_resets_the_write_counter() {
        let (mut transport, _rx) = transport();
        subscribe(&mut transport);
        transport.send(&[0xA]).unwrap();
        assert_eq!(transport.writes_completed(), 1);

        transport.handle_event(RadioEvent::Disconnected { peripheral: 1 });
        transport.handle_event(RadioEvent::PeripheralDiscovered {
            peripheral: 1,
            name: None,
            rssi: -50,
        });
        transport.handle_event(RadioEvent::Connected { peripheral: 1 });
        assert_eq!(transport.writes_completed(), 0);
        assert_eq!(transport.connection_iterations(), 2);
    }
}
