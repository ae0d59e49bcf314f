//! Accessory Service
//!
//! Top-level coordinator owning the session event loop. Radio callbacks feed
//! the link transport, link and engine events feed the orchestrator, and the
//! orchestrator's outbound messages are encoded and written back over the
//! link. One task mutates everything, so the components need no locks.

use crate::domain::models::{AppEvent, StatusMessage};
use crate::infrastructure::link::protocol::Message;
use crate::infrastructure::link::radio::{Radio, RadioEvent};
use crate::infrastructure::link::transport::{LinkConfig, LinkEvent, LinkTransport};
use crate::ranging::engine::{EngineEvent, RangingEngine};
use crate::ranging::orchestrator::RangingOrchestrator;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Commands the embedding application can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin scanning for an accessory (or re-arm after the retry budget).
    Start,
    /// Kick off the ranging configuration handshake.
    RequestRanging,
    Shutdown,
}

/// The session event loop.
pub struct AccessoryService<R: Radio, E: RangingEngine> {
    transport: LinkTransport<R>,
    orchestrator: RangingOrchestrator<E>,
    radio_events: mpsc::UnboundedReceiver<RadioEvent>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    link_events: mpsc::UnboundedReceiver<LinkEvent>,
    outbound: mpsc::UnboundedReceiver<Message>,
    commands: mpsc::UnboundedReceiver<Command>,
    app_events: mpsc::UnboundedSender<AppEvent>,
}

impl<R: Radio, E: RangingEngine> AccessoryService<R, E> {
    /// Wire up the transport and orchestrator around their event channels.
    /// Returns the service plus the command sender the application keeps.
    pub fn new(
        radio: R,
        radio_events: mpsc::UnboundedReceiver<RadioEvent>,
        engine: E,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        config: LinkConfig,
        app_events: mpsc::UnboundedSender<AppEvent>,
    ) -> (Self, mpsc::UnboundedSender<Command>) {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let transport = LinkTransport::new(radio, config, link_tx);
        let orchestrator = RangingOrchestrator::new(engine, outbound_tx, app_events.clone());

        (
            Self {
                transport,
                orchestrator,
                radio_events,
                engine_events,
                link_events: link_rx,
                outbound: outbound_rx,
                commands: command_rx,
                app_events,
            },
            command_tx,
        )
    }

    /// Run until shutdown, a fatal protocol violation, or channel closure.
    pub async fn run(mut self) {
        info!("accessory service started");
        loop {
            tokio::select! {
                event = self.radio_events.recv() => {
                    let Some(event) = event else { break };
                    self.transport.handle_event(event);
                }
                event = self.link_events.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.orchestrator.handle_link_event(event) {
                        // Firmware bug or transport corruption; dropping it
                        // silently would mask the accessory-side defect.
                        error!("protocol violation: {e}; terminating session");
                        let _ = self.app_events.send(AppEvent::Status(StatusMessage::error(
                            format!("Protocol violation: {e}"),
                        )));
                        self.transport.cleanup();
                        break;
                    }
                }
                event = self.engine_events.recv() => {
                    let Some(event) = event else { break };
                    self.orchestrator.handle_engine_event(event);
                }
                message = self.outbound.recv() => {
                    let Some(message) = message else { break };
                    if let Err(e) = self.transport.send(&message.encode()) {
                        warn!("failed to send data to accessory: {e}");
                        let _ = self.app_events.send(AppEvent::Status(StatusMessage::warning(
                            format!("Failed to send data to accessory: {e}"),
                        )));
                    }
                }
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Start) => self.transport.start(),
                        Some(Command::RequestRanging) => self.orchestrator.request_start(),
                        Some(Command::Shutdown) | None => break,
                    }
                }
            }
        }
        info!("accessory service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::link::protocol;
    use crate::infrastructure::link::radio::{CharacteristicId, PeripheralId, RadioState, ServiceId};
    use crate::ranging::engine::{AccessoryConfig, ConfigError, DiscoveryToken};

    struct NullRadio;

    impl Radio for NullRadio {
        fn scan(&mut self, _service_uuid: &str) {}
        fn stop_scan(&mut self) {}
        fn connect(&mut self, _peripheral: PeripheralId) {}
        fn disconnect(&mut self, _peripheral: PeripheralId) {}
        fn discover_services(&mut self, _peripheral: PeripheralId, _service_uuid: &str) {}
        fn discover_characteristics(
            &mut self,
            _peripheral: PeripheralId,
            _service: ServiceId,
            _uuids: &[&str],
        ) {
        }
        fn set_notify(
            &mut self,
            _peripheral: PeripheralId,
            _characteristic: CharacteristicId,
            _enabled: bool,
        ) {
        }
        fn write(
            &mut self,
            _peripheral: PeripheralId,
            _characteristic: CharacteristicId,
            _bytes: &[u8],
        ) {
        }
        fn max_write_len(&self, _peripheral: PeripheralId) -> usize {
            20
        }
    }

    struct NullEngine;

    impl RangingEngine for NullEngine {
        fn create_configuration(&mut self, _blob: &[u8]) -> Result<AccessoryConfig, ConfigError> {
            Ok(AccessoryConfig::new(DiscoveryToken(1)))
        }
        fn run(&mut self, _config: &AccessoryConfig) {}
        fn invalidate_and_replace(&mut self) {}
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> AppEvent {
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for app event")
            .expect("app event channel closed")
    }

    fn connect_events(peripheral: PeripheralId) -> Vec<RadioEvent> {
        vec![
            RadioEvent::StateChanged(RadioState::PoweredOn),
            RadioEvent::PeripheralDiscovered {
                peripheral,
                name: Some("UWB Beacon".to_string()),
                rssi: -40,
            },
            RadioEvent::Connected { peripheral },
            RadioEvent::ServicesDiscovered {
                peripheral,
                services: vec![1],
            },
            RadioEvent::CharacteristicDiscovered {
                peripheral,
                service: 1,
                characteristic: 2,
                uuid: protocol::NOTIFY_CHAR_UUID.to_string(),
            },
            RadioEvent::NotificationStateChanged {
                characteristic: 2,
                notifying: true,
            },
        ]
    }

    #[tokio::test]
    async fn connect_flow_surfaces_a_connected_event() {
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let (_engine_tx, engine_rx) = mpsc::unbounded_channel::<EngineEvent>();
        let (app_tx, mut app_rx) = mpsc::unbounded_channel();

        let (service, commands) = AccessoryService::new(
            NullRadio,
            radio_rx,
            NullEngine,
            engine_rx,
            LinkConfig::default(),
            app_tx,
        );
        let handle = tokio::spawn(service.run());

        commands.send(Command::Start).unwrap();
        for event in connect_events(1) {
            radio_tx.send(event).unwrap();
        }

        loop {
            if let AppEvent::Connected(name) = next_event(&mut app_rx).await {
                assert_eq!(name, "UWB Beacon");
                break;
            }
        }

        commands.send(Command::Shutdown).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn device_only_tag_from_the_accessory_halts_the_session() {
        let (radio_tx, radio_rx) = mpsc::unbounded_channel();
        let (_engine_tx, engine_rx) = mpsc::unbounded_channel::<EngineEvent>();
        let (app_tx, mut app_rx) = mpsc::unbounded_channel();

        let (service, _commands) = AccessoryService::new(
            NullRadio,
            radio_rx,
            NullEngine,
            engine_rx,
            LinkConfig::default(),
            app_tx,
        );
        let handle = tokio::spawn(service.run());

        for event in connect_events(1) {
            radio_tx.send(event).unwrap();
        }
        radio_tx
            .send(RadioEvent::ValueChanged {
                characteristic: 2,
                bytes: vec![0xB],
            })
            .unwrap();

        // The loop exits on its own; no shutdown command needed.
        handle.await.unwrap();

        let mut saw_violation = false;
        while let Ok(event) = app_rx.try_recv() {
            if let AppEvent::Status(status) = event {
                if status.message.contains("Protocol violation") {
                    saw_violation = true;
                }
            }
        }
        assert!(saw_violation);
    }
}
