//! Ranging Session Orchestrator
//!
//! Maps inbound accessory messages and ranging-engine callbacks onto
//! outbound protocol commands and observable app events. Every recoverable
//! failure converges on the same idiom — `Stop` then `Initialize` — while
//! malformed configuration data and denied permission are surfaced and left
//! for external intervention.

use crate::domain::models::{AppEvent, StatusMessage};
use crate::infrastructure::link::protocol::{Message, ProtocolError};
use crate::infrastructure::link::transport::LinkEvent;
use crate::ranging::engine::{
    AccessoryConfig, DiscoveryToken, EngineEvent, InvalidationReason, RangingEngine, RemovalReason,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Session state machine over one accessory.
pub struct RangingOrchestrator<E: RangingEngine> {
    engine: E,
    outbound: mpsc::UnboundedSender<Message>,
    events: mpsc::UnboundedSender<AppEvent>,

    /// Discovery token -> advertised accessory name.
    accessory_map: HashMap<DiscoveryToken, String>,
    active_config: Option<AccessoryConfig>,
    accessory_connected: bool,
    connected_accessory: Option<String>,
    ranging_active: bool,
}

impl<E: RangingEngine> RangingOrchestrator<E> {
    pub fn new(
        engine: E,
        outbound: mpsc::UnboundedSender<Message>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            engine,
            outbound,
            events,
            accessory_map: HashMap::new(),
            active_config: None,
            accessory_connected: false,
            connected_accessory: None,
            ranging_active: false,
        }
    }

    /// Whether the app-level "start ranging" action is currently allowed.
    pub fn can_initiate(&self) -> bool {
        self.accessory_connected && !self.ranging_active
    }

    /// Kick off the configuration handshake with the connected accessory.
    pub fn request_start(&mut self) {
        if !self.can_initiate() {
            warn!("ranging initiate refused (connected: {}, active: {})",
                self.accessory_connected, self.ranging_active);
            return;
        }
        self.status("Requesting configuration data from accessory");
        self.send(Message::Initialize);
    }

    /// Feed one link-layer event through the session.
    ///
    /// Returns a [`ProtocolError`] when the accessory violates the message
    /// contract; the caller decides how loudly to fail, but must treat it as
    /// fatal for the current session.
    pub fn handle_link_event(&mut self, event: LinkEvent) -> Result<(), ProtocolError> {
        match event {
            LinkEvent::Connected { accessory } => {
                self.accessory_connected = true;
                self.connected_accessory = Some(accessory.clone());
                self.status(format!("Connected to '{accessory}'"));
                let _ = self.events.send(AppEvent::Connected(accessory));
                Ok(())
            }
            LinkEvent::Disconnected => {
                self.accessory_connected = false;
                self.connected_accessory = None;
                if self.ranging_active {
                    // The accessory cannot report RangingStopped over a dead
                    // link; reflect the stop locally so the handshake can
                    // restart once the accessory reconnects.
                    self.ranging_active = false;
                    let _ = self.events.send(AppEvent::RangingActive(false));
                }
                self.status("Accessory disconnected");
                let _ = self.events.send(AppEvent::Disconnected);
                Ok(())
            }
            LinkEvent::Data { bytes, accessory } => self.handle_accessory_data(&bytes, &accessory),
        }
    }

    fn handle_accessory_data(
        &mut self,
        bytes: &[u8],
        accessory: &str,
    ) -> Result<(), ProtocolError> {
        let message = Message::decode(bytes)?;
        if message.is_device_only() {
            // A correct accessory never echoes our own command tags.
            return Err(ProtocolError::UnexpectedDirection(message.tag()));
        }

        match message {
            Message::ConfigurationData(blob) => self.configure_accessory(&blob, accessory),
            Message::RangingStarted => {
                self.ranging_active = true;
                self.status("Accessory session started");
                let _ = self.events.send(AppEvent::RangingActive(true));
            }
            Message::RangingStopped => {
                self.ranging_active = false;
                self.status("Accessory session stopped");
                let _ = self.events.send(AppEvent::RangingActive(false));
            }
            _ => unreachable!("device-only messages rejected above"),
        }
        Ok(())
    }

    fn configure_accessory(&mut self, blob: &[u8], accessory: &str) {
        match self.engine.create_configuration(blob) {
            Ok(config) => {
                self.status(format!(
                    "Received configuration data from '{accessory}', running session"
                ));
                // Cache the token so later engine updates correlate back to
                // this accessory's name.
                self.accessory_map
                    .insert(config.token(), accessory.to_string());
                self.engine.run(&config);
                self.active_config = Some(config);
            }
            Err(e) => {
                // Malformed accessory data; retrying with the same blob is
                // pointless, so surface and wait.
                self.error_notice(format!(
                    "Failed to create ranging configuration for '{accessory}': {e}"
                ));
            }
        }
    }

    /// Feed one engine callback through the session.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::ShareableConfig { token, blob } => self.on_shareable_config(token, blob),
            EngineEvent::ObjectsUpdated(objects) => self.on_objects_updated(&objects),
            EngineEvent::ObjectsRemoved { tokens, reason } => {
                self.on_objects_removed(&tokens, reason)
            }
            EngineEvent::Suspended => {
                self.status("Session suspended");
                self.send(Message::Stop);
            }
            EngineEvent::SuspensionEnded => {
                // Suspension invalidates any prior exchange; restart the
                // handshake from scratch.
                self.status("Session suspension ended");
                self.send(Message::Initialize);
            }
            EngineEvent::Invalidated(reason) => self.on_invalidated(reason),
        }
    }

    fn on_shareable_config(&mut self, token: DiscoveryToken, blob: Vec<u8>) {
        // Guard against stale or foreign session objects.
        match &self.active_config {
            Some(config) if config.token() == token => {}
            _ => {
                debug!("ignoring shareable configuration for unknown token {token:?}");
                return;
            }
        }
        let accessory = self
            .accessory_map
            .get(&token)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        self.send(Message::ConfigureAndStart(blob));
        self.status(format!("Sent shareable configuration data to '{accessory}'"));
    }

    fn on_objects_updated(&mut self, objects: &[crate::ranging::engine::NearbyObject]) {
        // The session runs with one accessory.
        let Some(object) = objects.first() else { return };
        let Some(distance) = object.distance else { return };
        let Some(accessory) = self.accessory_map.get(&object.token) else {
            return;
        };
        let _ = self.events.send(AppEvent::DistanceUpdate {
            accessory: accessory.clone(),
            meters: distance,
        });
    }

    fn on_objects_removed(&mut self, tokens: &[DiscoveryToken], reason: RemovalReason) {
        // Only a peer timeout is worth retrying.
        if reason != RemovalReason::Timeout {
            return;
        }
        self.status(format!(
            "Session with '{}' timed out",
            self.connected_accessory.as_deref().unwrap_or("accessory")
        ));

        let Some(token) = tokens.first() else { return };
        self.accessory_map.remove(token);

        if self.should_retry() {
            self.send(Message::Stop);
            self.send(Message::Initialize);
        }
    }

    fn on_invalidated(&mut self, reason: InvalidationReason) {
        match reason {
            InvalidationReason::InvalidConfiguration => {
                self.error_notice(
                    "Accessory configuration data is invalid. Debug it and try again.",
                );
            }
            InvalidationReason::UserDidNotAllow => {
                error!("ranging access denied by the user");
                self.error_notice("Ranging access is required; grant it in system settings.");
                let _ = self.events.send(AppEvent::PermissionRequired);
            }
            InvalidationReason::Other => {
                self.status("Session invalidated, restarting");
                self.send(Message::Stop);
                // The invalidated session object is unusable; replace it
                // wholesale before re-initializing the handshake.
                self.engine.invalidate_and_replace();
                self.active_config = None;
                self.send(Message::Initialize);
            }
        }
    }

    fn should_retry(&self) -> bool {
        self.accessory_connected
    }

    fn send(&self, message: Message) {
        debug!("queueing outbound message tag {:#04x}", message.tag());
        let _ = self.outbound.send(message);
    }

    fn status(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{text}");
        let _ = self.events.send(AppEvent::Status(StatusMessage::info(text)));
    }

    fn error_notice(&self, text: impl Into<String>) {
        let text = text.into();
        error!("{text}");
        let _ = self
            .events
            .send(AppEvent::Status(StatusMessage::error(text)));
    }
}
