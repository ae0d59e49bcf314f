//! Ranging Engine Interface
//!
//! The UWB ranging engine is a black box to this crate: it consumes the
//! accessory's configuration blob and reports lifecycle events plus distance
//! updates. This module is the seam — a trait for the calls the orchestrator
//! makes, and an event enum for everything the engine reports back.

use thiserror::Error;

/// Engine-issued identifier correlating ranging updates to one configured
/// accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscoveryToken(pub u64);

/// A validated ranging configuration for one accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryConfig {
    token: DiscoveryToken,
}

impl AccessoryConfig {
    pub fn new(token: DiscoveryToken) -> Self {
        Self { token }
    }

    /// The discovery token the engine issued for this accessory.
    pub fn token(&self) -> DiscoveryToken {
        self.token
    }
}

/// The engine rejected the accessory's configuration blob.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed accessory configuration data: {0}")]
    MalformedData(String),
}

/// Why the engine dropped a nearby object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// The peer stopped responding; the handshake may be retried.
    Timeout,
    Other,
}

/// Why the engine invalidated the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// The accessory's configuration data is malformed; retrying with the
    /// same data is pointless.
    InvalidConfiguration,
    /// The user denied ranging access.
    UserDidNotAllow,
    Other,
}

/// One tracked object in an engine update.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyObject {
    pub token: DiscoveryToken,
    /// Meters; absent while the engine has no measurement.
    pub distance: Option<f32>,
}

/// Callbacks the engine delivers, carried on a channel into the session
/// event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine generated the blob the accessory needs to start ranging.
    ShareableConfig {
        token: DiscoveryToken,
        blob: Vec<u8>,
    },
    ObjectsUpdated(Vec<NearbyObject>),
    ObjectsRemoved {
        tokens: Vec<DiscoveryToken>,
        reason: RemovalReason,
    },
    Suspended,
    SuspensionEnded,
    Invalidated(InvalidationReason),
}

/// Imperative surface of the ranging engine.
pub trait RangingEngine {
    /// Validate the accessory's configuration blob and mint a token for it.
    fn create_configuration(&mut self, blob: &[u8]) -> Result<AccessoryConfig, ConfigError>;

    /// Start (or restart) ranging with a validated configuration.
    fn run(&mut self, config: &AccessoryConfig);

    /// Discard the engine session object wholesale and create a fresh one.
    /// Called after a generic invalidation; the old session is unusable.
    fn invalidate_and_replace(&mut self);
}
