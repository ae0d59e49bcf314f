//! Ranging Session
//!
//! The seam to the external UWB ranging engine and the orchestrator that
//! maps its lifecycle onto the accessory protocol.

pub mod engine;
pub mod orchestrator;

pub use engine::{
    AccessoryConfig, ConfigError, DiscoveryToken, EngineEvent, InvalidationReason, NearbyObject,
    RangingEngine, RemovalReason,
};
pub use orchestrator::RangingOrchestrator;
