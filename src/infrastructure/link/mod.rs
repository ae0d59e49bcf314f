//! Accessory Link
//!
//! BLE link to a single UWB accessory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    LinkTransport                     │
//! │  (connection state machine - scan/connect/subscribe) │
//! └──────────────┬───────────────────────┬───────────────┘
//!                │ Radio trait           │ RadioEvent channel
//!                ▼                       │
//! ┌──────────────────────────┐           │
//! │   platform BLE central   │───────────┘
//! │  (central, Windows-only) │
//! └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - message tags, codec, and transfer-service UUIDs
//! - [`radio`] - the trait/event seam over the platform BLE central
//! - [`transport`] - the link connection state machine
//! - `central` - WinRT-backed [`radio::Radio`] implementation

pub mod protocol;
pub mod radio;
pub mod transport;

#[cfg(windows)]
pub mod central;

pub use transport::{LinkConfig, LinkEvent, LinkTransport, TransportError};
