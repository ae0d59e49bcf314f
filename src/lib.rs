//! Accessory Link & Ranging-Handshake Controller
//!
//! Pairs a device with a single nearby UWB accessory over BLE, bootstraps
//! the ranging configuration handshake, and keeps the session alive across
//! transient link loss.
//!
//! The crate is split the usual way: `domain` holds platform-free models and
//! settings, `infrastructure` holds the BLE link (codec, radio seam, state
//! machine, Windows central) and logging, `ranging` holds the engine seam
//! and the session orchestrator, and [`service::AccessoryService`] runs the
//! single event loop that ties them together.
//!
//! ```ignore
//! let settings = SettingsService::new()?;
//! let (radio, radio_events) = platform_radio();
//! let (engine, engine_events) = platform_ranging_engine();
//! let (app_tx, mut app_rx) = mpsc::unbounded_channel();
//!
//! let (service, commands) = AccessoryService::new(
//!     radio,
//!     radio_events,
//!     engine,
//!     engine_events,
//!     settings.get().link_config(),
//!     app_tx,
//! );
//! tokio::spawn(service.run());
//! commands.send(Command::Start)?;
//! while let Some(event) = app_rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

pub mod domain;
pub mod infrastructure;
pub mod ranging;
pub mod service;

pub use domain::models::{AppEvent, ConnectionState, MessageSeverity, StatusMessage};
pub use domain::settings::{LogSettings, Settings, SettingsService};
pub use infrastructure::link::protocol::{Message, ProtocolError};
pub use infrastructure::link::{LinkConfig, LinkEvent, LinkTransport, TransportError};
pub use ranging::{EngineEvent, RangingEngine, RangingOrchestrator};
pub use service::{AccessoryService, Command};
