//! Domain Models
//!
//! Shared state and event types flowing between the link layer, the ranging
//! orchestrator, and the embedding application.

/// Where the link connection state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    DiscoveringServices,
    DiscoveringCharacteristics,
    /// Notifications are active; the link is data-ready.
    Subscribed,
    /// Link lost and the retry budget is exhausted.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Warning,
    Error,
}

/// Human-readable status line for the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Info,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Warning,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Error,
        }
    }
}

/// Observable events this crate exposes to the UI/app layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// An accessory link came up; carries the advertised name.
    Connected(String),
    Disconnected,
    /// The accessory's UWB session went active or inactive.
    RangingActive(bool),
    /// A fresh distance measurement for a configured accessory.
    DistanceUpdate { accessory: String, meters: f32 },
    /// Status line update; `Error` severity doubles as the error notice.
    Status(StatusMessage),
    /// Ranging access was denied; the user must grant it in settings.
    PermissionRequired,
}
