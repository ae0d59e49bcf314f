//! Radio Seam
//!
//! Boundary between the link state machine and the platform BLE central.
//! The state machine issues imperative requests through [`Radio`]; everything
//! the central reports back arrives as a [`RadioEvent`] on a channel, so the
//! connection logic stays single-threaded and drivable from tests.

/// Backend-assigned handle for a discovered peripheral.
pub type PeripheralId = u64;

/// Backend-assigned handle for a resolved GATT service instance.
pub type ServiceId = u64;

/// Backend-assigned handle for a resolved GATT characteristic instance.
pub type CharacteristicId = u64;

/// Readiness of the radio, reported before any scanning may begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    PoweredOn,
    PoweredOff,
    Resetting,
    Unauthorized(AuthorizationStatus),
    Unsupported,
    Unknown,
}

/// Why the radio is unauthorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Denied,
    Restricted,
    Unknown,
}

/// Everything the BLE central reports back to the link state machine.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    StateChanged(RadioState),
    PeripheralDiscovered {
        peripheral: PeripheralId,
        /// Local name from the advertisement, when present.
        name: Option<String>,
        rssi: i16,
    },
    Connected {
        peripheral: PeripheralId,
    },
    ConnectFailed {
        peripheral: PeripheralId,
        reason: String,
    },
    ServicesDiscovered {
        peripheral: PeripheralId,
        services: Vec<ServiceId>,
    },
    ServiceDiscoveryFailed {
        peripheral: PeripheralId,
        reason: String,
    },
    /// A previously resolved service became invalid on the peripheral.
    ServiceInvalidated {
        peripheral: PeripheralId,
        uuid: String,
    },
    CharacteristicDiscovered {
        peripheral: PeripheralId,
        service: ServiceId,
        characteristic: CharacteristicId,
        uuid: String,
    },
    CharacteristicDiscoveryFailed {
        peripheral: PeripheralId,
        reason: String,
    },
    NotificationStateChanged {
        characteristic: CharacteristicId,
        notifying: bool,
    },
    ValueChanged {
        characteristic: CharacteristicId,
        bytes: Vec<u8>,
    },
    Disconnected {
        peripheral: PeripheralId,
    },
}

/// Imperative surface of the BLE central.
///
/// Calls are fire-and-forget: outcomes arrive later as [`RadioEvent`]s, the
/// same way a CoreBluetooth- or WinRT-style central reports through delegate
/// callbacks. Implementations must not block.
pub trait Radio {
    /// Scan for peripherals advertising the given service.
    fn scan(&mut self, service_uuid: &str);
    fn stop_scan(&mut self);
    fn connect(&mut self, peripheral: PeripheralId);
    fn disconnect(&mut self, peripheral: PeripheralId);
    /// Resolve service instances matching `service_uuid` on the peripheral.
    fn discover_services(&mut self, peripheral: PeripheralId, service_uuid: &str);
    /// Resolve characteristics matching `uuids` within a service.
    fn discover_characteristics(
        &mut self,
        peripheral: PeripheralId,
        service: ServiceId,
        uuids: &[&str],
    );
    /// Enable or disable value-change notifications for a characteristic.
    fn set_notify(&mut self, peripheral: PeripheralId, characteristic: CharacteristicId, enabled: bool);
    /// Issue one acknowledged write. `bytes` must not exceed
    /// [`Radio::max_write_len`] for the peripheral.
    fn write(&mut self, peripheral: PeripheralId, characteristic: CharacteristicId, bytes: &[u8]);
    /// Negotiated maximum length of a single acknowledged write.
    fn max_write_len(&self, peripheral: PeripheralId) -> usize;
}
