//! Windows BLE Central
//!
//! [`Radio`] backend over the WinRT Bluetooth APIs. Each trait call kicks off
//! the matching WinRT async operation on the runtime and reports the outcome
//! as a [`RadioEvent`], keeping the link state machine platform-free.

use crate::infrastructure::link::radio::{
    CharacteristicId, PeripheralId, Radio, RadioEvent, RadioState, ServiceId,
};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattDeviceService, GattSession, GattValueChangedEventArgs,
    GattWriteOption,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, DataWriter};

const DEFAULT_WRITE_LEN: usize = 20;

#[derive(Default)]
struct Inner {
    devices: HashMap<PeripheralId, BluetoothLEDevice>,
    sessions: HashMap<PeripheralId, GattSession>,
    services: HashMap<ServiceId, GattDeviceService>,
    characteristics: HashMap<CharacteristicId, GattCharacteristic>,
    write_len: HashMap<PeripheralId, usize>,
    next_handle: u64,
}

impl Inner {
    fn mint_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// WinRT-backed BLE central.
pub struct WindowsCentral {
    events: mpsc::UnboundedSender<RadioEvent>,
    watcher: Option<BluetoothLEAdvertisementWatcher>,
    inner: Arc<Mutex<Inner>>,
}

impl WindowsCentral {
    pub fn new(events: mpsc::UnboundedSender<RadioEvent>) -> Self {
        // The watcher API has no explicit power-state callback; readiness is
        // probed when scanning starts.
        let _ = events.send(RadioEvent::StateChanged(RadioState::PoweredOn));
        Self {
            events,
            watcher: None,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn start_watcher(&mut self, service_uuid: &str) -> Result<()> {
        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let sender = self.events.clone();
        let target = parse_uuid(service_uuid)?;
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let adv = args.Advertisement()?;
                    let uuids = adv.ServiceUuids()?;
                    let mut found = false;
                    for i in 0..uuids.Size()? {
                        if uuids.GetAt(i)? == target {
                            found = true;
                            break;
                        }
                    }
                    if found {
                        let name = adv.LocalName()?.to_string();
                        let _ = sender.send(RadioEvent::PeripheralDiscovered {
                            peripheral: args.BluetoothAddress()?,
                            name: (!name.is_empty()).then_some(name),
                            rssi: args.RawSignalStrengthInDBm()?,
                        });
                    }
                }
                Ok(())
            },
        );
        watcher.Received(&handler)?;
        watcher.Start()?;
        self.watcher = Some(watcher);
        Ok(())
    }
}

impl Radio for WindowsCentral {
    fn scan(&mut self, service_uuid: &str) {
        info!("starting BLE scan for service {service_uuid}");
        if let Err(e) = self.start_watcher(service_uuid) {
            error!("failed to start advertisement watcher: {e}");
            let _ = self
                .events
                .send(RadioEvent::StateChanged(RadioState::Unknown));
        }
    }

    fn stop_scan(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.Stop() {
                warn!("failed to stop advertisement watcher: {e}");
            }
        }
    }

    fn connect(&mut self, peripheral: PeripheralId) {
        let events = self.events.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            match connect_device(peripheral).await {
                Ok((device, session, write_len)) => {
                    let status_events = events.clone();
                    let status_handler = TypedEventHandler::new(
                        move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                            if let Some(dev) = dev.as_ref() {
                                if dev.ConnectionStatus()?
                                    == BluetoothConnectionStatus::Disconnected
                                {
                                    let _ = status_events
                                        .send(RadioEvent::Disconnected { peripheral });
                                }
                            }
                            Ok(())
                        },
                    );
                    if let Err(e) = device.ConnectionStatusChanged(&status_handler) {
                        warn!("could not watch connection status: {e}");
                    }
                    {
                        let mut inner = inner.lock().unwrap();
                        inner.devices.insert(peripheral, device);
                        inner.sessions.insert(peripheral, session);
                        inner.write_len.insert(peripheral, write_len);
                    }
                    let _ = events.send(RadioEvent::Connected { peripheral });
                }
                Err(e) => {
                    let _ = events.send(RadioEvent::ConnectFailed {
                        peripheral,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    fn disconnect(&mut self, peripheral: PeripheralId) {
        let removed = {
            let mut inner = self.inner.lock().unwrap();
            inner.sessions.remove(&peripheral);
            inner.services.clear();
            inner.characteristics.clear();
            inner.devices.remove(&peripheral)
        };
        if let Some(device) = removed {
            let _ = device.Close();
            // Close() does not always raise a status change for a device we
            // released ourselves.
            let _ = self.events.send(RadioEvent::Disconnected { peripheral });
        }
    }

    fn discover_services(&mut self, peripheral: PeripheralId, service_uuid: &str) {
        let device = self.inner.lock().unwrap().devices.get(&peripheral).cloned();
        let events = self.events.clone();
        let inner = self.inner.clone();
        let service_uuid = service_uuid.to_string();
        tokio::spawn(async move {
            let result = async {
                let device = device.ok_or_else(|| anyhow::anyhow!("peripheral not connected"))?;
                let guid = parse_uuid(&service_uuid)?;
                let found = device.GetGattServicesForUuidAsync(guid)?.await?;
                if found.Status()? != GattCommunicationStatus::Success {
                    anyhow::bail!("service query status {:?}", found.Status()?);
                }
                let services = found.Services()?;
                if services.Size()? == 0 {
                    anyhow::bail!("transfer service not found");
                }
                let mut ids = Vec::new();
                let mut inner = inner.lock().unwrap();
                for i in 0..services.Size()? {
                    let service = services.GetAt(i)?;
                    let id = inner.mint_handle();
                    inner.services.insert(id, service);
                    ids.push(id);
                }
                Ok::<_, anyhow::Error>(ids)
            }
            .await;

            match result {
                Ok(services) => {
                    let _ = events.send(RadioEvent::ServicesDiscovered {
                        peripheral,
                        services,
                    });
                }
                Err(e) => {
                    let _ = events.send(RadioEvent::ServiceDiscoveryFailed {
                        peripheral,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    fn discover_characteristics(
        &mut self,
        peripheral: PeripheralId,
        service: ServiceId,
        uuids: &[&str],
    ) {
        let found = self.inner.lock().unwrap().services.get(&service).cloned();
        let events = self.events.clone();
        let inner = self.inner.clone();
        let wanted: Vec<GUID> = uuids.iter().filter_map(|u| parse_uuid(u).ok()).collect();
        let uuid_strings: Vec<String> = uuids.iter().map(|u| u.to_lowercase()).collect();
        tokio::spawn(async move {
            let result = async {
                let gatt_service =
                    found.ok_or_else(|| anyhow::anyhow!("service handle unknown"))?;
                let chars = gatt_service.GetCharacteristicsAsync()?.await?;
                if chars.Status()? != GattCommunicationStatus::Success {
                    anyhow::bail!("characteristic query status {:?}", chars.Status()?);
                }
                let list = chars.Characteristics()?;
                let mut resolved = Vec::new();
                let mut inner = inner.lock().unwrap();
                for i in 0..list.Size()? {
                    let characteristic = list.GetAt(i)?;
                    let uuid = characteristic.Uuid()?;
                    if let Some(pos) = wanted.iter().position(|w| *w == uuid) {
                        let id = inner.mint_handle();
                        inner.characteristics.insert(id, characteristic);
                        resolved.push((id, uuid_strings[pos].clone()));
                    }
                }
                Ok::<_, anyhow::Error>(resolved)
            }
            .await;

            match result {
                Ok(resolved) => {
                    for (characteristic, uuid) in resolved {
                        let _ = events.send(RadioEvent::CharacteristicDiscovered {
                            peripheral,
                            service,
                            characteristic,
                            uuid,
                        });
                    }
                }
                Err(e) => {
                    let _ = events.send(RadioEvent::CharacteristicDiscoveryFailed {
                        peripheral,
                        reason: e.to_string(),
                    });
                }
            }
        });
    }

    fn set_notify(
        &mut self,
        _peripheral: PeripheralId,
        characteristic: CharacteristicId,
        enabled: bool,
    ) {
        let found = self
            .inner
            .lock()
            .unwrap()
            .characteristics
            .get(&characteristic)
            .cloned();
        let events = self.events.clone();
        tokio::spawn(async move {
            let Some(gatt_char) = found else { return };
            let value = if enabled {
                GattClientCharacteristicConfigurationDescriptorValue::Notify
            } else {
                GattClientCharacteristicConfigurationDescriptorValue::None
            };
            let status = match gatt_char
                .WriteClientCharacteristicConfigurationDescriptorAsync(value)
            {
                Ok(op) => op.await,
                Err(e) => Err(e),
            };
            match status {
                Ok(s) if s == GattCommunicationStatus::Success => {
                    if enabled {
                        let value_events = events.clone();
                        let handler = TypedEventHandler::new(
                            move |_: windows::core::Ref<GattCharacteristic>,
                                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                                if let Some(args) = args.as_ref() {
                                    let buffer = args.CharacteristicValue()?;
                                    let reader = DataReader::FromBuffer(&buffer)?;
                                    let mut bytes =
                                        vec![0u8; reader.UnconsumedBufferLength()? as usize];
                                    reader.ReadBytes(&mut bytes)?;
                                    let _ = value_events.send(RadioEvent::ValueChanged {
                                        characteristic,
                                        bytes,
                                    });
                                }
                                Ok(())
                            },
                        );
                        if let Err(e) = gatt_char.ValueChanged(&handler) {
                            error!("could not attach value-changed handler: {e}");
                        }
                    }
                    let _ = events.send(RadioEvent::NotificationStateChanged {
                        characteristic,
                        notifying: enabled,
                    });
                }
                Ok(status) => {
                    error!("notification descriptor write returned {status:?}");
                    let _ = events.send(RadioEvent::NotificationStateChanged {
                        characteristic,
                        notifying: false,
                    });
                }
                Err(e) => {
                    error!("notification descriptor write failed: {e}");
                    let _ = events.send(RadioEvent::NotificationStateChanged {
                        characteristic,
                        notifying: false,
                    });
                }
            }
        });
    }

    fn write(&mut self, _peripheral: PeripheralId, characteristic: CharacteristicId, bytes: &[u8]) {
        let found = self
            .inner
            .lock()
            .unwrap()
            .characteristics
            .get(&characteristic)
            .cloned();
        let bytes = bytes.to_vec();
        tokio::spawn(async move {
            let Some(gatt_char) = found else { return };
            let result = async {
                let writer = DataWriter::new()?;
                writer.WriteBytes(&bytes)?;
                let buffer = writer.DetachBuffer()?;
                gatt_char
                    .WriteValueWithOptionAsync(&buffer, GattWriteOption::WriteWithResponse)?
                    .await
            }
            .await;
            match result {
                Ok(s) if s == GattCommunicationStatus::Success => {}
                Ok(status) => warn!("acknowledged write returned {status:?}"),
                Err(e) => warn!("acknowledged write failed: {e}"),
            }
        });
    }

    fn max_write_len(&self, peripheral: PeripheralId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .write_len
            .get(&peripheral)
            .copied()
            .unwrap_or(DEFAULT_WRITE_LEN)
    }
}

async fn connect_device(
    peripheral: PeripheralId,
) -> Result<(BluetoothLEDevice, GattSession, usize)> {
    let device = BluetoothLEDevice::FromBluetoothAddressAsync(peripheral)?.await?;
    // A maintained GattSession keeps the connection up and exposes the
    // negotiated PDU size.
    let session = GattSession::FromDeviceIdAsync(&device.BluetoothDeviceId()?)?.await?;
    session.SetMaintainConnection(true)?;
    let write_len = session
        .MaxPduSize()
        .map(|pdu| (pdu as usize).saturating_sub(3).max(1))
        .unwrap_or(DEFAULT_WRITE_LEN);
    Ok((device, session, write_len))
}

/// Parse a canonical UUID string into a WinRT GUID.
pub fn parse_uuid(uuid_str: &str) -> Result<GUID> {
    let uuid_str = uuid_str.replace('-', "");
    // ASCII check first: the ranges below slice by byte offset, which would
    // panic mid-character on multi-byte input from a settings file.
    if uuid_str.len() != 32 || !uuid_str.is_ascii() {
        return Err(anyhow::anyhow!("Invalid UUID format"));
    }

    let d1 = u32::from_str_radix(&uuid_str[0..8], 16)?;
    let d2 = u16::from_str_radix(&uuid_str[8..12], 16)?;
    let d3 = u16::from_str_radix(&uuid_str[12..16], 16)?;

    let mut d4 = [0u8; 8];
    for (i, byte) in d4.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&uuid_str[16 + i * 2..18 + i * 2], 16)?;
    }

    Ok(GUID {
        data1: d1,
        data2: d2,
        data3: d3,
        data4: d4,
    })
}
