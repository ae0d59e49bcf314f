//! Accessory Message Protocol
//!
//! Fixed-tag binary protocol carried over the transfer service. Every frame
//! is a single tag byte followed by an optional opaque payload. The codec is
//! a pure transform; direction policy (what the accessory is allowed to send)
//! is enforced by the session orchestrator.

use thiserror::Error;
use tracing::trace;

/// Transfer service UUID (Nordic UART Service).
pub const SERVICE_UUID: &str = "6e400001-b5a3-f393-e0a9-e50e24dcca9e";

/// Device -> accessory write characteristic UUID.
pub const WRITE_CHAR_UUID: &str = "6e400002-b5a3-f393-e0a9-e50e24dcca9e";

/// Accessory -> device notify characteristic UUID.
pub const NOTIFY_CHAR_UUID: &str = "6e400003-b5a3-f393-e0a9-e50e24dcca9e";

/// Message tag bytes shared with the accessory firmware.
pub mod tag {
    // Accessory -> device
    pub const CONFIGURATION_DATA: u8 = 0x1;
    pub const RANGING_STARTED: u8 = 0x2;
    pub const RANGING_STOPPED: u8 = 0x3;

    // Device -> accessory
    pub const INITIALIZE: u8 = 0xA;
    pub const CONFIGURE_AND_START: u8 = 0xB;
    pub const STOP: u8 = 0xC;
}

/// Protocol contract violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("received an empty frame")]
    EmptyPayload,
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),
    #[error("accessory sent device-only tag {0:#04x}")]
    UnexpectedDirection(u8),
}

/// A message exchanged between the device and the accessory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Ranging configuration blob produced by the accessory.
    ConfigurationData(Vec<u8>),
    /// The accessory's UWB session started.
    RangingStarted,
    /// The accessory's UWB session stopped.
    RangingStopped,
    /// Ask the accessory for its configuration data.
    Initialize,
    /// Shareable configuration blob the accessory needs to start ranging.
    ConfigureAndStart(Vec<u8>),
    /// Ask the accessory to stop its UWB session.
    Stop,
}

impl Message {
    /// The wire tag for this message.
    pub const fn tag(&self) -> u8 {
        match self {
            Message::ConfigurationData(_) => tag::CONFIGURATION_DATA,
            Message::RangingStarted => tag::RANGING_STARTED,
            Message::RangingStopped => tag::RANGING_STOPPED,
            Message::Initialize => tag::INITIALIZE,
            Message::ConfigureAndStart(_) => tag::CONFIGURE_AND_START,
            Message::Stop => tag::STOP,
        }
    }

    /// True for tags only the device may send.
    pub const fn is_device_only(&self) -> bool {
        matches!(
            self,
            Message::Initialize | Message::ConfigureAndStart(_) | Message::Stop
        )
    }

    /// Serialize to wire bytes: tag byte, then the payload if any.
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = vec![self.tag()];
        match self {
            Message::ConfigurationData(blob) | Message::ConfigureAndStart(blob) => {
                frame.extend_from_slice(blob);
            }
            _ => {}
        }
        trace!("encoded frame: {}", hex_dump(&frame));
        frame
    }

    /// Parse wire bytes. The payload of a `ConfigurationData` frame is
    /// everything after the tag byte and is not interpreted here.
    pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
        let (&first, payload) = bytes.split_first().ok_or(ProtocolError::EmptyPayload)?;
        trace!("decoding {} bytes: {}", bytes.len(), hex_dump(bytes));

        match first {
            tag::CONFIGURATION_DATA => Ok(Message::ConfigurationData(payload.to_vec())),
            tag::RANGING_STARTED => Ok(Message::RangingStarted),
            tag::RANGING_STOPPED => Ok(Message::RangingStopped),
            tag::INITIALIZE => Ok(Message::Initialize),
            tag::CONFIGURE_AND_START => Ok(Message::ConfigureAndStart(payload.to_vec())),
            tag::STOP => Ok(Message::Stop),
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

/// Format bytes for frame logging, e.g. `0x0b, 0xaa, 0xbb`.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:#04x}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame_is_rejected() {
        assert_eq!(Message::decode(&[]), Err(ProtocolError::EmptyPayload));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(Message::decode(&[0x7f]), Err(ProtocolError::UnknownTag(0x7f)));
        assert_eq!(Message::decode(&[0x00, 0x01]), Err(ProtocolError::UnknownTag(0x00)));
    }

    #[test]
    fn no_payload_tags_decode_from_a_single_byte() {
        assert_eq!(Message::decode(&[0x2]), Ok(Message::RangingStarted));
        assert_eq!(Message::decode(&[0x3]), Ok(Message::RangingStopped));
        assert_eq!(Message::decode(&[0xA]), Ok(Message::Initialize));
        assert_eq!(Message::decode(&[0xC]), Ok(Message::Stop));
    }

    #[test]
    fn configuration_data_payload_follows_the_tag() {
        let message = Message::decode(&[0x1, 0xAA, 0xBB]).unwrap();
        assert_eq!(message, Message::ConfigurationData(vec![0xAA, 0xBB]));
    }

    #[test]
    fn device_only_tags_are_still_decoded_for_the_caller_to_classify() {
        let message = Message::decode(&[0xB]).unwrap();
        assert!(message.is_device_only());
        assert!(!Message::RangingStarted.is_device_only());
    }

    #[test]
    fn encode_round_trips_payload_frames() {
        let bytes = [0x1, 0xDE, 0xAD, 0xBE, 0xEF];
        assert_eq!(Message::decode(&bytes).unwrap().encode(), bytes);

        let msg = Message::ConfigureAndStart(vec![0x10, 0x20]);
        assert_eq!(Message::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn encode_prefixes_the_shareable_blob_with_its_tag() {
        let msg = Message::ConfigureAndStart(vec![0xAA]);
        assert_eq!(msg.encode(), vec![0xB, 0xAA]);
        assert_eq!(Message::Initialize.encode(), vec![0xA]);
    }
}
