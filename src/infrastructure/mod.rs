//! Infrastructure Layer
//!
//! I/O-facing code: the BLE link and logging setup.

pub mod link;
pub mod logging;
