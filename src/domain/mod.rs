//! Domain Layer
//!
//! Platform-free models and settings.

pub mod models;
pub mod settings;
