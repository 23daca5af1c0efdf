//! pinepomo-core - Shared functionality for pinepomo
//!
//! Platform-facing pieces the timer library and the `pomo` binary both need:
//! standard directories, JSON config files, and a stable per-installation
//! device identifier.

pub mod config;
pub mod device;
pub mod paths;

pub use device::{DeviceIdentity, FileDeviceIdentity, StaticDeviceIdentity};
pub use paths::Paths;
