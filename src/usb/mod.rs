// src/usb/mod.rs

//! USB collaborators: device discovery and hub port indicators.
//!
//! - [`discovery`] enumerates present devices and watches hotplug events,
//!   turning them into `RuntimeEvent`s.
//! - [`hub`] drives the per-port indicator LED of a USB hub.
//!
//! The types in this file are plain data shared with the engine so that it
//! never has to touch `nusb` directly.

pub mod discovery;
pub mod hub;

use std::fmt;

pub use discovery::{enumerate, spawn_device_watcher, DeviceWatcherHandle};
pub use hub::{PortIndicator, UsbHub};

/// What the engine knows about one USB device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAttributes {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial: Option<String>,
    /// Bus and port chain, e.g. `1-1.4`. The last number is the hub port.
    pub devpath: String,
    /// Whether the device exposes a DFU class interface.
    pub dfu_capable: bool,
}

impl DeviceAttributes {
    /// Port number on the parent hub, parsed from the devpath suffix.
    pub fn port(&self) -> Option<u8> {
        port_from_devpath(&self.devpath)
    }

    /// Stable name for this device: its serial, else its devpath.
    pub fn label(&self) -> String {
        match &self.serial {
            Some(serial) if !serial.trim().is_empty() => serial.clone(),
            _ => self.devpath.clone(),
        }
    }
}

impl fmt::Display for DeviceAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} {} ({})",
            self.vendor_id,
            self.product_id,
            self.serial.as_deref().unwrap_or("<no serial>"),
            self.devpath
        )
    }
}

/// Which devices should be flashed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    /// Only accept devices that expose a DFU class interface.
    pub dfu_only: bool,
}

impl DeviceFilter {
    pub fn matches(&self, device: &DeviceAttributes) -> bool {
        self.vendor_id.is_none_or(|id| device.vendor_id == id)
            && self.product_id.is_none_or(|id| device.product_id == id)
            && (!self.dfu_only || device.dfu_capable)
    }
}

/// Parse the hub port from a devpath such as `1-1.4` or
/// `/sys/devices/.../usb1/1-1/1-1.4`.
///
/// The trailing digits must follow a `-` or `.` separator.
pub fn port_from_devpath(devpath: &str) -> Option<u8> {
    let last = devpath.rsplit('/').next()?;
    let digits_start = last
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    let separator = last[..digits_start].chars().next_back()?;
    if separator != '.' && separator != '-' {
        return None;
    }
    last[digits_start..].parse().ok()
}

/// Build a devpath from a bus id and port chain, e.g. `("1", [1, 4])` → `1-1.4`.
pub fn devpath_from_ports(bus_id: &str, ports: &[u8]) -> String {
    if ports.is_empty() {
        return format!("usb{bus_id}");
    }
    let chain: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
    format!("{bus_id}-{}", chain.join("."))
}
