// src/usb/hub.rs

//! Hub port indicator (LED) control over class-specific control transfers.

use std::time::Duration;

use nusb::transfer::{ControlIn, ControlOut, ControlType, Recipient};
use nusb::MaybeFuture;
use tracing::{debug, info};

use crate::errors::HubError;
use crate::types::IndicatorColor;

const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

const REQ_GET_DESCRIPTOR: u8 = 0x06;
const REQ_SET_FEATURE: u8 = 0x03;
const DT_HUB: u16 = 0x29;
const PORT_FEAT_INDICATOR: u16 = 22;
const HUB_DESCRIPTOR_MAX_LEN: u16 = 1024;

/// Bit in the low byte of `wHubCharacteristics` (descriptor byte 3).
const HUB_CHAR_PORT_INDICATORS: u8 = 0x80;

/// Something that can light a port indicator.
pub trait PortIndicator: Send {
    fn set_indicator(&mut self, port: u8, color: IndicatorColor) -> Result<(), HubError>;
}

/// A USB hub with port indicator support.
pub struct UsbHub {
    device: nusb::Device,
    vendor_id: u16,
    product_id: u16,
}

impl std::fmt::Debug for UsbHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbHub")
            .field("vendor_id", &format_args!("{:04x}", self.vendor_id))
            .field("product_id", &format_args!("{:04x}", self.product_id))
            .finish()
    }
}

impl UsbHub {
    /// Open the first hub with this vendor/product id and check that it
    /// supports port indicators.
    pub fn find(vendor_id: u16, product_id: u16) -> Result<Self, HubError> {
        let info = nusb::list_devices()
            .wait()?
            .find(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .ok_or(HubError::NotFound {
                vendor_id,
                product_id,
            })?;

        let device = info.open().wait()?;
        let desc = device
            .control_in(
                ControlIn {
                    control_type: ControlType::Class,
                    recipient: Recipient::Device,
                    request: REQ_GET_DESCRIPTOR,
                    value: DT_HUB << 8,
                    index: 0,
                    length: HUB_DESCRIPTOR_MAX_LEN,
                },
                CONTROL_TIMEOUT,
            )
            .wait()?;

        if !supports_port_indicators(&desc) {
            return Err(HubError::Unsupported {
                vendor_id,
                product_id,
            });
        }

        info!(
            vendor_id = format_args!("{vendor_id:04x}"),
            product_id = format_args!("{product_id:04x}"),
            "hub with port indicator support found"
        );

        Ok(Self {
            device,
            vendor_id,
            product_id,
        })
    }
}

impl PortIndicator for UsbHub {
    fn set_indicator(&mut self, port: u8, color: IndicatorColor) -> Result<(), HubError> {
        debug!(port, ?color, "setting hub port indicator");
        self.device
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Other,
                    request: REQ_SET_FEATURE,
                    value: PORT_FEAT_INDICATOR,
                    index: indicator_index(port, color),
                    data: &[],
                },
                CONTROL_TIMEOUT,
            )
            .wait()?;
        Ok(())
    }
}

/// Whether a hub descriptor advertises port indicator support.
pub fn supports_port_indicators(descriptor: &[u8]) -> bool {
    descriptor
        .get(3)
        .is_some_and(|b| b & HUB_CHAR_PORT_INDICATORS != 0)
}

/// `wIndex` for SET_FEATURE(PORT_INDICATOR): selector in the high byte,
/// port in the low byte.
pub fn indicator_index(port: u8, color: IndicatorColor) -> u16 {
    (u16::from(color.selector()) << 8) | u16::from(port)
}
