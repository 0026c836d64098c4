#![allow(dead_code)]

use dfu_watch::config::model::{
    RawConfigSection, RawDeviceSection, RawFlashSection, RawHubSection,
};
use dfu_watch::config::{ConfigFile, RawConfigFile};
use dfu_watch::usb::DeviceAttributes;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the file defaults with a fast poll interval so tests do not
/// spend their time sleeping.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            config: RawConfigFile {
                config: RawConfigSection {
                    poll_interval: "10ms".to_string(),
                    ..RawConfigSection::default()
                },
                device: RawDeviceSection::default(),
                flash: RawFlashSection {
                    cmd: cmd.to_string(),
                },
                hub: None,
            },
        }
    }

    pub fn with_poll_interval(mut self, val: &str) -> Self {
        self.config.config.poll_interval = val.to_string();
        self
    }

    pub fn with_status_interval(mut self, val: &str) -> Self {
        self.config.config.status_interval = val.to_string();
        self
    }

    pub fn with_exit_linger(mut self, val: &str) -> Self {
        self.config.config.exit_linger = val.to_string();
        self
    }

    pub fn with_kill_on_stop(mut self, val: bool) -> Self {
        self.config.config.kill_on_stop = val;
        self
    }

    pub fn with_device_ids(mut self, vendor_id: &str, product_id: &str) -> Self {
        self.config.device.vendor_id = Some(vendor_id.to_string());
        self.config.device.product_id = Some(product_id.to_string());
        self
    }

    pub fn with_dfu_only(mut self, val: bool) -> Self {
        self.config.device.dfu_only = val;
        self
    }

    pub fn with_hub(mut self, vendor_id: &str, product_id: &str) -> Self {
        self.config.hub = Some(RawHubSection {
            vendor_id: vendor_id.to_string(),
            product_id: product_id.to_string(),
        });
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `DeviceAttributes`.
pub struct DeviceBuilder {
    device: DeviceAttributes,
}

impl DeviceBuilder {
    /// A DFU-capable STM32 bootloader on hub port 1.
    pub fn new(serial: &str) -> Self {
        Self {
            device: DeviceAttributes {
                vendor_id: 0x0483,
                product_id: 0xdf11,
                serial: Some(serial.to_string()),
                devpath: "1-1.1".to_string(),
                dfu_capable: true,
            },
        }
    }

    pub fn without_serial(mut self) -> Self {
        self.device.serial = None;
        self
    }

    pub fn devpath(mut self, devpath: &str) -> Self {
        self.device.devpath = devpath.to_string();
        self
    }

    pub fn ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.device.vendor_id = vendor_id;
        self.device.product_id = product_id;
        self
    }

    pub fn dfu_capable(mut self, val: bool) -> Self {
        self.device.dfu_capable = val;
        self
    }

    pub fn build(self) -> DeviceAttributes {
        self.device
    }
}
