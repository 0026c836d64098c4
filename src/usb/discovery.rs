// src/usb/discovery.rs

//! Device enumeration and hotplug watching via `nusb`.

use std::collections::HashMap;

use futures_util::StreamExt;
use nusb::hotplug::HotplugEvent;
use nusb::{DeviceId, DeviceInfo, MaybeFuture};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::UsbError;
use crate::usb::{devpath_from_ports, DeviceAttributes, DeviceFilter};

const DFU_CLASS: u8 = 0xFE;
const DFU_SUBCLASS: u8 = 0x01;

/// Keeps the hotplug watcher task alive; dropping it stops watching.
#[derive(Debug)]
pub struct DeviceWatcherHandle {
    task: JoinHandle<()>,
}

impl Drop for DeviceWatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Convert `nusb` device info into engine-facing attributes.
pub fn attributes_from_info(info: &DeviceInfo) -> DeviceAttributes {
    DeviceAttributes {
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        serial: info.serial_number().map(str::to_string),
        devpath: devpath_from_ports(info.bus_id(), info.port_chain()),
        dfu_capable: info
            .interfaces()
            .any(|i| i.class() == DFU_CLASS && i.subclass() == DFU_SUBCLASS),
    }
}

/// List devices currently present that match `filter`.
pub async fn enumerate(filter: DeviceFilter) -> Result<Vec<DeviceAttributes>, UsbError> {
    let devices = tokio::task::spawn_blocking(move || -> Result<_, UsbError> {
        Ok(nusb::list_devices()
            .wait()?
            .map(|info| attributes_from_info(&info))
            .filter(|attrs| filter.matches(attrs))
            .collect::<Vec<_>>())
    })
    .await??;

    debug!(count = devices.len(), "enumerated matching USB devices");
    Ok(devices)
}

/// Watch hotplug events and forward matching attach/detach events to the
/// runtime.
pub fn spawn_device_watcher(
    filter: DeviceFilter,
    runtime_tx: mpsc::UnboundedSender<RuntimeEvent>,
) -> Result<DeviceWatcherHandle, UsbError> {
    let mut watch = nusb::watch_devices()?;
    info!(?filter, "USB hotplug watcher started");

    let task = tokio::spawn(async move {
        // Disconnect events only carry the id, so remember what we announced.
        let mut known: HashMap<DeviceId, DeviceAttributes> = HashMap::new();

        while let Some(event) = watch.next().await {
            let forwarded = match event {
                HotplugEvent::Connected(info) => {
                    let attrs = attributes_from_info(&info);
                    if !filter.matches(&attrs) {
                        debug!(device = %attrs, "ignoring non-matching device");
                        continue;
                    }
                    info!(device = %attrs, "device attached");
                    known.insert(info.id(), attrs.clone());
                    runtime_tx.send(RuntimeEvent::DeviceAttached(attrs))
                }
                HotplugEvent::Disconnected(id) => match known.remove(&id) {
                    Some(attrs) => {
                        info!(device = %attrs, "device detached");
                        runtime_tx.send(RuntimeEvent::DeviceDetached(attrs))
                    }
                    None => continue,
                },
            };

            if forwarded.is_err() {
                warn!("runtime event channel closed; stopping hotplug watcher");
                break;
            }
        }
        debug!("hotplug watcher finished");
    });

    Ok(DeviceWatcherHandle { task })
}
