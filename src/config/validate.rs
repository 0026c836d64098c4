// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, HubSelector, RawConfigFile, RawConfigSection};
use crate::config::template::CommandTemplate;
use crate::errors::{DfuWatchError, Result};
use crate::usb::DeviceFilter;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DfuWatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let (poll_interval, status_interval, exit_linger) = validate_timing(&raw.config)?;

        let device = DeviceFilter {
            vendor_id: raw
                .device
                .vendor_id
                .as_deref()
                .map(|s| parse_usb_id(s).map_err(|e| config_error("[device].vendor_id", e)))
                .transpose()?,
            product_id: raw
                .device
                .product_id
                .as_deref()
                .map(|s| parse_usb_id(s).map_err(|e| config_error("[device].product_id", e)))
                .transpose()?,
            dfu_only: raw.device.dfu_only,
        };

        let flash =
            CommandTemplate::parse(&raw.flash.cmd).map_err(|e| config_error("[flash].cmd", e))?;

        let hub = raw
            .hub
            .map(|hub| -> Result<HubSelector> {
                Ok(HubSelector {
                    vendor_id: parse_usb_id(&hub.vendor_id)
                        .map_err(|e| config_error("[hub].vendor_id", e))?,
                    product_id: parse_usb_id(&hub.product_id)
                        .map_err(|e| config_error("[hub].product_id", e))?,
                })
            })
            .transpose()?;

        Ok(ConfigFile {
            poll_interval,
            status_interval,
            exit_linger,
            kill_on_stop: raw.config.kill_on_stop,
            device,
            flash,
            hub,
        })
    }
}

fn config_error(key: &str, reason: String) -> DfuWatchError {
    DfuWatchError::ConfigError(format!("{key}: {reason}"))
}

fn validate_timing(cfg: &RawConfigSection) -> Result<(Duration, Duration, Duration)> {
    let poll = parse_duration(&cfg.poll_interval)
        .map_err(|e| config_error("[config].poll_interval", e))?;
    if poll.is_zero() {
        return Err(config_error(
            "[config].poll_interval",
            "must be greater than zero".to_string(),
        ));
    }

    let status = parse_duration(&cfg.status_interval)
        .map_err(|e| config_error("[config].status_interval", e))?;
    if status.is_zero() {
        return Err(config_error(
            "[config].status_interval",
            "must be greater than zero".to_string(),
        ));
    }

    // Zero is allowed here: complete as soon as the process has exited.
    let linger =
        parse_duration(&cfg.exit_linger).map_err(|e| config_error("[config].exit_linger", e))?;

    Ok((poll, status, linger))
}

/// Parse a duration such as `250ms`, `2s`, `5m` or `1h`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    let secs_per_unit = match unit_part.trim().to_lowercase().as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        unit => {
            return Err(format!(
                "unsupported duration unit '{unit}'; expected ms, s, m, or h"
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

/// Parse a USB vendor/product id written in hex, with or without `0x`.
pub fn parse_usb_id(s: &str) -> std::result::Result<u16, String> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 4 {
        return Err(format!("'{s}' is not a 16-bit hex id"));
    }
    u16::from_str_radix(digits, 16).map_err(|e| format!("'{s}' is not a 16-bit hex id: {e}"))
}
