// src/config/mod.rs

//! Configuration: TOML model, loading, validation and the flash command
//! template.

pub mod loader;
pub mod model;
pub mod template;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, HubSelector, RawConfigFile};
pub use template::{shell_quote, CommandTemplate};
pub use validate::{parse_duration, parse_usb_id};
