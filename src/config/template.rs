// src/config/template.rs

//! Flash command templates.
//!
//! `{serial}`, `{devpath}`, `{port}`, `{vendor_id}` and `{product_id}` are
//! replaced with the attached device's attributes; `{{` and `}}` produce
//! literal braces. Substituted values are shell-quoted when needed so a
//! hostile serial number cannot inject shell syntax.

use std::fmt;

use crate::usb::DeviceAttributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Serial,
    Devpath,
    Port,
    VendorId,
    ProductId,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "serial" => Some(Field::Serial),
            "devpath" => Some(Field::Devpath),
            "port" => Some(Field::Port),
            "vendor_id" => Some(Field::VendorId),
            "product_id" => Some(Field::ProductId),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Field::Serial => "serial",
            Field::Devpath => "devpath",
            Field::Port => "port",
            Field::VendorId => "vendor_id",
            Field::ProductId => "product_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Field),
}

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl CommandTemplate {
    pub fn parse(source: &str) -> Result<Self, String> {
        if source.trim().is_empty() {
            return Err("flash command must not be empty".to_string());
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(format!("unterminated placeholder `{{{name}` in `{source}`"));
                    }
                    let field = Field::parse(name.trim()).ok_or_else(|| {
                        format!(
                            "unknown placeholder `{{{name}}}` (expected serial, devpath, port, vendor_id or product_id)"
                        )
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(field));
                }
                '}' => return Err(format!("unmatched `}}` in `{source}`")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render for a device.
    ///
    /// Fails if a placeholder has no value for this device (no serial number,
    /// or no port in the devpath).
    pub fn render(&self, device: &DeviceAttributes) -> Result<String, String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(field) => {
                    let value = field_value(*field, device).ok_or_else(|| {
                        format!("device {device} has no value for `{{{}}}`", field.name())
                    })?;
                    out.push_str(&shell_quote(&value));
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn field_value(field: Field, device: &DeviceAttributes) -> Option<String> {
    match field {
        Field::Serial => device.serial.clone().filter(|s| !s.is_empty()),
        Field::Devpath => Some(device.devpath.clone()),
        Field::Port => device.port().map(|p| p.to_string()),
        Field::VendorId => Some(format!("{:04x}", device.vendor_id)),
        Field::ProductId => Some(format!("{:04x}", device.product_id)),
    }
}

/// Single-quote `value` for POSIX shells unless it only contains safe
/// characters.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._/:=@%+-".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
