// src/types.rs

use std::fmt;

/// Lifecycle of one supervised process.
///
/// `Running` → `Draining` (process exited, pipes may still hold output) →
/// `Completed`. A cooperative stop ends in `Detached` instead, from either of
/// the first two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    Draining,
    Completed,
    Detached,
}

impl SupervisorState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            SupervisorState::Running => 0,
            SupervisorState::Draining => 1,
            SupervisorState::Completed => 2,
            SupervisorState::Detached => 3,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SupervisorState::Running,
            1 => SupervisorState::Draining,
            2 => SupervisorState::Completed,
            _ => SupervisorState::Detached,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Running => "running",
            SupervisorState::Draining => "draining",
            SupervisorState::Completed => "completed",
            SupervisorState::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// USB hub port indicator selector (USB 2.0 spec, table 11-25).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Automatic,
    Amber,
    Green,
    Off,
}

impl IndicatorColor {
    pub fn selector(self) -> u8 {
        match self {
            IndicatorColor::Automatic => 0,
            IndicatorColor::Amber => 1,
            IndicatorColor::Green => 2,
            IndicatorColor::Off => 3,
        }
    }
}
