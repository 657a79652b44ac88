// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::DEFAULT_DEBUG_TIME_FORMAT;
use crate::error::Error;
use crate::lock;
use chrono::format::{Item, StrftimeItems};
use slog::{Drain, Logger};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub fn init_logger() -> Logger {
    build_logger(std::io::stdout())
}

pub fn build_logger<W: Write + Send + 'static>(w: W) -> Logger {
    let drain = slog_bunyan::new(w).build().fuse();
    let drain = slog_async::Async::new(drain)
        .chan_size(0x8000)
        .build()
        .fuse();
    slog::Logger::root(drain, slog::o!())
}

/// Reject strftime strings chrono cannot render.
pub fn check_time_format(fmt: &str) -> Result<(), Error> {
    if StrftimeItems::new(fmt).any(|i| matches!(i, Item::Error)) {
        return Err(Error::InvalidTimeFormat(fmt.to_owned()));
    }
    Ok(())
}

/// Runtime switch for debug records. Each record emitted while the switch
/// is on carries a local time stamp rendered with the configured format.
pub struct DebugSwitch {
    enabled: AtomicBool,
    time_format: Mutex<String>,
}

impl DebugSwitch {
    pub fn new(enabled: bool, time_format: Option<&str>) -> Result<Self, Error> {
        let time_format = time_format.unwrap_or(DEFAULT_DEBUG_TIME_FORMAT);
        check_time_format(time_format)?;
        Ok(Self {
            enabled: AtomicBool::new(enabled),
            time_format: Mutex::new(time_format.to_owned()),
        })
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_time_format(&self, fmt: &str) -> Result<(), Error> {
        check_time_format(fmt)?;
        *lock!(self.time_format) = fmt.to_owned();
        Ok(())
    }

    pub fn time_format(&self) -> String {
        lock!(self.time_format).clone()
    }

    /// The time stamp for a debug record, or `None` when debugging is off.
    pub fn stamp(&self) -> Option<String> {
        if !self.enabled() {
            return None;
        }
        let fmt = lock!(self.time_format);
        Some(chrono::Local::now().format(fmt.as_str()).to_string())
    }
}

macro_rules! speaker_log {
    ($self:expr, $level:ident, $unit:expr, $msg:expr; $($key:expr => $value:expr),*) => {
        slog::$level!($self.log,
            $msg;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_SPEAKER,
            "unit" => $unit,
            "peer" => $self.params.peer,
            $($key => $value),*
        )
    };
    ($self:expr, $level:ident, $unit:expr, $msg:expr, $($args:expr),*; $($key:expr => $value:expr),*) => {
        slog::$level!($self.log,
            $msg, $($args),*;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_SPEAKER,
            "unit" => $unit,
            "peer" => $self.params.peer,
            $($key => $value),*
        )
    };
    ($self:expr, $level:ident, $unit:expr, $msg:expr) => {
        slog::$level!($self.log,
            $msg;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_SPEAKER,
            "unit" => $unit,
            "peer" => $self.params.peer,
        )
    };
    ($self:expr, $level:ident, $unit:expr, $msg:expr, $($args:expr),*) => {
        slog::$level!($self.log,
            $msg, $($args),*;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_SPEAKER,
            "unit" => $unit,
            "peer" => $self.params.peer,
        )
    };
}

// Debug records only go out while the speaker's debug switch is on.
macro_rules! speaker_debug {
    ($self:expr, $unit:expr, $msg:expr) => {
        if let Some(time) = $self.debug.stamp() {
            crate::log::speaker_log!($self, debug, $unit, $msg; "time" => time)
        }
    };
    ($self:expr, $unit:expr, $msg:expr, $($args:expr),*) => {
        if let Some(time) = $self.debug.stamp() {
            crate::log::speaker_log!(
                $self, debug, $unit, $msg, $($args),*; "time" => time
            )
        }
    };
}

macro_rules! connection_log {
    ($self:expr, $level:ident, $msg:expr; $($key:expr => $value:expr),*) => {
        slog::$level!($self.log,
            $msg;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_CONNECTION,
            "unit" => UNIT_CONNECTION,
            "peer" => $self.peer,
            "connection" => $self.id,
            $($key => $value),*
        )
    };
    ($self:expr, $level:ident, $msg:expr, $($args:expr),*; $($key:expr => $value:expr),*) => {
        slog::$level!($self.log,
            $msg, $($args),*;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_CONNECTION,
            "unit" => UNIT_CONNECTION,
            "peer" => $self.peer,
            "connection" => $self.id,
            $($key => $value),*
        )
    };
    ($self:expr, $level:ident, $msg:expr) => {
        slog::$level!($self.log,
            $msg;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_CONNECTION,
            "unit" => UNIT_CONNECTION,
            "peer" => $self.peer,
            "connection" => $self.id,
        )
    };
    ($self:expr, $level:ident, $msg:expr, $($args:expr),*) => {
        slog::$level!($self.log,
            $msg, $($args),*;
            "component" => crate::COMPONENT_BGP,
            "module" => crate::MOD_CONNECTION,
            "unit" => UNIT_CONNECTION,
            "peer" => $self.peer,
            "connection" => $self.id,
        )
    };
}

pub(crate) use {connection_log, speaker_debug, speaker_log};
