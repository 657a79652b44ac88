// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A minimal single-peer BGP-4 speaker.
//!
//! The crate is split into a wire codec ([`messages`], [`notification`],
//! [`prefix`]) and a session engine ([`session`]) that owns one TCP
//! connection to one peer, keeps a database of locally announced IPv4
//! prefixes ([`db`]) and replays that database whenever the session comes
//! back up.

pub mod clock;
pub mod config;
pub mod connection_tcp;
pub mod db;
pub mod error;
pub mod log;
pub mod messages;
pub mod notification;
pub mod prefix;
pub mod session;

#[cfg(test)]
mod proptest;


pub use config::SpeakerConfig;
pub use error::Error;
pub use messages::{AsPath, AsPathType, PathOrigin, UpdateMessage};
pub use session::{Speaker, UpdateHandler};

pub const BGP_PORT: u16 = 179;
pub const COMPONENT_BGP: &str = "bgp";
pub const MOD_SPEAKER: &str = "speaker";
pub const MOD_CONNECTION: &str = "connection";

/// How long blocking socket reads wait before re-checking whether the
/// session is still running.
// XXX: Make this configurable
pub const IO_TIMEOUT: std::time::Duration =
    std::time::Duration::from_millis(100);

#[macro_export]
macro_rules! lock {
    ($mtx:expr) => {
        $mtx.lock().expect("lock mutex")
    };
}
