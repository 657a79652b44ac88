// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::log::check_time_format;
use crate::prefix::parse_peer_address;
use crate::BGP_PORT;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default strftime format for the time stamp attached to debug records.
pub const DEFAULT_DEBUG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// The smallest hold time the speaker accepts, in seconds.
pub const MIN_HOLD_TIME: u16 = 3;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeakerConfig {
    /// Router ID in dotted IPv4 format.
    pub router_id: String,

    /// Local autonomous system number.
    pub asn: u16,

    /// Hold time in seconds. Keepalives go out every third of it.
    pub hold_time: u16,

    /// Peer IP address or hostname.
    pub peer: String,

    /// TCP port the peer listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Emit debug records.
    #[serde(default)]
    pub debug: bool,

    /// Time stamp format for debug records.
    #[serde(default)]
    pub debug_time_format: Option<String>,
}

fn default_port() -> u16 {
    BGP_PORT
}

impl SpeakerConfig {
    pub fn new(
        router_id: impl Into<String>,
        asn: u16,
        hold_time: u16,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            router_id: router_id.into(),
            asn,
            hold_time,
            peer: peer.into(),
            port: BGP_PORT,
            debug: false,
            debug_time_format: None,
        }
    }

    /// Check every field and resolve the peer, producing the parameters the
    /// session runs with.
    pub fn validate(&self) -> Result<SessionParams, Error> {
        let id: Ipv4Addr = self
            .router_id
            .parse()
            .map_err(|_| Error::InvalidRouterId(self.router_id.clone()))?;
        if self.asn == 0 {
            return Err(Error::InvalidAsn);
        }
        if self.hold_time < MIN_HOLD_TIME {
            return Err(Error::HoldTimeTooSmall(self.hold_time));
        }
        if let Some(fmt) = &self.debug_time_format {
            check_time_format(fmt)?;
        }
        let peer: IpAddr = parse_peer_address(&self.peer)?
            .parse()
            .map_err(|_| Error::InvalidPeerAddress(self.peer.clone()))?;
        Ok(SessionParams {
            id,
            asn: self.asn,
            hold_time: self.hold_time,
            peer: SocketAddr::new(peer, self.port),
        })
    }
}

/// Validated session parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub id: Ipv4Addr,
    pub asn: u16,
    pub hold_time: u16,
    pub peer: SocketAddr,
}

impl SessionParams {
    /// Time between keepalives, a third of the hold time.
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.hold_time / 3))
    }
}
