// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Conversions between CIDR text and the (network, mask length) pairs
//! carried in withdrawn routes and NLRI.

use crate::error::Error;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Parse an IPv4 CIDR string such as `10.0.0.0/8` into its network, as a
/// host-order integer with host bits cleared, and its mask length.
pub fn parse_prefix(s: &str) -> Result<(u32, u8), Error> {
    let (addr, len) = s
        .split_once('/')
        .ok_or_else(|| Error::InvalidPrefix(s.to_owned()))?;
    let addr: Ipv4Addr = addr
        .parse()
        .map_err(|_| Error::InvalidPrefix(s.to_owned()))?;
    // reject signs and padding that u8 parsing would otherwise accept
    if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidPrefix(s.to_owned()));
    }
    let length: u8 = len
        .parse()
        .map_err(|_| Error::InvalidPrefix(s.to_owned()))?;
    if length > 32 {
        return Err(Error::InvalidPrefix(s.to_owned()));
    }
    Ok((u32::from(addr) & mask(length), length))
}

/// Render a network and mask length in canonical CIDR form. Host bits are
/// cleared.
pub fn format_prefix(network: u32, length: u8) -> Result<String, Error> {
    if length > 32 {
        return Err(Error::InvalidPrefixLength(length));
    }
    Ok(format!(
        "{}/{}",
        Ipv4Addr::from(network & mask(length)),
        length
    ))
}

fn mask(length: u8) -> u32 {
    match length {
        0 => 0,
        l => u32::MAX << (32 - u32::from(l.min(32))),
    }
}

/// Turn a peer specification into an IP address string. Literal addresses
/// are returned as is, anything else is resolved as a hostname and the first
/// address of the answer is used.
pub fn parse_peer_address(s: &str) -> Result<String, Error> {
    if s.parse::<IpAddr>().is_ok() {
        return Ok(s.to_owned());
    }

    // The resolver wants a port, it plays no part in the answer.
    let addrs = (s, 0u16)
        .to_socket_addrs()
        .map_err(|e| Error::InvalidPeerAddress(format!("{s}: {e}")))?;

    addrs
        .map(|sa| sa.ip())
        .next()
        .map(|ip| ip.to_string())
        .ok_or_else(|| Error::Unresolvable(s.to_owned()))
}
