// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use num_enum::TryFromPrimitiveError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    // configuration
    #[error("invalid router id: {0}")]
    InvalidRouterId(String),

    #[error("invalid AS number: 0")]
    InvalidAsn,

    #[error("hold time too small: {0} < 3")]
    HoldTimeTooSmall(u16),

    #[error("invalid peer address: {0}")]
    InvalidPeerAddress(String),

    #[error("failed to resolve peer {0} to an IP address")]
    Unresolvable(String),

    #[error("invalid debug time format: {0}")]
    InvalidTimeFormat(String),

    // codec
    #[error("too small: {0}")]
    TooSmall(String),

    #[error("too large: {0}")]
    TooLarge(String),

    #[error("no marker")]
    NoMarker,

    #[error("message length {declared} differs from frame length {actual}")]
    LengthMismatch { declared: u16, actual: usize },

    #[error("bad version: {0}")]
    BadVersion(u8),

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid prefix length {0}, max is 32")]
    InvalidPrefixLength(u8),

    #[error("invalid next hop: {0}")]
    InvalidNexthop(String),

    #[error("empty AS path")]
    EmptyAsPath,

    #[error("no next hop defined")]
    MissingNexthop,

    #[error("invalid withdrawn routes length {0}")]
    BadWithdrawnLength(u16),

    #[error("invalid next hop attribute length {0}")]
    BadNexthopLength(usize),

    #[error("invalid NLRI length {0}")]
    BadNlriLength(usize),

    #[error("invalid notification error code {0}")]
    InvalidErrorCode(u8),

    #[error("invalid notification {kind} error subcode {subcode}")]
    InvalidErrorSubcode { kind: &'static str, subcode: u8 },

    #[error("Path origin error")]
    PathOrigin(#[from] TryFromPrimitiveError<crate::messages::PathOrigin>),

    #[error("AS path type error")]
    AsPathType(#[from] TryFromPrimitiveError<crate::messages::AsPathType>),

    #[error("Message type error")]
    MessageType(#[from] TryFromPrimitiveError<crate::messages::MessageType>),

    #[error("message parse error")]
    Parse(nom::Err<(Vec<u8>, nom::error::ErrorKind)>),

    // session
    #[error("already running")]
    AlreadyRunning,

    #[error("not running")]
    NotRunning,

    #[error("prefix {0} already exists")]
    PrefixExists(String),

    #[error("prefix {0} not found")]
    PrefixNotFound(String),

    #[error("Attempt to send a message when not connected")]
    NotConnected,

    #[error("connection closed by peer")]
    PeerClosed,

    // transport
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl<'a> From<nom::Err<(&'a [u8], nom::error::ErrorKind)>> for Error {
    fn from(e: nom::Err<(&'a [u8], nom::error::ErrorKind)>) -> Error {
        Error::Parse(e.to_owned())
    }
}
