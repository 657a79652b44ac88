// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! NOTIFICATION messages and the table of error codes and subcodes this
//! speaker accepts.
//!
//! Ref: RFC 4271 §4.5, §6 and the IANA "BGP Error Subcodes" registries.

use crate::error::Error;
use nom::number::complete::u8 as parse_u8;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt::{self, Display, Formatter};

#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum ErrorCode {
    Header = 1,
    Open,
    Update,
    HoldTimerExpired,
    Fsm,
    Cease,
}

const HEADER_SUBCODES: &[(u8, &str)] = &[
    (1, "Connection Not Synchronized"),
    (2, "Bad Message Length"),
    (3, "Bad Message Type"),
];

// 5 is deprecated (authentication failure)
const OPEN_SUBCODES: &[(u8, &str)] = &[
    (1, "Unsupported Version Number"),
    (2, "Bad Peer AS"),
    (3, "Bad BGP Identifier"),
    (4, "Unsupported Optional Parameter"),
    (6, "Unacceptable Hold Time"),
    (7, "Unsupported Capability"),
];

// 7 is deprecated (AS routing loop)
const UPDATE_SUBCODES: &[(u8, &str)] = &[
    (1, "Malformed Attribute List"),
    (2, "Unrecognized Well-known Attribute"),
    (3, "Missing Well-known Attribute"),
    (4, "Attribute Flags Error"),
    (5, "Attribute Length Error"),
    (6, "Invalid ORIGIN Attribute"),
    (8, "Invalid NEXT_HOP Attribute"),
    (9, "Optional Attribute Error"),
    (10, "Invalid Network Field"),
    (11, "Malformed AS_PATH"),
];

const CEASE_SUBCODES: &[(u8, &str)] = &[
    (1, "Maximum Number of Prefixes Reached"),
    (2, "Administrative Shutdown"),
    (3, "Peer De-configured"),
    (4, "Administrative Reset"),
    (5, "Connection Rejected"),
    (6, "Other Configuration Change"),
    (7, "Connection Collision Resolution"),
    (8, "Out of Resources"),
    (9, "Hard Reset"),
    (10, "BFD Down"),
];

impl ErrorCode {
    pub fn text(&self) -> &'static str {
        match self {
            Self::Header => "Message Header Error",
            Self::Open => "OPEN Message Error",
            Self::Update => "UPDATE Message Error",
            Self::HoldTimerExpired => "Hold Timer Expired",
            Self::Fsm => "Finite State Machine Error",
            Self::Cease => "Cease",
        }
    }

    /// The subcode table for this code. Codes without a table accept any
    /// subcode.
    fn subcodes(&self) -> Option<&'static [(u8, &'static str)]> {
        match self {
            Self::Header => Some(HEADER_SUBCODES),
            Self::Open => Some(OPEN_SUBCODES),
            Self::Update => Some(UPDATE_SUBCODES),
            Self::HoldTimerExpired | Self::Fsm => None,
            Self::Cease => Some(CEASE_SUBCODES),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Header => "message header",
            Self::Open => "open",
            Self::Update => "update",
            Self::HoldTimerExpired => "hold timer",
            Self::Fsm => "fsm",
            Self::Cease => "cease",
        }
    }

    /// Human readable text for a subcode of this code, if the subcode is in
    /// the table.
    pub fn subcode_text(&self, subcode: u8) -> Option<&'static str> {
        self.subcodes()?
            .iter()
            .find(|(sc, _)| *sc == subcode)
            .map(|(_, text)| *text)
    }

    pub fn validate_subcode(&self, subcode: u8) -> Result<(), Error> {
        match self.subcodes() {
            None => Ok(()),
            Some(table) if table.iter().any(|(sc, _)| *sc == subcode) => {
                Ok(())
            }
            Some(_) => Err(Error::InvalidErrorSubcode {
                kind: self.kind(),
                subcode,
            }),
        }
    }
}

/// Check a raw (code, subcode) pair against the taxonomy.
pub fn validate(code: u8, subcode: u8) -> Result<ErrorCode, Error> {
    let error_code =
        ErrorCode::try_from(code).map_err(|_| Error::InvalidErrorCode(code))?;
    error_code.validate_subcode(subcode)?;
    Ok(error_code)
}

/// Sent when an error condition is detected. The connection is closed
/// immediately after sending it.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Error code    | Error subcode |   Data (variable)             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NotificationMessage {
    pub error_code: ErrorCode,
    pub error_subcode: u8,

    /// Free text carried after the code and subcode. Decoding is lossy for
    /// data that is not UTF-8.
    pub data: String,
}

impl NotificationMessage {
    pub fn new(
        code: u8,
        subcode: u8,
        data: impl Into<String>,
    ) -> Result<Self, Error> {
        let error_code = validate(code, subcode)?;
        Ok(Self {
            error_code,
            error_subcode: subcode,
            data: data.into(),
        })
    }

    /// Serialize the notification body to wire format.
    pub fn to_wire(&self) -> Result<Vec<u8>, Error> {
        self.error_code.validate_subcode(self.error_subcode)?;
        let mut buf = vec![self.error_code.into(), self.error_subcode];
        buf.extend_from_slice(self.data.as_bytes());
        Ok(buf)
    }

    /// Deserialize a notification body from wire format.
    pub fn from_wire(input: &[u8]) -> Result<NotificationMessage, Error> {
        if input.len() < 2 {
            return Err(Error::TooSmall("notification message".into()));
        }
        let (input, code) = parse_u8(input)?;
        let (input, subcode) = parse_u8(input)?;
        let error_code = validate(code, subcode)?;
        Ok(NotificationMessage {
            error_code,
            error_subcode: subcode,
            data: String::from_utf8_lossy(input).into_owned(),
        })
    }
}

impl Display for NotificationMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.error_code.text())?;
        match self.error_code.subcode_text(self.error_subcode) {
            Some(text) => write!(f, "{text}")?,
            None => write!(f, "{}", self.error_subcode)?,
        }
        if !self.data.is_empty() {
            write!(f, ": {}", self.data)?;
        }
        Ok(())
    }
}
