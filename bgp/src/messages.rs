// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;
use crate::prefix::{format_prefix, parse_prefix};
use nom::{
    bytes::complete::{tag, take},
    number::complete::{be_u16, be_u32, u8 as parse_u8},
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::net::Ipv4Addr;

pub use crate::notification::{ErrorCode, NotificationMessage};

pub const MAX_MESSAGE_SIZE: usize = 4096;

/// According to RFC 4271 §4.1 the header marker is all ones.
pub const MARKER: [u8; 16] = [0xFFu8; 16];

/// The version number for BGP-4
pub const BGP4: u8 = 4;

/// BGP Message types.
///
/// Ref: RFC 4271 §4.1
#[derive(
    Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone,
)]
#[repr(u8)]
pub enum MessageType {
    /// The first message sent by each side once a TCP connection is
    /// established.
    Open = 1,

    /// Used to transfer routing information between BGP peers.
    Update = 2,

    /// Sent when an error condition is detected.
    Notification = 3,

    /// Exchanged between peers often enough not to cause the hold timer to
    /// expire.
    KeepAlive = 4,
}

impl From<&Message> for MessageType {
    fn from(m: &Message) -> Self {
        match m {
            Message::Open(_) => Self::Open,
            Message::Update(_) => Self::Update,
            Message::Notification(_) => Self::Notification,
            Message::KeepAlive => Self::KeepAlive,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Message {
    Open(OpenMessage),
    Update(UpdateMessage),
    Notification(NotificationMessage),
    KeepAlive,
}

impl Message {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Update(_) => "update",
            Self::Notification(_) => "notification",
            Self::KeepAlive => "keepalive",
        }
    }

    /// Serialize a complete message, header included, to wire format.
    pub fn to_wire(&self) -> Result<Vec<u8>, Error> {
        let body = match self {
            Self::Open(m) => m.to_wire()?,
            Self::Update(m) => m.to_wire()?,
            Self::Notification(m) => m.to_wire()?,
            Self::KeepAlive => Vec::new(),
        };
        let mut buf = Header::for_body(self.into(), body.len())?.to_wire();
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Deserialize one complete on-wire frame. The frame starts with the
    /// marker and must be exactly as long as its header says.
    pub fn from_wire(frame: &[u8]) -> Result<Message, Error> {
        let (hdr, consumed) = Header::from_wire(frame)?;
        if usize::from(hdr.length) < Header::WIRE_SIZE {
            return Err(Error::TooSmall("message header length".into()));
        }
        if usize::from(hdr.length) != frame.len() {
            return Err(Error::LengthMismatch {
                declared: hdr.length,
                actual: frame.len(),
            });
        }
        let body = &frame[consumed..];
        let msg = match hdr.typ {
            MessageType::Open => OpenMessage::from_wire(body)?.into(),
            MessageType::Update => UpdateMessage::from_wire(body)?.into(),
            MessageType::Notification => {
                NotificationMessage::from_wire(body)?.into()
            }
            MessageType::KeepAlive => {
                if !body.is_empty() {
                    return Err(Error::TooLarge("keepalive message".into()));
                }
                Message::KeepAlive
            }
        };
        Ok(msg)
    }
}

impl From<OpenMessage> for Message {
    fn from(m: OpenMessage) -> Message {
        Message::Open(m)
    }
}

impl From<UpdateMessage> for Message {
    fn from(m: UpdateMessage) -> Message {
        Message::Update(m)
    }
}

impl From<NotificationMessage> for Message {
    fn from(m: NotificationMessage) -> Message {
        Message::Notification(m)
    }
}

/// Each BGP message has a fixed sized header.
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///   |                                                               |
///   +                                                               +
///   |                           Marker                              |
///   +                                                               +
///   |                                                               |
///   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///   |          Length               |      Type     |
///   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// The marker is generated by [`Header::to_wire`] and checked by
/// [`Header::from_wire`], it is never carried in this object.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    /// Total length of the message, including the header.
    pub length: u16,

    /// Indicates the type of message.
    pub typ: MessageType,
}

impl Header {
    pub const WIRE_SIZE: usize = 19;

    /// Build the header for a body of the given length.
    pub fn for_body(typ: MessageType, body_len: usize) -> Result<Header, Error> {
        let length = body_len + Header::WIRE_SIZE;
        if length > MAX_MESSAGE_SIZE {
            return Err(Error::TooLarge(format!(
                "message length {length} exceeds {MAX_MESSAGE_SIZE}"
            )));
        }
        Ok(Header {
            length: length as u16,
            typ,
        })
    }

    /// Serialize the header to wire format.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = MARKER.to_vec();
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.push(self.typ.into());
        buf
    }

    /// Deserialize a header from wire format, returning it along with the
    /// number of bytes consumed.
    pub fn from_wire(input: &[u8]) -> Result<(Header, usize), Error> {
        if input.len() < Header::WIRE_SIZE {
            return Err(Error::TooSmall(format!(
                "header: {} < {}",
                input.len(),
                Header::WIRE_SIZE
            )));
        }
        let (input, _) = tag::<_, _, (&[u8], nom::error::ErrorKind)>(
            &MARKER[..],
        )(input)
        .map_err(|_| Error::NoMarker)?;
        let (input, length) = be_u16(input)?;
        let (_, typ) = parse_u8(input)?;
        let typ = MessageType::try_from(typ)?;
        Ok((Header { length, typ }, Header::WIRE_SIZE))
    }
}

/// The first message sent by each side once a TCP connection is established.
/// This speaker never sends optional parameters.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    Version    |     My Autonomous System      |   Hold Time   :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// :               |                BGP Identifier                 :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// :               | Opt Parm Len  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Ref: RFC 4271 §4.2
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OpenMessage {
    /// BGP protocol version.
    pub version: u8,

    /// Autonomous system number of the sender.
    pub asn: u16,

    /// Number of seconds the sender proposes for the hold timer.
    pub hold_time: u16,

    /// BGP identifier of the sender.
    pub id: Ipv4Addr,
}

impl OpenMessage {
    pub fn new(asn: u16, hold_time: u16, id: Ipv4Addr) -> OpenMessage {
        OpenMessage {
            version: BGP4,
            asn,
            hold_time,
            id,
        }
    }

    /// Serialize an open message body to wire format.
    pub fn to_wire(&self) -> Result<Vec<u8>, Error> {
        let mut buf = vec![self.version];
        buf.extend_from_slice(&self.asn.to_be_bytes());
        buf.extend_from_slice(&self.hold_time.to_be_bytes());
        buf.extend_from_slice(&self.id.octets());
        // opt param len
        buf.push(0);
        Ok(buf)
    }

    /// Deserialize an open message body from wire format. Optional
    /// parameters are skipped, capabilities are not negotiated.
    pub fn from_wire(input: &[u8]) -> Result<OpenMessage, Error> {
        let (input, version) = parse_u8(input)?;
        if version != BGP4 {
            return Err(Error::BadVersion(version));
        }
        let (input, asn) = be_u16(input)?;
        let (input, hold_time) = be_u16(input)?;
        let (input, id) = be_u32(input)?;
        let (input, param_len) = parse_u8(input)?;
        if input.len() < usize::from(param_len) {
            return Err(Error::TooSmall(
                "open message optional parameters".into(),
            ));
        }
        Ok(OpenMessage {
            version,
            asn,
            hold_time,
            id: Ipv4Addr::from(id),
        })
    }
}

pub mod path_attribute_flags {
    pub const OPTIONAL: u8 = 0b10000000;
    pub const TRANSITIVE: u8 = 0b01000000;
    pub const PARTIAL: u8 = 0b00100000;
    pub const EXTENDED_LENGTH: u8 = 0b00010000;

    /// Well-known, transitive, complete. The only flags this speaker emits
    /// or interprets.
    pub const WELL_KNOWN: u8 = TRANSITIVE;
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PathAttributeTypeCode {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Default,
    TryFromPrimitive,
    IntoPrimitive,
)]
#[repr(u8)]
pub enum PathOrigin {
    /// Interior gateway protocol
    #[default]
    Igp = 0,

    /// Exterior gateway protocol
    Egp = 1,

    /// Learned by some other means
    Incomplete = 2,
}

#[derive(
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Default,
    TryFromPrimitive,
    IntoPrimitive,
)]
#[repr(u8)]
pub enum AsPathType {
    AsSet = 1,
    #[default]
    AsSequence = 2,
}

/// A single AS_PATH segment of 2-octet autonomous system numbers.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct AsPath {
    pub typ: AsPathType,
    pub path: Vec<u16>,
}

impl AsPath {
    pub fn sequence(path: Vec<u16>) -> Self {
        Self {
            typ: AsPathType::AsSequence,
            path,
        }
    }

    pub fn set(path: Vec<u16>) -> Self {
        Self {
            typ: AsPathType::AsSet,
            path,
        }
    }
}

/// An update message advertises prefixes that share common path attributes
/// and withdraws prefixes that are no longer reachable.
///
/// ```text
/// +-----------------------------------------------------+
/// |   Withdrawn Routes Length (2 octets)                |
/// +-----------------------------------------------------+
/// |   Withdrawn Routes (variable)                       |
/// +-----------------------------------------------------+
/// |   Total Path Attribute Length (2 octets)            |
/// +-----------------------------------------------------+
/// |   Path Attributes (variable)                        |
/// +-----------------------------------------------------+
/// |   Network Layer Reachability Information (variable) |
/// +-----------------------------------------------------+
/// ```
///
/// Every withdrawn route and NLRI entry is encoded as a mask length octet
/// followed by all four octets of the network. The ORIGIN, AS_PATH and
/// NEXT_HOP attributes are only present when prefixes are announced.
///
/// Ref: RFC 4271 §4.3
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct UpdateMessage {
    /// Withdrawn prefixes in CIDR notation.
    pub withdrawn: Vec<String>,
    pub origin: PathOrigin,
    pub as_path: AsPath,
    /// IPv4 next hops in dotted notation.
    pub next_hops: Vec<String>,
    /// Announced prefixes in CIDR notation.
    pub prefixes: Vec<String>,
}

/// Wire size of one withdrawn route or NLRI entry.
const PREFIX_WIRE_SIZE: usize = 5;

impl UpdateMessage {
    /// Turn this announcement into the withdrawal of the same prefixes.
    pub fn into_withdrawal(mut self) -> Self {
        self.withdrawn = std::mem::take(&mut self.prefixes);
        self
    }

    pub fn is_withdrawal(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Serialize an update message body to wire format.
    pub fn to_wire(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();

        // withdrawn
        let withdrawn = Self::prefixes_to_wire(&self.withdrawn)?;
        if withdrawn.len() > u16::MAX as usize {
            return Err(Error::TooLarge(
                "update: too many withdrawn prefixes".into(),
            ));
        }
        buf.extend_from_slice(&(withdrawn.len() as u16).to_be_bytes());
        buf.extend_from_slice(&withdrawn);

        // path attributes
        let attrs = if self.prefixes.is_empty() {
            Vec::new()
        } else {
            self.path_attrs_to_wire()?
        };
        buf.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        buf.extend_from_slice(&attrs);

        // nlri
        buf.extend_from_slice(&Self::prefixes_to_wire(&self.prefixes)?);

        Ok(buf)
    }

    fn prefixes_to_wire(prefixes: &[String]) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::with_capacity(prefixes.len() * PREFIX_WIRE_SIZE);
        for p in prefixes {
            let (network, length) = parse_prefix(p)?;
            buf.push(length);
            buf.extend_from_slice(&network.to_be_bytes());
        }
        Ok(buf)
    }

    fn path_attrs_to_wire(&self) -> Result<Vec<u8>, Error> {
        use path_attribute_flags::WELL_KNOWN;

        if self.as_path.path.is_empty() {
            return Err(Error::EmptyAsPath);
        }
        if self.next_hops.is_empty() {
            return Err(Error::MissingNexthop);
        }

        let mut buf = vec![
            WELL_KNOWN,
            PathAttributeTypeCode::Origin.into(),
            1,
            self.origin.into(),
        ];

        // segment type and count, then two octets per AS
        let as_path_len = 2 * self.as_path.path.len() + 2;
        if as_path_len > u8::MAX as usize {
            return Err(Error::TooLarge("update: AS path too long".into()));
        }
        buf.extend_from_slice(&[
            WELL_KNOWN,
            PathAttributeTypeCode::AsPath.into(),
            as_path_len as u8,
            self.as_path.typ.into(),
            self.as_path.path.len() as u8,
        ]);
        for asn in &self.as_path.path {
            buf.extend_from_slice(&asn.to_be_bytes());
        }

        let next_hop_len = 4 * self.next_hops.len();
        if next_hop_len > u8::MAX as usize {
            return Err(Error::TooLarge("update: too many next hops".into()));
        }
        buf.extend_from_slice(&[
            WELL_KNOWN,
            PathAttributeTypeCode::NextHop.into(),
            next_hop_len as u8,
        ]);
        for nh in &self.next_hops {
            let addr: Ipv4Addr = nh
                .parse()
                .map_err(|_| Error::InvalidNexthop(nh.clone()))?;
            buf.extend_from_slice(&addr.octets());
        }

        Ok(buf)
    }

    /// Deserialize an update message body from wire format.
    pub fn from_wire(input: &[u8]) -> Result<UpdateMessage, Error> {
        let mut update = UpdateMessage::default();

        let (input, len) = be_u16(input)?;
        if usize::from(len) % PREFIX_WIRE_SIZE != 0 {
            return Err(Error::BadWithdrawnLength(len));
        }
        let (input, withdrawn_input) = take(len)(input)?;
        update.withdrawn = Self::prefixes_from_wire(withdrawn_input)?;

        let (input, len) = be_u16(input)?;
        if len == 0 {
            return Ok(update);
        }
        let (input, attrs_input) = take(len)(input)?;
        update.path_attrs_from_wire(attrs_input)?;

        if input.len() % PREFIX_WIRE_SIZE != 0 {
            return Err(Error::BadNlriLength(input.len()));
        }
        update.prefixes = Self::prefixes_from_wire(input)?;

        Ok(update)
    }

    fn prefixes_from_wire(buf: &[u8]) -> Result<Vec<String>, Error> {
        buf.chunks_exact(PREFIX_WIRE_SIZE)
            .map(|c| {
                let network = u32::from_be_bytes([c[1], c[2], c[3], c[4]]);
                format_prefix(network, c[0])
            })
            .collect()
    }

    fn path_attrs_from_wire(&mut self, mut buf: &[u8]) -> Result<(), Error> {
        use path_attribute_flags::{EXTENDED_LENGTH, WELL_KNOWN};

        while !buf.is_empty() {
            let (input, flags) = parse_u8(buf)?;
            let (input, type_code) = parse_u8(input)?;
            let (input, len) = if flags & EXTENDED_LENGTH != 0 {
                let (input, len) = be_u16(input)?;
                (input, usize::from(len))
            } else {
                let (input, len) = parse_u8(input)?;
                (input, usize::from(len))
            };
            let (input, value) = take(len)(input)?;
            buf = input;

            // optional or partial attributes are not interpreted
            if flags != WELL_KNOWN {
                continue;
            }
            let Ok(type_code) = PathAttributeTypeCode::try_from(type_code)
            else {
                continue;
            };

            match type_code {
                PathAttributeTypeCode::Origin => {
                    let (_, origin) = parse_u8(value)?;
                    self.origin = PathOrigin::try_from(origin)?;
                }
                PathAttributeTypeCode::AsPath => {
                    let (value, typ) = parse_u8(value)?;
                    let (mut value, count) = parse_u8(value)?;
                    self.as_path.typ = AsPathType::try_from(typ)?;
                    self.as_path.path.clear();
                    for _ in 0..count {
                        let (out, asn) = be_u16(value)?;
                        self.as_path.path.push(asn);
                        value = out;
                    }
                }
                PathAttributeTypeCode::NextHop => {
                    if len % 4 != 0 {
                        return Err(Error::BadNexthopLength(len));
                    }
                    self.next_hops = value
                        .chunks_exact(4)
                        .map(|c| {
                            Ipv4Addr::new(c[0], c[1], c[2], c[3]).to_string()
                        })
                        .collect();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pretty_hex::*;

    fn announce() -> UpdateMessage {
        UpdateMessage {
            origin: PathOrigin::Igp,
            as_path: AsPath::sequence(vec![1111]),
            next_hops: vec!["1.1.1.1".into()],
            prefixes: vec!["12.34.56.78/32".into()],
            ..Default::default()
        }
    }

    #[test]
    fn header_layout() {
        let h0 = Header {
            length: 0x0701,
            typ: MessageType::Notification,
        };
        assert_eq!(
            Header::for_body(MessageType::Notification, 0x0701 - 19)
                .expect("header"),
            h0
        );

        let buf = h0.to_wire();
        println!("buf: {}", buf.hex_dump());

        assert_eq!(
            buf,
            vec![
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
                0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // marker
                0x07, 0x01, // length
                3,    // type
            ]
        );

        let (h1, n) = Header::from_wire(&buf).expect("header from wire");
        assert_eq!(h0, h1);
        assert_eq!(n, Header::WIRE_SIZE);
    }

    #[test]
    fn header_bounds() {
        assert!(Header::for_body(MessageType::Update, 4096 - 19).is_ok());
        assert!(matches!(
            Header::for_body(MessageType::Update, 4096 - 18),
            Err(Error::TooLarge(_))
        ));
        assert!(matches!(
            Header::from_wire(&[0xff; 18]),
            Err(Error::TooSmall(_))
        ));
        let mut buf = vec![0xffu8; 19];
        buf[3] = 0;
        assert!(matches!(Header::from_wire(&buf), Err(Error::NoMarker)));
    }

    #[test]
    fn keepalive_is_bare_header() {
        let buf = Message::KeepAlive.to_wire().expect("keepalive");
        let mut expected = MARKER.to_vec();
        expected.extend_from_slice(&[0, 19, 4]);
        assert_eq!(buf, expected);
        assert_eq!(
            Message::from_wire(&buf).expect("keepalive"),
            Message::KeepAlive
        );
    }

    #[test]
    fn open_wire_layout() {
        let om0 = OpenMessage::new(1111, 30, Ipv4Addr::new(1, 1, 1, 1));

        let buf = Message::from(om0.clone()).to_wire().expect("open");
        println!("buf: {}", buf.hex_dump());

        assert_eq!(
            &buf[16..],
            &[
                0, 29, 1, // length, type
                4, // version
                0x04, 0x57, // asn
                0, 30, // hold time
                1, 1, 1, 1, // id
                0, // opt param len
            ]
        );

        let om1 = Message::from_wire(&buf).expect("open message from wire");
        assert_eq!(Message::Open(om0), om1);
    }

    #[test]
    fn open_bad_version() {
        let mut body = OpenMessage::new(1, 3, Ipv4Addr::LOCALHOST)
            .to_wire()
            .expect("open");
        body[0] = 3;
        assert!(matches!(
            OpenMessage::from_wire(&body),
            Err(Error::BadVersion(3))
        ));
    }

    #[test]
    fn open_skips_optional_parameters() {
        let mut body = OpenMessage::new(65000, 90, Ipv4Addr::new(2, 2, 2, 2))
            .to_wire()
            .expect("open");
        // capabilities: 4-octet ASN 65000
        let params = [2u8, 6, 65, 4, 0, 0, 0xfd, 0xe8];
        *body.last_mut().expect("param len") = params.len() as u8;
        body.extend_from_slice(&params);
        let om = OpenMessage::from_wire(&body).expect("open with params");
        assert_eq!(om, OpenMessage::new(65000, 90, Ipv4Addr::new(2, 2, 2, 2)));

        body.pop();
        assert!(OpenMessage::from_wire(&body).is_err());
    }

    #[test]
    fn update_wire_layout() {
        let buf = announce().to_wire().expect("update to wire");
        println!("buf: {}", buf.hex_dump());

        assert_eq!(
            buf,
            vec![
                0x00, 0x00, // withdrawn length
                0x00, 0x12, // path attribute length
                0x40, 0x01, 0x01, 0x00, // origin
                0x40, 0x02, 0x04, 0x02, 0x01, 0x04, 0x57, // as path
                0x40, 0x03, 0x04, 0x01, 0x01, 0x01, 0x01, // next hop
                0x20, 0x0c, 0x22, 0x38, 0x4e, // nlri
            ]
        );

        let um = UpdateMessage::from_wire(&buf).expect("update from wire");
        assert_eq!(um, announce());
    }

    #[test]
    fn update_full_frame() {
        let buf = Message::from(announce()).to_wire().expect("update");
        assert_eq!(&buf[..16], &MARKER);
        assert_eq!(u16::from_be_bytes([buf[16], buf[17]]), 46);
        assert_eq!(buf.len(), 46);
        assert_eq!(buf[18], 2);
    }

    #[test]
    fn withdrawal_has_no_path_attributes() {
        let w = announce().into_withdrawal();
        assert!(w.is_withdrawal());
        let buf = w.to_wire().expect("withdrawal to wire");
        assert_eq!(
            buf,
            vec![
                0x00, 0x05, // withdrawn length
                0x20, 0x0c, 0x22, 0x38, 0x4e, // withdrawn
                0x00, 0x00, // path attribute length
            ]
        );
        let um = UpdateMessage::from_wire(&buf).expect("withdrawal");
        assert_eq!(um.withdrawn, vec!["12.34.56.78/32".to_string()]);
        assert!(um.prefixes.is_empty());
        assert!(um.as_path.path.is_empty());
    }

    #[test]
    fn announce_requires_as_path_and_next_hop() {
        let mut m = announce();
        m.as_path.path.clear();
        assert!(matches!(m.to_wire(), Err(Error::EmptyAsPath)));

        let mut m = announce();
        m.next_hops.clear();
        assert!(matches!(m.to_wire(), Err(Error::MissingNexthop)));

        let mut m = announce();
        m.next_hops = vec!["1.1.1".into()];
        assert!(matches!(m.to_wire(), Err(Error::InvalidNexthop(_))));

        let mut m = announce();
        m.prefixes.push("12.34.56.0/33".into());
        assert!(matches!(m.to_wire(), Err(Error::InvalidPrefix(_))));

        let mut m = announce().into_withdrawal();
        m.withdrawn.push("bogus".into());
        assert!(matches!(m.to_wire(), Err(Error::InvalidPrefix(_))));
    }

    #[test]
    fn update_attribute_lengths_scale() {
        let m = UpdateMessage {
            origin: PathOrigin::Incomplete,
            as_path: AsPath::set(vec![1, 2, 3]),
            next_hops: vec!["10.0.0.1".into(), "10.0.0.2".into()],
            prefixes: vec!["10.1.0.0/16".into(), "10.2.0.0/16".into()],
            ..Default::default()
        };
        let buf = m.to_wire().expect("update");
        // origin 4 + as path 3+8 + next hop 3+8
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 26);
        assert_eq!(&buf[8..13], &[0x40, 0x02, 8, 1, 3]);
        assert_eq!(&buf[19..22], &[0x40, 0x03, 8]);
        assert_eq!(UpdateMessage::from_wire(&buf).expect("update"), m);
    }

    #[test]
    fn unknown_attributes_are_skipped() {
        let mut buf = announce().to_wire().expect("update");
        let nlri = buf.split_off(4 + 18);
        let mut attrs = buf.split_off(4);
        // optional transitive community and a well-known MED-like attribute
        attrs.extend_from_slice(&[0xc0, 8, 4, 0xfd, 0xe8, 0, 1]);
        attrs.extend_from_slice(&[0x40, 5, 4, 0, 0, 0, 100]);
        // extended length optional attribute
        attrs.extend_from_slice(&[0x90, 14, 0, 2, 0xaa, 0xbb]);
        buf.truncate(2);
        buf.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        buf.extend_from_slice(&attrs);
        buf.extend_from_slice(&nlri);

        let um = UpdateMessage::from_wire(&buf).expect("update");
        assert_eq!(um, announce());
    }

    #[test]
    fn update_decode_errors() {
        // withdrawn length not a multiple of 5
        let buf = [0u8, 4, 32, 1, 2, 3, 0, 0];
        assert!(matches!(
            UpdateMessage::from_wire(&buf),
            Err(Error::BadWithdrawnLength(4))
        ));

        // next hop length not a multiple of 4
        let buf = [0u8, 0, 0, 6, 0x40, 3, 3, 1, 1, 1];
        assert!(matches!(
            UpdateMessage::from_wire(&buf),
            Err(Error::BadNexthopLength(3))
        ));

        // trailing nlri not a multiple of 5
        let mut buf = announce().to_wire().expect("update");
        buf.pop();
        assert!(matches!(
            UpdateMessage::from_wire(&buf),
            Err(Error::BadNlriLength(4))
        ));

        // nlri mask longer than 32
        let mut buf = announce().to_wire().expect("update");
        buf[22] = 33;
        assert!(matches!(
            UpdateMessage::from_wire(&buf),
            Err(Error::InvalidPrefixLength(33))
        ));

        // truncated attribute
        let buf = [0u8, 0, 0, 4, 0x40, 2, 4, 2];
        assert!(UpdateMessage::from_wire(&buf).is_err());

        // invalid origin
        let mut buf = announce().to_wire().expect("update");
        buf[7] = 3;
        assert!(matches!(
            UpdateMessage::from_wire(&buf),
            Err(Error::PathOrigin(_))
        ));
    }

    #[test]
    fn frame_length_must_match() {
        let mut buf = Message::from(announce()).to_wire().expect("update");
        buf.push(0);
        assert!(matches!(
            Message::from_wire(&buf),
            Err(Error::LengthMismatch {
                declared: 46,
                actual: 47
            })
        ));

        let mut buf = Message::KeepAlive.to_wire().expect("keepalive");
        buf[17] = 18;
        buf.pop();
        assert!(Message::from_wire(&buf).is_err());

        let mut buf = Message::KeepAlive.to_wire().expect("keepalive");
        buf[18] = 5;
        assert!(matches!(
            Message::from_wire(&buf),
            Err(Error::MessageType(_))
        ));
    }

    #[test]
    fn notification_frame() {
        let m = NotificationMessage::new(6, 2, "shutdown").expect("cease");
        let buf = Message::from(m.clone()).to_wire().expect("notification");
        assert_eq!(buf.len(), 19 + 2 + 8);
        assert_eq!(
            Message::from_wire(&buf).expect("notification"),
            Message::Notification(m)
        );
    }
}
