// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for the wire format.
//!
//! These check the invariants the session relies on:
//! - prefixes come back canonical whatever host bits they were given
//! - OPEN, UPDATE and NOTIFICATION survive a trip through a full frame
//! - the frame buffer recovers every message no matter how reads split
//!   the byte stream

use crate::connection_tcp::FrameBuffer;
use crate::messages::{
    AsPath, AsPathType, Message, NotificationMessage, OpenMessage,
    PathOrigin, UpdateMessage,
};
use crate::prefix::{format_prefix, parse_prefix};
use proptest::prelude::*;
use std::net::Ipv4Addr;

// =============================================================================
// Strategies
// =============================================================================

/// Canonical IPv4 prefixes in CIDR notation.
fn prefix_strategy() -> impl Strategy<Value = String> {
    (any::<u32>(), 0u8..=32u8).prop_map(|(bits, length)| {
        let mask = if length == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(length))
        };
        format!("{}/{}", Ipv4Addr::from(bits & mask), length)
    })
}

fn prefixes_strategy(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prefix_strategy(), 0..max)
}

fn origin_strategy() -> impl Strategy<Value = PathOrigin> {
    prop_oneof![
        Just(PathOrigin::Igp),
        Just(PathOrigin::Egp),
        Just(PathOrigin::Incomplete),
    ]
}

fn as_path_strategy() -> impl Strategy<Value = AsPath> {
    (
        prop_oneof![Just(AsPathType::AsSequence), Just(AsPathType::AsSet)],
        prop::collection::vec(1u16.., 1..20),
    )
        .prop_map(|(typ, path)| AsPath { typ, path })
}

fn next_hops_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        any::<u32>().prop_map(|b| Ipv4Addr::from(b).to_string()),
        1..8,
    )
}

fn announcement_strategy() -> impl Strategy<Value = UpdateMessage> {
    (
        prefixes_strategy(10),
        origin_strategy(),
        as_path_strategy(),
        next_hops_strategy(),
        prop::collection::vec(prefix_strategy(), 1..10),
    )
        .prop_map(|(withdrawn, origin, as_path, next_hops, prefixes)| {
            UpdateMessage {
                withdrawn,
                origin,
                as_path,
                next_hops,
                prefixes,
            }
        })
}

fn withdrawal_strategy() -> impl Strategy<Value = UpdateMessage> {
    prefixes_strategy(50).prop_map(|withdrawn| UpdateMessage {
        withdrawn,
        ..Default::default()
    })
}

/// A (code, subcode) pair the taxonomy accepts.
fn error_code_strategy() -> impl Strategy<Value = (u8, u8)> {
    prop_oneof![
        (Just(1u8), 1u8..=3),
        (Just(2u8), prop::sample::select(vec![1u8, 2, 3, 4, 6, 7])),
        (
            Just(3u8),
            prop::sample::select(vec![1u8, 2, 3, 4, 5, 6, 8, 9, 10, 11])
        ),
        (Just(4u8), any::<u8>()),
        (Just(5u8), any::<u8>()),
        (Just(6u8), 1u8..=10),
    ]
}

fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        Just(Message::KeepAlive),
        (1u16.., 3u16.., any::<u32>()).prop_map(|(asn, hold, id)| {
            OpenMessage::new(asn, hold, Ipv4Addr::from(id)).into()
        }),
        announcement_strategy().prop_map(Message::from),
        withdrawal_strategy().prop_map(Message::from),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Property: parsing masks host bits and formatting gives the canonical
    /// string back
    #[test]
    fn prop_prefix_canonical(bits in any::<u32>(), length in 0u8..=32u8) {
        let input = format!("{}/{}", Ipv4Addr::from(bits), length);
        let (network, parsed_length) = parse_prefix(&input)
            .expect("should parse");
        prop_assert_eq!(parsed_length, length);

        let canonical = format_prefix(network, length).expect("should format");
        let (again, _) = parse_prefix(&canonical).expect("should reparse");
        prop_assert_eq!(again, network, "canonical form is a fixed point");
    }

    /// Property: announcements round-trip through a full frame
    #[test]
    fn prop_update_announcement_roundtrip(update in announcement_strategy()) {
        let msg = Message::from(update);
        let wire = msg.to_wire().expect("should encode");
        let decoded = Message::from_wire(&wire).expect("should decode");
        prop_assert_eq!(decoded, msg);
    }

    /// Property: withdraw-only updates carry no attributes and round-trip
    #[test]
    fn prop_update_withdrawal_roundtrip(update in withdrawal_strategy()) {
        let wire = update.to_wire().expect("should encode");
        prop_assert_eq!(&wire[2 + update.withdrawn.len() * 5..], &[0u8, 0][..]);
        let decoded = UpdateMessage::from_wire(&wire).expect("should decode");
        prop_assert_eq!(decoded, update);
    }

    /// Property: every valid notification round-trips and renders
    #[test]
    fn prop_notification_roundtrip(
        (code, subcode) in error_code_strategy(),
        data in "[ -~]{0,32}",
    ) {
        let n = NotificationMessage::new(code, subcode, data)
            .expect("valid notification");
        let msg = Message::from(n.clone());
        let wire = msg.to_wire().expect("should encode");
        prop_assert_eq!(Message::from_wire(&wire).expect("should decode"), msg);
        prop_assert!(n.to_string().starts_with(n.error_code.text()));
    }

    /// Property: the frame buffer recovers every message regardless of how
    /// the stream is split into reads
    #[test]
    fn prop_frames_survive_any_split(
        msgs in prop::collection::vec(message_strategy(), 1..8),
        cuts in prop::collection::vec(1usize..64, 0..32),
    ) {
        let mut stream = Vec::new();
        for m in &msgs {
            stream.extend(m.to_wire().expect("should encode"));
        }

        let mut fb = FrameBuffer::default();
        let mut decoded = Vec::new();
        let mut rest = stream.as_slice();
        let mut cuts = cuts.into_iter();
        while !rest.is_empty() {
            let n = cuts.next().unwrap_or(rest.len()).min(rest.len());
            fb.extend(&rest[..n]);
            rest = &rest[n..];
            while let Some(frame) = fb.next_frame() {
                let frame = frame.expect("no bad frames in a clean stream");
                decoded.push(Message::from_wire(&frame).expect("should decode"));
            }
        }
        prop_assert_eq!(decoded, msgs);
        prop_assert!(fb.is_empty());
    }
}
