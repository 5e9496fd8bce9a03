// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The `udp` match extension.

use crate::{
    codec,
    errors::MatcherError,
    headers::UDP_HEADER_LEN,
    matchers::{
        transport::{PortProtocol, PortRanges},
        MatchMaker, MatchOutcome, Matcher,
    },
    packet::PacketView,
    rule::{Hook, IpHeaderFilter},
    uapi::{xt_udp, XtUdpInverseFlags, IPPROTO_UDP},
};
use std::{mem::size_of, ops::RangeInclusive};
use zerocopy::byteorder::little_endian as le;

pub const MATCHER_NAME_UDP: &str = "udp";

const UDP: PortProtocol = PortProtocol {
    name: MATCHER_NAME_UDP,
    number: IPPROTO_UDP,
    min_header_len: UDP_HEADER_LEN,
    header_len: udp_header_len,
};

fn udp_header_len(_header: &[u8]) -> Option<usize> {
    Some(UDP_HEADER_LEN)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UdpMatchMaker;

impl MatchMaker for UdpMatchMaker {
    type Matcher = UdpMatcher;

    const NAME: &'static str = MATCHER_NAME_UDP;

    fn marshal(&self, matcher: &UdpMatcher) -> Vec<u8> {
        let ports = &matcher.ports;
        let xt_udp = xt_udp {
            spts: [le::U16::new(*ports.source.start()), le::U16::new(*ports.source.end())],
            dpts: [
                le::U16::new(*ports.destination.start()),
                le::U16::new(*ports.destination.end()),
            ],
            ..Default::default()
        };
        codec::marshal_entry_match(MATCHER_NAME_UDP, &codec::encode(&xt_udp))
    }

    fn unmarshal(&self, buf: &[u8], filter: &IpHeaderFilter) -> Result<UdpMatcher, MatcherError> {
        let match_data = codec::decode_prefix::<xt_udp>(buf).map_err(|_| {
            MatcherError::BufferTooSmall {
                matcher: MATCHER_NAME_UDP,
                size: buf.len(),
                needed: size_of::<xt_udp>(),
            }
        })?;
        log_debug!("parsed xt_udp: {match_data:?}");

        if match_data.invflags != 0 {
            log_warn!(
                "unsupported UDP matcher inverse flags {:?}",
                XtUdpInverseFlags::from_bits_truncate(match_data.invflags)
            );
            return Err(MatcherError::UnsupportedFlags {
                matcher: MATCHER_NAME_UDP,
                field: "invflags",
                value: match_data.invflags,
            });
        }

        if filter.protocol != u16::from(IPPROTO_UDP) {
            log_warn!("UDP matching is only valid for protocol {IPPROTO_UDP}");
            return Err(MatcherError::ProtocolMismatch {
                matcher: MATCHER_NAME_UDP,
                required: IPPROTO_UDP,
                found: filter.protocol,
            });
        }

        Ok(UdpMatcher::new(
            match_data.spts[0].get()..=match_data.spts[1].get(),
            match_data.dpts[0].get()..=match_data.dpts[1].get(),
        ))
    }
}

/// Matches UDP datagrams whose ports fall in the configured ranges.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct UdpMatcher {
    ports: PortRanges,
}

impl UdpMatcher {
    pub fn new(source_ports: RangeInclusive<u16>, destination_ports: RangeInclusive<u16>) -> Self {
        Self { ports: PortRanges { source: source_ports, destination: destination_ports } }
    }

    pub fn source_ports(&self) -> &RangeInclusive<u16> {
        &self.ports.source
    }

    pub fn destination_ports(&self) -> &RangeInclusive<u16> {
        &self.ports.destination
    }
}

impl Matcher for UdpMatcher {
    fn name(&self) -> &'static str {
        MATCHER_NAME_UDP
    }

    fn matches(
        &self,
        hook: Hook,
        packet: &mut dyn PacketView,
        _interface_name: &str,
    ) -> MatchOutcome {
        self.ports.matches(hook, packet, &UDP)
    }
}
