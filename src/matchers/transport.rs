// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decision logic shared by the matchers of transport protocols whose header starts with the
//! source and destination ports.

use crate::{
    headers::{Ipv4Header, TransportPorts, IPV4_MIN_HEADER_LEN},
    matchers::MatchOutcome,
    packet::PacketView,
    rule::Hook,
};
use std::ops::RangeInclusive;

/// A transport protocol that a port matcher applies to.
pub(super) struct PortProtocol {
    pub name: &'static str,
    pub number: u8,
    pub min_header_len: usize,
    /// Length of the full header given its first `min_header_len` bytes, or `None` if the
    /// header is malformed.
    pub header_len: fn(&[u8]) -> Option<usize>,
}

/// Inclusive source and destination port ranges.
///
/// Ranges are not required to be ordered: a range whose start is past its end contains no port,
/// so such a matcher never matches. `iptables` accepts those ranges and so do we.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub(super) struct PortRanges {
    pub source: RangeInclusive<u16>,
    pub destination: RangeInclusive<u16>,
}

impl PortRanges {
    pub fn matches(
        &self,
        hook: Hook,
        packet: &mut dyn PacketView,
        protocol: &PortProtocol,
    ) -> MatchOutcome {
        let ports = match transport_ports(hook, packet, protocol) {
            Ok(ports) => ports,
            Err(outcome) => return outcome,
        };

        if self.source.contains(&ports.src_port()) && self.destination.contains(&ports.dst_port()) {
            MatchOutcome::Match
        } else {
            MatchOutcome::NoMatch
        }
    }
}

/// Finds the ports of `packet`, parsing headers on the way if an earlier stage has not.
///
/// Returns the outcome to report when the ports are unavailable.
fn transport_ports(
    hook: Hook,
    packet: &mut dyn PacketView,
    protocol: &PortProtocol,
) -> Result<TransportPorts, MatchOutcome> {
    // A packet without a usable network header is malformed whatever its protocol, so it is
    // dropped before the protocol comparison.
    let network_header = network_header(hook, packet).ok_or(MatchOutcome::Hotdrop)?;
    if network_header.protocol() != protocol.number {
        return Err(MatchOutcome::NoMatch);
    }

    // Non-initial fragments carry no transport header. An offset of one is a fragment that
    // overlaps the header of the first fragment, which is never legitimate.
    match packet.fragment_offset() {
        0 => {}
        1 => {
            log_debug!("{}: dropping fragment overlapping the transport header", protocol.name);
            return Err(MatchOutcome::Hotdrop);
        }
        _ => return Err(MatchOutcome::NoMatch),
    }

    if let Some(header) = packet.transport_header() {
        return parse_ports(header, protocol);
    }

    // No earlier stage has parsed the transport header; it is at the front of the data.
    let Some(prefix) = packet.pull_up(protocol.min_header_len) else {
        log_debug!("{}: packet too short for transport header at {hook}", protocol.name);
        return Err(MatchOutcome::Hotdrop);
    };
    let Some(header_len) = (protocol.header_len)(prefix) else {
        log_debug!("{}: malformed transport header at {hook}", protocol.name);
        return Err(MatchOutcome::Hotdrop);
    };
    let Some(header) = packet.set_transport_header(header_len) else {
        log_debug!("{}: packet too short for {header_len} byte transport header", protocol.name);
        return Err(MatchOutcome::Hotdrop);
    };
    parse_ports(header, protocol)
}

fn parse_ports(header: &[u8], protocol: &PortProtocol) -> Result<TransportPorts, MatchOutcome> {
    if header.len() < protocol.min_header_len {
        log_debug!("{}: transport header of {} bytes is truncated", protocol.name, header.len());
        return Err(MatchOutcome::Hotdrop);
    }
    TransportPorts::parse(header).ok_or(MatchOutcome::Hotdrop)
}

/// Returns the network header of `packet`, or `None` if the packet is malformed.
///
/// Packets are only seen before network-layer parsing at [`Hook::PreRouting`], in which case the
/// header is parsed here and recorded on the packet.
fn network_header(hook: Hook, packet: &mut dyn PacketView) -> Option<Ipv4Header> {
    if let Some(bytes) = packet.network_header() {
        return Ipv4Header::parse(bytes).filter(Ipv4Header::is_well_formed);
    }

    if hook != Hook::PreRouting {
        log_debug!("no network header at {hook}");
        return None;
    }

    let Some(header) = packet.pull_up(IPV4_MIN_HEADER_LEN).and_then(Ipv4Header::parse) else {
        log_debug!("packet too short for network header at {hook}");
        return None;
    };
    if !header.is_well_formed() {
        log_debug!("malformed network header at {hook}: {header:?}");
        return None;
    }
    if packet.set_network_header(header.header_len()).is_none() {
        log_debug!("packet too short for {} byte network header", header.header_len());
        return None;
    }
    Some(header)
}
