// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The `tcp` match extension (`-p tcp --sport ... --dport ...`).

use crate::{
    codec,
    errors::MatcherError,
    headers::{tcp_header_len, TCP_MIN_HEADER_LEN},
    matchers::{
        transport::{PortProtocol, PortRanges},
        MatchMaker, MatchOutcome, Matcher,
    },
    packet::PacketView,
    rule::{Hook, IpHeaderFilter},
    uapi::{xt_tcp, XtTcpInverseFlags, IPPROTO_TCP},
};
use std::{mem::size_of, ops::RangeInclusive};
use zerocopy::byteorder::little_endian as le;

pub const MATCHER_NAME_TCP: &str = "tcp";

const TCP: PortProtocol = PortProtocol {
    name: MATCHER_NAME_TCP,
    number: IPPROTO_TCP,
    min_header_len: TCP_MIN_HEADER_LEN,
    header_len: tcp_header_len,
};

/// Builds [`TcpMatcher`]s from `xt_tcp`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpMatchMaker;

impl MatchMaker for TcpMatchMaker {
    type Matcher = TcpMatcher;

    const NAME: &'static str = MATCHER_NAME_TCP;

    fn marshal(&self, matcher: &TcpMatcher) -> Vec<u8> {
        let ports = &matcher.ports;
        let xt_tcp = xt_tcp {
            spts: [le::U16::new(*ports.source.start()), le::U16::new(*ports.source.end())],
            dpts: [
                le::U16::new(*ports.destination.start()),
                le::U16::new(*ports.destination.end()),
            ],
            ..Default::default()
        };
        codec::marshal_entry_match(MATCHER_NAME_TCP, &codec::encode(&xt_tcp))
    }

    fn unmarshal(&self, buf: &[u8], filter: &IpHeaderFilter) -> Result<TcpMatcher, MatcherError> {
        // For alignment reasons, the match's total size may exceed what's strictly necessary to
        // hold `xt_tcp`.
        let match_data = codec::decode_prefix::<xt_tcp>(buf).map_err(|_| {
            MatcherError::BufferTooSmall {
                matcher: MATCHER_NAME_TCP,
                size: buf.len(),
                needed: size_of::<xt_tcp>(),
            }
        })?;
        log_debug!("parsed xt_tcp: {match_data:?}");

        for (field, value) in [
            ("option", match_data.option),
            ("flg_mask", match_data.flg_mask),
            ("flg_cmp", match_data.flg_cmp),
            ("invflags", match_data.invflags),
        ] {
            if value != 0 {
                log_warn!(
                    "unsupported TCP matcher {field} {value:#x} (inverse flags {:?})",
                    XtTcpInverseFlags::from_bits_truncate(match_data.invflags)
                );
                return Err(MatcherError::UnsupportedFlags {
                    matcher: MATCHER_NAME_TCP,
                    field,
                    value,
                });
            }
        }

        if filter.protocol != u16::from(IPPROTO_TCP) {
            log_warn!("TCP matching is only valid for protocol {IPPROTO_TCP}");
            return Err(MatcherError::ProtocolMismatch {
                matcher: MATCHER_NAME_TCP,
                required: IPPROTO_TCP,
                found: filter.protocol,
            });
        }

        Ok(TcpMatcher::new(
            match_data.spts[0].get()..=match_data.spts[1].get(),
            match_data.dpts[0].get()..=match_data.dpts[1].get(),
        ))
    }
}

/// Matches TCP segments whose ports fall in the configured ranges.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TcpMatcher {
    ports: PortRanges,
}

impl TcpMatcher {
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

impl Matcher for TcpMatcher {
    fn name(&self) -> &'static str {
        MATCHER_NAME_TCP
    }

    fn matches(
        &self,
        hook: Hook,
        packet: &mut dyn PacketView,
        _interface_name: &str,
    ) -> MatchOutcome {
        self.ports.matches(hook, packet, &TCP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::XT_ENTRY_MATCH_SIZE,
        headers::testutil::{ipv4_header, tcp_header},
        packet::PacketBuffer,
        uapi::IPPROTO_UDP,
    };
    use assert_matches::assert_matches;
    use test_case::test_case;
    use zerocopy::AsBytes;

    fn tcp_filter() -> IpHeaderFilter {
        IpHeaderFilter::with_protocol(IPPROTO_TCP)
    }

    fn xt_tcp_bytes(spts: [u16; 2], dpts: [u16; 2]) -> Vec<u8> {
        xt_tcp {
            spts: [le::U16::new(spts[0]), le::U16::new(spts[1])],
            dpts: [le::U16::new(dpts[0]), le::U16::new(dpts[1])],
            ..Default::default()
        }
        .as_bytes()
        .to_vec()
    }

    fn marshal(matcher: &TcpMatcher) -> Vec<u8> {
        MatchMaker::marshal(&TcpMatchMaker, matcher)
    }

    fn unmarshal(buf: &[u8], filter: &IpHeaderFilter) -> Result<TcpMatcher, MatcherError> {
        MatchMaker::unmarshal(&TcpMatchMaker, buf, filter)
    }

    /// A packet as seen after the network layer has parsed its header.
    fn parsed_packet(src_port: u16, dst_port: u16) -> PacketBuffer {
        PacketBuffer::with_network_header(
            ipv4_header(IPPROTO_TCP, 0, false),
            vec![tcp_header(src_port, dst_port), b"payload".to_vec()],
        )
    }

    #[test_case(0..=65535, 0..=65535)]
    #[test_case(1000..=2000, 80..=80)]
    #[test_case(443..=443, 1024..=65535)]
    #[test_case(2000..=1000, 0..=0; "inverted source range")]
    fn round_trip(source: RangeInclusive<u16>, destination: RangeInclusive<u16>) {
        let bytes = marshal(&TcpMatcher::new(source.clone(), destination.clone()));
        assert_eq!(bytes.len(), 48);
        assert_eq!(&bytes[2..5], b"tcp");
        let decoded = unmarshal(&bytes[XT_ENTRY_MATCH_SIZE..], &tcp_filter()).expect("unmarshal");
        assert_eq!(decoded.source_ports(), &source);
        assert_eq!(decoded.destination_ports(), &destination);
    }

    #[test]
    fn marshal_layout() {
        let bytes = marshal(&TcpMatcher::new(1000..=2000, 80..=80));
        assert_eq!(&bytes[XT_ENTRY_MATCH_SIZE..44], &xt_tcp_bytes([1000, 2000], [80, 80])[..]);
        assert_eq!(&bytes[44..], &[0; 4]);
    }

    #[test_case(0)]
    #[test_case(4)]
    #[test_case(11)]
    fn unmarshal_too_short(len: usize) {
        let bytes = xt_tcp_bytes([0, 65535], [80, 80]);
        assert_eq!(
            unmarshal(&bytes[..len], &tcp_filter()),
            Err(MatcherError::BufferTooSmall { matcher: "tcp", size: len, needed: 12 })
        );
    }

    #[test]
    fn unmarshal_ignores_trailing_bytes() {
        let mut bytes = xt_tcp_bytes([10, 20], [30, 40]);
        bytes.extend_from_slice(&[0xff; 4]);
        assert_eq!(unmarshal(&bytes, &tcp_filter()), Ok(TcpMatcher::new(10..=20, 30..=40)));
    }

    #[test_case(8, "option")]
    #[test_case(9, "flg_mask")]
    #[test_case(10, "flg_cmp")]
    #[test_case(11, "invflags")]
    fn unmarshal_rejects_flags(offset: usize, field: &'static str) {
        for value in [0x01, 0x02, 0x80, 0xff] {
            let mut bytes = xt_tcp_bytes([0, 65535], [80, 80]);
            bytes[offset] = value;
            assert_eq!(
                unmarshal(&bytes, &tcp_filter()),
                Err(MatcherError::UnsupportedFlags { matcher: "tcp", field, value })
            );
        }
    }

    #[test_case(0; "any protocol")]
    #[test_case(IPPROTO_UDP.into(); "udp")]
    #[test_case(0x106; "tcp number in a wider field")]
    fn unmarshal_rejects_protocol_mismatch(protocol: u16) {
        let bytes = xt_tcp_bytes([0, 65535], [80, 80]);
        assert_eq!(
            unmarshal(&bytes, &IpHeaderFilter { protocol }),
            Err(MatcherError::ProtocolMismatch { matcher: "tcp", required: 6, found: protocol })
        );
    }

    #[test_case(1500, 80 => MatchOutcome::Match)]
    #[test_case(1000, 80 => MatchOutcome::Match; "source range start")]
    #[test_case(2000, 80 => MatchOutcome::Match; "source range end")]
    #[test_case(999, 80 => MatchOutcome::NoMatch)]
    #[test_case(2001, 80 => MatchOutcome::NoMatch)]
    #[test_case(1500, 81 => MatchOutcome::NoMatch)]
    #[test_case(1500, 79 => MatchOutcome::NoMatch)]
    fn port_ranges(src_port: u16, dst_port: u16) -> MatchOutcome {
        let matcher = TcpMatcher::new(1000..=2000, 80..=80);
        matcher.matches(Hook::LocalIn, &mut parsed_packet(src_port, dst_port), "eth0")
    }

    #[test_case(0)]
    #[test_case(1024)]
    #[test_case(65535)]
    fn inverted_range_never_matches(port: u16) {
        // iptables accepts `--sport 2000:1000`; the comparison rejects every port.
        let matcher = TcpMatcher::new(2000..=1000, 0..=65535);
        assert_eq!(
            matcher.matches(Hook::LocalIn, &mut parsed_packet(port, 80), ""),
            MatchOutcome::NoMatch
        );
    }

    #[test]
    fn other_protocol_does_not_match() {
        let mut packet = PacketBuffer::with_network_header(
            ipv4_header(IPPROTO_UDP, 0, false),
            vec![tcp_header(1500, 80)],
        );
        let matcher = TcpMatcher::new(0..=65535, 0..=65535);
        assert_eq!(matcher.matches(Hook::LocalIn, &mut packet, ""), MatchOutcome::NoMatch);
    }

    #[test_case(1 => MatchOutcome::Hotdrop; "overlapping fragment")]
    #[test_case(2 => MatchOutcome::NoMatch)]
    #[test_case(185 => MatchOutcome::NoMatch)]
    #[test_case(0x1fff => MatchOutcome::NoMatch)]
    fn fragments(fragment_offset: u16) -> MatchOutcome {
        // Continuation fragments start with payload, which here happens to look like a matching
        // TCP header.
        let mut packet = PacketBuffer::with_network_header(
            ipv4_header(IPPROTO_TCP, fragment_offset, false),
            vec![tcp_header(1500, 80)],
        );
        TcpMatcher::new(0..=65535, 0..=65535).matches(Hook::Forward, &mut packet, "")
    }

    #[test]
    fn first_fragment_is_matched() {
        let mut packet = PacketBuffer::with_network_header(
            ipv4_header(IPPROTO_TCP, 0, true),
            vec![tcp_header(1500, 80)],
        );
        assert_eq!(
            TcpMatcher::new(1500..=1500, 80..=80).matches(Hook::Forward, &mut packet, ""),
            MatchOutcome::Match
        );
    }

    #[test]
    fn uses_parsed_transport_header() {
        let mut packet = PacketBuffer::with_headers(
            ipv4_header(IPPROTO_TCP, 0, false),
            tcp_header(1500, 80),
            vec![],
        );
        assert_eq!(
            TcpMatcher::new(1000..=2000, 80..=80).matches(Hook::LocalOut, &mut packet, ""),
            MatchOutcome::Match
        );
    }

    #[test]
    fn truncated_parsed_transport_header_is_dropped() {
        let mut packet = PacketBuffer::with_headers(
            ipv4_header(IPPROTO_TCP, 0, false),
            tcp_header(1500, 80)[..8].to_vec(),
            vec![],
        );
        assert_eq!(
            TcpMatcher::new(0..=65535, 0..=65535).matches(Hook::LocalOut, &mut packet, ""),
            MatchOutcome::Hotdrop
        );
    }

    /// A TCP header with `data_offset` words, followed by `payload`.
    fn tcp_segment_with_options(data_offset: u8, payload: &[u8]) -> Vec<u8> {
        let mut segment = tcp_header(1500, 80);
        segment[12] = data_offset << 4;
        let options_len = (usize::from(data_offset) * 4).saturating_sub(TCP_MIN_HEADER_LEN);
        // NOP options.
        segment.extend(std::iter::repeat(1u8).take(options_len));
        segment.extend_from_slice(payload);
        segment
    }

    #[test]
    fn transport_header_includes_options() {
        let segment = tcp_segment_with_options(8, b"data");
        let mut packet = PacketBuffer::with_network_header(
            ipv4_header(IPPROTO_TCP, 0, false),
            vec![segment[..20].to_vec(), segment[20..].to_vec()],
        );
        let matcher = TcpMatcher::new(1500..=1500, 80..=80);
        assert_eq!(matcher.matches(Hook::LocalIn, &mut packet, ""), MatchOutcome::Match);
        assert_eq!(packet.transport_header(), Some(&segment[..32]));
        assert_eq!(packet.data_len(), 4);
    }

    #[test_case(0; "no data offset")]
    #[test_case(4; "data offset below minimum")]
    #[test_case(15; "options past end of data")]
    fn bad_data_offset_is_dropped(data_offset: u8) {
        let mut segment = tcp_header(1500, 80);
        segment[12] = data_offset << 4;
        segment.extend(b"data");
        let mut packet = PacketBuffer::with_network_header(
            ipv4_header(IPPROTO_TCP, 0, false),
            vec![segment],
        );
        assert_eq!(
            TcpMatcher::new(0..=65535, 0..=65535).matches(Hook::LocalIn, &mut packet, ""),
            MatchOutcome::Hotdrop
        );
        assert_eq!(packet.transport_header(), None);
    }

    #[test_case(Hook::LocalIn)]
    #[test_case(Hook::Forward)]
    #[test_case(Hook::LocalOut)]
    #[test_case(Hook::PostRouting)]
    fn pulls_up_transport_header(hook: Hook) {
        let header = tcp_header(1500, 80);
        let mut packet = PacketBuffer::with_network_header(
            ipv4_header(IPPROTO_TCP, 0, false),
            vec![header[..3].to_vec(), header[3..].to_vec(), b"data".to_vec()],
        );
        let matcher = TcpMatcher::new(1000..=2000, 80..=80);
        assert_eq!(matcher.matches(hook, &mut packet, ""), MatchOutcome::Match);
        assert_eq!(packet.transport_header(), Some(&header[..]));
        assert_eq!(packet.data_len(), 4);

        // The second evaluation finds the header parsed.
        assert_eq!(matcher.matches(hook, &mut packet, ""), MatchOutcome::Match);
        assert_eq!(packet.data_len(), 4);
    }

    #[test]
    fn parses_network_header_at_prerouting() {
        let mut datagram = ipv4_header(IPPROTO_TCP, 0, false);
        datagram.extend(tcp_header(1500, 80));
        let mut packet = PacketBuffer::unparsed(vec![datagram]);

        let matcher = TcpMatcher::new(1000..=2000, 80..=80);
        assert_eq!(matcher.matches(Hook::PreRouting, &mut packet, ""), MatchOutcome::Match);
        assert_eq!(packet.network_header(), Some(&ipv4_header(IPPROTO_TCP, 0, false)[..]));
        assert_eq!(packet.transport_header(), Some(&tcp_header(1500, 80)[..]));
        assert_eq!(packet.data_len(), 0);
    }

    #[test]
    fn parses_network_header_with_options_at_prerouting() {
        let mut datagram = ipv4_header(IPPROTO_TCP, 0, false);
        // IHL of 6 words followed by one word of NOP options.
        datagram[0] = 0x46;
        datagram.extend([1, 1, 1, 1]);
        datagram.extend(tcp_header(1500, 80));
        let mut packet = PacketBuffer::unparsed(vec![datagram]);

        let matcher = TcpMatcher::new(1500..=1500, 80..=80);
        assert_eq!(matcher.matches(Hook::PreRouting, &mut packet, ""), MatchOutcome::Match);
        assert_matches!(packet.network_header(), Some(header) if header.len() == 24);
    }

    #[test_case(0)]
    #[test_case(10)]
    #[test_case(19)]
    fn short_network_header_at_prerouting_is_dropped(len: usize) {
        let datagram = ipv4_header(IPPROTO_TCP, 0, false);
        let mut packet = PacketBuffer::unparsed(vec![datagram[..len].to_vec()]);
        assert_eq!(
            TcpMatcher::new(0..=65535, 0..=65535).matches(Hook::PreRouting, &mut packet, ""),
            MatchOutcome::Hotdrop
        );
    }

    #[test]
    fn malformed_ihl_at_prerouting_is_dropped() {
        let mut datagram = ipv4_header(IPPROTO_TCP, 0, false);
        datagram[0] = 0x44;
        datagram.extend(tcp_header(1500, 80));
        let mut packet = PacketBuffer::unparsed(vec![datagram]);
        assert_eq!(
            TcpMatcher::new(0..=65535, 0..=65535).matches(Hook::PreRouting, &mut packet, ""),
            MatchOutcome::Hotdrop
        );
    }

    #[test]
    fn missing_network_header_after_prerouting_is_dropped() {
        let mut datagram = ipv4_header(IPPROTO_TCP, 0, false);
        datagram.extend(tcp_header(1500, 80));
        let mut packet = PacketBuffer::unparsed(vec![datagram]);
        assert_eq!(
            TcpMatcher::new(0..=65535, 0..=65535).matches(Hook::LocalIn, &mut packet, ""),
            MatchOutcome::Hotdrop
        );
    }

    #[test_case(Hook::PreRouting)]
    #[test_case(Hook::LocalIn)]
    fn insufficient_transport_data_is_dropped(hook: Hook) {
        let mut packet = match hook {
            Hook::PreRouting => {
                let mut datagram = ipv4_header(IPPROTO_TCP, 0, false);
                datagram.extend(&tcp_header(1500, 80)[..19]);
                PacketBuffer::unparsed(vec![datagram])
            }
            _ => PacketBuffer::with_network_header(
                ipv4_header(IPPROTO_TCP, 0, false),
                vec![tcp_header(1500, 80)[..19].to_vec()],
            ),
        };
        assert_eq!(
            TcpMatcher::new(0..=65535, 0..=65535).matches(hook, &mut packet, ""),
            MatchOutcome::Hotdrop
        );
        assert_eq!(packet.transport_header(), None);
    }
}
