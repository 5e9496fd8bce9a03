// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Read-only views of the packet headers matchers look at. Unlike the `x_tables` structures,
//! these are in network byte order.

use zerocopy::{byteorder::network_endian as ne, FromBytes, FromZeroes, Unaligned};

pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const TCP_MIN_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;

const IPV4_VERSION: u8 = 4;
const IPV4_FRAGMENT_OFFSET_MASK: u16 = 0x1fff;
const IPV4_MORE_FRAGMENTS: u16 = 0x2000;
const TCP_DATA_OFFSET_BYTE: usize = 12;

/// The fixed part of an IPv4 header.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, FromZeroes, Unaligned)]
pub struct Ipv4Header {
    version_ihl: u8,
    _dscp_ecn: u8,
    _total_len: ne::U16,
    _id: ne::U16,
    flags_fragment_offset: ne::U16,
    _ttl: u8,
    protocol: u8,
    _checksum: ne::U16,
    _src_ip: [u8; 4],
    _dst_ip: [u8; 4],
}

impl Ipv4Header {
    /// Reads the fixed header from the front of `bytes`, if there are enough of them.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Self::read_from_prefix(bytes)
    }

    pub fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    /// Length of the header including options, in bytes.
    pub fn header_len(&self) -> usize {
        usize::from(self.version_ihl & 0xf) * 4
    }

    /// Returns `true` if the version and header length fields describe a usable header.
    pub fn is_well_formed(&self) -> bool {
        self.version() == IPV4_VERSION && self.header_len() >= IPV4_MIN_HEADER_LEN
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    /// The fragment offset field, in units of 8 bytes.
    pub fn fragment_offset(&self) -> u16 {
        self.flags_fragment_offset.get() & IPV4_FRAGMENT_OFFSET_MASK
    }

    pub fn more_fragments(&self) -> bool {
        self.flags_fragment_offset.get() & IPV4_MORE_FRAGMENTS != 0
    }
}

/// The fields at the start of every TCP and UDP header.
#[repr(C)]
#[derive(Clone, Copy, Debug, FromBytes, FromZeroes, Unaligned)]
pub struct TransportPorts {
    src_port: ne::U16,
    dst_port: ne::U16,
}

impl TransportPorts {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        Self::read_from_prefix(bytes)
    }

    pub fn src_port(&self) -> u16 {
        self.src_port.get()
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port.get()
    }
}

/// Returns the length of the TCP header at the front of `bytes`, options included, as given by
/// its data offset. `None` if the data offset is below the minimum header length.
pub fn tcp_header_len(bytes: &[u8]) -> Option<usize> {
    let data_offset = bytes.get(TCP_DATA_OFFSET_BYTE)? >> 4;
    let len = usize::from(data_offset) * 4;
    (len >= TCP_MIN_HEADER_LEN).then_some(len)
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Builds an IPv4 header with no options.
    pub fn ipv4_header(protocol: u8, fragment_offset: u16, more_fragments: bool) -> Vec<u8> {
        let mut header = vec![0u8; IPV4_MIN_HEADER_LEN];
        header[0] = (IPV4_VERSION << 4) | 5;
        header[2..4].copy_from_slice(&(IPV4_MIN_HEADER_LEN as u16).to_be_bytes());
        let flags = fragment_offset | if more_fragments { IPV4_MORE_FRAGMENTS } else { 0 };
        header[6..8].copy_from_slice(&flags.to_be_bytes());
        header[8] = 64;
        header[9] = protocol;
        header[12..16].copy_from_slice(&[192, 168, 0, 1]);
        header[16..20].copy_from_slice(&[192, 168, 0, 2]);
        header
    }

    pub fn tcp_header(src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut header = vec![0u8; TCP_MIN_HEADER_LEN];
        header[0..2].copy_from_slice(&src_port.to_be_bytes());
        header[2..4].copy_from_slice(&dst_port.to_be_bytes());
        // Data offset of 5 words, SYN.
        header[12] = 5 << 4;
        header[13] = 0x02;
        header
    }

    pub fn udp_header(src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut header = vec![0u8; UDP_HEADER_LEN];
        header[0..2].copy_from_slice(&src_port.to_be_bytes());
        header[2..4].copy_from_slice(&dst_port.to_be_bytes());
        header[4..6].copy_from_slice(&(UDP_HEADER_LEN as u16).to_be_bytes());
        header
    }
}
