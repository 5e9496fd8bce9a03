// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::headers::Ipv4Header;

/// The packet as seen by a matcher.
///
/// A packet is split into the headers that earlier stages have already parsed and the data that
/// follows them. Matchers that need a header nobody has parsed yet pull it up from the front of
/// the data and record it, so later matchers evaluating the same packet find it parsed.
///
/// A view belongs to the single path processing its packet and is never shared.
pub trait PacketView {
    /// The parsed network header, if any.
    fn network_header(&self) -> Option<&[u8]>;

    /// The parsed transport header, if any.
    fn transport_header(&self) -> Option<&[u8]>;

    /// Makes the first `len` bytes of unparsed data contiguous and returns them, or `None` if
    /// fewer than `len` bytes are left.
    fn pull_up(&mut self, len: usize) -> Option<&[u8]>;

    /// Moves the first `len` bytes of unparsed data into the network header.
    fn set_network_header(&mut self, len: usize) -> Option<&[u8]>;

    /// Moves the first `len` bytes of unparsed data into the transport header.
    fn set_transport_header(&mut self, len: usize) -> Option<&[u8]>;

    /// The IPv4 fragment offset in units of 8 bytes. Zero for unfragmented packets, first
    /// fragments, and packets whose network header has not been parsed.
    fn fragment_offset(&self) -> u16 {
        self.network_header().and_then(Ipv4Header::parse).map_or(0, |h| h.fragment_offset())
    }
}

/// An owned packet made of a possibly discontiguous list of data views.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PacketBuffer {
    network_header: Option<Vec<u8>>,
    transport_header: Option<Vec<u8>>,
    views: Vec<Vec<u8>>,
}

impl PacketBuffer {
    /// A packet nothing has parsed yet, as seen at [`crate::Hook::PreRouting`].
    pub fn unparsed(views: Vec<Vec<u8>>) -> Self {
        Self { network_header: None, transport_header: None, views }
    }

    /// A packet whose network header has been parsed; `views` start at the transport header.
    pub fn with_network_header(network_header: Vec<u8>, views: Vec<Vec<u8>>) -> Self {
        Self { network_header: Some(network_header), transport_header: None, views }
    }

    /// A packet with both headers parsed; `views` hold the payload.
    pub fn with_headers(
        network_header: Vec<u8>,
        transport_header: Vec<u8>,
        views: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            network_header: Some(network_header),
            transport_header: Some(transport_header),
            views,
        }
    }

    /// Number of unparsed bytes.
    pub fn data_len(&self) -> usize {
        self.views.iter().map(Vec::len).sum()
    }

    /// Number of views the unparsed data is split across.
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    fn consume(&mut self, len: usize) -> Option<Vec<u8>> {
        let _: &[u8] = self.pull_up(len)?;
        if len == 0 {
            return Some(Vec::new());
        }
        let first = &mut self.views[0];
        let rest = first.split_off(len);
        let header = std::mem::replace(first, rest);
        if self.views[0].is_empty() {
            let _: Vec<u8> = self.views.remove(0);
        }
        Some(header)
    }
}

impl PacketView for PacketBuffer {
    fn network_header(&self) -> Option<&[u8]> {
        self.network_header.as_deref()
    }

    fn transport_header(&self) -> Option<&[u8]> {
        self.transport_header.as_deref()
    }

    fn pull_up(&mut self, len: usize) -> Option<&[u8]> {
        if len == 0 {
            return Some(&[]);
        }
        if self.data_len() < len {
            return None;
        }
        if self.views[0].len() < len {
            let mut head = Vec::with_capacity(len);
            let mut merged = 0;
            for view in &self.views {
                if head.len() >= len {
                    break;
                }
                head.extend_from_slice(view);
                merged += 1;
            }
            let _ = self.views.splice(..merged, std::iter::once(head));
        }
        Some(&self.views[0][..len])
    }

    fn set_network_header(&mut self, len: usize) -> Option<&[u8]> {
        let header = self.consume(len)?;
        self.network_header = Some(header);
        self.network_header.as_deref()
    }

    fn set_transport_header(&mut self, len: usize) -> Option<&[u8]> {
        let header = self.consume(len)?;
        self.transport_header = Some(header);
        self.transport_header.as_deref()
    }
}
