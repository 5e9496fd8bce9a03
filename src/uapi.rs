// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Linux `x_tables` structures, as laid out by the kernel ABI.
//!
//! Integers that user space writes in host order are stored as little-endian, which is the byte
//! order of every architecture Starnix runs on.

#![allow(non_camel_case_types)]

use bitflags::bitflags;
use static_assertions::const_assert_eq;
use zerocopy::{byteorder::little_endian as le, AsBytes, FromBytes, FromZeroes, Unaligned};

pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

pub const NF_INET_PRE_ROUTING: u32 = 0;
pub const NF_INET_LOCAL_IN: u32 = 1;
pub const NF_INET_FORWARD: u32 = 2;
pub const NF_INET_LOCAL_OUT: u32 = 3;
pub const NF_INET_POST_ROUTING: u32 = 4;
pub const NF_INET_NUMHOOKS: u32 = 5;

/// Includes the trailing NUL.
pub const XT_EXTENSION_MAXNAMELEN: usize = 29;

/// Match and target sizes are rounded up to the alignment of `struct _xt_align`, which contains
/// a `u64`.
pub const XT_ALIGNMENT: usize = 8;

pub const XT_TCP_INV_SRCPT: u8 = 0x01;
pub const XT_TCP_INV_DSTPT: u8 = 0x02;
pub const XT_TCP_INV_FLAGS: u8 = 0x04;
pub const XT_TCP_INV_OPTION: u8 = 0x08;
pub const XT_TCP_INV_MASK: u8 = 0x0f;

pub const XT_UDP_INV_SRCPT: u8 = 0x01;
pub const XT_UDP_INV_DSTPT: u8 = 0x02;
pub const XT_UDP_INV_MASK: u8 = 0x03;

/// The user-space view of `struct xt_entry_match`, which precedes every match block in an
/// `ipt_entry`.
#[repr(C)]
#[derive(AsBytes, Clone, Copy, Debug, Default, FromBytes, FromZeroes, Unaligned)]
pub struct xt_entry_match {
    /// Size of this header plus the match data and its padding.
    pub match_size: le::U16,
    pub name: [u8; XT_EXTENSION_MAXNAMELEN],
    pub revision: u8,
}

/// `struct xt_tcp`.
#[repr(C)]
#[derive(AsBytes, Clone, Copy, Debug, Default, FromBytes, FromZeroes, Unaligned)]
pub struct xt_tcp {
    /// Source port range, inclusive.
    pub spts: [le::U16; 2],
    /// Destination port range, inclusive.
    pub dpts: [le::U16; 2],
    /// TCP option kind to match.
    pub option: u8,
    pub flg_mask: u8,
    pub flg_cmp: u8,
    pub invflags: u8,
}

/// `struct xt_udp`.
#[repr(C)]
#[derive(AsBytes, Clone, Copy, Debug, Default, FromBytes, FromZeroes, Unaligned)]
pub struct xt_udp {
    pub spts: [le::U16; 2],
    pub dpts: [le::U16; 2],
    pub invflags: u8,
    pub _padding: u8,
}

const_assert_eq!(std::mem::size_of::<xt_entry_match>(), 32);
const_assert_eq!(std::mem::size_of::<xt_tcp>(), 12);
const_assert_eq!(std::mem::size_of::<xt_udp>(), 10);

bitflags! {
    pub struct XtTcpInverseFlags: u8 {
        const SOURCE_PORT = XT_TCP_INV_SRCPT;
        const DESTINATION_PORT = XT_TCP_INV_DSTPT;
        const FLAGS = XT_TCP_INV_FLAGS;
        const OPTION = XT_TCP_INV_OPTION;
    }
}

bitflags! {
    pub struct XtUdpInverseFlags: u8 {
        const SOURCE_PORT = XT_UDP_INV_SRCPT;
        const DESTINATION_PORT = XT_UDP_INV_DSTPT;
    }
}
