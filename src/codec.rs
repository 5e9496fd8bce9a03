// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Encoding and decoding of the fixed `x_tables` layouts.
//!
//! Every matcher goes through this module so that byte order, alignment and the generic
//! `xt_entry_match` header are handled in one place.

use crate::{
    errors::WireError,
    uapi::{xt_entry_match, XT_ALIGNMENT, XT_EXTENSION_MAXNAMELEN},
};
use std::{any::type_name, mem::size_of};
use zerocopy::{byteorder::little_endian as le, AsBytes, FromBytes};

pub const XT_ENTRY_MATCH_SIZE: usize = size_of::<xt_entry_match>();

/// Rounds `size` up to the `x_tables` alignment, like the kernel's `XT_ALIGN`.
pub const fn xt_align(size: usize) -> usize {
    (size + XT_ALIGNMENT - 1) & !(XT_ALIGNMENT - 1)
}

/// Decodes a `T` from the front of `bytes`. Trailing bytes are ignored; the kernel pads most
/// structures beyond their logical size.
pub fn decode_prefix<T: FromBytes>(bytes: &[u8]) -> Result<T, WireError> {
    T::read_from_prefix(bytes).ok_or(WireError::TooShort {
        type_name: type_name::<T>(),
        needed: size_of::<T>(),
        available: bytes.len(),
    })
}

pub fn encode<T: AsBytes>(value: &T) -> Vec<u8> {
    value.as_bytes().to_vec()
}

/// A match block sliced out of a rule entry.
#[derive(Debug, PartialEq, Eq)]
pub struct EntryMatch<'a> {
    pub name: String,
    pub revision: u8,
    /// Everything between the header and `match_size`, including alignment padding.
    pub data: &'a [u8],
}

/// Builds a complete match block: an `xt_entry_match` header naming the matcher, followed by
/// `data` and zero padding up to the aligned size.
pub fn marshal_entry_match(name: &str, data: &[u8]) -> Vec<u8> {
    log_trace!("marshaling matcher {name:?}");
    let size = xt_align(XT_ENTRY_MATCH_SIZE + data.len());
    let header = xt_entry_match {
        match_size: le::U16::new(size as u16),
        name: name_to_chars(name),
        revision: 0,
    };

    let mut buf = Vec::with_capacity(size);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(data);
    buf.resize(size, 0);
    buf
}

/// Reads the match block at the front of `bytes` and returns it along with the bytes that
/// follow it.
pub fn split_entry_match(bytes: &[u8]) -> Result<(EntryMatch<'_>, &[u8]), WireError> {
    let header = decode_prefix::<xt_entry_match>(bytes)?;

    let match_size = usize::from(header.match_size.get());
    if match_size < XT_ENTRY_MATCH_SIZE {
        return Err(WireError::MatchSizeTooSmall { size: match_size });
    }
    if match_size > bytes.len() {
        return Err(WireError::MatchSizeTooLarge { size: match_size, available: bytes.len() });
    }

    let name = chars_to_name(&header.name)?;
    let (block, rest) = bytes.split_at(match_size);
    Ok((
        EntryMatch { name, revision: header.revision, data: &block[XT_ENTRY_MATCH_SIZE..] },
        rest,
    ))
}

/// Copies `name` into a NUL-padded name field. Names are compile-time constants of the
/// matcher kinds, so one that does not fit is a programming error.
fn name_to_chars(name: &str) -> [u8; XT_EXTENSION_MAXNAMELEN] {
    assert!(name.len() < XT_EXTENSION_MAXNAMELEN, "matcher name {name:?} is too long");
    let mut chars = [0u8; XT_EXTENSION_MAXNAMELEN];
    chars[..name.len()].copy_from_slice(name.as_bytes());
    chars
}

fn chars_to_name(chars: &[u8]) -> Result<String, WireError> {
    let len = chars
        .iter()
        .position(|c| *c == 0)
        .ok_or_else(|| WireError::NameNotTerminated { name: chars.to_vec() })?;
    let name = &chars[..len];
    if !name.is_ascii() {
        return Err(WireError::NameNotAscii { name: name.to_vec() });
    }
    // ASCII is always valid UTF-8.
    Ok(name.iter().map(|c| char::from(*c)).collect())
}
