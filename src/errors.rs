// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

/// Failures to decode the fixed ABI layouts shared by all matchers.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer of size {available} is too small to read {type_name} of size {needed}")]
    TooShort { type_name: &'static str, needed: usize, available: usize },
    #[error("match size {size} is too small to fit xt_entry_match")]
    MatchSizeTooSmall { size: usize },
    #[error("match size {size} extends beyond the {available} remaining bytes")]
    MatchSizeTooLarge { size: usize, available: usize },
    #[error("nul byte not found in matcher name {name:?}")]
    NameNotTerminated { name: Vec<u8> },
    #[error("matcher name {name:?} is not ASCII")]
    NameNotAscii { name: Vec<u8> },
}

/// Reasons a matcher configuration is rejected. All of them are permanent: the table that
/// carried the configuration must not be installed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MatcherError {
    #[error("buffer of size {size} is too small for {matcher} match data of size {needed}")]
    BufferTooSmall { matcher: &'static str, size: usize, needed: usize },
    #[error("unsupported {matcher} matcher field {field} set to {value:#x}")]
    UnsupportedFlags { matcher: &'static str, field: &'static str, value: u8 },
    #[error("{matcher} matching is only valid for protocol {required}, rule specifies {found}")]
    ProtocolMismatch { matcher: &'static str, required: u8, found: u16 },
    #[error("no matcher registered with name {name:?}")]
    UnknownMatcher { name: String },
    #[error("malformed match header: {0}")]
    Wire(#[from] WireError),
}
