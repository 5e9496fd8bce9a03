// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Packet matchers for the Starnix netfilter implementation.
//!
//! A matcher is the part of an iptables rule that decides whether a packet satisfies some
//! criterion, e.g. "the TCP destination port is 443". Matchers are configured by user space
//! through the binary `xt_entry_match` ABI; [`registry::MatcherRegistry`] maps the name carried
//! in that ABI to a [`matchers::MatchMaker`] that can decode and re-encode the configuration.

#[macro_use]
pub mod logging;

pub mod codec;
pub mod entry;
pub mod errors;
pub mod headers;
pub mod matchers;
pub mod packet;
pub mod registry;
pub mod rule;
pub mod uapi;

pub use entry::RuleMatchers;
pub use errors::{MatcherError, WireError};
pub use matchers::{DynMatchMaker, MatchMaker, MatchOutcome, Matcher};
pub use packet::{PacketBuffer, PacketView};
pub use registry::MatcherRegistry;
pub use rule::{Hook, IpHeaderFilter};
