// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Context that the rule evaluator hands to matchers.

use crate::uapi::{
    NF_INET_FORWARD, NF_INET_LOCAL_IN, NF_INET_LOCAL_OUT, NF_INET_POST_ROUTING,
    NF_INET_PRE_ROUTING,
};
use std::fmt;

/// The interception point at which a packet is being evaluated.
///
/// Which headers have already been parsed depends on the hook: at [`Hook::PreRouting`] even the
/// network header may still be raw bytes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Hook {
    PreRouting,
    LocalIn,
    Forward,
    LocalOut,
    PostRouting,
}

impl Hook {
    pub const ALL: [Hook; 5] =
        [Hook::PreRouting, Hook::LocalIn, Hook::Forward, Hook::LocalOut, Hook::PostRouting];
}

impl From<Hook> for u32 {
    fn from(hook: Hook) -> u32 {
        match hook {
            Hook::PreRouting => NF_INET_PRE_ROUTING,
            Hook::LocalIn => NF_INET_LOCAL_IN,
            Hook::Forward => NF_INET_FORWARD,
            Hook::LocalOut => NF_INET_LOCAL_OUT,
            Hook::PostRouting => NF_INET_POST_ROUTING,
        }
    }
}

impl TryFrom<u32> for Hook {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            NF_INET_PRE_ROUTING => Ok(Hook::PreRouting),
            NF_INET_LOCAL_IN => Ok(Hook::LocalIn),
            NF_INET_FORWARD => Ok(Hook::Forward),
            NF_INET_LOCAL_OUT => Ok(Hook::LocalOut),
            NF_INET_POST_ROUTING => Ok(Hook::PostRouting),
            other => Err(other),
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::PreRouting => "PREROUTING",
            Hook::LocalIn => "INPUT",
            Hook::Forward => "FORWARD",
            Hook::LocalOut => "OUTPUT",
            Hook::PostRouting => "POSTROUTING",
        };
        f.write_str(name)
    }
}

/// The IP-level criteria of the rule that owns a matcher (`struct ipt_ip`). Only the declared
/// transport protocol matters to matchers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IpHeaderFilter {
    /// `ipt_ip.proto`. Zero means any protocol.
    pub protocol: u16,
}

impl IpHeaderFilter {
    pub fn with_protocol(protocol: u8) -> Self {
        Self { protocol: protocol.into() }
    }
}
