// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::{
    codec,
    errors::MatcherError,
    matchers::{MatchOutcome, Matcher},
    packet::PacketView,
    registry::MatcherRegistry,
    rule::{Hook, IpHeaderFilter},
};
use std::sync::Arc;

/// The matchers of one rule, evaluated in the order user space configured them.
#[derive(Clone, Debug, Default)]
pub struct RuleMatchers {
    matchers: Vec<Arc<dyn Matcher>>,
}

impl RuleMatchers {
    pub fn new(matchers: Vec<Arc<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// Decodes the consecutive match blocks in `bytes`.
    ///
    /// Fails as a whole on the first block that is malformed, names an unknown matcher, or is
    /// rejected by its matcher.
    pub fn unmarshal(
        registry: &MatcherRegistry,
        mut bytes: &[u8],
        filter: &IpHeaderFilter,
    ) -> Result<Self, MatcherError> {
        let mut matchers = vec![];
        while !bytes.is_empty() {
            let (entry, rest) = codec::split_entry_match(bytes)?;
            let Some(maker) = registry.lookup(&entry.name) else {
                log_warn!("unknown matcher {:?}", entry.name);
                return Err(MatcherError::UnknownMatcher { name: entry.name });
            };
            if entry.revision != 0 {
                log_debug!("{} matcher revision {} decoded as 0", entry.name, entry.revision);
            }
            matchers.push(maker.unmarshal(entry.data, filter)?);
            bytes = rest;
        }
        Ok(Self { matchers })
    }

    /// Encodes every matcher as a match block, in order.
    ///
    /// Panics if a matcher's kind is not in `registry`.
    pub fn marshal(&self, registry: &MatcherRegistry) -> Vec<u8> {
        let mut buf = vec![];
        for matcher in &self.matchers {
            let Some(maker) = registry.lookup(matcher.name()) else {
                panic!("marshaling unregistered matcher {}", matcher.name());
            };
            buf.extend(maker.marshal(matcher.as_ref()));
        }
        buf
    }

    /// Evaluates the matchers in order, stopping at the first that does not match.
    pub fn matches(
        &self,
        hook: Hook,
        packet: &mut dyn PacketView,
        interface_name: &str,
    ) -> MatchOutcome {
        for matcher in &self.matchers {
            match matcher.matches(hook, packet, interface_name) {
                MatchOutcome::Match => {}
                MatchOutcome::Hotdrop => {
                    log_trace!("{} matcher dropped packet at {hook}", matcher.name());
                    return MatchOutcome::Hotdrop;
                }
                MatchOutcome::NoMatch => return MatchOutcome::NoMatch,
            }
        }
        MatchOutcome::Match
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Matcher>> {
        self.matchers.iter()
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
