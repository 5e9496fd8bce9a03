// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The matcher contract.
//!
//! Each matcher kind provides a [`MatchMaker`], a stateless descriptor that converts between the
//! kind's wire configuration and an immutable [`Matcher`] instance. The registry stores makers
//! behind [`DynMatchMaker`] so that kinds can be added without touching a central enum.

pub mod tcp;
pub mod udp;

mod transport;

use crate::{errors::MatcherError, packet::PacketView, rule::Hook, rule::IpHeaderFilter};
use std::{any::Any, fmt::Debug, sync::Arc};

/// Result of evaluating one matcher against one packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchOutcome {
    Match,
    NoMatch,
    /// The packet is malformed and must be dropped, whatever the remaining rules say.
    Hotdrop,
}

impl MatchOutcome {
    pub fn matched(self) -> bool {
        self == MatchOutcome::Match
    }

    pub fn hotdrop(self) -> bool {
        self == MatchOutcome::Hotdrop
    }
}

/// Types implementing [`AnyCast`] are convertible to `dyn Any`.
pub trait AnyCast: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AnyCast for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An immutable, validated match criterion attached to a rule.
pub trait Matcher: AnyCast + Debug + Send + Sync {
    /// The wire name of this matcher's kind.
    fn name(&self) -> &'static str;

    /// Decides whether `packet` satisfies this matcher at `hook`.
    fn matches(
        &self,
        hook: Hook,
        packet: &mut dyn PacketView,
        interface_name: &str,
    ) -> MatchOutcome;
}

/// Converts between the wire configuration of one matcher kind and its [`Matcher`] instances.
pub trait MatchMaker: Send + Sync + 'static {
    type Matcher: Matcher;

    /// The name carried in `xt_entry_match.name`.
    const NAME: &'static str;

    /// Encodes `matcher` as a complete match block, header and padding included.
    fn marshal(&self, matcher: &Self::Matcher) -> Vec<u8>;

    /// Decodes match data, i.e. the bytes following the `xt_entry_match` header.
    fn unmarshal(
        &self,
        buf: &[u8],
        filter: &IpHeaderFilter,
    ) -> Result<Self::Matcher, MatcherError>;
}

/// Object-safe form of [`MatchMaker`].
pub trait DynMatchMaker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Panics if `matcher` is not of this maker's kind.
    fn marshal(&self, matcher: &dyn Matcher) -> Vec<u8>;

    fn unmarshal(
        &self,
        buf: &[u8],
        filter: &IpHeaderFilter,
    ) -> Result<Arc<dyn Matcher>, MatcherError>;
}

impl<M: MatchMaker> DynMatchMaker for M {
    fn name(&self) -> &'static str {
        M::NAME
    }

    fn marshal(&self, matcher: &dyn Matcher) -> Vec<u8> {
        assert_eq!(
            matcher.name(),
            M::NAME,
            "marshaling a {} matcher as {}",
            matcher.name(),
            M::NAME
        );
        let Some(matcher) = matcher.as_any().downcast_ref::<M::Matcher>() else {
            panic!("{} matcher has an unexpected type: {:?}", M::NAME, matcher);
        };
        MatchMaker::marshal(self, matcher)
    }

    fn unmarshal(
        &self,
        buf: &[u8],
        filter: &IpHeaderFilter,
    ) -> Result<Arc<dyn Matcher>, MatcherError> {
        let matcher = MatchMaker::unmarshal(self, buf, filter)?;
        Ok(Arc::new(matcher))
    }
}
