// Copyright 2024 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::matchers::{tcp::TcpMatchMaker, udp::UdpMatchMaker, DynMatchMaker};
use once_cell::sync::Lazy;
use std::collections::btree_map::{BTreeMap, Entry};

/// Maps matcher names, as carried in `xt_entry_match`, to the makers that decode them.
#[derive(Default)]
pub struct MatcherRegistry {
    makers: BTreeMap<&'static str, Box<dyn DynMatchMaker>>,
}

impl MatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every matcher kind this crate implements.
    pub fn with_builtin_matchers() -> Self {
        let mut registry = Self::new();
        registry.register(TcpMatchMaker);
        registry.register(UdpMatchMaker);
        registry
    }

    /// Registers `maker` under its name.
    ///
    /// Panics if a maker with the same name is already registered.
    pub fn register(&mut self, maker: impl DynMatchMaker + 'static) {
        match self.makers.entry(maker.name()) {
            Entry::Vacant(entry) => {
                let _ = entry.insert(Box::new(maker));
            }
            Entry::Occupied(entry) => {
                log_error!("matcher {:?} is already registered", entry.key());
                panic!("duplicate matcher registration: {}", entry.key());
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn DynMatchMaker> {
        self.makers.get(name).map(|maker| &**maker)
    }

    /// Registered names, in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.makers.keys().copied()
    }
}

impl std::fmt::Debug for MatcherRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

static GLOBAL_REGISTRY: Lazy<MatcherRegistry> = Lazy::new(|| {
    let registry = MatcherRegistry::with_builtin_matchers();
    log_info!("registered matchers: {registry:?}");
    registry
});

/// The process-wide registry of built-in matchers, created on first use.
pub fn global() -> &'static MatcherRegistry {
    &GLOBAL_REGISTRY
}
