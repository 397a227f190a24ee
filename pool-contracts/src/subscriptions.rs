// SPDX-License-Identifier: GPL-3.0-only

//! Subscription accounting
//!
//! Views subscribe under a key (their display name). A mask is held at most
//! once per key, so repeated subscribes under the same key never double the
//! count, and releasing a key that holds nothing is a no-op. The server only
//! hears about a mask when its first holder arrives or its last one leaves.

use std::collections::{BTreeMap, BTreeSet};

use crate::protocol::SubscriptionMask;

/// Effect of one subscribe or unsubscribe call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    /// Masks whose holder count changed for this key
    pub changed: Vec<SubscriptionMask>,
    /// Masks that crossed 0↔1 and need a server-side (un)subscribe
    pub server: Vec<SubscriptionMask>,
}

impl SubscriptionDelta {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    holders: BTreeMap<SubscriptionMask, BTreeSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, key: &str, masks: &[SubscriptionMask]) -> SubscriptionDelta {
        let mut delta = SubscriptionDelta::default();

        for mask in masks {
            let keys = self.holders.entry(mask.clone()).or_default();
            let first = keys.is_empty();
            if keys.insert(key.to_string()) {
                delta.changed.push(mask.clone());
                if first {
                    delta.server.push(mask.clone());
                }
            }
        }

        delta
    }

    /// Release every mask held under `key`
    pub fn unsubscribe(&mut self, key: &str) -> SubscriptionDelta {
        let mut delta = SubscriptionDelta::default();

        self.holders.retain(|mask, keys| {
            if keys.remove(key) {
                delta.changed.push(mask.clone());
                if keys.is_empty() {
                    delta.server.push(mask.clone());
                    return false;
                }
            }
            true
        });

        delta
    }

    pub fn count(&self, mask: &SubscriptionMask) -> usize {
        self.holders.get(mask).map_or(0, BTreeSet::len)
    }

    pub fn masks_for(&self, key: &str) -> Vec<SubscriptionMask> {
        self.holders
            .iter()
            .filter(|(_, keys)| keys.contains(key))
            .map(|(mask, _)| mask.clone())
            .collect()
    }
}
