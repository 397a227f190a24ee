// SPDX-License-Identifier: GPL-3.0-only

use std::cell::RefCell;
use std::collections::BTreeMap;

use pool_contracts::{Action, SubscriptionMask};

use super::{ChangeListeners, Store};

/// Per-mask subscriber counts, driven by subscribe/unsubscribe envelopes
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    counts: RefCell<BTreeMap<SubscriptionMask, usize>>,
    listeners: ChangeListeners,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, mask: &SubscriptionMask) -> usize {
        self.counts.borrow().get(mask).copied().unwrap_or(0)
    }

    pub fn active_masks(&self) -> Vec<SubscriptionMask> {
        self.counts.borrow().keys().cloned().collect()
    }
}

impl Store for SubscriptionStore {
    fn name(&self) -> &'static str {
        "SubscriptionStore"
    }

    fn handle(&self, action: &Action) -> bool {
        let mut counts = self.counts.borrow_mut();

        match action {
            Action::SubscribeToMask { mask } => {
                *counts.entry(mask.clone()).or_insert(0) += 1;
                true
            }
            Action::UnsubscribeFromMask { mask } => match counts.get_mut(mask) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    true
                }
                Some(_) => {
                    counts.remove(mask);
                    true
                }
                None => {
                    tracing::warn!(%mask, "unsubscribe for a mask with no subscribers");
                    false
                }
            },
            _ => false,
        }
    }

    fn listeners(&self) -> &ChangeListeners {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_never_go_negative() {
        let store = SubscriptionStore::new();
        let mask = SubscriptionMask::new("entity-subscriber.volume.changed");

        store.handle(&Action::SubscribeToMask { mask: mask.clone() });
        store.handle(&Action::SubscribeToMask { mask: mask.clone() });
        assert_eq!(store.count(&mask), 2);

        for _ in 0..3 {
            store.handle(&Action::UnsubscribeFromMask { mask: mask.clone() });
        }
        assert_eq!(store.count(&mask), 0);
        assert!(store.active_masks().is_empty());

        store.handle(&Action::SubscribeToMask { mask: mask.clone() });
        assert_eq!(store.count(&mask), 1);
    }
}
