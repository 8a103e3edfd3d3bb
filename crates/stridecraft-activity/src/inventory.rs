//! In-memory item storage with a carry limit.
//!
//! [`ItemStore`] is the reference [`Inventory`] used by the headless host
//! and by tests. Quantities are whole units; the total load across all
//! items may not exceed `capacity`. All arithmetic is checked -- no silent
//! overflows, no panics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stridecraft_types::{ItemId, MaterialRequirement};
use tracing::debug;

use crate::services::Inventory;

/// Errors from direct item store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Adding the items would exceed the carry limit.
    #[error("store full: adding {attempted} of {item_id} exceeds capacity (load {current_load}, capacity {capacity})")]
    Full {
        /// The item being added.
        item_id: ItemId,
        /// The quantity the caller attempted to add.
        attempted: u32,
        /// Total load before the addition.
        current_load: u32,
        /// Maximum total load.
        capacity: u32,
    },

    /// Not enough of the item is stored.
    #[error("insufficient {item_id}: wanted {requested}, have {available}")]
    Insufficient {
        /// The item being removed.
        item_id: ItemId,
        /// The quantity the caller attempted to remove.
        requested: u32,
        /// The quantity held.
        available: u32,
    },

    /// A quantity sum overflowed.
    #[error("item quantity overflow")]
    Overflow,
}

/// Item quantities with a total carry limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStore {
    items: BTreeMap<ItemId, u32>,
    capacity: u32,
}

impl ItemStore {
    /// Create an empty store.
    pub const fn new(capacity: u32) -> Self {
        Self {
            items: BTreeMap::new(),
            capacity,
        }
    }

    /// Rebuild a store from saved quantities. Zero entries are dropped.
    ///
    /// The carry limit is not enforced on restore; an overloaded store simply
    /// refuses further additions.
    pub fn from_items(capacity: u32, items: BTreeMap<ItemId, u32>) -> Self {
        let items = items.into_iter().filter(|(_, qty)| *qty > 0).collect();
        Self { items, capacity }
    }

    /// Borrow all stored quantities.
    pub const fn items(&self) -> &BTreeMap<ItemId, u32> {
        &self.items
    }

    /// Sum of all quantities, or `None` on overflow.
    pub fn total_load(&self) -> Option<u32> {
        let mut total: u32 = 0;
        for qty in self.items.values() {
            total = total.checked_add(*qty)?;
        }
        Some(total)
    }

    /// Quantity held of one item.
    pub fn quantity_of(&self, item_id: &ItemId) -> u32 {
        self.items.get(item_id).copied().unwrap_or(0)
    }

    /// Add `amount` units of an item, respecting the carry limit.
    pub fn add(&mut self, item_id: &ItemId, amount: u32) -> Result<(), StoreError> {
        let current_load = self.total_load().ok_or(StoreError::Overflow)?;
        let fits = current_load
            .checked_add(amount)
            .is_some_and(|load| load <= self.capacity);
        if !fits {
            return Err(StoreError::Full {
                item_id: item_id.clone(),
                attempted: amount,
                current_load,
                capacity: self.capacity,
            });
        }

        let entry = self.items.entry(item_id.clone()).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(StoreError::Overflow)?;
        Ok(())
    }

    /// Remove `amount` units of an item. Removes the key at zero.
    pub fn remove(&mut self, item_id: &ItemId, amount: u32) -> Result<(), StoreError> {
        let current = self.quantity_of(item_id);
        let remaining = current
            .checked_sub(amount)
            .ok_or_else(|| StoreError::Insufficient {
                item_id: item_id.clone(),
                requested: amount,
                available: current,
            })?;

        if remaining == 0 {
            self.items.remove(item_id);
        } else {
            self.items.insert(item_id.clone(), remaining);
        }
        Ok(())
    }

    /// Total units required per item, merging duplicate requirements.
    fn totals(materials: &[MaterialRequirement]) -> Option<BTreeMap<&ItemId, u32>> {
        let mut totals: BTreeMap<&ItemId, u32> = BTreeMap::new();
        for req in materials {
            let entry = totals.entry(&req.item_id).or_insert(0);
            *entry = entry.checked_add(req.quantity)?;
        }
        Some(totals)
    }
}

impl Inventory for ItemStore {
    fn can_fulfill(&self, materials: &[MaterialRequirement]) -> bool {
        Self::totals(materials).is_some_and(|totals| {
            totals
                .iter()
                .all(|(item_id, qty)| self.quantity_of(item_id) >= *qty)
        })
    }

    fn consume(&mut self, materials: &[MaterialRequirement]) -> bool {
        if !self.can_fulfill(materials) {
            return false;
        }
        for req in materials {
            // Availability was checked above for the merged totals.
            if let Err(err) = self.remove(&req.item_id, req.quantity) {
                debug!(%err, "Material removal failed after availability check");
                return false;
            }
        }
        true
    }

    fn produce(&mut self, item_id: &ItemId, quantity: u32) -> bool {
        match self.add(item_id, quantity) {
            Ok(()) => true,
            Err(err) => {
                debug!(%err, "Production rejected by item store");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ore() -> ItemId {
        ItemId::new("copper_ore")
    }

    fn coal() -> ItemId {
        ItemId::new("coal")
    }

    fn stocked() -> ItemStore {
        ItemStore::from_items(50, BTreeMap::from([(ore(), 10), (coal(), 5)]))
    }

    #[test]
    fn total_load_sums_quantities() {
        assert_eq!(ItemStore::new(10).total_load(), Some(0));
        assert_eq!(stocked().total_load(), Some(15));
    }

    #[test]
    fn from_items_drops_zero_entries() {
        let store = ItemStore::from_items(10, BTreeMap::from([(ore(), 0), (coal(), 2)]));
        assert_eq!(store.items().len(), 1);
    }

    #[test]
    fn add_stacks_until_capacity() {
        let mut store = ItemStore::new(20);
        assert!(store.add(&ore(), 12).is_ok());
        assert!(store.add(&ore(), 8).is_ok());
        assert_eq!(store.quantity_of(&ore()), 20);
        let err = store.add(&coal(), 1);
        assert!(matches!(err, Err(StoreError::Full { current_load: 20, .. })));
        assert_eq!(store.quantity_of(&coal()), 0);
    }

    #[test]
    fn remove_clears_key_at_zero() {
        let mut store = stocked();
        assert!(store.remove(&coal(), 5).is_ok());
        assert!(!store.items().contains_key(&coal()));
        assert!(matches!(
            store.remove(&coal(), 1),
            Err(StoreError::Insufficient { available: 0, .. })
        ));
    }

    #[test]
    fn consume_is_all_or_nothing() {
        let mut store = stocked();
        let recipe = [
            MaterialRequirement::new("copper_ore", 4),
            MaterialRequirement::new("coal", 6),
        ];
        assert!(!store.can_fulfill(&recipe));
        assert!(!store.consume(&recipe));
        assert_eq!(store.quantity_of(&ore()), 10);
        assert_eq!(store.quantity_of(&coal()), 5);
    }

    #[test]
    fn consume_merges_duplicate_requirements() {
        let mut store = stocked();
        let recipe = [
            MaterialRequirement::new("coal", 3),
            MaterialRequirement::new("coal", 3),
        ];
        assert!(!store.can_fulfill(&recipe));

        let recipe = [
            MaterialRequirement::new("coal", 2),
            MaterialRequirement::new("coal", 3),
        ];
        assert!(store.consume(&recipe));
        assert_eq!(store.quantity_of(&coal()), 0);
    }

    #[test]
    fn produce_reports_full_storage() {
        let mut store = ItemStore::new(3);
        assert!(store.produce(&ore(), 3));
        assert!(!store.produce(&ore(), 1));
        assert_eq!(store.quantity_of(&ore()), 3);
    }

    #[test]
    fn empty_recipe_is_always_fulfilled() {
        let mut store = ItemStore::new(0);
        assert!(store.can_fulfill(&[]));
        assert!(store.consume(&[]));
    }
}
