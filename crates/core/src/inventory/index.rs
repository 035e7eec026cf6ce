//! Inventory index
//!
//! Groups remote listings into [`Item`]s by equivalence key. The index is a
//! snapshot: it is rebuilt wholesale, never patched.

use std::collections::{BTreeMap, BTreeSet};

use stockx_domain::{FeeSchedule, Item, ItemKey, RemoteListing};

/// Items of one session, keyed by (variant, price, currency)
#[derive(Debug, Clone, Default)]
pub struct InventoryIndex {
    items: BTreeMap<ItemKey, Item>,
    fees: FeeSchedule,
}

impl InventoryIndex {
    /// Group `listings` into items.
    ///
    /// Listing ids inside each item are ordered oldest first by `created_at`,
    /// ties broken by listing id. Listings without a timestamp sort after
    /// dated ones.
    pub fn build(listings: impl IntoIterator<Item = RemoteListing>, fees: FeeSchedule) -> Self {
        let mut groups: BTreeMap<ItemKey, Vec<RemoteListing>> = BTreeMap::new();
        for listing in listings {
            let key = ItemKey::new(listing.variant_id.clone(), listing.amount, listing.currency.clone());
            groups.entry(key).or_default().push(listing);
        }

        let items = groups
            .into_iter()
            .map(|(key, mut group)| {
                group.sort_by(|a, b| {
                    (a.created_at.is_none(), a.created_at, &a.listing_id)
                        .cmp(&(b.created_at.is_none(), b.created_at, &b.listing_id))
                });
                let item = Self::aggregate(&key, &group, &fees);
                (key, item)
            })
            .collect();

        Self { items, fees }
    }

    fn aggregate(key: &ItemKey, group: &[RemoteListing], fees: &FeeSchedule) -> Item {
        let first_some = |field: fn(&RemoteListing) -> &Option<String>| {
            group.iter().find_map(|listing| field(listing).clone())
        };
        let price = key.amount();
        Item {
            key: key.clone(),
            product_id: group.first().map(|l| l.product_id.clone()).unwrap_or_default(),
            style_id: first_some(|l| &l.style_id),
            name: first_some(|l| &l.product_name),
            size: first_some(|l| &l.variant_value),
            price,
            currency: key.currency.clone(),
            quantity: u32::try_from(group.len()).unwrap_or(u32::MAX),
            listing_ids: group.iter().map(|l| l.listing_id.clone()).collect(),
            payout: fees.payout(price),
        }
    }

    /// All items, ordered by key
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&Item> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Total listings across items
    pub fn listing_count(&self) -> usize {
        self.items.values().map(|item| item.listing_ids.len()).sum()
    }

    pub fn product_ids(&self) -> BTreeSet<String> {
        self.items.values().map(|item| item.product_id.clone()).collect()
    }

    pub fn variant_ids(&self) -> BTreeSet<String> {
        self.items.keys().map(|key| key.variant_id.clone()).collect()
    }
}
