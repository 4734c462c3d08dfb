use crate::{
    bits,
    config_store::ConfigStore,
    felt::Felt,
    types::{
        GearItem,
        ItemSlot,
    },
};

const LEVEL_BITS: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemInfo {
    pub slot: ItemSlot,
    pub level: u8,
    pub stat: u64,
    pub cost: u64,
    pub tier: u8,
    pub item: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Items {
    base_levels: [u8; 4],
    gear: Vec<GearItem>,
}

impl Items {
    pub fn decode(packed: &Felt, equipment_by_slot: &[u64]) -> Self {
        let mut base_levels = [0u8; 4];
        for slot in ItemSlot::ALL {
            base_levels[slot.index() as usize] =
                bits::extract_u64(packed, slot.index() * LEVEL_BITS, LEVEL_BITS) as u8;
        }
        let gear = ItemSlot::ALL
            .iter()
            .zip(equipment_by_slot)
            .map(|(slot, id)| GearItem::from_id(*slot, *id))
            .collect();
        Items { base_levels, gear }
    }

    pub fn base_level(&self, slot: ItemSlot) -> u8 {
        self.base_levels[slot.index() as usize]
    }

    pub fn gear_item(&self, slot: ItemSlot) -> GearItem {
        self.gear
            .iter()
            .find(|g| g.slot == slot)
            .copied()
            .unwrap_or_else(|| {
                tracing::warn!(?slot, "no equipped gear for slot");
                GearItem { slot, item: 0 }
            })
    }

    /// Level with `pending_upgrades` optimistic shop purchases applied.
    pub fn level(&self, slot: ItemSlot, pending_upgrades: usize) -> u8 {
        self.base_level(slot)
            .saturating_add(pending_upgrades.min(u8::MAX as usize) as u8)
    }

    pub fn info(&self, config: &ConfigStore, slot: ItemSlot, pending_upgrades: usize) -> ItemInfo {
        let level = self.level(slot, pending_upgrades);
        let full = config.gear_item_full(&self.gear_item(slot));
        let (stat, cost) = full
            .levels
            .get(level as usize)
            .map(|l| (l.stat, l.cost))
            .unwrap_or_default();
        ItemInfo {
            slot,
            level,
            stat,
            cost,
            tier: full.tier,
            item: full.gear_item.item,
        }
    }
}
