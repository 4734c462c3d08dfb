//! Typed view over a session's packed game store.

mod items;
mod markets;
mod player;

pub use items::{
    ItemInfo,
    Items,
};
pub use markets::{
    DrugMarket,
    LocationMarket,
    Markets,
};
pub use player::Player;

use crate::{
    bits,
    config_store::ConfigStore,
    error::Result,
    felt::Felt,
    indexer::{
        GameConfig,
        GameInfo,
        GameStorePacked,
        SeasonData,
        SeasonSettings,
    },
    types::ItemSlot,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// A submitted action whose effect has not been confirmed on chain yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Shop { slot: ItemSlot },
    Trade {
        direction: TradeDirection,
        drug_id: u8,
        quantity: u64,
    },
}

#[derive(Clone, Debug)]
pub struct GameModel {
    pub info: GameInfo,
    pub season_settings: SeasonSettings,
    pub game_config: GameConfig,
    pub packed: GameStorePacked,
    pub player: Player,
    pub markets: Markets,
    pub items: Items,
    pending: Vec<PendingAction>,
}

impl GameModel {
    pub fn decode(
        config: &ConfigStore,
        info: GameInfo,
        season: SeasonData,
        packed: GameStorePacked,
    ) -> Result<Self> {
        let section = |name: &str| -> Result<Felt> {
            let item = config.game_store_layout_item(name)?;
            Ok(bits::extract(&packed.packed, item.idx, item.bits))
        };

        let player = Player::decode(config, &section("player")?)?;
        let markets = Markets::decode(
            config,
            &season.settings.drugs_mode,
            player.drug_level,
            section("markets")?,
        );
        let items = Items::decode(&section("items")?, &info.equipment_by_slot);

        Ok(GameModel {
            info,
            season_settings: season.settings,
            game_config: season.config,
            packed,
            player,
            markets,
            items,
            pending: Vec::new(),
        })
    }

    pub fn pending(&self) -> &[PendingAction] {
        &self.pending
    }

    pub fn push_pending(&mut self, action: PendingAction) {
        self.pending.push(action);
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    fn pending_upgrades(&self, slot: ItemSlot) -> usize {
        self.pending
            .iter()
            .filter(|a| matches!(a, PendingAction::Shop { slot: s } if *s == slot))
            .count()
    }

    /// Item level including unconfirmed shop purchases.
    pub fn item_level(&self, slot: ItemSlot) -> u8 {
        self.items.level(slot, self.pending_upgrades(slot))
    }

    pub fn item_info(&self, config: &ConfigStore, slot: ItemSlot) -> ItemInfo {
        self.items.info(config, slot, self.pending_upgrades(slot))
    }
}
