//! Season-independent game configuration, loaded once per client.
//!
//! Everything that decodes packed state looks up its layout here, so the store has to be
//! initialized before a game session can be built.

use crate::{
    error::{
        Error,
        Result,
    },
    felt::{
        Felt,
        lenient,
    },
    indexer::{
        queries,
        sql::SqlClient,
    },
    systems::GameSystems,
    types::{
        GearItem,
        ItemSlot,
    },
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};
use std::future::Future;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutItem {
    pub name: String,
    pub idx: u32,
    pub bits: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layouts {
    pub game_store: Vec<LayoutItem>,
    pub player: Vec<LayoutItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RyoConfig {
    #[serde(deserialize_with = "lenient::u32")]
    pub season_version: u32,
    #[serde(deserialize_with = "lenient::bool", default)]
    pub paused: bool,
    #[serde(deserialize_with = "lenient::u64", default)]
    pub season_duration: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DrugConfig {
    pub drugs_mode: String,
    pub drug: String,
    #[serde(deserialize_with = "lenient::u8")]
    pub drug_id: u8,
    #[serde(deserialize_with = "lenient::u64")]
    pub base: u64,
    #[serde(deserialize_with = "lenient::u64")]
    pub step: u64,
    #[serde(deserialize_with = "lenient::u64", default)]
    pub weight: u64,
    #[serde(rename = "name.value", deserialize_with = "lenient::short_string", default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LocationConfig {
    pub location: String,
    #[serde(deserialize_with = "lenient::u8")]
    pub location_id: u8,
    #[serde(rename = "name.value", deserialize_with = "lenient::short_string", default)]
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ItemTier {
    #[serde(deserialize_with = "lenient::u8")]
    pub slot_id: u8,
    #[serde(deserialize_with = "lenient::u32")]
    pub item_id: u32,
    #[serde(deserialize_with = "lenient::u8")]
    pub tier: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct TierLevel {
    #[serde(deserialize_with = "lenient::u64")]
    pub cost: u64,
    #[serde(deserialize_with = "lenient::u64")]
    pub stat: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ItemTierConfig {
    #[serde(deserialize_with = "lenient::u8")]
    pub slot_id: u8,
    #[serde(deserialize_with = "lenient::u8")]
    pub tier: u8,
    #[serde(deserialize_with = "levels_lenient", default)]
    pub levels: Vec<TierLevel>,
}

/// Array columns come back either inline or as a JSON-encoded string.
fn levels_lenient<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<TierLevel>, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    let value = match raw {
        serde_json::Value::String(s) => {
            serde_json::from_str(&s).map_err(serde::de::Error::custom)?
        }
        serde_json::Value::Null => return Ok(Vec::new()),
        other => other,
    };
    Vec::<TierLevel>::deserialize(value).map_err(serde::de::Error::custom)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameConfigData {
    pub ryo: RyoConfig,
    pub drugs: Vec<DrugConfig>,
    pub locations: Vec<LocationConfig>,
    pub item_tiers: Vec<ItemTier>,
    pub tier_configs: Vec<ItemTierConfig>,
    pub layouts: Layouts,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GearItemFull {
    pub gear_item: GearItem,
    pub tier: u8,
    pub levels: Vec<TierLevel>,
}

const fn level(stat: u64, cost: u64) -> TierLevel {
    TierLevel { cost, stat }
}

/// Tier tables baked into the items contract, keyed by `(contract slot id, tier)`.
const TIER_FALLBACK: &[(u8, u8, [TierLevel; 4])] = &[
    (0, 1, [level(10, 0), level(25, 1050), level(50, 17500), level(80, 210000)]),
    (0, 2, [level(12, 0), level(28, 1120), level(45, 11900), level(70, 175000)]),
    (0, 3, [level(14, 0), level(30, 1120), level(40, 7000), level(60, 140000)]),
    (1, 1, [level(10, 0), level(22, 960), level(48, 20800), level(75, 216000)]),
    (1, 2, [level(12, 0), level(26, 1120), level(45, 15200), level(70, 200000)]),
    (1, 3, [level(14, 0), level(30, 1280), level(42, 9600), level(65, 184000)]),
    (2, 1, [level(900, 0), level(1300, 800), level(3200, 38000), level(5500, 253000)]),
    (2, 2, [level(1000, 0), level(1500, 1000), level(3000, 30000), level(5000, 220000)]),
    (2, 3, [level(1100, 0), level(1700, 1200), level(2800, 22000), level(4500, 187000)]),
    (5, 1, [level(6, 0), level(14, 880), level(36, 24200), level(54, 198000)]),
    (5, 2, [level(8, 0), level(18, 1100), level(33, 16500), level(50, 187000)]),
    (5, 3, [level(10, 0), level(22, 1320), level(30, 8800), level(46, 176000)]),
];

const TRANSPORT_DEFAULT: [TierLevel; 4] =
    [level(900, 0), level(1300, 800), level(3200, 38000), level(5500, 253000)];
const GEAR_DEFAULT: [TierLevel; 4] =
    [level(10, 0), level(25, 1000), level(50, 15000), level(80, 200000)];

fn fallback_levels(slot_id: u8, tier: u8) -> Option<&'static [TierLevel; 4]> {
    TIER_FALLBACK
        .iter()
        .find(|(slot, t, _)| *slot == slot_id && *t == tier)
        .map(|(_, _, levels)| levels)
}

pub trait ConfigSource {
    fn load(&self) -> impl Future<Output = Result<GameConfigData>>;
}

#[derive(Debug, Default)]
pub struct ConfigStore {
    config: Option<GameConfigData>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: GameConfigData) -> Self {
        let mut store = Self::new();
        store.install(data);
        store
    }

    pub async fn init<S: ConfigSource>(&mut self, source: &S) -> Result<()> {
        self.config = None;
        let data = source.load().await?;
        tracing::info!(
            drugs = data.drugs.len(),
            locations = data.locations.len(),
            game_store_fields = data.layouts.game_store.len(),
            "config loaded"
        );
        self.install(data);
        Ok(())
    }

    fn install(&mut self, mut data: GameConfigData) {
        data.locations.retain(|l| l.location != "Home");
        self.config = Some(data);
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    pub fn data(&self) -> Result<&GameConfigData> {
        self.config.as_ref().ok_or(Error::ConfigNotInitialized)
    }

    pub fn drug_by_id(&self, drugs_mode: &str, drug_id: u8) -> Option<&DrugConfig> {
        self.config.as_ref()?.drugs.iter().find(|d| {
            d.drugs_mode == drugs_mode && d.drug_id == drug_id
        })
    }

    pub fn drug(&self, drugs_mode: &str, drug: &str) -> Option<&DrugConfig> {
        self.config.as_ref()?.drugs.iter().find(|d| {
            d.drugs_mode == drugs_mode && d.drug.eq_ignore_ascii_case(drug)
        })
    }

    pub fn location_by_id(&self, location_id: u8) -> Option<&LocationConfig> {
        self.config
            .as_ref()?
            .locations
            .iter()
            .find(|l| l.location_id == location_id)
    }

    pub fn location(&self, location: &str) -> Option<&LocationConfig> {
        self.config
            .as_ref()?
            .locations
            .iter()
            .find(|l| l.location.eq_ignore_ascii_case(location))
    }

    pub fn game_store_layout_item(&self, name: &str) -> Result<&LayoutItem> {
        Self::find_layout_item(self.layouts()?.game_store.as_slice(), "game_store", name)
    }

    pub fn player_layout_item(&self, name: &str) -> Result<&LayoutItem> {
        Self::find_layout_item(self.layouts()?.player.as_slice(), "player", name)
    }

    fn layouts(&self) -> Result<&Layouts> {
        self.config
            .as_ref()
            .map(|c| &c.layouts)
            .ok_or_else(|| Error::Layout("config layouts not loaded".to_string()))
    }

    fn find_layout_item<'a>(
        items: &'a [LayoutItem],
        layout: &str,
        name: &str,
    ) -> Result<&'a LayoutItem> {
        items
            .iter()
            .find(|item| item.name == name)
            .ok_or_else(|| Error::Layout(format!("{layout} layout item not found: {name}")))
    }

    pub fn gear_item_tier(&self, gear_item: &GearItem) -> Option<&ItemTier> {
        let slot_id = gear_item.slot.contract_slot_id();
        self.config
            .as_ref()?
            .item_tiers
            .iter()
            .find(|t| t.slot_id == slot_id && t.item_id == gear_item.item)
    }

    pub fn gear_item_full(&self, gear_item: &GearItem) -> GearItemFull {
        let slot_id = gear_item.slot.contract_slot_id();
        let tier = self.gear_item_tier(gear_item).map(|t| t.tier);

        let configured = tier.and_then(|tier| {
            self.config.as_ref()?.tier_configs.iter().find(|c| {
                c.slot_id == slot_id && c.tier == tier && !c.levels.is_empty()
            })
        });

        let levels = match (configured, tier) {
            (Some(config), _) => config.levels.clone(),
            (None, Some(tier)) if fallback_levels(slot_id, tier).is_some() => {
                fallback_levels(slot_id, tier)
                    .map(|levels| levels.to_vec())
                    .unwrap_or_default()
            }
            _ => match fallback_levels(slot_id, 1) {
                Some(levels) => levels.to_vec(),
                None if gear_item.slot == ItemSlot::Transport => TRANSPORT_DEFAULT.to_vec(),
                None => GEAR_DEFAULT.to_vec(),
            },
        };

        GearItemFull {
            gear_item: *gear_item,
            tier: tier.unwrap_or(1),
            levels,
        }
    }
}

/// Parses the layout section of a raw `get_config` response.
///
/// Layout: `game_store_len, (name, idx, bits)*, player_len, (name, idx, bits)*`, followed
/// by the RYO config and season modes, which are ignored here.
pub fn parse_layouts(raw: &[Felt]) -> Result<Layouts> {
    let mut cursor = raw.iter();
    let mut next = |what: &str| -> Result<Felt> {
        cursor
            .next()
            .copied()
            .ok_or_else(|| Error::Decode(format!("get_config response truncated at {what}")))
    };

    let mut read_list = |label: &str| -> Result<Vec<LayoutItem>> {
        let len = next(label)?
            .to_u64()
            .ok_or_else(|| Error::Decode(format!("{label} length out of range")))?;
        if len > (raw.len() / 3) as u64 {
            return Err(Error::Decode(format!(
                "{label} length {len} exceeds the {} felts in the response",
                raw.len()
            )));
        }
        let mut items = Vec::new();
        for _ in 0..len {
            let name = next(label)?.decode_short_string();
            let idx = next(label)?.low_u64() as u32;
            let bits = next(label)?.low_u64() as u32;
            items.push(LayoutItem { name, idx, bits });
        }
        Ok(items)
    };

    let game_store = read_list("game_store")?;
    let player = read_list("player")?;
    Ok(Layouts { game_store, player })
}

/// Loads config tables from the SQL endpoint and layouts from the config contract.
pub struct IndexerConfigSource<S> {
    sql: SqlClient,
    namespace: String,
    systems: S,
}

impl<S> IndexerConfigSource<S> {
    pub fn new(sql: SqlClient, namespace: impl Into<String>, systems: S) -> Self {
        Self {
            sql,
            namespace: namespace.into(),
            systems,
        }
    }
}

impl<S: GameSystems> ConfigSource for IndexerConfigSource<S> {
    async fn load(&self) -> Result<GameConfigData> {
        let ns = &self.namespace;
        let ryo_query = queries::config_table(ns, "RyoConfig");
        let drugs_query = queries::config_table(ns, "DrugConfig");
        let locations_query = queries::config_table(ns, "LocationConfig");
        let tiers_query = queries::config_table(ns, "DopewarsItemTier");
        let tier_configs_query = queries::config_table(ns, "DopewarsItemTierConfig");
        let (ryo, drugs, locations, item_tiers, tier_configs) = futures::try_join!(
            self.sql.query::<RyoConfig>(&ryo_query),
            self.sql.query::<DrugConfig>(&drugs_query),
            self.sql.query::<LocationConfig>(&locations_query),
            self.sql.query::<ItemTier>(&tiers_query),
            self.sql.query::<ItemTierConfig>(&tier_configs_query),
        )?;

        let ryo = ryo
            .into_iter()
            .next()
            .ok_or_else(|| Error::MissingData("RyoConfig row".to_string()))?;

        let raw = self.systems.get_config_raw().await?;
        let layouts = parse_layouts(&raw)?;

        Ok(GameConfigData {
            ryo,
            drugs,
            locations,
            item_tiers,
            tier_configs,
            layouts,
        })
    }
}
