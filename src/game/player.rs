use crate::{
    bits,
    config_store::ConfigStore,
    error::Result,
    felt::Felt,
    types::PlayerStatus,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub cash: u64,
    pub health: u64,
    pub turn: u64,
    pub status: PlayerStatus,
    pub prev_location_id: u8,
    pub location_id: u8,
    pub next_location_id: u8,
    pub drug_level: u8,
    pub reputation: u64,
    /// Lowercase location slug, `None` while the player is at home.
    pub location: Option<String>,
}

impl Player {
    /// Splits the packed player word using the player layout.
    pub fn decode(config: &ConfigStore, packed: &Felt) -> Result<Self> {
        let field = |name: &str| -> Result<u64> {
            let item = config.player_layout_item(name)?;
            Ok(bits::extract_u64(packed, item.idx, item.bits))
        };
        let optional = |name: &str| -> u64 {
            config
                .player_layout_item(name)
                .map(|item| bits::extract_u64(packed, item.idx, item.bits))
                .unwrap_or_default()
        };

        let location_id = field("location")? as u8;
        let location = config
            .location_by_id(location_id)
            .map(|l| l.location.to_lowercase());

        Ok(Player {
            cash: field("cash")?,
            health: field("health")?,
            turn: field("turn")?,
            status: PlayerStatus::try_from(field("status")?)?,
            prev_location_id: optional("prev_location") as u8,
            location_id,
            next_location_id: optional("next_location") as u8,
            drug_level: field("drug_level")? as u8,
            reputation: optional("reputation"),
            location,
        })
    }
}
