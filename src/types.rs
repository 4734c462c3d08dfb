use crate::error::{
    Error,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    Normal,
    BeingMugged,
    BeingArrested,
}

impl PlayerStatus {
    pub fn is_decision(&self) -> bool {
        matches!(self, PlayerStatus::BeingMugged | PlayerStatus::BeingArrested)
    }
}

impl TryFrom<u64> for PlayerStatus {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        match value {
            0 => Ok(PlayerStatus::Normal),
            1 => Ok(PlayerStatus::BeingMugged),
            2 => Ok(PlayerStatus::BeingArrested),
            other => Err(Error::Decode(format!("unknown player status {other}"))),
        }
    }
}

/// Equipment slot, in the order the packed item levels are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemSlot {
    Weapon,
    Clothes,
    Feet,
    Transport,
}

impl ItemSlot {
    pub const ALL: [ItemSlot; 4] = [
        ItemSlot::Weapon,
        ItemSlot::Clothes,
        ItemSlot::Feet,
        ItemSlot::Transport,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    /// Slot id used by the contract's item tables.
    pub fn contract_slot_id(self) -> u8 {
        match self {
            ItemSlot::Weapon => 0,
            ItemSlot::Clothes => 1,
            ItemSlot::Feet => 5,
            ItemSlot::Transport => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Ranked,
    Noob,
    Warrior,
}

impl GameMode {
    /// Enum index in calldata.
    pub fn index(self) -> u64 {
        match self {
            GameMode::Ranked => 0,
            GameMode::Noob => 1,
            GameMode::Warrior => 2,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Ranked => "Ranked",
            GameMode::Noob => "Noob",
            GameMode::Warrior => "Warrior",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GearItem {
    pub slot: ItemSlot,
    pub item: u32,
}

impl GearItem {
    /// Gear ids carry the item index in the low byte. The slot is positional in
    /// `equipment_by_slot`, so it is supplied by the caller.
    pub fn from_id(slot: ItemSlot, id: u64) -> Self {
        GearItem {
            slot,
            item: (id & 0xff) as u32,
        }
    }
}
