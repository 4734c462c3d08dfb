use crate::{
    bits,
    config_store::ConfigStore,
    felt::Felt,
};

const DRUGS_PER_LOCATION: u32 = 4;
const TICK_BITS: u32 = 6;
const LOCATION_IDS: [u8; 6] = [1, 2, 3, 4, 5, 6];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrugMarket {
    pub drug: String,
    pub drug_id: u8,
    pub price: u64,
    pub weight: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationMarket {
    pub location_id: u8,
    pub location: String,
    pub drugs: Vec<DrugMarket>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Markets {
    packed: Felt,
    pub by_location: Vec<LocationMarket>,
}

impl Markets {
    pub fn decode(config: &ConfigStore, drugs_mode: &str, drug_level: u8, packed: Felt) -> Self {
        let mut by_location = Vec::new();
        for location_id in LOCATION_IDS {
            let Some(location) = config.location_by_id(location_id) else {
                tracing::warn!(location_id, "location config not found");
                continue;
            };
            let mut drugs = Vec::new();
            for slot in 0..DRUGS_PER_LOCATION as u8 {
                let drug_id = slot + drug_level;
                let Some(drug) = config.drug_by_id(drugs_mode, drug_id) else {
                    tracing::warn!(drugs_mode, drug_id, drug_level, "drug config not found");
                    continue;
                };
                let price_tick = tick(&packed, location_id, drug_id);
                drugs.push(DrugMarket {
                    drug: drug.drug.clone(),
                    drug_id: drug.drug_id,
                    price: price_tick * drug.step + drug.base,
                    weight: drug.weight,
                });
            }
            by_location.push(LocationMarket {
                location_id,
                location: location.location.clone(),
                drugs,
            });
        }
        Markets {
            packed,
            by_location,
        }
    }

    pub fn tick(&self, location_id: u8, drug_id: u8) -> u64 {
        tick(&self.packed, location_id, drug_id)
    }

    pub fn location(&self, location_id: u8) -> Option<&LocationMarket> {
        self.by_location
            .iter()
            .find(|m| m.location_id == location_id)
    }
}

fn tick(packed: &Felt, location_id: u8, drug_id: u8) -> u64 {
    let slot = u32::from(location_id.saturating_sub(1)) * DRUGS_PER_LOCATION
        + u32::from(drug_id) % DRUGS_PER_LOCATION;
    bits::extract_u64(packed, slot * TICK_BITS, TICK_BITS)
}
