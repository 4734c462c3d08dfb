use crate::felt::Felt;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GameEventKind {
    GameCreated,
    Traveled,
    GameOver,
    TradeDrug,
    HighVolatility,
    UpgradeItem,
    TravelEncounter,
    TravelEncounterResult,
    NewSeason,
    NewHighScore,
    Claimed,
    Other(String),
}

impl GameEventKind {
    /// Event models replayed when a session is loaded.
    pub const HISTORICAL: [&'static str; 11] = [
        "GameCreated",
        "Traveled",
        "GameOver",
        "TradeDrug",
        "HighVolatility",
        "UpgradeItem",
        "TravelEncounter",
        "TravelEncounterResult",
        "NewSeason",
        "NewHighScore",
        "Claimed",
    ];

    /// Accepts both bare (`GameOver`) and namespaced (`dopewars-GameOver`) model names.
    pub fn from_model(model: &str) -> Self {
        let name = model.rsplit_once('-').map_or(model, |(_, name)| name);
        match name {
            "GameCreated" => GameEventKind::GameCreated,
            "Traveled" => GameEventKind::Traveled,
            "GameOver" => GameEventKind::GameOver,
            "TradeDrug" => GameEventKind::TradeDrug,
            "HighVolatility" => GameEventKind::HighVolatility,
            "UpgradeItem" => GameEventKind::UpgradeItem,
            "TravelEncounter" => GameEventKind::TravelEncounter,
            "TravelEncounterResult" => GameEventKind::TravelEncounterResult,
            "NewSeason" => GameEventKind::NewSeason,
            "NewHighScore" => GameEventKind::NewHighScore,
            "Claimed" => GameEventKind::Claimed,
            other => GameEventKind::Other(other.to_string()),
        }
    }
}

/// One event message, keyed by the indexer's event id.
#[derive(Clone, Debug, PartialEq)]
pub struct GameEvent {
    pub kind: GameEventKind,
    pub id: String,
    pub data: Value,
}

impl GameEvent {
    pub fn new(model: &str, id: impl Into<String>, data: Value) -> Self {
        Self {
            kind: GameEventKind::from_model(model),
            id: id.into(),
            data,
        }
    }

    /// Builds an event from a raw SQL row, using Torii's internal id columns.
    pub fn from_row(model: &str, row: Value) -> Self {
        let id = ["internal_event_id", "internal_id"]
            .iter()
            .find_map(|key| row.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("{model}:{row}"));
        Self::new(model, id, row)
    }

    pub fn field_u64(&self, name: &str) -> Option<u64> {
        match self.data.get(name)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => Felt::parse(s).ok()?.to_u64(),
            Value::Bool(b) => Some(u64::from(*b)),
            _ => None,
        }
    }
}

/// Append-only history of a session's event messages.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<GameEvent>,
    acknowledged_result: Option<usize>,
}

impl EventLog {
    pub fn new(events: Vec<GameEvent>) -> Self {
        Self {
            events,
            acknowledged_result: None,
        }
    }

    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.events.iter().any(|e| e.id == id)
    }

    pub fn is_game_over(&self) -> bool {
        self.events.iter().any(|e| e.kind == GameEventKind::GameOver)
    }

    fn last_index_of(&self, kind: &GameEventKind) -> Option<usize> {
        self.events.iter().rposition(|e| &e.kind == kind)
    }

    pub fn last_encounter(&self) -> Option<&GameEvent> {
        self.last_index_of(&GameEventKind::TravelEncounter)
            .map(|i| &self.events[i])
    }

    fn last_encounter_result_index(&self) -> Option<usize> {
        let encounter = self.last_index_of(&GameEventKind::TravelEncounter)?;
        self.last_index_of(&GameEventKind::TravelEncounterResult)
            .filter(|result| *result > encounter)
    }

    /// Result of the latest encounter, if it has come in yet.
    pub fn last_encounter_result(&self) -> Option<&GameEvent> {
        self.last_encounter_result_index().map(|i| &self.events[i])
    }

    pub fn has_pending_encounter(&self) -> bool {
        match self.last_encounter_result_index() {
            Some(index) => self.acknowledged_result != Some(index),
            None => false,
        }
    }

    /// Marks the latest encounter result as shown.
    pub fn acknowledge_encounter(&mut self) {
        if let Some(index) = self.last_encounter_result_index() {
            self.acknowledged_result = Some(index);
        }
    }
}
