//! Client for the metagame token registry.
//!
//! The registry tracks minted game tokens independently of the game itself: a token can
//! be minted long before anyone plays it, so "known to the registry" and "has a game" are
//! separate facts.

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
        GameTokenRow,
        SqlClient,
        queries,
    },
    token_id::TokenId,
};
use serde::Deserialize;
use serde_json::{
    Map,
    Value,
};
use std::{
    collections::HashMap,
    future::Future,
    sync::atomic::{
        AtomicU64,
        Ordering,
    },
};

pub use crate::indexer::queries::{
    GameSort,
    GameTokensQuery,
    SortOrder,
};

const TOURNAMENT_ID_KEY: &str = "Tournament ID";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextData {
    pub name: String,
    pub description: String,
    pub contexts: Map<String, Value>,
}

impl ContextData {
    pub fn tournament_id(&self) -> Option<String> {
        match self.contexts.get(TOURNAMENT_ID_KEY)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsData {
    pub name: String,
    pub description: String,
    pub data: Value,
}

fn string_field(map: &Map<String, Value>, keys: [&str; 2]) -> String {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// Payloads arrive either as JSON objects or as JSON-encoded strings.
fn decode_payload(raw: Option<&Value>, what: &str) -> Option<Value> {
    match raw? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match serde_json::from_str(s) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("failed to parse {what} data: {e}");
                None
            }
        },
        other => Some(other.clone()),
    }
}

pub fn parse_context_data(raw: Option<&Value>) -> ContextData {
    let Some(Value::Object(outer)) = decode_payload(raw, "context") else {
        return ContextData::default();
    };
    let name = string_field(&outer, ["Name", "name"]);
    let description = string_field(&outer, ["Description", "description"]);

    let mut contexts = match outer.get("contexts") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => outer.clone(),
    };
    if let Some(Value::Object(nested)) = contexts.get("Contexts") {
        contexts = nested.clone();
    }
    for key in ["name", "Name", "description", "Description"] {
        contexts.remove(key);
    }

    ContextData {
        name,
        description,
        contexts,
    }
}

pub fn parse_settings_data(raw: Option<&Value>) -> SettingsData {
    match decode_payload(raw, "settings") {
        Some(Value::Object(map)) => {
            let data = map
                .get("data")
                .or_else(|| map.get("Settings"))
                .cloned()
                .unwrap_or_else(|| Value::Object(map.clone()));
            SettingsData {
                name: string_field(&map, ["Name", "name"]),
                description: string_field(&map, ["Description", "description"]),
                data,
            }
        }
        Some(other) => SettingsData {
            data: other,
            ..Default::default()
        },
        None => SettingsData::default(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GameTokenData {
    pub token_id: TokenId,
    pub game_id: u32,
    pub owner: Felt,
    pub minted_by: Felt,
    /// Unix seconds.
    pub minted_at: Option<i64>,
    pub game_over: bool,
    pub score: u64,
    pub player_name: String,
    pub context: ContextData,
    pub settings: SettingsData,
}

#[derive(Debug, Deserialize)]
struct GameTokenDto {
    token_id: Felt,
    #[serde(deserialize_with = "lenient::u32", default)]
    game_id: u32,
    #[serde(default)]
    owner: Felt,
    #[serde(default)]
    minted_by_address: Felt,
    #[serde(default)]
    minted_at: Option<String>,
    #[serde(deserialize_with = "lenient::bool", default)]
    game_over: bool,
    #[serde(deserialize_with = "lenient::u64", default)]
    score: u64,
    #[serde(deserialize_with = "lenient::short_string", default)]
    player_name: String,
    #[serde(default)]
    context: Option<Value>,
    #[serde(default)]
    settings_data: Option<Value>,
}

impl TryFrom<GameTokenDto> for GameTokenData {
    type Error = Error;

    fn try_from(dto: GameTokenDto) -> Result<Self> {
        Ok(GameTokenData {
            token_id: TokenId::try_from(dto.token_id)?,
            game_id: dto.game_id,
            owner: dto.owner,
            minted_by: dto.minted_by_address,
            minted_at: dto.minted_at.as_deref().and_then(parse_timestamp),
            game_over: dto.game_over,
            score: dto.score,
            player_name: dto.player_name,
            context: parse_context_data(dto.context.as_ref()),
            settings: parse_settings_data(dto.settings_data.as_ref()),
        })
    }
}

/// Torii timestamps are RFC3339 or `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

#[derive(Debug, Deserialize)]
struct CountDto {
    #[serde(deserialize_with = "lenient::u64")]
    count: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegistryToken {
    pub token: GameTokenData,
    pub has_game: bool,
}

/// One answer from the registry.
///
/// `generation` increases with every lookup the registry serves, so callers can discard
/// answers that arrive after a newer one.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryObservation {
    pub generation: u64,
    pub settled: bool,
    pub tokens: Vec<RegistryToken>,
}

impl RegistryObservation {
    pub fn token(&self, token_id: TokenId) -> Option<&RegistryToken> {
        self.tokens.iter().find(|t| t.token.token_id == token_id)
    }
}

pub trait TokenRegistry {
    fn lookup(&self, token_id: TokenId) -> impl Future<Output = Result<RegistryObservation>>;
}

pub struct MetagameClient {
    sql: SqlClient,
    registry_namespace: String,
    world_namespace: String,
    generation: AtomicU64,
}

impl MetagameClient {
    pub fn new(
        sql: SqlClient,
        registry_namespace: impl Into<String>,
        world_namespace: impl Into<String>,
    ) -> Self {
        Self {
            sql,
            registry_namespace: registry_namespace.into(),
            world_namespace: world_namespace.into(),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn games(&self, query: &GameTokensQuery) -> Result<Vec<GameTokenData>> {
        let sql = queries::games_query(&self.registry_namespace, &self.world_namespace, query);
        let rows = self.sql.query::<GameTokenDto>(&sql).await?;
        rows.into_iter().map(GameTokenData::try_from).collect()
    }

    pub async fn games_count(&self, query: &GameTokensQuery) -> Result<u64> {
        let sql =
            queries::games_count_query(&self.registry_namespace, &self.world_namespace, query);
        let rows = self.sql.query::<CountDto>(&sql).await?;
        Ok(rows.first().map(|r| r.count).unwrap_or_default())
    }

    /// Registry tokens joined with the game's own `GameToken` rows.
    pub async fn games_with_status(
        &self,
        query: &GameTokensQuery,
    ) -> Result<Vec<RegistryToken>> {
        let tokens = self.games(query).await?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<TokenId> = tokens.iter().map(|t| t.token_id).collect();
        let rows = self
            .sql
            .query::<GameTokenRow>(&queries::game_tokens_by_ids(&self.world_namespace, &ids))
            .await?;
        let game_ids: HashMap<TokenId, u32> =
            rows.into_iter().map(|r| (r.token_id, r.game_id)).collect();

        Ok(tokens
            .into_iter()
            .map(|token| {
                let has_game = game_ids
                    .get(&token.token_id)
                    .is_some_and(|game_id| *game_id != 0);
                RegistryToken { token, has_game }
            })
            .collect())
    }
}

impl TokenRegistry for MetagameClient {
    async fn lookup(&self, token_id: TokenId) -> Result<RegistryObservation> {
        let tokens = self
            .games_with_status(&GameTokensQuery::for_token(token_id))
            .await?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(%token_id, generation, found = tokens.len(), "registry lookup");
        Ok(RegistryObservation {
            generation,
            settled: true,
            tokens,
        })
    }
}

/// Page arithmetic for registry listings. Pages are zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl Pagination {
    pub fn new(page_size: u32, total: u64) -> Self {
        Self {
            current_page: 0,
            page_size: page_size.max(1),
            total,
        }
    }

    pub fn total_pages(&self) -> u32 {
        self.total.div_ceil(u64::from(self.page_size)) as u32
    }

    pub fn has_next(&self) -> bool {
        self.current_page + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 0
    }

    pub fn go_to(&mut self, page: u32) {
        self.current_page = page.min(self.total_pages().saturating_sub(1));
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.current_page += 1;
        }
    }

    pub fn previous(&mut self) {
        if self.has_previous() {
            self.current_page -= 1;
        }
    }

    pub fn first(&mut self) {
        self.current_page = 0;
    }

    pub fn last(&mut self) {
        self.current_page = self.total_pages().saturating_sub(1);
    }

    pub fn offset(&self) -> u32 {
        self.current_page * self.page_size
    }

    pub fn apply(&self, query: &mut GameTokensQuery) {
        query.limit = self.page_size;
        query.offset = self.offset();
    }
}
