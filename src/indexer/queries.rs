//! SQL text for the Torii tables this client reads.
//!
//! Values are interpolated directly, as Torii's SQL endpoint takes no bind parameters. Every
//! interpolated value is either numeric or a canonical hex string produced by [`Felt`], so no
//! user text reaches the query.

use crate::{
    felt::Felt,
    indexer::world::SessionKey,
    token_id::TokenId,
};
use itertools::Itertools;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GameSort {
    #[default]
    MintedAt,
    TokenId,
    GameId,
    Owner,
    PlayerName,
    Score,
    GameOver,
}

impl GameSort {
    fn column(self) -> &'static str {
        match self {
            GameSort::MintedAt => "gt.internal_created_at",
            GameSort::TokenId => "gt.token_id",
            GameSort::GameId => "gt.game_id",
            GameSort::Owner | GameSort::PlayerName => "gt.player_id",
            // no score or game-over columns on GameToken
            GameSort::Score | GameSort::GameOver => "0",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filters and paging for registry token listings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameTokensQuery {
    pub owner: Option<Felt>,
    pub token_ids: Vec<TokenId>,
    pub minted_by: Option<Felt>,
    /// Only tokens whose game has started and is not over.
    pub in_progress: bool,
    pub sort_by: GameSort,
    pub sort_order: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

impl Default for GameTokensQuery {
    fn default() -> Self {
        Self {
            owner: None,
            token_ids: Vec::new(),
            minted_by: None,
            in_progress: false,
            sort_by: GameSort::default(),
            sort_order: SortOrder::default(),
            limit: 100,
            offset: 0,
        }
    }
}

impl GameTokensQuery {
    pub fn for_token(token_id: TokenId) -> Self {
        Self {
            token_ids: vec![token_id],
            limit: 1,
            ..Default::default()
        }
    }
}

fn table(namespace: &str, model: &str) -> String {
    format!("\"{namespace}-{model}\"")
}

fn token_list(token_ids: &[TokenId]) -> String {
    token_ids.iter().map(|id| format!("'{}'", id.padded())).join(",")
}

/// Registry tokens are filtered against the game's own tables, which live in
/// `world_namespace`.
fn game_conditions(world_namespace: &str, query: &GameTokensQuery) -> String {
    let mut conditions = Vec::new();
    if let Some(owner) = &query.owner {
        conditions.push(format!("gt.player_id = '{}'", owner.pad_address()));
    }
    if !query.token_ids.is_empty() {
        conditions.push(format!("gt.token_id IN ({})", token_list(&query.token_ids)));
    }
    if let Some(minted_by) = &query.minted_by {
        conditions.push(format!("gt.player_id = '{}'", minted_by.pad_address()));
    }
    if query.in_progress {
        conditions.push(format!(
            "gt.token_id IN (SELECT wt.token_id FROM {} wt LEFT JOIN {} g \
             ON g.game_id = wt.game_id WHERE wt.game_id != 0 AND COALESCE(g.game_over, 0) = 0)",
            table(world_namespace, "GameToken"),
            table(world_namespace, "Game"),
        ));
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

pub fn games_query(namespace: &str, world_namespace: &str, query: &GameTokensQuery) -> String {
    let mut sql = format!(
        "SELECT gt.token_id, gt.game_id, gt.player_id AS owner, \
         gt.player_id AS minted_by_address, gt.internal_created_at AS minted_at, \
         0 AS game_over, 0 AS score, gt.player_id AS player_name, \
         NULL AS context, NULL AS settings_data \
         FROM {} gt {} GROUP BY gt.token_id ORDER BY {} {} LIMIT {}",
        table(namespace, "GameToken"),
        game_conditions(world_namespace, query),
        query.sort_by.column(),
        query.sort_order.keyword(),
        query.limit,
    );
    if query.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", query.offset));
    }
    sql
}

pub fn games_count_query(
    namespace: &str,
    world_namespace: &str,
    query: &GameTokensQuery,
) -> String {
    format!(
        "SELECT COUNT(DISTINCT gt.token_id) AS count FROM {} gt {}",
        table(namespace, "GameToken"),
        game_conditions(world_namespace, query),
    )
}

/// `GameToken` rows for a set of ids, used to tell which registry tokens have a game.
pub fn game_tokens_by_ids(namespace: &str, token_ids: &[TokenId]) -> String {
    format!(
        "SELECT token_id, game_id, player_id FROM {} WHERE token_id IN ({}) LIMIT {}",
        table(namespace, "GameToken"),
        token_list(token_ids),
        token_ids.len().max(1),
    )
}

pub fn game_token_by_id(namespace: &str, token_id: TokenId) -> String {
    format!(
        "SELECT token_id, game_id, player_id FROM {} WHERE token_id = '{}' LIMIT 1",
        table(namespace, "GameToken"),
        token_id.padded(),
    )
}

pub fn game_by_id(namespace: &str, game_id: u32) -> String {
    format!(
        "SELECT * FROM {} WHERE game_id = {game_id} LIMIT 1",
        table(namespace, "Game"),
    )
}

pub fn game_store_packed(namespace: &str, key: &SessionKey) -> String {
    format!(
        "SELECT game_id, player_id, packed FROM {} WHERE game_id = {} AND player_id = '{}' LIMIT 1",
        table(namespace, "GameStorePacked"),
        key.game_id,
        key.player_id.pad_address(),
    )
}

pub fn season_models(namespace: &str, model: &str, season_version: u32) -> String {
    format!(
        "SELECT * FROM {} WHERE season_version = {season_version} LIMIT 1",
        table(namespace, model),
    )
}

/// Event rows for one session from a single event model table, oldest first.
pub fn events_for_game(namespace: &str, model: &str, key: &SessionKey) -> String {
    format!(
        "SELECT * FROM {} WHERE game_id = {} AND player_id = '{}' \
         ORDER BY internal_executed_at ASC LIMIT 10000",
        table(namespace, model),
        key.game_id,
        key.player_id.pad_address(),
    )
}

pub fn hall_of_fame(namespace: &str) -> String {
    format!(
        "SELECT season_version, game_id, player_id, \"player_name.value\", final_score, \
         claimable, position FROM {} WHERE position = 1 \
         ORDER BY season_version DESC LIMIT 1000",
        table(namespace, "Game"),
    )
}

pub fn registered_games_by_season(namespace: &str, season_version: u32) -> String {
    format!(
        "SELECT season_version, game_id, player_id, \"player_name.value\", final_score, \
         registered, claimed, claimable, position, multiplier, minigame_token_id \
         FROM {} WHERE season_version = {season_version} AND registered = true \
         ORDER BY final_score DESC LIMIT 1000",
        table(namespace, "Game"),
    )
}

pub fn config_table(namespace: &str, model: &str) -> String {
    format!("SELECT * FROM {}", table(namespace, model))
}
