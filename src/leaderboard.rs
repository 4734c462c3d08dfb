use crate::{
    error::Result,
    felt::Felt,
    indexer::{
        GameInfo,
        SqlClient,
        queries,
    },
    registry::{
        GameTokensQuery,
        MetagameClient,
        Pagination,
        RegistryToken,
    },
};

/// Ranked seasons first by paid position, then by score.
pub fn rank_key(game: &GameInfo) -> u64 {
    let placed = if game.position > 0 {
        9999u64.saturating_sub(u64::from(game.position)) * 1_000_000_000
    } else {
        0
    };
    placed + u64::from(game.final_score)
}

pub fn sort_registered(games: &mut [GameInfo]) {
    games.sort_by_key(|game| std::cmp::Reverse(rank_key(game)));
}

fn your_games_query(owner: Felt) -> GameTokensQuery {
    GameTokensQuery {
        owner: Some(owner),
        in_progress: true,
        ..Default::default()
    }
}

pub struct Leaderboard {
    sql: SqlClient,
    namespace: String,
    metagame: MetagameClient,
}

impl Leaderboard {
    pub fn new(sql: SqlClient, namespace: impl Into<String>, metagame: MetagameClient) -> Self {
        Self {
            sql,
            namespace: namespace.into(),
            metagame,
        }
    }

    /// Season winners, newest season first.
    pub async fn hall_of_fame(&self) -> Result<Vec<GameInfo>> {
        self.sql
            .query::<GameInfo>(&queries::hall_of_fame(&self.namespace))
            .await
    }

    pub async fn registered_games(&self, season_version: u32) -> Result<Vec<GameInfo>> {
        let mut games = self
            .sql
            .query::<GameInfo>(&queries::registered_games_by_season(
                &self.namespace,
                season_version,
            ))
            .await?;
        sort_registered(&mut games);
        Ok(games)
    }

    /// Number of the owner's games in progress, counted with the same filter
    /// [`Leaderboard::your_games`] pages over.
    pub async fn your_games_count(&self, owner: Felt) -> Result<u64> {
        self.metagame.games_count(&your_games_query(owner)).await
    }

    /// One page of the owner's games that have started and are not over.
    pub async fn your_games(&self, owner: Felt, page: &Pagination) -> Result<Vec<RegistryToken>> {
        let mut query = your_games_query(owner);
        page.apply(&mut query);
        let tokens = self.metagame.games_with_status(&query).await?;
        tracing::debug!(%owner, page = page.current_page, found = tokens.len(), "your games");
        Ok(tokens)
    }
}
