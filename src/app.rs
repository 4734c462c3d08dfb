//! Command implementations behind the CLI.

use crate::{
    config_store::{
        IndexerConfigSource,
        RyoConfig,
    },
    felt::Felt,
    indexer::{
        SqlClient,
        SqlWorldIndexer,
        queries,
    },
    leaderboard::Leaderboard,
    manifest::{
        Manifest,
        Profile,
    },
    navigation::Route,
    registry::{
        MetagameClient,
        Pagination,
    },
    resolver::RetryPolicy,
    session::{
        ResolveOutcome,
        SessionContext,
    },
    systems::RpcSystems,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

pub const DEFAULT_TORII_URL: &str = "http://localhost:8080";
pub const DEFAULT_RPC_URL: &str = "http://localhost:5050";
pub const DEFAULT_NAMESPACE: &str = "dopewars";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub torii_url: String,
    pub rpc_url: String,
    pub profile: Profile,
    pub manifest_path: PathBuf,
    pub namespace: String,
    pub registry_namespace: String,
    pub log_dir: Option<PathBuf>,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        let profile = Profile::default();
        Self {
            torii_url: DEFAULT_TORII_URL.to_string(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            profile,
            manifest_path: PathBuf::from(profile.file_name()),
            namespace: DEFAULT_NAMESPACE.to_string(),
            registry_namespace: DEFAULT_NAMESPACE.to_string(),
            log_dir: None,
            poll_interval: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Poll intervals of zero would spin; anything under a millisecond is clamped.
    pub fn with_poll_ms(mut self, poll_ms: u64) -> Self {
        self.poll_interval = Duration::from_millis(poll_ms.max(1));
        self
    }

    fn sql(&self) -> Result<SqlClient> {
        SqlClient::new(&self.torii_url)
            .wrap_err_with(|| format!("Invalid Torii URL {}", self.torii_url))
    }

    fn metagame(&self, sql: SqlClient) -> MetagameClient {
        MetagameClient::new(sql, &self.registry_namespace, &self.namespace)
    }
}

async fn handle_interupt() {
    match tokio::signal::ctrl_c().await {
        Ok(_) => tracing::info!("Received interrupt, exiting"),
        Err(_) => tracing::warn!("Received interrupt error, exiting anyway"),
    }
}

pub async fn run_play(config: &AppConfig, token: &str) -> Result<()> {
    let manifest = Manifest::load(&config.manifest_path)?;
    let config_address = manifest.config_address()?;
    tracing::info!(profile = %config.profile, world = %manifest.world.address, "loaded manifest");

    let sql = config.sql()?;
    let systems = RpcSystems::new(&config.rpc_url, config_address)
        .wrap_err_with(|| format!("Invalid RPC URL {}", config.rpc_url))?;
    let world = SqlWorldIndexer::new(sql.clone(), &config.namespace, config.poll_interval);
    let registry = config.metagame(sql.clone());
    let source = IndexerConfigSource::new(sql, &config.namespace, systems.clone());

    let mut session = SessionContext::new(world, registry, systems, config.retry.clone());
    session
        .init_config(&source)
        .await
        .wrap_err("Failed to load game config")?;

    match session.resolve(token).await? {
        ResolveOutcome::Resolved(route) => println!("{route}"),
        ResolveOutcome::Failed(failure) => {
            println!("{}", Route::Home);
            return Err(eyre!("Could not open token {token}: {failure:?}"));
        }
    }
    if session.current_route().is_end() {
        return Ok(());
    }

    let interrupt = handle_interupt();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            _ = &mut interrupt => break,
            update = session.next_update() => {
                if let Some(route) = update? {
                    println!("{route}");
                    if let Some(end) = session.finish_final_encounter() {
                        println!("{end}");
                    }
                    if session.current_route().is_end() {
                        break;
                    }
                }
            }
        }
    }
    session.teardown();
    Ok(())
}

async fn current_season(config: &AppConfig, sql: &SqlClient) -> Result<u32> {
    let rows = sql
        .query::<RyoConfig>(&queries::config_table(&config.namespace, "RyoConfig"))
        .await?;
    rows.first()
        .map(|ryo| ryo.season_version)
        .ok_or_else(|| eyre!("RyoConfig not indexed yet"))
}

pub async fn run_leaderboard(config: &AppConfig, season: Option<u32>) -> Result<()> {
    let sql = config.sql()?;
    let season = match season {
        Some(season) => season,
        None => current_season(config, &sql).await?,
    };
    let leaderboard = Leaderboard::new(sql.clone(), &config.namespace, config.metagame(sql));
    let games = leaderboard.registered_games(season).await?;
    println!("season {season}: {} registered games", games.len());
    for (rank, game) in games.iter().enumerate() {
        println!(
            "{:>4}  {:<20} {:>10}  game {}",
            rank + 1,
            game.player_name,
            game.final_score,
            game.game_id
        );
    }
    Ok(())
}

pub async fn run_hall_of_fame(config: &AppConfig) -> Result<()> {
    let sql = config.sql()?;
    let leaderboard = Leaderboard::new(sql.clone(), &config.namespace, config.metagame(sql));
    for game in leaderboard.hall_of_fame().await? {
        println!(
            "season {:>3}  {:<20} {:>10}  claimable {}",
            game.season_version, game.player_name, game.final_score, game.claimable
        );
    }
    Ok(())
}

pub async fn run_games(config: &AppConfig, owner: Felt, page: u32, page_size: u32) -> Result<()> {
    let sql = config.sql()?;
    let leaderboard = Leaderboard::new(sql.clone(), &config.namespace, config.metagame(sql));
    let total = leaderboard.your_games_count(owner).await?;
    let mut pagination = Pagination::new(page_size, total);
    pagination.go_to(page);

    let games = leaderboard.your_games(owner, &pagination).await?;
    println!(
        "page {}/{} ({total} games in progress)",
        pagination.current_page + 1,
        pagination.total_pages().max(1)
    );
    for game in games {
        println!(
            "{}  game {:<6} {}",
            game.token.token_id, game.token.game_id, game.token.player_name
        );
    }
    Ok(())
}
