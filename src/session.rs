//! Explicitly constructed session context: owns the config store, the game store and
//! the navigator, and drives token resolution against real (or fake) services.

use crate::{
    config_store::{
        ConfigSource,
        ConfigStore,
    },
    error::{
        Error,
        Result,
    },
    indexer::{
        WorldIndexer,
        WorldUpdate,
    },
    navigation::{
        self,
        Navigator,
        Route,
    },
    registry::TokenRegistry,
    resolver::{
        ResolveEffect,
        ResolveEvent,
        ResolveFailure,
        ResolveState,
        Resolver,
        RetryPolicy,
    },
    store::GameStore,
    systems::{
        Connection,
        GameSystems,
    },
    token_id::TokenId,
};
use std::collections::VecDeque;
use tokio::sync::mpsc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The session is loaded and the navigator sits on this route.
    Resolved(Route),
    Failed(ResolveFailure),
}

pub struct SessionContext<W, R, S> {
    config: ConfigStore,
    store: GameStore<W>,
    registry: R,
    systems: S,
    navigator: Navigator,
    policy: RetryPolicy,
    updates: mpsc::UnboundedReceiver<WorldUpdate>,
}

impl<W, R, S> SessionContext<W, R, S>
where
    W: WorldIndexer,
    R: TokenRegistry,
    S: GameSystems,
{
    pub fn new(world: W, registry: R, systems: S, policy: RetryPolicy) -> Self {
        let (sink, updates) = mpsc::unbounded_channel();
        Self {
            config: ConfigStore::new(),
            store: GameStore::new(world, sink),
            registry,
            systems,
            navigator: Navigator::default(),
            policy,
            updates,
        }
    }

    pub async fn init_config<C: ConfigSource>(&mut self, source: &C) -> Result<()> {
        self.config.init(source).await
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn store(&self) -> &GameStore<W> {
        &self.store
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn current_route(&self) -> &Route {
        self.navigator.current()
    }

    /// Resolves `raw_token_id` to a loaded session, creating the game on chain when the
    /// token was minted but never played.
    pub async fn resolve(&mut self, raw_token_id: &str) -> Result<ResolveOutcome> {
        let token_id = TokenId::normalize(raw_token_id)?;
        self.navigator.push(Route::Game(token_id));

        let mut resolver = Resolver::new(token_id, self.policy.clone());
        let mut effects: VecDeque<ResolveEffect> =
            resolver.handle(ResolveEvent::Start).into();

        while let Some(effect) = effects.pop_front() {
            if let Some(event) = self.run(token_id, effect).await {
                effects.extend(resolver.handle(event));
            }
        }

        match resolver.state() {
            ResolveState::Resolved => {
                let route = self.landing_route(token_id)?;
                self.navigator.push(route.clone());
                Ok(ResolveOutcome::Resolved(route))
            }
            ResolveState::Failed(failure) => {
                tracing::warn!(token = %token_id, ?failure, "token resolution failed");
                Ok(ResolveOutcome::Failed(failure.clone()))
            }
            state => Err(Error::Stalled(format!("{state:?}"))),
        }
    }

    async fn run(&mut self, token_id: TokenId, effect: ResolveEffect) -> Option<ResolveEvent> {
        match effect {
            ResolveEffect::ResolveGame => Some(self.resolve_game(token_id).await),
            ResolveEffect::QueryRegistry(token_id) => Some(self.query_registry(token_id).await),
            ResolveEffect::PollRegistry(token_id, delay) => {
                tokio::time::sleep(delay).await;
                Some(self.query_registry(token_id).await)
            }
            ResolveEffect::EnsureConnected => Some(self.ensure_connected().await),
            ResolveEffect::CreateGame(request) => {
                Some(match self.systems.create_game(&request).await {
                    Ok(tx) => ResolveEvent::GameCreated(tx),
                    Err(e) => ResolveEvent::CreateFailed(e.to_string()),
                })
            }
            ResolveEffect::ScheduleRetry(delay) => {
                tokio::time::sleep(delay).await;
                Some(ResolveEvent::RetryElapsed)
            }
            ResolveEffect::SetTournament(tournament_id) => {
                self.store.set_tournament_id(tournament_id);
                None
            }
            ResolveEffect::Navigate(route) => {
                self.navigator.push(route);
                None
            }
        }
    }

    async fn resolve_game(&mut self, token_id: TokenId) -> ResolveEvent {
        match self.store.init(&self.config, &token_id.to_string()).await {
            Ok(()) => ResolveEvent::GameResolved,
            Err(e) if e.is_not_started() => ResolveEvent::GameNotStarted,
            Err(e) => ResolveEvent::ResolveFailed(e.to_string()),
        }
    }

    async fn query_registry(&self, token_id: TokenId) -> ResolveEvent {
        match self.registry.lookup(token_id).await {
            Ok(observation) => ResolveEvent::Registry(observation),
            Err(e) => ResolveEvent::RegistryFailed(e.to_string()),
        }
    }

    async fn ensure_connected(&self) -> ResolveEvent {
        if let Some(account) = self.systems.account() {
            return ResolveEvent::Connected(account);
        }
        match self.systems.connect().await {
            Ok(Connection::Connected(account)) => ResolveEvent::Connected(account),
            Ok(Connection::Cancelled) => ResolveEvent::ConnectionCancelled,
            Err(e) => {
                tracing::warn!("wallet connection failed: {e}");
                ResolveEvent::ConnectionCancelled
            }
        }
    }

    fn landing_route(&self, token_id: TokenId) -> Result<Route> {
        let model = self
            .store
            .model()
            .ok_or_else(|| Error::MissingData("resolved session has no game model".to_string()))?;
        Ok(navigation::landing_route(token_id, model, self.store.events()))
    }

    /// Applies `update` and pushes the route it calls for, if any.
    pub fn apply(&mut self, update: WorldUpdate) -> Result<Option<Route>> {
        let route = self
            .store
            .apply(update, &self.config, self.navigator.current())?;
        Ok(route.filter(|route| self.navigator.push(route.clone())))
    }

    /// Waits for the next subscription push and applies it.
    pub async fn next_update(&mut self) -> Result<Option<Route>> {
        let update = self
            .updates
            .recv()
            .await
            .ok_or_else(|| Error::Subscription("update channel closed".to_string()))?;
        self.apply(update)
    }

    /// Marks the shown encounter result as seen and moves on.
    pub fn acknowledge_encounter(&mut self) -> Option<Route> {
        let route = self.store.acknowledge_encounter(self.navigator.current())?;
        self.navigator.push(route.clone()).then_some(route)
    }

    /// On the consequence screen of a finished game, acknowledges the final encounter
    /// result and returns the end route.
    pub fn finish_final_encounter(&mut self) -> Option<Route> {
        let token_id = self.store.token_id()?;
        let events = self.store.events();
        if *self.navigator.current() != Route::Consequence(token_id) || !events.is_game_over() {
            return None;
        }
        if let Some(result) = events.last_encounter_result() {
            tracing::info!(
                token = %token_id,
                encounter = ?events.last_encounter().map(|e| &e.data),
                result = %result.data,
                "final encounter"
            );
        }
        self.acknowledge_encounter()
    }

    /// Drops the session and returns to the lobby.
    pub fn teardown(&mut self) {
        self.store.reset();
        self.navigator.push(Route::Home);
    }
}
