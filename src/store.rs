//! The single active game session.

use crate::{
    config_store::ConfigStore,
    error::{
        Error,
        Result,
    },
    events::EventLog,
    game::GameModel,
    indexer::{
        SeasonData,
        SessionKey,
        Subscription,
        UpdateSink,
        WorldIndexer,
        WorldUpdate,
    },
    navigation::{
        self,
        Route,
    },
    token_id::TokenId,
};

pub struct GameStore<W> {
    world: W,
    sink: UpdateSink,
    token_id: Option<TokenId>,
    tournament_id: Option<String>,
    model: Option<GameModel>,
    events: EventLog,
    subscriptions: Vec<Subscription>,
    generation: u64,
    initialized: bool,
}

impl<W: WorldIndexer> GameStore<W> {
    pub fn new(world: W, sink: UpdateSink) -> Self {
        Self {
            world,
            sink,
            token_id: None,
            tournament_id: None,
            model: None,
            events: EventLog::default(),
            subscriptions: Vec::new(),
            generation: 0,
            initialized: false,
        }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn token_id(&self) -> Option<TokenId> {
        self.token_id
    }

    pub fn model(&self) -> Option<&GameModel> {
        self.model.as_ref()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn tournament_id(&self) -> Option<&str> {
        self.tournament_id.as_deref()
    }

    pub fn set_tournament_id(&mut self, tournament_id: Option<String>) {
        self.tournament_id = tournament_id;
    }

    /// Loads the session for `raw_token_id`. Calling it again for the same token once
    /// loaded does nothing.
    ///
    /// Fails with [`Error::GameNotStarted`] while the token has no game yet, and with
    /// [`Error::MissingData`] when the indexer has not caught up with part of the session.
    pub async fn init(&mut self, config: &ConfigStore, raw_token_id: &str) -> Result<()> {
        let token_id = TokenId::normalize(raw_token_id)?;
        if self.initialized && self.token_id == Some(token_id) {
            return Ok(());
        }
        if !config.is_initialized() {
            return Err(Error::ConfigNotInitialized);
        }
        if self.token_id != Some(token_id) {
            self.reset();
            self.token_id = Some(token_id);
        }

        let row = self
            .world
            .game_token(token_id)
            .await?
            .filter(|row| row.game_id != 0)
            .ok_or(Error::GameNotStarted(token_id))?;

        let info = self
            .world
            .game(row.game_id)
            .await?
            .ok_or_else(|| Error::MissingData(format!("game {}", row.game_id)))?;
        let key = info.session_key();

        let packed = self
            .world
            .game_store(&key)
            .await?
            .ok_or_else(|| Error::MissingData(format!("game store for game {}", key.game_id)))?;

        let season = self
            .world
            .season(info.season_version)
            .await?
            .ok_or_else(|| {
                Error::MissingData(format!("season {} settings", info.season_version))
            })?;

        let events = self.world.game_events(&key).await?;

        let model = GameModel::decode(config, info, season, packed)?;
        tracing::info!(
            token = %token_id,
            game_id = key.game_id,
            events = events.len(),
            "game session loaded"
        );
        self.model = Some(model);
        self.events = EventLog::new(events);
        self.subscribe(key)?;
        self.initialized = true;
        Ok(())
    }

    /// Replaces any live subscriptions with a fresh pair for `key`. Whatever is already
    /// loaded is the baseline, so only changes since the load are pushed.
    pub fn subscribe(&mut self, key: SessionKey) -> Result<()> {
        self.cancel_subscriptions();
        self.generation += 1;
        let baseline = self.model.as_ref().map(|model| model.packed.packed);
        let seen = self.events.iter().map(|event| event.id.clone()).collect();
        let game_store = self.world.subscribe_game_store(
            key,
            self.generation,
            baseline,
            self.sink.clone(),
        )?;
        let events = self
            .world
            .subscribe_events(key, self.generation, seen, self.sink.clone())?;
        self.subscriptions = vec![game_store, events];
        tracing::debug!(game_id = key.game_id, generation = self.generation, "subscribed");
        Ok(())
    }

    fn cancel_subscriptions(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
    }

    pub fn reset(&mut self) {
        self.cancel_subscriptions();
        self.generation += 1;
        self.token_id = None;
        self.tournament_id = None;
        self.model = None;
        self.events = EventLog::default();
        self.initialized = false;
    }

    /// Applies a subscription push and returns the route it calls for.
    ///
    /// Pushes from a superseded subscription are dropped.
    pub fn apply(
        &mut self,
        update: WorldUpdate,
        config: &ConfigStore,
        current: &Route,
    ) -> Result<Option<Route>> {
        if update.generation() != self.generation {
            tracing::debug!(
                generation = update.generation(),
                current = self.generation,
                "dropping stale update"
            );
            return Ok(None);
        }
        let (Some(token_id), Some(model)) = (self.token_id, self.model.as_ref()) else {
            return Ok(None);
        };

        match update {
            WorldUpdate::GameStore { packed, .. } => {
                let prev_status = model.player.status;
                let season = SeasonData {
                    settings: model.season_settings.clone(),
                    config: model.game_config.clone(),
                };
                let next = GameModel::decode(config, model.info.clone(), season, packed)?;
                let route = navigation::react(token_id, prev_status, &next, &self.events, current);
                self.model = Some(next);
                Ok(route)
            }
            WorldUpdate::Event { event, .. } => {
                if self.events.contains_id(&event.id) {
                    return Ok(None);
                }
                let was_over = self.events.is_game_over();
                tracing::debug!(kind = ?event.kind, id = %event.id, "event");
                self.events.push(event);
                if !was_over && self.events.is_game_over() {
                    return Ok(navigation::on_game_over(token_id, &self.events, current));
                }
                Ok(None)
            }
        }
    }

    /// Marks the latest encounter result as shown and returns where to go next.
    pub fn acknowledge_encounter(&mut self, current: &Route) -> Option<Route> {
        self.events.acknowledge_encounter();
        let token_id = self.token_id?;
        let model = self.model.as_ref()?;
        navigation::react(
            token_id,
            model.player.status,
            model,
            &self.events,
            current,
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        events::GameEvent,
        test_helpers::{
            FakeWorld,
            fixtures,
        },
        types::PlayerStatus,
    };
    use serde_json::json;
    use tokio::sync::mpsc;

    const TOKEN: &str = "95048";

    fn token() -> TokenId {
        TokenId::normalize(TOKEN).unwrap()
    }

    fn store(world: &FakeWorld) -> (GameStore<FakeWorld>, mpsc::UnboundedReceiver<WorldUpdate>) {
        let (sink, updates) = mpsc::unbounded_channel();
        (GameStore::new(world.clone(), sink), updates)
    }

    fn started_world(packed: crate::felt::Felt) -> FakeWorld {
        let world = FakeWorld::default();
        world.insert_game(token(), 7, packed);
        world
    }

    #[tokio::test]
    async fn init__loads_session_and_subscribes() {
        // given
        let world = started_world(fixtures::PackedGame::default().location(2).build());
        let (mut store, _updates) = store(&world);

        // when
        store.init(&fixtures::config_store(), TOKEN).await.unwrap();

        // then
        assert!(store.is_initialized());
        assert_eq!(store.token_id(), Some(token()));
        let model = store.model().unwrap();
        assert_eq!(model.info.game_id, 7);
        assert_eq!(model.player.location.as_deref(), Some("brooklyn"));
        assert_eq!(world.live_subscriptions(), 2);
    }

    #[tokio::test]
    async fn init__is_a_no_op_for_the_same_token() {
        // given
        let world = started_world(fixtures::PackedGame::default().build());
        let (mut store, _updates) = store(&world);
        store.init(&fixtures::config_store(), TOKEN).await.unwrap();
        let generation = store.generation();

        // when
        store.init(&fixtures::config_store(), "0x17348").await.unwrap();

        // then
        assert_eq!(store.generation(), generation);
        assert_eq!(world.game_token_lookups(), 1);
    }

    #[tokio::test]
    async fn init__fails_fast_without_config() {
        let world = started_world(fixtures::PackedGame::default().build());
        let (mut store, _updates) = store(&world);

        let result = store.init(&ConfigStore::new(), TOKEN).await;

        assert!(matches!(result, Err(Error::ConfigNotInitialized)));
        assert_eq!(world.game_token_lookups(), 0);
    }

    #[tokio::test]
    async fn init__reports_not_started_for_unlinked_token() {
        // given
        let world = FakeWorld::default();
        world.insert_token(token(), 0);
        let (mut store, _updates) = store(&world);

        // when
        let result = store.init(&fixtures::config_store(), TOKEN).await;

        // then
        assert!(matches!(result, Err(e) if e.is_not_started()));
        assert!(!store.is_initialized());
    }

    #[tokio::test]
    async fn init__missing_season_is_transient() {
        // given
        let world = started_world(fixtures::PackedGame::default().build());
        world.clear_seasons();
        let (mut store, _updates) = store(&world);

        // when
        let result = store.init(&fixtures::config_store(), TOKEN).await;

        // then
        assert!(matches!(&result, Err(Error::MissingData(_))));
        assert!(result.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn subscribe__replaces_previous_subscriptions() {
        // given
        let world = started_world(fixtures::PackedGame::default().build());
        let (mut store, _updates) = store(&world);
        store.init(&fixtures::config_store(), TOKEN).await.unwrap();
        let key = store.model().unwrap().info.session_key();

        // when
        store.subscribe(key).unwrap();
        store.subscribe(key).unwrap();

        // then
        assert_eq!(world.live_subscriptions(), 2);
        assert_eq!(world.total_subscriptions(), 6);
    }

    #[tokio::test]
    async fn subscribe__delivers_changes_that_landed_after_the_load() {
        // given
        let world = started_world(fixtures::PackedGame::default().location(2).build());
        let config = fixtures::config_store();
        let (mut store, mut updates) = store(&world);
        store.init(&config, TOKEN).await.unwrap();
        assert!(updates.try_recv().is_err());
        let key = store.model().unwrap().info.session_key();
        world.set_game_store(key, fixtures::PackedGame::default().location(2).cash(5).build());
        world.insert_events(vec![GameEvent::new("GameOver", "0x1:0x2:0x0", json!({}))]);

        // when
        store.subscribe(key).unwrap();
        let packed = updates.recv().await.unwrap();
        let event = updates.recv().await.unwrap();
        store.apply(packed, &config, &Route::Home).unwrap();
        let route = store.apply(event, &config, &Route::Home).unwrap();

        // then
        assert_eq!(store.model().unwrap().player.cash, 5);
        assert_eq!(route, Some(Route::End(token())));
        assert!(store.events().is_game_over());
    }

    #[tokio::test]
    async fn reset__cancels_subscriptions_and_clears_session() {
        // given
        let world = started_world(fixtures::PackedGame::default().build());
        let (mut store, _updates) = store(&world);
        store.init(&fixtures::config_store(), TOKEN).await.unwrap();
        store.set_tournament_id(Some("3".into()));

        // when
        store.reset();

        // then
        assert_eq!(world.live_subscriptions(), 0);
        assert!(store.model().is_none());
        assert!(store.token_id().is_none());
        assert!(store.tournament_id().is_none());
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn apply__packed_update_reacts_to_status_change() {
        // given
        let world = started_world(
            fixtures::PackedGame::default()
                .location(1)
                .status(PlayerStatus::BeingMugged)
                .build(),
        );
        let config = fixtures::config_store();
        let (mut store, mut updates) = store(&world);
        store.init(&config, TOKEN).await.unwrap();

        // when
        world.push_game_store(fixtures::PackedGame::default().location(1).cash(10).build());
        let update = updates.recv().await.unwrap();
        let route = store.apply(update, &config, &Route::Decision(token())).unwrap();

        // then
        assert_eq!(route, Some(Route::Consequence(token())));
        assert_eq!(store.model().unwrap().player.cash, 10);
        assert_eq!(store.model().unwrap().player.status, PlayerStatus::Normal);
    }

    #[tokio::test]
    async fn apply__drops_updates_from_old_generation() {
        // given
        let world = started_world(fixtures::PackedGame::default().build());
        let config = fixtures::config_store();
        let (mut store, _updates) = store(&world);
        store.init(&config, TOKEN).await.unwrap();
        let stale = WorldUpdate::GameStore {
            generation: store.generation() - 1,
            packed: fixtures::packed(7, fixtures::PackedGame::default().cash(999).build()),
        };

        // when
        let route = store.apply(stale, &config, &Route::Home).unwrap();

        // then
        assert_eq!(route, None);
        assert_eq!(store.model().unwrap().player.cash, 0);
    }

    #[tokio::test]
    async fn apply__game_over_event_navigates_once() {
        // given
        let world = started_world(fixtures::PackedGame::default().location(3).build());
        let config = fixtures::config_store();
        let (mut store, _updates) = store(&world);
        store.init(&config, TOKEN).await.unwrap();
        let generation = store.generation();
        let game_over = |id: &str| WorldUpdate::Event {
            generation,
            event: GameEvent::new("dopewars-GameOver", id, json!({})),
        };
        let current = Route::Location(token(), "bronx".into());

        // when
        let first = store.apply(game_over("a"), &config, &current).unwrap();
        let duplicate = store.apply(game_over("a"), &config, &current).unwrap();
        let second = store.apply(game_over("b"), &config, &current).unwrap();

        // then
        assert_eq!(first, Some(Route::End(token())));
        assert_eq!(duplicate, None);
        assert_eq!(second, None);
        assert_eq!(store.events().len(), 2);
    }

    #[tokio::test]
    async fn acknowledge_encounter__moves_from_consequence_to_end() {
        // given
        let world = started_world(fixtures::PackedGame::default().location(3).build());
        world.insert_events(vec![
            GameEvent::new("TravelEncounter", "1", json!({})),
            GameEvent::new("TravelEncounterResult", "2", json!({})),
            GameEvent::new("GameOver", "3", json!({})),
        ]);
        let config = fixtures::config_store();
        let (mut store, _updates) = store(&world);
        store.init(&config, TOKEN).await.unwrap();

        // when
        let route = store.acknowledge_encounter(&Route::Consequence(token()));

        // then
        assert_eq!(route, Some(Route::End(token())));
    }
}
