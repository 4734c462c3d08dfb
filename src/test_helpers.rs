//! In-memory stand-ins for the indexer, the registry and the wallet, plus shared fixtures.

use crate::{
    config_store::{
        ConfigSource,
        GameConfigData,
    },
    error::{
        Error,
        Result,
    },
    events::GameEvent,
    felt::Felt,
    indexer::{
        GameInfo,
        GameStorePacked,
        GameTokenRow,
        SeasonData,
        SessionKey,
        Subscription,
        UpdateSink,
        WorldIndexer,
        WorldUpdate,
    },
    registry::{
        RegistryObservation,
        RegistryToken,
        TokenRegistry,
    },
    systems::{
        Connection,
        CreateGameRequest,
        GameSystems,
        TxHash,
    },
    token_id::TokenId,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use tokio::sync::oneshot::{
    self,
    error::TryRecvError,
};

pub mod fixtures {
    use crate::{
        bits,
        config_store::{
            ConfigStore,
            DrugConfig,
            GameConfigData,
            LayoutItem,
            Layouts,
            LocationConfig,
            RyoConfig,
        },
        felt::Felt,
        game::GameModel,
        indexer::{
            GameConfig,
            GameInfo,
            GameStorePacked,
            SeasonData,
            SeasonSettings,
        },
        registry::{
            ContextData,
            GameTokenData,
            RegistryObservation,
            RegistryToken,
        },
        token_id::TokenId,
        types::{
            GameMode,
            ItemSlot,
            PlayerStatus,
        },
    };

    pub const GAME_ID: u32 = 7;
    pub const SEASON: u32 = 1;
    pub const DRUGS_MODE: &str = "Normal";

    pub fn player() -> Felt {
        Felt::from(0xabcu64)
    }

    fn item(name: &str, idx: u32, bits: u32) -> LayoutItem {
        LayoutItem {
            name: name.to_string(),
            idx,
            bits,
        }
    }

    pub fn layouts() -> Layouts {
        Layouts {
            game_store: vec![
                item("markets", 0, 144),
                item("items", 144, 8),
                item("drugs", 152, 16),
                item("wanted", 168, 18),
                item("player", 186, 70),
            ],
            player: vec![
                item("cash", 0, 32),
                item("health", 32, 7),
                item("turn", 39, 7),
                item("status", 46, 2),
                item("prev_location", 48, 3),
                item("location", 51, 3),
                item("next_location", 54, 3),
                item("drug_level", 57, 3),
                item("reputation", 60, 8),
            ],
        }
    }

    /// `get_config` response carrying [`layouts`].
    pub fn raw_layouts() -> Vec<Felt> {
        let layouts = layouts();
        let mut raw = Vec::new();
        for list in [&layouts.game_store, &layouts.player] {
            raw.push(Felt::from(list.len() as u64));
            for item in list {
                raw.push(Felt::from_short_string(&item.name).unwrap());
                raw.push(Felt::from(u64::from(item.idx)));
                raw.push(Felt::from(u64::from(item.bits)));
            }
        }
        raw
    }

    pub fn config_data() -> GameConfigData {
        let drugs = ["Ludes", "Speed", "Weed", "Shrooms"]
            .iter()
            .enumerate()
            .map(|(id, name)| DrugConfig {
                drugs_mode: DRUGS_MODE.to_string(),
                drug: name.to_string(),
                drug_id: id as u8,
                base: 500,
                step: 10,
                weight: 1,
                name: name.to_string(),
            })
            .collect();
        let locations = ["Home", "Queens", "Brooklyn", "Bronx", "Jersey", "Central", "Coney"]
            .iter()
            .enumerate()
            .map(|(id, name)| LocationConfig {
                location: name.to_string(),
                location_id: id as u8,
                name: name.to_string(),
            })
            .collect();

        GameConfigData {
            ryo: RyoConfig {
                season_version: SEASON,
                paused: false,
                season_duration: 86_400,
            },
            drugs,
            locations,
            item_tiers: Vec::new(),
            tier_configs: Vec::new(),
            layouts: layouts(),
        }
    }

    pub fn config_store() -> ConfigStore {
        ConfigStore::from_data(config_data())
    }

    /// Builder for a packed game store word in the [`layouts`] layout.
    #[derive(Clone, Debug, Default)]
    pub struct PackedGame {
        cash: u64,
        health: u64,
        turn: u64,
        status: u64,
        location: u8,
        drug_level: u8,
        ticks: Vec<(u8, u8, u64)>,
        item_levels: [u8; 4],
    }

    impl PackedGame {
        pub fn cash(mut self, cash: u64) -> Self {
            self.cash = cash;
            self
        }

        pub fn health(mut self, health: u64) -> Self {
            self.health = health;
            self
        }

        pub fn turn(mut self, turn: u64) -> Self {
            self.turn = turn;
            self
        }

        pub fn status(mut self, status: PlayerStatus) -> Self {
            self.status = match status {
                PlayerStatus::Normal => 0,
                PlayerStatus::BeingMugged => 1,
                PlayerStatus::BeingArrested => 2,
            };
            self
        }

        pub fn location(mut self, location: u8) -> Self {
            self.location = location;
            self
        }

        pub fn drug_level(mut self, drug_level: u8) -> Self {
            self.drug_level = drug_level;
            self
        }

        pub fn tick(mut self, location: u8, drug: u8, value: u64) -> Self {
            self.ticks.push((location, drug, value));
            self
        }

        pub fn item_level(mut self, slot: ItemSlot, level: u8) -> Self {
            self.item_levels[slot.index() as usize] = level;
            self
        }

        pub fn build(&self) -> Felt {
            let put = |word: Felt, offset: u32, width: u32, value: u64| {
                bits::insert(&word, offset, width, &Felt::from(value))
            };

            let mut player = Felt::ZERO;
            player = put(player, 0, 32, self.cash);
            player = put(player, 32, 7, self.health);
            player = put(player, 39, 7, self.turn);
            player = put(player, 46, 2, self.status);
            player = put(player, 51, 3, u64::from(self.location));
            player = put(player, 57, 3, u64::from(self.drug_level));

            let mut markets = Felt::ZERO;
            for (location, drug, value) in &self.ticks {
                let slot = u32::from(location.saturating_sub(1)) * 4 + u32::from(*drug) % 4;
                markets = put(markets, slot * 6, 6, *value);
            }

            let mut items = Felt::ZERO;
            for slot in ItemSlot::ALL {
                let level = self.item_levels[slot.index() as usize];
                items = put(items, slot.index() * 2, 2, u64::from(level));
            }

            let mut packed = Felt::ZERO;
            packed = bits::insert(&packed, 0, 144, &markets);
            packed = bits::insert(&packed, 144, 8, &items);
            packed = bits::insert(&packed, 186, 70, &player);
            packed
        }
    }

    pub fn game_info(game_id: u32) -> GameInfo {
        GameInfo {
            season_version: SEASON,
            game_id,
            player_id: player(),
            game_mode: GameMode::Ranked,
            player_name: "Dealer".to_string(),
            multiplier: 1,
            equipment_by_slot: vec![0x1, 0x102, 0x503, 0x204],
            ..Default::default()
        }
    }

    pub fn season() -> SeasonData {
        let mode = |m: &str| m.to_string();
        SeasonData {
            settings: SeasonSettings {
                season_version: SEASON,
                cash_mode: mode("Normal"),
                health_mode: mode("Normal"),
                turns_mode: mode("Normal"),
                encounters_mode: mode("Normal"),
                encounters_odds_mode: mode("Normal"),
                drugs_mode: mode(DRUGS_MODE),
                wanted_mode: mode("Normal"),
            },
            config: GameConfig {
                season_version: SEASON,
                cash: 1000,
                health: 100,
                max_turns: 30,
                max_wanted_shopping: 5,
            },
        }
    }

    pub fn packed(game_id: u32, packed: Felt) -> GameStorePacked {
        GameStorePacked {
            game_id,
            player_id: player(),
            packed,
        }
    }

    pub fn model(packed_game: Felt) -> GameModel {
        GameModel::decode(
            &config_store(),
            game_info(GAME_ID),
            season(),
            packed(GAME_ID, packed_game),
        )
        .unwrap()
    }

    pub fn registry_token(
        token_id: TokenId,
        has_game: bool,
        tournament_id: Option<&str>,
    ) -> RegistryToken {
        let mut context = ContextData::default();
        if let Some(id) = tournament_id {
            context
                .contexts
                .insert("Tournament ID".to_string(), id.into());
        }
        RegistryToken {
            token: GameTokenData {
                token_id,
                game_id: if has_game { GAME_ID } else { 0 },
                owner: player(),
                minted_by: player(),
                minted_at: Some(1_740_823_200),
                game_over: false,
                score: 0,
                player_name: "Dealer".to_string(),
                context,
                settings: Default::default(),
            },
            has_game,
        }
    }

    pub fn observation(generation: u64, tokens: Vec<RegistryToken>) -> RegistryObservation {
        RegistryObservation {
            generation,
            settled: true,
            tokens,
        }
    }
}

/// [`ConfigSource`] serving fixed data.
#[derive(Clone, Debug)]
pub struct FakeConfigSource(pub GameConfigData);

impl Default for FakeConfigSource {
    fn default() -> Self {
        Self(fixtures::config_data())
    }
}

impl ConfigSource for FakeConfigSource {
    async fn load(&self) -> Result<GameConfigData> {
        Ok(self.0.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    GameStore,
    Events,
}

#[derive(Debug)]
struct FakeSubscription {
    stream: Stream,
    key: SessionKey,
    generation: u64,
    sink: UpdateSink,
    cancelled: oneshot::Receiver<()>,
}

impl FakeSubscription {
    fn is_live(&mut self) -> bool {
        matches!(self.cancelled.try_recv(), Err(TryRecvError::Empty))
    }
}

#[derive(Debug)]
struct StagedGame {
    token_id: TokenId,
    game_id: u32,
    packed: Felt,
    misses_left: usize,
}

#[derive(Debug, Default)]
struct WorldState {
    tokens: HashMap<TokenId, GameTokenRow>,
    games: HashMap<u32, GameInfo>,
    stores: HashMap<SessionKey, GameStorePacked>,
    seasons: HashMap<u32, SeasonData>,
    events: Vec<GameEvent>,
    staged: Vec<StagedGame>,
    game_token_lookups: usize,
    subscriptions: Vec<FakeSubscription>,
    total_subscriptions: usize,
}

impl WorldState {
    fn insert_game(&mut self, token_id: TokenId, game_id: u32, packed: Felt) {
        let info = fixtures::game_info(game_id);
        let key = info.session_key();
        self.tokens.insert(token_id, GameTokenRow {
            token_id,
            game_id,
            player_id: info.player_id,
        });
        self.stores.insert(key, fixtures::packed(game_id, packed));
        self.seasons.insert(info.season_version, fixtures::season());
        self.games.insert(game_id, info);
    }

    fn live(&mut self, stream: Stream) -> impl Iterator<Item = &FakeSubscription> {
        self.subscriptions.retain_mut(FakeSubscription::is_live);
        self.subscriptions.iter().filter(move |s| s.stream == stream)
    }
}

/// Indexer held entirely in memory. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct FakeWorld {
    state: Arc<Mutex<WorldState>>,
}

impl FakeWorld {
    pub fn insert_token(&self, token_id: TokenId, game_id: u32) {
        self.state.lock().unwrap().tokens.insert(token_id, GameTokenRow {
            token_id,
            game_id,
            player_id: fixtures::player(),
        });
    }

    /// Token, game, packed state and season for a started game.
    pub fn insert_game(&self, token_id: TokenId, game_id: u32, packed: Felt) {
        self.state
            .lock()
            .unwrap()
            .insert_game(token_id, game_id, packed);
    }

    /// Like [`FakeWorld::insert_game`], but the next `misses` token lookups still miss.
    pub fn stage_game(&self, token_id: TokenId, game_id: u32, packed: Felt, misses: usize) {
        self.state.lock().unwrap().staged.push(StagedGame {
            token_id,
            game_id,
            packed,
            misses_left: misses,
        });
    }

    /// Overwrites the packed state without pushing it.
    pub fn set_game_store(&self, key: SessionKey, packed: Felt) {
        let mut state = self.state.lock().unwrap();
        state.stores.insert(key, GameStorePacked {
            game_id: key.game_id,
            player_id: key.player_id,
            packed,
        });
    }

    pub fn insert_events(&self, events: Vec<GameEvent>) {
        self.state.lock().unwrap().events.extend(events);
    }

    pub fn clear_seasons(&self) {
        self.state.lock().unwrap().seasons.clear();
    }

    pub fn game_token_lookups(&self) -> usize {
        self.state.lock().unwrap().game_token_lookups
    }

    pub fn live_subscriptions(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.subscriptions.retain_mut(FakeSubscription::is_live);
        state.subscriptions.len()
    }

    pub fn total_subscriptions(&self) -> usize {
        self.state.lock().unwrap().total_subscriptions
    }

    /// Writes new packed state and pushes it to live game store subscriptions.
    pub fn push_game_store(&self, packed: Felt) {
        let mut state = self.state.lock().unwrap();
        let mut pushed = Vec::new();
        for sub in state.live(Stream::GameStore) {
            let packed = GameStorePacked {
                game_id: sub.key.game_id,
                player_id: sub.key.player_id,
                packed,
            };
            let _ = sub.sink.send(WorldUpdate::GameStore {
                generation: sub.generation,
                packed,
            });
            pushed.push(packed);
        }
        for packed in pushed {
            state.stores.insert(
                SessionKey {
                    game_id: packed.game_id,
                    player_id: packed.player_id,
                },
                packed,
            );
        }
    }

    pub fn push_event(&self, event: GameEvent) {
        let mut state = self.state.lock().unwrap();
        for sub in state.live(Stream::Events) {
            let _ = sub.sink.send(WorldUpdate::Event {
                generation: sub.generation,
                event: event.clone(),
            });
        }
        state.events.push(event);
    }

    fn subscribe(
        &self,
        stream: Stream,
        key: SessionKey,
        generation: u64,
        sink: UpdateSink,
    ) -> Subscription {
        let (cancel, cancelled) = oneshot::channel();
        let mut state = self.state.lock().unwrap();
        state.total_subscriptions += 1;
        state.subscriptions.push(FakeSubscription {
            stream,
            key,
            generation,
            sink,
            cancelled,
        });
        Subscription::new(cancel)
    }
}

impl WorldIndexer for FakeWorld {
    async fn game_token(&self, token_id: TokenId) -> Result<Option<GameTokenRow>> {
        let mut state = self.state.lock().unwrap();
        state.game_token_lookups += 1;

        let mut ready = Vec::new();
        state.staged.retain_mut(|staged| {
            if staged.token_id != token_id {
                return true;
            }
            if staged.misses_left == 0 {
                ready.push((staged.token_id, staged.game_id, staged.packed));
                return false;
            }
            staged.misses_left -= 1;
            true
        });
        for (token_id, game_id, packed) in ready {
            state.insert_game(token_id, game_id, packed);
        }

        Ok(state.tokens.get(&token_id).cloned())
    }

    async fn game(&self, game_id: u32) -> Result<Option<GameInfo>> {
        Ok(self.state.lock().unwrap().games.get(&game_id).cloned())
    }

    async fn game_store(&self, key: &SessionKey) -> Result<Option<GameStorePacked>> {
        Ok(self.state.lock().unwrap().stores.get(key).copied())
    }

    async fn season(&self, season_version: u32) -> Result<Option<SeasonData>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .seasons
            .get(&season_version)
            .cloned())
    }

    async fn game_events(&self, _key: &SessionKey) -> Result<Vec<GameEvent>> {
        Ok(self.state.lock().unwrap().events.clone())
    }

    fn subscribe_game_store(
        &self,
        key: SessionKey,
        generation: u64,
        baseline: Option<Felt>,
        sink: UpdateSink,
    ) -> Result<Subscription> {
        let current = self.state.lock().unwrap().stores.get(&key).copied();
        if let Some(packed) = current.filter(|current| Some(current.packed) != baseline) {
            let _ = sink.send(WorldUpdate::GameStore { generation, packed });
        }
        Ok(self.subscribe(Stream::GameStore, key, generation, sink))
    }

    fn subscribe_events(
        &self,
        key: SessionKey,
        generation: u64,
        seen: HashSet<String>,
        sink: UpdateSink,
    ) -> Result<Subscription> {
        let missed: Vec<GameEvent> = self
            .state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|event| !seen.contains(&event.id))
            .cloned()
            .collect();
        for event in missed {
            let _ = sink.send(WorldUpdate::Event { generation, event });
        }
        Ok(self.subscribe(Stream::Events, key, generation, sink))
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    tokens: Vec<RegistryToken>,
    unsettled: usize,
    failures: usize,
    generation: u64,
    lookups: usize,
}

/// Registry answering from a fixed token list.
#[derive(Clone, Debug, Default)]
pub struct FakeRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl FakeRegistry {
    pub fn with_token(token: RegistryToken) -> Self {
        let registry = Self::default();
        registry.state.lock().unwrap().tokens.push(token);
        registry
    }

    /// The next `count` lookups answer unsettled and empty.
    pub fn unsettled_for(self, count: usize) -> Self {
        self.state.lock().unwrap().unsettled = count;
        self
    }

    /// The next `count` lookups fail with an indexer error.
    pub fn failing_for(self, count: usize) -> Self {
        self.state.lock().unwrap().failures = count;
        self
    }

    pub fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }
}

impl TokenRegistry for FakeRegistry {
    async fn lookup(&self, token_id: TokenId) -> Result<RegistryObservation> {
        let mut state = self.state.lock().unwrap();
        state.lookups += 1;
        if state.failures > 0 {
            state.failures -= 1;
            return Err(Error::Indexer {
                status: 503,
                message: "indexer unavailable".to_string(),
            });
        }
        state.generation += 1;
        let settled = state.unsettled == 0;
        state.unsettled = state.unsettled.saturating_sub(1);
        let tokens = if settled {
            state
                .tokens
                .iter()
                .filter(|t| t.token.token_id == token_id)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        Ok(RegistryObservation {
            generation: state.generation,
            settled,
            tokens,
        })
    }
}

#[derive(Debug)]
struct Creation {
    world: FakeWorld,
    game_id: u32,
    packed: Felt,
    misses: usize,
}

#[derive(Debug)]
struct SystemsState {
    account: Option<Felt>,
    approve_connection: bool,
    create_error: Option<String>,
    creation: Option<Creation>,
    created: Vec<CreateGameRequest>,
    connects: usize,
}

impl Default for SystemsState {
    fn default() -> Self {
        Self {
            account: None,
            approve_connection: true,
            create_error: None,
            creation: None,
            created: Vec::new(),
            connects: 0,
        }
    }
}

/// Wallet double. Connection requests are approved unless told otherwise.
#[derive(Clone, Debug, Default)]
pub struct FakeSystems {
    state: Arc<Mutex<SystemsState>>,
}

impl FakeSystems {
    pub fn connected(self, account: Felt) -> Self {
        self.state.lock().unwrap().account = Some(account);
        self
    }

    pub fn rejecting_connection(self) -> Self {
        self.state.lock().unwrap().approve_connection = false;
        self
    }

    pub fn failing_creation(self, reason: &str) -> Self {
        self.state.lock().unwrap().create_error = Some(reason.to_string());
        self
    }

    /// Created games show up in `world` after `misses` more token lookups.
    pub fn creating_in(self, world: &FakeWorld, game_id: u32, packed: Felt, misses: usize) -> Self {
        self.state.lock().unwrap().creation = Some(Creation {
            world: world.clone(),
            game_id,
            packed,
            misses,
        });
        self
    }

    pub fn created(&self) -> Vec<CreateGameRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }
}

impl GameSystems for FakeSystems {
    fn account(&self) -> Option<Felt> {
        self.state.lock().unwrap().account
    }

    async fn connect(&self) -> Result<Connection> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if !state.approve_connection {
            return Ok(Connection::Cancelled);
        }
        let account = *state.account.get_or_insert_with(fixtures::player);
        Ok(Connection::Connected(account))
    }

    async fn create_game(&self, request: &CreateGameRequest) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        state.created.push(request.clone());
        if let Some(reason) = &state.create_error {
            return Err(Error::Wallet(reason.clone()));
        }
        if let Some(creation) = &state.creation {
            creation.world.stage_game(
                request.token_id,
                creation.game_id,
                creation.packed,
                creation.misses,
            );
        }
        Ok(TxHash(Felt::from(state.created.len() as u64)))
    }

    async fn get_config_raw(&self) -> Result<Vec<Felt>> {
        Ok(fixtures::raw_layouts())
    }
}
