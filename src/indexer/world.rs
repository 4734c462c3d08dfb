use crate::{
    error::{
        Error,
        Result,
    },
    events::{
        GameEvent,
        GameEventKind,
    },
    felt::{
        Felt,
        lenient,
    },
    indexer::{
        queries,
        sql::SqlClient,
    },
    token_id::TokenId,
    types::GameMode,
};
use serde::{
    Deserialize,
    Deserializer,
};
use std::{
    collections::HashSet,
    future::Future,
    time::Duration,
};
use tokio::sync::{
    mpsc,
    oneshot,
};

/// Composite key every per-session entity and event is stored under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub game_id: u32,
    pub player_id: Felt,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GameTokenRow {
    pub token_id: TokenId,
    #[serde(deserialize_with = "lenient::u32")]
    pub game_id: u32,
    #[serde(default)]
    pub player_id: Felt,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct GameInfo {
    #[serde(deserialize_with = "lenient::u32")]
    pub season_version: u32,
    #[serde(deserialize_with = "lenient::u32")]
    pub game_id: u32,
    pub player_id: Felt,
    #[serde(default)]
    pub game_mode: GameMode,
    #[serde(rename = "player_name.value", deserialize_with = "lenient::short_string", default)]
    pub player_name: String,
    #[serde(deserialize_with = "lenient::u8", default)]
    pub multiplier: u8,
    #[serde(deserialize_with = "lenient::bool", default)]
    pub game_over: bool,
    #[serde(deserialize_with = "lenient::u32", default)]
    pub final_score: u32,
    #[serde(deserialize_with = "lenient::bool", default)]
    pub registered: bool,
    #[serde(deserialize_with = "lenient::bool", default)]
    pub claimed: bool,
    #[serde(deserialize_with = "lenient::u32", default)]
    pub claimable: u32,
    #[serde(deserialize_with = "lenient::u32", default)]
    pub position: u32,
    #[serde(deserialize_with = "id_list", default)]
    pub equipment_by_slot: Vec<u64>,
}

impl GameInfo {
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            game_id: self.game_id,
            player_id: self.player_id,
        }
    }
}

/// Array columns come back either inline or JSON-encoded.
fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u64>, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    let value = match raw {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::String(s) if s.trim().is_empty() => return Ok(Vec::new()),
        serde_json::Value::String(s) => {
            serde_json::from_str(&s).map_err(serde::de::Error::custom)?
        }
        other => other,
    };
    let felts = Vec::<Felt>::deserialize(value).map_err(serde::de::Error::custom)?;
    Ok(felts.iter().map(Felt::low_u64).collect())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct GameStorePacked {
    #[serde(deserialize_with = "lenient::u32")]
    pub game_id: u32,
    pub player_id: Felt,
    pub packed: Felt,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SeasonSettings {
    #[serde(deserialize_with = "lenient::u32")]
    pub season_version: u32,
    #[serde(default)]
    pub cash_mode: String,
    #[serde(default)]
    pub health_mode: String,
    #[serde(default)]
    pub turns_mode: String,
    #[serde(default)]
    pub encounters_mode: String,
    #[serde(default)]
    pub encounters_odds_mode: String,
    #[serde(default)]
    pub drugs_mode: String,
    #[serde(default)]
    pub wanted_mode: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    #[serde(deserialize_with = "lenient::u32")]
    pub season_version: u32,
    #[serde(deserialize_with = "lenient::u64", default)]
    pub cash: u64,
    #[serde(deserialize_with = "lenient::u8", default)]
    pub health: u8,
    #[serde(deserialize_with = "lenient::u8", default)]
    pub max_turns: u8,
    #[serde(deserialize_with = "lenient::u8", default)]
    pub max_wanted_shopping: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeasonData {
    pub settings: SeasonSettings,
    pub config: GameConfig,
}

/// A push from one of the session subscriptions, tagged with the generation the
/// subscription was opened under.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldUpdate {
    GameStore {
        generation: u64,
        packed: GameStorePacked,
    },
    Event {
        generation: u64,
        event: GameEvent,
    },
}

impl WorldUpdate {
    pub fn generation(&self) -> u64 {
        match self {
            WorldUpdate::GameStore { generation, .. } | WorldUpdate::Event { generation, .. } => {
                *generation
            }
        }
    }
}

pub type UpdateSink = mpsc::UnboundedSender<WorldUpdate>;

/// Cancel handle for a live subscription. Dropping it cancels too.
#[derive(Debug)]
pub struct Subscription {
    cancel: Option<oneshot::Sender<()>>,
}

impl Subscription {
    pub fn new(cancel: oneshot::Sender<()>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    pub fn cancel(mut self) {
        self.signal();
    }

    fn signal(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.signal();
    }
}

pub trait WorldIndexer {
    fn game_token(
        &self,
        token_id: TokenId,
    ) -> impl Future<Output = Result<Option<GameTokenRow>>>;

    fn game(&self, game_id: u32) -> impl Future<Output = Result<Option<GameInfo>>>;

    fn game_store(
        &self,
        key: &SessionKey,
    ) -> impl Future<Output = Result<Option<GameStorePacked>>>;

    fn season(
        &self,
        season_version: u32,
    ) -> impl Future<Output = Result<Option<SeasonData>>>;

    fn game_events(&self, key: &SessionKey) -> impl Future<Output = Result<Vec<GameEvent>>>;

    /// Pushes every packed value that differs from `baseline`, the value the caller
    /// already holds. With no baseline the first value seen is pushed.
    fn subscribe_game_store(
        &self,
        key: SessionKey,
        generation: u64,
        baseline: Option<Felt>,
        sink: UpdateSink,
    ) -> Result<Subscription>;

    /// Pushes every event whose id is not in `seen`.
    fn subscribe_events(
        &self,
        key: SessionKey,
        generation: u64,
        seen: HashSet<String>,
        sink: UpdateSink,
    ) -> Result<Subscription>;
}

/// [`WorldIndexer`] over Torii's SQL endpoint. Subscriptions are emulated by polling.
#[derive(Clone, Debug)]
pub struct SqlWorldIndexer {
    sql: SqlClient,
    namespace: String,
    poll_interval: Duration,
}

impl SqlWorldIndexer {
    pub fn new(sql: SqlClient, namespace: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            sql,
            namespace: namespace.into(),
            poll_interval,
        }
    }

    async fn first<T: serde::de::DeserializeOwned>(&self, sql: &str) -> Result<Option<T>> {
        Ok(self.sql.query::<T>(sql).await?.into_iter().next())
    }
}

async fn fetch_game_store(
    sql: &SqlClient,
    namespace: &str,
    key: &SessionKey,
) -> Result<Option<GameStorePacked>> {
    let rows = sql
        .query::<GameStorePacked>(&queries::game_store_packed(namespace, key))
        .await?;
    Ok(rows.into_iter().next())
}

async fn fetch_events(
    sql: &SqlClient,
    namespace: &str,
    key: &SessionKey,
) -> Result<Vec<GameEvent>> {
    let lookups = GameEventKind::HISTORICAL.iter().map(|model| async move {
        let query = queries::events_for_game(namespace, model, key);
        (*model, sql.query_rows(&query).await)
    });

    let mut rows = Vec::new();
    for (model, result) in futures::future::join_all(lookups).await {
        match result {
            Ok(model_rows) => rows.extend(model_rows.into_iter().map(|row| (model, row))),
            // models with no events yet have no table
            Err(Error::Indexer { message, .. }) => {
                tracing::debug!(model, %message, "event model not queryable");
            }
            Err(e) => return Err(e),
        }
    }

    rows.sort_by(|(_, a), (_, b)| execution_order(a).cmp(&execution_order(b)));
    Ok(rows
        .into_iter()
        .map(|(model, row)| GameEvent::from_row(&format!("{namespace}-{model}"), row))
        .collect())
}

/// Block time, then the event id. Torii's event ids are `block:tx:index`, which orders
/// events emitted within one transaction.
fn execution_order(row: &serde_json::Value) -> (&str, &str) {
    let column = |name: &str| {
        row.get(name)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    };
    (column("internal_executed_at"), column("internal_event_id"))
}

impl WorldIndexer for SqlWorldIndexer {
    async fn game_token(&self, token_id: TokenId) -> Result<Option<GameTokenRow>> {
        self.first(&queries::game_token_by_id(&self.namespace, token_id))
            .await
    }

    async fn game(&self, game_id: u32) -> Result<Option<GameInfo>> {
        self.first(&queries::game_by_id(&self.namespace, game_id))
            .await
    }

    async fn game_store(&self, key: &SessionKey) -> Result<Option<GameStorePacked>> {
        fetch_game_store(&self.sql, &self.namespace, key).await
    }

    async fn season(&self, season_version: u32) -> Result<Option<SeasonData>> {
        let ns = &self.namespace;
        let settings_query = queries::season_models(ns, "SeasonSettings", season_version);
        let config_query = queries::season_models(ns, "GameConfig", season_version);
        let (settings, config) = futures::try_join!(
            self.first::<SeasonSettings>(&settings_query),
            self.first::<GameConfig>(&config_query),
        )?;
        Ok(settings
            .zip(config)
            .map(|(settings, config)| SeasonData { settings, config }))
    }

    async fn game_events(&self, key: &SessionKey) -> Result<Vec<GameEvent>> {
        fetch_events(&self.sql, &self.namespace, key).await
    }

    fn subscribe_game_store(
        &self,
        key: SessionKey,
        generation: u64,
        baseline: Option<Felt>,
        sink: UpdateSink,
    ) -> Result<Subscription> {
        let (cancel, mut cancelled) = oneshot::channel();
        let sql = self.sql.clone();
        let namespace = self.namespace.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            let mut last = baseline;
            loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => {}
                }
                match fetch_game_store(&sql, &namespace, &key).await {
                    Ok(Some(packed)) => {
                        let changed = last != Some(packed.packed);
                        last = Some(packed.packed);
                        if changed {
                            tracing::debug!(game_id = key.game_id, generation, "game store changed");
                            let update = WorldUpdate::GameStore { generation, packed };
                            if sink.send(update).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(game_id = key.game_id, "game store poll failed: {e}"),
                }
            }
            tracing::debug!(game_id = key.game_id, generation, "game store subscription closed");
        });

        Ok(Subscription::new(cancel))
    }

    fn subscribe_events(
        &self,
        key: SessionKey,
        generation: u64,
        mut seen: HashSet<String>,
        sink: UpdateSink,
    ) -> Result<Subscription> {
        let (cancel, mut cancelled) = oneshot::channel();
        let sql = self.sql.clone();
        let namespace = self.namespace.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            'poll: loop {
                tokio::select! {
                    _ = &mut cancelled => break,
                    _ = ticker.tick() => {}
                }
                let events = match fetch_events(&sql, &namespace, &key).await {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(game_id = key.game_id, "event poll failed: {e}");
                        continue;
                    }
                };
                for event in events {
                    if seen.insert(event.id.clone()) {
                        tracing::debug!(game_id = key.game_id, id = %event.id, "new event");
                        if sink.send(WorldUpdate::Event { generation, event }).is_err() {
                            break 'poll;
                        }
                    }
                }
            }
            tracing::debug!(game_id = key.game_id, generation, "event subscription closed");
        });

        Ok(Subscription::new(cancel))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::indexer::mock_torii::MockTorii;
    use serde_json::{
        Value,
        json,
    };
    use tokio::time::timeout;

    const NS: &str = "dopewars";
    const POLL: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(150);

    fn key() -> SessionKey {
        SessionKey {
            game_id: 7,
            player_id: Felt::from(0xabcu64),
        }
    }

    fn indexer(torii: &MockTorii) -> SqlWorldIndexer {
        SqlWorldIndexer::new(torii.sql(), NS, POLL)
    }

    fn event_row(id: &str, executed_at: &str) -> Value {
        json!({
            "internal_event_id": id,
            "internal_executed_at": executed_at,
            "game_id": 7,
            "player_id": key().player_id.pad_address(),
        })
    }

    fn store_row(packed: u64) -> Value {
        json!([{ "game_id": 7, "player_id": "0xabc", "packed": Felt::from(packed).to_hex() }])
    }

    #[tokio::test]
    async fn subscribe_events__delivers_event_that_landed_before_the_first_poll() {
        // given
        let torii = MockTorii::start();
        torii.respond(
            "\"dopewars-GameOver\"",
            json!([event_row("0x10:0xa:0x01", "2026-10-01 12:00:00")]),
        );
        let (sink, mut updates) = mpsc::unbounded_channel();

        // when
        let _subscription = indexer(&torii)
            .subscribe_events(key(), 3, HashSet::new(), sink)
            .unwrap();
        let update = timeout(WAIT, updates.recv()).await.unwrap().unwrap();

        // then
        let WorldUpdate::Event { generation, event } = update else {
            panic!("expected an event, got {update:?}");
        };
        assert_eq!(generation, 3);
        assert_eq!(event.kind, GameEventKind::GameOver);
        assert_eq!(event.id, "0x10:0xa:0x01");
    }

    #[tokio::test]
    async fn subscribe_events__pushes_each_unloaded_event_once() {
        // given
        let torii = MockTorii::start();
        torii.respond(
            "\"dopewars-TravelEncounter\"",
            json!([event_row("0x10:0xa:0x01", "2026-10-01 12:00:00")]),
        );
        torii.respond(
            "\"dopewars-TravelEncounterResult\"",
            json!([event_row("0x11:0xb:0x01", "2026-10-01 12:00:05")]),
        );
        let loaded = HashSet::from(["0x10:0xa:0x01".to_string()]);
        let (sink, mut updates) = mpsc::unbounded_channel();

        // when
        let _subscription = indexer(&torii)
            .subscribe_events(key(), 1, loaded, sink)
            .unwrap();
        let first = timeout(WAIT, updates.recv()).await.unwrap().unwrap();
        let second = timeout(QUIET, updates.recv()).await;

        // then
        assert!(matches!(first, WorldUpdate::Event { event, .. } if event.id == "0x11:0xb:0x01"));
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn subscribe_game_store__pushes_only_changes_from_the_loaded_value() {
        // given
        let torii = MockTorii::start();
        torii.respond("\"dopewars-GameStorePacked\"", store_row(5));
        let (sink, mut updates) = mpsc::unbounded_channel();
        let _subscription = indexer(&torii)
            .subscribe_game_store(key(), 2, Some(Felt::from(5u64)), sink)
            .unwrap();
        assert!(timeout(QUIET, updates.recv()).await.is_err());

        // when
        torii.respond("\"dopewars-GameStorePacked\"", store_row(6));
        let update = timeout(WAIT, updates.recv()).await.unwrap().unwrap();

        // then
        let WorldUpdate::GameStore { generation, packed } = update else {
            panic!("expected packed state, got {update:?}");
        };
        assert_eq!(generation, 2);
        assert_eq!(packed.packed, Felt::from(6u64));
        assert_eq!(packed.player_id, Felt::from(0xabcu64));
    }

    #[tokio::test]
    async fn subscribe_game_store__without_baseline_pushes_the_first_value() {
        let torii = MockTorii::start();
        torii.respond("\"dopewars-GameStorePacked\"", store_row(9));
        let (sink, mut updates) = mpsc::unbounded_channel();

        let _subscription = indexer(&torii)
            .subscribe_game_store(key(), 1, None, sink)
            .unwrap();
        let update = timeout(WAIT, updates.recv()).await.unwrap().unwrap();

        assert!(
            matches!(update, WorldUpdate::GameStore { packed, .. } if packed.packed == Felt::from(9u64))
        );
    }

    #[tokio::test]
    async fn subscription__cancel_and_drop_stop_the_poll_tasks() {
        // given
        let torii = MockTorii::start();
        torii.respond("\"dopewars-GameStorePacked\"", store_row(5));
        let indexer = indexer(&torii);
        let (store_sink, mut store_updates) = mpsc::unbounded_channel();
        let (event_sink, mut event_updates) = mpsc::unbounded_channel();
        let store_subscription = indexer
            .subscribe_game_store(key(), 1, Some(Felt::from(5u64)), store_sink)
            .unwrap();
        let event_subscription = indexer
            .subscribe_events(key(), 1, HashSet::new(), event_sink)
            .unwrap();
        tokio::time::sleep(POLL * 3).await;

        // when
        store_subscription.cancel();
        drop(event_subscription);

        // then
        assert_eq!(timeout(WAIT, store_updates.recv()).await.unwrap(), None);
        assert_eq!(timeout(WAIT, event_updates.recv()).await.unwrap(), None);
        assert!(!torii.queries().is_empty());
    }

    #[tokio::test]
    async fn game_events__orders_events_of_one_block_by_event_id() {
        // given
        let torii = MockTorii::start();
        let block = "0x0000000000000000000000000000000000000000000000000000000000000010";
        torii.respond(
            "\"dopewars-Traveled\"",
            json!([event_row("0x0f:0x9:0x03", "2026-10-01 11:59:00")]),
        );
        torii.respond(
            "\"dopewars-GameOver\"",
            json!([event_row(&format!("{block}:0xa:0x02"), "2026-10-01 12:00:00")]),
        );
        torii.respond(
            "\"dopewars-TravelEncounter\"",
            json!([event_row(&format!("{block}:0xa:0x01"), "2026-10-01 12:00:00")]),
        );

        // when
        let events = indexer(&torii).game_events(&key()).await.unwrap();

        // then
        let kinds: Vec<GameEventKind> = events.into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![
            GameEventKind::Traveled,
            GameEventKind::TravelEncounter,
            GameEventKind::GameOver,
        ]);
    }

    #[test]
    fn game_info__parses_sql_row() {
        // given
        let row = json!({
            "season_version": 3,
            "game_id": "0x2a",
            "player_id": "0x0000000000000000000000000000000000000000000000000000000000000abc",
            "game_mode": "Ranked",
            "player_name.value": "0x4465616c6572",
            "multiplier": 2,
            "game_over": 0,
            "final_score": 1200,
            "registered": 1,
            "claimed": false,
            "claimable": 0,
            "position": 0,
            "equipment_by_slot": "[\"0x1\", \"0x104\", 3, 0]",
        });

        // when
        let info: GameInfo = serde_json::from_value(row).unwrap();

        // then
        assert_eq!(info.game_id, 42);
        assert_eq!(info.player_name, "Dealer");
        assert!(info.registered);
        assert!(!info.game_over);
        assert_eq!(info.equipment_by_slot, vec![1, 0x104, 3, 0]);
        assert_eq!(info.session_key().player_id, Felt::from(0xabcu64));
    }

    #[test]
    fn game_token_row__reads_padded_token_id() {
        let row = json!({"token_id": "0x0000000000017348", "game_id": 0, "player_id": "0x0"});

        let token: GameTokenRow = serde_json::from_value(row).unwrap();

        assert_eq!(token.token_id.to_string(), "0x17348");
        assert_eq!(token.game_id, 0);
    }

    #[test]
    fn subscription__dropping_the_handle_signals_cancel() {
        let (tx, mut rx) = oneshot::channel();
        let subscription = Subscription::new(tx);

        drop(subscription);

        assert!(rx.try_recv().is_ok());
    }
}
