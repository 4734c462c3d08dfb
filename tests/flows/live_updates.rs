use super::{
    RAW_TOKEN,
    TestSession,
    session,
    token,
};
use ryo_client::{
    events::GameEvent,
    indexer::WorldUpdate,
    navigation::Route,
    session::ResolveOutcome,
    test_helpers::{
        FakeRegistry,
        FakeSystems,
        FakeWorld,
        fixtures::{
            self,
            PackedGame,
        },
    },
    types::PlayerStatus,
};
use serde_json::json;

async fn resolved(world: &FakeWorld) -> TestSession {
    world.insert_game(token(), fixtures::GAME_ID, PackedGame::default().location(2).build());
    let mut session = session(world, &FakeRegistry::default(), &FakeSystems::default()).await;
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();
    assert_eq!(
        outcome,
        ResolveOutcome::Resolved(Route::Location(token(), "brooklyn".into()))
    );
    session
}

fn event(model: &str, id: u32) -> GameEvent {
    GameEvent::new(model, id.to_string(), json!({ "game_id": fixtures::GAME_ID }))
}

#[tokio::test]
async fn next_update__follows_encounter_through_decision_and_consequence() {
    // given
    let world = FakeWorld::default();
    let mut session = resolved(&world).await;
    assert_eq!(world.live_subscriptions(), 2);

    // when
    world.push_game_store(
        PackedGame::default()
            .location(2)
            .status(PlayerStatus::BeingArrested)
            .build(),
    );
    let decision = session.next_update().await.unwrap();
    world.push_game_store(PackedGame::default().location(2).build());
    let consequence = session.next_update().await.unwrap();
    world.push_game_store(PackedGame::default().location(4).build());
    let travelled = session.next_update().await.unwrap();

    // then
    assert_eq!(decision, Some(Route::Decision(token())));
    assert_eq!(consequence, Some(Route::Consequence(token())));
    assert_eq!(travelled, Some(Route::Location(token(), "jersey".into())));
    assert_eq!(session.current_route(), &Route::Location(token(), "jersey".into()));
}

#[tokio::test]
async fn next_update__game_over_shows_last_result_then_ends() {
    // given
    let world = FakeWorld::default();
    let mut session = resolved(&world).await;

    // when
    world.push_event(event("TravelEncounter", 1));
    let after_encounter = session.next_update().await.unwrap();
    world.push_event(event("TravelEncounterResult", 2));
    let after_result = session.next_update().await.unwrap();
    world.push_event(event("GameOver", 3));
    let after_game_over = session.next_update().await.unwrap();
    let after_ack = session.acknowledge_encounter();

    // then
    assert_eq!(after_encounter, None);
    assert_eq!(after_result, None);
    assert_eq!(after_game_over, Some(Route::Consequence(token())));
    assert_eq!(after_ack, Some(Route::End(token())));
    assert!(session.current_route().is_end());
}

#[tokio::test]
async fn finish_final_encounter__moves_a_finished_game_from_consequence_to_end() {
    // given
    let world = FakeWorld::default();
    let mut session = resolved(&world).await;
    world.push_event(event("TravelEncounter", 1));
    world.push_event(event("TravelEncounterResult", 2));
    world.push_event(event("GameOver", 3));
    for _ in 0..3 {
        session.next_update().await.unwrap();
    }
    assert_eq!(session.current_route(), &Route::Consequence(token()));

    // when
    let route = session.finish_final_encounter();
    let again = session.finish_final_encounter();

    // then
    assert_eq!(route, Some(Route::End(token())));
    assert_eq!(again, None);
    assert!(session.current_route().is_end());
}

#[tokio::test]
async fn finish_final_encounter__leaves_a_running_game_on_consequence() {
    // given
    let world = FakeWorld::default();
    let mut session = resolved(&world).await;
    world.push_game_store(
        PackedGame::default()
            .location(2)
            .status(PlayerStatus::BeingArrested)
            .build(),
    );
    session.next_update().await.unwrap();
    world.push_game_store(PackedGame::default().location(2).build());
    assert_eq!(session.next_update().await.unwrap(), Some(Route::Consequence(token())));

    // when
    let route = session.finish_final_encounter();

    // then
    assert_eq!(route, None);
    assert_eq!(session.current_route(), &Route::Consequence(token()));
}

#[tokio::test]
async fn next_update__end_screen_is_sticky() {
    // given
    let world = FakeWorld::default();
    let mut session = resolved(&world).await;
    world.push_event(event("GameOver", 3));
    assert_eq!(session.next_update().await.unwrap(), Some(Route::End(token())));

    // when
    world.push_game_store(PackedGame::default().location(5).build());
    let after_store = session.next_update().await.unwrap();
    world.push_event(event("GameOver", 3));
    let after_duplicate = session.next_update().await.unwrap();

    // then
    assert_eq!(after_store, None);
    assert_eq!(after_duplicate, None);
    assert_eq!(session.current_route(), &Route::End(token()));
    assert_eq!(session.store().events().len(), 1);
}

#[tokio::test]
async fn apply__ignores_updates_from_a_previous_subscription() {
    // given
    let world = FakeWorld::default();
    let mut session = resolved(&world).await;
    let stale = WorldUpdate::GameStore {
        generation: session.store().generation() + 1,
        packed: fixtures::packed(
            fixtures::GAME_ID,
            PackedGame::default()
                .location(2)
                .status(PlayerStatus::BeingMugged)
                .build(),
        ),
    };

    // when
    let route = session.apply(stale).unwrap();

    // then
    assert_eq!(route, None);
    assert_eq!(
        session.store().model().unwrap().player.status,
        PlayerStatus::Normal
    );
}

#[tokio::test]
async fn teardown__cancels_subscriptions_and_returns_home() {
    // given
    let world = FakeWorld::default();
    let mut session = resolved(&world).await;

    // when
    session.teardown();

    // then
    assert_eq!(world.live_subscriptions(), 0);
    assert_eq!(world.total_subscriptions(), 2);
    assert_eq!(session.current_route(), &Route::Home);
    assert!(!session.store().is_initialized());
}
