use super::{
    RAW_TOKEN,
    session,
    token,
};
use ryo_client::{
    Error,
    navigation::Route,
    resolver::ResolveFailure,
    session::ResolveOutcome,
    test_helpers::{
        FakeRegistry,
        FakeSystems,
        FakeWorld,
        fixtures,
    },
};
use std::time::Duration;
use tokio::time::Instant;

fn brooklyn() -> ryo_client::felt::Felt {
    fixtures::PackedGame::default().location(2).health(100).build()
}

#[tokio::test(start_paused = true)]
async fn resolve__minted_token_is_created_and_lands_on_location() {
    // given
    let world = FakeWorld::default();
    let registry = FakeRegistry::with_token(fixtures::registry_token(token(), false, Some("9")));
    let systems = FakeSystems::default().creating_in(&world, fixtures::GAME_ID, brooklyn(), 2);
    let mut session = session(&world, &registry, &systems).await;
    let started = Instant::now();

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    let expected = Route::Location(token(), "brooklyn".into());
    assert_eq!(outcome, ResolveOutcome::Resolved(expected.clone()));
    assert_eq!(expected.to_string(), "/0x17348/brooklyn");
    // retries after creation wait 200ms, 400ms, then 800ms
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(1400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
    assert_eq!(world.game_token_lookups(), 4);
    assert_eq!(systems.created().len(), 1);
    assert_eq!(systems.created()[0].player_name, "Dealer");
    assert_eq!(session.store().tournament_id(), Some("9"));
    assert_eq!(session.navigator().history(), &[Route::Game(token()), expected]);
}

#[tokio::test(start_paused = true)]
async fn resolve__existing_game_skips_registry_and_creation() {
    // given
    let world = FakeWorld::default();
    world.insert_game(token(), fixtures::GAME_ID, fixtures::PackedGame::default().location(3).build());
    let registry = FakeRegistry::default();
    let systems = FakeSystems::default();
    let mut session = session(&world, &registry, &systems).await;

    // when
    let outcome = session.resolve("0x17348").await.unwrap();

    // then
    assert_eq!(
        outcome,
        ResolveOutcome::Resolved(Route::Location(token(), "bronx".into()))
    );
    assert_eq!(registry.lookups(), 0);
    assert!(systems.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resolve__player_mid_decision_lands_on_decision_screen() {
    // given
    let world = FakeWorld::default();
    world.insert_game(
        token(),
        fixtures::GAME_ID,
        fixtures::PackedGame::default()
            .location(3)
            .status(ryo_client::types::PlayerStatus::BeingArrested)
            .build(),
    );
    let mut session = session(&world, &FakeRegistry::default(), &FakeSystems::default()).await;

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert_eq!(outcome, ResolveOutcome::Resolved(Route::Decision(token())));
}

#[tokio::test(start_paused = true)]
async fn resolve__unknown_token_redirects_home_exactly_once() {
    // given
    let world = FakeWorld::default();
    let registry = FakeRegistry::default();
    let systems = FakeSystems::default();
    let mut session = session(&world, &registry, &systems).await;

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert_eq!(outcome, ResolveOutcome::Failed(ResolveFailure::UnknownToken));
    assert_eq!(registry.lookups(), 2);
    assert_eq!(session.navigator().history(), &[Route::Game(token()), Route::Home]);
    assert!(systems.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resolve__waits_for_registry_to_settle_before_trusting_it() {
    // given
    let world = FakeWorld::default();
    let registry = FakeRegistry::with_token(fixtures::registry_token(token(), false, None))
        .unsettled_for(3);
    let systems = FakeSystems::default().creating_in(&world, fixtures::GAME_ID, brooklyn(), 0);
    let mut session = session(&world, &registry, &systems).await;

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert!(matches!(outcome, ResolveOutcome::Resolved(_)));
    assert_eq!(registry.lookups(), 4);
    assert_eq!(systems.created().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn resolve__registry_errors_are_retried() {
    // given
    let world = FakeWorld::default();
    let registry = FakeRegistry::with_token(fixtures::registry_token(token(), false, None))
        .failing_for(2);
    let systems = FakeSystems::default().creating_in(&world, fixtures::GAME_ID, brooklyn(), 0);
    let mut session = session(&world, &registry, &systems).await;

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert!(matches!(outcome, ResolveOutcome::Resolved(_)));
    assert_eq!(registry.lookups(), 3);
}

#[tokio::test(start_paused = true)]
async fn resolve__connected_account_is_reused() {
    // given
    let world = FakeWorld::default();
    let registry = FakeRegistry::with_token(fixtures::registry_token(token(), false, None));
    let systems = FakeSystems::default()
        .connected(fixtures::player())
        .creating_in(&world, fixtures::GAME_ID, brooklyn(), 0);
    let mut session = session(&world, &registry, &systems).await;

    // when
    session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert_eq!(systems.connects(), 0);
    assert_eq!(systems.created().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn resolve__cancelled_connection_returns_home() {
    // given
    let world = FakeWorld::default();
    let registry = FakeRegistry::with_token(fixtures::registry_token(token(), false, None));
    let systems = FakeSystems::default().rejecting_connection();
    let mut session = session(&world, &registry, &systems).await;

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert_eq!(
        outcome,
        ResolveOutcome::Failed(ResolveFailure::ConnectionCancelled)
    );
    assert_eq!(systems.connects(), 1);
    assert!(systems.created().is_empty());
    assert_eq!(session.current_route(), &Route::Home);
}

#[tokio::test(start_paused = true)]
async fn resolve__failed_creation_returns_home() {
    // given
    let world = FakeWorld::default();
    let registry = FakeRegistry::with_token(fixtures::registry_token(token(), false, None));
    let systems = FakeSystems::default().failing_creation("out of gas");
    let mut session = session(&world, &registry, &systems).await;

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert!(matches!(
        outcome,
        ResolveOutcome::Failed(ResolveFailure::CreationFailed(reason)) if reason.contains("out of gas")
    ));
    assert_eq!(systems.created().len(), 1);
    assert_eq!(session.current_route(), &Route::Home);
}

#[tokio::test(start_paused = true)]
async fn resolve__registry_game_missing_from_indexer_is_inconsistent() {
    // given
    let world = FakeWorld::default();
    world.insert_token(token(), 0);
    let registry = FakeRegistry::with_token(fixtures::registry_token(token(), true, None));
    let systems = FakeSystems::default();
    let mut session = session(&world, &registry, &systems).await;

    // when
    let outcome = session.resolve(RAW_TOKEN).await.unwrap();

    // then
    assert_eq!(
        outcome,
        ResolveOutcome::Failed(ResolveFailure::InconsistentRegistry)
    );
    assert!(systems.created().is_empty());
    assert_eq!(session.current_route(), &Route::Home);
}

#[tokio::test]
async fn resolve__rejects_malformed_token() {
    let world = FakeWorld::default();
    let mut session = session(&world, &FakeRegistry::default(), &FakeSystems::default()).await;

    let result = session.resolve("not-a-token").await;

    assert!(matches!(result, Err(Error::InvalidTokenId(_))));
}
