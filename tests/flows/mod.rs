use ryo_client::{
    resolver::RetryPolicy,
    session::SessionContext,
    test_helpers::{
        FakeConfigSource,
        FakeRegistry,
        FakeSystems,
        FakeWorld,
    },
    token_id::TokenId,
};

mod live_updates;
mod resolve;

pub const RAW_TOKEN: &str = "95048";

pub type TestSession = SessionContext<FakeWorld, FakeRegistry, FakeSystems>;

pub fn token() -> TokenId {
    TokenId::normalize(RAW_TOKEN).unwrap()
}

pub async fn session(world: &FakeWorld, registry: &FakeRegistry, systems: &FakeSystems) -> TestSession {
    let mut session = SessionContext::new(
        world.clone(),
        registry.clone(),
        systems.clone(),
        RetryPolicy::default(),
    );
    session
        .init_config(&FakeConfigSource::default())
        .await
        .unwrap();
    session
}
