pub mod app;
pub mod bits;
pub mod config_store;
pub mod error;
pub mod events;
pub mod felt;
pub mod game;
pub mod indexer;
pub mod leaderboard;
pub mod manifest;
pub mod navigation;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod store;
pub mod systems;
pub mod telemetry;
pub mod token_id;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{
    Error,
    Result,
};
