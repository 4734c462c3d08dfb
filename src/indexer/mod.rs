#[cfg(test)]
pub(crate) mod mock_torii;
pub mod queries;
pub mod sql;
pub mod world;

pub use sql::SqlClient;
pub use world::{
    GameConfig,
    GameInfo,
    GameStorePacked,
    GameTokenRow,
    SeasonData,
    SeasonSettings,
    SessionKey,
    SqlWorldIndexer,
    Subscription,
    UpdateSink,
    WorldIndexer,
    WorldUpdate,
};
