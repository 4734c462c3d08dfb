use crate::token_id::TokenId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token exists but no game has been created for it yet. This is a control-flow
    /// signal for the creation flow, not a fault.
    #[error("game not started for token {0}")]
    GameNotStarted(TokenId),

    #[error("invalid token id {0:?}")]
    InvalidTokenId(String),

    #[error("config store not initialized yet")]
    ConfigNotInitialized,

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("indexer responded with {status}: {message}")]
    Indexer { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("layout error: {0}")]
    Layout(String),

    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("resolution stalled in state {0}")]
    Stalled(String),

    #[error("subscription error: {0}")]
    Subscription(String),
}

impl Error {
    pub fn is_not_started(&self) -> bool {
        matches!(self, Error::GameNotStarted(_))
    }

    /// Errors that are expected to clear up once the indexer catches up with the chain.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::MissingData(_)
                | Error::Http(_)
                | Error::Indexer { .. }
                | Error::ConfigNotInitialized
        )
    }
}
