//! Wallet and contract access.
//!
//! The client consumes a wallet, it does not implement one. [`RpcSystems`] covers the
//! read-only calls; anything that needs a signature goes through an implementation of
//! [`GameSystems`] backed by a real account.

use crate::{
    error::{
        Error,
        Result,
    },
    felt::Felt,
    token_id::TokenId,
    types::GameMode,
};
use starknet::{
    core::{
        types::{
            BlockId,
            BlockTag,
            FunctionCall,
        },
        utils::get_selector_from_name,
    },
    providers::{
        JsonRpcClient,
        Provider,
        jsonrpc::HttpTransport,
    },
};
use std::{
    fmt,
    future::Future,
    sync::Arc,
};

pub const GET_CONFIG_ENTRY_POINT: &str = "get_config";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Connection {
    Connected(Felt),
    Cancelled,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub Felt);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateGameRequest {
    pub mode: GameMode,
    pub player_name: String,
    pub multiplier: u8,
    pub token_id: TokenId,
}

impl CreateGameRequest {
    pub const DEFAULT_PLAYER_NAME: &'static str = "Player";

    /// Ranked game at multiplier 1, which is what a registry-minted token starts as.
    pub fn for_token(token_id: TokenId, player_name: &str) -> Self {
        let player_name = if player_name.trim().is_empty() {
            Self::DEFAULT_PLAYER_NAME.to_string()
        } else {
            player_name.to_string()
        };
        Self {
            mode: GameMode::Ranked,
            player_name,
            multiplier: 1,
            token_id,
        }
    }
}

pub trait GameSystems {
    /// Address of the connected account, if any.
    fn account(&self) -> Option<Felt>;

    fn connect(&self) -> impl Future<Output = Result<Connection>>;

    fn create_game(&self, request: &CreateGameRequest) -> impl Future<Output = Result<TxHash>>;

    fn get_config_raw(&self) -> impl Future<Output = Result<Vec<Felt>>>;
}

/// Read-only Starknet JSON-RPC access. There is no signer behind it.
#[derive(Clone)]
pub struct RpcSystems {
    provider: Arc<JsonRpcClient<HttpTransport>>,
    config_address: Felt,
}

impl RpcSystems {
    pub fn new(rpc_url: &str, config_address: Felt) -> Result<Self> {
        let rpc_url = url::Url::parse(rpc_url)?;
        Ok(Self {
            provider: Arc::new(JsonRpcClient::new(HttpTransport::new(rpc_url))),
            config_address,
        })
    }

    async fn call(&self, contract: Felt, entry_point: &str, calldata: &[Felt]) -> Result<Vec<Felt>> {
        let entry_point_selector = get_selector_from_name(entry_point)
            .map_err(|e| Error::Rpc(format!("invalid entry point {entry_point}: {e}")))?;
        tracing::debug!(contract = %contract, entry_point, "starknet_call");
        let request = FunctionCall {
            contract_address: contract.into(),
            entry_point_selector,
            calldata: calldata.iter().copied().map(Into::into).collect(),
        };
        let result = self
            .provider
            .call(request, BlockId::Tag(BlockTag::Latest))
            .await
            .map_err(|e| Error::Rpc(format!("{entry_point} on {contract}: {e}")))?;
        Ok(result.into_iter().map(Felt::from).collect())
    }
}

impl GameSystems for RpcSystems {
    fn account(&self) -> Option<Felt> {
        None
    }

    async fn connect(&self) -> Result<Connection> {
        tracing::warn!("no wallet available for this client, treating connection as cancelled");
        Ok(Connection::Cancelled)
    }

    async fn create_game(&self, request: &CreateGameRequest) -> Result<TxHash> {
        Err(Error::Wallet(format!(
            "cannot create game for token {} without a signer",
            request.token_id
        )))
    }

    async fn get_config_raw(&self) -> Result<Vec<Felt>> {
        self.call(self.config_address, GET_CONFIG_ENTRY_POINT, &[]).await
    }
}
