//! Token resolution and lazy game creation.
//!
//! [`Resolver`] is a pure state machine: it is fed [`ResolveEvent`]s and answers with the
//! [`ResolveEffect`]s the caller must run. Nothing here touches the network or a clock, so
//! every path is driven directly in tests; [`crate::session::SessionContext`] runs the
//! effects for real.

use crate::{
    felt::Felt,
    navigation::Route,
    registry::RegistryObservation,
    systems::{
        CreateGameRequest,
        TxHash,
    },
    token_id::TokenId,
};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub registry_poll: Duration,
    /// Consecutive empty registry answers required before a token is declared unknown.
    pub stable_polls: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            registry_poll: Duration::from_millis(500),
            stable_polls: 2,
        }
    }
}

/// Doubling delay, capped at the policy maximum.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            initial: policy.initial_delay,
            max: policy.max_delay,
            next: policy.initial_delay,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.max);
        self.next = delay.saturating_mul(2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Debounces empty registry answers using the registry's generation counter.
#[derive(Clone, Debug, Default)]
pub struct StabilityTracker {
    last_generation: Option<u64>,
    empty_streak: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stability {
    Stale,
    Unsettled,
    Found,
    EmptyPending,
    EmptyStable,
}

impl StabilityTracker {
    pub fn observe(&mut self, observation: &RegistryObservation, found: bool, required: u32) -> Stability {
        if self
            .last_generation
            .is_some_and(|last| observation.generation <= last)
        {
            return Stability::Stale;
        }
        self.last_generation = Some(observation.generation);

        if !observation.settled {
            return Stability::Unsettled;
        }
        if found {
            self.empty_streak = 0;
            return Stability::Found;
        }
        self.empty_streak += 1;
        if self.empty_streak >= required.max(1) {
            Stability::EmptyStable
        } else {
            Stability::EmptyPending
        }
    }

    pub fn reset(&mut self) {
        self.empty_streak = 0;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveFailure {
    UnknownToken,
    InconsistentRegistry,
    ConnectionCancelled,
    CreationFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveState {
    Idle,
    ResolvingGame,
    GameNotStarted,
    CheckingRegistry,
    AwaitingConnection,
    CreatingGame,
    AwaitingIndexerSync,
    Resolved,
    Failed(ResolveFailure),
}

impl ResolveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolveState::Resolved | ResolveState::Failed(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResolveEvent {
    Start,
    GameResolved,
    GameNotStarted,
    /// Any other failure while loading the session.
    ResolveFailed(String),
    Registry(RegistryObservation),
    RegistryFailed(String),
    Connected(Felt),
    ConnectionCancelled,
    GameCreated(TxHash),
    CreateFailed(String),
    RetryElapsed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveEffect {
    ResolveGame,
    QueryRegistry(TokenId),
    PollRegistry(TokenId, Duration),
    EnsureConnected,
    CreateGame(CreateGameRequest),
    ScheduleRetry(Duration),
    SetTournament(Option<String>),
    Navigate(Route),
}

#[derive(Debug)]
pub struct Resolver {
    token: TokenId,
    state: ResolveState,
    policy: RetryPolicy,
    backoff: Backoff,
    stability: StabilityTracker,
    /// Token currently being checked against the registry.
    checking: Option<TokenId>,
    /// Set once creation has been decided for this token; cleared on success or failure.
    creation_latch: bool,
    create_issued: bool,
    pending_request: Option<CreateGameRequest>,
    navigated_home: bool,
}

impl Resolver {
    pub fn new(token: TokenId, policy: RetryPolicy) -> Self {
        let backoff = Backoff::new(&policy);
        Self {
            token,
            state: ResolveState::Idle,
            policy,
            backoff,
            stability: StabilityTracker::default(),
            checking: None,
            creation_latch: false,
            create_issued: false,
            pending_request: None,
            navigated_home: false,
        }
    }

    pub fn token(&self) -> TokenId {
        self.token
    }

    pub fn state(&self) -> &ResolveState {
        &self.state
    }

    pub fn is_creation_latched(&self) -> bool {
        self.creation_latch
    }

    pub fn checking(&self) -> Option<TokenId> {
        self.checking
    }

    pub fn handle(&mut self, event: ResolveEvent) -> Vec<ResolveEffect> {
        use ResolveEvent as E;
        use ResolveState as S;

        match (&self.state, event) {
            (S::Idle, E::Start) => {
                self.state = S::ResolvingGame;
                vec![ResolveEffect::ResolveGame]
            }

            (S::ResolvingGame | S::AwaitingIndexerSync, E::GameResolved) => {
                self.state = S::Resolved;
                self.clear_latch();
                self.backoff.reset();
                vec![]
            }

            (S::ResolvingGame, E::GameNotStarted) if !self.creation_latch => {
                tracing::info!(token = %self.token, "game not started, checking registry");
                self.checking = Some(self.token);
                self.stability.reset();
                self.state = S::CheckingRegistry;
                vec![ResolveEffect::QueryRegistry(self.token)]
            }

            (S::ResolvingGame | S::AwaitingIndexerSync, E::GameNotStarted) => {
                vec![ResolveEffect::ScheduleRetry(self.backoff.next_delay())]
            }

            (S::ResolvingGame | S::AwaitingIndexerSync, E::ResolveFailed(reason)) => {
                let delay = self.backoff.next_delay();
                tracing::debug!(token = %self.token, ?delay, "resolve failed, retrying: {reason}");
                vec![ResolveEffect::ScheduleRetry(delay)]
            }

            (S::ResolvingGame | S::AwaitingIndexerSync, E::RetryElapsed) => {
                vec![ResolveEffect::ResolveGame]
            }

            (S::CheckingRegistry, E::Registry(observation)) => self.on_registry(observation),

            (S::CheckingRegistry, E::RegistryFailed(reason)) => {
                tracing::warn!(token = %self.token, "registry lookup failed: {reason}");
                vec![ResolveEffect::PollRegistry(self.token, self.policy.registry_poll)]
            }

            (S::AwaitingConnection, E::Connected(address)) => {
                if self.create_issued {
                    return vec![];
                }
                let Some(request) = self.pending_request.take() else {
                    return self.fail(ResolveFailure::CreationFailed(
                        "no creation request prepared".to_string(),
                    ));
                };
                tracing::info!(token = %self.token, account = %address, "creating game");
                self.create_issued = true;
                self.state = S::CreatingGame;
                vec![ResolveEffect::CreateGame(request)]
            }

            (S::AwaitingConnection, E::ConnectionCancelled) => {
                self.fail(ResolveFailure::ConnectionCancelled)
            }

            (S::CreatingGame, E::GameCreated(tx)) => {
                tracing::info!(token = %self.token, %tx, "game created, waiting for indexer");
                self.checking = None;
                self.state = S::AwaitingIndexerSync;
                self.backoff.reset();
                vec![ResolveEffect::ScheduleRetry(self.backoff.next_delay())]
            }

            (S::CreatingGame, E::CreateFailed(reason)) => {
                tracing::warn!(token = %self.token, "game creation failed: {reason}");
                self.fail(ResolveFailure::CreationFailed(reason))
            }

            (state, event) => {
                tracing::debug!(?state, ?event, "ignoring resolver event");
                vec![]
            }
        }
    }

    fn on_registry(&mut self, observation: RegistryObservation) -> Vec<ResolveEffect> {
        let token = observation.token(self.token).cloned();
        let stability =
            self.stability
                .observe(&observation, token.is_some(), self.policy.stable_polls);

        match stability {
            Stability::Stale => vec![],
            Stability::Unsettled | Stability::EmptyPending => {
                vec![ResolveEffect::PollRegistry(self.token, self.policy.registry_poll)]
            }
            Stability::EmptyStable => {
                tracing::warn!(token = %self.token, "token not found in registry");
                self.fail(ResolveFailure::UnknownToken)
            }
            Stability::Found => {
                let Some(found) = token else {
                    return vec![];
                };
                let mut effects = vec![ResolveEffect::SetTournament(
                    found.token.context.tournament_id(),
                )];
                if found.has_game {
                    tracing::warn!(
                        token = %self.token,
                        "registry reports a game that the indexer could not load"
                    );
                    effects.extend(self.fail(ResolveFailure::InconsistentRegistry));
                    return effects;
                }
                if self.creation_latch {
                    return effects;
                }
                self.creation_latch = true;
                self.pending_request = Some(CreateGameRequest::for_token(
                    self.token,
                    &found.token.player_name,
                ));
                self.state = ResolveState::AwaitingConnection;
                effects.push(ResolveEffect::EnsureConnected);
                effects
            }
        }
    }

    fn clear_latch(&mut self) {
        self.creation_latch = false;
        self.create_issued = false;
        self.pending_request = None;
        self.checking = None;
    }

    fn fail(&mut self, failure: ResolveFailure) -> Vec<ResolveEffect> {
        self.state = ResolveState::Failed(failure);
        self.clear_latch();
        if self.navigated_home {
            return vec![];
        }
        self.navigated_home = true;
        vec![ResolveEffect::Navigate(Route::Home)]
    }
}
