//! Screen routing as a function of game state.

use crate::{
    events::EventLog,
    game::GameModel,
    token_id::TokenId,
    types::PlayerStatus,
};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Game(TokenId),
    /// Destination picker, shown while the player has no location.
    Travel(TokenId),
    Location(TokenId, String),
    Decision(TokenId),
    Consequence(TokenId),
    End(TokenId),
}

impl Route {
    pub fn token_id(&self) -> Option<TokenId> {
        match self {
            Route::Home => None,
            Route::Game(t)
            | Route::Travel(t)
            | Route::Location(t, _)
            | Route::Decision(t)
            | Route::Consequence(t)
            | Route::End(t) => Some(*t),
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Route::End(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => write!(f, "/"),
            Route::Game(t) => write!(f, "/{t}"),
            Route::Travel(t) => write!(f, "/{t}/travel"),
            Route::Location(t, location) => write!(f, "/{t}/{location}"),
            Route::Decision(t) => write!(f, "/{t}/event/decision"),
            Route::Consequence(t) => write!(f, "/{t}/event/consequence"),
            Route::End(t) => write!(f, "/{t}/end"),
        }
    }
}

fn location_route(token: TokenId, model: &GameModel) -> Route {
    match &model.player.location {
        Some(location) => Route::Location(token, location.clone()),
        None => Route::Travel(token),
    }
}

fn is_game_over(model: &GameModel, events: &EventLog) -> bool {
    events.is_game_over() || model.info.game_over
}

/// Route to push after a packed-state update, or `None` to stay put.
///
/// | condition                                            | target        |
/// |------------------------------------------------------|---------------|
/// | game over, on the end screen                         | stay          |
/// | game over, pending encounter result                  | consequence   |
/// | game over, no pending encounter result               | end           |
/// | status Normal, previous status not Normal            | consequence   |
/// | status Normal, previous status Normal                | location      |
/// | status BeingArrested or BeingMugged                  | decision      |
pub fn react(
    token: TokenId,
    prev_status: PlayerStatus,
    model: &GameModel,
    events: &EventLog,
    current: &Route,
) -> Option<Route> {
    if is_game_over(model, events) {
        if *current == Route::End(token) {
            return None;
        }
        return Some(if events.has_pending_encounter() {
            Route::Consequence(token)
        } else {
            Route::End(token)
        });
    }

    match model.player.status {
        PlayerStatus::Normal if prev_status != PlayerStatus::Normal => {
            Some(Route::Consequence(token))
        }
        PlayerStatus::Normal => Some(location_route(token, model)),
        PlayerStatus::BeingArrested | PlayerStatus::BeingMugged => Some(Route::Decision(token)),
    }
}

/// Terminal route once the event log first reports game over.
pub fn on_game_over(token: TokenId, events: &EventLog, current: &Route) -> Option<Route> {
    if *current == Route::End(token) {
        return None;
    }
    Some(if events.has_pending_encounter() {
        Route::Consequence(token)
    } else {
        Route::End(token)
    })
}

/// Where a freshly resolved session lands.
pub fn landing_route(token: TokenId, model: &GameModel, events: &EventLog) -> Route {
    if is_game_over(model, events) {
        return Route::End(token);
    }
    if model.player.status.is_decision() {
        return Route::Decision(token);
    }
    location_route(token, model)
}

/// Current screen plus the history of pushed screens.
#[derive(Clone, Debug)]
pub struct Navigator {
    current: Route,
    history: Vec<Route>,
}

impl Navigator {
    pub fn new(initial: Route) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    pub fn current(&self) -> &Route {
        &self.current
    }

    /// Pushed routes, oldest first. The initial route is not included.
    pub fn history(&self) -> &[Route] {
        &self.history
    }

    /// Returns `false` without pushing when `route` is already the current screen.
    pub fn push(&mut self, route: Route) -> bool {
        if route == self.current {
            return false;
        }
        tracing::info!(route = %route, "navigate");
        self.history.push(route.clone());
        self.current = route;
        true
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Home)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        events::GameEvent,
        test_helpers::fixtures,
    };
    use serde_json::json;

    fn token() -> TokenId {
        TokenId::normalize("95048").unwrap()
    }

    fn model(status: PlayerStatus, location: u8) -> GameModel {
        fixtures::model(
            fixtures::PackedGame::default()
                .status(status)
                .location(location)
                .build(),
        )
    }

    fn event(model: &str, id: u32) -> GameEvent {
        GameEvent::new(model, id.to_string(), json!({}))
    }

    #[test]
    fn route__renders_paths() {
        let t = token();

        assert_eq!(Route::Home.to_string(), "/");
        assert_eq!(Route::Location(t, "queens".into()).to_string(), "/0x17348/queens");
        assert_eq!(Route::Consequence(t).to_string(), "/0x17348/event/consequence");
        assert_eq!(Route::Decision(t).to_string(), "/0x17348/event/decision");
        assert_eq!(Route::End(t).to_string(), "/0x17348/end");
    }

    #[test]
    fn react__normal_after_normal_travels_to_location() {
        let next = model(PlayerStatus::Normal, 3);

        let route = react(token(), PlayerStatus::Normal, &next, &EventLog::default(), &Route::Home);

        assert_eq!(route, Some(Route::Location(token(), "bronx".into())));
    }

    #[test]
    fn react__normal_after_decision_shows_consequence() {
        let next = model(PlayerStatus::Normal, 3);

        let route = react(
            token(),
            PlayerStatus::BeingMugged,
            &next,
            &EventLog::default(),
            &Route::Decision(token()),
        );

        assert_eq!(route, Some(Route::Consequence(token())));
    }

    #[test]
    fn react__arrest_or_mugging_goes_to_decision() {
        for status in [PlayerStatus::BeingArrested, PlayerStatus::BeingMugged] {
            let next = model(status, 2);

            let route = react(token(), PlayerStatus::Normal, &next, &EventLog::default(), &Route::Home);

            assert_eq!(route, Some(Route::Decision(token())));
        }
    }

    #[test]
    fn react__game_over_visits_consequence_once_then_end_and_stays() {
        // given
        let next = model(PlayerStatus::Normal, 1);
        let mut events = EventLog::new(vec![
            event("TravelEncounter", 1),
            event("TravelEncounterResult", 2),
            event("GameOver", 3),
        ]);
        let mut navigator = Navigator::new(Route::Location(token(), "queens".into()));

        // when
        let first = react(token(), PlayerStatus::Normal, &next, &events, navigator.current());
        navigator.push(first.clone().unwrap());
        let repeat = react(token(), PlayerStatus::Normal, &next, &events, navigator.current());
        let repeat_pushed = navigator.push(repeat.clone().unwrap());
        events.acknowledge_encounter();
        let after_ack = react(token(), PlayerStatus::Normal, &next, &events, navigator.current());
        navigator.push(after_ack.clone().unwrap());
        let on_end = react(token(), PlayerStatus::Normal, &next, &events, navigator.current());

        // then
        assert_eq!(first, Some(Route::Consequence(token())));
        assert!(!repeat_pushed);
        assert_eq!(after_ack, Some(Route::End(token())));
        assert_eq!(on_end, None);
        assert_eq!(navigator.history(), &[Route::Consequence(token()), Route::End(token())]);
    }

    #[test]
    fn react__game_over_on_end_screen_never_returns_to_consequence() {
        // given
        let next = model(PlayerStatus::BeingArrested, 1);
        let events = EventLog::new(vec![
            event("TravelEncounter", 1),
            event("TravelEncounterResult", 2),
            event("GameOver", 3),
        ]);

        // when
        let route = react(token(), PlayerStatus::Normal, &next, &events, &Route::End(token()));

        // then
        assert_eq!(route, None);
        assert_eq!(on_game_over(token(), &events, &Route::End(token())), None);
    }

    #[test]
    fn on_game_over__prefers_consequence_when_an_encounter_is_pending() {
        let mut events = EventLog::new(vec![event("GameOver", 1)]);
        assert_eq!(on_game_over(token(), &events, &Route::Home), Some(Route::End(token())));

        events.push(event("TravelEncounter", 2));
        events.push(event("TravelEncounterResult", 3));

        assert_eq!(
            on_game_over(token(), &events, &Route::Home),
            Some(Route::Consequence(token()))
        );
    }

    #[test]
    fn landing_route__follows_game_state() {
        let events = EventLog::default();

        assert_eq!(
            landing_route(token(), &model(PlayerStatus::Normal, 2), &events),
            Route::Location(token(), "brooklyn".into())
        );
        assert_eq!(
            landing_route(token(), &model(PlayerStatus::Normal, 0), &events),
            Route::Travel(token())
        );
        assert_eq!(
            landing_route(token(), &model(PlayerStatus::BeingMugged, 2), &events),
            Route::Decision(token())
        );
    }

    #[test]
    fn navigator__ignores_push_of_current_route() {
        let mut navigator = Navigator::default();

        assert!(!navigator.push(Route::Home));
        assert!(navigator.push(Route::End(token())));
        assert!(!navigator.push(Route::End(token())));
        assert_eq!(navigator.history().len(), 1);
    }
}
