use crate::api::error::{ApiError, ErrorCategory};
use crate::api::pickem_api::PickemApiClient;
use crate::models::{
    Game, GameId, GamePickRow, Pick, Tiebreaker, TiebreakerId, TiebreakerPick, TiebreakerPickRow,
};
use crate::session::Session;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// Everything the pick view needs, keyed by item id
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub games: HashMap<GameId, Game>,
    pub picks: HashMap<GameId, Pick>,
    pub tiebreakers: HashMap<TiebreakerId, Tiebreaker>,
    pub tiebreaker_picks: HashMap<TiebreakerId, TiebreakerPick>,
}

impl Catalog {
    /// Build lookup maps from the four endpoint payloads
    ///
    /// Open games and tiebreakers win over the copies embedded in the pick rows,
    /// which are only kept so already-started items can still be shown.
    pub fn from_parts(
        games: Vec<Game>,
        pick_rows: Vec<GamePickRow>,
        tiebreakers: Vec<Tiebreaker>,
        tiebreaker_rows: Vec<TiebreakerPickRow>,
    ) -> Self {
        let mut catalog = Catalog::default();

        for row in &pick_rows {
            catalog.games.insert(row.game_id, row.game());
            if let Some(pick) = row.pick() {
                catalog.picks.insert(pick.game_id, pick);
            }
        }
        for game in games {
            catalog.games.insert(game.id, game);
        }

        for row in &tiebreaker_rows {
            catalog.tiebreakers.insert(
                row.tiebreaker_id,
                Tiebreaker {
                    id: row.tiebreaker_id,
                    question: row.question.clone(),
                    start_time: row.start_time,
                    is_active: row.is_active,
                    answer: row.correct_answer.clone(),
                    answer_type: None,
                },
            );
            if let Some(pick) = row.tiebreaker_pick() {
                catalog.tiebreaker_picks.insert(pick.tiebreaker_id, pick);
            }
        }
        for tiebreaker in tiebreakers {
            catalog.tiebreakers.insert(tiebreaker.id, tiebreaker);
        }

        catalog
    }

    /// Games still open for picks: start strictly after `now`, soonest first
    pub fn editable_games(&self, now: DateTime<Utc>) -> Vec<&Game> {
        let mut games: Vec<&Game> = self
            .games
            .values()
            .filter(|g| !g.has_started(now))
            .collect();
        games.sort_by_key(|g| (g.game_date, g.id));
        games
    }

    pub fn editable_tiebreakers(&self, now: DateTime<Utc>) -> Vec<&Tiebreaker> {
        let mut tiebreakers: Vec<&Tiebreaker> = self
            .tiebreakers
            .values()
            .filter(|t| t.is_active && !t.has_started(now))
            .collect();
        tiebreakers.sort_by_key(|t| (t.start_time, t.id));
        tiebreakers
    }

    /// Started games the user picked, newest first, for read-only display
    pub fn locked_in_picks(&self, now: DateTime<Utc>) -> Vec<(&Game, &Pick)> {
        let mut rows: Vec<(&Game, &Pick)> = self
            .picks
            .values()
            .filter_map(|pick| {
                let game = self.games.get(&pick.game_id)?;
                game.has_started(now).then_some((game, pick))
            })
            .collect();
        rows.sort_by_key(|(g, _)| std::cmp::Reverse((g.game_date, g.id)));
        rows
    }

    pub fn locked_in_answers(&self, now: DateTime<Utc>) -> Vec<(&Tiebreaker, &TiebreakerPick)> {
        let mut rows: Vec<(&Tiebreaker, &TiebreakerPick)> = self
            .tiebreaker_picks
            .values()
            .filter_map(|pick| {
                let tiebreaker = self.tiebreakers.get(&pick.tiebreaker_id)?;
                tiebreaker.has_started(now).then_some((tiebreaker, pick))
            })
            .collect();
        rows.sort_by_key(|(t, _)| std::cmp::Reverse((t.start_time, t.id)));
        rows
    }

    pub fn is_game_editable(&self, game_id: GameId, now: DateTime<Utc>) -> bool {
        self.games
            .get(&game_id)
            .is_some_and(|g| !g.has_started(now))
    }
}

/// Why the pick view could not be populated
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("please sign in again")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("failed to load games and tiebreakers, please try again")]
    Failed(#[source] ApiError),
}

impl LoadError {
    fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => LoadError::Unauthenticated,
            ApiError::Forbidden(detail) => LoadError::Forbidden(detail),
            other => LoadError::Failed(other),
        }
    }
}

/// Outcome of each of the four concurrent catalog requests, kept apart so the
/// caller can choose how strictly to treat partial failure
#[derive(Debug)]
pub struct CatalogFetch {
    pub games: Result<Vec<Game>, ApiError>,
    pub picks: Result<Vec<GamePickRow>, ApiError>,
    pub tiebreakers: Result<Vec<Tiebreaker>, ApiError>,
    pub tiebreaker_picks: Result<Vec<TiebreakerPickRow>, ApiError>,
}

impl CatalogFetch {
    pub fn errors(&self) -> Vec<(&'static str, &ApiError)> {
        let mut errors = Vec::new();
        if let Err(e) = &self.games {
            errors.push(("games", e));
        }
        if let Err(e) = &self.picks {
            errors.push(("my_picks", e));
        }
        if let Err(e) = &self.tiebreakers {
            errors.push(("tiebreakers", e));
        }
        if let Err(e) = &self.tiebreaker_picks {
            errors.push(("my_tiebreaker_picks", e));
        }
        errors
    }

    fn has_category(&self, category: ErrorCategory) -> bool {
        self.errors().iter().any(|(_, e)| e.category() == category)
    }

    /// Any failure rejects the whole catalog; authentication failures win
    pub fn all_or_nothing(self) -> Result<Catalog, LoadError> {
        if self.has_category(ErrorCategory::Authentication) {
            return Err(LoadError::Unauthenticated);
        }

        let games = self.games.map_err(LoadError::from_api)?;
        let picks = self.picks.map_err(LoadError::from_api)?;
        let tiebreakers = self.tiebreakers.map_err(LoadError::from_api)?;
        let tiebreaker_picks = self.tiebreaker_picks.map_err(LoadError::from_api)?;

        Ok(Catalog::from_parts(
            games,
            picks,
            tiebreakers,
            tiebreaker_picks,
        ))
    }

    /// Keep whatever loaded and report the rest; authentication is never partial
    pub fn best_effort(self) -> Result<(Catalog, Vec<ApiError>), LoadError> {
        if self.has_category(ErrorCategory::Authentication) {
            return Err(LoadError::Unauthenticated);
        }

        let mut failures = Vec::new();
        let games = keep_or_record(self.games, &mut failures);
        let picks = keep_or_record(self.picks, &mut failures);
        let tiebreakers = keep_or_record(self.tiebreakers, &mut failures);
        let tiebreaker_picks = keep_or_record(self.tiebreaker_picks, &mut failures);

        Ok((
            Catalog::from_parts(games, picks, tiebreakers, tiebreaker_picks),
            failures,
        ))
    }
}

fn keep_or_record<T>(result: Result<Vec<T>, ApiError>, failures: &mut Vec<ApiError>) -> Vec<T> {
    result.unwrap_or_else(|err| {
        failures.push(err);
        Vec::new()
    })
}

/// Fetches open games, tiebreakers and the user's existing answers in one joined batch
pub struct CatalogLoader<'a> {
    api: &'a PickemApiClient,
}

impl<'a> CatalogLoader<'a> {
    pub fn new(api: &'a PickemApiClient) -> Self {
        Self { api }
    }

    /// Issue all four requests concurrently and wait for every one of them
    pub async fn fetch(&self, token: &SecretString) -> CatalogFetch {
        let (games, picks, tiebreakers, tiebreaker_picks) = tokio::join!(
            self.api.fetch_games(token),
            self.api.fetch_my_picks(token),
            self.api.fetch_tiebreakers(token),
            self.api.fetch_my_tiebreaker_picks(token),
        );

        CatalogFetch {
            games,
            picks,
            tiebreakers,
            tiebreaker_picks,
        }
    }

    /// Load with the all-or-nothing policy, invalidating the session on a 401
    pub async fn load(&self, session: &mut Session) -> Result<Catalog, LoadError> {
        let Some(token) = session.token() else {
            return Err(LoadError::Unauthenticated);
        };

        let fetched = self.fetch(token).await;
        for (endpoint, err) in fetched.errors() {
            warn!(endpoint, error = %err, "catalog request failed");
        }

        let result = fetched.all_or_nothing();
        match &result {
            Ok(catalog) => info!(
                games = catalog.games.len(),
                picks = catalog.picks.len(),
                tiebreakers = catalog.tiebreakers.len(),
                "catalog loaded"
            ),
            Err(LoadError::Unauthenticated) => session.invalidate(),
            Err(_) => {}
        }
        result
    }
}
