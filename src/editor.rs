use crate::catalog::Catalog;
use crate::models::{
    AnswerKind, GameId, Pick, Tiebreaker, TiebreakerAnswer, TiebreakerId, TiebreakerPick,
};
use crate::utils::scoring_period::same_scoring_period;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Question wording that marks a tiebreaker as numeric when the backend does not say
const NUMERIC_KEYWORDS: &[&str] = &["how many", "score", "points", "total"];

/// A staged change the editor refused, caught before anything reaches the network
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error("game {0} does not exist")]
    UnknownGame(GameId),

    #[error("{team} is not playing in game {game_id}")]
    NotATeam { game_id: GameId, team: String },

    #[error("game {0} has already started")]
    GameStarted(GameId),

    #[error("no team selected for game {0}")]
    MissingTeam(GameId),

    #[error("tiebreaker {0} does not exist")]
    UnknownTiebreaker(TiebreakerId),

    #[error("tiebreaker {0} has already started")]
    TiebreakerStarted(TiebreakerId),

    #[error("answer for tiebreaker {tiebreaker_id} must be a number, got {input:?}")]
    NotANumber {
        tiebreaker_id: TiebreakerId,
        input: String,
    },

    #[error("answer for tiebreaker {0} is empty")]
    EmptyAnswer(TiebreakerId),
}

/// Decide whether a tiebreaker takes a number or free text
///
/// A declared `answer_type` wins; otherwise the question wording is matched
/// against a short keyword list, which is only an approximation.
pub fn answer_kind(tiebreaker: &Tiebreaker) -> AnswerKind {
    if let Some(kind) = tiebreaker.answer_type {
        return kind;
    }
    let question = tiebreaker.question.to_lowercase();
    if NUMERIC_KEYWORDS.iter().any(|k| question.contains(k)) {
        AnswerKind::Number
    } else {
        AnswerKind::Text
    }
}

/// Parse raw input for a tiebreaker of the given kind
pub fn parse_answer(
    tiebreaker_id: TiebreakerId,
    kind: AnswerKind,
    input: &str,
) -> Result<TiebreakerAnswer, EditorError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EditorError::EmptyAnswer(tiebreaker_id));
    }

    match kind {
        AnswerKind::Number => trimmed
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(TiebreakerAnswer::Number)
            .ok_or_else(|| EditorError::NotANumber {
                tiebreaker_id,
                input: trimmed.to_string(),
            }),
        AnswerKind::Text => Ok(TiebreakerAnswer::Text(trimmed.to_string())),
    }
}

/// Staging area for picks, locks and tiebreaker answers
///
/// The persisted catalog is never touched by interaction; staged values live in
/// three maps that start empty, so an absent entry means "leave as is".
#[derive(Debug, Clone)]
pub struct PickEditor {
    persisted: Catalog,
    pending_picks: BTreeMap<GameId, String>,
    pending_answers: BTreeMap<TiebreakerId, TiebreakerAnswer>,
    pending_locks: BTreeMap<GameId, bool>,
}

impl PickEditor {
    pub fn new(persisted: Catalog) -> Self {
        Self {
            persisted,
            pending_picks: BTreeMap::new(),
            pending_answers: BTreeMap::new(),
            pending_locks: BTreeMap::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.persisted
    }

    pub fn pending_picks(&self) -> &BTreeMap<GameId, String> {
        &self.pending_picks
    }

    pub fn pending_answers(&self) -> &BTreeMap<TiebreakerId, TiebreakerAnswer> {
        &self.pending_answers
    }

    pub fn pending_locks(&self) -> &BTreeMap<GameId, bool> {
        &self.pending_locks
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending_picks.is_empty()
            || !self.pending_answers.is_empty()
            || !self.pending_locks.is_empty()
    }

    fn check_game_open(&self, game_id: GameId, now: DateTime<Utc>) -> Result<(), EditorError> {
        let game = self
            .persisted
            .games
            .get(&game_id)
            .ok_or(EditorError::UnknownGame(game_id))?;
        if game.has_started(now) {
            return Err(EditorError::GameStarted(game_id));
        }
        Ok(())
    }

    /// Stage a team for a game that has not started
    pub fn select_team(
        &mut self,
        game_id: GameId,
        team: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EditorError> {
        self.check_game_open(game_id, now)?;
        let team = team.trim();
        let game = &self.persisted.games[&game_id];
        if !game.is_team(team) {
            return Err(EditorError::NotATeam {
                game_id,
                team: team.to_string(),
            });
        }

        self.pending_picks.insert(game_id, team.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self, game_id: GameId) {
        self.pending_picks.remove(&game_id);
    }

    /// Stage the lock flag for a game; exclusivity is left to the backend
    pub fn lock(&mut self, game_id: GameId, now: DateTime<Utc>) -> Result<(), EditorError> {
        self.check_game_open(game_id, now)?;
        self.pending_locks.insert(game_id, true);
        Ok(())
    }

    /// Stage an explicit unlock, distinct from leaving the flag unchanged
    pub fn unlock(&mut self, game_id: GameId, now: DateTime<Utc>) -> Result<(), EditorError> {
        self.check_game_open(game_id, now)?;
        self.pending_locks.insert(game_id, false);
        Ok(())
    }

    pub fn toggle_lock(&mut self, game_id: GameId, now: DateTime<Utc>) -> Result<(), EditorError> {
        if self.effective_lock(game_id) {
            self.unlock(game_id, now)
        } else {
            self.lock(game_id, now)
        }
    }

    /// Stage an answer, parsed according to the tiebreaker's kind
    pub fn set_answer(
        &mut self,
        tiebreaker_id: TiebreakerId,
        input: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EditorError> {
        let tiebreaker = self
            .persisted
            .tiebreakers
            .get(&tiebreaker_id)
            .ok_or(EditorError::UnknownTiebreaker(tiebreaker_id))?;
        if tiebreaker.has_started(now) || !tiebreaker.is_active {
            return Err(EditorError::TiebreakerStarted(tiebreaker_id));
        }

        let answer = parse_answer(tiebreaker_id, answer_kind(tiebreaker), input)?;
        self.pending_answers.insert(tiebreaker_id, answer);
        Ok(())
    }

    pub fn effective_selection(&self, game_id: GameId) -> Option<&str> {
        self.pending_picks
            .get(&game_id)
            .map(String::as_str)
            .or_else(|| {
                self.persisted
                    .picks
                    .get(&game_id)
                    .map(|p| p.picked_team.as_str())
            })
    }

    pub fn effective_lock(&self, game_id: GameId) -> bool {
        self.pending_locks
            .get(&game_id)
            .copied()
            .or_else(|| self.persisted.picks.get(&game_id).map(|p| p.lock))
            .unwrap_or(false)
    }

    pub fn effective_answer(&self, tiebreaker_id: TiebreakerId) -> Option<&TiebreakerAnswer> {
        self.pending_answers.get(&tiebreaker_id).or_else(|| {
            self.persisted
                .tiebreaker_picks
                .get(&tiebreaker_id)
                .map(|p| &p.answer)
        })
    }

    /// Drop every staged change
    pub fn discard(&mut self) {
        self.pending_picks.clear();
        self.pending_answers.clear();
        self.pending_locks.clear();
    }

    /// Drop staged lock changes only, keeping selections and answers
    pub fn discard_locks(&mut self) {
        self.pending_locks.clear();
    }

    /// Fold every staged change into the persisted state after the backend accepted it
    ///
    /// A newly locked pick releases any other lock in the same scoring period, the
    /// way the backend swaps locks within a week.
    pub(crate) fn merge_submitted(&mut self, points: &BTreeMap<GameId, Option<i64>>) {
        let game_ids: Vec<GameId> = self
            .pending_picks
            .keys()
            .chain(self.pending_locks.keys())
            .copied()
            .collect();

        for game_id in game_ids {
            let Some(team) = self.effective_selection(game_id).map(str::to_string) else {
                continue;
            };
            let lock = self.effective_lock(game_id);

            let existing = self.persisted.picks.get(&game_id);
            let points_awarded = match points.get(&game_id) {
                Some(points) => *points,
                None => existing.and_then(|p| p.points_awarded),
            };

            self.persisted.picks.insert(
                game_id,
                Pick {
                    game_id,
                    picked_team: team,
                    lock,
                    points_awarded,
                },
            );

            if lock {
                self.release_other_locks(game_id);
            }
        }

        for (tiebreaker_id, answer) in std::mem::take(&mut self.pending_answers) {
            let points_awarded = self
                .persisted
                .tiebreaker_picks
                .get(&tiebreaker_id)
                .and_then(|p| p.points_awarded);
            self.persisted.tiebreaker_picks.insert(
                tiebreaker_id,
                TiebreakerPick {
                    tiebreaker_id,
                    answer,
                    points_awarded,
                },
            );
        }

        self.discard();
    }

    fn release_other_locks(&mut self, locked_game: GameId) {
        let Some(locked_date) = self.persisted.games.get(&locked_game).map(|g| g.game_date) else {
            return;
        };

        for (game_id, pick) in self.persisted.picks.iter_mut() {
            if *game_id == locked_game || !pick.lock {
                continue;
            }
            let same_week = self
                .persisted
                .games
                .get(game_id)
                .is_some_and(|g| same_scoring_period(g.game_date, locked_date));
            if same_week {
                pick.lock = false;
            }
        }
    }
}
