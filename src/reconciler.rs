use crate::api::error::ApiError;
use crate::api::pickem_api::PickemApiClient;
use crate::editor::{EditorError, PickEditor};
use crate::models::{GameId, PickSubmission, TiebreakerId, TiebreakerPickSubmission};
use crate::session::Session;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] EditorError),

    #[error("nothing to submit")]
    NothingToSubmit,

    #[error("please sign in again")]
    Unauthenticated,

    /// Carries the server's wording unchanged
    #[error("{0}")]
    LockConflict(String),

    #[error("failed to save {failed} of {total} changes, please try again")]
    Failed {
        failed: usize,
        total: usize,
        #[source]
        source: ApiError,
    },
}

/// The writes one submission will issue
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPlan {
    pub picks: Vec<PickSubmission>,
    pub answers: Vec<TiebreakerPickSubmission>,
}

impl SubmissionPlan {
    pub fn len(&self) -> usize {
        self.picks.len() + self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turn the staged changes into per-item writes, failing before any network call
///
/// A game needs a write when it has a staged team or a staged lock change. The
/// lock field is only sent for games whose lock was touched.
pub fn plan_submission(
    editor: &PickEditor,
    now: DateTime<Utc>,
) -> Result<SubmissionPlan, SubmitError> {
    let catalog = editor.catalog();
    let game_ids: BTreeSet<GameId> = editor
        .pending_picks()
        .keys()
        .chain(editor.pending_locks().keys())
        .copied()
        .collect();

    let mut picks = Vec::with_capacity(game_ids.len());
    for game_id in game_ids {
        let game = catalog
            .games
            .get(&game_id)
            .ok_or(EditorError::UnknownGame(game_id))?;
        if game.has_started(now) {
            return Err(EditorError::GameStarted(game_id).into());
        }

        let team = editor
            .effective_selection(game_id)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(EditorError::MissingTeam(game_id))?;
        if !game.is_team(team) {
            return Err(EditorError::NotATeam {
                game_id,
                team: team.to_string(),
            }
            .into());
        }

        picks.push(PickSubmission {
            game_id,
            picked_team: team.to_string(),
            lock: editor.pending_locks().get(&game_id).copied(),
        });
    }

    let mut answers = Vec::with_capacity(editor.pending_answers().len());
    for (&tiebreaker_id, answer) in editor.pending_answers() {
        let tiebreaker = catalog
            .tiebreakers
            .get(&tiebreaker_id)
            .ok_or(EditorError::UnknownTiebreaker(tiebreaker_id))?;
        if tiebreaker.has_started(now) {
            return Err(EditorError::TiebreakerStarted(tiebreaker_id).into());
        }
        answers.push(TiebreakerPickSubmission {
            tiebreaker_id,
            answer: answer.clone(),
        });
    }

    let plan = SubmissionPlan { picks, answers };
    if plan.is_empty() {
        return Err(SubmitError::NothingToSubmit);
    }
    Ok(plan)
}

/// What a fully accepted submission wrote
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    pub message: String,
    pub games_written: Vec<GameId>,
    pub answers_written: Vec<TiebreakerId>,
}

/// One summary line for the whole batch, repeated server messages collapsed
fn consolidate(pick_messages: &[String], answers: usize) -> String {
    let mut parts = Vec::new();

    if !pick_messages.is_empty() {
        let mut distinct: Vec<&str> = Vec::new();
        for message in pick_messages {
            if !distinct.contains(&message.as_str()) {
                distinct.push(message);
            }
        }
        let noun = if pick_messages.len() == 1 { "pick" } else { "picks" };
        parts.push(format!(
            "{} {} saved ({})",
            pick_messages.len(),
            noun,
            distinct.join(", ")
        ));
    }

    if answers > 0 {
        let noun = if answers == 1 {
            "tiebreaker answer"
        } else {
            "tiebreaker answers"
        };
        parts.push(format!("{} {} saved", answers, noun));
    }

    format!("{}.", parts.join(". "))
}

/// Sends staged changes and folds the accepted state back into the editor
pub struct SubmissionReconciler<'a> {
    api: &'a PickemApiClient,
}

impl<'a> SubmissionReconciler<'a> {
    pub fn new(api: &'a PickemApiClient) -> Self {
        Self { api }
    }

    pub async fn submit(
        &self,
        session: &mut Session,
        editor: &mut PickEditor,
        now: DateTime<Utc>,
    ) -> Result<SubmitReport, SubmitError> {
        let plan = plan_submission(editor, now)?;
        let Some(token) = session.token() else {
            return Err(SubmitError::Unauthenticated);
        };

        info!(
            picks = plan.picks.len(),
            answers = plan.answers.len(),
            "submitting changes"
        );

        let pick_writes = join_all(
            plan.picks
                .iter()
                .map(|pick| self.api.submit_pick(token, pick)),
        );
        let answer_writes = join_all(
            plan.answers
                .iter()
                .map(|answer| self.api.submit_tiebreaker_pick(token, answer)),
        );
        let (pick_results, answer_results) = tokio::join!(pick_writes, answer_writes);

        let mut failures = Vec::new();
        let mut pick_messages = Vec::new();
        let mut points = BTreeMap::new();
        for (submission, result) in plan.picks.iter().zip(pick_results) {
            match result {
                Ok(response) => {
                    if let Some(record) = response.pick {
                        points.insert(submission.game_id, record.points_awarded);
                    }
                    pick_messages.push(response.message);
                }
                Err(err) => {
                    warn!(game_id = submission.game_id, error = %err, "pick rejected");
                    failures.push(err);
                }
            }
        }
        for (submission, result) in plan.answers.iter().zip(answer_results) {
            if let Err(err) = result {
                warn!(tiebreaker_id = submission.tiebreaker_id, error = %err, "answer rejected");
                failures.push(err);
            }
        }

        if failures.iter().any(ApiError::is_unauthorized) {
            session.invalidate();
            return Err(SubmitError::Unauthenticated);
        }

        let conflict = failures.iter().find_map(|err| match err {
            ApiError::LockConflict(detail) => Some(detail.clone()),
            _ => None,
        });
        if let Some(detail) = conflict {
            editor.discard_locks();
            return Err(SubmitError::LockConflict(detail));
        }

        let failed = failures.len();
        if let Some(source) = failures.into_iter().next() {
            return Err(SubmitError::Failed {
                failed,
                total: plan.len(),
                source,
            });
        }

        editor.merge_submitted(&points);

        let report = SubmitReport {
            message: consolidate(&pick_messages, plan.answers.len()),
            games_written: plan.picks.iter().map(|p| p.game_id).collect(),
            answers_written: plan.answers.iter().map(|a| a.tiebreaker_id).collect(),
        };
        info!(message = %report.message, "submission accepted");
        Ok(report)
    }
}
