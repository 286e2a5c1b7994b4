use crate::api::error::ApiError;
use crate::api::pickem_api::PickemApiClient;
use crate::models::{
    AdminGrant, Game, GameId, GameUpdate, NewGame, NewTiebreaker, Tiebreaker, TiebreakerAnswer,
    TiebreakerId, TiebreakerPointsUpdate, TiebreakerUpdate, UserPastPicks, UserPicksStatus, PUSH,
};
use crate::session::Session;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("home and away team are both required")]
    MissingTeam,

    #[error("{0} cannot play itself")]
    SameTeam(String),

    #[error("spread must be a finite number")]
    InvalidSpread,

    #[error("{winner} is neither team in game {game_id} nor PUSH")]
    UnknownWinner { game_id: GameId, winner: String },

    #[error("start time {0} is not in the future")]
    StartInPast(DateTime<Utc>),

    #[error("question is empty")]
    EmptyQuestion,

    #[error("username is empty")]
    EmptyUsername,

    #[error("you cannot delete your own account")]
    DeleteSelf,

    #[error("please sign in again")]
    Unauthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for AdminError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AdminError::Unauthenticated,
            ApiError::Forbidden(detail) => AdminError::Forbidden(detail),
            other => AdminError::Api(other),
        }
    }
}

pub fn validate_new_game(game: &NewGame, now: DateTime<Utc>) -> Result<(), AdminError> {
    let home = game.home_team.trim();
    let away = game.away_team.trim();
    if home.is_empty() || away.is_empty() {
        return Err(AdminError::MissingTeam);
    }
    if home.eq_ignore_ascii_case(away) {
        return Err(AdminError::SameTeam(home.to_string()));
    }
    if !game.spread.is_finite() {
        return Err(AdminError::InvalidSpread);
    }
    if game.game_date <= now {
        return Err(AdminError::StartInPast(game.game_date));
    }
    Ok(())
}

/// Normalize a result entry to the exact stored form: a team name or `PUSH`
pub fn validate_winner(game: &Game, winner: &str) -> Result<String, AdminError> {
    let winner = winner.trim();
    if winner.eq_ignore_ascii_case(PUSH) {
        return Ok(PUSH.to_string());
    }
    [&game.home_team, &game.away_team]
        .into_iter()
        .find(|team| team.eq_ignore_ascii_case(winner))
        .cloned()
        .ok_or_else(|| AdminError::UnknownWinner {
            game_id: game.id,
            winner: winner.to_string(),
        })
}

pub fn validate_new_tiebreaker(
    tiebreaker: &NewTiebreaker,
    now: DateTime<Utc>,
) -> Result<(), AdminError> {
    if tiebreaker.question.trim().is_empty() {
        return Err(AdminError::EmptyQuestion);
    }
    if tiebreaker.start_time <= now {
        return Err(AdminError::StartInPast(tiebreaker.start_time));
    }
    Ok(())
}

fn token(session: &Session) -> Result<&SecretString, AdminError> {
    session.token().ok_or(AdminError::Unauthenticated)
}

/// Map a backend result, dropping the credential when the server refused it
fn settle<T>(session: &mut Session, result: Result<T, ApiError>) -> Result<T, AdminError> {
    result.map_err(|err| {
        let err = AdminError::from(err);
        if matches!(err, AdminError::Unauthenticated) {
            session.invalidate();
        }
        err
    })
}

/// Game, tiebreaker and scoring maintenance for admin users
pub struct AdminConsole<'a> {
    api: &'a PickemApiClient,
}

impl<'a> AdminConsole<'a> {
    pub fn new(api: &'a PickemApiClient) -> Self {
        Self { api }
    }

    pub async fn all_games(&self, session: &mut Session) -> Result<Vec<Game>, AdminError> {
        let result = self.api.fetch_all_games(token(session)?).await;
        settle(session, result)
    }

    pub async fn create_game(
        &self,
        session: &mut Session,
        game: NewGame,
        now: DateTime<Utc>,
    ) -> Result<Game, AdminError> {
        validate_new_game(&game, now)?;
        let game = NewGame {
            home_team: game.home_team.trim().to_string(),
            away_team: game.away_team.trim().to_string(),
            ..game
        };
        let result = self.api.create_game(token(session)?, &game).await;
        let created = settle(session, result)?;
        info!(game_id = created.id, matchup = %created.matchup(), "game created");
        Ok(created)
    }

    pub async fn update_game(
        &self,
        session: &mut Session,
        game_id: GameId,
        update: GameUpdate,
    ) -> Result<Game, AdminError> {
        if !update.spread.is_finite() {
            return Err(AdminError::InvalidSpread);
        }
        let result = self.api.update_game(token(session)?, game_id, &update).await;
        settle(session, result)
    }

    /// Record or clear the result; the backend grades every pick on the game when it is set
    pub async fn set_winner(
        &self,
        session: &mut Session,
        game: &Game,
        winner: Option<&str>,
    ) -> Result<Game, AdminError> {
        let mut update = GameUpdate::from(game);
        update.winning_team = winner.map(|w| validate_winner(game, w)).transpose()?;
        let updated = self.update_game(session, game.id, update).await?;
        info!(game_id = game.id, winner = ?updated.winning_team, "game result recorded");
        Ok(updated)
    }

    pub async fn delete_game(&self, session: &mut Session, game_id: GameId) -> Result<(), AdminError> {
        let result = self.api.delete_game(token(session)?, game_id).await;
        settle(session, result)?;
        info!(game_id, "game deleted");
        Ok(())
    }

    pub async fn create_tiebreaker(
        &self,
        session: &mut Session,
        tiebreaker: NewTiebreaker,
        now: DateTime<Utc>,
    ) -> Result<Tiebreaker, AdminError> {
        validate_new_tiebreaker(&tiebreaker, now)?;
        let result = self.api.create_tiebreaker(token(session)?, &tiebreaker).await;
        settle(session, result)
    }

    /// Every tiebreaker including started and resolved ones
    pub async fn tiebreakers(&self, session: &mut Session) -> Result<Vec<Tiebreaker>, AdminError> {
        let result = self.api.fetch_my_tiebreaker_picks(token(session)?).await;
        let rows = settle(session, result)?;
        Ok(rows
            .into_iter()
            .map(|row| Tiebreaker {
                id: row.tiebreaker_id,
                question: row.question,
                start_time: row.start_time,
                is_active: row.is_active,
                answer: row.correct_answer,
                answer_type: None,
            })
            .collect())
    }

    pub async fn update_tiebreaker(
        &self,
        session: &mut Session,
        tiebreaker_id: TiebreakerId,
        update: TiebreakerUpdate,
    ) -> Result<Tiebreaker, AdminError> {
        if update.question.trim().is_empty() {
            return Err(AdminError::EmptyQuestion);
        }
        let result = self
            .api
            .update_tiebreaker(token(session)?, tiebreaker_id, &update)
            .await;
        settle(session, result)
    }

    pub async fn resolve_tiebreaker(
        &self,
        session: &mut Session,
        tiebreaker: &Tiebreaker,
        answer: TiebreakerAnswer,
    ) -> Result<Tiebreaker, AdminError> {
        let mut update = TiebreakerUpdate::from(tiebreaker);
        update.answer = Some(answer);
        self.update_tiebreaker(session, tiebreaker.id, update).await
    }

    pub async fn delete_tiebreaker(
        &self,
        session: &mut Session,
        tiebreaker_id: TiebreakerId,
    ) -> Result<(), AdminError> {
        let result = self.api.delete_tiebreaker(token(session)?, tiebreaker_id).await;
        settle(session, result)
    }

    pub async fn award_tiebreaker_points(
        &self,
        session: &mut Session,
        update: TiebreakerPointsUpdate,
    ) -> Result<(), AdminError> {
        let result = self.api.update_tiebreaker_points(token(session)?, &update).await;
        settle(session, result)?;
        info!(
            user_id = update.user_id,
            tiebreaker_id = update.tiebreaker_id,
            points = update.points,
            "tiebreaker points awarded"
        );
        Ok(())
    }

    pub async fn user_picks_status(
        &self,
        session: &mut Session,
    ) -> Result<Vec<UserPicksStatus>, AdminError> {
        let result = self.api.fetch_user_picks_status(token(session)?).await;
        settle(session, result)
    }

    /// Every pick of one user, including games that have not started
    pub async fn user_all_picks(
        &self,
        session: &mut Session,
        username: &str,
    ) -> Result<UserPastPicks, AdminError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AdminError::EmptyUsername);
        }
        let result = self.api.fetch_user_all_picks(token(session)?, username).await;
        settle(session, result)
    }

    pub async fn make_admin(
        &self,
        session: &mut Session,
        username: &str,
    ) -> Result<AdminGrant, AdminError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AdminError::EmptyUsername);
        }
        let result = self.api.make_admin(token(session)?, username).await;
        let grant = settle(session, result)?;
        info!(username = %grant.username, "admin granted");
        Ok(grant)
    }

    /// Delete an account and, on the server, all of its picks
    pub async fn delete_user(&self, session: &mut Session, user_id: i64) -> Result<(), AdminError> {
        if session.user().is_some_and(|me| me.id == user_id) {
            return Err(AdminError::DeleteSelf);
        }
        let result = self.api.delete_user(token(session)?, user_id).await;
        settle(session, result)?;
        info!(user_id, "user deleted");
        Ok(())
    }
}
