use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type GameId = i64;
pub type TiebreakerId = i64;

/// Result marker the backend stores in `winning_team` when a game lands exactly on the spread
pub const PUSH: &str = "PUSH";

/// A game offered for picks against the spread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub home_team: String,
    pub away_team: String,
    pub spread: f64, // positive favors the home team
    pub game_date: DateTime<Utc>,
    #[serde(default)]
    pub winning_team: Option<String>,
}

impl Game {
    /// A game counts as started from the instant its start time is reached
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.game_date <= now
    }

    pub fn is_team(&self, team: &str) -> bool {
        team == self.home_team || team == self.away_team
    }

    pub fn outcome(&self) -> Option<GameOutcome> {
        let winner = self.winning_team.as_deref()?.trim();
        if winner.is_empty() {
            None
        } else if winner == PUSH {
            Some(GameOutcome::Push)
        } else if winner == self.home_team {
            Some(GameOutcome::Home)
        } else if winner == self.away_team {
            Some(GameOutcome::Away)
        } else {
            Some(GameOutcome::Other(winner.to_string()))
        }
    }

    pub fn matchup(&self) -> String {
        format!("{} @ {} ({:+.1})", self.away_team, self.home_team, self.spread)
    }
}

/// Winning side of a resolved game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    Home,
    Away,
    Push,
    /// Winner text that matches neither team exactly (e.g. a starred team name)
    Other(String),
}

/// Row shape shared by `/my_picks` and the past-picks endpoint: a game joined with the caller's pick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePickRow {
    pub game_id: GameId,
    pub home_team: String,
    pub away_team: String,
    pub spread: f64,
    pub game_date: DateTime<Utc>,
    #[serde(default)]
    pub winning_team: Option<String>,
    #[serde(default)]
    pub picked_team: Option<String>,
    #[serde(default)]
    pub points_awarded: Option<i64>,
    #[serde(default)]
    pub lock: Option<bool>,
}

impl GamePickRow {
    pub fn game(&self) -> Game {
        Game {
            id: self.game_id,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
            spread: self.spread,
            game_date: self.game_date,
            winning_team: self.winning_team.clone(),
        }
    }

    /// Rows without a picked team are games the user never picked
    pub fn pick(&self) -> Option<Pick> {
        let picked_team = self.picked_team.as_ref()?;
        Some(Pick {
            game_id: self.game_id,
            picked_team: picked_team.clone(),
            lock: self.lock.unwrap_or(false),
            points_awarded: self.points_awarded,
        })
    }
}

/// A user's persisted pick on one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub game_id: GameId,
    pub picked_team: String,
    pub lock: bool,
    pub points_awarded: Option<i64>,
}

/// How a tiebreaker expects to be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Number,
    Text,
}

/// A tiebreaker answer as it travels on the wire: a JSON number or a JSON string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TiebreakerAnswer {
    Number(f64),
    Text(String),
}

impl TiebreakerAnswer {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TiebreakerAnswer::Number(n) => Some(*n),
            TiebreakerAnswer::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for TiebreakerAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TiebreakerAnswer::Number(n) => write!(f, "{}", n),
            TiebreakerAnswer::Text(s) => write!(f, "{}", s),
        }
    }
}

/// An auxiliary question used to break ties in the standings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tiebreaker {
    pub id: TiebreakerId,
    pub question: String,
    pub start_time: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub answer: Option<TiebreakerAnswer>,
    /// Not sent by every backend; when absent the question text decides
    #[serde(default)]
    pub answer_type: Option<AnswerKind>,
}

impl Tiebreaker {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}

fn default_true() -> bool {
    true
}

/// Row shape of `/my_tiebreaker_picks` and the past-picks endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiebreakerPickRow {
    pub tiebreaker_id: TiebreakerId,
    pub question: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub correct_answer: Option<TiebreakerAnswer>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub user_answer: Option<TiebreakerAnswer>,
    #[serde(default)]
    pub points_awarded: Option<f64>,
    #[serde(default)]
    pub accuracy_diff: Option<f64>,
}

impl TiebreakerPickRow {
    pub fn tiebreaker_pick(&self) -> Option<TiebreakerPick> {
        let answer = self.user_answer.as_ref()?;
        Some(TiebreakerPick {
            tiebreaker_id: self.tiebreaker_id,
            answer: answer.clone(),
            points_awarded: self.points_awarded,
        })
    }
}

/// A user's persisted answer to one tiebreaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiebreakerPick {
    pub tiebreaker_id: TiebreakerId,
    pub answer: TiebreakerAnswer,
    pub points_awarded: Option<f64>,
}

/// Identity returned by `/users/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "is_admin")]
    pub admin: bool,
    #[serde(default = "default_true")]
    pub make_picks: bool,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /submit_pick`; a missing `lock` asks the server to leave the flag alone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickSubmission {
    pub game_id: GameId,
    pub picked_team: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PickRecord {
    pub game_id: GameId,
    pub picked_team: String,
    #[serde(default)]
    pub lock: Option<bool>,
    #[serde(default)]
    pub points_awarded: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitPickResponse {
    pub message: String,
    #[serde(default)]
    pub pick: Option<PickRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TiebreakerPickSubmission {
    pub tiebreaker_id: TiebreakerId,
    pub answer: TiebreakerAnswer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TiebreakerPickRecord {
    pub tiebreaker_id: TiebreakerId,
    pub answer: TiebreakerAnswer,
    #[serde(default)]
    pub points_awarded: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGame {
    pub home_team: String,
    pub away_team: String,
    pub spread: f64,
    pub game_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameUpdate {
    pub home_team: String,
    pub away_team: String,
    pub spread: f64,
    pub game_date: DateTime<Utc>,
    pub winning_team: Option<String>,
}

impl From<&Game> for GameUpdate {
    fn from(game: &Game) -> Self {
        Self {
            home_team: game.home_team.clone(),
            away_team: game.away_team.clone(),
            spread: game.spread,
            game_date: game.game_date,
            winning_team: game.winning_team.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTiebreaker {
    pub question: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiebreakerUpdate {
    pub question: String,
    pub start_time: DateTime<Utc>,
    pub answer: Option<TiebreakerAnswer>,
    pub is_active: bool,
}

impl From<&Tiebreaker> for TiebreakerUpdate {
    fn from(tiebreaker: &Tiebreaker) -> Self {
        Self {
            question: tiebreaker.question.clone(),
            start_time: tiebreaker.start_time,
            answer: tiebreaker.answer.clone(),
            is_active: tiebreaker.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiebreakerPointsUpdate {
    pub user_id: i64,
    pub tiebreaker_id: TiebreakerId,
    pub points: i64,
}

/// One row of the standings, already ordered by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub total_points: f64,
    #[serde(default)]
    pub correct_locks: i64,
    #[serde(default)]
    pub first_tiebreaker_diff: Option<f64>,
    #[serde(default)]
    pub second_tiebreaker_diff: Option<f64>,
    #[serde(default)]
    pub third_tiebreaker_diff: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekOption {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeeksResponse {
    pub weeks: Vec<WeekOption>,
}

/// A started game that has no winner yet, with pick counts per side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveGame {
    pub game_id: GameId,
    pub home_team: String,
    pub away_team: String,
    pub spread: f64,
    pub game_date: DateTime<Utc>,
    #[serde(default)]
    pub winning_team: Option<String>,
    #[serde(default)]
    pub total_picks: i64,
    #[serde(default)]
    pub home_picks: i64,
    #[serde(default)]
    pub away_picks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePickEntry {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub picked_team: String,
    #[serde(default)]
    pub lock: Option<bool>,
}

/// A started tiebreaker that has no answer yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveTiebreaker {
    pub tiebreaker_id: TiebreakerId,
    pub question: String,
    pub start_time: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub total_picks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiebreakerPickEntry {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub answer: TiebreakerAnswer,
}

/// Response of `/make_admin/{username}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminGrant {
    pub username: String,
    pub admin: bool,
}

/// A scoreboard row as served by `/api/gamescores`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameScore {
    #[serde(rename = "AwayTeam")]
    pub away_team: String,
    #[serde(rename = "HomeTeam")]
    pub home_team: String,
    #[serde(rename = "AwayScore")]
    pub away_score: String,
    #[serde(rename = "HomeScore")]
    pub home_score: String,
    #[serde(rename = "Time")]
    pub time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPastPicks {
    pub user: UserSummary,
    pub game_picks: Vec<GamePickRow>,
    pub tiebreaker_picks: Vec<TiebreakerPickRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPicksStatus {
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub total_games: i64,
    pub picks_made: i64,
    pub is_complete: bool,
    pub has_current_week_lock: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn game() -> Game {
        Game {
            id: 7,
            home_team: "Ohio State".to_string(),
            away_team: "Michigan".to_string(),
            spread: 3.5,
            game_date: Utc.with_ymd_and_hms(2025, 11, 29, 17, 0, 0).unwrap(),
            winning_team: None,
        }
    }

    #[test]
    fn test_game_started_at_equality() {
        let g = game();
        assert!(g.has_started(g.game_date));
        assert!(!g.has_started(g.game_date - chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_outcome() {
        let mut g = game();
        assert_eq!(g.outcome(), None);
        g.winning_team = Some(String::new());
        assert_eq!(g.outcome(), None);
        g.winning_team = Some("Michigan".to_string());
        assert_eq!(g.outcome(), Some(GameOutcome::Away));
        g.winning_team = Some(PUSH.to_string());
        assert_eq!(g.outcome(), Some(GameOutcome::Push));
    }

    #[test]
    fn test_pick_submission_omits_unchanged_lock() {
        let body = PickSubmission {
            game_id: 7,
            picked_team: "Michigan".to_string(),
            lock: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"game_id": 7, "picked_team": "Michigan"}));
    }

    #[test]
    fn test_tiebreaker_answer_wire_forms() {
        let n: TiebreakerAnswer = serde_json::from_str("41.5").unwrap();
        assert_eq!(n, TiebreakerAnswer::Number(41.5));
        let t: TiebreakerAnswer = serde_json::from_str("\"Georgia\"").unwrap();
        assert_eq!(t.to_string(), "Georgia");
        assert_eq!(TiebreakerAnswer::Number(42.0).to_string(), "42");
        assert_eq!(TiebreakerAnswer::Text(" 17 ".to_string()).as_number(), Some(17.0));
    }

    #[test]
    fn test_pick_row_without_pick() {
        let row: GamePickRow = serde_json::from_value(serde_json::json!({
            "game_id": 3,
            "home_team": "Texas",
            "away_team": "Oklahoma",
            "spread": -2.5,
            "game_date": "2025-10-11T19:30:00Z",
            "winning_team": null,
            "picked_team": null,
            "points_awarded": null,
            "lock": null
        }))
        .unwrap();
        assert!(row.pick().is_none());
        assert_eq!(row.game().away_team, "Oklahoma");
    }

    #[test]
    fn test_tiebreaker_points_decode_as_float() {
        let row: TiebreakerPickRow = serde_json::from_str(
            r#"{"tiebreaker_id": 12, "question": "How many total points?",
                "start_time": "2025-10-11T19:30:00Z", "correct_answer": null,
                "is_active": true, "user_answer": 48, "points_awarded": 0.0,
                "accuracy_diff": null}"#,
        )
        .unwrap();
        assert_eq!(row.tiebreaker_pick().unwrap().points_awarded, Some(0.0));

        let record: TiebreakerPickRecord = serde_json::from_str(
            r#"{"tiebreaker_id": 12, "answer": "Georgia", "points_awarded": 2.5}"#,
        )
        .unwrap();
        assert_eq!(record.points_awarded, Some(2.5));
    }

    #[test]
    fn test_user_admin_alias() {
        let user: User = serde_json::from_value(serde_json::json!({
            "id": 1,
            "username": "coach",
            "email": "coach@example.com",
            "is_admin": true
        }))
        .unwrap();
        assert!(user.admin);
        assert!(user.make_picks);
        assert_eq!(user.display_name(), "coach");
    }
}
