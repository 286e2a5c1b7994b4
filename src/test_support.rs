//! In-process stand-in for the pick'em backend, served by axum on an ephemeral port

use crate::models::{
    AdminGrant, Game, GameId, GamePickEntry, GamePickRow, GameScore, GameUpdate,
    LeaderboardEntry, LiveGame, LiveTiebreaker, NewGame, NewTiebreaker, NewUser, Pick,
    PickSubmission, Tiebreaker, TiebreakerAnswer, TiebreakerId, TiebreakerPick,
    TiebreakerPickEntry, TiebreakerPickRow, TiebreakerPickSubmission,
    TiebreakerPointsUpdate, TiebreakerUpdate, User, UserPicksStatus, UserSummary, WeekOption,
};
use crate::utils::scoring_period::{same_scoring_period, ScoringPeriod};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const TOKEN: &str = "test-token";
pub const PASSWORD: &str = "hunter2";

pub const LOCK_CONFLICT: &str =
    "Cannot lock this game because you already have a locked game that has started in the same week.";

pub fn token() -> SecretString {
    SecretString::new(TOKEN.to_string().into_boxed_str())
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug)]
pub struct FakeState {
    pub requests: Vec<RecordedRequest>,
    pub user: User,
    /// Accounts other than the signed-in one, visible only to admin endpoints
    pub others: Vec<User>,
    pub games: Vec<Game>,
    pub picks: HashMap<GameId, Pick>,
    pub tiebreakers: Vec<Tiebreaker>,
    pub tiebreaker_picks: HashMap<TiebreakerId, TiebreakerPick>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub scores: Vec<GameScore>,
    /// Reject every lock request with the server's conflict detail
    pub lock_conflict: bool,
    /// Paths that answer 401 whatever token is sent
    pub unauthorized_paths: HashSet<String>,
    /// Paths that answer 500
    pub failing_paths: HashSet<String>,
}

impl FakeState {
    fn seeded() -> Self {
        let now = Utc::now();
        // A Saturday afternoon two weeks out, so both open games share one scoring period
        let saturday = ScoringPeriod::containing(now + Duration::days(14)).start
            + Duration::days(4)
            + Duration::hours(12);

        let games = vec![
            Game {
                id: 1,
                home_team: "Texas".to_string(),
                away_team: "Oklahoma".to_string(),
                spread: 3.5,
                game_date: saturday,
                winning_team: None,
            },
            Game {
                id: 2,
                home_team: "Georgia".to_string(),
                away_team: "Alabama".to_string(),
                spread: -1.5,
                game_date: saturday + Duration::hours(4),
                winning_team: None,
            },
            Game {
                id: 3,
                home_team: "Ohio State".to_string(),
                away_team: "Michigan".to_string(),
                spread: 7.0,
                game_date: now - Duration::hours(1),
                winning_team: None,
            },
            Game {
                id: 4,
                home_team: "Oregon".to_string(),
                away_team: "USC".to_string(),
                spread: 10.5,
                game_date: now - Duration::days(8),
                winning_team: Some("USC *".to_string()),
            },
        ];

        let mut picks = HashMap::new();
        picks.insert(
            3,
            Pick {
                game_id: 3,
                picked_team: "Michigan".to_string(),
                lock: false,
                points_awarded: None,
            },
        );
        picks.insert(
            4,
            Pick {
                game_id: 4,
                picked_team: "USC".to_string(),
                lock: true,
                points_awarded: Some(2),
            },
        );

        let tiebreakers = vec![
            Tiebreaker {
                id: 10,
                question: "How many total points in Texas vs Oklahoma?".to_string(),
                start_time: saturday,
                is_active: true,
                answer: None,
                answer_type: None,
            },
            Tiebreaker {
                id: 11,
                question: "Who wins the Heisman?".to_string(),
                start_time: saturday,
                is_active: true,
                answer: None,
                answer_type: None,
            },
            Tiebreaker {
                id: 12,
                question: "Total points in Oregon vs USC?".to_string(),
                start_time: now - Duration::days(8),
                is_active: true,
                answer: Some(TiebreakerAnswer::Number(45.0)),
                answer_type: Some(crate::models::AnswerKind::Number),
            },
        ];

        let mut tiebreaker_picks = HashMap::new();
        tiebreaker_picks.insert(
            12,
            TiebreakerPick {
                tiebreaker_id: 12,
                answer: TiebreakerAnswer::Number(48.0),
                points_awarded: Some(0.0),
            },
        );

        let leaderboard = vec![
            LeaderboardEntry {
                username: "bettor".to_string(),
                full_name: Some("Bet Tor".to_string()),
                total_points: 2.0,
                correct_locks: 1,
                first_tiebreaker_diff: Some(3.0),
                second_tiebreaker_diff: None,
                third_tiebreaker_diff: None,
            },
            LeaderboardEntry {
                username: "rival".to_string(),
                full_name: None,
                total_points: 1.0,
                correct_locks: 0,
                first_tiebreaker_diff: Some(7.0),
                second_tiebreaker_diff: None,
                third_tiebreaker_diff: None,
            },
        ];

        let scores = vec![GameScore {
            away_team: "Michigan Wolverines".to_string(),
            home_team: "Ohio St.".to_string(),
            away_score: "10".to_string(),
            home_score: "14".to_string(),
            time: "Q3 04:12".to_string(),
        }];

        Self {
            requests: Vec::new(),
            user: User {
                id: 1,
                username: "bettor".to_string(),
                full_name: Some("Bet Tor".to_string()),
                email: Some("bettor@example.com".to_string()),
                admin: false,
                make_picks: true,
            },
            others: vec![User {
                id: 2,
                username: "rival".to_string(),
                full_name: None,
                email: None,
                admin: false,
                make_picks: true,
            }],
            games,
            picks,
            tiebreakers,
            tiebreaker_picks,
            leaderboard,
            scores,
            lock_conflict: false,
            unauthorized_paths: HashSet::new(),
            failing_paths: HashSet::new(),
        }
    }

    fn game(&self, id: GameId) -> Option<&Game> {
        self.games.iter().find(|g| g.id == id)
    }

    fn pick_rows(&self) -> Vec<GamePickRow> {
        let mut games: Vec<&Game> = self.games.iter().collect();
        games.sort_by_key(|g| std::cmp::Reverse(g.game_date));
        games
            .into_iter()
            .map(|g| {
                let pick = self.picks.get(&g.id);
                GamePickRow {
                    game_id: g.id,
                    home_team: g.home_team.clone(),
                    away_team: g.away_team.clone(),
                    spread: g.spread,
                    game_date: g.game_date,
                    winning_team: g.winning_team.clone(),
                    picked_team: pick.map(|p| p.picked_team.clone()),
                    points_awarded: pick.and_then(|p| p.points_awarded),
                    lock: pick.map(|p| p.lock),
                }
            })
            .collect()
    }

    fn tiebreaker_rows(&self) -> Vec<TiebreakerPickRow> {
        self.tiebreakers
            .iter()
            .map(|t| {
                let pick = self.tiebreaker_picks.get(&t.id);
                let accuracy_diff = match (&t.answer, pick) {
                    (Some(correct), Some(p)) => correct
                        .as_number()
                        .zip(p.answer.as_number())
                        .map(|(c, a)| (c - a).abs()),
                    _ => None,
                };
                TiebreakerPickRow {
                    tiebreaker_id: t.id,
                    question: t.question.clone(),
                    start_time: t.start_time,
                    correct_answer: t.answer.clone(),
                    is_active: t.is_active,
                    user_answer: pick.map(|p| p.answer.clone()),
                    points_awarded: pick.and_then(|p| p.points_awarded),
                    accuracy_diff,
                }
            })
            .collect()
    }
}

type Reply = (StatusCode, Value);

fn detail(status: StatusCode, message: &str) -> Reply {
    (status, json!({ "detail": message }))
}

fn ok(value: impl serde::Serialize) -> Reply {
    (
        StatusCode::OK,
        serde_json::to_value(value).unwrap_or(Value::Null),
    )
}

fn parse<T: DeserializeOwned>(body: &Option<Value>) -> Result<T, Reply> {
    body.clone()
        .and_then(|b| serde_json::from_value(b).ok())
        .ok_or_else(|| detail(StatusCode::UNPROCESSABLE_ENTITY, "invalid body"))
}

fn form_field<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

#[derive(Clone)]
pub struct FakeBackend {
    url: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState::seeded()));
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests that wrote a pick or a tiebreaker answer
    pub fn writes(&self) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| {
                r.method == Method::POST
                    && (r.path == "/submit_pick" || r.path == "/tiebreaker_picks")
            })
            .collect()
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&FakeState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

async fn handle(
    State(state): State<Arc<Mutex<FakeState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let raw = String::from_utf8_lossy(&body).to_string();
    let json_body = serde_json::from_slice::<Value>(&body).ok();

    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: authorization.clone(),
        body: json_body.clone(),
    });

    let (status, value) = route(
        &mut state,
        &method,
        uri.path(),
        uri.query().unwrap_or(""),
        authorization.as_deref(),
        &raw,
        &json_body,
    )
    .unwrap_or_else(|reply| reply);
    (status, Json(value)).into_response()
}

fn route(
    state: &mut FakeState,
    method: &Method,
    path: &str,
    query: &str,
    authorization: Option<&str>,
    raw: &str,
    body: &Option<Value>,
) -> Result<Reply, Reply> {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    if state.unauthorized_paths.contains(path) {
        return Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"));
    }
    if state.failing_paths.contains(path) {
        return Err(detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"));
    }

    let public = matches!(
        segments.as_slice(),
        ["token"]
            | ["register"]
            | ["leaderboard"]
            | ["leaderboard", "weeks"]
            | ["user_all_past_picks", _]
            | ["live_games"]
            | ["live_games", _, "picks"]
            | ["live_tiebreakers"]
            | ["live_tiebreakers", _, "picks"]
            | ["api", "gamescores"]
    );
    if !public && authorization != Some(format!("Bearer {}", TOKEN).as_str()) {
        return Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"));
    }

    let now = Utc::now();

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["token"]) => {
            let username = form_field(raw, "username");
            let password = form_field(raw, "password");
            if username == Some(state.user.username.as_str()) && password == Some(PASSWORD) {
                Ok(ok(json!({ "access_token": TOKEN, "token_type": "bearer" })))
            } else {
                Err(detail(StatusCode::UNAUTHORIZED, "Incorrect username or password"))
            }
        }
        ("POST", ["register"]) => {
            let new_user: NewUser = parse(body)?;
            if new_user.username == state.user.username {
                return Err(detail(StatusCode::BAD_REQUEST, "Username already registered"));
            }
            Ok(ok(User {
                id: 2,
                username: new_user.username,
                full_name: None,
                email: Some(new_user.email),
                admin: false,
                make_picks: true,
            }))
        }
        ("GET", ["users", "me"]) => Ok(ok(&state.user)),
        ("GET", ["games"]) => {
            if query.contains("all_games=true") {
                require_admin(state)?;
                let mut games = state.games.clone();
                games.sort_by_key(|g| std::cmp::Reverse(g.game_date));
                return Ok(ok(games));
            }
            let mut open: Vec<&Game> = state.games.iter().filter(|g| g.game_date > now).collect();
            open.sort_by_key(|g| g.game_date);
            Ok(ok(open))
        }
        ("GET", ["my_picks"]) => Ok(ok(state.pick_rows())),
        ("GET", ["tiebreakers"]) => {
            let open: Vec<&Tiebreaker> = state
                .tiebreakers
                .iter()
                .filter(|t| t.is_active && t.start_time > now)
                .collect();
            Ok(ok(open))
        }
        ("GET", ["my_tiebreaker_picks"]) => Ok(ok(state.tiebreaker_rows())),
        ("POST", ["submit_pick"]) => submit_pick(state, parse(body)?),
        ("POST", ["tiebreaker_picks"]) => {
            let submission: TiebreakerPickSubmission = parse(body)?;
            let Some(tiebreaker) = state
                .tiebreakers
                .iter()
                .find(|t| t.id == submission.tiebreaker_id)
            else {
                return Err(detail(StatusCode::NOT_FOUND, "Tiebreaker not found"));
            };
            if tiebreaker.start_time <= now {
                return Err(detail(
                    StatusCode::BAD_REQUEST,
                    "Cannot submit answer after tiebreaker has started",
                ));
            }
            let points_awarded = state
                .tiebreaker_picks
                .get(&submission.tiebreaker_id)
                .and_then(|p| p.points_awarded)
                .or(Some(0.0));
            let pick = TiebreakerPick {
                tiebreaker_id: submission.tiebreaker_id,
                answer: submission.answer,
                points_awarded,
            };
            state
                .tiebreaker_picks
                .insert(pick.tiebreaker_id, pick.clone());
            Ok(ok(pick))
        }
        ("POST", ["games"]) => {
            require_admin(state)?;
            let new_game: NewGame = parse(body)?;
            let id = state.games.iter().map(|g| g.id).max().unwrap_or(0) + 1;
            let game = Game {
                id,
                home_team: new_game.home_team,
                away_team: new_game.away_team,
                spread: new_game.spread,
                game_date: new_game.game_date,
                winning_team: None,
            };
            state.games.push(game.clone());
            Ok(ok(game))
        }
        ("PUT", ["games", id]) => {
            require_admin(state)?;
            let update: GameUpdate = parse(body)?;
            let id: GameId = id.parse().unwrap_or(-1);
            let Some(game) = state.games.iter_mut().find(|g| g.id == id) else {
                return Err(detail(StatusCode::NOT_FOUND, "Game not found"));
            };
            game.home_team = update.home_team;
            game.away_team = update.away_team;
            game.spread = update.spread;
            game.game_date = update.game_date;
            game.winning_team = update.winning_team;
            Ok(ok(game.clone()))
        }
        ("DELETE", ["games", id]) => {
            require_admin(state)?;
            let id: GameId = id.parse().unwrap_or(-1);
            let before = state.games.len();
            state.games.retain(|g| g.id != id);
            if state.games.len() == before {
                return Err(detail(StatusCode::NOT_FOUND, "Game not found"));
            }
            state.picks.remove(&id);
            Ok(ok(json!({ "message": "Game deleted successfully" })))
        }
        ("POST", ["tiebreakers"]) => {
            require_admin(state)?;
            let new_tiebreaker: NewTiebreaker = parse(body)?;
            let id = state.tiebreakers.iter().map(|t| t.id).max().unwrap_or(0) + 1;
            let tiebreaker = Tiebreaker {
                id,
                question: new_tiebreaker.question,
                start_time: new_tiebreaker.start_time,
                is_active: true,
                answer: None,
                answer_type: None,
            };
            state.tiebreakers.push(tiebreaker.clone());
            Ok(ok(tiebreaker))
        }
        ("PUT", ["tiebreakers", id]) => {
            require_admin(state)?;
            let update: TiebreakerUpdate = parse(body)?;
            let id: TiebreakerId = id.parse().unwrap_or(-1);
            let Some(tiebreaker) = state.tiebreakers.iter_mut().find(|t| t.id == id) else {
                return Err(detail(StatusCode::NOT_FOUND, "Tiebreaker not found"));
            };
            tiebreaker.question = update.question;
            tiebreaker.start_time = update.start_time;
            tiebreaker.answer = update.answer;
            tiebreaker.is_active = update.is_active;
            Ok(ok(tiebreaker.clone()))
        }
        ("DELETE", ["tiebreakers", id]) => {
            require_admin(state)?;
            let id: TiebreakerId = id.parse().unwrap_or(-1);
            let before = state.tiebreakers.len();
            state.tiebreakers.retain(|t| t.id != id);
            if state.tiebreakers.len() == before {
                return Err(detail(StatusCode::NOT_FOUND, "Tiebreaker not found"));
            }
            state.tiebreaker_picks.remove(&id);
            Ok(ok(json!({ "message": "Tiebreaker deleted successfully" })))
        }
        ("PUT", ["tiebreaker_picks", "points"]) => {
            require_admin(state)?;
            let update: TiebreakerPointsUpdate = parse(body)?;
            if update.user_id != state.user.id {
                return Err(detail(StatusCode::NOT_FOUND, "Tiebreaker pick not found"));
            }
            let Some(pick) = state.tiebreaker_picks.get_mut(&update.tiebreaker_id) else {
                return Err(detail(StatusCode::NOT_FOUND, "Tiebreaker pick not found"));
            };
            pick.points_awarded = Some(update.points as f64);
            Ok(ok(json!({ "message": "Points updated successfully" })))
        }
        ("GET", ["admin", "user_picks_status"]) => {
            require_admin(state)?;
            let open: Vec<GameId> = state
                .games
                .iter()
                .filter(|g| g.game_date > now)
                .map(|g| g.id)
                .collect();
            let picks_made = open.iter().filter(|id| state.picks.contains_key(id)).count() as i64;
            let has_current_week_lock = state.picks.values().any(|p| {
                p.lock
                    && state
                        .game(p.game_id)
                        .is_some_and(|g| same_scoring_period(g.game_date, now))
            });
            Ok(ok(vec![UserPicksStatus {
                username: state.user.username.clone(),
                full_name: state.user.full_name.clone(),
                total_games: open.len() as i64,
                picks_made,
                is_complete: picks_made == open.len() as i64,
                has_current_week_lock,
            }]))
        }
        ("GET", ["admin", "user_all_picks", username]) => {
            require_admin(state)?;
            if *username != state.user.username {
                return Err(detail(StatusCode::NOT_FOUND, "User not found"));
            }
            Ok(ok(json!({
                "user": UserSummary {
                    id: state.user.id,
                    username: state.user.username.clone(),
                    full_name: state.user.full_name.clone(),
                },
                "game_picks": state.pick_rows(),
                "tiebreaker_picks": state.tiebreaker_rows(),
            })))
        }
        ("POST", ["make_admin", username]) => {
            require_admin(state)?;
            let target = std::iter::once(&mut state.user)
                .chain(state.others.iter_mut())
                .find(|u| u.username == *username);
            let Some(target) = target else {
                return Err(detail(StatusCode::NOT_FOUND, "User not found"));
            };
            target.admin = true;
            Ok(ok(AdminGrant {
                username: target.username.clone(),
                admin: true,
            }))
        }
        ("DELETE", ["admin", "delete_user", id]) => {
            require_admin(state)?;
            let id: i64 = id.parse().unwrap_or(-1);
            let Some(index) = state.others.iter().position(|u| u.id == id) else {
                return Err(detail(StatusCode::NOT_FOUND, "User not found"));
            };
            let removed = state.others.remove(index);
            state.leaderboard.retain(|e| e.username != removed.username);
            Ok(ok(json!({ "message": "User deleted successfully", "user": removed })))
        }
        ("GET", ["leaderboard"]) => Ok(ok(&state.leaderboard)),
        ("GET", ["leaderboard", "weeks"]) => Ok(ok(json!({
            "weeks": [
                WeekOption { key: "all".to_string(), label: "All Weeks".to_string() },
                WeekOption { key: "current_week".to_string(), label: "Current Week".to_string() },
            ]
        }))),
        ("GET", ["user_all_past_picks", username]) => {
            if *username != state.user.username {
                return Err(detail(StatusCode::NOT_FOUND, "User not found"));
            }
            let game_picks: Vec<GamePickRow> = state
                .pick_rows()
                .into_iter()
                .filter(|r| r.game_date <= now && r.picked_team.is_some())
                .collect();
            let tiebreaker_picks: Vec<TiebreakerPickRow> = state
                .tiebreaker_rows()
                .into_iter()
                .filter(|r| r.start_time <= now && r.user_answer.is_some())
                .collect();
            Ok(ok(json!({
                "user": UserSummary {
                    id: state.user.id,
                    username: state.user.username.clone(),
                    full_name: state.user.full_name.clone(),
                },
                "game_picks": game_picks,
                "tiebreaker_picks": tiebreaker_picks,
            })))
        }
        ("GET", ["live_games"]) => {
            let live: Vec<LiveGame> = state
                .games
                .iter()
                .filter(|g| g.game_date <= now && g.winning_team.is_none())
                .map(|g| {
                    let picked = |team: &str| {
                        state
                            .picks
                            .values()
                            .filter(|p| p.game_id == g.id && p.picked_team == team)
                            .count() as i64
                    };
                    let home_picks = picked(&g.home_team);
                    let away_picks = picked(&g.away_team);
                    LiveGame {
                        game_id: g.id,
                        home_team: g.home_team.clone(),
                        away_team: g.away_team.clone(),
                        spread: g.spread,
                        game_date: g.game_date,
                        winning_team: None,
                        total_picks: home_picks + away_picks,
                        home_picks,
                        away_picks,
                    }
                })
                .collect();
            Ok(ok(live))
        }
        ("GET", ["live_games", id, "picks"]) => {
            let id: GameId = id.parse().unwrap_or(-1);
            let entries: Vec<GamePickEntry> = state
                .picks
                .get(&id)
                .map(|p| GamePickEntry {
                    username: state.user.username.clone(),
                    full_name: state.user.full_name.clone(),
                    picked_team: p.picked_team.clone(),
                    lock: Some(p.lock),
                })
                .into_iter()
                .collect();
            Ok(ok(entries))
        }
        ("GET", ["live_tiebreakers"]) => {
            let live: Vec<LiveTiebreaker> = state
                .tiebreakers
                .iter()
                .filter(|t| t.start_time <= now && t.is_active && t.answer.is_none())
                .map(|t| LiveTiebreaker {
                    tiebreaker_id: t.id,
                    question: t.question.clone(),
                    start_time: t.start_time,
                    is_active: t.is_active,
                    total_picks: state.tiebreaker_picks.contains_key(&t.id) as i64,
                })
                .collect();
            Ok(ok(live))
        }
        ("GET", ["live_tiebreakers", id, "picks"]) => {
            let id: TiebreakerId = id.parse().unwrap_or(-1);
            let entries: Vec<TiebreakerPickEntry> = state
                .tiebreaker_picks
                .get(&id)
                .map(|p| TiebreakerPickEntry {
                    username: state.user.username.clone(),
                    full_name: state.user.full_name.clone(),
                    answer: p.answer.clone(),
                })
                .into_iter()
                .collect();
            Ok(ok(entries))
        }
        ("GET", ["api", "gamescores"]) => Ok(ok(&state.scores)),
        _ => Err(detail(StatusCode::NOT_FOUND, "Not Found")),
    }
}

fn require_admin(state: &FakeState) -> Result<(), Reply> {
    if state.user.admin {
        Ok(())
    } else {
        Err(detail(StatusCode::FORBIDDEN, "Not enough permissions"))
    }
}

fn submit_pick(state: &mut FakeState, submission: PickSubmission) -> Result<Reply, Reply> {
    let now = Utc::now();
    let Some(game) = state.game(submission.game_id).cloned() else {
        return Err(detail(StatusCode::NOT_FOUND, "Game not found"));
    };
    if !game.is_team(&submission.picked_team) {
        return Err(detail(StatusCode::BAD_REQUEST, "Invalid team selection"));
    }
    if game.game_date <= now {
        return Err(detail(
            StatusCode::BAD_REQUEST,
            "Cannot submit or update pick after game has started",
        ));
    }
    if submission.lock == Some(true) && state.lock_conflict {
        return Err(detail(StatusCode::BAD_REQUEST, LOCK_CONFLICT));
    }

    if submission.lock == Some(true) {
        let in_week: Vec<GameId> = state
            .games
            .iter()
            .filter(|g| g.id != game.id && same_scoring_period(g.game_date, game.game_date))
            .map(|g| g.id)
            .collect();
        for id in in_week {
            if let Some(other) = state.picks.get_mut(&id) {
                other.lock = false;
            }
        }
    }

    let (message, pick) = match state.picks.get_mut(&game.id) {
        Some(existing) => {
            existing.picked_team = submission.picked_team;
            if let Some(lock) = submission.lock {
                existing.lock = lock;
            }
            ("Pick updated successfully", existing.clone())
        }
        None => {
            let pick = Pick {
                game_id: game.id,
                picked_team: submission.picked_team,
                lock: submission.lock.unwrap_or(false),
                points_awarded: None,
            };
            state.picks.insert(game.id, pick.clone());
            ("Pick submitted successfully", pick)
        }
    };

    Ok(ok(json!({ "message": message, "pick": pick })))
}
