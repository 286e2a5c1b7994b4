use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use pickem::admin::{AdminConsole, AdminError};
use pickem::catalog::LoadError;
use pickem::config::{init_logging, Config};
use pickem::editor::{answer_kind, PickEditor};
use pickem::live_scores::LiveGameView;
use pickem::reconciler::{SubmissionReconciler, SubmitError};
use pickem::session::{GuardOutcome, PrivilegeRequirement, Session, SessionGuard};
use pickem::stats::UserStats;
use pickem::{
    fetch_live_view, open_pick_editor, AnswerKind, Game, GameId, LeaderboardEntry,
    LiveTiebreaker, NewGame, NewTiebreaker, PickemApiClient, Tiebreaker, TiebreakerAnswer,
    TiebreakerId, TiebreakerPointsUpdate, User, UserPastPicks, UserPicksStatus, UserSummary,
    WeekOption,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tracing::{error, info};

// Custom filters for formatting
mod filters {
    use chrono::{DateTime, Utc};

    pub fn format_spread(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:+.1}", value))
    }

    pub fn format_points(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.1}", value))
    }

    pub fn kickoff(at: &DateTime<Utc>) -> ::askama::Result<String> {
        Ok(at.format("%a %b %-d, %H:%M UTC").to_string())
    }

    pub fn diff(value: &Option<f64>) -> ::askama::Result<String> {
        Ok(value.map(|d| format!("{:.1}", d)).unwrap_or_else(|| "-".to_string()))
    }

    pub fn or_blank(value: &Option<String>) -> ::askama::Result<String> {
        Ok(value.clone().unwrap_or_default())
    }

    pub fn answer(value: &Option<pickem::TiebreakerAnswer>) -> ::askama::Result<String> {
        Ok(value
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unresolved".to_string()))
    }
}

/// Flash message shown once at the top of the next page
#[derive(Debug, Clone)]
struct Notice {
    text: String,
    is_error: bool,
}

impl Notice {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// The one signed-in browser this front end serves
struct WebState {
    session: Session,
    /// Kept between requests only while it holds changes the backend has not accepted
    editor: Option<PickEditor>,
    notice: Option<Notice>,
}

struct AppState {
    api: PickemApiClient,
    inner: RwLock<WebState>,
}

type SharedState = Arc<AppState>;

struct GameRow {
    id: GameId,
    home_team: String,
    away_team: String,
    spread: f64,
    game_date: DateTime<Utc>,
    selected: String,
    locked: bool,
}

struct TiebreakerRow {
    id: TiebreakerId,
    question: String,
    start_time: DateTime<Utc>,
    numeric: bool,
    answer: String,
}

struct StartedRow {
    matchup: String,
    picked_team: String,
    locked: bool,
    points: String,
}

struct MemberPickRow {
    matchup: String,
    game_date: DateTime<Utc>,
    picked_team: String,
    locked: bool,
    points: String,
}

struct MemberAnswerRow {
    question: String,
    answer: String,
    points: String,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    active_page: String,
    signed_in: bool,
    notice: Option<Notice>,
}

#[derive(Template)]
#[template(path = "picks.html")]
struct PicksTemplate {
    active_page: String,
    signed_in: bool,
    notice: Option<Notice>,
    user: User,
    games: Vec<GameRow>,
    tiebreakers: Vec<TiebreakerRow>,
    started: Vec<StartedRow>,
    has_pending: bool,
}

#[derive(Template)]
#[template(path = "leaderboard.html")]
struct LeaderboardTemplate {
    active_page: String,
    signed_in: bool,
    notice: Option<Notice>,
    filter: String,
    weeks: Vec<WeekOption>,
    entries: Vec<LeaderboardEntry>,
}

#[derive(Template)]
#[template(path = "stats.html")]
struct StatsTemplate {
    active_page: String,
    signed_in: bool,
    notice: Option<Notice>,
    stats: UserStats,
    win_percentage: String,
}

#[derive(Template)]
#[template(path = "live.html")]
struct LiveTemplate {
    active_page: String,
    signed_in: bool,
    notice: Option<Notice>,
    games: Vec<LiveGameView>,
    tiebreakers: Vec<LiveTiebreaker>,
}

#[derive(Template)]
#[template(path = "admin.html")]
struct AdminTemplate {
    active_page: String,
    signed_in: bool,
    notice: Option<Notice>,
    games: Vec<Game>,
    tiebreakers: Vec<Tiebreaker>,
    status: Vec<UserPicksStatus>,
}

impl AdminTemplate {
    fn new(notice: Option<Notice>) -> Self {
        Self {
            active_page: "admin".to_string(),
            signed_in: true,
            notice,
            games: Vec::new(),
            tiebreakers: Vec::new(),
            status: Vec::new(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin_user.html")]
struct AdminUserTemplate {
    active_page: String,
    signed_in: bool,
    notice: Option<Notice>,
    user: UserSummary,
    picks: Vec<MemberPickRow>,
    answers: Vec<MemberAnswerRow>,
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// Run the session guard, turning a refusal into the redirect the view should issue
async fn guard(
    state: &AppState,
    web: &mut WebState,
    requirement: PrivilegeRequirement,
) -> Result<User, Redirect> {
    match SessionGuard::new(&state.api)
        .check(&mut web.session, requirement)
        .await
    {
        GuardOutcome::Render(user) => Ok(user),
        other => {
            if !web.session.is_authenticated() {
                web.editor = None;
            }
            Err(Redirect::to(other.redirect_path().unwrap_or("/login")))
        }
    }
}

async fn home() -> Redirect {
    Redirect::to("/picks")
}

async fn login_page(State(state): State<SharedState>) -> impl IntoResponse {
    let mut web = state.inner.write().await;
    HtmlTemplate(LoginTemplate {
        active_page: "login".to_string(),
        signed_in: web.session.is_authenticated(),
        notice: web.notice.take(),
    })
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_submit(
    State(state): State<SharedState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let result = state.api.login(form.username.trim(), &form.password).await;
    let mut web = state.inner.write().await;
    match result {
        Ok(response) => {
            web.session.sign_in(response.access_token);
            web.editor = None;
            info!(username = %form.username.trim(), "signed in");
            Redirect::to("/picks").into_response()
        }
        Err(e) => {
            web.notice = Some(Notice::error(if e.is_unauthorized() {
                "Incorrect username or password".to_string()
            } else {
                e.detail()
            }));
            Redirect::to("/login").into_response()
        }
    }
}

async fn logout(State(state): State<SharedState>) -> Redirect {
    let mut web = state.inner.write().await;
    web.session.logout();
    web.editor = None;
    web.notice = Some(Notice::ok("Signed out"));
    Redirect::to("/login")
}

fn picks_view(user: User, editor: &PickEditor, notice: Option<Notice>) -> PicksTemplate {
    let now = Utc::now();
    let catalog = editor.catalog();

    let games = catalog
        .editable_games(now)
        .into_iter()
        .map(|g| GameRow {
            id: g.id,
            home_team: g.home_team.clone(),
            away_team: g.away_team.clone(),
            spread: g.spread,
            game_date: g.game_date,
            selected: editor.effective_selection(g.id).unwrap_or("").to_string(),
            locked: editor.effective_lock(g.id),
        })
        .collect();

    let tiebreakers = catalog
        .editable_tiebreakers(now)
        .into_iter()
        .map(|t| TiebreakerRow {
            id: t.id,
            question: t.question.clone(),
            start_time: t.start_time,
            numeric: answer_kind(t) == AnswerKind::Number,
            answer: editor
                .effective_answer(t.id)
                .map(|a| a.to_string())
                .unwrap_or_default(),
        })
        .collect();

    let started = catalog
        .locked_in_picks(now)
        .into_iter()
        .map(|(g, p)| StartedRow {
            matchup: g.matchup(),
            picked_team: p.picked_team.clone(),
            locked: p.lock,
            points: p
                .points_awarded
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    PicksTemplate {
        active_page: "picks".to_string(),
        signed_in: true,
        notice,
        user,
        games,
        tiebreakers,
        started,
        has_pending: editor.has_pending_changes(),
    }
}

async fn picks_page(State(state): State<SharedState>) -> Response {
    let mut lock = state.inner.write().await;
    let web = &mut *lock;
    let user = match guard(&state, web, PrivilegeRequirement::Member).await {
        Ok(user) => user,
        Err(redirect) => return redirect.into_response(),
    };

    // A batch the backend refused stays staged so it can be resubmitted as is
    if let Some(editor) = web.editor.as_ref().filter(|e| e.has_pending_changes()) {
        let notice = web.notice.take();
        return HtmlTemplate(picks_view(user, editor, notice)).into_response();
    }

    match open_pick_editor(&state.api, &mut web.session).await {
        Ok(editor) => {
            let notice = web.notice.take();
            let page = picks_view(user, &editor, notice);
            web.editor = Some(editor);
            HtmlTemplate(page).into_response()
        }
        Err(LoadError::Unauthenticated) => Redirect::to("/login").into_response(),
        Err(LoadError::Forbidden(_)) => Redirect::to("/").into_response(),
        Err(e) => {
            error!(error = %e, "failed to load picks");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Stage the form fields that differ from what the editor already shows
///
/// Fields: `pick_<game id>` = team, `lock` = game id or empty, `answer_<tiebreaker id>` = text.
fn stage_form(editor: &mut PickEditor, form: &HashMap<String, String>, now: DateTime<Utc>) -> Result<(), String> {
    let open_games: Vec<GameId> = editor
        .catalog()
        .editable_games(now)
        .iter()
        .map(|g| g.id)
        .collect();

    for game_id in &open_games {
        let Some(team) = form.get(&format!("pick_{}", game_id)).map(|t| t.trim()) else {
            continue;
        };
        if team.is_empty() {
            continue;
        }
        // Choosing the saved team again drops a staged change instead of resending it
        let saved = editor.catalog().picks.get(game_id).map(|p| p.picked_team.as_str());
        if saved == Some(team) {
            editor.clear_selection(*game_id);
            continue;
        }
        if editor.effective_selection(*game_id) != Some(team) {
            editor
                .select_team(*game_id, team, now)
                .map_err(|e| e.to_string())?;
        }
    }

    let wanted_lock: Option<GameId> = match form.get("lock").map(|v| v.trim()) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse().map_err(|_| format!("invalid lock choice {:?}", raw))?),
    };
    for game_id in &open_games {
        if editor.effective_lock(*game_id) != (wanted_lock == Some(*game_id)) {
            editor
                .toggle_lock(*game_id, now)
                .map_err(|e| e.to_string())?;
        }
    }

    let open_tiebreakers: Vec<TiebreakerId> = editor
        .catalog()
        .editable_tiebreakers(now)
        .iter()
        .map(|t| t.id)
        .collect();
    for tiebreaker_id in open_tiebreakers {
        let Some(raw) = form
            .get(&format!("answer_{}", tiebreaker_id))
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
        else {
            continue;
        };
        let unchanged = editor
            .effective_answer(tiebreaker_id)
            .is_some_and(|current| current.to_string() == raw);
        if !unchanged {
            editor
                .set_answer(tiebreaker_id, raw, now)
                .map_err(|e| e.to_string())?;
        }
    }

    Ok(())
}

async fn picks_submit(
    State(state): State<SharedState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let mut web = state.inner.write().await;
    if let Err(redirect) = guard(&state, &mut web, PrivilegeRequirement::Member).await {
        return redirect.into_response();
    }

    let mut editor = match web.editor.take() {
        Some(editor) => editor,
        None => match open_pick_editor(&state.api, &mut web.session).await {
            Ok(editor) => editor,
            Err(LoadError::Unauthenticated) => return Redirect::to("/login").into_response(),
            Err(e) => {
                web.notice = Some(Notice::error(e.to_string()));
                return Redirect::to("/picks").into_response();
            }
        },
    };

    let now = Utc::now();
    if let Err(message) = stage_form(&mut editor, &form, now) {
        web.notice = Some(Notice::error(message));
        web.editor = Some(editor);
        return Redirect::to("/picks").into_response();
    }
    if !editor.has_pending_changes() {
        web.notice = Some(Notice::ok("No changes to save"));
        return Redirect::to("/picks").into_response();
    }

    let result = SubmissionReconciler::new(&state.api)
        .submit(&mut web.session, &mut editor, now)
        .await;
    match result {
        Ok(report) => {
            web.notice = Some(Notice::ok(report.message));
            web.editor = None;
        }
        Err(SubmitError::Unauthenticated) => {
            web.editor = None;
            return Redirect::to("/login").into_response();
        }
        Err(SubmitError::LockConflict(detail)) => {
            web.notice = Some(Notice::error(detail));
            web.editor = Some(editor);
        }
        Err(e) => {
            web.notice = Some(Notice::error(e.to_string()));
            web.editor = Some(editor);
        }
    }
    Redirect::to("/picks").into_response()
}

#[derive(Deserialize)]
struct FilterQuery {
    filter: Option<String>,
}

async fn leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<FilterQuery>,
) -> Response {
    let filter = query.filter.unwrap_or_else(|| "all".to_string());
    let (entries, weeks) = tokio::join!(
        state.api.fetch_leaderboard(&filter),
        state.api.fetch_leaderboard_weeks()
    );
    let entries = match entries {
        Ok(entries) => entries,
        Err(e) => return (StatusCode::BAD_GATEWAY, e.detail()).into_response(),
    };

    let mut web = state.inner.write().await;
    HtmlTemplate(LeaderboardTemplate {
        active_page: "leaderboard".to_string(),
        signed_in: web.session.is_authenticated(),
        notice: web.notice.take(),
        filter,
        weeks: weeks.unwrap_or_default(),
        entries,
    })
    .into_response()
}

async fn stats(
    State(state): State<SharedState>,
    Path(username): Path<String>,
    Query(query): Query<FilterQuery>,
) -> Response {
    let filter = query.filter.unwrap_or_else(|| "all".to_string());
    let past = match state.api.fetch_user_past_picks(&username, &filter).await {
        Ok(past) => past,
        Err(e) => return (StatusCode::NOT_FOUND, e.detail()).into_response(),
    };
    let stats = UserStats::from_past_picks(&past);
    let win_percentage = stats
        .win_percentage()
        .map(|p| format!("{:.1}%", p * 100.0))
        .unwrap_or_else(|| "-".to_string());

    let mut web = state.inner.write().await;
    HtmlTemplate(StatsTemplate {
        active_page: "leaderboard".to_string(),
        signed_in: web.session.is_authenticated(),
        notice: web.notice.take(),
        stats,
        win_percentage,
    })
    .into_response()
}

async fn live(State(state): State<SharedState>) -> Response {
    let live = match fetch_live_view(&state.api).await {
        Ok(live) => live,
        Err(e) => return (StatusCode::BAD_GATEWAY, format!("{:#}", e)).into_response(),
    };
    let mut web = state.inner.write().await;
    HtmlTemplate(LiveTemplate {
        active_page: "live".to_string(),
        signed_in: web.session.is_authenticated(),
        notice: web.notice.take(),
        games: live.games,
        tiebreakers: live.tiebreakers,
    })
    .into_response()
}

async fn admin_page(State(state): State<SharedState>) -> Response {
    let mut web = state.inner.write().await;
    if let Err(redirect) = guard(&state, &mut web, PrivilegeRequirement::Admin).await {
        return redirect.into_response();
    }

    let console = AdminConsole::new(&state.api);
    let loaded = async {
        let games = console.all_games(&mut web.session).await?;
        let tiebreakers = console.tiebreakers(&mut web.session).await?;
        let status = console.user_picks_status(&mut web.session).await?;
        Ok::<_, AdminError>((games, tiebreakers, status))
    }
    .await;

    match loaded {
        Ok((games, tiebreakers, status)) => HtmlTemplate(AdminTemplate {
            games,
            tiebreakers,
            status,
            ..AdminTemplate::new(web.notice.take())
        })
        .into_response(),
        Err(AdminError::Unauthenticated) => Redirect::to("/login").into_response(),
        Err(AdminError::Forbidden(_)) => Redirect::to("/").into_response(),
        // Render in place; redirecting back here would repeat the failing load
        Err(e) => {
            error!(error = %e, "failed to load admin data");
            web.notice = None;
            let notice = Notice::error(format!("Could not load admin data: {}", e));
            (
                StatusCode::BAD_GATEWAY,
                HtmlTemplate(AdminTemplate::new(Some(notice))),
            )
                .into_response()
        }
    }
}

fn member_view(past: UserPastPicks) -> AdminUserTemplate {
    let points = |p: Option<String>| p.unwrap_or_else(|| "-".to_string());
    let picks = past
        .game_picks
        .iter()
        .map(|row| MemberPickRow {
            matchup: row.game().matchup(),
            game_date: row.game_date,
            picked_team: row.picked_team.clone().unwrap_or_default(),
            locked: row.lock.unwrap_or(false),
            points: points(row.points_awarded.map(|n| n.to_string())),
        })
        .collect();
    let answers = past
        .tiebreaker_picks
        .iter()
        .map(|row| MemberAnswerRow {
            question: row.question.clone(),
            answer: row
                .user_answer
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            points: points(row.points_awarded.map(|n| format!("{:.1}", n))),
        })
        .collect();

    AdminUserTemplate {
        active_page: "admin".to_string(),
        signed_in: true,
        notice: None,
        user: past.user,
        picks,
        answers,
    }
}

#[derive(Deserialize)]
struct MemberQuery {
    username: String,
}

/// Every pick of one member, open games included
async fn admin_user_picks(
    State(state): State<SharedState>,
    Query(query): Query<MemberQuery>,
) -> Response {
    let mut web = state.inner.write().await;
    if let Err(redirect) = guard(&state, &mut web, PrivilegeRequirement::Admin).await {
        return redirect.into_response();
    }

    let result = AdminConsole::new(&state.api)
        .user_all_picks(&mut web.session, &query.username)
        .await;
    match result {
        Ok(past) => {
            let mut page = member_view(past);
            page.notice = web.notice.take();
            HtmlTemplate(page).into_response()
        }
        Err(e) => admin_failure(&mut web, e),
    }
}

fn admin_failure(web: &mut WebState, err: AdminError) -> Response {
    match err {
        AdminError::Unauthenticated => Redirect::to("/login").into_response(),
        AdminError::Forbidden(_) => Redirect::to("/").into_response(),
        other => {
            web.notice = Some(Notice::error(other.to_string()));
            Redirect::to("/admin").into_response()
        }
    }
}

/// Accept RFC 3339 or the `datetime-local` form value, read as UTC
fn parse_start(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|_| format!("invalid start time {:?}", raw))
}

fn parse_admin_answer(raw: &str) -> TiebreakerAnswer {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => TiebreakerAnswer::Number(n),
        _ => TiebreakerAnswer::Text(raw.trim().to_string()),
    }
}

#[derive(Deserialize)]
struct NewGameForm {
    home_team: String,
    away_team: String,
    spread: f64,
    game_date: String,
}

#[derive(Deserialize)]
struct ResultForm {
    #[serde(default)]
    winner: String,
}

#[derive(Deserialize)]
struct NewTiebreakerForm {
    question: String,
    start_time: String,
}

#[derive(Deserialize)]
struct AnswerForm {
    answer: String,
}

#[derive(Deserialize)]
struct UsernameForm {
    username: String,
}

#[derive(Deserialize)]
struct UserIdForm {
    user_id: i64,
}

#[derive(Deserialize)]
struct PointsForm {
    user_id: i64,
    tiebreaker_id: TiebreakerId,
    points: i64,
}

/// Shared tail of every admin form post: guard, run, flash, back to the admin page
async fn admin_action<F>(state: &AppState, action: F) -> Response
where
    F: for<'s> FnOnce(
        AdminConsole<'s>,
        &'s mut Session,
    ) -> futures::future::BoxFuture<'s, Result<String, AdminError>>,
{
    let mut web = state.inner.write().await;
    if let Err(redirect) = guard(state, &mut web, PrivilegeRequirement::Admin).await {
        return redirect.into_response();
    }

    let result = action(AdminConsole::new(&state.api), &mut web.session).await;
    match result {
        Ok(message) => {
            web.notice = Some(Notice::ok(message));
            Redirect::to("/admin").into_response()
        }
        Err(e) => admin_failure(&mut web, e),
    }
}

async fn admin_create_game(
    State(state): State<SharedState>,
    Form(form): Form<NewGameForm>,
) -> Response {
    let game_date = match parse_start(&form.game_date) {
        Ok(at) => at,
        Err(message) => return flash_admin(&state, message).await,
    };
    let game = NewGame {
        home_team: form.home_team,
        away_team: form.away_team,
        spread: form.spread,
        game_date,
    };
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            let created = console.create_game(session, game, Utc::now()).await?;
            Ok::<_, AdminError>(format!("Created {}", created.matchup()))
        })
    })
    .await
}

async fn admin_set_result(
    State(state): State<SharedState>,
    Path(game_id): Path<GameId>,
    Form(form): Form<ResultForm>,
) -> Response {
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            let games = console.all_games(session).await?;
            let Some(game) = games.into_iter().find(|g| g.id == game_id) else {
                return Ok(format!("Game {} no longer exists", game_id));
            };
            let winner = Some(form.winner.trim()).filter(|w| !w.is_empty());
            let updated = console.set_winner(session, &game, winner).await?;
            Ok::<_, AdminError>(format!(
                "{}: winner {}",
                updated.matchup(),
                updated.winning_team.as_deref().unwrap_or("cleared")
            ))
        })
    })
    .await
}

async fn admin_delete_game(State(state): State<SharedState>, Path(game_id): Path<GameId>) -> Response {
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            console.delete_game(session, game_id).await?;
            Ok::<_, AdminError>(format!("Deleted game {}", game_id))
        })
    })
    .await
}

async fn admin_create_tiebreaker(
    State(state): State<SharedState>,
    Form(form): Form<NewTiebreakerForm>,
) -> Response {
    let start_time = match parse_start(&form.start_time) {
        Ok(at) => at,
        Err(message) => return flash_admin(&state, message).await,
    };
    let tiebreaker = NewTiebreaker {
        question: form.question,
        start_time,
    };
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            let created = console
                .create_tiebreaker(session, tiebreaker, Utc::now())
                .await?;
            Ok::<_, AdminError>(format!("Created tiebreaker {}", created.id))
        })
    })
    .await
}

async fn admin_answer_tiebreaker(
    State(state): State<SharedState>,
    Path(tiebreaker_id): Path<TiebreakerId>,
    Form(form): Form<AnswerForm>,
) -> Response {
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            let tiebreakers = console.tiebreakers(session).await?;
            let Some(tiebreaker) = tiebreakers.into_iter().find(|t| t.id == tiebreaker_id) else {
                return Ok(format!("Tiebreaker {} no longer exists", tiebreaker_id));
            };
            let resolved = console
                .resolve_tiebreaker(session, &tiebreaker, parse_admin_answer(&form.answer))
                .await?;
            Ok::<_, AdminError>(format!("Answer recorded for: {}", resolved.question))
        })
    })
    .await
}

async fn admin_delete_tiebreaker(
    State(state): State<SharedState>,
    Path(tiebreaker_id): Path<TiebreakerId>,
) -> Response {
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            console.delete_tiebreaker(session, tiebreaker_id).await?;
            Ok::<_, AdminError>(format!("Deleted tiebreaker {}", tiebreaker_id))
        })
    })
    .await
}

async fn admin_award_points(
    State(state): State<SharedState>,
    Form(form): Form<PointsForm>,
) -> Response {
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            console
                .award_tiebreaker_points(
                    session,
                    TiebreakerPointsUpdate {
                        user_id: form.user_id,
                        tiebreaker_id: form.tiebreaker_id,
                        points: form.points,
                    },
                )
                .await?;
            Ok::<_, AdminError>(format!("Awarded {} points", form.points))
        })
    })
    .await
}

async fn admin_make_admin(
    State(state): State<SharedState>,
    Form(form): Form<UsernameForm>,
) -> Response {
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            let grant = console.make_admin(session, &form.username).await?;
            Ok::<_, AdminError>(format!("{} is now an admin", grant.username))
        })
    })
    .await
}

async fn admin_delete_user(
    State(state): State<SharedState>,
    Form(form): Form<UserIdForm>,
) -> Response {
    admin_action(&state, move |console, session| {
        Box::pin(async move {
            console.delete_user(session, form.user_id).await?;
            Ok::<_, AdminError>(format!("Deleted user {}", form.user_id))
        })
    })
    .await
}

async fn flash_admin(state: &AppState, message: String) -> Response {
    state.inner.write().await.notice = Some(Notice::error(message));
    Redirect::to("/admin").into_response()
}

fn app(state: SharedState) -> Router {
    Router::new()
        // This will serve files from the "static" directory at the "/static" URL path
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(home))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", post(logout))
        .route("/picks", get(picks_page).post(picks_submit))
        .route("/leaderboard", get(leaderboard))
        .route("/stats/:username", get(stats))
        .route("/live", get(live))
        .route("/admin", get(admin_page))
        .route("/admin/games", post(admin_create_game))
        .route("/admin/games/:id/result", post(admin_set_result))
        .route("/admin/games/:id/delete", post(admin_delete_game))
        .route("/admin/tiebreakers", post(admin_create_tiebreaker))
        .route("/admin/tiebreakers/:id/answer", post(admin_answer_tiebreaker))
        .route("/admin/tiebreakers/:id/delete", post(admin_delete_tiebreaker))
        .route("/admin/points", post(admin_award_points))
        .route("/admin/users/picks", get(admin_user_picks))
        .route("/admin/users/admin", post(admin_make_admin))
        .route("/admin/users/delete", post(admin_delete_user))
        .with_state(state)
}

fn new_state(api: PickemApiClient, session: Session) -> SharedState {
    Arc::new(AppState {
        api,
        inner: RwLock::new(WebState {
            session,
            editor: None,
            notice: None,
        }),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging
    init_logging();

    let config = Config::from_env()?;
    let api = PickemApiClient::new(&config.api_url);
    let state = new_state(api, Session::anonymous());

    println!("Pick'em backend: {}", config.api_url);
    println!("\nStarting web server at http://{}", config.web_addr);
    println!("Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(config.web_addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
