use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use pickem::admin::AdminConsole;
use pickem::catalog::CatalogLoader;
use pickem::config::{init_logging, Config};
use pickem::data::{load_session, remove_session, save_leaderboard_to_csv, save_session};
use pickem::editor::{answer_kind, PickEditor};
use pickem::reconciler::{SubmissionReconciler, SubmitError};
use pickem::session::{GuardOutcome, PrivilegeRequirement, Session, SessionGuard};
use pickem::stats::UserStats;
use pickem::{
    fetch_live_view, GameId, NewGame, NewTiebreaker, NewUser, PickemApiClient,
    TiebreakerAnswer, TiebreakerId, TiebreakerPointsUpdate, User,
};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "pickem", about = "Weekly college football pick'em against the spread")]
struct Cli {
    /// Backend URL, overriding PICKEM_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the token
    Login {
        #[arg(long)]
        username: String,
        /// Falls back to PICKEM_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    /// Show open games and tiebreakers with your current picks
    Games,
    /// Stage and submit picks, locks and tiebreaker answers in one batch
    Picks(PicksArgs),
    Leaderboard {
        #[arg(long, default_value = "all")]
        filter: String,
        /// Also write the standings to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// List the leaderboard filters the backend offers
    Weeks,
    Stats {
        /// Defaults to the signed-in user
        username: Option<String>,
        #[arg(long, default_value = "all")]
        filter: String,
    },
    /// Started games with live scores and who is covering
    Live {
        /// Show everyone's picks for one game
        #[arg(long, conflicts_with = "tiebreaker")]
        game: Option<GameId>,
        /// Show everyone's answers for one started tiebreaker
        #[arg(long)]
        tiebreaker: Option<TiebreakerId>,
    },
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Args)]
struct PicksArgs {
    /// GAME_ID=TEAM
    #[arg(long = "pick", value_parser = parse_assignment)]
    picks: Vec<(i64, String)>,
    #[arg(long = "lock")]
    locks: Vec<GameId>,
    #[arg(long = "unlock")]
    unlocks: Vec<GameId>,
    /// TIEBREAKER_ID=ANSWER
    #[arg(long = "answer", value_parser = parse_assignment)]
    answers: Vec<(i64, String)>,
    /// Print what would be sent without submitting
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Who has picked every open game and locked one this week
    Status,
    Games,
    AddGame {
        #[arg(long)]
        home: String,
        #[arg(long)]
        away: String,
        /// Positive when the home team is favored
        #[arg(long, allow_hyphen_values = true)]
        spread: f64,
        /// RFC 3339 kickoff, e.g. 2025-10-18T19:30:00Z
        #[arg(long)]
        start: DateTime<Utc>,
    },
    /// Record a winner (team name or PUSH), or clear it
    Result {
        #[arg(long)]
        game: GameId,
        #[arg(long, conflicts_with = "clear")]
        winner: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    DeleteGame {
        game: GameId,
    },
    AddTiebreaker {
        #[arg(long)]
        question: String,
        #[arg(long)]
        start: DateTime<Utc>,
    },
    AnswerTiebreaker {
        #[arg(long)]
        id: TiebreakerId,
        #[arg(long)]
        answer: String,
    },
    DeleteTiebreaker {
        id: TiebreakerId,
    },
    Award {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        tiebreaker_id: TiebreakerId,
        #[arg(long, allow_hyphen_values = true)]
        points: i64,
    },
    /// Every pick of one user, open games included
    UserPicks {
        username: String,
    },
    MakeAdmin {
        username: String,
    },
    /// Delete a user and all of their picks
    DeleteUser {
        user_id: i64,
    },
}

fn parse_assignment(raw: &str) -> Result<(i64, String), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got {:?}", raw))?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| format!("{:?} is not a numeric id", id))?;
    Ok((id, value.trim().to_string()))
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%a %b %-d %-I:%M %p").to_string()
}

/// Restore the saved session; invalidation deletes the session file
fn restore_session(config: &Config) -> Result<Session> {
    let hook_path = config.session_file.clone();
    let session = match load_session(&config.session_file, &config.api_url)? {
        Some(stored) => {
            let token: &str = secrecy::ExposeSecret::expose_secret(&stored.access_token);
            Session::with_token(token)
        }
        None => Session::anonymous(),
    };

    Ok(session.on_invalidate(move || {
        if let Err(e) = remove_session(&hook_path) {
            warn!(error = %e, "failed to remove session file");
        }
    }))
}

async fn require(
    api: &PickemApiClient,
    session: &mut Session,
    requirement: PrivilegeRequirement,
) -> Result<User> {
    match SessionGuard::new(api).check(session, requirement).await {
        GuardOutcome::Render(user) => Ok(user),
        GuardOutcome::RedirectLogin => bail!("Not signed in. Run `cli login --username <name>` first."),
        GuardOutcome::RedirectHome => bail!("This command needs an admin account."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }

    let api = PickemApiClient::new(&config.api_url);
    let mut session = restore_session(&config)?;

    match cli.command {
        Command::Login { username, password } => {
            let password = match password.or_else(|| std::env::var("PICKEM_PASSWORD").ok()) {
                Some(p) => p,
                None => bail!("Pass --password or set PICKEM_PASSWORD"),
            };
            let response = api
                .login(&username, &password)
                .await
                .context("Login failed")?;
            let token = SecretString::new(response.access_token.into_boxed_str());
            save_session(&config.session_file, &config.api_url, &token, Some(&username))?;
            println!("Signed in as {}", username);
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let user = api
                .register(&NewUser {
                    username,
                    email,
                    password,
                })
                .await
                .context("Registration failed")?;
            println!("Registered {}. Sign in with `cli login`.", user.username);
        }
        Command::Logout => {
            session.logout();
            remove_session(&config.session_file)?;
            println!("Signed out");
        }
        Command::Whoami => {
            let user = require(&api, &mut session, PrivilegeRequirement::Member).await?;
            println!(
                "{} ({}){}",
                user.display_name(),
                user.username,
                if user.admin { " [admin]" } else { "" }
            );
        }
        Command::Games => {
            require(&api, &mut session, PrivilegeRequirement::Member).await?;
            let catalog = CatalogLoader::new(&api).load(&mut session).await?;
            let editor = PickEditor::new(catalog);
            print_board(&editor, Utc::now());
        }
        Command::Picks(args) => {
            require(&api, &mut session, PrivilegeRequirement::Member).await?;
            run_picks(&api, &mut session, args).await?;
        }
        Command::Leaderboard { filter, csv } => {
            let entries = api
                .fetch_leaderboard(&filter)
                .await
                .context("Failed to fetch leaderboard")?;
            if entries.is_empty() {
                println!("No standings yet.");
            }
            for (i, entry) in entries.iter().enumerate() {
                println!(
                    "{:>2}. {:<24} {:>6.1} pts | locks {} | tb {}",
                    i + 1,
                    entry.full_name.as_deref().unwrap_or(&entry.username),
                    entry.total_points,
                    entry.correct_locks,
                    entry
                        .first_tiebreaker_diff
                        .map(|d| format!("{:.1}", d))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            if let Some(path) = csv {
                save_leaderboard_to_csv(&entries, &path)?;
                println!("\nSaved leaderboard to {}", path.display());
            }
        }
        Command::Weeks => {
            let weeks = api
                .fetch_leaderboard_weeks()
                .await
                .context("Failed to fetch weeks")?;
            for week in weeks {
                println!("{:<16} {}", week.key, week.label);
            }
        }
        Command::Stats { username, filter } => {
            let username = match username {
                Some(u) => u,
                None => require(&api, &mut session, PrivilegeRequirement::Member)
                    .await?
                    .username,
            };
            let past = api
                .fetch_user_past_picks(&username, &filter)
                .await
                .with_context(|| format!("Failed to fetch picks for {}", username))?;
            println!("{}", UserStats::from_past_picks(&past).format());
        }
        Command::Live { game, tiebreaker } => match (game, tiebreaker) {
            (Some(game_id), _) => {
                let picks = api
                    .fetch_game_picks(game_id)
                    .await
                    .context("Failed to fetch picks for game")?;
                for pick in picks {
                    println!(
                        "{:<24} {}{}",
                        pick.full_name.as_deref().unwrap_or(&pick.username),
                        pick.picked_team,
                        if pick.lock.unwrap_or(false) { " (lock)" } else { "" }
                    );
                }
            }
            (None, Some(tiebreaker_id)) => {
                let answers = api
                    .fetch_tiebreaker_answers(tiebreaker_id)
                    .await
                    .context("Failed to fetch tiebreaker answers")?;
                for entry in answers {
                    println!(
                        "{:<24} {}",
                        entry.full_name.as_deref().unwrap_or(&entry.username),
                        entry.answer
                    );
                }
            }
            (None, None) => {
                let live = fetch_live_view(&api).await?;
                if live.is_empty() {
                    println!("No games in progress.");
                }
                for view in &live.games {
                    println!("{}", view.format());
                }
                if !live.tiebreakers.is_empty() {
                    println!("\nOPEN TIEBREAKERS\n");
                }
                for tiebreaker in &live.tiebreakers {
                    println!(
                        "[{}] {} | {} answers",
                        tiebreaker.tiebreaker_id, tiebreaker.question, tiebreaker.total_picks
                    );
                }
            }
        },
        Command::Admin(command) => {
            require(&api, &mut session, PrivilegeRequirement::Admin).await?;
            run_admin(&api, &mut session, command).await?;
        }
    }

    Ok(())
}

fn print_board(editor: &PickEditor, now: DateTime<Utc>) {
    let catalog = editor.catalog();

    println!("OPEN GAMES\n");
    let games = catalog.editable_games(now);
    if games.is_empty() {
        println!("No open games.");
    }
    for game in games {
        let pick = editor.effective_selection(game.id).unwrap_or("-");
        let lock = if editor.effective_lock(game.id) { " [LOCK]" } else { "" };
        println!(
            "[{}] {} | {} | Pick: {}{}",
            game.id,
            game.matchup(),
            local_time(game.game_date),
            pick,
            lock
        );
    }

    println!("\nTIEBREAKERS\n");
    for tiebreaker in catalog.editable_tiebreakers(now) {
        let answer = editor
            .effective_answer(tiebreaker.id)
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{}] {} ({:?}) | {} | Answer: {}",
            tiebreaker.id,
            tiebreaker.question,
            answer_kind(tiebreaker),
            local_time(tiebreaker.start_time),
            answer
        );
    }

    let locked_in = catalog.locked_in_picks(now);
    if !locked_in.is_empty() {
        println!("\nSTARTED\n");
        for (game, pick) in locked_in {
            println!(
                "{} | Pick: {}{} | Points: {}",
                game.matchup(),
                pick.picked_team,
                if pick.lock { " [LOCK]" } else { "" },
                pick.points_awarded
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
}

async fn run_picks(api: &PickemApiClient, session: &mut Session, args: PicksArgs) -> Result<()> {
    let catalog = CatalogLoader::new(api).load(session).await?;
    let mut editor = PickEditor::new(catalog);
    let now = Utc::now();

    for (game_id, team) in &args.picks {
        editor.select_team(*game_id, team, now)?;
    }
    for game_id in &args.locks {
        editor.lock(*game_id, now)?;
    }
    for game_id in &args.unlocks {
        editor.unlock(*game_id, now)?;
    }
    for (tiebreaker_id, answer) in &args.answers {
        editor.set_answer(*tiebreaker_id, answer, now)?;
    }

    if !editor.has_pending_changes() {
        print_board(&editor, now);
        return Ok(());
    }

    if args.dry_run {
        let plan = pickem::reconciler::plan_submission(&editor, now)?;
        for pick in &plan.picks {
            println!("{}", serde_json::to_string(pick)?);
        }
        for answer in &plan.answers {
            println!("{}", serde_json::to_string(answer)?);
        }
        return Ok(());
    }

    match SubmissionReconciler::new(api)
        .submit(session, &mut editor, now)
        .await
    {
        Ok(report) => {
            println!("{}\n", report.message);
            print_board(&editor, now);
            Ok(())
        }
        Err(SubmitError::LockConflict(detail)) => {
            println!("{}", detail);
            println!(
                "Other changes may have been saved; run `games` to check, then resubmit without --lock."
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_admin_answer(raw: &str) -> TiebreakerAnswer {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => TiebreakerAnswer::Number(n),
        _ => TiebreakerAnswer::Text(raw.trim().to_string()),
    }
}

async fn run_admin(
    api: &PickemApiClient,
    session: &mut Session,
    command: AdminCommand,
) -> Result<()> {
    let console = AdminConsole::new(api);

    match command {
        AdminCommand::Status => {
            for status in console.user_picks_status(session).await? {
                println!(
                    "{:<24} {}/{} picks{}{}",
                    status.full_name.as_deref().unwrap_or(&status.username),
                    status.picks_made,
                    status.total_games,
                    if status.is_complete { " complete" } else { "" },
                    if status.has_current_week_lock { ", locked" } else { "" }
                );
            }
        }
        AdminCommand::Games => {
            for game in console.all_games(session).await? {
                println!(
                    "[{}] {} | {} | Winner: {}",
                    game.id,
                    game.matchup(),
                    local_time(game.game_date),
                    game.winning_team.as_deref().unwrap_or("-")
                );
            }
        }
        AdminCommand::AddGame {
            home,
            away,
            spread,
            start,
        } => {
            let game = console
                .create_game(
                    session,
                    NewGame {
                        home_team: home,
                        away_team: away,
                        spread,
                        game_date: start,
                    },
                    Utc::now(),
                )
                .await?;
            println!("Created game {}: {}", game.id, game.matchup());
        }
        AdminCommand::Result {
            game,
            winner,
            clear,
        } => {
            let games = console.all_games(session).await?;
            let Some(game) = games.iter().find(|g| g.id == game) else {
                bail!("Game {} not found", game);
            };
            if winner.is_none() && !clear {
                bail!("Pass --winner TEAM|PUSH or --clear");
            }
            let updated = console
                .set_winner(session, game, winner.as_deref())
                .await?;
            println!(
                "{}: winner {}",
                updated.matchup(),
                updated.winning_team.as_deref().unwrap_or("cleared")
            );
        }
        AdminCommand::DeleteGame { game } => {
            console.delete_game(session, game).await?;
            println!("Deleted game {}", game);
        }
        AdminCommand::AddTiebreaker { question, start } => {
            let tiebreaker = console
                .create_tiebreaker(
                    session,
                    NewTiebreaker {
                        question,
                        start_time: start,
                    },
                    Utc::now(),
                )
                .await?;
            println!("Created tiebreaker {}: {}", tiebreaker.id, tiebreaker.question);
        }
        AdminCommand::AnswerTiebreaker { id, answer } => {
            let tiebreakers = console.tiebreakers(session).await?;
            let Some(tiebreaker) = tiebreakers.iter().find(|t| t.id == id) else {
                bail!("Tiebreaker {} not found", id);
            };
            let resolved = console
                .resolve_tiebreaker(session, tiebreaker, parse_admin_answer(&answer))
                .await?;
            println!(
                "{}: answer {}",
                resolved.question,
                resolved
                    .answer
                    .map(|a| a.to_string())
                    .unwrap_or_default()
            );
        }
        AdminCommand::DeleteTiebreaker { id } => {
            console.delete_tiebreaker(session, id).await?;
            println!("Deleted tiebreaker {}", id);
        }
        AdminCommand::Award {
            user_id,
            tiebreaker_id,
            points,
        } => {
            console
                .award_tiebreaker_points(
                    session,
                    TiebreakerPointsUpdate {
                        user_id,
                        tiebreaker_id,
                        points,
                    },
                )
                .await?;
            println!("Awarded {} points to user {} on tiebreaker {}", points, user_id, tiebreaker_id);
        }
        AdminCommand::UserPicks { username } => {
            let past = console.user_all_picks(session, &username).await?;
            println!("{} (id {})\n", past.user.username, past.user.id);
            for row in &past.game_picks {
                println!(
                    "[{}] {} | {} | Pick: {}{} | Points: {}",
                    row.game_id,
                    row.game().matchup(),
                    local_time(row.game_date),
                    row.picked_team.as_deref().unwrap_or("-"),
                    if row.lock.unwrap_or(false) { " [LOCK]" } else { "" },
                    row.points_awarded
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            for row in &past.tiebreaker_picks {
                println!(
                    "[{}] {} | Answer: {} | Points: {}",
                    row.tiebreaker_id,
                    row.question,
                    row.user_answer
                        .as_ref()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    row.points_awarded
                        .map(|p| format!("{:.1}", p))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }
        AdminCommand::MakeAdmin { username } => {
            let grant = console.make_admin(session, &username).await?;
            println!("{} is now an admin", grant.username);
        }
        AdminCommand::DeleteUser { user_id } => {
            console.delete_user(session, user_id).await?;
            println!("Deleted user {}", user_id);
        }
    }

    Ok(())
}
