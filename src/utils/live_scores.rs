use crate::models::{GameScore, LiveGame, LiveTiebreaker};
use serde::Serialize;

/// Canonical form used to compare team names across feeds
///
/// Lowercases, spells out `&`, drops punctuation and shortens "state" to "st".
pub fn normalize_team(name: &str) -> String {
    let spelled = name.to_lowercase().replace('&', " and ");
    let cleaned: String = spelled
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| *word != "the")
        .map(|word| if word == "state" { "st" } else { word })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether two names refer to the same team, allowing a trailing mascot on either side
///
/// "Michigan" matches "Michigan Wolverines" but never "Michigan St".
pub fn teams_match(a: &str, b: &str) -> bool {
    let a = normalize_team(a);
    let b = normalize_team(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let (short, long) = if a.len() < b.len() { (&a, &b) } else { (&b, &a) };
    match long.strip_prefix(short.as_str()) {
        Some(rest) if rest.starts_with(' ') => {
            let next = rest.split_whitespace().next().unwrap_or("");
            next != "st"
        }
        _ => false,
    }
}

/// Which side is currently beating the spread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoverStatus {
    Home,
    Away,
    Push,
}

/// `spread` is positive when the home team is favored by that many points
pub fn cover_status(spread: f64, home_score: u32, away_score: u32) -> CoverStatus {
    let margin = home_score as f64 - away_score as f64 - spread;
    if margin > 0.0 {
        CoverStatus::Home
    } else if margin < 0.0 {
        CoverStatus::Away
    } else {
        CoverStatus::Push
    }
}

/// A live game paired with its scoreboard row, when one was found
#[derive(Debug, Clone, Serialize)]
pub struct LiveGameView {
    pub game: LiveGame,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub clock: Option<String>,
    pub covering: Option<CoverStatus>,
}

impl LiveGameView {
    pub fn score_line(&self) -> String {
        match (self.away_score, self.home_score) {
            (Some(away), Some(home)) => format!("{}-{}", away, home),
            _ => "no score".to_string(),
        }
    }

    /// Team currently beating the spread, "push" on the number
    pub fn covering_label(&self) -> &str {
        match self.covering {
            Some(CoverStatus::Home) => self.game.home_team.as_str(),
            Some(CoverStatus::Away) => self.game.away_team.as_str(),
            Some(CoverStatus::Push) => "push",
            None => "-",
        }
    }

    pub fn clock_label(&self) -> &str {
        self.clock.as_deref().unwrap_or("")
    }

    pub fn format(&self) -> String {
        format!(
            "{} @ {} ({:+.1}) | {} {} | Covering: {} | Picks: {} away / {} home",
            self.game.away_team,
            self.game.home_team,
            self.game.spread,
            self.score_line(),
            self.clock_label(),
            self.covering_label(),
            self.game.away_picks,
            self.game.home_picks
        )
    }
}

fn parse_score(raw: &str) -> Option<u32> {
    raw.trim().parse().ok()
}

pub fn find_score<'a>(game: &LiveGame, scores: &'a [GameScore]) -> Option<&'a GameScore> {
    scores.iter().find(|s| {
        teams_match(&game.home_team, &s.home_team) && teams_match(&game.away_team, &s.away_team)
    })
}

pub fn match_scores(games: &[LiveGame], scores: &[GameScore]) -> Vec<LiveGameView> {
    games
        .iter()
        .map(|game| {
            let row = find_score(game, scores);
            let home_score = row.and_then(|r| parse_score(&r.home_score));
            let away_score = row.and_then(|r| parse_score(&r.away_score));
            let covering = home_score
                .zip(away_score)
                .map(|(home, away)| cover_status(game.spread, home, away));
            LiveGameView {
                game: game.clone(),
                home_score,
                away_score,
                clock: row.map(|r| r.time.clone()),
                covering,
            }
        })
        .collect()
}

/// Everything in progress: scored games and tiebreakers still awaiting an answer
#[derive(Debug, Clone, Default, Serialize)]
pub struct LiveView {
    pub games: Vec<LiveGameView>,
    pub tiebreakers: Vec<LiveTiebreaker>,
}

impl LiveView {
    pub fn is_empty(&self) -> bool {
        self.games.is_empty() && self.tiebreakers.is_empty()
    }
}
