use crate::models::{GamePickRow, UserPastPicks, PUSH};
use serde::{Deserialize, Serialize};

/// Result of one resolved (or not yet resolved) pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickGrade {
    Win,
    Loss,
    Push,
    Pending,
}

/// Strip the trailing `" *"` the scoring job appends to some winners
fn clean_winner(winner: &str) -> &str {
    let winner = winner.trim();
    winner.strip_suffix('*').map(str::trim_end).unwrap_or(winner)
}

pub fn grade(picked_team: &str, winning_team: Option<&str>) -> PickGrade {
    let Some(winner) = winning_team.map(clean_winner).filter(|w| !w.is_empty()) else {
        return PickGrade::Pending;
    };

    if winner.eq_ignore_ascii_case(PUSH) {
        PickGrade::Push
    } else if winner == picked_team.trim() {
        PickGrade::Win
    } else {
        PickGrade::Loss
    }
}

pub fn grade_row(row: &GamePickRow) -> Option<PickGrade> {
    let picked = row.picked_team.as_deref()?;
    Some(grade(picked, row.winning_team.as_deref()))
}

/// Season record for one user, derived from their past picks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub username: String,
    pub display_name: String,
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    pub pending: u32,
    pub lock_wins: u32,
    pub lock_losses: u32,
    pub points: f64,
    pub tiebreakers_answered: u32,
    pub average_tiebreaker_diff: Option<f64>,
}

impl UserStats {
    pub fn from_past_picks(past: &UserPastPicks) -> Self {
        let mut stats = UserStats {
            username: past.user.username.clone(),
            display_name: past
                .user
                .full_name
                .clone()
                .unwrap_or_else(|| past.user.username.clone()),
            ..Default::default()
        };

        for row in &past.game_picks {
            let Some(grade) = grade_row(row) else {
                continue;
            };
            let locked = row.lock.unwrap_or(false);
            match grade {
                PickGrade::Win => {
                    stats.wins += 1;
                    if locked {
                        stats.lock_wins += 1;
                    }
                }
                PickGrade::Loss => {
                    stats.losses += 1;
                    if locked {
                        stats.lock_losses += 1;
                    }
                }
                PickGrade::Push => stats.pushes += 1,
                PickGrade::Pending => stats.pending += 1,
            }
            stats.points += row.points_awarded.unwrap_or(0) as f64;
        }

        let answered: Vec<_> = past
            .tiebreaker_picks
            .iter()
            .filter(|t| t.user_answer.is_some())
            .collect();
        stats.tiebreakers_answered = answered.len() as u32;
        let diffs: Vec<f64> = answered.iter().filter_map(|t| t.accuracy_diff).collect();
        if !diffs.is_empty() {
            stats.average_tiebreaker_diff = Some(diffs.iter().sum::<f64>() / diffs.len() as f64);
        }
        stats.points += past
            .tiebreaker_picks
            .iter()
            .filter_map(|t| t.points_awarded)
            .sum::<f64>();

        stats
    }

    /// Share of decided picks won; pushes and pending games do not count
    pub fn win_percentage(&self) -> Option<f64> {
        let decided = self.wins + self.losses;
        (decided > 0).then(|| self.wins as f64 / decided as f64)
    }

    pub fn record(&self) -> String {
        if self.pushes > 0 {
            format!("{}-{}-{}", self.wins, self.losses, self.pushes)
        } else {
            format!("{}-{}", self.wins, self.losses)
        }
    }

    pub fn format(&self) -> String {
        let pct = self
            .win_percentage()
            .map(|p| format!("{:.1}%", p * 100.0))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} ({}) | Record: {} | Win: {} | Locks: {}-{} | Points: {} | Pending: {}",
            self.display_name,
            self.username,
            self.record(),
            pct,
            self.lock_wins,
            self.lock_losses,
            self.points,
            self.pending
        )
    }
}
