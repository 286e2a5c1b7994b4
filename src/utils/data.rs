use crate::models::LeaderboardEntry;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[derive(Serialize)]
struct SessionFileOut<'a> {
    api_url: &'a str,
    access_token: &'a str,
    username: Option<&'a str>,
}

/// A credential saved by the CLI between runs
#[derive(Debug, Deserialize)]
pub struct StoredSession {
    pub api_url: String,
    pub access_token: SecretString,
    #[serde(default)]
    pub username: Option<String>,
}

/// Save the bearer token for the given backend to a JSON session file
///
/// On Unix the file is readable by its owner only.
pub fn save_session(
    path: &Path,
    api_url: &str,
    token: &SecretString,
    username: Option<&str>,
) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).context("Failed to create session directory")?;
    }
    let out = SessionFileOut {
        api_url,
        access_token: token.expose_secret(),
        username,
    };
    let json = serde_json::to_string_pretty(&out).context("Failed to serialize session")?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).context("Failed to open session file")?;
    // The creation mode does not apply to a file that already existed
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .context("Failed to restrict session file permissions")?;
    }
    file.write_all(json.as_bytes())
        .context("Failed to write session file")?;
    Ok(())
}

/// Load a saved session; a missing file or one for another backend yields `None`
pub fn load_session(path: &Path, api_url: &str) -> Result<Option<StoredSession>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path).context("Failed to read session file")?;
    let stored: StoredSession =
        serde_json::from_str(&json).context("Failed to deserialize session file")?;
    if stored.api_url.trim_end_matches('/') != api_url.trim_end_matches('/') {
        return Ok(None);
    }
    Ok(Some(stored))
}

pub fn remove_session(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path).context("Failed to remove session file")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct LeaderboardRow<'a> {
    rank: usize,
    username: &'a str,
    name: &'a str,
    total_points: f64,
    correct_locks: i64,
    first_tiebreaker_diff: Option<f64>,
    second_tiebreaker_diff: Option<f64>,
    third_tiebreaker_diff: Option<f64>,
}

/// Save the standings to CSV in the order the backend ranked them
pub fn save_leaderboard_to_csv(entries: &[LeaderboardEntry], filename: &Path) -> Result<()> {
    if let Some(dir) = filename.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).context("Failed to create CSV directory")?;
    }
    let mut writer = csv::Writer::from_path(filename).context("Failed to create CSV file")?;

    for (i, entry) in entries.iter().enumerate() {
        writer
            .serialize(LeaderboardRow {
                rank: i + 1,
                username: &entry.username,
                name: entry.full_name.as_deref().unwrap_or(&entry.username),
                total_points: entry.total_points,
                correct_locks: entry.correct_locks,
                first_tiebreaker_diff: entry.first_tiebreaker_diff,
                second_tiebreaker_diff: entry.second_tiebreaker_diff,
                third_tiebreaker_diff: entry.third_tiebreaker_diff,
            })
            .context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush CSV file")?;
    Ok(())
}
