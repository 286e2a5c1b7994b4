pub mod admin;
pub mod api;
pub mod catalog;
pub mod config;
pub mod editor;
pub mod models;
pub mod reconciler;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::*;
pub use models::*;
pub use utils::*;

use anyhow::{Context, Result};
use catalog::{Catalog, CatalogLoader};
use futures::future::try_join3;
use utils::live_scores::{match_scores, LiveView};

/// Load the catalog for the signed-in user and wrap it in a fresh editor
pub async fn open_pick_editor(
    api: &PickemApiClient,
    session: &mut session::Session,
) -> std::result::Result<editor::PickEditor, catalog::LoadError> {
    let catalog: Catalog = CatalogLoader::new(api).load(session).await?;
    Ok(editor::PickEditor::new(catalog))
}

/// Started, unresolved games joined with the public scoreboard, plus open tiebreakers
pub async fn fetch_live_view(api: &PickemApiClient) -> Result<LiveView> {
    let (games, scores, tiebreakers) = try_join3(
        api.fetch_live_games(),
        api.fetch_game_scores(),
        api.fetch_live_tiebreakers(),
    )
    .await
    .context("Failed to fetch live games")?;
    Ok(LiveView {
        games: match_scores(&games, &scores),
        tiebreakers,
    })
}
