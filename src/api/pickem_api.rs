use crate::api::error::ApiError;
use crate::models::{
    AdminGrant, Game, GameId, GamePickEntry, GamePickRow, GameScore, GameUpdate,
    LeaderboardEntry, LiveGame, LiveTiebreaker, NewGame, NewTiebreaker, NewUser, PickSubmission,
    SubmitPickResponse, Tiebreaker, TiebreakerId, TiebreakerPickEntry, TiebreakerPickRecord,
    TiebreakerPickRow, TiebreakerPickSubmission,
    TiebreakerPointsUpdate, TiebreakerUpdate, TokenResponse, User, UserPastPicks,
    UserPicksStatus, WeekOption, WeeksResponse,
};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Typed client for the pick'em REST backend
///
/// Every protected call takes the bearer token explicitly; the client itself
/// holds no session state.
#[derive(Debug, Clone)]
pub struct PickemApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl PickemApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&SecretString>) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "pickem request");
        let builder = self.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&SecretString>,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self
            .request(Method::GET, path, token)
            .query(query)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: &SecretString,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .request(method, path, Some(token))
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    /// Exchange credentials for a bearer token
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let response = self
            .request(Method::POST, "/token", None)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn register(&self, user: &NewUser) -> Result<User, ApiError> {
        let response = self
            .request(Method::POST, "/register", None)
            .json(user)
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn current_user(&self, token: &SecretString) -> Result<User, ApiError> {
        self.get("/users/me", Some(token), &[]).await
    }

    /// Games that have not started yet
    pub async fn fetch_games(&self, token: &SecretString) -> Result<Vec<Game>, ApiError> {
        self.get("/games", Some(token), &[]).await
    }

    /// Every game, newest first (admin only)
    pub async fn fetch_all_games(&self, token: &SecretString) -> Result<Vec<Game>, ApiError> {
        self.get("/games", Some(token), &[("all_games", "true")])
            .await
    }

    pub async fn fetch_my_picks(&self, token: &SecretString) -> Result<Vec<GamePickRow>, ApiError> {
        self.get("/my_picks", Some(token), &[]).await
    }

    pub async fn fetch_tiebreakers(&self, token: &SecretString) -> Result<Vec<Tiebreaker>, ApiError> {
        self.get("/tiebreakers", Some(token), &[]).await
    }

    pub async fn fetch_my_tiebreaker_picks(
        &self,
        token: &SecretString,
    ) -> Result<Vec<TiebreakerPickRow>, ApiError> {
        self.get("/my_tiebreaker_picks", Some(token), &[]).await
    }

    pub async fn submit_pick(
        &self,
        token: &SecretString,
        pick: &PickSubmission,
    ) -> Result<SubmitPickResponse, ApiError> {
        self.send(Method::POST, "/submit_pick", token, pick).await
    }

    pub async fn submit_tiebreaker_pick(
        &self,
        token: &SecretString,
        pick: &TiebreakerPickSubmission,
    ) -> Result<TiebreakerPickRecord, ApiError> {
        self.send(Method::POST, "/tiebreaker_picks", token, pick)
            .await
    }

    pub async fn fetch_leaderboard(&self, filter: &str) -> Result<Vec<LeaderboardEntry>, ApiError> {
        self.get("/leaderboard", None, &[("filter", filter)]).await
    }

    pub async fn fetch_leaderboard_weeks(&self) -> Result<Vec<WeekOption>, ApiError> {
        let response: WeeksResponse = self.get("/leaderboard/weeks", None, &[]).await?;
        Ok(response.weeks)
    }

    pub async fn fetch_user_past_picks(
        &self,
        username: &str,
        filter: &str,
    ) -> Result<UserPastPicks, ApiError> {
        let path = format!("/user_all_past_picks/{}", username);
        self.get(&path, None, &[("filter", filter)]).await
    }

    pub async fn fetch_live_games(&self) -> Result<Vec<LiveGame>, ApiError> {
        self.get("/live_games", None, &[]).await
    }

    pub async fn fetch_game_picks(&self, game_id: GameId) -> Result<Vec<GamePickEntry>, ApiError> {
        let path = format!("/live_games/{}/picks", game_id);
        self.get(&path, None, &[]).await
    }

    pub async fn fetch_live_tiebreakers(&self) -> Result<Vec<LiveTiebreaker>, ApiError> {
        self.get("/live_tiebreakers", None, &[]).await
    }

    pub async fn fetch_tiebreaker_answers(
        &self,
        tiebreaker_id: TiebreakerId,
    ) -> Result<Vec<TiebreakerPickEntry>, ApiError> {
        let path = format!("/live_tiebreakers/{}/picks", tiebreaker_id);
        self.get(&path, None, &[]).await
    }

    pub async fn fetch_game_scores(&self) -> Result<Vec<GameScore>, ApiError> {
        self.get("/api/gamescores", None, &[]).await
    }

    pub async fn create_game(&self, token: &SecretString, game: &NewGame) -> Result<Game, ApiError> {
        self.send(Method::POST, "/games", token, game).await
    }

    pub async fn update_game(
        &self,
        token: &SecretString,
        game_id: GameId,
        update: &GameUpdate,
    ) -> Result<Game, ApiError> {
        let path = format!("/games/{}", game_id);
        self.send(Method::PUT, &path, token, update).await
    }

    pub async fn delete_game(&self, token: &SecretString, game_id: GameId) -> Result<(), ApiError> {
        let path = format!("/games/{}", game_id);
        let response = self
            .request(Method::DELETE, &path, Some(token))
            .send()
            .await?;
        let _: serde_json::Value = Self::read_json(response).await?;
        Ok(())
    }

    pub async fn create_tiebreaker(
        &self,
        token: &SecretString,
        tiebreaker: &NewTiebreaker,
    ) -> Result<Tiebreaker, ApiError> {
        self.send(Method::POST, "/tiebreakers", token, tiebreaker)
            .await
    }

    pub async fn update_tiebreaker(
        &self,
        token: &SecretString,
        tiebreaker_id: TiebreakerId,
        update: &TiebreakerUpdate,
    ) -> Result<Tiebreaker, ApiError> {
        let path = format!("/tiebreakers/{}", tiebreaker_id);
        self.send(Method::PUT, &path, token, update).await
    }

    pub async fn delete_tiebreaker(
        &self,
        token: &SecretString,
        tiebreaker_id: TiebreakerId,
    ) -> Result<(), ApiError> {
        let path = format!("/tiebreakers/{}", tiebreaker_id);
        let response = self
            .request(Method::DELETE, &path, Some(token))
            .send()
            .await?;
        let _: serde_json::Value = Self::read_json(response).await?;
        Ok(())
    }

    pub async fn update_tiebreaker_points(
        &self,
        token: &SecretString,
        update: &TiebreakerPointsUpdate,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .send(Method::PUT, "/tiebreaker_picks/points", token, update)
            .await?;
        Ok(())
    }

    /// Every pick of one user regardless of start time
    pub async fn fetch_user_all_picks(
        &self,
        token: &SecretString,
        username: &str,
    ) -> Result<UserPastPicks, ApiError> {
        let path = format!("/admin/user_all_picks/{}", username);
        self.get(&path, Some(token), &[]).await
    }

    pub async fn make_admin(&self, token: &SecretString, username: &str) -> Result<AdminGrant, ApiError> {
        let path = format!("/make_admin/{}", username);
        let response = self
            .request(Method::POST, &path, Some(token))
            .send()
            .await?;
        Self::read_json(response).await
    }

    pub async fn delete_user(&self, token: &SecretString, user_id: i64) -> Result<(), ApiError> {
        let path = format!("/admin/delete_user/{}", user_id);
        let response = self
            .request(Method::DELETE, &path, Some(token))
            .send()
            .await?;
        let _: serde_json::Value = Self::read_json(response).await?;
        Ok(())
    }

    pub async fn fetch_user_picks_status(
        &self,
        token: &SecretString,
    ) -> Result<Vec<UserPicksStatus>, ApiError> {
        self.get("/admin/user_picks_status", Some(token), &[]).await
    }
}
