use crate::api::error::ApiError;
use crate::api::pickem_api::PickemApiClient;
use crate::models::User;
use secrecy::SecretString;
use std::fmt;
use tracing::{info, warn};

type InvalidateHook = Box<dyn Fn() + Send + Sync>;

/// Credential and identity for one signed-in user
///
/// Passed explicitly to every component that talks to protected endpoints.
/// Invalidation drops the token and runs the registered hook, which is where a
/// front end removes any stored copy of the credential.
pub struct Session {
    token: Option<SecretString>,
    user: Option<User>,
    on_invalidate: Option<InvalidateHook>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            token: None,
            user: None,
            on_invalidate: None,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::new(token.into().into_boxed_str())),
            user: None,
            on_invalidate: None,
        }
    }

    /// Register a callback run whenever the credential is discarded
    pub fn on_invalidate(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_invalidate = Some(Box::new(hook));
        self
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.admin)
    }

    /// Replace the credential after a fresh login
    pub fn sign_in(&mut self, token: impl Into<String>) {
        self.token = Some(SecretString::new(token.into().into_boxed_str()));
        self.user = None;
    }

    pub fn set_user(&mut self, user: User) {
        self.user = Some(user);
    }

    /// Discard the credential because the server no longer accepts it
    pub fn invalidate(&mut self) {
        if self.token.is_some() {
            warn!("session invalidated, credential discarded");
        }
        self.clear();
    }

    /// Explicit sign-out
    pub fn logout(&mut self) {
        info!("signed out");
        self.clear();
    }

    fn clear(&mut self) {
        self.token = None;
        self.user = None;
        if let Some(hook) = &self.on_invalidate {
            hook();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.token.is_some())
            .field("user", &self.user)
            .finish()
    }
}

/// Privilege a view needs before it may render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeRequirement {
    Member,
    Admin,
}

/// What a protected view should do after the guard ran
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    Render(User),
    RedirectLogin,
    RedirectHome,
}

impl GuardOutcome {
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            GuardOutcome::Render(_) => None,
            GuardOutcome::RedirectLogin => Some("/login"),
            GuardOutcome::RedirectHome => Some("/"),
        }
    }
}

/// Gates protected views on a valid credential and sufficient privilege
pub struct SessionGuard<'a> {
    api: &'a PickemApiClient,
}

impl<'a> SessionGuard<'a> {
    pub fn new(api: &'a PickemApiClient) -> Self {
        Self { api }
    }

    pub async fn check(
        &self,
        session: &mut Session,
        requirement: PrivilegeRequirement,
    ) -> GuardOutcome {
        let Some(token) = session.token() else {
            return GuardOutcome::RedirectLogin;
        };

        let identity = self.api.current_user(token).await;
        match identity {
            Ok(user) => {
                let allowed = match requirement {
                    PrivilegeRequirement::Member => true,
                    PrivilegeRequirement::Admin => user.admin,
                };
                session.set_user(user.clone());
                if allowed {
                    GuardOutcome::Render(user)
                } else {
                    info!(username = %user.username, "admin view refused");
                    GuardOutcome::RedirectHome
                }
            }
            Err(ApiError::Forbidden(detail)) => {
                info!(%detail, "identity check forbidden");
                GuardOutcome::RedirectHome
            }
            Err(err) => {
                // Expired, malformed, revoked and unreachable all mean signing in again
                warn!(error = %err, "identity check failed");
                session.invalidate();
                GuardOutcome::RedirectLogin
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBackend, TOKEN};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_no_token_redirects_without_network() {
        let backend = FakeBackend::start().await;
        let api = PickemApiClient::new(backend.url());
        let mut session = Session::anonymous();

        let outcome = SessionGuard::new(&api)
            .check(&mut session, PrivilegeRequirement::Member)
            .await;

        assert_eq!(outcome, GuardOutcome::RedirectLogin);
        assert_eq!(outcome.redirect_path(), Some("/login"));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_valid_member_renders() {
        let backend = FakeBackend::start().await;
        let api = PickemApiClient::new(backend.url());
        let mut session = Session::with_token(TOKEN);

        let outcome = SessionGuard::new(&api)
            .check(&mut session, PrivilegeRequirement::Member)
            .await;

        match outcome {
            GuardOutcome::Render(user) => assert_eq!(user.username, "bettor"),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(session.user().is_some());
        assert!(!session.is_admin());
    }

    #[tokio::test]
    async fn test_member_refused_admin_view_keeps_token() {
        let backend = FakeBackend::start().await;
        let api = PickemApiClient::new(backend.url());
        let mut session = Session::with_token(TOKEN);

        let outcome = SessionGuard::new(&api)
            .check(&mut session, PrivilegeRequirement::Admin)
            .await;

        assert_eq!(outcome, GuardOutcome::RedirectHome);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_admin_renders_admin_view() {
        let backend = FakeBackend::start().await;
        backend.update(|state| state.user.admin = true);
        let api = PickemApiClient::new(backend.url());
        let mut session = Session::with_token(TOKEN);

        let outcome = SessionGuard::new(&api)
            .check(&mut session, PrivilegeRequirement::Admin)
            .await;

        assert!(matches!(outcome, GuardOutcome::Render(_)));
        assert!(session.is_admin());
    }

    #[tokio::test]
    async fn test_rejected_token_is_discarded() {
        let backend = FakeBackend::start().await;
        let api = PickemApiClient::new(backend.url());
        let cleared = Arc::new(AtomicUsize::new(0));
        let hook_count = cleared.clone();
        let mut session = Session::with_token("revoked").on_invalidate(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = SessionGuard::new(&api)
            .check(&mut session, PrivilegeRequirement::Member)
            .await;

        assert_eq!(outcome, GuardOutcome::RedirectLogin);
        assert!(!session.is_authenticated());
        assert_eq!(cleared.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_backend_forces_login() {
        let api = PickemApiClient::new("http://127.0.0.1:1");
        let mut session = Session::with_token(TOKEN);

        let outcome = SessionGuard::new(&api)
            .check(&mut session, PrivilegeRequirement::Member)
            .await;

        assert_eq!(outcome, GuardOutcome::RedirectLogin);
        assert!(session.token().is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let session = Session::with_token("very-secret");
        let printed = format!("{:?}", session);
        assert!(!printed.contains("very-secret"));
    }
}
