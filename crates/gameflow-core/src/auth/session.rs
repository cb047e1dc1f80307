use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthGateway, AuthPayload, RefreshPayload, VerifyPayload};
use crate::models::{AuthToken, Credentials, RegisterProfile, SocialAuth, User};
use crate::store::{CredentialStore, KeyValueMedium, StorageError};

use super::SessionError;

/// Externally observed session status.
///
/// `Loading` is transient: every operation that enters it leaves it for one
/// of the other two before returning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(tag = "status", content = "user", rename_all = "lowercase")]
pub enum SessionState {
    Loading,
    Authenticated(User),
    Unauthenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Unauthenticated => "unauthenticated",
        }
    }
}

/// Result of a sign-in style operation.
///
/// `warning` is set when the operation succeeded but a follow-up step
/// (persisting credentials) did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AuthOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            warning: None,
        }
    }
}

/// Owns the session state machine.
///
/// Operations take `&mut self`, so a single owner serializes them; observers
/// that cannot hold the manager follow transitions through [`subscribe`].
///
/// [`subscribe`]: SessionManager::subscribe
pub struct SessionManager<G, M> {
    gateway: G,
    store: CredentialStore<M>,
    state: SessionState,
    token: Option<AuthToken>,
    state_tx: watch::Sender<SessionState>,
}

impl<G: AuthGateway, M: KeyValueMedium> SessionManager<G, M> {
    pub fn new(gateway: G, store: CredentialStore<M>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Loading);
        Self {
            gateway,
            store,
            state: SessionState::Loading,
            token: None,
            state_tx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.state.user()
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn store(&self) -> &CredentialStore<M> {
        &self.store
    }

    /// Try to resume the previous session on launch.
    ///
    /// A non-expired token is verified with the server; an expired one is
    /// refreshed. Any failure, including storage and network faults, ends in
    /// `Unauthenticated` with credentials cleared. Never propagates an error.
    pub async fn restore_session(&mut self) -> bool {
        self.transition(SessionState::Loading);

        let Some(token) = self.store.token() else {
            debug!("No stored token");
            self.token = None;
            self.transition(SessionState::Unauthenticated);
            return false;
        };

        if token.is_expired() {
            self.restore_by_refresh(token).await
        } else {
            self.restore_by_verify(token).await
        }
    }

    async fn restore_by_verify(&mut self, token: AuthToken) -> bool {
        let user = match self.gateway.verify(&token.access_token).await {
            Ok(VerifyPayload { valid: true, user }) => user.or_else(|| self.store.user()),
            Ok(VerifyPayload { valid: false, .. }) => {
                info!("Stored token rejected by server");
                None
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "Token verification failed");
                None
            }
        };

        match user {
            Some(user) => {
                if let Err(e) = self.store.save_user(&user) {
                    warn!(error = %e, "Failed to save verified user");
                }
                info!(user_id = %user.id, "Session restored");
                self.authenticate(token, user);
                true
            }
            None => {
                self.invalidate();
                false
            }
        }
    }

    async fn restore_by_refresh(&mut self, stale: AuthToken) -> bool {
        debug!(expired_at = %stale.expires_at, "Stored token expired, refreshing");
        let RefreshPayload { token, user } = match self.gateway.refresh(&stale.refresh_token).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, code = e.code(), "Token refresh failed");
                self.invalidate();
                return false;
            }
        };

        if let Err(e) = self.store.save_token(&token) {
            warn!(error = %e, "Failed to save refreshed token");
        }

        let user = match user {
            Some(user) => {
                if let Err(e) = self.store.save_user(&user) {
                    warn!(error = %e, "Failed to save refreshed user");
                }
                Some(user)
            }
            None => self.store.user(),
        };

        match user {
            Some(user) => {
                info!(user_id = %user.id, "Session restored with refreshed token");
                self.authenticate(token, user);
                true
            }
            None => {
                warn!("Token refreshed but no user record is available");
                self.invalidate();
                false
            }
        }
    }

    /// Sign in with email and password.
    pub async fn login(&mut self, credentials: &Credentials) -> AuthOutcome {
        self.transition(SessionState::Loading);
        let result = self.gateway.login(credentials).await;
        self.complete_sign_in("Login", result)
    }

    /// Create an account and sign in to it.
    pub async fn register(&mut self, profile: &RegisterProfile) -> AuthOutcome {
        self.transition(SessionState::Loading);
        let result = self.gateway.register(profile).await;
        self.complete_sign_in("Registration", result)
    }

    /// Sign in with a token issued by an external identity provider.
    pub async fn social_login(&mut self, provider: &SocialAuth) -> AuthOutcome {
        self.transition(SessionState::Loading);
        let result = self.gateway.social_login(provider).await;
        self.complete_sign_in("Social login", result)
    }

    fn complete_sign_in(&mut self, action: &str, result: Result<AuthPayload, ApiError>) -> AuthOutcome {
        match result {
            Ok(AuthPayload { token, user }) => {
                // Persisted before the state flips so a restore right after finds them.
                let warning = self.persist(&token, &user).err().map(|e| {
                    warn!(error = %e, "{} succeeded but credentials were not saved", action);
                    format!("Signed in, but credentials could not be saved: {}", e)
                });
                info!(user_id = %user.id, "{} succeeded", action);
                self.authenticate(token, user);
                AuthOutcome {
                    success: true,
                    error: None,
                    warning,
                }
            }
            Err(e) => {
                warn!(error = %e, code = e.code(), "{} failed", action);
                self.token = None;
                self.transition(SessionState::Unauthenticated);
                AuthOutcome::failed(e.user_message())
            }
        }
    }

    fn persist(&self, token: &AuthToken, user: &User) -> Result<(), StorageError> {
        self.store.save_token(token)?;
        self.store.save_user(user)
    }

    /// Sign out. The server call is best effort; local credentials are
    /// always cleared and the session always ends `Unauthenticated`.
    pub async fn logout(&mut self) {
        let access_token = self
            .token
            .as_ref()
            .map(|t| t.access_token.clone())
            .or_else(|| self.store.token().map(|t| t.access_token));

        if let Some(access_token) = access_token {
            if let Err(e) = self.gateway.logout(&access_token).await {
                debug!(error = %e, "Server logout failed, clearing local session anyway");
            }
        }

        self.invalidate();
        info!("Logged out");
    }

    /// Replace the signed-in user in place. No I/O; callers that need the
    /// change to survive a restart save it through [`store`](Self::store).
    /// Returns false (and changes nothing) outside an authenticated session.
    pub fn update_user(&mut self, user: User) -> bool {
        match &mut self.state {
            SessionState::Authenticated(current) => *current = user,
            _ => {
                debug!("Ignoring user update outside an authenticated session");
                return false;
            }
        }
        self.state_tx.send_replace(self.state.clone());
        true
    }

    /// Access token for a privileged call, refreshed first when it is inside
    /// the expiry buffer.
    ///
    /// A refresh the server refuses ends the session. A refresh that fails
    /// in transit is returned as an error and leaves everything in place.
    pub async fn access_token(&mut self) -> Result<String, SessionError> {
        let token = match (&self.state, &self.token) {
            (SessionState::Authenticated(_), Some(token)) => token.clone(),
            _ => return Err(SessionError::NotAuthenticated),
        };

        if !token.is_expired() {
            return Ok(token.access_token);
        }

        debug!("Access token inside expiry buffer, refreshing");
        match self.gateway.refresh(&token.refresh_token).await {
            Ok(RefreshPayload { token, user }) => {
                if let Err(e) = self.store.save_token(&token) {
                    warn!(error = %e, "Failed to save refreshed token");
                }
                if let Some(user) = user {
                    if let Err(e) = self.store.save_user(&user) {
                        warn!(error = %e, "Failed to save refreshed user");
                    }
                    self.update_user(user);
                }
                let access_token = token.access_token.clone();
                self.token = Some(token);
                Ok(access_token)
            }
            Err(e) if e.is_rejection() => {
                info!(code = e.code(), "Refresh rejected, ending session");
                self.invalidate();
                Err(SessionError::Expired(e))
            }
            Err(e) => {
                warn!(error = %e, "Refresh failed in transit");
                Err(SessionError::Api(e))
            }
        }
    }

    fn authenticate(&mut self, token: AuthToken, user: User) {
        self.token = Some(token);
        self.transition(SessionState::Authenticated(user));
    }

    /// Discard token and user from memory and the store.
    fn invalidate(&mut self) {
        self.token = None;
        if let Err(e) = self.store.clear_credentials() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        self.transition(SessionState::Unauthenticated);
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = self.state.label(), to = next.label(), "Session transition");
        self.state = next.clone();
        self.state_tx.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, Utc};

    use crate::api::ErrorBody;
    use crate::models::SocialProvider;
    use crate::store::{MemoryMedium, RecordKind};

    #[derive(Default)]
    struct FakeGateway {
        sign_in: Option<Result<AuthPayload, ApiError>>,
        verify: Option<Result<VerifyPayload, ApiError>>,
        refresh: Option<Result<RefreshPayload, ApiError>>,
        logout: Option<Result<(), ApiError>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeGateway {
        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn scripted<T: Clone>(slot: &Option<Result<T, ApiError>>, call: &str) -> Result<T, ApiError> {
            slot.clone().unwrap_or_else(|| panic!("unexpected {} call", call))
        }
    }

    impl AuthGateway for FakeGateway {
        async fn login(&self, _credentials: &Credentials) -> Result<AuthPayload, ApiError> {
            self.record("login");
            Self::scripted(&self.sign_in, "login")
        }

        async fn register(&self, _profile: &RegisterProfile) -> Result<AuthPayload, ApiError> {
            self.record("register");
            Self::scripted(&self.sign_in, "register")
        }

        async fn social_login(&self, _provider: &SocialAuth) -> Result<AuthPayload, ApiError> {
            self.record("social_login");
            Self::scripted(&self.sign_in, "social_login")
        }

        async fn verify(&self, _access_token: &str) -> Result<VerifyPayload, ApiError> {
            self.record("verify");
            Self::scripted(&self.verify, "verify")
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshPayload, ApiError> {
            self.record("refresh");
            Self::scripted(&self.refresh, "refresh")
        }

        async fn logout(&self, _access_token: &str) -> Result<(), ApiError> {
            self.record("logout");
            self.logout.clone().unwrap_or(Ok(()))
        }
    }

    struct BrokenMedium;

    impl KeyValueMedium for BrokenMedium {
        fn read(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("read-only filesystem".to_string()))
        }
        fn write(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only filesystem".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("read-only filesystem".to_string()))
        }
    }

    fn token(access: &str, expires_in: Duration) -> AuthToken {
        AuthToken {
            access_token: access.to_string(),
            refresh_token: format!("{}-refresh", access),
            expires_at: Utc::now() + expires_in,
            user_id: "u1".to_string(),
        }
    }

    fn user(name: &str) -> User {
        User {
            id: "u1".to_string(),
            username: name.to_string(),
            email: format!("{}@example.com", name),
            avatar_url: None,
            created_at: Utc::now() - Duration::days(90),
            last_login_at: Utc::now(),
        }
    }

    fn rejected(code: &str, message: &str) -> ApiError {
        ApiError::Rejected(ErrorBody::new(code, message))
    }

    fn manager(
        gateway: FakeGateway,
    ) -> (SessionManager<Arc<FakeGateway>, Arc<MemoryMedium>>, Arc<FakeGateway>, Arc<MemoryMedium>) {
        let gateway = Arc::new(gateway);
        let medium = Arc::new(MemoryMedium::new());
        let manager = SessionManager::new(gateway.clone(), CredentialStore::new(medium.clone()));
        (manager, gateway, medium)
    }

    fn seed(medium: &MemoryMedium, token: Option<&AuthToken>, user: Option<&User>) {
        if let Some(token) = token {
            medium
                .write(RecordKind::Token.key(), &serde_json::to_string(token).unwrap())
                .unwrap();
        }
        if let Some(user) = user {
            medium
                .write(RecordKind::User.key(), &serde_json::to_string(user).unwrap())
                .unwrap();
        }
    }

    // ===== restore_session =====

    #[test]
    fn test_initial_state_is_loading() {
        let (manager, _, _) = manager(FakeGateway::default());
        assert!(manager.is_loading());
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_without_token_is_unauthenticated() {
        let (mut manager, gateway, _) = manager(FakeGateway::default());

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restore_valid_token_verified() {
        let (mut manager, gateway, medium) = manager(FakeGateway {
            verify: Some(Ok(VerifyPayload {
                valid: true,
                user: Some(user("anduin")),
            })),
            ..Default::default()
        });
        let stored = token("a1", Duration::milliseconds(1_000_000));
        seed(&medium, Some(&stored), None);

        assert!(manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Authenticated(user("anduin")));
        assert_eq!(gateway.calls(), vec!["verify"]);
        assert_eq!(manager.access_token().await.unwrap(), "a1");
    }

    #[tokio::test]
    async fn test_restore_verify_reports_invalid_clears_store() {
        let (mut manager, _, medium) = manager(FakeGateway {
            verify: Some(Ok(VerifyPayload {
                valid: false,
                user: None,
            })),
            ..Default::default()
        });
        seed(&medium, Some(&token("a1", Duration::hours(1))), Some(&user("anduin")));

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_restore_verify_failure_clears_store_without_refreshing() {
        let (mut manager, gateway, medium) = manager(FakeGateway {
            verify: Some(Err(ApiError::Network("connection reset".to_string()))),
            ..Default::default()
        });
        seed(&medium, Some(&token("a1", Duration::hours(1))), Some(&user("anduin")));

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(medium.is_empty());
        assert_eq!(gateway.calls(), vec!["verify"]);
    }

    #[tokio::test]
    async fn test_restore_verify_without_user_falls_back_to_stored_user() {
        let (mut manager, _, medium) = manager(FakeGateway {
            verify: Some(Ok(VerifyPayload {
                valid: true,
                user: None,
            })),
            ..Default::default()
        });
        seed(&medium, Some(&token("a1", Duration::hours(1))), Some(&user("tyrande")));

        assert!(manager.restore_session().await);
        assert_eq!(manager.current_user().map(|u| u.username.as_str()), Some("tyrande"));
    }

    #[tokio::test]
    async fn test_restore_verify_without_any_user_is_unauthenticated() {
        let (mut manager, gateway, medium) = manager(FakeGateway {
            verify: Some(Ok(VerifyPayload {
                valid: true,
                user: None,
            })),
            ..Default::default()
        });
        seed(&medium, Some(&token("a1", Duration::hours(1))), None);

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert_eq!(gateway.calls(), vec!["verify"]);
        assert!(manager.store().token().is_none());
    }

    #[tokio::test]
    async fn test_restore_expired_token_refreshed() {
        let fresh = token("a2", Duration::hours(1));
        let (mut manager, gateway, medium) = manager(FakeGateway {
            refresh: Some(Ok(RefreshPayload {
                token: fresh.clone(),
                user: None,
            })),
            ..Default::default()
        });
        seed(
            &medium,
            Some(&token("a1", Duration::milliseconds(-1))),
            Some(&user("varian")),
        );

        assert!(manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Authenticated(user("varian")));
        assert_eq!(gateway.calls(), vec!["refresh"]);
        assert_eq!(manager.store().token(), Some(fresh));
    }

    #[tokio::test]
    async fn test_restore_token_inside_buffer_is_refreshed() {
        let (mut manager, gateway, medium) = manager(FakeGateway {
            refresh: Some(Ok(RefreshPayload {
                token: token("a2", Duration::hours(1)),
                user: Some(user("malfurion")),
            })),
            ..Default::default()
        });
        seed(&medium, Some(&token("a1", Duration::minutes(2))), None);

        assert!(manager.restore_session().await);
        assert_eq!(gateway.calls(), vec!["refresh"]);
        assert_eq!(manager.store().user().map(|u| u.username), Some("malfurion".to_string()));
    }

    #[tokio::test]
    async fn test_restore_expired_token_refresh_rejected() {
        let (mut manager, _, medium) = manager(FakeGateway {
            refresh: Some(Err(rejected("INVALID_REFRESH_TOKEN", "Refresh token expired"))),
            ..Default::default()
        });
        seed(
            &medium,
            Some(&token("a1", Duration::milliseconds(-1))),
            Some(&user("varian")),
        );

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_restore_refresh_without_any_user_is_unauthenticated() {
        let (mut manager, _, medium) = manager(FakeGateway {
            refresh: Some(Ok(RefreshPayload {
                token: token("a2", Duration::hours(1)),
                user: None,
            })),
            ..Default::default()
        });
        seed(&medium, Some(&token("a1", Duration::minutes(-10))), None);

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(manager.store().token().is_none());
    }

    #[tokio::test]
    async fn test_restore_token_at_minimum_timestamp_resolves() {
        let (mut manager, gateway, medium) = manager(FakeGateway {
            refresh: Some(Err(rejected("INVALID_REFRESH_TOKEN", "Refresh token expired"))),
            ..Default::default()
        });
        let ancient = AuthToken {
            expires_at: DateTime::<Utc>::MIN_UTC,
            ..token("a1", Duration::zero())
        };
        seed(&medium, Some(&ancient), Some(&user("varian")));

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert_eq!(gateway.calls(), vec!["refresh"]);
    }

    #[tokio::test]
    async fn test_restore_corrupt_token_is_unauthenticated() {
        let (mut manager, gateway, medium) = manager(FakeGateway::default());
        medium.write(RecordKind::Token.key(), "{\"accessToken\":").unwrap();

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_restore_with_broken_storage_does_not_propagate() {
        let mut manager = SessionManager::new(FakeGateway::default(), CredentialStore::new(BrokenMedium));

        assert!(!manager.restore_session().await);
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
    }

    // ===== login / register / social_login =====

    #[tokio::test]
    async fn test_login_persists_before_resolving() {
        let issued = token("a1", Duration::hours(1));
        let (mut manager, _, medium) = manager(FakeGateway {
            sign_in: Some(Ok(AuthPayload {
                token: issued.clone(),
                user: user("jaina"),
            })),
            ..Default::default()
        });

        let outcome = manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;
        assert_eq!(outcome, AuthOutcome::succeeded());
        assert_eq!(manager.state(), &SessionState::Authenticated(user("jaina")));

        // A second manager over the same medium restores immediately.
        let verifier = FakeGateway {
            verify: Some(Ok(VerifyPayload {
                valid: true,
                user: Some(user("jaina")),
            })),
            ..Default::default()
        };
        let mut relaunched = SessionManager::new(verifier, CredentialStore::new(medium.clone()));
        assert!(relaunched.restore_session().await);
        assert_eq!(relaunched.store().token(), Some(issued));
    }

    #[tokio::test]
    async fn test_login_rejection_surfaces_server_message() {
        let (mut manager, _, medium) = manager(FakeGateway {
            sign_in: Some(Err(rejected("INVALID_CREDENTIALS", "Email or password is incorrect"))),
            ..Default::default()
        });

        let outcome = manager.login(&Credentials::new("jaina@example.com", "wrong")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Email or password is incorrect"));
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_login_network_failure_uses_generic_message() {
        let (mut manager, _, _) = manager(FakeGateway {
            sign_in: Some(Err(ApiError::Timeout)),
            ..Default::default()
        });

        let outcome = manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Connection timed out. Please try again."));
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_with_failing_storage_still_authenticates() {
        let gateway = FakeGateway {
            sign_in: Some(Ok(AuthPayload {
                token: token("a1", Duration::hours(1)),
                user: user("jaina"),
            })),
            ..Default::default()
        };
        let mut manager = SessionManager::new(gateway, CredentialStore::new(BrokenMedium));

        let outcome = manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;
        assert!(outcome.success);
        assert!(outcome.warning.is_some());
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_register_and_social_login_use_their_endpoints() {
        let (mut manager, gateway, _) = manager(FakeGateway {
            sign_in: Some(Ok(AuthPayload {
                token: token("a1", Duration::hours(1)),
                user: user("thrall"),
            })),
            ..Default::default()
        });

        let profile = RegisterProfile {
            username: "thrall".to_string(),
            email: "thrall@example.com".to_string(),
            password: "Doomhammer1".to_string(),
        };
        assert!(manager.register(&profile).await.success);

        let social = SocialAuth {
            provider: SocialProvider::Discord,
            token: "discord-token".to_string(),
        };
        assert!(manager.social_login(&social).await.success);

        assert_eq!(gateway.calls(), vec!["register", "social_login"]);
        assert!(manager.is_authenticated());
    }

    // ===== logout =====

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let (mut manager, gateway, medium) = manager(FakeGateway {
            sign_in: Some(Ok(AuthPayload {
                token: token("a1", Duration::hours(1)),
                user: user("jaina"),
            })),
            logout: Some(Err(ApiError::Timeout)),
            ..Default::default()
        });
        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        manager.logout().await;

        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(medium.is_empty());
        assert_eq!(gateway.calls(), vec!["login", "logout"]);
        assert!(matches!(
            manager.access_token().await,
            Err(SessionError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_logout_uses_stored_token_before_restore() {
        let (mut manager, gateway, medium) = manager(FakeGateway::default());
        seed(&medium, Some(&token("a1", Duration::hours(1))), Some(&user("jaina")));

        manager.logout().await;

        assert_eq!(gateway.calls(), vec!["logout"]);
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_logout_without_token_skips_server() {
        let (mut manager, gateway, _) = manager(FakeGateway::default());
        manager.logout().await;
        assert!(gateway.calls().is_empty());
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_logout_keeps_settings_and_last_realm() {
        let (mut manager, _, _) = manager(FakeGateway::default());
        manager.store().save_last_realm("realm-3").unwrap();

        manager.logout().await;

        assert_eq!(manager.store().last_realm().as_deref(), Some("realm-3"));
    }

    // ===== update_user / observation =====

    #[tokio::test]
    async fn test_update_user_replaces_in_place_without_io() {
        let (mut manager, _, _) = manager(FakeGateway {
            sign_in: Some(Ok(AuthPayload {
                token: token("a1", Duration::hours(1)),
                user: user("jaina"),
            })),
            ..Default::default()
        });
        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        let mut renamed = user("jaina");
        renamed.avatar_url = Some("https://cdn.example.com/j.png".to_string());
        assert!(manager.update_user(renamed.clone()));

        assert_eq!(manager.current_user(), Some(&renamed));
        assert_eq!(manager.store().user(), Some(user("jaina")));
    }

    #[tokio::test]
    async fn test_update_user_ignored_when_unauthenticated() {
        let (mut manager, _, _) = manager(FakeGateway::default());
        manager.restore_session().await;

        assert!(!manager.update_user(user("jaina")));
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let (mut manager, _, _) = manager(FakeGateway {
            sign_in: Some(Ok(AuthPayload {
                token: token("a1", Duration::hours(1)),
                user: user("jaina"),
            })),
            ..Default::default()
        });
        let mut rx = manager.subscribe();

        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::Authenticated(user("jaina")));
    }

    #[test]
    fn test_session_state_serializes_tagged() {
        let value = serde_json::to_value(SessionState::Unauthenticated).unwrap();
        assert_eq!(value, serde_json::json!({"status": "unauthenticated"}));

        let value = serde_json::to_value(SessionState::Authenticated(user("jaina"))).unwrap();
        assert_eq!(value["status"], "authenticated");
        assert_eq!(value["user"]["username"], "jaina");
    }

    // ===== access_token =====

    fn signed_in_with(issued: AuthToken, refresh: Option<Result<RefreshPayload, ApiError>>) -> FakeGateway {
        FakeGateway {
            sign_in: Some(Ok(AuthPayload {
                token: issued,
                user: user("jaina"),
            })),
            refresh,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_access_token_fresh_skips_refresh() {
        let (mut manager, gateway, _) = manager(signed_in_with(token("a1", Duration::hours(1)), None));
        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        assert_eq!(manager.access_token().await.unwrap(), "a1");
        assert_eq!(gateway.calls(), vec!["login"]);
    }

    #[tokio::test]
    async fn test_access_token_refreshes_stale_token() {
        let fresh = token("a2", Duration::hours(1));
        let (mut manager, _, _) = manager(signed_in_with(
            token("a1", Duration::minutes(1)),
            Some(Ok(RefreshPayload {
                token: fresh.clone(),
                user: None,
            })),
        ));
        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        assert_eq!(manager.access_token().await.unwrap(), "a2");
        assert_eq!(manager.store().token(), Some(fresh));
        assert_eq!(manager.access_token().await.unwrap(), "a2");
    }

    #[tokio::test]
    async fn test_access_token_refresh_rejected_ends_session() {
        let (mut manager, _, medium) = manager(signed_in_with(
            token("a1", Duration::minutes(1)),
            Some(Err(rejected("INVALID_REFRESH_TOKEN", "Refresh token revoked"))),
        ));
        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        assert!(matches!(manager.access_token().await, Err(SessionError::Expired(_))));
        assert_eq!(manager.state(), &SessionState::Unauthenticated);
        assert!(medium.is_empty());
    }

    #[tokio::test]
    async fn test_access_token_network_failure_keeps_session() {
        let (mut manager, _, _) = manager(signed_in_with(
            token("a1", Duration::minutes(1)),
            Some(Err(ApiError::Network("unreachable".to_string()))),
        ));
        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        assert!(matches!(manager.access_token().await, Err(SessionError::Api(_))));
        assert!(manager.is_authenticated());
        assert!(manager.store().token().is_some());
    }

    #[tokio::test]
    async fn test_access_token_server_outage_keeps_session() {
        let outage = ApiError::ServerError(ErrorBody::new("SERVICE_UNAVAILABLE", "Scheduled maintenance"));
        let (mut manager, _, _) = manager(signed_in_with(token("a1", Duration::minutes(1)), Some(Err(outage))));
        manager.login(&Credentials::new("jaina@example.com", "Secret123")).await;

        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, SessionError::Api(ApiError::ServerError(_))));
        assert_eq!(err.user_message(), "Scheduled maintenance");
        assert!(manager.is_authenticated());
        assert!(manager.store().token().is_some());
        assert!(manager.store().user().is_some());
    }

    #[tokio::test]
    async fn test_access_token_requires_session() {
        let (mut manager, _, _) = manager(FakeGateway::default());
        assert!(matches!(
            manager.access_token().await,
            Err(SessionError::NotAuthenticated)
        ));
    }
}
