//! Application state and command handlers.
//!
//! `App` wires the configuration, the HTTP client and the session manager
//! together once at startup and runs one command against them.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use gameflow_core::api::ApiError;
use gameflow_core::models::{
    Credentials, Realm, RegisterProfile, SocialAuth, SocialProvider, UserUpdate,
};
use gameflow_core::validation::{
    validate_email, validate_password, validate_password_confirmation, validate_username,
};
use gameflow_core::{
    ApiClient, AuthOutcome, Config, CredentialStore, KeyValueMedium, SessionManager, SessionState,
};
use tracing::{debug, warn};

type Session = SessionManager<ApiClient, Box<dyn KeyValueMedium>>;

/// Column width for realm names in listings.
const REALM_NAME_WIDTH: usize = 24;

pub struct App {
    config: Config,
    api: ApiClient,
    session: Session,
}

impl App {
    /// Create a new application instance
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let data_dir = Config::data_dir().context("Could not determine data directory")?;
        debug!(?data_dir, storage = ?config.storage, "Storage configured");

        let api = ApiClient::new(config.base_url(), config.request_timeout())?;
        let medium = config.open_medium(data_dir)?;
        let session = SessionManager::new(api.clone(), CredentialStore::new(medium));

        Ok(Self {
            config,
            api,
            session,
        })
    }

    // =========================================================================
    // Session commands
    // =========================================================================

    pub async fn status(&mut self) -> Result<()> {
        self.session.restore_session().await;
        match self.session.state() {
            SessionState::Authenticated(user) => {
                println!("Signed in as {} <{}>", user.display_name(), user.email);
                if let Some(realm) = self.session.store().last_realm() {
                    println!("Last realm: {}", realm);
                }
            }
            _ => println!("Not signed in"),
        }
        Ok(())
    }

    pub async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = match email
            .or_else(|| std::env::var("GAMEFLOW_EMAIL").ok())
            .or_else(|| self.config.last_email.clone())
        {
            Some(email) => email,
            None => prompt("Email: ")?,
        };
        validate_email(&email)?;

        let password = match std::env::var("GAMEFLOW_PASSWORD") {
            Ok(password) if !password.is_empty() => password,
            _ => rpassword::prompt_password("Password: ")?,
        };

        let outcome = self
            .session
            .login(&Credentials::new(email.clone(), password))
            .await;
        self.finish_sign_in(outcome, Some(email))
    }

    pub async fn register(&mut self, username: String, email: String) -> Result<()> {
        validate_username(&username)?;
        validate_email(&email)?;

        let password = rpassword::prompt_password("Password: ")?;
        validate_password(&password)?;
        let confirmation = rpassword::prompt_password("Confirm password: ")?;
        validate_password_confirmation(&password, &confirmation)?;

        let profile = RegisterProfile {
            username,
            email: email.clone(),
            password,
        };
        let outcome = self.session.register(&profile).await;
        self.finish_sign_in(outcome, Some(email))
    }

    pub async fn social(&mut self, provider: &str, token: String) -> Result<()> {
        let provider = SocialProvider::from_id(provider).ok_or_else(|| {
            let known: Vec<_> = SocialProvider::ALL.iter().map(|p| p.id()).collect();
            anyhow!("Unknown provider '{}'. Expected one of: {}", provider, known.join(", "))
        })?;

        let outcome = self
            .session
            .social_login(&SocialAuth { provider, token })
            .await;
        self.finish_sign_in(outcome, None)
    }

    fn finish_sign_in(&mut self, outcome: AuthOutcome, email: Option<String>) -> Result<()> {
        if !outcome.success {
            bail!(outcome.error.unwrap_or_else(|| "Sign-in failed".to_string()));
        }
        if let Some(warning) = outcome.warning {
            eprintln!("Warning: {}", warning);
        }

        if let Some(email) = email {
            self.config.last_email = Some(email);
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }

        if let Some(user) = self.session.current_user() {
            println!("Welcome, {}!", user.display_name());
        }
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.session.logout().await;
        println!("Signed out");
        Ok(())
    }

    pub async fn whoami(&mut self) -> Result<()> {
        self.require_session().await?;
        let token = self.access_token().await?;

        match self.api.fetch_profile(&token).await {
            Ok(user) => {
                if let Err(e) = self.session.store().save_user(&user) {
                    warn!(error = %e, "Failed to save fetched profile");
                }
                self.session.update_user(user);
            }
            // Offline: fall back to the user from the restored session.
            Err(e) if e.is_network() => warn!(error = %e, "Could not fetch profile, showing cached user"),
            Err(e) => return Err(user_facing(e)),
        }

        println!("{}", serde_json::to_string_pretty(self.session.state())?);
        Ok(())
    }

    pub async fn update_profile(&mut self, update: UserUpdate) -> Result<()> {
        self.require_session().await?;
        let token = self.access_token().await?;

        let user = self
            .api
            .update_profile(&token, &update)
            .await
            .map_err(user_facing)?;

        if let Err(e) = self.session.store().save_user(&user) {
            warn!(error = %e, "Failed to save updated profile");
        }
        self.session.update_user(user);
        println!("Profile updated");
        Ok(())
    }

    // =========================================================================
    // Realm commands
    // =========================================================================

    pub async fn realms(&mut self) -> Result<()> {
        self.require_session().await?;
        let token = self.access_token().await?;
        let realms = self.api.fetch_realms(&token).await.map_err(user_facing)?;

        if realms.is_empty() {
            println!("No realms available");
            return Ok(());
        }

        let last = self.session.store().last_realm();
        for realm in &realms {
            let marker = if last.as_deref() == Some(realm.id.as_str()) { "*" } else { " " };
            println!("{} {}", marker, realm_line(realm));
        }
        Ok(())
    }

    pub async fn realm(&mut self, realm_id: &str) -> Result<()> {
        self.require_session().await?;
        let token = self.access_token().await?;
        let realm = self
            .api
            .fetch_realm(&token, realm_id)
            .await
            .map_err(user_facing)?;

        println!("{} ({})", realm.name, realm.id);
        println!("  Region:     {}", realm.region);
        println!("  Status:     {}", realm.status.label());
        println!("  Population: {} ({}%)", realm.population_display(), realm.population_percentage());
        println!("  PvP:        {}", if realm.is_pvp { "yes" } else { "no" });
        println!("  Characters: {}", realm.user_character_count);
        if !realm.description.is_empty() {
            println!();
            println!("{}", realm.description);
        }
        Ok(())
    }

    pub async fn characters(&mut self, realm_id: &str) -> Result<()> {
        self.require_session().await?;
        let token = self.access_token().await?;
        let characters = self
            .api
            .fetch_realm_characters(&token, realm_id)
            .await
            .map_err(user_facing)?;

        if characters.is_empty() {
            println!("No characters on this realm");
        }
        for c in &characters {
            println!("{:<20} level {:>3} {}", c.name, c.level, c.class_name);
        }
        Ok(())
    }

    pub async fn select_realm(&mut self, realm_id: &str) -> Result<()> {
        self.require_session().await?;
        let token = self.access_token().await?;
        let realm = self
            .api
            .fetch_realm(&token, realm_id)
            .await
            .map_err(user_facing)?;

        if !realm.is_joinable() {
            eprintln!("Note: {} is currently {}", realm.name, realm.status.label().to_lowercase());
        }
        self.session
            .store()
            .save_last_realm(&realm.id)
            .context("Failed to remember selected realm")?;
        println!("Selected {}", realm.name);
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn require_session(&mut self) -> Result<()> {
        if !self.session.restore_session().await {
            bail!("Not signed in. Run `gameflow login` first.");
        }
        Ok(())
    }

    async fn access_token(&mut self) -> Result<String> {
        self.session
            .access_token()
            .await
            .map_err(|e| anyhow!(e.user_message()))
    }
}

fn user_facing(e: ApiError) -> anyhow::Error {
    debug!(code = e.code(), error = %e, "API call failed");
    anyhow!(e.user_message())
}

fn realm_line(realm: &Realm) -> String {
    format!(
        "{:<width$} {:<6} {:<12} {:>4}%{}",
        truncate(&realm.name, REALM_NAME_WIDTH),
        realm.region,
        realm.status.label(),
        realm.population_percentage(),
        if realm.is_pvp { "  PvP" } else { "" },
        width = REALM_NAME_WIDTH,
    )
}

/// Truncate to `max` characters with an ellipsis.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
