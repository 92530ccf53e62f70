//! Application state for the authgate CLI.
//!
//! `App` owns the configuration and the shared auth context, and runs each
//! command the way a view would: submit credentials, hand the session to the
//! context, make protected calls through the fetch wrapper.

use std::io::{self, Write};

use anyhow::{Context, Result};
use authgate_core::{
    ApiClient, AuthContext, AuthEndpoint, AuthState, AuthenticatedFetch, Config, CredentialSubmission,
    RequestOptions, Subscription,
};
use tracing::{debug, error, info, warn};

/// Environment variable supplying the username non-interactively
const USERNAME_ENV: &str = "AUTHGATE_USERNAME";

/// Environment variable supplying the password non-interactively
const PASSWORD_ENV: &str = "AUTHGATE_PASSWORD";

pub struct App {
    config: Config,
    context: AuthContext,
    api: ApiClient,
    fetch: AuthenticatedFetch,
    _status_view: Subscription,
}

impl App {
    pub fn new(server_url: Option<String>) -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        }
        .with_env_overrides();

        if let Some(url) = server_url {
            config.server_url = url;
        }
        debug!(server_url = %config.server_url, storage = ?config.storage, "Config loaded");

        let context = AuthContext::new(config.open_store());
        let api = ApiClient::new(config.server_url.clone())?;
        let fetch = AuthenticatedFetch::new(api.clone(), context.clone());

        let status_view = context.subscribe(|state| match state {
            AuthState::Authenticated(session) => eprintln!("Signed in as {}", session.username),
            AuthState::Anonymous => eprintln!("Signed out"),
        });

        Ok(Self {
            config,
            context,
            api,
            fetch,
            _status_view: status_view,
        })
    }

    /// Register or log in, then start the session
    pub async fn submit(&mut self, endpoint: AuthEndpoint, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
            Some(u) => u,
            None => self.prompt_username()?,
        };
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(p) => p,
            Err(_) => Self::prompt_password()?,
        };

        let submission = CredentialSubmission::new(username, password);
        match self.api.submit(endpoint, &submission).await {
            Ok(session) => {
                if let Err(e) = self.context.login(session) {
                    eprintln!("Warning: session will not be remembered ({})", e);
                }

                self.config.last_username = Some(submission.username.clone());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                Ok(())
            }
            Err(failure) => {
                error!(error = %failure, kind = ?failure.kind(), "Submission failed");
                Err(anyhow::anyhow!(failure.user_message()))
            }
        }
    }

    /// Revoke the token server-side, then end the local session
    pub async fn logout(&self) -> Result<()> {
        if let Some(token) = self.context.token() {
            if let Err(e) = self.api.revoke(&token).await {
                warn!(error = %e, "Server did not revoke token");
            }
        }
        self.context.logout().context("Failed to remove stored session")?;
        info!("Logout complete");
        Ok(())
    }

    pub fn status(&self) {
        match self.context.session() {
            Some(session) => {
                let remaining = session.minutes_until_expiry(self.config.max_age());
                println!("Signed in as {}", session.username);
                println!("Session issued {}", session.issued_at.format("%Y-%m-%d %H:%M UTC"));
                println!("Expires in about {}h {}m", remaining / 60, remaining % 60);
            }
            None => println!("Not signed in"),
        }
    }

    /// Call a protected endpoint and print the JSON body
    pub async fn get(&self, path: &str) -> Result<()> {
        let response = self.fetch.request(path, RequestOptions::get()).await?;
        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;

        let pretty = serde_json::from_str::<serde_json::Value>(&body)
            .and_then(|v| serde_json::to_string_pretty(&v))
            .unwrap_or(body);
        println!("{}", pretty);

        if !status.is_success() {
            anyhow::bail!("Request failed with status {}", status);
        }
        Ok(())
    }

    fn prompt_username(&self) -> Result<String> {
        match self.config.last_username {
            Some(ref last_user) => print!("Username [{}]: ", last_user),
            None => print!("Username: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        Ok(match self.config.last_username {
            Some(ref last_user) if input.is_empty() => last_user.clone(),
            _ => input.to_string(),
        })
    }

    fn prompt_password() -> Result<String> {
        let password = rpassword::prompt_password("Password: ")?;
        Ok(password)
    }
}
