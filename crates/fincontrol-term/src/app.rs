//! Application state for the fincontrol terminal client.
//!
//! `App` owns the configuration and the shared API client, decides where a
//! session starts, and renders the dashboard summary.

use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use fincontrol_core::api::{LoginOutcome, LoginRequest};
use fincontrol_core::auth::Route;
use fincontrol_core::models::{Account, Transaction, TransactionKind, UserProfile, YearMonth};
use fincontrol_core::storage;
use fincontrol_core::{ApiClient, ApiError, Config, CredentialStore, SessionEvent, SessionState, TokenValidator};

/// Number of recent transactions shown per kind.
const RECENT_LIMIT: usize = 5;

/// Login attempts before giving up.
const MAX_LOGIN_ATTEMPTS: usize = 3;

pub struct App {
    pub config: Config,
    pub client: ApiClient,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let data_dir = config.data_dir()?;
        let storage = storage::open(config.storage, &data_dir);
        let client = ApiClient::new(&config.api, CredentialStore::new(storage))
            .context("Failed to create API client")?;
        info!(base_url = %client.base_url(), backend = ?config.storage, "Client ready");
        Ok(Self { config, client })
    }

    /// Print session lifecycle changes as they happen.
    pub fn watch_session(&self) -> JoinHandle<()> {
        let mut events = self.client.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Expired { reason }) => {
                        warn!(%reason, "Session expired");
                        eprintln!("Your session has expired. Please log in again.");
                    }
                    Ok(event) => debug!(?event, "Session event"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed session events"),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn session(&self) -> Result<SessionState> {
        Ok(self.client.session_state()?)
    }

    /// Resume the stored session if it is still usable.
    pub fn resume(&self) -> Result<Option<UserProfile>> {
        let state = self.session()?;
        match state.entry_route() {
            Route::Home => Ok(state.profile().cloned()),
            Route::Login { session_expired } => {
                if session_expired {
                    println!("Your session has expired. Please log in again.");
                    // An expired token must not linger next to a fresh login
                    self.client.store().clear()?;
                }
                Ok(None)
            }
        }
    }

    pub async fn login_interactive(&mut self) -> Result<UserProfile> {
        for _ in 0..MAX_LOGIN_ATTEMPTS {
            let Some(username) = prompt_username(self.config.last_username.as_deref())? else {
                anyhow::bail!("Login cancelled");
            };
            let password = rpassword::prompt_password("Password: ")?;
            if username.is_empty() || password.is_empty() {
                println!("Username and password are required.");
                continue;
            }

            match self.client.login(&LoginRequest::new(&username, &password)).await {
                Ok(LoginOutcome::Authenticated(profile)) => {
                    self.config.last_username = Some(username);
                    if let Err(e) = self.config.save() {
                        warn!(error = %e, "Failed to save config");
                    }
                    println!("Welcome, {}!\n", profile.display_name());
                    return Ok(profile);
                }
                Ok(LoginOutcome::InvalidCredentials) => {
                    println!("Invalid username or password.");
                }
                Ok(LoginOutcome::Rejected { message }) => {
                    println!("{}", message);
                }
                Err(e) if e.is_network() => {
                    error!(error = %e, "Login failed");
                    anyhow::bail!("Unable to connect to server. Check your connection.");
                }
                Err(e) => return Err(e).context("Login failed"),
            }
        }
        anyhow::bail!("Too many failed login attempts")
    }

    pub async fn logout(&self) -> Result<()> {
        self.client.logout().await?;
        println!("Logged out.");
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        self.client.forgot_password(email).await?;
        println!("If the address is registered, reset instructions were sent to {}.", email);
        Ok(())
    }

    /// Describe the stored session without contacting the server.
    pub fn print_status(&self) -> Result<()> {
        match self.session()? {
            SessionState::Authenticated(profile) => {
                println!("Logged in as {}", profile.display_name());
                let expires = TokenValidator::new(self.client.store().clone()).expires_at()?;
                if let Some(expires) = expires {
                    let local: DateTime<Local> = expires.into();
                    println!("Access token expires {}", local.format("%Y-%m-%d %H:%M"));
                }
            }
            SessionState::Expired => println!("Session expired"),
            SessionState::Anonymous => println!("Not logged in"),
        }
        Ok(())
    }

    pub async fn print_dashboard(&self, profile: &UserProfile) -> Result<()> {
        let id = &profile.id;
        let month = YearMonth::current();

        let (accounts, expenses, incomes) = tokio::join!(
            self.client.fetch_accounts(id),
            self.client.fetch_recent_expenses(id),
            self.client.fetch_recent_incomes(id),
        );
        let (spent, spent_before, earned, earned_before) = tokio::join!(
            self.client.fetch_monthly_total(TransactionKind::Expense, id, None),
            self.client.fetch_monthly_total(TransactionKind::Expense, id, Some(month.previous())),
            self.client.fetch_monthly_total(TransactionKind::Income, id, None),
            self.client.fetch_monthly_total(TransactionKind::Income, id, Some(month.previous())),
        );

        let accounts = accounts?;
        println!("Hello, {}", profile.display_name());
        println!("Total balance: {}", money(Account::total_balance(&accounts)));
        for account in &accounts {
            println!("  {:<24} {:>14}", account.display_name(), money(account.saldo));
        }
        println!();

        println!("{:04}-{:02}", month.year, month.month);
        print_total("Income", earned?, earned_before.ok());
        print_total("Expenses", spent?, spent_before.ok());
        println!();

        let mut recent: Vec<Transaction> = expenses?.into_iter().chain(incomes?).collect();
        recent.sort_by(|a, b| b.data.cmp(&a.data));
        println!("Recent activity");
        if recent.is_empty() {
            println!("  (none)");
        }
        for item in recent.iter().take(RECENT_LIMIT * 2) {
            println!(
                "  {:<10} {:<28} {:>14}",
                item.data.as_deref().map(|d| d.get(..10).unwrap_or(d)).unwrap_or("-"),
                item.descricao,
                money(item.signed_amount())
            );
        }
        Ok(())
    }
}

/// Whether an error means the user has to log in again.
pub fn needs_login(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_session_expired)
}

fn print_total(label: &str, current: f64, previous: Option<f64>) {
    match previous {
        Some(previous) if previous != 0.0 => {
            let change = (current - previous) / previous.abs() * 100.0;
            println!("  {:<10} {:>14} ({:+.1}% vs last month)", label, money(current), change);
        }
        _ => println!("  {:<10} {:>14}", label, money(current)),
    }
}

fn money(value: f64) -> String {
    format!("R$ {:.2}", value)
}

/// Read one trimmed line from stdin. `None` at end of input.
pub fn prompt_line(label: &str) -> Result<Option<String>> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn prompt_username(last: Option<&str>) -> Result<Option<String>> {
    let label = match last {
        Some(last) => format!("Username [{}]: ", last),
        None => "Username: ".to_string(),
    };
    Ok(prompt_line(&label)?.map(|username| match (username.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => username,
    }))
}
