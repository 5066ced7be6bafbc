//! fincontrol - a terminal client for the FinanControl personal finance API.
//!
//! Starts from the stored session when it is still valid, otherwise asks for
//! a login, then shows balances and recent activity.

mod app;

use std::io;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{needs_login, prompt_line, App};
use fincontrol_core::models::UserProfile;

/// What to do after leaving the home menu
enum Next {
    Login,
    Quit,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level, e.g. RUST_LOG=fincontrol_core=debug
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("fincontrol starting");

    let mut app = App::new()?;
    let watcher = app.watch_session();

    let result = run(&mut app).await;

    watcher.abort();
    if let Err(ref e) = result {
        error!(error = %e, "Exiting with error");
    }
    info!("fincontrol shutting down");
    result
}

async fn run(app: &mut App) -> Result<()> {
    loop {
        let profile = match app.resume()? {
            Some(profile) => profile,
            None => match login_menu(app).await? {
                Some(profile) => profile,
                None => return Ok(()),
            },
        };
        match home_menu(app, &profile).await? {
            Next::Login => continue,
            Next::Quit => return Ok(()),
        }
    }
}

/// Returns `None` when the user chooses to quit.
async fn login_menu(app: &mut App) -> Result<Option<UserProfile>> {
    loop {
        let Some(choice) = prompt_line("[l] log in  [r] reset password  [q] quit > ")? else {
            return Ok(None);
        };
        match choice.as_str() {
            "" | "l" => return app.login_interactive().await.map(Some),
            "r" => {
                let Some(email) = prompt_line("E-mail: ")? else {
                    return Ok(None);
                };
                if email.is_empty() {
                    println!("E-mail is required.");
                } else if let Err(e) = app.forgot_password(&email).await {
                    println!("Could not request a reset: {}", e);
                }
            }
            "q" => return Ok(None),
            _ => println!("Unknown option"),
        }
    }
}

async fn home_menu(app: &mut App, profile: &UserProfile) -> Result<Next> {
    let mut show_dashboard = true;
    loop {
        if show_dashboard {
            match app.print_dashboard(profile).await {
                Ok(()) => {}
                // Credentials were already purged; the watcher has told the user
                Err(e) if needs_login(&e) => return Ok(Next::Login),
                Err(e) => println!("Could not load the dashboard: {}", e),
            }
        }
        show_dashboard = false;

        let Some(choice) = prompt_line("\n[d] dashboard  [s] session  [o] log out  [q] quit > ")?
        else {
            return Ok(Next::Quit);
        };
        match choice.as_str() {
            "d" => show_dashboard = true,
            "s" => app.print_status()?,
            "o" => {
                app.logout().await?;
                return Ok(Next::Login);
            }
            "q" => return Ok(Next::Quit),
            _ => println!("Unknown option"),
        }
    }
}
