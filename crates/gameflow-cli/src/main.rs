//! gameflow - command-line front end for game accounts and realm selection.
//!
//! Drives the session manager from the terminal: sign in, restore the saved
//! session, browse realms and remember the selected one.

mod app;

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Result};
use gameflow_core::models::UserUpdate;
use gameflow_core::Config;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr and, when a log directory is available, to a daily file.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok()) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gameflow.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn print_usage() {
    eprintln!(
        "Usage: gameflow <command> [args]

Commands:
  status                      Restore the saved session and show who is signed in
  login [email]               Sign in with email and password
  register <username> <email> Create an account
  social <provider> <token>   Sign in with google, apple, facebook or discord
  logout                      Sign out and forget stored credentials
  whoami                      Print the signed-in account as JSON
  profile [--username NAME] [--email EMAIL] [--avatar URL]
                              Update the account profile
  realms                      List realms
  realm <id>                  Show one realm
  characters <id>             List your characters on a realm
  select-realm <id>           Remember a realm as the last selected one

Environment:
  GAMEFLOW_API_URL            API base URL override
  GAMEFLOW_EMAIL, GAMEFLOW_PASSWORD
                              Non-interactive sign-in
  GAMEFLOW_STORE_PASSPHRASE   Passphrase for the encrypted store
  RUST_LOG                    Log filter (default: warn)"
    );
}

fn parse_profile_args(args: &[String]) -> Result<UserUpdate> {
    let mut update = UserUpdate::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let Some(value) = iter.next() else {
            bail!("Missing value for {}", flag);
        };
        match flag.as_str() {
            "--username" => update.username = Some(value.clone()),
            "--email" => update.email = Some(value.clone()),
            "--avatar" => update.avatar_url = Some(value.clone()),
            other => bail!("Unknown profile option: {}", other),
        }
    }
    if update.is_empty() {
        bail!("Nothing to update. Pass --username, --email or --avatar.");
    }
    Ok(update)
}

fn arg(args: &[String], index: usize, name: &str) -> Result<String> {
    match args.get(index) {
        Some(value) => Ok(value.clone()),
        None => bail!("Missing <{}>. Run `gameflow help` for usage.", name),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing(Config::data_dir().ok().map(|dir| dir.join("logs")));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        print_usage();
        return Ok(());
    };
    let rest = &args[1..];

    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    info!(command, "gameflow starting");
    let mut app = App::new()?;

    match command {
        "status" => app.status().await,
        "login" => app.login(rest.first().cloned()).await,
        "register" => {
            app.register(arg(rest, 0, "username")?, arg(rest, 1, "email")?)
                .await
        }
        "social" => app.social(&arg(rest, 0, "provider")?, arg(rest, 1, "token")?).await,
        "logout" => app.logout().await,
        "whoami" => app.whoami().await,
        "profile" => app.update_profile(parse_profile_args(rest)?).await,
        "realms" => app.realms().await,
        "realm" => app.realm(&arg(rest, 0, "id")?).await,
        "characters" => app.characters(&arg(rest, 0, "id")?).await,
        "select-realm" => app.select_realm(&arg(rest, 0, "id")?).await,
        other => {
            print_usage();
            bail!("Unknown command: {}", other)
        }
    }
}
