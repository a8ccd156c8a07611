//! duet – command-line front-end.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON or pretty, on stderr).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Run one command and print its result as JSON on stdout.
//! 5. Release whichever model is still resident.

mod cli;
mod state;

use clap::Parser;
use serde_json::{Value, json};
use tracing::info;

use duet_core::entities::UserRecord;
use duet_core::{Config, DuetError};

use crate::cli::{AuthCommands, ChatCommands, Cli, Commands, MessageCommands, UserCommands};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: DUET_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "duet starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let state = AppState::open(cfg).await?;
    info!(database_url = %state.config.database_url, "database ready");

    // ── 4. Command ─────────────────────────────────────────────────────────────
    let outcome = run(&state, cli).await;

    // ── 5. Device cleanup ──────────────────────────────────────────────────────
    state.residency.release_all().await;

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            let body = json!({ "error": e.client_message(), "kind": e.kind() });
            eprintln!("{}", serde_json::to_string_pretty(&body)?);
            std::process::exit(1);
        }
    }
}

async fn run(state: &AppState, cli: Cli) -> Result<Value, DuetError> {
    let token = cli.token;
    match cli.command {
        Commands::User(UserCommands::Register {
            username,
            email,
            password,
        }) => {
            let user = state.users()?.register(&username, &email, &password).await?;
            to_json(&user)
        }

        Commands::Auth(AuthCommands::Login { username, password }) => {
            let (user, token) = state.auth()?.login(&username, &password).await?;
            Ok(json!({ "user": to_json(&user)?, "token": token, "token_type": "bearer" }))
        }
        Commands::Auth(AuthCommands::Whoami) => {
            let user = current_user(state, token.as_deref()).await?;
            to_json(&user)
        }

        Commands::Chat(cmd) => {
            let user = current_user(state, token.as_deref()).await?;
            let chats = state.chats();
            match cmd {
                ChatCommands::Create { title } => to_json(&chats.create(user.id, title).await?),
                ChatCommands::List => to_json(&chats.list(user.id).await?),
                ChatCommands::Rename { chat_id, title } => {
                    to_json(&chats.rename(user.id, chat_id, title).await?)
                }
                ChatCommands::Delete { chat_id } => {
                    chats.delete(user.id, chat_id).await?;
                    Ok(json!({ "deleted": chat_id }))
                }
            }
        }

        Commands::Message(cmd) => {
            let user = current_user(state, token.as_deref()).await?;
            let messages = state.messages();
            match cmd {
                MessageCommands::Send {
                    chat_id,
                    content,
                    image,
                } => {
                    state.chats().get(user.id, chat_id).await?;
                    to_json(&messages.handle(chat_id, &content, image).await?)
                }
                MessageCommands::List {
                    chat_id,
                    limit,
                    offset,
                    asc,
                } => {
                    state.chats().get(user.id, chat_id).await?;
                    to_json(&messages.list_messages(chat_id, limit, offset, asc).await?)
                }
            }
        }
    }
}

async fn current_user(state: &AppState, token: Option<&str>) -> Result<UserRecord, DuetError> {
    let token = token.ok_or_else(|| {
        DuetError::Unauthorized("a bearer token is required (pass --token or set DUET_TOKEN)".into())
    })?;
    state.auth()?.authenticate(token).await
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, DuetError> {
    serde_json::to_value(value).map_err(|e| DuetError::Internal(e.to_string()))
}
