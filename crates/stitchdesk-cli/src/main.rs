//! Stitchdesk CLI - drive the tailoring dashboard's session and preference core
//! from a terminal.
//!
//! Inspects tokens, edits stored preferences, and watches a session until
//! its token expires.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stitchdesk_core::preferences::{root_classes, ColorTheme, PreferencePatch, ThemeMode};
use stitchdesk_core::session::{AuthSession, MonitorState, SessionPhase};
use stitchdesk_core::{
    ApiClient, Config, JsonFileStore, KeyValueStore, LocalSession, PreferenceStore,
    SessionMonitor, TokenExpiredSignal, TokenInspector, TokenStore,
};

use commands::Command;

// ============================================================================
// Constants
// ============================================================================

/// Directory for rolling log files; file logging is off when unset.
const ENV_LOG_DIR: &str = "STITCHDESK_LOG_DIR";

/// File name prefix for the daily log files.
const LOG_FILE_PREFIX: &str = "stitchdesk.log";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer on drop and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(ENV_LOG_DIR) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = commands::parse(&args)?;
    if command == Command::Help {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    info!("Stitchdesk starting");

    match command {
        Command::Help => Ok(()),
        Command::TokenInspect { token } => inspect_token(&config, &token),
        Command::PrefsShow => show_preferences(&config),
        Command::PrefsTheme(mode) => set_theme(&config, mode),
        Command::PrefsColor(color) => set_color_theme(&config, color),
        Command::PrefsSet(patch) => save_preferences(&config, patch),
        Command::PrefsReset => reset_preferences(&config),
        Command::SessionLogin { access, refresh } => login(&config, &access, refresh.as_deref()),
        Command::SessionStatus => session_status(&config),
        Command::SessionLogout => logout(&config).await,
        Command::SessionWatch => watch_session(&config).await,
        Command::ConfigShow => show_config(&config),
        Command::ConfigInit => init_config(&config),
    }
}

fn open_storage(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let dir = config.storage_dir()?;
    Ok(Arc::new(JsonFileStore::new(&dir)))
}

// ============================================================================
// Configuration
// ============================================================================

fn show_config(config: &Config) -> Result<()> {
    println!("Config file:    {}", Config::path()?.display());
    println!("Storage dir:    {}", config.storage_dir()?.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn init_config(config: &Config) -> Result<()> {
    let path = config.save().context("Failed to save config")?;
    println!("Config written to {}", path.display());
    Ok(())
}

// ============================================================================
// Tokens
// ============================================================================

fn print_expiry(inspector: &TokenInspector, token: &str) {
    let now = Utc::now();
    let check = inspector.check_at(Some(token), now);
    match TokenInspector::payload(Some(token)).and_then(|claims| claims.expires_at()) {
        Some(expires_at) => {
            let minutes = TokenInspector::minutes_until_expiry(Some(token), now).unwrap_or(0);
            println!("Expires:        {} ({} min)", expires_at.to_rfc3339(), minutes);
        }
        None => println!("Expires:        unknown"),
    }
    println!("Expired:        {}", check.is_expired);
    println!("Expiring soon:  {}", check.is_expiring_soon);
}

fn inspect_token(config: &Config, token: &str) -> Result<()> {
    let claims = stitchdesk_core::token::decode_claims(token).context("Failed to decode token")?;
    println!("{}", serde_json::to_string_pretty(claims.as_map())?);
    print_expiry(&TokenInspector::from_config(config), token);
    Ok(())
}

// ============================================================================
// Preferences
// ============================================================================

fn load_preferences(config: &Config) -> Result<PreferenceStore> {
    Ok(PreferenceStore::load(open_storage(config)?, &config.keys))
}

fn print_preferences(store: &PreferenceStore) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(store.settings())?);
    // No OS preference is visible from a terminal; system resolves to light
    println!("Root classes: {}", root_classes(store.settings(), false).join(" "));
    Ok(())
}

fn show_preferences(config: &Config) -> Result<()> {
    print_preferences(&load_preferences(config)?)
}

fn set_theme(config: &Config, mode: ThemeMode) -> Result<()> {
    let mut store = load_preferences(config)?;
    store.change_theme(mode)?;
    println!("Theme set to {}", mode);
    Ok(())
}

fn set_color_theme(config: &Config, color: ColorTheme) -> Result<()> {
    let mut store = load_preferences(config)?;
    store.change_color_theme(color)?;
    println!("Color theme set to {}", color);
    Ok(())
}

fn save_preferences(config: &Config, patch: PreferencePatch) -> Result<()> {
    let mut store = load_preferences(config)?;
    store.update_settings(patch);
    let outcome = store.save_settings(None);
    if !outcome.success {
        bail!(
            "Failed to save settings: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    print_preferences(&store)
}

fn reset_preferences(config: &Config) -> Result<()> {
    let mut store = load_preferences(config)?;
    store.reset_settings()?;
    println!("Settings reset to defaults");
    Ok(())
}

// ============================================================================
// Session
// ============================================================================

fn token_store(config: &Config) -> Result<TokenStore> {
    Ok(TokenStore::new(open_storage(config)?, &config.keys))
}

fn login(config: &Config, access: &str, refresh: Option<&str>) -> Result<()> {
    let tokens = token_store(config)?;
    tokens
        .set_tokens(access, refresh)
        .context("Failed to store tokens")?;
    println!("Session stored");
    print_expiry(&TokenInspector::from_config(config), access);
    Ok(())
}

fn session_status(config: &Config) -> Result<()> {
    let session = LocalSession::new(token_store(config)?, None);
    let snapshot = session.snapshot();
    match snapshot.token.as_deref() {
        Some(token) if snapshot.is_authenticated => {
            println!("Authenticated:  true");
            print_expiry(&TokenInspector::from_config(config), token);
        }
        _ => println!("Authenticated:  false"),
    }
    Ok(())
}

/// Build the local session with server-side logout enabled.
fn local_session(config: &Config, signal: &TokenExpiredSignal) -> Result<LocalSession> {
    let tokens = token_store(config)?;
    let api = ApiClient::new(config, tokens.clone(), signal.clone())
        .context("Failed to create API client")?;
    Ok(LocalSession::new(tokens, Some(api)))
}

async fn logout(config: &Config) -> Result<()> {
    let session = local_session(config, &TokenExpiredSignal::new())?;
    if let Err(e) = session.logout().await {
        // Local tokens are already gone at this point
        warn!(error = %e, "Server-side logout failed");
    }
    println!("Logged out");
    Ok(())
}

fn report_state(state: &MonitorState) {
    match state.phase {
        SessionPhase::Active => println!("Session active"),
        SessionPhase::Warning => println!("Session expiring soon"),
        SessionPhase::ExpiredPendingConfirmation if state.is_expired => {
            println!("Session expired, logging out")
        }
        SessionPhase::ExpiredPendingConfirmation => println!("Logout requested"),
        SessionPhase::LoggedOut => println!("Logged out"),
    }
}

async fn watch_session(config: &Config) -> Result<()> {
    let signal = TokenExpiredSignal::new();
    let session = local_session(config, &signal)?;
    if !session.snapshot().is_authenticated {
        bail!("No stored session; run `stitchdesk session login` first");
    }

    let monitor = Arc::new(SessionMonitor::from_config(Arc::new(session), signal, config));
    let mut states: watch::Receiver<MonitorState> = monitor.subscribe();
    let handle = monitor.start();
    println!(
        "Watching session (checking every {}s, Ctrl-C to stop)",
        config.poll_interval().as_secs()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping session watch");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                report_state(&state);
                if state.is_logged_out() {
                    break;
                }
                // Nobody is at the terminal to confirm; an expiry logs out directly
                if state.show_logout_modal && state.is_expired {
                    monitor.force_logout().await;
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
