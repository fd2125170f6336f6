use crate::{
    cli::commands::tuning::Options,
    piccolo::{self, bruteforce::BruteForceGuard, session::SessionStore, state::AppState},
    settings::Settings,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub config_dir: PathBuf,
    pub port: Option<u16>,
    pub tuning: Options,
}

/// Build the application state from the configuration directory.
/// # Errors
/// Returns an error if the configuration cannot be loaded.
pub fn load_state(args: &Args) -> Result<(AppState, u16)> {
    let settings = Settings::load(&args.config_dir).with_context(|| {
        format!(
            "Could not load the configuration from {}, create it with `piccolo init`",
            args.config_dir.display()
        )
    })?;

    let port = match args.port {
        Some(port) => port,
        None => settings.http_port()?,
    };

    let state = AppState::new(args.config_dir.clone(), settings)
        .with_sessions(SessionStore::new(args.tuning.session_lifetime))
        .with_guard(
            BruteForceGuard::new()
                .with_threshold(args.tuning.ban_threshold)
                .with_window(args.tuning.ban_window),
        )
        .with_not_found_delay(args.tuning.not_found_delay);

    Ok((state, port))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (state, port) = load_state(&args)?;
    log_startup(&args, &state, port);

    let result = piccolo::new(Arc::new(state), port).await;

    crate::cli::telemetry::shutdown_tracer();

    result
}

fn log_startup(args: &Args, state: &AppState, port: u16) {
    let root = state.settings().root_directory();
    let entries = [
        ("listen", format!("tcp:{port}")),
        ("config_dir", args.config_dir.display().to_string()),
        ("root_directory", root.display().to_string()),
        ("admin_path", format!("/{}", state.admin_path())),
        (
            "session_lifetime",
            format!("{}s", args.tuning.session_lifetime.as_secs()),
        ),
        ("ban_threshold", args.tuning.ban_threshold.to_string()),
        (
            "ban_window",
            format!("{}s", args.tuning.ban_window.as_secs()),
        ),
        (
            "not_found_delay",
            format!("{}ms", args.tuning.not_found_delay.as_millis()),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "piccolo {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
