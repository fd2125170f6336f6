use crate::cli::{
    actions::{init, server, Action},
    commands::{self, init as init_cmd, tuning::Options},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;

/// Map parsed arguments to the action to run.
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    // --config-dir is global, so it is read from whichever matches are at hand
    let config_dir = |m: &clap::ArgMatches| -> Result<PathBuf> {
        m.get_one::<String>(commands::ARG_CONFIG_DIR)
            .map(PathBuf::from)
            .context("missing required argument: --config-dir")
    };

    match matches.subcommand() {
        Some((init_cmd::CMD_INIT, sub_m)) => {
            let get = |name: &str| -> Result<String> {
                sub_m
                    .get_one::<String>(name)
                    .cloned()
                    .with_context(|| format!("missing required argument: --{name}"))
            };

            Ok(Action::Init(init::Args {
                config_dir: config_dir(sub_m)?,
                admin_user: get(init_cmd::ARG_ADMIN_USER)?,
                admin_password: SecretString::from(get(init_cmd::ARG_ADMIN_PASSWORD)?),
                root: PathBuf::from(get(init_cmd::ARG_ROOT)?),
                http_port: sub_m
                    .get_one::<u16>(init_cmd::ARG_HTTP_PORT)
                    .copied()
                    .context("missing required argument: --http-port")?,
            }))
        }
        Some(("license", _)) => Ok(Action::License),
        _ => Ok(Action::Server(server::Args {
            config_dir: config_dir(matches)?,
            port: matches.get_one::<u16>(commands::ARG_PORT).copied(),
            tuning: Options::parse(matches)?,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    const ENV_VARS: [&str; 10] = [
        "PICCOLO_CONFIG_DIR",
        "PICCOLO_PORT",
        "PICCOLO_SESSION_HOURS",
        "PICCOLO_BAN_THRESHOLD",
        "PICCOLO_BAN_WINDOW_MINUTES",
        "PICCOLO_NOT_FOUND_DELAY_MS",
        "PICCOLO_ADMIN_USER",
        "PICCOLO_ADMIN_PASSWORD",
        "PICCOLO_ROOT",
        "PICCOLO_LOG_LEVEL",
    ];

    fn clean_env<F: FnOnce() -> R, R>(f: F) -> R {
        temp_env::with_vars(ENV_VARS.map(|name| (name, None::<&str>)), f)
    }

    #[test]
    fn test_handler_server() -> Result<()> {
        clean_env(|| {
            let matches = commands::new().get_matches_from(vec![
                "piccolo",
                "-c",
                "/etc/piccolo",
                "--port",
                "8443",
                "--ban-threshold",
                "3",
            ]);
            let Action::Server(args) = handler(&matches)? else {
                anyhow::bail!("expected the server action");
            };
            assert_eq!(args.config_dir, PathBuf::from("/etc/piccolo"));
            assert_eq!(args.port, Some(8443));
            assert_eq!(args.tuning.ban_threshold, 3);
            assert_eq!(args.tuning.ban_window, Duration::from_secs(20 * 60));
            Ok(())
        })
    }

    #[test]
    fn test_handler_server_defaults() -> Result<()> {
        clean_env(|| {
            let matches = commands::new().get_matches_from(vec!["piccolo"]);
            let Action::Server(args) = handler(&matches)? else {
                anyhow::bail!("expected the server action");
            };
            assert_eq!(args.config_dir, PathBuf::from(commands::DEFAULT_CONFIG_DIR));
            assert_eq!(args.port, None);
            Ok(())
        })
    }

    #[test]
    fn test_handler_init() -> Result<()> {
        clean_env(|| {
            let matches = commands::new().get_matches_from(vec![
                "piccolo",
                "init",
                "--config-dir",
                "/tmp/piccolo",
                "--admin-user",
                "alice",
                "--admin-password",
                "s3cret",
                "--root",
                "/srv/files",
                "--http-port",
                "8000",
            ]);
            let Action::Init(args) = handler(&matches)? else {
                anyhow::bail!("expected the init action");
            };
            assert_eq!(args.config_dir, PathBuf::from("/tmp/piccolo"));
            assert_eq!(args.admin_user, "alice");
            assert_eq!(args.admin_password.expose_secret(), "s3cret");
            assert_eq!(args.root, PathBuf::from("/srv/files"));
            assert_eq!(args.http_port, 8000);
            Ok(())
        })
    }

    #[test]
    fn test_handler_license() -> Result<()> {
        clean_env(|| {
            let matches = commands::new().get_matches_from(vec!["piccolo", "license"]);
            assert!(matches!(handler(&matches)?, Action::License));
            Ok(())
        })
    }
}
