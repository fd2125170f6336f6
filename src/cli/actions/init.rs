use crate::{
    settings::{Settings, PARAMS_FILE},
    utils::hash_password,
};
use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use tracing::info;

pub const MIN_PASSWORD_LENGTH: usize = 5;

#[derive(Debug)]
pub struct Args {
    pub config_dir: PathBuf,
    pub admin_user: String,
    pub admin_password: SecretString,
    pub root: PathBuf,
    pub http_port: u16,
}

/// Write `params.json`, `users.json` and `permissions.json` for a first administrator.
/// Returns the configuration directory.
/// # Errors
/// Returns an error if an argument is invalid, the directory is already configured,
/// or the files cannot be written.
pub fn initialize(args: &Args) -> Result<PathBuf> {
    let admin_user = args.admin_user.trim();
    if admin_user.is_empty() || admin_user.contains(',') {
        bail!("invalid administrator name: {:?}", args.admin_user);
    }

    if args.admin_password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        bail!("the password needs at least {MIN_PASSWORD_LENGTH} characters");
    }

    if !args.root.is_dir() {
        bail!("root directory {} does not exist", args.root.display());
    }
    let root = std::fs::canonicalize(&args.root)
        .with_context(|| format!("Could not resolve {}", args.root.display()))?;

    if args.config_dir.join(PARAMS_FILE).exists() {
        bail!(
            "{} already holds a configuration",
            args.config_dir.display()
        );
    }

    std::fs::create_dir_all(&args.config_dir)
        .with_context(|| format!("Could not create {}", args.config_dir.display()))?;

    Settings::initial(
        admin_user,
        &hash_password(args.admin_password.expose_secret()),
        &root,
        args.http_port,
    )
    .write_all(&args.config_dir)?;

    Ok(args.config_dir.clone())
}

/// Execute the init action.
/// # Errors
/// Returns an error if the configuration cannot be created.
pub fn execute(args: &Args) -> Result<()> {
    let dir = initialize(args)?;
    info!("configuration written to {}", dir.display());
    println!(
        "Configuration written to {}, start the server with `piccolo --config-dir {}`",
        dir.display(),
        dir.display()
    );
    Ok(())
}
