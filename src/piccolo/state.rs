//! Application context shared by every handler through an `Extension<Arc<AppState>>`.

use axum::http::HeaderMap;
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    time::Duration,
};
use tracing::{info, warn};

use crate::{
    piccolo::{
        access,
        bruteforce::BruteForceGuard,
        session::{session_cookie, Session, SessionStore},
    },
    settings::{self, Settings, SettingsError, REQUIRED_PARAMS},
    utils::hash_password,
};

/// Session attribute holding the logged in username.
pub const USERNAME_KEY: &str = "username";

pub const DEFAULT_NOT_FOUND_DELAY: Duration = Duration::from_secs(4);

#[derive(Debug)]
pub struct AppState {
    config_dir: PathBuf,
    admin_path: String,
    settings: RwLock<Settings>,
    sessions: SessionStore,
    guard: BruteForceGuard,
    restart_needed: AtomicBool,
    not_found_delay: Duration,
}

/// Who is behind a request, resolved from the session cookie.
#[derive(Debug)]
pub struct Visitor {
    pub session: Session,
    pub username: String,
    pub is_admin: bool,
}

impl Visitor {
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

impl AppState {
    /// The admin console is mounted under the `admin_path` read here; later edits need a restart.
    #[must_use]
    pub fn new(config_dir: PathBuf, settings: Settings) -> Self {
        Self {
            config_dir,
            admin_path: settings.admin_path().to_string(),
            settings: RwLock::new(settings),
            sessions: SessionStore::default(),
            guard: BruteForceGuard::default(),
            restart_needed: AtomicBool::new(false),
            not_found_delay: DEFAULT_NOT_FOUND_DELAY,
        }
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: SessionStore) -> Self {
        self.sessions = sessions;
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: BruteForceGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn with_not_found_delay(mut self, delay: Duration) -> Self {
        self.not_found_delay = delay;
        self
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path segment the admin console is mounted under.
    #[must_use]
    pub fn admin_path(&self) -> &str {
        &self.admin_path
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub fn guard(&self) -> &BruteForceGuard {
        &self.guard
    }

    #[must_use]
    pub fn not_found_delay(&self) -> Duration {
        self.not_found_delay
    }

    #[must_use]
    pub fn restart_needed(&self) -> bool {
        self.restart_needed.load(Ordering::Relaxed)
    }

    /// Read access to the settings. Guards must not be held across `.await`.
    pub fn settings(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings_mut(&self) -> RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the session and the logged user; admin status is recomputed from the current
    /// `admin_users` parameter on every call.
    #[must_use]
    pub fn visitor(&self, headers: &HeaderMap) -> Visitor {
        let cookie = session_cookie(headers);
        let mut session = self.sessions.get_session(cookie.as_deref());
        let username = session.get(USERNAME_KEY);
        let is_admin = access::is_admin(self.settings().admin_users(), &username);
        Visitor {
            session,
            username,
            is_admin,
        }
    }

    /// Compare `password` with the stored hash of `username`.
    #[must_use]
    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        if username.is_empty() {
            return false;
        }
        self.settings()
            .users
            .get(username)
            .is_some_and(|stored| *stored == hash_password(password))
    }

    /// Store the general parameters in `updates` and flag that a restart is needed.
    ///
    /// Unknown names, empty values, invalid ports and invalid admin paths are ignored.
    ///
    /// # Errors
    /// Returns an error if `params.json` cannot be written.
    pub fn save_params(&self, updates: &[(String, String)]) -> Result<(), SettingsError> {
        let mut current = self.settings_mut();
        for (name, value) in updates {
            let value = value.trim();
            let Some(name) = REQUIRED_PARAMS.iter().find(|known| **known == name.as_str()) else {
                warn!("ignoring unknown parameter {name}");
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if *name == settings::PARAM_HTTP_PORT && settings::parse_http_port(value).is_err() {
                warn!("ignoring invalid http port {value}");
                continue;
            }
            if *name == settings::PARAM_ADMIN_PATH && !settings::valid_admin_path(value) {
                warn!("ignoring invalid admin path {value}");
                continue;
            }
            current.params.insert((*name).to_string(), value.to_string());
        }
        current.write_params(&self.config_dir)?;
        self.restart_needed.store(true, Ordering::Relaxed);
        info!("general parameters saved, restart needed");
        Ok(())
    }

    /// Create or overwrite a user. Returns `false` when a field is empty.
    ///
    /// # Errors
    /// Returns an error if `users.json` cannot be written.
    pub fn set_user(&self, username: &str, password: &str) -> Result<bool, SettingsError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Ok(false);
        }
        let mut settings = self.settings_mut();
        settings
            .users
            .insert(username.to_string(), hash_password(password));
        settings.write_users(&self.config_dir)?;
        Ok(true)
    }

    /// # Errors
    /// Returns an error if `users.json` cannot be written.
    pub fn delete_user(&self, username: &str) -> Result<bool, SettingsError> {
        let mut settings = self.settings_mut();
        if settings.users.remove(username).is_none() {
            return Ok(false);
        }
        settings.write_users(&self.config_dir)?;
        Ok(true)
    }

    /// Create or overwrite a private directory entry. Returns `false` when a field is empty.
    ///
    /// # Errors
    /// Returns an error if `permissions.json` cannot be written.
    pub fn set_permission(&self, directory: &str, userlist: &str) -> Result<bool, SettingsError> {
        let Some(key) = permission_key(directory) else {
            return Ok(false);
        };
        let userlist = userlist
            .split(',')
            .map(str::trim)
            .filter(|user| !user.is_empty())
            .collect::<Vec<_>>()
            .join(",");
        if userlist.is_empty() {
            return Ok(false);
        }
        let mut settings = self.settings_mut();
        settings.permissions.insert(key, userlist);
        settings.write_permissions(&self.config_dir)?;
        Ok(true)
    }

    /// # Errors
    /// Returns an error if `permissions.json` cannot be written.
    pub fn delete_permission(&self, directory: &str) -> Result<bool, SettingsError> {
        let Some(key) = permission_key(directory) else {
            return Ok(false);
        };
        let mut settings = self.settings_mut();
        if settings.permissions.remove(&key).is_none() {
            return Ok(false);
        }
        settings.write_permissions(&self.config_dir)?;
        Ok(true)
    }
}

/// Permission keys start with `/` and carry no trailing slash. The root cannot be private.
fn permission_key(directory: &str) -> Option<String> {
    let trimmed = access::normalize(directory.trim());
    let trimmed = trimmed.trim_start_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{trimmed}"))
    }
}
