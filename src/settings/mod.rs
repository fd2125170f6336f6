//! JSON persistence of the general parameters, the users and the private directories.
//!
//! The configuration directory holds three files:
//! - `params.json`: `{"params": [{"name": "...", "value": "..."}]}`
//! - `users.json`: `{"users": [{"username": "...", "password": "<sha256>"}]}`
//! - `permissions.json`: `{"permissions": [{"directory": "...", "userlist": "a,b"}]}`

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::piccolo::access::Permissions;

pub const PARAMS_FILE: &str = "params.json";
pub const USERS_FILE: &str = "users.json";
pub const PERMISSIONS_FILE: &str = "permissions.json";

pub const PARAM_ROOT_DIRECTORY: &str = "root_directory";
pub const PARAM_HTTP_PORT: &str = "http_port";
pub const PARAM_ADMIN_PATH: &str = "admin_path";
pub const PARAM_ADMIN_USERS: &str = "admin_users";

/// Every parameter a valid `params.json` must define.
pub const REQUIRED_PARAMS: [&str; 4] = [
    PARAM_ROOT_DIRECTORY,
    PARAM_HTTP_PORT,
    PARAM_ADMIN_PATH,
    PARAM_ADMIN_USERS,
];

pub const DEFAULT_ADMIN_PATH: &str = "admin";

pub type Params = BTreeMap<String, String>;
pub type Users = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} not defined in {path}")]
    MissingParam { name: &'static str, path: PathBuf },
    #[error("invalid value for {name}: {value}")]
    InvalidParam { name: &'static str, value: String },
    #[error("root directory {0} not found or not a directory")]
    RootDirectory(PathBuf),
}

#[derive(Serialize, Deserialize, Debug)]
struct JsonParam {
    name: String,
    value: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct JsonParamList {
    #[serde(default)]
    params: Vec<JsonParam>,
}

#[derive(Serialize, Deserialize, Debug)]
struct JsonUser {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct JsonUserList {
    #[serde(default)]
    users: Vec<JsonUser>,
}

#[derive(Serialize, Deserialize, Debug)]
struct JsonPermission {
    directory: String,
    userlist: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct JsonPermissionList {
    #[serde(default)]
    permissions: Vec<JsonPermission>,
}

/// Paths served by fixed routes, unusable as `admin_path`.
const RESERVED_PATHS: [&str; 3] = ["health", "login_action", "logout"];

/// Admin console path segment: letters, digits, `-` and `_` only.
#[must_use]
pub fn valid_admin_path(path: &str) -> bool {
    !RESERVED_PATHS.contains(&path)
        && Regex::new(r"^[A-Za-z0-9_-]+$").is_ok_and(|re| re.is_match(path))
}

/// Parse an HTTP port accepted by the server (20..=65535).
///
/// # Errors
/// Returns `SettingsError::InvalidParam` when the value is not a usable port.
pub fn parse_http_port(value: &str) -> Result<u16, SettingsError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port >= 20 => Ok(port),
        _ => Err(SettingsError::InvalidParam {
            name: PARAM_HTTP_PORT,
            value: value.to_string(),
        }),
    }
}

/// In-memory copy of the three configuration files.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub params: Params,
    pub users: Users,
    pub permissions: Permissions,
}

impl Settings {
    /// Load and validate the configuration directory.
    ///
    /// # Errors
    /// Returns an error when a file is missing or malformed, when a required parameter is
    /// missing, or when the root directory does not exist.
    pub fn load(dir: &Path) -> Result<Self, SettingsError> {
        let params_path = dir.join(PARAMS_FILE);
        let params: JsonParamList = read_json(&params_path)?;
        let params: Params = params
            .params
            .into_iter()
            .map(|param| (param.name, param.value))
            .collect();

        for name in REQUIRED_PARAMS {
            if !params.contains_key(name) {
                return Err(SettingsError::MissingParam {
                    name,
                    path: params_path,
                });
            }
        }

        let users: JsonUserList = read_json(&dir.join(USERS_FILE))?;
        let permissions: JsonPermissionList = read_json(&dir.join(PERMISSIONS_FILE))?;

        let settings = Self {
            params,
            users: users
                .users
                .into_iter()
                .map(|user| (user.username, user.password))
                .collect(),
            permissions: permissions
                .permissions
                .into_iter()
                .map(|perm| (perm.directory, perm.userlist))
                .collect(),
        };

        settings.http_port()?;
        if !valid_admin_path(settings.admin_path()) {
            return Err(SettingsError::InvalidParam {
                name: PARAM_ADMIN_PATH,
                value: settings.admin_path().to_string(),
            });
        }
        let root = settings.root_directory();
        if !root.is_dir() {
            return Err(SettingsError::RootDirectory(root));
        }

        info!(
            "Loaded settings from {}: {} users, {} private directories",
            dir.display(),
            settings.users.len(),
            settings.permissions.len()
        );

        Ok(settings)
    }

    /// Fresh configuration with one administrator and no private directories.
    #[must_use]
    pub fn initial(admin_user: &str, password_hash: &str, root: &Path, http_port: u16) -> Self {
        let mut params = Params::new();
        params.insert(PARAM_ADMIN_PATH.to_string(), DEFAULT_ADMIN_PATH.to_string());
        params.insert(PARAM_ADMIN_USERS.to_string(), admin_user.to_string());
        params.insert(
            PARAM_ROOT_DIRECTORY.to_string(),
            root.to_string_lossy().replace('\\', "/"),
        );
        params.insert(PARAM_HTTP_PORT.to_string(), http_port.to_string());

        let mut users = Users::new();
        users.insert(admin_user.to_string(), password_hash.to_string());

        Self {
            params,
            users,
            permissions: Permissions::new(),
        }
    }

    /// Write all three files.
    ///
    /// # Errors
    /// Returns an error if any file cannot be written.
    pub fn write_all(&self, dir: &Path) -> Result<(), SettingsError> {
        self.write_params(dir)?;
        self.write_users(dir)?;
        self.write_permissions(dir)
    }

    /// # Errors
    /// Returns an error if `params.json` cannot be written.
    pub fn write_params(&self, dir: &Path) -> Result<(), SettingsError> {
        let list = JsonParamList {
            params: self
                .params
                .iter()
                .map(|(name, value)| JsonParam {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        write_json(&dir.join(PARAMS_FILE), &list)
    }

    /// # Errors
    /// Returns an error if `users.json` cannot be written.
    pub fn write_users(&self, dir: &Path) -> Result<(), SettingsError> {
        let list = JsonUserList {
            users: self
                .users
                .iter()
                .map(|(username, password)| JsonUser {
                    username: username.clone(),
                    password: password.clone(),
                })
                .collect(),
        };
        write_json(&dir.join(USERS_FILE), &list)
    }

    /// # Errors
    /// Returns an error if `permissions.json` cannot be written.
    pub fn write_permissions(&self, dir: &Path) -> Result<(), SettingsError> {
        let list = JsonPermissionList {
            permissions: self
                .permissions
                .iter()
                .map(|(directory, userlist)| JsonPermission {
                    directory: directory.clone(),
                    userlist: userlist.clone(),
                })
                .collect(),
        };
        write_json(&dir.join(PERMISSIONS_FILE), &list)
    }

    #[must_use]
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map_or("", String::as_str)
    }

    #[must_use]
    pub fn root_directory(&self) -> PathBuf {
        let root = self.param(PARAM_ROOT_DIRECTORY);
        match crate::utils::trim_trailing_slashes(root) {
            "" if !root.is_empty() => PathBuf::from("/"),
            trimmed => PathBuf::from(trimmed),
        }
    }

    /// # Errors
    /// Returns an error if `http_port` is not a valid port.
    pub fn http_port(&self) -> Result<u16, SettingsError> {
        parse_http_port(self.param(PARAM_HTTP_PORT))
    }

    #[must_use]
    pub fn admin_path(&self) -> &str {
        self.param(PARAM_ADMIN_PATH)
    }

    #[must_use]
    pub fn admin_users(&self) -> &str {
        self.param(PARAM_ADMIN_USERS)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SettingsError> {
    let content = serde_json::to_string_pretty(value).map_err(|source| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("wrote {}", path.display());
    Ok(())
}
