//! Per-request access decisions for browsing and the admin console.
//!
//! Privacy is inherited: a path is private when it is, or lies below, a key of the permission
//! map. The match is segment aware, so a permission on `/priv` does not cover `/private2`.

use std::collections::BTreeMap;

/// Private logical path -> comma separated allow-list.
pub type Permissions = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// No permission entry covers the path.
    Public,
    /// Private, and the user is on at least one matching allow-list.
    Granted,
    /// Private, and the user is on none of the matching allow-lists.
    Denied,
}

impl AccessDecision {
    #[must_use]
    pub fn allowed(self) -> bool {
        !matches!(self, Self::Denied)
    }
}

/// Logical path with trailing slashes removed; the root becomes `""`.
#[must_use]
pub fn normalize(path: &str) -> String {
    path.trim_end_matches(['/', '\\']).to_string()
}

/// Whether `path` equals `private_dir` or lies below it.
#[must_use]
pub fn is_under(path: &str, private_dir: &str) -> bool {
    let private_dir = private_dir.trim_end_matches('/');
    if private_dir.is_empty() {
        return true;
    }
    match path.strip_prefix(private_dir) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Whether `username` is an entry of a comma separated list. The anonymous user never is.
#[must_use]
pub fn in_list(list: &str, username: &str) -> bool {
    !username.is_empty() && list.split(',').map(str::trim).any(|entry| entry == username)
}

#[must_use]
pub fn is_private(path: &str, permissions: &Permissions) -> bool {
    permissions.keys().any(|dir| is_under(path, dir))
}

/// Decide whether `username` (empty for anonymous) may open `path`.
#[must_use]
pub fn decide(path: &str, permissions: &Permissions, username: &str) -> AccessDecision {
    let mut private = false;
    let mut granted = false;

    for (dir, allowed_users) in permissions {
        if is_under(path, dir) {
            private = true;
            if in_list(allowed_users, username) {
                granted = true;
            }
        }
    }

    match (private, granted) {
        (false, _) => AccessDecision::Public,
        (true, true) => AccessDecision::Granted,
        (true, false) => AccessDecision::Denied,
    }
}

/// Listing visibility of the child directory `child_path`.
///
/// Private directory names are only shown to logged in users, whether or not they may enter.
#[must_use]
pub fn visible_in_listing(child_path: &str, permissions: &Permissions, username: &str) -> bool {
    !(permissions.contains_key(child_path) && username.is_empty())
}

/// Administrator status derived from the `admin_users` parameter.
#[must_use]
pub fn is_admin(admin_users: &str, username: &str) -> bool {
    in_list(admin_users, username)
}
