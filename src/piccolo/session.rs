//! Cookie-keyed, expiring, in-memory web sessions.
//!
//! Flow Overview:
//! 1) `SessionStore::get_session` sweeps expired records, then loads the record named by the
//!    `msessionid` cookie or allocates a fresh one.
//! 2) Handlers read and write attributes on their private `Session` copy; every access slides
//!    the expiry forward by the session lifetime.
//! 3) `Session::save` writes the whole record back and returns the `Set-Cookie` value.
//!
//! Two requests holding the same session id each work on their own copy, so the later `save`
//! overwrites the attributes written by the earlier one. Garbage collection walks every live
//! session on each `get_session`, which keeps the cost linear in the number of sessions.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::{collections::HashMap, fmt::Write as _, sync::Arc, time::Duration};
use tracing::{debug, error, warn};

use crate::utils::{random_hex_id, SESSION_ID_BYTES};

pub const SESSION_COOKIE_NAME: &str = "msessionid";
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(6 * 60 * 60);

const DEFAULT_ITEMS_CAPACITY: usize = 32;

#[derive(Clone, Debug)]
struct SessionRecord {
    expiry: DateTime<Utc>,
    items: HashMap<String, String>,
}

/// Concurrent session storage shared by every request.
#[derive(Clone, Debug)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, SessionRecord>>,
    lifetime: TimeDelta,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_LIFETIME)
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(lifetime: Duration) -> Self {
        let lifetime = TimeDelta::from_std(lifetime).unwrap_or_else(|_| {
            warn!("session lifetime out of range, using the default");
            TimeDelta::hours(6)
        });
        Self {
            sessions: Arc::new(DashMap::new()),
            lifetime,
        }
    }

    /// Resolve the session named by `cookie`, allocating a new one when the cookie is missing
    /// or unknown.
    #[must_use]
    pub fn get_session(&self, cookie: Option<&str>) -> Session {
        self.get_session_at(cookie, Utc::now())
    }

    fn get_session_at(&self, cookie: Option<&str>, now: DateTime<Utc>) -> Session {
        self.sweep(now);

        if let Some(id) = cookie.filter(|id| !id.is_empty()) {
            // Clone out of the map so no shard lock outlives this statement.
            let stored = self.sessions.get(id).map(|record| record.items.clone());
            if let Some(items) = stored {
                return Session {
                    id: id.to_string(),
                    expiry: now + self.lifetime,
                    items,
                    store: self.clone(),
                };
            }
            debug!("session cookie not found in store, allocating a new session");
        }

        self.allocate(now)
    }

    /// Session handle carrying no id; reads return empty strings and writes are ignored.
    #[must_use]
    pub fn detached(&self) -> Session {
        Session {
            id: String::new(),
            expiry: DateTime::<Utc>::MIN_UTC,
            items: HashMap::new(),
            store: self.clone(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Printable dump of the live sessions for trace logging. Ids are shortened.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut info = format!("number of sessions: {}\n", self.sessions.len());
        for entry in self.sessions.iter() {
            let short_id: String = entry.key().chars().take(8).collect();
            let _ = writeln!(
                info,
                "\tcookie: {short_id}...\n\texpiry: {}",
                entry.value().expiry.format("%Y-%m-%d %H:%M:%S")
            );
            for (key, value) in &entry.value().items {
                let _ = writeln!(info, "\t\tkey: {key}\n\t\tval: {value}");
            }
        }
        info
    }

    fn allocate(&self, now: DateTime<Utc>) -> Session {
        let id = random_hex_id(SESSION_ID_BYTES);
        let expiry = now + self.lifetime;
        let items = HashMap::with_capacity(DEFAULT_ITEMS_CAPACITY);
        self.sessions.insert(
            id.clone(),
            SessionRecord {
                expiry,
                items: items.clone(),
            },
        );
        Session {
            id,
            expiry,
            items,
            store: self.clone(),
        }
    }

    fn sweep(&self, now: DateTime<Utc>) {
        self.sessions.retain(|_, record| record.expiry >= now);
    }
}

/// A request's own view of one session.
#[derive(Clone, Debug)]
pub struct Session {
    id: String,
    expiry: DateTime<Utc>,
    items: HashMap<String, String>,
    store: SessionStore,
}

impl Session {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
    }

    #[must_use]
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Attribute value, or an empty string when it was never set.
    pub fn get(&mut self, key: &str) -> String {
        if !self.is_valid() {
            warn!("invalid session, use get_session to obtain a valid instance");
            return String::new();
        }
        self.touch();
        self.items.get(key).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if self.is_valid() {
            self.touch();
            self.items.insert(key.into(), value.into());
        }
    }

    /// Store the full record and build the cookie that refreshes it in the browser.
    ///
    /// Returns `None` for an invalid handle.
    pub fn save(&self) -> Option<HeaderValue> {
        if !self.is_valid() {
            warn!("invalid session, use get_session to obtain a valid instance");
            return None;
        }

        self.store.sessions.insert(
            self.id.clone(),
            SessionRecord {
                expiry: self.expiry,
                items: self.items.clone(),
            },
        );

        let cookie = format!(
            "{SESSION_COOKIE_NAME}={}; Path=/; Expires={}; HttpOnly; SameSite=Lax",
            self.id,
            self.expiry.format("%a, %d %b %Y %H:%M:%S GMT")
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => Some(value),
            Err(err) => {
                error!("Failed to build session cookie: {err}");
                None
            }
        }
    }

    /// Move the expiry one hour into the past; `save` must follow and the handle must not be
    /// used afterwards.
    pub fn expirate(&mut self) {
        self.expiry = Utc::now() - TimeDelta::hours(1);
    }

    fn touch(&mut self) {
        self.expiry = Utc::now() + self.store.lifetime;
    }
}

/// Session id carried by the `msessionid` cookie, if any.
#[must_use]
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next().unwrap_or_default().trim();
            let val = parts.next().unwrap_or_default().trim();
            if key == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
