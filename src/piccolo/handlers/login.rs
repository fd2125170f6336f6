//! Login form, login action and logout.

use axum::{
    extract::{ConnectInfo, Extension, Form},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, Response},
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, instrument, trace, warn};

use super::{client_ip, respond};
use crate::piccolo::{
    html::{self, FOOTER, MSG_BANNED},
    state::{AppState, USERNAME_KEY},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub redirect_url: String,
}

/// Local target for the post-login redirect; anything else falls back to `/`.
#[must_use]
pub fn safe_redirect(url: &str) -> &str {
    if url.starts_with('/') && !url.starts_with("//") && !url.contains('\\') {
        url
    } else {
        "/"
    }
}

/// Render the login form, or the ban message when `ip` is banned.
pub fn login_page(
    state: &AppState,
    ip: &str,
    username: &str,
    redirect_url: &str,
    cookie: Option<HeaderValue>,
) -> Response {
    if !ip.is_empty() && state.guard().banned(ip) {
        warn!("login form refused for banned IP {ip}");
        return respond(cookie, StatusCode::TOO_MANY_REQUESTS, MSG_BANNED);
    }

    let redirect_url = if redirect_url.is_empty() {
        "/"
    } else {
        redirect_url
    };
    let page = format!(
        "{}{}{FOOTER}",
        html::header("Login required", state.restart_needed(), None),
        html::login_form(username, redirect_url)
    );
    respond(cookie, StatusCode::OK, Html(page))
}

#[instrument(skip_all)]
pub async fn login_action(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let ip = client_ip(connect_info.as_ref());

    if !ip.is_empty() && state.guard().banned(&ip) {
        warn!("login refused for banned IP {ip}");
        return respond(None, StatusCode::TOO_MANY_REQUESTS, MSG_BANNED);
    }

    let mut cookie = None;
    if state.check_credentials(&form.username, &form.password) {
        let mut visitor = state.visitor(&headers);
        visitor.session.set(USERNAME_KEY, form.username.as_str());
        cookie = visitor.session.save();
        info!("user \"{}\" logged in from {ip}", form.username);
        trace!("{}", state.sessions().describe());
    } else {
        if !ip.is_empty() {
            state.guard().record_failed_login(&ip);
        }
        warn!(
            "login failed for user \"{}\", IP \"{ip}\", banned = {}",
            form.username,
            !ip.is_empty() && state.guard().banned(&ip)
        );
        trace!("{}", state.guard().describe());
    }

    let page = format!(
        "{}{}{FOOTER}",
        html::header("piccolo - logging in", state.restart_needed(), None),
        html::redirect_page(&html::href(safe_redirect(&form.redirect_url)))
    );
    respond(cookie, StatusCode::OK, Html(page))
}

#[instrument(skip_all)]
pub async fn logout(Extension(state): Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mut visitor = state.visitor(&headers);
    if !visitor.is_anonymous() {
        info!("user \"{}\" logged out", visitor.username);
    }
    visitor.session.expirate();
    let cookie = visitor.session.save();

    let page = format!(
        "{}{}{FOOTER}",
        html::header("piccolo - logging out", state.restart_needed(), None),
        html::redirect_page(&html::href("/"))
    );
    respond(cookie, StatusCode::OK, Html(page))
}
