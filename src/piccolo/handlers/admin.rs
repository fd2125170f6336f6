//! Admin console pages and actions.
//!
//! Every handler recomputes the admin status from the current `admin_users` parameter.
//! Actions ignore empty fields, overwrite existing entries and write the changed file back
//! immediately.

use axum::{
    extract::{ConnectInfo, Extension, Form},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, Response},
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{error, info, instrument, warn};

use super::{client_ip, field, fields, login::login_page, respond};
use crate::{
    piccolo::{
        html::{self, FOOTER, MSG_SETTINGS_ERROR},
        state::AppState,
    },
    settings::{SettingsError, REQUIRED_PARAMS},
    utils::dir_tree,
};

type FormFields = Vec<(String, String)>;

/// Resolve the visitor for an admin action; non-admins get a plain refusal.
fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    action: &str,
) -> Result<Option<HeaderValue>, Response> {
    let visitor = state.visitor(headers);
    let cookie = visitor.session.save();
    if visitor.is_admin {
        info!("{action}, user \"{}\"", visitor.username);
        Ok(cookie)
    } else {
        warn!("{action}, access denied for user \"{}\"", visitor.username);
        Err(respond(
            cookie,
            StatusCode::FORBIDDEN,
            format!("access denied for user \"{}\"", visitor.username),
        ))
    }
}

/// Waiting page leading back to the console, or a generic error when the write failed.
fn finish(
    state: &AppState,
    cookie: Option<HeaderValue>,
    title: &str,
    result: Result<bool, SettingsError>,
) -> Response {
    match result {
        Ok(changed) => {
            if !changed {
                info!("{title}: nothing to do");
            }
            let page = format!(
                "{}{}{FOOTER}",
                html::header(title, state.restart_needed(), None),
                html::redirect_page(&html::href(&format!("/{}", state.admin_path())))
            );
            respond(cookie, StatusCode::OK, Html(page))
        }
        Err(err) => {
            error!("{title}: {err}");
            respond(cookie, StatusCode::INTERNAL_SERVER_ERROR, MSG_SETTINGS_ERROR)
        }
    }
}

#[instrument(skip_all)]
pub async fn console(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let visitor = state.visitor(&headers);
    let cookie = visitor.session.save();
    let admin_url = format!("/{}", state.admin_path());

    if !visitor.is_admin {
        info!("admin page, access denied for user \"{}\"", visitor.username);
        let ip = client_ip(connect_info.as_ref());
        return login_page(&state, &ip, &visitor.username, &admin_url, cookie);
    }

    info!("admin page, user \"{}\"", visitor.username);
    let body = html::admin_console(&state.settings(), state.admin_path());
    let page = format!(
        "{}{body}{FOOTER}",
        html::header("piccolo - settings", state.restart_needed(), None)
    );
    respond(cookie, StatusCode::OK, Html(page))
}

#[instrument(skip_all)]
pub async fn new_perm_form(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Response {
    let visitor = state.visitor(&headers);
    let cookie = visitor.session.save();

    if !visitor.is_admin {
        info!(
            "new permission form, access denied for user \"{}\"",
            visitor.username
        );
        let ip = client_ip(connect_info.as_ref());
        let target = format!("/{}/new_perm_form", state.admin_path());
        return login_page(&state, &ip, &visitor.username, &target, cookie);
    }

    let (root, users) = {
        let settings = state.settings();
        (
            settings.root_directory(),
            settings.users.keys().cloned().collect::<Vec<_>>(),
        )
    };

    let walk = tokio::task::spawn_blocking(move || dir_tree(&root)).await;
    let body = match walk {
        Ok(Ok(directories)) => {
            info!("number of available directories: {}", directories.len());
            html::new_perm_form(&users, &directories, state.admin_path())
        }
        Ok(Err(err)) => {
            error!("directory walk failed: {err}");
            html::new_perm_form_error(state.admin_path())
        }
        Err(err) => {
            error!("directory walk task failed: {err}");
            html::new_perm_form_error(state.admin_path())
        }
    };

    let page = format!(
        "{}{body}{FOOTER}",
        html::header(
            "piccolo - settings - new private directory",
            state.restart_needed(),
            None
        )
    );
    respond(cookie, StatusCode::OK, Html(page))
}

#[instrument(skip_all)]
pub async fn save_config(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<FormFields>,
) -> Response {
    let cookie = match authorize(&state, &headers, "save configuration") {
        Ok(cookie) => cookie,
        Err(response) => return response,
    };

    let updates: Vec<(String, String)> = form
        .into_iter()
        .filter(|(name, _)| REQUIRED_PARAMS.contains(&name.as_str()))
        .collect();
    let result = state.save_params(&updates).map(|()| true);
    finish(&state, cookie, "piccolo - settings - saving configuration", result)
}

#[instrument(skip_all)]
pub async fn change_password(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<FormFields>,
) -> Response {
    let cookie = match authorize(&state, &headers, "change password") {
        Ok(cookie) => cookie,
        Err(response) => return response,
    };

    let result = state.set_user(
        field(&form, "change_password_usr"),
        field(&form, "change_password_pwd"),
    );
    finish(&state, cookie, "piccolo - settings - changing password", result)
}

#[instrument(skip_all)]
pub async fn new_user(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<FormFields>,
) -> Response {
    let cookie = match authorize(&state, &headers, "new user") {
        Ok(cookie) => cookie,
        Err(response) => return response,
    };

    let result = state.set_user(field(&form, "new_user_usr"), field(&form, "new_user_pwd"));
    finish(&state, cookie, "piccolo - settings - new user", result)
}

#[instrument(skip_all)]
pub async fn delete_user(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<FormFields>,
) -> Response {
    let cookie = match authorize(&state, &headers, "delete user") {
        Ok(cookie) => cookie,
        Err(response) => return response,
    };

    let result = match field(&form, "delete_user_usr") {
        "" => Ok(false),
        username => state.delete_user(username),
    };
    finish(&state, cookie, "piccolo - settings - deleting user", result)
}

#[instrument(skip_all)]
pub async fn new_perm(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<FormFields>,
) -> Response {
    let cookie = match authorize(&state, &headers, "new permission") {
        Ok(cookie) => cookie,
        Err(response) => return response,
    };

    // The form sends one checkbox per user; a ready-made list is accepted too.
    let mut userlist: Vec<&str> = fields(&form, "new_perm_user").collect();
    userlist.extend(field(&form, "new_perm_userlist").split(','));
    let result = state.set_permission(field(&form, "new_perm_path"), &userlist.join(","));
    finish(&state, cookie, "piccolo - settings - new permission", result)
}

#[instrument(skip_all)]
pub async fn change_perm(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<FormFields>,
) -> Response {
    let cookie = match authorize(&state, &headers, "change permission") {
        Ok(cookie) => cookie,
        Err(response) => return response,
    };

    let result = state.set_permission(
        field(&form, "change_perm_path"),
        field(&form, "change_perm_userlist"),
    );
    finish(&state, cookie, "piccolo - settings - change permission", result)
}

#[instrument(skip_all)]
pub async fn delete_perm(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<FormFields>,
) -> Response {
    let cookie = match authorize(&state, &headers, "delete permission") {
        Ok(cookie) => cookie,
        Err(response) => return response,
    };

    let result = state.delete_permission(field(&form, "delete_perm_path"));
    finish(&state, cookie, "piccolo - settings - deleting permission", result)
}
