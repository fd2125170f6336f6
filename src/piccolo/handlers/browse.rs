//! Directory listings and file downloads below the configured root.
//!
//! Existence is checked before privacy, so a missing path answers with the same delayed
//! message whether or not it would have been private.

use axum::{
    body::Body,
    extract::{ConnectInfo, Extension, Query},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode, Uri,
    },
    response::{Html, IntoResponse, Response},
};
use chrono::{DateTime, Local};
use std::{
    net::SocketAddr,
    path::Path,
    sync::Arc,
    time::SystemTime,
};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, instrument};

use super::{client_ip, field, login::login_page, respond};
use crate::piccolo::{
    access,
    html::{self, ListingEntry, FOOTER, MSG_BROWSING_ERROR, MSG_NOT_FOUND},
    state::{AppState, Visitor},
};

/// Extensions written straight into the response instead of being downloaded.
const INLINE_EXTENSIONS: [&str; 5] = ["html", "htm", "txt", "md", "log"];

/// Decode a request path into its canonical logical path: `/seg/seg`, `""` for the root.
///
/// Empty and `.` segments are dropped, so the access check and the filesystem lookup see the
/// same path. Returns `None` for undecodable paths and for paths with `..` segments.
#[must_use]
pub fn logical_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    if decoded.contains('\0') {
        return None;
    }

    let mut logical = String::with_capacity(decoded.len());
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment => {
                logical.push('/');
                logical.push_str(segment);
            }
        }
    }
    Some(logical)
}

#[instrument(skip_all, fields(path = %uri.path()))]
pub async fn browse(
    Extension(state): Extension<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Query(query): Query<Vec<(String, String)>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let visitor = state.visitor(&headers);
    let cookie = visitor.session.save();
    let ip = client_ip(connect_info.as_ref());

    let logical = logical_path(uri.path());

    if field(&query, "login") == "spontaneous" {
        info!("login required by user");
        return login_page(
            &state,
            &ip,
            &visitor.username,
            logical.as_deref().unwrap_or("/"),
            cookie,
        );
    }

    let Some(logical) = logical else {
        return not_found(&state, cookie, uri.path()).await;
    };

    let (root, decision) = {
        let settings = state.settings();
        (
            settings.root_directory(),
            access::decide(&logical, &settings.permissions, &visitor.username),
        )
    };
    let resource = root.join(logical.trim_start_matches('/'));
    debug!(
        "browsing \"{logical}\" >>> \"{}\" - user \"{}\"",
        resource.display(),
        visitor.username
    );

    let metadata = match fs::metadata(&resource).await {
        Ok(metadata) => metadata,
        Err(err) => {
            debug!("stat failed for {}: {err}", resource.display());
            return not_found(&state, cookie, &logical).await;
        }
    };

    if !decision.allowed() {
        info!(
            "access denied for user \"{}\" to \"{logical}\"",
            visitor.username
        );
        return login_page(&state, &ip, &visitor.username, &logical, cookie);
    }

    if metadata.is_dir() {
        list_directory(&state, &visitor, &logical, &resource, cookie).await
    } else {
        serve_file(&logical, &resource, metadata.len(), cookie).await
    }
}

async fn not_found(state: &AppState, cookie: Option<HeaderValue>, path: &str) -> Response {
    tokio::time::sleep(state.not_found_delay()).await;
    info!("nothing found for \"{path}\"");
    respond(cookie, StatusCode::NOT_FOUND, MSG_NOT_FOUND)
}

struct RawEntry {
    name: String,
    is_dir: bool,
    size: u64,
    modified: Option<String>,
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

async fn read_entries(resource: &Path) -> std::io::Result<Vec<RawEntry>> {
    let mut entries = Vec::new();
    let mut dir = fs::read_dir(resource).await?;
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        // follow symlinks, like a stat of the entry path
        let metadata = match fs::metadata(entry.path()).await {
            Ok(metadata) => Some(metadata),
            Err(err) => {
                debug!("error reading info for {name}: {err}");
                None
            }
        };
        let is_dir = match &metadata {
            Some(metadata) => metadata.is_dir(),
            None => entry.file_type().await.is_ok_and(|kind| kind.is_dir()),
        };
        entries.push(RawEntry {
            name,
            is_dir,
            size: metadata.as_ref().map_or(0, std::fs::Metadata::len),
            modified: metadata
                .and_then(|metadata| metadata.modified().ok())
                .map(format_time),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

async fn list_directory(
    state: &AppState,
    visitor: &Visitor,
    logical: &str,
    resource: &Path,
    cookie: Option<HeaderValue>,
) -> Response {
    let raw = match read_entries(resource).await {
        Ok(raw) => raw,
        Err(err) => {
            error!("directory browsing error: {err}");
            return respond(cookie, StatusCode::INTERNAL_SERVER_ERROR, MSG_BROWSING_ERROR);
        }
    };

    let entries: Vec<ListingEntry> = {
        let settings = state.settings();
        raw.into_iter()
            .filter_map(|entry| {
                let path = format!("{logical}/{}", entry.name);
                let private = entry.is_dir && settings.permissions.contains_key(&path);
                if entry.is_dir
                    && !access::visible_in_listing(&path, &settings.permissions, &visitor.username)
                {
                    debug!(
                        "private directory name {} hidden for anonymous users",
                        entry.name
                    );
                    return None;
                }
                Some(ListingEntry {
                    name: entry.name,
                    path,
                    is_dir: entry.is_dir,
                    private,
                    size: entry.size,
                    modified: entry.modified,
                })
            })
            .collect()
    };

    let title = if logical.is_empty() {
        "Contents of /".to_string()
    } else {
        format!("Contents of {logical}")
    };
    let page = format!(
        "{}{}{FOOTER}",
        html::header(
            &title,
            state.restart_needed(),
            Some((visitor.username.as_str(), visitor.is_admin))
        ),
        html::listing(logical, &entries)
    );
    respond(cookie, StatusCode::OK, Html(page))
}

/// Content type of files shown inline, `None` for downloads.
fn inline_content_type(name: &str) -> Option<&'static str> {
    let extension = Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())?;
    if !INLINE_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    match extension.as_str() {
        "html" | "htm" => Some("text/html; charset=utf-8"),
        _ => Some("text/plain; charset=utf-8"),
    }
}

async fn serve_file(
    logical: &str,
    resource: &Path,
    size: u64,
    cookie: Option<HeaderValue>,
) -> Response {
    let name = logical.rsplit('/').next().unwrap_or_default();

    let file = match fs::File::open(resource).await {
        Ok(file) => file,
        Err(err) => {
            error!("error while opening file {}: {err}", resource.display());
            return respond(
                cookie,
                StatusCode::INTERNAL_SERVER_ERROR,
                "error while opening file, please report to the administrator",
            );
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
    if let Some(content_type) = inline_content_type(name) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    } else {
        info!("downloading \"{name}\"");
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "\\\""));
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        );
    }

    let body = Body::from_stream(ReaderStream::new(file));
    respond(cookie, StatusCode::OK, (headers, body).into_response())
}
