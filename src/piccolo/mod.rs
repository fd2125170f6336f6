use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header, HeaderName, HeaderValue, Request},
    routing::{get, post},
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod access;
pub mod bruteforce;
pub mod handlers;
pub mod html;
pub mod session;
pub mod state;

use self::{
    handlers::{admin, browse, favicon, health, login_action, logout},
    state::AppState,
};

/// Build the application router. The admin console is mounted under the `admin_path`
/// captured in `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let admin = format!("/{}", state.admin_path());

    Router::new()
        .route("/health", get(health).options(health))
        .route("/favicon.ico", get(favicon))
        .route("/login_action", post(login_action))
        .route("/logout", get(logout))
        .route(&admin, get(admin::console))
        .route(&format!("{admin}/new_perm_form"), get(admin::new_perm_form))
        .route(&format!("{admin}/save_config"), post(admin::save_config))
        .route(&format!("{admin}/change_password"), post(admin::change_password))
        .route(&format!("{admin}/new_user"), post(admin::new_user))
        .route(&format!("{admin}/delete_user"), post(admin::delete_user))
        .route(&format!("{admin}/new_perm"), post(admin::new_perm))
        .route(&format!("{admin}/change_perm"), post(admin::change_perm))
        .route(&format!("{admin}/delete_perm"), post(admin::delete_perm))
        .fallback(browse)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::SERVER,
                    HeaderValue::from_static(crate::APP_USER_AGENT),
                ))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(state: Arc<AppState>, port: u16) -> Result<()> {
    let admin_path = state.admin_path().to_string();
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);
    info!("Administration console on /{}", admin_path);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
