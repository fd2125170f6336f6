use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, StatusCode,
    },
    Router,
};
use piccolo::{
    piccolo::{router, state::AppState},
    settings::Settings,
    utils::hash_password,
};
use std::{
    fs,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tempfile::TempDir;
use tower::ServiceExt;

const FORM: &str = "application/x-www-form-urlencoded";

struct Fixture {
    app: Router,
    state: Arc<AppState>,
    _root: TempDir,
    _config: TempDir,
}

// root/
//   readme.txt  data.bin  public/  private/sub/secret.txt
fn fixture(delay: Duration) -> Result<Fixture> {
    let root = tempfile::tempdir()?;
    fs::write(root.path().join("readme.txt"), "hello piccolo")?;
    fs::write(root.path().join("data.bin"), [0u8, 1, 2, 3])?;
    fs::create_dir_all(root.path().join("public"))?;
    fs::create_dir_all(root.path().join("private").join("sub"))?;
    fs::write(
        root.path().join("private").join("sub").join("secret.txt"),
        "top secret",
    )?;

    let config = tempfile::tempdir()?;
    let mut settings = Settings::initial("alice", &hash_password("secret"), root.path(), 8080);
    settings
        .users
        .insert("bob".to_string(), hash_password("bobpass"));
    settings
        .users
        .insert("carol".to_string(), hash_password("carolpass"));
    settings
        .permissions
        .insert("/private".to_string(), "bob".to_string());
    settings.write_all(config.path())?;

    let state = Arc::new(
        AppState::new(config.path().to_path_buf(), Settings::load(config.path())?)
            .with_not_found_delay(delay),
    );

    Ok(Fixture {
        app: router(state.clone()),
        state,
        _root: root,
        _config: config,
    })
}

fn request(method: Method, uri: &str, cookie: Option<&str>, form: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    let body = match form {
        Some(form) => {
            builder = builder.header(CONTENT_TYPE, FORM);
            Body::from(form.to_string())
        }
        None => Body::empty(),
    };
    let mut request = builder.body(body)?;
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 40000))));
    Ok(request)
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Option<String>, String)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, cookie, String::from_utf8_lossy(&body).to_string()))
}

async fn login(app: &Router, username: &str, password: &str) -> Result<String> {
    let form = format!("username={username}&password={password}&redirect_url=%2F");
    let (status, cookie, _) = send(
        app,
        request(Method::POST, "/login_action", None, Some(&form))?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    cookie.context("login did not set a session cookie")
}

#[tokio::test]
async fn health_and_favicon() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    let (status, _, body) = send(&fixture.app, request(Method::GET, "/health", None, None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(env!("CARGO_PKG_VERSION")));

    let response = fixture
        .app
        .clone()
        .oneshot(request(Method::GET, "/favicon.ico", None, None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    Ok(())
}

#[tokio::test]
async fn anonymous_listing_hides_private_directories() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    let (status, cookie, body) = send(&fixture.app, request(Method::GET, "/", None, None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some_and(|c| c.starts_with("msessionid=")));
    assert!(body.contains(">readme.txt</a>"));
    assert!(body.contains(">public</a>"));
    assert!(!body.contains(">private</a>"));
    assert!(body.contains("1 directory, 2 files"));
    Ok(())
}

#[tokio::test]
async fn anonymous_is_asked_to_login_for_private_paths() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/private/sub/", None, None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("login_form"));
    assert!(body.contains("value=\"/private/sub\""));
    Ok(())
}

#[tokio::test]
async fn logged_user_sees_private_marker_but_is_denied() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;
    let cookie = login(&fixture.app, "carol", "carolpass").await?;

    let (_, _, body) = send(
        &fixture.app,
        request(Method::GET, "/", Some(&cookie), None)?,
    )
    .await?;
    assert!(body.contains(">private</a>"));
    assert!(body.contains("[PRIVATE]"));
    assert!(body.contains("carol"));

    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/private/sub", Some(&cookie), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("login_form"));
    assert!(body.contains("value=\"/private/sub\""));
    assert!(body.contains("carol"));
    Ok(())
}

#[tokio::test]
async fn allowed_user_downloads_private_file() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;
    let cookie = login(&fixture.app, "bob", "bobpass").await?;

    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/private/sub/secret.txt", Some(&cookie), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "top secret");
    Ok(())
}

#[tokio::test]
async fn files_inline_or_attachment() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/readme.txt", None, None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello piccolo");

    let response = fixture
        .app
        .clone()
        .oneshot(request(Method::GET, "/data.bin", None, None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    assert_eq!(disposition.as_deref(), Some("attachment; filename=\"data.bin\""));
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(body.as_ref(), &[0u8, 1, 2, 3]);
    Ok(())
}

#[tokio::test]
async fn missing_paths_are_delayed() -> Result<()> {
    let delay = Duration::from_millis(50);
    let fixture = fixture(delay)?;

    let started = Instant::now();
    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/nothing/here", None, None)?,
    )
    .await?;
    assert!(started.elapsed() >= delay);
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "sorry, nothing found here");

    // missing paths below a private directory answer the same way
    let (status, _, _) = send(
        &fixture.app,
        request(Method::GET, "/private/missing", None, None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(
        &fixture.app,
        request(Method::GET, "/%2e%2e/etc/passwd", None, None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn repeated_failures_ban_the_client() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    for _ in 0..5 {
        let (status, cookie, _) = send(
            &fixture.app,
            request(
                Method::POST,
                "/login_action",
                None,
                Some("username=alice&password=wrong&redirect_url=%2F"),
            )?,
        )
        .await?;
        assert_eq!(status, StatusCode::OK);
        assert!(cookie.is_none());
    }

    // even the right password is refused now
    let (status, _, body) = send(
        &fixture.app,
        request(
            Method::POST,
            "/login_action",
            None,
            Some("username=alice&password=secret&redirect_url=%2F"),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, "too many failed logins; try again later");

    let (status, _, _) = send(
        &fixture.app,
        request(Method::GET, "/?login=spontaneous", None, None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}

#[tokio::test]
async fn logout_forgets_the_user() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;
    let cookie = login(&fixture.app, "bob", "bobpass").await?;

    let (status, _, _) = send(
        &fixture.app,
        request(Method::GET, "/logout", Some(&cookie), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = send(
        &fixture.app,
        request(Method::GET, "/private", Some(&cookie), None)?,
    )
    .await?;
    assert!(body.contains("login_form"));
    Ok(())
}

#[tokio::test]
async fn admin_console_requires_an_administrator() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    let (_, _, body) = send(&fixture.app, request(Method::GET, "/admin", None, None)?).await?;
    assert!(body.contains("login_form"));

    let carol = login(&fixture.app, "carol", "carolpass").await?;
    let (status, _, body) = send(
        &fixture.app,
        request(
            Method::POST,
            "/admin/new_user",
            Some(&carol),
            Some("new_user_usr=mallory&new_user_pwd=mallory"),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "access denied for user \"carol\"");
    assert!(!fixture.state.settings().users.contains_key("mallory"));

    let alice = login(&fixture.app, "alice", "secret").await?;
    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/admin", Some(&alice), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("admin_users"));
    Ok(())
}

#[tokio::test]
async fn admin_manages_users_and_permissions() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;
    let alice = login(&fixture.app, "alice", "secret").await?;

    let (status, _, _) = send(
        &fixture.app,
        request(
            Method::POST,
            "/admin/new_user",
            Some(&alice),
            Some("new_user_usr=dave&new_user_pwd=davepass"),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &fixture.app,
        request(
            Method::POST,
            "/admin/new_perm",
            Some(&alice),
            Some("new_perm_path=%2Fpublic&new_perm_user=dave&new_perm_user=carol"),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    {
        let settings = fixture.state.settings();
        assert!(settings.users.contains_key("dave"));
        assert!(settings.permissions.contains_key("/public"));
    }

    // the files on disk follow
    let reloaded = Settings::load(fixture.state.config_dir())?;
    assert!(reloaded.users.contains_key("dave"));
    assert!(reloaded.permissions.contains_key("/public"));

    let dave = login(&fixture.app, "dave", "davepass").await?;
    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/public", Some(&dave), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Contents of /public"));

    let (status, _, _) = send(
        &fixture.app,
        request(
            Method::POST,
            "/admin/delete_perm",
            Some(&alice),
            Some("delete_perm_path=%2Fpublic"),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!fixture.state.settings().permissions.contains_key("/public"));
    Ok(())
}

#[tokio::test]
async fn admin_status_follows_saved_parameters() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;
    let alice = login(&fixture.app, "alice", "secret").await?;
    let carol = login(&fixture.app, "carol", "carolpass").await?;

    let (status, _, body) = send(
        &fixture.app,
        request(
            Method::POST,
            "/admin/save_config",
            Some(&alice),
            Some("admin_users=carol&http_port=8081&admin_path=admin&root_directory="),
        )?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("needs a restart"));
    assert!(fixture.state.restart_needed());
    assert_eq!(fixture.state.settings().http_port()?, 8081);

    let (_, _, body) = send(
        &fixture.app,
        request(Method::GET, "/admin", Some(&alice), None)?,
    )
    .await?;
    assert!(body.contains("login_form"));

    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/admin", Some(&carol), None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("login_form"));
    Ok(())
}

#[tokio::test]
async fn non_canonical_paths_keep_private_files_private() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    for uri in [
        "/./private/sub/secret.txt",
        "//private/sub/secret.txt",
        "/private//sub/./secret.txt",
        "/%2e/private/sub/secret.txt",
    ] {
        let (status, _, body) = send(&fixture.app, request(Method::GET, uri, None, None)?).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(!body.contains("top secret"), "{uri}");
        assert!(body.contains("value=\"/private/sub/secret.txt\""), "{uri}");
    }

    let cookie = login(&fixture.app, "bob", "bobpass").await?;
    let (_, _, body) = send(
        &fixture.app,
        request(Method::GET, "//private/sub/secret.txt", Some(&cookie), None)?,
    )
    .await?;
    assert_eq!(body, "top secret");
    Ok(())
}

#[tokio::test]
async fn dot_listing_hides_private_directories() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    for uri in ["/.", "//", "/./"] {
        let (status, _, body) = send(&fixture.app, request(Method::GET, uri, None, None)?).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(body.contains(">public</a>"), "{uri}");
        assert!(!body.contains(">private</a>"), "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn repeated_query_parameters_still_browse() -> Result<()> {
    let fixture = fixture(Duration::ZERO)?;

    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/?login=spontaneous&login=other", None, None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("login_form"));

    let (status, _, body) = send(
        &fixture.app,
        request(Method::GET, "/?login=x&login=y", None, None)?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(">readme.txt</a>"));
    Ok(())
}
