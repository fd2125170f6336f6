pub mod admin;
pub mod browse;
pub mod favicon;
pub mod health;
pub mod login;

pub use self::browse::browse;
pub use self::favicon::favicon;
pub use self::health::health;
pub use self::login::{login_action, logout};

// common functions for the handlers
use axum::{
    extract::ConnectInfo,
    http::{header::SET_COOKIE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

/// Remote IP of the connection, or an empty string when it is unknown.
#[must_use]
pub fn client_ip(connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    connect_info.map_or_else(String::new, |ConnectInfo(addr)| addr.ip().to_string())
}

/// First value of `name` in an urlencoded form, or `""`.
#[must_use]
pub fn field<'a>(form: &'a [(String, String)], name: &str) -> &'a str {
    form.iter()
        .find(|(key, _)| key == name)
        .map_or("", |(_, value)| value.as_str())
}

/// Every value of `name` in an urlencoded form.
pub fn fields<'a>(form: &'a [(String, String)], name: &'a str) -> impl Iterator<Item = &'a str> {
    form.iter()
        .filter(move |(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Attach the refreshed session cookie, if any, to a response.
pub fn respond(cookie: Option<HeaderValue>, status: StatusCode, body: impl IntoResponse) -> Response {
    let mut response = (status, body).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn client_ip_from_connect_info() {
        let info = ConnectInfo(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 4242));
        assert_eq!(client_ip(Some(&info)), "192.0.2.1");
        assert_eq!(client_ip(None), "");
    }

    #[test]
    fn form_fields() {
        let form = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "3".to_string()),
        ];
        assert_eq!(field(&form, "a"), "1");
        assert_eq!(field(&form, "missing"), "");
        assert_eq!(fields(&form, "a").collect::<Vec<_>>(), vec!["1", "3"]);
    }

    #[test]
    fn respond_sets_cookie() {
        let response = respond(
            Some(HeaderValue::from_static("msessionid=ABC; Path=/")),
            StatusCode::OK,
            "ok",
        );
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(SET_COOKIE),
            Some(&HeaderValue::from_static("msessionid=ABC; Path=/"))
        );
        assert!(respond(None, StatusCode::OK, "ok")
            .headers()
            .get(SET_COOKIE)
            .is_none());
    }
}
