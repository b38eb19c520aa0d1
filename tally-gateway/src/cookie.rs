//! Session cookie parsing and `Set-Cookie` rendering.

use axum::http::{header, HeaderMap};

/// Value of the named cookie from the request's `Cookie` headers.
pub fn extract_session_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(&prefix))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn session_cookie(name: &str, token: &str, max_age: Option<i64>, secure: bool) -> String {
    let mut cookie = format!("{name}={token}; HttpOnly; Path=/; SameSite=Lax");
    if let Some(seconds) = max_age {
        cookie.push_str(&format!("; Max-Age={}", seconds.max(0)));
    }
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(name: &str, secure: bool) -> String {
    session_cookie(name, "", Some(0), secure)
}
