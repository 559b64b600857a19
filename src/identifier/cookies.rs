//! Cookie header plumbing for identifier tickets.
use std::time::Duration;

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub path: String,
    /// Off only for plain HTTP development setups.
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            secure: true,
        }
    }
}

impl CookieSettings {
    /// `HttpOnly; SameSite=Lax` cookie living for `max_age`.
    pub fn set(
        &self,
        name: &str,
        value: &str,
        max_age: Duration,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(name, value, max_age.as_secs())
    }

    pub fn clear(&self, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        self.build(name, "", 0)
    }

    fn build(
        &self,
        name: &str,
        value: &str,
        max_age: u64,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{name}={value}; Path={}; HttpOnly; SameSite=Lax; Max-Age={max_age}",
            self.path
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Value of cookie `name` across all `Cookie` headers of a request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` values collected while handling one request.
#[derive(Debug, Default)]
pub struct ResponseCookies(Vec<HeaderValue>);

impl ResponseCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cookie: HeaderValue) {
        self.0.push(cookie);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderValue> {
        self.0.iter()
    }

    pub fn into_headers(self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in self.0 {
            headers.append(SET_COOKIE, cookie);
        }
        headers
    }
}
