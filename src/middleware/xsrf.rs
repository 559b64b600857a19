//! Request policy for the state-changing identifier endpoints.
//!
//! A request must carry `X-Identifier-XSRF: 1`, and whichever of `Origin`
//! or `Referer` it sends must point at the host it was sent to. Requests
//! carrying neither are let through with a warning since some browsers
//! strip both.
use axum::extract::Request;
use axum::http::{HeaderMap, header, header::AsHeaderName};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;
use url::Url;

use crate::error::AppError;

pub const XSRF_HEADER: &str = "x-identifier-xsrf";
pub const XSRF_VALUE: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingXsrfHeader,
    MissingHost,
    InvalidOrigin,
    OriginMismatch,
    InvalidReferer,
    RefererMismatch,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::MissingXsrfHeader => "missing xsrf header",
            Rejection::MissingHost => "missing host",
            Rejection::InvalidOrigin => "invalid origin value",
            Rejection::OriginMismatch => "origin does not match request host",
            Rejection::InvalidReferer => "invalid referer value",
            Rejection::RefererMismatch => "referer does not match request host",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Neither Origin nor Referer was sent.
    AllowedWithoutOrigin,
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// `host[:port]` of an absolute URL, port only when explicit and non-default.
fn url_authority(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn same_host(
    raw: &str,
    host: Option<&str>,
    invalid: Rejection,
    mismatch: Rejection,
) -> Result<(), Rejection> {
    let authority = url_authority(raw).ok_or(invalid)?;
    let host = host.ok_or(Rejection::MissingHost)?;
    if authority.eq_ignore_ascii_case(host) {
        Ok(())
    } else {
        Err(mismatch)
    }
}

/// Evaluate the policy against request headers. `host` is the authority the
/// request was addressed to.
pub fn check(headers: &HeaderMap, host: Option<&str>) -> Result<Verdict, Rejection> {
    if header_str(headers, XSRF_HEADER) != Some(XSRF_VALUE) {
        return Err(Rejection::MissingXsrfHeader);
    }

    if let Some(origin) = header_str(headers, header::ORIGIN) {
        same_host(origin, host, Rejection::InvalidOrigin, Rejection::OriginMismatch)?;
        return Ok(Verdict::Allowed);
    }
    if let Some(referer) = header_str(headers, header::REFERER) {
        same_host(
            referer,
            host,
            Rejection::InvalidReferer,
            Rejection::RefererMismatch,
        )?;
        return Ok(Verdict::Allowed);
    }

    Ok(Verdict::AllowedWithoutOrigin)
}

fn request_host(req: &Request) -> Option<String> {
    header_str(req.headers(), header::HOST)
        .map(str::to_string)
        .or_else(|| req.uri().authority().map(|authority| authority.to_string()))
}

pub async fn require_same_origin(req: Request, next: Next) -> Result<Response, AppError> {
    let host = request_host(&req);
    let headers = req.headers();

    match check(headers, host.as_deref()) {
        Ok(Verdict::Allowed) => {}
        Ok(Verdict::AllowedWithoutOrigin) => {
            warn!(
                host = host.as_deref().unwrap_or_default(),
                user_agent = header_str(headers, header::USER_AGENT).unwrap_or_default(),
                "identifier request without origin or referer"
            );
        }
        Err(rejection) => {
            warn!(
                reason = rejection.as_str(),
                host = host.as_deref().unwrap_or_default(),
                user_agent = header_str(headers, header::USER_AGENT).unwrap_or_default(),
                origin = header_str(headers, header::ORIGIN).unwrap_or_default(),
                referer = header_str(headers, header::REFERER).unwrap_or_default(),
                "identifier request rejected"
            );
            return Err(AppError::BadRequest);
        }
    }

    Ok(next.run(req).await)
}
