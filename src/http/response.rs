//! Response envelope produced by the pipeline.
//!
//! # Responsibilities
//! - Hold status, body content, headers and cookies in memory
//! - Track whether the response was prebuilt by an action or callback
//! - Emit headers and cookies exactly once (`send_headers` / `send_cookies`)
//! - Convert into an axum response for the HTTP host
//!
//! # Design Decisions
//! - Headers are computed fully in memory; "sending" only flips a flag and
//!   logs, the host writes them when converting to an axum response
//! - Header names are case-insensitive (stored lowercase)
//! - A prebuilt response keeps its content; the pipeline never touches it

use std::collections::BTreeMap;
use std::fmt;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;

/// Case-insensitive header bag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Headers {
    entries: BTreeMap<String, String>,
    raw: Vec<String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Add a raw header line such as `HTTP/1.1 304 Not Modified`.
    ///
    /// Lines of the form `Name: value` are split and stored as regular
    /// headers; anything else is kept verbatim.
    pub fn set_raw(&mut self, line: impl Into<String>) {
        let line = line.into();
        match line.split_once(':') {
            Some((name, value)) if !name.contains(' ') && !name.is_empty() => {
                self.set(name.trim(), value.trim());
            }
            _ => self.raw.push(line),
        }
    }

    /// Remove a header. Returns the previous value if any.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    /// Drop every header.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.raw.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn raw_lines(&self) -> &[String] {
        &self.raw
    }
}

/// A cookie queued on the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub max_age: Option<u64>,
    pub http_only: bool,
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: Some("/".to_string()),
            max_age: None,
            http_only: true,
            secure: false,
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={}", path)?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age)?;
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        Ok(())
    }
}

/// The single response produced per handled request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    status: u16,
    content: Option<String>,
    headers: Headers,
    cookies: Vec<Cookie>,
    prebuilt: bool,
    headers_sent: bool,
    cookies_sent: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty 200 response.
    pub fn new() -> Self {
        Self {
            status: 200,
            content: None,
            headers: Headers::new(),
            cookies: Vec::new(),
            prebuilt: false,
            headers_sent: false,
            cookies_sent: false,
        }
    }

    /// A finalized response returned directly by an action or match callback.
    pub fn prebuilt(content: impl Into<String>) -> Self {
        let mut response = Self::new();
        response.content = Some(content.into());
        response.prebuilt = true;
        response
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Replace the body. Ignored (with a warning) on prebuilt responses.
    pub fn set_content(&mut self, content: impl Into<String>) {
        if self.prebuilt {
            tracing::warn!("Refusing to overwrite content of a prebuilt response");
            return;
        }
        self.content = Some(content.into());
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn set_cookie(&mut self, cookie: Cookie) {
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
    }

    pub fn is_prebuilt(&self) -> bool {
        self.prebuilt
    }

    /// Mark as finalized: the pipeline must not mutate content afterwards.
    pub fn mark_prebuilt(&mut self) {
        self.prebuilt = true;
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn cookies_sent(&self) -> bool {
        self.cookies_sent
    }

    /// Emit headers. Returns `false` if they were already sent.
    pub fn send_headers(&mut self) -> bool {
        if self.headers_sent {
            tracing::warn!("Headers already sent");
            return false;
        }
        self.headers_sent = true;
        tracing::trace!(status = self.status, count = self.headers.len(), "Headers sent");
        true
    }

    /// Emit cookies. Returns `false` if they were already sent.
    pub fn send_cookies(&mut self) -> bool {
        if self.cookies_sent {
            tracing::warn!("Cookies already sent");
            return false;
        }
        self.cookies_sent = true;
        tracing::trace!(count = self.cookies.len(), "Cookies sent");
        true
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = axum::response::Response::new(Body::from(self.content.unwrap_or_default()));

        let headers = response.headers_mut();
        for (name, value) in self.headers.iter() {
            match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid header"),
            }
        }
        // A raw status line overrides the status, as it would on the wire.
        for line in self.headers.raw_lines() {
            match status_line(line) {
                Some(code) => status = code,
                None => tracing::warn!(line = %line, "Dropping raw header line"),
            }
        }
        for cookie in &self.cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    headers.append(axum::http::header::SET_COOKIE, value);
                }
                Err(_) => tracing::warn!(cookie = %cookie.name, "Dropping invalid cookie"),
            }
        }

        *response.status_mut() = status;
        response
    }
}

/// Status code of an `HTTP/1.1 304 Not Modified` style line.
fn status_line(line: &str) -> Option<StatusCode> {
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?.parse::<u16>().ok()?;
    StatusCode::from_u16(code).ok()
}
