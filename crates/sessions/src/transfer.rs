//! Carrying the session identifier between client and server.
//!
//! [`CookieTransfer`] is the stock carrier: the identifier travels in a
//! cookie, issued with `HttpOnly`, `Path`, `Max-Age`/`Expires` derived from
//! the configured lifetime, and `Secure` unless explicitly disabled.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::header::{COOKIE, SET_COOKIE};
use http::request::Parts;
use http::{HeaderMap, HeaderValue};

use hs_domain::config::SessionsConfig;
use hs_domain::error::{Error, Result};

use crate::id::SessionId;

/// Reads the identifier from an inbound request and writes or clears it on
/// the outbound response.
pub trait Transfer: Send + Sync {
    /// `Ok(None)` when the request carries no identifier.
    fn get(&self, request: &Parts) -> std::result::Result<Option<SessionId>, TransferError>;

    fn set(&self, response: &mut HeaderMap, id: &SessionId);

    fn clear(&self, response: &mut HeaderMap);
}

/// The identifier carrier on the request could not be read.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("{header} header is not valid text")]
    InvalidHeader {
        header: &'static str,
        #[source]
        source: http::header::ToStrError,
    },

    #[error("cookie {name} is not valid percent-encoded UTF-8")]
    InvalidEncoding { name: String },
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Error::Transfer(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cookie transfer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct CookieTransfer {
    name: String,
    path: String,
    max_age: Duration,
    secure: bool,
}

impl CookieTransfer {
    pub fn new(name: impl Into<String>, max_age: Duration) -> Self {
        Self {
            name: name.into(),
            path: "/".into(),
            max_age,
            secure: true,
        }
    }

    /// Build from config, rejecting cookie settings that could not be sent
    /// or that clients would discard on arrival.
    pub fn from_config(config: &SessionsConfig) -> Result<Self> {
        let cookie = &config.cookie;
        if let Some((field, message)) = config.cookie_problems().into_iter().next() {
            return Err(Error::Config(format!("{field}: {message}")));
        }
        if HeaderValue::from_str(&format!("{}=; Path={}", cookie.name, cookie.path)).is_err() {
            return Err(Error::Config(format!(
                "session cookie {:?} with path {:?} is not a valid header value",
                cookie.name, cookie.path
            )));
        }
        Ok(Self {
            name: cookie.name.clone(),
            path: cookie.path.clone(),
            max_age: config.cookie_max_age(),
            secure: cookie.secure,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, response: &mut HeaderMap, cookie: SetCookie) {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.append(SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(cookie = %self.name, error = %e, "dropping unencodable Set-Cookie header");
            }
        }
    }
}

impl Transfer for CookieTransfer {
    fn get(&self, request: &Parts) -> std::result::Result<Option<SessionId>, TransferError> {
        for header in request.headers.get_all(COOKIE) {
            let raw = header
                .to_str()
                .map_err(|source| TransferError::InvalidHeader { header: "Cookie", source })?;

            for pair in raw.split(';') {
                let Some((name, value)) = pair.trim().split_once('=') else {
                    continue;
                };
                if name.trim() != self.name {
                    continue;
                }
                let value = urlencoding::decode(value.trim().trim_matches('"')).map_err(|_| {
                    TransferError::InvalidEncoding { name: self.name.clone() }
                })?;
                if value.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(SessionId::new(value.into_owned())));
            }
        }
        Ok(None)
    }

    fn set(&self, response: &mut HeaderMap, id: &SessionId) {
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        let expires = chrono::Duration::from_std(self.max_age)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        let cookie = SetCookie {
            name: self.name.clone(),
            value: id.as_str().to_owned(),
            path: Some(self.path.clone()),
            expires,
            max_age: Some(max_age),
            http_only: true,
            secure: self.secure,
        };
        self.append(response, cookie);
    }

    fn clear(&self, response: &mut HeaderMap) {
        let cookie = SetCookie {
            name: self.name.clone(),
            value: String::new(),
            path: Some(self.path.clone()),
            expires: Some(Utc::now() - chrono::Duration::seconds(1)),
            max_age: Some(-1),
            http_only: true,
            secure: self.secure,
        };
        self.append(response, cookie);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Set-Cookie value
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// One `Set-Cookie` header value.
///
/// `value` holds the decoded cookie value; rendering percent-encodes it.  A
/// negative `max_age` means "delete now" and renders as `Max-Age=0`, since the
/// header grammar has no negative numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
}

impl SetCookie {
    /// Parse a rendered `Set-Cookie` value.  Unknown attributes are ignored.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        let mut cookie = SetCookie {
            name: name.trim().to_owned(),
            value: urlencoding::decode(value.trim()).ok()?.into_owned(),
            path: None,
            expires: None,
            max_age: None,
            http_only: false,
            secure: false,
        };

        for attr in parts {
            let (key, val) = match attr.trim().split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr.trim(), None),
            };
            match (key.to_ascii_lowercase().as_str(), val) {
                ("path", Some(v)) => cookie.path = Some(v.to_owned()),
                ("max-age", Some(v)) => cookie.max_age = v.parse().ok(),
                ("expires", Some(v)) => {
                    cookie.expires = DateTime::parse_from_rfc2822(v)
                        .ok()
                        .map(|d| d.with_timezone(&Utc));
                }
                ("httponly", None) => cookie.http_only = true,
                ("secure", None) => cookie.secure = true,
                _ => {}
            }
        }
        Some(cookie)
    }

    /// Whether this header tells the client to drop the cookie.
    pub fn is_removal(&self) -> bool {
        self.max_age.is_some_and(|age| age <= 0)
            || self.expires.is_some_and(|at| at <= Utc::now())
    }
}

impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, urlencoding::encode(&self.value))?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(expires) = &self.expires {
            write!(f, "; Expires={}", expires.format(HTTP_DATE))?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={}", max_age.max(0))?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}
