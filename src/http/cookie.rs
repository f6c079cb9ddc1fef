//! Session cookies
//!
//! `Set-Cookie` values seen while receiving a response are parsed into
//! [`Cookie`]s and handed to a [`CookieStore`], keyed by the identity of the
//! server that sent them.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn from_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("strict") {
            Some(SameSite::Strict)
        } else if s.eq_ignore_ascii_case("lax") {
            Some(SameSite::Lax)
        } else if s.eq_ignore_ascii_case("none") {
            Some(SameSite::None)
        } else {
            None
        }
    }
}

/// A cookie from a `Set-Cookie` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: Option<String>,
    expires: Option<String>,
    max_age: Option<i64>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Cookie {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Parse a `Set-Cookie` header value
    ///
    /// Returns `None` when the leading `name=value` pair is missing or the
    /// name is empty. Unknown or malformed attributes are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let value = value.trim().trim_matches('"');
        let mut cookie = Cookie::new(name, value);

        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr.trim(), None),
            };

            match (key.to_ascii_lowercase().as_str(), val) {
                ("domain", Some(v)) if !v.is_empty() => {
                    cookie.domain = Some(v.trim_start_matches('.').to_ascii_lowercase());
                }
                ("path", Some(v)) if v.starts_with('/') => cookie.path = Some(v.to_string()),
                ("expires", Some(v)) => cookie.expires = Some(v.to_string()),
                ("max-age", Some(v)) => cookie.max_age = v.parse().ok(),
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                ("samesite", Some(v)) => cookie.same_site = SameSite::from_str(v),
                _ => {}
            }
        }

        Some(cookie)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Raw `Expires` attribute
    pub fn expires(&self) -> Option<&str> {
        self.expires.as_deref()
    }

    pub fn max_age(&self) -> Option<i64> {
        self.max_age
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn http_only(&self) -> bool {
        self.http_only
    }

    pub fn same_site(&self) -> Option<SameSite> {
        self.same_site
    }

    fn same_slot(&self, other: &Cookie) -> bool {
        self.name == other.name && self.path == other.path && self.domain == other.domain
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Destination for session cookies
///
/// Implementations must synchronize internally; the receiver calls
/// `set_session_cookie` through a shared reference from whatever thread is
/// reading the response.
pub trait CookieStore: Send + Sync {
    fn set_session_cookie(&self, server: &str, cookie: Cookie);
}

/// In-memory session cookie store keyed by server identity
#[derive(Debug, Default)]
pub struct SessionCookies {
    cookies: RwLock<HashMap<String, Vec<Cookie>>>,
}

impl SessionCookies {
    pub fn new() -> Self {
        SessionCookies {
            cookies: RwLock::new(HashMap::new()),
        }
    }

    /// All cookies stored for a server
    pub fn cookies_for(&self, server: &str) -> Vec<Cookie> {
        self.cookies
            .read()
            .get(server)
            .cloned()
            .unwrap_or_default()
    }

    /// Value for a `Cookie` request header, if any cookie is stored
    pub fn header_value(&self, server: &str) -> Option<String> {
        let cookies = self.cookies.read();
        let list = cookies.get(server).filter(|l| !l.is_empty())?;
        Some(
            list.iter()
                .map(Cookie::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Forget every cookie of a server
    pub fn clear(&self, server: &str) {
        self.cookies.write().remove(server);
    }
}

impl CookieStore for SessionCookies {
    fn set_session_cookie(&self, server: &str, cookie: Cookie) {
        let mut cookies = self.cookies.write();
        let list = cookies.entry(server.to_string()).or_default();
        match list.iter_mut().find(|c| c.same_slot(&cookie)) {
            Some(slot) => *slot = cookie,
            None => list.push(cookie),
        }
    }
}
