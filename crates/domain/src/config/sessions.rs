use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session store and lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Sliding expiration window in seconds.  Every read or write of a
    /// session resets its remaining lifetime to this value.
    #[serde(default = "d_ttl_secs")]
    pub ttl_secs: u64,

    /// How often the memory store sweeps expired sessions.
    #[serde(default = "d_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Environment variable holding the identifier signing key.  When the
    /// variable is unset or empty a random key is generated at startup, which
    /// invalidates every outstanding identifier on restart.
    #[serde(default = "d_key_env")]
    pub key_env: String,

    /// Absolute lifetime of an issued identifier.  `None` keeps identifiers
    /// valid for as long as the signing key, so a cookie replayed after
    /// logout is accepted again (with an empty session).
    #[serde(default)]
    pub id_max_age_secs: Option<u64>,

    #[serde(default)]
    pub cookie: CookieConfig,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: d_ttl_secs(),
            sweep_interval_secs: d_sweep_interval_secs(),
            key_env: d_key_env(),
            id_max_age_secs: None,
            cookie: CookieConfig::default(),
        }
    }
}

impl SessionsConfig {
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn id_max_age(&self) -> Option<std::time::Duration> {
        self.id_max_age_secs.map(std::time::Duration::from_secs)
    }

    /// Settings that would stop the session cookie from being sent or kept,
    /// as `(field, message)` pairs.
    pub fn cookie_problems(&self) -> Vec<(&'static str, String)> {
        let mut problems = Vec::new();
        let cookie = &self.cookie;

        if cookie.name.is_empty() {
            problems.push(("sessions.cookie.name", "cookie name must not be empty".to_string()));
        } else if cookie.name.chars().any(|c| {
            c.is_ascii_control() || c.is_whitespace() || !c.is_ascii() || COOKIE_NAME_SEPARATORS.contains(&c)
        }) {
            problems.push((
                "sessions.cookie.name",
                format!("cookie name {:?} contains characters not allowed in a cookie name", cookie.name),
            ));
        }

        if cookie.path.is_empty()
            || cookie.path.chars().any(|c| c.is_ascii_control() || c == ';' || !c.is_ascii())
        {
            problems.push((
                "sessions.cookie.path",
                format!("cookie path {:?} cannot be sent in a Set-Cookie header", cookie.path),
            ));
        }

        if cookie.max_age_secs == Some(0) {
            problems.push((
                "sessions.cookie.max_age_secs",
                "cookie max age 0 makes clients discard the cookie immediately".to_string(),
            ));
        }

        if self.id_max_age_secs == Some(0) {
            problems.push((
                "sessions.id_max_age_secs",
                "identifier max age must be greater than 0".to_string(),
            ));
        }

        problems
    }

    /// Cookie lifetime: the explicit `max_age_secs` if set, else the session TTL.
    pub fn cookie_max_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cookie.max_age_secs.unwrap_or(self.ttl_secs))
    }
}

/// How the session identifier cookie is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "d_cookie_name")]
    pub name: String,
    #[serde(default = "d_cookie_path")]
    pub path: String,
    /// Emit the `Secure` attribute.  Only disable for plain-HTTP development.
    #[serde(default = "d_true")]
    pub secure: bool,
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: d_cookie_name(),
            path: d_cookie_path(),
            secure: true,
            max_age_secs: None,
        }
    }
}

/// Characters RFC 6265 forbids in a cookie name (plus controls and space).
const COOKIE_NAME_SEPARATORS: &[char] = &[
    '(', ')', '<', '>', '@', ',', ';', ':', '\\', '"', '/', '[', ']', '?', '=', '{', '}',
];

// ── serde default helpers ───────────────────────────────────────────

fn d_ttl_secs() -> u64 {
    30 * 60
}
fn d_sweep_interval_secs() -> u64 {
    60
}
fn d_key_env() -> String {
    "HS_SESSION_KEY".into()
}
fn d_cookie_name() -> String {
    "hs_session".into()
}
fn d_cookie_path() -> String {
    "/".into()
}
fn d_true() -> bool {
    true
}
