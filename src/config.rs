use std::{fmt, net::SocketAddr, str::FromStr};

/// Upper bound for every `*_TTL_SECS` setting: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub session_secret: Option<Vec<u8>>,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub session_cookie_secure: bool,
}

// secrets stay out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .finish()
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let session_secret = match lookup("SESSION_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) if secret.len() < 64 => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_SECRET",
                    reason: "must be at least 64 bytes".into(),
                })
            }
            Some(secret) => Some(secret.into_bytes()),
            None => None,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://todo.db".into()),
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8000)))?,
            jwt_secret,
            session_secret,
            access_token_ttl_secs: ttl(&lookup, "ACCESS_TOKEN_TTL_SECS", 300)?,
            refresh_token_ttl_secs: ttl(&lookup, "REFRESH_TOKEN_TTL_SECS", 86_400)?,
            session_ttl_secs: ttl(&lookup, "SESSION_TTL_SECS", 1_209_600)?,
            session_cookie_secure: parse_or(&lookup, "SESSION_COOKIE_SECURE", false)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

fn ttl<F>(lookup: &F, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, name, default)? {
        secs if secs <= 0 => Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".into(),
        }),
        secs if secs > MAX_TTL_SECS => Err(ConfigError::Invalid {
            name,
            reason: format!("must not exceed {MAX_TTL_SECS} seconds"),
        }),
        secs => Ok(secs),
    }
}
