//! Process configuration parsed from environment variables.
//!
//! Values needed at startup live in [`PortalConfig`]. The admin allowlist and
//! the Gemini key are deliberately absent: they are read per request (see
//! `services::auth` and `llm::config`) so an operator can rotate them without
//! restarting the process.

use time::UtcOffset;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_UTC_OFFSET: &str = "+05:30";
pub const DEFAULT_BACKEND_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Connection details for the backend-as-a-service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project base URL, without trailing slash.
    pub url: String,
    /// Public (anon) API key sent as `apikey` on every call.
    pub anon_key: String,
    pub timeouts: BackendTimeouts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub port: u16,
    pub backend: BackendConfig,
    /// Offset used for "local time" when marking sessions completed.
    pub local_offset: UtcOffset,
    /// Max prior turns forwarded to the chat model.
    pub chat_history_limit: usize,
}

impl PortalConfig {
    /// Build typed config from environment variables.
    ///
    /// Required: `SUPABASE_URL`, `SUPABASE_ANON_KEY`.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `PORTAL_UTC_OFFSET`: default `+05:30`
    /// - `BACKEND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BACKEND_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CHAT_HISTORY_LIMIT`: default 20
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = required("SUPABASE_URL")?.trim_end_matches('/').to_string();
        let anon_key = required("SUPABASE_ANON_KEY")?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let offset_raw = std::env::var("PORTAL_UTC_OFFSET").unwrap_or_else(|_| DEFAULT_UTC_OFFSET.to_string());
        let local_offset = parse_utc_offset(&offset_raw)
            .ok_or(ConfigError::Invalid { var: "PORTAL_UTC_OFFSET", value: offset_raw.clone() })?;

        let timeouts = BackendTimeouts {
            request_secs: env_parse("BACKEND_REQUEST_TIMEOUT_SECS", DEFAULT_BACKEND_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("BACKEND_CONNECT_TIMEOUT_SECS", DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self {
            port,
            backend: BackendConfig { url, anon_key, timeouts },
            local_offset,
            chat_history_limit: env_parse("CHAT_HISTORY_LIMIT", DEFAULT_CHAT_HISTORY_LIMIT),
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing { var }),
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parse `+HH:MM` / `-HH:MM` (also `HH:MM` and `Z`) into a [`UtcOffset`].
#[must_use]
pub fn parse_utc_offset(raw: &str) -> Option<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(UtcOffset::UTC);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1_i8, &raw[1..]),
        b'-' => (-1_i8, &raw[1..]),
        _ => (1_i8, raw),
    };
    let (hh, mm) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i8 = hh.parse().ok()?;
    let minutes: i8 = mm.parse().ok()?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
