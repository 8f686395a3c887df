//! HTTP server configuration, resolved at startup alongside [`media_core::CoreConfig`].

use axum::http::HeaderValue;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:5000";

/// Origins allowed to make credentialed cross-origin requests by default.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["https://console.arcstrum.com", "http://localhost:3000"];

/// Default request body limit for uploads: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    addr: String,
    allowed_origins: Vec<HeaderValue>,
    max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| HeaderValue::from_static(*o))
                .collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Builds the configuration from raw environment values; `None` or blank values take the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending value if an origin is not a valid header value
    /// or the upload limit is not a positive integer.
    pub fn from_env_values(
        addr: Option<String>,
        allowed_origins: Option<String>,
        max_upload_bytes: Option<String>,
    ) -> Result<Self, String> {
        let defaults = Self::default();
        Ok(Self {
            addr: non_blank(addr).unwrap_or(defaults.addr),
            allowed_origins: match non_blank(allowed_origins) {
                Some(raw) => allowed_origins_from_env_value(&raw)?,
                None => defaults.allowed_origins,
            },
            max_upload_bytes: match non_blank(max_upload_bytes) {
                Some(raw) => max_upload_bytes_from_env_value(&raw)?,
                None => defaults.max_upload_bytes,
            },
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn allowed_origins(&self) -> &[HeaderValue] {
        &self.allowed_origins
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a comma separated origin list. Empty entries are skipped and trailing slashes dropped,
/// since browsers never send them in `Origin`.
///
/// A wildcard is rejected: credentialed CORS requires explicit origins.
pub fn allowed_origins_from_env_value(value: &str) -> Result<Vec<HeaderValue>, String> {
    value
        .split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(|o| {
            if o == "*" {
                return Err("wildcard CORS origin is not allowed with credentials".to_string());
            }
            HeaderValue::from_str(o).map_err(|_| format!("invalid CORS origin: '{}'", o))
        })
        .collect()
}

pub fn max_upload_bytes_from_env_value(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(format!("invalid upload limit: '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_service() {
        let cfg = ServerConfig::from_env_values(None, None, Some(" ".into())).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:5000");
        assert_eq!(cfg.max_upload_bytes(), 100 * 1024 * 1024);
        assert_eq!(
            cfg.allowed_origins(),
            &[
                HeaderValue::from_static("https://console.arcstrum.com"),
                HeaderValue::from_static("http://localhost:3000"),
            ]
        );
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let origins =
            allowed_origins_from_env_value(" https://a.example/ ,, http://b.example:8080").unwrap();
        assert_eq!(
            origins,
            vec![
                HeaderValue::from_static("https://a.example"),
                HeaderValue::from_static("http://b.example:8080"),
            ]
        );
        assert!(allowed_origins_from_env_value("bad\norigin").is_err());
        assert!(allowed_origins_from_env_value("*").is_err());
    }

    #[test]
    fn upload_limit_must_be_positive() {
        assert_eq!(max_upload_bytes_from_env_value("1024"), Ok(1024));
        assert!(max_upload_bytes_from_env_value("0").is_err());
        assert!(max_upload_bytes_from_env_value("lots").is_err());
    }
}
