use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/upload";
pub const ENDPOINT_ENV: &str = "PDF_REDACTOR_ENDPOINT";
pub const TIMEOUT_ENV: &str = "PDF_REDACTOR_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub endpoint: Url,
    /// `None` leaves the HTTP client's default behaviour in place.
    pub timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            timeout: None,
        }
    }
}

impl RelayConfig {
    /// Resolves settings with command line values first, then environment values.
    pub fn resolve(
        cli_endpoint: Option<String>,
        env_endpoint: Option<String>,
        cli_timeout: Option<String>,
        env_timeout: Option<String>,
    ) -> Result<Self> {
        let endpoint = match cli_endpoint.or(env_endpoint) {
            Some(raw) => parse_endpoint(&raw)?,
            None => Self::default().endpoint,
        };

        let timeout = cli_timeout
            .or(env_timeout)
            .map(|raw| parse_timeout(&raw))
            .transpose()?;

        Ok(Self { endpoint, timeout })
    }

    pub fn from_env_and_args(
        cli_endpoint: Option<String>,
        cli_timeout: Option<String>,
    ) -> Result<Self> {
        Self::resolve(
            cli_endpoint,
            std::env::var(ENDPOINT_ENV).ok(),
            cli_timeout,
            std::env::var(TIMEOUT_ENV).ok(),
        )
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid endpoint URL: {}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("unsupported endpoint scheme: {}", other)),
    }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid timeout seconds: {}", raw))?;
    if secs == 0 {
        return Err(anyhow!("timeout must be at least one second"));
    }
    Ok(Duration::from_secs(secs))
}
