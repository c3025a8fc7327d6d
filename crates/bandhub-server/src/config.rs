use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Server settings, read from `BANDHUB_*` environment variables.
#[derive(Debug)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("BANDHUB_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BANDHUB_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let db_path = lookup("BANDHUB_DB_PATH").unwrap_or_else(|| "bandhub.db".into()).into();
        let host = lookup("BANDHUB_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("BANDHUB_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("BANDHUB_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let ttl_hours: i64 = lookup("BANDHUB_TOKEN_TTL_HOURS")
            .unwrap_or_else(|| "720".into()) // 30 days
            .parse()
            .context("BANDHUB_TOKEN_TTL_HOURS must be a whole number of hours")?;
        if ttl_hours <= 0 {
            bail!("BANDHUB_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            token_ttl: chrono::Duration::hours(ttl_hours),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("BANDHUB_JWT_SECRET", "s3cr3t-value")]).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("bandhub.db"));
        assert_eq!(cfg.addr.port(), 3000);
        assert_eq!(cfg.token_ttl, chrono::Duration::days(30));
    }

    #[test]
    fn missing_or_placeholder_secret_is_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("BANDHUB_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            ("BANDHUB_JWT_SECRET", "s3cr3t-value"),
            ("BANDHUB_HOST", "127.0.0.1"),
            ("BANDHUB_PORT", "8080"),
            ("BANDHUB_TOKEN_TTL_HOURS", "12"),
        ])
        .unwrap();
        assert_eq!(cfg.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(cfg.token_ttl, chrono::Duration::hours(12));

        assert!(config(&[("BANDHUB_JWT_SECRET", "s3cr3t-value"), ("BANDHUB_PORT", "http")]).is_err());
        assert!(config(&[("BANDHUB_JWT_SECRET", "s3cr3t-value"), ("BANDHUB_TOKEN_TTL_HOURS", "0")]).is_err());
    }
}
