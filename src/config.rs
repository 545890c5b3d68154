use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;

/// Accepted range for `TOKEN_TTL_HOURS`: one hour up to a year.
const TOKEN_TTL_RANGE: std::ops::RangeInclusive<i64> = 1..=8760;

/// Initial status given to a fresh sponsorship application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SponsorApproval {
    #[default]
    ReviewFirst,
    AutoApprove,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub token_ttl: time::Duration,
    pub sponsor_approval: SponsorApproval,
    pub cors_allow_origin: Option<String>,
    pub admin: Option<AdminBootstrap>,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let database_url = var("DATABASE_URL").unwrap_or_else(|| "sqlite://eventdesk.db".to_owned());
        let bind_addr = parse_or(&var, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;
        let max_connections = parse_or(&var, "DB_MAX_CONNECTIONS", 16u32)?;
        let token_ttl_hours = parse_or(&var, "TOKEN_TTL_HOURS", 24i64)?;
        if !TOKEN_TTL_RANGE.contains(&token_ttl_hours) {
            anyhow::bail!(
                "TOKEN_TTL_HOURS must be between {} and {}, got {token_ttl_hours}",
                TOKEN_TTL_RANGE.start(),
                TOKEN_TTL_RANGE.end()
            );
        }
        let auto_approve = parse_or(&var, "SPONSOR_AUTO_APPROVE", false)?;

        let admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap { email, password }),
            (None, None) => None,
            _ => anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together"),
        };

        Ok(Config {
            database_url,
            bind_addr,
            max_connections,
            token_ttl: time::Duration::hours(token_ttl_hours),
            sponsor_approval: if auto_approve {
                SponsorApproval::AutoApprove
            } else {
                SponsorApproval::ReviewFirst
            },
            cors_allow_origin: var("CORS_ALLOW_ORIGIN").filter(|o| o != "*"),
            admin,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_url, "sqlite://eventdesk.db");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.token_ttl, time::Duration::hours(24));
        assert_eq!(config.sponsor_approval, SponsorApproval::ReviewFirst);
        assert!(config.admin.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("SPONSOR_AUTO_APPROVE", "true"),
            ("TOKEN_TTL_HOURS", "2"),
            ("ADMIN_EMAIL", "root@example.com"),
            ("ADMIN_PASSWORD", "hunter22hunter"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.sponsor_approval, SponsorApproval::AutoApprove);
        assert_eq!(config.token_ttl, time::Duration::hours(2));
        assert_eq!(config.admin.unwrap().email, "root@example.com");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("DB_MAX_CONNECTIONS", "lots")])).unwrap_err();
        assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));
        assert!(Config::from_lookup(lookup(&[("ADMIN_EMAIL", "a@b.c")])).is_err());
    }

    #[test]
    fn token_ttl_must_stay_in_range() {
        for raw in ["0", "-5", "8761", "9000000000000000"] {
            let err = Config::from_lookup(lookup(&[("TOKEN_TTL_HOURS", raw)])).unwrap_err();
            assert!(err.to_string().contains("TOKEN_TTL_HOURS"), "{raw}: {err}");
        }
        let config = Config::from_lookup(lookup(&[("TOKEN_TTL_HOURS", "8760")])).unwrap();
        assert_eq!(config.token_ttl, time::Duration::hours(8760));
    }
}
