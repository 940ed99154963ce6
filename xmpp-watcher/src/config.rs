//! Watcher configuration, loaded from env.
//!
//! Variables: XMPP_USER, XMPP_PASSWORD (required); XMPP_HOST, XMPP_PORT, XMPP_ROOMS, XMPP_BOTS,
//! XMPP_VALIDATE_CERTIFICATE, XMPP_JOIN_TIMEOUT_SECS, XMPP_STATUS, LOG_FILE (optional).

use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

use anyhow::Result;

use crate::transport::ServerAddress;

pub const DEFAULT_PORT: u16 = 5222;
pub const DEFAULT_JOIN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STATUS: &str = "I am a bot";
pub const DEFAULT_LOG_FILE: &str = "logs/xmpp-watcher.log";

/// Values given on the command line; each one overrides its env variable.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Immutable session settings: account, server, rooms to join, bot allowlist.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Account address, `local@domain`.
    pub user: String,
    /// Account password; also sent as the room password on join.
    pub password: String,
    /// Explicit server host; when unset the domain is resolved through SRV records.
    pub host: Option<String>,
    pub port: u16,
    /// Rooms to join, in join order, without duplicates.
    pub rooms: Vec<String>,
    /// Authors whose messages are relayed.
    pub bots: BTreeSet<String>,
    pub validate_certificate: bool,
    /// How long to wait for a room to acknowledge a join before moving on.
    pub join_timeout: Duration,
    /// Presence status text.
    pub status: String,
    pub log_file: String,
}

impl SessionConfig {
    /// Builds a config with defaults for everything but the account.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            host: None,
            port: DEFAULT_PORT,
            rooms: Vec::new(),
            bots: BTreeSet::new(),
            validate_certificate: true,
            join_timeout: Duration::from_secs(DEFAULT_JOIN_TIMEOUT_SECS),
            status: DEFAULT_STATUS.to_string(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }

    pub fn with_rooms<I, S>(mut self, rooms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rooms = dedup_preserving_order(rooms.into_iter().map(Into::into));
        self
    }

    pub fn with_bots<I, S>(mut self, bots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bots = bots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = Some(host.into());
        self.port = port;
        self
    }

    pub fn with_validate_certificate(mut self, validate: bool) -> Self {
        self.validate_certificate = validate;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Loads from env. `overrides` take precedence over the matching variables.
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let user = match overrides.user {
            Some(user) => user,
            None => env::var("XMPP_USER").map_err(|_| anyhow::anyhow!("XMPP_USER not set"))?,
        };
        let password =
            env::var("XMPP_PASSWORD").map_err(|_| anyhow::anyhow!("XMPP_PASSWORD not set"))?;

        let host = overrides
            .host
            .or_else(|| env::var("XMPP_HOST").ok())
            .filter(|h| !h.trim().is_empty());
        let port = match overrides.port {
            Some(port) => port,
            None => match env::var("XMPP_PORT") {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("XMPP_PORT is not a valid port: {}", raw))?,
                Err(_) => DEFAULT_PORT,
            },
        };

        let rooms =
            dedup_preserving_order(split_list(&env::var("XMPP_ROOMS").unwrap_or_default()));
        let bots = split_list(&env::var("XMPP_BOTS").unwrap_or_default())
            .into_iter()
            .collect();

        let validate_certificate = match env::var("XMPP_VALIDATE_CERTIFICATE") {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                anyhow::anyhow!("XMPP_VALIDATE_CERTIFICATE must be true or false, got: {}", raw)
            })?,
            Err(_) => true,
        };

        let join_timeout_secs = match env::var("XMPP_JOIN_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("XMPP_JOIN_TIMEOUT_SECS is not a number of seconds: {}", raw)
            })?,
            Err(_) => DEFAULT_JOIN_TIMEOUT_SECS,
        };

        let status = env::var("XMPP_STATUS").unwrap_or_else(|_| DEFAULT_STATUS.to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

        Ok(Self {
            user,
            password,
            host,
            port,
            rooms,
            bots,
            validate_certificate,
            join_timeout: Duration::from_secs(join_timeout_secs),
            status,
            log_file,
        })
    }

    /// Validate config: well-formed account and room addresses, non-empty credential,
    /// own account not listed as a bot.
    pub fn validate(&self) -> Result<()> {
        let (local, domain) = self
            .user
            .split_once('@')
            .ok_or_else(|| anyhow::anyhow!("XMPP_USER must be local@domain, got: {}", self.user))?;
        if local.is_empty() || domain.is_empty() || domain.contains('/') {
            anyhow::bail!("XMPP_USER must be local@domain, got: {}", self.user);
        }
        if self.password.is_empty() {
            anyhow::bail!("XMPP_PASSWORD must not be empty");
        }
        if let Some(host) = &self.host {
            if host.contains(char::is_whitespace) {
                anyhow::bail!("XMPP_HOST is not a valid host: {}", host);
            }
        }
        for room in &self.rooms {
            match room.split_once('@') {
                Some((name, service)) if !name.is_empty() && !service.is_empty() => {}
                _ => anyhow::bail!("Room must be name@service, got: {}", room),
            }
        }
        if self.bots.contains(self.nickname()) {
            anyhow::bail!(
                "XMPP_BOTS must not contain the watcher's own account: {}",
                self.nickname()
            );
        }
        if self.join_timeout.is_zero() {
            anyhow::bail!("XMPP_JOIN_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    /// Nickname used in rooms: the account's local-part.
    pub fn nickname(&self) -> &str {
        self.user.split('@').next().unwrap_or(&self.user)
    }

    pub fn domain(&self) -> &str {
        self.user.split_once('@').map(|(_, d)| d).unwrap_or("")
    }

    pub fn is_bot(&self, author: &str) -> bool {
        self.bots.contains(author)
    }

    /// Where to connect: explicit host/port when configured, else SRV lookup of the domain.
    pub fn server_address(&self) -> ServerAddress {
        match &self.host {
            Some(host) => ServerAddress::Explicit {
                host: host.clone(),
                port: self.port,
            },
            None => ServerAddress::Srv,
        }
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "XMPP_USER",
        "XMPP_PASSWORD",
        "XMPP_HOST",
        "XMPP_PORT",
        "XMPP_ROOMS",
        "XMPP_BOTS",
        "XMPP_VALIDATE_CERTIFICATE",
        "XMPP_JOIN_TIMEOUT_SECS",
        "XMPP_STATUS",
        "LOG_FILE",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_load_config_with_defaults() {
        clear_env();
        env::set_var("XMPP_USER", "watcher@example.com");
        env::set_var("XMPP_PASSWORD", "secret");

        let config = SessionConfig::load(ConfigOverrides::default()).unwrap();

        assert_eq!(config.user, "watcher@example.com");
        assert_eq!(config.password, "secret");
        assert!(config.host.is_none());
        assert_eq!(config.port, 5222);
        assert!(config.rooms.is_empty());
        assert!(config.bots.is_empty());
        assert!(config.validate_certificate);
        assert_eq!(config.join_timeout, Duration::from_secs(30));
        assert_eq!(config.status, "I am a bot");
        assert_eq!(config.log_file, "logs/xmpp-watcher.log");
        assert_eq!(config.server_address(), ServerAddress::Srv);
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn test_load_config_with_custom_values() {
        clear_env();
        env::set_var("XMPP_USER", "watcher@example.com");
        env::set_var("XMPP_PASSWORD", "secret");
        env::set_var("XMPP_HOST", "xmpp.example.com");
        env::set_var("XMPP_PORT", "5223");
        env::set_var("XMPP_ROOMS", "team@conf.example, ops@conf.example,,team@conf.example");
        env::set_var("XMPP_BOTS", "alice, jenkins");
        env::set_var("XMPP_VALIDATE_CERTIFICATE", "false");
        env::set_var("XMPP_JOIN_TIMEOUT_SECS", "5");
        env::set_var("XMPP_STATUS", "Watching");

        let config = SessionConfig::load(ConfigOverrides::default()).unwrap();

        assert_eq!(config.host.as_deref(), Some("xmpp.example.com"));
        assert_eq!(config.port, 5223);
        assert_eq!(config.rooms, vec!["team@conf.example", "ops@conf.example"]);
        assert!(config.is_bot("alice"));
        assert!(config.is_bot("jenkins"));
        assert!(!config.validate_certificate);
        assert_eq!(config.join_timeout, Duration::from_secs(5));
        assert_eq!(config.status, "Watching");
        assert_eq!(
            config.server_address(),
            ServerAddress::Explicit {
                host: "xmpp.example.com".to_string(),
                port: 5223
            }
        );
    }

    #[test]
    #[serial]
    fn test_load_config_with_overrides() {
        clear_env();
        env::set_var("XMPP_USER", "env@example.com");
        env::set_var("XMPP_PASSWORD", "secret");
        env::set_var("XMPP_HOST", "env.example.com");

        let config = SessionConfig::load(ConfigOverrides {
            user: Some("cli@example.com".to_string()),
            host: Some("cli.example.com".to_string()),
            port: Some(15222),
        })
        .unwrap();

        assert_eq!(config.user, "cli@example.com");
        assert_eq!(config.host.as_deref(), Some("cli.example.com"));
        assert_eq!(config.port, 15222);
    }

    #[test]
    #[serial]
    fn test_load_config_missing_password() {
        clear_env();
        env::set_var("XMPP_USER", "watcher@example.com");

        let err = SessionConfig::load(ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("XMPP_PASSWORD"));
    }

    #[test]
    #[serial]
    fn test_load_config_invalid_port_and_bool() {
        clear_env();
        env::set_var("XMPP_USER", "watcher@example.com");
        env::set_var("XMPP_PASSWORD", "secret");
        env::set_var("XMPP_PORT", "not-a-port");
        assert!(SessionConfig::load(ConfigOverrides::default()).is_err());

        env::remove_var("XMPP_PORT");
        env::set_var("XMPP_VALIDATE_CERTIFICATE", "maybe");
        assert!(SessionConfig::load(ConfigOverrides::default()).is_err());
    }

    #[test]
    #[serial]
    fn test_load_config_invalid_join_timeout() {
        clear_env();
        env::set_var("XMPP_USER", "watcher@example.com");
        env::set_var("XMPP_PASSWORD", "secret");
        env::set_var("XMPP_JOIN_TIMEOUT_SECS", "soon");

        let err = SessionConfig::load(ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("XMPP_JOIN_TIMEOUT_SECS"));

        env::set_var("XMPP_JOIN_TIMEOUT_SECS", "-5");
        assert!(SessionConfig::load(ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_nickname_is_local_part() {
        let config = SessionConfig::new("watcher@example.com", "secret");
        assert_eq!(config.nickname(), "watcher");
        assert_eq!(config.domain(), "example.com");
    }

    #[test]
    fn test_validate_rejects_bad_account() {
        assert!(SessionConfig::new("watcher", "secret").validate().is_err());
        assert!(SessionConfig::new("@example.com", "secret").validate().is_err());
        assert!(SessionConfig::new("watcher@", "secret").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_password() {
        assert!(SessionConfig::new("watcher@example.com", "").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_own_account_as_bot() {
        let config = SessionConfig::new("watcher@example.com", "secret").with_bots(["watcher"]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("own account"));
    }

    #[test]
    fn test_validate_rejects_malformed_room() {
        let config = SessionConfig::new("watcher@example.com", "secret").with_rooms(["team"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_room_set_is_valid() {
        let config = SessionConfig::new("watcher@example.com", "secret");
        config.validate().unwrap();
    }

    #[test]
    fn test_with_rooms_dedups_in_order() {
        let config = SessionConfig::new("watcher@example.com", "secret")
            .with_rooms(["b@conf", "a@conf", "b@conf"]);
        assert_eq!(config.rooms, vec!["b@conf", "a@conf"]);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }
}
