use std::fmt;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::directives::Directive;
use super::ConfigError;

pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_DB: i64 = 0;
pub const DEFAULT_REDIS_ADDRESS: &str = "127.0.0.1:6379";
pub const DEFAULT_REDIS_USERNAME: &str = "default";

// ── Membership ───────────────────────────────────────────────────────────────

/// Settings for the `ask_redis` set-membership module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
    /// Name of the Redis set holding the allowed domains.
    pub key: String,
}

impl Default for MembershipSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_REDIS_HOST.into(),
            port: DEFAULT_REDIS_PORT,
            db: DEFAULT_REDIS_DB,
            key: String::new(),
        }
    }
}

impl MembershipSettings {
    /// Apply directives on top of the defaults.
    ///
    /// Directives without a value are skipped, and an empty value resets the
    /// setting to its default.
    pub fn from_directives(directives: &[Directive]) -> Result<Self, ConfigError> {
        let mut s = Self::default();
        for d in directives {
            let Some(value) = d.value() else {
                continue;
            };
            match d.name.as_str() {
                "host" => s.host = non_empty_or(value, DEFAULT_REDIS_HOST),
                "port" => s.port = parse_port(value, d.line)?,
                "db" => s.db = parse_db(value),
                "key" => {
                    if !value.is_empty() {
                        s.key = value.to_owned();
                    }
                }
                other => debug!(directive = other, line = d.line, "ignoring unknown directive"),
            }
        }
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        Ok(())
    }

    /// `host:port` of the Redis server, for logs.
    pub fn address(&self) -> String {
        format_address(&self.host, self.port)
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                ..Default::default()
            },
        }
    }
}

// ── Permission ───────────────────────────────────────────────────────────────

/// Settings for the `permission redis` on-demand TLS module.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSettings {
    /// `host:port` (or `[v6]:port`) of the Redis server.
    pub address: String,
    pub username: String,
    pub password: Option<String>,
    pub db: i64,
    /// Prepended to the normalized hostname to form the lookup key.
    pub prefix: String,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_REDIS_ADDRESS.into(),
            username: DEFAULT_REDIS_USERNAME.into(),
            password: None,
            db: DEFAULT_REDIS_DB,
            prefix: String::new(),
        }
    }
}

impl fmt::Debug for PermissionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionSettings")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PermissionSettings {
    /// Apply directives on top of the defaults.
    ///
    /// `host` and `port` are accepted as a split spelling of `address`; when
    /// either appears, the address is rebuilt from both halves and wins over
    /// any `address` directive, whatever the order.
    pub fn from_directives(directives: &[Directive]) -> Result<Self, ConfigError> {
        let mut s = Self::default();
        let mut host: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut address_line: Option<usize> = None;

        for d in directives {
            let Some(value) = d.value() else {
                continue;
            };
            match d.name.as_str() {
                "address" => {
                    s.address = non_empty_or(value, DEFAULT_REDIS_ADDRESS);
                    address_line = Some(d.line);
                }
                "host" => host = Some(non_empty_or(value, DEFAULT_REDIS_HOST)),
                "port" => port = Some(parse_port(value, d.line)?),
                "username" => s.username = non_empty_or(value, DEFAULT_REDIS_USERNAME),
                "password" => {
                    s.password = (!value.is_empty()).then(|| value.to_owned());
                }
                "db" => s.db = parse_db(value),
                "prefix" => s.prefix = value.to_owned(),
                other => debug!(directive = other, line = d.line, "ignoring unknown directive"),
            }
        }

        if host.is_some() || port.is_some() {
            if let Some(line) = address_line {
                debug!(
                    line,
                    address = %s.address,
                    "'host'/'port' override the 'address' directive"
                );
            }
            s.address = format_address(
                host.as_deref().unwrap_or(DEFAULT_REDIS_HOST),
                port.unwrap_or(DEFAULT_REDIS_PORT),
            );
        }
        Ok(s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        parse_address(&self.address)?;
        Ok(())
    }

    pub fn connection_info(&self) -> Result<ConnectionInfo, ConfigError> {
        let (host, port) = parse_address(&self.address)?;
        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: self.db,
                // Redis only sends AUTH when a password is present.
                username: self.password.as_ref().map(|_| self.username.clone()),
                password: self.password.clone(),
                ..Default::default()
            },
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_owned()
    } else {
        value.to_owned()
    }
}

fn parse_port(value: &str, line: usize) -> Result<u16, ConfigError> {
    if value.is_empty() {
        return Ok(DEFAULT_REDIS_PORT);
    }
    value.parse().map_err(|_| ConfigError::InvalidValue {
        directive: "port".into(),
        value: value.into(),
        line,
    })
}

/// Non-numeric database indexes fall back to the default.
fn parse_db(value: &str) -> i64 {
    value.parse().unwrap_or(DEFAULT_REDIS_DB)
}

fn format_address(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Split `host:port`, `[v6]:port` or a bare host into its parts.
pub fn parse_address(address: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidAddress(address.to_owned());

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        match tail {
            "" => (host, None),
            _ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
        }
    } else {
        match address.split_once(':') {
            Some((host, port)) if !port.contains(':') => (host, Some(port)),
            Some(_) => return Err(invalid()),
            None => (address, None),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = match port {
        Some(p) => p.parse().map_err(|_| invalid())?,
        None => DEFAULT_REDIS_PORT,
    };
    Ok((host.to_owned(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(pairs: &[(&str, Option<&str>)]) -> Vec<Directive> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, (name, value))| Directive {
                name: name.to_string(),
                args: value.iter().map(|v| v.to_string()).collect(),
                line: i + 1,
            })
            .collect()
    }

    // ── membership ───────────────────────────────────────────────────────

    #[test]
    fn membership_defaults() {
        let s = MembershipSettings::from_directives(&[]).unwrap();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 6379);
        assert_eq!(s.db, 0);
        assert!(s.key.is_empty());
    }

    #[test]
    fn membership_reads_all_directives() {
        let s = MembershipSettings::from_directives(&directives(&[
            ("host", Some("redis.internal")),
            ("port", Some("6380")),
            ("db", Some("3")),
            ("key", Some("domains")),
        ]))
        .unwrap();
        assert_eq!(s.address(), "redis.internal:6380");
        assert_eq!(s.db, 3);
        assert_eq!(s.key, "domains");
        s.validate().unwrap();
    }

    #[test]
    fn membership_empty_values_reset_to_defaults() {
        let s = MembershipSettings::from_directives(&directives(&[
            ("host", Some("a")),
            ("host", Some("")),
            ("port", Some("")),
            ("db", Some("")),
        ]))
        .unwrap();
        assert_eq!(s.host, DEFAULT_REDIS_HOST);
        assert_eq!(s.port, DEFAULT_REDIS_PORT);
        assert_eq!(s.db, DEFAULT_REDIS_DB);
    }

    #[test]
    fn membership_ignores_valueless_and_unknown_directives() {
        let s = MembershipSettings::from_directives(&directives(&[
            ("key", Some("k")),
            ("key", None),
            ("host", None),
            ("whatever", Some("x")),
        ]))
        .unwrap();
        assert_eq!(s.key, "k");
        assert_eq!(s.host, DEFAULT_REDIS_HOST);
    }

    #[test]
    fn membership_non_numeric_db_falls_back() {
        let s = MembershipSettings::from_directives(&directives(&[("db", Some("two"))])).unwrap();
        assert_eq!(s.db, 0);
    }

    #[test]
    fn membership_invalid_port_is_an_error() {
        let err = MembershipSettings::from_directives(&directives(&[
            ("key", Some("k")),
            ("port", Some("70000")),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { line: 2, .. }),
            "{err}"
        );
    }

    #[test]
    fn membership_empty_key_fails_validation() {
        let s = MembershipSettings::from_directives(&directives(&[("key", Some(""))])).unwrap();
        assert!(matches!(s.validate(), Err(ConfigError::EmptyKey)));
    }

    #[test]
    fn membership_connection_info_uses_db() {
        let s = MembershipSettings {
            db: 4,
            key: "k".into(),
            ..Default::default()
        };
        let info = s.connection_info();
        assert_eq!(info.addr, ConnectionAddr::Tcp("127.0.0.1".into(), 6379));
        assert_eq!(info.redis.db, 4);
        assert!(info.redis.password.is_none());
    }

    // ── permission ───────────────────────────────────────────────────────

    #[test]
    fn permission_defaults() {
        let s = PermissionSettings::from_directives(&[]).unwrap();
        assert_eq!(s.address, DEFAULT_REDIS_ADDRESS);
        assert_eq!(s.username, DEFAULT_REDIS_USERNAME);
        assert!(s.password.is_none());
        assert!(s.prefix.is_empty());
    }

    #[test]
    fn permission_reads_all_directives() {
        let s = PermissionSettings::from_directives(&directives(&[
            ("address", Some("10.1.2.3:6390")),
            ("username", Some("caddy")),
            ("password", Some("hunter2")),
            ("prefix", Some("certificates/")),
            ("db", Some("2")),
        ]))
        .unwrap();
        s.validate().unwrap();
        let info = s.connection_info().unwrap();
        assert_eq!(info.addr, ConnectionAddr::Tcp("10.1.2.3".into(), 6390));
        assert_eq!(info.redis.username.as_deref(), Some("caddy"));
        assert_eq!(info.redis.password.as_deref(), Some("hunter2"));
        assert_eq!(info.redis.db, 2);
    }

    #[test]
    fn permission_host_and_port_build_address() {
        let s = PermissionSettings::from_directives(&directives(&[
            ("host", Some("redis.internal")),
            ("port", Some("6390")),
        ]))
        .unwrap();
        assert_eq!(s.address, "redis.internal:6390");

        let s = PermissionSettings::from_directives(&directives(&[("port", Some("7000"))])).unwrap();
        assert_eq!(s.address, "127.0.0.1:7000");
    }

    #[test]
    fn permission_host_and_port_win_over_address_in_any_order() {
        let before = PermissionSettings::from_directives(&directives(&[
            ("address", Some("10.0.0.1:6379")),
            ("host", Some("10.0.0.2")),
        ]))
        .unwrap();
        let after = PermissionSettings::from_directives(&directives(&[
            ("host", Some("10.0.0.2")),
            ("address", Some("10.0.0.1:6379")),
        ]))
        .unwrap();
        assert_eq!(before.address, "10.0.0.2:6379");
        assert_eq!(after.address, "10.0.0.2:6379");

        let port_only = PermissionSettings::from_directives(&directives(&[
            ("address", Some("10.0.0.1:6379")),
            ("port", Some("6390")),
        ]))
        .unwrap();
        assert_eq!(port_only.address, "127.0.0.1:6390");
    }

    #[test]
    fn permission_empty_values_reset() {
        let s = PermissionSettings::from_directives(&directives(&[
            ("address", Some("")),
            ("username", Some("")),
            ("password", Some("")),
        ]))
        .unwrap();
        assert_eq!(s.address, DEFAULT_REDIS_ADDRESS);
        assert_eq!(s.username, DEFAULT_REDIS_USERNAME);
        assert!(s.password.is_none());
    }

    #[test]
    fn permission_without_password_skips_auth() {
        let s = PermissionSettings {
            prefix: "p/".into(),
            ..Default::default()
        };
        let info = s.connection_info().unwrap();
        assert!(info.redis.username.is_none());
        assert!(info.redis.password.is_none());
    }

    #[test]
    fn permission_empty_prefix_fails_validation() {
        let s = PermissionSettings::from_directives(&directives(&[("prefix", Some(""))])).unwrap();
        assert!(matches!(s.validate(), Err(ConfigError::EmptyPrefix)));
    }

    #[test]
    fn permission_bad_address_fails_validation() {
        let s = PermissionSettings {
            address: "redis:notaport".into(),
            prefix: "p/".into(),
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn debug_redacts_password() {
        let s = PermissionSettings {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let out = format!("{s:?}");
        assert!(!out.contains("hunter2"), "{out}");
        assert!(out.contains("<redacted>"), "{out}");
    }

    // ── addresses ────────────────────────────────────────────────────────

    #[test]
    fn parses_address_forms() {
        assert_eq!(parse_address("h:1").unwrap(), ("h".into(), 1));
        assert_eq!(parse_address("h").unwrap(), ("h".into(), 6379));
        assert_eq!(parse_address("[::1]:6380").unwrap(), ("::1".into(), 6380));
        assert_eq!(parse_address("[::1]").unwrap(), ("::1".into(), 6379));
        assert!(parse_address("::1").is_err());
        assert!(parse_address(":6379").is_err());
        assert!(parse_address("[::1]6379").is_err());
    }

    #[test]
    fn formats_ipv6_hosts_with_brackets() {
        assert_eq!(format_address("::1", 6379), "[::1]:6379");
        assert_eq!(format_address("localhost", 1), "localhost:1");
    }
}
