//! Connection string parsing.
//!
//! ```text
//! Server = db.local ; User Id=app; PWD=secret; Database=shop
//! ```
//!
//! Segments are `key=value` separated by `;`. Keys are trimmed, lower-cased
//! and normalized through an alias table; unknown keys pass through trimmed
//! with their original case. Values are trimmed and may be empty. The last
//! occurrence of a key wins. A segment that is not `key=value` is an error.

use std::collections::BTreeMap;

use nom::{
    IResult,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    sequence::separated_pair,
};
use serde::{Deserialize, Serialize};

use crate::error::{BindError, BindResult};

/// Normalized keys understood by [`ConnectOptions`].
pub mod keys {
    pub const HOST: &str = "host";
    pub const PORT: &str = "port";
    pub const PROTOCOL: &str = "protocol";
    pub const CHARSET: &str = "charset";
    pub const ALLOW_BATCH: &str = "allow batch";
    pub const DATABASE: &str = "database";
    pub const PWD: &str = "pwd";
    pub const UID: &str = "uid";
    pub const SOCKET: &str = "socket";
}

const ALIASES: &[(&str, &str)] = &[
    ("host", keys::HOST),
    ("server", keys::HOST),
    ("data source", keys::HOST),
    ("datasource", keys::HOST),
    ("address", keys::HOST),
    ("addr", keys::HOST),
    ("network address", keys::HOST),
    ("port", keys::PORT),
    ("protocol", keys::PROTOCOL),
    ("charset", keys::CHARSET),
    ("character set", keys::CHARSET),
    ("allow batch", keys::ALLOW_BATCH),
    ("database", keys::DATABASE),
    ("initial catalog", keys::DATABASE),
    ("pwd", keys::PWD),
    ("password", keys::PWD),
    ("uid", keys::UID),
    ("user id", keys::UID),
    ("username", keys::UID),
    ("user name", keys::UID),
    ("socket", keys::SOCKET),
];

/// Map a raw key to its normalized form.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, key)| key.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parsed connection string with normalized, unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionString {
    entries: BTreeMap<String, String>,
}

impl ConnectionString {
    pub fn parse(input: &str) -> BindResult<Self> {
        let mut entries = BTreeMap::new();
        let mut offset = 0;
        for segment in input.split(';') {
            let start = offset;
            offset += segment.len() + 1;
            if segment.trim().is_empty() {
                continue;
            }
            let (key, value) = parse_segment(segment)
                .map_err(|(at, message)| BindError::parse(start + at, message))?;
            entries.insert(normalize_key(key), value.trim().to_string());
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.entries
    }
}

impl std::str::FromStr for ConnectionString {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c.is_whitespace()
}

fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(
        take_while1(is_key_char),
        char('='),
        take_while(|c: char| c != ';'),
    )(input)
}

/// Split one segment; on failure return the offending offset and a message.
fn parse_segment(segment: &str) -> Result<(&str, &str), (usize, String)> {
    match key_value(segment) {
        Ok((_, (key, _))) if key.trim().is_empty() => {
            Err((0, "empty key".to_string()))
        }
        Ok((_, pair)) => Ok(pair),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            let at = segment.len() - e.input.len();
            let message = match e.input.chars().next() {
                Some(c) => format!("unexpected character '{c}', expected key=value"),
                None => "expected '=' after key".to_string(),
            };
            Err((at, message))
        }
        Err(nom::Err::Incomplete(_)) => Err((segment.len(), "incomplete segment".to_string())),
    }
}

/// Typed view of a normalized connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub charset: Option<String>,
    pub allow_batch: Option<bool>,
    pub database: Option<String>,
    pub password: Option<String>,
    pub user: Option<String>,
    pub socket: Option<String>,
    /// Keys with no typed field.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ConnectOptions {
    pub fn from_connection_string(input: &str) -> BindResult<Self> {
        Self::try_from(ConnectionString::parse(input)?)
    }

    /// Whether multi-statement batches were requested.
    pub fn batch_enabled(&self) -> bool {
        self.allow_batch.unwrap_or(false)
    }

    /// Overlay every field set in `other`.
    pub fn merge(&mut self, other: ConnectOptions) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.host, other.host);
        take(&mut self.port, other.port);
        take(&mut self.protocol, other.protocol);
        take(&mut self.charset, other.charset);
        take(&mut self.allow_batch, other.allow_batch);
        take(&mut self.database, other.database);
        take(&mut self.password, other.password);
        take(&mut self.user, other.user);
        take(&mut self.socket, other.socket);
        self.extra.extend(other.extra);
    }
}

impl TryFrom<ConnectionString> for ConnectOptions {
    type Error = BindError;

    fn try_from(conn: ConnectionString) -> BindResult<Self> {
        let mut options = ConnectOptions::default();
        for (key, value) in conn.into_map() {
            match key.as_str() {
                keys::HOST => options.host = Some(value),
                keys::PORT => {
                    let port = value
                        .parse()
                        .map_err(|_| BindError::Config(format!("invalid port '{value}'")))?;
                    options.port = Some(port);
                }
                keys::PROTOCOL => options.protocol = Some(value),
                keys::CHARSET => options.charset = Some(value),
                keys::ALLOW_BATCH => options.allow_batch = Some(parse_flag(&value)?),
                keys::DATABASE => options.database = Some(value),
                keys::PWD => options.password = Some(value),
                keys::UID => options.user = Some(value),
                keys::SOCKET => options.socket = Some(value),
                _ => {
                    options.extra.insert(key, value);
                }
            }
        }
        Ok(options)
    }
}

fn parse_flag(value: &str) -> BindResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(BindError::Config(format!("invalid flag '{value}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_aliases() {
        let conn = ConnectionString::parse("Server=foo;User Id=bar;PWD=baz").unwrap();
        let expected: BTreeMap<String, String> = [("host", "foo"), ("uid", "bar"), ("pwd", "baz")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(conn.into_map(), expected);
    }

    #[test]
    fn test_trimming_and_last_wins() {
        let conn =
            ConnectionString::parse("  Data Source = a ; host=b;; Initial Catalog= shop ;").unwrap();
        assert_eq!(conn.get("host"), Some("b"));
        assert_eq!(conn.get("database"), Some("shop"));
        assert_eq!(conn.len(), 2);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let conn = ConnectionString::parse("Connect Timeout=5;charset=utf8mb4").unwrap();
        assert_eq!(conn.get("Connect Timeout"), Some("5"));
        assert_eq!(conn.get("charset"), Some("utf8mb4"));
    }

    #[test]
    fn test_empty_input() {
        assert!(ConnectionString::parse("").unwrap().is_empty());
        assert!(ConnectionString::parse(" ; ;").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_segments() {
        let err = ConnectionString::parse("host=a;garbage").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parse error at position 14: expected '=' after key"
        );

        let err = ConnectionString::parse("host=a;po-rt=1").unwrap_err();
        assert!(matches!(err, BindError::Parse { position: 9, .. }));

        let err = ConnectionString::parse("=value").unwrap_err();
        assert!(matches!(err, BindError::Parse { position: 0, .. }));

        let err = ConnectionString::parse("  =value").unwrap_err();
        assert!(matches!(err, BindError::Parse { position: 0, .. }));
    }

    #[test]
    fn test_connect_options() {
        let options = ConnectOptions::from_connection_string(
            "server=db;port=3307;uid=app;password=pw;charset=utf8;allow batch=yes;Compress=1",
        )
        .unwrap();
        assert_eq!(options.host.as_deref(), Some("db"));
        assert_eq!(options.port, Some(3307));
        assert_eq!(options.user.as_deref(), Some("app"));
        assert_eq!(options.password.as_deref(), Some("pw"));
        assert!(options.batch_enabled());
        assert_eq!(options.extra.get("Compress").map(String::as_str), Some("1"));

        assert!(matches!(
            ConnectOptions::from_connection_string("port=http"),
            Err(BindError::Config(_))
        ));
    }

    #[test]
    fn test_merge() {
        let mut base = ConnectOptions::from_connection_string("host=a;database=x").unwrap();
        base.merge(ConnectOptions {
            host: Some("b".into()),
            port: Some(3306),
            ..ConnectOptions::default()
        });
        assert_eq!(base.host.as_deref(), Some("b"));
        assert_eq!(base.database.as_deref(), Some("x"));
        assert_eq!(base.port, Some(3306));
    }
}
