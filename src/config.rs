//! Client configuration
//!
//! ```toml
//! connection_string = "Server=db.internal;Uid=app;Pwd=secret"
//!
//! [connection]
//! port = 3307
//! charset = "utf8mb4"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::ConnectOptions;
use crate::error::{BindError, BindResult};

/// Environment variable overriding the default config path.
pub const CONFIG_ENV: &str = "MYBIND_CONFIG";

/// Main client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection string (optional)
    pub connection_string: Option<String>,

    /// Structured overrides applied on top of the connection string
    pub connection: ConnectOptions,
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn from_toml_str(content: &str) -> BindResult<Self> {
        toml::from_str(content).map_err(|e| BindError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> BindResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "config loaded");
        Self::from_toml_str(&content)
    }

    /// `$MYBIND_CONFIG`, else `<config dir>/mybind/mybind.toml`.
    pub fn default_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::config_dir().map(|dir| dir.join("mybind").join("mybind.toml")),
        }
    }

    /// Load from [`default_path`](Self::default_path).
    ///
    /// A missing file under the config dir yields the default config; a
    /// path named by `$MYBIND_CONFIG` must exist.
    pub fn load_default() -> BindResult<Self> {
        let explicit = std::env::var_os(CONFIG_ENV).is_some();
        match Self::default_path() {
            Some(path) if explicit || path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse the connection string (if any) and overlay structured fields.
    pub fn connect_options(&self) -> BindResult<ConnectOptions> {
        let mut options = match &self.connection_string {
            Some(s) => ConnectOptions::from_connection_string(s)?,
            None => ConnectOptions::default(),
        };
        options.merge(self.connection.clone());
        Ok(options)
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn connection_string(mut self, conn_str: impl Into<String>) -> Self {
        self.config.connection_string = Some(conn_str.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.connection.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.connection.port = Some(port);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.connection.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.connection.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.config.connection.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.config.connection.charset = Some(charset.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
connection_string = "Server=db;Uid=app;Database=shop"

[connection]
port = 3307
database = "audit"
"#,
        )
        .unwrap();
        let options = config.connect_options().unwrap();
        assert_eq!(options.host.as_deref(), Some("db"));
        assert_eq!(options.user.as_deref(), Some("app"));
        assert_eq!(options.port, Some(3307));
        assert_eq!(options.database.as_deref(), Some("audit"));
    }

    #[test]
    fn test_empty_and_invalid() {
        assert_eq!(ClientConfig::from_toml_str("").unwrap(), ClientConfig::default());
        assert!(matches!(
            ClientConfig::from_toml_str("[connection]\nport = \"x\""),
            Err(BindError::Config(_))
        ));
        let config = ClientConfig::builder().connection_string("garbage").build();
        assert!(matches!(config.connect_options(), Err(BindError::Parse { .. })));
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder()
            .host("localhost")
            .port(3306)
            .user("root")
            .password("pw")
            .database("test")
            .charset("utf8")
            .build();
        let options = config.connect_options().unwrap();
        assert_eq!(options.host.as_deref(), Some("localhost"));
        assert_eq!(options.charset.as_deref(), Some("utf8"));
        assert_eq!(config.connection_string, None);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ClientConfig::load("/nonexistent/mybind.toml"),
            Err(BindError::Io(_))
        ));
    }
}
