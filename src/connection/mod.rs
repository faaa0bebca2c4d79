//! Connection facade over a [`Driver`].

mod conn_str;
mod statement;

pub use conn_str::{ConnectOptions, ConnectionString, keys, normalize_key};
pub use statement::PreparedStatement;

use tracing::{debug, info};

use crate::binding::Rows;
use crate::config::ClientConfig;
use crate::driver::{Connector, Driver, LibraryGuard};
use crate::error::BindResult;
use crate::types::Value;

/// An open connection.
///
/// Holds the driver library alive; the driver is dropped before the library
/// guard.
pub struct Connection<D: Driver> {
    driver: D,
    options: ConnectOptions,
    _library: LibraryGuard,
}

impl<D: Driver> Connection<D> {
    /// Connect using a connection string.
    pub fn open<C>(connector: &C, conn_str: &str) -> BindResult<Self>
    where
        C: Connector<Driver = D>,
    {
        Self::open_with(connector, ConnectOptions::from_connection_string(conn_str)?)
    }

    /// Connect using a loaded configuration.
    pub fn from_config<C>(connector: &C, config: &ClientConfig) -> BindResult<Self>
    where
        C: Connector<Driver = D>,
    {
        Self::open_with(connector, config.connect_options()?)
    }

    pub fn open_with<C>(connector: &C, options: ConnectOptions) -> BindResult<Self>
    where
        C: Connector<Driver = D>,
    {
        let library = connector.library().acquire()?;
        let driver = connector.connect(&options)?;
        info!(
            host = options.host.as_deref().unwrap_or("localhost"),
            database = options.database.as_deref().unwrap_or(""),
            "connection opened"
        );
        let mut conn = Self {
            driver,
            options,
            _library: library,
        };
        if let Some(charset) = conn.options.charset.clone() {
            conn.execute_non_query(&format!("SET NAMES {charset}"))?;
        }
        Ok(conn)
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn ping(&mut self) -> BindResult<()> {
        self.driver.ping()?;
        Ok(())
    }

    pub fn change_database(&mut self, name: &str) -> BindResult<()> {
        self.driver.select_database(name)?;
        debug!(database = name, "database changed");
        self.options.database = Some(name.to_string());
        Ok(())
    }

    pub fn prepare(&mut self, sql: &str) -> BindResult<PreparedStatement<D::Statement>> {
        let handle = self.driver.prepare(sql)?;
        Ok(PreparedStatement::new(sql, handle))
    }

    /// Run `sql` as text and sum row counts over every result set.
    pub fn execute_non_query(&mut self, sql: &str) -> BindResult<u64> {
        self.driver.query(sql)?;
        let mut total = 0;
        loop {
            total += match self.driver.store_result()? {
                Some(rows) if rows > 0 => rows,
                _ => self.driver.affected_rows(),
            };
            if !self.driver.next_result()? {
                break;
            }
        }
        debug!(sql, rows = total, "non-query finished");
        Ok(total)
    }

    /// Prepare, bind `values` by position and execute.
    pub fn execute_non_query_with<I>(&mut self, sql: &str, values: I) -> BindResult<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.prepare(sql)?.execute_non_query_with(values)
    }

    /// Prepare, bind `values` by position and open a cursor that owns the
    /// statement.
    pub fn execute_reader_with<I>(
        &mut self,
        sql: &str,
        values: I,
    ) -> BindResult<Rows<'static, D::Statement>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
        D::Statement: 'static,
    {
        let mut stmt = self.prepare(sql)?;
        stmt.bind_values(values)?;
        stmt.into_reader()
    }

    pub fn close(self) {}
}

impl<D: Driver> Drop for Connection<D> {
    fn drop(&mut self) {
        info!(
            host = self.options.host.as_deref().unwrap_or("localhost"),
            "connection closed"
        );
    }
}

impl<D: Driver> std::fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.options.host)
            .field("database", &self.options.database)
            .finish()
    }
}
