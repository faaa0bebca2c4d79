//! Scripted in-memory driver for testing.
//!
//! Each SQL text can be scripted with a parameter count and an ordered list
//! of outcomes, one per result set an execution produces. Unscripted SQL
//! counts its `?` placeholders and affects zero rows. Every execution is
//! recorded together with the decoded parameter values.
//!
//! ```
//! use mybind::driver::memory::{MemoryConnector, Script};
//! use mybind::Connection;
//!
//! let server = MemoryConnector::new();
//! server.script("DELETE FROM t", Script::new().affected(3));
//!
//! let mut conn = Connection::open(&server, "Server=localhost").unwrap();
//! assert_eq!(conn.execute_non_query("DELETE FROM t").unwrap(), 3);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::binding::BufferSlot;
use crate::connection::ConnectOptions;
use crate::types::Value;

use super::{
    ColumnMeta, Connector, Driver, DriverError, DriverLibrary, DriverResult, Fetch,
    StatementHandle,
};

/// Library state shared by all in-memory connections.
pub static MEMORY_LIBRARY: DriverLibrary = DriverLibrary::new(|| Ok(()), || {});

/// One result set produced by an execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rows {
        columns: Vec<ColumnMeta>,
        rows: Vec<Vec<Value>>,
    },
    Affected(u64),
    Fail(DriverError),
}

impl Outcome {
    pub fn rows(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Outcome::Rows { columns, rows }
    }

    pub fn affected(count: u64) -> Self {
        Outcome::Affected(count)
    }

    pub fn fail(code: u32, message: impl Into<String>) -> Self {
        Outcome::Fail(DriverError::new(code, message))
    }
}

/// Scripted behaviour for one SQL text.
#[derive(Debug, Clone, Default)]
pub struct Script {
    param_count: Option<usize>,
    outcomes: Vec<Outcome>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the placeholder count.
    pub fn params(mut self, count: usize) -> Self {
        self.param_count = Some(count);
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.outcomes.push(outcome);
        self
    }

    pub fn rows(self, columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        self.outcome(Outcome::rows(columns, rows))
    }

    pub fn affected(self, count: u64) -> Self {
        self.outcome(Outcome::affected(count))
    }

    pub fn fail(self, code: u32, message: impl Into<String>) -> Self {
        self.outcome(Outcome::fail(code, message))
    }

    fn param_count(&self, sql: &str) -> usize {
        self.param_count
            .unwrap_or_else(|| sql.matches('?').count())
    }

    fn outcomes(&self) -> VecDeque<Outcome> {
        if self.outcomes.is_empty() {
            VecDeque::from([Outcome::Affected(0)])
        } else {
            self.outcomes.iter().cloned().collect()
        }
    }
}

/// A recorded execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct Server {
    scripts: HashMap<String, Script>,
    executions: Vec<Execution>,
    connections: Vec<ConnectOptions>,
    database: Option<String>,
    pings: usize,
    refuse: Option<DriverError>,
}

type Shared = Arc<Mutex<Server>>;

fn lock(server: &Shared) -> MutexGuard<'_, Server> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

fn script_for(server: &Shared, sql: &str) -> Script {
    lock(server).scripts.get(sql).cloned().unwrap_or_default()
}

fn record(server: &Shared, sql: &str, params: Vec<Value>) {
    lock(server).executions.push(Execution {
        sql: sql.to_string(),
        params,
    });
}

/// Queue of outcomes for one execution.
#[derive(Debug, Default)]
struct Results {
    pending: VecDeque<Outcome>,
    current: Option<Outcome>,
}

impl Results {
    fn start(&mut self, outcomes: VecDeque<Outcome>) -> DriverResult<()> {
        self.pending = outcomes;
        self.advance().map(|_| ())
    }

    fn advance(&mut self) -> DriverResult<bool> {
        match self.pending.pop_front() {
            None => {
                self.current = None;
                Ok(false)
            }
            Some(Outcome::Fail(e)) => {
                self.current = None;
                self.pending.clear();
                Err(e)
            }
            Some(outcome) => {
                self.current = Some(outcome);
                Ok(true)
            }
        }
    }

    fn rows(&self) -> Option<&Vec<Vec<Value>>> {
        match &self.current {
            Some(Outcome::Rows { rows, .. }) => Some(rows),
            _ => None,
        }
    }

    fn affected(&self) -> u64 {
        match &self.current {
            Some(Outcome::Affected(n)) => *n,
            Some(Outcome::Rows { rows, .. }) => rows.len() as u64,
            _ => 0,
        }
    }
}

/// Dials in-memory connections that share one script table.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    server: Shared,
    library: &'static DriverLibrary,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::with_library(&MEMORY_LIBRARY)
    }

    /// Use a dedicated library so its live count can be observed in isolation.
    pub fn with_library(library: &'static DriverLibrary) -> Self {
        Self {
            server: Arc::default(),
            library,
        }
    }

    pub fn script(&self, sql: impl Into<String>, script: Script) {
        lock(&self.server).scripts.insert(sql.into(), script);
    }

    /// Make every following connect fail with `error`.
    pub fn refuse(&self, error: DriverError) {
        lock(&self.server).refuse = Some(error);
    }

    pub fn executions(&self) -> Vec<Execution> {
        lock(&self.server).executions.clone()
    }

    /// Options of every successful connect, in order.
    pub fn connections(&self) -> Vec<ConnectOptions> {
        lock(&self.server).connections.clone()
    }

    pub fn database(&self) -> Option<String> {
        lock(&self.server).database.clone()
    }

    pub fn pings(&self) -> usize {
        lock(&self.server).pings
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MemoryConnector {
    type Driver = MemoryDriver;

    fn library(&self) -> &'static DriverLibrary {
        self.library
    }

    fn connect(&self, options: &ConnectOptions) -> DriverResult<MemoryDriver> {
        let mut server = lock(&self.server);
        if let Some(e) = &server.refuse {
            return Err(e.clone());
        }
        server.connections.push(options.clone());
        server.database = options.database.clone();
        Ok(MemoryDriver {
            server: Arc::clone(&self.server),
            results: Results::default(),
        })
    }
}

/// One in-memory connection.
#[derive(Debug)]
pub struct MemoryDriver {
    server: Shared,
    results: Results,
}

impl Driver for MemoryDriver {
    type Statement = MemoryStatement;

    fn prepare(&mut self, sql: &str) -> DriverResult<MemoryStatement> {
        let script = script_for(&self.server, sql);
        Ok(MemoryStatement::new(sql, script, Arc::clone(&self.server)))
    }

    fn query(&mut self, sql: &str) -> DriverResult<()> {
        let script = script_for(&self.server, sql);
        record(&self.server, sql, Vec::new());
        self.results.start(script.outcomes())
    }

    fn store_result(&mut self) -> DriverResult<Option<u64>> {
        Ok(self.results.rows().map(|rows| rows.len() as u64))
    }

    fn affected_rows(&self) -> u64 {
        self.results.affected()
    }

    fn next_result(&mut self) -> DriverResult<bool> {
        self.results.advance()
    }

    fn ping(&mut self) -> DriverResult<()> {
        lock(&self.server).pings += 1;
        Ok(())
    }

    fn select_database(&mut self, name: &str) -> DriverResult<()> {
        if name.is_empty() {
            return Err(DriverError::new(1046, "No database selected"));
        }
        lock(&self.server).database = Some(name.to_string());
        Ok(())
    }
}

/// One in-memory prepared statement.
#[derive(Debug)]
pub struct MemoryStatement {
    sql: String,
    script: Script,
    server: Shared,
    bound: Vec<Value>,
    results: Results,
    cursor: usize,
}

impl MemoryStatement {
    fn new(sql: &str, script: Script, server: Shared) -> Self {
        Self {
            sql: sql.to_string(),
            script,
            server,
            bound: Vec::new(),
            results: Results::default(),
            cursor: 0,
        }
    }

    /// A statement not attached to any connection.
    pub fn detached(sql: &str, script: Script) -> Self {
        Self::new(sql, script, Shared::default())
    }

    /// Parameter values captured by the last `bind_params`.
    pub fn bound(&self) -> &[Value] {
        &self.bound
    }
}

impl StatementHandle for MemoryStatement {
    fn param_count(&self) -> usize {
        self.script.param_count(&self.sql)
    }

    fn bind_params(&mut self, params: &[BufferSlot]) -> DriverResult<()> {
        if params.len() != self.param_count() {
            return Err(DriverError::new(
                2031,
                "No data supplied for parameters in prepared statement",
            ));
        }
        self.bound = params
            .iter()
            .map(|slot| {
                slot.decode()
                    .map_err(|e| DriverError::new(2036, format!("Using unsupported buffer type: {e}")))
            })
            .collect::<DriverResult<_>>()?;
        Ok(())
    }

    fn execute(&mut self) -> DriverResult<()> {
        record(&self.server, &self.sql, self.bound.clone());
        self.cursor = 0;
        self.results.start(self.script.outcomes())
    }

    fn field_count(&self) -> usize {
        match &self.results.current {
            Some(Outcome::Rows { columns, .. }) => columns.len(),
            _ => 0,
        }
    }

    fn result_metadata(&self) -> Vec<ColumnMeta> {
        match &self.results.current {
            Some(Outcome::Rows { columns, .. }) => columns.clone(),
            _ => Vec::new(),
        }
    }

    fn store_result(&mut self) -> DriverResult<()> {
        Ok(())
    }

    fn num_rows(&self) -> u64 {
        self.results.rows().map_or(0, |rows| rows.len() as u64)
    }

    fn affected_rows(&self) -> u64 {
        self.results.affected()
    }

    fn fetch(&mut self, columns: &mut [BufferSlot]) -> DriverResult<Fetch> {
        let Some(row) = self.results.rows().and_then(|rows| rows.get(self.cursor)) else {
            return Ok(Fetch::NoData);
        };
        let mut truncated = false;
        for (slot, value) in columns.iter_mut().zip(row) {
            let mut binding = slot.binding_mut();
            if value.is_null() {
                binding.write_null();
                continue;
            }
            let encoded = value.encode(binding.tag).map_err(|e| {
                DriverError::new(2036, format!("Using unsupported buffer type: {e}"))
            })?;
            truncated |= binding.write(encoded.as_bytes());
        }
        self.cursor += 1;
        Ok(if truncated { Fetch::Truncated } else { Fetch::Row })
    }

    fn next_result(&mut self) -> DriverResult<bool> {
        self.cursor = 0;
        self.results.advance()
    }

    fn free_result(&mut self) -> DriverResult<()> {
        if let Some(rows) = self.results.rows() {
            self.cursor = rows.len();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_placeholders_are_counted() {
        let stmt = MemoryStatement::detached("INSERT INTO t VALUES (?, ?)", Script::new());
        assert_eq!(stmt.param_count(), 2);

        let stmt = MemoryStatement::detached("CALL p(?)", Script::new().params(3));
        assert_eq!(stmt.param_count(), 3);
    }

    #[test]
    fn test_outcome_sequence() {
        let script = Script::new()
            .rows(vec![ColumnMeta::new("n", FieldType::Long)], vec![vec![Value::Int32(1)]])
            .affected(2)
            .fail(1213, "Deadlock found when trying to get lock");
        let mut stmt = MemoryStatement::detached("CALL batch()", script);
        stmt.execute().unwrap();
        assert_eq!(stmt.field_count(), 1);
        assert_eq!(stmt.num_rows(), 1);

        assert!(stmt.next_result().unwrap());
        assert_eq!(stmt.field_count(), 0);
        assert_eq!(stmt.affected_rows(), 2);

        let err = stmt.next_result().unwrap_err();
        assert_eq!(err.code, 1213);
        assert!(!stmt.next_result().unwrap());
    }

    #[test]
    fn test_bind_records_values() {
        let mut slot = BufferSlot::new();
        slot.set_tag(crate::types::TypeTag::VarString);
        slot.store(b"abc");
        let mut stmt = MemoryStatement::detached("SELECT ?", Script::new());
        stmt.bind_params(std::slice::from_ref(&slot)).unwrap();
        assert_eq!(stmt.bound(), &[Value::Text("abc".into())]);

        let err = stmt.bind_params(&[]).unwrap_err();
        assert_eq!(err.code, 2031);
    }

    #[test]
    fn test_connector_records_options() {
        let connector = MemoryConnector::new();
        let options = ConnectOptions {
            database: Some("shop".into()),
            ..ConnectOptions::default()
        };
        let mut driver = connector.connect(&options).unwrap();
        assert_eq!(connector.database().as_deref(), Some("shop"));

        driver.select_database("audit").unwrap();
        driver.ping().unwrap();
        assert_eq!(connector.database().as_deref(), Some("audit"));
        assert_eq!(connector.pings(), 1);
        assert_eq!(connector.connections(), vec![options]);

        connector.refuse(DriverError::new(2003, "Can't connect to MySQL server"));
        assert_eq!(
            connector.connect(&ConnectOptions::default()).unwrap_err().code,
            2003
        );
    }
}
