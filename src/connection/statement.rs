//! Prepared statements.

use tracing::debug;

use crate::binding::{Handle, ParameterBinder, Rows};
use crate::driver::StatementHandle;
use crate::error::BindResult;
use crate::types::{TypeTag, Value};

/// A prepared statement with its parameter slots.
///
/// Slots keep their buffers between executions, so re-executing with values
/// no longer than before allocates nothing.
#[derive(Debug)]
pub struct PreparedStatement<S: StatementHandle> {
    sql: String,
    handle: S,
    params: ParameterBinder,
}

impl<S: StatementHandle> PreparedStatement<S> {
    pub(crate) fn new(sql: &str, handle: S) -> Self {
        let params = ParameterBinder::new(handle.param_count());
        debug!(sql, params = params.len(), "statement prepared");
        Self {
            sql: sql.to_string(),
            handle,
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &ParameterBinder {
        &self.params
    }

    pub fn bind_param(&mut self, pos: usize, tag: TypeTag) -> BindResult<()> {
        self.params.bind_param(pos, tag)
    }

    pub fn set_value(&mut self, pos: usize, value: impl Into<Value>) -> BindResult<()> {
        self.params.set_value(pos, value)
    }

    pub fn set_bytes(&mut self, pos: usize, bytes: &[u8]) -> BindResult<()> {
        self.params.set_bytes(pos, bytes)
    }

    pub fn set_null(&mut self, pos: usize) -> BindResult<()> {
        self.params.set_null(pos)
    }

    /// Set positions `0..n` from an ordered list.
    pub fn bind_values<I>(&mut self, values: I) -> BindResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.params.bind_values(values)
    }

    fn run(&mut self) -> BindResult<()> {
        self.params.validate()?;
        self.handle.bind_params(self.params.slots())?;
        self.handle.execute()?;
        debug!(sql = %self.sql, "statement executed");
        Ok(())
    }

    /// Execute and sum row counts over every result set produced.
    ///
    /// A result set that returned rows counts its rows; any other counts
    /// its affected rows.
    pub fn execute_non_query(&mut self) -> BindResult<u64> {
        self.run()?;
        let mut total = 0;
        loop {
            self.handle.store_result()?;
            let rows = self.handle.num_rows();
            total += if rows > 0 {
                rows
            } else {
                self.handle.affected_rows()
            };
            self.handle.free_result()?;
            if !self.handle.next_result()? {
                break;
            }
        }
        debug!(sql = %self.sql, rows = total, "non-query finished");
        Ok(total)
    }

    pub fn execute_non_query_with<I>(&mut self, values: I) -> BindResult<u64>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.bind_values(values)?;
        self.execute_non_query()
    }

    /// Execute and bind a cursor over the first result set.
    pub fn execute_reader(&mut self) -> BindResult<Rows<'_, S>> {
        self.run()?;
        Rows::new(Handle::Borrowed(&mut self.handle))
    }

    pub fn execute_reader_with<I>(&mut self, values: I) -> BindResult<Rows<'_, S>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.bind_values(values)?;
        self.execute_reader()
    }

    /// Execute and hand the statement over to the returned cursor.
    pub fn into_reader(mut self) -> BindResult<Rows<'static, S>>
    where
        S: 'static,
    {
        self.run()?;
        Rows::new(Handle::Owned(self.handle))
    }

    /// Release a pending result set without reading it.
    pub fn cancel(&mut self) -> BindResult<()> {
        self.handle.free_result()?;
        Ok(())
    }
}
