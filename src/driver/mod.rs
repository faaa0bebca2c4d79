//! Driver boundary (wire protocol is owned by the driver).
//!
//! The binding layer never talks to a socket. It hands [`BufferSlot`]s to a
//! [`StatementHandle`] before execution and lets the handle fill result slots
//! in place during fetch. Anything that can honour these traits can back a
//! [`Connection`](crate::Connection):
//! - `library.rs` - process-wide init/teardown refcount
//! - `memory.rs` - scripted in-memory driver used by tests

pub mod library;
pub mod memory;

pub use library::{DriverLibrary, LibraryGuard};

use crate::binding::BufferSlot;
use crate::connection::ConnectOptions;
use crate::types::{FieldType, TypeTag};

/// Opaque failure reported by the driver, surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub code: u32,
    pub message: String,
}

impl DriverError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DriverError {}

pub type DriverResult<T> = Result<T, DriverError>;

/// Metadata the driver reports for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub field_type: FieldType,
    /// Declared maximum length in bytes.
    pub max_length: u32,
    pub unsigned: bool,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            max_length: 0,
            unsigned: false,
        }
    }

    pub fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Tag the column is fetched as.
    pub fn tag(&self) -> TypeTag {
        TypeTag::for_column(self.field_type, self.unsigned)
    }
}

/// Outcome of fetching one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Row,
    /// A row was fetched but at least one column did not fit its buffer.
    Truncated,
    NoData,
}

/// Connection-level driver operations.
pub trait Driver {
    type Statement: StatementHandle;

    fn prepare(&mut self, sql: &str) -> DriverResult<Self::Statement>;

    /// Run `sql` over the text protocol.
    fn query(&mut self, sql: &str) -> DriverResult<()>;

    /// Buffer the current text-protocol result. `None` when the statement
    /// produced no rows.
    fn store_result(&mut self) -> DriverResult<Option<u64>>;

    fn affected_rows(&self) -> u64;

    /// Advance to the next text-protocol result; `false` when exhausted.
    fn next_result(&mut self) -> DriverResult<bool>;

    fn ping(&mut self) -> DriverResult<()>;

    fn select_database(&mut self, name: &str) -> DriverResult<()>;
}

/// One prepared statement on the driver side.
pub trait StatementHandle {
    fn param_count(&self) -> usize;

    /// Hand the parameter slots to the driver for the next execution.
    fn bind_params(&mut self, params: &[BufferSlot]) -> DriverResult<()>;

    fn execute(&mut self) -> DriverResult<()>;

    /// Column count of the current result; 0 for non-row statements.
    fn field_count(&self) -> usize;

    fn result_metadata(&self) -> Vec<ColumnMeta>;

    /// Materialize the whole current result set on the client.
    fn store_result(&mut self) -> DriverResult<()>;

    fn num_rows(&self) -> u64;

    fn affected_rows(&self) -> u64;

    /// Write the next row into `columns` in place.
    fn fetch(&mut self, columns: &mut [BufferSlot]) -> DriverResult<Fetch>;

    /// Advance to the next result set; `false` when exhausted.
    fn next_result(&mut self) -> DriverResult<bool>;

    /// Release the current result set.
    fn free_result(&mut self) -> DriverResult<()>;
}

/// Dials a [`Driver`] from normalized connection options.
pub trait Connector {
    type Driver: Driver;

    /// Process-wide library state this driver depends on.
    fn library(&self) -> &'static DriverLibrary;

    fn connect(&self, options: &ConnectOptions) -> DriverResult<Self::Driver>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_meta_tag() {
        let col = ColumnMeta::new("id", FieldType::Long).unsigned();
        assert_eq!(col.tag(), TypeTag::UInt32);

        let col = ColumnMeta::new("name", FieldType::VarString).max_length(64);
        assert_eq!(col.tag(), TypeTag::VarString);
        assert_eq!(col.max_length, 64);
    }

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::new(2006, "MySQL server has gone away");
        assert_eq!(err.to_string(), "MySQL server has gone away");
        assert_eq!(err.code, 2006);
    }
}
