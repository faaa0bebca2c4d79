//! # mybind: typed prepared-statement binding
//!
//! Maps Rust values to and from the native buffers a MySQL-style client
//! driver binds for prepared statements, and provides a calendar type whose
//! nanosecond ticks round-trip through Julian Day Numbers.
//!
//! ## Quick Example
//!
//! ```
//! use mybind::driver::memory::{MemoryConnector, Script};
//! use mybind::prelude::*;
//!
//! let server = MemoryConnector::new();
//! server.script(
//!     "SELECT id, name FROM users WHERE id = ?",
//!     Script::new().rows(
//!         vec![
//!             ColumnMeta::new("id", FieldType::Long),
//!             ColumnMeta::new("name", FieldType::VarString).max_length(64),
//!         ],
//!         vec![vec![Value::Int32(7), Value::from("Ada")]],
//!     ),
//! );
//!
//! let mut conn = Connection::open(&server, "Server=localhost;Uid=app").unwrap();
//! let mut stmt = conn.prepare("SELECT id, name FROM users WHERE id = ?").unwrap();
//! stmt.set_value(0, 7).unwrap();
//!
//! let mut rows = stmt.execute_reader().unwrap();
//! while rows.read().unwrap() {
//!     let (id, name): (i64, String) = rows.get_values().unwrap();
//!     assert_eq!((id, name.as_str()), (7, "Ada"));
//! }
//! ```
//!
//! ## Layers
//!
//! | Module       | Role                                              |
//! |--------------|---------------------------------------------------|
//! | `types`      | `CalendarTime`, `TypeTag`, `Value`, wire time      |
//! | `binding`    | `BufferSlot`, `ParameterBinder`, `Rows`            |
//! | `driver`     | driver traits, library refcount, memory driver     |
//! | `connection` | `Connection`, `PreparedStatement`, conn strings    |
//! | `config`     | TOML client configuration                          |

pub mod binding;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod types;

pub use binding::{FromRow, ParameterBinder, Rows};
pub use config::ClientConfig;
pub use connection::{ConnectOptions, Connection, ConnectionString, PreparedStatement};
pub use error::{BindError, BindResult};
pub use types::{CalendarTime, FromValue, TypeTag, Value};

pub mod prelude {
    pub use crate::binding::{BufferSlot, FromRow, ParameterBinder, Rows};
    pub use crate::config::ClientConfig;
    pub use crate::connection::{ConnectOptions, Connection, ConnectionString, PreparedStatement};
    pub use crate::driver::{ColumnMeta, Connector, Driver, DriverError, StatementHandle};
    pub use crate::error::*;
    pub use crate::params;
    pub use crate::types::{CalendarTime, CivilFields, FieldType, FromValue, TypeTag, Value};
}

/// Parse a timestamp such as `2019-11-05 08:09:10.123`.
///
/// # Example
///
/// ```
/// use mybind::parse_time;
///
/// let t = parse_time("2000-01-02").unwrap();
/// assert_eq!(t.ticks(), 86_400_000_000_000);
/// ```
pub fn parse_time(input: &str) -> BindResult<CalendarTime> {
    CalendarTime::parse(input)
}
