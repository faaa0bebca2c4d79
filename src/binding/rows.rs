//! Result cursor over a fully stored result set.
//!
//! ```text
//! Bound --read()--> RowAvailable --read()--> ... --> Exhausted
//!   ^                                                   |
//!   +--------------- next_result_set() -----------------+
//! ```

use std::ops::{Deref, DerefMut};

use tracing::{debug, trace, warn};

use crate::driver::{ColumnMeta, Fetch, StatementHandle};
use crate::error::{BindError, BindResult, ValueError};
use crate::types::{FromValue, Value};

use super::BufferSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Bound,
    RowAvailable,
    Exhausted,
}

/// The statement a reader fetches from: borrowed from a
/// [`PreparedStatement`](crate::PreparedStatement) or owned outright.
#[derive(Debug)]
pub(crate) enum Handle<'a, S> {
    Borrowed(&'a mut S),
    Owned(S),
}

impl<S> Deref for Handle<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        match self {
            Handle::Borrowed(s) => s,
            Handle::Owned(s) => s,
        }
    }
}

impl<S> DerefMut for Handle<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        match self {
            Handle::Borrowed(s) => s,
            Handle::Owned(s) => s,
        }
    }
}

/// Row cursor with one result slot per column.
pub struct Rows<'a, S: StatementHandle> {
    handle: Handle<'a, S>,
    columns: Vec<ColumnMeta>,
    slots: Vec<BufferSlot>,
    state: CursorState,
    row_count: u64,
    released: bool,
}

impl<'a, S: StatementHandle> Rows<'a, S> {
    /// Bind result slots for the statement's current result set.
    pub(crate) fn new(handle: Handle<'a, S>) -> BindResult<Self> {
        let mut rows = Self {
            handle,
            columns: Vec::new(),
            slots: Vec::new(),
            state: CursorState::Exhausted,
            row_count: 0,
            released: false,
        };
        rows.bind_current()?;
        Ok(rows)
    }

    fn bind_current(&mut self) -> BindResult<()> {
        self.columns = self.handle.result_metadata();
        self.slots = self.columns.iter().map(BufferSlot::for_column).collect();
        self.released = false;
        if self.columns.is_empty() {
            self.state = CursorState::Exhausted;
            self.row_count = 0;
            return Ok(());
        }
        self.handle.store_result()?;
        self.row_count = self.handle.num_rows();
        self.state = CursorState::Bound;
        debug!(
            columns = self.columns.len(),
            rows = self.row_count,
            "result set bound"
        );
        Ok(())
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Advance one row. A result with no columns never yields a row.
    ///
    /// When a column does not fit its buffer the row is still current and
    /// [`BindError::Truncated`] names the affected columns.
    pub fn read(&mut self) -> BindResult<bool> {
        if self.state == CursorState::Exhausted {
            return Ok(false);
        }
        match self.handle.fetch(&mut self.slots)? {
            Fetch::Row => {
                trace!("row fetched");
                self.state = CursorState::RowAvailable;
                Ok(true)
            }
            Fetch::Truncated => {
                self.state = CursorState::RowAvailable;
                let truncated: Vec<usize> = self
                    .slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_truncated())
                    .map(|(pos, _)| pos)
                    .collect();
                warn!(columns = ?truncated, "fetched row was truncated");
                Err(BindError::Truncated(truncated))
            }
            Fetch::NoData => {
                self.state = CursorState::Exhausted;
                Ok(false)
            }
        }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Rows in the current result set.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Position of the column named `name` (exact match).
    pub fn column_index(&self, name: &str) -> BindResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| BindError::NotFound(name.to_string()))
    }

    fn slot(&self, pos: usize) -> BindResult<&BufferSlot> {
        self.slots
            .get(pos)
            .ok_or_else(|| BindError::column_range(pos, self.slots.len()))
    }

    fn current(&self, pos: usize) -> BindResult<&BufferSlot> {
        let slot = self.slot(pos)?;
        if self.state != CursorState::RowAvailable {
            return Err(BindError::NoRow);
        }
        Ok(slot)
    }

    pub fn is_null(&self, pos: usize) -> BindResult<bool> {
        Ok(self.slot(pos)?.is_null())
    }

    pub fn is_null_by_name(&self, name: &str) -> BindResult<bool> {
        self.is_null(self.column_index(name)?)
    }

    /// Whether the column was cut short by the last fetch.
    pub fn is_truncated(&self, pos: usize) -> BindResult<bool> {
        Ok(self.slot(pos)?.is_truncated())
    }

    /// Decoded value of a column, `Value::Null` included.
    pub fn value(&self, pos: usize) -> BindResult<Value> {
        self.current(pos)?
            .decode()
            .map_err(|source| BindError::Conversion { pos, source })
    }

    /// Typed read. NULL fails unless `T` accepts it (`Option<_>`, `Value`).
    pub fn get<T: FromValue>(&self, pos: usize) -> BindResult<T> {
        if self.current(pos)?.is_null() {
            return T::from_value(Value::Null).map_err(|_| BindError::NullValue(pos));
        }
        let value = self.value(pos)?;
        T::from_value(value).map_err(|source| BindError::Conversion { pos, source })
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> BindResult<T> {
        self.get(self.column_index(name)?)
    }

    /// Typed read mapping NULL to `None`.
    pub fn get_opt<T: FromValue>(&self, pos: usize) -> BindResult<Option<T>> {
        if self.current(pos)?.is_null() {
            return Ok(None);
        }
        self.get(pos).map(Some)
    }

    pub fn get_opt_by_name<T: FromValue>(&self, name: &str) -> BindResult<Option<T>> {
        self.get_opt(self.column_index(name)?)
    }

    /// Raw column bytes without copying.
    pub fn get_bytes(&self, pos: usize) -> BindResult<&[u8]> {
        let slot = self.current(pos)?;
        if slot.is_null() {
            return Err(BindError::NullValue(pos));
        }
        Ok(slot.bytes())
    }

    pub fn get_str(&self, pos: usize) -> BindResult<&str> {
        let bytes = self.get_bytes(pos)?;
        std::str::from_utf8(bytes).map_err(|e| BindError::Conversion {
            pos,
            source: ValueError::Utf8(e.to_string()),
        })
    }

    /// Read the current row into a tuple, column by column.
    pub fn get_values<R: FromRow>(&self) -> BindResult<R> {
        R::from_row(self)
    }

    /// Release the current result and move to the next one.
    /// Returns false when there are no more result sets.
    pub fn next_result_set(&mut self) -> BindResult<bool> {
        self.release()?;
        if !self.handle.next_result()? {
            self.columns.clear();
            self.slots.clear();
            self.state = CursorState::Exhausted;
            return Ok(false);
        }
        self.bind_current()?;
        Ok(true)
    }

    /// Discard the buffered rows of the current result set.
    pub fn cancel(&mut self) -> BindResult<()> {
        self.release()?;
        self.state = CursorState::Exhausted;
        Ok(())
    }

    fn release(&mut self) -> BindResult<()> {
        if !self.released {
            self.released = true;
            self.handle.free_result()?;
        }
        Ok(())
    }
}

impl<S: StatementHandle> Drop for Rows<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to release result set");
        }
    }
}

impl<S: StatementHandle> std::fmt::Debug for Rows<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("state", &self.state)
            .field("row_count", &self.row_count)
            .finish()
    }
}

/// Positional extraction of a whole row.
pub trait FromRow: Sized {
    fn from_row<S: StatementHandle>(rows: &Rows<'_, S>) -> BindResult<Self>;
}

macro_rules! tuple_from_row {
    ($($T:ident $idx:tt),+) => {
        impl<$($T: FromValue),+> FromRow for ($($T,)+) {
            fn from_row<S: StatementHandle>(rows: &Rows<'_, S>) -> BindResult<Self> {
                Ok(($(rows.get::<$T>($idx)?,)+))
            }
        }
    };
}

tuple_from_row!(A 0);
tuple_from_row!(A 0, B 1);
tuple_from_row!(A 0, B 1, C 2);
tuple_from_row!(A 0, B 1, C 2, D 3);
tuple_from_row!(A 0, B 1, C 2, D 3, E 4);
tuple_from_row!(A 0, B 1, C 2, D 3, E 4, F 5);
tuple_from_row!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_from_row!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::memory::{MemoryStatement, Outcome, Script};
    use crate::types::{CalendarTime, FieldType};
    use pretty_assertions::assert_eq;

    fn people() -> MemoryStatement {
        let columns = vec![
            ColumnMeta::new("id", FieldType::Long),
            ColumnMeta::new("name", FieldType::VarString).max_length(32),
            ColumnMeta::new("born", FieldType::DateTime),
        ];
        let born = CalendarTime::from_ymd(1990, 5, 17).unwrap();
        let script = Script::new().outcome(Outcome::rows(
            columns,
            vec![
                vec![Value::Int32(1), Value::from("Ann"), Value::DateTime(born)],
                vec![Value::Int32(2), Value::Null, Value::Null],
            ],
        ));
        let mut stmt = MemoryStatement::detached("SELECT id, name, born FROM people", script);
        stmt.execute().unwrap();
        stmt
    }

    #[test]
    fn test_read_rows() {
        let mut stmt = people();
        let mut rows = Rows::new(Handle::Borrowed(&mut stmt)).unwrap();
        assert_eq!(rows.state(), CursorState::Bound);
        assert_eq!(rows.row_count(), 2);
        assert!(matches!(rows.get::<i32>(0), Err(BindError::NoRow)));

        assert!(rows.read().unwrap());
        assert_eq!(rows.get::<i64>(0).unwrap(), 1);
        assert_eq!(rows.get_by_name::<String>("name").unwrap(), "Ann");
        assert_eq!(rows.get_str(1).unwrap(), "Ann");
        assert_eq!(
            rows.get::<CalendarTime>(2).unwrap().to_string(),
            "1990-05-17T00:00:00.000"
        );

        assert!(rows.read().unwrap());
        assert!(rows.is_null(1).unwrap());
        assert!(matches!(rows.get::<String>(1), Err(BindError::NullValue(1))));
        assert_eq!(rows.get_opt_by_name::<String>("name").unwrap(), None);
        assert_eq!(rows.value(2).unwrap(), Value::Null);

        assert!(!rows.read().unwrap());
        assert!(!rows.read().unwrap());
        assert_eq!(rows.state(), CursorState::Exhausted);
    }

    #[test]
    fn test_lookup_failures() {
        let mut stmt = people();
        let mut rows = Rows::new(Handle::Borrowed(&mut stmt)).unwrap();
        rows.read().unwrap();
        assert!(matches!(
            rows.get_by_name::<i32>("ID"),
            Err(BindError::NotFound(name)) if name == "ID"
        ));
        assert!(rows.get::<i32>(3).unwrap_err().is_range());
        assert!(rows.is_null(7).unwrap_err().is_range());
        assert!(matches!(
            rows.get::<u8>(1),
            Err(BindError::Conversion { pos: 1, .. })
        ));
    }

    #[test]
    fn test_tuples() {
        let mut stmt = people();
        let mut rows = Rows::new(Handle::Borrowed(&mut stmt)).unwrap();
        rows.read().unwrap();
        let (id, name): (u64, String) = rows.get_values().unwrap();
        assert_eq!((id, name.as_str()), (1, "Ann"));

        rows.read().unwrap();
        let (id, name, born): (i32, Option<String>, Option<CalendarTime>) =
            rows.get_values().unwrap();
        assert_eq!((id, name, born), (2, None, None));
    }

    #[test]
    fn test_no_columns_never_reads() {
        let script = Script::new().outcome(Outcome::affected(4));
        let mut stmt = MemoryStatement::detached("DELETE FROM t", script);
        stmt.execute().unwrap();
        let mut rows = Rows::new(Handle::Borrowed(&mut stmt)).unwrap();
        assert_eq!(rows.field_count(), 0);
        assert!(!rows.read().unwrap());
    }

    #[test]
    fn test_cancel_discards_rows() {
        let mut stmt = people();
        let mut rows = Rows::new(Handle::Borrowed(&mut stmt)).unwrap();
        rows.cancel().unwrap();
        assert!(!rows.read().unwrap());
    }
}
