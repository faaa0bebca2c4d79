//! Parameter and result binding.
//!
//! - `slot.rs` - one owned buffer per parameter or column
//! - `params.rs` - input slots and typed `set_value`
//! - `rows.rs` - result slots and the row cursor

mod params;
mod rows;
mod slot;

pub use params::ParameterBinder;
pub(crate) use rows::Handle;
pub use rows::{CursorState, FromRow, Rows};
pub use slot::{Binding, BindingMut, BufferSlot, MIN_CAPACITY};
