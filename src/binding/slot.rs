//! One positional buffer binding.

use tracing::trace;

use crate::driver::ColumnMeta;
use crate::error::ValueError;
use crate::types::{BufferShape, MAX_COLUMN_BUFFER, TypeTag, Value, WIRE_TIME_LEN};

/// Smallest buffer ever allocated; covers any fixed scalar.
pub const MIN_CAPACITY: usize = 8;

/// Owned buffer plus the length/NULL/error flags the driver reads and writes.
///
/// Capacity only grows. A grow releases the old buffer and allocates exactly
/// the requested size, so repeated binds of the same or shorter values reuse
/// one allocation.
#[derive(Debug, Clone, Default)]
pub struct BufferSlot {
    buffer: Vec<u8>,
    length: usize,
    reported: usize,
    is_null: bool,
    error: bool,
    tag: TypeTag,
    reallocations: usize,
}

/// Read-only view handed to the driver when binding parameters.
#[derive(Debug, Clone, Copy)]
pub struct Binding<'a> {
    pub buffer: &'a [u8],
    pub length: usize,
    pub is_null: bool,
    pub error: bool,
    pub tag: TypeTag,
}

impl Binding<'_> {
    /// The bound content, bounded by length.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.length.min(self.buffer.len())]
    }
}

/// Writable view the driver fills in place during fetch.
#[derive(Debug)]
pub struct BindingMut<'a> {
    pub buffer: &'a mut [u8],
    pub length: &'a mut usize,
    pub reported: &'a mut usize,
    pub is_null: &'a mut bool,
    pub error: &'a mut bool,
    pub tag: TypeTag,
}

impl BindingMut<'_> {
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Copy as much of `data` as fits. `length` is what was copied and
    /// `reported` is the full length. Returns true when the data was
    /// truncated.
    pub fn write(&mut self, data: &[u8]) -> bool {
        let n = data.len().min(self.buffer.len());
        self.buffer[..n].copy_from_slice(&data[..n]);
        *self.length = n;
        *self.reported = data.len();
        *self.is_null = false;
        *self.error = data.len() > self.buffer.len();
        *self.error
    }

    pub fn write_null(&mut self) {
        *self.length = 0;
        *self.reported = 0;
        *self.is_null = true;
        *self.error = false;
    }
}

impl BufferSlot {
    /// An unresolved, unallocated parameter slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// A result slot sized once from column metadata.
    pub fn for_column(meta: &ColumnMeta) -> Self {
        let tag = meta.tag();
        let capacity = match tag.shape() {
            Some(BufferShape::Temporal) => WIRE_TIME_LEN,
            Some(BufferShape::Variable { .. }) => {
                (meta.max_length as usize).clamp(MIN_CAPACITY, MAX_COLUMN_BUFFER)
            }
            Some(BufferShape::Fixed(_)) | None => MIN_CAPACITY,
        };
        Self {
            buffer: vec![0; capacity],
            tag,
            ..Self::default()
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn set_tag(&mut self, tag: TypeTag) {
        self.tag = tag;
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Logical length of the current content. Never exceeds capacity.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Full length of the last value, including bytes a truncated fetch
    /// could not hold.
    pub fn reported_len(&self) -> usize {
        self.reported
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    pub fn is_truncated(&self) -> bool {
        self.error
    }

    /// Times an existing buffer was replaced by a larger one.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    /// Grow to at least `needed` bytes (minimum [`MIN_CAPACITY`]).
    /// Returns true when a new buffer was allocated.
    pub fn ensure_capacity(&mut self, needed: usize) -> bool {
        let needed = needed.max(MIN_CAPACITY);
        if needed <= self.buffer.len() {
            return false;
        }
        if !self.buffer.is_empty() {
            self.reallocations += 1;
            trace!(from = self.buffer.len(), to = needed, "slot buffer reallocated");
        }
        self.buffer = vec![0; needed];
        true
    }

    /// Copy `bytes` in, growing if needed. Clears the NULL flag.
    ///
    /// The scalar window past a short value is zeroed, since fixed tags are
    /// read at their full width.
    pub fn store(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.buffer[..bytes.len()].copy_from_slice(bytes);
        if bytes.len() < MIN_CAPACITY {
            self.buffer[bytes.len()..MIN_CAPACITY].fill(0);
        }
        self.length = bytes.len();
        self.reported = bytes.len();
        self.is_null = false;
        self.error = false;
    }

    /// Mark NULL without touching buffer, length or tag.
    pub fn set_null(&mut self) {
        self.is_null = true;
    }

    /// Content bounded by length and capacity.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer[..self.length.min(self.buffer.len())]
    }

    pub fn binding(&self) -> Binding<'_> {
        Binding {
            buffer: &self.buffer,
            length: self.length,
            is_null: self.is_null,
            error: self.error,
            tag: self.tag,
        }
    }

    pub fn binding_mut(&mut self) -> BindingMut<'_> {
        BindingMut {
            buffer: &mut self.buffer,
            length: &mut self.length,
            reported: &mut self.reported,
            is_null: &mut self.is_null,
            error: &mut self.error,
            tag: self.tag,
        }
    }

    /// Decode the current content according to the slot's tag.
    ///
    /// Fixed scalars are read at their declared width from the start of the
    /// buffer. Strings and blobs are bounded by length.
    pub fn decode(&self) -> Result<Value, ValueError> {
        if self.is_null {
            return Ok(Value::Null);
        }
        let data = if self.tag.is_variable() {
            self.bytes()
        } else {
            &self.buffer
        };
        Value::decode(self.tag, data)
    }
}
