//! Input parameter slots of a prepared statement.

use crate::error::{BindError, BindResult};
use crate::types::{TypeTag, Value};

use super::BufferSlot;

/// Ordered parameter slots. Position is the only identity.
#[derive(Debug, Clone, Default)]
pub struct ParameterBinder {
    slots: Vec<BufferSlot>,
}

impl ParameterBinder {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| BufferSlot::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[BufferSlot] {
        &self.slots
    }

    pub fn slot(&self, pos: usize) -> BindResult<&BufferSlot> {
        let count = self.slots.len();
        self.slots
            .get(pos)
            .ok_or_else(|| BindError::param_range(pos, count))
    }

    fn slot_mut(&mut self, pos: usize) -> BindResult<&mut BufferSlot> {
        let count = self.slots.len();
        self.slots
            .get_mut(pos)
            .ok_or_else(|| BindError::param_range(pos, count))
    }

    /// Declare the type of a parameter without touching its content.
    pub fn bind_param(&mut self, pos: usize, tag: TypeTag) -> BindResult<()> {
        self.slot_mut(pos)?.set_tag(tag);
        Ok(())
    }

    /// Set raw bytes. An unresolved slot becomes a blob.
    pub fn set_bytes(&mut self, pos: usize, bytes: &[u8]) -> BindResult<()> {
        let slot = self.slot_mut(pos)?;
        if !slot.tag().is_resolved() {
            slot.set_tag(TypeTag::Blob);
        }
        slot.store(bytes);
        Ok(())
    }

    /// Set a typed value.
    ///
    /// The slot keeps its tag when the value belongs to the same family
    /// (integers are narrowed or widened to the declared width, failing on
    /// overflow). Otherwise the tag is re-resolved from the value's type.
    /// `Value::Null` is equivalent to [`set_null`](Self::set_null). A failed
    /// conversion leaves the slot untouched.
    pub fn set_value(&mut self, pos: usize, value: impl Into<Value>) -> BindResult<()> {
        let value = value.into();
        let slot = self.slot_mut(pos)?;
        if value.is_null() {
            slot.set_null();
            return Ok(());
        }
        let tag = if slot.tag().is_resolved() && value.fits(slot.tag()) {
            slot.tag()
        } else {
            value.natural_tag()
        };
        let encoded = value
            .encode(tag)
            .map_err(|source| BindError::Conversion { pos, source })?;
        slot.set_tag(tag);
        slot.store(encoded.as_bytes());
        Ok(())
    }

    pub fn set_null(&mut self, pos: usize) -> BindResult<()> {
        self.slot_mut(pos)?.set_null();
        Ok(())
    }

    /// Set positions `0..n` from an ordered list.
    pub fn bind_values<I>(&mut self, values: I) -> BindResult<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        for (pos, value) in values.into_iter().enumerate() {
            self.set_value(pos, value)?;
        }
        Ok(())
    }

    /// Every non-NULL parameter must have a resolved type.
    pub fn validate(&self) -> BindResult<()> {
        match self
            .slots
            .iter()
            .position(|slot| !slot.is_null() && !slot.tag().is_resolved())
        {
            Some(pos) => Err(BindError::UnresolvedType(pos)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValueError;
    use crate::types::{CalendarTime, WireTime};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_out_of_range() {
        let mut params = ParameterBinder::new(2);
        let err = params.set_value(2, 1i32).unwrap_err();
        assert!(err.is_range());
        assert!(params.set_null(5).unwrap_err().is_range());
        assert!(params.bind_param(9, TypeTag::Int8).unwrap_err().is_range());
        assert!(params.set_bytes(2, b"x").unwrap_err().is_range());
    }

    #[test]
    fn test_int_then_string_reallocates_once() {
        let mut params = ParameterBinder::new(1);
        params.set_value(0, 42i32).unwrap();
        assert_eq!(params.slot(0).unwrap().tag(), TypeTag::Int32);

        params.set_value(0, "twenty bytes of text").unwrap();
        let slot = params.slot(0).unwrap();
        assert_eq!(slot.tag(), TypeTag::VarString);
        assert_eq!(slot.len(), 20);
        assert_eq!(slot.reallocations(), 1);
    }

    #[test]
    fn test_set_bytes_defaults_to_blob() {
        let mut params = ParameterBinder::new(2);
        params.set_bytes(0, &[1, 2, 3]).unwrap();
        assert_eq!(params.slot(0).unwrap().tag(), TypeTag::Blob);

        params.bind_param(1, TypeTag::VarString).unwrap();
        params.set_bytes(1, b"abc").unwrap();
        assert_eq!(params.slot(1).unwrap().tag(), TypeTag::VarString);
    }

    #[test]
    fn test_declared_width_is_kept() {
        let mut params = ParameterBinder::new(1);
        params.bind_param(0, TypeTag::UInt64).unwrap();
        params.set_value(0, 7i32).unwrap();
        let slot = params.slot(0).unwrap();
        assert_eq!(slot.tag(), TypeTag::UInt64);
        assert_eq!(slot.bytes(), &7u64.to_ne_bytes());

        let err = params.set_value(0, -1i32).unwrap_err();
        assert!(matches!(
            err,
            BindError::Conversion {
                pos: 0,
                source: ValueError::Overflow { target: "uint64" }
            }
        ));
    }

    #[test]
    fn test_calendar_values_expand() {
        let mut params = ParameterBinder::new(1);
        let t = CalendarTime::from_ymd_hms(2010, 3, 4, 5, 6, 7).unwrap();
        params.set_value(0, t).unwrap();
        let slot = params.slot(0).unwrap();
        assert_eq!(slot.tag(), TypeTag::DateTime);
        let wire = WireTime::from_bytes(slot.bytes()).unwrap();
        assert_eq!((wire.year, wire.month, wire.day, wire.second), (2010, 3, 4, 7));
    }

    #[test]
    fn test_unknown_calendar_value_is_rejected() {
        let mut params = ParameterBinder::new(1);
        for sentinel in [CalendarTime::MAX, CalendarTime::MIN] {
            let err = params.set_value(0, sentinel).unwrap_err();
            assert!(matches!(
                err,
                BindError::Conversion {
                    pos: 0,
                    source: ValueError::InvalidDate(_)
                }
            ));
        }
        assert!(!params.slot(0).unwrap().tag().is_resolved());
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_short_bytes_into_wide_slot() {
        let mut params = ParameterBinder::new(1);
        params.set_value(0, -1i64).unwrap();
        params.set_bytes(0, &5i64.to_ne_bytes()[..4]).unwrap();
        let slot = params.slot(0).unwrap();
        assert_eq!(slot.tag(), TypeTag::Int64);
        if cfg!(target_endian = "little") {
            assert_eq!(slot.decode().unwrap(), Value::Int64(5));
        }
    }

    #[test]
    fn test_null_and_validation() {
        let mut params = ParameterBinder::new(3);
        params.set_value(0, 1u8).unwrap();
        params.set_null(1).unwrap();
        assert!(matches!(
            params.validate(),
            Err(BindError::UnresolvedType(2))
        ));

        params.set_value(2, None::<i32>).unwrap();
        assert!(params.slot(2).unwrap().is_null());
        assert!(params.validate().is_ok());

        params.set_value(1, "back").unwrap();
        assert!(!params.slot(1).unwrap().is_null());
    }

    #[test]
    fn test_bind_values() {
        let mut params = ParameterBinder::new(3);
        params.bind_values(crate::params!["Bob", 33, 88.4]).unwrap();
        assert_eq!(params.slot(0).unwrap().tag(), TypeTag::VarString);
        assert_eq!(params.slot(1).unwrap().tag(), TypeTag::Int32);
        assert_eq!(params.slot(2).unwrap().tag(), TypeTag::Double);

        let err = params.bind_values(crate::params![1, 2, 3, 4]).unwrap_err();
        assert!(err.is_range());
    }
}
