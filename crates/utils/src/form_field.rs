//! A form field pairs what the user typed with what it decodes to.
//!
//! Fields are values: every operation returns a new field rather than
//! mutating the old one, so `val` always reflects the decoder applied to
//! `raw`.

use crate::decode::{Decoder, Encoder, Errors};

#[derive(Debug, Clone, PartialEq)]
pub struct FormField<E, R, V> {
    pub raw: R,
    pub val: Result<V, E>,
    /// Set once the user has edited the field (or submitted the form).
    pub dirty: bool,
}

impl<E, R, V> FormField<E, R, V> {
    /// Decode `raw` without marking the field as edited.
    pub fn init<D>(decoder: &D, raw: R) -> Self
    where
        D: Decoder<R, Value = V, Error = E>,
    {
        let val = decoder.decode(&raw);
        Self {
            raw,
            val,
            dirty: false,
        }
    }

    /// Decode a fresh `raw` value coming from user input. The result is
    /// dirty whether or not decoding succeeded.
    pub fn update<D>(decoder: &D, raw: R) -> Self
    where
        D: Decoder<R, Value = V, Error = E>,
    {
        let val = decoder.decode(&raw);
        Self {
            raw,
            val,
            dirty: true,
        }
    }

    /// Build a field from a value already known to be valid, such as a
    /// default loaded from a saved report.
    pub fn set<C>(encoder: &C, value: V) -> Self
    where
        C: Encoder<V, Raw = R>,
    {
        Self {
            raw: encoder.encode(&value),
            val: Ok(value),
            dirty: false,
        }
    }

    /// Mark the field dirty without re-decoding.
    pub fn touch(self) -> Self {
        Self {
            dirty: true,
            ..self
        }
    }

    pub fn is_valid(&self) -> bool {
        self.val.is_ok()
    }

    pub fn value(&self) -> Option<&V> {
        self.val.as_ref().ok()
    }

    pub fn errors(&self) -> Option<&E> {
        self.val.as_ref().err()
    }

    pub fn into_value(self) -> Option<V> {
        self.val.ok()
    }
}

impl<R, V> FormField<Errors, R, V> {
    /// Messages to display next to the field. Pristine fields never show
    /// errors, even when their initial value is invalid.
    pub fn visible_errors(&self) -> Vec<&str> {
        match (&self.val, self.dirty) {
            (Err(errors), true) => errors.iter().map(|e| e.message.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}
