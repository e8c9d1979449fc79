//! Discriminator → decoder registry.
//!
//! Each event type registers one decode function under its discriminator.
//! Decoding never falls through: a missing or unknown discriminator is a
//! [`DecodeError`] before the body is touched.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::DecodeError;

pub type DecodeFn<E> = fn(&[u8]) -> Result<E, DecodeError>;

pub struct EventRegistry<E> {
    decoders: BTreeMap<&'static str, DecodeFn<E>>,
}

impl<E> EventRegistry<E> {
    pub fn new() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    /// Register `decode` for `type_id`, replacing any previous decoder.
    pub fn register(mut self, type_id: &'static str, decode: DecodeFn<E>) -> Self {
        self.decoders.insert(type_id, decode);
        self
    }

    pub fn knows(&self, type_id: &str) -> bool {
        self.decoders.contains_key(type_id)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders.keys().copied()
    }

    pub fn decode(&self, type_id: Option<&str>, body: &[u8]) -> Result<E, DecodeError> {
        let type_id = type_id.ok_or(DecodeError::MissingType)?;
        let decode = self
            .decoders
            .get(type_id)
            .ok_or_else(|| DecodeError::UnknownType(type_id.to_string()))?;
        decode(body)
    }
}

impl<E> Default for EventRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("type_ids", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}
