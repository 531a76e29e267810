//! Cached values and the MessagePack value codec.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// MessagePack encoding of nil; doubles as the "represents null" sentinel
/// wherever values are stored as raw bytes.
pub const NULL_MARKER: &[u8] = &[0xc0];

/// A value held by a cache adapter.
///
/// `Null` is a cached null and is distinct from "not cached", which adapters
/// express as `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Null,
    Bytes(Arc<Vec<u8>>),
}

impl CachedValue {
    /// Wrap raw bytes, mapping [`NULL_MARKER`] back to `Null`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.as_slice() == NULL_MARKER {
            CachedValue::Null
        } else {
            CachedValue::Bytes(Arc::new(bytes))
        }
    }

    /// Raw bytes of the value, with `Null` rendered as [`NULL_MARKER`].
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CachedValue::Null => NULL_MARKER,
            CachedValue::Bytes(bytes) => bytes,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CachedValue::Null)
    }

    /// Encode a value with MessagePack.
    ///
    /// Values that encode to nil (`None`, `()`) become `Null`.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = rmp_serde::to_vec_named(value)?;
        Ok(Self::from_bytes(bytes))
    }

    /// Decode the value into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(rmp_serde::from_slice(self.as_bytes())?)
    }
}
