//! Payload codec for the typed call helpers.
//!
//! The engine core treats payloads as opaque bytes; this codec exists for
//! the convenience wrappers ([`Engine::request_typed`] and friends) and for
//! application handlers that want structured payloads. Uses
//! `rmp_serde::to_vec_named` so structs travel as maps with field names,
//! which keeps payloads readable by non-Rust peers.
//!
//! [`Engine::request_typed`]: crate::Engine::request_typed

use crate::error::Result;

/// MessagePack codec for structured payloads.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode a value from MsgPack bytes.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(data)?)
    }
}
