//! Serializer/deserializer traits for event and command payloads.
//!
//! Ported from the teacher's `disintegrate-serde` (`Serializer<T>`/
//! `Deserializer<T>`/`Serde<T>` and their `Error` enum), unchanged in
//! shape: `dcb-core` never needs to know which wire format a payload uses,
//! only that something here can turn a domain type into bytes and back.
#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "messagepack")]
pub mod messagepack;

/// Failure encoding or decoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to serialize payload: {0}")]
    Serialization(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to deserialize payload: {0}")]
    Deserialization(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Encodes `T` into bytes.
pub trait Serializer<T> {
    fn serialize(&self, value: T) -> Vec<u8>;
}

/// Decodes bytes into `T`.
pub trait Deserializer<T> {
    fn deserialize(&self, bytes: &[u8]) -> Result<T, Error>;
}

/// A serializer/deserializer pair for a given wire format, generic over
/// any `T` that format supports (typically anything `serde`-derived).
pub trait Serde<T>: Serializer<T> + Deserializer<T> {}

impl<T, S> Serde<T> for S where S: Serializer<T> + Deserializer<T> {}
