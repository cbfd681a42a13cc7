//! Serialization and deserialization helpers for the DCB event store.
//!
//! Not for direct use; refer to the `dcb-core` crate for the traits this
//! supports (`dcb-core::command::Decider::decide` produces opaque payload
//! bytes, and something implementing [`serde::Serde`] here is how an
//! application turns its own event/command types into those bytes).
pub mod serde;

#[cfg(feature = "json")]
pub use self::serde::json::Json;

#[cfg(feature = "messagepack")]
pub use self::serde::messagepack::MessagePack;

pub use self::serde::{Deserializer, Error, Serde, Serializer};
