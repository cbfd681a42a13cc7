//! JSON `Serde<T>` built on `serde_json`, gated behind the `json` feature.
use serde::de::DeserializeOwned;
use serde::Serialize as SerdeSerialize;

use crate::serde::{Deserializer, Error, Serializer};

/// A `Serde<T>` that encodes as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl<T: SerdeSerialize> Serializer<T> for Json {
    fn serialize(&self, value: T) -> Vec<u8> {
        serde_json::to_vec(&value).expect("T's Serialize impl must not fail for JSON encoding")
    }
}

impl<T: DeserializeOwned> Deserializer<T> for Json {
    fn deserialize(&self, bytes: &[u8]) -> Result<T, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(Box::new(e)))
    }
}
