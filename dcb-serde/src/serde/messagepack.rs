//! MessagePack `Serde<T>` built on `rmp-serde`, gated behind the
//! `messagepack` feature.
use serde::de::DeserializeOwned;
use serde::Serialize as SerdeSerialize;

use crate::serde::{Deserializer, Error, Serializer};

/// A `Serde<T>` that encodes as MessagePack, more compact on the wire than
/// JSON for payload-heavy event logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePack;

impl<T: SerdeSerialize> Serializer<T> for MessagePack {
    fn serialize(&self, value: T) -> Vec<u8> {
        rmp_serde::to_vec(&value).expect("T's Serialize impl must not fail for MessagePack encoding")
    }
}

impl<T: DeserializeOwned> Deserializer<T> for MessagePack {
    fn deserialize(&self, bytes: &[u8]) -> Result<T, Error> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Deserialization(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, SerdeSerialize, Deserialize)]
    struct Payload {
        amount: i64,
    }

    #[test]
    fn round_trips_through_messagepack() {
        let mp = MessagePack;
        let bytes = mp.serialize(Payload { amount: 42 });
        let decoded: Payload = mp.deserialize(&bytes).unwrap();
        assert_eq!(decoded, Payload { amount: 42 });
    }
}
