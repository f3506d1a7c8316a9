//! # Serde support for bucket maps
//!
//! A `BucketMap` is serialized as the bytes of its wire encoding, so any serde
//! format carries exactly what [`crate::codec::encode`] produces, including
//! the sketch registers. Deserialization runs the full wire validation and
//! reports decode errors through the format's custom error.
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bucket::Payload;
use crate::codec;
use crate::map::BucketMap;

impl<S: Payload> Serialize for BucketMap<S> {
    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        serializer.serialize_bytes(&codec::encode(self))
    }
}

impl<'de, S: Payload> Deserialize<'de> for BucketMap<S> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        codec::decode(&bytes).map_err(D::Error::custom)
    }
}
