//! Typed values stored as nullable strings
//!
//! A [`SerializableValue`] holds the serialized form of an arbitrary value,
//! and a [`SerializableType`] knows how to turn that form back into `T`.
//! The value type doubles as a SeaORM column type, so an entity can declare
//! a field once and read it through different codecs.

mod column;
mod serializable;

pub use serializable::{Deserializer, SerializableType, SerializableValue, Serializer};
