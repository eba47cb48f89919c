use serde::{Serialize, de::DeserializeOwned};
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{CodecError, CodecResult};

pub type Serializer<T> = Arc<dyn Fn(&T) -> CodecResult<String> + Send + Sync>;
pub type Deserializer<T> = Arc<dyn Fn(&str) -> CodecResult<T> + Send + Sync>;

/// Codec pairing a serializer and a deserializer for `T`
pub struct SerializableType<T> {
    type_name: String,
    serializer: Serializer<T>,
    deserializer: Deserializer<T>,
}

impl<T> SerializableType<T> {
    pub fn new<S, D>(type_name: impl Into<String>, serializer: S, deserializer: D) -> Self
    where
        S: Fn(&T) -> CodecResult<String> + Send + Sync + 'static,
        D: Fn(&str) -> CodecResult<T> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            serializer: Arc::new(serializer),
            deserializer: Arc::new(deserializer),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn serialize(&self, value: &T) -> CodecResult<String> {
        (self.serializer)(value)
    }

    pub fn deserialize(&self, value: &str) -> CodecResult<T> {
        (self.deserializer)(value)
    }
}

impl<T> SerializableType<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Codec storing `T` as a JSON document
    pub fn json() -> Self {
        let name = std::any::type_name::<T>();
        Self::new(
            name,
            move |value: &T| serde_json::to_string(value).map_err(|e| CodecError::serialize(name, e)),
            move |raw: &str| serde_json::from_str(raw).map_err(|e| CodecError::deserialize(name, e)),
        )
    }
}

impl<T> SerializableType<T>
where
    T: Display + FromStr + 'static,
    T::Err: Display,
{
    /// Codec storing `T` through its `Display` and `FromStr` implementations
    pub fn parsed() -> Self {
        let name = std::any::type_name::<T>();
        Self::new(
            name,
            |value: &T| Ok(value.to_string()),
            move |raw: &str| raw.parse::<T>().map_err(|e| CodecError::deserialize(name, e)),
        )
    }
}

impl<T> Clone for SerializableType<T> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name.clone(),
            serializer: Arc::clone(&self.serializer),
            deserializer: Arc::clone(&self.deserializer),
        }
    }
}

impl<T> fmt::Debug for SerializableType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializableType")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Nullable serialized value, read and written through a [`SerializableType`]
///
/// A null serialized form always reads as `None`, and writing `None` always
/// stores null. No codec is bound to the value itself, so a mismatched codec
/// only shows up as a [`CodecError`] when reading.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SerializableValue(Option<String>);

impl SerializableValue {
    pub fn new(serialized: Option<String>) -> Self {
        Self(serialized)
    }

    pub fn null() -> Self {
        Self(None)
    }

    /// Build a value already holding `value` serialized with `codec`
    pub fn of<T>(codec: &SerializableType<T>, value: &T) -> CodecResult<Self> {
        Ok(Self(Some(codec.serialize(value)?)))
    }

    pub fn serialized_value(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn into_serialized(self) -> Option<String> {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get<T>(&self, codec: &SerializableType<T>) -> CodecResult<Option<T>> {
        match &self.0 {
            None => Ok(None),
            Some(raw) => codec.deserialize(raw).map(Some),
        }
    }

    pub fn set<T>(&mut self, codec: &SerializableType<T>, value: Option<&T>) -> CodecResult<()> {
        self.0 = match value {
            None => None,
            Some(value) => Some(codec.serialize(value)?),
        };
        Ok(())
    }
}

impl From<Option<String>> for SerializableValue {
    fn from(serialized: Option<String>) -> Self {
        Self(serialized)
    }
}

impl From<SerializableValue> for Option<String> {
    fn from(value: SerializableValue) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Location {
        world: String,
        x: i64,
        y: i64,
    }

    #[rstest]
    #[case(0)]
    #[case(42)]
    #[case(u32::MAX)]
    fn parsed_codec_round_trips(#[case] input: u32) {
        let codec = SerializableType::<u32>::parsed();
        let mut value = SerializableValue::null();
        value.set(&codec, Some(&input)).unwrap();

        assert_eq!(value.serialized_value(), Some(input.to_string().as_str()));
        assert_eq!(value.get(&codec).unwrap(), Some(input));
    }

    #[test]
    fn json_codec_round_trips_structs() {
        let codec = SerializableType::<Location>::json();
        let spawn = Location {
            world: "overworld".to_string(),
            x: -12,
            y: 64,
        };

        let value = SerializableValue::of(&codec, &spawn).unwrap();
        assert_eq!(value.get(&codec).unwrap(), Some(spawn));
    }

    #[test]
    fn null_reads_as_none_and_none_writes_null() {
        let codec = SerializableType::<u32>::parsed();

        let mut value = SerializableValue::new(Some("7".to_string()));
        assert_eq!(value.get(&codec).unwrap(), Some(7));

        value.set(&codec, None).unwrap();
        assert!(value.is_null());
        assert_eq!(value.get(&codec).unwrap(), None);
    }

    #[test]
    fn mismatched_codec_reports_deserialize_error() {
        let text = SerializableType::<String>::parsed();
        let number = SerializableType::<u32>::parsed();

        let value = SerializableValue::of(&text, &"not a number".to_string()).unwrap();
        let error = value.get(&number).unwrap_err();
        assert!(matches!(error, CodecError::Deserialize { .. }));
    }

    #[test]
    fn custom_codec_errors_are_propagated() {
        let codec = SerializableType::<i32>::new(
            "positive",
            |value: &i32| {
                if *value < 0 {
                    Err(CodecError::serialize("positive", "negative values are not allowed"))
                } else {
                    Ok(value.to_string())
                }
            },
            |raw: &str| raw.parse().map_err(|e| CodecError::deserialize("positive", e)),
        );

        let mut value = SerializableValue::new(Some("3".to_string()));
        assert!(value.set(&codec, Some(&-1)).is_err());
        // failed writes leave the previous value untouched
        assert_eq!(value.serialized_value(), Some("3"));
    }
}
