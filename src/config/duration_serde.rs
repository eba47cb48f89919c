//! Pool timeouts in configuration files
//!
//! A timeout is written either as whole seconds (`connect_timeout = 5`) or as
//! a humantime string (`connect_timeout = "1m30s"`). Timeouts are always
//! written back as strings.

use serde::{Deserialize, Deserializer, Serializer, de};
use std::time::Duration;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimeout {
    Seconds(u64),
    Text(String),
}

impl RawTimeout {
    fn into_duration<E: de::Error>(self) -> Result<Duration, E> {
        match self {
            RawTimeout::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            RawTimeout::Text(text) => humantime::parse_duration(text.trim())
                .map_err(|e| E::custom(format!("invalid timeout '{text}': {e}"))),
        }
    }
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

/// A required timeout
pub mod duration {
    use super::*;

    pub fn serialize<S: Serializer>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timeout(timeout))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        RawTimeout::deserialize(deserializer)?.into_duration()
    }
}

/// A timeout that may be left out, leaving the driver default in place
pub mod option_duration {
    use super::*;

    pub fn serialize<S: Serializer>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match timeout {
            Some(timeout) => serializer.serialize_some(&format_timeout(timeout)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<RawTimeout>::deserialize(deserializer)?
            .map(RawTimeout::into_duration)
            .transpose()
    }
}
