use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serializes any value by its Display implementation.
///
/// Usage: `#[serde(serialize_with = "display")]`
pub fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

/// Enforces the constraint that the given value is greater than zero.
///
/// Usage: `#[serde(deserialize_with = "deserialize_positive")]`
pub fn deserialize_positive<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.is_nan() || value <= 0.0 {
        Err(serde::de::Error::custom("value must be greater than zero"))
    } else {
        Ok(value)
    }
}

/// An optional number of seconds, which must be greater than zero.
///
/// Usage: `#[serde(default, deserialize_with = "optional_seconds")]`
pub fn optional_seconds<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(transparent)]
    struct Seconds(#[serde(deserialize_with = "deserialize_positive")] f64);

    let Some(Seconds(seconds)) = Option::<Seconds>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Enforces the constraint that the given string is not empty.
///
/// Usage: `#[serde(deserialize_with = "required_string")]`
pub fn required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.trim().is_empty() {
        Err(serde::de::Error::custom("missing required string"))
    } else {
        Ok(value)
    }
}

/// Allow a list of strings in place of a single string, to reduce the line
/// length of long descriptions. The elements are simply concatenated together.
///
/// Usage: `#[serde(deserialize_with = "multiline_string")]`
pub fn multiline_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        String(String),
        List(Vec<String>),
    }
    let value = StringOrList::deserialize(deserializer)?;
    match value {
        StringOrList::String(value) => Ok(value),
        StringOrList::List(value) => Ok(value.join("")),
    }
}
