//! Serde helpers for integers sent as JSON strings.
//!
//! Amounts, subunits and timestamps travel as decimal strings
//! (`"Amount": "1000"`).

/// A required integer encoded as a JSON string.
pub mod string_int {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let lit = String::deserialize(deserializer)?;
        lit.parse().map_err(de::Error::custom)
    }
}

/// An optional integer encoded as a JSON string.
///
/// Combine with `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod option_string_int {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(lit) => lit.parse().map(Some).map_err(de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        #[serde(with = "super::string_int")]
        a: i64,
        #[serde(with = "super::option_string_int", skip_serializing_if = "Option::is_none")]
        b: Option<i8>,
    }

    #[test]
    fn test_string_encoding() {
        let json = serde_json::to_string(&Sample { a: -5, b: Some(2) }).unwrap();
        assert_eq!(json, r#"{"a":"-5","b":"2"}"#);
        let json = serde_json::to_string(&Sample { a: 1, b: None }).unwrap();
        assert_eq!(json, r#"{"a":"1"}"#);
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: Sample = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, Sample::default());
    }

    #[test]
    fn test_rejects_numbers_and_garbage() {
        assert!(serde_json::from_str::<Sample>(r#"{"a":5}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"a":"x"}"#).is_err());
        assert!(serde_json::from_str::<Sample>(r#"{"b":"300"}"#).is_err());
    }
}
