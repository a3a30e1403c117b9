//! Conversion of raw extracted values into typed fields
//!
//! Rules, in order:
//! 1. `Null` becomes `None` for nullable targets and fails otherwise.
//! 2. A value the target can take directly is used as is.
//! 3. Strings go through the target's text parser. Blank strings count as
//!    null for every target except `String`.
//! 4. Any other value is converted directly when possible, and otherwise
//!    stringified and sent through the text parser (so `1` becomes `true`).

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A raw value could not become the target type
#[derive(Debug, Error)]
#[error("cannot convert {raw:?} to {target}: {reason}")]
pub struct ConversionError {
    pub raw: String,
    pub target: &'static str,
    pub reason: String,
    #[source]
    source: Option<BoxError>,
}

impl ConversionError {
    pub fn new(raw: impl Into<String>, target: &'static str, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            target,
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(
        raw: impl Into<String>,
        target: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            raw: raw.into(),
            target,
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

/// A type that extracted values can be converted into
pub trait FromValue: Sized {
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Value used for `Null` input, `None` when the type cannot be absent
    fn from_null() -> Option<Self> {
        None
    }

    /// Direct conversion from a non-string value
    fn from_native(_value: &Value) -> Option<Self> {
        None
    }

    /// Whether blank text is a value of this type rather than absence
    fn accepts_blank() -> bool {
        false
    }

    /// Parse non-blank text (or any text when [`FromValue::accepts_blank`])
    fn parse_text(input: &str) -> Result<Self, ConversionError>;
}

/// Convert a raw value into `T`
pub fn convert<T: FromValue>(value: Value) -> Result<T, ConversionError> {
    if value.is_null() {
        return T::from_null().ok_or_else(|| {
            ConversionError::new("null", T::type_name(), "null is not valid for a non-nullable type")
        });
    }

    if !value.is_string() {
        if let Some(converted) = T::from_native(&value) {
            return Ok(converted);
        }
    }

    match value {
        Value::String(text) => convert_text(&text),
        other => convert_text(&other.to_string()),
    }
}

/// Convert text into `T`, treating blank text as null unless `T` accepts it
pub fn convert_text<T: FromValue>(text: &str) -> Result<T, ConversionError> {
    if !T::accepts_blank() && text.trim().is_empty() {
        return T::from_null().ok_or_else(|| {
            ConversionError::new(text, T::type_name(), "empty text is not valid for a non-nullable type")
        });
    }
    T::parse_text(text)
}

impl<T: FromValue> FromValue for Option<T> {
    fn type_name() -> &'static str {
        T::type_name()
    }

    fn from_null() -> Option<Self> {
        Some(None)
    }

    fn from_native(value: &Value) -> Option<Self> {
        T::from_native(value).map(Some)
    }

    fn accepts_blank() -> bool {
        T::accepts_blank()
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        T::parse_text(input).map(Some)
    }
}

impl FromValue for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn from_native(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn accepts_blank() -> bool {
        true
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        Ok(input.to_string())
    }
}

impl FromValue for bool {
    fn type_name() -> &'static str {
        "bool"
    }

    fn from_native(value: &Value) -> Option<Self> {
        value.as_bool()
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        let trimmed = input.trim();
        match trimmed {
            "1" => Ok(true),
            "0" => Ok(false),
            _ if trimmed.eq_ignore_ascii_case("true") => Ok(true),
            _ if trimmed.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(ConversionError::new(input, "bool", "not a boolean literal")),
        }
    }
}

/// Invariant numeric syntax: surrounding whitespace and `,` group separators
/// are ignored, `.` is the decimal point.
fn numeric_text(input: &str) -> String {
    input.trim().chars().filter(|c| *c != ',').collect()
}

/// Whole floats within `i64` range, so `3.0` converts like `3`
fn integral_float(n: f64) -> Option<i64> {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}

macro_rules! integer_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromValue for $ty {
                fn type_name() -> &'static str {
                    stringify!($ty)
                }

                fn from_native(value: &Value) -> Option<Self> {
                    if let Some(flag) = value.as_bool() {
                        return <$ty>::try_from(u8::from(flag)).ok();
                    }
                    if let Some(n) = value.as_i64() {
                        return <$ty>::try_from(n).ok();
                    }
                    if let Some(n) = value.as_u64() {
                        return <$ty>::try_from(n).ok();
                    }
                    value
                        .as_f64()
                        .and_then(integral_float)
                        .and_then(|n| <$ty>::try_from(n).ok())
                }

                fn parse_text(input: &str) -> Result<Self, ConversionError> {
                    numeric_text(input)
                        .parse::<$ty>()
                        .map_err(|e| ConversionError::with_source(input, stringify!($ty), e))
                }
            }
        )+
    };
}

integer_value!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromValue for $ty {
                fn type_name() -> &'static str {
                    stringify!($ty)
                }

                fn from_native(value: &Value) -> Option<Self> {
                    value.as_f64().map(|n| n as $ty)
                }

                fn parse_text(input: &str) -> Result<Self, ConversionError> {
                    numeric_text(input)
                        .parse::<$ty>()
                        .map_err(|e| ConversionError::with_source(input, stringify!($ty), e))
                }
            }
        )+
    };
}

float_value!(f32, f64);

impl FromValue for Decimal {
    fn type_name() -> &'static str {
        "Decimal"
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        let text = numeric_text(input);
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| ConversionError::with_source(input, "Decimal", e))
    }
}

impl FromValue for NaiveDate {
    fn type_name() -> &'static str {
        "NaiveDate"
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        let trimmed = input.trim();
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .or_else(|_| NaiveDateTime::from_str(trimmed).map(|dt| dt.date()))
            .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.date_naive()))
            .map_err(|e| ConversionError::with_source(input, "NaiveDate", e))
    }
}

impl FromValue for NaiveDateTime {
    fn type_name() -> &'static str {
        "NaiveDateTime"
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        let trimmed = input.trim();
        NaiveDateTime::from_str(trimmed)
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
            .or_else(|_| DateTime::parse_from_rfc3339(trimmed).map(|dt| dt.naive_local()))
            .or_else(|_| {
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
            })
            .map_err(|e| ConversionError::with_source(input, "NaiveDateTime", e))
    }
}

impl FromValue for NaiveTime {
    fn type_name() -> &'static str {
        "NaiveTime"
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        let trimmed = input.trim();
        NaiveTime::from_str(trimmed)
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
            .map_err(|e| ConversionError::with_source(input, "NaiveTime", e))
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn type_name() -> &'static str {
        "DateTime<FixedOffset>"
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        DateTime::parse_from_rfc3339(input.trim())
            .map_err(|e| ConversionError::with_source(input, "DateTime<FixedOffset>", e))
    }
}

impl FromValue for DateTime<Utc> {
    fn type_name() -> &'static str {
        "DateTime<Utc>"
    }

    /// Offsets are honoured; timestamps without one are read as UTC
    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        let trimmed = input.trim();
        match DateTime::parse_from_rfc3339(trimmed) {
            Ok(dt) => Ok(dt.with_timezone(&Utc)),
            Err(_) => NaiveDateTime::parse_text(trimmed)
                .map(|naive| naive.and_utc())
                .map_err(|e| ConversionError::new(input, "DateTime<Utc>", e.reason)),
        }
    }
}

impl FromValue for Uuid {
    fn type_name() -> &'static str {
        "Uuid"
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        Uuid::parse_str(input.trim()).map_err(|e| ConversionError::with_source(input, "Uuid", e))
    }
}

impl FromValue for Url {
    fn type_name() -> &'static str {
        "Url"
    }

    fn parse_text(input: &str) -> Result<Self, ConversionError> {
        Url::parse(input.trim()).map_err(|e| ConversionError::with_source(input, "Url", e))
    }
}

/// Parse an enum variant by name, ignoring ASCII case
#[doc(hidden)]
pub fn parse_variant<T: Copy>(
    input: &str,
    target: &'static str,
    variants: &[(&str, T)],
) -> Result<T, ConversionError> {
    let trimmed = input.trim();
    variants
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        .map(|(_, variant)| *variant)
        .ok_or_else(|| ConversionError::new(input, target, "no variant with this name"))
}

/// Implement [`FromValue`] for a fieldless enum, matching variant names
/// case-insensitively.
///
/// ```
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Shift { Morning, Evening }
/// html_binder::value_enum!(Shift { Morning, Evening });
///
/// let shift: Shift = html_binder::convert("EVENING".into()).unwrap();
/// assert_eq!(shift, Shift::Evening);
/// ```
#[macro_export]
macro_rules! value_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::FromValue for $ty {
            fn type_name() -> &'static str {
                stringify!($ty)
            }

            fn parse_text(input: &str) -> ::std::result::Result<Self, $crate::ConversionError> {
                $crate::convert::parse_variant(
                    input,
                    stringify!($ty),
                    &[$((stringify!($variant), $ty::$variant)),+],
                )
            }
        }
    };
}

/// Implement [`FromValue`] through the type's `FromStr` impl
#[macro_export]
macro_rules! from_str_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::FromValue for $ty {
                fn type_name() -> &'static str {
                    stringify!($ty)
                }

                fn parse_text(input: &str) -> ::std::result::Result<Self, $crate::ConversionError> {
                    input
                        .trim()
                        .parse::<$ty>()
                        .map_err(|e| $crate::ConversionError::new(input, stringify!($ty), e.to_string()))
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Modality {
        Presencial,
        Distancia,
    }

    crate::value_enum!(Modality { Presencial, Distancia });

    #[derive(Debug, PartialEq)]
    struct Code(String);

    impl FromStr for Code {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            if s.len() == 3 {
                Ok(Code(s.to_string()))
            } else {
                Err(format!("expected 3 characters, got {}", s.len()))
            }
        }
    }

    crate::from_str_value!(Code);

    #[test]
    fn test_bool_literals() {
        assert!(convert::<bool>(json!("1")).unwrap());
        assert!(!convert::<bool>(json!("0")).unwrap());
        assert!(convert::<bool>(json!("True")).unwrap());
        assert!(!convert::<bool>(json!("false")).unwrap());
        assert!(convert::<bool>(json!("yes")).is_err());
    }

    #[test]
    fn test_number_to_bool_goes_through_text() {
        assert!(convert::<bool>(json!(1)).unwrap());
        assert!(!convert::<bool>(json!(0)).unwrap());
        assert!(convert::<bool>(json!(true)).unwrap());
    }

    #[test]
    fn test_bool_and_whole_float_to_integer() {
        assert_eq!(convert::<i32>(json!(true)).unwrap(), 1);
        assert_eq!(convert::<u8>(json!(false)).unwrap(), 0);
        assert_eq!(convert::<i32>(json!(3.0)).unwrap(), 3);
        assert_eq!(convert::<i64>(json!(-2.0)).unwrap(), -2);
        assert!(convert::<u8>(json!(-1.0)).is_err());
        let err = convert::<i32>(json!(3.5)).unwrap_err();
        assert_eq!(err.raw, "3.5");
    }

    #[test]
    fn test_blank_to_nullable_is_none() {
        assert_eq!(convert::<Option<i32>>(json!("")).unwrap(), None);
        assert_eq!(convert::<Option<i32>>(json!("   ")).unwrap(), None);
        assert_eq!(convert::<Option<i32>>(Value::Null).unwrap(), None);
        assert_eq!(convert::<Option<i32>>(json!("42")).unwrap(), Some(42));
    }

    #[test]
    fn test_blank_to_non_nullable_fails() {
        let err = convert::<i32>(json!("")).unwrap_err();
        assert_eq!(err.target, "i32");
        assert!(convert::<i32>(Value::Null).is_err());
    }

    #[test]
    fn test_invalid_integer_reports_raw_and_target() {
        let err = convert::<i32>(json!("abc")).unwrap_err();
        assert_eq!(err.raw, "abc");
        assert_eq!(err.target, "i32");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invariant_numbers() {
        assert_eq!(convert::<i64>(json!(" 1,234 ")).unwrap(), 1234);
        assert_eq!(convert::<f64>(json!("3.5")).unwrap(), 3.5);
        assert_eq!(convert::<u8>(json!(200)).unwrap(), 200);
        assert!(convert::<u8>(json!(300)).is_err());
        assert_eq!(convert::<Decimal>(json!("19.99")).unwrap(), Decimal::new(1999, 2));
        assert_eq!(convert::<f32>(json!(2.5)).unwrap(), 2.5);
    }

    #[test]
    fn test_string_passthrough() {
        assert_eq!(convert::<String>(json!("")).unwrap(), "");
        assert_eq!(convert::<String>(json!(12)).unwrap(), "12");
        assert_eq!(convert::<Option<String>>(json!("x")).unwrap(), Some("x".to_string()));
        assert!(convert::<String>(Value::Null).is_err());
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            convert::<NaiveDate>(json!("2024-03-01")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        let dt = convert::<NaiveDateTime>(json!("2024-03-01T10:30:00")).unwrap();
        assert_eq!(dt.to_string(), "2024-03-01 10:30:00");
        let utc = convert::<DateTime<Utc>>(json!("2024-03-01T10:30:00-03:00")).unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-03-01T13:30:00+00:00");
        assert!(convert::<NaiveDate>(json!("01/03/2024")).is_err());
    }

    #[test]
    fn test_uuid_and_url() {
        let id = convert::<Uuid>(json!("67e55044-10b1-426f-9247-bb680e5fe0c8")).unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        let url = convert::<Url>(json!("https://example.com/a")).unwrap();
        assert_eq!(url.path(), "/a");
        assert!(convert::<Url>(json!("not a url")).is_err());
    }

    #[test]
    fn test_enum_case_insensitive() {
        assert_eq!(convert::<Modality>(json!("presencial")).unwrap(), Modality::Presencial);
        assert_eq!(convert::<Modality>(json!("DISTANCIA")).unwrap(), Modality::Distancia);
        let err = convert::<Modality>(json!("hibrido")).unwrap_err();
        assert_eq!(err.target, "Modality");
    }

    #[test]
    fn test_from_str_fallback() {
        assert_eq!(convert::<Code>(json!("ABC")).unwrap(), Code("ABC".to_string()));
        let err = convert::<Code>(json!("ABCD")).unwrap_err();
        assert!(err.reason.contains("expected 3 characters"));
    }
}
