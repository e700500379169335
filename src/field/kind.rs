//! Value kinds and their wire codecs.
//!
//! Every kind knows how to validate a typed value and encode it to the
//! canonical wire string, and how to decode the wire string back. The
//! conversions are not all symmetric: booleans decode from a
//! looser alphabet than they encode to, and durations lose microsecond
//! digits beyond the third.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::EntityError;
use crate::timespan::TimeSpan;
use crate::value::{FieldValue, DATE_FORMAT};

pub const COLOR_PATTERN: &str = "^#[0-9a-fA-F]{6}$";

const DATETIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn color_regex() -> &'static Regex {
    static COLOR: OnceLock<Regex> = OnceLock::new();
    COLOR.get_or_init(|| Regex::new(COLOR_PATTERN).expect("color pattern is valid"))
}

/// Validation and conversion contract of a field kind.
pub trait FieldCodec: Send + Sync {
    /// Short name of the kind, used in error reports.
    fn kind_name(&self) -> &'static str;

    /// Validate `value` and return its canonical wire string.
    fn validate_and_encode(&self, field: &str, value: &FieldValue) -> Result<String, EntityError>;

    /// Turn a stored wire string back into a typed value.
    fn decode(&self, field: &str, raw: &str) -> Result<FieldValue, EntityError>;

    /// Whether `Null` may be stored, clearing the field.
    fn accepts_null(&self) -> bool {
        true
    }
}

/// The closed set of field kinds.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Integer,
    Long,
    Float,
    Boolean,
    Enum { choices: Vec<String> },
    Date,
    DateTime,
    Duration,
    Color,
    Regex { pattern: Regex },
}

impl FieldKind {
    /// Enum kind over the string forms of `choices`.
    pub fn choices<I, T>(choices: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldValue>,
    {
        FieldKind::Enum {
            choices: choices.into_iter().map(|c| c.into().to_string()).collect(),
        }
    }

    /// Regex-constrained string kind.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(FieldKind::Regex {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Resolve a kind from its configuration name.
    ///
    /// Returns `None` for `enum` and `regex`, which need parameters, and
    /// for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "string" | "str" => FieldKind::String,
            "int" | "integer" => FieldKind::Integer,
            "long" => FieldKind::Long,
            "float" | "double" => FieldKind::Float,
            "bool" | "boolean" => FieldKind::Boolean,
            "date" => FieldKind::Date,
            "datetime" | "date-time" => FieldKind::DateTime,
            "duration" | "timespan" => FieldKind::Duration,
            "color" | "colour" => FieldKind::Color,
            _ => return None,
        };
        Some(kind)
    }

    fn type_mismatch(&self, field: &str, expected: &'static str, value: &FieldValue) -> EntityError {
        EntityError::TypeMismatch {
            field: field.to_string(),
            expected,
            actual: value.kind_name(),
        }
    }

    fn decode_error(&self, field: &str, raw: &str, reason: impl ToString) -> EntityError {
        EntityError::DecodeFormat {
            field: field.to_string(),
            value: raw.to_string(),
            reason: reason.to_string(),
        }
    }

    fn match_pattern(field: &str, pattern: &Regex, value: &FieldValue) -> Result<String, EntityError> {
        let text = value.to_string();
        // Anchored at the start only, like a prefix match.
        match pattern.find(&text) {
            Some(m) if m.start() == 0 => Ok(text),
            _ => Err(EntityError::ValidationError {
                field: field.to_string(),
                reason: format!("failed match for {:?}, expected pattern {:?}", text, pattern.as_str()),
            }),
        }
    }
}

impl FieldCodec for FieldKind {
    fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "int",
            FieldKind::Long => "long",
            FieldKind::Float => "float",
            FieldKind::Boolean => "bool",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Duration => "timespan",
            FieldKind::Color => "color",
            FieldKind::Regex { .. } => "regex",
        }
    }

    fn validate_and_encode(&self, field: &str, value: &FieldValue) -> Result<String, EntityError> {
        match self {
            FieldKind::String => Ok(value.to_string()),
            FieldKind::Integer | FieldKind::Long | FieldKind::Float => {
                if value.is_numeric() {
                    Ok(value.to_string())
                } else {
                    Err(self.type_mismatch(field, self.kind_name(), value))
                }
            }
            FieldKind::Boolean => match value {
                FieldValue::Bool(b) => Ok(b.to_string()),
                other => Err(self.type_mismatch(field, "bool", other)),
            },
            FieldKind::Enum { choices } => {
                let text = value.to_string();
                if choices.iter().any(|c| *c == text) {
                    Ok(text)
                } else {
                    Err(EntityError::ValidationError {
                        field: field.to_string(),
                        reason: format!("expected one of {:?} (got {:?} instead)", choices, text),
                    })
                }
            }
            FieldKind::Date => match value {
                FieldValue::Date(_) => Ok(value.to_string()),
                other => Err(self.type_mismatch(field, "date", other)),
            },
            FieldKind::DateTime => match value {
                FieldValue::DateTime(_) => Ok(value.to_string()),
                other => Err(self.type_mismatch(field, "datetime", other)),
            },
            FieldKind::Duration => match value {
                FieldValue::Duration(_) => Ok(value.to_string()),
                other => Err(self.type_mismatch(field, "timespan", other)),
            },
            FieldKind::Color => Self::match_pattern(field, color_regex(), value),
            FieldKind::Regex { pattern } => Self::match_pattern(field, pattern, value),
        }
    }

    // An enum without choices admits no value at all, not even a cleared one.
    fn accepts_null(&self) -> bool {
        !matches!(self, FieldKind::Enum { choices } if choices.is_empty())
    }

    fn decode(&self, field: &str, raw: &str) -> Result<FieldValue, EntityError> {
        match self {
            FieldKind::String | FieldKind::Enum { .. } | FieldKind::Color | FieldKind::Regex { .. } => {
                Ok(FieldValue::String(raw.to_string()))
            }
            FieldKind::Integer | FieldKind::Long => raw
                .trim()
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|e| self.decode_error(field, raw, e)),
            FieldKind::Float => raw
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|e| self.decode_error(field, raw, e)),
            FieldKind::Boolean => Ok(FieldValue::Bool(raw.starts_with('t') || raw == "1")),
            FieldKind::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map(FieldValue::Date)
                .map_err(|e| self.decode_error(field, raw, e)),
            FieldKind::DateTime => NaiveDateTime::parse_from_str(raw, DATETIME_PARSE_FORMAT)
                .map(FieldValue::DateTime)
                .map_err(|e| self.decode_error(field, raw, e)),
            FieldKind::Duration => raw
                .parse::<TimeSpan>()
                .map(FieldValue::Duration)
                .map_err(|e| self.decode_error(field, raw, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(kind: &FieldKind, value: impl Into<FieldValue>) -> Result<String, EntityError> {
        kind.validate_and_encode("f", &value.into())
    }

    #[test]
    fn test_integer_rejects_non_numeric() {
        assert_eq!(encode(&FieldKind::Integer, 42i64).unwrap(), "42");
        assert!(matches!(
            encode(&FieldKind::Integer, "42"),
            Err(EntityError::TypeMismatch { expected: "int", actual: "string", .. })
        ));
        assert_eq!(FieldKind::Long.decode("f", "9000000000").unwrap(), FieldValue::Int(9_000_000_000));
    }

    #[test]
    fn test_integer_decode_failure() {
        assert!(matches!(
            FieldKind::Integer.decode("f", "3.5"),
            Err(EntityError::DecodeFormat { .. })
        ));
    }

    #[test]
    fn test_float_round_trip() {
        let wire = encode(&FieldKind::Float, 2.5).unwrap();
        assert_eq!(FieldKind::Float.decode("f", &wire).unwrap(), FieldValue::Float(2.5));
    }

    #[test]
    fn test_boolean_is_asymmetric() {
        assert_eq!(encode(&FieldKind::Boolean, true).unwrap(), "true");
        assert_eq!(encode(&FieldKind::Boolean, false).unwrap(), "false");
        assert!(encode(&FieldKind::Boolean, 1i64).is_err());

        assert_eq!(FieldKind::Boolean.decode("f", "t").unwrap(), FieldValue::Bool(true));
        assert_eq!(FieldKind::Boolean.decode("f", "1").unwrap(), FieldValue::Bool(true));
        assert_eq!(FieldKind::Boolean.decode("f", "True").unwrap(), FieldValue::Bool(false));
        assert_eq!(FieldKind::Boolean.decode("f", "yes").unwrap(), FieldValue::Bool(false));
    }

    #[test]
    fn test_enum_containment() {
        let kind = FieldKind::choices([0i64, 1]);
        assert!(matches!(encode(&kind, 2i64), Err(EntityError::ValidationError { .. })));
        assert_eq!(encode(&kind, 1i64).unwrap(), "1");
        assert_eq!(encode(&kind, "0").unwrap(), "0");
    }

    #[test]
    fn test_empty_enum_rejects_everything() {
        let kind = FieldKind::Enum { choices: vec![] };
        assert!(encode(&kind, "").is_err());
        assert!(encode(&kind, "anything").is_err());
    }

    #[test]
    fn test_color_pattern() {
        assert_eq!(encode(&FieldKind::Color, "#AABBCC").unwrap(), "#AABBCC");
        assert!(matches!(encode(&FieldKind::Color, "AABBCC"), Err(EntityError::ValidationError { .. })));
        assert!(encode(&FieldKind::Color, "#ZZZZZZ").is_err());
    }

    #[test]
    fn test_regex_stringifies_and_anchors_at_start() {
        let kind = FieldKind::regex(r"\d{3}").unwrap();
        assert_eq!(encode(&kind, 12345i64).unwrap(), "12345");
        assert!(encode(&kind, "ab123").is_err());
    }

    #[test]
    fn test_date_and_datetime() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        let wire = encode(&FieldKind::Date, date).unwrap();
        assert_eq!(wire, "2020-01-31");
        assert_eq!(FieldKind::Date.decode("f", &wire).unwrap(), FieldValue::Date(date));
        assert!(encode(&FieldKind::Date, "2020-01-31").is_err());

        let dt = date.and_hms_micro_opt(23, 59, 1, 250).unwrap();
        let wire = encode(&FieldKind::DateTime, dt).unwrap();
        assert_eq!(wire, "2020-01-31 23:59:01.000250");
        assert_eq!(FieldKind::DateTime.decode("f", &wire).unwrap(), FieldValue::DateTime(dt));
    }

    #[test]
    fn test_duration_decode_format_error() {
        assert!(matches!(
            FieldKind::Duration.decode("f", "1 day"),
            Err(EntityError::DecodeFormat { .. })
        ));
        assert!(encode(&FieldKind::Duration, 5i64).is_err());
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(FieldKind::from_name("Integer"), Some(FieldKind::Integer)));
        assert!(matches!(FieldKind::from_name("timespan"), Some(FieldKind::Duration)));
        assert!(FieldKind::from_name("enum").is_none());
    }
}
