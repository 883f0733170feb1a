//! Value coercion into typed storage families
//!
//! Every declared value type has a natural family. A value that does not
//! parse under its natural family is not rejected: it falls through
//! integer, then double, then string, so every non-empty input yields exactly
//! one typed value.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::melt::types::ValueFamily;
use crate::model::DataTypeDefXsd;

// Decimal and scientific notation only; rules out "inf", "NaN" and friends
static DOUBLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap()
});

/// Natural storage family of a declared value type.
///
/// `xs:decimal` is kept as text so no precision is lost.
pub fn natural_family(data_type: DataTypeDefXsd) -> ValueFamily {
    use DataTypeDefXsd::*;
    match data_type {
        Byte | Int | Integer | Long | NegativeInteger | NonNegativeInteger
        | NonPositiveInteger | PositiveInteger | Short | UnsignedByte | UnsignedInt
        | UnsignedLong | UnsignedShort => ValueFamily::Integer,
        Double | Float => ValueFamily::Double,
        AnyUri | Base64Binary | Boolean | Date | DateTime | Decimal | Duration | GDay | GMonth
        | GMonthDay | GYear | GYearMonth | HexBinary | String | Time => ValueFamily::String,
    }
}

/// A scalar after coercion
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    String(String),
    Integer(i64),
    Double(f64),
}

impl ScalarValue {
    pub fn family(&self) -> ValueFamily {
        match self {
            ScalarValue::String(_) => ValueFamily::String,
            ScalarValue::Integer(_) => ValueFamily::Integer,
            ScalarValue::Double(_) => ValueFamily::Double,
        }
    }

    /// Textual form used when a value has to move into the string family
    pub fn to_text(&self) -> String {
        match self {
            ScalarValue::String(s) => s.clone(),
            ScalarValue::Integer(i) => i.to_string(),
            ScalarValue::Double(d) => d.to_string(),
        }
    }

    fn into_double(self) -> ScalarValue {
        match self {
            ScalarValue::Integer(i) => ScalarValue::Double(i as f64),
            other => other,
        }
    }

    fn into_string(self) -> ScalarValue {
        match self {
            ScalarValue::String(_) => self,
            other => ScalarValue::String(other.to_text()),
        }
    }
}

/// Outcome of coercing one raw value
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: ScalarValue,
    /// Family the declared type asked for
    pub declared: ValueFamily,
}

impl Coerced {
    pub fn family(&self) -> ValueFamily {
        self.value.family()
    }

    /// True when the value landed outside its declared family
    pub fn fell_back(&self) -> bool {
        self.value.family() != self.declared
    }
}

fn parse_integer(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn parse_double(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if !DOUBLE_REGEX.is_match(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|d| d.is_finite())
}

/// Coerce a raw value under its declared type.
///
/// Returns `None` for an absent or empty value; the caller then creates no
/// value record. An absent declared type counts as `xs:string`.
pub fn coerce(raw: Option<&str>, declared: Option<DataTypeDefXsd>) -> Option<Coerced> {
    let raw = raw.filter(|s| !s.is_empty())?;
    let declared = declared.map(natural_family).unwrap_or(ValueFamily::String);

    let natural = match declared {
        ValueFamily::String => Some(ScalarValue::String(raw.to_string())),
        ValueFamily::Integer => parse_integer(raw).map(ScalarValue::Integer),
        ValueFamily::Double => parse_double(raw).map(ScalarValue::Double),
    };

    let value = natural
        .or_else(|| parse_integer(raw).map(ScalarValue::Integer))
        .or_else(|| parse_double(raw).map(ScalarValue::Double))
        .unwrap_or_else(|| ScalarValue::String(raw.to_string()));

    Some(Coerced { value, declared })
}

/// Both bounds of a range, moved into one shared family
#[derive(Debug, Clone, PartialEq)]
pub struct RangeValues {
    pub family: ValueFamily,
    pub min: Option<ScalarValue>,
    pub max: Option<ScalarValue>,
}

/// Reconcile independently coerced range bounds.
///
/// Matching families are kept; an integer/double mix is promoted to double;
/// any other mix is re-expressed as text. `None` when neither bound is set.
pub fn reconcile_range(min: Option<Coerced>, max: Option<Coerced>) -> Option<RangeValues> {
    let (min, max) = match (min, max) {
        (None, None) => return None,
        (Some(min), None) => {
            return Some(RangeValues {
                family: min.family(),
                min: Some(min.value),
                max: None,
            })
        }
        (None, Some(max)) => {
            return Some(RangeValues {
                family: max.family(),
                min: None,
                max: Some(max.value),
            })
        }
        (Some(min), Some(max)) => (min.value, max.value),
    };

    let family = match (min.family(), max.family()) {
        (a, b) if a == b => a,
        (ValueFamily::String, _) | (_, ValueFamily::String) => ValueFamily::String,
        _ => ValueFamily::Double,
    };

    let (min, max) = match family {
        ValueFamily::Double => (min.into_double(), max.into_double()),
        ValueFamily::String => (min.into_string(), max.into_string()),
        ValueFamily::Integer => (min, max),
    };

    Some(RangeValues {
        family,
        min: Some(min),
        max: Some(max),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_double_parses_exactly() {
        let coerced = coerce(Some("12.75"), Some(DataTypeDefXsd::Double)).unwrap();
        assert_eq!(coerced.value, ScalarValue::Double(12.75));
        assert!(!coerced.fell_back());
    }

    #[test]
    fn test_declared_double_non_numeric_falls_back_to_string() {
        let coerced = coerce(Some("n/a"), Some(DataTypeDefXsd::Double)).unwrap();
        assert_eq!(coerced.value, ScalarValue::String("n/a".to_string()));
        assert!(coerced.fell_back());
    }

    #[test]
    fn test_declared_double_with_integer_text_is_double() {
        let coerced = coerce(Some("3"), Some(DataTypeDefXsd::Float)).unwrap();
        assert_eq!(coerced.value, ScalarValue::Double(3.0));
    }

    #[test]
    fn test_declared_integer_with_fraction_falls_back_to_double() {
        let coerced = coerce(Some("2.5"), Some(DataTypeDefXsd::Int)).unwrap();
        assert_eq!(coerced.value, ScalarValue::Double(2.5));
        assert_eq!(coerced.declared, ValueFamily::Integer);
        assert!(coerced.fell_back());
    }

    #[test]
    fn test_string_family_keeps_raw_text() {
        let coerced = coerce(Some(" 42 "), Some(DataTypeDefXsd::String)).unwrap();
        assert_eq!(coerced.value, ScalarValue::String(" 42 ".to_string()));
    }

    #[test]
    fn test_integer_tolerates_surrounding_whitespace() {
        let coerced = coerce(Some(" -17 "), Some(DataTypeDefXsd::Long)).unwrap();
        assert_eq!(coerced.value, ScalarValue::Integer(-17));
    }

    #[test]
    fn test_empty_and_absent_values_produce_nothing() {
        assert!(coerce(None, Some(DataTypeDefXsd::Int)).is_none());
        assert!(coerce(Some(""), Some(DataTypeDefXsd::Int)).is_none());
    }

    #[test]
    fn test_non_finite_words_stay_strings() {
        let coerced = coerce(Some("NaN"), Some(DataTypeDefXsd::Double)).unwrap();
        assert_eq!(coerced.family(), ValueFamily::String);
        let coerced = coerce(Some("inf"), Some(DataTypeDefXsd::Double)).unwrap();
        assert_eq!(coerced.family(), ValueFamily::String);
    }

    #[test]
    fn test_integer_overflow_becomes_double() {
        let coerced = coerce(Some("99999999999999999999"), Some(DataTypeDefXsd::Integer)).unwrap();
        assert_eq!(coerced.family(), ValueFamily::Double);
    }

    #[test]
    fn test_missing_declared_type_is_string() {
        let coerced = coerce(Some("5"), None).unwrap();
        assert_eq!(coerced.value, ScalarValue::String("5".to_string()));
    }

    #[test]
    fn test_range_mixed_numbers_promote_to_double() {
        let min = coerce(Some("1"), Some(DataTypeDefXsd::Int));
        let max = coerce(Some("2.5"), Some(DataTypeDefXsd::Int));
        let range = reconcile_range(min, max).unwrap();

        assert_eq!(range.family, ValueFamily::Double);
        assert_eq!(range.min, Some(ScalarValue::Double(1.0)));
        assert_eq!(range.max, Some(ScalarValue::Double(2.5)));
    }

    #[test]
    fn test_range_single_bound_keeps_its_family() {
        let min = coerce(Some("abc"), Some(DataTypeDefXsd::Int));
        let range = reconcile_range(min, None).unwrap();

        assert_eq!(range.family, ValueFamily::String);
        assert_eq!(range.min, Some(ScalarValue::String("abc".to_string())));
        assert_eq!(range.max, None);
    }

    #[test]
    fn test_range_string_mix_is_text() {
        let min = coerce(Some("low"), Some(DataTypeDefXsd::Double));
        let max = coerce(Some("7.5"), Some(DataTypeDefXsd::Double));
        let range = reconcile_range(min, max).unwrap();

        assert_eq!(range.family, ValueFamily::String);
        assert_eq!(range.min, Some(ScalarValue::String("low".to_string())));
        assert_eq!(range.max, Some(ScalarValue::String("7.5".to_string())));
    }

    #[test]
    fn test_range_matching_integers() {
        let min = coerce(Some("1"), Some(DataTypeDefXsd::Int));
        let max = coerce(Some("10"), Some(DataTypeDefXsd::Int));
        let range = reconcile_range(min, max).unwrap();

        assert_eq!(range.family, ValueFamily::Integer);
        assert_eq!(range.max, Some(ScalarValue::Integer(10)));
    }

    #[test]
    fn test_range_without_bounds_is_none() {
        assert!(reconcile_range(None, None).is_none());
    }

    #[test]
    fn test_natural_family_table() {
        assert_eq!(natural_family(DataTypeDefXsd::UnsignedShort), ValueFamily::Integer);
        assert_eq!(natural_family(DataTypeDefXsd::Float), ValueFamily::Double);
        assert_eq!(natural_family(DataTypeDefXsd::Decimal), ValueFamily::String);
        assert_eq!(natural_family(DataTypeDefXsd::Boolean), ValueFamily::String);
    }
}
