use get_size::GetSize;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use valkey_module::ValkeyValue;

pub type Timestamp = i64;
pub type SampleValue = f64;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, GetSize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: SampleValue,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: SampleValue) -> Self {
        Sample { timestamp, value }
    }
}

impl PartialEq for Sample {
    #[inline]
    fn eq(&self, other: &Sample) -> bool {
        // Two samples are equal if their times are equal, and their values are either equal or are NaN.
        if self.timestamp == other.timestamp {
            return if self.value.is_nan() {
                other.value.is_nan()
            } else {
                self.value == other.value
            };
        }
        false
    }
}

impl Eq for Sample {}

impl Ord for Sample {
    fn cmp(&self, other: &Self) -> Ordering {
        let cmp = self.timestamp.cmp(&other.timestamp);
        if cmp == Ordering::Equal {
            if self.value.is_nan() {
                if other.value.is_nan() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            } else if other.value.is_nan() {
                Ordering::Less
            } else {
                self.value.partial_cmp(&other.value).unwrap()
            }
        } else {
            cmp
        }
    }
}

impl PartialOrd for Sample {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Sample {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.timestamp.hash(state);
        self.value.to_bits().hash(state);
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.value, self.timestamp)
    }
}

/// Renders a sample value the way it is returned over the wire: integral values
/// without a decimal point, everything else with the shortest roundtrip form.
pub fn format_sample_value(value: SampleValue) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < (i64::MAX as f64) {
        return format!("{}", value as i64);
    }
    format!("{value}")
}

impl From<Sample> for ValkeyValue {
    fn from(sample: Sample) -> Self {
        (&sample).into()
    }
}

impl From<&Sample> for ValkeyValue {
    fn from(sample: &Sample) -> Self {
        let row = vec![
            ValkeyValue::from(sample.timestamp),
            ValkeyValue::BulkString(format_sample_value(sample.value)),
        ];
        ValkeyValue::from(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(5.0, "5"; "small integer")]
    #[test_case(0.0, "0"; "zero")]
    #[test_case(-42.0, "-42"; "negative integer")]
    #[test_case(3.5, "3.5"; "simple fraction")]
    #[test_case(156.5, "156.5"; "mixed fraction")]
    #[test_case(0.1, "0.1"; "shortest roundtrip")]
    fn format_sample_value_cases(value: f64, expected: &str) {
        assert_eq!(format_sample_value(value), expected);
    }

    #[test]
    fn format_sample_value_non_finite() {
        assert_eq!(format_sample_value(f64::NAN), "NaN");
        assert_eq!(format_sample_value(f64::INFINITY), "inf");
    }

    #[test]
    fn sample_equality_treats_nan_values_as_equal() {
        let a = Sample::new(10, f64::NAN);
        let b = Sample::new(10, f64::NAN);
        assert_eq!(a, b);
        assert_ne!(Sample::new(10, 1.0), Sample::new(11, 1.0));
    }
}
