use crate::error::TsdbError;
use std::fmt::Display;
use strum_macros::EnumIter;
use valkey_module::{ValkeyError, ValkeyString};

mod handlers;
mod iterator;

pub use handlers::*;
pub use iterator::*;

use crate::error_consts;

#[derive(Debug, PartialEq, Eq, Clone, Copy, EnumIter)]
pub enum Aggregation {
    Avg,
    Sum,
    Min,
    Max,
    Count,
    First,
    Last,
    Range,
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Avg => "avg",
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Count => "count",
            Aggregation::First => "first",
            Aggregation::Last => "last",
            Aggregation::Range => "range",
        }
    }

    /// Stable id used in the persisted format.
    pub fn id(&self) -> u8 {
        match self {
            Aggregation::Avg => 0,
            Aggregation::Sum => 1,
            Aggregation::Min => 2,
            Aggregation::Max => 3,
            Aggregation::Count => 4,
            Aggregation::First => 5,
            Aggregation::Last => 6,
            Aggregation::Range => 7,
        }
    }
}

impl Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u8> for Aggregation {
    type Error = TsdbError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Aggregation::Avg),
            1 => Ok(Aggregation::Sum),
            2 => Ok(Aggregation::Min),
            3 => Ok(Aggregation::Max),
            4 => Ok(Aggregation::Count),
            5 => Ok(Aggregation::First),
            6 => Ok(Aggregation::Last),
            7 => Ok(Aggregation::Range),
            _ => Err(TsdbError::UnknownAggregator),
        }
    }
}

impl TryFrom<&str> for Aggregation {
    type Error = ValkeyError;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = hashify::tiny_map_ignore_case! {
            value.as_bytes(),
            "avg" => Aggregation::Avg,
            "sum" => Aggregation::Sum,
            "min" => Aggregation::Min,
            "max" => Aggregation::Max,
            "count" => Aggregation::Count,
            "first" => Aggregation::First,
            "last" => Aggregation::Last,
            "range" => Aggregation::Range,
        };

        match value {
            Some(agg) => Ok(agg),
            None => Err(ValkeyError::Str(error_consts::UNKNOWN_AGGREGATION_TYPE)),
        }
    }
}

impl TryFrom<&ValkeyString> for Aggregation {
    type Error = ValkeyError;

    fn try_from(value: &ValkeyString) -> Result<Self, Self::Error> {
        let str = value.to_string_lossy();
        Aggregation::try_from(str.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn aggregation_parses_case_insensitively() {
        assert_eq!(Aggregation::try_from("avg").unwrap(), Aggregation::Avg);
        assert_eq!(Aggregation::try_from("AVG").unwrap(), Aggregation::Avg);
        assert_eq!(Aggregation::try_from("CoUnT").unwrap(), Aggregation::Count);
        assert_eq!(Aggregation::try_from("range").unwrap(), Aggregation::Range);
    }

    #[test]
    fn aggregation_rejects_unknown_names() {
        assert!(Aggregation::try_from("median").is_err());
        assert!(Aggregation::try_from("").is_err());
        assert!(Aggregation::try_from("std.p").is_err());
    }

    #[test]
    fn aggregation_id_round_trips() {
        for agg in Aggregation::iter() {
            assert_eq!(Aggregation::try_from(agg.id()).unwrap(), agg);
        }
    }

    #[test]
    fn aggregation_name_round_trips() {
        for agg in Aggregation::iter() {
            assert_eq!(Aggregation::try_from(agg.name()).unwrap(), agg);
        }
    }
}
