use crate::error_consts;
use thiserror::Error;
use valkey_module::ValkeyError;

/// Enum for the various errors surfaced by the storage engine.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TsdbError {
    #[error("TSDB: timestamp must be higher than the maximum existing timestamp")]
    BadTimestamp,

    #[error("Chunk at full capacity. Max capacity {0}.")]
    CapacityFull(usize),

    #[error("TSDB: unknown AGGREGATION type")]
    UnknownAggregator,

    #[error("TSDB: invalid series selector")]
    InvalidSelector,

    #[error("Cannot deserialize. {0}")]
    CannotDeserialize(String),

    #[error("{0}")]
    General(String),
}

pub type TsdbResult<T = ()> = Result<T, TsdbError>;

impl From<&str> for TsdbError {
    fn from(s: &str) -> Self {
        TsdbError::General(s.to_string())
    }
}

impl From<String> for TsdbError {
    fn from(s: String) -> Self {
        TsdbError::General(s)
    }
}

impl From<TsdbError> for ValkeyError {
    fn from(e: TsdbError) -> Self {
        match e {
            TsdbError::BadTimestamp => ValkeyError::Str(error_consts::TIMESTAMP_TOO_OLD),
            TsdbError::UnknownAggregator => {
                ValkeyError::Str(error_consts::UNKNOWN_AGGREGATION_TYPE)
            }
            TsdbError::InvalidSelector => ValkeyError::Str(error_consts::INVALID_SELECTOR),
            other => ValkeyError::String(other.to_string()),
        }
    }
}
