use crate::aggregators::{Aggregation, AggregationOptions};
use crate::common::Timestamp;
use crate::config::MAX_CHUNK_SAMPLES;
use crate::error_consts;
use crate::labels::{parse_selector_list, Label, Matchers};
use crate::series::range_utils::RangeOptions;
use crate::series::TimeSeriesOptions;
use std::iter::{Peekable, Skip};
use std::vec::IntoIter;
use valkey_module::{NextArg, ValkeyError, ValkeyResult, ValkeyString};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum CommandArgToken {
    Aggregation,
    ChunkSize,
    Filter,
    Labels,
    Reset,
    Retention,
    #[default]
    Invalid,
}

pub(crate) fn parse_command_arg_token(arg: &[u8]) -> Option<CommandArgToken> {
    hashify::tiny_map_ignore_case! {
        arg,
        "AGGREGATION" => CommandArgToken::Aggregation,
        "CHUNK_SIZE" => CommandArgToken::ChunkSize,
        "FILTER" => CommandArgToken::Filter,
        "LABELS" => CommandArgToken::Labels,
        "RESET" => CommandArgToken::Reset,
        "RETENTION" => CommandArgToken::Retention,
    }
}

pub type CommandArgIterator = Peekable<Skip<IntoIter<ValkeyString>>>;

/// Parses the timestamp argument of TS.ADD: `*` selects the server clock,
/// anything else must be a non-negative integer.
pub fn parse_timestamp_arg(arg: &str) -> ValkeyResult<Option<Timestamp>> {
    if arg == "*" {
        return Ok(None);
    }
    match arg.parse::<Timestamp>() {
        Ok(ts) if ts >= 0 => Ok(Some(ts)),
        _ => Err(ValkeyError::Str(error_consts::INVALID_TIMESTAMP)),
    }
}

pub fn parse_timestamp(arg: &str) -> ValkeyResult<Timestamp> {
    arg.parse::<Timestamp>()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_TIMESTAMP))
}

/// Parses a sample value. NaN and infinities are refused at the boundary so
/// the engine only ever stores finite samples.
pub fn parse_value_arg(arg: &ValkeyString) -> ValkeyResult<f64> {
    let value = arg
        .try_as_str()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_VALUE))?
        .parse::<f64>()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_VALUE))?;

    if value.is_nan() || value.is_infinite() {
        return Err(ValkeyError::Str(error_consts::INVALID_VALUE));
    }

    Ok(value)
}

fn parse_retention(args: &mut CommandArgIterator) -> ValkeyResult<u64> {
    let next = args
        .next_str()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_RETENTION))?;
    next.parse::<u64>()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_RETENTION))
}

fn parse_chunk_size(args: &mut CommandArgIterator) -> ValkeyResult<usize> {
    let next = args
        .next_str()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_CHUNK_SIZE))?;
    match next.parse::<usize>() {
        Ok(size) if size > 0 && size <= MAX_CHUNK_SAMPLES => Ok(size),
        _ => Err(ValkeyError::Str(error_consts::INVALID_CHUNK_SIZE)),
    }
}

/// Consumes `name value` pairs until the end of input. Label order is kept
/// as given; duplicate names are refused.
fn parse_label_pairs(args: &mut CommandArgIterator) -> ValkeyResult<Vec<Label>> {
    let mut labels: Vec<Label> = Vec::new();

    while args.peek().is_some() {
        let name = args
            .next_string()
            .map_err(|_| ValkeyError::Str(error_consts::INVALID_LABELS))?;
        if name.is_empty() {
            return Err(ValkeyError::Str(error_consts::INVALID_LABELS));
        }
        let value = args
            .next_string()
            .map_err(|_| ValkeyError::Str(error_consts::INVALID_LABELS))?;

        if labels.iter().any(|l| l.name == name) {
            return Err(ValkeyError::Str(error_consts::DUPLICATE_LABEL));
        }
        labels.push(Label::new(name, value));
    }

    Ok(labels)
}

/// Options trailing TS.CREATE and the auto-create form of TS.ADD:
/// `[RETENTION secs] [CHUNK_SIZE n] [LABELS name value ...]`
pub fn parse_series_options(args: &mut CommandArgIterator) -> ValkeyResult<TimeSeriesOptions> {
    let mut options = TimeSeriesOptions::default();

    while let Some(arg) = args.next() {
        let token = parse_command_arg_token(&arg).unwrap_or_default();
        match token {
            CommandArgToken::Retention => {
                options.retention_secs = Some(parse_retention(args)?);
            }
            CommandArgToken::ChunkSize => {
                options.chunk_size = Some(parse_chunk_size(args)?);
            }
            CommandArgToken::Labels => {
                options.labels = parse_label_pairs(args)?;
            }
            _ => {
                let msg = format!("ERR invalid argument '{arg}'");
                return Err(ValkeyError::String(msg));
            }
        }
    }

    Ok(options)
}

/// Parses `aggregator bucketSize` after the AGGREGATION keyword.
pub fn parse_aggregation_options(
    args: &mut CommandArgIterator,
) -> ValkeyResult<AggregationOptions> {
    let agg_str = args
        .next_str()
        .map_err(|_| ValkeyError::Str(error_consts::UNKNOWN_AGGREGATION_TYPE))?;
    let aggregation = Aggregation::try_from(agg_str)?;

    let bucket_str = args
        .next_str()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_BUCKET_SIZE))?;
    let bucket_size = match bucket_str.parse::<i64>() {
        Ok(size) if size > 0 => size,
        _ => return Err(ValkeyError::Str(error_consts::INVALID_BUCKET_SIZE)),
    };

    Ok(AggregationOptions {
        aggregation,
        bucket_size,
    })
}

/// `fromTimestamp toTimestamp [AGGREGATION aggregator bucketSize]`
pub fn parse_range_options(args: &mut CommandArgIterator) -> ValkeyResult<RangeOptions> {
    let start_ts = parse_timestamp(args.next_str()?)?;
    let end_ts = parse_timestamp(args.next_str()?)?;

    let mut options = RangeOptions {
        start_ts,
        end_ts,
        aggregation: None,
    };

    if let Some(next) = args.peek() {
        if parse_command_arg_token(next) == Some(CommandArgToken::Aggregation) {
            args.next();
            options.aggregation = Some(parse_aggregation_options(args)?);
        }
    }

    Ok(options)
}

/// Collects the selector atoms trailing QUERYINDEX / the FILTER keyword and
/// validates the conjunction.
pub fn parse_selector_args(args: &mut CommandArgIterator) -> ValkeyResult<Matchers> {
    let mut selectors: Vec<String> = Vec::new();
    while args.peek().is_some() {
        let arg = args.next_string()?;
        if arg.is_empty() {
            return Err(ValkeyError::Str(error_consts::INVALID_SELECTOR));
        }
        selectors.push(arg);
    }
    if selectors.is_empty() {
        return Err(ValkeyError::Str(error_consts::MISSING_FILTER));
    }
    parse_selector_list(selectors.iter().map(|s| s.as_str())).map_err(|e| e.into())
}
