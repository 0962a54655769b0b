use crate::commands::arg_parse::parse_range_options;
use crate::error_consts;
use crate::series::get_timeseries;
use crate::series::range_utils::get_range;
use valkey_module::{Context, NextArg, ValkeyError, ValkeyResult, ValkeyString, ValkeyValue};

///
/// TS.RANGE key fromTimestamp toTimestamp [AGGREGATION aggregator bucketSize]
///
/// Replies with an array of `[timestamp, value-string]` pairs in timestamp
/// order. With AGGREGATION the samples are folded into fixed-width buckets,
/// one entry per bucket that contains data.
///
pub fn range(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() < 4 {
        return Err(ValkeyError::WrongArity);
    }

    let mut args = args.into_iter().skip(1).peekable();

    let key = args.next_arg()?;
    let options = parse_range_options(&mut args)?;
    args.done()?;

    let Some(series) = get_timeseries(ctx, &key, true)? else {
        // essentially a dead branch, but satisfies the compiler
        // since we have already checked the key existence
        return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
    };

    let samples = get_range(&series, &options);
    let result = samples
        .into_iter()
        .map(|x| x.into())
        .collect::<Vec<ValkeyValue>>();

    Ok(ValkeyValue::from(result))
}
