use crate::commands::arg_parse::{
    parse_aggregation_options, parse_command_arg_token, parse_selector_args, parse_timestamp,
    CommandArgToken,
};
use crate::error_consts;
use crate::series::get_timeseries;
use crate::series::range_utils::{get_range, RangeOptions};
use valkey_module::{Context, NextArg, ValkeyError, ValkeyResult, ValkeyString, ValkeyValue};

///
/// TS.MRANGE fromTimestamp toTimestamp [AGGREGATION aggregator bucketSize] FILTER selector...
///
/// Runs a range query over every series matching the label selector.
/// Replies, per matching series in creation order, with
/// `[key, labels-array, samples-array]`.
///
pub fn mrange(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() < 5 {
        return Err(ValkeyError::WrongArity);
    }
    let mut args = args.into_iter().skip(1).peekable();

    let start_ts = parse_timestamp(args.next_str()?)?;
    let end_ts = parse_timestamp(args.next_str()?)?;

    let mut aggregation = None;
    loop {
        let Some(arg) = args.next() else {
            return Err(ValkeyError::Str(error_consts::MISSING_FILTER));
        };
        match parse_command_arg_token(&arg).unwrap_or_default() {
            CommandArgToken::Aggregation => {
                aggregation = Some(parse_aggregation_options(&mut args)?);
            }
            CommandArgToken::Filter => break,
            _ => {
                let msg = format!("ERR invalid argument '{arg}'");
                return Err(ValkeyError::String(msg));
            }
        }
    }

    let matchers = parse_selector_args(&mut args)?;
    let options = RangeOptions {
        start_ts,
        end_ts,
        aggregation,
    };

    let keys = crate::series::index::with_label_index(ctx, |index| {
        index.series_keys_matching(&matchers)
    });

    let mut rows = Vec::with_capacity(keys.len());
    for key_name in keys {
        let key = ctx.create_string(key_name.as_str());
        // the index is kept in sync with the keyspace, but a key may still be
        // of the wrong type after an out-of-band overwrite
        let Ok(Some(series)) = get_timeseries(ctx, &key, false) else {
            continue;
        };

        let labels = series
            .labels
            .iter()
            .map(|label| label.into())
            .collect::<Vec<ValkeyValue>>();
        let samples = get_range(&series, &options)
            .into_iter()
            .map(|sample| sample.into())
            .collect::<Vec<ValkeyValue>>();

        rows.push(ValkeyValue::Array(vec![
            ValkeyValue::BulkString(key_name),
            ValkeyValue::Array(labels),
            ValkeyValue::Array(samples),
        ]));
    }

    Ok(ValkeyValue::from(rows))
}
