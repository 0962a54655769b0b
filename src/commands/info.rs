use crate::error_consts;
use crate::series::{get_timeseries, TimeSeries};
use valkey_module::{Context, NextArg, ValkeyError, ValkeyResult, ValkeyString, ValkeyValue};

///
/// TS.INFO key
///
/// Replies with a flat array of alternating field names and values:
/// lastTimestamp, retentionSecs, chunkCount, maxSamplesPerChunk, labels and
/// rules. Aggregator names are echoed uppercase.
///
pub fn info(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() != 2 {
        return Err(ValkeyError::WrongArity);
    }
    let mut args = args.into_iter().skip(1);
    let key = args.next_arg()?;
    args.done()?;

    let Some(series) = get_timeseries(ctx, &key, true)? else {
        return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
    };

    Ok(get_series_info(&series))
}

fn get_series_info(series: &TimeSeries) -> ValkeyValue {
    let labels = series
        .labels
        .iter()
        .map(|label| label.into())
        .collect::<Vec<ValkeyValue>>();

    let rules = series
        .rules
        .iter()
        .map(|rule| {
            ValkeyValue::Array(vec![
                ValkeyValue::BulkString(rule.dest_key.clone()),
                ValkeyValue::Integer(rule.bucket_secs),
                ValkeyValue::SimpleString(rule.aggregation().name().to_ascii_uppercase()),
            ])
        })
        .collect::<Vec<ValkeyValue>>();

    ValkeyValue::Array(vec![
        ValkeyValue::SimpleStringStatic("lastTimestamp"),
        ValkeyValue::Integer(series.last_timestamp()),
        ValkeyValue::SimpleStringStatic("retentionSecs"),
        ValkeyValue::Integer(series.retention_secs as i64),
        ValkeyValue::SimpleStringStatic("chunkCount"),
        ValkeyValue::Integer(series.chunk_count() as i64),
        ValkeyValue::SimpleStringStatic("maxSamplesPerChunk"),
        ValkeyValue::Integer(series.max_samples_per_chunk as i64),
        ValkeyValue::SimpleStringStatic("labels"),
        ValkeyValue::Array(labels),
        ValkeyValue::SimpleStringStatic("rules"),
        ValkeyValue::Array(rules),
    ])
}
