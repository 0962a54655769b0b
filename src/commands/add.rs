use crate::commands::arg_parse::{parse_series_options, parse_timestamp_arg, parse_value_arg};
use crate::common::time::current_time_secs;
use crate::common::Timestamp;
use crate::error_consts;
use crate::series::{
    apply_compaction_rules, create_and_store_series, get_timeseries_mut, AppendOutcome,
};
use valkey_module::{
    Context, NextArg, NotifyEvent, ValkeyError, ValkeyResult, ValkeyString, ValkeyValue,
};

///
/// TS.ADD key timestamp|* value [RETENTION secs] [CHUNK_SIZE n] [LABELS name value ...]
///
/// Appends a sample. A missing key is created first, honoring the trailing
/// series options; on an existing key those options are ignored. `*` takes
/// the timestamp from the server clock, where a same-second call overwrites
/// the last value instead of failing the monotonicity check.
///
/// Replies with the ingested timestamp.
///
pub fn add(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() < 4 {
        return Err(ValkeyError::WrongArity);
    }

    let timestamp = parse_timestamp_arg(args[2].try_as_str()?)?;
    let value = parse_value_arg(&args[3])?;
    let key = &args[1];

    if get_timeseries_mut(ctx, key, false)?.is_none() {
        let mut create_args = args.clone().into_iter().skip(4).peekable();
        let options = parse_series_options(&mut create_args)?;
        create_args.done()?;
        create_and_store_series(ctx, key, options, false)?;
    }

    let Some(mut series) = get_timeseries_mut(ctx, key, true)? else {
        return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
    };

    let outcome = match timestamp {
        Some(ts) => AppendOutcome::Appended(series.add(ts, value)?),
        None => series.upsert_last(current_time_secs(), value)?,
    };

    if let AppendOutcome::Appended(sample) = outcome {
        apply_compaction_rules(ctx, series.get_series_mut(), key, sample);
    }

    replicate_and_notify(ctx, args, timestamp.is_none().then(|| outcome.timestamp()));

    Ok(ValkeyValue::Integer(outcome.timestamp()))
}

fn replicate_and_notify(ctx: &Context, args: Vec<ValkeyString>, auto_timestamp: Option<Timestamp>) {
    if let Some(ts) = auto_timestamp {
        // "*" resolves to a different value on a replica, so replicate the
        // concrete timestamp instead
        let ts_str = ts.to_string();
        let mut args = args;
        args.remove(0);
        args[1] = ctx.create_string(ts_str.as_bytes());
        let replication_args = args.iter().collect::<Vec<_>>();
        ctx.replicate("TS.ADD", &*replication_args);
        let key = args.swap_remove(0);
        ctx.notify_keyspace_event(NotifyEvent::MODULE, "ts.add", &key);
    } else {
        ctx.replicate_verbatim();
        ctx.notify_keyspace_event(NotifyEvent::MODULE, "ts.add", &args[1]);
    }
}
