use crate::commands::arg_parse::{parse_command_arg_token, parse_value_arg, CommandArgToken};
use crate::common::time::current_time_secs;
use crate::error_consts;
use crate::series::{apply_compaction_rules, get_timeseries_mut, AppendOutcome};
use valkey_module::{
    Context, NextArg, NotifyEvent, ValkeyError, ValkeyResult, ValkeyString, ValkeyValue,
};

pub fn incrby(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    incr_decr(ctx, args, true)
}

pub fn decrby(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    incr_decr(ctx, args, false)
}

///
/// TS.INCRBY key delta [RESET bucketSecs]
/// TS.DECRBY key delta [RESET bucketSecs]
///
/// Counter update against the server clock. With RESET the running value
/// restarts at every bucket boundary and the sample is written at the
/// aligned bucket start; without it the counter accumulates forever.
///
/// Replies with the timestamp the value was written at.
///
fn incr_decr(ctx: &Context, args: Vec<ValkeyString>, is_increment: bool) -> ValkeyResult {
    if args.len() < 3 {
        return Err(ValkeyError::WrongArity);
    }

    let delta = parse_value_arg(&args[2])?;
    let delta = if is_increment { delta } else { -delta };
    let key = &args[1];

    let mut rest = args.clone().into_iter().skip(3).peekable();
    let reset_secs = parse_reset_arg(&mut rest)?;
    rest.done()?;

    let Some(mut series) = get_timeseries_mut(ctx, key, true)? else {
        return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
    };

    let outcome = series.increment(current_time_secs(), delta, reset_secs)?;

    if let AppendOutcome::Appended(sample) = outcome {
        apply_compaction_rules(ctx, series.get_series_mut(), key, sample);
    }

    let event = if is_increment { "ts.incrby" } else { "ts.decrby" };
    ctx.replicate_verbatim();
    ctx.notify_keyspace_event(NotifyEvent::MODULE, event, key);

    Ok(ValkeyValue::Integer(outcome.timestamp()))
}

fn parse_reset_arg(
    args: &mut crate::commands::arg_parse::CommandArgIterator,
) -> ValkeyResult<Option<i64>> {
    let Some(next) = args.peek() else {
        return Ok(None);
    };
    if parse_command_arg_token(next) != Some(CommandArgToken::Reset) {
        let msg = format!("ERR invalid argument '{next}'");
        return Err(ValkeyError::String(msg));
    }
    args.next();

    let bucket = args
        .next_str()
        .map_err(|_| ValkeyError::Str(error_consts::INVALID_RESET_BUCKET))?;
    match bucket.parse::<i64>() {
        Ok(size) if size > 0 => Ok(Some(size)),
        _ => Err(ValkeyError::Str(error_consts::INVALID_RESET_BUCKET)),
    }
}
