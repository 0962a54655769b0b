use crate::error_consts;
use crate::series::get_timeseries_mut;
use valkey_module::{Context, NotifyEvent, ValkeyError, ValkeyResult, ValkeyString, VALKEY_OK};

///
/// TS.DELETERULE sourceKey destKey
///
/// Removes a compaction rule. The rule's open-bucket context is discarded;
/// the destination series is left in place, still holding whatever the rule
/// last wrote into it.
///
pub fn delete_rule(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() != 3 {
        return Err(ValkeyError::WrongArity);
    }

    let source_key = &args[1];
    let dest_key = &args[2];

    let Some(mut source_series) = get_timeseries_mut(ctx, source_key, true)? else {
        return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
    };

    let dest_key_str = dest_key.to_string_lossy();
    if source_series.remove_rule(&dest_key_str).is_none() {
        return Err(ValkeyError::Str(error_consts::RULE_NOT_FOUND));
    }

    // the destination might already be gone; clearing its marker is best effort
    if let Ok(Some(mut dest_series)) = get_timeseries_mut(ctx, dest_key, false) {
        if dest_series.src_key.as_deref() == Some(source_key.to_string_lossy().as_str()) {
            dest_series.src_key = None;
        }
    }

    ctx.replicate_verbatim();
    ctx.notify_keyspace_event(NotifyEvent::MODULE, "ts.deleterule:src", source_key);
    ctx.notify_keyspace_event(NotifyEvent::MODULE, "ts.deleterule:dest", dest_key);

    VALKEY_OK
}
