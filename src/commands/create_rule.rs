use crate::commands::arg_parse::parse_aggregation_options;
use crate::error_consts;
use crate::series::{get_timeseries_mut, CompactionRule};
use valkey_module::{
    Context, NextArg, NotifyEvent, ValkeyError, ValkeyResult, ValkeyString, VALKEY_OK,
};

///
/// TS.CREATERULE sourceKey destKey AGGREGATION aggregator bucketSize
///
/// Attaches a compaction rule from sourceKey to destKey. Derivation is one
/// hop only: the destination may not already be derived, and a series that
/// is itself a destination cannot become a source.
///
pub fn create_rule(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() != 6 {
        return Err(ValkeyError::WrongArity);
    }

    let source_key = &args[1];
    let dest_key = &args[2];

    if source_key == dest_key {
        return Err(ValkeyError::Str(error_consts::SAME_SOURCE_AND_DEST));
    }

    let mut rest = args.clone().into_iter().skip(3).peekable();
    let keyword = rest.next_str()?;
    if !keyword.eq_ignore_ascii_case("AGGREGATION") {
        return Err(ValkeyError::Str(error_consts::MISSING_AGGREGATION));
    }
    let options = parse_aggregation_options(&mut rest)?;
    rest.done()?;

    let Some(mut source_series) = get_timeseries_mut(ctx, source_key, true)? else {
        return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
    };
    let Some(mut dest_series) = get_timeseries_mut(ctx, dest_key, true)? else {
        return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
    };

    let dest_key_str = dest_key.to_string_lossy();
    if source_series.has_rule_to(&dest_key_str) {
        return Err(ValkeyError::Str(error_consts::RULE_EXISTS));
    }
    if dest_series.is_compaction_dest() {
        return Err(ValkeyError::Str(error_consts::DEST_ALREADY_DERIVED));
    }
    if source_series.is_compaction_dest() {
        return Err(ValkeyError::Str(error_consts::CYCLIC_RULE));
    }

    source_series.rules.push(CompactionRule::new(
        dest_key_str,
        options.aggregation,
        options.bucket_size,
    ));
    dest_series.src_key = Some(source_key.to_string_lossy());

    ctx.replicate_verbatim();
    ctx.notify_keyspace_event(NotifyEvent::MODULE, "ts.createrule:src", source_key);
    ctx.notify_keyspace_event(NotifyEvent::MODULE, "ts.createrule:dest", dest_key);

    VALKEY_OK
}
