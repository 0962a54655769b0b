use crate::commands::arg_parse::parse_selector_args;
use crate::series::index::with_label_index;
use valkey_module::{Context, ValkeyError, ValkeyResult, ValkeyString, ValkeyValue};

///
/// TS.QUERYINDEX selector...
///
/// Replies with the keys of every series matching the selector conjunction,
/// in the order the series were created.
///
pub fn query_index(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() < 2 {
        return Err(ValkeyError::WrongArity);
    }
    let mut args = args.into_iter().skip(1).peekable();

    let matchers = parse_selector_args(&mut args)?;

    let keys = with_label_index(ctx, |index| index.series_keys_matching(&matchers));

    let result = keys
        .into_iter()
        .map(ValkeyValue::BulkString)
        .collect::<Vec<_>>();
    Ok(ValkeyValue::from(result))
}
