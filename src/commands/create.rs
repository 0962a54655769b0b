use crate::commands::arg_parse::parse_series_options;
use crate::series::create_and_store_series;
use valkey_module::{Context, NextArg, ValkeyError, ValkeyResult, ValkeyString, VALKEY_OK};

///
/// TS.CREATE key [RETENTION secs] [CHUNK_SIZE n] [LABELS name value ...]
///
/// Creates an empty series under `key`. Fails if the key already exists.
///
pub fn create(ctx: &Context, args: Vec<ValkeyString>) -> ValkeyResult {
    if args.len() < 2 {
        return Err(ValkeyError::WrongArity);
    }
    let mut args = args.into_iter().skip(1).peekable();

    let key = args.next_arg()?;
    let options = parse_series_options(&mut args)?;
    args.done()?;

    create_and_store_series(ctx, &key, options, true)?;

    VALKEY_OK
}
