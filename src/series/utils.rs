use crate::common::db::get_current_db;
use crate::error_consts;
use crate::series::index::with_label_index;
use crate::series::series_data_type::VK_TIME_SERIES_TYPE;
use crate::series::{SeriesGuard, SeriesGuardMut, TimeSeries, TimeSeriesOptions};
use valkey_module::key::ValkeyKeyWritable;
use valkey_module::{Context, NotifyEvent, ValkeyError, ValkeyResult, ValkeyString};

pub fn get_timeseries<'a>(
    ctx: &'a Context,
    key: &ValkeyString,
    must_exist: bool,
) -> ValkeyResult<Option<SeriesGuard<'a>>> {
    match SeriesGuard::from_key(ctx, key) {
        Ok(guard) => Ok(Some(guard)),
        Err(e) => match e {
            ValkeyError::Str(err) if err == error_consts::KEY_NOT_FOUND => {
                if must_exist {
                    return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
                }
                Ok(None)
            }
            _ => Err(e),
        },
    }
}

pub fn get_timeseries_mut<'a>(
    ctx: &'a Context,
    key: &ValkeyString,
    must_exist: bool,
) -> ValkeyResult<Option<SeriesGuardMut<'a>>> {
    let value_key = ctx.open_key_writable(key);
    match value_key.get_value::<TimeSeries>(&VK_TIME_SERIES_TYPE) {
        Ok(Some(series)) => Ok(Some(SeriesGuardMut { series })),
        Ok(None) => {
            if must_exist {
                return Err(ValkeyError::Str(error_consts::KEY_NOT_FOUND));
            }
            Ok(None)
        }
        Err(_e) => Err(ValkeyError::WrongType),
    }
}

fn create_series(
    key: &ValkeyString,
    options: TimeSeriesOptions,
    ctx: &Context,
) -> ValkeyResult<TimeSeries> {
    let mut ts = TimeSeries::with_options(options)?;
    ts._db = get_current_db(ctx);
    with_label_index(ctx, |index| {
        index.index_series(&ts, &key.to_string_lossy());
    });
    Ok(ts)
}

/// Creates a new series under `key`, indexes it, and stores it in the
/// keyspace. Fails if the key already holds a value.
pub fn create_and_store_series(
    ctx: &Context,
    key: &ValkeyString,
    options: TimeSeriesOptions,
    notify: bool,
) -> ValkeyResult<()> {
    let value_key = ValkeyKeyWritable::open(ctx.ctx, key);
    if !value_key.is_empty() {
        return Err(ValkeyError::Str(error_consts::DUPLICATE_KEY));
    }

    let ts = create_series(key, options, ctx)?;
    value_key.set_value(&VK_TIME_SERIES_TYPE, ts)?;

    if notify {
        ctx.replicate_verbatim();
        ctx.notify_keyspace_event(NotifyEvent::MODULE, "ts.create", key);
    }

    Ok(())
}
