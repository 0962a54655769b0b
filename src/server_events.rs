use crate::common::db::{get_current_db, set_current_db};
use crate::series::index::*;
use crate::series::{get_timeseries, get_timeseries_mut};
use std::os::raw::c_void;
use std::sync::Mutex;
use valkey_module::{logging, raw, Context, NotifyEvent, ValkeyError, ValkeyResult};

static RENAME_FROM_KEY: Mutex<Vec<u8>> = Mutex::new(vec![]);
static MOVE_FROM_DB: Mutex<i32> = Mutex::new(-1);

fn handle_key_restore(ctx: &Context, key: &[u8]) {
    let _key = ctx.create_string(key);
    let Ok(Some(mut series)) = get_timeseries_mut(ctx, &_key, false) else {
        logging::log_warning("Failed to load series for key restore");
        return;
    };
    series._db = get_current_db(ctx);
    observe_series_id(series.id);
    with_label_index(ctx, |index| {
        index.reindex_series(&series, &String::from_utf8_lossy(key));
    });
}

fn handle_key_rename(ctx: &Context, _old_key: &[u8], new_key: &[u8]) {
    let key = ctx.create_string(new_key);
    let Ok(Some(series)) = get_timeseries(ctx, &key, false) else {
        logging::log_warning("Failed to load series for key rename");
        return;
    };
    with_label_index(ctx, |index| {
        index.reindex_series(&series, &String::from_utf8_lossy(new_key));
    });
}

fn handle_loaded(ctx: &Context, key: &[u8]) {
    let _key = ctx.create_string(key);
    let Ok(Some(mut series)) = get_timeseries_mut(ctx, &_key, false) else {
        logging::log_warning("Failed to load series");
        return;
    };
    let db = get_current_db(ctx);
    series._db = db;

    // After a module load the id generator starts over; keep it above every
    // id observed in the rdb stream.
    observe_series_id(series.id);

    with_db_index(db, |index| {
        if !index.has_id(series.id) {
            index.index_series(&series, &String::from_utf8_lossy(key));
        } else {
            logging::log_warning("Trying to load a series that is already in the index");
        }
    });
}

fn handle_key_move(ctx: &Context, key: &[u8], old_db: i32) {
    let new_db = get_current_db(ctx);
    let valkey_key = ctx.create_string(key);
    let Ok(Some(mut series)) = get_timeseries_mut(ctx, &valkey_key, false) else {
        logging::log_warning("Failed to load series for key move");
        return;
    };

    with_db_index(old_db, |index| index.remove_series(&series));
    series._db = new_db;
    with_db_index(new_db, |index| {
        index.index_series(&series, &String::from_utf8_lossy(key))
    });
}

pub(super) fn generic_key_events_handler(
    ctx: &Context,
    _event_type: NotifyEvent,
    event: &str,
    key: &[u8],
) {
    hashify::fnc_map!(event.as_bytes(),
        "loaded" => {
            handle_loaded(ctx, key);
        },
        "move_from" => {
            *MOVE_FROM_DB.lock().unwrap() = get_current_db(ctx);
        },
        "move_to" => {
            let mut lock = MOVE_FROM_DB.lock().unwrap();
            let old_db = *lock;
            *lock = -1;
            if old_db != -1 {
                handle_key_move(ctx, key, old_db);
            }
        },
        "rename_from" => {
            *RENAME_FROM_KEY.lock().unwrap() = key.to_vec();
        },
        "rename_to" => {
            let mut old_key = RENAME_FROM_KEY.lock().unwrap();
            if !old_key.is_empty() {
                handle_key_rename(ctx, &old_key, key);
                old_key.clear();
            }
        },
        "restore" => {
            handle_key_restore(ctx, key);
        },
        _ => {}
    );
}

unsafe extern "C" fn on_flush_event(
    ctx: *mut raw::RedisModuleCtx,
    _eid: raw::RedisModuleEvent,
    sub_event: u64,
    data: *mut c_void,
) {
    if sub_event == raw::REDISMODULE_SUBEVENT_FLUSHDB_END {
        let fi: &raw::RedisModuleFlushInfo = unsafe { &*(data as *mut raw::RedisModuleFlushInfo) };

        if fi.dbnum == -1 {
            clear_all_label_indexes();
        } else {
            let ctx = Context::new(ctx);
            set_current_db(&ctx, fi.dbnum);
            clear_label_index(&ctx);
        }
    };
}

unsafe extern "C" fn on_swap_db_event(
    _ctx: *mut raw::RedisModuleCtx,
    eid: raw::RedisModuleEvent,
    _sub_event: u64,
    data: *mut c_void,
) {
    if eid.id == raw::REDISMODULE_EVENT_SWAPDB {
        let ei: &raw::RedisModuleSwapDbInfo =
            unsafe { &*(data as *mut raw::RedisModuleSwapDbInfo) };

        swap_label_index_dbs(ei.dbnum_first, ei.dbnum_second);
    }
}

pub fn register_server_event_handler(
    ctx: &Context,
    server_event: u64,
    inner_callback: raw::RedisModuleEventCallback,
) -> Result<(), ValkeyError> {
    let res = unsafe {
        raw::RedisModule_SubscribeToServerEvent.unwrap()(
            ctx.ctx,
            raw::RedisModuleEvent {
                id: server_event,
                dataver: 1,
            },
            inner_callback,
        )
    };
    if res != raw::REDISMODULE_OK as i32 {
        return Err(ValkeyError::Str("TSDB: failed subscribing to server event"));
    }

    Ok(())
}

pub fn register_server_events(ctx: &Context) -> ValkeyResult<()> {
    register_server_event_handler(ctx, raw::REDISMODULE_EVENT_FLUSHDB, Some(on_flush_event))?;
    register_server_event_handler(ctx, raw::REDISMODULE_EVENT_SWAPDB, Some(on_swap_db_event))?;
    Ok(())
}
