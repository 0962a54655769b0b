extern crate enum_dispatch;
extern crate get_size;
extern crate strum;
extern crate strum_macros;
extern crate valkey_module_macros;

use valkey_module::{valkey_module, Context, Status, ValkeyString, Version};

pub mod aggregators;
pub(crate) mod commands;
pub mod common;
pub mod config;
mod error;
pub mod error_consts;
mod labels;
mod series;
mod server_events;

use crate::series::series_data_type::VK_TIME_SERIES_TYPE;
use crate::server_events::{generic_key_events_handler, register_server_events};

pub const VK_TSDB_VERSION: i32 = 1;
pub const MODULE_NAME: &str = "tsdb";

pub fn valid_server_version(version: Version) -> bool {
    let server_version = &[
        version.major.into(),
        version.minor.into(),
        version.patch.into(),
    ];
    server_version >= config::TIMESERIES_MIN_SUPPORTED_VERSION
}

fn preload(ctx: &Context, _args: &[ValkeyString]) -> Status {
    let Ok(version) = ctx.get_server_version() else {
        ctx.log_warning("Unable to get server version!");
        return Status::Err;
    };

    if !valid_server_version(version) {
        ctx.log_warning(
            format!(
                "The minimum supported server version for the valkey-tsdb module is {:?}",
                config::TIMESERIES_MIN_SUPPORTED_VERSION
            )
            .as_str(),
        );
        return Status::Err;
    }

    Status::Ok
}

fn initialize(ctx: &Context, _args: &[ValkeyString]) -> Status {
    series::index::init_croaring_allocator();

    if let Err(e) = register_server_events(ctx) {
        let msg = format!("Failed to register server events: {e}");
        ctx.log_warning(&msg);
        return Status::Err;
    }

    ctx.log_notice("valkey-tsdb module initialized");
    Status::Ok
}

fn deinitialize(ctx: &Context) -> Status {
    ctx.log_notice("deinitialize");
    Status::Ok
}

#[cfg(not(test))]
macro_rules! get_allocator {
    () => {
        valkey_module::alloc::ValkeyAlloc
    };
}

#[cfg(test)]
macro_rules! get_allocator {
    () => {
        std::alloc::System
    };
}

valkey_module! {
    name: MODULE_NAME,
    version: VK_TSDB_VERSION,
    allocator: (get_allocator!(), get_allocator!()),
    data_types: [VK_TIME_SERIES_TYPE],
    preload: preload,
    init: initialize,
    deinit: deinitialize,
    commands: [
        ["TS.CREATE", commands::create, "write deny-oom", 1, 1, 1, "write"],
        ["TS.ADD", commands::add, "write fast deny-oom", 1, 1, 1, "fast write"],
        ["TS.INCRBY", commands::incrby, "write deny-oom", 1, 1, 1, "fast write"],
        ["TS.DECRBY", commands::decrby, "write deny-oom", 1, 1, 1, "fast write"],
        ["TS.CREATERULE", commands::create_rule, "write deny-oom", 1, 2, 1, "write"],
        ["TS.DELETERULE", commands::delete_rule, "write", 1, 2, 1, "write"],
        ["TS.RANGE", commands::range, "readonly", 1, 1, 1, "fast read"],
        ["TS.MRANGE", commands::mrange, "readonly", 0, 0, -1, "read"],
        ["TS.QUERYINDEX", commands::query_index, "readonly", 0, 0, 0, "fast read"],
        ["TS.INFO", commands::info, "readonly fast", 1, 1, 1, "fast read"],
    ]
    event_handlers: [
        [@GENERIC @LOADED @TRIMMED: generic_key_events_handler]
    ]
}
