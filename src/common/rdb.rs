use crate::common::Timestamp;
use valkey_module::{raw, RedisModuleIO, ValkeyError, ValkeyResult};

const OPTIONAL_MARKER_PRESENT: u64 = 0xfe;
const OPTIONAL_MARKER_ABSENT: u64 = 0xff;

pub(crate) fn load_optional_marker(rdb: *mut RedisModuleIO) -> ValkeyResult<bool> {
    let marker = raw::load_unsigned(rdb)?;
    match marker {
        OPTIONAL_MARKER_PRESENT => Ok(true),
        OPTIONAL_MARKER_ABSENT => Ok(false),
        _ => Err(ValkeyError::String(format!("Invalid marker: {marker}"))),
    }
}

pub(crate) fn rdb_save_optional_marker(rdb: *mut RedisModuleIO, is_some: bool) {
    if is_some {
        raw::save_unsigned(rdb, OPTIONAL_MARKER_PRESENT);
    } else {
        raw::save_unsigned(rdb, OPTIONAL_MARKER_ABSENT);
    }
}

pub(crate) fn rdb_save_optional_string(rdb: *mut RedisModuleIO, value: &Option<String>) {
    rdb_save_optional_marker(rdb, value.is_some());
    if let Some(value) = value {
        raw::save_string(rdb, value);
    }
}

pub(crate) fn rdb_load_optional_string(rdb: *mut RedisModuleIO) -> ValkeyResult<Option<String>> {
    if load_optional_marker(rdb)? {
        Ok(Some(rdb_load_string(rdb)?))
    } else {
        Ok(None)
    }
}

#[inline]
pub fn rdb_save_usize(rdb: *mut RedisModuleIO, value: usize) {
    raw::save_unsigned(rdb, value as u64)
}

pub fn rdb_load_usize(rdb: *mut RedisModuleIO) -> ValkeyResult<usize> {
    let value = raw::load_unsigned(rdb)?;
    Ok(value as usize)
}

#[inline]
pub(crate) fn rdb_save_timestamp(rdb: *mut RedisModuleIO, value: Timestamp) {
    raw::save_signed(rdb, value)
}

pub(crate) fn rdb_load_timestamp(rdb: *mut RedisModuleIO) -> ValkeyResult<Timestamp> {
    let value = raw::load_signed(rdb)?;
    Ok(value as Timestamp)
}

pub fn rdb_save_u8(rdb: *mut RedisModuleIO, value: u8) {
    raw::save_unsigned(rdb, value as u64)
}

pub fn rdb_load_u8(rdb: *mut RedisModuleIO) -> ValkeyResult<u8> {
    let value = raw::load_unsigned(rdb)?;
    Ok(value as u8)
}

pub fn rdb_load_string(rdb: *mut RedisModuleIO) -> ValkeyResult<String> {
    Ok(String::from(raw::load_string(rdb)?))
}
