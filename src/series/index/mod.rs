use crate::common::db::get_current_db;
use papaya::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::LazyLock;
use valkey_module::Context;

mod label_index;

pub use label_index::*;

/// Map from db number to that database's label index.
pub type LabelIndexMap = HashMap<i32, LabelIndex>;

pub(crate) static LABEL_INDEX: LazyLock<LabelIndexMap> = LazyLock::new(LabelIndexMap::default);

pub(crate) static SERIES_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_series_id() -> u64 {
    SERIES_ID.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
}

pub fn reset_series_id(id: u64) {
    SERIES_ID.store(id, std::sync::atomic::Ordering::SeqCst);
}

/// Ensures the id counter stays above every id observed while loading.
pub fn observe_series_id(id: u64) {
    SERIES_ID.fetch_max(id + 1, std::sync::atomic::Ordering::Relaxed);
}

pub fn with_db_index<F, R>(db: i32, f: F) -> R
where
    F: FnOnce(&LabelIndex) -> R,
{
    let guard = LABEL_INDEX.guard();
    let index = LABEL_INDEX.get_or_insert_with(db, LabelIndex::new, &guard);
    f(index)
}

pub fn with_label_index<F, R>(ctx: &Context, f: F) -> R
where
    F: FnOnce(&LabelIndex) -> R,
{
    let db = get_current_db(ctx);
    with_db_index(db, f)
}

pub fn clear_label_index(ctx: &Context) {
    let db = get_current_db(ctx);
    let map = LABEL_INDEX.pin();
    if let Some(index) = map.get(&db) {
        index.clear();
    }
}

pub fn clear_all_label_indexes() {
    reset_series_id(1);
    LABEL_INDEX.pin().clear();
}

pub(crate) fn init_croaring_allocator() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| unsafe { croaring::configure_rust_alloc() });
}

pub fn swap_label_index_dbs(from_db: i32, to_db: i32) {
    if from_db == to_db {
        return;
    }
    let guard = LABEL_INDEX.guard();
    let first = LABEL_INDEX.get_or_insert_with(from_db, LabelIndex::new, &guard);
    let second = LABEL_INDEX.get_or_insert_with(to_db, LabelIndex::new, &guard);
    first.swap(second);
}
