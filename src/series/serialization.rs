use crate::common::rdb::{
    rdb_load_optional_string, rdb_load_string, rdb_load_usize, rdb_save_optional_string,
    rdb_save_usize,
};
use crate::common::Sample;
use crate::labels::Label;
use crate::series::chunk::Chunk;
use crate::series::compaction::CompactionRule;
use crate::series::{SeriesRef, TimeSeries};
use valkey_module::{raw, ValkeyResult};

pub fn rdb_save_series(series: &TimeSeries, rdb: *mut raw::RedisModuleIO) {
    raw::save_unsigned(rdb, series.id);

    rdb_save_usize(rdb, series.labels.len());
    for label in series.labels.iter() {
        raw::save_string(rdb, &label.name);
        raw::save_string(rdb, &label.value);
    }

    raw::save_unsigned(rdb, series.retention_secs);
    rdb_save_usize(rdb, series.max_samples_per_chunk);
    rdb_save_optional_string(rdb, &series.src_key);

    rdb_save_usize(rdb, series.rules.len());
    for rule in series.rules.iter() {
        rule.save_to_rdb(rdb);
    }

    rdb_save_usize(rdb, series.chunks.len());
    for chunk in series.chunks.iter() {
        chunk.save_rdb(rdb);
    }
}

pub fn rdb_load_series(rdb: *mut raw::RedisModuleIO, _enc_ver: i32) -> ValkeyResult<TimeSeries> {
    let id = raw::load_unsigned(rdb)? as SeriesRef;

    let labels_len = rdb_load_usize(rdb)?;
    let mut labels = Vec::with_capacity(labels_len);
    for _ in 0..labels_len {
        let name = rdb_load_string(rdb)?;
        let value = rdb_load_string(rdb)?;
        labels.push(Label::new(name, value));
    }

    let retention_secs = raw::load_unsigned(rdb)?;
    let max_samples_per_chunk = rdb_load_usize(rdb)?;
    let src_key = rdb_load_optional_string(rdb)?;

    let rules_len = rdb_load_usize(rdb)?;
    let mut rules = Vec::with_capacity(rules_len);
    for _ in 0..rules_len {
        rules.push(CompactionRule::load_from_rdb(rdb)?);
    }

    let chunks_len = rdb_load_usize(rdb)?;
    let mut chunks = Vec::with_capacity(chunks_len);
    let mut total_samples: usize = 0;
    let mut first_timestamp = 0;
    let mut last_sample: Option<Sample> = None;

    for _ in 0..chunks_len {
        let chunk = Chunk::load_rdb(rdb, max_samples_per_chunk)?;
        total_samples += chunk.len();
        if first_timestamp == 0 {
            first_timestamp = chunk.first_timestamp();
        }
        if let Some(sample) = chunk.last_sample() {
            last_sample = Some(sample);
        }
        chunks.push(chunk);
    }

    Ok(TimeSeries {
        id,
        labels,
        retention_secs,
        max_samples_per_chunk,
        chunks,
        rules,
        src_key,
        total_samples,
        first_timestamp,
        last_sample,
        _db: 0,
    })
}
