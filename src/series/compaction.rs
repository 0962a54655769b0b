use crate::aggregators::{Aggregation, AggregationHandler, Aggregator};
use crate::common::rdb::{
    rdb_load_string, rdb_load_timestamp, rdb_load_u8, rdb_save_timestamp, rdb_save_u8,
};
use crate::common::{Sample, Timestamp};
use crate::series::{get_timeseries_mut, TimeSeries};
use get_size::GetSize;
use smallvec::SmallVec;
use valkey_module::{raw, Context, RedisModuleIO, ValkeyError, ValkeyResult, ValkeyString};

/// Binds a source series to a destination series through an aggregator and a
/// fixed bucket width. The rule owns the context of the open bucket: the
/// accumulator plus `bucket_start`. The destination is referenced by key, so
/// a missing destination merely disables the rule instead of dangling a
/// pointer, and restore order is irrelevant.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionRule {
    pub dest_key: String,
    pub aggregator: Aggregator,
    pub bucket_secs: i64,
    pub bucket_start: Option<Timestamp>,
}

impl GetSize for CompactionRule {
    fn get_heap_size(&self) -> usize {
        self.dest_key.get_heap_size() + self.aggregator.get_heap_size()
    }
}

impl CompactionRule {
    pub fn new(dest_key: String, aggregation: Aggregation, bucket_secs: i64) -> Self {
        Self {
            dest_key,
            aggregator: aggregation.into(),
            bucket_secs,
            bucket_start: None,
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregator.aggregation()
    }

    fn bucket_key(&self, ts: Timestamp) -> Timestamp {
        ts - ts.rem_euclid(self.bucket_secs)
    }

    /// Folds one source sample into the open bucket and returns the bucket's
    /// running aggregate for the caller to upsert into the destination: a new
    /// bucket appends, a still-growing one overwrites its last sample. The
    /// destination therefore always reflects the open bucket's value so far.
    pub fn apply(&mut self, sample: Sample) -> Option<Sample> {
        let new_bucket = self.bucket_key(sample.timestamp);
        match self.bucket_start {
            Some(current) if new_bucket == current => {
                self.aggregator.update(sample.value);
            }
            // source appends are monotonic, an older bucket cannot occur
            Some(current) if new_bucket < current => return None,
            _ => {
                self.aggregator.reset();
                self.aggregator.update(sample.value);
                self.bucket_start = Some(new_bucket);
            }
        }
        Some(Sample::new(new_bucket, self.aggregator.finalize()))
    }

    pub fn save_to_rdb(&self, rdb: *mut RedisModuleIO) {
        raw::save_string(rdb, &self.dest_key);
        rdb_save_u8(rdb, self.aggregation().id());
        raw::save_unsigned(rdb, self.bucket_secs as u64);
        rdb_save_timestamp(rdb, self.bucket_start.unwrap_or(-1));
        raw::save_string(rdb, &self.aggregator.save_state());
    }

    pub fn load_from_rdb(rdb: *mut RedisModuleIO) -> ValkeyResult<Self> {
        let dest_key = rdb_load_string(rdb)?;
        let aggregation = Aggregation::try_from(rdb_load_u8(rdb)?)
            .map_err(|e| ValkeyError::String(e.to_string()))?;
        let bucket_secs = raw::load_unsigned(rdb)? as i64;
        let start_ts = rdb_load_timestamp(rdb)?;
        let bucket_start = if start_ts == -1 { None } else { Some(start_ts) };

        let mut aggregator: Aggregator = aggregation.into();
        let state = rdb_load_string(rdb)?;
        aggregator
            .load_state(&state)
            .map_err(|e| ValkeyError::String(e.to_string()))?;

        Ok(CompactionRule {
            dest_key,
            aggregator,
            bucket_secs,
            bucket_start,
        })
    }
}

/// Fans one appended source sample out to every outgoing rule, upserting the
/// open bucket's running aggregate into each destination series. Rules whose
/// destination key no longer holds a series are dropped with a warning; a
/// source append never fails because of a missing destination.
pub fn apply_compaction_rules(
    ctx: &Context,
    series: &mut TimeSeries,
    source_key: &ValkeyString,
    sample: Sample,
) {
    if series.rules.is_empty() {
        return;
    }

    let mut stale: SmallVec<usize, 4> = SmallVec::new();
    for (index, rule) in series.rules.iter_mut().enumerate() {
        // a rename can leave a rule pointing at the source itself; opening
        // the source key again here would alias the series we hold
        if rule.dest_key.as_bytes() == source_key.as_slice() {
            continue;
        }

        let Some(update) = rule.apply(sample) else {
            continue;
        };

        let dest_key = ctx.create_string(rule.dest_key.as_str());
        match get_timeseries_mut(ctx, &dest_key, false) {
            Ok(Some(mut dest)) => {
                if let Err(e) = dest.upsert_last(update.timestamp, update.value) {
                    let msg = format!(
                        "TSDB: compaction write to '{}' failed: {e}",
                        rule.dest_key
                    );
                    ctx.log_warning(&msg);
                }
            }
            _ => {
                let msg = format!(
                    "TSDB: dropping compaction rule with missing destination '{}'",
                    rule.dest_key
                );
                ctx.log_warning(&msg);
                stale.push(index);
            }
        }
    }

    for index in stale.into_iter().rev() {
        series.rules.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeries;

    /// Drives samples through a rule into a plain destination series, the
    /// way the command layer does against the keyspace.
    fn compact(
        rule: &mut CompactionRule,
        dest: &mut TimeSeries,
        samples: impl IntoIterator<Item = Sample>,
    ) {
        for sample in samples {
            if let Some(update) = rule.apply(sample) {
                dest.upsert_last(update.timestamp, update.value).unwrap();
            }
        }
    }

    fn second_ticks(range: std::ops::Range<i64>) -> impl Iterator<Item = Sample> {
        range.map(|i| Sample::new(i, i as f64 - 3.0))
    }

    #[test]
    fn avg_rule_keeps_open_bucket_current_in_destination() {
        let mut rule = CompactionRule::new("ta".into(), Aggregation::Avg, 3);
        let mut dest = TimeSeries::new();

        // samples (3,0) (4,1) (5,2) (6,3): bucket [3..6) settles at avg 1,
        // the open bucket [6..9) already shows its running value
        compact(&mut rule, &mut dest, second_ticks(3..7));

        assert_eq!(
            dest.get_range(0, 100),
            vec![Sample::new(3, 1.0), Sample::new(6, 3.0)]
        );
        assert_eq!(rule.bucket_start, Some(6));
    }

    #[test]
    fn open_bucket_survives_context_round_trip() {
        let mut rule = CompactionRule::new("ta".into(), Aggregation::Avg, 3);
        let mut dest = TimeSeries::new();
        compact(&mut rule, &mut dest, second_ticks(3..7));

        // snapshot the context the way the rdb path does
        let state = rule.aggregator.save_state();
        let bucket_start = rule.bucket_start;

        let mut restored = CompactionRule::new("ta".into(), Aggregation::Avg, 3);
        restored.aggregator.load_state(&state).unwrap();
        restored.bucket_start = bucket_start;

        // (7,4) folds into the open bucket: avg(3,4) = 3.5
        compact(&mut restored, &mut dest, [Sample::new(7, 4.0)]);
        assert_eq!(
            dest.get_range(0, 100),
            vec![Sample::new(3, 1.0), Sample::new(6, 3.5)]
        );
    }

    #[test]
    fn min_rule_open_bucket_round_trip() {
        let mut rule = CompactionRule::new("tm".into(), Aggregation::Min, 3);
        let mut dest = TimeSeries::new();
        compact(&mut rule, &mut dest, second_ticks(3..7));
        assert_eq!(
            dest.get_range(0, 100),
            vec![Sample::new(3, 0.0), Sample::new(6, 3.0)]
        );

        let state = rule.aggregator.save_state();
        let mut restored = CompactionRule::new("tm".into(), Aggregation::Min, 3);
        restored.aggregator.load_state(&state).unwrap();
        restored.bucket_start = rule.bucket_start;

        compact(&mut restored, &mut dest, [Sample::new(7, 4.0)]);
        assert_eq!(
            dest.get_range(0, 100),
            vec![Sample::new(3, 0.0), Sample::new(6, 3.0)]
        );
    }

    #[test]
    fn destination_samples_align_to_bucket_boundaries() {
        let mut rule = CompactionRule::new("d".into(), Aggregation::Sum, 10);
        let mut dest = TimeSeries::new();
        compact(
            &mut rule,
            &mut dest,
            (0..501).map(|i| Sample::new(i * 7, 1.0)),
        );
        for sample in dest.iter() {
            assert_eq!(sample.timestamp % 10, 0);
        }
    }

    #[test]
    fn downsampling_matches_direct_computation() {
        let values: Vec<f64> = (0..501).map(|i| i as f64).collect();

        for (aggregation, calc) in [
            (
                Aggregation::Avg,
                (|bucket: &[f64]| bucket.iter().sum::<f64>() / bucket.len() as f64)
                    as fn(&[f64]) -> f64,
            ),
            (Aggregation::Sum, |bucket| bucket.iter().sum::<f64>()),
            (Aggregation::Count, |bucket| bucket.len() as f64),
            (Aggregation::Max, |bucket| {
                bucket.iter().cloned().fold(f64::MIN, f64::max)
            }),
            (Aggregation::Min, |bucket| {
                bucket.iter().cloned().fold(f64::MAX, f64::min)
            }),
        ] {
            for resolution in [1i64, 3, 10] {
                let mut rule = CompactionRule::new("d".into(), aggregation, resolution);
                let mut dest = TimeSeries::new();
                compact(
                    &mut rule,
                    &mut dest,
                    values
                        .iter()
                        .enumerate()
                        .map(|(i, v)| Sample::new(i as Timestamp, *v)),
                );

                let expected: Vec<Sample> = values
                    .chunks(resolution as usize)
                    .enumerate()
                    .map(|(i, bucket)| {
                        Sample::new(i as Timestamp * resolution, calc(bucket))
                    })
                    .collect();

                assert_eq!(
                    dest.get_range(0, 1000),
                    expected,
                    "{aggregation} at resolution {resolution}"
                );
            }
        }
    }

    #[test]
    fn open_bucket_updates_in_place() {
        let mut rule = CompactionRule::new("d".into(), Aggregation::Count, 10);
        let mut dest = TimeSeries::new();

        // every source sample refreshes the open bucket's running count
        for (i, ts) in (10..20).enumerate() {
            compact(&mut rule, &mut dest, [Sample::new(ts, 1.0)]);
            assert_eq!(
                dest.get_range(0, 100),
                vec![Sample::new(10, (i + 1) as f64)]
            );
        }

        compact(&mut rule, &mut dest, [Sample::new(20, 1.0)]);
        assert_eq!(
            dest.get_range(0, 100),
            vec![Sample::new(10, 10.0), Sample::new(20, 1.0)]
        );
    }

    #[test]
    fn unaligned_start_fills_every_touched_bucket() {
        let start: Timestamp = 1488823384;
        let mut rule = CompactionRule::new("d".into(), Aggregation::Avg, 10);
        let mut dest = TimeSeries::new();

        compact(
            &mut rule,
            &mut dest,
            (0..1500).map(|i| Sample::new(start + i, 5.0)),
        );

        // 1500 one-second samples from an unaligned start touch 151 buckets,
        // partial edge buckets included
        assert_eq!(dest.len(), 151);
        assert!(dest.iter().all(|s| s.value == 5.0));

        // querying from the raw start timestamp drops the leading partial
        // bucket, whose start lies before the window
        let visible = dest.get_range(start, start + 1500);
        assert_eq!(visible.len(), 150);
        assert_eq!(visible[0].timestamp, 1488823390);
    }
}
