use crate::common::{Sample, Timestamp};
use crate::config::{DEFAULT_CHUNK_SAMPLES, DEFAULT_RETENTION_SECS};
use crate::error::{TsdbError, TsdbResult};
use crate::labels::Label;
use crate::series::chunk::Chunk;
use crate::series::compaction::CompactionRule;
use crate::series::index::next_series_id;
use get_size::GetSize;
use std::mem::size_of;

pub type SeriesRef = u64;

#[derive(Debug, Clone, Default)]
pub struct TimeSeriesOptions {
    pub retention_secs: Option<u64>,
    pub chunk_size: Option<usize>,
    pub labels: Vec<Label>,
}

/// What a write actually did to the series. Compaction fan-out only runs for
/// appends; a same-timestamp overwrite leaves rule contexts untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppendOutcome {
    Appended(Sample),
    Updated(Sample),
}

impl AppendOutcome {
    pub fn sample(&self) -> Sample {
        match self {
            AppendOutcome::Appended(s) | AppendOutcome::Updated(s) => *s,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.sample().timestamp
    }
}

/// A single keyed series: chunked samples plus metadata, retention and the
/// outgoing compaction rules.
#[derive(Clone, Debug, PartialEq, GetSize)]
pub struct TimeSeries {
    /// fixed internal id used in indexing
    pub id: SeriesRef,
    /// label/value pairs in user-supplied order
    pub labels: Vec<Label>,
    /// how long samples are kept, 0 = forever
    pub retention_secs: u64,
    /// fixed per-chunk sample capacity
    pub max_samples_per_chunk: usize,
    /// ordered chunks, oldest first; only the last accepts appends
    pub chunks: Vec<Chunk>,
    /// outgoing compaction rules, each carrying its open-bucket context
    pub rules: Vec<CompactionRule>,
    /// set when this series is the destination of a rule
    pub src_key: Option<String>,
    pub total_samples: usize,
    pub first_timestamp: Timestamp,
    pub last_sample: Option<Sample>,
    /// Bookkeeping for the owning db. Simplifies event handling related to
    /// indexing. Not part of the series data and not stored to rdb.
    pub(crate) _db: i32,
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self {
            id: 0,
            labels: Vec::new(),
            retention_secs: DEFAULT_RETENTION_SECS,
            max_samples_per_chunk: DEFAULT_CHUNK_SAMPLES,
            chunks: vec![],
            rules: vec![],
            src_key: None,
            total_samples: 0,
            first_timestamp: 0,
            last_sample: None,
            _db: 0,
        }
    }
}

impl TimeSeries {
    pub fn new() -> Self {
        TimeSeries::default()
    }

    pub fn with_options(options: TimeSeriesOptions) -> TsdbResult<Self> {
        let mut res = Self::new();
        if let Some(chunk_size) = options.chunk_size {
            if chunk_size == 0 {
                return Err(TsdbError::General("chunk size must be positive".into()));
            }
            res.max_samples_per_chunk = chunk_size;
        }
        if let Some(retention) = options.retention_secs {
            res.retention_secs = retention;
        }
        res.labels = options.labels;
        res.id = next_series_id();
        Ok(res)
    }

    pub fn len(&self) -> usize {
        self.total_samples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn last_timestamp(&self) -> Timestamp {
        self.last_sample.map_or(0, |s| s.timestamp)
    }

    /// Appends a strictly newer sample. Violating monotonicity is an error;
    /// same-timestamp writes go through [`TimeSeries::upsert_last`].
    pub fn add(&mut self, ts: Timestamp, value: f64) -> TsdbResult<Sample> {
        if let Some(last) = self.last_sample {
            if ts <= last.timestamp {
                return Err(TsdbError::BadTimestamp);
            }
        }

        let sample = Sample::new(ts, value);
        self.append_to_tail(sample)?;
        self.trim();
        Ok(sample)
    }

    /// Append-or-overwrite: an equal timestamp replaces the last value, an
    /// older one is refused. Used by the automatic-timestamp path and by
    /// compaction writes refreshing a destination's open bucket.
    pub fn upsert_last(&mut self, ts: Timestamp, value: f64) -> TsdbResult<AppendOutcome> {
        match self.last_sample {
            Some(last) if ts == last.timestamp => {
                let sample = Sample::new(ts, value);
                self.set_last_value(value);
                Ok(AppendOutcome::Updated(sample))
            }
            Some(last) if ts < last.timestamp => Err(TsdbError::BadTimestamp),
            _ => self.add(ts, value).map(AppendOutcome::Appended),
        }
    }

    /// Counter update. With `reset_secs` the running value restarts at every
    /// bucket boundary `now - now % reset_secs`; without it the counter
    /// accumulates forever, overwriting in place while the clock stays on
    /// the same second.
    pub fn increment(
        &mut self,
        now: Timestamp,
        delta: f64,
        reset_secs: Option<i64>,
    ) -> TsdbResult<AppendOutcome> {
        match reset_secs {
            Some(bucket) => {
                let bucket_start = now - now.rem_euclid(bucket);
                match self.last_sample {
                    Some(last) if last.timestamp >= bucket_start => {
                        let value = last.value + delta;
                        self.set_last_value(value);
                        Ok(AppendOutcome::Updated(Sample::new(last.timestamp, value)))
                    }
                    _ => self
                        .add(bucket_start, delta)
                        .map(AppendOutcome::Appended),
                }
            }
            None => {
                let base = self.last_sample.map_or(0.0, |s| s.value);
                self.upsert_last(now, base + delta)
            }
        }
    }

    fn append_to_tail(&mut self, sample: Sample) -> TsdbResult<()> {
        let max_samples = self.max_samples_per_chunk;
        let chunk = match self.chunks.last_mut() {
            Some(chunk) if !chunk.is_full() => chunk,
            _ => {
                self.chunks.push(Chunk::new(max_samples));
                self.chunks.last_mut().expect("chunk was just pushed")
            }
        };
        chunk.append(sample)?;

        if self.is_empty() {
            self.first_timestamp = sample.timestamp;
        }
        self.last_sample = Some(sample);
        self.total_samples += 1;
        Ok(())
    }

    fn set_last_value(&mut self, value: f64) {
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.set_last_value(value);
        }
        if let Some(last) = self.last_sample.as_mut() {
            last.value = value;
        }
    }

    /// Drops leading chunks that fell wholly out of the retention window.
    /// Eviction is whole-chunk; a partially expired chunk stays.
    pub(crate) fn trim(&mut self) -> usize {
        if self.retention_secs == 0 || self.chunks.is_empty() {
            return 0;
        }

        let min_ts = self.last_timestamp() - self.retention_secs as i64;
        let mut dropped = 0usize;
        self.chunks.retain(|chunk| {
            if chunk.last_timestamp() < min_ts {
                dropped += chunk.len();
                false
            } else {
                true
            }
        });

        if dropped > 0 {
            self.total_samples -= dropped;
            self.first_timestamp = self
                .chunks
                .first()
                .map_or(self.last_timestamp(), |c| c.first_timestamp());
        }
        dropped
    }

    /// Ordered samples with `start_ts <= t <= end_ts`.
    pub fn get_range(&self, start_ts: Timestamp, end_ts: Timestamp) -> Vec<Sample> {
        self.range_iter(start_ts, end_ts).collect()
    }

    /// Walks chunks in order, skipping those wholly before the range and
    /// stopping past its end.
    pub fn range_iter(
        &self,
        start_ts: Timestamp,
        end_ts: Timestamp,
    ) -> impl Iterator<Item = Sample> + '_ {
        self.chunks
            .iter()
            .skip_while(move |chunk| chunk.last_timestamp() < start_ts)
            .take_while(move |chunk| !chunk.is_empty() && chunk.first_timestamp() <= end_ts)
            .flat_map(move |chunk| chunk.range(start_ts, end_ts).iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }

    /// True if this series is the destination of a compaction rule.
    pub fn is_compaction_dest(&self) -> bool {
        self.src_key.is_some()
    }

    pub fn has_rule_to(&self, dest_key: &str) -> bool {
        self.rules.iter().any(|rule| rule.dest_key == dest_key)
    }

    pub fn remove_rule(&mut self, dest_key: &str) -> Option<CompactionRule> {
        let index = self.rules.iter().position(|r| r.dest_key == dest_key)?;
        Some(self.rules.remove(index))
    }

    pub fn memory_usage(&self) -> usize {
        size_of::<Self>() + self.get_heap_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_with(retention: u64, chunk_size: usize) -> TimeSeries {
        TimeSeries::with_options(TimeSeriesOptions {
            retention_secs: Some(retention),
            chunk_size: Some(chunk_size),
            labels: vec![],
        })
        .unwrap()
    }

    #[test]
    fn add_single_sample_updates_metadata() {
        let mut ts = TimeSeries::new();
        ts.add(100, 200.0).unwrap();

        assert_eq!(ts.total_samples, 1);
        assert_eq!(ts.first_timestamp, 100);
        assert_eq!(ts.last_timestamp(), 100);
        assert_eq!(ts.chunk_count(), 1);
    }

    #[test]
    fn add_rejects_non_monotonic_timestamps() {
        let mut ts = TimeSeries::new();
        ts.add(100, 1.0).unwrap();
        assert_eq!(ts.add(100, 2.0), Err(TsdbError::BadTimestamp));
        assert_eq!(ts.add(99, 2.0), Err(TsdbError::BadTimestamp));
        assert_eq!(ts.total_samples, 1);
    }

    #[test]
    fn chunks_roll_over_at_capacity() {
        let mut ts = series_with(0, 360);
        let start: Timestamp = 1511885909;
        for i in 0..1500 {
            ts.add(start + i, 5.0).unwrap();
        }

        assert_eq!(ts.total_samples, 1500);
        assert_eq!(ts.chunk_count(), 1500usize.div_ceil(360));

        let range = ts.get_range(start, start + 1500);
        assert_eq!(range.len(), 1500);
        for (i, sample) in range.iter().enumerate() {
            assert_eq!(sample.timestamp, start + i as Timestamp);
            assert_eq!(sample.value, 5.0);
        }
    }

    #[test]
    fn samples_stay_globally_ordered_across_chunks() {
        let mut ts = series_with(0, 4);
        for i in 0..1024 {
            ts.add(i, i as f64).unwrap();
        }
        let samples = ts.get_range(0, 1024);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.timestamp, i as Timestamp);
            assert_eq!(sample.value, i as f64);
        }
    }

    #[test]
    fn retention_drops_whole_leading_chunks() {
        let mut ts = series_with(100, 10);
        for i in 0..1000 {
            ts.add(i, 1.0).unwrap();

            // chunk-granular eviction leaves up to one chunk of slack
            let span = ts.last_timestamp() - ts.first_timestamp;
            assert!(span <= 100 + 10 - 1, "span {span} exceeds retention slack");
        }
        assert!(ts.first_timestamp >= ts.last_timestamp() - 100 - 9);
        assert_eq!(
            ts.total_samples,
            ts.chunks.iter().map(|c| c.len()).sum::<usize>()
        );
    }

    #[test]
    fn zero_retention_keeps_everything() {
        let mut ts = series_with(0, 10);
        for i in 0..500 {
            ts.add(i, 1.0).unwrap();
        }
        assert_eq!(ts.total_samples, 500);
        assert_eq!(ts.first_timestamp, 0);
    }

    #[test]
    fn get_range_is_inclusive_and_bounded() {
        let mut ts = series_with(0, 100);
        for i in 0..1500 {
            ts.add(1488823384 + i, 5.0).unwrap();
        }
        let range = ts.get_range(1488823384 + 100, 1488823384 + 150);
        assert_eq!(range.len(), 51);
        assert_eq!(range[0].timestamp, 1488823484);
        assert_eq!(range.last().unwrap().timestamp, 1488823534);
    }

    #[test]
    fn get_range_outside_series_is_empty() {
        let mut ts = TimeSeries::new();
        ts.add(100, 1.0).unwrap();
        assert!(ts.get_range(200, 300).is_empty());
        assert!(ts.get_range(0, 50).is_empty());
    }

    #[test]
    fn upsert_last_overwrites_on_equal_timestamp() {
        let mut ts = TimeSeries::new();
        ts.add(10, 1.0).unwrap();

        let outcome = ts.upsert_last(10, 7.0).unwrap();
        assert_eq!(outcome, AppendOutcome::Updated(Sample::new(10, 7.0)));
        assert_eq!(ts.total_samples, 1);
        assert_eq!(ts.get_range(0, 100), vec![Sample::new(10, 7.0)]);

        assert_eq!(ts.upsert_last(9, 1.0), Err(TsdbError::BadTimestamp));

        let outcome = ts.upsert_last(11, 2.0).unwrap();
        assert_eq!(outcome, AppendOutcome::Appended(Sample::new(11, 2.0)));
    }

    #[test]
    fn increment_accumulates_within_one_second() {
        let mut ts = TimeSeries::new();
        let now = 1_000_000;
        for _ in 0..20 {
            ts.increment(now, 5.0, None).unwrap();
        }
        assert_eq!(ts.get_range(0, now), vec![Sample::new(now, 100.0)]);

        for _ in 0..20 {
            ts.increment(now + 1, -1.5, None).unwrap();
        }
        assert_eq!(
            ts.get_range(0, now + 1),
            vec![Sample::new(now, 100.0), Sample::new(now + 1, 70.0)]
        );
    }

    #[test]
    fn increment_with_reset_collapses_to_bucket_start() {
        let mut ts = TimeSeries::new();
        let bucket = 10;
        let now = 1_000_007;
        let aligned = now - now % bucket;

        for _ in 0..1000 {
            ts.increment(now, 1.0, Some(bucket)).unwrap();
        }

        assert_eq!(ts.get_range(0, now), vec![Sample::new(aligned, 1000.0)]);
    }

    #[test]
    fn increment_with_reset_restarts_in_new_bucket() {
        let mut ts = TimeSeries::new();
        ts.increment(17, 4.0, Some(10)).unwrap();
        assert_eq!(ts.get_range(0, 100), vec![Sample::new(10, 4.0)]);

        // next bucket starts over instead of accumulating
        ts.increment(25, 4.0, Some(10)).unwrap();
        assert_eq!(
            ts.get_range(0, 100),
            vec![Sample::new(10, 4.0), Sample::new(20, 4.0)]
        );
    }

    #[test]
    fn increment_rejects_clock_behind_series() {
        let mut ts = TimeSeries::new();
        ts.add(100, 1.0).unwrap();
        assert_eq!(
            ts.increment(99, 1.0, None),
            Err(TsdbError::BadTimestamp)
        );
    }

    #[test]
    fn rules_can_be_removed_by_destination() {
        use crate::aggregators::Aggregation;
        let mut ts = TimeSeries::new();
        ts.rules
            .push(CompactionRule::new("dest".into(), Aggregation::Avg, 10));
        assert!(ts.has_rule_to("dest"));
        assert!(ts.remove_rule("other").is_none());
        assert!(ts.remove_rule("dest").is_some());
        assert!(!ts.has_rule_to("dest"));
    }
}
