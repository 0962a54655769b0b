use crate::common::rdb::{rdb_load_timestamp, rdb_load_usize, rdb_save_timestamp, rdb_save_usize};
use crate::common::{Sample, Timestamp};
use crate::error::{TsdbError, TsdbResult};
use get_size::GetSize;
use valkey_module::{raw, RedisModuleIO, ValkeyResult};

/// A fixed-capacity append buffer of samples, the unit of allocation and of
/// retention eviction. Samples are stored contiguously in strictly
/// increasing timestamp order.
#[derive(Clone, Debug, PartialEq, GetSize)]
pub struct Chunk {
    max_samples: usize,
    samples: Vec<Sample>,
}

impl Chunk {
    pub fn new(max_samples: usize) -> Self {
        Self {
            max_samples,
            samples: Vec::with_capacity(max_samples),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.max_samples
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn first_timestamp(&self) -> Timestamp {
        self.samples.first().map_or(0, |s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Timestamp {
        self.samples.last().map_or(0, |s| s.timestamp)
    }

    pub fn last_sample(&self) -> Option<Sample> {
        self.samples.last().copied()
    }

    /// Appends a sample. The caller guarantees monotonicity at series level;
    /// the chunk still refuses out-of-order writes to protect its invariant.
    pub fn append(&mut self, sample: Sample) -> TsdbResult<()> {
        if self.is_full() {
            return Err(TsdbError::CapacityFull(self.max_samples));
        }
        if let Some(last) = self.samples.last() {
            if sample.timestamp <= last.timestamp {
                return Err(TsdbError::BadTimestamp);
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    /// Replaces the value of the final sample in place. Used by the
    /// same-second update path of automatic timestamps and counters.
    pub fn set_last_value(&mut self, value: f64) {
        if let Some(last) = self.samples.last_mut() {
            last.value = value;
        }
    }

    /// All samples with `start_ts <= t <= end_ts`, in order.
    pub fn range(&self, start_ts: Timestamp, end_ts: Timestamp) -> &[Sample] {
        let start = self.samples.partition_point(|s| s.timestamp < start_ts);
        let end = self.samples.partition_point(|s| s.timestamp <= end_ts);
        &self.samples[start..end]
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.samples.iter().copied()
    }

    pub fn save_rdb(&self, rdb: *mut RedisModuleIO) {
        rdb_save_usize(rdb, self.samples.len());
        for sample in &self.samples {
            rdb_save_timestamp(rdb, sample.timestamp);
            raw::save_double(rdb, sample.value);
        }
    }

    pub fn load_rdb(rdb: *mut RedisModuleIO, max_samples: usize) -> ValkeyResult<Self> {
        let len = rdb_load_usize(rdb)?;
        let mut samples = Vec::with_capacity(len);
        for _ in 0..len {
            let timestamp = rdb_load_timestamp(rdb)?;
            let value = raw::load_double(rdb)?;
            samples.push(Sample::new(timestamp, value));
        }
        Ok(Self {
            max_samples,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_chunk(count: usize) -> Chunk {
        let mut chunk = Chunk::new(360);
        for i in 0..count {
            chunk
                .append(Sample::new(i as Timestamp, i as f64))
                .unwrap();
        }
        chunk
    }

    #[test]
    fn append_keeps_order_and_counts() {
        let chunk = filled_chunk(10);
        assert_eq!(chunk.len(), 10);
        assert_eq!(chunk.first_timestamp(), 0);
        assert_eq!(chunk.last_timestamp(), 9);
        assert!(!chunk.is_full());
    }

    #[test]
    fn append_rejects_out_of_order_samples() {
        let mut chunk = filled_chunk(5);
        assert_eq!(
            chunk.append(Sample::new(4, 1.0)),
            Err(TsdbError::BadTimestamp)
        );
        assert_eq!(
            chunk.append(Sample::new(2, 1.0)),
            Err(TsdbError::BadTimestamp)
        );
        assert_eq!(chunk.len(), 5);
    }

    #[test]
    fn append_reports_capacity_exhaustion() {
        let mut chunk = Chunk::new(3);
        for i in 0..3 {
            chunk.append(Sample::new(i, 0.0)).unwrap();
        }
        assert!(chunk.is_full());
        assert_eq!(
            chunk.append(Sample::new(10, 0.0)),
            Err(TsdbError::CapacityFull(3))
        );
    }

    #[test]
    fn range_returns_inclusive_bounds() {
        let chunk = filled_chunk(100);
        let samples = chunk.range(10, 20);
        assert_eq!(samples.len(), 11);
        assert_eq!(samples.first().unwrap().timestamp, 10);
        assert_eq!(samples.last().unwrap().timestamp, 20);

        assert!(chunk.range(200, 300).is_empty());
        assert_eq!(chunk.range(-10, 0).len(), 1);
    }

    #[test]
    fn set_last_value_overwrites_in_place() {
        let mut chunk = filled_chunk(3);
        chunk.set_last_value(42.0);
        assert_eq!(chunk.last_sample().unwrap().value, 42.0);
        assert_eq!(chunk.len(), 3);
    }
}
