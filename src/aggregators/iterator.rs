use crate::aggregators::{Aggregation, AggregationHandler, Aggregator};
use crate::common::{Sample, Timestamp};

/// Query-time aggregation options: one aggregator applied per fixed-width bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationOptions {
    pub aggregation: Aggregation,
    pub bucket_size: i64,
}

/// Folds an ordered sample stream into buckets keyed by
/// `t - t % bucket_size`, yielding one sample per bucket that received at
/// least one input sample. The aggregator starts fresh in every bucket;
/// this never touches a compaction rule's persisted context.
pub struct AggregateIterator<T: Iterator<Item = Sample>> {
    inner: T,
    aggregator: Aggregator,
    bucket_size: i64,
    bucket_start: Option<Timestamp>,
}

impl<T: Iterator<Item = Sample>> AggregateIterator<T> {
    pub fn new(inner: T, options: &AggregationOptions) -> Self {
        Self {
            inner,
            aggregator: options.aggregation.into(),
            bucket_size: options.bucket_size,
            bucket_start: None,
        }
    }

    fn bucket_key(&self, ts: Timestamp) -> Timestamp {
        ts - ts.rem_euclid(self.bucket_size)
    }
}

impl<T: Iterator<Item = Sample>> Iterator for AggregateIterator<T> {
    type Item = Sample;

    fn next(&mut self) -> Option<Self::Item> {
        for sample in self.inner.by_ref() {
            let key = self.bucket_key(sample.timestamp);
            match self.bucket_start {
                None => {
                    self.bucket_start = Some(key);
                    self.aggregator.update(sample.value);
                }
                Some(current) if key == current => {
                    self.aggregator.update(sample.value);
                }
                Some(current) => {
                    let finished = Sample::new(current, self.aggregator.finalize());
                    self.aggregator.reset();
                    self.aggregator.update(sample.value);
                    self.bucket_start = Some(key);
                    return Some(finished);
                }
            }
        }

        // flush the trailing bucket
        if let Some(current) = self.bucket_start.take() {
            return Some(Sample::new(current, self.aggregator.finalize()));
        }
        None
    }
}

pub fn aggregate(
    options: &AggregationOptions,
    iter: impl Iterator<Item = Sample>,
) -> Vec<Sample> {
    AggregateIterator::new(iter, options).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(aggregation: Aggregation, bucket_size: i64) -> AggregationOptions {
        AggregationOptions {
            aggregation,
            bucket_size,
        }
    }

    fn samples_every_second(start: Timestamp, count: usize, value: f64) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample::new(start + i as Timestamp, value))
            .collect()
    }

    #[test]
    fn count_over_unaligned_start_produces_partial_edge_buckets() {
        let samples = samples_every_second(1488823384, 1500, 5.0);
        let result = aggregate(&options(Aggregation::Count, 500), samples.into_iter());

        assert_eq!(
            result,
            vec![
                Sample::new(1488823000, 116.0),
                Sample::new(1488823500, 500.0),
                Sample::new(1488824000, 500.0),
                Sample::new(1488824500, 384.0),
            ]
        );
    }

    #[test]
    fn sum_groups_by_bucket() {
        let samples = vec![
            Sample::new(10, 1.0),
            Sample::new(15, 2.0),
            Sample::new(20, 3.0),
            Sample::new(30, 4.0),
        ];
        let result = aggregate(&options(Aggregation::Sum, 10), samples.into_iter());
        assert_eq!(
            result,
            vec![
                Sample::new(10, 3.0),
                Sample::new(20, 3.0),
                Sample::new(30, 4.0),
            ]
        );
    }

    #[test]
    fn buckets_without_samples_are_omitted() {
        let samples = vec![Sample::new(0, 1.0), Sample::new(95, 2.0)];
        let result = aggregate(&options(Aggregation::Max, 10), samples.into_iter());
        assert_eq!(result, vec![Sample::new(0, 1.0), Sample::new(90, 2.0)]);
    }

    #[test]
    fn last_takes_trailing_value_per_bucket() {
        let samples = samples_every_second(1000, 11, 7.0);
        let result = aggregate(&options(Aggregation::Last, 5), samples.into_iter());
        assert_eq!(
            result,
            vec![
                Sample::new(1000, 7.0),
                Sample::new(1005, 7.0),
                Sample::new(1010, 7.0),
            ]
        );
    }

    #[test]
    fn avg_per_bucket() {
        let samples = vec![
            Sample::new(0, 1.0),
            Sample::new(1, 2.0),
            Sample::new(3, 6.0),
            Sample::new(10, 10.0),
        ];
        let result = aggregate(&options(Aggregation::Avg, 10), samples.into_iter());
        assert_eq!(result, vec![Sample::new(0, 3.0), Sample::new(10, 10.0)]);
    }

    #[test]
    fn empty_input_yields_no_buckets() {
        let result = aggregate(&options(Aggregation::Sum, 10), std::iter::empty());
        assert!(result.is_empty());
    }
}
