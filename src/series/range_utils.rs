use crate::aggregators::{aggregate, AggregationOptions};
use crate::common::{Sample, Timestamp};
use crate::series::TimeSeries;

/// Options for TS.RANGE and for the per-series leg of TS.MRANGE.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeOptions {
    pub start_ts: Timestamp,
    pub end_ts: Timestamp,
    pub aggregation: Option<AggregationOptions>,
}

/// Raw or bucket-aggregated samples of one series, in timestamp order.
pub(crate) fn get_range(series: &TimeSeries, options: &RangeOptions) -> Vec<Sample> {
    let iter = series.range_iter(options.start_ts, options.end_ts);
    match &options.aggregation {
        Some(aggregation) => aggregate(aggregation, iter),
        None => iter.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::Aggregation;

    fn sample_series() -> TimeSeries {
        let mut series = TimeSeries::new();
        for i in 0..1500 {
            series.add(1488823384 + i, 5.0).unwrap();
        }
        series
    }

    #[test]
    fn raw_range_returns_window() {
        let series = sample_series();
        let options = RangeOptions {
            start_ts: 1488823384 + 100,
            end_ts: 1488823384 + 150,
            aggregation: None,
        };
        let samples = get_range(&series, &options);
        assert_eq!(samples.len(), 51);
        assert!(samples.iter().all(|s| s.value == 5.0));
    }

    #[test]
    fn aggregated_range_counts_per_bucket() {
        let series = sample_series();
        let options = RangeOptions {
            start_ts: 1488823384,
            end_ts: 1488823384 + 1500,
            aggregation: Some(AggregationOptions {
                aggregation: Aggregation::Count,
                bucket_size: 500,
            }),
        };
        let samples = get_range(&series, &options);
        assert_eq!(
            samples,
            vec![
                Sample::new(1488823000, 116.0),
                Sample::new(1488823500, 500.0),
                Sample::new(1488824000, 500.0),
                Sample::new(1488824500, 384.0),
            ]
        );
    }

    #[test]
    fn aggregated_range_is_computed_fresh_per_query() {
        let series = sample_series();
        let options = RangeOptions {
            start_ts: 0,
            end_ts: i64::MAX,
            aggregation: Some(AggregationOptions {
                aggregation: Aggregation::Sum,
                bucket_size: 1000,
            }),
        };
        let first = get_range(&series, &options);
        let second = get_range(&series, &options);
        assert_eq!(first, second);
    }
}
