use super::Aggregation;
use crate::error::{TsdbError, TsdbResult};
use enum_dispatch::enum_dispatch;
use get_size::GetSize;
use valkey_module::{ValkeyError, ValkeyString};

type Value = f64;

fn bad_state(e: serde_json::Error) -> TsdbError {
    TsdbError::CannotDeserialize(e.to_string())
}

/// Incremental accumulator behind a compaction rule or a query-time bucket.
/// `save_state`/`load_state` snapshot the accumulator so that a partially
/// filled bucket survives dump/restore.
#[enum_dispatch]
pub trait AggregationHandler {
    fn update(&mut self, value: Value);
    fn reset(&mut self);
    fn current(&self) -> Option<Value>;
    fn finalize(&self) -> Value {
        self.current().unwrap_or(f64::NAN)
    }
    fn save_state(&self) -> String;
    fn load_state(&mut self, state: &str) -> TsdbResult<()>;
    fn aggregation(&self) -> Aggregation;
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggAvg {
    count: usize,
    sum: Value,
}

impl AggregationHandler for AggAvg {
    fn update(&mut self, value: Value) {
        self.sum += value;
        self.count += 1;
    }
    fn reset(&mut self) {
        self.count = 0;
        self.sum = 0.;
    }
    fn current(&self) -> Option<Value> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&(self.count, self.sum)).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        let (count, sum) = serde_json::from_str::<(usize, Value)>(state).map_err(bad_state)?;
        self.count = count;
        self.sum = sum;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::Avg
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggSum(Value);

impl AggregationHandler for AggSum {
    fn update(&mut self, value: Value) {
        self.0 += value;
    }
    fn reset(&mut self) {
        self.0 = 0.;
    }
    fn current(&self) -> Option<Value> {
        Some(self.0)
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        self.0 = serde_json::from_str(state).map_err(bad_state)?;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::Sum
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggMin(Option<Value>);

impl AggregationHandler for AggMin {
    fn update(&mut self, value: Value) {
        self.0 = Some(match self.0 {
            None => value,
            Some(v) => v.min(value),
        });
    }
    fn reset(&mut self) {
        self.0 = None;
    }
    fn current(&self) -> Option<Value> {
        self.0
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        self.0 = serde_json::from_str::<Option<Value>>(state).map_err(bad_state)?;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::Min
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggMax(Option<Value>);

impl AggregationHandler for AggMax {
    fn update(&mut self, value: Value) {
        self.0 = Some(match self.0 {
            None => value,
            Some(v) => v.max(value),
        });
    }
    fn reset(&mut self) {
        self.0 = None;
    }
    fn current(&self) -> Option<Value> {
        self.0
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        self.0 = serde_json::from_str::<Option<Value>>(state).map_err(bad_state)?;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::Max
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggCount(usize);

impl AggregationHandler for AggCount {
    fn update(&mut self, _value: Value) {
        self.0 += 1;
    }
    fn reset(&mut self) {
        self.0 = 0;
    }
    fn current(&self) -> Option<Value> {
        Some(self.0 as Value)
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        self.0 = serde_json::from_str(state).map_err(bad_state)?;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::Count
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggFirst(Option<Value>);

impl AggregationHandler for AggFirst {
    fn update(&mut self, value: Value) {
        if self.0.is_none() {
            self.0 = Some(value)
        }
    }
    fn reset(&mut self) {
        self.0 = None;
    }
    fn current(&self) -> Option<Value> {
        self.0
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        self.0 = serde_json::from_str::<Option<Value>>(state).map_err(bad_state)?;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::First
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggLast(Option<Value>);

impl AggregationHandler for AggLast {
    fn update(&mut self, value: Value) {
        self.0 = Some(value)
    }
    fn reset(&mut self) {
        self.0 = None;
    }
    fn current(&self) -> Option<Value> {
        self.0
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        self.0 = serde_json::from_str::<Option<Value>>(state).map_err(bad_state)?;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::Last
    }
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct AggRange {
    min: Value,
    max: Value,
    init: bool,
}

impl AggregationHandler for AggRange {
    fn update(&mut self, value: Value) {
        if !self.init {
            self.init = true;
            self.min = value;
            self.max = value;
        } else {
            self.max = self.max.max(value);
            self.min = self.min.min(value);
        }
    }
    fn reset(&mut self) {
        self.max = 0.;
        self.min = 0.;
        self.init = false;
    }
    fn current(&self) -> Option<Value> {
        if !self.init {
            None
        } else {
            Some(self.max - self.min)
        }
    }
    fn save_state(&self) -> String {
        serde_json::to_string(&(self.init, self.min, self.max)).unwrap_or_default()
    }
    fn load_state(&mut self, state: &str) -> TsdbResult<()> {
        let (init, min, max) =
            serde_json::from_str::<(bool, Value, Value)>(state).map_err(bad_state)?;
        self.init = init;
        self.min = min;
        self.max = max;
        Ok(())
    }
    fn aggregation(&self) -> Aggregation {
        Aggregation::Range
    }
}

#[enum_dispatch(AggregationHandler)]
#[derive(Clone, Debug, PartialEq)]
pub enum Aggregator {
    Avg(AggAvg),
    Sum(AggSum),
    Min(AggMin),
    Max(AggMax),
    Count(AggCount),
    First(AggFirst),
    Last(AggLast),
    Range(AggRange),
}

// No variant owns heap memory.
impl GetSize for Aggregator {
    fn get_heap_size(&self) -> usize {
        0
    }
}

impl From<Aggregation> for Aggregator {
    fn from(agg: Aggregation) -> Self {
        match agg {
            Aggregation::Avg => Aggregator::Avg(AggAvg::default()),
            Aggregation::Sum => Aggregator::Sum(AggSum::default()),
            Aggregation::Min => Aggregator::Min(AggMin::default()),
            Aggregation::Max => Aggregator::Max(AggMax::default()),
            Aggregation::Count => Aggregator::Count(AggCount::default()),
            Aggregation::First => Aggregator::First(AggFirst::default()),
            Aggregation::Last => Aggregator::Last(AggLast::default()),
            Aggregation::Range => Aggregator::Range(AggRange::default()),
        }
    }
}

impl TryFrom<&str> for Aggregator {
    type Error = ValkeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let aggregation = Aggregation::try_from(value)?;
        Ok(aggregation.into())
    }
}

impl TryFrom<&ValkeyString> for Aggregator {
    type Error = ValkeyError;

    fn try_from(value: &ValkeyString) -> Result<Self, Self::Error> {
        let str = value.to_string_lossy();
        Aggregator::try_from(str.as_str())
    }
}
